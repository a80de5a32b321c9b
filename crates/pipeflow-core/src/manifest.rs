//! マニフェスト（compose ファイル）の生成
//!
//! ステージ列を型付きのレコードとして組み立て、serde_yaml で一度だけエンコードする。
//! 同じステージ列からは常にバイト単位で同一のテキストが得られる。

use crate::error::Result;
use crate::model::{DependencyEdge, HealthCheck, Stage, format_duration};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

/// マニフェストのスキーマバージョン
pub const MANIFEST_VERSION: &str = "3.8";

/// マニフェストのデフォルトファイル名
pub const MANIFEST_FILE_NAME: &str = "docker-compose.yml";

/// ステージ列をマニフェストのテキストに変換する
pub fn serialize(stages: &[Stage]) -> Result<String> {
    let document = Document {
        version: MANIFEST_VERSION,
        services: Services(stages),
        networks: Networks(collect_networks(stages)),
    };

    let yaml = serde_yaml::to_string(&document)?;
    Ok(remove_empty_lines(&yaml))
}

/// 空白のみの行を取り除く
fn remove_empty_lines(text: &str) -> String {
    let mut out = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    out.push('\n');
    out
}

/// ステージが参照するネットワークを初出順に列挙
fn collect_networks(stages: &[Stage]) -> Vec<&str> {
    let mut networks: Vec<&str> = Vec::new();
    for network in stages.iter().flat_map(|s| s.networks.iter()) {
        if !networks.contains(&network.as_str()) {
            networks.push(network);
        }
    }
    networks
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

#[derive(Serialize)]
struct Document<'a> {
    version: &'static str,
    services: Services<'a>,
    #[serde(skip_serializing_if = "Networks::is_empty")]
    networks: Networks<'a>,
}

/// ステージ名をキーとするマッピング（ステージ順を保持）
struct Services<'a>(&'a [Stage]);

impl Serialize for Services<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for stage in self.0 {
            map.serialize_entry(&stage.name, &ServiceEntry::from_stage(stage))?;
        }
        map.end()
    }
}

struct Networks<'a>(Vec<&'a str>);

impl Networks<'_> {
    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Serialize)]
struct NetworkEntry {}

impl Serialize for Networks<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for name in &self.0 {
            map.serialize_entry(name, &NetworkEntry {})?;
        }
        map.end()
    }
}

#[derive(Serialize)]
struct ServiceEntry<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    platform: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    runtime: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    build: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ports: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    volumes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    working_dir: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    environment: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    entrypoint: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    command: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    networks: Vec<&'a str>,
    #[serde(skip_serializing_if = "DependsOn::is_empty")]
    depends_on: DependsOn<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    restart: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    healthcheck: Option<HealthCheckEntry<'a>>,
}

impl<'a> ServiceEntry<'a> {
    fn from_stage(stage: &'a Stage) -> Self {
        Self {
            image: non_empty(&stage.image),
            platform: non_empty(&stage.platform),
            runtime: non_empty(&stage.runtime),
            build: non_empty(&stage.build),
            ports: stage.ports.iter().map(|p| p.to_string()).collect(),
            volumes: stage.volumes.iter().map(|v| v.to_string()).collect(),
            working_dir: non_empty(&stage.working_dir),
            environment: stage.environment.to_entries(),
            entrypoint: non_empty(&stage.entrypoint),
            command: non_empty(&stage.command),
            networks: stage.networks.iter().map(String::as_str).collect(),
            depends_on: DependsOn(&stage.depends_on),
            restart: stage.restart.map(|r| r.as_compose_str()),
            healthcheck: stage.healthcheck.as_ref().map(HealthCheckEntry::from_health_check),
        }
    }
}

/// 依存先名 → 条件 のマッピング
struct DependsOn<'a>(&'a [DependencyEdge]);

impl DependsOn<'_> {
    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Serialize)]
struct ConditionEntry {
    condition: &'static str,
}

impl Serialize for DependsOn<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for edge in self.0 {
            map.serialize_entry(
                &edge.target,
                &ConditionEntry {
                    condition: edge.condition.as_compose_str(),
                },
            )?;
        }
        map.end()
    }
}

#[derive(Serialize)]
struct HealthCheckEntry<'a> {
    test: &'a str,
    interval: String,
    timeout: String,
    retries: u32,
}

impl<'a> HealthCheckEntry<'a> {
    fn from_health_check(health: &'a HealthCheck) -> Self {
        Self {
            test: &health.test,
            interval: format_duration(health.interval),
            timeout: format_duration(health.timeout),
            retries: health.retries,
        }
    }
}
