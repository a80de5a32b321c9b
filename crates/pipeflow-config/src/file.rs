//! パイプラインファイル（YAML）のモデル

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_MANIFEST_PATH: &str = "docker-compose.yml";

/// パイプラインファイル全体
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineFile {
    #[serde(default)]
    pub defaults: DefaultsConfig,
    /// 記述順がそのまま追加順になる
    #[serde(default)]
    pub stages: Vec<StageConfig>,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

impl PipelineFile {
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }
}

/// 全ステージ共通の既定値
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefaultsConfig {
    pub image: Option<String>,
    pub platform: Option<String>,
    pub runtime: Option<String>,
    pub source_code_dir: Option<PathBuf>,
    pub dependency_manifest: Option<PathBuf>,
    pub shell: Option<String>,
    /// `KEY=VALUE` 形式
    #[serde(default)]
    pub environment: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetConfig {
    Preprocessing,
    Training,
    Serving,
}

/// ステージ定義
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageConfig {
    /// 省略時はプリセットのステージ名
    pub name: Option<String>,
    pub preset: Option<PresetConfig>,
    pub image: Option<String>,
    pub platform: Option<String>,
    pub runtime: Option<String>,
    pub entrypoint: Option<String>,
    pub command: Option<String>,
    #[serde(default)]
    pub arguments: Vec<String>,
    #[serde(default)]
    pub ports: Vec<String>,
    #[serde(default)]
    pub volumes: Vec<String>,
    pub working_dir: Option<String>,
    #[serde(default)]
    pub environment: Vec<String>,
    #[serde(default)]
    pub networks: Vec<String>,
    /// 省略時は直前のステージの正常終了に依存する
    pub depends_on: Option<Vec<DependencyConfig>>,
    pub restart: Option<String>,
    pub healthcheck: Option<HealthCheckConfig>,
    pub source_code_dir: Option<PathBuf>,
    pub dependency_manifest: Option<PathBuf>,
    /// モデル・データの出力先（コンテナ内 I/O 規約を有効にする）
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub inputs: Vec<ChannelConfig>,
    pub detached: Option<bool>,
}

/// 依存関係（ステージ名のみ、または条件付き）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencyConfig {
    Stage(String),
    Detailed {
        stage: String,
        condition: Option<String>,
    },
}

impl DependencyConfig {
    pub fn stage(&self) -> &str {
        match self {
            DependencyConfig::Stage(stage) => stage,
            DependencyConfig::Detailed { stage, .. } => stage,
        }
    }

    pub fn condition(&self) -> Option<&str> {
        match self {
            DependencyConfig::Stage(_) => None,
            DependencyConfig::Detailed { condition, .. } => condition.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthCheckConfig {
    pub test: String,
    /// `30s`, `1500ms`, `2m` など
    pub interval: Option<String>,
    pub timeout: Option<String>,
    pub retries: Option<u32>,
}

/// 入力データチャネル
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelConfig {
    pub name: String,
    /// ローカルパスまたは `s3://` URI
    pub source: String,
}

/// コンテナランタイムの設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConfig {
    #[serde(default = "default_compose_command")]
    pub compose_command: Vec<String>,
    #[serde(default = "default_manifest_path")]
    pub manifest_path: PathBuf,
    pub project_name: Option<String>,
    /// 実行前に Docker デーモンへの疎通を確認する
    #[serde(default = "default_true")]
    pub check_daemon: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            compose_command: default_compose_command(),
            manifest_path: default_manifest_path(),
            project_name: None,
            check_daemon: true,
        }
    }
}

fn default_compose_command() -> Vec<String> {
    vec!["docker".to_string(), "compose".to_string()]
}

fn default_manifest_path() -> PathBuf {
    PathBuf::from(DEFAULT_MANIFEST_PATH)
}

fn default_true() -> bool {
    true
}
