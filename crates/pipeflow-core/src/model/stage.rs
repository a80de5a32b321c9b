//! ステージ定義

use super::dependency::DependencyEdge;
use super::environment::Environment;
use super::port::Port;
use super::volume::Volume;
use crate::contract::IoContract;
use crate::error::Result;
use std::time::Duration;

/// パイプラインの1ステップ（コンテナ化されたサービス）
///
/// `PipelineBuilder` によってのみ生成され、生成後は変更されない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub(crate) name: String,
    pub(crate) image: Option<String>,
    pub(crate) platform: Option<String>,
    pub(crate) runtime: Option<String>,
    /// ビルドコンテキスト
    pub(crate) build: Option<String>,
    pub(crate) ports: Vec<Port>,
    pub(crate) volumes: Vec<Volume>,
    pub(crate) working_dir: Option<String>,
    pub(crate) environment: Environment,
    pub(crate) entrypoint: Option<String>,
    pub(crate) command: Option<String>,
    pub(crate) networks: Vec<String>,
    pub(crate) depends_on: Vec<DependencyEdge>,
    pub(crate) restart: Option<RestartPolicy>,
    pub(crate) healthcheck: Option<HealthCheck>,
    /// 常駐ステージ（serving）なら true、完了まで実行するステージなら false
    pub(crate) detached: bool,
    /// 実行時に作成する出力ディレクトリ（マニフェストには現れない）
    pub(crate) io: Option<IoContract>,
}

impl Stage {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    pub fn platform(&self) -> Option<&str> {
        self.platform.as_deref()
    }

    pub fn runtime(&self) -> Option<&str> {
        self.runtime.as_deref()
    }

    pub fn build(&self) -> Option<&str> {
        self.build.as_deref()
    }

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub fn volumes(&self) -> &[Volume] {
        &self.volumes
    }

    pub fn working_dir(&self) -> Option<&str> {
        self.working_dir.as_deref()
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn entrypoint(&self) -> Option<&str> {
        self.entrypoint.as_deref()
    }

    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    pub fn networks(&self) -> &[String] {
        &self.networks
    }

    pub fn depends_on(&self) -> &[DependencyEdge] {
        &self.depends_on
    }

    pub fn restart(&self) -> Option<RestartPolicy> {
        self.restart
    }

    pub fn healthcheck(&self) -> Option<&HealthCheck> {
        self.healthcheck.as_ref()
    }

    pub fn is_detached(&self) -> bool {
        self.detached
    }

    /// 完了まで実行するステージかどうか
    pub fn is_transient(&self) -> bool {
        !self.detached
    }

    /// 出力ディレクトリ（`model/`, `data/`）を作成する
    pub fn prepare_outputs(&self) -> Result<()> {
        match &self.io {
            Some(io) => io.prepare(),
            None => Ok(()),
        }
    }
}

/// 再起動ポリシー
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RestartPolicy {
    /// 再起動しない（デフォルト）
    #[default]
    No,
    /// 常に再起動
    Always,
    /// 異常終了時のみ再起動
    OnFailure,
    /// 明示的に停止しない限り再起動
    UnlessStopped,
}

impl RestartPolicy {
    /// 文字列からパース
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "no" => Some(Self::No),
            "always" => Some(Self::Always),
            "on-failure" | "on_failure" => Some(Self::OnFailure),
            "unless-stopped" | "unless_stopped" => Some(Self::UnlessStopped),
            _ => None,
        }
    }

    /// compose で使用する文字列に変換
    pub fn as_compose_str(&self) -> &'static str {
        match self {
            Self::No => "no",
            Self::Always => "always",
            Self::OnFailure => "on-failure",
            Self::UnlessStopped => "unless-stopped",
        }
    }
}

/// ヘルスチェック設定
///
/// 4項目すべてが揃った状態でのみ存在する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheck {
    /// テストコマンド（CMD-SHELL として評価される）
    pub test: String,
    pub interval: Duration,
    pub timeout: Duration,
    pub retries: u32,
}

impl HealthCheck {
    pub fn new(test: impl Into<String>, interval: Duration, timeout: Duration, retries: u32) -> Self {
        Self {
            test: test.into(),
            interval,
            timeout,
            retries,
        }
    }
}

impl Default for HealthCheck {
    fn default() -> Self {
        Self {
            test: "exit 0".to_string(),
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(3),
            retries: 3,
        }
    }
}

/// compose の duration 表記（例: `30s`, `1500ms`, `250us`）
///
/// 値を丸めずに表せる最も粗い単位を使う。
pub fn format_duration(duration: Duration) -> String {
    let nanos = duration.subsec_nanos();
    if nanos == 0 {
        format!("{}s", duration.as_secs())
    } else if nanos % 1_000_000 == 0 {
        format!("{}ms", duration.as_millis())
    } else if nanos % 1_000 == 0 {
        format!("{}us", duration.as_micros())
    } else {
        format!("{}ns", duration.as_nanos())
    }
}
