use pipeflow_core::ConfigurationError;
use std::path::PathBuf;
use thiserror::Error;

/// 失敗した transient ステージの終了情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedStage {
    pub stage: String,
    pub exit_code: Option<i64>,
}

impl std::fmt::Display for FailedStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.exit_code {
            Some(code) => write!(f, "{} (exit {})", self.stage, code),
            None => write!(f, "{} (未完了)", self.stage),
        }
    }
}

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("マニフェストを書き込めません: {path}\n理由: {source}")]
    ManifestWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "コンテナランタイムの呼び出しに失敗しました: {0}\n\nヒント:\n  • docker compose が利用可能か確認してください\n  • マニフェストの内容を pipeflow render で確認してください"
    )]
    RuntimeInvocation(String),

    #[error(
        "ステージが正常終了しませんでした: {}\n常駐ステージは起動されていません",
        format_failed(.failed)
    )]
    PipelineExecution { failed: Vec<FailedStage> },

    #[error(
        "Dockerに接続できません: {0}\n\nヒント:\n  • Dockerが起動しているか確認してください\n  • OrbStackまたはDocker Desktopがインストールされているか確認してください"
    )]
    DockerConnectionFailed(String),

    #[error("パイプラインの実行がキャンセルされました")]
    Cancelled,

    #[error("JSONパースエラー: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

fn format_failed(failed: &[FailedStage]) -> String {
    failed
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<bollard::errors::Error> for ContainerError {
    fn from(err: bollard::errors::Error) -> Self {
        let err_str = err.to_string();
        if err_str.contains("Connection refused") || err_str.contains("No such file or directory")
        {
            ContainerError::DockerConnectionFailed(err_str)
        } else {
            ContainerError::RuntimeInvocation(err_str)
        }
    }
}

pub type Result<T> = std::result::Result<T, ContainerError>;
