use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "パイプラインファイルが見つかりません。以下の場所を確認してください:\n\
        - カレントディレクトリ: pipeline.local.yaml, pipeline.yaml\n\
        - ./.pipeflow/ ディレクトリ\n\
        - ~/.config/pipeflow/pipeline.yaml\n\
        または PIPEFLOW_CONFIG_PATH 環境変数で直接指定できます"
    )]
    PipelineFileNotFound,

    #[error("パイプラインファイルの解析に失敗しました: {path}\n理由: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("パイプラインファイルの読み込みに失敗しました: {path}\n理由: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
