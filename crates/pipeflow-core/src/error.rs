use std::path::PathBuf;
use thiserror::Error;

/// パイプライン構成時のエラー
///
/// いずれもマニフェスト書き出しやコンテナ起動より前に検出される。
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("無効なステージ名: '{0}'（英数字, '.', '_', '-' のみ使用でき、先頭は英数字である必要があります）")]
    InvalidStageName(String),

    #[error("ステージ '{0}' は既に追加されています")]
    DuplicateStage(String),

    #[error("ステージ '{stage}' の依存先 '{target}' が見つかりません（先に追加されたステージのみ参照できます）")]
    UnknownDependency { stage: String, target: String },

    #[error("完了型ステージ '{stage}' は常駐ステージ '{target}' に依存できません（常駐ステージは完了型ステージの成功後にのみ起動されます）")]
    DetachedDependency { stage: String, target: String },

    #[error("依存関係のインストール後に実行するコマンドがありません（entrypoint または command を指定してください）")]
    NoExecutable,

    #[error("無効なポート指定: '{0}'（例: 8080:8080, 5353:53/udp）")]
    InvalidPort(String),

    #[error("無効なボリューム指定: '{0}'（例: ./data:/opt/ml/data, ./data:/data:ro）")]
    InvalidVolume(String),

    #[error("無効な環境変数: '{0}'（KEY=value 形式で指定してください）")]
    InvalidEnvironment(String),

    #[error("環境変数 '{0}' が重複しています")]
    DuplicateEnvironmentKey(String),

    #[error("無効なデータチャンネル '{name}': {message}")]
    InvalidChannel { name: String, message: String },

    #[error("パス解決エラー: {path}\n理由: {source}")]
    PathResolution {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("マニフェストのエンコードに失敗しました: {0}")]
    ManifestEncoding(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, ConfigurationError>;
