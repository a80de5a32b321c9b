//! コンテナ内のパス規約
//!
//! 各ステージのコードは以下の固定パスと環境変数を通して入出力を行う。
//!
//! | パス | 環境変数 |
//! |---|---|
//! | `/opt/ml/code` | `SOURCE_CODE_PATH` |
//! | `/opt/ml/model` | `MODEL_OUTPUT_PATH` |
//! | `/opt/ml/data` | `DATA_OUTPUT_PATH` |
//! | `/opt/ml/input/<channel>` | `INPUT_DATA_<CHANNEL>` |

use crate::error::{ConfigurationError, Result};
use crate::model::{Environment, Volume, absolute_path};
use std::path::{Path, PathBuf};

pub const CODE_DIR: &str = "/opt/ml/code";
pub const MODEL_DIR: &str = "/opt/ml/model";
pub const DATA_DIR: &str = "/opt/ml/data";
pub const INPUT_DIR: &str = "/opt/ml/input";
/// 依存関係マニフェストのマウント先
pub const REQUIREMENTS_PATH: &str = "/opt/ml/requirements.txt";

pub const SOURCE_CODE_ENV: &str = "SOURCE_CODE_PATH";
pub const MODEL_OUTPUT_ENV: &str = "MODEL_OUTPUT_PATH";
pub const DATA_OUTPUT_ENV: &str = "DATA_OUTPUT_PATH";
pub const INPUT_DATA_ENV_PREFIX: &str = "INPUT_DATA_";

/// 入力データチャンネル
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataChannel {
    /// ホスト上のディレクトリ（`/opt/ml/input/<name>` にマウント）
    Local { name: String, path: PathBuf },
    /// `s3://` などのリモートURI（マウントせず環境変数で渡す）
    Remote { name: String, uri: String },
}

impl DataChannel {
    /// パスの形式からチャンネル種別を判定する
    ///
    /// ローカルパスは存在している必要がある。
    pub fn new(name: impl Into<String>, path: impl AsRef<str>) -> Result<Self> {
        let name = name.into();
        let path = path.as_ref();

        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            return Err(ConfigurationError::InvalidChannel {
                name,
                message: "チャンネル名には英数字, '_', '-' のみ使用できます".to_string(),
            });
        }

        if path.starts_with("s3://") {
            return Ok(Self::Remote {
                name,
                uri: path.to_string(),
            });
        }

        let path = PathBuf::from(path);
        if !path.exists() {
            return Err(ConfigurationError::InvalidChannel {
                name,
                message: format!("パス {} が存在しません", path.display()),
            });
        }
        Ok(Self::Local { name, path })
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Local { name, .. } | Self::Remote { name, .. } => name,
        }
    }

    /// コンテナ内でのマウント先
    pub fn container_path(&self) -> String {
        format!("{}/{}", INPUT_DIR, self.name())
    }

    /// チャンネルを公開する環境変数名
    pub fn env_key(&self) -> String {
        format!(
            "{}{}",
            INPUT_DATA_ENV_PREFIX,
            self.name().to_uppercase().replace('-', "_")
        )
    }
}

/// ステージの入出力設定
///
/// 出力ディレクトリ配下の `model/` と `data/`、および入力チャンネルを
/// 固定パスにマウントし、対応する環境変数を設定する。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IoContract {
    output_dir: Option<PathBuf>,
    channels: Vec<DataChannel>,
}

impl IoContract {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: Some(output_dir.into()),
            channels: Vec::new(),
        }
    }

    /// 出力ディレクトリを持たない（入力チャンネルのみの）設定
    pub fn inputs_only() -> Self {
        Self::default()
    }

    pub fn with_channel(mut self, channel: DataChannel) -> Self {
        self.channels.push(channel);
        self
    }

    pub fn channels(&self) -> &[DataChannel] {
        &self.channels
    }

    /// 出力ディレクトリ（`model/`, `data/`）を作成する
    pub fn prepare(&self) -> Result<()> {
        if let Some(output_dir) = &self.output_dir {
            for sub in ["model", "data"] {
                let dir = output_dir.join(sub);
                std::fs::create_dir_all(&dir)
                    .map_err(|source| ConfigurationError::PathResolution { path: dir, source })?;
            }
        }
        Ok(())
    }

    /// バインドマウント一覧
    pub fn volumes(&self) -> Result<Vec<Volume>> {
        let mut volumes = Vec::new();

        if let Some(output_dir) = &self.output_dir {
            let output_dir = absolute_path(output_dir)?;
            volumes.push(Volume::bind(output_dir.join("model"), MODEL_DIR));
            volumes.push(Volume::bind(output_dir.join("data"), DATA_DIR));
        }

        for channel in &self.channels {
            if let DataChannel::Local { path, .. } = channel {
                volumes.push(Volume::bind(absolute_path(path)?, channel.container_path()));
            }
        }

        Ok(volumes)
    }

    /// 環境変数一覧
    pub fn environment(&self) -> Result<Environment> {
        let mut env = Environment::new();

        if self.output_dir.is_some() {
            env.insert(MODEL_OUTPUT_ENV, MODEL_DIR)?;
            env.insert(DATA_OUTPUT_ENV, DATA_DIR)?;
        }

        for channel in &self.channels {
            let value = match channel {
                DataChannel::Local { .. } => channel.container_path(),
                DataChannel::Remote { uri, .. } => uri.clone(),
            };
            env.insert(channel.env_key(), value)?;
        }

        Ok(env)
    }
}

/// ソースコードディレクトリのマウント
pub fn source_code_volume(source_code_dir: &Path) -> Result<Volume> {
    Ok(Volume::bind(absolute_path(source_code_dir)?, CODE_DIR))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_channel_requires_existing_path() {
        let dir = tempfile::tempdir().unwrap();
        let channel = DataChannel::new("train", dir.path().to_str().unwrap()).unwrap();
        assert_eq!(channel.container_path(), "/opt/ml/input/train");
        assert_eq!(channel.env_key(), "INPUT_DATA_TRAIN");

        let missing = dir.path().join("missing");
        assert!(matches!(
            DataChannel::new("validation", missing.to_str().unwrap()),
            Err(ConfigurationError::InvalidChannel { .. })
        ));
    }

    #[test]
    fn test_remote_channel_is_not_mounted() {
        let contract = IoContract::inputs_only()
            .with_channel(DataChannel::new("raw-data", "s3://bucket/raw").unwrap());

        assert!(contract.volumes().unwrap().is_empty());
        let env = contract.environment().unwrap();
        assert_eq!(env.get("INPUT_DATA_RAW_DATA"), Some("s3://bucket/raw"));
    }

    #[test]
    fn test_invalid_channel_name() {
        assert!(DataChannel::new("bad name", "s3://bucket").is_err());
        assert!(DataChannel::new("", "s3://bucket").is_err());
    }

    #[test]
    fn test_contract_mounts_and_environment() {
        let output = tempfile::tempdir().unwrap();
        let input = tempfile::tempdir().unwrap();

        let contract = IoContract::new(output.path())
            .with_channel(DataChannel::new("train", input.path().to_str().unwrap()).unwrap());
        contract.prepare().unwrap();

        assert!(output.path().join("model").is_dir());
        assert!(output.path().join("data").is_dir());

        let volumes: Vec<String> = contract
            .volumes()
            .unwrap()
            .iter()
            .map(|v| v.to_string())
            .collect();
        assert_eq!(
            volumes,
            vec![
                format!("{}/model:/opt/ml/model", output.path().display()),
                format!("{}/data:/opt/ml/data", output.path().display()),
                format!("{}:/opt/ml/input/train", input.path().display()),
            ]
        );

        let env = contract.environment().unwrap();
        assert_eq!(
            env.to_entries(),
            vec![
                "MODEL_OUTPUT_PATH=/opt/ml/model",
                "DATA_OUTPUT_PATH=/opt/ml/data",
                "INPUT_DATA_TRAIN=/opt/ml/input/train",
            ]
        );
    }
}
