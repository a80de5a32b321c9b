//! ボリューム定義

use crate::error::{ConfigurationError, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// バインドマウント（`host:container[:ro]`）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    pub host: PathBuf,
    pub container: PathBuf,
    pub read_only: bool,
}

impl Volume {
    pub fn bind(host: impl Into<PathBuf>, container: impl Into<PathBuf>) -> Self {
        Self {
            host: host.into(),
            container: container.into(),
            read_only: false,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// `./data:/opt/ml/data` / `./data:/data:ro` 形式をパース
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || ConfigurationError::InvalidVolume(s.to_string());
        let parts: Vec<&str> = s.trim().split(':').collect();

        let read_only = match parts.as_slice() {
            [_, _] => false,
            [_, _, "ro"] => true,
            [_, _, "rw"] => false,
            _ => return Err(invalid()),
        };
        if parts[0].is_empty() || parts[1].is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            host: PathBuf::from(parts[0]),
            container: PathBuf::from(parts[1]),
            read_only,
        })
    }

    /// ホスト側パスを絶対パスに解決したボリュームを返す
    pub fn resolve(&self) -> Result<Self> {
        Ok(Self {
            host: absolute_path(&self.host)?,
            container: self.container.clone(),
            read_only: self.read_only,
        })
    }
}

/// 相対パスをカレントディレクトリ基準の絶対パスに変換
///
/// パスが存在している必要はない。
pub fn absolute_path(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(|source| ConfigurationError::PathResolution {
        path: path.to_path_buf(),
        source,
    })
}

impl FromStr for Volume {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host.display(), self.container.display())?;
        if self.read_only {
            write!(f, ":ro")?;
        }
        Ok(())
    }
}
