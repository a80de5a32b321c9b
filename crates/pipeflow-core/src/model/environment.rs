//! 環境変数定義

use crate::error::{ConfigurationError, Result};

/// 順序付きの環境変数リスト（キーは一意）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    entries: Vec<(String, String)>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// `KEY=value` 形式のリストから作成
    pub fn parse<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut env = Self::new();
        for entry in entries {
            let entry = entry.as_ref();
            let (key, value) = entry
                .split_once('=')
                .ok_or_else(|| ConfigurationError::InvalidEnvironment(entry.to_string()))?;
            env.insert(key, value)?;
        }
        Ok(env)
    }

    /// 変数を末尾に追加する。既存のキーはエラー
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let key = key.into();
        if key.trim().is_empty() || key.contains(char::is_whitespace) {
            return Err(ConfigurationError::InvalidEnvironment(key));
        }
        if self.contains_key(&key) {
            return Err(ConfigurationError::DuplicateEnvironmentKey(key));
        }
        self.entries.push((key, value.into()));
        Ok(())
    }

    /// 他の環境変数を末尾に追加する
    pub fn extend(&mut self, other: Environment) -> Result<()> {
        for (key, value) in other.entries {
            self.insert(key, value)?;
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// マニフェスト用の `KEY=value` 表現
    pub fn to_entries(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect()
    }
}
