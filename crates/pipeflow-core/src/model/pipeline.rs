//! パイプライン定義

use super::stage::Stage;
use crate::error::Result;

/// ビルダーが生成した順序付きのステージ列
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

/// 実行フェーズごとのステージ分割
///
/// どちらも追加順を保持する。
#[derive(Debug, Clone, Default)]
pub struct Partition<'a> {
    /// 完了まで実行するステージ（前処理・学習）
    pub transient: Vec<&'a Stage>,
    /// 常駐ステージ（サービング）
    pub detached: Vec<&'a Stage>,
}

impl Partition<'_> {
    pub fn transient_names(&self) -> Vec<String> {
        self.transient.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn detached_names(&self) -> Vec<String> {
        self.detached.iter().map(|s| s.name().to_string()).collect()
    }
}

impl Pipeline {
    pub(crate) fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }

    pub fn stage_names(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// 各ステージの出力ディレクトリを作成する
    ///
    /// マニフェストの生成や検証では呼ばれず、実行直前にのみ呼ばれる。
    pub fn prepare_outputs(&self) -> Result<()> {
        for stage in &self.stages {
            stage.prepare_outputs()?;
        }
        Ok(())
    }

    /// transient / detached に分割する
    pub fn partition(&self) -> Partition<'_> {
        let (transient, detached): (Vec<&Stage>, Vec<&Stage>) =
            self.stages.iter().partition(|s| s.is_transient());
        Partition {
            transient,
            detached,
        }
    }
}
