//! コンテナランタイムのゲートウェイ

use crate::error::{FailedStage, Result};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::path::Path;

/// サブセットの起動モード
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// 完了まで追跡する（transient ステージ）
    Attached,
    /// 起動後も常駐させる（detached ステージ）
    Detached,
}

/// `apply` のオプション
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyOptions {
    /// 起動前にイメージをビルドする
    pub build: bool,
    pub mode: LaunchMode,
}

impl ApplyOptions {
    pub fn attached() -> Self {
        Self {
            build: true,
            mode: LaunchMode::Attached,
        }
    }

    pub fn detached() -> Self {
        Self {
            build: true,
            mode: LaunchMode::Detached,
        }
    }
}

/// ステージのログ1行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    /// 出力元のステージ（判別できない場合は None）
    pub stage: Option<String>,
    pub text: String,
}

impl LogLine {
    pub fn new(stage: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            stage: Some(stage.into()),
            text: text.into(),
        }
    }
}

pub type LogStream = BoxStream<'static, Result<LogLine>>;

/// ステージのコンテナ状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    /// 実行中（再起動中・一時停止中を含む）
    Running,
    /// 終了済み
    Exited(i64),
    /// コンテナが作成されていない、または起動されていない
    NotStarted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageStatus {
    pub stage: String,
    pub state: StageState,
}

/// サブセットの終了状態
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubsetStatus {
    pub stages: Vec<StageStatus>,
}

impl SubsetStatus {
    /// 全ステージが終了コード 0 で完了しているか
    pub fn is_success(&self) -> bool {
        self.stages
            .iter()
            .all(|s| s.state == StageState::Exited(0))
    }

    /// 非ゼロの終了コードで終了したステージがあるか
    pub fn has_failed_exit(&self) -> bool {
        self.stages
            .iter()
            .any(|s| matches!(s.state, StageState::Exited(code) if code != 0))
    }

    /// 正常終了していないステージ
    pub fn failures(&self) -> Vec<FailedStage> {
        self.stages
            .iter()
            .filter(|s| s.state != StageState::Exited(0))
            .map(|s| FailedStage {
                stage: s.stage.clone(),
                exit_code: match s.state {
                    StageState::Exited(code) => Some(code),
                    _ => None,
                },
            })
            .collect()
    }
}

/// コンテナランタイムのトレイト
///
/// マニフェストとステージ名のサブセットを受け取り、起動・ログ追跡・状態取得・破棄を行う。
#[async_trait]
pub trait ContainerGateway: Send + Sync {
    /// サブセットをビルドして起動する
    async fn apply(&self, manifest: &Path, stages: &[String], options: ApplyOptions)
    -> Result<()>;

    /// サブセットのログを追跡する
    ///
    /// 全ステージが終了するとストリームも終了する。常駐ステージでは終了しない場合がある。
    async fn stream_logs(&self, manifest: &Path, stages: &[String]) -> Result<LogStream>;

    /// サブセットの終了状態を取得する
    async fn exit_status(&self, manifest: &Path, stages: &[String]) -> Result<SubsetStatus>;

    /// サブセットを停止・削除する
    async fn teardown(&self, manifest: &Path, stages: &[String]) -> Result<()>;
}
