//! pipeflow container
//!
//! compose マニフェストのサブセットを起動するゲートウェイと、
//! transient → detached の二段階で実行するドライバー。

pub mod cancel;
pub mod compose;
pub mod driver;
pub mod error;
pub mod gateway;

pub use cancel::CancelToken;
pub use compose::{ComposeCli, check_daemon};
pub use driver::{LogSink, PipelineRunner, RunReport};
pub use error::{ContainerError, FailedStage, Result};
pub use gateway::{
    ApplyOptions, ContainerGateway, LaunchMode, LogLine, LogStream, StageState, StageStatus,
    SubsetStatus,
};
