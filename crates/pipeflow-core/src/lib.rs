//! pipeflow core
//!
//! 前処理 → 学習 → サービング のような ML ワークフローを、
//! コンテナ化されたステージの列として組み立て、compose マニフェストを生成する。
//!
//! ```
//! use pipeflow_core::{PipelineBuilder, PipelineDefaults, StageSpec};
//!
//! let mut builder = PipelineBuilder::new(PipelineDefaults::default().with_image("python:3.12-slim"));
//! builder.add_preprocessing_stage(StageSpec::new().command("python process.py")).unwrap();
//! builder.add_training_stage(StageSpec::new().command("python train.py")).unwrap();
//! builder.add_serving_stage(StageSpec::new().command("python serve.py")).unwrap();
//!
//! let manifest = builder.manifest().unwrap();
//! assert!(manifest.contains("service_completed_successfully"));
//! ```

pub mod builder;
pub mod command;
pub mod contract;
pub mod error;
pub mod manifest;
pub mod model;

// Re-exports
pub use builder::*;
pub use command::{CommandSpec, ResolvedCommand, synthesize};
pub use contract::{DataChannel, IoContract};
pub use error::{ConfigurationError, Result};
pub use manifest::{MANIFEST_FILE_NAME, serialize};
pub use model::*;
