//! 二段階実行ドライバー
//!
//! transient ステージを完了まで実行し、全て正常終了した場合に限り
//! detached ステージを起動する。

use crate::cancel::CancelToken;
use crate::error::{ContainerError, Result};
use crate::gateway::{ApplyOptions, ContainerGateway, LogLine, SubsetStatus};
use futures_util::StreamExt;
use pipeflow_core::Pipeline;
use std::future::Future;
use std::path::{Path, PathBuf};

/// ステージログの出力先
pub trait LogSink: Send {
    fn line(&mut self, line: &LogLine);
}

impl<F> LogSink for F
where
    F: FnMut(&LogLine) + Send,
{
    fn line(&mut self, line: &LogLine) {
        self(line)
    }
}

/// 実行結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// 完了まで実行したステージ
    pub transient: Vec<String>,
    /// 起動した常駐ステージ
    pub detached: Vec<String>,
    /// transient サブセットの終了状態（Phase A を実行した場合）
    pub transient_status: Option<SubsetStatus>,
}

pub struct PipelineRunner<G> {
    gateway: G,
    manifest_path: PathBuf,
    cancel: CancelToken,
}

impl<G: ContainerGateway> PipelineRunner<G> {
    pub fn new(gateway: G, manifest_path: impl Into<PathBuf>) -> Self {
        Self {
            gateway,
            manifest_path: manifest_path.into(),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// マニフェストをシリアライズして書き込む（既存ファイルは上書き）
    pub async fn write_manifest(&self, pipeline: &Pipeline) -> Result<()> {
        let manifest = pipeflow_core::serialize(pipeline.stages())?;
        self.persist(&manifest).await
    }

    async fn persist(&self, manifest: &str) -> Result<()> {
        tokio::fs::write(&self.manifest_path, manifest)
            .await
            .map_err(|source| ContainerError::ManifestWrite {
                path: self.manifest_path.clone(),
                source,
            })?;
        tracing::debug!("manifest written: {}", self.manifest_path.display());
        Ok(())
    }

    /// パイプラインを実行する
    ///
    /// transient ステージのいずれかが正常終了しなかった場合は
    /// `PipelineExecution` を返し、detached ステージは起動しない。
    pub async fn run(&self, pipeline: &Pipeline, sink: &mut dyn LogSink) -> Result<RunReport> {
        let manifest = pipeflow_core::serialize(pipeline.stages())?;
        let partition = pipeline.partition();
        let transient = partition.transient_names();
        let detached = partition.detached_names();

        let mut report = RunReport::default();

        if pipeline.is_empty() {
            tracing::warn!("パイプラインにステージがありません");
            return Ok(report);
        }

        pipeline.prepare_outputs()?;

        // Phase A
        if !transient.is_empty() {
            tracing::info!(stages = ?transient, "starting transient stages");
            self.persist(&manifest).await?;
            if let Err(e) = self
                .guarded(
                    self.gateway
                        .apply(&self.manifest_path, &transient, ApplyOptions::attached()),
                )
                .await
            {
                return Err(self.classify_apply_error(e, &transient).await);
            }
            self.follow(&transient, sink).await?;

            let status = self
                .guarded(self.gateway.exit_status(&self.manifest_path, &transient))
                .await?;
            if !status.is_success() {
                let failed = status.failures();
                tracing::warn!(?failed, "transient stages did not complete successfully");
                return Err(ContainerError::PipelineExecution { failed });
            }
            tracing::info!("transient stages completed");
            report.transient = transient;
            report.transient_status = Some(status);
        }

        // Phase B
        if !detached.is_empty() {
            tracing::info!(stages = ?detached, "starting detached stages");
            self.persist(&manifest).await?;
            self.guarded(
                self.gateway
                    .apply(&self.manifest_path, &detached, ApplyOptions::detached()),
            )
            .await?;
            report.detached = detached.clone();
            self.follow(&detached, sink).await?;
        }

        Ok(report)
    }

    /// パイプラインの全ステージを停止・削除する
    pub async fn teardown(&self, pipeline: &Pipeline) -> Result<()> {
        let stages = pipeline.stage_names();
        if stages.is_empty() {
            return Ok(());
        }
        tracing::info!(stages = ?stages, "tearing down stages");
        self.gateway.teardown(&self.manifest_path, &stages).await
    }

    /// transient の起動失敗を分類する
    ///
    /// 依存先ステージの異常終了で compose が起動を中断した場合は
    /// `PipelineExecution` として扱う。
    async fn classify_apply_error(&self, error: ContainerError, stages: &[String]) -> ContainerError {
        if matches!(error, ContainerError::Cancelled) {
            return error;
        }
        match self
            .guarded(self.gateway.exit_status(&self.manifest_path, stages))
            .await
        {
            Ok(status) if status.has_failed_exit() => {
                let failed = status.failures();
                tracing::warn!(?failed, "transient stages failed during startup");
                ContainerError::PipelineExecution { failed }
            }
            Ok(_) => error,
            Err(ContainerError::Cancelled) => ContainerError::Cancelled,
            Err(status_error) => {
                tracing::debug!("failed to query exit status: {}", status_error);
                error
            }
        }
    }

    async fn follow(&self, stages: &[String], sink: &mut dyn LogSink) -> Result<()> {
        let mut logs = self
            .guarded(self.gateway.stream_logs(&self.manifest_path, stages))
            .await?;

        loop {
            let next = tokio::select! {
                item = logs.next() => item,
                _ = self.cancel.cancelled() => return Err(ContainerError::Cancelled),
            };
            match next {
                Some(Ok(line)) => sink.line(&line),
                Some(Err(e)) => return Err(e),
                None => return Ok(()),
            }
        }
    }

    async fn guarded<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.cancel.is_cancelled() {
            return Err(ContainerError::Cancelled);
        }
        tokio::select! {
            result = fut => result,
            _ = self.cancel.cancelled() => Err(ContainerError::Cancelled),
        }
    }
}
