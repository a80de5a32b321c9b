//! docker compose CLI ゲートウェイ
//!
//! 設定された compose 実行ファイル（既定は `docker compose`）を起動し、
//! マニフェストのサブセットに対して up / logs / ps / rm を発行する。

use crate::error::{ContainerError, Result};
use crate::gateway::{
    ApplyOptions, ContainerGateway, LaunchMode, LogLine, LogStream, StageState, StageStatus,
    SubsetStatus,
};
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// compose 実行ファイルのラッパー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeCli {
    program: PathBuf,
    base_args: Vec<String>,
    project_name: Option<String>,
}

impl Default for ComposeCli {
    fn default() -> Self {
        Self::docker_compose()
    }
}

impl ComposeCli {
    /// 単体の実行ファイル（`docker-compose` など）
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            base_args: Vec::new(),
            project_name: None,
        }
    }

    /// `docker compose` プラグイン
    pub fn docker_compose() -> Self {
        Self::new("docker").with_base_args(["compose"])
    }

    /// `["docker", "compose"]` のようなトークン列から生成する
    pub fn from_command<S: AsRef<str>>(parts: &[S]) -> Result<Self> {
        let (program, rest) = parts.split_first().ok_or_else(|| {
            ContainerError::RuntimeInvocation("compose コマンドが空です".to_string())
        })?;
        Ok(Self::new(program.as_ref()).with_base_args(rest.iter().map(|s| s.as_ref())))
    }

    pub fn with_base_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_project_name(mut self, name: impl Into<String>) -> Self {
        self.project_name = Some(name.into());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// マニフェスト指定までを含む共通引数
    fn prefix_args(&self, manifest: &Path) -> Vec<String> {
        let mut args = self.base_args.clone();
        args.push("-f".to_string());
        args.push(manifest.display().to_string());
        if let Some(project) = &self.project_name {
            args.push("-p".to_string());
            args.push(project.clone());
        }
        args
    }

    fn command(&self, manifest: &Path, args: &[String]) -> Command {
        let mut full = self.prefix_args(manifest);
        full.extend(args.iter().cloned());

        tracing::debug!(
            "Running: {} {}",
            self.program.display(),
            full.join(" ")
        );

        let mut cmd = Command::new(&self.program);
        cmd.args(&full);
        cmd
    }

    /// コマンドを実行し stdout を返す
    async fn run_command(&self, manifest: &Path, args: &[String]) -> Result<String> {
        let mut cmd = self.command(manifest, args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        // 中断で future が破棄されたらプロセスも止める
        cmd.kill_on_drop(true);

        let output = cmd.output().await.map_err(|e| {
            ContainerError::RuntimeInvocation(format!("{}: {}", self.program.display(), e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ContainerError::RuntimeInvocation(format!(
                "{} ({})",
                stderr.trim(),
                output.status
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// `up` の引数
pub fn up_args(stages: &[String], options: ApplyOptions) -> Vec<String> {
    let mut args = vec!["up".to_string(), "--detach".to_string()];
    if options.build {
        args.push("--build".to_string());
    }
    if options.mode == LaunchMode::Detached {
        args.push("--no-deps".to_string());
        args.push("--wait".to_string());
    }
    args.extend(stages.iter().cloned());
    args
}

fn subcommand_args(head: &[&str], stages: &[String]) -> Vec<String> {
    head.iter()
        .map(|s| s.to_string())
        .chain(stages.iter().cloned())
        .collect()
}

/// `ps --format json` の1エントリ
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PsEntry {
    #[serde(rename = "Service")]
    pub service: String,
    #[serde(rename = "State")]
    pub state: String,
    #[serde(rename = "ExitCode", default)]
    pub exit_code: i64,
}

impl PsEntry {
    pub fn stage_state(&self) -> StageState {
        match self.state.as_str() {
            "exited" | "dead" => StageState::Exited(self.exit_code),
            "created" => StageState::NotStarted,
            _ => StageState::Running,
        }
    }
}

/// `ps --format json` の出力をパースする
///
/// compose のバージョンにより JSON 配列か NDJSON のいずれかが返る。
pub fn parse_ps_output(output: &str) -> Result<Vec<PsEntry>> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }
    trimmed
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(ContainerError::from))
        .collect()
}

/// 期待するステージ名の順に状態を組み立てる
///
/// 一覧に現れないステージは NotStarted、レプリカが複数ある場合は最も悪い状態を採用する。
pub fn collect_status(stages: &[String], entries: &[PsEntry]) -> SubsetStatus {
    let stages = stages
        .iter()
        .map(|stage| {
            let state = entries
                .iter()
                .filter(|e| &e.service == stage)
                .map(PsEntry::stage_state)
                .reduce(|worst, next| {
                    if worst == StageState::Exited(0) {
                        next
                    } else {
                        worst
                    }
                })
                .unwrap_or(StageState::NotStarted);
            StageStatus {
                stage: stage.clone(),
                state,
            }
        })
        .collect();
    SubsetStatus { stages }
}

/// `svc-1  | text` 形式のログ行をパースする
pub fn parse_log_line(raw: &str, stages: &[String]) -> LogLine {
    let Some((prefix, text)) = raw.split_once('|') else {
        return LogLine {
            stage: None,
            text: raw.to_string(),
        };
    };

    let prefix = prefix.trim();
    let text = text.strip_prefix(' ').unwrap_or(text).to_string();

    // レプリカ番号（`-1`）を除く
    let container = match prefix.rsplit_once('-') {
        Some((head, index)) if !index.is_empty() && index.chars().all(|c| c.is_ascii_digit()) => {
            head
        }
        _ => prefix,
    };

    let stage = stages
        .iter()
        .find(|s| s.as_str() == container || container.ends_with(&format!("-{}", s)))
        .cloned();

    match stage {
        Some(stage) => LogLine {
            stage: Some(stage),
            text,
        },
        None => LogLine {
            stage: None,
            text: raw.to_string(),
        },
    }
}

/// Docker デーモンの疎通を確認する
pub async fn check_daemon() -> Result<()> {
    let docker = bollard::Docker::connect_with_local_defaults()?;
    docker.ping().await?;
    tracing::debug!("Docker daemon is reachable");
    Ok(())
}

#[async_trait]
impl ContainerGateway for ComposeCli {
    async fn apply(
        &self,
        manifest: &Path,
        stages: &[String],
        options: ApplyOptions,
    ) -> Result<()> {
        let output = self
            .run_command(manifest, &up_args(stages, options))
            .await?;
        if !output.trim().is_empty() {
            tracing::debug!("{}", output.trim());
        }
        Ok(())
    }

    async fn stream_logs(&self, manifest: &Path, stages: &[String]) -> Result<LogStream> {
        let args = subcommand_args(&["logs", "--follow", "--no-color"], stages);
        let mut cmd = self.command(manifest, &args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::inherit());
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            ContainerError::RuntimeInvocation(format!("{}: {}", self.program.display(), e))
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            ContainerError::RuntimeInvocation("ログ出力を取得できません".to_string())
        })?;

        let lines = BufReader::new(stdout).lines();
        let stages = stages.to_vec();

        let stream = futures_util::stream::unfold(
            Some((lines, child, stages)),
            |state| async move {
                let (mut lines, mut child, stages) = state?;
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let parsed = parse_log_line(&line, &stages);
                        Some((Ok(parsed), Some((lines, child, stages))))
                    }
                    Ok(None) => {
                        if let Err(e) = child.wait().await {
                            tracing::warn!("compose logs の終了待ちに失敗しました: {}", e);
                        }
                        None
                    }
                    Err(e) => Some((Err(ContainerError::Io(e)), None)),
                }
            },
        );

        Ok(stream.boxed())
    }

    async fn exit_status(&self, manifest: &Path, stages: &[String]) -> Result<SubsetStatus> {
        let args = subcommand_args(&["ps", "--all", "--format", "json"], stages);
        let output = self.run_command(manifest, &args).await?;
        let entries = parse_ps_output(&output)?;
        Ok(collect_status(stages, &entries))
    }

    async fn teardown(&self, manifest: &Path, stages: &[String]) -> Result<()> {
        let args = subcommand_args(&["rm", "--stop", "--force"], stages);
        self.run_command(manifest, &args).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_up_args_attached() {
        let args = up_args(
            &names(&["preprocessing", "training"]),
            ApplyOptions::attached(),
        );
        assert_eq!(
            args,
            names(&["up", "--detach", "--build", "preprocessing", "training"])
        );
    }

    #[test]
    fn test_up_args_detached() {
        let args = up_args(&names(&["serving"]), ApplyOptions::detached());
        assert_eq!(
            args,
            names(&["up", "--detach", "--build", "--no-deps", "--wait", "serving"])
        );
    }

    #[test]
    fn test_up_args_without_build() {
        let options = ApplyOptions {
            build: false,
            mode: LaunchMode::Attached,
        };
        let args = up_args(&names(&["training"]), options);
        assert!(!args.contains(&"--build".to_string()));
    }

    #[test]
    fn test_prefix_args() {
        let cli = ComposeCli::docker_compose().with_project_name("mlp");
        let args = cli.prefix_args(Path::new("/tmp/docker-compose.yml"));
        assert_eq!(
            args,
            names(&["compose", "-f", "/tmp/docker-compose.yml", "-p", "mlp"])
        );
    }

    #[test]
    fn test_from_command() {
        let cli = ComposeCli::from_command(&["docker-compose"]).unwrap();
        assert_eq!(cli.program(), Path::new("docker-compose"));
        assert!(cli.base_args.is_empty());

        let cli = ComposeCli::from_command(&["podman", "compose"]).unwrap();
        assert_eq!(cli.base_args, names(&["compose"]));

        let empty: [&str; 0] = [];
        assert!(matches!(
            ComposeCli::from_command(&empty),
            Err(ContainerError::RuntimeInvocation(_))
        ));
    }

    #[test]
    fn test_parse_ps_array() {
        let output = r#"[
            {"Name":"p-training-1","Service":"training","State":"exited","ExitCode":1},
            {"Name":"p-preprocessing-1","Service":"preprocessing","State":"exited","ExitCode":0}
        ]"#;
        let entries = parse_ps_output(output).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].service, "training");
        assert_eq!(entries[0].stage_state(), StageState::Exited(1));
    }

    #[test]
    fn test_parse_ps_ndjson() {
        let output = concat!(
            r#"{"Service":"preprocessing","State":"exited","ExitCode":0}"#,
            "\n",
            r#"{"Service":"serving","State":"running","ExitCode":0}"#,
            "\n"
        );
        let entries = parse_ps_output(output).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].stage_state(), StageState::Running);
    }

    #[test]
    fn test_parse_ps_empty() {
        assert!(parse_ps_output("  \n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_ps_invalid_json() {
        assert!(matches!(
            parse_ps_output("not json"),
            Err(ContainerError::Json(_))
        ));
    }

    #[test]
    fn test_collect_status_missing_stage_is_not_started() {
        let entries = parse_ps_output(
            r#"[{"Service":"preprocessing","State":"exited","ExitCode":2}]"#,
        )
        .unwrap();
        let status = collect_status(&names(&["preprocessing", "training"]), &entries);

        assert_eq!(status.stages[0].state, StageState::Exited(2));
        assert_eq!(status.stages[1].state, StageState::NotStarted);
        assert!(!status.is_success());
    }

    #[test]
    fn test_collect_status_keeps_worst_replica() {
        let entries = parse_ps_output(concat!(
            r#"{"Service":"training","State":"exited","ExitCode":0}"#,
            "\n",
            r#"{"Service":"training","State":"exited","ExitCode":3}"#,
        ))
        .unwrap();
        let status = collect_status(&names(&["training"]), &entries);
        assert_eq!(status.stages[0].state, StageState::Exited(3));
    }

    #[test]
    fn test_parse_log_line() {
        let stages = names(&["preprocessing", "training"]);

        let line = parse_log_line("training-1  | epoch 1/10", &stages);
        assert_eq!(line, LogLine::new("training", "epoch 1/10"));

        let line = parse_log_line("myproj-preprocessing-1 | done", &stages);
        assert_eq!(line.stage.as_deref(), Some("preprocessing"));
        assert_eq!(line.text, "done");
    }

    #[test]
    fn test_parse_log_line_unknown_prefix() {
        let stages = names(&["training"]);

        let line = parse_log_line("plain output", &stages);
        assert_eq!(line.stage, None);
        assert_eq!(line.text, "plain output");

        let line = parse_log_line("other-1 | text", &stages);
        assert_eq!(line.stage, None);
        assert_eq!(line.text, "other-1 | text");
    }

    #[test]
    fn test_parse_log_line_keeps_pipes_in_text() {
        let stages = names(&["training"]);
        let line = parse_log_line("training-1  | a | b", &stages);
        assert_eq!(line.text, "a | b");
    }
}
