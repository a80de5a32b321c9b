//! compose 実行ファイルをシェルスクリプトで置き換えた ComposeCli のテスト
#![cfg(unix)]

use futures_util::StreamExt;
use pipeflow_container::{
    ApplyOptions, ComposeCli, ContainerError, ContainerGateway, LogLine, PipelineRunner,
    StageState,
};
use pipeflow_core::{PipelineBuilder, PipelineDefaults, StageSpec};
use std::path::{Path, PathBuf};
use std::time::Duration;

const FAKE_COMPOSE: &str = r#"
log="$(dirname "$0")/calls.log"
echo "$@" >> "$log"
case " $* " in
  *" ps "*)
    echo '{"Service":"preprocessing","State":"exited","ExitCode":0}'
    echo '{"Service":"training","State":"exited","ExitCode":1}'
    ;;
  *" logs "*)
    echo 'preprocessing-1  | loading data'
    echo 'training-1  | epoch 1'
    ;;
  *" up "*)
    case " $* " in *" broken "*) echo "no such service: broken" >&2; exit 1;; esac
    ;;
esac
"#;

fn fake_compose(dir: &Path) -> (ComposeCli, PathBuf) {
    let script = dir.join("compose.sh");
    std::fs::write(&script, FAKE_COMPOSE).unwrap();
    let cli = ComposeCli::new("/bin/sh").with_base_args([script.display().to_string()]);
    (cli, dir.join("calls.log"))
}

/// 起動に時間がかかり、完了すると印を残す compose
const SLOW_UP_COMPOSE: &str = r#"
case " $* " in
  *" up "*)
    sleep 1
    touch "$(dirname "$0")/up.done"
    ;;
esac
"#;

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_compose_cli_round_trip() {
    let temp = tempfile::tempdir().unwrap();
    let (cli, calls_log) = fake_compose(temp.path());
    let manifest = temp.path().join("docker-compose.yml");
    let transient = names(&["preprocessing", "training"]);

    cli.apply(&manifest, &transient, ApplyOptions::attached())
        .await
        .unwrap();

    let lines: Vec<_> = cli
        .stream_logs(&manifest, &transient)
        .await
        .unwrap()
        .collect()
        .await;
    assert_eq!(lines.len(), 2);
    let first = lines[0].as_ref().unwrap();
    assert_eq!(first.stage.as_deref(), Some("preprocessing"));
    assert_eq!(first.text, "loading data");

    let status = cli.exit_status(&manifest, &transient).await.unwrap();
    assert_eq!(status.stages[1].state, StageState::Exited(1));
    assert!(!status.is_success());

    cli.teardown(&manifest, &transient).await.unwrap();

    let calls = std::fs::read_to_string(calls_log).unwrap();
    let calls: Vec<&str> = calls.lines().collect();
    let m = manifest.display().to_string();
    assert_eq!(
        calls,
        vec![
            format!("-f {m} up --detach --build preprocessing training"),
            format!("-f {m} logs --follow --no-color preprocessing training"),
            format!("-f {m} ps --all --format json preprocessing training"),
            format!("-f {m} rm --stop --force preprocessing training"),
        ]
    );
}

#[tokio::test]
async fn test_compose_cli_non_zero_exit() {
    let temp = tempfile::tempdir().unwrap();
    let (cli, _) = fake_compose(temp.path());
    let manifest = temp.path().join("docker-compose.yml");

    let err = cli
        .apply(&manifest, &names(&["broken"]), ApplyOptions::detached())
        .await
        .unwrap_err();

    match err {
        ContainerError::RuntimeInvocation(message) => {
            assert!(message.contains("no such service: broken"))
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_compose_cli_missing_program() {
    let temp = tempfile::tempdir().unwrap();
    let cli = ComposeCli::new(temp.path().join("does-not-exist"));
    let err = cli
        .teardown(&temp.path().join("docker-compose.yml"), &names(&["x"]))
        .await
        .unwrap_err();
    assert!(matches!(err, ContainerError::RuntimeInvocation(_)));
}

#[tokio::test]
async fn test_cancel_kills_running_compose_process() {
    let temp = tempfile::tempdir().unwrap();
    let script = temp.path().join("compose.sh");
    std::fs::write(&script, SLOW_UP_COMPOSE).unwrap();
    let cli = ComposeCli::new("/bin/sh").with_base_args([script.display().to_string()]);

    let mut builder =
        PipelineBuilder::new(PipelineDefaults::default().with_image("python:3.12-slim"));
    builder
        .add_training_stage(StageSpec::new().command("python train.py"))
        .unwrap();
    let pipeline = builder.build();

    let runner = PipelineRunner::new(cli, temp.path().join("docker-compose.yml"));
    let token = runner.cancel_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
    });

    let mut sink = |_: &LogLine| {};
    let err = runner.run(&pipeline, &mut sink).await.unwrap_err();
    assert!(matches!(err, ContainerError::Cancelled));

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(!temp.path().join("up.done").exists());
}
