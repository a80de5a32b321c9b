use crate::loader::LoadedPipeline;
use crate::logs::StagePrinter;
use colored::Colorize;
use pipeflow_container::{ContainerError, PipelineRunner};

pub async fn handle(
    loaded: &LoadedPipeline,
    skip_daemon_check: bool,
    down_on_exit: bool,
) -> anyhow::Result<()> {
    println!("{}", "パイプラインを実行中...".blue());
    println!(
        "パイプラインファイル: {}",
        loaded.source.display().to_string().cyan()
    );

    if loaded.pipeline.is_empty() {
        println!("{}", "ステージが定義されていません".yellow());
        return Ok(());
    }

    if loaded.runtime.check_daemon && !skip_daemon_check {
        println!("{}", "Dockerに接続中...".blue());
        pipeflow_container::check_daemon().await?;
    }

    let runner = PipelineRunner::new(super::compose_gateway(loaded)?, &loaded.manifest_path);

    let token = runner.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    let mut printer = StagePrinter::new(&loaded.pipeline.stage_names());
    match runner.run(&loaded.pipeline, &mut printer).await {
        Ok(report) => {
            println!();
            if !report.transient.is_empty() {
                println!(
                    "{} {}",
                    "✓ 完了:".green().bold(),
                    report.transient.join(", ")
                );
            }
            if !report.detached.is_empty() {
                println!(
                    "{} {}",
                    "■ 常駐ステージのログが終了しました:".yellow(),
                    report.detached.join(", ")
                );
            }
            Ok(())
        }
        Err(ContainerError::Cancelled) => {
            println!();
            println!("{}", "中断しました".yellow());
            if down_on_exit {
                println!("{}", "コンテナを停止・削除中...".yellow());
                runner.teardown(&loaded.pipeline).await?;
            }
            Ok(())
        }
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ パイプラインが失敗しました".red().bold());
            Err(e.into())
        }
    }
}
