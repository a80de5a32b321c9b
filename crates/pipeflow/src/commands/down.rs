use crate::loader::LoadedPipeline;
use colored::Colorize;
use pipeflow_container::PipelineRunner;

pub async fn handle(loaded: &LoadedPipeline) -> anyhow::Result<()> {
    println!("{}", "パイプラインを停止中...".yellow());

    let stages = loaded.pipeline.stage_names();
    println!();
    println!("{}", format!("ステージ一覧 ({} 個):", stages.len()).bold());
    for name in &stages {
        println!("  • {}", name.cyan());
    }

    let runner = PipelineRunner::new(super::compose_gateway(loaded)?, &loaded.manifest_path);
    // rm はマニフェストを参照するため書き出してから実行する
    runner.write_manifest(&loaded.pipeline).await?;
    runner.teardown(&loaded.pipeline).await?;

    println!();
    println!("{}", "✓ 停止・削除しました".green());
    Ok(())
}
