use crate::loader::LoadedPipeline;
use colored::Colorize;
use std::path::Path;

pub fn handle(loaded: &LoadedPipeline, output: Option<&Path>) -> anyhow::Result<()> {
    let manifest = pipeflow_core::serialize(loaded.pipeline.stages())?;

    match output {
        Some(path) => {
            std::fs::write(path, &manifest)?;
            eprintln!(
                "{} {}",
                "✓ マニフェストを書き出しました:".green(),
                path.display().to_string().cyan()
            );
        }
        None => print!("{}", manifest),
    }
    Ok(())
}
