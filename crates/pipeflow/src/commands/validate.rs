use crate::loader;
use colored::Colorize;
use std::path::Path;

pub fn handle(file: Option<&Path>) -> anyhow::Result<()> {
    println!("{}", "パイプラインを検証中...".blue());

    match loader::load(file) {
        Ok(loaded) => {
            println!(
                "パイプラインファイル: {}",
                loaded.source.display().to_string().cyan()
            );
            println!("{}", "✓ パイプラインは正常です！".green().bold());
            println!();

            let partition = loaded.pipeline.partition();
            println!("サマリー:");
            println!("  完了まで実行: {}個", partition.transient.len());
            for stage in &partition.transient {
                println!(
                    "    - {} ({})",
                    stage.name().cyan(),
                    stage.image().unwrap_or("(未設定)")
                );
            }
            println!("  常駐: {}個", partition.detached.len());
            for stage in &partition.detached {
                let ports = stage
                    .ports()
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                println!(
                    "    - {} ({}) {}",
                    stage.name().cyan(),
                    stage.image().unwrap_or("(未設定)"),
                    ports
                );
            }
            println!(
                "  マニフェスト: {}",
                loaded.manifest_path.display().to_string().cyan()
            );
        }
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ 設定エラー".red().bold());
            eprintln!("  {:#}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}
