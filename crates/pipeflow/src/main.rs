mod commands;
mod loader;
mod logs;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pipeflow")]
#[command(about = "ML パイプラインをコンテナで組み立て、前処理から学習、サービングまで実行する", long_about = None)]
struct Cli {
    /// パイプラインファイル（省略時は自動検出）
    #[arg(short, long, global = true)]
    file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// パイプラインを実行（完了型ステージの成功後に常駐ステージを起動）
    Run {
        /// Docker デーモンの疎通確認を省略する
        #[arg(long)]
        skip_daemon_check: bool,
        /// 中断時にコンテナを停止・削除する
        #[arg(long)]
        down_on_exit: bool,
    },
    /// compose マニフェストを出力
    Render {
        /// 出力先（省略時は標準出力）
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// パイプラインファイルを検証
    Validate,
    /// パイプラインのコンテナを停止・削除
    Down,
    /// バージョン情報を表示
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ログは stderr に出力（render の stdout を汚さない）
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let file = cli.file.as_deref();

    match cli.command {
        Commands::Version => {
            println!("pipeflow {}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Validate => {
            commands::validate::handle(file)?;
        }
        Commands::Render { output } => {
            let loaded = loader::load(file)?;
            commands::render::handle(&loaded, output.as_deref())?;
        }
        Commands::Run {
            skip_daemon_check,
            down_on_exit,
        } => {
            let loaded = loader::load(file)?;
            commands::run::handle(&loaded, skip_daemon_check, down_on_exit).await?;
        }
        Commands::Down => {
            let loaded = loader::load(file)?;
            commands::down::handle(&loaded).await?;
        }
    }

    Ok(())
}
