pub mod error;
pub mod file;

pub use error::*;
pub use file::*;

use std::path::{Path, PathBuf};

pub const CONFIG_PATH_ENV: &str = "PIPEFLOW_CONFIG_PATH";

const CANDIDATES: [&str; 2] = ["pipeline.local.yaml", "pipeline.yaml"];

/// グローバル設定のパイプラインファイル（~/.config/pipeflow/pipeline.yaml）
pub fn global_pipeline_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("pipeflow").join("pipeline.yaml"))
}

/// プロジェクトのパイプラインファイルを探す
///
/// 以下の優先順位で検索:
/// 1. 環境変数 PIPEFLOW_CONFIG_PATH (直接パス指定)
/// 2. カレントディレクトリ: pipeline.local.yaml, pipeline.yaml
/// 3. ./.pipeflow/ ディレクトリ内: 同様の順序
/// 4. ~/.config/pipeflow/pipeline.yaml (グローバル設定)
pub fn find_pipeline_file() -> Result<PathBuf> {
    // 1. 環境変数で直接指定
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
    }

    let current_dir = std::env::current_dir()?;

    // 2. カレントディレクトリ
    if let Some(path) = find_in(&current_dir) {
        return Ok(path);
    }

    // 3. ./.pipeflow/
    let pipeflow_dir = current_dir.join(".pipeflow");
    if pipeflow_dir.is_dir()
        && let Some(path) = find_in(&pipeflow_dir)
    {
        return Ok(path);
    }

    // 4. グローバル設定
    if let Some(global) = global_pipeline_file()
        && global.exists()
    {
        return Ok(global);
    }

    Err(ConfigError::PipelineFileNotFound)
}

fn find_in(dir: &Path) -> Option<PathBuf> {
    CANDIDATES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.exists())
}

/// パイプラインファイルを探して読み込む
///
/// `explicit` が指定された場合は探索せずにそのパスを読む。
pub fn load_pipeline_file(explicit: Option<&Path>) -> Result<(PathBuf, PipelineFile)> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => find_pipeline_file()?,
    };
    let file = PipelineFile::load(&path)?;
    Ok((path, file))
}
