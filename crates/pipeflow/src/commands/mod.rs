pub mod down;
pub mod render;
pub mod run;
pub mod validate;

use crate::loader::LoadedPipeline;
use pipeflow_container::ComposeCli;

/// 設定に従って compose ゲートウェイを生成する
pub fn compose_gateway(loaded: &LoadedPipeline) -> anyhow::Result<ComposeCli> {
    let mut cli = ComposeCli::from_command(loaded.runtime.compose_command.as_slice())?;
    if let Some(project) = &loaded.runtime.project_name {
        cli = cli.with_project_name(project);
    }
    Ok(cli)
}
