//! パイプラインファイルからパイプラインを組み立てる

use anyhow::{Context, anyhow, bail};
use pipeflow_config::{PipelineFile, PresetConfig, RuntimeConfig, StageConfig};
use pipeflow_core::{
    DataChannel, DependencyCondition, DependencyEdge, Environment, HealthCheck, IoContract,
    Pipeline, PipelineBuilder, PipelineDefaults, Port, RestartPolicy, StagePreset, StageSpec,
    Volume,
};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 読み込み済みのパイプライン
#[derive(Debug)]
pub struct LoadedPipeline {
    /// 読み込んだパイプラインファイル
    pub source: PathBuf,
    pub pipeline: Pipeline,
    pub runtime: RuntimeConfig,
    /// compose マニフェストの書き出し先
    pub manifest_path: PathBuf,
}

pub fn load(explicit: Option<&Path>) -> anyhow::Result<LoadedPipeline> {
    let (source, file) = pipeflow_config::load_pipeline_file(explicit)?;
    let base_dir = base_dir_of(&source);
    tracing::debug!("pipeline file: {}", source.display());

    let pipeline = build_pipeline(&file, &base_dir)
        .with_context(|| format!("パイプラインの構成に失敗しました: {}", source.display()))?;
    let manifest_path = resolve_path(&base_dir, &file.runtime.manifest_path);

    Ok(LoadedPipeline {
        source,
        pipeline,
        runtime: file.runtime,
        manifest_path,
    })
}

/// 相対パスの基準ディレクトリ（パイプラインファイルのあるディレクトリ）
fn base_dir_of(source: &Path) -> PathBuf {
    match source.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn resolve_path(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// パイプラインファイルをビルダーに適用する
pub fn build_pipeline(file: &PipelineFile, base_dir: &Path) -> anyhow::Result<Pipeline> {
    let mut builder = PipelineBuilder::new(build_defaults(file, base_dir)?);

    for (index, stage) in file.stages.iter().enumerate() {
        let preset = stage.preset.map(to_preset);
        let name = stage
            .name
            .clone()
            .or_else(|| preset.map(|p| p.stage_name().to_string()))
            .ok_or_else(|| {
                anyhow!(
                    "{}番目のステージに name または preset を指定してください",
                    index + 1
                )
            })?;

        let mut spec = build_spec(stage, base_dir)
            .with_context(|| format!("ステージ '{}' の定義が不正です", name))?;
        if let Some(preset) = preset {
            spec = preset.apply(spec);
        }
        if let Some(detached) = stage.detached {
            spec.detached = detached;
        }

        builder.add_stage(name, spec)?;
    }

    Ok(builder.build())
}

fn build_defaults(file: &PipelineFile, base_dir: &Path) -> anyhow::Result<PipelineDefaults> {
    let config = &file.defaults;
    let mut defaults = PipelineDefaults {
        image: config.image.clone(),
        platform: config.platform.clone(),
        runtime: config.runtime.clone(),
        source_code_dir: config
            .source_code_dir
            .as_deref()
            .map(|p| resolve_path(base_dir, p)),
        dependency_manifest: config
            .dependency_manifest
            .as_deref()
            .map(|p| resolve_path(base_dir, p)),
        environment: Environment::parse(&config.environment)?,
        ..Default::default()
    };
    if let Some(shell) = &config.shell {
        defaults.shell = shell.clone();
    }
    Ok(defaults)
}

fn build_spec(config: &StageConfig, base_dir: &Path) -> anyhow::Result<StageSpec> {
    let mut spec = StageSpec::new().args(config.arguments.iter().cloned());
    spec.image = config.image.clone();
    spec.platform = config.platform.clone();
    spec.runtime = config.runtime.clone();
    spec.entrypoint = config.entrypoint.clone();
    spec.command = config.command.clone();
    spec.working_dir = config.working_dir.clone();
    spec.networks = config.networks.clone();

    for port in &config.ports {
        spec.ports.push(Port::parse(port)?);
    }
    for volume in &config.volumes {
        let mut volume = Volume::parse(volume)?;
        volume.host = resolve_path(base_dir, &volume.host);
        spec.volumes.push(volume);
    }
    if !config.environment.is_empty() {
        spec.environment = Some(Environment::parse(&config.environment)?);
    }

    if let Some(deps) = &config.depends_on {
        let edges = deps
            .iter()
            .map(|dep| {
                let condition = match dep.condition() {
                    Some(c) => DependencyCondition::parse(c)
                        .ok_or_else(|| anyhow!("不明な依存条件: '{}'", c))?,
                    None => DependencyCondition::default(),
                };
                Ok(DependencyEdge::new(dep.stage(), condition))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        spec.depends_on = Some(edges);
    }

    if let Some(restart) = &config.restart {
        spec.restart = Some(
            RestartPolicy::parse(restart)
                .ok_or_else(|| anyhow!("不明な再起動ポリシー: '{}'", restart))?,
        );
    }

    if let Some(hc) = &config.healthcheck {
        let fallback = HealthCheck::default();
        let interval = match &hc.interval {
            Some(s) => parse_duration(s)?,
            None => fallback.interval,
        };
        let timeout = match &hc.timeout {
            Some(s) => parse_duration(s)?,
            None => fallback.timeout,
        };
        spec.healthcheck = Some(HealthCheck::new(
            hc.test.clone(),
            interval,
            timeout,
            hc.retries.unwrap_or(fallback.retries),
        ));
    }

    spec.source_code_dir = config
        .source_code_dir
        .as_deref()
        .map(|p| resolve_path(base_dir, p));
    spec.dependency_manifest = config
        .dependency_manifest
        .as_deref()
        .map(|p| resolve_path(base_dir, p));

    if config.output_dir.is_some() || !config.inputs.is_empty() {
        let mut io = match &config.output_dir {
            Some(dir) => IoContract::new(resolve_path(base_dir, dir)),
            None => IoContract::inputs_only(),
        };
        for input in &config.inputs {
            let source = if input.source.starts_with("s3://") {
                input.source.clone()
            } else {
                resolve_path(base_dir, Path::new(&input.source))
                    .display()
                    .to_string()
            };
            io = io.with_channel(DataChannel::new(&input.name, source)?);
        }
        spec.io = Some(io);
    }

    Ok(spec)
}

fn to_preset(preset: PresetConfig) -> StagePreset {
    match preset {
        PresetConfig::Preprocessing => StagePreset::Preprocessing,
        PresetConfig::Training => StagePreset::Training,
        PresetConfig::Serving => StagePreset::Serving,
    }
}

/// `30s`, `1500ms`, `2m`, `1h`、単位なしは秒
pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (value, unit) = s.split_at(split);
    if value.is_empty() {
        bail!("無効な時間指定: '{}'（例: 30s, 1500ms）", s);
    }
    let value: u64 = value
        .parse()
        .with_context(|| format!("無効な時間指定: '{}'", s))?;

    let duration = match unit {
        "" | "s" => Duration::from_secs(value),
        "ms" => Duration::from_millis(value),
        "m" | "h" => {
            let scale = if unit == "m" { 60 } else { 3600 };
            let secs = value
                .checked_mul(scale)
                .ok_or_else(|| anyhow!("時間指定が大きすぎます: '{}'", s))?;
            Duration::from_secs(secs)
        }
        _ => bail!("無効な時間の単位: '{}'（ms, s, m, h が使えます）", unit),
    };
    Ok(duration)
}
