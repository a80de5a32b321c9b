//! パイプラインビルダー
//!
//! ステージを追加順に蓄積し、ビルダー全体のデフォルト値の適用、
//! 直列の依存関係の推論、コマンド合成を行う。

use crate::command::{CommandSpec, DEFAULT_SHELL, synthesize};
use crate::contract::{CODE_DIR, IoContract, REQUIREMENTS_PATH, SOURCE_CODE_ENV, source_code_volume};
use crate::error::{ConfigurationError, Result};
use crate::manifest;
use crate::model::{
    DependencyCondition, DependencyEdge, Environment, HealthCheck, Pipeline, Port, RestartPolicy, Stage, Volume,
    absolute_path,
};
use std::path::{Path, PathBuf};

pub const PREPROCESSING_STAGE: &str = "preprocessing";
pub const TRAINING_STAGE: &str = "training";
pub const SERVING_STAGE: &str = "serving";

/// サービングステージで公開するデフォルトポート
pub const DEFAULT_SERVING_PORT: u16 = 8080;

/// ビルダー全体のデフォルト値
///
/// ステージ追加時のフォールバックとしてのみ使われ、追加済みのステージには影響しない。
#[derive(Debug, Clone)]
pub struct PipelineDefaults {
    pub image: Option<String>,
    pub platform: Option<String>,
    pub runtime: Option<String>,
    pub source_code_dir: Option<PathBuf>,
    /// 依存関係マニフェスト（requirements.txt）のホスト側パス
    pub dependency_manifest: Option<PathBuf>,
    pub environment: Environment,
    pub shell: String,
}

impl Default for PipelineDefaults {
    fn default() -> Self {
        Self {
            image: None,
            platform: None,
            runtime: None,
            source_code_dir: None,
            dependency_manifest: None,
            environment: Environment::new(),
            shell: DEFAULT_SHELL.to_string(),
        }
    }
}

impl PipelineDefaults {
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn with_source_code_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.source_code_dir = Some(dir.into());
        self
    }

    pub fn with_dependency_manifest(mut self, path: impl Into<PathBuf>) -> Self {
        self.dependency_manifest = Some(path.into());
        self
    }
}

/// ステージ追加時の個別指定
#[derive(Debug, Clone, Default)]
pub struct StageSpec {
    pub image: Option<String>,
    pub platform: Option<String>,
    pub runtime: Option<String>,
    pub build: Option<String>,
    pub ports: Vec<Port>,
    pub volumes: Vec<Volume>,
    /// 未指定時、ソースコードディレクトリがあれば `/opt/ml/code`
    pub working_dir: Option<String>,
    /// 未指定時はビルダーのデフォルト
    pub environment: Option<Environment>,
    pub entrypoint: Option<String>,
    pub command: Option<String>,
    pub arguments: Vec<String>,
    pub networks: Vec<String>,
    /// 未指定時は直前のステージへの正常終了依存を推論する
    pub depends_on: Option<Vec<DependencyEdge>>,
    pub restart: Option<RestartPolicy>,
    pub healthcheck: Option<HealthCheck>,
    pub source_code_dir: Option<PathBuf>,
    pub dependency_manifest: Option<PathBuf>,
    pub io: Option<IoContract>,
    pub detached: bool,
}

impl StageSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn entrypoint(mut self, entrypoint: impl Into<String>) -> Self {
        self.entrypoint = Some(entrypoint.into());
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.arguments.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn port(mut self, port: Port) -> Self {
        self.ports.push(port);
        self
    }

    pub fn volume(mut self, volume: Volume) -> Self {
        self.volumes.push(volume);
        self
    }

    pub fn working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn environment(mut self, env: Environment) -> Self {
        self.environment = Some(env);
        self
    }

    pub fn network(mut self, network: impl Into<String>) -> Self {
        self.networks.push(network.into());
        self
    }

    pub fn depends_on(mut self, edges: Vec<DependencyEdge>) -> Self {
        self.depends_on = Some(edges);
        self
    }

    pub fn restart(mut self, policy: RestartPolicy) -> Self {
        self.restart = Some(policy);
        self
    }

    pub fn healthcheck(mut self, healthcheck: HealthCheck) -> Self {
        self.healthcheck = Some(healthcheck);
        self
    }

    pub fn source_code_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.source_code_dir = Some(dir.into());
        self
    }

    pub fn dependency_manifest(mut self, path: impl Into<PathBuf>) -> Self {
        self.dependency_manifest = Some(path.into());
        self
    }

    pub fn io(mut self, io: IoContract) -> Self {
        self.io = Some(io);
        self
    }

    pub fn detached(mut self, detached: bool) -> Self {
        self.detached = detached;
        self
    }
}

/// 名前付きプリセット
///
/// ステージの種類ではなく、パラメータの既定値の組み合わせ。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagePreset {
    Preprocessing,
    Training,
    Serving,
}

impl StagePreset {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "preprocessing" | "preprocess" => Some(Self::Preprocessing),
            "training" | "train" => Some(Self::Training),
            "serving" | "serve" => Some(Self::Serving),
            _ => None,
        }
    }

    /// プリセットが固定するステージ名
    pub fn stage_name(&self) -> &'static str {
        match self {
            Self::Preprocessing => PREPROCESSING_STAGE,
            Self::Training => TRAINING_STAGE,
            Self::Serving => SERVING_STAGE,
        }
    }

    /// 既定値を適用する
    pub fn apply(&self, mut spec: StageSpec) -> StageSpec {
        if *self == Self::Serving {
            if spec.ports.is_empty() {
                spec.ports
                    .push(Port::new(DEFAULT_SERVING_PORT, DEFAULT_SERVING_PORT));
            }
            spec.detached = true;
        }
        spec
    }
}

/// ステージを蓄積するビルダー
#[derive(Debug, Clone, Default)]
pub struct PipelineBuilder {
    defaults: PipelineDefaults,
    stages: Vec<Stage>,
}

impl PipelineBuilder {
    pub fn new(defaults: PipelineDefaults) -> Self {
        Self {
            defaults,
            stages: Vec::new(),
        }
    }

    pub fn defaults(&self) -> &PipelineDefaults {
        &self.defaults
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// ステージを追加する
    ///
    /// 失敗した場合、ビルダーの状態は変化しない。
    pub fn add_stage(&mut self, name: impl Into<String>, spec: StageSpec) -> Result<&Stage> {
        let name = name.into();
        validate_stage_name(&name)?;
        if self.stages.iter().any(|s| s.name == name) {
            return Err(ConfigurationError::DuplicateStage(name));
        }

        let depends_on = self.resolve_dependencies(&name, spec.detached, spec.depends_on)?;

        let image = spec.image.or_else(|| self.defaults.image.clone());
        let platform = spec.platform.or_else(|| self.defaults.platform.clone());
        let runtime = spec.runtime.or_else(|| self.defaults.runtime.clone());
        let mut environment = spec
            .environment
            .unwrap_or_else(|| self.defaults.environment.clone());

        let mut volumes = spec
            .volumes
            .iter()
            .map(Volume::resolve)
            .collect::<Result<Vec<_>>>()?;
        let mut working_dir = spec.working_dir;

        let source_code_dir = spec
            .source_code_dir
            .as_deref()
            .or(self.defaults.source_code_dir.as_deref());
        if let Some(dir) = source_code_dir {
            volumes.push(source_code_volume(dir)?);
            if working_dir.is_none() {
                working_dir = Some(CODE_DIR.to_string());
            }
            if !environment.contains_key(SOURCE_CODE_ENV) {
                environment.insert(SOURCE_CODE_ENV, CODE_DIR)?;
            }
        }

        let dependency_manifest = spec
            .dependency_manifest
            .as_deref()
            .or(self.defaults.dependency_manifest.as_deref());
        if let Some(path) = dependency_manifest {
            volumes.push(Volume::bind(absolute_path(path)?, REQUIREMENTS_PATH).read_only());
        }

        if let Some(io) = &spec.io {
            volumes.extend(io.volumes()?);
            environment.extend(io.environment()?)?;
        }

        let manifest_display = dependency_manifest.map(path_display);
        let resolved = synthesize(&CommandSpec {
            entrypoint: spec.entrypoint.as_deref(),
            command: spec.command.as_deref(),
            arguments: &spec.arguments,
            dependency_manifest: manifest_display.as_deref(),
            shell: &self.defaults.shell,
        })?;

        let stage = Stage {
            name,
            image,
            platform,
            runtime,
            build: spec.build,
            ports: spec.ports,
            volumes,
            working_dir,
            environment,
            entrypoint: resolved.entrypoint,
            command: resolved.command,
            networks: spec.networks,
            depends_on,
            restart: spec.restart,
            healthcheck: spec.healthcheck,
            detached: spec.detached,
            io: spec.io,
        };

        let targets: Vec<&str> = stage.depends_on.iter().map(|d| d.target.as_str()).collect();
        tracing::debug!(
            stage = %stage.name,
            detached = stage.detached,
            depends_on = ?targets,
            "ステージを追加"
        );

        let index = self.stages.len();
        self.stages.push(stage);
        Ok(&self.stages[index])
    }

    /// プリセットを適用してステージを追加する
    pub fn add_preset_stage(&mut self, preset: StagePreset, spec: StageSpec) -> Result<&Stage> {
        self.add_stage(preset.stage_name(), preset.apply(spec))
    }

    /// 前処理ステージ（"preprocessing"）を追加
    pub fn add_preprocessing_stage(&mut self, spec: StageSpec) -> Result<&Stage> {
        self.add_preset_stage(StagePreset::Preprocessing, spec)
    }

    /// 学習ステージ（"training"）を追加
    pub fn add_training_stage(&mut self, spec: StageSpec) -> Result<&Stage> {
        self.add_preset_stage(StagePreset::Training, spec)
    }

    /// サービングステージ（"serving"）を追加
    ///
    /// ポート未指定なら 8080:8080 を公開し、常駐ステージとして扱う。
    pub fn add_serving_stage(&mut self, spec: StageSpec) -> Result<&Stage> {
        self.add_preset_stage(StagePreset::Serving, spec)
    }

    /// 現在のステージ列からマニフェストを生成
    pub fn manifest(&self) -> Result<String> {
        manifest::serialize(&self.stages)
    }

    pub fn build(self) -> Pipeline {
        Pipeline::new(self.stages)
    }

    /// 依存関係を決定する
    ///
    /// 完了型ステージは常駐ステージに依存できない。暗黙の依存は、完了型ステージなら
    /// 直前の完了型ステージ、常駐ステージなら直前のステージ（常駐なら起動済み条件）になる。
    fn resolve_dependencies(
        &self,
        stage: &str,
        detached: bool,
        explicit: Option<Vec<DependencyEdge>>,
    ) -> Result<Vec<DependencyEdge>> {
        match explicit {
            Some(edges) => {
                for edge in &edges {
                    let Some(target) = self.stages.iter().find(|s| s.name == edge.target) else {
                        return Err(ConfigurationError::UnknownDependency {
                            stage: stage.to_string(),
                            target: edge.target.clone(),
                        });
                    };
                    if !detached && target.detached {
                        return Err(ConfigurationError::DetachedDependency {
                            stage: stage.to_string(),
                            target: edge.target.clone(),
                        });
                    }
                }
                Ok(edges)
            }
            None if detached => Ok(self
                .stages
                .last()
                .map(|previous| {
                    if previous.detached {
                        vec![DependencyEdge::new(
                            previous.name.clone(),
                            DependencyCondition::Started,
                        )]
                    } else {
                        vec![DependencyEdge::completed(previous.name.clone())]
                    }
                })
                .unwrap_or_default()),
            None => Ok(self
                .stages
                .iter()
                .rev()
                .find(|s| s.is_transient())
                .map(|previous| vec![DependencyEdge::completed(previous.name.clone())])
                .unwrap_or_default()),
        }
    }
}

fn validate_stage_name(name: &str) -> Result<()> {
    let valid = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidStageName(name.to_string()))
    }
}

fn path_display(path: &Path) -> String {
    path.display().to_string()
}
