//! モデル定義
//!
//! パイプラインを構成するステージと、そのサブレコードを定義します。

mod dependency;
mod environment;
mod pipeline;
mod port;
mod stage;
mod volume;

// Re-exports
pub use dependency::*;
pub use environment::*;
pub use pipeline::*;
pub use port::*;
pub use stage::*;
pub use volume::*;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn stage(name: &str, detached: bool) -> Stage {
        Stage {
            name: name.to_string(),
            image: Some("python:3.12-slim".to_string()),
            platform: None,
            runtime: None,
            build: None,
            ports: vec![],
            volumes: vec![],
            working_dir: None,
            environment: Environment::new(),
            entrypoint: None,
            command: None,
            networks: vec![],
            depends_on: vec![],
            restart: None,
            healthcheck: None,
            detached,
            io: None,
        }
    }

    #[test]
    fn test_partition_preserves_order() {
        let pipeline = Pipeline::new(vec![
            stage("prep", false),
            stage("serve-a", true),
            stage("train", false),
            stage("serve-b", true),
            stage("evaluate", false),
        ]);

        let partition = pipeline.partition();
        assert_eq!(
            partition.transient_names(),
            vec!["prep", "train", "evaluate"]
        );
        assert_eq!(partition.detached_names(), vec!["serve-a", "serve-b"]);
    }

    #[test]
    fn test_partition_is_complete_and_disjoint() {
        let pipeline = Pipeline::new(vec![
            stage("a", true),
            stage("b", false),
            stage("c", true),
            stage("d", false),
        ]);

        let partition = pipeline.partition();
        let transient = partition.transient_names();
        let detached = partition.detached_names();

        assert_eq!(transient.len() + detached.len(), pipeline.len());
        assert!(transient.iter().all(|name| !detached.contains(name)));
        for name in pipeline.stage_names() {
            assert!(transient.contains(&name) || detached.contains(&name));
        }
    }

    #[test]
    fn test_partition_empty_pipeline() {
        let pipeline = Pipeline::default();
        let partition = pipeline.partition();
        assert!(partition.transient.is_empty());
        assert!(partition.detached.is_empty());
    }

    #[test]
    fn test_restart_policy_parse() {
        assert_eq!(RestartPolicy::parse("on_failure"), Some(RestartPolicy::OnFailure));
        assert_eq!(
            RestartPolicy::parse("unless-stopped").map(|p| p.as_compose_str()),
            Some("unless-stopped")
        );
        assert_eq!(RestartPolicy::parse("sometimes"), None);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1500ms");
    }

    #[test]
    fn test_format_duration_keeps_sub_millisecond_precision() {
        assert_eq!(format_duration(Duration::from_micros(1500)), "1500us");
        assert_eq!(format_duration(Duration::from_micros(250)), "250us");
        assert_eq!(
            format_duration(Duration::from_secs(1) + Duration::from_nanos(500)),
            "1000000500ns"
        );
        assert_eq!(format_duration(Duration::from_secs(2) + Duration::from_nanos(1)), "2000000001ns");
    }

    #[test]
    fn test_stage_accessors() {
        let stage = stage("serve", true);
        assert_eq!(stage.name(), "serve");
        assert_eq!(stage.image(), Some("python:3.12-slim"));
        assert!(stage.is_detached());
        assert!(!stage.is_transient());
        assert!(stage.depends_on().is_empty());
        assert!(stage.prepare_outputs().is_ok());
    }
}
