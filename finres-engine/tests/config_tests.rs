//! Engine configuration loaded from disk
//!
//! Tests that touch FINRES_CONFIG or the reasoning key variable are #[serial].

mod helpers;

use finres_common::config::{ConfigPathResolver, CONFIG_ENV_VAR};
use finres_engine::adjudication::HttpReasoningClient;
use finres_engine::config::EngineConfig;
use finres_engine::types::{MetricId, ResolutionMethod, SectionType};
use finres_engine::{ResolutionContext, ResolveError, ResolutionOrchestrator};
use helpers::cell;
use serial_test::serial;
use std::env;
use std::sync::Arc;

const SAMPLE: &str = r#"
[logging]
level = "debug"

[[labels]]
pattern = "Group income"
metric = "REVENUE"

[validation]
closure_tolerance = 0.01

[adjudication]
endpoint = "http://127.0.0.1:9/adjudicate"
api_key_env = "FINRES_TEST_REASONING_KEY"
timeout_ms = 2500

[pipeline]
workers = 2

[defaults]
currency = "GBP"
scale = "thousands"
"#;

fn write_sample(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("engine.toml");
    std::fs::write(&path, SAMPLE).unwrap();
    path
}

#[test]
fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_sample(&dir);

    let config = EngineConfig::load(Some(&path)).unwrap();

    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.validation.closure_tolerance, 0.01);
    // Untouched keys keep their defaults
    assert_eq!(config.validation.unit_tolerance, 0.01);
    assert_eq!(config.adjudication.timeout_ms, 2500);
    assert_eq!(config.adjudication.max_concurrent, 4);
    assert_eq!(config.pipeline.workers, 2);
    assert_eq!(config.defaults.scale.as_deref(), Some("thousands"));
    assert!(!config.metrics.is_empty());
}

#[test]
fn test_missing_file_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    assert!(matches!(
        EngineConfig::load(Some(&path)),
        Err(ResolveError::Config(_))
    ));
}

#[test]
fn test_malformed_file_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[validation\nunit_tolerance = ").unwrap();

    assert!(matches!(
        EngineConfig::load(Some(&path)),
        Err(ResolveError::Config(_))
    ));
}

#[test]
#[serial]
fn test_env_var_selects_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_sample(&dir);
    env::set_var(CONFIG_ENV_VAR, &path);

    let resolved = ConfigPathResolver::new()
        .with_local_dir(dir.path().join("nowhere"))
        .resolve(None);
    env::remove_var(CONFIG_ENV_VAR);

    let config = EngineConfig::load(resolved.as_deref()).unwrap();
    assert_eq!(config.pipeline.workers, 2);
}

#[test]
#[serial]
fn test_reasoning_client_built_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfig::load(Some(&write_sample(&dir))).unwrap();
    env::set_var("FINRES_TEST_REASONING_KEY", "secret");

    let client = HttpReasoningClient::from_config(&config.adjudication).unwrap();
    env::remove_var("FINRES_TEST_REASONING_KEY");

    let client = client.expect("endpoint is configured");
    assert_eq!(client.endpoint(), "http://127.0.0.1:9/adjudicate");
}

#[test]
fn test_no_endpoint_means_no_client() {
    let config = EngineConfig::default();
    assert!(HttpReasoningClient::from_config(&config.adjudication)
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_configured_label_and_scale_drive_resolution() {
    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfig::load(Some(&write_sample(&dir))).unwrap();
    let ctx = Arc::new(ResolutionContext::from_config(&config).unwrap());
    let orch = ResolutionOrchestrator::new(ctx, None);

    // Column carries the period only; unit comes from the configured defaults
    let fragments = vec![cell(
        "is-1",
        SectionType::IncomeStatement,
        3,
        "Group income",
        "2023",
        "2,500",
    )];

    let resolutions = orch.resolve_document(fragments).await.unwrap();

    assert_eq!(resolutions.len(), 1);
    assert_eq!(resolutions[0].metric, MetricId::Revenue);
    assert_eq!(resolutions[0].method, ResolutionMethod::AutoUnique);
    assert_eq!(
        resolutions[0].value,
        Some(rust_decimal::Decimal::new(2_500_000, 0))
    );
}
