use clap::Parser;
use ecosim_app::{Cli, build_config, run};
use std::fs;

fn temp_config(name: &str, body: &str) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!("ecosim-{}-{name}.json", std::process::id()));
    fs::write(&path, body).expect("write config");
    path
}

#[test]
fn config_file_values_survive_unless_overridden() {
    let path = temp_config(
        "overrides",
        r#"{ "world_width": 500.0, "initial_prey": 40, "rng_seed": 1, "strategy": "utility" }"#,
    );
    let cli = Cli::parse_from([
        "ecosim",
        "--config",
        path.to_str().expect("utf-8 path"),
        "--prey",
        "25",
    ]);
    let config = build_config(&cli).expect("config");
    fs::remove_file(&path).ok();

    assert_eq!(config.world_width, 500.0);
    assert_eq!(config.initial_prey, 25);
    assert_eq!(config.rng_seed, Some(1));
    assert_eq!(config.strategy, ecosim_core::BehaviorStrategy::Utility);
}

#[test]
fn malformed_config_file_fails_cleanly() {
    let path = temp_config("malformed", "{ not json");
    let cli = Cli::parse_from(["ecosim", "--config", path.to_str().expect("utf-8 path")]);
    let err = build_config(&cli).expect_err("malformed config");
    fs::remove_file(&path).ok();
    assert!(format!("{err:#}").contains("failed to parse config file"));
}

#[test]
fn seeded_runs_print_identical_summaries() {
    let args = [
        "ecosim", "--seed", "77", "--predators", "4", "--prey", "20", "--ticks", "40",
        "--report-every", "0",
    ];
    let first = run(&Cli::parse_from(args)).expect("first run");
    let second = run(&Cli::parse_from(args)).expect("second run");
    assert_eq!(
        serde_json::to_string(&first).expect("json"),
        serde_json::to_string(&second).expect("json")
    );
}
