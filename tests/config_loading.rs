// tests/config_loading.rs

use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;

use growdag::config::{load_and_validate, load_from_path, parse_and_validate};
use growdag::engine::{NodeFailurePolicy, RunOptions};
use growdag::errors::GrowdagError;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn full_config_maps_onto_run_options() {
    let file = write_config(
        r#"
[run]
track = true
poll_interval_ms = 250
poll_timeout_ms = 2000
max_iterations = 50
deadline_secs = 60
on_node_failed = "continue"

[retry]
submit_attempts = 5
submit_backoff_ms = 20
max_poll_failures = 7
"#,
    );

    let options = load_and_validate(file.path()).unwrap().run_options();

    assert!(options.track);
    assert_eq!(options.poll_interval, Duration::from_millis(250));
    assert_eq!(options.poll_timeout, Duration::from_secs(2));
    assert_eq!(options.max_iterations, Some(50));
    assert_eq!(options.deadline, Some(Duration::from_secs(60)));
    assert_eq!(options.on_node_failed, NodeFailurePolicy::ContinueBestEffort);
    assert_eq!(options.retry.submit_attempts, 5);
    assert_eq!(options.retry.submit_backoff, Duration::from_millis(20));
    assert_eq!(options.retry.max_poll_failures, 7);
}

#[test]
fn empty_config_yields_defaults() {
    let file = write_config("");
    let options = load_and_validate(file.path()).unwrap().run_options();
    assert_eq!(options, RunOptions::default());
}

#[test]
fn partial_sections_keep_remaining_defaults() {
    let cfg = parse_and_validate(
        r#"
[run]
on_node_failed = "abort"
poll_interval_ms = 10
"#,
    )
    .unwrap();
    let options = cfg.run_options();
    let defaults = RunOptions::default();

    assert_eq!(options.poll_interval, Duration::from_millis(10));
    assert_eq!(options.on_node_failed, NodeFailurePolicy::Abort);
    assert_eq!(options.poll_timeout, defaults.poll_timeout);
    assert_eq!(options.retry, defaults.retry);
}

#[test]
fn zero_poll_interval_is_a_config_error() {
    let file = write_config("[run]\npoll_interval_ms = 0\n");

    match load_and_validate(file.path()) {
        Err(GrowdagError::ConfigError(msg)) => assert!(msg.contains("poll_interval_ms")),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn other_out_of_range_values_are_rejected() {
    for (toml, field) in [
        ("[run]\npoll_timeout_ms = 0\n", "poll_timeout_ms"),
        ("[run]\nmax_iterations = 0\n", "max_iterations"),
        ("[retry]\nsubmit_attempts = 0\n", "submit_attempts"),
    ] {
        match parse_and_validate(toml) {
            Err(GrowdagError::ConfigError(msg)) => assert!(msg.contains(field), "{msg}"),
            other => panic!("expected ConfigError for {field}, got {other:?}"),
        }
    }
}

#[test]
fn unknown_policy_is_a_toml_error() {
    let result = parse_and_validate("[run]\non_node_failed = \"panic\"\n");
    assert!(matches!(result, Err(GrowdagError::TomlError(_))), "{result:?}");
}

#[test]
fn unknown_keys_are_rejected() {
    let result = parse_and_validate("[run]\npoll_every = 3\n");
    assert!(matches!(result, Err(GrowdagError::TomlError(_))));
}

#[test]
fn raw_load_does_not_validate() {
    let file = write_config("[retry]\nsubmit_attempts = 0\n");
    let raw = load_from_path(file.path()).unwrap();
    assert_eq!(raw.retry.submit_attempts, 0);
}

#[test]
fn missing_file_is_an_io_error() {
    let result = load_and_validate("/definitely/not/here/growdag.toml");
    assert!(matches!(result, Err(GrowdagError::IoError(_))));
}
