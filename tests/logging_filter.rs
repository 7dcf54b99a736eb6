// tests/logging_filter.rs

use std::error::Error;

use tracing::level_filters::LevelFilter;

use scriptvisor::cli::LogLevel;
use scriptvisor::logging::build_filter;

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn defaults_to_info() -> TestResult {
    assert_eq!(build_filter(None, None)?.max_level_hint(), Some(LevelFilter::INFO));
    assert_eq!(build_filter(None, Some("  "))?.max_level_hint(), Some(LevelFilter::INFO));
    Ok(())
}

#[test]
fn cli_level_wins_over_environment() -> TestResult {
    let filter = build_filter(Some(LogLevel::Debug), Some("scriptvisor=notalevel"))?;
    assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));
    Ok(())
}

#[test]
fn environment_takes_per_target_directives() -> TestResult {
    let filter = build_filter(None, Some("scriptvisor::exec=trace,warn"))?;
    assert_eq!(filter.max_level_hint(), Some(LevelFilter::TRACE));
    Ok(())
}

#[test]
fn invalid_environment_value_is_rejected() {
    let err = build_filter(None, Some("scriptvisor=notalevel")).unwrap_err();
    assert!(err.to_string().contains("SCRIPTVISOR_LOG"));
}
