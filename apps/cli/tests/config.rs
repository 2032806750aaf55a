//! Tests for configuration file handling.

use aistudio_cli::load;

#[test]
fn missing_file_means_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = load(&dir.path().join("config.toml")).unwrap();
    assert_eq!(config.retry.max_attempts, 3);
    assert_eq!(config.session.timeout_secs, 120);
}

#[test]
fn reads_an_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[retry]\nmax_attempts = 5\n").unwrap();
    let config = load(&path).unwrap();
    assert_eq!(config.retry.max_attempts, 5);
}
