//! Integration tests for the `vipsync` binary.

mod common;

use common::{Behavior, MockRconServer};
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn vipsync_bin() -> String {
    env!("CARGO_BIN_EXE_vipsync").to_string()
}

/// Config with millisecond timings and files inside `dir`.
fn write_config(dir: &Path) -> String {
    let config = dir.join("config.toml");
    fs::write(
        &config,
        format!(
            "servers_file = {:?}\nvip_file = {:?}\nidle_timeout_ms = 500\nquiescence_ms = 20\n",
            dir.join("servers.json"),
            dir.join("vips.csv"),
        ),
    )
    .unwrap();
    config.display().to_string()
}

fn run(config: &str, args: &[&str]) -> Output {
    Command::new(vipsync_bin())
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

#[test]
fn test_server_add_list_remove() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());

    let output = run(&config, &["server", "add", "10.1.2.3", "7779", "hunter2"]);
    assert!(
        output.status.success(),
        "server add failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let output = run(&config, &["server", "list"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("10.1.2.3:7779"));
    assert!(!stdout.contains("hunter2"));

    let servers: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("servers.json")).unwrap())
            .unwrap();
    let id = servers[0]["Id"].as_str().unwrap().to_string();

    let output = run(&config, &["server", "remove", &id]);
    assert!(output.status.success());
    let output = run(&config, &["server", "list"]);
    assert!(String::from_utf8_lossy(&output.stdout).contains("No servers registered"));
}

#[test]
fn test_remove_unknown_server_fails() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());

    let output = run(&config, &["server", "remove", "does-not-exist"]);
    assert!(!output.status.success());
}

#[test]
fn test_import_without_record_file_fails() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());

    let output = run(&config, &["import"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("vips.csv"));
}

#[test]
fn test_missing_explicit_config_fails() {
    let dir = TempDir::new().unwrap();
    let output = run(
        &dir.path().join("absent.toml").display().to_string(),
        &["server", "list"],
    );
    assert!(!output.status.success());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_export_then_import_round_trip() {
    let source = MockRconServer::start(
        &[0x5A],
        "pw",
        &[("abc123", "Alice"), ("def456", "Bob")],
        Behavior::Normal,
    )
    .await;
    let target = MockRconServer::start(&[0x3C], "pw", &[], Behavior::Normal).await;

    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());

    let add = |port: u16| {
        let config = config.clone();
        tokio::task::spawn_blocking(move || {
            run(&config, &["server", "add", "127.0.0.1", &port.to_string(), "pw"])
        })
    };
    assert!(add(source.addr.port()).await.unwrap().status.success());

    let cfg = config.clone();
    let export = tokio::task::spawn_blocking(move || run(&cfg, &["export"]))
        .await
        .unwrap();
    assert!(
        export.status.success(),
        "export failed: {}",
        String::from_utf8_lossy(&export.stderr)
    );
    let csv = fs::read_to_string(dir.path().join("vips.csv")).unwrap();
    assert_eq!(csv, "SteamId,Name\nabc123,Alice\ndef456,Bob\n");

    assert!(add(target.addr.port()).await.unwrap().status.success());

    let cfg = config.clone();
    let import = tokio::task::spawn_blocking(move || run(&cfg, &["import"]))
        .await
        .unwrap();
    assert!(import.status.success());

    assert_eq!(target.vip_ids(), vec!["abc123", "def456"]);
    // Already present on the source server, so nothing was added there.
    assert!(!source
        .commands()
        .iter()
        .any(|c| c.starts_with("vipadd")));
}
