use std::fs;
use std::os::unix::fs::PermissionsExt as _;

use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

#[test]
fn logging_does_not_panic_when_chatmux_dir_not_writable() {
    let dir = TempDir::new().unwrap();
    let chatmux_dir = dir.path().join("chatmux-ro");
    fs::create_dir_all(&chatmux_dir).unwrap();
    let mut perms = fs::metadata(&chatmux_dir).unwrap().permissions();
    perms.set_mode(0o555);
    fs::set_permissions(&chatmux_dir, perms).unwrap();

    let mut cmd = cargo_bin_cmd!("chatmux");
    cmd.env("CHATMUX_DIR", &chatmux_dir);
    cmd.args(["version"]);
    cmd.assert().success();
}

#[test]
fn log_file_is_written_under_chatmux_dir() {
    let dir = TempDir::new().unwrap();

    let mut cmd = cargo_bin_cmd!("chatmux");
    cmd.env("CHATMUX_DIR", dir.path())
        .env("XDG_CONFIG_HOME", dir.path())
        .env_remove("CHATMUX_CONFIG")
        .env_remove("RUST_LOG");
    cmd.args(["version"]);
    cmd.assert().success();

    let log = fs::read_to_string(dir.path().join("chatmux.log")).unwrap();
    assert!(log.contains("chatmux starting"), "{log}");
}
