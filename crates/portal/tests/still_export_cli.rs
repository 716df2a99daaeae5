use std::fs;
use std::process::Command;

use tempfile::TempDir;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

fn portal(config_dir: &std::path::Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_portal"));
    command
        .env("PORTAL_CONFIG_DIR", config_dir)
        .env_remove("PORTAL_CONFIG");
    command
}

fn png_dimensions(bytes: &[u8]) -> (u32, u32) {
    assert_eq!(&bytes[..8], &PNG_SIGNATURE);
    let width = u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
    let height = u32::from_be_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]);
    (width, height)
}

#[test]
fn still_export_cli_writes_png() {
    let root = TempDir::new().unwrap();
    let config_dir = root.path().join("config");
    let output = root.path().join("portal.png");

    let status = portal(&config_dir)
        .args(["--size", "64x48", "--still-time", "0.5", "--frames", "3"])
        .arg("--still-export")
        .arg(&output)
        .status()
        .expect("failed to run portal still export");

    assert!(status.success());
    let bytes = fs::read(&output).unwrap();
    assert_eq!(png_dimensions(&bytes), (64, 48));
}

#[test]
fn still_export_reads_discovered_config() {
    let root = TempDir::new().unwrap();
    let config_dir = root.path().join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("portal.toml"),
        "version = 1\n[window]\nwidth = 40\nheight = 30\n[bloom]\nradius = -1.0\n",
    )
    .unwrap();
    let output = root.path().join("configured.png");

    let status = portal(&config_dir)
        .arg("--still-export")
        .arg(&output)
        .status()
        .expect("failed to run portal still export");

    assert!(status.success());
    let bytes = fs::read(&output).unwrap();
    assert_eq!(png_dimensions(&bytes), (40, 30));
}

#[test]
fn invalid_config_fails_before_rendering() {
    let root = TempDir::new().unwrap();
    let config_dir = root.path().join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let config = config_dir.join("broken.toml");
    fs::write(&config, "version = 1\n[portal.rotation]\nmode = \"per-tick\"\nstep = 0\n").unwrap();
    let output = root.path().join("never.png");

    let status = portal(&config_dir)
        .arg("--config")
        .arg(&config)
        .arg("--still-export")
        .arg(&output)
        .status()
        .expect("failed to run portal");

    assert!(!status.success());
    assert!(!output.exists());
}
