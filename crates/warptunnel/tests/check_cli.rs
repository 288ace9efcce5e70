use std::fs;
use std::process::Command;

use tempfile::TempDir;

fn warptunnel(config_dir: &TempDir) -> Command {
    let config = config_dir.path().join("warptunnel.toml");
    if !config.exists() {
        fs::write(&config, "[render]\nsize = \"64x36\"\nthreads = 1\n").unwrap();
    }
    let mut command = Command::new(env!("CARGO_BIN_EXE_warptunnel"));
    command.env("WARPTUNNEL_CONFIG", &config).env("RUST_LOG", "warn");
    command
}

#[test]
fn check_prints_slot_table() {
    let dir = TempDir::new().unwrap();
    let output = warptunnel(&dir)
        .args(["check", "--style", "thor"])
        .output()
        .expect("failed to run warptunnel check");

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Input block: 32 bytes"), "{stdout}");
    for name in ["time", "resolution", "speed", "warp", "thickness", "colorShift"] {
        assert!(stdout.contains(name), "missing {name} in {stdout}");
    }
    assert!(stdout.contains("type=vec2<f32>"), "{stdout}");
}

#[test]
fn check_renders_frames_headless() {
    let dir = TempDir::new().unwrap();
    let output = warptunnel(&dir)
        .args(["check", "--frames", "2", "--render-scale", "0.5"])
        .output()
        .expect("failed to run warptunnel check");

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Rendered 2 frame(s) at 32x18"), "{stdout}");
}

#[test]
fn check_reports_compile_diagnostics() {
    let dir = TempDir::new().unwrap();
    let shader = dir.path().join("bad.wgsl");
    fs::write(&shader, "@fragment fn fs_tunnel( -> @location(0) vec4<f32> {}\n").unwrap();

    let output = warptunnel(&dir)
        .arg("check")
        .arg("--shader")
        .arg(&shader)
        .output()
        .expect("failed to run warptunnel check");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to compile"), "{stderr}");
    assert!(stderr.contains("bad.wgsl"), "{stderr}");
}

#[test]
fn invalid_config_file_fails_startup() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("warptunnel.toml"),
        "[controls]\ndisabled = [\"gamma\"]\n",
    )
    .unwrap();

    let output = warptunnel(&dir)
        .arg("check")
        .output()
        .expect("failed to run warptunnel check");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("gamma"));
}

#[test]
fn keys_lists_controls() {
    let dir = TempDir::new().unwrap();
    let output = warptunnel(&dir).arg("keys").output().expect("failed to run warptunnel keys");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Escape"));
    assert!(stdout.contains("thickness"));
}
