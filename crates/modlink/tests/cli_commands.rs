#![cfg(all(unix, feature = "cli"))]

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use modlink::thermal::{encode_frame, FRAME_SAMPLES};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/modlink-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn wait_for_path(path: &Path, timeout: Duration) {
    let start = Instant::now();
    while !path.exists() {
        if start.elapsed() >= timeout {
            panic!("socket did not appear");
        }
        thread::sleep(Duration::from_millis(25));
    }
}

fn write_capture(path: &Path, frames: u16) {
    let mut wire = BytesMut::new();
    for n in 0..frames {
        let samples: Vec<u16> = (0..FRAME_SAMPLES as u16).map(|s| s + n).collect();
        encode_frame(&samples, &mut wire).expect("frame should encode");
    }
    std::fs::write(path, &wire).expect("capture should be writable");
}

fn modlink() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_modlink"));
    cmd.arg("--log-level").arg("error");
    cmd
}

#[test]
fn decode_capture_writes_images() {
    let dir = unique_temp_dir("decode");
    let capture = dir.join("capture.bin");
    let out = dir.join("frames");
    write_capture(&capture, 2);

    let output = modlink()
        .arg("--format")
        .arg("json")
        .arg("decode")
        .arg(&capture)
        .arg("--out")
        .arg(&out)
        .output()
        .expect("decode should run");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("\"sequence\":0"));
    assert!(lines[0].contains("\"min\":0"));
    assert!(lines[1].contains("\"min\":1"));
    assert!(out.join("frame-00000.pam").exists());
    assert!(out.join("frame-00001.pam").exists());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn decode_with_stats_reports_desync() {
    let dir = unique_temp_dir("stats");
    let capture = dir.join("capture.bin");
    write_capture(&capture, 1);
    let mut bytes = std::fs::read(&capture).expect("capture should be readable");
    // Line 1 claims to be line 5.
    bytes[164 + 1] = 5;
    std::fs::write(&capture, &bytes).expect("capture should be writable");

    let output = modlink()
        .arg("--format")
        .arg("json")
        .arg("decode")
        .arg(&capture)
        .arg("--stats")
        .output()
        .expect("decode should run");

    assert_eq!(output.status.code(), Some(60));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"frames\":0"));
    assert!(!stdout.contains("\"desyncs\":0"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn decode_missing_capture_fails() {
    let output = modlink()
        .arg("decode")
        .arg("/tmp/modlink-cli-does-not-exist.bin")
        .output()
        .expect("decode should run");

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("open capture failed"));
}

#[test]
fn thermal_missing_device_is_transport_error() {
    let output = modlink()
        .arg("thermal")
        .arg("/tmp/modlink-cli-no-such-device")
        .output()
        .expect("thermal should run");

    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn thermal_streams_from_emulator() {
    let dir = unique_temp_dir("emulate");
    let sock_path = dir.join("sensor.sock");

    let mut emulator = modlink()
        .arg("emulate")
        .arg(&sock_path)
        .arg("--frames")
        .arg("2")
        .arg("--interval")
        .arg("10")
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .expect("emulate should start");
    wait_for_path(&sock_path, Duration::from_secs(3));

    let output = modlink()
        .arg("--format")
        .arg("json")
        .arg("thermal")
        .arg(&sock_path)
        .arg("--socket")
        .arg("--count")
        .arg("2")
        .arg("--stats")
        .output()
        .expect("thermal should run");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains("\"sequence\":0"));
    assert!(lines[1].contains("\"sequence\":1"));
    assert!(lines[0].contains("\"width\":80"));
    assert!(lines[2].contains("\"frames\":2"));
    assert!(lines[2].contains("\"desyncs\":0"));

    let status = emulator.wait().expect("emulator should exit");
    assert!(status.success());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn version_prints_name() {
    let output = modlink().arg("version").output().expect("version should run");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("modlink "));
}
