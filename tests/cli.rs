use std::fs;
use std::process::Command;
use tempfile::tempdir;

fn pixguard() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_pixguard"));
    command.env("RUST_LOG", "off");
    command
}

#[test]
fn exit_status_is_the_corrupt_count() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.png"), b"").unwrap();
    fs::write(dir.path().join("b.png"), vec![0x33u8; 500]).unwrap();
    fs::write(dir.path().join("c.webp"), vec![0x33u8; 500]).unwrap();
    fs::write(dir.path().join("notes.txt"), b"skip me").unwrap();
    let report_path = dir.path().join("reports/scan.txt");

    let output = pixguard()
        .arg("--directory")
        .arg(dir.path())
        .arg("--quiet")
        .arg("--threads")
        .arg("2")
        .arg("--output")
        .arg(&report_path)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(3));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Corrupt images: 3"));
    assert!(stdout.contains("Reason: invalid WebP header"));

    let saved = fs::read_to_string(&report_path).unwrap();
    assert!(saved.starts_with("IMAGE INTEGRITY REPORT"));
    assert!(stdout.contains(&saved));
}

#[test]
fn empty_directory_exits_cleanly() {
    let dir = tempdir().unwrap();
    let output = pixguard().arg("-d").arg(dir.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("No image files found."));
    assert!(stdout.contains("No corrupt images found."));
}

#[test]
fn missing_directory_is_fatal() {
    let dir = tempdir().unwrap();
    let output = pixguard()
        .arg("-d")
        .arg(dir.path().join("missing"))
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("does not exist"));
}

#[test]
fn failed_report_save_keeps_corrupt_exit_status() {
    let dir = tempdir().unwrap();
    let scan_root = dir.path().join("scan");
    fs::create_dir_all(&scan_root).unwrap();
    fs::write(scan_root.join("a.png"), b"").unwrap();
    fs::write(scan_root.join("b.gif"), vec![0x10u8; 300]).unwrap();
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, b"not a directory").unwrap();

    let output = pixguard()
        .arg("-d")
        .arg(&scan_root)
        .arg("-q")
        .arg("-o")
        .arg(blocker.join("report.txt"))
        .arg("--json")
        .arg(blocker.join("report.json"))
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error saving report"));
    assert!(stderr.contains("Error saving JSON report"));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Corrupt images: 2"));
    assert!(!stdout.contains("Report saved"));
}

#[cfg(unix)]
#[test]
fn symlinked_image_is_validated() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("store");
    let scan_root = dir.path().join("scan");
    fs::create_dir_all(&store).unwrap();
    fs::create_dir_all(&scan_root).unwrap();
    fs::write(store.join("empty.png"), b"").unwrap();
    std::os::unix::fs::symlink(store.join("empty.png"), scan_root.join("link.png")).unwrap();

    let output = pixguard().arg("-d").arg(&scan_root).arg("-q").output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("link.png"));
    assert!(stdout.contains("Reason: empty file"));
}
