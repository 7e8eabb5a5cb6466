use assert_cmd::Command;
use predicates::str::contains;

fn duet() -> Command {
    Command::cargo_bin("duet-emu").unwrap()
}

#[test]
fn runs_without_arguments() {
    duet().assert().success().stdout(contains("Both engines ran"));
}

#[test]
fn runs_countdown() {
    duet()
        .arg("run")
        .arg("tests/files/countdown.asm")
        .assert()
        .success()
        .stdout(contains("CPU state: Halted"))
        .stdout(contains("A: 0x0,"))
        .stdout(contains("GPU: no program"));
}

#[test]
fn prints_json_report() {
    let output = duet()
        .args(["run", "tests/files/plot.asm", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["cpu"]["state"], "Halted");
    assert_eq!(report["cpu"]["a"], 8);
    assert_eq!(report["gpu"]["state"], "Halted");
    assert_eq!(report["gpu"]["color"]["g"], 128);
}

#[test]
fn writes_ppm() {
    let path = std::env::temp_dir().join(format!("duet-cli-{}.ppm", std::process::id()));
    duet()
        .args(["--width", "4", "--height", "5", "run", "tests/files/plot.asm", "--ppm"])
        .arg(&path)
        .assert()
        .success();

    let bytes = std::fs::read(&path).unwrap();
    let header = b"P6\n4 5\n255\n";
    assert_eq!(&bytes[..header.len()], header);
    assert_eq!(bytes.len(), header.len() + 4 * 5 * 3);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn assembles_then_disassembles() {
    let path = std::env::temp_dir().join(format!("duet-cli-{}.hex", std::process::id()));
    duet()
        .args(["asm", "tests/files/plot.asm", "--listing", "-o"])
        .arg(&path)
        .assert()
        .success()
        .stdout(contains("start"))
        .stdout(contains("0007  GPU  07 00 00"));

    duet()
        .arg("disasm")
        .arg(&path)
        .assert()
        .success()
        .stdout(contains("CPU  STA 0x20"))
        .stdout(contains("GPU  SETC 0xff 0x80 0x00"));

    duet()
        .arg("split")
        .arg(&path)
        .assert()
        .success()
        .stdout(contains("7 CPU bytes, 13 GPU bytes"));

    let _ = std::fs::remove_file(&path);
}

#[test]
fn rejects_zero_budget() {
    duet()
        .args(["--max-steps", "0", "run", "tests/files/countdown.asm"])
        .assert()
        .failure()
        .stderr(contains("Invalid configuration"));
}

#[test]
fn reports_assembly_errors() {
    let path = std::env::temp_dir().join(format!("duet-cli-{}-bad.asm", std::process::id()));
    std::fs::write(&path, "LDA 1\nBOGUS 2\n").unwrap();
    duet()
        .arg("run")
        .arg(&path)
        .assert()
        .failure()
        .stderr(contains("line 2"));
    let _ = std::fs::remove_file(&path);
}

#[test]
fn assembles_non_asm_source_beside_it() {
    let dir = std::env::temp_dir();
    let source = dir.join(format!("duet-cli-{}.s", std::process::id()));
    let image = source.with_extension("hex");
    std::fs::write(&source, "LDA 5\nHALT\n").unwrap();

    duet().arg("asm").arg(&source).assert().success();

    assert_eq!(std::fs::read_to_string(&source).unwrap(), "LDA 5\nHALT\n");
    let text = std::fs::read_to_string(&image).unwrap();
    assert!(text.contains("01 05"));

    duet().arg("asm").arg(&image).assert().failure().stderr(contains("Refusing to overwrite"));
    assert_eq!(std::fs::read_to_string(&image).unwrap(), text);

    let _ = std::fs::remove_file(&source);
    let _ = std::fs::remove_file(&image);
}

#[test]
fn traces_the_reported_cpu() {
    duet()
        .args(["run", "tests/files/countdown.asm", "--trace"])
        .assert()
        .success()
        .stdout(contains("0000: LDA 0x03"))
        .stdout(contains("0002: SUB 0x01"))
        .stdout(contains("CPU state: Halted after 10 steps"))
        .stdout(contains("GPU: no program"));
}

#[test]
fn writes_partial_frame_when_gpu_stops() {
    let dir = std::env::temp_dir();
    let source = dir.join(format!("duet-cli-{}-budget.asm", std::process::id()));
    let ppm = dir.join(format!("duet-cli-{}-budget.ppm", std::process::id()));
    std::fs::write(&source, ".GPU\nRECT 0 0\nSETC 9 9 9\nPLOT\nSETX 1\nPLOT\nHALT\n").unwrap();

    duet()
        .args(["--max-steps", "3", "--width", "2", "--height", "1", "run"])
        .arg(&source)
        .arg("--ppm")
        .arg(&ppm)
        .assert()
        .failure()
        .stderr(contains("budget of 3 steps"));

    let bytes = std::fs::read(&ppm).unwrap();
    let header = b"P6\n2 1\n255\n";
    assert_eq!(&bytes[..header.len()], header);
    assert_eq!(&bytes[header.len()..], &[9, 9, 9, 0, 0, 0]);

    let _ = std::fs::remove_file(&source);
    let _ = std::fs::remove_file(&ppm);
}
