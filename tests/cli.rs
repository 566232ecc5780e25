use assert_cmd::Command;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

fn temp_workspace() -> TempDir {
    tempfile::tempdir().expect("create tempdir")
}

fn run_command(cmd: &mut Command) {
    cmd.assert().success();
}

fn corpus() -> String {
    let mut text = String::new();
    for idx in 0..64 {
        text.push_str("the lower lowest newest widest low<|endoftext|>");
        text.push_str(&format!(" item {idx} is the newest\n"));
    }
    text
}

#[test]
fn train_writes_all_layouts_and_info_reads_them() {
    let workspace = temp_workspace();
    let input_dir = workspace.path().join("corpus");
    fs::create_dir_all(input_dir.join("nested")).expect("create corpus dir");
    fs::write(input_dir.join("a.txt"), corpus()).expect("write input");
    fs::write(input_dir.join("nested").join("b.txt"), "lower lowest\n").expect("write input");

    let mut train = Command::cargo_bin("tbpe").expect("binary exists");
    train.current_dir(workspace.path()).args([
        "--quiet",
        "train",
        "corpus",
        "--vocab-size",
        "300",
        "--special-token",
        "<|endoftext|>",
        "--family-size",
        "280",
        "--report",
        "report.json",
        "--no-progress",
        "-o",
        "out",
    ]);
    run_command(&mut train);

    let out = workspace.path().join("out");
    assert!(out.join("tokenizer.json").exists(), "tokenizer.json was created");
    assert!(out.join("vocab.json").exists(), "vocab.json was created");
    assert!(out.join("merges.txt").exists(), "merges.txt was created");
    assert!(out.join("vocab-280").join("merges.txt").exists());

    let merges = fs::read_to_string(out.join("vocab-280").join("merges.txt")).expect("read");
    assert_eq!(merges.lines().count(), 280 - 257 + 1);

    let report: Value =
        serde_json::from_str(&fs::read_to_string(workspace.path().join("report.json")).unwrap())
            .expect("report is valid JSON");
    assert_eq!(report["stop_reason"], "Converged");
    assert_eq!(report["iterations"].as_array().unwrap().len(), 300 - 257);

    let mut info = Command::cargo_bin("tbpe").expect("binary exists");
    let info_output = info
        .current_dir(workspace.path())
        .args(["--quiet", "info", "-m", "out/tokenizer.json", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let summary: Value = serde_json::from_slice(&info_output).expect("summary is valid JSON");
    assert_eq!(summary["vocab_size"], 300);
    assert_eq!(summary["merges"], 300 - 257);
    assert_eq!(summary["special_tokens"][0], "<|endoftext|>");

    let mut info = Command::cargo_bin("tbpe").expect("binary exists");
    let info_output = info
        .current_dir(workspace.path())
        .args(["--quiet", "info", "-m", "out"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let info_text = String::from_utf8(info_output).expect("info output is UTF-8");
    assert!(info_text.contains("Vocab size    : 300"));
}

#[test]
fn train_rejects_vocab_size_below_seed() {
    let workspace = temp_workspace();
    fs::write(workspace.path().join("input.txt"), "hello world").expect("write input");

    let mut train = Command::cargo_bin("tbpe").expect("binary exists");
    train
        .current_dir(workspace.path())
        .args([
            "--quiet",
            "train",
            "input.txt",
            "--vocab-size",
            "257",
            "--no-progress",
        ])
        .assert()
        .failure();
}

#[test]
fn train_rejects_invalid_utf8() {
    let workspace = temp_workspace();
    fs::write(workspace.path().join("input.bin"), [0x66, 0x6f, 0xff, 0x6f]).expect("write input");

    let mut train = Command::cargo_bin("tbpe").expect("binary exists");
    train
        .current_dir(workspace.path())
        .args(["--quiet", "train", "input.bin", "--vocab-size", "300", "--no-progress"])
        .assert()
        .failure();
}
