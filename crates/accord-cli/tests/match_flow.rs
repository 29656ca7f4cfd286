use assert_cmd::cargo::cargo_bin_cmd;
use accord_lib::metrics::matching::MatchResult;
use accord_lib::pipeline::MatchRow;
use std::{error::Error, fs, path::Path};
use tempfile::tempdir;

#[test]
fn match_score_reports_perfect_agreement() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let reference = dir.path().join("reference.txt");
    let test = dir.path().join("test.txt");
    fs::write(&reference, "0\n256\n512\n768\n1024\n")?;
    fs::write(&test, "2\n258\n514\n770\n1022\n")?;

    let mut cmd = cargo_bin_cmd!("accord");
    cmd.args([
        "match-score",
        "--reference",
        path_str(&reference),
        "--test",
        path_str(&test),
        "--fs",
        "256",
        "--tolerance-s",
        "0.0390625",
    ]);
    let output = cmd.assert().success().get_output().stdout.clone();
    let result: MatchResult = serde_json::from_slice(&output)?;

    assert_eq!(result.true_positives, 5);
    assert_eq!(result.false_negatives, 0);
    assert_eq!(result.false_positives, 0);
    assert_close(result.sensitivity, 1.0, 1e-12);
    assert_close(result.ppv, 1.0, 1e-12);
    assert_close(result.f1, 1.0, 1e-12);
    // two samples of offset at 256 Hz, reported in seconds
    assert_close(result.mean_distance.expect("mean distance"), 2.0 / 256.0, 1e-12);
    Ok(())
}

#[test]
fn match_score_rejects_unsorted_input() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let reference = dir.path().join("reference.txt");
    let test = dir.path().join("test.txt");
    fs::write(&reference, "100\n50\n")?;
    fs::write(&test, "10\n20\n")?;

    let mut cmd = cargo_bin_cmd!("accord");
    cmd.args([
        "match-score",
        "--reference",
        path_str(&reference),
        "--test",
        path_str(&test),
    ]);
    cmd.assert().failure();
    Ok(())
}

#[test]
fn simulated_pair_scores_high_in_every_window() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let reference = dir.path().join("reference.txt");
    let test = dir.path().join("test.txt");
    simulate(dir.path(), &["--duration-s", "115", "--lag-s", "0.30", "--seed", "7"]);

    let mut cmd = cargo_bin_cmd!("accord");
    cmd.args([
        "windowed-match",
        "--reference",
        path_str(&reference),
        "--test",
        path_str(&test),
        "--fs",
        "256",
    ]);
    let output = cmd.assert().success().get_output().stdout.clone();
    let text = String::from_utf8(output)?;
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("Epoch,TP,FN,FP,Se,PPV,F1"));

    let rows: Vec<&str> = lines.collect();
    assert_eq!(rows.len(), 3, "expected three full 30 s windows");
    for (i, row) in rows.iter().enumerate() {
        let fields: Vec<&str> = row.split(',').collect();
        assert_eq!(fields.len(), 7);
        assert_eq!(fields[0], i.to_string());
        let tp: usize = fields[1].parse()?;
        let f1: f64 = fields[6].parse()?;
        assert!(tp >= 30, "window {i} matched only {tp} events");
        assert!(f1 >= 0.9, "window {i} f1 was {f1}");
    }
    Ok(())
}

#[test]
fn windowed_match_writes_json_rows() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let reference = dir.path().join("reference.txt");
    let test = dir.path().join("test.txt");
    simulate(dir.path(), &["--duration-s", "95", "--lag-s", "0.30", "--seed", "3"]);

    let out = dir.path().join("rows.json");
    let mut cmd = cargo_bin_cmd!("accord");
    cmd.args([
        "windowed-match",
        "--reference",
        path_str(&reference),
        "--test",
        path_str(&test),
        "--fs",
        "256",
        "--format",
        "json",
        "--out",
        path_str(&out),
    ]);
    cmd.assert().success();

    let rows: Vec<MatchRow> = serde_json::from_str(&fs::read_to_string(&out)?)?;
    assert_eq!(rows.len(), 3);
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(row.epoch, i);
        assert!(row.f1 >= 0.9);
    }
    Ok(())
}

#[test]
fn fixed_lag_flag_overrides_estimation() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let reference = dir.path().join("reference.txt");
    let test = dir.path().join("test.txt");
    simulate(
        dir.path(),
        &[
            "--duration-s",
            "95",
            "--lag-s",
            "0.45",
            "--detection-jitter-s",
            "0",
            "--rr-jitter-s",
            "0",
            "--seed",
            "11",
        ],
    );

    let mut cmd = cargo_bin_cmd!("accord");
    cmd.args([
        "windowed-match",
        "--reference",
        path_str(&reference),
        "--test",
        path_str(&test),
        "--fs",
        "256",
        "--lag",
        "fixed",
        "--fixed-lag-s",
        "0.45",
    ]);
    let output = cmd.assert().success().get_output().stdout.clone();
    let text = String::from_utf8(output)?;
    for row in text.lines().skip(1) {
        let f1: f64 = row.split(',').nth(6).expect("f1 column").parse()?;
        assert!(f1 >= 0.9, "row `{row}`");
    }
    Ok(())
}

fn simulate(dir: &Path, extra: &[&str]) {
    let reference = dir.join("reference.txt");
    let test = dir.join("test.txt");
    let mut cmd = cargo_bin_cmd!("accord");
    cmd.args([
        "simulate",
        "--out-reference",
        path_str(&reference),
        "--out-test",
        path_str(&test),
    ]);
    cmd.args(extra);
    cmd.assert().success();
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("utf8 path")
}

fn assert_close(a: f64, b: f64, tol: f64) {
    let diff = (a - b).abs();
    assert!(diff <= tol, "diff {diff} exceeded tol {tol} ({a} vs {b})");
}
