use std::process::Command;

use serde_json::Value;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_metronome_cli"))
}

fn beat_indices(report: &Value) -> Vec<u64> {
    report["events"]
        .as_array()
        .map(|events| {
            events
                .iter()
                .filter(|event| event["type"] == "beat")
                .filter_map(|event| event["beat_index"].as_u64())
                .collect()
        })
        .unwrap_or_default()
}

#[test]
fn schedule_count_in_reports_one_bar() {
    let output = cli()
        .args([
            "schedule",
            "--bpm",
            "120",
            "--time",
            "4/4",
            "--mode",
            "count-in",
        ])
        .output()
        .expect("failed to run metronome_cli schedule");
    assert!(
        output.status.success(),
        "CLI exited with {:?}",
        output.status.code()
    );

    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    let json: Value = serde_json::from_str(stdout.trim()).expect("schedule report JSON payload");
    assert_eq!(json["stop_reason"], "completed");
    assert_eq!(json["time_signature"], "4/4");
    assert_eq!(json["beats_per_bar"], 4);
    assert_eq!(beat_indices(&json), vec![1, 2, 3, 4]);

    let clicks = json["clicks"].as_array().expect("clicks array");
    assert_eq!(clicks.len(), 4);
    assert_eq!(clicks[0]["kind"], "accent");
    assert_eq!(clicks[1]["kind"], "regular");
}

#[test]
fn schedule_loop_ends_with_stop_notification() {
    let output = cli()
        .args([
            "schedule",
            "--bpm",
            "60",
            "--time",
            "9/8",
            "--seconds",
            "3.5",
        ])
        .output()
        .expect("failed to run metronome_cli schedule");
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    let json: Value = serde_json::from_str(stdout.trim()).expect("schedule report JSON payload");
    assert_eq!(json["stop_reason"], "stopped");
    assert_eq!(json["seconds_per_beat"], 1.0);
    assert_eq!(beat_indices(&json), vec![1, 2, 3, 1, 0]);
}

#[test]
fn schedule_stops_after_requested_bars() {
    let output = cli()
        .args(["schedule", "--bpm", "200", "--time", "6/8", "--bars", "2"])
        .output()
        .expect("failed to run metronome_cli schedule");
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    let json: Value = serde_json::from_str(stdout.trim()).expect("schedule report JSON payload");
    assert_eq!(json["stop_reason"], "stopped");
    let expected: Vec<u64> = (1..=6).chain(1..=6).chain([0]).collect();
    assert_eq!(beat_indices(&json), expected);
}

#[test]
fn schedule_rejects_unsupported_signature() {
    let output = cli()
        .args(["schedule", "--time", "5/4"])
        .output()
        .expect("failed to run metronome_cli schedule");
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).expect("stderr UTF-8");
    assert!(stderr.contains("5/4"), "expected signature in error, got {stderr}");
}

#[test]
fn schedule_rejects_invalid_tempo() {
    let output = cli()
        .args(["schedule", "--bpm", "0"])
        .output()
        .expect("failed to run metronome_cli schedule");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).expect("stderr UTF-8");
    assert!(stderr.contains("Tempo"), "expected tempo error, got {stderr}");
}

#[test]
fn signatures_lists_supported_meters() {
    let output = cli()
        .arg("signatures")
        .output()
        .expect("failed to run metronome_cli signatures");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    for line in ["4/4\t4 beats", "6/8\t6 beats", "9/8\t3 beats"] {
        assert!(stdout.contains(line), "missing {line:?} in {stdout}");
    }
}

#[test]
fn schedule_rejects_out_of_range_seconds() {
    let output = cli()
        .args(["schedule", "--seconds", "1e30"])
        .output()
        .expect("failed to run metronome_cli schedule");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).expect("stderr UTF-8");
    assert!(
        stderr.contains("out of range"),
        "expected range error, got {stderr}"
    );
    assert!(!stderr.contains("panicked"), "CLI panicked: {stderr}");
}
