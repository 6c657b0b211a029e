use std::process::{Command, Output};

fn medrag(dir: &std::path::Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_medrag"))
        .args(args)
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .env_remove("OPENAI_API_KEY")
        .env_remove("SERPER_API_KEY")
        .output()
        .unwrap()
}

#[test]
fn init_creates_valid_toml() {
    let dir = tempfile::tempdir().unwrap();

    let output = medrag(dir.path(), &["init"]);
    assert!(
        output.status.success(),
        "medrag init failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let config_path = dir.path().join(".medrag.toml");
    assert!(config_path.exists(), ".medrag.toml should exist");

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("[corpus]"));
    assert!(content.contains("[retrieval.weights]"));

    let config = medrag_core::MedragConfig::from_toml(&content).unwrap();
    assert_eq!(config.corpus.expected_count, 60);
    assert_eq!(config.retrieval.max_evidence, 5);
}

#[test]
fn init_refuses_if_exists() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".medrag.toml"), "# existing").unwrap();

    let output = medrag(dir.path(), &["init"]);
    assert!(!output.status.success());
    let content = std::fs::read_to_string(dir.path().join(".medrag.toml")).unwrap();
    assert_eq!(content, "# existing");
}

#[test]
fn triage_json_reports_cardiac_very_high() {
    let dir = tempfile::tempdir().unwrap();

    let output = medrag(
        dir.path(),
        &["--format", "json", "triage", "Crushing chest pain down my LEFT ARM"],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["condition"], "cardiac");
    assert_eq!(value["urgency"], "very_high");
    assert_eq!(value["keywords"], serde_json::json!(["chest pain", "left arm"]));
}

#[test]
fn triage_without_match_has_null_condition() {
    let dir = tempfile::tempdir().unwrap();

    let output = medrag(dir.path(), &["--format", "json", "triage", "what is the weather"]);
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(value["condition"].is_null());
    assert_eq!(value["urgency"], "low");
}

#[test]
fn triage_of_blank_question_is_low_with_no_condition() {
    let dir = tempfile::tempdir().unwrap();

    let output = medrag(dir.path(), &["--format", "json", "triage", "   "]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(value["condition"].is_null());
    assert_eq!(value["urgency"], "low");
    assert_eq!(value["keywords"], serde_json::json!([]));
}

#[test]
fn samples_triage_all_questions() {
    let dir = tempfile::tempdir().unwrap();

    let output = medrag(dir.path(), &["--format", "json", "samples"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let runs = value.as_array().unwrap();
    assert_eq!(runs.len(), 10);
    assert!(runs.iter().all(|r| r["condition"].is_string()));
    assert!(runs.iter().all(|r| r.get("elapsedMs").is_none()));
}

#[test]
fn search_without_keys_fails_with_hint() {
    let dir = tempfile::tempdir().unwrap();

    let output = medrag(dir.path(), &["search", "chest pain"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("OPENAI_API_KEY"), "stderr: {stderr}");
}

#[test]
fn doctor_json_lists_checks() {
    let dir = tempfile::tempdir().unwrap();

    let output = medrag(dir.path(), &["--format", "json", "doctor"]);
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<&str> = value["checks"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|c| c["name"].as_str())
        .collect();
    assert!(names.contains(&"corpus"));
    assert!(names.contains(&"web_search_api_key"));
    assert_eq!(value["checks"][1]["status"], "fail");
}

#[test]
fn config_flag_replaces_working_directory_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(".medrag.toml"),
        "[triage]\nurgency = [\"giraffe\"]\n",
    )
    .unwrap();
    let custom = dir.path().join("custom.toml");
    std::fs::write(&custom, "[triage]\nurgency = [\"zebra\"]\n").unwrap();

    let output = medrag(
        dir.path(),
        &["--config", custom.to_str().unwrap(), "--format", "json", "triage", "zebra giraffe"],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["urgency"], "high");

    let output = medrag(dir.path(), &["--format", "json", "triage", "giraffe"]);
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["urgency"], "high");

    let output = medrag(dir.path(), &["--format", "json", "triage", "zebra"]);
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["urgency"], "low");
}
