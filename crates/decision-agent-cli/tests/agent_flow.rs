//! End-to-end command flow against a real sqlite database.

use std::path::{Path, PathBuf};

use clap::Parser;
use decision_agent_cli::{run_cli, Cli};
use decision_agent_core::{AgentConfig, DecisionAgent, ParameterName};
use decision_agent_store_sqlite::SqliteStateStore;
use ulid::Ulid;

fn must<T, E: std::fmt::Display>(result: Result<T, E>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => panic!("test failure: {err}"),
    }
}

fn temp_db() -> PathBuf {
    std::env::temp_dir().join(format!("decision-agent-cli-{}.sqlite3", Ulid::new()))
}

fn run(db: &Path, args: &[&str]) -> anyhow::Result<()> {
    let mut argv = vec!["da".to_string(), "--db".to_string(), db.display().to_string()];
    argv.extend(args.iter().map(|arg| (*arg).to_string()));
    run_cli(Cli::parse_from(argv))
}

fn open_agent(db: &Path) -> DecisionAgent<SqliteStateStore> {
    let store = must(SqliteStateStore::open(db));
    DecisionAgent::new(store, AgentConfig::default())
}

#[test]
fn process_then_feedback_adapts_and_persists() {
    let db = temp_db();

    must(run(
        &db,
        &[
            "process",
            "--context-json",
            r#"{"employee_count": 1792, "data_quality_score": 0.95, "calculated_value": 250000.0}"#,
        ],
    ));

    // The experience survives the process exit.
    let agent = open_agent(&db);
    assert_eq!(agent.experience_log().len(), 1);
    let fingerprint = agent.experience_log().experiences()[0].fingerprint.clone();
    drop(agent);

    must(run(
        &db,
        &[
            "feedback",
            "--id",
            &fingerprint,
            "--feedback-json",
            r#"{"performance": {"accuracy": 0.85}}"#,
        ],
    ));

    // Accuracy 0.85 nudges exactly the vacation benefit factor.
    let agent = open_agent(&db);
    let value = agent
        .parameter_set()
        .get(ParameterName::VacationBenefitFactor);
    assert!(value.is_some_and(|v| v > 3.5 && v < 3.51));
    assert_eq!(agent.status().total_adaptations, 1);
    drop(agent);

    let _ = std::fs::remove_file(&db);
}

#[test]
fn read_only_commands_work_after_processing() {
    let db = temp_db();

    must(run(
        &db,
        &[
            "process",
            "--context-json",
            r#"{"employee_count": 300, "calculated_value": 40000.0}"#,
        ],
    ));

    must(run(&db, &["status"]));
    must(run(&db, &["insights"]));
    must(run(&db, &["params", "show"]));
    must(run(&db, &["params", "suggest"]));
    must(run(&db, &["params", "stability"]));
    must(run(&db, &["trends", "--window-days", "30"]));
    must(run(&db, &["forecast", "--metric", "performance"]));
    must(run(&db, &["plan"]));

    let _ = std::fs::remove_file(&db);
}

#[test]
fn malformed_context_json_fails_cleanly() {
    let db = temp_db();

    let result = run(&db, &["process", "--context-json", "{not json"]);
    assert!(result.is_err());

    // Nothing was recorded.
    let agent = open_agent(&db);
    assert!(agent.experience_log().is_empty());
    drop(agent);

    let _ = std::fs::remove_file(&db);
}

#[test]
fn feedback_for_unknown_id_fails() {
    let db = temp_db();

    let result = run(
        &db,
        &[
            "feedback",
            "--id",
            "ffffffffffffffff",
            "--feedback-json",
            r#"{"performance": {"accuracy": 0.9}}"#,
        ],
    );
    assert!(result.is_err());

    let _ = std::fs::remove_file(&db);
}

#[test]
fn trends_on_empty_database_reports_sparsity() {
    let db = temp_db();

    let result = run(&db, &["trends"]);
    assert!(result.is_err());

    let _ = std::fs::remove_file(&db);
}
