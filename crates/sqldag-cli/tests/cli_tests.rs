//! End-to-end tests for the sqldag binary
//!
//! None of these reach a database:
//! - Listing jobs without a connection URL
//! - Exit code 2 for a missing URL
//! - Fatal job file problems (unknown names, cycles, empty files) exit 1
//!   before any connection is attempted

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;

const JOBS: &str = r#"
jobs:
  - name: n_SalesOrderItem
    sql: SELECT * FROM sales_order_item
    output: nodes/n_SalesOrderItem.csv
  - name: n_WorkOrder
    depends_on: [n_SalesOrderItem]
    sql: SELECT * FROM work_order w JOIN ids_cte i ON i.soi = w.sales_order_item_id
    output: nodes/n_WorkOrder.csv
    cte_from_csv:
      path: nodes/n_SalesOrderItem.csv
      column: salesOrderItemId
      cte_column: soi
"#;

fn write_jobs(dir: &Path, content: &str) -> std::path::PathBuf {
    let path = dir.join("jobs.yml");
    std::fs::write(&path, content).unwrap();
    path
}

fn sqldag(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("sqldag").unwrap();
    cmd.current_dir(dir)
        .env_remove("REMOTE_DB_URL")
        .env_remove("LOG_LEVEL")
        .env_remove("LOG_OUTPUT");
    cmd
}

// ============================================================================
// Listing
// ============================================================================

#[test]
fn test_list_needs_no_database_url() {
    let dir = tempfile::tempdir().unwrap();
    let jobs = write_jobs(dir.path(), JOBS);

    sqldag(dir.path())
        .arg("--jobs")
        .arg(&jobs)
        .arg("--list")
        .assert()
        .success()
        .stdout("n_SalesOrderItem\nn_WorkOrder\n");
}

#[test]
fn test_help_mentions_selection_flags() {
    let dir = tempfile::tempdir().unwrap();
    sqldag(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--only"))
        .stdout(predicate::str::contains("--include-deps"))
        .stdout(predicate::str::contains("--fail-on-empty"));
}

// ============================================================================
// Exit Codes
// ============================================================================

#[test]
fn test_missing_url_exits_2() {
    let dir = tempfile::tempdir().unwrap();
    let jobs = write_jobs(dir.path(), JOBS);

    sqldag(dir.path())
        .arg("--jobs")
        .arg(&jobs)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("REMOTE_DB_URL"));
}

#[test]
fn test_unknown_only_exits_1_listing_all_names() {
    let dir = tempfile::tempdir().unwrap();
    let jobs = write_jobs(dir.path(), JOBS);

    sqldag(dir.path())
        .arg("--jobs")
        .arg(&jobs)
        .arg("--remote-url")
        .arg("mysql://u:p@127.0.0.1:1/none")
        .arg("--only")
        .arg("nope,n_WorkOrder")
        .arg("--only")
        .arg("missing")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unknown job name(s): nope, missing"));
}

#[test]
fn test_cycle_exits_1_with_path() {
    let dir = tempfile::tempdir().unwrap();
    let jobs = write_jobs(
        dir.path(),
        r#"
jobs:
  - { name: a, depends_on: [b], sql: SELECT 1, output: a.csv }
  - { name: b, depends_on: [a], sql: SELECT 1, output: b.csv }
"#,
    );

    sqldag(dir.path())
        .arg("--jobs")
        .arg(&jobs)
        .arg("--remote-url")
        .arg("mysql://u:p@127.0.0.1:1/none")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Cycle detected"));
}

#[test]
fn test_unknown_dependency_exits_1() {
    let dir = tempfile::tempdir().unwrap();
    let jobs = write_jobs(
        dir.path(),
        "jobs:\n  - { name: a, depends_on: [ghost], sql: SELECT 1, output: a.csv }\n",
    );

    sqldag(dir.path())
        .arg("--jobs")
        .arg(&jobs)
        .arg("--remote-url")
        .arg("mysql://u:p@127.0.0.1:1/none")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unknown job 'ghost'"));
}

#[test]
fn test_empty_job_file_exits_1() {
    let dir = tempfile::tempdir().unwrap();
    let jobs = write_jobs(dir.path(), "jobs: []\n");

    sqldag(dir.path())
        .arg("--jobs")
        .arg(&jobs)
        .arg("--list")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No jobs found"));
}

#[test]
fn test_invalid_job_file_reports_every_problem() {
    let dir = tempfile::tempdir().unwrap();
    let jobs = write_jobs(
        dir.path(),
        r#"
jobs:
  - { name: a, sql: SELECT 1, sql_file: a.sql }
  - { name: a, sql: SELECT 2 }
"#,
    );

    sqldag(dir.path())
        .arg("--jobs")
        .arg(&jobs)
        .arg("--list")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("both 'sql' and 'sql_file'"))
        .stderr(predicate::str::contains("duplicate job name 'a'"));
}
