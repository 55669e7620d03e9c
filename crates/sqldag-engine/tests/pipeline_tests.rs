//! End-to-end pipeline tests
//!
//! These tests drive a YAML job file through the orchestrator with the
//! in-memory executor and real CSV files on disk:
//! - Dependent jobs reading keys from an upstream output
//! - Selection with and without dependency closure
//! - Empty key sets and job-local failures

use sqldag_engine::testing::StubExecutor;
use sqldag_engine::{
    load_jobs, CsvKeySource, CsvSink, EngineError, Orchestrator, ResultSet, RunOptions, Value,
};
use std::path::Path;
use std::sync::Arc;

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

fn orchestrator(stub: &Arc<StubExecutor>) -> Orchestrator {
    Orchestrator::new(stub.clone(), Arc::new(CsvKeySource), Arc::new(CsvSink))
}

fn items() -> ResultSet {
    ResultSet::from_rows(
        vec!["salesOrderItemId".into(), "qty".into()],
        vec![
            vec![Value::from("SOI-1"), Value::Int(3)],
            vec![Value::from("SOI-2"), Value::Int(1)],
            vec![Value::from("SOI-1"), Value::Int(3)],
        ],
    )
}

// ============================================================================
// Dependent Jobs
// ============================================================================

#[tokio::test]
async fn test_downstream_job_filters_by_upstream_output() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(&root.join("sql/work_orders.sql"), "SELECT id FROM ids_cte WHERE :deleted = 'N'");
    write(
        &root.join("jobs.yml"),
        &format!(
            r#"
jobs:
  - name: n_WorkOrder
    depends_on: [n_SalesOrderItem]
    sql_file: sql/work_orders.sql
    output: {out}/n_WorkOrder.csv
    params: {{ deleted: "N" }}
    cte_from_csv:
      path: {out}/n_SalesOrderItem.csv
      column: salesorderitemid
      cte_column: id
      batch_size: 1
  - name: n_SalesOrderItem
    sql: SELECT * FROM sales_order_item
    output: {out}/n_SalesOrderItem.csv
    drop_duplicate_rows: true
"#,
            out = root.join("nodes").display()
        ),
    );

    let jobs = load_jobs(root.join("jobs.yml")).unwrap();
    let stub = Arc::new(StubExecutor::new().respond("sales_order_item", items()));
    let summary = orchestrator(&stub)
        .run(&jobs, &RunOptions::default())
        .await
        .unwrap();

    assert!(summary.success());
    let order: Vec<&str> = summary.reports.iter().map(|r| r.job.as_str()).collect();
    assert_eq!(order, vec!["n_SalesOrderItem", "n_WorkOrder"]);
    assert_eq!(summary.reports[0].rows, 2);
    assert_eq!(summary.reports[1].rows, 2);

    // One plain query, then one per key since batch_size is 1.
    let queries = stub.queries();
    assert_eq!(queries.len(), 3);
    assert!(queries[1].0.starts_with("WITH `ids_cte` AS (SELECT :id0_0 AS `id`)"));
    assert_eq!(queries[2].1.get("id1_0"), Some(&Value::from("SOI-2")));
    assert_eq!(queries[2].1.get("deleted"), Some(&Value::from("N")));
    assert_eq!(stub.commits(), 1);

    let upstream = std::fs::read_to_string(root.join("nodes/n_SalesOrderItem.csv")).unwrap();
    assert_eq!(upstream, "salesOrderItemId,qty\nSOI-1,3\nSOI-2,1\n");
    let downstream = std::fs::read_to_string(root.join("nodes/n_WorkOrder.csv")).unwrap();
    assert_eq!(downstream, "id\nSOI-1\nSOI-2\n");
}

// ============================================================================
// Selection
// ============================================================================

#[tokio::test]
async fn test_only_with_include_deps_runs_closure_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path();
    let jobs = vec![
        sqldag_engine::Job::new("X").sql("SELECT 1").output(out.join("x.csv")),
        sqldag_engine::Job::new("unrelated").sql("SELECT 2").output(out.join("u.csv")),
        sqldag_engine::Job::new("Y")
            .depends_on(["X"])
            .sql("SELECT 3")
            .output(out.join("y.csv")),
    ];
    let stub = Arc::new(StubExecutor::new());
    let options = RunOptions {
        selection: vec!["Y".into()],
        include_deps: true,
        ..Default::default()
    };

    let summary = orchestrator(&stub).run(&jobs, &options).await.unwrap();
    let order: Vec<&str> = summary.reports.iter().map(|r| r.job.as_str()).collect();
    assert_eq!(order, vec!["X", "Y"]);
    assert!(!out.join("u.csv").exists());
}

#[tokio::test]
async fn test_unknown_selection_fails_before_any_job() {
    let jobs = vec![sqldag_engine::Job::new("a").sql("SELECT 1").output("a.csv")];
    let stub = Arc::new(StubExecutor::new());
    let options = RunOptions {
        selection: vec!["b".into(), "c".into(), "b".into()],
        ..Default::default()
    };

    match orchestrator(&stub).run(&jobs, &options).await {
        Err(EngineError::UnknownJob(names)) => assert_eq!(names, vec!["b", "c"]),
        other => panic!("expected UnknownJob, got {:?}", other.map(|s| s.reports.len())),
    }
    assert!(stub.queries().is_empty());
}

// ============================================================================
// Empty Keys and Failures
// ============================================================================

#[tokio::test]
async fn test_empty_upstream_gives_empty_downstream_without_queries() {
    let dir = tempfile::tempdir().unwrap();
    let keys = dir.path().join("keys.csv");
    write(&keys, "id\n");
    let jobs = vec![sqldag_engine::Job::new("down")
        .sql("SELECT id FROM ids_cte")
        .output(dir.path().join("down.csv"))
        .key_filter(sqldag_engine::KeyFilter::new(&keys, "id"))];

    let stub = Arc::new(StubExecutor::new());
    let summary = orchestrator(&stub)
        .run(&jobs, &RunOptions::default())
        .await
        .unwrap();

    assert!(summary.success());
    assert!(summary.any_empty());
    assert!(stub.queries().is_empty());
    assert_eq!(stub.commits(), 0);
}

#[tokio::test]
async fn test_failed_upstream_does_not_abort_dependents() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path();
    let jobs = vec![
        sqldag_engine::Job::new("up").sql("SELECT broken").output(out.join("up.csv")),
        sqldag_engine::Job::new("down")
            .depends_on(["up"])
            .sql("SELECT 1")
            .output(out.join("down.csv")),
    ];
    let stub = Arc::new(StubExecutor::new().fail_on("broken"));

    let summary = orchestrator(&stub)
        .run(&jobs, &RunOptions::default())
        .await
        .unwrap();

    assert!(!summary.success());
    assert_eq!(summary.failed(), 1);
    assert!(summary.reports[1].success);
    assert_eq!(stub.queries().len(), 2);
}
