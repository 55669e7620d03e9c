//! Job definitions
//!
//! A job file is YAML with a top-level `jobs:` list:
//!
//! ```yaml
//! jobs:
//!   - name: n_SalesOrderItem
//!     sql_file: sql/sales_order_item.sql
//!     output: ./nodes/n_SalesOrderItem.csv
//!   - name: n_WorkOrder
//!     depends_on: [n_SalesOrderItem]
//!     sql: SELECT * FROM work_order w JOIN ids_cte i ON i.soi = w.sales_order_item_id
//!     output: ./nodes/n_WorkOrder.csv
//!     params: { schedule_type: 2 }
//!     cte_from_csv:
//!       path: ./nodes/n_SalesOrderItem.csv
//!       column: salesOrderItemId
//!       cte_column: soi
//!     drop_duplicate_rows: true
//! ```
//!
//! The raw serde model ([`JobFile`], [`JobSpec`]) is validated in a single pass
//! into strongly typed [`Job`]s. All problems are collected into one
//! [`EngineError::InvalidConfiguration`] rather than failing on the first.
//!
//! A missing `output` and a missing `sql`/`sql_file` are deliberately *not*
//! validation errors: they fail only the affected job at run time.

use crate::batch::{check_cast, check_identifier, DEFAULT_BATCH_SIZE, DEFAULT_RELATION_NAME};
use crate::error::{EngineError, Result};
use crate::table::{Params, Value};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

// ============================================================================
// Raw file model
// ============================================================================

/// Top-level job file
#[derive(Debug, Clone, Deserialize)]
pub struct JobFile {
    #[serde(default)]
    pub jobs: Vec<JobSpec>,
}

/// One entry of the `jobs:` list, as written
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobSpec {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
    pub sql: Option<String>,
    pub sql_file: Option<PathBuf>,
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub params: BTreeMap<String, serde_yaml::Value>,
    pub cte_from_csv: Option<OneOrMany<KeyFilterSpec>>,
    #[serde(default)]
    pub drop_duplicate_rows: bool,
    pub select_columns: Option<Vec<String>>,
    pub drop_columns: Option<Vec<String>>,
}

/// `cte_from_csv` accepts a single object or a list
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(v) => vec![v],
            OneOrMany::Many(v) => v,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyFilterSpec {
    pub path: PathBuf,
    pub column: String,
    pub cte_name: Option<String>,
    pub cte_column: Option<String>,
    pub batch_size: Option<i64>,
    pub cast: Option<String>,
}

// ============================================================================
// Validated model
// ============================================================================

/// Where a job's query text comes from
#[derive(Debug, Clone, PartialEq)]
pub enum QuerySource {
    Inline(String),
    /// Path already resolved against the job file's directory
    File(PathBuf),
}

impl QuerySource {
    pub async fn load(&self) -> Result<String> {
        match self {
            QuerySource::Inline(sql) => Ok(sql.clone()),
            QuerySource::File(path) => tokio::fs::read_to_string(path)
                .await
                .map_err(|e| EngineError::io(path, e)),
        }
    }
}

/// Filter a job's query by key values read from an external CSV
#[derive(Debug, Clone, PartialEq)]
pub struct KeyFilter {
    pub path: PathBuf,
    pub column: String,
    pub relation: String,
    pub relation_column: String,
    pub batch_size: usize,
    pub cast: Option<String>,
}

impl KeyFilter {
    pub fn new(path: impl Into<PathBuf>, column: impl Into<String>) -> Self {
        let column = column.into();
        Self {
            path: path.into(),
            relation: DEFAULT_RELATION_NAME.to_string(),
            relation_column: column.clone(),
            column,
            batch_size: DEFAULT_BATCH_SIZE,
            cast: None,
        }
    }

    pub fn relation(mut self, name: impl Into<String>, column: impl Into<String>) -> Self {
        self.relation = name.into();
        self.relation_column = column.into();
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn cast(mut self, cast: impl Into<String>) -> Self {
        self.cast = Some(cast.into());
        self
    }
}

/// Row and column shaping applied after all batches are merged
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostProcessing {
    pub drop_duplicate_rows: bool,
    pub drop_columns: Option<Vec<String>>,
    pub select_columns: Option<Vec<String>>,
}

/// A validated job
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub name: String,
    pub depends_on: Vec<String>,
    pub query: Option<QuerySource>,
    pub output: Option<PathBuf>,
    pub params: Params,
    pub key_filters: Vec<KeyFilter>,
    pub post: PostProcessing,
}

impl Job {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            depends_on: Vec::new(),
            query: None,
            output: None,
            params: Params::new(),
            key_filters: Vec::new(),
            post: PostProcessing::default(),
        }
    }

    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn sql(mut self, sql: impl Into<String>) -> Self {
        self.query = Some(QuerySource::Inline(sql.into()));
        self
    }

    pub fn sql_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.query = Some(QuerySource::File(path.into()));
        self
    }

    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn key_filter(mut self, filter: KeyFilter) -> Self {
        self.key_filters.push(filter);
        self
    }

    pub fn post_processing(mut self, post: PostProcessing) -> Self {
        self.post = post;
        self
    }
}

// ============================================================================
// Loading and validation
// ============================================================================

/// Read and validate a job file. `sql_file` paths resolve against its directory.
pub fn load_jobs(path: impl AsRef<Path>) -> Result<Vec<Job>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;
    let file: JobFile = serde_yaml::from_str(&content)?;
    let base_dir = path
        .canonicalize()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));

    debug!(path = %path.display(), jobs = file.jobs.len(), "Parsed job file");
    file.into_jobs(&base_dir)
}

impl JobFile {
    /// Validate every spec, reporting all problems at once
    pub fn into_jobs(self, base_dir: &Path) -> Result<Vec<Job>> {
        let mut problems = Vec::new();
        let mut seen = HashSet::new();
        let mut jobs = Vec::with_capacity(self.jobs.len());

        for (position, spec) in self.jobs.into_iter().enumerate() {
            let label = if spec.name.trim().is_empty() {
                problems.push(format!("job #{} has an empty 'name'", position + 1));
                format!("#{}", position + 1)
            } else {
                spec.name.clone()
            };

            if !spec.name.is_empty() && !seen.insert(spec.name.clone()) {
                problems.push(format!("duplicate job name '{}'", spec.name));
            }

            if let Some(job) = spec.validate(&label, base_dir, &mut problems) {
                jobs.push(job);
            }
        }

        if problems.is_empty() {
            Ok(jobs)
        } else {
            Err(EngineError::InvalidConfiguration(problems))
        }
    }
}

impl JobSpec {
    fn validate(self, label: &str, base_dir: &Path, problems: &mut Vec<String>) -> Option<Job> {
        let before = problems.len();

        let query = match (self.sql, self.sql_file) {
            (Some(_), Some(_)) => {
                problems.push(format!("job '{}' sets both 'sql' and 'sql_file'", label));
                None
            },
            (Some(sql), None) if !sql.trim().is_empty() => Some(QuerySource::Inline(sql)),
            (_, Some(file)) => Some(QuerySource::File(base_dir.join(file))),
            _ => None,
        };

        let mut params = Params::new();
        for (key, raw) in self.params {
            match scalar_from_yaml(raw) {
                Some(value) => {
                    params.insert(key, value);
                },
                None => problems.push(format!(
                    "job '{}' param '{}' must be a scalar value",
                    label, key
                )),
            }
        }

        let mut key_filters = Vec::new();
        for spec in self.cte_from_csv.map(OneOrMany::into_vec).unwrap_or_default() {
            let relation = spec
                .cte_name
                .unwrap_or_else(|| DEFAULT_RELATION_NAME.to_string());
            let relation_column = spec.cte_column.unwrap_or_else(|| spec.column.clone());

            if spec.column.trim().is_empty() {
                problems.push(format!("job '{}' cte_from_csv has an empty 'column'", label));
            }
            for ident in [&relation, &relation_column] {
                if let Err(msg) = check_identifier(ident) {
                    problems.push(format!("job '{}' cte_from_csv: {}", label, msg));
                }
            }
            if let Some(cast) = spec.cast.as_deref() {
                if let Err(msg) = check_cast(cast) {
                    problems.push(format!("job '{}' cte_from_csv: {}", label, msg));
                }
            }

            let batch_size = match spec.batch_size {
                None => DEFAULT_BATCH_SIZE,
                Some(n) if n > 0 => n as usize,
                Some(n) => {
                    problems.push(format!(
                        "job '{}' cte_from_csv batch_size must be positive, got {}",
                        label, n
                    ));
                    DEFAULT_BATCH_SIZE
                },
            };

            key_filters.push(KeyFilter {
                path: spec.path,
                column: spec.column,
                relation,
                relation_column,
                batch_size,
                cast: spec.cast,
            });
        }

        if problems.len() > before {
            return None;
        }

        Some(Job {
            name: self.name,
            depends_on: self.depends_on,
            query,
            output: self.output,
            params,
            key_filters,
            post: PostProcessing {
                drop_duplicate_rows: self.drop_duplicate_rows,
                drop_columns: self.drop_columns,
                select_columns: self.select_columns,
            },
        })
    }
}

fn scalar_from_yaml(raw: serde_yaml::Value) -> Option<Value> {
    match raw {
        serde_yaml::Value::Null => Some(Value::Null),
        serde_yaml::Value::Bool(b) => Some(Value::Bool(b)),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Value::Int(i))
            } else if let Some(u) = n.as_u64() {
                Some(Value::UInt(u))
            } else {
                n.as_f64().map(Value::Float)
            }
        },
        serde_yaml::Value::String(s) => Some(Value::Text(s)),
        _ => None,
    }
}
