//! Tabular values moved between the executor, the merger and the sink

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Named query parameters, bound into `:name` placeholders
pub type Params = BTreeMap<String, Value>;

/// A single scalar cell or parameter value
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

// Floats compare by bit pattern so rows can be hashed for duplicate removal.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::UInt(a), Value::UInt(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {},
            Value::Bool(v) => v.hash(state),
            Value::Int(v) => v.hash(state),
            Value::UInt(v) => v.hash(state),
            Value::Float(v) => v.to_bits().hash(state),
            Value::Text(v) => v.hash(state),
            Value::Bytes(v) => v.hash(state),
        }
    }
}

/// Renders the value as a CSV field; NULL becomes an empty field.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::UInt(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(v) => f.write_str(v),
            Value::Bytes(v) => f.write_str(&String::from_utf8_lossy(v)),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

/// Ordered rows sharing one ordered column schema
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build from columns and rows; every row must match the column count.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        debug_assert!(rows.iter().all(|r| r.len() == columns.len()));
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push_row(&mut self, row: Vec<Value>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    /// Append another set's rows. Caller guarantees identical columns.
    pub(crate) fn extend_rows(&mut self, other: ResultSet) {
        self.rows.extend(other.rows);
    }

    /// Cell lookup by column name, mostly useful in tests
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// Keep the first occurrence of each distinct row.
    pub fn drop_duplicate_rows(&mut self) {
        let mut seen: HashSet<Vec<Value>> = HashSet::with_capacity(self.rows.len());
        self.rows.retain(|row| seen.insert(row.clone()));
    }

    /// Remove every column named in `names`.
    pub fn drop_columns(&mut self, names: &[String]) {
        let drop: HashSet<&str> = names.iter().map(String::as_str).collect();
        let keep: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| !drop.contains(c.as_str()))
            .map(|(i, _)| i)
            .collect();
        self.project(&keep);
    }

    /// Keep only the named columns, in the order given. Unknown names are ignored.
    pub fn select_columns(&mut self, names: &[String]) {
        let mut picked: Vec<usize> = Vec::with_capacity(names.len());
        for name in names {
            if let Some(idx) = self.columns.iter().position(|c| c == name) {
                if !picked.contains(&idx) {
                    picked.push(idx);
                }
            }
        }
        self.project(&picked);
    }

    /// Zero remaining columns leaves zero rows, matching what the sink writes.
    fn project(&mut self, indices: &[usize]) {
        if indices.is_empty() {
            self.columns.clear();
            self.rows.clear();
            return;
        }
        if indices.len() == self.columns.len() && indices.iter().enumerate().all(|(i, &j)| i == j)
        {
            return;
        }
        self.columns = indices.iter().map(|&i| self.columns[i].clone()).collect();
        for row in &mut self.rows {
            let mut old = std::mem::take(row);
            *row = indices
                .iter()
                .map(|&i| std::mem::replace(&mut old[i], Value::Null))
                .collect();
        }
    }
}
