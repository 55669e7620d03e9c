//! Batched key planning
//!
//! A job filtered by thousands of external keys cannot bind them all in one
//! statement: backends cap the number of placeholders. The planner splits the
//! key list into fixed-size batches and turns each batch into an inline
//! relation built from bound literals:
//!
//! ```sql
//! WITH `ids_cte` AS (SELECT :id0_0 AS `soi` UNION ALL SELECT :id0_1 AS `soi`)
//! SELECT ... FROM work_order w JOIN ids_cte i ON i.soi = w.sales_order_item_id
//! ```
//!
//! Parameter names embed the batch index and the position in the batch, so
//! they are unique across the whole job invocation. Relation and column names
//! are backtick-quoted, so key columns such as `工單編號` or `order id` work.

use crate::error::{EngineError, Result};
use crate::table::{Params, Value};

/// Keys per batch unless the job overrides it; stays under common placeholder limits.
pub const DEFAULT_BATCH_SIZE: usize = 800;

/// Relation name used when `cte_name` is not given
pub const DEFAULT_RELATION_NAME: &str = "ids_cte";

/// Prefix of generated key parameter names (`id<batch>_<position>`)
pub const KEY_PARAM_PREFIX: &str = "id";

/// One planned round-trip
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPlan<'k> {
    pub index: usize,
    pub keys: &'k [String],
    /// `<relation> AS (SELECT ... UNION ALL ...)`, without the `WITH`
    pub relation: String,
    pub params: Params,
}

impl BatchPlan<'_> {
    /// Prefix the batch relation onto a base query.
    ///
    /// A base query that already opens with `WITH` (or `WITH RECURSIVE`) gets the
    /// batch relation spliced in as its first common table expression.
    pub fn apply_to(&self, base_query: &str) -> String {
        let trimmed = base_query.trim_start();
        match strip_keyword(trimmed, "WITH") {
            Some(rest) => match strip_keyword(rest.trim_start(), "RECURSIVE") {
                Some(after) => format!("WITH RECURSIVE {},\n{}", self.relation, after.trim_start()),
                None => format!("WITH {},\n{}", self.relation, rest.trim_start()),
            },
            None => format!("WITH {}\n{}", self.relation, base_query),
        }
    }
}

fn strip_keyword<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let head = text.get(..keyword.len())?;
    let rest = &text[keyword.len()..];
    let boundary = rest.chars().next().map_or(false, char::is_whitespace);
    (head.eq_ignore_ascii_case(keyword) && boundary).then_some(rest)
}

/// Splits key lists into [`BatchPlan`]s for one relation
#[derive(Debug, Clone)]
pub struct BatchedQueryPlanner {
    relation: String,
    column: String,
    batch_size: usize,
    cast: Option<String>,
}

impl BatchedQueryPlanner {
    pub fn new(
        relation: impl Into<String>,
        column: impl Into<String>,
        batch_size: usize,
    ) -> Result<Self> {
        let relation = relation.into();
        let column = column.into();

        let mut problems = Vec::new();
        if batch_size == 0 {
            problems.push("batch_size must be a positive integer".to_string());
        }
        for ident in [&relation, &column] {
            if let Err(msg) = check_identifier(ident) {
                problems.push(msg);
            }
        }
        if !problems.is_empty() {
            return Err(EngineError::InvalidConfiguration(problems));
        }

        Ok(Self {
            relation,
            column,
            batch_size,
            cast: None,
        })
    }

    /// Wrap every bound key in `CAST(... AS <cast>)`
    pub fn with_cast(mut self, cast: Option<String>) -> Result<Self> {
        if let Some(ref c) = cast {
            check_cast(c).map_err(EngineError::invalid_configuration)?;
        }
        self.cast = cast;
        Ok(self)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Plan `ceil(keys.len() / batch_size)` batches; no keys means no batches.
    pub fn plan<'k>(&self, keys: &'k [String]) -> Vec<BatchPlan<'k>> {
        keys.chunks(self.batch_size)
            .enumerate()
            .map(|(index, chunk)| self.plan_one(index, chunk))
            .collect()
    }

    fn plan_one<'k>(&self, index: usize, keys: &'k [String]) -> BatchPlan<'k> {
        let mut params = Params::new();
        let mut selects = Vec::with_capacity(keys.len());

        for (position, key) in keys.iter().enumerate() {
            let name = param_name(index, position);
            let placeholder = match self.cast {
                Some(ref cast) => format!("CAST(:{} AS {})", name, cast),
                None => format!(":{}", name),
            };
            selects.push(format!(
                "SELECT {} AS {}",
                placeholder,
                quote_identifier(&self.column)
            ));
            params.insert(name, Value::Text(key.clone()));
        }

        BatchPlan {
            index,
            keys,
            relation: format!(
                "{} AS ({})",
                quote_identifier(&self.relation),
                selects.join(" UNION ALL ")
            ),
            params,
        }
    }
}

/// Generated parameter name for a key
pub fn param_name(batch: usize, position: usize) -> String {
    format!("{}{}_{}", KEY_PARAM_PREFIX, batch, position)
}

/// MySQL quoted identifier; embedded backticks are doubled.
pub fn quote_identifier(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

/// Quoted identifiers accept any text except blanks and NUL.
pub(crate) fn check_identifier(ident: &str) -> std::result::Result<(), String> {
    if ident.trim().is_empty() {
        Err("relation and column names must not be empty".to_string())
    } else if ident.contains('\0') {
        Err(format!("'{}' is not a valid SQL identifier", ident.escape_default()))
    } else {
        Ok(())
    }
}

/// Cast targets look like `CHAR(36)`, `UNSIGNED`, `DECIMAL(10, 2)`.
pub(crate) fn check_cast(cast: &str) -> std::result::Result<(), String> {
    let valid = !cast.trim().is_empty()
        && cast.chars().next().map_or(false, |c| c.is_ascii_alphabetic())
        && cast
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | ' ' | '(' | ')' | ','));
    if valid {
        Ok(())
    } else {
        Err(format!("'{}' is not a valid cast type", cast))
    }
}
