//! Job selection
//!
//! Narrows a run to the requested jobs, optionally pulling in everything they
//! transitively depend on. Running a job without its dependencies is allowed;
//! nothing checks that their outputs already exist.

use crate::error::{EngineError, Result};
use crate::job::Job;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Split `--only` values: comma-separated and repeatable, blanks dropped.
pub fn split_job_names<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    raw.iter()
        .flat_map(|item| item.as_ref().split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Resolve requested names into the set of jobs to run.
///
/// Unknown names are reported together. With `include_deps` the set is the
/// transitive dependency closure of the request.
pub fn resolve(requested: &[String], jobs: &[Job], include_deps: bool) -> Result<BTreeSet<String>> {
    let deps: HashMap<&str, &[String]> = jobs
        .iter()
        .map(|j| (j.name.as_str(), j.depends_on.as_slice()))
        .collect();

    let mut unknown: Vec<String> = Vec::new();
    for name in requested {
        if !deps.contains_key(name.as_str()) && !unknown.contains(name) {
            unknown.push(name.clone());
        }
    }
    if !unknown.is_empty() {
        return Err(EngineError::UnknownJob(unknown));
    }

    if !include_deps {
        return Ok(requested.iter().cloned().collect());
    }

    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut stack: Vec<&str> = requested.iter().map(String::as_str).collect();
    while let Some(name) = stack.pop() {
        if !seen.insert(name.to_string()) {
            continue;
        }
        for dep in deps.get(name).copied().unwrap_or_default() {
            if !seen.contains(dep.as_str()) {
                stack.push(dep.as_str());
            }
        }
    }

    Ok(seen)
}

/// Keep the jobs of `order` that are in `selected`, preserving their order.
pub fn filter_order<'a>(order: Vec<&'a Job>, selected: &BTreeSet<String>) -> Vec<&'a Job> {
    let wanted: HashSet<&str> = selected.iter().map(String::as_str).collect();
    order
        .into_iter()
        .filter(|job| wanted.contains(job.name.as_str()))
        .collect()
}
