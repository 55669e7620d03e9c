//! Job dependency graph
//!
//! Edges point from a dependency to the job that needs it. Ordering uses Kahn's
//! algorithm with a FIFO queue seeded in declaration order, so ties are broken by
//! the order jobs appear in the job file rather than by name.

use crate::error::{EngineError, Result};
use crate::job::Job;
use std::collections::{HashMap, VecDeque};
use tracing::debug;

#[derive(Debug)]
pub struct JobGraph<'a> {
    jobs: &'a [Job],
    /// dependency index -> dependents, in declaration order
    dependents: Vec<Vec<usize>>,
    /// job index -> its dependencies
    dependencies: Vec<Vec<usize>>,
    in_degree: Vec<usize>,
}

impl<'a> JobGraph<'a> {
    /// Build adjacency and in-degrees; every `depends_on` entry must name a job.
    pub fn build(jobs: &'a [Job]) -> Result<Self> {
        let mut index: HashMap<&str, usize> = HashMap::with_capacity(jobs.len());
        for (i, job) in jobs.iter().enumerate() {
            if index.insert(job.name.as_str(), i).is_some() {
                return Err(EngineError::invalid_configuration(format!(
                    "duplicate job name '{}'",
                    job.name
                )));
            }
        }

        let mut dependents = vec![Vec::new(); jobs.len()];
        let mut dependencies = vec![Vec::new(); jobs.len()];
        let mut in_degree = vec![0; jobs.len()];

        for (i, job) in jobs.iter().enumerate() {
            for dep in &job.depends_on {
                let &d = index.get(dep.as_str()).ok_or_else(|| EngineError::UnknownDependency {
                    job: job.name.clone(),
                    dependency: dep.clone(),
                })?;
                dependents[d].push(i);
                dependencies[i].push(d);
                in_degree[i] += 1;
            }
        }

        Ok(Self {
            jobs,
            dependents,
            dependencies,
            in_degree,
        })
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Every job exactly once, each after all of its dependencies.
    pub fn topological_order(&self) -> Result<Vec<&'a Job>> {
        let mut in_degree = self.in_degree.clone();
        let mut queue: VecDeque<usize> = (0..self.jobs.len())
            .filter(|&i| in_degree[i] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.jobs.len());

        while let Some(n) = queue.pop_front() {
            order.push(n);
            for &m in &self.dependents[n] {
                in_degree[m] -= 1;
                if in_degree[m] == 0 {
                    queue.push_back(m);
                }
            }
        }

        if order.len() < self.jobs.len() {
            let cycle = self.find_cycle(&in_degree);
            return Err(EngineError::CycleDetected {
                ordered: order.len(),
                total: self.jobs.len(),
                cycle,
            });
        }

        debug!(jobs = order.len(), "Resolved topological order");
        Ok(order.into_iter().map(|i| &self.jobs[i]).collect())
    }

    /// Walk unresolved dependencies backwards until a job repeats.
    ///
    /// Every job left with a positive in-degree still has at least one
    /// unresolved dependency, so the walk cannot dead-end.
    fn find_cycle(&self, remaining: &[usize]) -> Vec<String> {
        let Some(start) = (0..self.jobs.len()).find(|&i| remaining[i] > 0) else {
            return Vec::new();
        };

        let mut path = vec![start];
        let mut position = HashMap::from([(start, 0usize)]);
        let mut current = start;

        loop {
            let Some(&next) = self.dependencies[current]
                .iter()
                .find(|&&d| remaining[d] > 0)
            else {
                return Vec::new();
            };
            if let Some(&at) = position.get(&next) {
                // path runs job <- dependency; flip it to read along the edges
                let mut cycle = vec![self.jobs[next].name.clone()];
                cycle.extend(path[at..].iter().rev().map(|&i| self.jobs[i].name.clone()));
                return cycle;
            }
            position.insert(next, path.len());
            path.push(next);
            current = next;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn names(order: &[&Job]) -> Vec<String> {
        order.iter().map(|j| j.name.clone()).collect()
    }

    #[test]
    fn test_dependency_comes_first() {
        let jobs = vec![Job::new("Y").depends_on(["X"]), Job::new("X")];
        let graph = JobGraph::build(&jobs).unwrap();
        assert_eq!(names(&graph.topological_order().unwrap()), vec!["X", "Y"]);
    }

    #[test]
    fn test_ties_follow_declaration_order() {
        let jobs = vec![
            Job::new("c"),
            Job::new("a"),
            Job::new("d").depends_on(["c"]),
            Job::new("b"),
        ];
        let order = JobGraph::build(&jobs).unwrap().topological_order().unwrap();
        assert_eq!(names(&order), vec!["c", "a", "b", "d"]);
    }

    #[test]
    fn test_unknown_dependency() {
        let jobs = vec![Job::new("a").depends_on(["ghost"])];
        match JobGraph::build(&jobs).unwrap_err() {
            EngineError::UnknownDependency { job, dependency } => {
                assert_eq!(job, "a");
                assert_eq!(dependency, "ghost");
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_cycle_reports_path() {
        let jobs = vec![
            Job::new("root"),
            Job::new("b").depends_on(["root", "c"]),
            Job::new("c").depends_on(["b"]),
            Job::new("tail").depends_on(["c"]),
        ];
        let err = JobGraph::build(&jobs).unwrap().topological_order().unwrap_err();
        match err {
            EngineError::CycleDetected {
                ordered,
                total,
                cycle,
            } => {
                assert_eq!(ordered, 1);
                assert_eq!(total, 4);
                assert_eq!(cycle, vec!["b", "c", "b"]);
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let jobs = vec![Job::new("a").depends_on(["a"])];
        let err = JobGraph::build(&jobs).unwrap().topological_order().unwrap_err();
        assert!(matches!(err, EngineError::CycleDetected { ref cycle, .. } if cycle == &["a", "a"]));
    }

    /// Random DAGs: job i may only depend on jobs with a smaller index, then the
    /// declaration order is shuffled by reversing.
    fn dag_strategy() -> impl Strategy<Value = Vec<Job>> {
        (1usize..25)
            .prop_flat_map(|n| {
                proptest::collection::vec(proptest::collection::vec(any::<prop::sample::Index>(), 0..4), n)
            })
            .prop_map(|edges| {
                let mut jobs: Vec<Job> = edges
                    .iter()
                    .enumerate()
                    .map(|(i, picks)| {
                        let deps: Vec<String> = if i == 0 {
                            Vec::new()
                        } else {
                            picks.iter().map(|p| format!("j{}", p.index(i))).collect()
                        };
                        Job::new(format!("j{}", i)).depends_on(deps)
                    })
                    .collect();
                jobs.reverse();
                jobs
            })
    }

    proptest! {
        #[test]
        fn prop_order_respects_every_edge(jobs in dag_strategy()) {
            let order = JobGraph::build(&jobs).unwrap().topological_order().unwrap();
            prop_assert_eq!(order.len(), jobs.len());

            let pos: HashMap<&str, usize> = order
                .iter()
                .enumerate()
                .map(|(i, j)| (j.name.as_str(), i))
                .collect();
            prop_assert_eq!(pos.len(), jobs.len());

            for job in &jobs {
                for dep in &job.depends_on {
                    prop_assert!(pos[dep.as_str()] < pos[job.name.as_str()]);
                }
            }
        }
    }
}
