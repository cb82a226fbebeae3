//! Structured join over concurrent per-task parameter fetches.
//!
//! Every fetch is awaited to completion before the result is returned;
//! successes and failures are collected separately so one failing task never
//! hides the others.

use futures::future::join_all;
use incarforge_core::{Catalog, CatalogError, ParamMap};
use serde::Serialize;
use tracing::{debug, warn};

/// The settled outcome of fetching several tasks' parameters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskParamsJoin {
    /// Tasks that returned parameters, in request order.
    pub loaded: Vec<(String, ParamMap)>,
    /// Tasks whose fetch failed, in request order.
    #[serde(serialize_with = "serialize_failures")]
    pub failed: Vec<(String, CatalogError)>,
}

impl TaskParamsJoin {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

fn serialize_failures<S>(failed: &[(String, CatalogError)], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    use serde::ser::SerializeSeq;
    let mut seq = serializer.serialize_seq(Some(failed.len()))?;
    for (task, error) in failed {
        seq.serialize_element(&(task, error.to_string()))?;
    }
    seq.end()
}

/// Fetch parameters for every task concurrently and wait for all of them.
pub async fn fetch_task_params(catalog: &dyn Catalog, tasks: &[String]) -> TaskParamsJoin {
    let outcomes = join_all(tasks.iter().map(|task| catalog.task_params(task))).await;

    let mut join = TaskParamsJoin::default();
    for (task, outcome) in tasks.iter().zip(outcomes) {
        match outcome {
            Ok(params) => {
                debug!(task = %task, keys = params.len(), "Task parameters fetched");
                join.loaded.push((task.clone(), params));
            }
            Err(e) => {
                warn!(task = %task, error = %e, "Task parameter fetch failed");
                join.failed.push((task.clone(), e));
            }
        }
    }
    join
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use incarforge_core::{CategoryEntry, StandardSections};
    use std::time::Duration;

    /// Answers with a delay inversely related to position, so completion
    /// order differs from request order.
    struct SlowCatalog;

    #[async_trait]
    impl Catalog for SlowCatalog {
        fn name(&self) -> &str {
            "slow"
        }

        async fn categories(&self) -> Result<Vec<CategoryEntry>, CatalogError> {
            Ok(Vec::new())
        }

        async fn standard_sections(&self) -> Result<StandardSections, CatalogError> {
            Ok(StandardSections::new())
        }

        async fn task_params(&self, task: &str) -> Result<ParamMap, CatalogError> {
            let delay = match task {
                "Opt" => 30,
                "NEB" => 10,
                _ => 1,
            };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            if task == "Broken" {
                return Err(CatalogError::Network("connection reset".into()));
            }
            Ok([(format!("{task}_KEY"), "1".to_string())].into_iter().collect())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn join_waits_for_all_and_keeps_request_order() {
        let tasks: Vec<String> = ["Opt", "Broken", "NEB"].iter().map(|s| s.to_string()).collect();
        let join = fetch_task_params(&SlowCatalog, &tasks).await;

        let loaded: Vec<_> = join.loaded.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(loaded, vec!["Opt", "NEB"]);
        assert_eq!(join.failed.len(), 1);
        assert_eq!(join.failed[0].0, "Broken");
        assert!(!join.is_complete());
    }

    #[tokio::test]
    async fn empty_request_is_complete() {
        let join = fetch_task_params(&SlowCatalog, &[]).await;
        assert!(join.loaded.is_empty());
        assert!(join.is_complete());
    }
}
