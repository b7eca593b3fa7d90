//! Run N independent units of work concurrently and join them.

use crate::error::PipelineError;
use std::future::Future;
use tokio::task::JoinSet;

/// Everything a fan-out produced once every unit finished.
#[derive(Debug)]
pub struct FanOut<T> {
    /// Successful results, in the order the inputs were given.
    pub successes: Vec<T>,
    /// Failures, in the order they were observed.
    pub errors: Vec<PipelineError>,
}

impl<T> FanOut<T> {
    /// Collapse into the successes, or the first observed error.
    pub fn into_result(self) -> Result<Vec<T>, PipelineError> {
        match self.errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(self.successes),
        }
    }
}

/// Spawn one task per argument and wait for all of them.
///
/// A failing unit does not cancel its siblings: the join only returns once
/// every task has run to completion.
pub async fn fan_out<A, T, F, Fut>(args: impl IntoIterator<Item = A>, work: F) -> FanOut<T>
where
    F: Fn(A) -> Fut,
    Fut: Future<Output = Result<T, PipelineError>> + Send + 'static,
    T: Send + 'static,
{
    let mut tasks = JoinSet::new();
    for (index, arg) in args.into_iter().enumerate() {
        let unit = work(arg);
        tasks.spawn(async move { (index, unit.await) });
    }

    let mut indexed = Vec::with_capacity(tasks.len());
    let mut errors = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, Ok(value))) => indexed.push((index, value)),
            Ok((_, Err(err))) => errors.push(err),
            Err(join_err) => errors.push(PipelineError::internal(format!(
                "fan-out task did not finish: {}",
                join_err
            ))),
        }
    }

    indexed.sort_by_key(|(index, _)| *index);
    FanOut {
        successes: indexed.into_iter().map(|(_, value)| value).collect(),
        errors,
    }
}
