//! Bounded worker pool
//!
//! A fixed number of tokio tasks pull work items from one shared queue and
//! append their results to a shared collector. Both the traversal engine and
//! the download executor fan out through [`run_pool`].

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinSet;

/// Runs `task` over every item with at most `workers` in flight
///
/// Results are returned in input order regardless of completion order. An
/// entry is `None` only if the task for that item panicked. Each item runs in
/// its own tokio task, so the worker that picked it keeps draining the queue.
///
/// # Example
///
/// ```
/// use recursive_dl::crawler::run_pool;
///
/// let rt = tokio::runtime::Runtime::new().unwrap();
/// let doubled = rt.block_on(run_pool(vec![1, 2, 3], 2, |n| async move { n * 2 }));
/// assert_eq!(doubled, vec![Some(2), Some(4), Some(6)]);
/// ```
pub async fn run_pool<T, R, F, Fut>(items: Vec<T>, workers: usize, task: F) -> Vec<Option<R>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    let total = items.len();
    if total == 0 {
        return Vec::new();
    }

    let queue: Arc<Mutex<VecDeque<(usize, T)>>> =
        Arc::new(Mutex::new(items.into_iter().enumerate().collect()));
    let results: Arc<Mutex<Vec<(usize, R)>>> = Arc::new(Mutex::new(Vec::with_capacity(total)));
    let task = Arc::new(task);

    let worker_count = workers.clamp(1, total);
    let mut handles = JoinSet::new();

    for worker_id in 0..worker_count {
        let queue = Arc::clone(&queue);
        let results = Arc::clone(&results);
        let task = Arc::clone(&task);

        handles.spawn(async move {
            loop {
                let next = queue
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .pop_front();
                let Some((index, item)) = next else {
                    break;
                };

                tracing::trace!("worker {} took item {}", worker_id, index);
                let task = Arc::clone(&task);
                match tokio::spawn(async move { (*task)(item).await }).await {
                    Ok(result) => results
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push((index, result)),
                    Err(e) => tracing::error!("Item {} failed: {}", index, e),
                }
            }
        });
    }

    while let Some(joined) = handles.join_next().await {
        if let Err(e) = joined {
            tracing::error!("Worker task failed: {}", e);
        }
    }

    let mut ordered: Vec<Option<R>> = (0..total).map(|_| None).collect();
    let collected = std::mem::take(&mut *results.lock().unwrap_or_else(PoisonError::into_inner));
    for (index, result) in collected {
        ordered[index] = Some(result);
    }
    ordered
}
