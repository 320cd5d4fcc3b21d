// src/batch.rs
//! Bounded concurrent batch runner.
//!
//! `buffered(n)` keeps at most `n` worker futures alive and yields their
//! outputs in input order, whatever order they finish in.

use std::future::Future;

use futures::stream::{self, StreamExt};

/// Apply `worker` to every item with at most `max_concurrency` in flight.
/// Output index `i` is `worker(items[i])`.
pub async fn run_bounded<I, O, F, Fut>(items: Vec<I>, max_concurrency: usize, worker: F) -> Vec<O>
where
    F: FnMut(I) -> Fut,
    Fut: Future<Output = O>,
{
    stream::iter(items.into_iter().map(worker))
        .buffered(max_concurrency.max(1))
        .collect()
        .await
}

/// Like [`run_bounded`] for fallible workers.
///
/// Every item runs to completion (started siblings are never cancelled); the
/// first error in input order is returned, otherwise all outputs.
pub async fn try_run_bounded<I, O, E, F, Fut>(
    items: Vec<I>,
    max_concurrency: usize,
    worker: F,
) -> Result<Vec<O>, E>
where
    F: FnMut(I) -> Fut,
    Fut: Future<Output = Result<O, E>>,
{
    run_bounded(items, max_concurrency, worker)
        .await
        .into_iter()
        .collect()
}
