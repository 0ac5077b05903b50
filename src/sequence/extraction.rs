//! Per-item result extraction out of one shared bulk response.
//!
//! A bulk execution produces a single response for many works. The
//! [`BulkResultExtractionStep`] fans the sequence out into one extraction per
//! registered `(work, item_index)` pair and fans it back in: the step
//! contributes exactly one synchronization point to the main chain, the join
//! of every per-item future. Resolution order of individual items is
//! irrelevant; the chain only advances once all of them have settled.
//!
//! # Failure containment
//!
//! - A synchronous extraction failure is an already-settled item: it is
//!   recorded immediately and contributes no pending future to the join.
//! - An asynchronous item failure is recorded when the item settles; sibling
//!   items keep running.
//! - A batch-level failure (the bulk submission or response itself failed)
//!   marks every registered work skipped and queues the error as a
//!   sequence-level failure, deferred until just before reporting.
//! - A bulk that was skipped because the chain had already broken marks
//!   every registered work skipped without queueing anything new.

use std::mem;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;

use crate::executor::{BoxError, BulkResult, Executor};
use crate::sequence::ChainState;
use crate::sequence::report::FailureAccumulator;
use crate::work::Work;

// =============================================================================
// BulkOutcome
// =============================================================================

/// How one bulk execution step concluded.
pub(crate) enum BulkOutcome<B> {
    /// The bulk was submitted and produced a response.
    Executed(B),
    /// Assembling or submitting the bulk failed; the error is not
    /// attributable to any single work.
    Failed(BoxError),
    /// The bulk was never submitted because the chain was already broken.
    Skipped,
}

// =============================================================================
// BulkResultFuture
// =============================================================================

/// Opaque handle to the eventual result of one bulk execution.
///
/// Returned by
/// [`Sequence::add_bulk_execution`](crate::sequence::Sequence::add_bulk_execution)
/// and consumed by
/// [`Sequence::start_bulk_result_extraction`](crate::sequence::Sequence::start_bulk_result_extraction),
/// which wires the per-item extraction onto it. The handle carries the whole
/// upstream chain of the sequence; dropping it without starting extraction
/// drops the bulk submission with it.
pub struct BulkResultFuture<X: Executor> {
    inner: BoxFuture<'static, BulkOutcome<X::BulkResult>>,
}

impl<X: Executor> BulkResultFuture<X> {
    pub(crate) fn new(inner: BoxFuture<'static, BulkOutcome<X::BulkResult>>) -> Self {
        Self { inner }
    }
}

// =============================================================================
// BulkResultExtractionStep
// =============================================================================

/// Registration of one bulk batch: the ordered `(work, item_index)` pairs
/// that all derive their result from one shared bulk response.
///
/// Items must be registered before the sequence future is first polled; the
/// join drains the registry exactly once, when the shared bulk result
/// settles.
pub struct BulkResultExtractionStep<X: Executor> {
    items: Arc<Mutex<Vec<(X::BulkItem, usize)>>>,
}

impl<X: Executor> BulkResultExtractionStep<X> {
    /// Registers `work` as the item at `item_index` of the shared bulk
    /// response.
    ///
    /// Item indices are caller-assigned and never validated; they need not
    /// be contiguous.
    pub fn add(&self, work: X::BulkItem, item_index: usize) {
        self.items.lock().push((work, item_index));
    }
}

// =============================================================================
// Join Construction
// =============================================================================

/// Builds the extraction step and the join future that becomes the next tail
/// of the sequence.
pub(crate) fn start<X: Executor>(
    bulk: BulkResultFuture<X>,
    context: Arc<X::Context>,
    handler: Arc<FailureAccumulator<X::Operation>>,
) -> (BulkResultExtractionStep<X>, BoxFuture<'static, ChainState>) {
    let items: Arc<Mutex<Vec<(X::BulkItem, usize)>>> = Arc::new(Mutex::new(Vec::new()));
    let step = BulkResultExtractionStep {
        items: Arc::clone(&items),
    };

    let join = Box::pin(async move {
        let outcome = bulk.inner.await;
        let items = mem::take(&mut *items.lock());
        match outcome {
            BulkOutcome::Executed(bulk_result) => {
                let mut chain = ChainState::Live;
                let mut pending = FuturesUnordered::new();
                for (work, item_index) in items {
                    let operation = work.operation();
                    match bulk_result.extract(&context, &work, item_index) {
                        Ok(future) => pending.push(async move { (operation, future.await) }),
                        Err(error) => {
                            // Already settled: recorded now, never joins the fan-in.
                            handler.mark_as_failed(operation, error);
                            chain = ChainState::Broken;
                        }
                    }
                }
                while let Some((operation, result)) = pending.next().await {
                    if let Err(error) = result {
                        handler.mark_as_failed(operation, error);
                        chain = ChainState::Broken;
                    }
                }
                chain
            }
            BulkOutcome::Failed(error) => {
                for (work, _) in items {
                    handler.mark_as_skipped(work.operation());
                }
                handler.defer_failure(error);
                ChainState::Broken
            }
            BulkOutcome::Skipped => {
                for (work, _) in items {
                    handler.mark_as_skipped(work.operation());
                }
                ChainState::Broken
            }
        }
    });

    (step, join)
}
