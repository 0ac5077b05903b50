//! Ordered, fault-contained sequencing of asynchronous index work.
//!
//! A sequence is one ordered chain of index-work submissions: single works,
//! bulk batches, and the per-item extraction of bulk responses, finalized by
//! exactly one flush and at most one consolidated error report. The chain is
//! composed purely out of future continuations; the engine never blocks a
//! thread and never spawns a task.
//!
//! # Design Philosophy
//!
//! A [`Sequence`] "describes" the chain but doesn't "execute" it. Nothing
//! runs until the future returned by [`Sequence::build`] is polled; every
//! ordering guarantee is a data dependency between futures, not a scheduling
//! decision. This also makes sequences trivially independent: each
//! [`init`](WorkSequenceBuilder::init) produces a self-contained value with
//! its own context and failure accumulator.
//!
//! The tail of the chain is threaded functionally: every `add_*` call
//! consumes the sequence and returns the next state, so there is no shared
//! mutable cursor to alias.
//!
//! # Failure Containment
//!
//! A failing work never aborts the pipeline. Its failure is recorded on the
//! sequence's [`FailureAccumulator`], the chain switches to the broken
//! state, and every work registered after it is marked skipped instead of
//! executed. Flush and the error report still happen, and the built future
//! completes successfully. The one fatal condition is an error escaping the
//! wrapped error sink during reporting: that error, and only that error,
//! fails the sequence's own future.
//!
//! # Examples
//!
//! ```rust,ignore
//! use workchain::sequence::WorkSequenceBuilder;
//!
//! let builder = WorkSequenceBuilder::new(executor, context_supplier, handler_supplier);
//!
//! let sequence = builder.init(std::future::ready(()));
//! let sequence = sequence.add_non_bulk_execution(refresh_work);
//! let (sequence, bulk_result) = sequence.add_bulk_execution(bulk_work_future);
//! let (sequence, extraction) = sequence.start_bulk_result_extraction(bulk_result);
//! extraction.add(index_work_a, 0);
//! extraction.add(index_work_b, 1);
//! let sequence = sequence.add_non_bulk_execution(final_work);
//!
//! sequence.build().await?;
//! ```

// =============================================================================
// Submodules
// =============================================================================

pub mod extraction;
pub mod report;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::BoxFuture;
use pin_project_lite::pin_project;

use crate::executor::{BoxError, ExecutionContext, Executor};
use crate::work::Work;

pub use extraction::{BulkResultExtractionStep, BulkResultFuture};
pub use report::{ErrorReport, ErrorSink, FailureAccumulator};

use extraction::BulkOutcome;

// =============================================================================
// ChainState
// =============================================================================

/// Health of the chain as it threads from step to step.
///
/// Once broken, a chain never heals: every later work is marked skipped
/// instead of executed, while flush and reporting proceed normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChainState {
    /// No failure recorded so far; the next work executes.
    Live,
    /// A previous work, item, or batch failed; the next work is skipped.
    Broken,
}

// =============================================================================
// Supplier Aliases
// =============================================================================

/// Supplier of one fresh [`ExecutionContext`](crate::executor::ExecutionContext)
/// per sequence, invoked exactly once per [`WorkSequenceBuilder::init`].
pub type ContextSupplier<X> = Box<dyn Fn() -> <X as Executor>::Context + Send + Sync>;

/// Supplier of one fresh [`FailureAccumulator`] per sequence, invoked
/// exactly once per [`WorkSequenceBuilder::init`].
pub type HandlerSupplier<X> =
    Box<dyn Fn() -> FailureAccumulator<<X as Executor>::Operation> + Send + Sync>;

// =============================================================================
// WorkSequenceBuilder
// =============================================================================

/// Factory for independent work sequences sharing one executor.
///
/// The builder holds the collaborators every sequence needs: the executor
/// and the suppliers of per-sequence resources. Each call to
/// [`init`](Self::init) consumes both suppliers once and hands the resulting
/// context and accumulator to a fresh [`Sequence`]; nothing is ever shared
/// between two sequences except the executor itself.
pub struct WorkSequenceBuilder<X: Executor> {
    executor: Arc<X>,
    context_supplier: ContextSupplier<X>,
    handler_supplier: HandlerSupplier<X>,
}

impl<X: Executor> fmt::Debug for WorkSequenceBuilder<X> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("WorkSequenceBuilder")
            .finish_non_exhaustive()
    }
}

impl<X: Executor> WorkSequenceBuilder<X> {
    /// Creates a builder around `executor` and the per-sequence suppliers.
    #[must_use]
    pub fn new(
        executor: Arc<X>,
        context_supplier: ContextSupplier<X>,
        handler_supplier: HandlerSupplier<X>,
    ) -> Self {
        Self {
            executor,
            context_supplier,
            handler_supplier,
        }
    }

    /// Starts a new sequence chained after `previous`.
    ///
    /// The output of `previous` is ignored, whatever it is: a prior
    /// sequence's outcome never leaks into the next one. Calling `init`
    /// again before a prior sequence settles is fine — the prior sequence's
    /// future and resources are untouched and settle on their own.
    pub fn init<F>(&self, previous: F) -> Sequence<X>
    where
        F: Future + Send + 'static,
    {
        let context = Arc::new((self.context_supplier)());
        let handler = Arc::new((self.handler_supplier)());
        Sequence {
            executor: Arc::clone(&self.executor),
            context,
            handler,
            tail: Box::pin(async move {
                previous.await;
                ChainState::Live
            }),
        }
    }
}

// =============================================================================
// Sequence
// =============================================================================

/// The live state of one sequence between `init` and `build`.
///
/// A sequence owns its execution context, its failure accumulator, and the
/// tail future cursor threading every added step. The combinators consume
/// `self` and return the next state; after [`build`](Self::build) the
/// sequence is gone and only the returned future remains.
pub struct Sequence<X: Executor> {
    executor: Arc<X>,
    context: Arc<X::Context>,
    handler: Arc<FailureAccumulator<X::Operation>>,
    tail: BoxFuture<'static, ChainState>,
}

impl<X: Executor> fmt::Debug for Sequence<X> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_struct("Sequence").finish_non_exhaustive()
    }
}

impl<X: Executor> Sequence<X> {
    /// Appends the execution of one non-bulk work.
    ///
    /// Once the tail settles: if the chain is broken the work is marked
    /// skipped without being submitted; otherwise it is submitted via the
    /// executor. A failed submission is recorded against the work's
    /// operation and converted into a normal completion that leaves the
    /// chain broken — it never propagates down the chain as an error.
    #[must_use]
    pub fn add_non_bulk_execution(mut self, work: X::Work) -> Self {
        let executor = Arc::clone(&self.executor);
        let context = Arc::clone(&self.context);
        let handler = Arc::clone(&self.handler);
        let tail = self.tail;
        self.tail = Box::pin(async move {
            match tail.await {
                ChainState::Broken => {
                    handler.mark_as_skipped(work.operation());
                    ChainState::Broken
                }
                ChainState::Live => {
                    let operation = work.operation();
                    match executor.submit(work, &context).await {
                        Ok(_) => ChainState::Live,
                        Err(error) => {
                            handler.mark_as_failed(operation, error);
                            ChainState::Broken
                        }
                    }
                }
            }
        });
        self
    }

    /// Appends the execution of one bulk work, resolved asynchronously.
    ///
    /// Once the tail and `bulk_work` both settle, the resolved bulk is
    /// submitted via the executor. The eventual bulk result travels in the
    /// returned [`BulkResultFuture`], to be wired into per-item extraction
    /// by [`start_bulk_result_extraction`](Self::start_bulk_result_extraction);
    /// an assembly or submission failure is not attributed to any single
    /// work here — the extraction step handles it as a batch-level failure.
    /// If the chain is already broken when this step is reached, the bulk is
    /// not submitted at all.
    #[must_use]
    pub fn add_bulk_execution<F>(mut self, bulk_work: F) -> (Self, BulkResultFuture<X>)
    where
        F: Future<Output = Result<X::BulkWork, BoxError>> + Send + 'static,
    {
        let shared_tail = self.tail.shared();
        self.tail = Box::pin(shared_tail.clone());
        let executor = Arc::clone(&self.executor);
        let context = Arc::clone(&self.context);
        let inner = Box::pin(async move {
            match shared_tail.await {
                ChainState::Broken => BulkOutcome::Skipped,
                ChainState::Live => match bulk_work.await {
                    Ok(bulk) => match executor.submit_bulk(bulk, &context).await {
                        Ok(result) => BulkOutcome::Executed(result),
                        Err(error) => BulkOutcome::Failed(error),
                    },
                    Err(error) => BulkOutcome::Failed(error),
                },
            }
        });
        (self, BulkResultFuture::new(inner))
    }

    /// Installs the per-item extraction of one bulk result as the next
    /// synchronization point of the chain.
    ///
    /// The next tail is the join of every item registered on the returned
    /// step: the chain does not advance until all of them have settled,
    /// whatever their individual order. Items must be registered before the
    /// built sequence is first polled.
    #[must_use]
    pub fn start_bulk_result_extraction(
        mut self,
        bulk_result: BulkResultFuture<X>,
    ) -> (Self, BulkResultExtractionStep<X>) {
        let (step, join) = extraction::start(
            bulk_result,
            Arc::clone(&self.context),
            Arc::clone(&self.handler),
        );
        self.tail = join;
        (self, step)
    }

    /// Finalizes the chain.
    ///
    /// The returned future awaits the tail, flushes the execution context
    /// exactly once (a flush failure is recorded as an unattributed
    /// sequence failure), then produces the consolidated error report at
    /// most once. It completes successfully even when upstream work failed —
    /// those failures were recorded and reported, not re-raised. It fails
    /// only with an error the wrapped error sink returned.
    #[must_use]
    pub fn build(self) -> SequenceFuture {
        let Self {
            context,
            handler,
            tail,
            ..
        } = self;
        SequenceFuture {
            inner: Box::pin(async move {
                tail.await;
                if let Err(error) = context.flush().await {
                    handler.add_failure(error);
                }
                handler.handle()
            }),
        }
    }
}

// =============================================================================
// SequenceFuture
// =============================================================================

pin_project! {
    /// The settled outcome of one whole sequence: flushed and reported.
    ///
    /// Completes with `Ok(())` whether or not upstream work failed; fails
    /// only with the error the wrapped error sink returned while handling
    /// the report.
    pub struct SequenceFuture {
        #[pin]
        inner: BoxFuture<'static, Result<(), BoxError>>,
    }
}

impl fmt::Debug for SequenceFuture {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SequenceFuture")
            .finish_non_exhaustive()
    }
}

impl Future for SequenceFuture {
    type Output = Result<(), BoxError>;

    fn poll(self: Pin<&mut Self>, context: &mut Context<'_>) -> Poll<Self::Output> {
        self.project().inner.poll(context)
    }
}

static_assertions::assert_impl_all!(SequenceFuture: Send);

// =============================================================================
// Unit Tests
// =============================================================================
