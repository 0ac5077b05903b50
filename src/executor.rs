//! Collaborator contracts between the sequencing engine and its backend.
//!
//! The engine orchestrates futures produced by these collaborators; it never
//! talks to a network socket, spawns a task, or blocks a thread itself. The
//! contracts are deliberately thin:
//!
//! - [`Executor`] turns a work (or an assembled bulk work) into a future of
//!   its result.
//! - [`ExecutionContext`] is the per-sequence mutable resource; the engine
//!   calls [`flush`](ExecutionContext::flush) on it exactly once, after the
//!   last step of the sequence has settled.
//! - [`BulkResult`] is the decoded response of one batched request,
//!   addressable per item.
//!
//! # Error currency
//!
//! All collaborator futures fail with [`BoxError`]. The engine absorbs those
//! failures into the sequence's error report; they never propagate to the
//! caller of a built sequence.

use std::error::Error;

use futures::future::BoxFuture;

use crate::work::{BulkableWork, Work};

// =============================================================================
// Type Aliases
// =============================================================================

/// Dynamic error type used across all collaborator contracts.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// A boxed future producing a collaborator result.
pub type WorkFuture<T> = BoxFuture<'static, Result<T, BoxError>>;

// =============================================================================
// ExecutionContext
// =============================================================================

/// Per-sequence resource shared by every step of one sequence.
///
/// A fresh context is obtained from the context supplier at
/// [`init`](crate::sequence::WorkSequenceBuilder::init) time and is owned
/// exclusively by that sequence. The engine guarantees that
/// [`flush`](ExecutionContext::flush) is invoked exactly once per sequence,
/// after the last registered step has settled and before the error report is
/// produced.
pub trait ExecutionContext: Send + Sync + 'static {
    /// Flushes whatever the context buffered on behalf of the sequence.
    ///
    /// A flush failure does not abort the sequence: it is recorded as an
    /// unattributed failure and surfaces through the error report.
    fn flush(&self) -> WorkFuture<()>;
}

// =============================================================================
// BulkResult
// =============================================================================

/// The decoded response of one batched request, indexable per item.
///
/// This flattens the two-step shape `with_context(context).extract(work,
/// index)` into a single borrowing call; the extraction step of the sequence
/// plays the role of the context-bound item extractor.
pub trait BulkResult: Send + Sync + 'static {
    /// The execution context the items were submitted under.
    type Context: ExecutionContext;
    /// The bulkable work type whose items this response answers.
    type Work: BulkableWork;
    /// The per-item result produced by extraction.
    type Output: Send + 'static;

    /// Extracts the result of one item from this bulk response.
    ///
    /// Returning `Err` models a synchronous extraction failure: the item is
    /// treated as already settled and is recorded against `work`'s operation
    /// without ever joining the fan-in set.
    ///
    /// # Errors
    ///
    /// Any error decoding the item addressed by `index` for `work`.
    fn extract(
        &self,
        context: &Self::Context,
        work: &Self::Work,
        index: usize,
    ) -> Result<WorkFuture<Self::Output>, BoxError>;
}

// =============================================================================
// Executor
// =============================================================================

/// Executes works against an execution context.
///
/// One executor is shared by every sequence a
/// [`WorkSequenceBuilder`](crate::sequence::WorkSequenceBuilder) creates; the
/// per-sequence state lives in the [`ExecutionContext`], not here.
///
/// The associated types tie the executor's work, bulk and context types
/// together so that one sequence handles both single and batched submissions
/// with a single operation type in its error report.
pub trait Executor: Send + Sync + 'static {
    /// The domain operation type carried into error reports.
    type Operation: Clone + PartialEq + Send + 'static;
    /// The per-sequence execution context.
    type Context: ExecutionContext;
    /// The non-bulk work type.
    type Work: Work<Operation = Self::Operation>;
    /// An assembled batched request, opaque to the engine.
    type BulkWork: Send + 'static;
    /// The bulkable work type registered on extraction steps.
    type BulkItem: BulkableWork<Operation = Self::Operation>;
    /// The decoded response of one batched request.
    type BulkResult: BulkResult<Context = Self::Context, Work = Self::BulkItem>;
    /// The result of one non-bulk submission (discarded by the engine).
    type Output: Send + 'static;

    /// Submits one non-bulk work for execution.
    fn submit(&self, work: Self::Work, context: &Self::Context) -> WorkFuture<Self::Output>;

    /// Submits one assembled bulk work for execution.
    ///
    /// A failure here is a batch-level failure: it is not attributable to
    /// any single work and is handled by the extraction step wired to the
    /// returned bulk result.
    fn submit_bulk(
        &self,
        bulk_work: Self::BulkWork,
        context: &Self::Context,
    ) -> WorkFuture<Self::BulkResult>;
}

