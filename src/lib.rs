//! # workchain
//!
//! Ordered, fault-contained sequencing of asynchronous search-index write
//! work with transparent bulk batching.
//!
//! ## Overview
//!
//! `workchain` turns a list of index mutations into a single ordered,
//! partially-fault-tolerant asynchronous pipeline. It is pure orchestration:
//! it composes futures produced by its collaborators — an executor, a
//! per-sequence execution context, and bulk responses — and guarantees:
//!
//! - **Strict ordering**: steps on the main chain run in declaration order,
//!   composed purely through future continuations, no blocking.
//! - **Fan-out/fan-in**: items extracted out of one bulk response progress
//!   concurrently; the chain advances only once all of them settled.
//! - **Failure containment**: a failing unit of work never aborts the
//!   pipeline; it is recorded, every work registered after it is marked
//!   skipped, and flush plus one consolidated error report still happen.
//! - **Exactly-once finalization**: one flush, then at most one error
//!   report, per sequence.
//! - **A single fatal path**: only an error escaping the wrapped error sink
//!   during reporting surfaces through a built sequence's future.
//!
//! It does not decide what to index, does not talk to any network socket,
//! and does not provide durability.
//!
//! ## Example
//!
//! ```rust,ignore
//! use workchain::prelude::*;
//!
//! let builder = WorkSequenceBuilder::new(executor, context_supplier, handler_supplier);
//!
//! let sequence = builder.init(std::future::ready(()));
//! let sequence = sequence.add_non_bulk_execution(refresh);
//! let (sequence, bulk_result) = sequence.add_bulk_execution(bulk_work);
//! let (sequence, extraction) = sequence.start_bulk_result_extraction(bulk_result);
//! extraction.add(index_a, 0);
//! extraction.add(index_b, 1);
//!
//! // Nothing has executed yet; the sequence runs when awaited.
//! sequence.build().await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Prelude module for convenient imports.
///
/// Re-exports commonly used types and traits.
///
/// # Usage
///
/// ```rust
/// use workchain::prelude::*;
/// ```
pub mod prelude {
    pub use crate::executor::{BoxError, BulkResult, ExecutionContext, Executor, WorkFuture};
    pub use crate::sequence::{
        BulkResultExtractionStep, BulkResultFuture, ContextSupplier, ErrorReport, ErrorSink,
        FailureAccumulator, HandlerSupplier, Sequence, SequenceFuture, WorkSequenceBuilder,
    };
    pub use crate::work::{BulkableWork, Work};
}

pub mod executor;
pub mod sequence;
pub mod work;
