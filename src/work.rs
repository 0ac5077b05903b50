//! Units of index mutation submitted to the sequencing engine.
//!
//! A [`Work`] is an opaque unit of search-index mutation. The engine never
//! interprets it; it only carries the unit to the executor exactly once and,
//! on failure, records the unit's domain operation in the error report.
//!
//! A [`BulkableWork`] additionally declares itself eligible for batching:
//! several bulkable works can derive their individual results from one shared
//! bulk response, addressed by a caller-assigned item index.
//!
//! # Lifecycle
//!
//! A work is created by the caller, registered on a sequence exactly once
//! (or, if part of a failed batch, never submitted and instead marked
//! skipped), and then discarded. It has no existence after the sequence
//! settles.

// =============================================================================
// Work
// =============================================================================

/// One unit of index mutation.
///
/// The associated [`Operation`](Work::Operation) identifies the underlying
/// domain operation for error reporting. It is the only thing the engine
/// ever extracts from a work: the work itself is handed to the executor
/// unchanged.
///
/// # Examples
///
/// ```rust,ignore
/// use workchain::work::Work;
///
/// struct DeleteDocument {
///     id: String,
/// }
///
/// impl Work for DeleteDocument {
///     type Operation = String;
///
///     fn operation(&self) -> String {
///         format!("delete:{}", self.id)
///     }
/// }
/// ```
pub trait Work: Send + 'static {
    /// The domain operation reported when this work fails or is skipped.
    ///
    /// `PartialEq` is required because a report's failing-operation list has
    /// set semantics; `Clone` because the operation outlives the work it was
    /// extracted from.
    type Operation: Clone + PartialEq + Send + 'static;

    /// Returns the domain operation behind this work.
    ///
    /// Called at most once per registration, before the work is moved into
    /// the executor.
    fn operation(&self) -> Self::Operation;
}

// =============================================================================
// BulkableWork
// =============================================================================

/// A [`Work`] eligible to be grouped into one batched request.
///
/// Bulkable works are registered on a
/// [`BulkResultExtractionStep`](crate::sequence::BulkResultExtractionStep)
/// together with the index of their item inside the shared bulk response.
/// The engine never assembles batches itself and never validates item
/// indices; both are the caller's concern.
pub trait BulkableWork: Work {}
