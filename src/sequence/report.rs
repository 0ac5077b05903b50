//! Per-sequence failure accumulation and exactly-once reporting.
//!
//! Every sequence owns one [`FailureAccumulator`]. Steps record recoverable
//! failures on it as they settle; when the sequence finalizes, the
//! accumulator builds at most one [`ErrorReport`] and delegates it to the
//! wrapped [`ErrorSink`]. An error escaping the sink is the one fatal
//! condition of the whole pipeline: it is returned, never swallowed, and
//! surfaces through the built sequence's future.
//!
//! # Primary and suppressed failures
//!
//! The first recorded failure (in call order, under the accumulator's lock)
//! becomes the report's primary error and, when attributable, its
//! operation-at-fault. Every later error from any source is attached to the
//! suppressed list instead of replacing the primary. This is modeled as
//! explicit data, not exception-chaining introspection.
//!
//! # Deferred sequence-level failures
//!
//! A batch-level failure is not attributable to a single work. It is queued
//! via [`defer_failure`](FailureAccumulator::defer_failure) and folded into
//! the report only at [`handle`](FailureAccumulator::handle) time, so an
//! attributed failure still in flight can win primary status over it.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::executor::BoxError;

// =============================================================================
// ErrorReport
// =============================================================================

/// The consolidated failure report of one sequence, produced at most once.
pub struct ErrorReport<Op> {
    primary: BoxError,
    operation_at_fault: Option<Op>,
    failing_operations: SmallVec<[Op; 8]>,
    suppressed: SmallVec<[BoxError; 4]>,
}

impl<Op> ErrorReport<Op> {
    /// The first failure recorded for the sequence.
    #[must_use]
    pub fn primary(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.primary.as_ref()
    }

    /// The domain operation tied to the primary failure, if the primary was
    /// attributable to a single work.
    #[must_use]
    pub fn operation_at_fault(&self) -> Option<&Op> {
        self.operation_at_fault.as_ref()
    }

    /// Every operation that failed or was skipped, in recording order,
    /// without duplicates.
    #[must_use]
    pub fn failing_operations(&self) -> &[Op] {
        &self.failing_operations
    }

    /// Every failure recorded after the primary, in recording order.
    #[must_use]
    pub fn suppressed(&self) -> &[BoxError] {
        &self.suppressed
    }
}

impl<Op: fmt::Debug> fmt::Debug for ErrorReport<Op> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ErrorReport")
            .field("primary", &self.primary)
            .field("operation_at_fault", &self.operation_at_fault)
            .field("failing_operations", &self.failing_operations)
            .field("suppressed", &self.suppressed)
            .finish()
    }
}

// =============================================================================
// ErrorSink
// =============================================================================

/// Domain-level destination of one sequence's consolidated error report.
///
/// Implementations typically log, count, or escalate the report. Returning
/// `Err` is the fatal path: the sequence's own future fails with exactly
/// that error even though every upstream failure was already recorded.
pub trait ErrorSink<Op>: Send + Sync + 'static {
    /// Handles the consolidated report of one sequence.
    ///
    /// # Errors
    ///
    /// Any error returned here propagates to the caller of the built
    /// sequence; it is the only failure mode a sequence exposes.
    fn handle(&self, report: ErrorReport<Op>) -> Result<(), BoxError>;
}

// =============================================================================
// FailureAccumulator
// =============================================================================

/// Internal mutable state of a [`FailureAccumulator`].
///
/// `None` once [`handle`](FailureAccumulator::handle) has run: reporting is
/// exactly-once by construction.
struct AccumulatorState<Op> {
    primary: Option<BoxError>,
    operation_at_fault: Option<Op>,
    failing_operations: SmallVec<[Op; 8]>,
    suppressed: SmallVec<[BoxError; 4]>,
    deferred: SmallVec<[BoxError; 2]>,
}

impl<Op> AccumulatorState<Op> {
    fn new() -> Self {
        Self {
            primary: None,
            operation_at_fault: None,
            failing_operations: SmallVec::new(),
            suppressed: SmallVec::new(),
            deferred: SmallVec::new(),
        }
    }

    fn record(&mut self, error: BoxError) {
        if self.primary.is_none() {
            self.primary = Some(error);
        } else {
            self.suppressed.push(error);
        }
    }
}

/// Per-sequence failure accumulator wrapping a domain [`ErrorSink`].
///
/// One accumulator is obtained from the handler supplier at sequence `init`
/// and owned by that sequence for its entire lifetime. It is internally
/// synchronized: items of one bulk-extraction step settle concurrently and
/// record their failures from whatever task completes them.
pub struct FailureAccumulator<Op> {
    sink: Arc<dyn ErrorSink<Op>>,
    state: Mutex<Option<AccumulatorState<Op>>>,
}

impl<Op> fmt::Debug for FailureAccumulator<Op> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("FailureAccumulator")
            .finish_non_exhaustive()
    }
}

impl<Op: Clone + PartialEq + Send + 'static> FailureAccumulator<Op> {
    /// Creates an accumulator reporting to `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn ErrorSink<Op>>) -> Self {
        Self {
            sink,
            state: Mutex::new(Some(AccumulatorState::new())),
        }
    }

    /// Records `error` against `operation`.
    ///
    /// The first attributed or unattributed failure (in call order) becomes
    /// the report's primary; this method additionally sets the
    /// operation-at-fault when it wins that race. Later failures join the
    /// suppressed list.
    pub fn mark_as_failed(&self, operation: Op, error: BoxError) {
        let mut guard = self.state.lock();
        let Some(state) = guard.as_mut() else {
            return;
        };
        if state.primary.is_none() {
            state.operation_at_fault = Some(operation.clone());
        }
        state.record(error);
        if !state.failing_operations.contains(&operation) {
            state.failing_operations.push(operation);
        }
    }

    /// Records `operation` as failing without an error of its own.
    ///
    /// Skipped works contribute to the failing-operation list only; they
    /// never influence the primary or suppressed errors.
    pub fn mark_as_skipped(&self, operation: Op) {
        let mut guard = self.state.lock();
        let Some(state) = guard.as_mut() else {
            return;
        };
        if !state.failing_operations.contains(&operation) {
            state.failing_operations.push(operation);
        }
    }

    /// Records an error not attributable to any single work.
    ///
    /// Becomes the primary only if no failure was recorded before it;
    /// otherwise it joins the suppressed list. The operation-at-fault is
    /// never set by this method.
    pub fn add_failure(&self, error: BoxError) {
        let mut guard = self.state.lock();
        let Some(state) = guard.as_mut() else {
            return;
        };
        state.record(error);
    }

    /// Queues an unattributed error to be recorded just before reporting.
    ///
    /// Batch-level failures use this so that attributed failures still in
    /// flight keep their chance at primary status; the queue is drained, in
    /// push order, at the start of [`handle`](Self::handle).
    pub fn defer_failure(&self, error: BoxError) {
        let mut guard = self.state.lock();
        let Some(state) = guard.as_mut() else {
            return;
        };
        state.deferred.push(error);
    }

    /// Builds the report and delegates it to the wrapped sink, at most once.
    ///
    /// A no-op returning `Ok(())` when no error was ever recorded (works
    /// marked skipped without an accompanying error do not trigger a report
    /// on their own) and on every call after the first.
    ///
    /// # Errors
    ///
    /// Returns exactly the error the wrapped sink returned. Nothing else
    /// can fail here.
    pub fn handle(&self) -> Result<(), BoxError> {
        let state = self.state.lock().take();
        let Some(mut state) = state else {
            return Ok(());
        };
        for error in state.deferred.drain(..) {
            if state.primary.is_none() {
                state.primary = Some(error);
            } else {
                state.suppressed.push(error);
            }
        }
        let Some(primary) = state.primary else {
            return Ok(());
        };
        let report = ErrorReport {
            primary,
            operation_at_fault: state.operation_at_fault,
            failing_operations: state.failing_operations,
            suppressed: state.suppressed,
        };
        self.sink.handle(report)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
