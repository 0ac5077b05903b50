//! Scripted collaborators shared by the integration tests.
//!
//! The executor, context, bulk result and error sink here do no real work:
//! they log every interaction into one shared journal and follow per-work
//! scripts (succeed, fail, or wait on a gate) so tests can pin down ordering
//! and failure semantics deterministically.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use workchain::prelude::*;

// =============================================================================
// Journal
// =============================================================================

/// Shared journal of every collaborator interaction, in observation order.
pub type Log = Arc<Mutex<Vec<String>>>;

/// Number of `flush` entries in the journal.
pub fn flush_count(log: &Log) -> usize {
    log.lock().iter().filter(|entry| *entry == "flush").count()
}

/// Whether the journal contains `entry`.
pub fn logged(log: &Log, entry: &str) -> bool {
    log.lock().iter().any(|recorded| recorded == entry)
}

/// Lets spawned sequence tasks make as much progress as they currently can.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

// =============================================================================
// TestError
// =============================================================================

#[derive(Debug)]
pub struct TestError(pub &'static str);

impl fmt::Display for TestError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

impl std::error::Error for TestError {}

pub fn boxed(message: &'static str) -> BoxError {
    Box::new(TestError(message))
}

// =============================================================================
// Works
// =============================================================================

/// A scripted non-bulk work.
pub struct TestWork {
    pub name: &'static str,
    pub failure: Option<&'static str>,
    pub gate: Option<oneshot::Receiver<()>>,
}

impl TestWork {
    pub fn ok(name: &'static str) -> Self {
        Self {
            name,
            failure: None,
            gate: None,
        }
    }

    pub fn failing(name: &'static str, message: &'static str) -> Self {
        Self {
            name,
            failure: Some(message),
            gate: None,
        }
    }

    pub fn gated(name: &'static str, gate: oneshot::Receiver<()>) -> Self {
        Self {
            name,
            failure: None,
            gate: Some(gate),
        }
    }
}

impl Work for TestWork {
    type Operation = &'static str;

    fn operation(&self) -> &'static str {
        self.name
    }
}

/// A scripted bulkable work; its behavior lives in the bulk's item script.
pub struct TestItem {
    pub name: &'static str,
}

impl TestItem {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl Work for TestItem {
    type Operation = &'static str;

    fn operation(&self) -> &'static str {
        self.name
    }
}

impl BulkableWork for TestItem {}

// =============================================================================
// Bulk Script
// =============================================================================

/// What extraction of one bulk-response item does.
pub enum ItemScript {
    /// Extraction succeeds immediately.
    Succeed,
    /// Extraction fails synchronously, before producing a future.
    FailSync(&'static str),
    /// Extraction produces a future that fails on settlement.
    FailAsync(&'static str),
    /// Extraction produces a future that succeeds once the gate fires.
    Gated(oneshot::Receiver<()>),
}

/// A scripted assembled bulk request.
pub struct TestBulk {
    pub failure: Option<&'static str>,
    pub items: HashMap<usize, ItemScript>,
}

impl TestBulk {
    pub fn ok() -> Self {
        Self {
            failure: None,
            items: HashMap::new(),
        }
    }

    pub fn failing(message: &'static str) -> Self {
        Self {
            failure: Some(message),
            items: HashMap::new(),
        }
    }

    #[must_use]
    pub fn item(mut self, index: usize, script: ItemScript) -> Self {
        self.items.insert(index, script);
        self
    }
}

/// The decoded response of a scripted bulk request.
pub struct TestBulkResult {
    items: Mutex<HashMap<usize, ItemScript>>,
}

impl BulkResult for TestBulkResult {
    type Context = TestContext;
    type Work = TestItem;
    type Output = ();

    fn extract(
        &self,
        context: &TestContext,
        work: &TestItem,
        index: usize,
    ) -> Result<WorkFuture<()>, BoxError> {
        context
            .log
            .lock()
            .push(format!("extract:{}@{index}", work.name));
        match self.items.lock().remove(&index) {
            None | Some(ItemScript::Succeed) => Ok(Box::pin(std::future::ready(Ok(())))),
            Some(ItemScript::FailSync(message)) => Err(boxed(message)),
            Some(ItemScript::FailAsync(message)) => {
                Ok(Box::pin(async move { Err(boxed(message)) }))
            }
            Some(ItemScript::Gated(gate)) => Ok(Box::pin(async move {
                let _ = gate.await;
                Ok(())
            })),
        }
    }
}

// =============================================================================
// Context and Executor
// =============================================================================

pub struct TestContext {
    pub log: Log,
    pub flush_failure: Option<&'static str>,
}

impl ExecutionContext for TestContext {
    fn flush(&self) -> WorkFuture<()> {
        self.log.lock().push("flush".to_string());
        match self.flush_failure {
            None => Box::pin(std::future::ready(Ok(()))),
            Some(message) => Box::pin(std::future::ready(Err(boxed(message)))),
        }
    }
}

pub struct ScriptedExecutor {
    pub log: Log,
}

impl Executor for ScriptedExecutor {
    type Operation = &'static str;
    type Context = TestContext;
    type Work = TestWork;
    type BulkWork = TestBulk;
    type BulkItem = TestItem;
    type BulkResult = TestBulkResult;
    type Output = ();

    fn submit(&self, work: TestWork, context: &TestContext) -> WorkFuture<()> {
        let log = Arc::clone(&context.log);
        Box::pin(async move {
            if let Some(gate) = work.gate {
                let _ = gate.await;
            }
            log.lock().push(format!("submit:{}", work.name));
            match work.failure {
                None => Ok(()),
                Some(message) => Err(boxed(message)),
            }
        })
    }

    fn submit_bulk(&self, bulk_work: TestBulk, context: &TestContext) -> WorkFuture<TestBulkResult> {
        let log = Arc::clone(&context.log);
        Box::pin(async move {
            log.lock().push("submit-bulk".to_string());
            match bulk_work.failure {
                Some(message) => Err(boxed(message)),
                None => Ok(TestBulkResult {
                    items: Mutex::new(bulk_work.items),
                }),
            }
        })
    }
}

// =============================================================================
// Recording Sink
// =============================================================================

pub struct ReportSnapshot {
    pub primary: String,
    pub operation_at_fault: Option<&'static str>,
    pub failing_operations: Vec<&'static str>,
    pub suppressed: Vec<String>,
}

#[derive(Default)]
pub struct RecordingSink {
    pub reports: Mutex<Vec<ReportSnapshot>>,
    pub failure: Option<&'static str>,
}

impl ErrorSink<&'static str> for RecordingSink {
    fn handle(&self, report: ErrorReport<&'static str>) -> Result<(), BoxError> {
        self.reports.lock().push(ReportSnapshot {
            primary: report.primary().to_string(),
            operation_at_fault: report.operation_at_fault().copied(),
            failing_operations: report.failing_operations().to_vec(),
            suppressed: report
                .suppressed()
                .iter()
                .map(|error| error.to_string())
                .collect(),
        });
        match self.failure {
            None => Ok(()),
            Some(message) => Err(boxed(message)),
        }
    }
}

// =============================================================================
// Fixture
// =============================================================================

pub struct Fixture {
    pub log: Log,
    pub sink: Arc<RecordingSink>,
    pub builder: WorkSequenceBuilder<ScriptedExecutor>,
}

pub fn fixture() -> Fixture {
    fixture_with(None, None)
}

pub fn fixture_with(
    flush_failure: Option<&'static str>,
    sink_failure: Option<&'static str>,
) -> Fixture {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::new(RecordingSink {
        reports: Mutex::new(Vec::new()),
        failure: sink_failure,
    });
    let executor = Arc::new(ScriptedExecutor {
        log: Arc::clone(&log),
    });
    let context_log = Arc::clone(&log);
    let handler_sink = Arc::clone(&sink);
    let builder = WorkSequenceBuilder::new(
        executor,
        Box::new(move || TestContext {
            log: Arc::clone(&context_log),
            flush_failure,
        }),
        Box::new(move || {
            FailureAccumulator::new(Arc::clone(&handler_sink) as Arc<dyn ErrorSink<&'static str>>)
        }),
    );
    Fixture { log, sink, builder }
}
