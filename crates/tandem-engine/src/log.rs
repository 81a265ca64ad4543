//! Run-scoped execution log.
//!
//! An append-only record of every model call and capability invocation in one
//! workflow dispatch. The handle is explicitly passed and scoped to one run;
//! no process-wide singleton survives across runs. Appends from concurrent
//! branches serialize under the lock, where the sequence number is assigned,
//! so records are totally ordered by completion time and never visible
//! half-written.

use std::sync::{Arc, Mutex};

use chrono::Utc;

use tandem_core::error::Result;
use tandem_core::text::truncate_bytes;
use tandem_core::types::{CallKind, CallRecord};

const MAX_LOGGED_INPUT_BYTES: usize = 512;
const MAX_LOGGED_OUTPUT_BYTES: usize = 2048;

/// Thread-safe append-only log handle. Cheap to clone; all clones share the
/// same record list.
#[derive(Clone, Default)]
pub struct ExecutionLog {
    records: Arc<Mutex<Vec<CallRecord>>>,
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one call record, assigning its sequence number and timestamp
    /// under the lock. Returns the assigned sequence number.
    pub fn append(
        &self,
        agent_id: &str,
        kind: CallKind,
        target: &str,
        input: &str,
        outcome: &Result<String>,
        elapsed_ms: u64,
    ) -> u64 {
        let (input, _) = truncate_bytes(input, MAX_LOGGED_INPUT_BYTES);
        let (output, error) = match outcome {
            Ok(text) => (Some(truncate_bytes(text, MAX_LOGGED_OUTPUT_BYTES).0), None),
            Err(e) => (None, Some(e.to_string())),
        };

        let mut records = self.records.lock().unwrap_or_else(|p| p.into_inner());
        let seq = records.len() as u64;
        records.push(CallRecord {
            seq,
            agent_id: agent_id.to_string(),
            kind,
            target: target.to_string(),
            input,
            output,
            error,
            timestamp: Utc::now(),
            elapsed_ms,
        });
        seq
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of all records appended so far.
    pub fn snapshot(&self) -> Vec<CallRecord> {
        self.records
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Close the log, returning the full ordered record list. Other clones of
    /// the handle may still exist; they see the same shared list, so this
    /// takes a final snapshot rather than draining it.
    pub fn into_records(self) -> Vec<CallRecord> {
        self.snapshot()
    }
}
