//! Append-only audit trail of tool dispatches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::broker::ToolOutcome;
use crate::catalog::{ToolInvocation, ToolName};

/// One dispatched tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolExecutionRecord {
    pub tool: ToolName,
    pub args: Value,
    pub result: Value,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

/// Ordered log of tool dispatches for one run.
///
/// Timestamps never go backwards even if the wall clock does.
#[derive(Debug, Clone, Default)]
pub struct AuditTrail {
    records: Vec<ToolExecutionRecord>,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record for a finished dispatch.
    pub fn record(
        &mut self,
        invocation: &ToolInvocation,
        outcome: &ToolOutcome,
    ) -> &ToolExecutionRecord {
        self.record_at(invocation, outcome, Utc::now())
    }

    fn record_at(
        &mut self,
        invocation: &ToolInvocation,
        outcome: &ToolOutcome,
        now: DateTime<Utc>,
    ) -> &ToolExecutionRecord {
        let timestamp = match self.records.last() {
            Some(last) if last.timestamp > now => last.timestamp,
            _ => now,
        };
        self.records.push(ToolExecutionRecord {
            tool: invocation.tool,
            args: invocation.args.clone(),
            result: outcome.result.clone(),
            success: outcome.success,
            timestamp,
        });
        &self.records[self.records.len() - 1]
    }

    pub fn records(&self) -> &[ToolExecutionRecord] {
        &self.records
    }

    /// Full copy of the trail, attached to every emitted event.
    pub fn snapshot(&self) -> Vec<ToolExecutionRecord> {
        self.records.clone()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
