//! API call history for debugging and diagnostics.

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// The API operation a history entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
    ListDevices,
    GetState,
    SetPower,
    SetBrightness,
}

/// A recorded API call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub operation: Operation,
    pub device: Option<String>,
    /// Failure text, `None` when the call succeeded
    pub error: Option<String>,
    /// Seconds since history creation
    pub timestamp: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Counts {
    calls: usize,
    failures: usize,
}

/// Bounded log of API calls made by a hub.
#[derive(Debug, Clone)]
pub struct MessageHistory {
    counts: HashMap<Operation, Counts>,
    last_error: Option<String>,
    start_time: Instant,
    entries: VecDeque<HistoryEntry>,
    max_entries: usize,
}

impl Default for MessageHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageHistory {
    pub const DEFAULT_MAX_ENTRIES: usize = 100;

    pub fn new() -> Self {
        Self {
            counts: HashMap::new(),
            last_error: None,
            start_time: Instant::now(),
            entries: VecDeque::new(),
            max_entries: Self::DEFAULT_MAX_ENTRIES,
        }
    }

    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            max_entries,
            ..Self::new()
        }
    }

    pub fn record(&mut self, operation: Operation, device: Option<&str>, error: Option<&str>) {
        let counts = self.counts.entry(operation).or_default();
        counts.calls += 1;
        if let Some(err) = error {
            counts.failures += 1;
            self.last_error = Some(format!("{operation}: {err}"));
        }

        self.entries.push_back(HistoryEntry {
            operation,
            device: device.map(String::from),
            error: error.map(String::from),
            timestamp: self.start_time.elapsed().as_secs_f64(),
        });

        while self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.counts.clear();
        self.entries.clear();
        self.last_error = None;
    }

    pub fn summary(&self) -> HistorySummary {
        let mut calls: Vec<OperationSummary> = self
            .counts
            .iter()
            .map(|(operation, counts)| OperationSummary {
                operation: *operation,
                calls: counts.calls,
                failures: counts.failures,
            })
            .collect();
        calls.sort_by_key(|s| s.operation.to_string());

        HistorySummary {
            calls,
            total_entries: self.entries.len(),
            last_error: self.last_error.clone(),
        }
    }
}

/// Per-operation call counts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationSummary {
    pub operation: Operation,
    pub calls: usize,
    pub failures: usize,
}

/// Summary of call history for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySummary {
    pub calls: Vec<OperationSummary>,
    pub total_entries: usize,
    pub last_error: Option<String>,
}
