// Copyright (c) 2025 - Cowboy AI, Inc.
//! Result Reporter
//!
//! Condenses a dispatch into a [`Summary`] and, when anything failed, into a
//! single [`FleetError::RemoteFailures`].

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{info, warn};

use crate::dispatch::{ExecutionResult, Outcome};
use crate::errors::{FleetError, FleetResult};

/// Trailing lines of output kept per failure
pub const EXCERPT_LINES: usize = 10;

/// One failed target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure<K> {
    pub target: K,
    pub host: String,
    pub exit_code: Option<i32>,
    pub excerpt: String,
}

/// Aggregate outcome of one dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary<K> {
    pub total: usize,
    pub all_ok: bool,
    /// Ordered by target
    pub failures: Vec<Failure<K>>,
}

/// Summarize a set of results
pub fn summarize<K: Ord + Clone>(results: &BTreeMap<K, ExecutionResult<K>>) -> Summary<K> {
    let failures: Vec<Failure<K>> = results
        .values()
        .filter(|result| !result.success())
        .map(|result| Failure {
            target: result.target.clone(),
            host: result.host.clone(),
            exit_code: result.exit_code(),
            excerpt: excerpt(result),
        })
        .collect();

    Summary {
        total: results.len(),
        all_ok: failures.is_empty(),
        failures,
    }
}

fn excerpt<K>(result: &ExecutionResult<K>) -> String {
    match &result.outcome {
        Outcome::Completed(output) => {
            let text = if output.stderr.trim().is_empty() {
                &output.stdout
            } else {
                &output.stderr
            };
            tail(text, EXCERPT_LINES)
        }
        Outcome::ConnectionFailed(err) => err.to_string(),
        Outcome::Aborted(reason) => format!("task aborted: {reason}"),
    }
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.trim_end().lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

impl<K: fmt::Display> Summary<K> {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Log one line per target
    pub fn log(&self, results: &BTreeMap<K, ExecutionResult<K>>) {
        for result in results.values().filter(|r| r.success()) {
            info!(
                "✅ [{}] {} ok in {}ms",
                result.target,
                result.host,
                result.duration().num_milliseconds()
            );
        }
        for failure in &self.failures {
            warn!("❌ [{}] {} failed: {}", failure.target, failure.host, first_line(&failure.excerpt));
        }
    }

    /// `Ok` when every target succeeded
    pub fn into_result(self) -> FleetResult<Self> {
        if self.all_ok {
            return Ok(self);
        }
        Err(FleetError::RemoteFailures {
            failed: self.failed(),
            total: self.total,
            details: self.render_failures(),
        })
    }

    fn render_failures(&self) -> String {
        self.failures
            .iter()
            .map(|failure| {
                let code = failure
                    .exit_code
                    .map_or_else(|| "-".to_string(), |c| c.to_string());
                let mut block = format!("  [{}] {} (exit {})", failure.target, failure.host, code);
                for line in failure.excerpt.lines() {
                    block.push_str("\n      ");
                    block.push_str(line);
                }
                block
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}

impl<K: fmt::Display> fmt::Display for Summary<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {} targets succeeded", self.total - self.failed(), self.total)?;
        if !self.all_ok {
            write!(f, "\n{}", self.render_failures())?;
        }
        Ok(())
    }
}
