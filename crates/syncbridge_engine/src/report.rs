//! Errors collected during an incoming flow and their response mapping.

use crate::error::SyncError;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Message returned for any server-side failure.
pub const INTERNAL_SERVER_ERROR: &str = "Internal server error.";

/// Errors grouped by status code, then by error kind.
///
/// A later error of the same code and kind replaces the earlier message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ErrorReport {
    entries: BTreeMap<u16, BTreeMap<String, String>>,
}

impl ErrorReport {
    /// Creates an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `message` under `code` and `kind`.
    pub fn insert(&mut self, code: u16, kind: impl Into<String>, message: impl Into<String>) {
        self.entries
            .entry(code)
            .or_default()
            .insert(kind.into(), message.into());
    }

    /// Records an error under its own code and kind.
    pub fn add(&mut self, error: &SyncError) {
        self.insert(error.status_code(), error.kind(), error.to_string());
    }

    /// Moves every entry of `other` into this report.
    pub fn merge(&mut self, other: ErrorReport) {
        for (code, kinds) in other.entries {
            self.entries.entry(code).or_default().extend(kinds);
        }
    }

    /// True if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of recorded messages.
    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    /// Message recorded under `code` and `kind`.
    pub fn get(&self, code: u16, kind: &str) -> Option<&str> {
        self.entries.get(&code)?.get(kind).map(String::as_str)
    }

    /// Every `(code, kind, message)` in code order.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &str, &str)> {
        self.entries.iter().flat_map(|(code, kinds)| {
            kinds
                .iter()
                .map(move |(kind, message)| (*code, kind.as_str(), message.as_str()))
        })
    }

    /// Status code and message for the response of a request.
    ///
    /// Any server-side code yields `(500, "Internal server error.")`. Other
    /// codes are grouped by hundreds; the highest group wins, reported as its
    /// single code or as the bare group (`400`) when it holds several.
    /// Uncategorized errors (code `0`) count as server-side.
    pub fn response(&self) -> (u16, String) {
        let mut codes = Vec::new();
        let mut messages = Vec::new();

        for (code, kinds) in &self.entries {
            let code = if *code == 0 { 500 } else { *code };
            if code >= 500 {
                return (500, INTERNAL_SERVER_ERROR.to_string());
            }
            for message in kinds.values() {
                codes.push(code);
                messages.push(message.as_str());
            }
        }

        (final_code(&codes), messages.join("; "))
    }
}

fn final_code(codes: &[u16]) -> u16 {
    let mut groups: BTreeMap<u16, BTreeSet<u16>> = BTreeMap::new();
    for &code in codes {
        groups.entry(code / 100).or_default().insert(code);
    }
    match groups.iter().next_back() {
        None => 204,
        Some((_, members)) if members.len() == 1 => members.iter().next().copied().unwrap_or(204),
        Some((group, _)) => group * 100,
    }
}
