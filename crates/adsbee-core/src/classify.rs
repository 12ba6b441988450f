//! Per-line classification: counters, display filtering, severity tags.

use std::collections::HashSet;

use chrono::{DateTime, Local};
use regex::Regex;

/// Session counters. All counters only ever go up; the ICAO set records
/// every distinct lower-cased address seen, in first-seen order.
#[derive(Debug, Clone)]
pub struct Stats {
    pub total: u64,
    pub filtered: u64,
    pub duplicates: u64,
    pub decode_failures: u64,
    pub bit_errors: u64,
    pub chatter: u64,
    pub commands_sent: u64,
    pub started: DateTime<Local>,
    icao_seen: HashSet<String>,
    icao_order: Vec<String>,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            total: 0,
            filtered: 0,
            duplicates: 0,
            decode_failures: 0,
            bit_errors: 0,
            chatter: 0,
            commands_sent: 0,
            started: Local::now(),
            icao_seen: HashSet::new(),
            icao_order: Vec::new(),
        }
    }
}

impl Stats {
    pub fn unique_icaos(&self) -> usize {
        self.icao_seen.len()
    }

    /// Up to `n` most recently first-seen ICAO addresses, newest last.
    pub fn recent_icaos(&self, n: usize) -> &[String] {
        let start = self.icao_order.len().saturating_sub(n);
        &self.icao_order[start..]
    }

    fn record_icao(&mut self, icao: String) {
        if self.icao_seen.insert(icao.clone()) {
            self.icao_order.push(icao);
        }
    }
}

/// Fixed-width severity tag prepended to displayed lines. Strict priority:
/// error > warning > chatter > info > none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Error,
    Warning,
    Chatter,
    Info,
    Sent,
    System,
    Plain,
}

impl Tag {
    pub fn label(self) -> &'static str {
        match self {
            Tag::Error => "[ERR]",
            Tag::Warning => "[WRN]",
            Tag::Chatter => "[MQT]",
            Tag::Info => "[INF]",
            Tag::Sent => "[TX ]",
            Tag::System => "[SYS]",
            Tag::Plain => "     ",
        }
    }
}

pub struct Classifier {
    duplicate: Regex,
    decode_fail: Regex,
    bit_error: Regex,
    chatter: Regex,
    icao: Regex,
    error: Regex,
    warning: Regex,
    info: Regex,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier {
    pub fn new() -> Self {
        Self {
            duplicate: Regex::new(r"(?i)duplicate packet.*icao=0x([a-f0-9]+)")
                .expect("valid regex"),
            decode_fail: Regex::new(r"(?i)unable to decode.*icao 0x([a-f0-9]+)")
                .expect("valid regex"),
            bit_error: Regex::new(r"(?i)corrected.*bit error").expect("valid regex"),
            chatter: Regex::new(r"(?i)mqtt|feed").expect("valid regex"),
            icao: Regex::new(r"(?i)icao=0x([a-f0-9]+)").expect("valid regex"),
            error: Regex::new(r"(?i)error|failed").expect("valid regex"),
            warning: Regex::new(r"(?i)warning|skipped").expect("valid regex"),
            info: Regex::new(r"(?i)info").expect("valid regex"),
        }
    }

    /// Update counters for one received line. The four pattern tests are
    /// independent; a single line may bump several counters.
    pub fn record_line(&self, stats: &mut Stats, line: &str) {
        stats.total += 1;

        if self.duplicate.is_match(line) {
            stats.duplicates += 1;
        }
        if self.decode_fail.is_match(line) {
            stats.decode_failures += 1;
        }
        if self.bit_error.is_match(line) {
            stats.bit_errors += 1;
        }
        if self.chatter.is_match(line) {
            stats.chatter += 1;
        }

        for capture in self.icao.captures_iter(line) {
            stats.record_icao(capture[1].to_ascii_lowercase());
        }
    }

    /// Display decision. `filtered` is bumped by exactly one, and only when
    /// a filter match is what lets the line through; debug mode and an
    /// empty filter list pass lines without touching the counter.
    pub fn should_display(
        &self,
        stats: &mut Stats,
        filters: &[String],
        debug: bool,
        line: &str,
    ) -> bool {
        if debug || filters.is_empty() {
            return true;
        }

        let lowered = line.to_lowercase();
        for filter in filters {
            if lowered.contains(&filter.to_lowercase()) {
                stats.filtered += 1;
                return true;
            }
        }
        false
    }

    pub fn tag(&self, line: &str) -> Tag {
        if self.error.is_match(line) {
            Tag::Error
        } else if self.warning.is_match(line) {
            Tag::Warning
        } else if self.chatter.is_match(line) {
            Tag::Chatter
        } else if self.info.is_match(line) {
            Tag::Info
        } else {
            Tag::Plain
        }
    }
}
