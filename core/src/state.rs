//! Per-file parser state and warning deduplication.
//!
//! One `ParserState` lives for the duration of one file and is owned by the
//! worker processing it; nothing here is shared across files.

use hashbrown::HashMap;

/// How many leading columns a warning fingerprint samples. Enough to tell
/// two malformed layouts apart without hashing entire snapshot lines.
const WARN_SAMPLE_COLS: usize = 6;

/// Mutable context threaded through every line decode attempt.
#[derive(Debug, Default)]
pub struct ParserState {
    pub file_name: String,
    pub line_no: u64,
    pub raw_line: String,
    /// Count of line-fatal failures seen so far in this file.
    pub malformed_lines: u32,
    /// Occurrence count per warning fingerprint, for log dedup.
    pub warning_counts: HashMap<String, u32>,
    /// Once set, the file stops streaming and is reported as skipped.
    pub skip_reason: Option<String>,
}

impl ParserState {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            ..Self::default()
        }
    }

    /// Record a partial-parse warning, logging it only on first occurrence
    /// of its (event, reason, file, column-sample) fingerprint.
    pub fn warn_parse(&mut self, event: &str, cols: &[&str], reason: &str, expected: &str) {
        let sample = sample_cols(cols);
        let id = warning_id(event, reason, &self.file_name, &sample);
        let count = self.warning_counts.entry(id.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            tracing::warn!(
                event,
                reason,
                expected,
                cols = %sample,
                file = %self.file_name,
                line = self.line_no,
                warning_id = %id,
                raw = %truncate(&self.raw_line, 500),
                "partial parse"
            );
        }
    }
}

fn sample_cols(cols: &[&str]) -> String {
    format!("{:?}", &cols[..cols.len().min(WARN_SAMPLE_COLS)])
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Short deterministic fingerprint of a warning identity.
pub fn warning_id(event: &str, reason: &str, file_name: &str, cols_sample: &str) -> String {
    let mut hash = fnv1a(event.as_bytes());
    for part in [reason, file_name, cols_sample] {
        hash = fnv1a_continue(hash, b"|");
        hash = fnv1a_continue(hash, part.as_bytes());
    }
    fold_hex(hash)
}

/// Short content fingerprint of a raw line, attached to emitted records
/// for auditability.
pub fn line_fingerprint(raw_line: &str) -> String {
    fold_hex(fnv1a(raw_line.as_bytes()))
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    fnv1a_continue(FNV_OFFSET, bytes)
}

fn fnv1a_continue(mut hash: u64, bytes: &[u8]) -> u64 {
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

fn fold_hex(hash: u64) -> String {
    format!("{:08x}", (hash ^ (hash >> 32)) as u32)
}
