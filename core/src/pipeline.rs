//! Per-file streaming conversion and the parallel orchestrator.
//!
//! Each input file is converted independently: memory-mapped, split on
//! newlines, decoded line by line, and streamed to a `.part` sidecar that
//! is renamed into place only when the whole file survives. A file is
//! abandoned on its second malformed line, or on the first COMBATANT_INFO
//! failure (a snapshot that cannot be decoded means the whole match record
//! is untrustworthy). Abandoned files never publish partial output.
//!
//! Workers share nothing: every file gets its own converter, flag caches
//! included, so one file's malformed-input cascade cannot leak into
//! another's.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use memchr::memchr_iter;
use memmap2::Mmap;
use rayon::prelude::*;
use serde::Serialize;

use crate::combatant;
use crate::dispatch::{EventDispatcher, Record};
use crate::error::ParseError;
use crate::state::{ParserState, line_fingerprint};
use crate::timestamp::{epoch_seconds, extract_year_hint, resolve_timestamp};
use crate::tokenizer::{split_flat, split_nested};

/// Default worker cap when neither the caller nor the environment says
/// otherwise. Conversion is I/O heavy; two workers saturate most disks.
const DEFAULT_MAX_WORKERS: usize = 2;

const MAX_WORKERS_ENV: &str = "WOWLOG_MAX_WORKERS";

/// Terminal state of one file's conversion.
#[derive(Debug)]
pub enum FileOutcome {
    Completed { records: u64 },
    Skipped { reason: String },
    Failed { reason: String },
}

impl FileOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FileOutcome::Completed { .. })
    }
}

/// One file's decoding context: dispatcher, per-file state, and the year
/// hint recovered from the file name.
pub struct LogConverter {
    dispatcher: EventDispatcher,
    pub state: ParserState,
    year_hint: Option<i32>,
    now: chrono::NaiveDateTime,
}

impl LogConverter {
    pub fn new(file_name: impl Into<String>, year_hint: Option<i32>) -> Self {
        Self {
            dispatcher: EventDispatcher::new(),
            state: ParserState::new(file_name),
            year_hint,
            now: chrono::Local::now().naive_local(),
        }
    }

    /// Decode one raw line. `Ok(None)` means the line was deliberately
    /// dropped (a known-truncated form that is logged, not fatal).
    pub fn parse_line(&mut self, line: &str) -> Result<Option<Record>, ParseError> {
        let (instant, csv_text) = resolve_timestamp(line, self.year_hint, self.now)?;
        let epoch = epoch_seconds(instant);

        let cols = split_flat(csv_text);
        let event = *cols.first().ok_or(ParseError::MissingEventType)?;
        match event {
            "" => Err(ParseError::MissingEventType),
            "COMBATANT_INFO" => {
                // Snapshot columns embed nested literals; re-split depth-aware.
                let cols = split_nested(csv_text);
                combatant::parse_snapshot(epoch, &cols[1..]).map(Some)
            }
            "SPELL_SUMMON" if cols.len() < 12 => {
                self.state.warn_parse(
                    "SPELL_SUMMON",
                    &cols,
                    "Incomplete SPELL_SUMMON line",
                    "source/dest (8 cols) + spellId, spellName, spellSchool",
                );
                Ok(None)
            }
            "ENCHANT_APPLIED" | "ENCHANT_REMOVED" if cols.len() < 9 => {
                Err(ParseError::IncompleteEvent(event.to_string()))
            }
            _ => self
                .dispatcher
                .dispatch(&mut self.state, epoch, &cols)
                .map(Some),
        }
    }
}

/// The event name of a raw line, for attributing failures without
/// re-tokenizing.
fn event_hint(line: &str) -> Option<&str> {
    let csv_part = line.splitn(3, char::is_whitespace).nth(2)?;
    let event = csv_part.split(',').next()?.trim();
    (!event.is_empty()).then_some(event)
}

fn part_path(dst: &Path) -> PathBuf {
    let mut os = dst.as_os_str().to_os_string();
    os.push(".part");
    PathBuf::from(os)
}

/// Convert one log file to NDJSON. Output is written to `<dst>.part` and
/// renamed only on completion; a skipped or failed file leaves no `dst`.
pub fn convert_file(src: &Path, dst: &Path) -> FileOutcome {
    let file_name = src
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| src.display().to_string());
    let mut converter = LogConverter::new(&file_name, extract_year_hint(src));

    match convert_file_inner(&mut converter, src, dst) {
        Ok(records) => match converter.state.skip_reason.take() {
            None => FileOutcome::Completed { records },
            Some(reason) => {
                tracing::warn!(file = %file_name, %reason, "file skipped");
                FileOutcome::Skipped {
                    reason: format!("{file_name} skipped: {reason}"),
                }
            }
        },
        Err(e) => {
            tracing::error!(file = %file_name, error = %e, "conversion failed");
            // A failed file must not leave its sidecar behind either.
            let _ = fs::remove_file(part_path(dst));
            FileOutcome::Failed {
                reason: format!("error converting {file_name}: {e}"),
            }
        }
    }
}

fn convert_file_inner(
    converter: &mut LogConverter,
    src: &Path,
    dst: &Path,
) -> Result<u64, ParseError> {
    let file = File::open(src)?;
    // Input files are not written to while being converted.
    let mmap = unsafe { Mmap::map(&file)? };
    let bytes = mmap.as_ref();

    let tmp = part_path(dst);
    let mut writer = BufWriter::new(File::create(&tmp)?);
    let mut records = 0u64;

    let mut start = 0usize;
    let mut line_no = 0u64;
    for end in memchr_iter(b'\n', bytes).chain(std::iter::once(bytes.len())) {
        let range = &bytes[start..end.min(bytes.len())];
        start = end + 1;
        line_no += 1;

        let line = String::from_utf8_lossy(range);
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }

        converter.state.line_no = line_no;
        converter.state.raw_line = line.to_string();

        match converter.parse_line(line) {
            Ok(Some(mut record)) => {
                // Short content hash of the source line, for auditability.
                record.insert(
                    "lh".into(),
                    serde_json::Value::String(line_fingerprint(line)),
                );
                serde_json::to_writer(&mut writer, &record)
                    .map_err(|e| ParseError::Io(e.into()))?;
                writer.write_all(b"\n")?;
                records += 1;
            }
            Ok(None) => {}
            Err(e) if e.is_line_level() => {
                let state = &mut converter.state;
                if event_hint(line) == Some("COMBATANT_INFO") {
                    state.skip_reason =
                        Some(format!("malformed COMBATANT_INFO at line {line_no}: {e}"));
                } else {
                    state.malformed_lines += 1;
                    if state.malformed_lines >= 2 {
                        state.skip_reason = Some(format!(
                            "more than one malformed line; last at line {line_no}: {e}"
                        ));
                    }
                }
                tracing::warn!(
                    error = %e,
                    file = %state.file_name,
                    line = line_no,
                    raw = %line,
                    "line dropped"
                );
                if state.skip_reason.is_some() {
                    break;
                }
            }
            Err(e) => return Err(e),
        }
    }

    writer.flush()?;
    drop(writer);

    if converter.state.skip_reason.is_some() {
        // Partial output must not be promoted; removal is best effort.
        let _ = fs::remove_file(&tmp);
        return Ok(records);
    }
    fs::rename(&tmp, dst)?;
    Ok(records)
}

/// Aggregate outcome of a conversion run.
#[derive(Debug, Default, Serialize)]
pub struct ConversionReport {
    pub converted: usize,
    pub skipped: usize,
    /// Inputs whose output already existed and were not re-converted.
    pub skipped_existing: usize,
    /// Distinct error messages with repeat counts.
    pub errors: BTreeMap<String, u64>,
}

fn resolved_workers(max_workers: Option<usize>) -> usize {
    if let Some(n) = max_workers {
        return n.max(1);
    }
    if let Some(n) = std::env::var(MAX_WORKERS_ENV)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
    {
        return n.max(1);
    }
    let cores = std::thread::available_parallelism().map_or(1, |n| n.get());
    DEFAULT_MAX_WORKERS.min(cores).max(1)
}

/// Convert a file set in parallel across a bounded worker pool.
///
/// Files whose output already exists are skipped up front. `max_files`
/// keeps only the N smallest remaining inputs (cheap smoke runs over a
/// large corpus). Individual failures never abort the run.
pub fn convert_files(
    inputs: &[PathBuf],
    output_dir: &Path,
    max_workers: Option<usize>,
    max_files: Option<usize>,
) -> Result<ConversionReport, ParseError> {
    let mut report = ConversionReport::default();

    let mut tasks: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(inputs.len());
    for src in inputs {
        let stem = src
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "log".to_string());
        let dst = output_dir.join(format!("{stem}.json"));
        if dst.exists() {
            report.skipped_existing += 1;
            continue;
        }
        tasks.push((src.clone(), dst));
    }
    if report.skipped_existing > 0 {
        tracing::info!(count = report.skipped_existing, "skipping already-converted files");
    }

    if let Some(limit) = max_files.filter(|&n| n > 0) {
        tasks.sort_by_key(|(src, _)| fs::metadata(src).map(|m| m.len()).unwrap_or(u64::MAX));
        tasks.truncate(limit);
    }
    if tasks.is_empty() {
        tracing::info!("no new files to convert");
        return Ok(report);
    }

    let workers = resolved_workers(max_workers);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| ParseError::Io(std::io::Error::other(e)))?;

    let outcomes: Vec<FileOutcome> = pool.install(|| {
        tasks
            .par_iter()
            .map(|(src, dst)| convert_file(src, dst))
            .collect()
    });

    for outcome in outcomes {
        match outcome {
            FileOutcome::Completed { .. } => report.converted += 1,
            FileOutcome::Skipped { reason } | FileOutcome::Failed { reason } => {
                report.skipped += 1;
                *report.errors.entry(reason).or_insert(0) += 1;
            }
        }
    }

    tracing::info!(
        converted = report.converted,
        skipped = report.skipped,
        "conversion finished"
    );
    for (msg, count) in &report.errors {
        tracing::warn!(occurrences = count, "{msg}");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    const GOOD_CAST: &str = "5/1 20:00:01.000  SPELL_CAST_SUCCESS,Player-1096-0A502AE2,\"Thrall\",0x511,0x0,Player-1096-06DC3D9B,\"Jaina\",0x10548,0x0,1449,\"Arcane Explosion\",64";
    const GOOD_ARENA: &str = "11/17 21:13:49.617  ARENA_MATCH_START,572,0,Rated Solo Shuffle,0";
    // Too few columns for the mandatory actor block.
    const BAD_LINE: &str = "5/1 20:00:02.000  SPELL_DAMAGE,Player-1,\"Name\",0x511";
    const BAD_SNAPSHOT: &str = "5/1 20:00:03.000  COMBATANT_INFO,Player-1096-0A502AE2,0";

    fn write_log(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, lines.join("\n")).unwrap();
        path
    }

    fn read_records(path: &Path) -> Vec<Record> {
        let mut text = String::new();
        File::open(path).unwrap().read_to_string(&mut text).unwrap();
        text.lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn clean_file_completes_with_fingerprints() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_log(dir.path(), "a.txt", &[GOOD_CAST, GOOD_ARENA]);
        let dst = dir.path().join("a.json");

        let outcome = convert_file(&src, &dst);
        assert!(outcome.is_success());
        let records = read_records(&dst);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["event"], "SPELL_CAST_SUCCESS");
        assert_eq!(records[1]["matchType"], "Rated_Solo_Shuffle");
        assert_eq!(records[0]["lh"].as_str().unwrap().len(), 8);
        assert!(!part_path(&dst).exists());
    }

    #[test]
    fn second_malformed_line_skips_file_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_log(dir.path(), "b.txt", &[GOOD_CAST, BAD_LINE, BAD_LINE, GOOD_CAST]);
        let dst = dir.path().join("b.json");

        let outcome = convert_file(&src, &dst);
        assert!(matches!(outcome, FileOutcome::Skipped { .. }));
        assert!(!dst.exists());
        assert!(!part_path(&dst).exists());
    }

    #[test]
    fn single_malformed_line_still_completes() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_log(dir.path(), "c.txt", &[BAD_LINE, GOOD_CAST]);
        let dst = dir.path().join("c.json");

        let outcome = convert_file(&src, &dst);
        assert!(outcome.is_success());
        assert_eq!(read_records(&dst).len(), 1);
    }

    #[test]
    fn combatant_info_failure_skips_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_log(dir.path(), "d.txt", &[GOOD_CAST, BAD_SNAPSHOT, GOOD_CAST]);
        let dst = dir.path().join("d.json");

        let outcome = convert_file(&src, &dst);
        let FileOutcome::Skipped { reason } = outcome else {
            panic!("expected skip");
        };
        assert!(reason.contains("COMBATANT_INFO"));
        assert!(!dst.exists());
    }

    #[test]
    fn decode_serialize_round_trip() {
        let mut converter = LogConverter::new("t.txt", Some(2023));
        let record = converter.parse_line(GOOD_CAST).unwrap().unwrap();
        let json = serde_json::to_string(&record).unwrap();
        let reparsed: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(record, reparsed);
    }

    #[test]
    fn short_enchant_line_is_line_fatal() {
        let mut converter = LogConverter::new("t.txt", Some(2023));
        let line = "5/1 20:00:01.000  ENCHANT_APPLIED,Player-1,\"A\",0x511,0x0,Player-2,\"B\",0x10548";
        assert!(matches!(
            converter.parse_line(line),
            Err(ParseError::IncompleteEvent(event)) if event == "ENCHANT_APPLIED"
        ));
    }

    #[test]
    fn unreadable_input_fails_without_leftover_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("missing.txt");
        let dst = dir.path().join("missing.json");

        let outcome = convert_file(&src, &dst);
        assert!(matches!(outcome, FileOutcome::Failed { .. }));
        assert!(!dst.exists());
        assert!(!part_path(&dst).exists());
    }

    #[test]
    fn truncated_summon_is_dropped_not_fatal() {
        let mut converter = LogConverter::new("t.txt", Some(2023));
        let line = "5/1 20:00:01.000  SPELL_SUMMON,Player-1,\"A\",0x511,0x0,Pet-1,\"B\",0x1111,0x0";
        assert!(converter.parse_line(line).unwrap().is_none());
        assert_eq!(converter.state.warning_counts.len(), 1);
    }

    #[test]
    fn orchestrator_skips_existing_and_aggregates() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        fs::create_dir_all(&out).unwrap();

        let a = write_log(dir.path(), "a.txt", &[GOOD_CAST]);
        let b = write_log(dir.path(), "b.txt", &[BAD_LINE, BAD_LINE]);
        let c = write_log(dir.path(), "c.txt", &[GOOD_ARENA]);
        fs::write(out.join("c.json"), "{}\n").unwrap();

        let report = convert_files(&[a, b, c], &out, Some(1), None).unwrap();
        assert_eq!(report.converted, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.skipped_existing, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(out.join("a.json").exists());
        assert!(!out.join("b.json").exists());
    }
}
