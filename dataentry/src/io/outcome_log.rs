//! Append-only outcome log (`row,status,message`).
//!
//! The log is the durable record of every attempted or skipped row and the
//! only input to resume. Records are flushed one at a time so a crash loses
//! at most the in-flight row. CSV is the default format; a `.jsonl` path
//! switches to JSON Lines.

use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::core::resume::completed_rows;
use crate::core::types::OutcomeRecord;

const CSV_HEADER: [&str; 3] = ["row", "status", "message"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Csv,
    JsonLines,
}

impl LogFormat {
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("jsonl") => LogFormat::JsonLines,
            _ => LogFormat::Csv,
        }
    }
}

enum Sink {
    Csv(csv::Writer<File>),
    JsonLines(File),
}

/// Open handle on the outcome log. Dropping it flushes and closes the file.
pub struct OutcomeLog {
    path: PathBuf,
    sink: Sink,
}

impl OutcomeLog {
    /// Open `path` for appending, creating it (and its header) when new or empty.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        let fresh = fs::metadata(path).map(|meta| meta.len() == 0).unwrap_or(true);
        if !fresh {
            terminate_partial_line(path)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open outcome log {}", path.display()))?;

        let sink = match LogFormat::for_path(path) {
            LogFormat::Csv => {
                let mut writer = csv::WriterBuilder::new()
                    .has_headers(false)
                    .from_writer(file);
                if fresh {
                    writer
                        .write_record(CSV_HEADER)
                        .context("write outcome log header")?;
                    writer.flush().context("flush outcome log")?;
                }
                Sink::Csv(writer)
            }
            LogFormat::JsonLines => Sink::JsonLines(file),
        };
        debug!(path = %path.display(), fresh, "outcome log opened");
        Ok(Self {
            path: path.to_path_buf(),
            sink,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record and flush it to disk.
    pub fn append(&mut self, record: &OutcomeRecord) -> Result<()> {
        match &mut self.sink {
            Sink::Csv(writer) => {
                writer
                    .serialize(record)
                    .with_context(|| format!("append row {} to outcome log", record.row))?;
                writer.flush().context("flush outcome log")?;
            }
            Sink::JsonLines(file) => {
                let mut line = serde_json::to_string(record).context("serialize outcome")?;
                line.push('\n');
                file.write_all(line.as_bytes())
                    .with_context(|| format!("append row {} to outcome log", record.row))?;
                file.flush().context("flush outcome log")?;
            }
        }
        Ok(())
    }
}

/// A crash mid-write can leave a final line without its newline; close it so
/// the next record starts on a fresh line.
fn terminate_partial_line(path: &Path) -> Result<()> {
    let mut file = OpenOptions::new()
        .read(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open outcome log {}", path.display()))?;
    file.seek(SeekFrom::End(-1))
        .with_context(|| format!("seek outcome log {}", path.display()))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)
        .with_context(|| format!("read outcome log {}", path.display()))?;
    if last[0] != b'\n' {
        warn!(path = %path.display(), "outcome log ends mid-record; terminating the line");
        file.write_all(b"\n")
            .with_context(|| format!("repair outcome log {}", path.display()))?;
    }
    Ok(())
}

/// Read every parseable record of a prior log. Missing file reads as empty.
///
/// Malformed records (typically a line torn by a crash) are skipped with a
/// warning rather than failing the run.
pub fn read_outcomes(path: &Path) -> Result<Vec<OutcomeRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let records = match LogFormat::for_path(path) {
        LogFormat::Csv => read_csv_outcomes(path)?,
        LogFormat::JsonLines => read_jsonl_outcomes(path)?,
    };
    debug!(path = %path.display(), records = records.len(), "prior outcomes loaded");
    Ok(records)
}

fn read_csv_outcomes(path: &Path) -> Result<Vec<OutcomeRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("open outcome log {}", path.display()))?;
    let mut records = Vec::new();
    for (idx, result) in reader.deserialize::<OutcomeRecord>().enumerate() {
        match result {
            Ok(record) => records.push(record),
            Err(err) => warn!(line = idx + 2, %err, "skipping malformed outcome record"),
        }
    }
    Ok(records)
}

fn read_jsonl_outcomes(path: &Path) -> Result<Vec<OutcomeRecord>> {
    let file = File::open(path).with_context(|| format!("open outcome log {}", path.display()))?;
    let mut records = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("read outcome log {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<OutcomeRecord>(&line) {
            Ok(record) => records.push(record),
            Err(err) => warn!(line = idx + 1, %err, "skipping malformed outcome record"),
        }
    }
    Ok(records)
}

/// Row numbers logged as `success` in the prior log at `path`.
pub fn load_completed_rows(path: &Path) -> Result<BTreeSet<usize>> {
    let records = read_outcomes(path)?;
    Ok(completed_rows(&records))
}
