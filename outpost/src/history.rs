//! Local telemetry history: a JSON-lines store plus the capped table view.

use crate::feed::{Field, Value};

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Default retention cap, in records.
pub const DEFAULT_RETENTION: usize = 10_000;
/// Rows the live table keeps.
pub const TABLE_CAPACITY: usize = 10;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// One stored telemetry row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: u64,
    pub time: String,
    pub field: Field,
    pub value: Value,
}

/// One line of the live table. Rows exist even when persistence is
/// disabled, so they carry no store id.
#[derive(Debug, Clone)]
pub struct Row {
    pub time: String,
    pub field: Field,
    pub value: Value,
}

/// Append-only JSON-lines store with auto-increment ids and a retention
/// cap. Once the file runs 10% over the cap it is rewritten down to the
/// newest `retention` records.
pub struct Store {
    path: PathBuf,
    file: File,
    next_id: u64,
    len: usize,
    retention: usize,
}

impl Store {
    pub fn open(path: &Path, retention: usize) -> Result<Store, StoreError> {
        let existing = match read_records(path) {
            Ok(records) => records,
            Err(StoreError::Io(err)) if err.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(err),
        };
        let next_id = existing.iter().map(|r| r.id).max().map_or(1, |max| max + 1);
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Store {
            path: path.to_path_buf(),
            file,
            next_id,
            len: existing.len(),
            retention: retention.max(1),
        })
    }

    pub fn append(&mut self, time: &str, field: &Field, value: &Value) -> Result<u64, StoreError> {
        let record = Record {
            id: self.next_id,
            time: time.to_string(),
            field: field.clone(),
            value: value.clone(),
        };
        let line = serde_json::to_string(&record)?;
        writeln!(self.file, "{}", line)?;
        self.next_id += 1;
        self.len += 1;
        if self.len > self.retention + self.retention / 10 {
            self.prune()?;
        }
        Ok(record.id)
    }

    /// Rewrites the file keeping only the newest `retention` records.
    /// Returns how many were removed.
    pub fn prune(&mut self) -> Result<usize, StoreError> {
        let records = read_records(&self.path)?;
        if records.len() <= self.retention {
            return Ok(0);
        }
        let removed = records.len() - self.retention;
        let kept = &records[removed..];
        let tmp = self.path.with_extension("tmp");
        {
            let mut out = BufWriter::new(File::create(&tmp)?);
            for record in kept {
                let line = serde_json::to_string(record)?;
                writeln!(out, "{}", line)?;
            }
            out.flush()?;
        }
        std::fs::rename(&tmp, &self.path)?;
        self.file = OpenOptions::new().append(true).open(&self.path)?;
        self.len = kept.len();
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Reads every record in the file, skipping lines that fail to parse.
pub fn read_records(path: &Path) -> Result<Vec<Record>, StoreError> {
    let file = File::open(path)?;
    let mut records = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(record) => records.push(record),
            Err(err) => debug!("skipping corrupt history line: {}", err),
        }
    }
    Ok(records)
}

/// Newest-first table of the latest readings, capped at `TABLE_CAPACITY`.
#[derive(Debug, Default)]
pub struct RecentTable {
    rows: VecDeque<Row>,
}

impl RecentTable {
    pub fn new() -> RecentTable {
        RecentTable::default()
    }

    pub fn push(&mut self, row: Row) {
        self.rows.push_front(row);
        if self.rows.len() > TABLE_CAPACITY {
            self.rows.pop_back();
        }
    }

    /// Newest first.
    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_n(store: &mut Store, n: usize) {
        for i in 0..n {
            store
                .append("10:00:00", &Field::Temperature, &Value::Number(i as f64))
                .unwrap();
        }
    }

    #[test]
    fn append_assigns_increasing_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        let mut store = Store::open(&path, 100).unwrap();
        let a = store
            .append("10:00:00", &Field::Temperature, &Value::Number(21.0))
            .unwrap();
        let b = store
            .append("10:00:01", &Field::Humidity, &Value::Number(50.0))
            .unwrap();
        assert_eq!((a, b), (1, 2));
        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].field, Field::Humidity);
    }

    #[test]
    fn reopen_continues_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        {
            let mut store = Store::open(&path, 100).unwrap();
            push_n(&mut store, 2);
        }
        let mut store = Store::open(&path, 100).unwrap();
        let id = store
            .append("10:00:05", &Field::Temperature, &Value::Number(22.0))
            .unwrap();
        assert_eq!(id, 3);
    }

    #[test]
    fn retention_prunes_to_newest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        let mut store = Store::open(&path, 5).unwrap();
        push_n(&mut store, 8);
        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 5);
        assert_eq!(records[0].id, 4);
        assert_eq!(records[4].id, 8);
    }

    #[test]
    fn manual_prune_applies_a_tighter_cap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        {
            let mut store = Store::open(&path, 100).unwrap();
            push_n(&mut store, 6);
        }
        let mut store = Store::open(&path, 4).unwrap();
        assert_eq!(store.prune().unwrap(), 2);
        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].id, 3);
        // Ids keep counting from the pruned tail.
        let id = store
            .append("10:00:09", &Field::Temperature, &Value::Number(25.0))
            .unwrap();
        assert_eq!(id, 7);
    }

    #[test]
    fn corrupt_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        {
            let mut store = Store::open(&path, 100).unwrap();
            push_n(&mut store, 2);
        }
        let mut raw = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(raw, "{{not json").unwrap();
        {
            let mut store = Store::open(&path, 100).unwrap();
            push_n(&mut store, 1);
        }
        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].id, 3);
    }

    #[test]
    fn table_keeps_ten_rows_newest_first() {
        let mut table = RecentTable::new();
        for i in 0..12 {
            table.push(Row {
                time: format!("10:00:{:02}", i),
                field: Field::Temperature,
                value: Value::Number(i as f64),
            });
        }
        assert_eq!(table.len(), TABLE_CAPACITY);
        assert_eq!(table.rows().next().unwrap().time, "10:00:11");
        assert_eq!(table.rows().last().unwrap().time, "10:00:02");
    }
}
