//! Per-request journal.
//!
//! Each proxied request appends one JSON line to the journal file and is kept in an
//! in-memory ring buffer so recent traffic can be inspected without re-reading the file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const MAX_RECORDS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Backend reply relayed to the caller, whatever its status.
    Relayed,
    /// Stream opened and ran to completion.
    Streamed,
    /// Stream broke after the first chunk.
    StreamFailed,
    /// Model listing served from the built-in list.
    Fallback,
    /// The proxy answered with an error envelope.
    ProxyError,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestRecord {
    pub timestamp: DateTime<Utc>,
    pub request_id: Uuid,
    pub route: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl RequestRecord {
    pub fn new(request_id: Uuid, route: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            timestamp: Utc::now(),
            request_id,
            route: route.into(),
            model: None,
            stream: false,
            status: None,
            outcome,
            detail: None,
        }
    }

    pub fn model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

pub struct Journal {
    records: VecDeque<RequestRecord>,
    writer: BufWriter<File>,
}

impl Journal {
    /// Open (or create) the journal file, reloading the most recent records it holds.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut records = VecDeque::with_capacity(MAX_RECORDS);

        if path.exists() {
            let reader = BufReader::new(File::open(path)?);
            for line in reader.lines().map_while(std::result::Result::ok) {
                // lines from older or foreign formats are skipped
                if let Ok(record) = serde_json::from_str::<RequestRecord>(&line) {
                    if records.len() >= MAX_RECORDS {
                        records.pop_front();
                    }
                    records.push_back(record);
                }
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            records,
            writer: BufWriter::new(file),
        })
    }

    pub fn append(&mut self, record: RequestRecord) {
        if let Ok(json) = serde_json::to_string(&record) {
            if writeln!(self.writer, "{}", json)
                .and_then(|()| self.writer.flush())
                .is_err()
            {
                tracing::warn!(request_id = %record.request_id, "failed to write journal record");
            }
        }
        if self.records.len() >= MAX_RECORDS {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    pub fn recent(&self, limit: usize) -> Vec<RequestRecord> {
        self.records.iter().rev().take(limit).cloned().collect()
    }
}

#[derive(Clone)]
pub struct SharedJournal(Arc<Mutex<Journal>>);

impl SharedJournal {
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(Self(Arc::new(Mutex::new(Journal::open(path)?))))
    }

    pub fn append(&self, record: RequestRecord) {
        if let Ok(mut journal) = self.0.lock() {
            journal.append(record);
        }
    }

    pub fn recent(&self, limit: usize) -> Vec<RequestRecord> {
        self.0.lock().map(|j| j.recent(limit)).unwrap_or_default()
    }
}
