//! Per-scenario judgment trace as JSONL.
//!
//! Rows carry canonical labels only; the A/B order of a comparison is never
//! written.

use serde::{Deserialize, Serialize};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::mpsc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::judge::Winner;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgmentTrace {
    pub timestamp_ms: i64,
    pub scenario_index: usize,
    pub scenario_id: String,
    pub judge_model: String,
    pub template_slug: String,
    pub prompt_hash: String,
    /// "structured" or "heuristic".
    pub mode: String,
    pub fallback_reason: Option<String>,
    pub winner: Winner,
    pub format_one_score: f64,
    pub format_two_score: f64,
    pub confidence: f64,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost_nanodollars: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(String),
    #[error("trace channel closed")]
    Closed,
    #[error("trace worker failed: {0}")]
    Join(String),
}

pub trait TraceSink: Send + Sync {
    fn record(&self, event: JudgmentTrace) -> Result<(), TraceError>;
}

#[derive(Clone)]
pub struct JsonlTraceSink {
    sender: mpsc::Sender<JudgmentTrace>,
}

/// Background writer; `join` after the last sink clone is dropped.
pub struct TraceWorker {
    handle: Option<std::thread::JoinHandle<Result<(), TraceError>>>,
}

impl TraceWorker {
    pub fn join(mut self) -> Result<(), TraceError> {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .unwrap_or_else(|_| Err(TraceError::Join("trace worker panicked".to_string()))),
            None => Ok(()),
        }
    }
}

impl JsonlTraceSink {
    pub fn new(path: impl AsRef<Path>) -> Result<(Self, TraceWorker), TraceError> {
        let file = std::fs::File::create(path)?;
        let (sender, receiver) = mpsc::channel::<JudgmentTrace>();
        let handle = std::thread::spawn(move || write_loop(file, receiver));
        Ok((
            Self { sender },
            TraceWorker {
                handle: Some(handle),
            },
        ))
    }
}

impl TraceSink for JsonlTraceSink {
    fn record(&self, event: JudgmentTrace) -> Result<(), TraceError> {
        self.sender.send(event).map_err(|_| TraceError::Closed)
    }
}

fn write_loop(
    file: std::fs::File,
    receiver: mpsc::Receiver<JudgmentTrace>,
) -> Result<(), TraceError> {
    let mut writer = BufWriter::new(file);
    for event in receiver {
        let line = serde_json::to_string(&event).map_err(|e| TraceError::Serde(e.to_string()))?;
        writeln!(writer, "{line}")?;
    }
    writer.flush()?;
    Ok(())
}

pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
