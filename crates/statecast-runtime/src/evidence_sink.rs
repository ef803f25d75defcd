#![forbid(unsafe_code)]

//! JSONL evidence sink for broadcast diagnostics.
//!
//! An [`EvidenceSink`] is a line-oriented writer (stdout or an append-mode
//! file). [`EvidenceListener`] attaches one to a tree's root channel and
//! writes one JSON object per broadcast:
//!
//! ```text
//! {"seq":0,"origin":{"index":1,"generation":0},"field":"gate","value":{"kind":"text","value":"B2"}}
//! ```
//!
//! `seq` counts broadcasts seen by that listener. Lines appear in broadcast
//! order, nested broadcasts before the outer one that triggered them.

use std::cell::Cell;
use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use statecast_core::{FieldName, Value};

use crate::broadcast::{BroadcastEvent, BroadcastListener};
use crate::error::CallbackResult;
use crate::tree::{NodeId, StateTree};

/// Where broadcast evidence lines go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvidenceSinkDestination {
    Stdout,
    /// Opened in append mode, so several trees may share one log.
    File(PathBuf),
}

impl EvidenceSinkDestination {
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }
}

/// Whether a tree records its broadcasts, and where.
///
/// Usually built by [`PropagationConfig::from_env`](crate::PropagationConfig::from_env)
/// from `STATECAST_EVIDENCE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidenceSinkConfig {
    pub enabled: bool,
    pub destination: EvidenceSinkDestination,
    /// Push each broadcast line to the destination before the next listener
    /// runs. Off means lines reach the file when the sink is dropped.
    pub flush_on_write: bool,
}

impl Default for EvidenceSinkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            destination: EvidenceSinkDestination::Stdout,
            flush_on_write: true,
        }
    }
}

impl EvidenceSinkConfig {
    /// No broadcast log.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Log broadcasts to stdout (`STATECAST_EVIDENCE=-`).
    #[must_use]
    pub fn enabled_stdout() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// Append broadcasts to `path`.
    #[must_use]
    pub fn enabled_file(path: impl Into<PathBuf>) -> Self {
        Self {
            enabled: true,
            destination: EvidenceSinkDestination::file(path),
            flush_on_write: true,
        }
    }

    #[must_use]
    pub fn with_flush_on_write(mut self, enabled: bool) -> Self {
        self.flush_on_write = enabled;
        self
    }
}

struct SinkState {
    writer: BufWriter<Box<dyn Write + Send>>,
    flush_on_write: bool,
}

/// Append-only line writer shared by the evidence listeners of a tree.
///
/// Clones write to the same destination; lines never interleave.
#[derive(Clone)]
pub struct EvidenceSink {
    state: Arc<Mutex<SinkState>>,
}

impl std::fmt::Debug for EvidenceSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvidenceSink").finish_non_exhaustive()
    }
}

impl EvidenceSink {
    /// Open the configured destination. `Ok(None)` when broadcasts are not
    /// being recorded.
    pub fn from_config(config: &EvidenceSinkConfig) -> io::Result<Option<Self>> {
        if !config.enabled {
            return Ok(None);
        }

        let writer: Box<dyn Write + Send> = match &config.destination {
            EvidenceSinkDestination::Stdout => Box::new(io::stdout()),
            EvidenceSinkDestination::File(path) => {
                Box::new(OpenOptions::new().create(true).append(true).open(path)?)
            }
        };

        Ok(Some(Self::from_writer(writer, config.flush_on_write)))
    }

    #[must_use]
    pub fn from_writer(writer: Box<dyn Write + Send>, flush_on_write: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(SinkState {
                writer: BufWriter::new(writer),
                flush_on_write,
            })),
        }
    }

    /// Append one already-encoded JSON object as a line.
    pub fn write_jsonl(&self, line: &str) -> io::Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| io::Error::other("evidence sink lock poisoned"))?;
        state.writer.write_all(line.as_bytes())?;
        state.writer.write_all(b"\n")?;
        if state.flush_on_write {
            state.writer.flush()?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct EvidenceLine<'a> {
    seq: u64,
    origin: NodeId,
    field: &'a FieldName,
    value: &'a Value,
}

/// Root listener writing one JSONL line per broadcast.
#[derive(Debug)]
pub struct EvidenceListener {
    sink: EvidenceSink,
    seq: Cell<u64>,
}

impl EvidenceListener {
    #[must_use]
    pub fn new(sink: EvidenceSink) -> Self {
        Self {
            sink,
            seq: Cell::new(0),
        }
    }

    /// Lines written so far.
    #[must_use]
    pub fn written(&self) -> u64 {
        self.seq.get()
    }
}

impl BroadcastListener for EvidenceListener {
    fn on_broadcast(&self, _tree: &mut StateTree, event: &BroadcastEvent) -> CallbackResult {
        let line = serde_json::to_string(&EvidenceLine {
            seq: self.seq.get(),
            origin: event.origin,
            field: &event.field,
            value: &event.value,
        })?;
        self.sink.write_jsonl(&line)?;
        self.seq.set(self.seq.get() + 1);
        Ok(())
    }
}
