//! Scripted in-memory connection.
//!
//! A reference implementation of [`SimConnection`] for tests and embedded
//! use: runs are instantaneous, output files are scripted ahead of time,
//! and the derived-geometry computation is the analytic small-angle form
//! (`nvy = cos(angle/1000)`, `nvz = -sin(angle/1000)`,
//! `tvy = sin(angle/1000)` for an angle in milliradians).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::{Map, Value};

use crate::connection::SimConnection;
use crate::document::{SimDocument, SimKind, ACTIVE_REPORT_KEY};
use crate::error::{ComputationError, ConnectionError};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scripted simulation connection.
pub struct MockConnection {
    document: SimDocument,
    sim_type: SimKind,
    datafiles: Mutex<VecDeque<Vec<u8>>>,
    run_duration: Mutex<Duration>,
    runs: AtomicU64,
    last_report: Mutex<Option<String>>,
    fail_simulation: AtomicBool,
    fail_grazing: AtomicBool,
}

impl MockConnection {
    /// Creates a connection owning a fresh document built from `data`.
    #[must_use]
    pub fn new(sim_type: SimKind, data: Value) -> Self {
        Self {
            document: SimDocument::new(data),
            sim_type,
            datafiles: Mutex::new(VecDeque::new()),
            run_duration: Mutex::new(Duration::from_millis(10)),
            runs: AtomicU64::new(0),
            last_report: Mutex::new(None),
            fail_simulation: AtomicBool::new(false),
            fail_grazing: AtomicBool::new(false),
        }
    }

    /// Scripts the next output file.
    ///
    /// Files are consumed in order by [`SimConnection::get_datafile`]; the
    /// final file is reused once the script runs out.
    pub fn push_datafile(&self, bytes: Vec<u8>) {
        lock(&self.datafiles).push_back(bytes);
    }

    /// Sets the duration every run reports.
    pub fn set_run_duration(&self, duration: Duration) {
        *lock(&self.run_duration) = duration;
    }

    /// Makes subsequent runs fail.
    pub fn fail_simulation(&self, fail: bool) {
        self.fail_simulation.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent geometry computations fail.
    pub fn fail_grazing(&self, fail: bool) {
        self.fail_grazing.store(fail, Ordering::SeqCst);
    }

    /// Number of runs executed so far.
    #[must_use]
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::SeqCst)
    }

    /// The document's active-report selector captured at the last run.
    #[must_use]
    pub fn last_report(&self) -> Option<String> {
        lock(&self.last_report).clone()
    }
}

impl SimConnection for MockConnection {
    fn document(&self) -> SimDocument {
        self.document.clone()
    }

    fn sim_type(&self) -> SimKind {
        self.sim_type
    }

    fn run_simulation(&self) -> Result<Duration, ConnectionError> {
        if self.fail_simulation.load(Ordering::SeqCst) {
            return Err(ConnectionError::SimulationFailed {
                message: "scripted failure".to_string(),
            });
        }
        self.runs.fetch_add(1, Ordering::SeqCst);
        let report = self
            .document
            .snapshot()
            .ok()
            .and_then(|doc| doc.get(ACTIVE_REPORT_KEY).and_then(Value::as_str).map(str::to_string));
        *lock(&self.last_report) = report;
        Ok(*lock(&self.run_duration))
    }

    fn get_datafile(&self, file_index: i64) -> Result<Vec<u8>, ConnectionError> {
        let mut files = lock(&self.datafiles);
        if files.len() > 1 {
            return files.pop_front().ok_or(ConnectionError::DatafileUnavailable {
                file_index,
                message: "no scripted data files".to_string(),
            });
        }
        files
            .front()
            .cloned()
            .ok_or(ConnectionError::DatafileUnavailable {
                file_index,
                message: "no scripted data files".to_string(),
            })
    }

    fn compute_grazing_orientation(
        &self,
        entry: &Map<String, Value>,
    ) -> Result<Map<String, Value>, ComputationError> {
        if self.fail_grazing.load(Ordering::SeqCst) {
            return Err(ComputationError::Failed {
                message: "scripted failure".to_string(),
            });
        }
        let angle_mrad = entry
            .get("grazingAngle")
            .and_then(Value::as_f64)
            .ok_or_else(|| ComputationError::MissingKey {
                key: "grazingAngle".to_string(),
            })?;

        let angle = angle_mrad / 1000.0;
        let mut out = Map::new();
        out.insert("normalVectorX".to_string(), Value::from(0.0));
        out.insert("normalVectorY".to_string(), Value::from(angle.cos()));
        out.insert("normalVectorZ".to_string(), Value::from(-angle.sin()));
        out.insert("tangentialVectorX".to_string(), Value::from(0.0));
        out.insert("tangentialVectorY".to_string(), Value::from(angle.sin()));
        out.insert("state".to_string(), Value::from("completed"));
        Ok(out)
    }
}

impl std::fmt::Debug for MockConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockConnection")
            .field("sim_type", &self.sim_type)
            .field("runs", &self.runs())
            .finish_non_exhaustive()
    }
}
