//! Abstract trait for the simulation-connection collaborator.

use std::time::Duration;

use serde_json::{Map, Value};

use crate::document::{SimDocument, SimKind};
use crate::error::{ComputationError, ConnectionError};

/// Connection to the remote simulation service.
///
/// The connection owns the configuration document; the bridge borrows a
/// shared handle to wire bound fields into it. No retry policy exists at
/// the bridge layer; transient-failure handling belongs to
/// implementations of this trait.
pub trait SimConnection: Send + Sync {
    /// Shared handle over the connection's configuration document.
    fn document(&self) -> SimDocument;

    /// The simulation backend this connection talks to.
    fn sim_type(&self) -> SimKind;

    /// Runs the report currently selected in the document.
    ///
    /// Returns the wall-clock duration of the run.
    fn run_simulation(&self) -> Result<Duration, ConnectionError>;

    /// Fetches an output file produced by the last run.
    ///
    /// `file_index` selects among the run's files; `-1` is the most recent.
    fn get_datafile(&self, file_index: i64) -> Result<Vec<u8>, ConnectionError>;

    /// Computes derived mirror geometry for the given entry mapping.
    ///
    /// The response carries the five orientation-vector components plus a
    /// transient `state` key the caller discards.
    fn compute_grazing_orientation(
        &self,
        entry: &Map<String, Value>,
    ) -> Result<Map<String, Value>, ComputationError>;
}
