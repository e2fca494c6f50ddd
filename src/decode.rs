//! Report-decoding seam.
//!
//! The binary output formats of the simulation backends are decoded by
//! external collaborators; this module defines the contract they implement
//! and the registry watchpoints dispatch through. [`JsonReportDecoder`] is
//! an in-crate reference implementation over a JSON-serialized report,
//! used by the test suites.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use ndarray::Array2;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::document::SimKind;
use crate::error::DecodeError;

/// A decoded simulation report.
#[derive(Debug, Clone)]
pub struct DecodedReport {
    /// 2D intensity array.
    pub data: Array2<f64>,

    /// Physical horizontal extent `(low, high)`.
    pub horizontal_extent: (f64, f64),

    /// Physical vertical extent `(low, high)`.
    pub vertical_extent: (f64, f64),

    /// Array shape descriptor.
    pub shape: Vec<usize>,

    /// Mean intensity of the array.
    pub mean: f64,

    /// Photon energy the report was computed at.
    pub photon_energy: f64,
}

/// Decode-time parameters, chosen by simulation kind.
///
/// Recorded verbatim in the resource record's kwargs so a downstream
/// reader can reconstruct the array without re-deriving them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeParams {
    /// Fixed report dimensionality (srw watchpoint reports).
    Dimensions {
        ndim: u64,
    },

    /// Histogram bin count from the active report's model (shadow).
    Histogram {
        bins: u64,
    },
}

impl DecodeParams {
    /// The kwargs mapping stored on the resource record.
    #[must_use]
    pub fn resource_kwargs(&self) -> Map<String, Value> {
        let mut kwargs = Map::new();
        match self {
            Self::Dimensions { ndim } => {
                kwargs.insert("ndim".to_string(), Value::from(*ndim));
            }
            Self::Histogram { bins } => {
                kwargs.insert("histogram_bins".to_string(), Value::from(*bins));
            }
        }
        kwargs
    }
}

/// Format-specific decoder for one simulation backend's output files.
pub trait ReportDecoder: Send + Sync + std::fmt::Debug {
    /// Decodes the file at `path` into a structured report.
    fn decode(&self, path: &Path, params: &DecodeParams) -> Result<DecodedReport, DecodeError>;
}

/// Maps simulation kinds to their registered decoders.
#[derive(Clone, Default)]
pub struct DecoderRegistry {
    decoders: HashMap<SimKind, Arc<dyn ReportDecoder>>,
}

impl DecoderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the decoder for a simulation kind.
    pub fn register(&mut self, kind: SimKind, decoder: Arc<dyn ReportDecoder>) {
        self.decoders.insert(kind, decoder);
    }

    /// The decoder for a simulation kind.
    pub fn decoder_for(&self, kind: SimKind) -> Result<Arc<dyn ReportDecoder>, DecodeError> {
        self.decoders
            .get(&kind)
            .cloned()
            .ok_or_else(|| DecodeError::UnsupportedSimulationType {
                sim_type: kind.to_string(),
            })
    }
}

impl std::fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderRegistry")
            .field("kinds", &self.decoders.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Deserialize)]
struct RawJsonReport {
    data: Vec<Vec<f64>>,
    horizontal_extent: (f64, f64),
    vertical_extent: (f64, f64),
    #[serde(default)]
    mean: Option<f64>,
    #[serde(default)]
    photon_energy: Option<f64>,
}

/// Reference decoder for JSON-serialized reports.
///
/// Payload shape: `{"data": [[...], ...], "horizontal_extent": [lo, hi],
/// "vertical_extent": [lo, hi], "mean": m?, "photon_energy": e?}`. The
/// mean defaults to the array mean when absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReportDecoder;

impl ReportDecoder for JsonReportDecoder {
    fn decode(&self, path: &Path, _params: &DecodeParams) -> Result<DecodedReport, DecodeError> {
        let bytes = std::fs::read(path)?;
        let raw: RawJsonReport =
            serde_json::from_slice(&bytes).map_err(|e| DecodeError::MalformedReport {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        let nx = raw.data.len();
        let ny = raw.data.first().map_or(0, Vec::len);
        if nx == 0 || ny == 0 || raw.data.iter().any(|row| row.len() != ny) {
            return Err(DecodeError::MalformedReport {
                path: path.display().to_string(),
                message: "intensity array is empty or ragged".to_string(),
            });
        }

        let flat: Vec<f64> = raw.data.into_iter().flatten().collect();
        let data = Array2::from_shape_vec((nx, ny), flat).map_err(|e| {
            DecodeError::MalformedReport {
                path: path.display().to_string(),
                message: e.to_string(),
            }
        })?;

        let mean = raw.mean.unwrap_or_else(|| data.sum() / (nx * ny) as f64);
        Ok(DecodedReport {
            shape: vec![nx, ny],
            mean,
            photon_energy: raw.photon_energy.unwrap_or(0.0),
            horizontal_extent: raw.horizontal_extent,
            vertical_extent: raw.vertical_extent,
            data,
        })
    }
}
