//! Watchpoint trigger/asset pipeline.
//!
//! A watchpoint element runs a simulation step scoped to its own report,
//! persists and decodes the produced output file, computes beam statistics,
//! and registers the result as an externally stored asset (one resource
//! record plus one datum record per trigger). Records wait in the element's
//! FIFO cache until the orchestration engine collects them.

use std::path::PathBuf;

use chrono::Utc;
use ndarray::s;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::assets::{compose_resource, AssetCache, AssetDoc, DatumFactory, ResourceDocument};
use crate::decode::{DecodeParams, DecoderRegistry};
use crate::document::SimKind;
use crate::element::{ElementBehavior, ElementObject, FieldRole};
use crate::error::{BridgeResult, ConfigurationError, DecodeError};
use crate::signal::SignalKind;
use crate::stats;

/// Default root directory for persisted output files.
pub const DEFAULT_ROOT_DIR: &str = "/tmp/beamsig-data";

/// Scale from decoder extent units to the statistics-field coordinate units.
const EXTENT_SCALE: f64 = 1e4;

/// Per-instance state of the trigger/asset pipeline.
#[derive(Debug)]
pub struct WatchpointState {
    pub(crate) root_dir: PathBuf,
    pub(crate) decoders: DecoderRegistry,
    pub(crate) asset_cache: AssetCache,
    staged: Option<(ResourceDocument, DatumFactory)>,
}

impl WatchpointState {
    /// Creates pipeline state writing under `root_dir` and decoding through
    /// `decoders`.
    #[must_use]
    pub fn new(root_dir: PathBuf, decoders: DecoderRegistry) -> Self {
        Self {
            root_dir,
            decoders,
            asset_cache: AssetCache::new(),
            staged: None,
        }
    }

    /// Drops any staged resource record that has not produced a datum yet.
    pub(crate) fn clear_staged(&mut self) {
        self.staged = None;
    }
}

/// Installs the local signals every watchpoint carries beyond its bound
/// fields. A configuration key with the same name added afterwards replaces
/// the corresponding signal.
pub(crate) fn install_watchpoint_signals(element: &mut ElementObject) {
    for attr in ["cx", "cy", "sx", "sy", "density"] {
        element.add_local_field(attr, Value::Null, SignalKind::Hinted, FieldRole::Value);
    }
    element.add_local_field("image", Value::Null, SignalKind::Normal, FieldRole::Image);
    element.add_local_field("shape", Value::Null, SignalKind::Normal, FieldRole::Value);
    element.add_local_field("mean", Value::Null, SignalKind::Hinted, FieldRole::Value);
    element.add_local_field("photon_energy", Value::Null, SignalKind::Normal, FieldRole::Value);
    element.add_local_field("horizontal_extent", Value::Null, SignalKind::Normal, FieldRole::Value);
    element.add_local_field("vertical_extent", Value::Null, SignalKind::Normal, FieldRole::Value);
    install_bookkeeping_signals(element);
}

/// Installs the run-bookkeeping signals (duration, canonical document
/// string and hash) shared by every triggerable element.
pub(crate) fn install_bookkeeping_signals(element: &mut ElementObject) {
    element.add_local_field("duration", Value::from(-1.0), SignalKind::Normal, FieldRole::Value);
    element.add_local_field("sim_data_json", Value::from(""), SignalKind::Normal, FieldRole::Value);
    element.add_local_field("sim_data_hash", Value::from(""), SignalKind::Normal, FieldRole::Value);
}

impl ElementObject {
    /// Runs one simulation step scoped to this element and registers its
    /// output as an external asset.
    ///
    /// On success exactly one resource record and one datum record are
    /// appended to the asset cache, in that order, and the `image` field
    /// holds the datum identifier. On failure nothing is appended and any
    /// staged resource is dropped. Must not be called concurrently with
    /// itself or `collect_asset_docs` on the same instance; the execution
    /// model is cooperative and single-threaded.
    #[instrument(skip_all, fields(element = %self.name()))]
    pub fn trigger(&mut self) -> BridgeResult<()> {
        if !self.supports_trigger() {
            return Err(ConfigurationError::TriggerNotSupported {
                element: self.name().to_string(),
            }
            .into());
        }
        let outcome = self.trigger_inner();
        if outcome.is_err() {
            if let ElementBehavior::Watchpoint(state) = self.behavior_mut() {
                state.clear_staged();
            }
        }
        outcome
    }

    fn trigger_inner(&mut self) -> BridgeResult<()> {
        let sim_kind = self.connection().sim_type();
        let (root_dir, decoders) = match self.behavior() {
            ElementBehavior::Watchpoint(state) => {
                (state.root_dir.clone(), state.decoders.clone())
            }
            ElementBehavior::Plain => unreachable!("checked by trigger"),
        };

        // Fresh date-partitioned output path; the uuid filename keeps
        // same-second triggers from colliding.
        let assets_dir = Utc::now().format("%Y/%m/%d").to_string();
        let result_file = format!("{}.dat", Uuid::new_v4());
        let resource_path = format!("{assets_dir}/{result_file}");

        let (resource, factory) =
            compose_resource(sim_kind.as_str(), root_dir, resource_path, Map::new());
        let output_path = resource.file_path();
        debug!(path = %output_path.display(), "staging resource");
        if let ElementBehavior::Watchpoint(state) = self.behavior_mut() {
            state.staged = Some((resource, factory));
        }

        let report = self.watchpoint_report_name()?;
        self.document().set_active_report(&report)?;

        let duration = self.connection().run_simulation()?;
        self.signal("duration")?
            .put(Value::from(duration.as_secs_f64()))?;

        let datafile = self.connection().get_datafile(-1)?;
        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&output_path, &datafile)?;

        let params = self.decode_params(sim_kind, &report)?;
        let decoder = decoders.decoder_for(sim_kind)?;
        let decoded = decoder.decode(&output_path, &params)?;

        // Statistics run over the row-reversed array in scaled coordinates.
        let image = decoded.data.slice(s![..;-1, ..]).to_owned();
        let h_extent = (
            decoded.horizontal_extent.0 * EXTENT_SCALE,
            decoded.horizontal_extent.1 * EXTENT_SCALE,
        );
        let v_extent = (
            decoded.vertical_extent.0 * EXTENT_SCALE,
            decoded.vertical_extent.1 * EXTENT_SCALE,
        );
        let beam = stats::quantile_stats(&image, (h_extent, v_extent), stats::DEFAULT_BEAM_QUANTILE);

        self.signal("cx")?.put(Value::from(beam.cx))?;
        self.signal("cy")?.put(Value::from(beam.cy))?;
        self.signal("sx")?.put(Value::from(beam.sx))?;
        self.signal("sy")?.put(Value::from(beam.sy))?;
        self.signal("density")?
            .put(Value::from(beam.total / (beam.sx * beam.sy)))?;

        let shape: Vec<u64> = decoded.shape.iter().map(|&v| v as u64).collect();
        self.signal("shape")?.put(Value::from(shape))?;
        self.signal("mean")?.put(Value::from(decoded.mean))?;
        self.signal("photon_energy")?
            .put(Value::from(decoded.photon_energy))?;
        self.signal("horizontal_extent")?.put(Value::from(vec![
            decoded.horizontal_extent.0,
            decoded.horizontal_extent.1,
        ]))?;
        self.signal("vertical_extent")?.put(Value::from(vec![
            decoded.vertical_extent.0,
            decoded.vertical_extent.1,
        ]))?;

        // Emit resource then datum together; the staged slot is cleared so
        // a later trigger cannot re-register this resource.
        let datum_id = {
            let state = match self.behavior_mut() {
                ElementBehavior::Watchpoint(state) => state,
                ElementBehavior::Plain => unreachable!("checked by trigger"),
            };
            let Some((mut resource, mut factory)) = state.staged.take() else {
                return Err(crate::error::BridgeError::internal(
                    "staged resource disappeared mid-trigger",
                ));
            };
            resource.resource_kwargs = params.resource_kwargs();
            let datum = factory.datum(Map::new());
            let datum_id = datum.datum_id.clone();
            state.asset_cache.push(AssetDoc::Resource(resource));
            state.asset_cache.push(AssetDoc::Datum(datum));
            datum_id
        };
        self.signal("image")?.put(Value::from(datum_id))?;

        let json = self.document().canonical_json()?;
        let hash = self.document().content_hash()?;
        self.signal("sim_data_json")?.put(Value::from(json))?;
        self.signal("sim_data_hash")?.put(Value::from(hash))?;

        info!(
            element = %self.name(),
            report = %report,
            duration_s = duration.as_secs_f64(),
            "trigger complete"
        );
        Ok(())
    }

    /// Report identifier of this watchpoint, derived from the entry's
    /// configuration-assigned id.
    fn watchpoint_report_name(&self) -> BridgeResult<String> {
        let id = self.document().entry_value(self.address(), "id")?;
        let id = match id {
            Value::String(s) => s,
            other => other.to_string(),
        };
        Ok(format!("watchpointReport{id}"))
    }

    fn decode_params(&self, kind: SimKind, report: &str) -> BridgeResult<DecodeParams> {
        match kind {
            // Watchpoint reports are always 2D for srw.
            SimKind::Srw => Ok(DecodeParams::Dimensions { ndim: 2 }),
            SimKind::Shadow => {
                let bins = self
                    .document()
                    .report_parameter(report, "histogramBins")?
                    .as_u64()
                    .ok_or_else(|| ConfigurationError::MissingEntryField {
                        entry: report.to_string(),
                        field: "histogramBins".to_string(),
                    })?;
                Ok(DecodeParams::Histogram { bins })
            }
            SimKind::Madx => Err(DecodeError::UnsupportedSimulationType {
                sim_type: kind.to_string(),
            }
            .into()),
        }
    }

    /// Number of asset records pending collection.
    #[must_use]
    pub fn pending_assets(&self) -> usize {
        match self.behavior() {
            ElementBehavior::Watchpoint(state) => state.asset_cache.len(),
            ElementBehavior::Plain => 0,
        }
    }

    /// Drains the pending asset records in FIFO order, exactly once.
    ///
    /// Safe on an empty cache; plain elements produce nothing. Must not run
    /// concurrently with `trigger` on the same instance.
    pub fn collect_asset_docs(&mut self) -> Vec<AssetDoc> {
        match self.behavior_mut() {
            ElementBehavior::Watchpoint(state) => state.asset_cache.drain(),
            ElementBehavior::Plain => Vec::new(),
        }
    }
}
