//! Whole-simulation statistics report element.
//!
//! A simpler sibling of the watchpoint: its trigger runs the fixed
//! whole-simulation statistics report and stores the decoded payload
//! verbatim (re-serialized to canonical JSON) in the `report` field. No
//! asset records are produced; the payload is small enough to live inline.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};
use tracing::{info, instrument};

use crate::connection::SimConnection;
use crate::error::{BridgeError, BridgeResult, DecodeError};
use crate::signal::{LocalSignal, SignalDescription, SignalKind};

/// Report identifier of the whole-simulation statistics report.
pub const BEAM_STATISTICS_REPORT: &str = "beamStatisticsReport";

/// Element producing the whole-simulation statistics report.
pub struct BeamStatisticsReport {
    name: String,
    connection: Arc<dyn SimConnection>,
    report: LocalSignal,
    duration: LocalSignal,
    sim_data_json: LocalSignal,
    sim_data_hash: LocalSignal,
}

impl BeamStatisticsReport {
    /// Creates a report element over the given connection.
    #[must_use]
    pub fn new(name: impl Into<String>, connection: Arc<dyn SimConnection>) -> Self {
        Self {
            name: name.into(),
            connection,
            report: LocalSignal::new("report", json!({})),
            duration: LocalSignal::new("duration", Value::from(-1.0)),
            sim_data_json: LocalSignal::new("sim_data_json", Value::from("")),
            sim_data_hash: LocalSignal::new("sim_data_hash", Value::from("")),
        }
    }

    /// Element name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reads one field's current value.
    pub fn get(&self, attr: &str) -> BridgeResult<Value> {
        self.signal(attr)?.get()
    }

    fn signal(&self, attr: &str) -> BridgeResult<&LocalSignal> {
        match attr {
            "report" => Ok(&self.report),
            "duration" => Ok(&self.duration),
            "sim_data_json" => Ok(&self.sim_data_json),
            "sim_data_hash" => Ok(&self.sim_data_hash),
            other => Err(crate::error::ConfigurationError::UnknownField {
                element: self.name.clone(),
                field: other.to_string(),
            }
            .into()),
        }
    }

    /// Runs the whole-simulation statistics report and stores its payload.
    #[instrument(skip_all, fields(element = %self.name))]
    pub fn trigger(&self) -> BridgeResult<()> {
        let document = self.connection.document();
        document.set_active_report(BEAM_STATISTICS_REPORT)?;

        let start = Instant::now();
        self.connection.run_simulation()?;
        self.duration
            .put(Value::from(start.elapsed().as_secs_f64()))?;

        let datafile = self.connection.get_datafile(-1)?;
        let payload: Value =
            serde_json::from_slice(&datafile).map_err(|e| DecodeError::MalformedReport {
                path: BEAM_STATISTICS_REPORT.to_string(),
                message: e.to_string(),
            })?;
        let canonical = serde_json::to_string(&payload)
            .map_err(|e| BridgeError::internal(format!("report serialization failed: {e}")))?;
        self.report.put(Value::from(canonical))?;

        self.sim_data_json
            .put(Value::from(document.canonical_json()?))?;
        self.sim_data_hash
            .put(Value::from(document.content_hash()?))?;

        info!(element = %self.name, report = BEAM_STATISTICS_REPORT, "trigger complete");
        Ok(())
    }

    /// Lifecycle hook: resets the report field to an empty structure.
    pub fn stage(&self) -> BridgeResult<()> {
        self.report.put(json!({}))
    }

    /// Lifecycle hook: resets the report field to an empty structure.
    pub fn unstage(&self) -> BridgeResult<()> {
        self.report.put(json!({}))
    }

    /// Ordered snapshot of every field's current value.
    pub fn read(&self) -> BridgeResult<BTreeMap<String, Value>> {
        let mut out = BTreeMap::new();
        for signal in [
            &self.report,
            &self.duration,
            &self.sim_data_json,
            &self.sim_data_hash,
        ] {
            out.insert(signal.name().to_string(), signal.get()?);
        }
        Ok(out)
    }

    /// Per-field metadata; no field here is externally stored.
    #[must_use]
    pub fn describe(&self) -> BTreeMap<String, SignalDescription> {
        [
            &self.report,
            &self.duration,
            &self.sim_data_json,
            &self.sim_data_hash,
        ]
        .into_iter()
        .map(|signal| {
            (
                signal.name().to_string(),
                SignalDescription {
                    source: signal.source(),
                    kind: SignalKind::Normal,
                    external: None,
                },
            )
        })
        .collect()
    }
}

impl std::fmt::Debug for BeamStatisticsReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeamStatisticsReport")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::mock::MockConnection;
    use crate::document::SimKind;

    fn connection() -> Arc<MockConnection> {
        let conn = Arc::new(MockConnection::new(
            SimKind::Shadow,
            json!({
                "simulationType": "shadow",
                "models": {"beamline": [{"title": "Toroid", "r_maj": 10_000.0}]},
            }),
        ));
        conn.push_datafile(
            serde_json::to_vec(&json!({"sigma_x": 0.1, "sigma_y": 0.02})).unwrap(),
        );
        conn
    }

    #[test]
    fn test_trigger_selects_fixed_report_and_stores_payload() {
        let conn = connection();
        let bsr = BeamStatisticsReport::new("bsr", conn.clone());

        bsr.trigger().unwrap();

        assert_eq!(conn.last_report().as_deref(), Some(BEAM_STATISTICS_REPORT));
        let report = bsr.get("report").unwrap();
        let parsed: Value = serde_json::from_str(report.as_str().unwrap()).unwrap();
        assert_eq!(parsed["sigma_x"], json!(0.1));

        let duration = bsr.get("duration").unwrap().as_f64().unwrap();
        assert!(duration >= 0.0);

        let hash = bsr.get("sim_data_hash").unwrap();
        assert_eq!(hash.as_str().unwrap().len(), 64);
    }

    #[test]
    fn test_stage_and_unstage_reset_report() {
        let conn = connection();
        let bsr = BeamStatisticsReport::new("bsr", conn);

        bsr.trigger().unwrap();
        assert!(bsr.get("report").unwrap().is_string());

        bsr.unstage().unwrap();
        assert_eq!(bsr.get("report").unwrap(), json!({}));

        bsr.stage().unwrap();
        assert_eq!(bsr.get("report").unwrap(), json!({}));
    }

    #[test]
    fn test_describe_has_no_external_fields() {
        let conn = connection();
        let bsr = BeamStatisticsReport::new("bsr", conn);
        let desc = bsr.describe();
        assert!(desc.values().all(|d| d.external.is_none()));
        assert!(desc.contains_key("report"));
    }

    #[test]
    fn test_malformed_payload_is_a_decode_error() {
        let conn = Arc::new(MockConnection::new(
            SimKind::Shadow,
            json!({"simulationType": "shadow", "models": {}}),
        ));
        conn.push_datafile(b"not json".to_vec());
        let bsr = BeamStatisticsReport::new("bsr", conn);
        assert!(bsr.trigger().unwrap_err().is_decode());
    }
}
