//! Shared handle over the simulation configuration document.
//!
//! The configuration document is the simulation's full parameter tree: a
//! nested JSON mapping owned by the simulation-connection collaborator for
//! the process lifetime. Every bound field holds a [`SimDocument`] clone and
//! writes through it, so the connection observes updated values on the next
//! simulation run. The core never deep-copies the document after synthesis.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{BridgeError, BridgeResult, ConfigurationError};

/// Top-level key naming the simulation backend.
pub const SIMULATION_TYPE_KEY: &str = "simulationType";

/// Top-level key holding the named model lists.
pub const MODELS_KEY: &str = "models";

/// Top-level key selecting the report the next simulation run executes.
pub const ACTIVE_REPORT_KEY: &str = "report";

/// Simulation backend kind.
///
/// Selects which top-level model list holds the primary elements and which
/// entry field names an element's class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimKind {
    Srw,
    Shadow,
    Madx,
}

impl SimKind {
    /// The canonical lowercase tag used in the configuration document.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Srw => "srw",
            Self::Shadow => "shadow",
            Self::Madx => "madx",
        }
    }

    /// The model list holding this kind's primary elements.
    #[must_use]
    pub const fn element_location(&self) -> &'static str {
        match self {
            Self::Srw | Self::Shadow => "beamline",
            Self::Madx => "elements",
        }
    }

    /// The entry field naming an element's class.
    ///
    /// For madx this is the translated form of the reserved `name` key.
    #[must_use]
    pub const fn class_name_field(&self) -> &'static str {
        match self {
            Self::Srw | Self::Shadow => "title",
            Self::Madx => "element_name",
        }
    }
}

impl fmt::Display for SimKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SimKind {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "srw" => Ok(Self::Srw),
            "shadow" => Ok(Self::Shadow),
            "madx" => Ok(Self::Madx),
            other => Err(ConfigurationError::UnknownSimulationType {
                found: other.to_string(),
            }),
        }
    }
}

/// Address of one model entry within the configuration document.
///
/// `index` is `Some` for list-shaped models (one entry per list item) and
/// `None` for mapping-shaped models, where the model value itself is the
/// single entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryAddress {
    /// Name of the model list under `models`.
    pub model_field: String,

    /// Position within a list-shaped model.
    pub index: Option<usize>,
}

impl EntryAddress {
    /// Addresses an item of a list-shaped model.
    #[must_use]
    pub fn list(model_field: impl Into<String>, index: usize) -> Self {
        Self {
            model_field: model_field.into(),
            index: Some(index),
        }
    }

    /// Addresses a mapping-shaped model as a single entry.
    #[must_use]
    pub fn mapping(model_field: impl Into<String>) -> Self {
        Self {
            model_field: model_field.into(),
            index: None,
        }
    }
}

impl fmt::Display for EntryAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(i) => write!(f, "{}[{i}]", self.model_field),
            None => write!(f, "{}", self.model_field),
        }
    }
}

/// Shape of a named model within the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelShape {
    /// A list of entry mappings; carries the list length.
    List(usize),
    /// A single entry mapping.
    Mapping,
}

/// Cheaply cloneable shared handle over the configuration document.
///
/// All reads and writes go through the same underlying JSON value; a bound
/// field never keeps a private copy. The lock exists so the handle can cross
/// the `Send + Sync` collaborator seams; the execution model itself is
/// single-threaded (see the crate docs).
#[derive(Clone)]
pub struct SimDocument {
    inner: Arc<RwLock<Value>>,
}

impl SimDocument {
    /// Wraps a configuration tree in a shared handle.
    #[must_use]
    pub fn new(data: Value) -> Self {
        Self {
            inner: Arc::new(RwLock::new(data)),
        }
    }

    fn lock_err() -> BridgeError {
        BridgeError::internal("configuration document lock poisoned")
    }

    fn read(&self) -> BridgeResult<std::sync::RwLockReadGuard<'_, Value>> {
        self.inner.read().map_err(|_| Self::lock_err())
    }

    fn write(&self) -> BridgeResult<std::sync::RwLockWriteGuard<'_, Value>> {
        self.inner.write().map_err(|_| Self::lock_err())
    }

    /// Parses the document's simulation-kind tag.
    pub fn sim_kind(&self) -> BridgeResult<SimKind> {
        let doc = self.read()?;
        let tag = doc
            .get(SIMULATION_TYPE_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| ConfigurationError::UnknownSimulationType {
                found: "(missing)".to_string(),
            })?;
        Ok(SimKind::from_str(tag)?)
    }

    /// Returns a deep copy of the current document.
    ///
    /// Used for read-only iteration during synthesis; live bindings always
    /// go through the handle instead.
    pub fn snapshot(&self) -> BridgeResult<Value> {
        Ok(self.read()?.clone())
    }

    /// Serializes the full document to its canonical string form.
    pub fn canonical_json(&self) -> BridgeResult<String> {
        let doc = self.read()?;
        serde_json::to_string(&*doc)
            .map_err(|e| BridgeError::internal(format!("document serialization failed: {e}")))
    }

    /// Content hash of the canonical string form, as lowercase hex.
    ///
    /// Stable across process runs for equal documents; used for
    /// change-detection across steps of a multi-step scan.
    pub fn content_hash(&self) -> BridgeResult<String> {
        let json = self.canonical_json()?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }

    /// Sets the active-report selector.
    pub fn set_active_report(&self, report: &str) -> BridgeResult<()> {
        let mut doc = self.write()?;
        match doc.as_object_mut() {
            Some(map) => {
                map.insert(ACTIVE_REPORT_KEY.to_string(), Value::String(report.to_string()));
                Ok(())
            }
            None => Err(BridgeError::internal("configuration document root is not a mapping")),
        }
    }

    /// Reads the active-report selector, if set.
    pub fn active_report(&self) -> BridgeResult<Option<String>> {
        let doc = self.read()?;
        Ok(doc
            .get(ACTIVE_REPORT_KEY)
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    /// Shape of a named model.
    pub fn model_shape(&self, model_field: &str) -> BridgeResult<ModelShape> {
        let doc = self.read()?;
        match Self::model_in(&doc, model_field)? {
            Value::Array(items) => Ok(ModelShape::List(items.len())),
            Value::Object(_) => Ok(ModelShape::Mapping),
            _ => Err(ConfigurationError::MissingModel {
                model: model_field.to_string(),
            }
            .into()),
        }
    }

    /// Returns a clone of one entry's full mapping.
    pub fn entry_map(&self, address: &EntryAddress) -> BridgeResult<Map<String, Value>> {
        let doc = self.read()?;
        Ok(Self::entry_in(&doc, address)?.clone())
    }

    /// Reads one scalar value of an entry.
    pub fn entry_value(&self, address: &EntryAddress, key: &str) -> BridgeResult<Value> {
        let doc = self.read()?;
        let entry = Self::entry_in(&doc, address)?;
        entry
            .get(key)
            .cloned()
            .ok_or_else(|| {
                ConfigurationError::MissingEntryField {
                    entry: address.to_string(),
                    field: key.to_string(),
                }
                .into()
            })
    }

    /// Writes one scalar value of an entry, in place.
    ///
    /// Inserts the key if the entry does not have it yet; the document
    /// accepts whatever is written (value validation belongs to the
    /// simulation service).
    pub fn set_entry_value(
        &self,
        address: &EntryAddress,
        key: &str,
        value: Value,
    ) -> BridgeResult<()> {
        let mut doc = self.write()?;
        let entry = Self::entry_in_mut(&mut doc, address)?;
        entry.insert(key.to_string(), value);
        Ok(())
    }

    /// Reads a parameter of a named report model (`models[report][key]`).
    pub fn report_parameter(&self, report: &str, key: &str) -> BridgeResult<Value> {
        let address = EntryAddress::mapping(report);
        self.entry_value(&address, key)
    }

    fn model_in<'a>(doc: &'a Value, model_field: &str) -> BridgeResult<&'a Value> {
        let models = doc
            .get(MODELS_KEY)
            .ok_or(ConfigurationError::MissingModels)?;
        models.get(model_field).ok_or_else(|| {
            ConfigurationError::MissingModel {
                model: model_field.to_string(),
            }
            .into()
        })
    }

    fn entry_in<'a>(
        doc: &'a Value,
        address: &EntryAddress,
    ) -> BridgeResult<&'a Map<String, Value>> {
        let model = Self::model_in(doc, &address.model_field)?;
        let entry = match address.index {
            Some(i) => model.get(i),
            None => Some(model),
        };
        entry
            .and_then(Value::as_object)
            .ok_or_else(|| {
                ConfigurationError::MissingEntry {
                    entry: address.to_string(),
                }
                .into()
            })
    }

    fn entry_in_mut<'a>(
        doc: &'a mut Value,
        address: &EntryAddress,
    ) -> BridgeResult<&'a mut Map<String, Value>> {
        let models = doc
            .get_mut(MODELS_KEY)
            .ok_or(ConfigurationError::MissingModels)?;
        let model = models.get_mut(&address.model_field).ok_or_else(|| {
            BridgeError::from(ConfigurationError::MissingModel {
                model: address.model_field.clone(),
            })
        })?;
        let entry = match address.index {
            Some(i) => model.get_mut(i),
            None => Some(model),
        };
        entry
            .and_then(Value::as_object_mut)
            .ok_or_else(|| {
                ConfigurationError::MissingEntry {
                    entry: address.to_string(),
                }
                .into()
            })
    }
}

impl fmt::Debug for SimDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimDocument").finish_non_exhaustive()
    }
}
