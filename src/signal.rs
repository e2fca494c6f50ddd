//! Signal endpoints: live views onto the configuration document.
//!
//! A [`BoundSignal`] is a two-way-synchronized view onto one scalar entry of
//! the shared configuration document: `get` reads through to the document,
//! `set` writes the document in place before returning. A [`LocalSignal`]
//! holds its own value and backs the computed/bookkeeping fields of
//! triggerable elements (statistics, image reference, duration).

use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::document::{EntryAddress, SimDocument};
use crate::error::{BridgeError, BridgeResult};
use crate::naming;

/// Presentation kind of a signal.
///
/// Hinted signals are the ones orchestration tooling selects by default for
/// live tables and plots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Normal,
    Hinted,
}

/// Per-signal metadata returned by `describe()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalDescription {
    /// Where the value comes from (document address or local storage).
    pub source: String,

    /// Presentation kind.
    pub kind: SignalKind,

    /// External-storage marker: when set, the signal's value is a reference
    /// to be resolved through a resource/datum pair, not inline data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external: Option<String>,
}

/// A live, two-way-synchronized view onto one configuration key.
///
/// The signal stores the element-side attribute name; the document-side key
/// is derived once at construction via the reserved-name translation table
/// and never re-derived. No value validation happens here; out-of-range
/// physics values are a simulation-service concern.
#[derive(Debug)]
pub struct BoundSignal {
    name: String,
    document: SimDocument,
    address: EntryAddress,
    config_key: String,
}

impl BoundSignal {
    /// Creates a signal presenting `name` on the element and operating on
    /// the translated configuration key of `address`.
    #[must_use]
    pub fn new(name: impl Into<String>, document: SimDocument, address: EntryAddress) -> Self {
        let name = name.into();
        let config_key = naming::config_key_for(&name).to_string();
        Self {
            name,
            document,
            address,
            config_key,
        }
    }

    /// Element-side attribute name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reads the current document value.
    ///
    /// Always reads through the shared document, so mutations made behind
    /// the element's back are reflected immediately.
    pub fn get(&self) -> BridgeResult<Value> {
        self.document.entry_value(&self.address, &self.config_key)
    }

    /// Writes `value` into the bound configuration key.
    ///
    /// The document write happens before the completion marker (the `Ok`
    /// return) is produced.
    pub fn set(&self, value: Value) -> BridgeResult<()> {
        debug!(signal = %self.name, value = %value, "setting bound signal");
        self.document
            .set_entry_value(&self.address, &self.config_key, value)
    }

    /// `set` that blocks until the completion marker resolves.
    ///
    /// The write is synchronous, so this is observably identical to `set`.
    pub fn put(&self, value: Value) -> BridgeResult<()> {
        self.set(value)
    }

    /// Description of where this signal's value lives.
    #[must_use]
    pub fn source(&self) -> String {
        format!("document://{}/{}", self.address, self.config_key)
    }
}

/// A value-holding signal with no document binding.
#[derive(Debug)]
pub struct LocalSignal {
    name: String,
    value: RwLock<Value>,
}

impl LocalSignal {
    /// Creates a local signal with an initial value.
    #[must_use]
    pub fn new(name: impl Into<String>, initial: Value) -> Self {
        Self {
            name: name.into(),
            value: RwLock::new(initial),
        }
    }

    /// Attribute name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reads the current value.
    pub fn get(&self) -> BridgeResult<Value> {
        Ok(self
            .value
            .read()
            .map_err(|_| BridgeError::internal("signal value lock poisoned"))?
            .clone())
    }

    /// Replaces the current value.
    pub fn set(&self, value: Value) -> BridgeResult<()> {
        debug!(signal = %self.name, value = %value, "setting local signal");
        *self
            .value
            .write()
            .map_err(|_| BridgeError::internal("signal value lock poisoned"))? = value;
        Ok(())
    }

    /// Alias of `set` (synchronous write).
    pub fn put(&self, value: Value) -> BridgeResult<()> {
        self.set(value)
    }

    /// Description of where this signal's value lives.
    #[must_use]
    pub fn source(&self) -> String {
        format!("local://{}", self.name)
    }
}

/// Either flavor of signal, unified for element field storage.
#[derive(Debug)]
pub enum ElementSignal {
    /// Live view onto the configuration document.
    Bound(BoundSignal),
    /// Locally stored value.
    Local(LocalSignal),
}

impl ElementSignal {
    /// Attribute name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Bound(s) => s.name(),
            Self::Local(s) => s.name(),
        }
    }

    /// Reads the current value.
    pub fn get(&self) -> BridgeResult<Value> {
        match self {
            Self::Bound(s) => s.get(),
            Self::Local(s) => s.get(),
        }
    }

    /// Writes a value.
    pub fn set(&self, value: Value) -> BridgeResult<()> {
        match self {
            Self::Bound(s) => s.set(value),
            Self::Local(s) => s.set(value),
        }
    }

    /// `set` that blocks until the completion marker resolves.
    pub fn put(&self, value: Value) -> BridgeResult<()> {
        match self {
            Self::Bound(s) => s.put(value),
            Self::Local(s) => s.put(value),
        }
    }

    /// Description of where this signal's value lives.
    #[must_use]
    pub fn source(&self) -> String {
        match self {
            Self::Bound(s) => s.source(),
            Self::Local(s) => s.source(),
        }
    }
}
