//! Synthesized element objects.
//!
//! An [`ElementObject`] is a typed bundle of signals representing one
//! configuration-tree entry (an optical component, an accelerator element,
//! a named variable or report). Its bound fields are live views onto the
//! entry's keys; watchpoint-capable elements additionally carry the local
//! statistics/bookkeeping signals and the trigger pipeline.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::connection::SimConnection;
use crate::document::{EntryAddress, SimDocument};
use crate::error::{BridgeResult, ComputationError, ConfigurationError};
use crate::signal::{BoundSignal, ElementSignal, LocalSignal, SignalDescription, SignalKind};
use crate::watchpoint::WatchpointState;

/// External-storage marker value for image references.
pub const EXTERNAL_FILESTORE: &str = "FILESTORE";

/// Transient key the derived-geometry computation adds to its response.
const GRAZING_STATE_KEY: &str = "state";

/// Sibling fields updated by a grazing-angle write, in update order.
pub const GRAZING_VECTOR_KEYS: [&str; 5] = [
    "normalVectorX",
    "normalVectorY",
    "normalVectorZ",
    "tangentialVectorX",
    "tangentialVectorY",
];

/// Role a field plays on its element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    /// Plain scalar value.
    Value,

    /// Grazing-angle parameter: a write additionally runs the remote
    /// derived-geometry computation and updates the vector siblings.
    GrazingAngle,

    /// Externally stored image reference, resolved through a
    /// resource/datum pair.
    Image,
}

#[derive(Debug)]
pub(crate) struct Field {
    pub(crate) signal: ElementSignal,
    pub(crate) kind: SignalKind,
    pub(crate) role: FieldRole,
}

/// Capability set of a synthesized element, chosen per entry at synthesis.
#[derive(Debug)]
pub enum ElementBehavior {
    /// Bound fields only.
    Plain,

    /// Bound fields plus the trigger/asset pipeline.
    Watchpoint(WatchpointState),
}

/// A synthesized bundle of signals over one configuration entry.
pub struct ElementObject {
    name: String,
    class_name: String,
    document: SimDocument,
    address: EntryAddress,
    connection: Arc<dyn SimConnection>,
    fields: Vec<Field>,
    field_index: HashMap<String, usize>,
    behavior: ElementBehavior,
}

impl ElementObject {
    /// Creates an element with no fields yet; the synthesizer populates it.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        class_name: impl Into<String>,
        document: SimDocument,
        address: EntryAddress,
        connection: Arc<dyn SimConnection>,
        behavior: ElementBehavior,
    ) -> Self {
        Self {
            name: name.into(),
            class_name: class_name.into(),
            document,
            address,
            connection,
            fields: Vec::new(),
            field_index: HashMap::new(),
            behavior,
        }
    }

    /// Instance name (snake_case form of the class name).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Canonical class name this element was synthesized under.
    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Address of the bound configuration entry.
    #[must_use]
    pub fn address(&self) -> &EntryAddress {
        &self.address
    }

    /// True when this element carries the trigger/asset pipeline.
    #[must_use]
    pub fn supports_trigger(&self) -> bool {
        matches!(self.behavior, ElementBehavior::Watchpoint(_))
    }

    /// Adds a field bound to one configuration key of this element's entry.
    ///
    /// A field with the same attribute name replaces the existing one in
    /// place (configuration keys shadow capability-provided signals).
    pub fn add_bound_field(&mut self, attr: impl Into<String>, kind: SignalKind, role: FieldRole) {
        let attr = attr.into();
        let signal = ElementSignal::Bound(BoundSignal::new(
            attr.clone(),
            self.document.clone(),
            self.address.clone(),
        ));
        self.insert_field(attr, Field { signal, kind, role });
    }

    /// Adds a value-holding field with no document binding.
    pub fn add_local_field(
        &mut self,
        attr: impl Into<String>,
        initial: Value,
        kind: SignalKind,
        role: FieldRole,
    ) {
        let attr = attr.into();
        let signal = ElementSignal::Local(LocalSignal::new(attr.clone(), initial));
        self.insert_field(attr, Field { signal, kind, role });
    }

    fn insert_field(&mut self, attr: String, field: Field) {
        if let Some(&i) = self.field_index.get(&attr) {
            self.fields[i] = field;
        } else {
            self.field_index.insert(attr, self.fields.len());
            self.fields.push(field);
        }
    }

    /// Attribute names, in field order.
    #[must_use]
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.signal.name()).collect()
    }

    /// True when the element has a field with this attribute name.
    #[must_use]
    pub fn has_field(&self, attr: &str) -> bool {
        self.field_index.contains_key(attr)
    }

    fn field(&self, attr: &str) -> BridgeResult<&Field> {
        self.field_index
            .get(attr)
            .map(|&i| &self.fields[i])
            .ok_or_else(|| {
                ConfigurationError::UnknownField {
                    element: self.name.clone(),
                    field: attr.to_string(),
                }
                .into()
            })
    }

    pub(crate) fn signal(&self, attr: &str) -> BridgeResult<&ElementSignal> {
        Ok(&self.field(attr)?.signal)
    }

    pub(crate) fn connection(&self) -> &Arc<dyn SimConnection> {
        &self.connection
    }

    pub(crate) fn document(&self) -> &SimDocument {
        &self.document
    }

    pub(crate) fn behavior(&self) -> &ElementBehavior {
        &self.behavior
    }

    pub(crate) fn behavior_mut(&mut self) -> &mut ElementBehavior {
        &mut self.behavior
    }

    /// Reads one field's current value.
    pub fn get(&self, attr: &str) -> BridgeResult<Value> {
        self.field(attr)?.signal.get()
    }

    /// Writes one field.
    ///
    /// Grazing-angle fields run the remote derived-geometry computation and
    /// update the five vector siblings synchronously; on any computation
    /// failure the base write is rolled back and no sibling changes
    /// (all-or-nothing).
    pub fn set(&self, attr: &str, value: Value) -> BridgeResult<()> {
        let field = self.field(attr)?;
        match field.role {
            FieldRole::GrazingAngle => self.set_grazing(field, value),
            _ => field.signal.set(value),
        }
    }

    /// `set` that blocks until the completion marker resolves.
    pub fn put(&self, attr: &str, value: Value) -> BridgeResult<()> {
        self.set(attr, value)
    }

    fn set_grazing(&self, field: &Field, value: Value) -> BridgeResult<()> {
        let previous = field.signal.get()?;
        field.signal.set(value)?;

        let rollback = |err: crate::error::BridgeError| -> BridgeResult<()> {
            field.signal.set(previous.clone())?;
            Err(err)
        };

        let entry = match self.document.entry_map(&self.address) {
            Ok(entry) => entry,
            Err(e) => return rollback(e),
        };
        let mut response = match self.connection.compute_grazing_orientation(&entry) {
            Ok(response) => response,
            Err(e) => return rollback(e.into()),
        };
        // The computation echoes a transient status key; only the vector
        // components are distributed.
        response.remove(GRAZING_STATE_KEY);

        let mut updates = Vec::with_capacity(GRAZING_VECTOR_KEYS.len());
        for key in GRAZING_VECTOR_KEYS {
            let Some(v) = response.get(key) else {
                return rollback(
                    ComputationError::MissingKey {
                        key: key.to_string(),
                    }
                    .into(),
                );
            };
            match self.field(key) {
                Ok(sibling) => updates.push((sibling, v.clone())),
                Err(e) => return rollback(e),
            }
        }
        for (sibling, v) in updates {
            sibling.signal.put(v)?;
        }

        debug!(element = %self.name, "grazing-angle vectors updated");
        Ok(())
    }

    /// Ordered snapshot of every field's current value.
    pub fn read(&self) -> BridgeResult<BTreeMap<String, Value>> {
        let mut out = BTreeMap::new();
        for f in &self.fields {
            out.insert(f.signal.name().to_string(), f.signal.get()?);
        }
        Ok(out)
    }

    /// Per-field metadata for the orchestration/document layers.
    ///
    /// The image field of a watchpoint carries the external-storage marker;
    /// its value must be resolved through the resource/datum pair rather
    /// than read as inline data.
    #[must_use]
    pub fn describe(&self) -> BTreeMap<String, SignalDescription> {
        self.fields
            .iter()
            .map(|f| {
                let external = match f.role {
                    FieldRole::Image => Some(EXTERNAL_FILESTORE.to_string()),
                    _ => None,
                };
                (
                    f.signal.name().to_string(),
                    SignalDescription {
                        source: f.signal.source(),
                        kind: f.kind,
                        external,
                    },
                )
            })
            .collect()
    }

    /// Lifecycle hook: prepare for a staged run. Passthrough.
    pub fn stage(&mut self) -> BridgeResult<()> {
        Ok(())
    }

    /// Lifecycle hook: leave the staged state.
    ///
    /// Clears any staged resource record so the next trigger starts clean.
    pub fn unstage(&mut self) -> BridgeResult<()> {
        if let ElementBehavior::Watchpoint(state) = &mut self.behavior {
            state.clear_staged();
        }
        Ok(())
    }
}

impl std::fmt::Debug for ElementObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementObject")
            .field("name", &self.name)
            .field("class_name", &self.class_name)
            .field("address", &self.address)
            .field("fields", &self.fields.len())
            .field("supports_trigger", &self.supports_trigger())
            .finish()
    }
}
