//! Class synthesis: one element type per distinct configuration entry kind.
//!
//! The synthesizer reads the configuration document once, derives a
//! canonical class name per entry, wires one bound field per entry key
//! (reserved keys translated), and selects the capability set (plain or
//! watchpoint) per entry. Types and instances land in insertion-ordered
//! registries keyed by name.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, instrument};

use crate::connection::SimConnection;
use crate::decode::DecoderRegistry;
use crate::document::{EntryAddress, ModelShape, SimDocument, SimKind};
use crate::element::{ElementBehavior, ElementObject, FieldRole};
use crate::error::{BridgeResult, ConfigurationError};
use crate::naming;
use crate::signal::SignalKind;
use crate::watchpoint::{self, WatchpointState, DEFAULT_ROOT_DIR};

/// Entry kinds whose grazing-angle parameter carries the derived-geometry
/// recomputation.
const MIRROR_KINDS: [&str; 3] = ["sphericalMirror", "toroidalMirror", "ellipsoidMirror"];

/// Entry kind marking a watchpoint element.
const WATCH_KIND: &str = "watch";

/// Grazing-angle parameter key.
const GRAZING_ANGLE_KEY: &str = "grazingAngle";

/// One field of a synthesized class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Element-side attribute name (reserved keys already translated).
    pub attr: String,

    /// Role the field plays on the element.
    pub role: FieldRole,
}

/// Capability set selected for a synthesized class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Bound fields only.
    Plain,

    /// Bound fields plus the trigger/asset pipeline.
    Watchpoint,
}

/// One synthesized element type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementClass {
    /// Canonical PascalCase type name.
    pub class_name: String,

    /// snake_case instance name.
    pub instance_name: String,

    /// Entry this class was derived from (instances bind here).
    pub address: EntryAddress,

    /// Bound-field layout.
    pub fields: Vec<FieldSpec>,

    /// Capability set.
    pub capability: Capability,
}

/// Insertion-ordered registry keyed by name.
///
/// Inserting an existing name replaces the item in place; iteration follows
/// first-insertion order.
#[derive(Debug)]
pub struct Registry<T> {
    names: Vec<String>,
    items: HashMap<String, T>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            names: Vec::new(),
            items: HashMap::new(),
        }
    }
}

impl<T> Registry<T> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the item registered under `name`.
    pub fn insert(&mut self, name: impl Into<String>, item: T) {
        let name = name.into();
        if !self.items.contains_key(&name) {
            self.names.push(name.clone());
        }
        self.items.insert(name, item);
    }

    /// The item registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&T> {
        self.items.get(name)
    }

    /// Mutable access to the item registered under `name`.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut T> {
        self.items.get_mut(name)
    }

    /// Registered names, in first-insertion order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Iterates `(name, item)` pairs in first-insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.names
            .iter()
            .filter_map(|name| self.items.get(name).map(|item| (name.as_str(), item)))
    }

    /// Number of registered items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// True when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// True when `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }
}

/// Options controlling a synthesis call.
#[derive(Debug, Clone)]
pub struct SynthesisOptions {
    /// Also build one instance per synthesized class (default true).
    pub create_objects: bool,

    /// Additional model names to synthesize beyond the primary element
    /// list (variables, commands, reports).
    pub extra_model_fields: Vec<String>,

    /// Root directory watchpoint output files are persisted under.
    pub root_dir: PathBuf,

    /// Decoders handed to synthesized watchpoints.
    pub decoders: DecoderRegistry,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            create_objects: true,
            extra_model_fields: Vec::new(),
            root_dir: PathBuf::from(DEFAULT_ROOT_DIR),
            decoders: DecoderRegistry::new(),
        }
    }
}

/// Result of a synthesis call.
#[derive(Debug)]
pub struct Synthesis {
    /// Synthesized types, keyed by instance name.
    pub classes: Registry<ElementClass>,

    /// Synthesized instances (empty unless `create_objects`).
    pub objects: Registry<ElementObject>,
}

/// Synthesizes element types and instances from the connection's
/// configuration document.
///
/// An unknown simulation kind fails immediately with a configuration error;
/// no partial result is produced. Two calls over equal but independent
/// documents produce identical names and field values backed by their own
/// documents, with no aliasing across calls.
#[instrument(skip_all)]
pub fn synthesize(
    connection: Arc<dyn SimConnection>,
    options: SynthesisOptions,
) -> BridgeResult<Synthesis> {
    let document = connection.document();
    let sim_kind = document.sim_kind()?;

    let mut model_fields = vec![sim_kind.element_location().to_string()];
    model_fields.extend(options.extra_model_fields.iter().cloned());

    let mut classes = Registry::new();
    let mut objects = Registry::new();

    for model_field in &model_fields {
        let addresses: Vec<EntryAddress> = match document.model_shape(model_field)? {
            ModelShape::List(n) => (0..n)
                .map(|i| EntryAddress::list(model_field.clone(), i))
                .collect(),
            ModelShape::Mapping => vec![EntryAddress::mapping(model_field.clone())],
        };

        for address in addresses {
            let class = build_class(&document, sim_kind, address)?;
            debug!(
                class = %class.class_name,
                instance = %class.instance_name,
                entry = %class.address,
                "synthesized element class"
            );
            if options.create_objects {
                let object = instantiate(&class, &document, &connection, &options);
                objects.insert(class.instance_name.clone(), object);
            }
            classes.insert(class.instance_name.clone(), class);
        }
    }

    Ok(Synthesis { classes, objects })
}

fn build_class(
    document: &SimDocument,
    sim_kind: SimKind,
    address: EntryAddress,
) -> BridgeResult<ElementClass> {
    let entry = document.entry_map(&address)?;

    // The class-name field is the element-side (translated) name; the
    // document stores the raw key.
    let class_field = sim_kind.class_name_field();
    let raw_class = entry
        .get(naming::config_key_for(class_field))
        .and_then(Value::as_str)
        .map(str::to_string);
    let raw_class = match raw_class {
        Some(s) => s,
        // A mapping-shaped model with no class-name field is named after
        // the model itself.
        None if address.index.is_none() => address.model_field.clone(),
        None => {
            return Err(ConfigurationError::MissingEntryField {
                entry: address.to_string(),
                field: class_field.to_string(),
            }
            .into())
        }
    };
    let class_name = naming::class_name(&raw_class);
    let instance_name = naming::instance_name(&class_name);

    let entry_kind = entry.get("type").and_then(Value::as_str).unwrap_or("");
    let capability = if entry_kind == WATCH_KIND {
        Capability::Watchpoint
    } else {
        Capability::Plain
    };

    let is_mirror = MIRROR_KINDS.contains(&entry_kind);
    let fields = entry
        .keys()
        .map(|key| {
            let role = if is_mirror && key == GRAZING_ANGLE_KEY {
                FieldRole::GrazingAngle
            } else {
                FieldRole::Value
            };
            FieldSpec {
                attr: naming::element_attr_for(key).to_string(),
                role,
            }
        })
        .collect();

    Ok(ElementClass {
        class_name,
        instance_name,
        address,
        fields,
        capability,
    })
}

fn instantiate(
    class: &ElementClass,
    document: &SimDocument,
    connection: &Arc<dyn SimConnection>,
    options: &SynthesisOptions,
) -> ElementObject {
    let behavior = match class.capability {
        Capability::Plain => ElementBehavior::Plain,
        Capability::Watchpoint => ElementBehavior::Watchpoint(WatchpointState::new(
            options.root_dir.clone(),
            options.decoders.clone(),
        )),
    };

    let mut element = ElementObject::new(
        class.instance_name.clone(),
        class.class_name.clone(),
        document.clone(),
        class.address.clone(),
        Arc::clone(connection),
        behavior,
    );
    if class.capability == Capability::Watchpoint {
        watchpoint::install_watchpoint_signals(&mut element);
    }
    for spec in &class.fields {
        element.add_bound_field(spec.attr.clone(), SignalKind::Normal, spec.role);
    }
    element
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::mock::MockConnection;
    use serde_json::json;

    fn srw_connection() -> Arc<MockConnection> {
        Arc::new(MockConnection::new(
            SimKind::Srw,
            json!({
                "simulationType": "srw",
                "models": {
                    "beamline": [
                        {
                            "title": "Toroid",
                            "type": "toroidalMirror",
                            "position": 10.0,
                            "grazingAngle": 2.5,
                            "normalVectorX": 0.0,
                            "normalVectorY": 1.0,
                            "normalVectorZ": 0.0,
                            "tangentialVectorX": 0.0,
                            "tangentialVectorY": 0.0,
                        },
                        {"title": "W9", "type": "watch", "id": 9, "position": 20.5},
                    ],
                    "undulator": {"period": 0.02, "length": 3.0},
                    "intensityReport": {"title": "Spectrum", "initialEnergy": 100.0},
                },
            }),
        ))
    }

    fn synthesize_srw(extra: &[&str]) -> Synthesis {
        let options = SynthesisOptions {
            extra_model_fields: extra.iter().map(|s| (*s).to_string()).collect(),
            ..SynthesisOptions::default()
        };
        synthesize(srw_connection(), options).unwrap()
    }

    #[test]
    fn test_synthesizes_primary_model_list() {
        let synthesis = synthesize_srw(&[]);
        assert_eq!(synthesis.classes.names(), ["toroid", "w9"]);
        assert_eq!(synthesis.objects.names(), ["toroid", "w9"]);

        let toroid = synthesis.classes.get("toroid").unwrap();
        assert_eq!(toroid.class_name, "Toroid");
        assert_eq!(toroid.capability, Capability::Plain);

        let w9 = synthesis.classes.get("w9").unwrap();
        assert_eq!(w9.class_name, "W9");
        assert_eq!(w9.capability, Capability::Watchpoint);
    }

    #[test]
    fn test_watch_capability_is_per_entry() {
        let synthesis = synthesize_srw(&[]);
        assert!(!synthesis.objects.get("toroid").unwrap().supports_trigger());
        assert!(synthesis.objects.get("w9").unwrap().supports_trigger());
    }

    #[test]
    fn test_reserved_keys_translate_on_elements_only() {
        let synthesis = synthesize_srw(&[]);
        let toroid = synthesis.objects.get("toroid").unwrap();

        assert!(toroid.has_field("element_position"));
        assert!(!toroid.has_field("position"));
        assert_eq!(toroid.get("element_position").unwrap(), json!(10.0));
    }

    #[test]
    fn test_grazing_role_only_on_mirror_kinds() {
        let synthesis = synthesize_srw(&[]);
        let toroid = synthesis.classes.get("toroid").unwrap();
        let grazing = toroid
            .fields
            .iter()
            .find(|f| f.attr == "grazingAngle")
            .unwrap();
        assert_eq!(grazing.role, FieldRole::GrazingAngle);

        let w9 = synthesis.classes.get("w9").unwrap();
        assert!(w9.fields.iter().all(|f| f.role != FieldRole::GrazingAngle));
    }

    #[test]
    fn test_watchpoint_carries_pipeline_signals() {
        let synthesis = synthesize_srw(&[]);
        let w9 = synthesis.objects.get("w9").unwrap();
        for attr in ["cx", "cy", "sx", "sy", "density", "image", "duration"] {
            assert!(w9.has_field(attr), "missing {attr}");
        }
        let toroid = synthesis.objects.get("toroid").unwrap();
        assert!(!toroid.has_field("image"));
    }

    #[test]
    fn test_mapping_shaped_extra_models() {
        let synthesis = synthesize_srw(&["undulator", "intensityReport"]);

        // No class-name field: named after the model itself.
        let undulator = synthesis.objects.get("undulator").unwrap();
        assert_eq!(undulator.get("period").unwrap(), json!(0.02));

        // With a title, the class name comes from it.
        let spectrum = synthesis.objects.get("spectrum").unwrap();
        assert_eq!(spectrum.class_name(), "Spectrum");
        spectrum.set("initialEnergy", json!(20.0)).unwrap();
        let snap = spectrum.read().unwrap();
        assert_eq!(snap["initialEnergy"], json!(20.0));
    }

    #[test]
    fn test_missing_class_field_in_list_entry_fails() {
        let conn = Arc::new(MockConnection::new(
            SimKind::Srw,
            json!({
                "simulationType": "srw",
                "models": {"beamline": [{"position": 1.0}]},
            }),
        ));
        let err = synthesize(conn, SynthesisOptions::default()).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_unknown_simulation_kind_is_fatal() {
        let conn = Arc::new(MockConnection::new(
            SimKind::Srw,
            json!({"simulationType": "elegant", "models": {"beamline": []}}),
        ));
        let err = synthesize(conn, SynthesisOptions::default()).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_duplicate_class_names_share_one_slot() {
        let conn = Arc::new(MockConnection::new(
            SimKind::Srw,
            json!({
                "simulationType": "srw",
                "models": {
                    "beamline": [
                        {"title": "Aperture", "position": 1.0},
                        {"title": "Lens", "position": 2.0},
                        {"title": "Aperture", "position": 3.0},
                    ],
                },
            }),
        ));
        let synthesis = synthesize(conn, SynthesisOptions::default()).unwrap();

        // One type per distinct name, position preserved; the instance is
        // wired to the last entry with that name.
        assert_eq!(synthesis.classes.names(), ["aperture", "lens"]);
        let aperture = synthesis.objects.get("aperture").unwrap();
        assert_eq!(aperture.get("element_position").unwrap(), json!(3.0));
    }

    #[test]
    fn test_create_objects_false_builds_types_only() {
        let options = SynthesisOptions {
            create_objects: false,
            ..SynthesisOptions::default()
        };
        let synthesis = synthesize(srw_connection(), options).unwrap();
        assert_eq!(synthesis.classes.len(), 2);
        assert!(synthesis.objects.is_empty());
    }

    #[test]
    fn test_madx_class_names_come_from_element_name() {
        let conn = Arc::new(MockConnection::new(
            SimKind::Madx,
            json!({
                "simulationType": "madx",
                "models": {
                    "elements": [
                        {"name": "QF1", "l": 0.5},
                        {"name": "DRIFT0", "l": 1.0},
                    ],
                },
            }),
        ));
        let synthesis = synthesize(conn, SynthesisOptions::default()).unwrap();
        assert_eq!(synthesis.classes.names(), ["qf1", "drift0"]);

        let qf1 = synthesis.objects.get("qf1").unwrap();
        assert!(qf1.has_field("element_name"));
        assert_eq!(qf1.get("l").unwrap(), json!(0.5));
    }

    #[test]
    fn test_synthesis_is_idempotent_without_aliasing() {
        let a = synthesize(srw_connection(), SynthesisOptions::default()).unwrap();
        let b = synthesize(srw_connection(), SynthesisOptions::default()).unwrap();

        assert_eq!(a.classes.names(), b.classes.names());
        for (name, _) in a.objects.iter() {
            let av = a.objects.get(name).unwrap().read().unwrap();
            let bv = b.objects.get(name).unwrap().read().unwrap();
            assert_eq!(av, bv);
        }

        // Writing through one synthesis does not touch the other.
        a.objects
            .get("toroid")
            .unwrap()
            .set("element_position", json!(99.0))
            .unwrap();
        assert_eq!(
            b.objects
                .get("toroid")
                .unwrap()
                .get("element_position")
                .unwrap(),
            json!(10.0)
        );
    }
}
