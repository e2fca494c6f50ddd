//! Externally-stored asset records.
//!
//! A trigger that produces an output file registers it as a pair of
//! records: a *resource* describing where the binary data lives (root
//! directory, relative path, decode parameters) and a *datum* referencing
//! exactly one produced instance of it. Records wait in a per-element FIFO
//! cache until the orchestration engine collects them.

use std::collections::VecDeque;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Kind tag of an asset record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Resource,
    Datum,
}

impl AssetKind {
    /// Lowercase tag used by the document-store collaborator.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Resource => "resource",
            Self::Datum => "datum",
        }
    }
}

/// Describes where an externally stored array lives and how to decode it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDocument {
    /// Unique identifier of this resource; regenerated per trigger.
    pub uid: String,

    /// Handler spec: the simulation kind that produced the file.
    pub spec: String,

    /// Root directory the relative path is anchored under.
    pub root: PathBuf,

    /// Date-partitioned relative path of the output file.
    pub resource_path: String,

    /// Decode-time parameters a downstream reader needs to reconstruct the
    /// array without re-deriving them.
    pub resource_kwargs: Map<String, Value>,
}

impl ResourceDocument {
    /// Absolute path of the output file this resource describes.
    #[must_use]
    pub fn file_path(&self) -> PathBuf {
        self.root.join(&self.resource_path)
    }
}

/// A reference token for one produced instance of a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatumDocument {
    /// Identifier resolved by downstream tooling into pixel data.
    pub datum_id: String,

    /// `uid` of the resource this datum was produced against.
    pub resource: String,

    /// Per-datum parameters (none for single-image reports).
    pub datum_kwargs: Map<String, Value>,
}

/// Produces datum records against one open resource.
///
/// Datum identifiers are `<resource-uid>/<counter>`, unique within the
/// resource.
#[derive(Debug)]
pub struct DatumFactory {
    resource_uid: String,
    counter: u64,
}

impl DatumFactory {
    /// Next datum record for this resource.
    pub fn datum(&mut self, datum_kwargs: Map<String, Value>) -> DatumDocument {
        let datum_id = format!("{}/{}", self.resource_uid, self.counter);
        self.counter += 1;
        DatumDocument {
            datum_id,
            resource: self.resource_uid.clone(),
            datum_kwargs,
        }
    }
}

/// Opens a fresh resource record and its datum factory.
///
/// The resource identity is new on every call; resources are never reused
/// across triggers.
#[must_use]
pub fn compose_resource(
    spec: &str,
    root: PathBuf,
    resource_path: String,
    resource_kwargs: Map<String, Value>,
) -> (ResourceDocument, DatumFactory) {
    let uid = Uuid::new_v4().to_string();
    let resource = ResourceDocument {
        uid: uid.clone(),
        spec: spec.to_string(),
        root,
        resource_path,
        resource_kwargs,
    };
    let factory = DatumFactory {
        resource_uid: uid,
        counter: 0,
    };
    (resource, factory)
}

/// One pending asset record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "doc", rename_all = "lowercase")]
pub enum AssetDoc {
    Resource(ResourceDocument),
    Datum(DatumDocument),
}

impl AssetDoc {
    /// Kind tag of this record.
    #[must_use]
    pub const fn kind(&self) -> AssetKind {
        match self {
            Self::Resource(_) => AssetKind::Resource,
            Self::Datum(_) => AssetKind::Datum,
        }
    }
}

/// Per-element FIFO of pending asset records awaiting collection.
#[derive(Debug, Default)]
pub struct AssetCache {
    items: VecDeque<AssetDoc>,
}

impl AssetCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record at the back.
    pub fn push(&mut self, doc: AssetDoc) {
        self.items.push_back(doc);
    }

    /// Number of pending records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drains every pending record in FIFO order, exactly once.
    ///
    /// Safe to call on an empty cache (returns nothing).
    pub fn drain(&mut self) -> Vec<AssetDoc> {
        self.items.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_resource() -> (ResourceDocument, DatumFactory) {
        compose_resource(
            "srw",
            PathBuf::from("/tmp/beamsig-data"),
            "2026/08/07/abc.dat".to_string(),
            Map::new(),
        )
    }

    #[test]
    fn test_compose_resource_fresh_identity() {
        let (r1, _) = fresh_resource();
        let (r2, _) = fresh_resource();
        assert_ne!(r1.uid, r2.uid);
        assert_eq!(r1.spec, "srw");
        assert_eq!(
            r1.file_path(),
            PathBuf::from("/tmp/beamsig-data/2026/08/07/abc.dat")
        );
    }

    #[test]
    fn test_datum_ids_reference_resource() {
        let (resource, mut factory) = fresh_resource();
        let d0 = factory.datum(Map::new());
        let d1 = factory.datum(Map::new());
        assert_eq!(d0.datum_id, format!("{}/0", resource.uid));
        assert_eq!(d1.datum_id, format!("{}/1", resource.uid));
        assert_eq!(d0.resource, resource.uid);
    }

    #[test]
    fn test_cache_drains_fifo_exactly_once() {
        let (resource, mut factory) = fresh_resource();
        let datum = factory.datum(Map::new());

        let mut cache = AssetCache::new();
        cache.push(AssetDoc::Resource(resource));
        cache.push(AssetDoc::Datum(datum));
        assert_eq!(cache.len(), 2);

        let drained = cache.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].kind(), AssetKind::Resource);
        assert_eq!(drained[1].kind(), AssetKind::Datum);

        assert!(cache.is_empty());
        assert!(cache.drain().is_empty());
    }

    #[test]
    fn test_asset_doc_serialization_shape() {
        let (resource, _) = fresh_resource();
        let json = serde_json::to_value(AssetDoc::Resource(resource)).unwrap();
        assert_eq!(json["kind"], "resource");
        assert!(json["doc"]["resource_path"].is_string());
        assert!(json["doc"]["resource_kwargs"].is_object());
    }
}
