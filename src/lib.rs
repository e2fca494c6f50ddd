//! # beamsig - Signal bridge for remote physics simulations
//!
//! beamsig exposes the parameters of a remote physics-simulation
//! configuration as addressable, individually settable/gettable signal
//! endpoints, and orchestrates running a simulation step, decoding its
//! output, computing beam statistics, and publishing the result as
//! externally stored data with stable identifiers.
//!
//! ## Core Concepts
//!
//! - **SimDocument**: shared handle over the simulation's parameter tree,
//!   mutated in place
//! - **BoundSignal**: a live, two-way-synchronized view onto one
//!   configuration key
//! - **ElementObject**: synthesized bundle of signals representing one
//!   configuration entry
//! - **Watchpoint**: an element with a trigger/asset pipeline for
//!   image-producing simulation reports
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use beamsig::{synthesize, SynthesisOptions};
//!
//! let synthesis = synthesize(connection, SynthesisOptions::default())?;
//!
//! let toroid = synthesis.objects.get("toroid").unwrap();
//! toroid.set("grazingAngle", 10.0.into())?;
//!
//! let w9 = synthesis.objects.get_mut("w9").unwrap();
//! w9.trigger()?;
//! for doc in w9.collect_asset_docs() {
//!     // hand resource/datum records to the document store
//! }
//! ```
//!
//! The execution model is synchronous and single-threaded: every operation
//! runs to completion before returning. Orchestration may interleave
//! triggers across distinct elements, but must not issue two triggers
//! concurrently on one instance.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Binding layer
pub mod document;
pub mod element;
pub mod error;
pub mod naming;
pub mod signal;
pub mod synthesize;

// Trigger/asset pipeline
pub mod assets;
pub mod report;
pub mod stats;
pub mod watchpoint;

// Collaborator seams
pub mod connection;
pub mod decode;

// Re-export primary types at crate root for convenience
pub use assets::{AssetCache, AssetDoc, AssetKind, DatumDocument, ResourceDocument};
pub use connection::SimConnection;
pub use decode::{DecodeParams, DecodedReport, DecoderRegistry, JsonReportDecoder, ReportDecoder};
pub use document::{EntryAddress, ModelShape, SimDocument, SimKind};
pub use element::{ElementBehavior, ElementObject, FieldRole};
pub use error::{
    BridgeError, BridgeResult, ComputationError, ConfigurationError, ConnectionError, DecodeError,
};
pub use report::BeamStatisticsReport;
pub use signal::{BoundSignal, ElementSignal, LocalSignal, SignalDescription, SignalKind};
pub use stats::{moment_stats, quantile_stats, BeamStats, DEFAULT_BEAM_QUANTILE};
pub use synthesize::{
    synthesize, Capability, ElementClass, FieldSpec, Registry, Synthesis, SynthesisOptions,
};
pub use watchpoint::{WatchpointState, DEFAULT_ROOT_DIR};
