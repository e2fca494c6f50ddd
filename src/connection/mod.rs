//! Simulation-connection seam.
//!
//! The connection owns the configuration document for the process lifetime
//! and executes simulation runs remotely. The transport (protocol bytes,
//! authentication, process management) is out of scope; this trait is the
//! whole contract the bridge consumes. [`mock::MockConnection`] is the
//! in-crate reference implementation used by tests and embedded setups.

mod traits;

pub mod mock;

pub use traits::SimConnection;
