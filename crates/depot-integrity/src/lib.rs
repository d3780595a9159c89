//! # depot-integrity: Checksum Integrity
//!
//! Background maintenance of the `.sha1`/`.md5` sidecars that Maven clients
//! verify downloads against.
//!
//! - [`ChecksumIntegrity`] walks the store, writes any missing sidecar, and
//!   deletes checksum-of-checksum objects (`x.jar.sha1.md5` and friends).
//! - [`ScanScheduler`] runs a scan on a fixed interval with a single-slot
//!   guard: a tick that arrives while a scan is still running is skipped,
//!   never queued.
//!
//! Nothing here is invoked by request handling.

pub mod error;
pub mod scanner;
pub mod scheduler;

pub use error::IntegrityError;
pub use scanner::{ChecksumIntegrity, ScanReport};
pub use scheduler::{ChecksumScan, ScanObserver, ScanOutcome, ScanScheduler, TickOutcome};
