//! gearctl: operational tooling for a Gearman-backed Zuul scheduler.
//!
//! This library implements the two independent pipelines a deployment needs
//! around the scheduler's Gearman port:
//!
//! - **scale**: [`status::scan`] reads the plaintext status port and
//!   [`autoscale::decide`] turns queue pressure into a replica count
//! - **dump/load**: [`snapshot::dump_all`] captures every tenant's pipeline
//!   state through the job protocol and [`snapshot::load_all`] replays it
//!   after a restart
//!
//! Both are built on [`gearman`], the job-submission client.

pub mod autoscale;
pub mod cli;
pub mod error;
pub mod gearman;
pub mod snapshot;
pub mod status;

// Re-export commonly used error types
pub use error::{ClientError, ProtocolError, SnapshotError, StatusError};
