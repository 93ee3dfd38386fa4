//! Gearman job-submission client.
//!
//! Implements the client half of the Gearman protocol against the
//! scheduler's job port:
//!
//! - **`GearClient`**: connects (optionally with TLS client authentication)
//!   and submits named jobs with a JSON payload, waiting until each one
//!   completes
//! - **`Packet`**: wire codec for request/response frames
//!
//! Every `run` call is one independent round trip; connections are created
//! per invocation and never pooled or reused across operations.
//!
//! # Example
//!
//! ```rust,ignore
//! use gearctl::gearman::{ClientConfig, GearClient};
//!
//! let config = ClientConfig::new("scheduler");
//! let mut client = GearClient::connect(&config).await?;
//! let reply = client.run("status", serde_json::json!({})).await?;
//! ```

mod client;
mod packet;

pub use client::{ClientConfig, GearClient, GEARMAN_PORT};
pub use packet::{Packet, PacketMagic, PacketType, HEADER_LEN};
