//! Remote Hermes peer adapter.
//!
//! Delegates every capability to another Hermes instance over JSON/HTTPS
//! with bearer auth. The peer's capability manifest is fetched once at
//! construction; capabilities the peer does not advertise fail with
//! `NotSupported` eagerly, without a round trip.
//!
//! Idempotent requests (GET, HEAD, PUT, DELETE) are retried on transport
//! errors and 5xx responses with a linear `base * attempt` delay; 4xx
//! responses surface immediately.
//!
//! # Example
//!
//! ```no_run
//! use hermes_remote::{RemoteConfig, RemoteProvider};
//!
//! # async fn example() -> hermes::Result<()> {
//! let provider = RemoteProvider::connect(
//!     RemoteConfig::new("https://hermes.peer.example", "api-token")
//!         .with_name("peer-eu"),
//! )
//! .await?;
//! # Ok(())
//! # }
//! ```

mod client;

pub use client::{CapabilityManifest, RemoteConfig, RemoteProvider};
