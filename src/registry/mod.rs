//! Service registry integration.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     → lease.rs (register with retry, then heartbeat loop)
//!     → client.rs (XML register, PUT heartbeat)
//!
//! Per proxied request:
//!     → client.rs (resolve app → JSON listing)
//!     → types.rs (first UP instance, else first listed)
//! ```
//!
//! # Design Decisions
//! - Resolution is never cached; every request sees the registry's latest view
//! - Registry failures never fail startup or crash the process
//! - Lease keeping is an explicit task stopped through the shutdown channel

pub mod client;
pub mod lease;
pub mod types;

pub use client::RegistryClient;
pub use lease::{LeaseKeeper, LeaseSnapshot, LeaseStatus, Registrar};
pub use types::{
    select_instance, InstanceRecord, InstanceSource, LeaseState, RegistrationLease, RegistryError,
    RegistryResult, ServiceInstance,
};
