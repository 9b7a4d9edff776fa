//! Core types, capability traits, and the hop-discovery algorithm for
//! hoptrace.
//!
//! This crate provides the fundamental abstractions used throughout the
//! tracer:
//!
//! - [`EchoProber`] and [`NameService`] traits for the injected network
//!   capabilities
//! - [`Resolver`] for turning a target string into per-family address sets
//! - [`HopTracer`] for the TTL-escalation probing loop
//! - [`TraceError`] for error handling

pub mod error;
pub mod resolver;
pub mod tracer;
pub mod traits;
pub mod types;

pub use error::{TraceError, TraceResult};
pub use resolver::{HostResolution, Resolver};
pub use tracer::HopTracer;
pub use traits::{EchoProber, NameService};
pub use types::{
    Family, HopReport, HostEntry, ProbeResult, TraceParams, PAYLOAD_SIZE, PROBES_PER_HOP,
};
