//! Profile a packet capture and synthesize plausible network flow records
//! from the per-subnet and per-host statistics it contains.

/// Run configuration
pub mod config;
/// Error type
pub mod error;
/// Structures used throughout the library
pub mod structs;
/// Progress report
pub mod ui;

/// Packet source: pcap reading and decoding
pub mod pcap2profile;
/// Per-entity statistics
pub mod profile;
/// Weighted sampling
pub mod sampler;
/// Synthetic record generation
pub mod synth;

/// Output sinks
pub mod export;

pub use error::{Error, Result};
pub use structs::*;
