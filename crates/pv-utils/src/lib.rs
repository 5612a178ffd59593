//! Shared utilities for pv.

/// Single-member tar.gz extraction.
pub mod archive;
/// Atomic downloads and checksum verification.
pub mod download;
/// OS/architecture gates for release assets.
pub mod platform;
/// Probe utilities.
pub mod probe;
/// Process signalling utilities.
pub mod process;
