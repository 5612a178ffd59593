//! # pv-server
//!
//! `pv-server` is the foreground supervisor behind `pv start`: a loopback
//! DNS responder for the synthetic TLD, the main FrankenPHP instance, and
//! one secondary FrankenPHP per active non-global PHP version, all owned by
//! a single task that tears them down in order on exit.
//!
//! ## Key Modules
//!
//! *   [`dns`]: UDP responder answering `*.<tld>` with `127.0.0.1`.
//! *   [`frankenphp`]: Start/stop/reload one FrankenPHP child.
//! *   [`supervisor`]: PID file, startup sequence, and multiplexed waiting.
//!
//! ## Entry Points
//!
//! *   **Run it**: [`supervisor::start`].
//! *   **Is it up**: [`supervisor::is_running`], [`supervisor::read_pid`].
//! *   **Live reconfigure**: [`supervisor::reconfigure_server`].

// 1. Logic & Safety
#![warn(clippy::let_underscore_must_use)] // Don't swallow errors with `let _`
#![warn(clippy::manual_let_else)] // Enforces clean "Guard Clause" style
#![warn(clippy::unwrap_used)] // Force error propagation (no panics)
#![warn(clippy::expect_used)] // Force error propagation
// 2. Numeric Safety (Critical for PIDs/Ports)
#![warn(clippy::cast_possible_truncation)]
#![warn(clippy::cast_possible_wrap)]
// 3. Import Hygiene
#![warn(clippy::wildcard_imports)]
#![allow(clippy::missing_errors_doc)]

pub mod dns;
#[doc(inline)]
pub use dns::DnsServer;
pub mod frankenphp;
#[doc(inline)]
pub use frankenphp::PhpServer;
pub mod supervisor;
