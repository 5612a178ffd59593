//! # pv-core
//!
//! `pv-core` provides the shared types and on-disk state used across the
//! `pv` ecosystem (CLI, phpenv, server supervisor).
//!
//! ## Key Modules
//!
//! *   [`paths`]: The deterministic `~/.pv/` directory layout and port mapping.
//! *   [`settings`]: The persisted `{tld, global_php}` settings record.
//! *   [`registry`]: The ordered list of linked projects.
//! *   [`detect`]: Project type detection (laravel-octane, laravel, php, static).
//! *   [`caddy`]: Site config generation for the main and secondary servers.
//! *   [`versions`]: Tool name → installed version bookkeeping.
//!
//! ## Entry Points
//!
//! *   **Locating state**: Start with [`Paths`].
//! *   **Linked projects**: Use [`Registry`] and [`Project`].
//! *   **Regenerating routes**: See [`caddy::generate_all_configs`].

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

pub mod caddy;
pub mod detect;
pub mod paths;
#[doc(inline)]
pub use paths::Paths;
pub mod registry;
#[doc(inline)]
pub use registry::{Project, ProjectType, Registry};
pub mod settings;
#[doc(inline)]
pub use settings::Settings;
pub mod versions;
#[doc(inline)]
pub use versions::VersionState;
