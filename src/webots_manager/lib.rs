//! # webots-manager Architecture
//!
//! webots-manager keeps several Webots releases side by side under one work
//! root, lets one of them be the active version behind a stable home path,
//! and overlays site-specific files into every tree that should get them.
//! Like most tools of this kind it is a library with a CLI client, not the
//! other way around.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI (main.rs, args.rs)                                     │
//! │  - Parses arguments, prints messages, picks exit codes      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API (api.rs)                                               │
//! │  - Thin facade, parses version text, returns CmdResult      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Commands (commands/*.rs)                                   │
//! │  - One module per user-facing operation                     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Core                                                       │
//! │  - instance: installed trees and the active pointer         │
//! │  - template: overlay files and their per-version rules      │
//! │  - catalog / download / extract: getting a release on disk  │
//! │  - lock: cross-process exclusion for every mutation         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! From `api.rs` inward nothing writes to stdout or calls
//! `std::process::exit`. Progress and diagnostics go through `tracing`; the
//! binary decides where they end up.
//!
//! ## Configuration
//!
//! A [`config::ManagerConfig`] is loaded once at startup and threaded into
//! every component. There are no global paths.
//!
//! ## Testing
//!
//! Core modules carry their own unit tests against temporary work roots
//! built by `test_utils::TestEnv`, which also publishes release archives
//! into a local mirror. `tests/` drives the library and the binary end to
//! end.

#[cfg(not(unix))]
compile_error!("webots-manager manages symlinked installation trees and requires a Unix platform");

pub mod api;
pub mod catalog;
pub mod commands;
pub mod config;
pub mod download;
pub mod error;
pub mod extract;
pub mod instance;
pub mod lock;
pub mod setup;
pub mod template;
pub mod version;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
