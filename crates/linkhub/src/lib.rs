//! LinkHub: a sandboxed OS bridge for a local portable-software dashboard.
//!
//! The crate decides whether a caller-supplied path may be touched at all,
//! launches or reveals approved targets, and installs user-dropped zip archives
//! into whitelisted directories while picking the program's main executable.
//! Every filesystem or process action crossing the UI boundary goes through
//! [`policy::resolve`] first.

#![forbid(unsafe_code)]
// Library documentation is in progress. Public API types have docs;
// internal types will be documented in future releases.
#![allow(missing_docs)]

pub mod archive;
pub mod bridge;
pub mod browse;
pub mod config;
pub mod driver;
pub mod error;
pub mod heuristic;
pub mod install;
pub mod launcher;
pub mod model;
pub mod platform;
pub mod policy;
pub mod scan;
pub mod store;

pub use crate::bridge::Bridge;
pub use crate::error::{BridgeError, BridgeResult, ErrorCode};
pub use crate::model::*;
