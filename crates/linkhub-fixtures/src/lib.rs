//! Test utilities and fixtures for linkhub integration tests.
//!
//! - [`ZipBuilder`] - Fluent API for building zip archives in memory
//! - [`test_soft_archive`] - The canonical `TestSoft` archive
//! - [`understate_uncompressed_sizes`] - Lie about entry sizes in the zip headers
//! - [`temp_dir`] - Create unique temporary directories
//! - [`memory_bridge`] - A bridge over in-memory stores and a recording platform
//!
//! # Example
//!
//! ```ignore
//! use linkhub::install::Upload;
//! use linkhub_fixtures::{memory_bridge, temp_dir, test_soft_archive};
//!
//! let dir = temp_dir("install");
//! let (bridge, platform) = memory_bridge(&dir);
//! let result = bridge
//!     .install(Upload::bytes("TestSoft.zip", test_soft_archive()))
//!     .unwrap();
//! assert!(result.executable_path.ends_with("TestSoft.exe"));
//! assert!(platform.calls().is_empty());
//! ```

// Test fixtures crate - relaxed lints for test utilities
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]
#![allow(missing_docs)]

pub mod builders;
pub mod helpers;

pub use builders::{test_soft_archive, understate_uncompressed_sizes, ZipBuilder};
pub use helpers::{memory_bridge, software_root, temp_dir, workspace_root, write_file};
