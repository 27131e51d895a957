//! # sqlfs
//!
//! Command-line surface for [`sqlfs_kernel`]: configuration loading, the
//! FUSE binding, and the `init` / `verify` / `mount` commands.

pub mod commands;
pub mod config;
pub mod fuse;

pub use config::{Config, MountSettings, DEFAULT_URI};
