//! # Skillpack Core Kernel
//!
//! Shared foundations for the rest of the crate.
//!
//! - **Constants**: on-disk layout names, limits and timeouts, in the
//!   `constants` submodule.
//! - **Error Handling**: the crate-wide [`Error`](error::Error) and its
//!   `Result` alias, in the `error` submodule. Every subsystem error converts
//!   into it and exposes a machine-readable code.
pub mod constants;
pub mod error;

pub use error::{Error, Result};
