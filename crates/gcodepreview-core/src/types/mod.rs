//! Type system utilities and aliases.
//!
//! ## Modules
//!
//! - [`aliases`]: Shared-state and progress callback aliases

pub mod aliases;

pub use aliases::*;
