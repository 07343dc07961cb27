//! # GCodePreview Communication
//!
//! Loading of G-code documents from the printer server.
//! Defines the [`FileTransport`] seam implemented by hosts, the load state
//! stream with its cancellation handle, the remote loader and the
//! cache-first load orchestrator.

pub mod communication;
pub mod loader;

pub use communication::{FileTransport, LoadHandle, LoadStream};
pub use loader::{LoadOrchestrator, RemoteLoader, RemoteLoaderConfig};
