//! Document loading: cache-first orchestration over the remote loader

pub mod orchestrator;
pub mod remote;

pub use orchestrator::LoadOrchestrator;
pub use remote::{RemoteLoader, RemoteLoaderConfig};
