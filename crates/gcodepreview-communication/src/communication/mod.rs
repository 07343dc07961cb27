//! Transport seam and load notification plumbing

pub mod stream;
pub mod transport;

pub use stream::{LoadHandle, LoadStream};
pub use transport::FileTransport;
