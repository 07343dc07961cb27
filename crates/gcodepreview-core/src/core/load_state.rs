//! Load state notifications
//!
//! A load emits zero or more [`LoadState::Loading`] states with
//! non-decreasing progress, followed by exactly one terminal state.

use crate::data::GcodeDocument;
use crate::error::Error;
use std::sync::Arc;

/// State of a document load
#[derive(Debug, Clone)]
pub enum LoadState {
    /// Load in progress, progress in `[0, 1]`
    Loading(f32),
    /// Document parsed and available
    Ready(Arc<GcodeDocument>),
    /// Load failed; the original cause is preserved
    Failed(Arc<Error>),
    /// File exceeds the download threshold and the caller did not opt in
    FailedLargeFileDownloadRequired,
}

impl LoadState {
    /// Whether no further states follow this one
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LoadState::Loading(_))
    }

    /// Progress of a `Loading` state
    pub fn progress(&self) -> Option<f32> {
        match self {
            LoadState::Loading(progress) => Some(*progress),
            _ => None,
        }
    }

    /// Document of a `Ready` state
    pub fn document(&self) -> Option<&Arc<GcodeDocument>> {
        match self {
            LoadState::Ready(document) => Some(document),
            _ => None,
        }
    }

    /// Create a failed state from any error convertible into [`Error`]
    pub fn failed(error: impl Into<Error>) -> Self {
        LoadState::Failed(Arc::new(error.into()))
    }
}

impl std::fmt::Display for LoadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Loading(progress) => write!(f, "Loading({:.2})", progress),
            Self::Ready(document) => write!(f, "Ready({} layers)", document.layer_count()),
            Self::Failed(error) => write!(f, "Failed({})", error),
            Self::FailedLargeFileDownloadRequired => write!(f, "FailedLargeFileDownloadRequired"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Dialect;
    use crate::error::TransportError;

    #[test]
    fn test_terminal_states() {
        assert!(!LoadState::Loading(0.5).is_terminal());
        assert!(LoadState::FailedLargeFileDownloadRequired.is_terminal());
        let doc = Arc::new(GcodeDocument::new(Dialect::Generic, Vec::new(), 0));
        assert!(LoadState::Ready(doc).is_terminal());
        let failed = LoadState::failed(TransportError::Cancelled {
            path: "a.gcode".to_string(),
        });
        assert!(failed.is_terminal());
        assert_eq!(failed.to_string(), "Failed(Load of a.gcode was cancelled)");
    }
}
