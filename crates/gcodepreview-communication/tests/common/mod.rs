#![allow(dead_code)]

use async_trait::async_trait;
use gcodepreview_communication::FileTransport;
use gcodepreview_core::{FileMetadata, FileRef, LoadState, ProgressCallback, TransportError};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Transport serving one in-memory file and counting requests
#[derive(Default)]
pub struct MockTransport {
    pub content: Vec<u8>,
    pub metadata_size: Option<u64>,
    pub server_threshold: Option<u64>,
    pub fail_download: bool,
    pub hang: bool,
    pub downloads: AtomicUsize,
    pub metadata_requests: AtomicUsize,
}

impl MockTransport {
    pub fn serving(content: impl Into<Vec<u8>>) -> Self {
        let content = content.into();
        Self {
            metadata_size: Some(content.len() as u64),
            content,
            ..Default::default()
        }
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn metadata_requests(&self) -> usize {
        self.metadata_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileTransport for MockTransport {
    async fn file_metadata(&self, _file: &FileRef) -> Result<FileMetadata, TransportError> {
        self.metadata_requests.fetch_add(1, Ordering::SeqCst);
        Ok(FileMetadata {
            size: self.metadata_size,
        })
    }

    async fn download_file(
        &self,
        file: &FileRef,
        progress: ProgressCallback,
    ) -> Result<Vec<u8>, TransportError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            std::future::pending::<()>().await;
        }
        if self.fail_download {
            return Err(TransportError::DownloadFailed {
                path: file.path.clone(),
                reason: "HTTP 500".to_string(),
            });
        }

        let total = self.content.len() as u64;
        for chunk in 1..=4u64 {
            progress(total * chunk / 4, total);
            tokio::task::yield_now().await;
        }
        Ok(self.content.clone())
    }

    async fn download_size_threshold(&self) -> Option<u64> {
        self.server_threshold
    }
}

/// Generic G-code print with `layers` layers of `moves` extrusions each
pub fn print_file(layers: usize, moves: usize) -> String {
    let mut text = String::from("G28\nG90\nM82\nG92 E0\n");
    let mut e = 0.0;
    for layer in 0..layers {
        text.push_str(&format!("G1 Z{:.2} F600\n", 0.2 * (layer + 1) as f32));
        for k in 0..moves {
            e += 0.5;
            text.push_str(&format!("G1 X{} Y{} E{:.3}\n", k + 1, layer, e));
        }
    }
    text
}

/// Progress values of all `Loading` states
pub fn progress_values(states: &[LoadState]) -> Vec<f32> {
    states.iter().filter_map(LoadState::progress).collect()
}

/// Assert the stream contract: non-decreasing progress, one terminal state at the end
pub fn assert_well_formed(states: &[LoadState]) {
    let (last, loading) = states.split_last().expect("stream yielded no states");
    assert!(last.is_terminal(), "last state {last} is not terminal");
    assert!(loading.iter().all(|s| !s.is_terminal()));
    let progress = progress_values(loading);
    assert!(progress.windows(2).all(|w| w[0] <= w[1]), "progress decreased: {progress:?}");
}
