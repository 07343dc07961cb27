//! Engine-wide defaults

/// Default total size budget of the document cache (16 MiB)
pub const DEFAULT_MAX_CACHE_SIZE: u64 = 16 * 1024 * 1024;

/// Default size above which downloads need explicit opt-in (10 MiB)
pub const DEFAULT_LARGE_FILE_THRESHOLD: u64 = 10 * 1024 * 1024;

/// Share of the load progress attributed to the download phase
pub const DOWNLOAD_PROGRESS_SHARE: f32 = 0.9;

/// Default maximum chord length when linearising arcs (mm)
pub const DEFAULT_ARC_SEGMENT_LENGTH: f32 = 1.0;

/// Default upper bound of segments per arc
pub const DEFAULT_MAX_ARC_SEGMENTS: usize = 64;

/// Millimetres per inch, for `G20` input
pub const MM_PER_INCH: f32 = 25.4;

/// Bytes inspected by dialect probes
pub const DIALECT_PROBE_BYTES: usize = 64 * 1024;

/// Directory name used under the platform cache directory
pub const CACHE_DIR_NAME: &str = "gcodepreview";
