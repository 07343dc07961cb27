//! Type aliases for commonly used complex types.
//!
//! Gives meaningful names to the shared-state and callback types used by
//! the cache and the loaders.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gcodepreview_core::types::*;
//!
//! // Instead of: Arc<Mutex<HashMap<String, u64>>>
//! let generations: ThreadSafeMap<String, u64> = thread_safe_map();
//! ```

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

/// A thread-safe hash map for cross-thread key-value storage.
///
/// Uses `parking_lot::Mutex` for better performance than `std::sync::Mutex`.
pub type ThreadSafeMap<K, V> = Arc<Mutex<HashMap<K, V>>>;

/// A thread-safe read-write locked wrapper.
///
/// Use for state that is read far more often than written, such as the
/// currently displayed document.
pub type ThreadSafeRw<T> = Arc<RwLock<T>>;

/// Progress callback receiving `(bytes_done, bytes_total)`.
///
/// `bytes_total` is 0 when the total is unknown.
pub type ProgressCallback = Box<dyn Fn(u64, u64) + Send + Sync>;

/// Create a new empty thread-safe map
pub fn thread_safe_map<K, V>() -> ThreadSafeMap<K, V> {
    Arc::new(Mutex::new(HashMap::new()))
}

/// Create a new read-write locked wrapper
pub fn thread_safe_rw<T>(value: T) -> ThreadSafeRw<T> {
    Arc::new(RwLock::new(value))
}
