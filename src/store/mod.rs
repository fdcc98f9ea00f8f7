pub mod disk;
pub mod memory;

use crate::core::cache::KeyValueCollection;
use crate::core::config::AppConfig;
use disk::DiskCollection;
use memory::MemoryCollection;
use std::sync::Arc;
use tracing::{debug, warn};

/// Opens the cache backend selected by the config. A persistent backend that cannot
/// be opened degrades to an in-memory one.
pub fn open_collection(config: &AppConfig) -> Arc<dyn KeyValueCollection> {
    if config.cache.persist {
        let opened = config
            .default_data_path()
            .and_then(|path| DiskCollection::open(&path.join("cache")));
        match opened {
            Ok(collection) => {
                debug!("Using persistent quote cache");
                return Arc::new(collection);
            }
            Err(e) => warn!("Persistent cache unavailable, using memory: {}", e),
        }
    }
    Arc::new(MemoryCollection::new())
}
