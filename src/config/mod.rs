pub mod loader;
pub mod schema;

pub use loader::{discover, load_from_path, load_from_str, search_paths, ConfigError, LOCAL_CONFIG_FILE};
pub use schema::{
    CacheConfig, DetectorConfig, MatchingConfig, TrackerConfig, ValidationError, ValidationIssue,
    DEFAULT_CACHE_BYTES,
};
