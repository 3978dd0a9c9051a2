/// Application name
pub const APP_NAME: &str = "modhost";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Host version number plugins compare `requires` against
pub const HOST_VERSION: i64 = 2024100700;

/// Human-readable host release
pub const HOST_RELEASE: &str = "4.5";

/// Component name of the host itself
pub const CORE_COMPONENT: &str = "core";

/// Manifest file expected in every plugin directory
pub const MANIFEST_FILE: &str = "manifest.json";

/// Default plugin root
pub const DEFAULT_PLUGIN_ROOT: &str = "plugins";

/// Default data directory
pub const DEFAULT_DATA_DIR: &str = "data";

/// Snapshot file of the record store, relative to the data directory
pub const RECORDS_FILE: &str = "records.json";

/// Stem of the host configuration file (`modhost.toml`, `modhost.json`, ...)
pub const CONFIG_FILE_STEM: &str = "modhost";

/// Default time-to-live of loaded plugin instances
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Weight given to the first block placed in an empty region
pub const FIRST_BLOCK_WEIGHT: i64 = 0;
