use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;

use super::StaticConfig;

static CONFIG: OnceLock<ArcSwap<StaticConfig>> = OnceLock::new();

/// Get the global configuration instance
///
/// Returns an Arc pointer to the configuration, which is cheap to clone
/// and doesn't hold any locks. Falls back to loading `config.toml` when
/// nothing has been initialized yet.
pub fn get_config() -> Arc<StaticConfig> {
    CONFIG
        .get_or_init(|| ArcSwap::from_pointee(StaticConfig::load(None)))
        .load_full()
}

/// Initialize the global configuration from the default location
pub fn init_config() {
    init_config_from(None);
}

/// Initialize the global configuration from an explicit TOML path
///
/// A later call replaces the stored configuration instead of being ignored,
/// so `-c` always wins over an implicit earlier load.
pub fn init_config_from(path: Option<&str>) {
    let loaded = StaticConfig::load(path);
    match CONFIG.get() {
        Some(current) => current.store(Arc::new(loaded)),
        None => {
            let _ = CONFIG.set(ArcSwap::from_pointee(loaded));
        }
    }
}
