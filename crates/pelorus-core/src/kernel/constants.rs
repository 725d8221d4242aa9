/// Application name
pub const APP_NAME: &str = "Pelorus";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Configuration directory name, relative to the user's home
pub const CONFIG_DIR_NAME: &str = ".pelorus";

/// Default configuration file name inside [`CONFIG_DIR_NAME`]
pub const CONFIG_FILE_NAME: &str = "pelorus.toml";

/// Plugins that ship with the host. Only copies found in a system directory
/// are classified as system plugins.
pub const DEFAULT_SYSTEM_PLUGINS: &[&str] = &["chartdldr_pi", "wmm_pi", "dashboard_pi", "grib_pi"];

/// Upper bound on request-application rounds after one dispatch pass, so two
/// plugins messaging each other cannot keep the host busy forever.
pub const MAX_REQUEST_ROUNDS: usize = 16;
