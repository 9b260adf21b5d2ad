//! Application constants
//!
//! Centralized location for magic strings and protocol defaults.

use std::time::Duration;

/// Fixed per-request deadline. There is no retry.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client identification header attached to every call
pub const CLIENT_HEADER_NAME: &str = "X-Requested-With";
pub const CLIENT_HEADER_VALUE: &str = "QuAPI Rust Client";

/// Value substituted for absent or empty fields during extraction
pub const PLACEHOLDER: &str = "N/A";

/// Maximum number of body characters quoted in a non-success notice
pub const BODY_EXCERPT_CHARS: usize = 500;

/// Rendered when an operation produced no response at all
pub const NO_RESPONSE_MESSAGE: &str = "No response received.\n";

/// Default base URL offered in the connection bar
pub const DEFAULT_BASE_URL: &str = "https://qualysapi.qualys.com";

/// Config directory override
pub const CONFIG_DIR_ENV: &str = "QAPI_CONFIG_DIR";
pub const BASE_URL_ENV: &str = "QAPI_URL";
pub const USERNAME_ENV: &str = "QAPI_USERNAME";

/// Application name
pub const APP_NAME: &str = "QuAPI TUI";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
