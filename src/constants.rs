//! Central Configuration Constants
//!
//! Single source of truth for all configuration defaults.

/// Default server port
pub const DEFAULT_PORT: u16 = 8501;

/// Default model artifact path (relative to the working directory)
pub const DEFAULT_MODEL_PATH: &str = "RandomForestRegressor.json";

/// Precomputed global-importance (beeswarm) plot shown under every prediction
pub const DEFAULT_REFERENCE_IMAGE_URL: &str =
    "https://github.com/wuyuze3387/-03.25/blob/main/蜂群图.png";

/// Default timeout for the reference image fetch (seconds)
pub const DEFAULT_IMAGE_FETCH_TIMEOUT_SECS: u64 = 10;

/// Largest reference image we are willing to embed in a page
pub const MAX_REFERENCE_IMAGE_BYTES: usize = 8 * 1024 * 1024;

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "Birth Trauma Predict";

/// Page title
pub const PAGE_TITLE: &str = "Random Forest Regression Prediction & SHAP Visualization";

/// Name of the predicted quantity, used in result captions
pub const TARGET_NAME: &str = "childbirth psychological trauma score";
