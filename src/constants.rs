//! # Constants
//!
//! Shared defaults, label keys and API constants.

/// Label holding the logical secret name on every container we create
pub const LABEL_SECRET_NAME: &str = "x-secret-name";

/// Label holding the deployment/stack scope on every container we create
pub const LABEL_SECRET_STACK: &str = "x-secret-stack";

/// GCP label values are limited to 63 characters
pub const MAX_LABEL_VALUE_LEN: usize = 63;

/// Path segment separating a container name from a version id
pub const VERSIONS_SEGMENT: &str = "versions";

/// Version alias resolved by the backend to the newest version
pub const LATEST_VERSION_ALIAS: &str = "latest";

/// GCP Secret Manager limits secret ids to 255 characters
pub const MAX_CONTAINER_ID_LEN: usize = 255;

/// Number of uuid hex characters appended to generated container ids
pub const CONTAINER_ID_SUFFIX_LEN: usize = 8;

/// Default GCP Secret Manager REST endpoint
pub const DEFAULT_SECRET_MANAGER_ENDPOINT: &str = "https://secretmanager.googleapis.com";

/// Default GCE metadata server host
pub const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";

/// Default HTTP request timeout (seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default page size when listing containers
pub const DEFAULT_LIST_PAGE_SIZE: u32 = 25;

/// Refresh metadata-server tokens this many seconds before they expire
pub const TOKEN_EXPIRY_MARGIN_SECS: u64 = 60;

/// Default tracing filter used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "secret_manager_service=info";
