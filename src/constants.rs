//! Shared defaults for the resilience layer.

/// Retries a failure boundary offers before declaring its budget exhausted.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Attempts (initial load plus user retries) a routed view offers.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Upper bound accepted by configuration validation for either budget.
pub const MAX_CONFIGURABLE_BUDGET: u32 = 10;

/// Capacity of the document event broadcast channel.
pub const DOCUMENT_EVENT_CAPACITY: usize = 256;

/// Environment names recognised by configuration and logging.
pub mod environments {
    pub const DEVELOPMENT: &str = "development";
    pub const TEST: &str = "test";
    pub const PRODUCTION: &str = "production";
}

/// User-facing copy shared by fallbacks.
pub mod copy {
    pub const RELOAD_LABEL: &str = "Reload page";
    pub const RETRY_LABEL: &str = "Try again";
    pub const GO_BACK_LABEL: &str = "Go back";
    pub const RETRIES_EXHAUSTED: &str =
        "We couldn't recover automatically. Please reload the page.";
}
