pub mod audit;
pub mod credentials;
pub mod monitoring;
pub mod notification;
pub mod transfer;

pub use audit::*;
pub use credentials::*;
pub use monitoring::*;
pub use notification::*;
pub use transfer::*;

/// Safe period applied when the caller does not pick one
pub const DEFAULT_DURATION_HOURS: u32 = 48;

/// Shortest safe period accepted at creation
pub const MIN_DURATION_HOURS: u32 = 1;

/// Longest safe period accepted at creation (one week)
pub const MAX_DURATION_HOURS: u32 = 168;

/// Fixed probe cadence for every transfer
pub const MONITORING_INTERVAL_MINUTES: u32 = 30;

/// Clean monitoring window after which a transfer is released early
pub const EARLY_RELEASE_AFTER_HOURS: u32 = 24;
