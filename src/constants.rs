// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// The default field manager name attached to every mutation
pub const FIELD_MANAGER: &str = "dockhand";

/// Discovery polling configuration
pub mod discovery {
    /// Initial polling interval in seconds when waiting for a kind to register
    pub const POLL_INTERVAL_SECS: u64 = 2;
    /// Maximum polling interval in seconds (exponential backoff cap)
    pub const POLL_MAX_INTERVAL_SECS: u64 = 30;
}

/// Post-mutation wait polling configuration
pub mod wait {
    /// Default overall timeout in seconds
    pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
    /// Initial polling interval in seconds
    pub const POLL_INTERVAL_SECS: u64 = 1;
    /// Maximum polling interval in seconds (exponential backoff cap)
    pub const POLL_MAX_INTERVAL_SECS: u64 = 10;
}
