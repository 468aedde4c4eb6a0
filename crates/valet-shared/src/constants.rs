/// Application name
pub const APP_NAME: &str = "Valet";

/// Symbols a shift code may contain: `A-Z` without `O`/`I`, and `2-9`.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Number of characters in a shift code
pub const CODE_LENGTH: usize = 6;

/// How many fresh codes the registry draws before giving up on a collision
pub const MAX_CODE_ATTEMPTS: usize = 16;

/// Default timeout for a single push or lookup (milliseconds)
pub const DEFAULT_SYNC_TIMEOUT_MS: u64 = 5_000;

/// Default push attempts per retry round
pub const DEFAULT_PUSH_MAX_ATTEMPTS: u32 = 5;

/// Exponential backoff bounds (milliseconds)
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 200;
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 10_000;

/// Interval at which parked outbox entries are retried (seconds)
pub const DEFAULT_RETRY_INTERVAL_SECS: u64 = 30;

/// Hold duration required to confirm a car return (milliseconds)
pub const DEFAULT_RETURN_HOLD_MS: u64 = 800;

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Display color bounds in HSB space. Keeps colors away from grey and black.
pub const COLOR_SATURATION_RANGE: (f64, f64) = (0.5, 1.0);
pub const COLOR_BRIGHTNESS_RANGE: (f64, f64) = (0.7, 1.0);
