//! Fixed names and thresholds shared across the relay.

/// Name of the category that groups every relay-managed channel.
pub const CATEGORY_NAME: &str = "localized";

/// Operator-instructions channel; never a pair member, never reaped.
pub const HOW_TO_CHANNEL_NAME: &str = "how-to";

/// Translation archive channel; never a pair member, never reaped.
pub const HISTORY_CHANNEL_NAME: &str = "history";

/// Channels that survive every sweep and never route messages.
pub const PERMANENT_CHANNELS: [&str; 2] = [HOW_TO_CHANNEL_NAME, HISTORY_CHANNEL_NAME];

/// Fallback home language when a guild's locale can't be resolved.
pub const STANDARD_LANGUAGE: &str = "en";

/// Separator token inside pair channel names (`es-to-en`, `en-to-es`).
pub const PAIR_NAME_SEPARATOR: &str = "-to-";

/// Prefix that marks a message as a command rather than relay traffic.
pub const COMMAND_PREFIX: &str = "??translate";

/// Minutes a mirror channel may sit without a message before deletion.
pub const IDLE_TIMEOUT_MINUTES: i64 = 240;

/// Cron expression for the idle-channel sweep (every 5 minutes).
pub const SWEEP_SCHEDULE: &str = "0 */5 * * * *";

/// Cron expression for the translation token refresh (every 8 minutes).
pub const TOKEN_REFRESH_SCHEDULE: &str = "0 */8 * * * *";

/// Longest text an archive embed field may carry before it is chunked.
pub const ARCHIVE_FIELD_LIMIT: usize = 1024;
