//! This module contains global constants used across the sync loop, resolver and clients.

use std::time::Duration;

/// Poll cadence used whenever the live layout carries no queue-driven zone.
pub const STATIC_POLL_INTERVAL: Duration = Duration::from_secs(10);
/// Floor for the configured `pollingInterval` (seconds).
pub const MIN_POLL_INTERVAL_SECS: u64 = 1;
/// Cadence used while an unbound terminal keeps asking the server for its binding.
pub const REGISTRATION_RETRY_INTERVAL: Duration = STATIC_POLL_INTERVAL;

/// Default server endpoint when neither YAML nor CLI supply one.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8080";
/// TCP connect timeout for queue server calls.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 1500;
/// Whole-request timeout for queue server calls.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 4000;

/// Default viewport, a 1080p panel in landscape.
pub const DEFAULT_VIEWPORT_WIDTH: u32 = 1920;
pub const DEFAULT_VIEWPORT_HEIGHT: u32 = 1080;

/// Identifier reserved for the built-in default configuration.
pub const DEFAULT_PRESET_ID: &str = "default";

/// External text-to-speech program used by the command speaker.
pub const DEFAULT_SPEECH_COMMAND: &str = "espeak-ng";
/// espeak words-per-minute at a Web Speech style rate of 1.0
pub const SPEECH_BASE_WPM: f32 = 175.0;

/// Message used when the configured template is blank.
pub const DEFAULT_SPEECH_TEMPLATE: &str = "Number {number}, {name}, please proceed to {window}";

/// Entries kept in the remote preset read cache.
pub const PRESET_CACHE_CAPACITY: u64 = 64;
/// Lifetime of a cached remote preset.
pub const PRESET_CACHE_TTL: Duration = Duration::from_secs(30);
