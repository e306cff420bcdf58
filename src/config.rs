//! Application-level configuration loading: lifecycle timings, provisioning
//! pipeline tuning and sweeper cadence.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::generation::{pipeline::PipelineConfig, retry::RetryPolicy};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "BIBLE_GAMES_CONFIG_PATH";

/// Time-to-live of newly created games.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// TTL for games with `max_players == 1`.
    pub single_player_ttl: Duration,
    /// TTL for games with more than one seat.
    pub multi_player_ttl: Duration,
    /// How many leaderboard entries to return per difficulty.
    pub leaderboard_size: u32,
}

impl LifecycleConfig {
    /// TTL for a game with the given capacity.
    pub fn ttl_for(&self, max_players: u32) -> Duration {
        if max_players > 1 {
            self.multi_player_ttl
        } else {
            self.single_player_ttl
        }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            single_player_ttl: Duration::from_secs(30 * 60),
            multi_player_ttl: Duration::from_secs(60 * 60),
            leaderboard_size: 10,
        }
    }
}

/// Thresholds of the deadlock detector.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Unfinished participants idle for longer than this are presumed gone.
    pub inactivity_timeout: Duration,
    /// Games this close to `expires_at` are force-completed.
    pub expiry_margin: Duration,
}

impl CompletionConfig {
    /// Idle time after which an unfinished participant of a game allowing
    /// `time_per_question` seconds per question is presumed gone: never less
    /// than two full questions.
    pub fn idle_threshold(&self, time_per_question: u32) -> Duration {
        let two_questions = Duration::from_secs(u64::from(time_per_question) * 2);
        self.inactivity_timeout.max(two_questions)
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout: Duration::from_secs(120),
            expiry_margin: Duration::from_secs(5 * 60),
        }
    }
}

/// Expiration sweeper settings.
#[derive(Debug, Clone)]
pub struct CleanupConfig {
    /// Completed games are kept this long so players can read results.
    pub completed_grace: Duration,
    /// Period of the background sweep.
    pub sweep_interval: Duration,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            completed_grace: Duration::from_secs(10 * 60),
            sweep_interval: Duration::from_secs(5 * 60),
        }
    }
}

#[derive(Debug, Clone, Default)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Game creation settings.
    pub lifecycle: LifecycleConfig,
    /// Question provisioning settings.
    pub pipeline: PipelineConfig,
    /// Completion protocol settings.
    pub completion: CompletionConfig,
    /// Expiration sweeper settings.
    pub cleanup: CleanupConfig,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        wave_size = app_config.pipeline.wave_size,
                        max_attempts = app_config.pipeline.max_attempts,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    single_player_ttl_secs: Option<u64>,
    multi_player_ttl_secs: Option<u64>,
    leaderboard_size: Option<u32>,
    pipeline: RawPipeline,
    retry: RawRetry,
    inactivity_timeout_secs: Option<u64>,
    expiry_margin_secs: Option<u64>,
    completed_grace_secs: Option<u64>,
    sweep_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawPipeline {
    wave_size: Option<usize>,
    flush_size: Option<usize>,
    max_attempts: Option<u32>,
    selector_retries: Option<u32>,
    usage_retention_days: Option<u64>,
    similarity_threshold: Option<f64>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawRetry {
    max_attempts: Option<u32>,
    base_delay_ms: Option<u64>,
    multiplier: Option<f64>,
    max_delay_ms: Option<u64>,
    rate_limit_cooldown_ms: Option<u64>,
    server_error_factor: Option<f64>,
}

impl From<RawRetry> for RetryPolicy {
    fn from(raw: RawRetry) -> Self {
        let defaults = RetryPolicy::default();
        Self {
            max_attempts: raw.max_attempts.unwrap_or(defaults.max_attempts).max(1),
            base_delay: raw
                .base_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.base_delay),
            multiplier: raw.multiplier.unwrap_or(defaults.multiplier),
            max_delay: raw
                .max_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_delay),
            rate_limit_cooldown: raw
                .rate_limit_cooldown_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.rate_limit_cooldown),
            server_error_factor: raw
                .server_error_factor
                .unwrap_or(defaults.server_error_factor),
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(raw: RawConfig) -> Self {
        let secs = |value: Option<u64>, default: Duration| {
            value.map(Duration::from_secs).unwrap_or(default)
        };

        let lifecycle_defaults = LifecycleConfig::default();
        let lifecycle = LifecycleConfig {
            single_player_ttl: secs(
                raw.single_player_ttl_secs,
                lifecycle_defaults.single_player_ttl,
            ),
            multi_player_ttl: secs(raw.multi_player_ttl_secs, lifecycle_defaults.multi_player_ttl),
            leaderboard_size: raw
                .leaderboard_size
                .unwrap_or(lifecycle_defaults.leaderboard_size),
        };

        let pipeline_defaults = PipelineConfig::default();
        let pipeline = PipelineConfig {
            wave_size: raw
                .pipeline
                .wave_size
                .unwrap_or(pipeline_defaults.wave_size)
                .max(1),
            flush_size: raw
                .pipeline
                .flush_size
                .unwrap_or(pipeline_defaults.flush_size)
                .max(1),
            max_attempts: raw
                .pipeline
                .max_attempts
                .unwrap_or(pipeline_defaults.max_attempts),
            selector_retries: raw
                .pipeline
                .selector_retries
                .unwrap_or(pipeline_defaults.selector_retries),
            usage_retention: raw
                .pipeline
                .usage_retention_days
                .map(|days| Duration::from_secs(days * 24 * 60 * 60))
                .unwrap_or(pipeline_defaults.usage_retention),
            similarity_threshold: raw
                .pipeline
                .similarity_threshold
                .unwrap_or(pipeline_defaults.similarity_threshold),
            request_timeout: secs(
                raw.pipeline.request_timeout_secs,
                pipeline_defaults.request_timeout,
            ),
            retry: raw.retry.into(),
            rng_seed: None,
        };

        let completion_defaults = CompletionConfig::default();
        let cleanup_defaults = CleanupConfig::default();
        Self {
            lifecycle,
            pipeline,
            completion: CompletionConfig {
                inactivity_timeout: secs(
                    raw.inactivity_timeout_secs,
                    completion_defaults.inactivity_timeout,
                ),
                expiry_margin: secs(raw.expiry_margin_secs, completion_defaults.expiry_margin),
            },
            cleanup: CleanupConfig {
                completed_grace: secs(raw.completed_grace_secs, cleanup_defaults.completed_grace),
                sweep_interval: secs(raw.sweep_interval_secs, cleanup_defaults.sweep_interval),
            },
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
