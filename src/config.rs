//! Environment-driven configuration, read once at startup.

use std::env;

/// Canonical sample rate fingerprinting operates at. Inputs at any other
/// rate are resampled down/up to this before analysis.
pub const SAMPLE_RATE: u32 = 22_050;

pub const FFT_SIZE: usize = 4096;
pub const HOP_LENGTH: usize = 2048;

pub const PEAK_NEIGHBORHOOD: usize = 20;
pub const AMPLITUDE_THRESHOLD_DB: f32 = -60.0;

pub const FAN_OUT: usize = 15;
pub const MIN_TIME_DELTA: i64 = 0;
pub const MAX_TIME_DELTA: i64 = 200;

pub const MIN_MATCH_THRESHOLD: usize = 8;

pub const RECOGNITION_WINDOW_SECS: f32 = 8.0;
pub const RECOGNITION_INTERVAL_SECS: f32 = 3.0;
pub const MAX_LISTEN_DURATION_SECS: f32 = 35.0;

/// SQLite caps bound parameters well above this, but the reference
/// implementation's 900 is kept to stay interoperable with the behavior
/// documented in spec §4.E.
pub const MATCH_BATCH_SIZE: usize = 900;

/// Default sample rate assumed for a client that never sends a `config`
/// frame before audio.
pub const DEFAULT_WS_SAMPLE_RATE: u32 = 44_100;

#[derive(Debug, Clone)]
pub struct Settings {
    pub db_path: String,
    pub songs_dir: String,
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

impl Settings {
    /// Loads configuration from the process environment, falling back to a
    /// local `.env` file if present (mirrors the teacher's `dotenvy` use).
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            db_path: env::var("MUSICA_DB").unwrap_or_else(|_| "musica.db".to_string()),
            songs_dir: env::var("MUSICA_SONGS_DIR").unwrap_or_else(|_| "songs".to_string()),
            host: env::var("MUSICA_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("MUSICA_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),
            cors_origins: env::var("MUSICA_CORS_ORIGINS")
                .unwrap_or_else(|_| {
                    "http://localhost:3000,http://localhost:5173".to_string()
                })
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }
}
