use std::str::FromStr;

use painter::PainterConfig;

pub struct Config {
    pub valkey_url: String,
    pub listen_addr: String,
    /// Name the session record and census are stored under.
    pub session_name: String,
    pub painter: PainterConfig,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            valkey_url: std::env::var("VALKEY_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".into()),
            listen_addr: std::env::var("LISTEN_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:3000".into()),
            session_name: std::env::var("SESSION_KEY")
                .unwrap_or_else(|_| "default".into()),
            painter: painter_from_env(),
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring unparsable {}={}", name, raw);
            default
        }),
        Err(_) => default,
    }
}

fn painter_from_env() -> PainterConfig {
    let mut config = PainterConfig::default();

    let deadlines = &mut config.deadlines;
    deadlines.marker_ms = env_or("PAINTER_MARKER_TIMEOUT_MS", deadlines.marker_ms);
    deadlines.file_ms = env_or("PAINTER_FILE_TIMEOUT_MS", deadlines.file_ms);
    deadlines.focus_ms = env_or("PAINTER_FOCUS_TIMEOUT_MS", deadlines.focus_ms);
    deadlines.fact_ms = env_or("PAINTER_FACT_TIMEOUT_MS", deadlines.fact_ms);
    deadlines.tile_ms = env_or("PAINTER_TILE_TIMEOUT_MS", deadlines.tile_ms);

    let pacing = &mut config.pacing;
    pacing.input_delay_ms = env_or("PAINTER_INPUT_DELAY_MS", pacing.input_delay_ms);
    pacing.focus_settle_ms = env_or("PAINTER_FOCUS_SETTLE_MS", pacing.focus_settle_ms);

    config.dedupe_window_ms = env_or("PAINTER_DEDUPE_WINDOW_MS", config.dedupe_window_ms);
    config.dedupe_capacity = env_or("PAINTER_DEDUPE_CAPACITY", config.dedupe_capacity);
    config.status_hold_ms = env_or("PAINTER_STATUS_HOLD_MS", config.status_hold_ms);
    config.default_scale = env_or("PAINTER_DEFAULT_SCALE", config.default_scale);
    if let Ok(raw) = std::env::var("PAINTER_SHUFFLE_SEED") {
        config.shuffle_seed = raw.parse().ok();
    }

    config
}
