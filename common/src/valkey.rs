/// Valkey key prefix for persisted painter sessions.
pub const SESSION_PREFIX: &str = "painter_session";

/// Build the Valkey key for a named session record.
pub fn session_key(name: &str) -> String {
    format!("{SESSION_PREFIX}:{name}")
}

/// Valkey hash of painter id -> pixels attributed by the latest census.
pub fn census_key(name: &str) -> String {
    format!("census:{name}")
}
