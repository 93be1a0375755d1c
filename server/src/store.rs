use common::valkey;
use common::SessionRecord;
use painter::census::Census;
use redis::AsyncCommands;

/// The persisted session record and census results of one named session.
#[derive(Clone)]
pub struct SessionStore {
    valkey: redis::aio::MultiplexedConnection,
    name: String,
}

impl SessionStore {
    pub fn new(valkey: redis::aio::MultiplexedConnection, name: String) -> Self {
        Self { valkey, name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The stored record, if any. A record that does not decode is deleted.
    pub async fn load(&self) -> Option<SessionRecord> {
        let key = valkey::session_key(&self.name);
        let raw: Option<String> = self
            .valkey
            .clone()
            .get(&key)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("Failed to read session {}: {}", key, e);
                None
            });
        let raw = raw?;

        match SessionRecord::decode(&raw) {
            Some(record) => Some(record),
            None => {
                tracing::warn!("Discarding corrupt session record {}", key);
                self.clear().await;
                None
            }
        }
    }

    pub async fn save(&self, record: &SessionRecord) {
        let key = valkey::session_key(&self.name);
        let _: () = self
            .valkey
            .clone()
            .set(&key, record.encode())
            .await
            .unwrap_or_else(|e| {
                tracing::error!("Failed to save session {}: {}", key, e);
            });
    }

    pub async fn clear(&self) {
        let key = valkey::session_key(&self.name);
        let _: () = self
            .valkey
            .clone()
            .del(&key)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("Failed to delete session {}: {}", key, e);
            });
    }

    /// Replace the stored tally with `census`, painter id -> pixel count.
    pub async fn save_census(&self, census: &Census) {
        let key = valkey::census_key(&self.name);
        let mut pipe = redis::pipe();
        pipe.atomic().del(&key).ignore();
        if !census.painters.is_empty() {
            let counts: Vec<(u64, usize)> = census
                .painters
                .iter()
                .map(|(painter, count)| (painter.id, *count))
                .collect();
            pipe.hset_multiple(&key, &counts).ignore();
        }
        let _: () = pipe
            .query_async(&mut self.valkey.clone())
            .await
            .unwrap_or_else(|e| {
                tracing::error!("Failed to save census {}: {}", key, e);
            });
    }
}
