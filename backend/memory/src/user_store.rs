use std::collections::hash_map::Entry;
use std::ffi::OsString;
use std::future::Future;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use lineecho_core::{EchoError, Result, UNKNOWN_DISPLAY_NAME, UserRecord, UserTable};

/// JSON-file user table.
///
/// Every read-modify-write cycle runs under `write_lock`, so concurrent
/// upserts for different users cannot overwrite each other's changes.
pub struct UserStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl UserStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the full table.
    pub async fn load_all(&self) -> Result<UserTable> {
        let _guard = self.write_lock.lock().await;
        read_table(&self.path).await
    }

    /// Record a message from `user_id`.
    ///
    /// For an unseen user `display_name` is called to resolve the name; a
    /// failed or empty lookup records [`UNKNOWN_DISPLAY_NAME`].
    pub async fn upsert<F, Fut>(&self, user_id: &str, display_name: F) -> Result<UserRecord>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        self.upsert_with_clock(user_id, display_name, Utc::now).await
    }

    /// Like [`upsert`](Self::upsert) when the display name is already known.
    pub async fn upsert_with_name(&self, user_id: &str, display_name: &str) -> Result<UserRecord> {
        let name = display_name.to_string();
        self.upsert(user_id, || async move { Ok(name) }).await
    }

    pub(crate) async fn upsert_with_clock<F, Fut, C>(
        &self,
        user_id: &str,
        display_name: F,
        clock: C,
    ) -> Result<UserRecord>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
        C: Fn() -> DateTime<Utc>,
    {
        // Fast path: known user, no network call needed.
        {
            let _guard = self.write_lock.lock().await;
            let mut table = read_table(&self.path).await?;
            if let Some(record) = table.get_mut(user_id) {
                record.touch(clock());
                let updated = record.clone();
                write_table(&self.path, &table).await?;
                debug!(user_id = %user_id, count = updated.message_count, "Updated user record");
                return Ok(updated);
            }
        }

        // The profile lookup runs outside the lock so a slow upstream call
        // does not stall upserts for other users.
        let name = match display_name().await {
            Ok(name) if !name.trim().is_empty() => name,
            Ok(_) => UNKNOWN_DISPLAY_NAME.to_string(),
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Could not resolve display name");
                UNKNOWN_DISPLAY_NAME.to_string()
            }
        };

        let _guard = self.write_lock.lock().await;
        let mut table = read_table(&self.path).await?;
        let now = clock();
        let record = match table.entry(user_id.to_string()) {
            // Inserted by a concurrent delivery while the lock was released.
            Entry::Occupied(mut entry) => {
                entry.get_mut().touch(now);
                entry.get().clone()
            }
            Entry::Vacant(entry) => {
                info!(user_id = %user_id, display_name = %name, "New user recorded");
                entry.insert(UserRecord::new(user_id, name, now)).clone()
            }
        };
        write_table(&self.path, &table).await?;
        Ok(record)
    }
}

async fn read_table(path: &Path) -> Result<UserTable> {
    let raw = match fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(UserTable::new()),
        Err(e) => return Err(EchoError::storage(path, e)),
    };
    if raw.trim().is_empty() {
        return Ok(UserTable::new());
    }
    serde_json::from_str(&raw).map_err(|e| EchoError::storage(path, format!("corrupt user table: {e}")))
}

/// Write to a sibling temp file, then rename over the target.
async fn write_table(path: &Path, table: &UserTable) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| EchoError::storage(parent, e))?;
    }

    let json = serde_json::to_string_pretty(table).map_err(|e| EchoError::storage(path, e))?;

    let mut tmp_name = OsString::from(path.as_os_str());
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| EchoError::storage(&tmp_path, e))?;
    fs::rename(&tmp_path, path)
        .await
        .map_err(|e| EchoError::storage(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn store_in(dir: &tempfile::TempDir) -> UserStore {
        UserStore::new(dir.path().join("data/users.json"))
    }

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn creates_record_for_new_user() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let rec = store
            .upsert("U1", || async { Ok("Alice".to_string()) })
            .await
            .unwrap();

        assert_eq!(rec.user_id, "U1");
        assert_eq!(rec.display_name, "Alice");
        assert_eq!(rec.message_count, 1);
        assert_eq!(rec.first_seen, rec.last_seen);
        assert!(!rec.blocked);
        assert_eq!(store.load_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn second_upsert_counts_and_moves_last_seen() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store
            .upsert_with_clock("U1", || async { Ok("Alice".to_string()) }, || at(1))
            .await
            .unwrap();
        let rec = store
            .upsert_with_clock("U1", || async { Ok("Ignored".to_string()) }, || at(2))
            .await
            .unwrap();

        assert_eq!(rec.message_count, 2);
        assert_eq!(rec.first_seen, at(1));
        assert_eq!(rec.last_seen, at(2));
        assert_eq!(rec.display_name, "Alice");
    }

    #[tokio::test]
    async fn known_user_skips_name_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.upsert_with_name("U1", "Alice").await.unwrap();

        let looked_up = AtomicBool::new(false);
        let rec = store
            .upsert("U1", || {
                looked_up.store(true, Ordering::SeqCst);
                async { Ok("Someone else".to_string()) }
            })
            .await
            .unwrap();
        assert_eq!(rec.message_count, 2);
        assert_eq!(rec.display_name, "Alice");
        assert!(!looked_up.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn failed_lookup_uses_sentinel_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let rec = store
            .upsert("U1", || async { Err(EchoError::upstream("get_profile", "blocked")) })
            .await
            .unwrap();

        assert_eq!(rec.display_name, UNKNOWN_DISPLAY_NAME);
        assert_eq!(rec.message_count, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_upserts_for_distinct_users_all_persist() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(store_in(&dir));
        const N: usize = 32;

        let handles: Vec<_> = (0..N)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    let id = format!("U{i}");
                    store
                        .upsert(&id, || async move {
                            tokio::task::yield_now().await;
                            Ok(format!("user {i}"))
                        })
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let reopened = UserStore::new(store.path());
        let table = reopened.load_all().await.unwrap();
        assert_eq!(table.len(), N);
        assert!(table.values().all(|r| r.message_count == 1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_upserts_for_one_user_count_every_message() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(store_in(&dir));
        const N: u64 = 16;

        let handles: Vec<_> = (0..N)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store.upsert("U1", || async { Ok("Alice".to_string()) }).await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let table = store.load_all().await.unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table["U1"].message_count, N);
    }

    #[tokio::test]
    async fn save_then_load_round_trips_unicode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");

        let mut table = UserTable::new();
        for (id, name) in [("U1", "王小明"), ("U2", "Zoë 🐺"), ("U3", "\"quoted\" \\ name")] {
            let mut rec = UserRecord::new(id, name, at(3));
            rec.touch(at(4));
            table.insert(id.to_string(), rec);
        }
        table.get_mut("U2").unwrap().blocked = true;

        write_table(&path, &table).await.unwrap();
        let loaded = read_table(&path).await.unwrap();
        assert_eq!(loaded, table);

        // Non-ASCII is stored as UTF-8, not escaped.
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("王小明"));
    }

    #[tokio::test]
    async fn missing_file_is_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_is_reported_and_left_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store = UserStore::new(&path);

        let err = store.upsert_with_name("U1", "Alice").await.unwrap_err();
        assert!(matches!(err, EchoError::Storage { .. }));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[tokio::test]
    async fn upgrades_table_with_offsetless_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        std::fs::write(
            &path,
            r#"{
  "Uold": {
    "user_id": "Uold",
    "display_name": "小明",
    "first_message_time": "2024-05-01T12:00:00.123456",
    "last_message_time": "2024-05-03T09:15:42.000001",
    "message_count": 4,
    "blocked": false
  }
}"#,
        )
        .unwrap();
        let store = UserStore::new(&path);

        let new_user = store.upsert_with_name("Unew", "Bob").await.unwrap();
        let old_user = store
            .upsert_with_clock("Uold", || async { Ok("Ignored".to_string()) }, || at(4))
            .await
            .unwrap();

        assert_eq!(new_user.message_count, 1);
        assert_eq!(old_user.message_count, 5);
        assert_eq!(old_user.display_name, "小明");
        assert_eq!(
            old_user.first_seen,
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + chrono::Duration::microseconds(123_456)
        );
        assert_eq!(old_user.last_seen, at(4));

        let table = store.load_all().await.unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table["Uold"], old_user);
    }

    #[tokio::test]
    async fn no_temp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = UserStore::new(dir.path().join("users.json"));
        store.upsert_with_name("U1", "Alice").await.unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["users.json".to_string()]);
    }
}
