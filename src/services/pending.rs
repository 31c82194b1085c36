use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use secrecy::SecretString;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::models::Platform;

/// 認可リダイレクト前に保存し、コールバックで一度だけ取り出す情報
#[derive(Debug)]
pub struct PendingAuthorization {
    pub platform: Platform,
    /// 認可を開始したユーザー
    pub user_id: Option<Uuid>,
    /// PKCE の code_verifier（Twitter のみ）
    pub code_verifier: Option<SecretString>,
    pub expires_at: OffsetDateTime,
}

impl PendingAuthorization {
    fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }
}

/// state をキーにした認可試行ストア
///
/// 試行ごとに state が異なるため、同時に複数の認可フローを開始しても
/// 互いの code_verifier を上書きしない。
#[derive(Clone)]
pub struct PendingAuthorizationStore {
    entries: Arc<Mutex<HashMap<String, PendingAuthorization>>>,
    ttl: Duration,
}

impl PendingAuthorizationStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// 新しい認可試行を登録（期限切れのエントリはこの時に掃除する）
    pub fn insert(
        &self,
        state: String,
        platform: Platform,
        user_id: Option<Uuid>,
        code_verifier: Option<SecretString>,
    ) {
        let now = OffsetDateTime::now_utc();
        let mut entries = self.lock();
        entries.retain(|_, pending| !pending.is_expired(now));
        entries.insert(
            state,
            PendingAuthorization {
                platform,
                user_id,
                code_verifier,
                expires_at: now + self.ttl,
            },
        );
    }

    /// state に対応する試行を取り出して削除する（一度きり）
    ///
    /// 期限切れの場合は None。
    pub fn take(&self, state: &str) -> Option<PendingAuthorization> {
        let pending = self.lock().remove(state)?;
        if pending.is_expired(OffsetDateTime::now_utc()) {
            tracing::debug!(platform = %pending.platform, "認可試行の有効期限切れ");
            return None;
        }
        Some(pending)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, PendingAuthorization>> {
        // ロック保持中に panic する箇所はないため、poison は無視して中身を使う
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn test_take_is_single_use() {
        let store = PendingAuthorizationStore::new(Duration::minutes(10));
        store.insert(
            "state-1".to_string(),
            Platform::Twitter,
            None,
            Some(SecretString::from("verifier".to_string())),
        );

        let pending = store.take("state-1").unwrap();
        assert_eq!(pending.platform, Platform::Twitter);
        assert_eq!(pending.code_verifier.unwrap().expose_secret(), "verifier");
        assert!(store.take("state-1").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_expired_entry_is_not_returned() {
        let store = PendingAuthorizationStore::new(Duration::seconds(-1));
        store.insert("state".to_string(), Platform::Linkedin, None, None);
        assert!(store.take("state").is_none());
    }

    #[test]
    fn test_insert_purges_expired_entries() {
        let store = PendingAuthorizationStore::new(Duration::seconds(-1));
        store.insert("old".to_string(), Platform::Linkedin, None, None);
        store.insert("new".to_string(), Platform::Linkedin, None, None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_concurrent_attempts_keep_their_own_verifier() {
        let store = PendingAuthorizationStore::new(Duration::minutes(10));
        store.insert(
            "first".to_string(),
            Platform::Twitter,
            None,
            Some(SecretString::from("verifier-1".to_string())),
        );
        store.insert(
            "second".to_string(),
            Platform::Twitter,
            None,
            Some(SecretString::from("verifier-2".to_string())),
        );

        let first = store.take("first").unwrap().code_verifier.unwrap();
        let second = store.take("second").unwrap().code_verifier.unwrap();
        assert_eq!(first.expose_secret(), "verifier-1");
        assert_eq!(second.expose_secret(), "verifier-2");
    }
}
