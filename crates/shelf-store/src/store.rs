//! Cache-fronted access to users and sessions.
//!
//! Two caches sit in front of the driver:
//! - users by id: filled when a user is created, read only by id-keyed lookups
//! - session lists by user id: a full snapshot, overwritten after every
//!   session write and filled on a lookup miss
//!
//! Username and role queries always go to the driver. No cache guard is
//! held while a driver call is pending.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use shelf_cache::{CacheConfig, CacheStats, TtlCache};
use tracing::{debug, warn};

use crate::Result;
use crate::storage::Driver;
use crate::types::{NewUser, Session, User, UserFilter};

/// Business-level entry point over a [`Driver`].
#[derive(Clone)]
pub struct Store {
    driver: Arc<dyn Driver>,
    users: TtlCache<User>,
    sessions: TtlCache<Vec<Session>>,
}

impl Store {
    pub fn new(driver: Arc<dyn Driver>, cache: CacheConfig) -> Self {
        Self {
            driver,
            users: TtlCache::new(cache.clone()),
            sessions: TtlCache::new(cache),
        }
    }

    // ── Users ───────────────────────────────────────────────────────

    /// Persist a user and remember it by id.
    pub async fn create_user(&self, user: NewUser) -> Result<User> {
        let user = self.driver.create_user(user).await?;
        self.users.set(user.id.to_string(), user.clone());
        debug!(user_id = user.id, role = %user.role, "User created");
        Ok(user)
    }

    pub async fn list_users(&self, filter: &UserFilter) -> Result<Vec<User>> {
        self.driver.list_users(filter).await
    }

    /// Look up one user. Only a filter keyed on the id alone consults the cache.
    pub async fn get_user(&self, filter: &UserFilter) -> Result<Option<User>> {
        if let Some(id) = filter.id_only()
            && let Some(user) = self.users.get(&id.to_string())
        {
            return Ok(Some(user));
        }

        self.driver.get_user(filter).await
    }

    // ── Sessions ────────────────────────────────────────────────────

    /// All sessions of `user_id`, served from the snapshot cache when fresh.
    pub async fn get_user_sessions(&self, user_id: i64) -> Result<Vec<Session>> {
        let key = user_id.to_string();
        if let Some(sessions) = self.sessions.get(&key) {
            return Ok(sessions);
        }

        debug!(user_id, "Session list cache miss, loading from driver");
        let sessions = self.driver.get_user_sessions(user_id).await?;
        self.sessions.set(key, sessions.clone());
        Ok(sessions)
    }

    /// Persist a session, then replace the user's cached session list.
    ///
    /// A failed refetch does not fail the call; the cached list is dropped so
    /// the next lookup reads through to the driver.
    pub async fn create_session(&self, session: &Session) -> Result<()> {
        self.driver.create_session(session).await?;
        self.refresh_sessions(session.user_id).await;
        Ok(())
    }

    /// Slide a session's window forward, then replace the owner's cached
    /// session list so validity checks see the new time.
    pub async fn update_last_accessed_time(
        &self,
        user_id: i64,
        session_id: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.driver.update_last_accessed_time(session_id, at).await?;
        self.refresh_sessions(user_id).await;
        Ok(())
    }

    /// Delete a session, then replace the owner's cached session list.
    pub async fn delete_session(&self, user_id: i64, session_id: &str) -> Result<()> {
        self.driver.delete_session(session_id).await?;
        self.refresh_sessions(user_id).await;
        Ok(())
    }

    async fn refresh_sessions(&self, user_id: i64) {
        let key = user_id.to_string();
        match self.driver.get_user_sessions(user_id).await {
            Ok(sessions) => self.sessions.set(key, sessions),
            Err(e) => {
                warn!(user_id, error = %e, "Failed to refetch user sessions, dropping cached list");
                self.sessions.remove(&key);
            }
        }
    }

    // ── Observability ───────────────────────────────────────────────

    pub fn user_cache_stats(&self) -> CacheStats {
        self.users.stats()
    }

    pub fn session_cache_stats(&self) -> CacheStats {
        self.sessions.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MockDriver, Operation};
    use crate::types::Role;

    fn store_with_mock() -> (Store, Arc<MockDriver>) {
        let driver = Arc::new(MockDriver::new());
        let store = Store::new(driver.clone(), CacheConfig::default());
        (store, driver)
    }

    fn new_user(name: &str) -> NewUser {
        NewUser {
            username: name.to_string(),
            password_hash: "hash".to_string(),
            role: Role::ProductView,
        }
    }

    #[tokio::test]
    async fn test_created_user_served_from_cache_by_id() {
        let (store, driver) = store_with_mock();
        let user = store.create_user(new_user("alice")).await.unwrap();

        let found = store.get_user(&UserFilter::by_id(user.id)).await.unwrap();
        assert_eq!(found, Some(user));
        assert_eq!(driver.calls(Operation::GetUser), 0);
        assert_eq!(store.user_cache_stats().items, 1);
    }

    #[tokio::test]
    async fn test_username_lookup_always_hits_driver() {
        let (store, driver) = store_with_mock();
        store.create_user(new_user("alice")).await.unwrap();

        store
            .get_user(&UserFilter::by_username("alice"))
            .await
            .unwrap();
        store
            .get_user(&UserFilter::by_username("alice"))
            .await
            .unwrap();
        assert_eq!(driver.calls(Operation::GetUser), 2);
    }

    #[tokio::test]
    async fn test_id_lookup_miss_falls_through_without_caching() {
        let (store, driver) = store_with_mock();
        let user = driver.create_user(new_user("direct")).await.unwrap();

        for _ in 0..2 {
            let found = store.get_user(&UserFilter::by_id(user.id)).await.unwrap();
            assert_eq!(found.as_ref().map(|u| u.id), Some(user.id));
        }
        assert_eq!(driver.calls(Operation::GetUser), 2);
        assert_eq!(store.user_cache_stats().items, 0);
    }

    #[tokio::test]
    async fn test_session_list_cached_after_miss() {
        let (store, driver) = store_with_mock();
        driver.seed_session(Session::new("s1", 7, Utc::now()));

        assert_eq!(store.get_user_sessions(7).await.unwrap().len(), 1);
        assert_eq!(store.get_user_sessions(7).await.unwrap().len(), 1);
        assert_eq!(driver.calls(Operation::GetUserSessions), 1);
    }

    #[tokio::test]
    async fn test_create_session_overwrites_snapshot() {
        let (store, driver) = store_with_mock();

        store
            .create_session(&Session::new("s1", 7, Utc::now()))
            .await
            .unwrap();
        // A row written behind the store's back shows up on the next snapshot.
        driver.seed_session(Session::new("side", 7, Utc::now()));
        store
            .create_session(&Session::new("s2", 7, Utc::now()))
            .await
            .unwrap();

        let mut ids: Vec<_> = store
            .get_user_sessions(7)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.session_id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["s1", "s2", "side"]);
        // Both refetches, no lookup miss.
        assert_eq!(driver.calls(Operation::GetUserSessions), 2);
    }

    #[tokio::test]
    async fn test_failed_refetch_drops_snapshot() {
        let (store, driver) = store_with_mock();
        store
            .create_session(&Session::new("s1", 7, Utc::now()))
            .await
            .unwrap();

        driver.fail_on(Operation::GetUserSessions);
        store
            .create_session(&Session::new("s2", 7, Utc::now()))
            .await
            .unwrap();
        driver.recover(Operation::GetUserSessions);

        let sessions = store.get_user_sessions(7).await.unwrap();
        assert_eq!(sessions.len(), 2);
    }

    #[tokio::test]
    async fn test_create_session_failure_leaves_cache_untouched() {
        let (store, driver) = store_with_mock();
        driver.fail_on(Operation::CreateSession);

        let result = store
            .create_session(&Session::new("s1", 7, Utc::now()))
            .await;
        assert!(result.is_err());
        assert_eq!(driver.calls(Operation::GetUserSessions), 0);
        assert_eq!(store.session_cache_stats().items, 0);
    }

    #[tokio::test]
    async fn test_touch_replaces_cached_snapshot() {
        let (store, driver) = store_with_mock();
        let old = Utc::now() - chrono::TimeDelta::days(3);
        driver.seed_session(Session::new("s1", 7, old));
        assert_eq!(store.get_user_sessions(7).await.unwrap()[0].last_accessed_time, old);

        let now = Utc::now();
        store.update_last_accessed_time(7, "s1", now).await.unwrap();

        let calls = driver.calls(Operation::GetUserSessions);
        let sessions = store.get_user_sessions(7).await.unwrap();
        assert_eq!(sessions[0].last_accessed_time, now);
        // Served from the refetched snapshot.
        assert_eq!(driver.calls(Operation::GetUserSessions), calls);
    }

    #[tokio::test]
    async fn test_failed_touch_leaves_snapshot() {
        let (store, driver) = store_with_mock();
        driver.seed_session(Session::new("s1", 7, Utc::now()));
        store.get_user_sessions(7).await.unwrap();
        driver.fail_on(Operation::UpdateLastAccessedTime);

        assert!(store.update_last_accessed_time(7, "s1", Utc::now()).await.is_err());
        assert_eq!(driver.calls(Operation::GetUserSessions), 1);
    }

    #[tokio::test]
    async fn test_delete_session_refreshes_snapshot() {
        let (store, _driver) = store_with_mock();
        store
            .create_session(&Session::new("s1", 7, Utc::now()))
            .await
            .unwrap();

        store.delete_session(7, "s1").await.unwrap();
        assert!(store.get_user_sessions(7).await.unwrap().is_empty());
    }
}
