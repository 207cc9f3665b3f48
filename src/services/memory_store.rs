use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::persistence::PersistenceGateway;
use crate::{
    error::{AppError, AppResult},
    models::{CanonicalRequest, RequestContent, RequestId, SubscriberId, User, UserRequest},
};

#[derive(Debug, Clone)]
struct Holder {
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct StoredRequest {
    content: RequestContent,
    holders: BTreeMap<SubscriberId, Holder>,
}

#[derive(Debug, Default)]
struct Tables {
    requests: BTreeMap<RequestId, StoredRequest>,
    users: BTreeMap<SubscriberId, User>,
}

/// Process-local storage with the same row semantics as `MongoStore`.
/// Backs `STORAGE=memory` and the test suite.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored request rows (one per canonical request).
    pub async fn request_rows(&self) -> usize {
        self.tables.read().await.requests.len()
    }

    /// Writes a raw (holder, request) row without any dedup, as a foreign
    /// writer or an older build might have left it.
    pub async fn seed_row(&self, subscriber: SubscriberId, request: &UserRequest) {
        let mut t = self.tables.write().await;
        let row = t.requests.entry(request.id).or_insert_with(|| StoredRequest {
            content: request.content.clone(),
            holders: BTreeMap::new(),
        });
        row.holders.insert(
            subscriber,
            Holder {
                created_at: request.created_at,
                updated_at: request.updated_at,
            },
        );
    }
}

#[async_trait]
impl PersistenceGateway for MemoryStore {
    async fn load_all_requests(&self) -> AppResult<Vec<(SubscriberId, UserRequest)>> {
        let t = self.tables.read().await;
        let mut rows = Vec::new();
        for (id, stored) in &t.requests {
            for (subscriber, h) in &stored.holders {
                rows.push((
                    *subscriber,
                    UserRequest {
                        id: *id,
                        content: stored.content.clone(),
                        created_at: h.created_at,
                        updated_at: h.updated_at,
                    },
                ));
            }
        }
        Ok(rows)
    }

    async fn find_request(&self, id: RequestId) -> AppResult<Option<CanonicalRequest>> {
        let t = self.tables.read().await;
        Ok(t.requests.get(&id).map(|r| CanonicalRequest {
            id,
            content: r.content.clone(),
        }))
    }

    async fn insert_request(&self, subscriber: SubscriberId, request: &UserRequest) -> AppResult<()> {
        let mut t = self.tables.write().await;
        if t.requests.contains_key(&request.id) {
            return Err(AppError::Persistence(format!(
                "duplicate key: request {}",
                request.id
            )));
        }
        let mut holders = BTreeMap::new();
        holders.insert(
            subscriber,
            Holder {
                created_at: request.created_at,
                updated_at: request.updated_at,
            },
        );
        t.requests.insert(
            request.id,
            StoredRequest {
                content: request.content.clone(),
                holders,
            },
        );
        Ok(())
    }

    async fn insert_subscriber_link(
        &self,
        subscriber: SubscriberId,
        request: &UserRequest,
    ) -> AppResult<()> {
        let mut t = self.tables.write().await;
        let Some(row) = t.requests.get_mut(&request.id) else {
            return Err(AppError::Persistence(format!(
                "request {} missing from storage",
                request.id
            )));
        };
        row.holders.entry(subscriber).or_insert(Holder {
            created_at: request.created_at,
            updated_at: request.updated_at,
        });
        Ok(())
    }

    async fn delete_request(&self, subscriber: SubscriberId, id: RequestId) -> AppResult<()> {
        let mut t = self.tables.write().await;
        let missing = || AppError::NotFound(format!("request {id} has no stored holder {subscriber}"));
        let Some(row) = t.requests.get_mut(&id) else {
            return Err(missing());
        };
        if row.holders.remove(&subscriber).is_none() {
            return Err(missing());
        }
        if row.holders.is_empty() {
            t.requests.remove(&id);
        }
        Ok(())
    }

    async fn load_all_users(&self) -> AppResult<Vec<User>> {
        Ok(self.tables.read().await.users.values().cloned().collect())
    }

    async fn insert_user(&self, user: &User) -> AppResult<()> {
        let mut t = self.tables.write().await;
        if t.users.contains_key(&user.user_id) {
            return Err(AppError::Persistence(format!(
                "duplicate key: user {}",
                user.user_id
            )));
        }
        t.users.insert(user.user_id, user.clone());
        Ok(())
    }

    async fn update_user(&self, user: &User) -> AppResult<()> {
        let mut t = self.tables.write().await;
        match t.users.get_mut(&user.user_id) {
            Some(slot) => {
                *slot = user.clone();
                Ok(())
            }
            None => Err(AppError::Persistence(format!(
                "user {} missing from storage",
                user.user_id
            ))),
        }
    }

    async fn delete_user(&self, id: SubscriberId) -> AppResult<()> {
        let mut t = self.tables.write().await;
        t.users.remove(&id);
        for row in t.requests.values_mut() {
            row.holders.remove(&id);
        }
        t.requests.retain(|_, row| !row.holders.is_empty());
        Ok(())
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
