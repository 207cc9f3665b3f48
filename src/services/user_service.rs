use std::{collections::BTreeMap, sync::Arc};

use chrono::Utc;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::info;

use super::{persistence::PersistenceGateway, request_repository::RequestRepository};
use crate::{
    error::{AppError, AppResult},
    models::{RequestContent, SubscriberId, User, UserRequest},
};

/// Partial update; absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub firstname: Option<String>,
    pub surname: Option<String>,
    pub username: Option<String>,
    pub ban: Option<bool>,
}

/// Accounts that own subscriptions. Holding the account map lock while
/// subscribing keeps a concurrent `delete_user` from orphaning requests.
pub struct UserService {
    users: RwLock<BTreeMap<SubscriberId, User>>,
    gateway: Arc<dyn PersistenceGateway>,
    requests: Arc<RequestRepository>,
}

impl UserService {
    pub fn new(gateway: Arc<dyn PersistenceGateway>, requests: Arc<RequestRepository>) -> Self {
        Self {
            users: RwLock::new(BTreeMap::new()),
            gateway,
            requests,
        }
    }

    pub async fn reload(&self) -> AppResult<usize> {
        let mut users = self.users.write().await;
        let loaded = self.gateway.load_all_users().await?;
        *users = loaded.into_iter().map(|u| (u.user_id, u)).collect();
        info!(users = users.len(), "user accounts rehydrated");
        Ok(users.len())
    }

    pub async fn add_user(&self, user: User) -> AppResult<User> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.user_id) {
            return Err(AppError::AlreadyExists(format!("user {}", user.user_id)));
        }
        self.gateway.insert_user(&user).await?;
        users.insert(user.user_id, user.clone());
        info!(user_id = %user.user_id, "user added");
        Ok(user)
    }

    pub async fn get_user(&self, id: SubscriberId) -> Option<User> {
        self.users.read().await.get(&id).cloned()
    }

    pub async fn list_users(&self) -> Vec<User> {
        self.users.read().await.values().cloned().collect()
    }

    pub async fn update_user(&self, id: SubscriberId, update: UserUpdate) -> AppResult<User> {
        let mut users = self.users.write().await;
        let mut user = users
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("user {id}")))?;

        if let Some(v) = update.firstname {
            user.firstname = v;
        }
        if let Some(v) = update.surname {
            user.surname = v;
        }
        if let Some(v) = update.username {
            user.username = v;
        }
        if let Some(v) = update.ban {
            user.ban = v;
        }
        user.updated = Utc::now();

        self.gateway.update_user(&user).await?;
        users.insert(id, user.clone());
        Ok(user)
    }

    /// Releases every request the user holds, then removes the account.
    /// Returns the released requests.
    pub async fn delete_user(&self, id: SubscriberId) -> AppResult<Vec<UserRequest>> {
        let mut users = self.users.write().await;
        if !users.contains_key(&id) {
            return Err(AppError::NotFound(format!("user {id}")));
        }

        let released = self.requests.remove_subscriber(id).await?;
        self.gateway.delete_user(id).await?;
        users.remove(&id);
        info!(user_id = %id, released = released.len(), "user deleted");
        Ok(released)
    }

    /// Subscribes an existing account.
    pub async fn subscribe(&self, id: SubscriberId, content: RequestContent) -> AppResult<UserRequest> {
        let users = self.users.read().await;
        if !users.contains_key(&id) {
            return Err(AppError::NotFound(format!("user {id}")));
        }
        self.requests.subscribe(id, content).await
    }
}
