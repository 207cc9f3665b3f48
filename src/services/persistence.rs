use async_trait::async_trait;

use crate::{
    error::AppResult,
    models::{CanonicalRequest, RequestId, SubscriberId, User, UserRequest},
};

/// Durable side of the registry.
///
/// Every method is a single atomic write or read: a call either fully lands
/// or fails without side effects. The registry writes here first and only
/// touches memory once the call has returned `Ok`.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Every (holder, request) pair in storage, for rehydration.
    async fn load_all_requests(&self) -> AppResult<Vec<(SubscriberId, UserRequest)>>;

    async fn find_request(&self, id: RequestId) -> AppResult<Option<CanonicalRequest>>;

    /// Stores a brand-new canonical request held by `subscriber`.
    async fn insert_request(&self, subscriber: SubscriberId, request: &UserRequest) -> AppResult<()>;

    /// Attaches `subscriber` to an already stored request (`request.id`).
    async fn insert_subscriber_link(
        &self,
        subscriber: SubscriberId,
        request: &UserRequest,
    ) -> AppResult<()>;

    /// Detaches `subscriber`; the stored request goes away with its last holder.
    /// `NotFound` when `subscriber` is not stored as a holder of `id`.
    async fn delete_request(&self, subscriber: SubscriberId, id: RequestId) -> AppResult<()>;

    async fn load_all_users(&self) -> AppResult<Vec<User>>;

    async fn insert_user(&self, user: &User) -> AppResult<()>;

    async fn update_user(&self, user: &User) -> AppResult<()>;

    /// Removes the account and any request links still pointing at it.
    async fn delete_user(&self, id: SubscriberId) -> AppResult<()>;

    async fn ping(&self) -> AppResult<()>;

    fn backend_name(&self) -> &'static str;
}
