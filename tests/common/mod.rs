#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rustalerts::{
    error::{AppError, AppResult},
    models::{
        CanonicalRequest, ConditionPayload, Direction, Period, RequestContent, RequestId,
        SubscriberId, Symbol, User, UserRequest,
    },
    services::{MemoryStore, PersistenceGateway, RequestRepository},
};

pub fn content(sym: &str, payload: ConditionPayload, direction: Direction) -> RequestContent {
    RequestContent::new(Symbol::parse(sym).unwrap(), payload, direction)
}

pub fn price(target_price: f64) -> ConditionPayload {
    ConditionPayload::PriceTarget { target_price }
}

pub fn point(target_percent: f64, reference_price: f64) -> ConditionPayload {
    ConditionPayload::PercentFromPoint {
        target_percent,
        reference_price,
    }
}

pub fn over(target_percent: f64, period: Period) -> ConditionPayload {
    ConditionPayload::PercentOverPeriod {
        target_percent,
        period,
    }
}

pub fn user(id: i64) -> User {
    User::new(SubscriberId(id), "Test", "User", &format!("user{id}"))
}

/// `MemoryStore` whose writes can be made to fail. `budget` is the number
/// of writes still allowed; `None` means unlimited.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    budget: Mutex<Option<usize>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_writes(&self, n: Option<usize>) {
        *self.budget.lock().unwrap() = n;
    }

    fn spend(&self) -> AppResult<()> {
        let mut budget = self.budget.lock().unwrap();
        match budget.as_mut() {
            None => Ok(()),
            Some(0) => Err(AppError::Persistence("injected write failure".into())),
            Some(n) => {
                *n -= 1;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl PersistenceGateway for FlakyStore {
    async fn load_all_requests(&self) -> AppResult<Vec<(SubscriberId, UserRequest)>> {
        self.inner.load_all_requests().await
    }

    async fn find_request(&self, id: RequestId) -> AppResult<Option<CanonicalRequest>> {
        self.inner.find_request(id).await
    }

    async fn insert_request(&self, subscriber: SubscriberId, request: &UserRequest) -> AppResult<()> {
        self.spend()?;
        self.inner.insert_request(subscriber, request).await
    }

    async fn insert_subscriber_link(
        &self,
        subscriber: SubscriberId,
        request: &UserRequest,
    ) -> AppResult<()> {
        self.spend()?;
        self.inner.insert_subscriber_link(subscriber, request).await
    }

    async fn delete_request(&self, subscriber: SubscriberId, id: RequestId) -> AppResult<()> {
        self.spend()?;
        self.inner.delete_request(subscriber, id).await
    }

    async fn load_all_users(&self) -> AppResult<Vec<User>> {
        self.inner.load_all_users().await
    }

    async fn insert_user(&self, user: &User) -> AppResult<()> {
        self.spend()?;
        self.inner.insert_user(user).await
    }

    async fn update_user(&self, user: &User) -> AppResult<()> {
        self.spend()?;
        self.inner.update_user(user).await
    }

    async fn delete_user(&self, id: SubscriberId) -> AppResult<()> {
        self.spend()?;
        self.inner.delete_user(id).await
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "flaky-memory"
    }
}

pub fn memory_repo() -> (Arc<MemoryStore>, RequestRepository) {
    let store = Arc::new(MemoryStore::new());
    let repo = RequestRepository::new(store.clone());
    (store, repo)
}

pub fn flaky_repo() -> (Arc<FlakyStore>, RequestRepository) {
    let store = Arc::new(FlakyStore::new());
    let repo = RequestRepository::new(store.clone());
    (store, repo)
}
