//! Subscription dedup and reference counting.
//!
//! One `tokio::sync::RwLock` guards the canonical registry and the subscriber
//! index together. Mutations take the write half, write to the gateway
//! first and only then touch memory, so a failed or cancelled storage call
//! leaves memory as it was. A committed write whose memory update never ran
//! (caller dropped the future at the await) is picked up by `reload`.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use super::{
    canonical_registry::{CanonicalRegistry, Release},
    id_minter::IdMinter,
    persistence::PersistenceGateway,
    query_collapser::{compute_server_queries, UpstreamQueries},
    subscriber_index::SubscriberIndex,
};
use crate::{
    error::{AppError, AppResult},
    models::{CanonicalRequest, ContentKey, RequestContent, RequestId, SubscriberId, UserRequest},
};

#[derive(Debug, Default)]
pub struct RegistryState {
    pub canonical: CanonicalRegistry,
    pub index: SubscriberIndex,
}

impl RegistryState {
    fn apply_subscribe(&mut self, subscriber: SubscriberId, request: UserRequest) -> AppResult<()> {
        self.canonical.insert_member(subscriber, &request)?;
        self.index.add(subscriber, request);
        Ok(())
    }

    fn apply_unsubscribe(
        &mut self,
        subscriber: SubscriberId,
        key: &ContentKey,
    ) -> AppResult<(UserRequest, Release)> {
        let released = self.canonical.remove_member(subscriber, key);
        let held = self.index.remove(subscriber, key);
        match (held, released) {
            (Some(request), Some(release)) => Ok((request, release)),
            (held, released) => Err(AppError::InvariantViolation(format!(
                "subscriber {subscriber} out of step on {}: held={} member={}",
                key.symbol(),
                held.is_some(),
                released.is_some()
            ))),
        }
    }

    /// Cross-checks registry membership against the index.
    pub fn check_invariants(&self) -> Result<(), String> {
        for (key, entry) in self.canonical.entries() {
            let id = entry.request.id;
            if entry.members.is_empty() {
                return Err(format!("canonical {id} has no members"));
            }
            if self.canonical.key_of(id) != Some(key) {
                return Err(format!("id map does not point back at canonical {id}"));
            }
            for s in &entry.members {
                match self.index.get(*s, key) {
                    Some(r) if r.id == id => {}
                    Some(r) => {
                        return Err(format!(
                            "subscriber {s} holds {} for canonical {id}",
                            r.id
                        ));
                    }
                    None => {
                        return Err(format!("subscriber {s} is a member of {id} but holds nothing"));
                    }
                }
            }
        }

        for (s, held) in self.index.subscribers() {
            if held.is_empty() {
                return Err(format!("subscriber {s} indexed with no requests"));
            }
            for (key, r) in held {
                match self.canonical.get(key) {
                    Some(e) if e.members.contains(s) => {}
                    Some(e) => {
                        return Err(format!(
                            "subscriber {s} holds {} but is not a member",
                            e.request.id
                        ));
                    }
                    None => {
                        return Err(format!(
                            "subscriber {s} holds {} with no canonical entry",
                            r.id
                        ));
                    }
                }
            }
        }

        if self.canonical.ids().count() != self.canonical.len() {
            return Err("id map and canonical map differ in size".into());
        }
        Ok(())
    }

    fn dump(&self) -> String {
        format!("{self:#?}")
    }
}

fn report(state: &RegistryState, err: AppError) -> AppError {
    if let AppError::InvariantViolation(msg) = &err {
        error!(state = %state.dump(), "invariant violation: {msg}");
    }
    err
}

pub struct RequestRepository {
    state: RwLock<RegistryState>,
    gateway: Arc<dyn PersistenceGateway>,
    ids: IdMinter,
}

impl RequestRepository {
    /// Empty registry; call `reload` to pull in what storage already has.
    pub fn new(gateway: Arc<dyn PersistenceGateway>) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            gateway,
            ids: IdMinter::new(),
        }
    }

    pub async fn load(gateway: Arc<dyn PersistenceGateway>) -> AppResult<Self> {
        let repo = Self::new(gateway);
        repo.reload().await?;
        Ok(repo)
    }

    pub fn gateway(&self) -> &Arc<dyn PersistenceGateway> {
        &self.gateway
    }

    /// Rebuilds registry and index from storage. Content-equal rows stored
    /// under different ids are folded onto the lowest id: each holder of a
    /// later row is relinked under the lowest id in storage and its old link
    /// dropped, so every holder in memory is stored under the id it carries.
    pub async fn reload(&self) -> AppResult<usize> {
        let mut state = self.state.write().await;

        let mut rows = self.gateway.load_all_requests().await?;
        rows.sort_by_key(|(s, r)| (r.id, *s));

        let mut fresh = RegistryState::default();
        let mut merged = 0usize;
        for (subscriber, mut request) in rows {
            self.ids.observe(request.id);
            let key = request.content_key();
            let already_held = fresh.index.get(subscriber, &key).is_some();

            let canonical_id = fresh.canonical.get(&key).map(|e| e.request.id);
            if let Some(canonical_id) = canonical_id.filter(|id| *id != request.id) {
                let stored_id = request.id;
                error!(
                    %subscriber,
                    %stored_id,
                    %canonical_id,
                    "invariant violation: content-equal rows stored under different ids, relinking"
                );
                request.id = canonical_id;
                if !already_held {
                    self.gateway.insert_subscriber_link(subscriber, &request).await?;
                }
                self.gateway.delete_request(subscriber, stored_id).await?;
                merged += 1;
            }
            if already_held {
                continue;
            }
            if let Err(e) = fresh.apply_subscribe(subscriber, request) {
                error!(%subscriber, error = %e, "skipping stored request row");
            }
        }

        let count = fresh.canonical.len();
        *state = fresh;
        info!(
            backend = self.gateway.backend_name(),
            canonical = count,
            subscribers = state.index.subscriber_count(),
            merged,
            "request registry rehydrated"
        );
        Ok(count)
    }

    /// Registers `content` for `subscriber`. Content already known to the
    /// registry is merged: the returned request carries the existing id.
    /// Subscribing twice to the same content returns the held request.
    pub async fn subscribe(
        &self,
        subscriber: SubscriberId,
        content: RequestContent,
    ) -> AppResult<UserRequest> {
        content.payload.validate()?;
        let key = content.content_key();
        let mut state = self.state.write().await;

        if let Some(held) = state.index.get(subscriber, &key).cloned() {
            let member = state
                .canonical
                .members_of(&key)
                .is_some_and(|m| m.contains(&subscriber));
            if !member {
                let err = AppError::InvariantViolation(format!(
                    "subscriber {subscriber} holds {} without membership",
                    held.id
                ));
                return Err(report(&state, err));
            }
            debug!(%subscriber, id = %held.id, "already subscribed");
            return Ok(held);
        }

        let existing = state.canonical.get(&key).map(|e| e.request.id);
        let request = match existing {
            Some(id) => {
                let request = UserRequest::new(id, content);
                self.gateway
                    .insert_subscriber_link(subscriber, &request)
                    .await
                    .inspect_err(|e| warn!(%subscriber, %id, error = %e, "link write failed"))?;
                request
            }
            None => {
                let request = UserRequest::new(self.ids.next(), content);
                self.gateway
                    .insert_request(subscriber, &request)
                    .await
                    .inspect_err(|e| {
                        warn!(%subscriber, id = %request.id, error = %e, "request write failed")
                    })?;
                request
            }
        };

        if let Err(e) = state.apply_subscribe(subscriber, request.clone()) {
            return Err(report(&state, e));
        }
        debug!(
            %subscriber,
            id = %request.id,
            symbol = %request.content.symbol,
            kind = request.content.payload.kind(),
            merged = existing.is_some(),
            "subscribed"
        );
        Ok(request)
    }

    pub async fn unsubscribe(&self, subscriber: SubscriberId, id: RequestId) -> AppResult<UserRequest> {
        let mut state = self.state.write().await;
        let key = state
            .canonical
            .key_of(id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("request {id}")))?;
        self.release(&mut state, subscriber, &key).await
    }

    /// Same as `unsubscribe`, addressed by content instead of id.
    pub async fn unsubscribe_content(
        &self,
        subscriber: SubscriberId,
        content: &RequestContent,
    ) -> AppResult<UserRequest> {
        let mut state = self.state.write().await;
        self.release(&mut state, subscriber, &content.content_key()).await
    }

    /// Drops every request `subscriber` holds. Each request is released on
    /// its own (storage, then memory), so a failure part-way leaves the
    /// already-released ones gone from both and the rest untouched.
    pub async fn remove_subscriber(&self, subscriber: SubscriberId) -> AppResult<Vec<UserRequest>> {
        let mut state = self.state.write().await;
        let keys = state.index.keys_of(subscriber);

        let mut dropped = Vec::with_capacity(keys.len());
        for key in &keys {
            match self.release(&mut state, subscriber, key).await {
                Ok(r) => dropped.push(r),
                Err(e) => {
                    warn!(
                        %subscriber,
                        released = dropped.len(),
                        remaining = keys.len() - dropped.len(),
                        error = %e,
                        "subscriber removal stopped part-way"
                    );
                    return Err(e);
                }
            }
        }
        info!(%subscriber, released = dropped.len(), "subscriber removed from registry");
        Ok(dropped)
    }

    async fn release(
        &self,
        state: &mut RegistryState,
        subscriber: SubscriberId,
        key: &ContentKey,
    ) -> AppResult<UserRequest> {
        let id = match state.canonical.get(key) {
            Some(e) if e.members.contains(&subscriber) => e.request.id,
            Some(e) => {
                return Err(AppError::NotFound(format!(
                    "subscriber {subscriber} does not hold request {}",
                    e.request.id
                )));
            }
            None => {
                return Err(AppError::NotFound(format!(
                    "no request on {} for subscriber {subscriber}",
                    key.symbol()
                )));
            }
        };

        if let Err(e) = self.gateway.delete_request(subscriber, id).await {
            warn!(%subscriber, %id, error = %e, "delete write failed");
            return Err(match e {
                AppError::NotFound(msg) => report(
                    state,
                    AppError::InvariantViolation(format!(
                        "registry has {subscriber} on {id} but storage does not: {msg}"
                    )),
                ),
                other => other,
            });
        }

        match state.apply_unsubscribe(subscriber, key) {
            Ok((request, release)) => {
                debug!(
                    %subscriber,
                    %id,
                    evicted = release == Release::Evicted,
                    "unsubscribed"
                );
                Ok(request)
            }
            Err(e) => Err(report(state, e)),
        }
    }

    pub async fn get_requests_for_subscriber(&self, subscriber: SubscriberId) -> Option<Vec<UserRequest>> {
        self.state.read().await.index.requests_of(subscriber)
    }

    pub async fn get_user_request(&self, subscriber: SubscriberId, id: RequestId) -> Option<UserRequest> {
        self.state.read().await.index.find_by_id(subscriber, id).cloned()
    }

    /// Every subscriber with the requests it holds, ordered by id.
    pub async fn get_all_requests(&self) -> BTreeMap<SubscriberId, Vec<UserRequest>> {
        self.state.read().await.index.all()
    }

    pub async fn get_subscribers_for_request(&self, id: RequestId) -> Option<BTreeSet<SubscriberId>> {
        self.state
            .read()
            .await
            .canonical
            .get_by_id(id)
            .map(|e| e.members.clone())
    }

    pub async fn members_of(&self, content: &RequestContent) -> Option<BTreeSet<SubscriberId>> {
        self.state
            .read()
            .await
            .canonical
            .members_of(&content.content_key())
            .cloned()
    }

    pub async fn lookup_by_content(&self, content: &RequestContent) -> Option<CanonicalRequest> {
        self.state
            .read()
            .await
            .canonical
            .lookup_by_content(content)
            .cloned()
    }

    /// Served from memory, falling back to storage for ids not cached.
    pub async fn lookup_by_id(&self, id: RequestId) -> AppResult<Option<CanonicalRequest>> {
        let cached = self
            .state
            .read()
            .await
            .canonical
            .get_by_id(id)
            .map(|e| e.request.clone());
        if cached.is_some() {
            return Ok(cached);
        }
        self.gateway.find_request(id).await
    }

    pub async fn get_all_canonical_requests(&self) -> Vec<CanonicalRequest> {
        let state = self.state.read().await;
        let mut all: Vec<CanonicalRequest> = state.canonical.requests().cloned().collect();
        all.sort_by_key(|r| r.id);
        all
    }

    pub async fn get_upstream_queries(&self) -> UpstreamQueries {
        let state = self.state.read().await;
        compute_server_queries(state.canonical.requests())
    }

    pub async fn canonical_count(&self) -> usize {
        self.state.read().await.canonical.len()
    }

    pub async fn verify(&self) -> AppResult<()> {
        let state = self.state.read().await;
        state
            .check_invariants()
            .map_err(|msg| report(&state, AppError::InvariantViolation(msg)))
    }
}
