use std::collections::{BTreeMap, HashMap};

use crate::models::{ContentKey, RequestId, SubscriberId, UserRequest};

/// Inverse of the canonical registry: who holds what.
#[derive(Debug, Default)]
pub struct SubscriberIndex {
    by_subscriber: HashMap<SubscriberId, HashMap<ContentKey, UserRequest>>,
}

impl SubscriberIndex {
    pub fn get(&self, subscriber: SubscriberId, key: &ContentKey) -> Option<&UserRequest> {
        self.by_subscriber.get(&subscriber)?.get(key)
    }

    pub fn find_by_id(&self, subscriber: SubscriberId, id: RequestId) -> Option<&UserRequest> {
        self.by_subscriber
            .get(&subscriber)?
            .values()
            .find(|r| r.id == id)
    }

    /// Held requests ordered by id, `None` for a subscriber holding nothing.
    pub fn requests_of(&self, subscriber: SubscriberId) -> Option<Vec<UserRequest>> {
        let held = self.by_subscriber.get(&subscriber)?;
        let mut out: Vec<UserRequest> = held.values().cloned().collect();
        out.sort_by_key(|r| r.id);
        Some(out)
    }

    pub fn all(&self) -> BTreeMap<SubscriberId, Vec<UserRequest>> {
        self.by_subscriber
            .keys()
            .filter_map(|s| Some((*s, self.requests_of(*s)?)))
            .collect()
    }

    pub fn keys_of(&self, subscriber: SubscriberId) -> Vec<ContentKey> {
        let Some(held) = self.by_subscriber.get(&subscriber) else {
            return Vec::new();
        };
        let mut pairs: Vec<(RequestId, ContentKey)> =
            held.iter().map(|(k, r)| (r.id, k.clone())).collect();
        pairs.sort_by_key(|(id, _)| *id);
        pairs.into_iter().map(|(_, k)| k).collect()
    }

    pub fn subscribers(&self) -> impl Iterator<Item = (&SubscriberId, &HashMap<ContentKey, UserRequest>)> {
        self.by_subscriber.iter()
    }

    pub fn subscriber_count(&self) -> usize {
        self.by_subscriber.len()
    }

    pub(crate) fn add(&mut self, subscriber: SubscriberId, request: UserRequest) {
        self.by_subscriber
            .entry(subscriber)
            .or_default()
            .insert(request.content_key(), request);
    }

    pub(crate) fn remove(&mut self, subscriber: SubscriberId, key: &ContentKey) -> Option<UserRequest> {
        let held = self.by_subscriber.get_mut(&subscriber)?;
        let removed = held.remove(key);
        if held.is_empty() {
            self.by_subscriber.remove(&subscriber);
        }
        removed
    }
}
