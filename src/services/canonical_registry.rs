//! Content key -> shared canonical request plus the set of its holders.
//!
//! Pure in-memory bookkeeping. Persistence ordering and locking live in
//! `RequestRepository`; mutators here are crate-private so the registry can
//! only move in lock-step with the subscriber index.

use std::collections::{BTreeSet, HashMap};

use crate::{
    error::{AppError, AppResult},
    models::{CanonicalRequest, ContentKey, RequestContent, RequestId, SubscriberId, UserRequest},
};

#[derive(Debug, Clone)]
pub struct CanonicalEntry {
    pub request: CanonicalRequest,
    pub members: BTreeSet<SubscriberId>,
}

#[derive(Debug, Default)]
pub struct CanonicalRegistry {
    entries: HashMap<ContentKey, CanonicalEntry>,
    ids: HashMap<RequestId, ContentKey>,
}

/// What removing a member did to the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    Retained,
    Evicted,
}

impl CanonicalRegistry {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &ContentKey) -> Option<&CanonicalEntry> {
        self.entries.get(key)
    }

    pub fn key_of(&self, id: RequestId) -> Option<&ContentKey> {
        self.ids.get(&id)
    }

    pub fn get_by_id(&self, id: RequestId) -> Option<&CanonicalEntry> {
        self.ids.get(&id).and_then(|k| self.entries.get(k))
    }

    pub fn lookup_by_content(&self, content: &RequestContent) -> Option<&CanonicalRequest> {
        self.entries.get(&content.content_key()).map(|e| &e.request)
    }

    pub fn members_of(&self, key: &ContentKey) -> Option<&BTreeSet<SubscriberId>> {
        self.entries.get(key).map(|e| &e.members)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&ContentKey, &CanonicalEntry)> {
        self.entries.iter()
    }

    pub fn requests(&self) -> impl Iterator<Item = &CanonicalRequest> {
        self.entries.values().map(|e| &e.request)
    }

    pub(crate) fn ids(&self) -> impl Iterator<Item = (&RequestId, &ContentKey)> {
        self.ids.iter()
    }

    /// Adds `subscriber` to the class of `request`, creating the entry under
    /// `request.id` if the class is new. The caller must already have
    /// rewritten `request.id` to the canonical id for existing classes.
    pub(crate) fn insert_member(
        &mut self,
        subscriber: SubscriberId,
        request: &UserRequest,
    ) -> AppResult<()> {
        let key = request.content_key();
        match self.entries.get_mut(&key) {
            Some(entry) => {
                if entry.request.id != request.id {
                    return Err(AppError::InvariantViolation(format!(
                        "request {} is content-equal to canonical {} but carries another id",
                        request.id, entry.request.id
                    )));
                }
                entry.members.insert(subscriber);
            }
            None => {
                if let Some(other) = self.ids.get(&request.id) {
                    return Err(AppError::InvariantViolation(format!(
                        "id {} already names a different request on {}",
                        request.id,
                        other.symbol()
                    )));
                }
                self.ids.insert(request.id, key.clone());
                self.entries.insert(
                    key,
                    CanonicalEntry {
                        request: CanonicalRequest::from(request),
                        members: BTreeSet::from([subscriber]),
                    },
                );
            }
        }
        Ok(())
    }

    /// `None` when the key is unknown or `subscriber` was not a member.
    pub(crate) fn remove_member(
        &mut self,
        subscriber: SubscriberId,
        key: &ContentKey,
    ) -> Option<Release> {
        let entry = self.entries.get_mut(key)?;
        if !entry.members.remove(&subscriber) {
            return None;
        }
        if !entry.members.is_empty() {
            return Some(Release::Retained);
        }
        let id = entry.request.id;
        self.entries.remove(key);
        self.ids.remove(&id);
        Some(Release::Evicted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConditionPayload, Direction, Symbol};

    fn req(id: i64, target_price: f64) -> UserRequest {
        UserRequest::new(
            RequestId(id),
            RequestContent::new(
                Symbol::parse("BTCUSDT").unwrap(),
                ConditionPayload::PriceTarget { target_price },
                Direction::UpTo,
            ),
        )
    }

    #[test]
    fn last_member_out_evicts() {
        let mut reg = CanonicalRegistry::default();
        assert!(reg.is_empty());

        let r = req(1, 70000.0);
        reg.insert_member(SubscriberId(1), &r).unwrap();
        reg.insert_member(SubscriberId(2), &r).unwrap();
        assert_eq!(reg.len(), 1);

        let key = r.content_key();
        assert_eq!(reg.remove_member(SubscriberId(1), &key), Some(Release::Retained));
        assert_eq!(reg.remove_member(SubscriberId(1), &key), None);
        assert_eq!(reg.remove_member(SubscriberId(2), &key), Some(Release::Evicted));
        assert!(reg.is_empty());
        assert!(reg.get_by_id(RequestId(1)).is_none());
    }

    #[test]
    fn mismatched_ids_are_refused() {
        let mut reg = CanonicalRegistry::default();
        reg.insert_member(SubscriberId(1), &req(1, 70000.0)).unwrap();

        let same_content_other_id = reg.insert_member(SubscriberId(2), &req(2, 70000.0));
        assert!(matches!(same_content_other_id, Err(AppError::InvariantViolation(_))));

        let reused_id = reg.insert_member(SubscriberId(2), &req(1, 1.0));
        assert!(matches!(reused_id, Err(AppError::InvariantViolation(_))));
        assert_eq!(reg.len(), 1);
    }
}
