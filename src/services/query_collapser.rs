use std::collections::{btree_map::Entry, BTreeMap};

use serde::Serialize;

use crate::models::{CanonicalRequest, ServerQuery};

/// The provider-facing workload and what it costs per polling round.
#[derive(Debug, Clone, Serialize)]
pub struct UpstreamQueries {
    pub queries: Vec<ServerQuery>,
    pub total_weight: u32,
}

/// Collapses canonical requests by server key and sums the weight of each
/// distinct key once. Which request ends up representing a key depends on
/// iteration order; the count and the weight do not.
pub fn compute_server_queries<'a, I>(requests: I) -> UpstreamQueries
where
    I: IntoIterator<Item = &'a CanonicalRequest>,
{
    let mut seen = BTreeMap::new();
    let mut total_weight = 0;

    for request in requests {
        let query = ServerQuery::from(request);
        if let Entry::Vacant(slot) = seen.entry(query.server_key()) {
            total_weight += query.weight();
            slot.insert(query);
        }
    }

    UpstreamQueries {
        queries: seen.into_values().collect(),
        total_weight,
    }
}
