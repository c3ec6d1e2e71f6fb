//! Values handed between pipeline stages.

use std::collections::BTreeSet;

use crate::cache::Meta;
use crate::fetch::Response;

/// All URLs of one origin, consumed sequentially by a single fetch worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginBatch {
    /// `scheme://host[:port]`.
    pub origin: String,
    pub urls: BTreeSet<String>,
}

/// Output of the fetch stage for one URL, consumed by the commit stage.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// Requested URL; the key the commit stage writes under.
    pub url: String,
    /// Unix seconds when the response arrived.
    pub fetched_at: i64,
    pub response: Response,
    /// Record that was current when the request was planned.
    pub prior_meta: Option<Meta>,
}
