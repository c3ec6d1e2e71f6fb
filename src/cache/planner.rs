//! Conditional request planning.
//!
//! Decides, from the stored record alone, whether a URL needs a network
//! round trip and which validators to send with it. Never performs I/O.

use reqwest::header::{HeaderMap, HeaderValue, IF_MODIFIED_SINCE, IF_NONE_MATCH};

use super::Meta;

/// Validators to attach to a GET.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionalHeaders {
    /// Sent as `If-None-Match`.
    pub if_none_match: Option<String>,
    /// Sent as `If-Modified-Since`.
    pub if_modified_since: Option<String>,
}

impl ConditionalHeaders {
    /// Whether the request will be conditional.
    pub fn is_conditional(&self) -> bool {
        self.if_none_match.is_some() || self.if_modified_since.is_some()
    }

    /// Build request headers, skipping values that are not valid header text.
    pub fn to_header_map(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(value) = self
            .if_none_match
            .as_deref()
            .and_then(|v| HeaderValue::from_str(v).ok())
        {
            headers.insert(IF_NONE_MATCH, value);
        }
        if let Some(value) = self
            .if_modified_since
            .as_deref()
            .and_then(|v| HeaderValue::from_str(v).ok())
        {
            headers.insert(IF_MODIFIED_SINCE, value);
        }
        headers
    }
}

/// What to do for one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchPlan {
    /// The stored record is still fresh; no request.
    Skip,
    /// Issue a GET with these validators (empty for an unconditional GET).
    FetchWith(ConditionalHeaders),
}

/// Decide how to refresh a URL given its prior record and the current time.
///
/// # Example
///
/// ```
/// use cached_http_fetcher::cache::{plan, FetchPlan, Meta};
///
/// let meta = Meta::uncacheable(100, 60);
/// assert_eq!(plan(Some(&meta), 120), FetchPlan::Skip);
/// assert!(matches!(plan(Some(&meta), 160), FetchPlan::FetchWith(_)));
/// ```
pub fn plan(prior: Option<&Meta>, now: i64) -> FetchPlan {
    let Some(meta) = prior else {
        return FetchPlan::FetchWith(ConditionalHeaders::default());
    };

    if meta.is_fresh(now) {
        return FetchPlan::Skip;
    }

    FetchPlan::FetchWith(ConditionalHeaders {
        if_none_match: meta.etag.clone(),
        if_modified_since: meta.last_modified.clone(),
    })
}
