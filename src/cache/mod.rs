//! Cache correctness rules.
//!
//! This module holds the pure parts of the fetch-and-cache pipeline:
//! `Cache-Control`/`Expires` interpretation with jittered expiry in
//! [`control`], the per-URL [`Meta`] record in [`meta`], and the
//! conditional request decision in [`planner`].

pub mod control;
pub mod meta;
pub mod planner;

pub use control::{
    compute_expiry, compute_expiry_with_rng, jitter, parse_cache_control, parse_http_date,
    CacheDirectives, Directive,
};
pub use meta::{content_hash, get_valid_meta, load_meta, store_meta, Meta};
pub use planner::{plan, ConditionalHeaders, FetchPlan};
