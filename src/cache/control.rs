//! `Cache-Control` parsing and expiry computation.
//!
//! Expiry timestamps are spread with random jitter so entries fetched in the
//! same burst do not all go stale at the same instant. An entry never lives
//! shorter than the configured minimum cache age.

use std::collections::HashMap;

use chrono::DateTime;
use rand::Rng;
use reqwest::header::{HeaderMap, CACHE_CONTROL, EXPIRES};

/// A recognized `Cache-Control` directive token.
///
/// See RFC 7234 section 5.2 and RFC 5861.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Directive {
    MaxAge,
    MaxStale,
    MinFresh,
    NoCache,
    NoStore,
    NoTransform,
    OnlyIfCached,
    MustRevalidate,
    Public,
    Private,
    ProxyRevalidate,
    SMaxAge,
    Immutable,
    StaleWhileRevalidate,
    StaleIfError,
}

/// How a directive's argument is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Argument {
    /// Flag only; any argument is ignored.
    None,
    /// An integer argument may be given.
    Optional,
    /// Dropped unless an integer argument is given.
    Required,
}

impl Directive {
    /// Look up a directive by its (case-insensitive) token.
    pub fn from_token(token: &str) -> Option<Self> {
        let directive = match token.to_ascii_lowercase().as_str() {
            "max-age" => Directive::MaxAge,
            "max-stale" => Directive::MaxStale,
            "min-fresh" => Directive::MinFresh,
            "no-cache" => Directive::NoCache,
            "no-store" => Directive::NoStore,
            "no-transform" => Directive::NoTransform,
            "only-if-cached" => Directive::OnlyIfCached,
            "must-revalidate" => Directive::MustRevalidate,
            "public" => Directive::Public,
            "private" => Directive::Private,
            "proxy-revalidate" => Directive::ProxyRevalidate,
            "s-maxage" => Directive::SMaxAge,
            "immutable" => Directive::Immutable,
            "stale-while-revalidate" => Directive::StaleWhileRevalidate,
            "stale-if-error" => Directive::StaleIfError,
            _ => return None,
        };
        Some(directive)
    }

    /// The canonical token for this directive.
    pub fn token(&self) -> &'static str {
        match self {
            Directive::MaxAge => "max-age",
            Directive::MaxStale => "max-stale",
            Directive::MinFresh => "min-fresh",
            Directive::NoCache => "no-cache",
            Directive::NoStore => "no-store",
            Directive::NoTransform => "no-transform",
            Directive::OnlyIfCached => "only-if-cached",
            Directive::MustRevalidate => "must-revalidate",
            Directive::Public => "public",
            Directive::Private => "private",
            Directive::ProxyRevalidate => "proxy-revalidate",
            Directive::SMaxAge => "s-maxage",
            Directive::Immutable => "immutable",
            Directive::StaleWhileRevalidate => "stale-while-revalidate",
            Directive::StaleIfError => "stale-if-error",
        }
    }

    fn argument(&self) -> Argument {
        match self {
            Directive::MaxAge
            | Directive::MinFresh
            | Directive::SMaxAge
            | Directive::StaleWhileRevalidate
            | Directive::StaleIfError => Argument::Required,
            Directive::MaxStale => Argument::Optional,
            _ => Argument::None,
        }
    }
}

/// Directives parsed from one `Cache-Control` header value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheDirectives {
    directives: HashMap<Directive, Option<i64>>,
}

impl CacheDirectives {
    /// Whether the directive is present, with or without an argument.
    pub fn contains(&self, directive: Directive) -> bool {
        self.directives.contains_key(&directive)
    }

    /// The integer argument of a directive, if present and numeric.
    pub fn value(&self, directive: Directive) -> Option<i64> {
        self.directives.get(&directive).copied().flatten()
    }

    /// Shorthand for the `max-age` argument.
    pub fn max_age(&self) -> Option<i64> {
        self.value(Directive::MaxAge)
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    pub fn len(&self) -> usize {
        self.directives.len()
    }
}

/// Parse a `Cache-Control` header value.
///
/// Unknown tokens and directives with a malformed required argument are
/// dropped; one bad token never fails the whole header.
///
/// # Example
///
/// ```
/// use cached_http_fetcher::cache::{parse_cache_control, Directive};
///
/// let directives = parse_cache_control("public, max-age=600, x-custom");
/// assert!(directives.contains(Directive::Public));
/// assert_eq!(directives.max_age(), Some(600));
/// assert_eq!(directives.len(), 2);
/// ```
pub fn parse_cache_control(header_value: &str) -> CacheDirectives {
    let mut directives = HashMap::new();

    for part in header_value.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        let (key, raw_value) = match part.split_once('=') {
            Some((key, value)) => (key.trim(), Some(value.trim().trim_matches('"'))),
            None => (part, None),
        };

        let Some(directive) = Directive::from_token(key) else {
            continue;
        };

        let value = raw_value.and_then(|v| v.parse::<i64>().ok());
        match directive.argument() {
            Argument::None => {
                directives.insert(directive, None);
            }
            Argument::Optional => {
                directives.insert(directive, value);
            }
            Argument::Required => {
                if value.is_some() {
                    directives.insert(directive, value);
                }
            }
        }
    }

    CacheDirectives { directives }
}

/// Pick a cache lifetime in seconds for a candidate max age.
///
/// A candidate below `min_cache_age` is raised to the floor and widened by up
/// to another `min_cache_age`. Otherwise the lifetime is drawn uniformly from
/// `[min_cache_age, candidate]`.
pub fn jitter<R: Rng + ?Sized>(rng: &mut R, min_cache_age: i64, candidate: i64) -> i64 {
    let min_cache_age = min_cache_age.max(0);
    if candidate < min_cache_age {
        min_cache_age.saturating_add(rng.gen_range(0..=min_cache_age))
    } else {
        rng.gen_range(min_cache_age..=candidate)
    }
}

/// Compute when a response fetched at `now` goes stale, using the thread RNG.
pub fn compute_expiry(now: i64, min_cache_age: i64, headers: &HeaderMap) -> i64 {
    compute_expiry_with_rng(&mut rand::thread_rng(), now, min_cache_age, headers)
}

/// Compute when a response fetched at `now` goes stale.
///
/// Precedence: `no-store`, then `max-age`, then `Expires`. Without any of
/// them (or when the headers are unreadable) the result is exactly
/// `now + min_cache_age`.
pub fn compute_expiry_with_rng<R: Rng + ?Sized>(
    rng: &mut R,
    now: i64,
    min_cache_age: i64,
    headers: &HeaderMap,
) -> i64 {
    let min_cache_age = min_cache_age.max(0);

    let directives = headers
        .get(CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .map(parse_cache_control)
        .unwrap_or_default();

    if directives.contains(Directive::NoStore) {
        return now.saturating_add(jitter(rng, min_cache_age, 0));
    }

    if let Some(max_age) = directives.max_age() {
        return now.saturating_add(jitter(rng, min_cache_age, max_age));
    }

    if let Some(expires) = headers
        .get(EXPIRES)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_http_date)
    {
        return now.saturating_add(jitter(rng, min_cache_age, expires.saturating_sub(now)));
    }

    now.saturating_add(min_cache_age)
}

/// Parse an RFC 2822 style HTTP date into a unix timestamp.
pub fn parse_http_date(value: &str) -> Option<i64> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|dt| dt.timestamp())
}
