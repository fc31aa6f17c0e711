//! Operator command surface.
//!
//! The chat-command layer calls [`validate_order_url`] before handing a
//! link to [`crate::scheduler::Tracker::start`]; anything that is not a
//! public order-status page is rejected up front with a message the
//! command handler can echo back verbatim.

use lazy_static::lazy_static;
use regex::Regex;
use url::Url;

use crate::error::{Result, TrackError};

lazy_static! {
    /// Public order-status page: an `orders/<uuid>` path on the delivery
    /// platform's main site or its dedicated tracking host.
    static ref RE_ORDER_PATH: Regex = Regex::new(
        r"^/orders/[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}(?:/track)?/?$",
    )
    .expect("order path regex");
}

const ORDER_HOSTS: &[&str] = &["doordash.com", "www.doordash.com", "track.doordash.com"];

/// Check that `raw` is a public order-status link.
///
/// Returns the normalized URL string on success, so jobs always persist
/// a canonical form regardless of how the operator pasted the link.
pub fn validate_order_url(raw: &str) -> Result<String> {
    let reject = || TrackError::InvalidOrderUrl {
        url: raw.to_string(),
    };

    let url = Url::parse(raw.trim()).map_err(|_| reject())?;
    if url.scheme() != "https" {
        return Err(reject());
    }
    let host = url.host_str().ok_or_else(reject)?;
    if !ORDER_HOSTS.contains(&host) {
        return Err(reject());
    }
    if !RE_ORDER_PATH.is_match(url.path()) {
        return Err(reject());
    }
    Ok(url.to_string())
}
