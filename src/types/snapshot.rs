//! The result of one extraction pass over order-page markup.

use serde::{Deserialize, Serialize};

/// Maximum number of cart line items kept per snapshot.
pub const MAX_CART_ITEMS: usize = 12;

/// Structured data pulled from one render of the order-status page.
///
/// Transient: only the phase and payload fingerprint derived from a
/// snapshot are persisted. Every field except the two booleans is
/// optional; the extraction engine degrades to absent fields rather
/// than failing or fabricating values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeSnapshot {
    /// First line of the status widget.
    pub headline: Option<String>,

    /// Estimated-arrival line of the status widget.
    pub eta: Option<String>,

    /// Store the order was placed with.
    pub store: Option<String>,

    /// Customer first name pulled from the headline.
    pub customer: Option<String>,

    /// Street address, verbatim when a node matches the postal pattern.
    pub address: Option<String>,

    /// Apartment/suite/unit text.
    pub unit: Option<String>,

    /// Drop-off manner and/or delivery speed, joined when both are found.
    pub delivery_kind: Option<String>,

    /// Free-text note left by the customer.
    pub note: Option<String>,

    /// Cart line items, `name — detail` per line, capped at [`MAX_CART_ITEMS`].
    pub items: Vec<String>,

    /// The page shows the order as delivered.
    pub delivered: bool,

    /// The page navigated to an authentication domain instead of the
    /// order view. Set by the session pool, never derived from markup.
    pub login_required: bool,
}

impl ScrapeSnapshot {
    /// Snapshot representing a login wall: no data, tracking impossible.
    pub fn login_wall() -> Self {
        Self {
            login_required: true,
            ..Self::default()
        }
    }

    /// Headline and ETA joined; the status string used everywhere a
    /// status is displayed or matched.
    pub fn status_text(&self) -> Option<String> {
        match (&self.headline, &self.eta) {
            (Some(h), Some(e)) => Some(format!("{h} {e}")),
            (Some(h), None) => Some(h.clone()),
            (None, Some(e)) => Some(e.clone()),
            (None, None) => None,
        }
    }
}
