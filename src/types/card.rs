//! The structured payload published to the chat channel.
//!
//! The chat-platform formatting layer turns an [`OrderCard`] into a
//! displayed message; this crate only cares about its content and the
//! fingerprint used to skip no-op edits.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::phase::Phase;
use crate::types::snapshot::ScrapeSnapshot;

/// Which template the formatting layer should render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardKind {
    /// Placeholder published before the first successful cycle.
    Starting,
    /// Regular tracking update.
    Tracking,
    /// Terminal delivered template.
    Delivered,
    /// The tracked page requires authentication; tracking stopped.
    LoginWall,
}

/// Content of one published display message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCard {
    pub kind: CardKind,
    pub branding: String,
    pub status: Option<String>,
    pub phase: Option<Phase>,
    pub customer: Option<String>,
    pub store: Option<String>,
    pub address: Option<String>,
    pub unit: Option<String>,
    pub delivery_kind: Option<String>,
    pub note: Option<String>,
    pub items: Vec<String>,
}

impl OrderCard {
    /// The "starting" placeholder shown until the first scrape lands.
    pub fn placeholder(branding: impl Into<String>) -> Self {
        Self {
            kind: CardKind::Starting,
            branding: branding.into(),
            status: Some("Starting tracking…".to_string()),
            phase: None,
            customer: None,
            store: None,
            address: None,
            unit: None,
            delivery_kind: None,
            note: None,
            items: Vec::new(),
        }
    }

    /// Build the card for a successful scrape.
    ///
    /// `customer` is the latched name, which may outlive the snapshot's
    /// own reading. Delivered snapshots get the terminal template.
    pub fn from_snapshot(
        branding: impl Into<String>,
        snapshot: &ScrapeSnapshot,
        customer: Option<String>,
        phase: Option<Phase>,
        delivered: bool,
    ) -> Self {
        Self {
            kind: if delivered {
                CardKind::Delivered
            } else {
                CardKind::Tracking
            },
            branding: branding.into(),
            status: snapshot.status_text(),
            phase,
            customer,
            store: snapshot.store.clone(),
            address: snapshot.address.clone(),
            unit: snapshot.unit.clone(),
            delivery_kind: snapshot.delivery_kind.clone(),
            note: snapshot.note.clone(),
            items: snapshot.items.clone(),
        }
    }

    /// Terminal notice shown when the page demands a login.
    pub fn login_wall(branding: impl Into<String>) -> Self {
        Self {
            kind: CardKind::LoginWall,
            branding: branding.into(),
            status: Some("The order page now requires a login; tracking stopped.".to_string()),
            phase: None,
            customer: None,
            store: None,
            address: None,
            unit: None,
            delivery_kind: None,
            note: None,
            items: Vec::new(),
        }
    }

    /// Deterministic plain-text rendering of the card content.
    ///
    /// This is what gets fingerprinted, so two cards render identically
    /// exactly when no visible field changed.
    pub fn render_text(&self) -> String {
        let mut lines = Vec::new();
        lines.push(format!("{} [{:?}]", self.branding, self.kind));
        if let Some(phase) = self.phase {
            lines.push(format!("Phase: {phase}"));
        }
        if let Some(status) = &self.status {
            lines.push(format!("Status: {status}"));
        }
        if let Some(customer) = &self.customer {
            lines.push(format!("For: {customer}"));
        }
        if let Some(store) = &self.store {
            lines.push(format!("From: {store}"));
        }
        if let Some(address) = &self.address {
            lines.push(format!("Address: {address}"));
        }
        if let Some(unit) = &self.unit {
            lines.push(format!("Unit: {unit}"));
        }
        if let Some(kind) = &self.delivery_kind {
            lines.push(format!("Delivery: {kind}"));
        }
        if let Some(note) = &self.note {
            lines.push(format!("Note: {note}"));
        }
        for item in &self.items {
            lines.push(format!("- {item}"));
        }
        lines.join("\n")
    }

    /// SHA-256 over the rendered payload, hex-encoded.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.render_text().as_bytes());
        hex::encode(hasher.finalize())
    }
}
