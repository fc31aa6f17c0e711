//! Coarse delivery-phase classification.
//!
//! Ordered, first-match-wins regex rules over the lowercased status
//! headline. An unmatched headline yields `None` and the caller keeps
//! whatever phase it already knew; the classifier never regresses a
//! phase on its own. It also enforces no ordering between phases.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse delivery stage of a tracked order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Preparing,
    Heading,
    AlmostHere,
    Delivered,
}

impl Phase {
    /// Human-readable label used in chat messages.
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Preparing => "Preparing",
            Phase::Heading => "Heading your way",
            Phase::AlmostHere => "Almost there",
            Phase::Delivered => "Delivered",
        }
    }

    /// Stable storage key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Preparing => "preparing",
            Phase::Heading => "heading",
            Phase::AlmostHere => "almost_here",
            Phase::Delivered => "delivered",
        }
    }

    /// Inverse of [`Phase::as_str`]; unknown keys map to `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "preparing" => Some(Phase::Preparing),
            "heading" => Some(Phase::Heading),
            "almost_here" => Some(Phase::AlmostHere),
            "delivered" => Some(Phase::Delivered),
            _ => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

lazy_static! {
    static ref RE_PREPARING: Regex = Regex::new(
        r"received|prepar|confirm|waiting for the store|getting (?:your )?order ready"
    )
    .unwrap();
    static ref RE_HEADING: Regex = Regex::new(r"heading\b.*\bway|on the way").unwrap();
    static ref RE_ALMOST: Regex =
        Regex::new(r"almost there|nearby|\bhere\b|arriving").unwrap();
    static ref RE_DELIVERED: Regex = Regex::new(r"delivered|order arrived").unwrap();
}

/// Classify a status headline into a coarse phase.
///
/// Returns `None` for an absent or unrecognized headline.
pub fn classify(headline: Option<&str>) -> Option<Phase> {
    let text = headline?.to_lowercase();

    if RE_PREPARING.is_match(&text) {
        Some(Phase::Preparing)
    } else if RE_HEADING.is_match(&text) {
        Some(Phase::Heading)
    } else if RE_ALMOST.is_match(&text) {
        Some(Phase::AlmostHere)
    } else if RE_DELIVERED.is_match(&text) {
        Some(Phase::Delivered)
    } else {
        None
    }
}
