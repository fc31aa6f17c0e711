//! HTML-to-snapshot extraction engine.
//!
//! Tuned to one client-rendered order-status page layout. Best-effort
//! by contract: selector and regex heuristics that degrade to absent
//! fields on anything unexpected. Pure and deterministic, so it is
//! testable with literal markup fixtures.

use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::extract::sanitize::{
    clean, MAX_ADDRESS, MAX_DELIVERY, MAX_ITEM, MAX_NAME, MAX_NOTE, MAX_STATUS, MAX_STORE,
    MAX_UNIT,
};
use crate::types::snapshot::{ScrapeSnapshot, MAX_CART_ITEMS};

/// Longest text node considered when scanning for the store name.
const STORE_SCAN_MAX_LEN: usize = 80;

lazy_static! {
    // Page anchors. The order page is a client-rendered app with stable
    // test ids; everything below is scoped to one of these containers.
    static ref SEL_STATUS: Selector =
        Selector::parse("[data-testid='order-tracker-status']").unwrap();
    static ref SEL_ADDRESS: Selector =
        Selector::parse("[data-testid='delivery-address']").unwrap();
    static ref SEL_DETAILS: Selector =
        Selector::parse("[data-testid='delivery-details']").unwrap();
    static ref SEL_OPTIONS: Selector =
        Selector::parse("[data-testid='delivery-options']").unwrap();
    static ref SEL_ITEM: Selector =
        Selector::parse("[data-testid='order-line-item']").unwrap();
    static ref SEL_ITEM_NAME: Selector = Selector::parse("[data-testid='item-name']").unwrap();
    static ref SEL_ITEM_DETAIL: Selector =
        Selector::parse("[data-testid='item-detail']").unwrap();

    static ref RE_ETA: Regex = Regex::new(r"(?i)estimat").unwrap();
    static ref RE_STORE: Regex = Regex::new(r"(?i)^From\s+(.+)$").unwrap();
    static ref RE_CUSTOMER: Regex =
        Regex::new(r"(?i)(?:preparing|picking up|heading)\s+(.+?)['’]s\s+(?:order|way)").unwrap();
    static ref RE_ADDRESS: Regex = Regex::new(
        r"\d+\s+[^,\n]+,\s*[^,\n]+,\s*[A-Z]{2}\s+\d{5}(?:-\d{4})?(?:,\s*(?:US|USA))?"
    )
    .unwrap();
    static ref RE_UNIT_LINE: Regex =
        Regex::new(r"(?i)\b(?:apt|apartment|suite|ste|floor|fl|unit)\b\.?\s*#?\s*\S+").unwrap();
    static ref RE_UNIT_LEAF: Regex =
        Regex::new(r"(?i)^(?:apt|apartment|suite|ste|floor|fl|unit|#)\b").unwrap();
    static ref RE_MANNER: Regex = Regex::new(
        r"(?i)\b(?:leave (?:it )?at (?:my |the )?door|hand (?:it )?to me|meet at (?:the )?door|meet outside)\b"
    )
    .unwrap();
    static ref RE_SPEED: Regex =
        Regex::new(r"(?i)\b(?:standard|priority|rush|asap|express|economy|saver)\b").unwrap();
    static ref RE_SECTION_LABEL: Regex = Regex::new(
        r"(?i)^(?:delivery (?:details|instructions|options?)|drop-?off (?:options?|preferences?)|address|your details)$"
    )
    .unwrap();
    static ref RE_DELIVERED: Regex = Regex::new(r"(?i)\bdelivered\b|order arrived").unwrap();
    static ref RE_ENJOY: Regex = Regex::new(r"(?i)enjoy your order").unwrap();
    static ref RE_THANKS: Regex = Regex::new(r"(?i)thanks for using").unwrap();
    static ref RE_BACK: Regex = Regex::new(r"(?i)back to restaurants").unwrap();
}

/// Extract one structured snapshot from raw page markup.
///
/// Never fails: malformed or foreign markup yields a snapshot whose
/// fields are absent. `login_required` is always false here; the
/// session pool sets it based on where the navigation actually landed.
pub fn extract(markup: &str) -> ScrapeSnapshot {
    let doc = Html::parse_document(markup);
    let page_text = flatten_text(doc.root_element());

    let status_lines = doc
        .select(&SEL_STATUS)
        .next()
        .map(leaf_texts)
        .unwrap_or_default();
    let headline = status_lines.first().and_then(|l| clean(l, MAX_STATUS));
    let eta = status_lines
        .iter()
        .find(|l| RE_ETA.is_match(l))
        .and_then(|l| clean(l, MAX_STATUS));

    let customer = headline
        .as_deref()
        .and_then(|h| RE_CUSTOMER.captures(h))
        .and_then(|cap| cap.get(1))
        .and_then(|m| clean(m.as_str(), MAX_NAME));

    let mut snapshot = ScrapeSnapshot {
        headline,
        eta,
        store: find_store(&doc),
        customer,
        address: find_address(&doc),
        unit: find_unit(&doc),
        delivery_kind: find_delivery_kind(&doc, &page_text),
        note: find_note(&doc),
        items: find_items(&doc),
        delivered: false,
        login_required: false,
    };
    snapshot.delivered = is_delivered(&snapshot, &page_text);
    snapshot
}

/// First short text node shaped like `From <store>`.
fn find_store(doc: &Html) -> Option<String> {
    leaf_texts(doc.root_element())
        .into_iter()
        .filter(|t| t.len() <= STORE_SCAN_MAX_LEN)
        .find_map(|t| {
            RE_STORE
                .captures(&t)
                .and_then(|cap| cap.get(1).map(|m| m.as_str().to_string()))
        })
        .and_then(|s| clean(&s, MAX_STORE))
}

/// Leaf node matching the US postal pattern inside the address
/// container, falling back to the container's flattened text. The match
/// slice is taken verbatim; no match means absent, never a partial.
fn find_address(doc: &Html) -> Option<String> {
    let container = doc.select(&SEL_ADDRESS).next()?;

    let from_leaf = leaf_texts(container)
        .into_iter()
        .find_map(|t| RE_ADDRESS.find(&t).map(|m| m.as_str().to_string()));
    let matched = from_leaf.or_else(|| {
        let flat = flatten_text(container);
        RE_ADDRESS.find(&flat).map(|m| m.as_str().to_string())
    })?;

    clean(&matched, MAX_ADDRESS)
}

/// A combined label+value line in the details container, else a
/// leaf starting with a unit label.
fn find_unit(doc: &Html) -> Option<String> {
    let container = doc.select(&SEL_DETAILS).next()?;
    let leaves = leaf_texts(container);

    let combined = leaves
        .iter()
        .find_map(|t| RE_UNIT_LINE.find(t).map(|m| m.as_str().to_string()));
    let unit = combined.or_else(|| leaves.into_iter().find(|t| RE_UNIT_LEAF.is_match(t)))?;

    clean(&unit, MAX_UNIT)
}

/// Drop-off manner and delivery speed, independently sourced
/// from the details and options containers. Only the manner falls back
/// to a whole-page search when the containers come up empty.
fn find_delivery_kind(doc: &Html, page_text: &str) -> Option<String> {
    let scoped = [
        doc.select(&SEL_DETAILS).next(),
        doc.select(&SEL_OPTIONS).next(),
    ]
    .into_iter()
    .flatten()
    .map(flatten_text)
    .collect::<Vec<_>>()
    .join(" ");

    let manner = RE_MANNER
        .find(&scoped)
        .or_else(|| RE_MANNER.find(page_text))
        .map(|m| m.as_str().to_string());
    let speed = RE_SPEED.find(&scoped).map(|m| m.as_str().to_string());

    let joined = match (manner, speed) {
        (Some(m), Some(s)) => format!("{m} · {s}"),
        (Some(m), None) => m,
        (None, Some(s)) => s,
        (None, None) => return None,
    };
    clean(&joined, MAX_DELIVERY)
}

/// Scan the details container's leaves from the end backward
/// and take the first one that is none of the recognized shapes. That
/// is the customer's free-text note.
fn find_note(doc: &Html) -> Option<String> {
    let container = doc.select(&SEL_DETAILS).next()?;
    leaf_texts(container)
        .into_iter()
        .rev()
        .find(|t| {
            !RE_SECTION_LABEL.is_match(t)
                && !RE_MANNER.is_match(t)
                && !RE_SPEED.is_match(t)
                && !RE_ADDRESS.is_match(t)
                && !RE_UNIT_LINE.is_match(t)
                && !RE_UNIT_LEAF.is_match(t)
        })
        .and_then(|t| clean(&t, MAX_NOTE))
}

/// Cart line items as `name — detail`, capped.
fn find_items(doc: &Html) -> Vec<String> {
    doc.select(&SEL_ITEM)
        .filter_map(|line| {
            let name = line
                .select(&SEL_ITEM_NAME)
                .next()
                .map(flatten_text)
                .or_else(|| leaf_texts(line).into_iter().next())?;
            let detail = line.select(&SEL_ITEM_DETAIL).next().map(flatten_text);
            let joined = match detail {
                Some(d) if !d.trim().is_empty() => format!("{name} — {d}"),
                _ => name,
            };
            clean(&joined, MAX_ITEM)
        })
        .take(MAX_CART_ITEMS)
        .collect()
}

/// The status text says so, the thank-you copy is on the page,
/// or the "back to restaurants" action showed up.
fn is_delivered(snapshot: &ScrapeSnapshot, page_text: &str) -> bool {
    if let Some(status) = snapshot.status_text() {
        if RE_DELIVERED.is_match(&status) {
            return true;
        }
    }
    (RE_ENJOY.is_match(page_text) && RE_THANKS.is_match(page_text))
        || RE_BACK.is_match(page_text)
}

/// Text of every leaf element under `scope`, whitespace-collapsed.
fn leaf_texts(scope: ElementRef<'_>) -> Vec<String> {
    let mut out = Vec::new();
    for node in scope.descendants() {
        if let Some(el) = ElementRef::wrap(node) {
            if el.children().filter_map(ElementRef::wrap).next().is_none() {
                let text = el.text().collect::<Vec<_>>().join(" ");
                let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
                if !text.is_empty() {
                    out.push(text);
                }
            }
        }
    }
    out
}

/// All text under `scope` as one whitespace-collapsed string.
fn flatten_text(scope: ElementRef<'_>) -> String {
    scope
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(status_lines: &[&str], body: &str) -> String {
        let status = status_lines
            .iter()
            .map(|l| format!("<span>{l}</span>"))
            .collect::<String>();
        format!(
            r#"<html><body>
                <div data-testid="order-tracker-status">{status}</div>
                {body}
            </body></html>"#
        )
    }

    #[test]
    fn headline_and_eta_from_status_widget() {
        let markup = page(
            &["Preparing Dana's order", "Estimated arrival 12:45 PM"],
            "",
        );
        let snap = extract(&markup);
        assert_eq!(snap.headline.as_deref(), Some("Preparing Dana's order"));
        assert_eq!(snap.eta.as_deref(), Some("Estimated arrival 12:45 PM"));
        assert_eq!(snap.customer.as_deref(), Some("Dana"));
    }

    #[test]
    fn customer_name_from_heading_variant() {
        let markup = page(&["Heading Marcus's way", "Estimated arrival 1:10 PM"], "");
        assert_eq!(extract(&markup).customer.as_deref(), Some("Marcus"));
    }

    #[test]
    fn store_from_short_from_node() {
        let markup = page(
            &["Preparing your order"],
            "<p>From Thai Basil</p><p>From a very long sentence that merely happens to start with the word and runs on</p>",
        );
        assert_eq!(extract(&markup).store.as_deref(), Some("Thai Basil"));
    }

    #[test]
    fn address_verbatim_from_leaf() {
        let body = r#"<div data-testid="delivery-address">
            <span>Delivery address</span>
            <span>742 Evergreen Terrace, Springfield, IL 62704, US</span>
        </div>"#;
        let snap = extract(&page(&["Preparing your order"], body));
        assert_eq!(
            snap.address.as_deref(),
            Some("742 Evergreen Terrace, Springfield, IL 62704, US")
        );
    }

    #[test]
    fn address_falls_back_to_flattened_container() {
        let body = r#"<div data-testid="delivery-address">
            <span>742 Evergreen Terrace,</span><span>Springfield, IL 62704</span>
        </div>"#;
        let snap = extract(&page(&["Preparing your order"], body));
        assert_eq!(
            snap.address.as_deref(),
            Some("742 Evergreen Terrace, Springfield, IL 62704")
        );
    }

    #[test]
    fn address_absent_when_nothing_matches() {
        let body = r#"<div data-testid="delivery-address"><span>somewhere nice</span></div>"#;
        assert_eq!(extract(&page(&["Preparing your order"], body)).address, None);
    }

    #[test]
    fn unit_from_combined_line() {
        let body = r#"<div data-testid="delivery-details"><span>Apt 4B, buzz twice</span></div>"#;
        let snap = extract(&page(&["Preparing your order"], body));
        assert_eq!(snap.unit.as_deref(), Some("Apt 4B,"));
    }

    #[test]
    fn delivery_kind_joins_manner_and_speed() {
        let body = r#"
            <div data-testid="delivery-details"><span>Leave it at my door</span></div>
            <div data-testid="delivery-options"><span>Priority</span></div>
        "#;
        let snap = extract(&page(&["Preparing your order"], body));
        assert_eq!(
            snap.delivery_kind.as_deref(),
            Some("Leave it at my door · Priority")
        );
    }

    #[test]
    fn manner_falls_back_to_whole_page() {
        let body = r#"<p>Hand it to me</p>"#;
        let snap = extract(&page(&["Preparing your order"], body));
        assert_eq!(snap.delivery_kind.as_deref(), Some("Hand it to me"));
    }

    #[test]
    fn note_skips_recognized_leaves() {
        let body = r#"<div data-testid="delivery-details">
            <span>Delivery details</span>
            <span>Leave it at my door</span>
            <span>Apt 4B</span>
            <span>Gate code is 7714, thank you!</span>
        </div>"#;
        let snap = extract(&page(&["Preparing your order"], body));
        assert_eq!(snap.note.as_deref(), Some("Gate code is 7714, thank you!"));
    }

    #[test]
    fn items_join_name_and_detail_and_cap() {
        let lines: String = (0..15)
            .map(|i| {
                format!(
                    r#"<div data-testid="order-line-item">
                        <span data-testid="item-name">Item {i}</span>
                        <span data-testid="item-detail">no onions</span>
                    </div>"#
                )
            })
            .collect();
        let snap = extract(&page(&["Preparing your order"], &lines));
        assert_eq!(snap.items.len(), MAX_CART_ITEMS);
        assert_eq!(snap.items[0], "Item 0 — no onions");
    }

    #[test]
    fn delivered_from_status_text() {
        let snap = extract(&page(&["Your order has been delivered"], ""));
        assert!(snap.delivered);
    }

    #[test]
    fn delivered_from_thank_you_copy_without_headline() {
        let body = "<p>Enjoy your order!</p><p>Thanks for using the service.</p>";
        let snap = extract(&page(&["Have a great day"], body));
        assert!(snap.delivered);
    }

    #[test]
    fn delivered_from_back_to_restaurants_action() {
        let snap = extract(&page(&["Have a great day"], "<a>Back to Restaurants</a>"));
        assert!(snap.delivered);
    }

    #[test]
    fn malformed_markup_yields_empty_snapshot() {
        for markup in ["", "<div><<<", "not html at all", "<html><body></body></html>"] {
            let snap = extract(markup);
            assert_eq!(snap.headline, None);
            assert_eq!(snap.address, None);
            assert!(snap.items.is_empty());
            assert!(!snap.delivered);
            assert!(!snap.login_required);
        }
    }

    #[test]
    fn extraction_is_deterministic() {
        let markup = page(
            &["Preparing Dana's order", "Estimated arrival 12:45 PM"],
            r#"<div data-testid="delivery-address"><span>742 Evergreen Terrace, Springfield, IL 62704, US</span></div>"#,
        );
        assert_eq!(extract(&markup), extract(&markup));
    }
}
