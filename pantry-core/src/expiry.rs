//! Expiry classification and aggregation over a user's items.
//!
//! Everything here is pure: the reference instant is always passed in, so the
//! same items and reference always yield the same view.

use crate::models::{Category, CategoryFilter, Item};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};
use uuid::Uuid;

pub const DEFAULT_HORIZON_DAYS: u32 = 3;

const MILLIS_PER_DAY: i128 = 86_400_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpiryStatus {
    pub days_remaining: i64,
    pub is_expired: bool,
    pub is_urgent: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Classification {
    Dated(ExpiryStatus),
    /// The expiry date could not be parsed.
    Unknown,
}

impl Classification {
    pub fn status(&self) -> Option<ExpiryStatus> {
        match self {
            Classification::Dated(status) => Some(*status),
            Classification::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedItem {
    pub item: Item,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    #[serde(flatten)]
    pub status: ExpiryStatus,
}

/// Items of one known category, in input order, with how many are urgent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub total: usize,
    pub urgent: usize,
    pub item_ids: Vec<Uuid>,
}

static EMPTY_SUMMARY: CategorySummary = CategorySummary {
    total: 0,
    urgent: 0,
    item_ids: Vec::new(),
};

/// Display-ready summary of a user's pantry at one reference instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateView {
    #[serde(with = "time::serde::rfc3339")]
    pub reference: OffsetDateTime,
    pub horizon_days: u32,
    pub total_count: usize,
    pub expiring_soon_count: usize,
    /// Urgent items, expired ones included, soonest first.
    pub urgent_list: Vec<ClassifiedItem>,
    pub expired_list: Vec<ClassifiedItem>,
    pub unknown_list: Vec<Item>,
    /// Grouping over the four known categories; free-text categories are left out.
    pub categories: BTreeMap<Category, CategorySummary>,
}

impl AggregateView {
    pub fn empty(reference: OffsetDateTime, horizon_days: u32) -> Self {
        aggregate_within(&[], reference, horizon_days)
    }

    pub fn is_empty(&self) -> bool {
        self.total_count == 0
    }

    pub fn category(&self, category: Category) -> &CategorySummary {
        self.categories.get(&category).unwrap_or(&EMPTY_SUMMARY)
    }
}

/// Parses a stored expiry date.
///
/// Accepts RFC 3339 timestamps, a bare `YYYY-MM-DD` date and an offset-less
/// `YYYY-MM-DDTHH:MM:SS`; the last two are read as UTC.
pub fn parse_expiry(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if let Ok(timestamp) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(timestamp);
    }
    if let Ok(date) = Date::parse(raw, format_description!("[year]-[month]-[day]")) {
        return Some(date.midnight().assume_utc());
    }
    PrimitiveDateTime::parse(
        raw,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    )
    .ok()
    .map(PrimitiveDateTime::assume_utc)
}

/// Whole days until `expiry`, rounding any partial day up.
pub fn days_remaining(expiry: OffsetDateTime, reference: OffsetDateTime) -> i64 {
    let millis = (expiry - reference).whole_milliseconds();
    // Integer division truncates toward zero, which already is the ceiling
    // for negative quotients.
    let mut days = millis / MILLIS_PER_DAY;
    if millis % MILLIS_PER_DAY > 0 {
        days += 1;
    }
    days as i64
}

pub fn classify(item: &Item, reference: OffsetDateTime) -> Classification {
    classify_within(item, reference, DEFAULT_HORIZON_DAYS)
}

pub fn classify_within(item: &Item, reference: OffsetDateTime, horizon_days: u32) -> Classification {
    match parse_expiry(&item.expiry_date) {
        Some(expiry) => Classification::Dated(status_for(expiry, reference, horizon_days)),
        None => Classification::Unknown,
    }
}

fn status_for(expiry: OffsetDateTime, reference: OffsetDateTime, horizon_days: u32) -> ExpiryStatus {
    let days_remaining = days_remaining(expiry, reference);
    ExpiryStatus {
        days_remaining,
        is_expired: days_remaining <= 0,
        is_urgent: days_remaining <= i64::from(horizon_days),
    }
}

pub fn aggregate(items: &[Item], reference: OffsetDateTime) -> AggregateView {
    aggregate_within(items, reference, DEFAULT_HORIZON_DAYS)
}

/// Full recompute of the view over `items`.
pub fn aggregate_within(items: &[Item], reference: OffsetDateTime, horizon_days: u32) -> AggregateView {
    let mut urgent_list = Vec::new();
    let mut unknown_list = Vec::new();
    let mut categories: BTreeMap<Category, CategorySummary> = Category::ALL
        .into_iter()
        .map(|category| (category, CategorySummary::default()))
        .collect();

    for item in items {
        let known = item.known_category();
        if let Some(category) = known {
            let summary = categories.entry(category).or_default();
            summary.total += 1;
            summary.item_ids.push(item.id);
        }

        let Some(expires_at) = parse_expiry(&item.expiry_date) else {
            unknown_list.push(item.clone());
            continue;
        };

        let status = status_for(expires_at, reference, horizon_days);
        if !status.is_urgent {
            continue;
        }
        if let Some(category) = known {
            categories.entry(category).or_default().urgent += 1;
        }
        urgent_list.push(ClassifiedItem {
            item: item.clone(),
            expires_at,
            status,
        });
    }

    urgent_list.sort_by(soonest_first);
    let expired_list: Vec<ClassifiedItem> = urgent_list
        .iter()
        .filter(|entry| entry.status.is_expired)
        .cloned()
        .collect();

    AggregateView {
        reference,
        horizon_days,
        total_count: items.len(),
        expiring_soon_count: urgent_list.len(),
        urgent_list,
        expired_list,
        unknown_list,
        categories,
    }
}

fn soonest_first(a: &ClassifiedItem, b: &ClassifiedItem) -> Ordering {
    a.expires_at
        .cmp(&b.expires_at)
        .then_with(|| a.item.id.cmp(&b.item.id))
}

/// Items whose category matches `category`, in their original order.
/// `"All"` keeps every item.
pub fn filter_by_category(items: &[Item], category: &str) -> Vec<Item> {
    let filter = CategoryFilter::parse(category);
    items
        .iter()
        .filter(|item| filter.matches(&item.category))
        .cloned()
        .collect()
}
