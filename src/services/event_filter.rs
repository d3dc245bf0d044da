//! Фильтрация и сортировка каталога событий.
//!
//! Filters run in a fixed order (text, category, price, date range) and the
//! sort is always tiered: upcoming before past, low-stock upcoming before
//! the rest, then the requested key.

use crate::models::event::ALL_CATEGORIES;
use crate::models::EventSummary;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

/// Upcoming events with this many tickets or fewer are ranked first.
pub const LOW_STOCK_THRESHOLD: i32 = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Date,
    Alpha,
    Price,
    Rating,
}

impl SortKey {
    /// Unknown or missing keys fall back to `Date`.
    pub fn from_param(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("alpha") => SortKey::Alpha,
            Some("price") => SortKey::Price,
            Some("rating") => SortKey::Rating,
            _ => SortKey::Date,
        }
    }

    /// Final tier of the ordering.
    pub fn compare(self, a: &EventSummary, b: &EventSummary) -> Ordering {
        match self {
            SortKey::Date => a.event.date.cmp(&b.event.date),
            SortKey::Alpha => a
                .event
                .title
                .to_lowercase()
                .cmp(&b.event.title.to_lowercase())
                .then_with(|| a.event.title.cmp(&b.event.title)),
            SortKey::Price => a
                .event
                .price
                .unwrap_or(0.0)
                .total_cmp(&b.event.price.unwrap_or(0.0)),
            SortKey::Rating => b
                .average_rating
                .total_cmp(&a.average_rating)
                .then_with(|| a.event.date.cmp(&b.event.date)),
        }
    }
}

/// Raw listing parameters as they arrive on the query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventsQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    #[serde(rename = "startDate")]
    pub start_date: Option<String>,
    #[serde(rename = "endDate")]
    pub end_date: Option<String>,
    #[serde(rename = "minPrice")]
    pub min_price: Option<f64>,
    #[serde(rename = "maxPrice")]
    pub max_price: Option<f64>,
    pub sort: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper bound, already pushed one day past the requested end.
    pub end: Option<DateTime<Utc>>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub sort: SortKey,
}

impl From<&EventsQuery> for EventFilter {
    fn from(q: &EventsQuery) -> Self {
        EventFilter {
            search: q
                .search
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_lowercase),
            category: q
                .category
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty() && *c != ALL_CATEGORIES)
                .map(str::to_string),
            start: q.start_date.as_deref().and_then(parse_date_param),
            end: q
                .end_date
                .as_deref()
                .and_then(parse_date_param)
                .map(|end| end + Duration::days(1)),
            min_price: q.min_price,
            max_price: q.max_price,
            sort: SortKey::from_param(q.sort.as_deref()),
        }
    }
}

/// Parses `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM[:SS]` or RFC 3339; anything else
/// is `None` and the bound is simply not applied.
pub fn parse_date_param(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

impl EventFilter {
    pub fn matches(&self, summary: &EventSummary) -> bool {
        let event = &summary.event;

        if let Some(needle) = &self.search {
            let in_title = event.title.to_lowercase().contains(needle);
            let in_description = event
                .description
                .as_deref()
                .unwrap_or_default()
                .to_lowercase()
                .contains(needle);
            if !in_title && !in_description {
                return false;
            }
        }

        if let Some(category) = &self.category {
            if event.category.as_deref() != Some(category.as_str()) {
                return false;
            }
        }

        let price = event.price.unwrap_or(0.0);
        if self.min_price.is_some_and(|min| price < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| price > max) {
            return false;
        }

        if self.start.is_some_and(|start| event.date < start) {
            return false;
        }
        if self.end.is_some_and(|end| event.date > end) {
            return false;
        }

        true
    }
}

fn is_past(summary: &EventSummary, now: DateTime<Utc>) -> bool {
    summary.event.date < now
}

fn is_low_stock_upcoming(summary: &EventSummary, now: DateTime<Utc>) -> bool {
    !is_past(summary, now) && summary.event.available_tickets <= LOW_STOCK_THRESHOLD
}

/// Complete ordering: past-last, low-stock-first, then the key.
pub fn compare_events(key: SortKey, a: &EventSummary, b: &EventSummary, now: DateTime<Utc>) -> Ordering {
    is_past(a, now)
        .cmp(&is_past(b, now))
        .then_with(|| is_low_stock_upcoming(b, now).cmp(&is_low_stock_upcoming(a, now)))
        .then_with(|| key.compare(a, b))
}

/// Карточка события для списка.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventCard {
    pub event_id: i64,
    pub title: String,
    pub date: DateTime<Utc>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub available_tickets: i32,
    pub image_url: Option<String>,
    pub created_by_user_id: Option<Uuid>,
    pub average_rating: f64,
    pub total_ratings: i64,
    pub is_sold_out: bool,
    pub is_past_event: bool,
    pub is_low_stock: bool,
}

impl EventCard {
    pub fn from_summary(summary: &EventSummary, now: DateTime<Utc>) -> Self {
        let event = &summary.event;
        let is_past_event = event.date < now;
        EventCard {
            event_id: event.id,
            title: event.title.clone(),
            date: event.date,
            description: event.description.clone(),
            category: event.category.clone(),
            price: event.price,
            available_tickets: event.available_tickets,
            image_url: event.image_url.clone(),
            created_by_user_id: event.created_by_user_id,
            average_rating: summary.average_rating,
            total_ratings: summary.total_ratings,
            is_sold_out: event.available_tickets <= 0,
            is_past_event,
            is_low_stock: !is_past_event
                && event.available_tickets > 0
                && event.available_tickets <= LOW_STOCK_THRESHOLD,
        }
    }
}

/// Runs the whole pipeline over a catalogue snapshot.
pub fn filter_and_sort(catalogue: &[EventSummary], filter: &EventFilter, now: DateTime<Utc>) -> Vec<EventCard> {
    let mut selected: Vec<&EventSummary> = catalogue.iter().filter(|s| filter.matches(s)).collect();
    selected.sort_by(|a, b| compare_events(filter.sort, a, b, now));
    selected
        .into_iter()
        .map(|s| EventCard::from_summary(s, now))
        .collect()
}
