//! Canonical URL query representation of [`FilterState`] and the outbound
//! listing request parameters derived from it.

use shared::domain::{FacetGroup, ListingMode, PriceRange, SortOrder, MAX_PRICE};
use url::form_urlencoded;

use crate::filter_state::FilterState;

const SOURCE_PARAM: &str = "source";
const SOURCE_CHATBOT: &str = "chatbot";
const CHATBOT_QUERY_PARAM: &str = "chatbotQuery";
const SEARCH_PARAM: &str = "search";
const PAGE_PARAM: &str = "page";
const ORDERING_PARAM: &str = "ordering";
const MIN_PRICE_PARAM: &str = "min_price";
const MAX_PRICE_PARAM: &str = "max_price";

/// Encodes the state as a shareable query string (no leading `?`). Only
/// values that differ from the defaults are written, so the default state
/// encodes to an empty string.
pub fn encode_canonical_query(state: &FilterState) -> String {
    let mut out = form_urlencoded::Serializer::new(String::new());

    match state.mode {
        ListingMode::ChatbotResult => {
            out.append_pair(SOURCE_PARAM, SOURCE_CHATBOT);
            if !state.chatbot_query.is_empty() {
                out.append_pair(CHATBOT_QUERY_PARAM, &state.chatbot_query);
            }
        }
        ListingMode::Filtered => {
            if !state.search_text.is_empty() {
                out.append_pair(SEARCH_PARAM, &state.search_text);
            }
            if state.current_page > 1 {
                out.append_pair(PAGE_PARAM, &state.current_page.to_string());
            }
            if let Some(ordering) = state.sort_order.ordering_param() {
                out.append_pair(ORDERING_PARAM, ordering);
            }
            for group in FacetGroup::ALL {
                for id in state.facet(group) {
                    out.append_pair(group.query_key(), id);
                }
            }
            if state.price_range.lower() > 0 {
                out.append_pair(MIN_PRICE_PARAM, &state.price_range.lower().to_string());
            }
            if state.price_range.upper() < MAX_PRICE {
                out.append_pair(MAX_PRICE_PARAM, &state.price_range.upper().to_string());
            }
        }
    }

    out.finish()
}

/// Rebuilds a state from a query string. Unknown parameters are ignored and
/// malformed values fall back to their defaults, so any input decodes.
pub fn decode_canonical_query(query: &str) -> FilterState {
    let query = query.trim().trim_start_matches('?');
    let mut state = FilterState::default();
    let mut chatbot_source = false;
    let mut min_price: Option<i64> = None;
    let mut max_price: Option<i64> = None;

    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        match &*key {
            SOURCE_PARAM => chatbot_source = value == SOURCE_CHATBOT,
            CHATBOT_QUERY_PARAM => state.chatbot_query = value.into_owned(),
            SEARCH_PARAM => state.search_text = value.into_owned(),
            PAGE_PARAM => {
                if let Ok(page) = value.trim().parse::<u32>() {
                    state.current_page = page.max(1);
                }
            }
            ORDERING_PARAM => {
                state.sort_order =
                    SortOrder::from_ordering_param(&value).unwrap_or(SortOrder::Default);
            }
            MIN_PRICE_PARAM => min_price = value.trim().parse().ok(),
            MAX_PRICE_PARAM => max_price = value.trim().parse().ok(),
            other => {
                if let Some(group) = FacetGroup::from_query_key(other) {
                    if !value.is_empty() {
                        state.facet_mut(group).insert(value.into_owned());
                    }
                }
            }
        }
    }

    if chatbot_source {
        // Chatbot results are never combined with filters.
        let chatbot_query = std::mem::take(&mut state.chatbot_query);
        return FilterState {
            mode: ListingMode::ChatbotResult,
            chatbot_query,
            ..FilterState::default()
        };
    }

    state.chatbot_query.clear();
    if min_price.is_some() || max_price.is_some() {
        state.price_range =
            PriceRange::clamped(min_price.unwrap_or(0), max_price.unwrap_or(i64::from(MAX_PRICE)));
    }
    state
}

/// Parameters of one `GET /laptops/` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    pub search: Option<String>,
    pub page: u32,
    pub ordering: Option<&'static str>,
    /// Comma-joined selections per facet group, in group order.
    pub facets: Vec<(FacetGroup, String)>,
    pub min_price: u32,
    pub max_price: u32,
}

impl ListingQuery {
    pub fn from_state(state: &FilterState) -> Self {
        let facets = FacetGroup::ALL
            .into_iter()
            .filter_map(|group| {
                let selected = state.facet(group);
                if selected.is_empty() {
                    return None;
                }
                let joined = selected
                    .iter()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(",");
                Some((group, joined))
            })
            .collect();

        Self {
            search: (!state.search_text.is_empty()).then(|| state.search_text.clone()),
            page: state.current_page,
            ordering: state.sort_order.ordering_param(),
            facets,
            min_price: state.price_range.lower(),
            max_price: state.price_range.upper(),
        }
    }

    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(5 + self.facets.len());
        if let Some(search) = &self.search {
            pairs.push((SEARCH_PARAM, search.clone()));
        }
        pairs.push((PAGE_PARAM, self.page.to_string()));
        if let Some(ordering) = self.ordering {
            pairs.push((ORDERING_PARAM, ordering.to_string()));
        }
        for (group, joined) in &self.facets {
            pairs.push((group.query_key(), joined.clone()));
        }
        pairs.push((MIN_PRICE_PARAM, self.min_price.to_string()));
        pairs.push((MAX_PRICE_PARAM, self.max_price.to_string()));
        pairs
    }
}

#[cfg(test)]
#[path = "tests/query_tests.rs"]
mod tests;
