//! Listing filter state owned by the products screen.

use std::collections::BTreeSet;

use shared::domain::{FacetGroup, ListingMode, PriceRange, SortOrder};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState {
    pub(crate) search_text: String,
    pub(crate) brands: BTreeSet<String>,
    pub(crate) categories: BTreeSet<String>,
    pub(crate) storage: BTreeSet<String>,
    pub(crate) performance: BTreeSet<String>,
    pub(crate) screen_sizes: BTreeSet<String>,
    pub(crate) price_range: PriceRange,
    pub(crate) sort_order: SortOrder,
    pub(crate) current_page: u32,
    pub(crate) mode: ListingMode,
    pub(crate) chatbot_query: String,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            search_text: String::new(),
            brands: BTreeSet::new(),
            categories: BTreeSet::new(),
            storage: BTreeSet::new(),
            performance: BTreeSet::new(),
            screen_sizes: BTreeSet::new(),
            price_range: PriceRange::FULL,
            sort_order: SortOrder::Default,
            current_page: 1,
            mode: ListingMode::Filtered,
            chatbot_query: String::new(),
        }
    }
}

impl FilterState {
    pub fn search_text(&self) -> &str {
        &self.search_text
    }

    pub fn facet(&self, group: FacetGroup) -> &BTreeSet<String> {
        match group {
            FacetGroup::Brand => &self.brands,
            FacetGroup::Category => &self.categories,
            FacetGroup::Storage => &self.storage,
            FacetGroup::Performance => &self.performance,
            FacetGroup::ScreenSize => &self.screen_sizes,
        }
    }

    pub(crate) fn facet_mut(&mut self, group: FacetGroup) -> &mut BTreeSet<String> {
        match group {
            FacetGroup::Brand => &mut self.brands,
            FacetGroup::Category => &mut self.categories,
            FacetGroup::Storage => &mut self.storage,
            FacetGroup::Performance => &mut self.performance,
            FacetGroup::ScreenSize => &mut self.screen_sizes,
        }
    }

    pub fn price_range(&self) -> PriceRange {
        self.price_range
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort_order
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn mode(&self) -> ListingMode {
        self.mode
    }

    pub fn chatbot_query(&self) -> &str {
        &self.chatbot_query
    }

    /// Adds `id` when absent, removes it when present. Returns whether the id
    /// is selected afterwards.
    pub(crate) fn toggle(&mut self, group: FacetGroup, id: &str) -> bool {
        let set = self.facet_mut(group);
        if set.remove(id) {
            false
        } else {
            set.insert(id.to_string());
            true
        }
    }

    /// True when anything narrows the listing beyond the defaults.
    pub fn has_active_filters(&self) -> bool {
        !self.search_text.is_empty()
            || FacetGroup::ALL
                .into_iter()
                .any(|group| !self.facet(group).is_empty())
            || !self.price_range.is_full()
            || self.sort_order != SortOrder::Default
    }

    /// Resets search, facets, price and sort, and returns to page 1. Mode and
    /// chatbot query are untouched.
    pub(crate) fn reset_filters(&mut self) {
        let defaults = FilterState::default();
        self.search_text = defaults.search_text;
        self.brands = defaults.brands;
        self.categories = defaults.categories;
        self.storage = defaults.storage;
        self.performance = defaults.performance;
        self.screen_sizes = defaults.screen_sizes;
        self.price_range = defaults.price_range;
        self.sort_order = defaults.sort_order;
        self.current_page = 1;
    }

    /// Copies search, facets, price and sort from `other`.
    pub(crate) fn restore_filters_from(&mut self, other: &FilterState) {
        self.search_text = other.search_text.clone();
        self.brands = other.brands.clone();
        self.categories = other.categories.clone();
        self.storage = other.storage.clone();
        self.performance = other.performance.clone();
        self.screen_sizes = other.screen_sizes.clone();
        self.price_range = other.price_range;
        self.sort_order = other.sort_order;
    }

    /// Equality restricted to the fields meaningful in the current mode.
    pub fn same_view_as(&self, other: &FilterState) -> bool {
        if self.mode != other.mode {
            return false;
        }
        match self.mode {
            ListingMode::ChatbotResult => self.chatbot_query == other.chatbot_query,
            ListingMode::Filtered => {
                self.search_text == other.search_text
                    && FacetGroup::ALL
                        .into_iter()
                        .all(|group| self.facet(group) == other.facet(group))
                    && self.price_range == other.price_range
                    && self.sort_order == other.sort_order
                    && self.current_page == other.current_page
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_adds_then_removes() {
        let mut state = FilterState::default();
        assert!(state.toggle(FacetGroup::Brand, "Dell"));
        assert!(state.toggle(FacetGroup::Brand, "HP"));
        assert!(!state.toggle(FacetGroup::Brand, "Dell"));
        assert_eq!(
            state.facet(FacetGroup::Brand).iter().collect::<Vec<_>>(),
            vec!["HP"]
        );
        assert!(state.has_active_filters());
    }

    #[test]
    fn reset_keeps_mode_and_chatbot_query() {
        let mut state = FilterState {
            search_text: "zenbook".into(),
            current_page: 3,
            mode: ListingMode::ChatbotResult,
            chatbot_query: "thin and light".into(),
            price_range: PriceRange::new(10_000, 90_000).expect("range"),
            ..FilterState::default()
        };
        state.toggle(FacetGroup::Storage, "512");

        state.reset_filters();

        assert!(!state.has_active_filters());
        assert_eq!(state.current_page(), 1);
        assert_eq!(state.mode(), ListingMode::ChatbotResult);
        assert_eq!(state.chatbot_query(), "thin and light");
    }
}
