//! Listing screen controller: owns the [`FilterState`], issues sequenced
//! fetches and reconciles their outcomes into a [`ListingResult`].
//!
//! Mutations never perform I/O themselves. Each one that needs data returns a
//! [`PendingFetch`] which the caller executes against a [`CatalogBackend`]
//! and hands back to [`FilterStateController::reconcile`]. Several fetches
//! may be in flight; only the outcome of the most recently issued one is
//! applied.

use std::sync::Arc;

use async_trait::async_trait;
use shared::{
    domain::{FacetGroup, LaptopId, ListingMode, PriceRange, SortOrder, DEFAULT_PAGE_SIZE},
    error::DomainError,
    protocol::{ChatbotReply, ListingPage, Product},
};
use storage::{load_json, save_json, KeyValueStore};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    api::{ApiClientError, ShopApi},
    filter_state::FilterState,
    navigation::Route,
    query::{decode_canonical_query, encode_canonical_query, ListingQuery},
    store_keys,
    transcript::ChatTranscript,
};

const PAGE_WINDOW: u32 = 7;

/// Remote side of the listing screen.
#[async_trait]
pub trait CatalogBackend: Send + Sync {
    async fn list_laptops(&self, query: &ListingQuery) -> Result<ListingPage, ApiClientError>;
    async fn ask_chatbot(&self, message: &str) -> Result<ChatbotReply, ApiClientError>;
}

#[async_trait]
impl CatalogBackend for ShopApi {
    async fn list_laptops(&self, query: &ListingQuery) -> Result<ListingPage, ApiClientError> {
        ShopApi::list_laptops(self, query).await
    }

    async fn ask_chatbot(&self, message: &str) -> Result<ChatbotReply, ApiClientError> {
        self.chatbot(message).await
    }
}

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("chatbot query must not be empty")]
    EmptyChatbotQuery,
    #[error(transparent)]
    InvalidPriceRange(#[from] DomainError),
}

/// Failure shown inline on the listing; never propagated past the controller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("could not reach the shop service: {0}")]
    Transport(String),
    #[error("shop service answered {status}: {message}")]
    Status { status: u16, message: String },
    #[error("unexpected response from the shop service: {0}")]
    Malformed(String),
    #[error("sign-in required")]
    AuthenticationRequired,
}

impl From<ApiClientError> for FetchError {
    fn from(err: ApiClientError) -> Self {
        match err {
            ApiClientError::Status {
                status, message, ..
            } => FetchError::Status { status, message },
            ApiClientError::Malformed { source, .. } => FetchError::Malformed(source.to_string()),
            ApiClientError::AuthenticationRequired { .. } => FetchError::AuthenticationRequired,
            other @ (ApiClientError::Transport { .. }
            | ApiClientError::InvalidBaseUrl(_)
            | ApiClientError::Client(_)) => FetchError::Transport(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchKind {
    Listing(ListingQuery),
    Chatbot { message: String },
}

/// A request issued by a controller mutation and not yet reconciled.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "a pending fetch does nothing until executed and reconciled"]
pub struct PendingFetch {
    seq: u64,
    kind: FetchKind,
}

impl PendingFetch {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn kind(&self) -> &FetchKind {
        &self.kind
    }

    pub async fn execute(self, backend: &dyn CatalogBackend) -> FetchOutcome {
        let result = match &self.kind {
            FetchKind::Listing(query) => {
                debug!(seq = self.seq, page = query.page, "fetching listing");
                FetchResult::Listing(backend.list_laptops(query).await.map_err(FetchError::from))
            }
            FetchKind::Chatbot { message } => {
                debug!(seq = self.seq, "asking chatbot");
                FetchResult::Chatbot {
                    message: message.clone(),
                    reply: backend.ask_chatbot(message).await.map_err(FetchError::from),
                }
            }
        };
        FetchOutcome {
            seq: self.seq,
            result,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchResult {
    Listing(Result<ListingPage, FetchError>),
    Chatbot {
        message: String,
        reply: Result<ChatbotReply, FetchError>,
    },
}

/// Settled fetch, tagged with the sequence number of the request.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    pub seq: u64,
    pub result: FetchResult,
}

pub const NO_PRODUCTS_NOTICE: &str = "No products found";
pub const CHATBOT_NO_MATCH_NOTICE: &str = "AI assistant couldn't find matching laptops";
pub const FETCH_FAILED_NOTICE: &str = "Failed to load products. Please try again.";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ListingStatus {
    #[default]
    Idle,
    Loading,
    Loaded,
    NoProducts,
    /// `message` is the assistant's own reply, when it sent one.
    ChatbotNoMatch { message: Option<String> },
    Failed(FetchError),
}

impl ListingStatus {
    pub fn notice(&self) -> Option<&'static str> {
        match self {
            ListingStatus::Idle | ListingStatus::Loading | ListingStatus::Loaded => None,
            ListingStatus::NoProducts => Some(NO_PRODUCTS_NOTICE),
            ListingStatus::ChatbotNoMatch { .. } => Some(CHATBOT_NO_MATCH_NOTICE),
            ListingStatus::Failed(_) => Some(FETCH_FAILED_NOTICE),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ListingStatus::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListingResult {
    pub items: Vec<Product>,
    pub total_count: Option<u64>,
    pub total_pages: u32,
}

impl Default for ListingResult {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total_count: None,
            total_pages: 1,
        }
    }
}

pub struct FilterStateController {
    state: FilterState,
    /// Filters in effect before chatbot mode was entered.
    stashed_filters: Option<FilterState>,
    result: ListingResult,
    status: ListingStatus,
    page_size: u32,
    canonical_query: String,
    issued_seq: u64,
    store: Option<Arc<dyn KeyValueStore>>,
    transcript: ChatTranscript,
}

impl Default for FilterStateController {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl FilterStateController {
    pub fn new(page_size: u32) -> Self {
        Self {
            state: FilterState::default(),
            stashed_filters: None,
            result: ListingResult::default(),
            status: ListingStatus::Idle,
            page_size: page_size.max(1),
            canonical_query: String::new(),
            issued_seq: 0,
            store: None,
            transcript: ChatTranscript::default(),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    pub fn result(&self) -> &ListingResult {
        &self.result
    }

    pub fn status(&self) -> &ListingStatus {
        &self.status
    }

    pub fn transcript(&self) -> &ChatTranscript {
        &self.transcript
    }

    pub fn canonical_query(&self) -> &str {
        &self.canonical_query
    }

    pub fn listing_route(&self) -> Route {
        Route::Listing {
            query: self.canonical_query.clone(),
        }
    }

    /// Hydrates the state from an incoming query string. Saved chatbot
    /// results are restored from the store without a fetch, together with
    /// the query that produced them; without both the view falls back to the
    /// filtered listing.
    pub async fn mount(&mut self, query: &str) -> Option<PendingFetch> {
        self.state = decode_canonical_query(query);
        self.stashed_filters = None;
        self.result = ListingResult::default();
        self.status = ListingStatus::Idle;
        self.transcript = self.load_transcript().await;

        if self.state.mode == ListingMode::ChatbotResult {
            if let Some((saved_query, items)) = self.saved_chatbot_results().await {
                if !self.state.chatbot_query.is_empty() && self.state.chatbot_query != saved_query
                {
                    debug!(
                        requested = %self.state.chatbot_query,
                        saved = %saved_query,
                        "query names other results than the saved ones, showing saved"
                    );
                }
                self.state.chatbot_query = saved_query;
                info!(count = items.len(), "restored saved chatbot results");
                // Supersede anything issued before the remount.
                self.issued_seq += 1;
                self.result = ListingResult {
                    items,
                    total_count: None,
                    total_pages: 1,
                };
                self.status = ListingStatus::Loaded;
                self.refresh_canonical_query();
                return None;
            }
            debug!("no saved chatbot results, showing filtered listing");
            self.state = FilterState::default();
        }

        self.refresh_canonical_query();
        Some(self.issue_listing())
    }

    pub fn set_search_text(&mut self, text: impl Into<String>) -> Option<PendingFetch> {
        if self.in_chatbot_mode() {
            return None;
        }
        self.state.search_text = text.into();
        Some(self.filters_changed())
    }

    pub fn toggle_facet(&mut self, group: FacetGroup, id: &str) -> Option<PendingFetch> {
        if self.in_chatbot_mode() || id.is_empty() {
            return None;
        }
        self.state.toggle(group, id);
        Some(self.filters_changed())
    }

    pub fn set_price_range(
        &mut self,
        lower: u32,
        upper: u32,
    ) -> Result<Option<PendingFetch>, FilterError> {
        let range = PriceRange::new(lower, upper)?;
        if self.in_chatbot_mode() {
            return Ok(None);
        }
        self.state.price_range = range;
        Ok(Some(self.filters_changed()))
    }

    pub fn set_sort_order(&mut self, order: SortOrder) -> Option<PendingFetch> {
        if self.in_chatbot_mode() {
            return None;
        }
        self.state.sort_order = order;
        Some(self.filters_changed())
    }

    /// Pages outside `1..=total_pages` are ignored. The page already shown
    /// is fetched again.
    pub fn go_to_page(&mut self, page: u32) -> Option<PendingFetch> {
        if self.in_chatbot_mode() || page < 1 || page > self.result.total_pages {
            return None;
        }
        self.state.current_page = page;
        self.refresh_canonical_query();
        Some(self.issue_listing())
    }

    pub fn clear_all_filters(&mut self) -> Option<PendingFetch> {
        if self.in_chatbot_mode() {
            return None;
        }
        self.state.reset_filters();
        self.refresh_canonical_query();
        Some(self.issue_listing())
    }

    pub fn enter_chatbot_mode(&mut self, query: &str) -> Result<PendingFetch, FilterError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(FilterError::EmptyChatbotQuery);
        }

        if !self.in_chatbot_mode() {
            self.stashed_filters = Some(self.state.clone());
        }
        self.state.reset_filters();
        self.state.mode = ListingMode::ChatbotResult;
        self.state.chatbot_query = query.to_string();
        self.refresh_canonical_query();

        Ok(self.issue(FetchKind::Chatbot {
            message: query.to_string(),
        }))
    }

    /// Returns to the filtered listing with the filters held before chatbot
    /// mode, on page 1.
    pub async fn exit_chatbot_mode(&mut self) -> Option<PendingFetch> {
        if !self.in_chatbot_mode() {
            return None;
        }

        self.state.mode = ListingMode::Filtered;
        self.state.chatbot_query.clear();
        if let Some(previous) = self.stashed_filters.take() {
            self.state.restore_filters_from(&previous);
        }
        self.state.current_page = 1;
        self.forget_chatbot_results().await;
        self.refresh_canonical_query();
        Some(self.issue_listing())
    }

    /// Re-issues the request for the current state.
    pub fn retry(&mut self) -> PendingFetch {
        match self.state.mode {
            ListingMode::Filtered => self.issue_listing(),
            ListingMode::ChatbotResult => {
                let message = self.state.chatbot_query.clone();
                self.issue(FetchKind::Chatbot { message })
            }
        }
    }

    /// Applies `outcome` if it belongs to the most recently issued fetch.
    /// Returns whether it was applied.
    pub async fn reconcile(&mut self, outcome: FetchOutcome) -> bool {
        if outcome.seq != self.issued_seq {
            debug!(
                seq = outcome.seq,
                latest = self.issued_seq,
                "discarding stale fetch outcome"
            );
            return false;
        }

        match outcome.result {
            FetchResult::Listing(result) => {
                if self.in_chatbot_mode() {
                    return false;
                }
                self.reconcile_listing(result);
            }
            FetchResult::Chatbot { message, reply } => {
                if !self.in_chatbot_mode() {
                    return false;
                }
                self.reconcile_chatbot(message, reply).await;
            }
        }
        true
    }

    /// Executes and reconciles `pending` in one step.
    pub async fn apply(
        &mut self,
        backend: &dyn CatalogBackend,
        pending: Option<PendingFetch>,
    ) -> bool {
        match pending {
            Some(pending) => {
                let outcome = pending.execute(backend).await;
                self.reconcile(outcome).await
            }
            None => false,
        }
    }

    fn reconcile_listing(&mut self, result: Result<ListingPage, FetchError>) {
        match result {
            Ok(page) => {
                let total_pages = self.total_pages_for(page.total_count);
                self.status = if page.items.is_empty() {
                    ListingStatus::NoProducts
                } else {
                    ListingStatus::Loaded
                };
                self.result = ListingResult {
                    items: page.items,
                    total_count: page.total_count,
                    total_pages,
                };
            }
            Err(err) => {
                warn!("listing fetch failed: {err}");
                self.result = ListingResult {
                    items: Vec::new(),
                    total_count: Some(0),
                    total_pages: 1,
                };
                self.status = ListingStatus::Failed(err);
            }
        }

        let clamped = self
            .state
            .current_page
            .clamp(1, self.result.total_pages.max(1));
        if clamped != self.state.current_page {
            debug!(
                from = self.state.current_page,
                to = clamped,
                "clamping page into result range"
            );
            self.state.current_page = clamped;
            self.refresh_canonical_query();
        }
    }

    async fn reconcile_chatbot(&mut self, message: String, reply: Result<ChatbotReply, FetchError>) {
        self.result = ListingResult::default();
        self.transcript.push_user(message.as_str());

        match reply {
            Ok(reply) if !reply.laptops.is_empty() => {
                info!(count = reply.laptops.len(), "chatbot returned laptops");
                self.persist_chatbot_results(&message, &reply.laptops).await;
                self.transcript
                    .push_matches(reply.laptops.clone(), reply.extracted_specs);
                self.result.items = reply.laptops;
                self.status = ListingStatus::Loaded;
            }
            Ok(reply) => {
                info!("chatbot found no matching laptops");
                self.forget_saved_results().await;
                self.transcript.push_no_match();
                self.status = ListingStatus::ChatbotNoMatch {
                    message: reply.message,
                };
            }
            Err(err) => {
                warn!("chatbot fetch failed: {err}");
                self.forget_saved_results().await;
                self.transcript.push_error(err.to_string());
                self.status = ListingStatus::Failed(err);
            }
        }

        self.save_transcript().await;
    }

    fn total_pages_for(&self, total_count: Option<u64>) -> u32 {
        match total_count {
            Some(count) => {
                let pages = count.div_ceil(u64::from(self.page_size)).max(1);
                u32::try_from(pages).unwrap_or(u32::MAX)
            }
            None => 1,
        }
    }

    /// Page buttons to render: all pages when there are at most seven,
    /// otherwise a seven-wide window around the current page.
    pub fn visible_page_numbers(&self) -> Vec<u32> {
        let total = self.result.total_pages.max(1);
        let current = self.state.current_page.clamp(1, total);
        if total <= PAGE_WINDOW {
            return (1..=total).collect();
        }

        let half = PAGE_WINDOW / 2;
        let start = if current <= half + 1 {
            1
        } else if current.saturating_add(half) >= total {
            total - PAGE_WINDOW + 1
        } else {
            current - half
        };
        (start..=start + (PAGE_WINDOW - 1)).collect()
    }

    pub fn product_route(&self, id: &LaptopId) -> Route {
        Route::Product {
            id: id.clone(),
            from_chatbot: self.in_chatbot_mode(),
        }
    }

    fn in_chatbot_mode(&self) -> bool {
        self.state.mode == ListingMode::ChatbotResult
    }

    fn filters_changed(&mut self) -> PendingFetch {
        self.state.current_page = 1;
        self.refresh_canonical_query();
        self.issue_listing()
    }

    fn refresh_canonical_query(&mut self) {
        self.canonical_query = encode_canonical_query(&self.state);
    }

    fn issue_listing(&mut self) -> PendingFetch {
        let query = ListingQuery::from_state(&self.state);
        self.issue(FetchKind::Listing(query))
    }

    fn issue(&mut self, kind: FetchKind) -> PendingFetch {
        self.issued_seq += 1;
        self.status = ListingStatus::Loading;
        PendingFetch {
            seq: self.issued_seq,
            kind,
        }
    }

    async fn load_transcript(&self) -> ChatTranscript {
        let Some(store) = &self.store else {
            return ChatTranscript::default();
        };
        match ChatTranscript::load(store.as_ref()).await {
            Ok(transcript) => transcript,
            Err(err) => {
                warn!("failed to load chat transcript: {err:#}");
                ChatTranscript::default()
            }
        }
    }

    async fn save_transcript(&self) {
        if let Some(store) = &self.store {
            if let Err(err) = self.transcript.save(store.as_ref()).await {
                warn!("failed to save chat transcript: {err:#}");
            }
        }
    }

    async fn saved_chatbot_results(&self) -> Option<(String, Vec<Product>)> {
        let store = self.store.as_ref()?;
        let items: Vec<Product> = match load_json(store.as_ref(), store_keys::CHATBOT_RESULTS).await
        {
            Ok(items) => items?,
            Err(err) => {
                warn!("failed to read saved chatbot results: {err:#}");
                return None;
            }
        };
        if items.is_empty() {
            return None;
        }
        let query = store
            .get(store_keys::CHATBOT_QUERY)
            .await
            .unwrap_or_else(|err| {
                warn!("failed to read saved chatbot query: {err:#}");
                None
            })
            .filter(|query| !query.trim().is_empty())?;
        Some((query, items))
    }

    async fn persist_chatbot_results(&self, query: &str, items: &[Product]) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(err) = save_json(store.as_ref(), store_keys::CHATBOT_RESULTS, items).await {
            warn!("failed to save chatbot results: {err:#}");
        }
        if let Err(err) = store.set(store_keys::CHATBOT_QUERY, query).await {
            warn!("failed to save chatbot query: {err:#}");
        }
    }

    async fn forget_saved_results(&self) {
        if let Some(store) = &self.store {
            if let Err(err) = store.remove(store_keys::CHATBOT_RESULTS).await {
                warn!("failed to remove saved chatbot results: {err:#}");
            }
        }
    }

    async fn forget_chatbot_results(&self) {
        self.forget_saved_results().await;
        if let Some(store) = &self.store {
            if let Err(err) = store.remove(store_keys::CHATBOT_QUERY).await {
                warn!("failed to remove saved chatbot query: {err:#}");
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
