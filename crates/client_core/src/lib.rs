pub mod api;
pub mod auth;
pub mod compare;
pub mod config;
pub mod controller;
pub mod favorites;
pub mod filter_state;
pub mod navigation;
pub mod query;
pub mod transcript;

pub use api::{ApiClientError, ShopApi};
pub use auth::{oauth_callback, AuthError, AuthMethod, AuthSession, ProfileForm, SignupForm};
pub use compare::{CompareAction, CompareSelection};
pub use config::{load_settings, ClientSettings};
pub use controller::{
    CatalogBackend, FetchError, FetchOutcome, FilterError, FilterStateController, ListingResult,
    ListingStatus, PendingFetch,
};
pub use favorites::{FavoriteError, FavoritesBackend, FavoritesTracker};
pub use filter_state::FilterState;
pub use navigation::Route;
pub use query::{decode_canonical_query, encode_canonical_query, ListingQuery};
pub use transcript::{ChatMessage, ChatTranscript};

/// Keys under which client state is kept in the key-value store.
pub mod store_keys {
    pub const AUTH_TOKEN: &str = "authToken";
    pub const AUTH_METHOD: &str = "authMethod";
    pub const USER: &str = "user";
    pub const CHATBOT_RESULTS: &str = "chatbotResults";
    pub const CHATBOT_QUERY: &str = "chatbotQuery";
    pub const CHAT_MESSAGES: &str = "chatMessages";
    pub const COMPARE_PRODUCT_ID: &str = "compareProductId";
}
