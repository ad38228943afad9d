use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{LaptopId, UserId};

/// Image shown for products without an image URL.
pub const PLACEHOLDER_IMAGE: &str = "/placeholder-laptop.png";

/// Canonical product shape. Everything past the fetch boundary works with
/// this type only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: LaptopId,
    pub name: String,
    pub brand: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graphics: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ram: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_resolution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub in_stock: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seller: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl Product {
    pub fn image_or_placeholder(&self) -> &str {
        self.image_url.as_deref().unwrap_or(PLACEHOLDER_IMAGE)
    }
}

/// Product as sent by any of the API endpoints. The listing and chatbot
/// endpoints use snake_case, cached front-end payloads use camelCase and the
/// finder endpoint uses capitalised dataset columns; numbers and strings are
/// used interchangeably for ids, sizes and prices.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawProduct {
    id: Option<Value>,
    #[serde(rename = "ID")]
    id_upper: Option<Value>,
    name: Option<Value>,
    #[serde(rename = "Model")]
    model_upper: Option<Value>,
    brand: Option<Value>,
    #[serde(rename = "Brand")]
    brand_upper: Option<Value>,
    model: Option<Value>,
    category: Option<Value>,
    processor: Option<Value>,
    #[serde(rename = "Processor")]
    processor_upper: Option<Value>,
    graphics: Option<Value>,
    #[serde(rename = "GPU")]
    gpu: Option<Value>,
    ram: Option<Value>,
    storage: Option<Value>,
    display: Option<Value>,
    display_size: Option<Value>,
    #[serde(rename = "displaySize")]
    display_size_camel: Option<Value>,
    display_resolution: Option<Value>,
    #[serde(rename = "displayResolution")]
    display_resolution_camel: Option<Value>,
    price: Option<Value>,
    image_url: Option<Value>,
    #[serde(rename = "imageUrl")]
    image_url_camel: Option<Value>,
    in_stock: Option<Value>,
    #[serde(rename = "inStock")]
    in_stock_camel: Option<Value>,
    product_url: Option<Value>,
    #[serde(rename = "productUrl")]
    product_url_camel: Option<Value>,
    seller: Option<Value>,
    condition: Option<Value>,
}

impl RawProduct {
    /// Produces the canonical product, or `None` when the payload carries no
    /// usable id. Relative image paths are resolved against `api_base_url`.
    pub fn normalize(self, api_base_url: &str) -> Option<Product> {
        let id = first_text(self.id, self.id_upper)?;
        let image_url = first_text(self.image_url, self.image_url_camel)
            .map(|url| resolve_media_url(api_base_url, &url));

        Some(Product {
            id: LaptopId(id),
            name: first_text(self.name, self.model_upper).unwrap_or_default(),
            brand: first_text(self.brand, self.brand_upper).unwrap_or_default(),
            model: text(self.model),
            category: text(self.category),
            processor: first_text(self.processor, self.processor_upper),
            graphics: first_text(self.graphics, self.gpu),
            ram: text(self.ram),
            storage: text(self.storage),
            display: text(self.display),
            display_size: first_text(self.display_size, self.display_size_camel),
            display_resolution: first_text(
                self.display_resolution,
                self.display_resolution_camel,
            ),
            price: self.price.as_ref().and_then(number),
            image_url,
            in_stock: self
                .in_stock
                .as_ref()
                .or(self.in_stock_camel.as_ref())
                .and_then(flag)
                .unwrap_or(false),
            product_url: first_text(self.product_url, self.product_url_camel),
            seller: text(self.seller),
            condition: text(self.condition),
        })
    }
}

pub fn normalize_products(raw: Vec<RawProduct>, api_base_url: &str) -> Vec<Product> {
    raw.into_iter()
        .filter_map(|product| product.normalize(api_base_url))
        .collect()
}

/// Absolute URLs pass through; server-relative media paths are joined to the
/// API base.
pub fn resolve_media_url(api_base_url: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        return url.to_string();
    }
    let base = api_base_url.trim_end_matches('/');
    if url.starts_with('/') {
        format!("{base}{url}")
    } else {
        format!("{base}/{url}")
    }
}

fn text(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(raw) => {
            let trimmed = raw.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn first_text(primary: Option<Value>, fallback: Option<Value>) -> Option<String> {
    text(primary).or_else(|| text(fallback))
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(raw) => raw.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => number.as_i64().map(|n| n != 0),
        Value::String(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Laptops listing response: a paginated envelope or a bare array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ListingResponse {
    Paginated(PaginatedListing),
    Bare(Vec<RawProduct>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaginatedListing {
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<RawProduct>,
}

/// Normalized listing page.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListingPage {
    pub items: Vec<Product>,
    pub total_count: Option<u64>,
}

impl ListingResponse {
    pub fn into_page(self, api_base_url: &str) -> ListingPage {
        match self {
            ListingResponse::Paginated(page) => ListingPage {
                items: normalize_products(page.results, api_base_url),
                total_count: page.count,
            },
            ListingResponse::Bare(items) => ListingPage {
                items: normalize_products(items, api_base_url),
                total_count: None,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatbotRequest {
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChatbotResponse {
    pub laptops: Option<Vec<RawProduct>>,
    pub message: Option<String>,
    pub extracted_specs: Option<Value>,
    pub user_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChatbotReply {
    pub laptops: Vec<Product>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_specs: Option<Value>,
}

impl ChatbotResponse {
    pub fn into_reply(self, api_base_url: &str) -> ChatbotReply {
        ChatbotReply {
            laptops: normalize_products(self.laptops.unwrap_or_default(), api_base_url),
            message: self.message,
            extracted_specs: self.extracted_specs,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FavoriteToggleRequest {
    pub laptop_id: LaptopId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FavoriteStatus {
    Added,
    Removed,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FavoriteToggleResponse {
    pub status: FavoriteStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawFavorite {
    #[serde(default)]
    pub id: Option<i64>,
    pub laptop: RawProduct,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FavoritesResponse {
    Wrapped { results: Vec<RawFavorite> },
    Bare(Vec<RawFavorite>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Favorite {
    pub id: Option<i64>,
    pub laptop: Product,
    pub created_at: Option<DateTime<Utc>>,
}

impl FavoritesResponse {
    pub fn into_favorites(self, api_base_url: &str) -> Vec<Favorite> {
        let raw = match self {
            FavoritesResponse::Wrapped { results } => results,
            FavoritesResponse::Bare(results) => results,
        };
        raw.into_iter()
            .filter_map(|favorite| {
                let laptop = favorite.laptop.normalize(api_base_url)?;
                Some(Favorite {
                    id: favorite.id,
                    laptop,
                    created_at: favorite.created_at,
                })
            })
            .collect()
    }
}

/// Favorite id list entries may arrive as strings or numbers.
pub fn laptop_ids_from_values(values: Vec<Value>) -> Vec<LaptopId> {
    values
        .into_iter()
        .filter_map(|value| text(Some(value)))
        .map(LaptopId)
        .collect()
}

/// Password login; either the username or the email identifies the account.
#[derive(Clone, Serialize)]
pub struct LoginRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub password: String,
}

#[derive(Clone, Serialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Answer to both login and signup.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: AccountSummary,
    #[serde(default)]
    pub message: Option<String>,
}

/// Account changes; absent fields are left as they are. The password only
/// changes when both password fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileResponse {
    pub user: AccountSummary,
    #[serde(default)]
    pub message: Option<String>,
}

/// Answers collected by the guided laptop finder questionnaire.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FinderFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_min: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_max: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ram_min: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_min: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screen_size: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FinderRequest {
    pub query: String,
    pub filters: FinderFilters,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FinderResponse {
    pub results: Vec<RawProduct>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const BASE: &str = "http://shop.test/api";

    fn raw(value: Value) -> RawProduct {
        serde_json::from_value(value).expect("raw product")
    }

    #[test]
    fn normalizes_snake_and_camel_case_products_to_one_shape() {
        let snake = raw(json!({
            "id": "lap-1",
            "name": "Zenbook 14",
            "brand": "Asus",
            "price": "84999.0",
            "image_url": "https://cdn.test/zen.png",
            "in_stock": true,
            "display_size": "14",
            "display_resolution": "2880x1800",
            "product_url": "https://store.test/zen"
        }))
        .normalize(BASE)
        .expect("snake");
        let camel = raw(json!({
            "id": "lap-1",
            "name": "Zenbook 14",
            "brand": "Asus",
            "price": 84999.0,
            "imageUrl": "https://cdn.test/zen.png",
            "inStock": true,
            "displaySize": 14,
            "displayResolution": "2880x1800",
            "productUrl": "https://store.test/zen"
        }))
        .normalize(BASE)
        .expect("camel");

        assert_eq!(snake, camel);
        assert_eq!(snake.price, Some(84_999.0));
        assert_eq!(snake.display_size.as_deref(), Some("14"));
    }

    #[test]
    fn snake_case_wins_when_both_spellings_are_present() {
        let product = raw(json!({
            "id": 7,
            "image_url": "/media/a.png",
            "imageUrl": "/media/b.png",
            "in_stock": null,
            "inStock": true
        }))
        .normalize(BASE)
        .expect("product");

        assert_eq!(product.id.as_str(), "7");
        assert_eq!(
            product.image_url.as_deref(),
            Some("http://shop.test/api/media/a.png")
        );
        assert!(product.in_stock);
    }

    #[test]
    fn products_without_id_are_dropped() {
        let items = normalize_products(vec![raw(json!({"name": "nameless"}))], BASE);
        assert!(items.is_empty());
    }

    #[test]
    fn missing_image_falls_back_to_placeholder() {
        let product = raw(json!({"id": "x", "price": null}))
            .normalize(BASE)
            .expect("product");
        assert_eq!(product.image_or_placeholder(), PLACEHOLDER_IMAGE);
        assert_eq!(product.price, None);
    }

    #[test]
    fn finder_rows_use_dataset_column_names() {
        let product = raw(json!({
            "ID": "f-3",
            "Model": "Legion 5",
            "Brand": "Lenovo",
            "GPU": "RTX 4060",
            "price": 120000
        }))
        .normalize(BASE)
        .expect("product");
        assert_eq!(product.name, "Legion 5");
        assert_eq!(product.brand, "Lenovo");
        assert_eq!(product.graphics.as_deref(), Some("RTX 4060"));
    }

    #[test]
    fn listing_accepts_envelope_and_bare_array() {
        let wrapped: ListingResponse = serde_json::from_value(json!({
            "count": 41,
            "next": "http://shop.test/api/laptops/?page=2",
            "previous": null,
            "results": [{"id": "a"}]
        }))
        .expect("wrapped");
        let page = wrapped.into_page(BASE);
        assert_eq!(page.total_count, Some(41));
        assert_eq!(page.items.len(), 1);

        let bare: ListingResponse =
            serde_json::from_value(json!([{"id": "a"}, {"id": "b"}])).expect("bare");
        let page = bare.into_page(BASE);
        assert_eq!(page.total_count, None);
        assert_eq!(page.items.len(), 2);

        assert!(serde_json::from_value::<ListingResponse>(json!({"detail": "x"})).is_err());
    }

    #[test]
    fn favorite_ids_accept_numbers_and_strings() {
        let ids = laptop_ids_from_values(vec![json!("a1"), json!(5), json!(null)]);
        assert_eq!(ids, vec![LaptopId::from("a1"), LaptopId::from("5")]);
    }
}
