use std::fmt;

use shared::domain::LaptopId;
use url::form_urlencoded;

/// Navigation request emitted by the client core; rendering and routing are
/// up to the front-end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Listing { query: String },
    Product { id: LaptopId, from_chatbot: bool },
    Compare { first: LaptopId, second: LaptopId },
    /// `return_to` is the path to go back to after signing in.
    Login { return_to: String },
    /// Login screen showing why a sign-in attempt failed.
    LoginFailed { error: String },
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::Listing { query } if query.is_empty() => "/products".to_string(),
            Route::Listing { query } => format!("/products?{query}"),
            Route::Product {
                id,
                from_chatbot: true,
            } => format!("/product/{id}?source=chatbot"),
            Route::Product { id, .. } => format!("/product/{id}"),
            Route::Compare { first, second } => format!("/compare/{first}/{second}"),
            Route::Login { .. } => "/login".to_string(),
            Route::LoginFailed { error } => {
                let query = form_urlencoded::Serializer::new(String::new())
                    .append_pair("error", error)
                    .finish();
                format!("/login?{query}")
            }
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_match_front_end_routes() {
        assert_eq!(
            Route::Listing {
                query: String::new()
            }
            .path(),
            "/products"
        );
        assert_eq!(
            Route::Listing {
                query: "brand=HP".into()
            }
            .path(),
            "/products?brand=HP"
        );
        assert_eq!(
            Route::Product {
                id: "42".into(),
                from_chatbot: true
            }
            .to_string(),
            "/product/42?source=chatbot"
        );
        assert_eq!(
            Route::Compare {
                first: "1".into(),
                second: "2".into()
            }
            .path(),
            "/compare/1/2"
        );
        assert_eq!(Route::Home.path(), "/");
        assert_eq!(
            Route::LoginFailed {
                error: "Authentication failed".into()
            }
            .path(),
            "/login?error=Authentication+failed"
        );
    }
}
