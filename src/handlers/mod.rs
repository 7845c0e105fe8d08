pub mod adjustments;
pub mod deliveries;
pub mod health;
pub mod movements;
pub mod products;
pub mod receipts;
pub mod reports;
pub mod stock;
pub mod transfers;
pub mod warehouses;

use axum::http::HeaderMap;
use axum::Router;
use uuid::Uuid;

pub use crate::AppState;

/// Header carrying the opaque actor id supplied by the authentication
/// collaborator in front of this service. Every mutation records it.
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Actor id for the current request; the nil UUID when the header is
/// absent or unparseable (anonymous/system caller).
pub fn actor_from_headers(headers: &HeaderMap) -> Uuid {
    headers
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Uuid::parse_str(value).ok())
        .unwrap_or_else(Uuid::nil)
}

/// Assembles the versioned API surface.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/products", products::router())
        .nest("/warehouses", warehouses::router())
        .nest("/receipts", receipts::router())
        .nest("/deliveries", deliveries::router())
        .nest("/transfers", transfers::router())
        .nest("/adjustments", adjustments::router())
        .nest("/stock", stock::router())
        .nest("/movements", movements::router())
        .nest("/reports", reports::router())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn actor_defaults_to_nil_without_header() {
        let headers = HeaderMap::new();
        assert_eq!(actor_from_headers(&headers), Uuid::nil());
    }

    #[test]
    fn actor_parses_valid_uuid() {
        let actor = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            ACTOR_HEADER,
            HeaderValue::from_str(&actor.to_string()).unwrap(),
        );
        assert_eq!(actor_from_headers(&headers), actor);
    }

    #[test]
    fn actor_ignores_garbage_header() {
        let mut headers = HeaderMap::new();
        headers.insert(ACTOR_HEADER, HeaderValue::from_static("not-a-uuid"));
        assert_eq!(actor_from_headers(&headers), Uuid::nil());
    }
}
