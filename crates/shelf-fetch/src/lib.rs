//! Remote catalog retrieval for Shelfview.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use shelf_core::Product;
use thiserror::Error;

/// Public catalog endpoint used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "https://dummyjson.com";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Result type for fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// Errors returned while loading the remote catalog.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request could not be sent or the connection failed.
    #[error("catalog request failed: {0}")]
    Transport(String),
    /// The source answered with a non-success status.
    #[error("catalog returned status {status} for {url}")]
    Status { status: u16, url: String },
    /// The response body was not a product page.
    #[error("malformed catalog response: {0}")]
    Decode(String),
}

/// One page of the catalog as returned by `GET /products`.
#[derive(Debug, Deserialize)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub total: u64,
}

/// A place the full product collection can be loaded from.
#[allow(async_fn_in_trait)]
pub trait CatalogSource {
    /// Return the source name.
    fn name(&self) -> &'static str;
    /// Load every product the source exposes.
    async fn fetch_all(&self) -> FetchResult<Vec<Product>>;
}

/// Catalog source speaking the DummyJSON `/products` API.
#[derive(Debug, Clone)]
pub struct DummyJsonSource {
    client: Client,
    base_url: String,
}

impl DummyJsonSource {
    /// Create a source for `base_url` with the default timeout.
    pub fn new(base_url: impl Into<String>) -> FetchResult<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Create a source for `base_url` with a custom per-request timeout.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| FetchError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Request a single page holding at most `limit` products.
    pub async fn fetch_page(&self, limit: u64) -> FetchResult<ProductPage> {
        let url = format!("{}/products", self.base_url.trim_end_matches('/'));
        tracing::debug!(%url, limit, "requesting product page");
        let response = self
            .client
            .get(&url)
            .query(&[("limit", limit)])
            .send()
            .await
            .map_err(|err| FetchError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url,
            });
        }

        response
            .json::<ProductPage>()
            .await
            .map_err(|err| FetchError::Decode(err.to_string()))
    }
}

impl CatalogSource for DummyJsonSource {
    fn name(&self) -> &'static str {
        "dummyjson"
    }

    /// Probe the total with `limit=0`, then ask for exactly that many products.
    async fn fetch_all(&self) -> FetchResult<Vec<Product>> {
        let probe = self.fetch_page(0).await.inspect_err(|err| {
            tracing::error!(source = self.name(), %err, "failed to probe catalog size");
        })?;
        let page = self.fetch_page(probe.total).await.inspect_err(|err| {
            tracing::error!(source = self.name(), %err, "failed to fetch products");
        })?;
        tracing::info!(
            source = self.name(),
            total = probe.total,
            received = page.products.len(),
            "catalog loaded"
        );
        Ok(page.products)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn product_json(id: u64, title: &str) -> serde_json::Value {
        json!({
            "id": id,
            "title": title,
            "description": "",
            "price": 10.5,
            "discountPercentage": 0.0,
            "rating": 4.0,
            "stock": 3,
            "brand": "Acme",
            "category": "tools",
            "thumbnail": "https://cdn.example.com/t.png",
            "images": []
        })
    }

    #[tokio::test]
    async fn second_request_asks_for_probed_total() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products"))
            .and(query_param("limit", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "products": [],
                "total": 2,
                "skip": 0,
                "limit": 0
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/products"))
            .and(query_param("limit", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "products": [product_json(1, "Hammer"), product_json(2, "Saw")],
                "total": 2,
                "skip": 0,
                "limit": 2
            })))
            .expect(1)
            .mount(&server)
            .await;

        let source = DummyJsonSource::new(server.uri()).unwrap();
        let products = source.fetch_all().await.unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[1].title, "Saw");
    }

    #[tokio::test]
    async fn server_error_on_probe_aborts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let source = DummyJsonSource::new(server.uri()).unwrap();
        let result = source.fetch_all().await;
        assert!(matches!(result, Err(FetchError::Status { status: 503, .. })));
    }

    async fn mount_probe(server: &MockServer, total: u64) {
        Mock::given(method("GET"))
            .and(path("/products"))
            .and(query_param("limit", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "products": [],
                "total": total,
                "skip": 0,
                "limit": 0
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn server_error_on_full_page_aborts() {
        let server = MockServer::start().await;
        mount_probe(&server, 5).await;
        Mock::given(method("GET"))
            .and(path("/products"))
            .and(query_param("limit", "5"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let source = DummyJsonSource::new(server.uri()).unwrap();
        let result = source.fetch_all().await;
        assert!(matches!(result, Err(FetchError::Status { status: 500, .. })));
    }

    #[tokio::test]
    async fn malformed_full_page_is_a_decode_error() {
        let server = MockServer::start().await;
        mount_probe(&server, 5).await;
        Mock::given(method("GET"))
            .and(path("/products"))
            .and(query_param("limit", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .expect(1)
            .mount(&server)
            .await;

        let source = DummyJsonSource::new(server.uri()).unwrap();
        let result = source.fetch_all().await;
        assert!(matches!(result, Err(FetchError::Decode(_))));
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let source = DummyJsonSource::new(format!("{}/", server.uri())).unwrap();
        let result = source.fetch_all().await;
        assert!(matches!(result, Err(FetchError::Decode(_))));
    }

    #[tokio::test]
    async fn unreachable_source_is_a_transport_error() {
        let source =
            DummyJsonSource::with_timeout("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let result = source.fetch_all().await;
        assert!(matches!(result, Err(FetchError::Transport(_))));
    }
}
