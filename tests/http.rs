use std::time::Duration;

use catalog_harvester::{
    fetch_products, Client, Error, HarvestOptions, Harvester, PriceRange, ProductSource,
};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Serves a fixed price list, honouring `minPrice`/`maxPrice` and the result cap.
struct CatalogResponder {
    prices: Vec<f64>,
    limit: usize,
}

impl CatalogResponder {
    fn spaced(count: usize) -> Self {
        Self {
            prices: (0..count).map(|i| i as f64 + 0.5).collect(),
            limit: 1000,
        }
    }
}

impl Respond for CatalogResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let param = |name: &str| {
            request
                .url
                .query_pairs()
                .find(|(k, _)| k == name)
                .and_then(|(_, v)| v.parse::<f64>().ok())
        };
        let (Some(min), Some(max)) = (param("minPrice"), param("maxPrice")) else {
            return ResponseTemplate::new(400).set_body_json(json!({"error": "missing range"}));
        };

        let matching: Vec<_> = self
            .prices
            .iter()
            .enumerate()
            .filter(|(_, p)| **p >= min && **p <= max)
            .collect();
        let products: Vec<_> = matching
            .iter()
            .take(self.limit)
            .map(|(id, price)| json!({"id": id, "price": price, "tags": [], "brand": null}))
            .collect();

        ResponseTemplate::new(200).set_body_json(json!({
            "total": matching.len(),
            "count": products.len(),
            "products": products,
        }))
    }
}

async fn catalog_server(responder: CatalogResponder) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .and(header("content-type", "application/json"))
        .respond_with(responder)
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn client_sends_range_as_decimal_query_params() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .and(query_param("minPrice", "1000.01"))
        .and(query_param("maxPrice", "1250.5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 1,
            "count": 1,
            "products": [{"sku": "A-1", "variants": [{"size": "M"}]}],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::builder()
        .url(format!("{}/products", server.uri()))
        .build()
        .unwrap();
    let result = client
        .fetch_range(PriceRange::from_f64(1000.01, 1250.5).unwrap())
        .await
        .unwrap();

    assert_eq!(result.total, 1);
    assert_eq!(result.products[0]["sku"], json!("A-1"));
}

#[tokio::test]
async fn client_maps_error_statuses() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
        .mount(&server)
        .await;

    let client = Client::builder().url(server.uri()).build().unwrap();
    let err = client
        .fetch_range(PriceRange::from_f64(0.0, 1.0).unwrap())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::RateLimit { retry_after: 7, .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn client_rejects_body_without_counts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"products": []})))
        .mount(&server)
        .await;

    let client = Client::builder().url(server.uri()).build().unwrap();
    let err = client
        .fetch_range(PriceRange::from_f64(0.0, 1.0).unwrap())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Json(_)));
}

#[tokio::test]
async fn client_times_out_on_slow_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(250))
                .set_body_json(json!({"total": 0, "count": 0, "products": []})),
        )
        .mount(&server)
        .await;

    let client = Client::builder()
        .url(server.uri())
        .timeout(Duration::from_millis(50))
        .build()
        .unwrap();
    let err = client
        .fetch_range(PriceRange::from_f64(0.0, 1.0).unwrap())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Timeout));
}

#[tokio::test]
async fn harvests_large_catalog_over_http() {
    let server = catalog_server(CatalogResponder::spaced(3500)).await;

    let products = fetch_products(
        HarvestOptions::new(0.0, 100_000.0).url(format!("{}/products", server.uri())),
    )
    .await
    .unwrap();

    assert_eq!(products.len(), 3500);
    let ids: Vec<u64> = products.iter().map(|p| p["id"].as_u64().unwrap()).collect();
    assert_eq!(ids, (0..3500).collect::<Vec<_>>());

    // One full-range query, then four passes of width 1000.
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 5);
}

#[tokio::test]
async fn small_catalog_is_returned_from_single_request() {
    let server = catalog_server(CatalogResponder::spaced(12)).await;

    let products = fetch_products(
        HarvestOptions::new(0.0, 50.0).url(format!("{}/products", server.uri())),
    )
    .await
    .unwrap();

    assert_eq!(products.len(), 12);
    assert_eq!(products[0]["brand"], json!(null));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn server_errors_are_retried_within_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(CatalogResponder::spaced(10))
        .mount(&server)
        .await;

    let harvester = Harvester::from_options(
        HarvestOptions::new(0.0, 100.0)
            .url(server.uri())
            .retry_delay(Duration::from_millis(5)),
    )
    .unwrap();
    let products = harvester.run().await.unwrap();

    assert_eq!(products.len(), 10);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn exhausted_retries_abort_with_failed_range() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "boom"})))
        .mount(&server)
        .await;

    let err = fetch_products(
        HarvestOptions::new(0.0, 100.0)
            .url(server.uri())
            .retries(2)
            .retry_delay(Duration::from_millis(5)),
    )
    .await
    .unwrap_err();

    match err {
        Error::FetchFailed {
            range,
            attempts,
            source,
        } => {
            assert_eq!(range, PriceRange::from_f64(0.0, 100.0).unwrap());
            assert_eq!(attempts, 2);
            assert!(
                matches!(*source, Error::Api { status: 500, ref message } if message == "boom")
            );
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn zero_retries_and_iterations_fall_back_to_defaults() {
    let server = catalog_server(CatalogResponder::spaced(1)).await;

    let products = fetch_products(
        HarvestOptions::new(0.0, 10.0)
            .url(format!("{}/products", server.uri()))
            .retries(0)
            .max_iterations(0),
    )
    .await
    .unwrap();

    assert_eq!(products.len(), 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}
