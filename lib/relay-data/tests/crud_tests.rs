//! CRUD client tests against a mock backend.

use std::time::Duration;

use assert2::{check, let_assert};
use relay::{ErrorKind, HeaderMap, HeaderValue, Pipeline, PipelineConfig};
use relay_data::{
    CrudClient, DataError, PaginationParams, ProductClient, ProductDraft, ProductMapper,
    SortOrder,
};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, header, method, path, query_param},
};

fn product(id: &str, price_cents: i64, stock_quantity: u32) -> serde_json::Value {
    json!({
        "id": id,
        "name": format!("Product {id}"),
        "description": "demo",
        "price_cents": price_cents,
        "category": "electronics",
        "stock_quantity": stock_quantity,
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-01T00:00:00Z",
    })
}

fn products(server: &MockServer) -> ProductClient {
    let pipeline = Pipeline::builder()
        .config(PipelineConfig::default().with_retry(0, Duration::ZERO))
        .build();
    CrudClient::new(
        pipeline,
        format!("{}/api/products", server.uri()),
        ProductMapper,
    )
}

#[tokio::test]
async fn get_all_sends_pagination_and_maps_items() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/products"))
        .and(query_param("page", "1"))
        .and(query_param("limit", "10"))
        .and(query_param("sort", "price"))
        .and(query_param("order", "asc"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([product("1", 129_999, 5), product("2", 500, 0)])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = products(&mock_server);
    let params = PaginationParams::page(1, 10).sorted_by("price", SortOrder::Asc);
    let items = client.get_all(&params).await.expect("products");

    check!(items.len() == 2);
    check!(items[0].formatted_price == "$1299.99");
    check!(items[0].in_stock);
    check!(!items[1].in_stock);
}

#[tokio::test]
async fn get_all_paginated_reads_metadata() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/products"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [product("3", 1000, 1)],
            "total": 21,
            "page": 2,
            "limit": 20,
            "totalPages": 2,
        })))
        .mount(&mock_server)
        .await;

    let client = products(&mock_server);
    let page = client
        .get_all_paginated(&PaginationParams::page(2, 20))
        .await
        .expect("page");

    check!(page.total == 21);
    check!(page.total_pages == 2);
    check!(page.data[0].price == 10.0);
}

#[tokio::test]
async fn get_by_id_not_found_is_a_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/products/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let client = products(&mock_server);
    let_assert!(Err(DataError::Request(err)) = client.get_by_id("missing").await);

    check!(err.kind() == ErrorKind::Server);
    check!(err.status() == Some(404));
}

#[tokio::test]
async fn create_sends_wire_format() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/products"))
        .and(header("Content-Type", "application/json"))
        .and(body_json(json!({"name": "Mouse", "price_cents": 2500})))
        .respond_with(ResponseTemplate::new(201).set_body_json(product("9", 2500, 0)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = products(&mock_server);
    let draft = ProductDraft {
        name: Some("Mouse".into()),
        price: Some(25.0),
        ..ProductDraft::default()
    };
    let created = client.create(&draft).await.expect("created");

    check!(created.id == "9");
    check!(created.formatted_price == "$25.00");
}

#[tokio::test]
async fn update_and_patch_target_the_item() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/api/products/4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(product("4", 100, 1)))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/products/4"))
        .and(body_json(json!({"stock_quantity": 0})))
        .respond_with(ResponseTemplate::new(200).set_body_json(product("4", 100, 0)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = products(&mock_server);
    let draft = ProductDraft {
        price: Some(1.0),
        ..ProductDraft::default()
    };
    check!(client.update(4, &draft).await.expect("updated").in_stock);

    let draft = ProductDraft {
        stock_quantity: Some(0),
        ..ProductDraft::default()
    };
    check!(!client.patch(4, &draft).await.expect("patched").in_stock);
}

#[tokio::test]
async fn delete_accepts_no_content() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/products/4"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = products(&mock_server);
    let_assert!(Ok(()) = client.delete(4).await);
}

#[tokio::test]
async fn bulk_operations_use_the_bulk_endpoint() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/products/bulk"))
        .and(body_json(json!([{"name": "A"}, {"name": "B"}])))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!([product("10", 100, 1), product("11", 200, 1)])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/products/bulk"))
        .and(body_json(json!({"ids": ["10", "11"]})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = products(&mock_server);
    let drafts = [
        ProductDraft {
            name: Some("A".into()),
            ..ProductDraft::default()
        },
        ProductDraft {
            name: Some("B".into()),
            ..ProductDraft::default()
        },
    ];
    let created = client.bulk_create(&drafts).await.expect("created");
    check!(created.len() == 2);

    let ids: Vec<&str> = created.iter().map(|p| p.id.as_str()).collect();
    let_assert!(Ok(()) = client.bulk_delete(&ids).await);
}

#[tokio::test]
async fn filters_are_sent_as_query_parameters() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/products"))
        .and(query_param("category", "audio"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([product("5", 100, 1)])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = products(&mock_server);
    let items = client.by_category("audio").await.expect("products");
    check!(items.len() == 1);
}

#[tokio::test]
async fn in_stock_filter_uses_camel_case_key() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/products"))
        .and(query_param("inStock", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([product("5", 100, 1)])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = products(&mock_server);
    let items = client.in_stock().await.expect("products");
    check!(items.len() == 1);
}

#[tokio::test]
async fn extra_headers_are_sent_with_the_call() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/products/5"))
        .and(header("X-Request-Id", "42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(product("5", 100, 1)))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/products/5"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = products(&mock_server);
    let mut headers = HeaderMap::new();
    headers.insert("X-Request-Id", HeaderValue::from_static("42"));

    let found = client
        .clone()
        .with_headers(headers)
        .get_by_id(5)
        .await
        .expect("product");
    check!(found.id == "5");

    // The original client is unaffected
    check!(client.headers().is_empty());
    let_assert!(Ok(()) = client.delete(5).await);

    let requests = mock_server
        .received_requests()
        .await
        .expect("recording enabled");
    let delete = requests.last().expect("delete request");
    check!(!delete.headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/products/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "1"})))
        .mount(&mock_server)
        .await;

    let client = products(&mock_server);
    let_assert!(Err(DataError::Decode(err)) = client.get_by_id(1).await);
    check!(err.to_string().contains("name"));
}
