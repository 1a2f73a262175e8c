//! Products demo
//!
//! Runs the interceptor scenarios against a products backend, then drives the
//! in-memory real-time source.
//!
//! ```text
//! cargo run -p products-demo -- http://localhost:3000
//! RUST_LOG=relay=trace cargo run -p products-demo
//! ```

// Example-specific lint allowances
#![allow(missing_docs)]
#![allow(clippy::print_stdout)]

use std::time::Duration;

use relay::prelude::*;
use relay_data::{
    CrudClient, Mapper, MockRealtimeSource, PaginationParams, Product, ProductClient,
    ProductMapper,
};
use tracing_subscriber::EnvFilter;

const DEFAULT_API_URL: &str = "http://localhost:3000";

// ============================================================================
// Interceptor scenarios
// ============================================================================

/// Every request carries the standard headers.
async fn headers_demo(pipeline: &Pipeline, api: &str) -> Result<u16, NormalizedError> {
    let response = pipeline.get(&format!("{api}/api/test-headers")).await?;
    Ok(response.status())
}

/// The bearer token is attached only while the store holds one.
///
/// Returns the status seen with and without a token.
async fn auth_demo(pipeline: &Pipeline, api: &str) -> (Option<u16>, Option<u16>) {
    let url = format!("{api}/api/protected");

    pipeline.tokens().set("demo-token");
    let with_token = status_of(pipeline.get(&url).await);

    // Cached responses are keyed by URL only
    pipeline.tokens().clear();
    pipeline.cache().clear();
    let without_token = status_of(pipeline.get(&url).await);

    (with_token, without_token)
}

/// A repeated GET inside the TTL is served from the cache.
async fn cache_demo(pipeline: &Pipeline, api: &str) -> Result<usize, NormalizedError> {
    let url = format!("{api}/api/test-cache?t=1000");
    pipeline.get(&url).await?;
    pipeline.get(&url).await?;
    Ok(pipeline.cache().len())
}

/// Three concurrent requests keep the loading flag up until the last settles.
async fn loading_demo(pipeline: &Pipeline, api: &str) -> usize {
    let mut loading = pipeline.loading().subscribe();
    let watcher = tokio::spawn(async move {
        while loading.changed().await.is_ok() {
            println!("  loading = {}", *loading.borrow_and_update());
        }
    });

    let page_1 = format!("{api}/api/products?page=1");
    let page_2 = format!("{api}/api/products?page=2");
    let page_3 = format!("{api}/api/products?page=3");
    let (a, b, c) = tokio::join!(
        pipeline.get(&page_1),
        pipeline.get(&page_2),
        pipeline.get(&page_3),
    );
    for (page, result) in [a, b, c].into_iter().enumerate() {
        println!("  page {} -> {:?}", page + 1, status_of(result));
    }
    watcher.abort();
    pipeline.loading().count()
}

fn status_of(result: Result<Response, NormalizedError>) -> Option<u16> {
    match result {
        Ok(response) => Some(response.status()),
        Err(err) => {
            println!("  {err}");
            err.status()
        }
    }
}

// ============================================================================
// Data access
// ============================================================================

async fn crud_demo(products: &ProductClient) -> Result<Vec<Product>, relay_data::DataError> {
    products.get_all(&PaginationParams::page(1, 10)).await
}

fn sample_products() -> Vec<Product> {
    [
        ("1", "Laptop Pro", 129_999, 4, "electronics"),
        ("2", "Smartphone XZ", 89_999, 12, "electronics"),
        ("3", "Headphones Pro", 29_999, 0, "accessories"),
    ]
    .into_iter()
    .map(|(id, name, price_cents, stock_quantity, category)| {
        ProductMapper.from_dto(relay_data::ProductDto {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            price_cents,
            category: category.to_string(),
            stock_quantity,
            image_url: format!("https://cdn.example.com/products/{id}.png"),
            created_at: String::new(),
            updated_at: String::new(),
        })
    })
    .collect()
}

async fn realtime_demo() -> usize {
    let source = MockRealtimeSource::new(sample_products()).with_period(Duration::from_secs(1));
    let mut data = source.data();
    source.start();

    if data.changed().await.is_ok() {
        println!("  initial: {} products", data.borrow_and_update().len());
    }

    let mut headset = sample_products().remove(2);
    headset.id = "4".to_string();
    headset.name = "Headset".to_string();
    source.add(headset);
    source.update(
        |product| product.id == "3",
        |product| {
            product.stock_quantity = 5;
            product.in_stock = true;
        },
    );
    source.remove(|product| product.id == "1");

    for product in source.current() {
        println!(
            "  {} {} {} in_stock={}",
            product.id, product.name, product.formatted_price, product.in_stock
        );
    }
    source.stop();
    source.current().len()
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,relay=debug")),
        )
        .init();

    let api = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    let pipeline = Pipeline::builder().timeout(Duration::from_secs(5)).build();

    println!("=== Headers ===");
    match headers_demo(&pipeline, &api).await {
        Ok(status) => println!("  status: {status}"),
        Err(err) => println!("  {err}"),
    }

    println!("=== Auth ===");
    let (with_token, without_token) = auth_demo(&pipeline, &api).await;
    println!("  with token: {with_token:?}, without token: {without_token:?}");

    println!("=== Cache ===");
    match cache_demo(&pipeline, &api).await {
        Ok(entries) => println!("  cached entries: {entries}"),
        Err(err) => println!("  not cached: {err}"),
    }

    println!("=== Loading ===");
    println!(
        "  in flight after join: {}",
        loading_demo(&pipeline, &api).await
    );

    println!("=== Products ===");
    let products = CrudClient::new(
        pipeline.clone(),
        format!("{api}/api/products"),
        ProductMapper,
    );
    match crud_demo(&products).await {
        Ok(items) => println!("  fetched {} products", items.len()),
        Err(err) => println!("  {err}"),
    }

    println!("=== Real-time (mock) ===");
    println!("  final count: {}", realtime_demo().await);
}

// ============================================================================
// Tests using wiremock
// ============================================================================
