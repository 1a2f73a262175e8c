//! Data access on top of the [`relay`] pipeline.
//!
//! - [`CrudClient`]: typed REST collection client with DTO mapping.
//! - [`ProductMapper`] and [`Product`]: the product resource.
//! - [`MockRealtimeSource`] and [`PollingRealtimeSource`]: live lists
//!   published through `tokio::sync::watch` channels.
//! - [`WsMultiplexer`]: one WebSocket connection shared by typed subscribers.
//!
//! # Example
//!
//! ```ignore
//! use relay::Pipeline;
//! use relay_data::{CrudClient, PollingRealtimeSource, ProductMapper, RealtimeConfig};
//!
//! let products = CrudClient::new(Pipeline::default(), "http://localhost:8080/api/products", ProductMapper);
//! let live = PollingRealtimeSource::new(products, RealtimeConfig::default());
//! live.start();
//!
//! let mut data = live.data();
//! while data.changed().await.is_ok() {
//!     println!("{} products", data.borrow().len());
//! }
//! ```

mod crud;
mod error;
mod product;
mod realtime;
mod websocket;

pub use self::crud::{
    CrudClient, Identity, Mapper, PaginatedResponse, PaginationParams, SortOrder,
};
pub use self::error::{DataError, Result};
pub use self::product::{
    Product, ProductClient, ProductDraft, ProductDraftDto, ProductDto, ProductMapper,
};
pub use self::realtime::{
    DEFAULT_POLLING_INTERVAL, DEFAULT_WEBSOCKET_EVENT, MockRealtimeSource,
    PollingRealtimeSource, RealtimeConfig,
};
pub use self::websocket::{
    DEFAULT_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_INTERVAL, WebSocketMessage, WsConfig,
    WsMultiplexer,
};
