//! Real-time data sources.
//!
//! Both sources publish the same three [`watch`] projections: the current
//! items, a loading flag and the last error.
//!
//! - [`MockRealtimeSource`]: in-memory list re-published by a ticker and on
//!   every local mutation. No network I/O.
//! - [`PollingRealtimeSource`]: merges a [`WsMultiplexer`](crate::WsMultiplexer)
//!   message stream with periodic [`CrudClient::get_all`](crate::CrudClient::get_all)
//!   calls, dropping consecutive duplicates.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::DataError;

mod mock;
mod polling;

pub use self::mock::MockRealtimeSource;
pub use self::polling::PollingRealtimeSource;

/// Default ticker and polling period.
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(30);

/// Default WebSocket message type carrying updates.
pub const DEFAULT_WEBSOCKET_EVENT: &str = "data:updated";

/// Settings for [`PollingRealtimeSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeConfig {
    /// Subscribe to WebSocket updates. Requires `websocket_url`.
    pub use_websocket: bool,
    /// WebSocket server URL.
    pub websocket_url: Option<String>,
    /// Message type carrying updates.
    pub websocket_event: String,
    /// Poll the collection periodically.
    pub use_polling: bool,
    /// Polling period.
    pub polling_interval: Duration,
    /// Start as soon as the source is created.
    pub auto_start: bool,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            use_websocket: false,
            websocket_url: None,
            websocket_event: DEFAULT_WEBSOCKET_EVENT.to_string(),
            use_polling: true,
            polling_interval: DEFAULT_POLLING_INTERVAL,
            auto_start: false,
        }
    }
}

impl RealtimeConfig {
    /// Enable WebSocket updates from `url`.
    #[must_use]
    pub fn with_websocket(mut self, url: impl Into<String>) -> Self {
        self.use_websocket = true;
        self.websocket_url = Some(url.into());
        self
    }

    /// Set the WebSocket message type.
    #[must_use]
    pub fn with_websocket_event(mut self, event: impl Into<String>) -> Self {
        self.websocket_event = event.into();
        self
    }

    /// Enable or disable polling.
    #[must_use]
    pub const fn with_polling(mut self, enabled: bool) -> Self {
        self.use_polling = enabled;
        self
    }

    /// Set the polling period.
    #[must_use]
    pub const fn with_polling_interval(mut self, interval: Duration) -> Self {
        self.polling_interval = interval;
        self
    }

    /// Start on construction.
    #[must_use]
    pub const fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    fn websocket_url(&self) -> Option<&str> {
        self.websocket_url.as_deref().filter(|_| self.use_websocket)
    }
}

/// The three published projections.
#[derive(Debug)]
struct Projections<T> {
    data: watch::Sender<Vec<T>>,
    loading: watch::Sender<bool>,
    error: watch::Sender<Option<Arc<DataError>>>,
}

impl<T> Projections<T> {
    fn new(initial: Vec<T>) -> Self {
        Self {
            data: watch::Sender::new(initial),
            loading: watch::Sender::new(false),
            error: watch::Sender::new(None),
        }
    }

    fn publish(&self, items: Vec<T>) {
        self.data.send_replace(items);
        self.set_loading(false);
    }

    fn set_loading(&self, loading: bool) {
        self.loading.send_if_modified(|current| {
            let changed = *current != loading;
            *current = loading;
            changed
        });
    }

    fn fail(&self, err: DataError) {
        self.error.send_replace(Some(Arc::new(err)));
        self.set_loading(false);
    }

    fn clear_error(&self) {
        self.error.send_if_modified(|current| current.take().is_some());
    }
}

impl<T: PartialEq> Projections<T> {
    /// Publish unless `items` equals the current value. Returns `true` when
    /// published.
    fn publish_if_changed(&self, items: Vec<T>) -> bool {
        let changed = self.data.send_if_modified(|current| {
            if *current == items {
                false
            } else {
                *current = items;
                true
            }
        });
        self.set_loading(false);
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = RealtimeConfig::default();

        assert!(!config.use_websocket);
        assert!(config.use_polling);
        assert_eq!(config.websocket_event, "data:updated");
        assert_eq!(config.polling_interval, Duration::from_secs(30));
        assert!(!config.auto_start);
        assert_eq!(config.websocket_url(), None);
    }

    #[test]
    fn websocket_url_requires_the_flag() {
        let mut config = RealtimeConfig::default().with_websocket("ws://localhost:3000");
        assert_eq!(config.websocket_url(), Some("ws://localhost:3000"));

        config.use_websocket = false;
        assert_eq!(config.websocket_url(), None);
    }

    #[test]
    fn identical_items_are_not_republished() {
        let projections = Projections::new(vec![1, 2]);
        let mut data = projections.data.subscribe();
        data.mark_unchanged();

        assert!(!projections.publish_if_changed(vec![1, 2]));
        assert!(!data.has_changed().expect("open"));

        assert!(projections.publish_if_changed(vec![1, 2, 3]));
        assert!(data.has_changed().expect("open"));
    }

    #[test]
    fn failure_clears_loading() {
        let projections = Projections::new(Vec::<u8>::new());
        projections.set_loading(true);

        projections.fail(DataError::NotConnected);

        assert!(!*projections.loading.borrow());
        assert!(projections.error.borrow().is_some());

        projections.clear_error();
        assert!(projections.error.borrow().is_none());
    }
}
