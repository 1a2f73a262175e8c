use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use relay::{HttpClient, NormalizedError, Pipeline};
use serde::Deserialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{Projections, RealtimeConfig};
use crate::{CrudClient, DataError, Mapper, PaginationParams, WsConfig, WsMultiplexer};

const MIN_POLLING_INTERVAL: Duration = Duration::from_millis(1);

/// WebSocket payload: a full list or a single item.
#[derive(Deserialize)]
#[serde(untagged)]
enum Payload<D> {
    Many(Vec<D>),
    One(D),
}

/// Real-time source backed by a REST collection.
///
/// Once started, merges two producers:
///
/// - messages of type `websocket_event` from a [`WsMultiplexer`], when
///   `use_websocket` is set and a URL is configured;
/// - a `get_all` call every `polling_interval`, the first one immediately,
///   when `use_polling` is set.
///
/// Consecutive identical lists are published once. A failed poll is
/// published on [`error`](Self::error) and polling continues. With neither
/// producer enabled, starting fetches the collection once.
pub struct PollingRealtimeSource<M: Mapper, C = Pipeline> {
    feed: Feed<M, C>,
    websocket: WsMultiplexer,
    config: RealtimeConfig,
    task: Mutex<Option<JoinHandle<()>>>,
}

struct Feed<M: Mapper, C> {
    client: Arc<CrudClient<M, C>>,
    projections: Arc<Projections<M::Model>>,
}

impl<M: Mapper, C> Clone for Feed<M, C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            projections: Arc::clone(&self.projections),
        }
    }
}

impl<M, C> Feed<M, C>
where
    M: Mapper + 'static,
    M::Model: Clone + PartialEq + Send + Sync + 'static,
    M::Dto: Send + 'static,
    C: HttpClient<Error = NormalizedError> + 'static,
{
    async fn poll(&self) {
        debug!(url = self.client.base_url(), "polling collection");
        match self.client.get_all(&PaginationParams::default()).await {
            Ok(items) => self.accept(items, "polling"),
            Err(err) => {
                error!(url = self.client.base_url(), %err, "polling failed");
                self.projections.fail(err);
            }
        }
    }

    fn accept(&self, items: Vec<M::Model>, source: &'static str) {
        let count = items.len();
        if self.projections.publish_if_changed(items) {
            info!(source, items = count, "data updated");
        }
        self.projections.clear_error();
    }

    fn updates(
        &self,
        websocket: &WsMultiplexer,
        event: &str,
    ) -> BoxStream<'static, Vec<M::Model>> {
        let client = Arc::clone(&self.client);
        websocket
            .on::<Payload<M::Dto>>(event)
            .map(move |payload| {
                let mapper = client.mapper();
                match payload {
                    Payload::Many(dtos) => {
                        dtos.into_iter().map(|dto| mapper.from_dto(dto)).collect()
                    }
                    Payload::One(dto) => vec![mapper.from_dto(dto)],
                }
            })
            .boxed()
    }

    async fn run(self, websocket: WsMultiplexer, config: RealtimeConfig) {
        let mut updates = match config.websocket_url() {
            Some(url) => {
                let updates = self.updates(&websocket, &config.websocket_event);
                if let Err(err) = websocket.connect(WsConfig::new(url)).await {
                    warn!(url, %err, "WebSocket unavailable");
                    self.projections.fail(err);
                }
                updates
            }
            None => stream::pending().boxed(),
        };

        if config.websocket_url().is_none() && !config.use_polling {
            self.poll().await;
            return;
        }

        let period = config.polling_interval.max(MIN_POLLING_INTERVAL);
        let mut ticker = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = ticker.tick(), if config.use_polling => self.poll().await,
                update = updates.next() => match update {
                    Some(items) => self.accept(items, "websocket"),
                    None if config.use_polling => updates = stream::pending().boxed(),
                    None => return,
                },
            }
        }
    }
}

impl<M, C> PollingRealtimeSource<M, C>
where
    M: Mapper + 'static,
    M::Model: Clone + PartialEq + Send + Sync + 'static,
    M::Dto: Send + 'static,
    C: HttpClient<Error = NormalizedError> + 'static,
{
    /// Create a source with its own WebSocket connection.
    ///
    /// Starts immediately when `config.auto_start` is set, which requires a
    /// tokio runtime.
    pub fn new(client: CrudClient<M, C>, config: RealtimeConfig) -> Self {
        Self::with_websocket(client, WsMultiplexer::new(), config)
    }

    /// Create a source sharing an existing [`WsMultiplexer`].
    pub fn with_websocket(
        client: CrudClient<M, C>,
        websocket: WsMultiplexer,
        config: RealtimeConfig,
    ) -> Self {
        let source = Self {
            feed: Feed {
                client: Arc::new(client),
                projections: Arc::new(Projections::new(Vec::new())),
            },
            websocket,
            config,
            task: Mutex::new(None),
        };
        if source.config.auto_start {
            source.start();
        }
        source
    }

    /// Begin receiving updates. Warns and does nothing if already started.
    pub fn start(&self) {
        let mut task = lock(&self.task);
        if task.is_some() {
            warn!("real-time source already started");
            return;
        }

        self.feed.projections.set_loading(true);
        let feed = self.feed.clone();
        *task = Some(tokio::spawn(feed.run(
            self.websocket.clone(),
            self.config.clone(),
        )));
        info!(
            url = self.feed.client.base_url(),
            websocket = self.config.websocket_url().is_some(),
            polling = self.config.use_polling,
            "real-time source started"
        );
    }

    /// Stop receiving updates and close the WebSocket.
    pub fn stop(&self) {
        if let Some(task) = lock(&self.task).take() {
            task.abort();
            info!("real-time source stopped");
        }
        if self.config.use_websocket {
            self.websocket.disconnect();
        }
        self.feed.projections.set_loading(false);
    }

    /// Returns `true` between [`start`](Self::start) and [`stop`](Self::stop).
    #[must_use]
    pub fn is_started(&self) -> bool {
        lock(&self.task).is_some()
    }

    /// Fetch the collection now and publish the result.
    pub async fn refresh(&self) {
        self.feed.projections.set_loading(true);
        match self.feed.client.get_all(&PaginationParams::default()).await {
            Ok(items) => {
                self.feed.projections.publish(items);
                self.feed.projections.clear_error();
            }
            Err(err) => {
                error!(%err, "refresh failed");
                self.feed.projections.fail(err);
            }
        }
    }

    /// Copy of the published items.
    #[must_use]
    pub fn current(&self) -> Vec<M::Model> {
        self.feed.projections.data.borrow().clone()
    }

    /// Append an item locally without contacting the server.
    pub fn add_optimistic(&self, item: M::Model) {
        self.feed.projections.data.send_modify(|items| items.push(item));
    }

    /// Update matching items locally. Returns the number updated.
    pub fn update_optimistic(
        &self,
        mut predicate: impl FnMut(&M::Model) -> bool,
        mut updater: impl FnMut(&mut M::Model),
    ) -> usize {
        let mut updated = 0;
        self.feed.projections.data.send_if_modified(|items| {
            for item in items.iter_mut().filter(|item| predicate(item)) {
                updater(item);
                updated += 1;
            }
            updated > 0
        });
        updated
    }

    /// Remove matching items locally. Returns the number removed.
    pub fn remove_optimistic(&self, mut predicate: impl FnMut(&M::Model) -> bool) -> usize {
        let mut removed = 0;
        self.feed.projections.data.send_if_modified(|items| {
            let before = items.len();
            items.retain(|item| !predicate(item));
            removed = before - items.len();
            removed > 0
        });
        removed
    }

    /// Watch the published items.
    #[must_use]
    pub fn data(&self) -> watch::Receiver<Vec<M::Model>> {
        self.feed.projections.data.subscribe()
    }

    /// Watch the loading flag.
    #[must_use]
    pub fn loading(&self) -> watch::Receiver<bool> {
        self.feed.projections.loading.subscribe()
    }

    /// Watch the last error.
    #[must_use]
    pub fn error(&self) -> watch::Receiver<Option<Arc<DataError>>> {
        self.feed.projections.error.subscribe()
    }

    /// The CRUD client used for polling.
    #[must_use]
    pub fn client(&self) -> &CrudClient<M, C> {
        &self.feed.client
    }

    /// The WebSocket connection.
    #[must_use]
    pub const fn websocket(&self) -> &WsMultiplexer {
        &self.websocket
    }
}

impl<M: Mapper, C> fmt::Debug for PollingRealtimeSource<M, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollingRealtimeSource")
            .field("base_url", &self.feed.client.base_url())
            .field("config", &self.config)
            .field("started", &lock(&self.task).is_some())
            .finish_non_exhaustive()
    }
}

impl<M: Mapper, C> Drop for PollingRealtimeSource<M, C> {
    fn drop(&mut self) {
        let task = self
            .task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
