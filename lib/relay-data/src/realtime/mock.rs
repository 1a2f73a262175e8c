use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{DEFAULT_POLLING_INTERVAL, Projections};
use crate::DataError;

/// In-memory real-time source.
///
/// Keeps a list of items and re-publishes it on a fixed period and after
/// every mutation. Mutations apply immediately. The ticker runs from
/// [`start`](Self::start) until [`stop`](Self::stop) or drop.
///
/// ```ignore
/// let source = MockRealtimeSource::new(products);
/// source.start();
/// let mut data = source.data();
/// data.changed().await?;
/// ```
#[derive(Debug)]
pub struct MockRealtimeSource<T> {
    items: Arc<Mutex<Vec<T>>>,
    projections: Arc<Projections<T>>,
    period: Duration,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl<T> MockRealtimeSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a stopped source holding `initial`, which is published at once.
    #[must_use]
    pub fn new(initial: Vec<T>) -> Self {
        Self {
            projections: Arc::new(Projections::new(initial.clone())),
            items: Arc::new(Mutex::new(initial)),
            period: DEFAULT_POLLING_INTERVAL,
            ticker: Mutex::new(None),
        }
    }

    /// Set the ticker period.
    #[must_use]
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Start the ticker. The first tick fires immediately. Calling this
    /// while running does nothing.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut ticker = lock(&self.ticker);
        if ticker.is_some() {
            debug!("mock source already running");
            return;
        }

        let items = Arc::clone(&self.items);
        let projections = Arc::clone(&self.projections);
        let period = self.period;
        *ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let snapshot = lock(&items).clone();
                debug!(items = snapshot.len(), "mock source tick");
                projections.publish(snapshot);
            }
        }));
        info!(period_secs = period.as_secs(), "mock source started");
    }

    /// Stop the ticker.
    pub fn stop(&self) {
        if let Some(ticker) = lock(&self.ticker).take() {
            ticker.abort();
            info!("mock source stopped");
        }
    }

    /// Returns `true` while the ticker runs.
    #[must_use]
    pub fn is_running(&self) -> bool {
        lock(&self.ticker).is_some()
    }

    /// Append an item.
    pub fn add(&self, item: T) {
        self.mutate(|items| items.push(item));
    }

    /// Apply `updater` to every item matching `predicate`. Returns the number
    /// of items updated; nothing is published when it is zero.
    pub fn update(
        &self,
        mut predicate: impl FnMut(&T) -> bool,
        mut updater: impl FnMut(&mut T),
    ) -> usize {
        let mut items = lock(&self.items);
        let mut updated = 0;
        for item in items.iter_mut().filter(|item| predicate(item)) {
            updater(item);
            updated += 1;
        }
        if updated > 0 {
            self.projections.publish(items.clone());
        }
        updated
    }

    /// Remove every item matching `predicate`. Returns the number removed.
    pub fn remove(&self, mut predicate: impl FnMut(&T) -> bool) -> usize {
        let mut items = lock(&self.items);
        let before = items.len();
        items.retain(|item| !predicate(item));
        let removed = before - items.len();
        self.projections.publish(items.clone());
        removed
    }

    /// Re-publish the current list.
    pub fn refresh(&self) {
        self.mutate(|_| {});
    }

    /// Remove everything.
    pub fn clear(&self) {
        self.mutate(Vec::clear);
    }

    /// Copy of the current list.
    #[must_use]
    pub fn current(&self) -> Vec<T> {
        lock(&self.items).clone()
    }

    /// Watch the published items.
    #[must_use]
    pub fn data(&self) -> watch::Receiver<Vec<T>> {
        self.projections.data.subscribe()
    }

    /// Watch the loading flag.
    #[must_use]
    pub fn loading(&self) -> watch::Receiver<bool> {
        self.projections.loading.subscribe()
    }

    /// Watch the last error. The mock source never fails, so this stays `None`.
    #[must_use]
    pub fn error(&self) -> watch::Receiver<Option<Arc<DataError>>> {
        self.projections.error.subscribe()
    }

    fn mutate(&self, f: impl FnOnce(&mut Vec<T>)) {
        let mut items = lock(&self.items);
        f(&mut items);
        self.projections.publish(items.clone());
    }
}

impl<T> Drop for MockRealtimeSource<T> {
    fn drop(&mut self) {
        let ticker = self
            .ticker
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(ticker) = ticker {
            ticker.abort();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
