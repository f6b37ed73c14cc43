//! Shared-subscription registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use desk_core::{
    BarInterval, Candle, ConsumerId, EngineError, EngineResult, FeedError, FeedHandle, FeedKey,
    MarketDataService, PriceSample,
};
use tracing::{debug, warn};

use crate::buffer::RawFeedBuffer;

/// Per-consumer read position on one feed.
#[derive(Debug, Clone, Copy)]
struct Cursor {
    /// Exclusive end (ms) of the last emitted bucket; 0 before the first
    /// aggregated read
    bucket_end_ms: i64,
    /// Absolute index of the next undelivered sample for tick reads
    next_tick: u64,
    /// Absolute index of the first sample this consumer still needs;
    /// drives prefix retention
    consumed: u64,
}

impl Cursor {
    fn starting_at(index: u64) -> Self {
        Self {
            bucket_end_ms: 0,
            next_tick: index,
            consumed: index,
        }
    }
}

struct FeedState {
    /// Backend handle; `Some` iff `refcount > 0`
    handle: Option<FeedHandle>,
    refcount: usize,
    buffer: RawFeedBuffer,
    cursors: HashMap<ConsumerId, Cursor>,
}

impl FeedState {
    fn new() -> Self {
        Self {
            handle: None,
            refcount: 0,
            buffer: RawFeedBuffer::new(),
            cursors: HashMap::new(),
        }
    }
}

/// Multiplexes one backend feed per unique [`FeedKey`] across many
/// independent consumer cursors.
///
/// Each feed's buffer and cursor set sit behind their own mutex, so a busy
/// symbol never blocks reads or ingestion on another. Subscribe and
/// unsubscribe are additionally serialized by the request dispatcher; the
/// ingestion path may run concurrently with reads on any thread.
pub struct SubscriptionRegistry {
    backend: Arc<dyn MarketDataService>,
    feeds: Mutex<HashMap<FeedKey, Arc<Mutex<FeedState>>>>,
    /// Handle-to-key routing for ingestion paths that only know the
    /// backend handle (the live tick pump)
    routes: Mutex<HashMap<FeedHandle, FeedKey>>,
}

impl SubscriptionRegistry {
    pub fn new(backend: Arc<dyn MarketDataService>) -> Self {
        Self {
            backend,
            feeds: Mutex::new(HashMap::new()),
            routes: Mutex::new(HashMap::new()),
        }
    }

    fn feed(&self, key: &FeedKey) -> Option<Arc<Mutex<FeedState>>> {
        self.feeds.lock().unwrap().get(key).cloned()
    }

    fn not_subscribed(consumer: &ConsumerId, key: &FeedKey) -> EngineError {
        FeedError::NotSubscribed {
            consumer: consumer.clone(),
            key: key.clone(),
        }
        .into()
    }

    /// Subscribe `consumer` to `key`, opening the backend feed if this is
    /// the first reference. Subscribing twice is a no-op returning the
    /// existing handle.
    pub async fn subscribe(
        &self,
        consumer: &ConsumerId,
        key: &FeedKey,
    ) -> EngineResult<FeedHandle> {
        if let Some(state) = self.feed(key) {
            let mut st = state.lock().unwrap();
            if let Some(handle) = st.handle {
                if !st.cursors.contains_key(consumer) {
                    let start = st.buffer.base();
                    st.cursors
                        .insert(consumer.clone(), Cursor::starting_at(start));
                    st.refcount += 1;
                    debug!(%consumer, %key, refcount = st.refcount, "joined shared feed");
                }
                return Ok(handle);
            }
        }

        // First reference: open the backend feed with no lock held, and
        // install state only once the backend has accepted.
        let handle = self.backend.open_feed(key).await?;

        let state = {
            let mut feeds = self.feeds.lock().unwrap();
            feeds
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(FeedState::new())))
                .clone()
        };
        {
            let mut st = state.lock().unwrap();
            st.handle = Some(handle);
            st.refcount = 1;
            st.cursors.insert(consumer.clone(), Cursor::starting_at(0));
        }
        self.routes.lock().unwrap().insert(handle, key.clone());
        debug!(%consumer, %key, %handle, "opened backend feed");
        Ok(handle)
    }

    /// Unsubscribe `consumer` from `key`. The last consumer out releases
    /// the backend feed and discards the buffer.
    pub async fn unsubscribe(&self, consumer: &ConsumerId, key: &FeedKey) -> EngineResult<()> {
        let state = self
            .feed(key)
            .ok_or_else(|| Self::not_subscribed(consumer, key))?;

        let last_handle = {
            let st = state.lock().unwrap();
            if !st.cursors.contains_key(consumer) {
                return Err(Self::not_subscribed(consumer, key));
            }
            if st.refcount == 1 {
                st.handle
            } else {
                None
            }
        };

        match last_handle {
            Some(handle) => {
                // Release the backend side first; a failure leaves the
                // subscription fully intact.
                self.backend.close_feed(key, handle).await?;
                self.feeds.lock().unwrap().remove(key);
                self.routes.lock().unwrap().remove(&handle);
                debug!(%consumer, %key, %handle, "released backend feed");
            }
            None => {
                let mut st = state.lock().unwrap();
                st.cursors.remove(consumer);
                st.refcount -= 1;
                debug!(%consumer, %key, refcount = st.refcount, "left shared feed");
            }
        }
        Ok(())
    }

    /// Read newly closed candlesticks for `consumer` at the requested
    /// interval. Never blocks beyond the per-feed mutex; returns an empty
    /// vector when no fully closed bucket is newly available.
    pub fn read(
        &self,
        consumer: &ConsumerId,
        key: &FeedKey,
        interval: BarInterval,
    ) -> EngineResult<Vec<Candle>> {
        let state = self
            .feed(key)
            .ok_or_else(|| Self::not_subscribed(consumer, key))?;
        let mut guard = state.lock().unwrap();
        let st = &mut *guard;
        let cursor = st
            .cursors
            .get_mut(consumer)
            .ok_or_else(|| Self::not_subscribed(consumer, key))?;

        let out = if interval.is_tick() {
            Self::read_ticks(&st.buffer, cursor)
        } else {
            Self::read_buckets(&st.buffer, cursor, interval.width_ms())
        };

        // Drop the prefix every cursor has consumed.
        if let Some(min) = st.cursors.values().map(|c| c.consumed).min() {
            st.buffer.trim_to(min);
        }
        Ok(out)
    }

    /// Raw passthrough: one candle per undelivered sample.
    fn read_ticks(buffer: &RawFeedBuffer, cursor: &mut Cursor) -> Vec<Candle> {
        let out: Vec<Candle> = buffer
            .iter_from(cursor.next_tick)
            .map(|(_, s)| Candle::from_sample(s.timestamp_ms, s))
            .collect();
        cursor.next_tick = buffer.end();
        cursor.consumed = cursor.next_tick;
        out
    }

    /// Aggregated read: emit every non-empty bucket whose end lies
    /// strictly before the latest known sample time and after the cursor.
    fn read_buckets(buffer: &RawFeedBuffer, cursor: &mut Cursor, width_ms: i64) -> Vec<Candle> {
        let Some(latest) = buffer.latest_ts() else {
            return Vec::new();
        };

        let start = buffer.index_at_or_after(cursor.bucket_end_ms);
        let mut out: Vec<Candle> = Vec::new();

        for (_, sample) in buffer.iter_from(start) {
            let bucket_start = sample.timestamp_ms - sample.timestamp_ms.rem_euclid(width_ms);
            if bucket_start + width_ms >= latest {
                // This bucket may still receive samples; samples are
                // ordered, so nothing later can close either.
                break;
            }
            match out.last_mut() {
                Some(open) if open.start_ms == bucket_start => open.absorb(sample),
                _ => out.push(Candle::from_sample(bucket_start, sample)),
            }
        }

        if let Some(last) = out.last() {
            cursor.bucket_end_ms = last.start_ms + width_ms;
            cursor.consumed = buffer.index_at_or_after(cursor.bucket_end_ms);
        }
        out
    }

    /// Append a sample for `key`. Samples for feeds with no active
    /// subscription are dropped.
    pub fn ingest(&self, key: &FeedKey, sample: PriceSample) {
        match self.feed(key) {
            Some(state) => state.lock().unwrap().buffer.push(sample),
            None => debug!(%key, "dropping sample for inactive feed"),
        }
    }

    /// Append a sample routed by backend handle (live tick pump path).
    pub fn ingest_by_handle(&self, handle: FeedHandle, sample: PriceSample) {
        let key = self.routes.lock().unwrap().get(&handle).cloned();
        match key {
            Some(key) => self.ingest(&key, sample),
            None => warn!(%handle, "tick for unknown feed handle"),
        }
    }

    /// Number of feeds with at least one subscriber.
    pub fn active_feeds(&self) -> usize {
        self.feeds.lock().unwrap().len()
    }

    /// Backend handle currently assigned to `key`, if subscribed.
    pub fn handle_for(&self, key: &FeedKey) -> Option<FeedHandle> {
        self.feed(key).and_then(|s| s.lock().unwrap().handle)
    }

    /// Retained sample count for `key` (diagnostics).
    pub fn buffer_depth(&self, key: &FeedKey) -> usize {
        self.feed(key).map_or(0, |s| s.lock().unwrap().buffer.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use desk_core::{BrokerError, IntervalUnit};
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    struct MockFeedService {
        next_handle: AtomicU64,
        opens: AtomicU64,
        closes: AtomicU64,
        fail_open: AtomicBool,
    }

    impl MockFeedService {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                next_handle: AtomicU64::new(1),
                opens: AtomicU64::new(0),
                closes: AtomicU64::new(0),
                fail_open: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl MarketDataService for MockFeedService {
        async fn open_feed(&self, _key: &FeedKey) -> Result<FeedHandle, BrokerError> {
            if self.fail_open.load(Ordering::SeqCst) {
                return Err(BrokerError::Unavailable("mock down".into()));
            }
            self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(FeedHandle(self.next_handle.fetch_add(1, Ordering::SeqCst)))
        }

        async fn close_feed(&self, _key: &FeedKey, _handle: FeedHandle) -> Result<(), BrokerError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn minute() -> BarInterval {
        BarInterval::of(1, IntervalUnit::Minute)
    }

    fn ms(secs: i64) -> i64 {
        secs * 1000
    }

    /// Two 1-minute buckets plus one sample after the second boundary so
    /// both buckets are strictly closed.
    fn feed_two_buckets(registry: &SubscriptionRegistry, key: &FeedKey) {
        for (ts, price) in [
            (ms(10), 100.0),
            (ms(40), 101.0),
            (ms(70), 102.0),
            (ms(110), 99.0),
            (ms(125), 103.0),
        ] {
            registry.ingest(key, PriceSample::new(ts, price, 1.0));
        }
    }

    #[tokio::test]
    async fn test_shared_feed_two_consumers() {
        let backend = MockFeedService::new();
        let registry = SubscriptionRegistry::new(backend.clone());
        let key = FeedKey::stock("AAPL");
        let (a, b) = (ConsumerId::from("A"), ConsumerId::from("B"));

        let ha = registry.subscribe(&a, &key).await.unwrap();
        let hb = registry.subscribe(&b, &key).await.unwrap();
        assert_eq!(ha, hb);
        assert_eq!(backend.opens.load(Ordering::SeqCst), 1);
        assert_eq!(registry.active_feeds(), 1);

        feed_two_buckets(&registry, &key);

        let candles_a = registry.read(&a, &key, minute()).unwrap();
        assert_eq!(candles_a.len(), 2);
        assert_eq!(candles_a[0].start_ms, 0);
        assert_eq!(candles_a[0].open, 100.0);
        assert_eq!(candles_a[0].close, 101.0);
        assert_eq!(candles_a[1].start_ms, ms(60));
        assert_eq!(candles_a[1].high, 102.0);
        assert_eq!(candles_a[1].low, 99.0);

        // B's cursor is independent of A's.
        let candles_b = registry.read(&b, &key, minute()).unwrap();
        assert_eq!(candles_b, candles_a);

        // Nothing newly closed for A.
        assert!(registry.read(&a, &key, minute()).unwrap().is_empty());

        registry.unsubscribe(&a, &key).await.unwrap();
        assert_eq!(registry.active_feeds(), 1);
        assert_eq!(backend.closes.load(Ordering::SeqCst), 0);

        registry.unsubscribe(&b, &key).await.unwrap();
        assert_eq!(registry.active_feeds(), 0);
        assert_eq!(backend.closes.load(Ordering::SeqCst), 1);
        assert_eq!(registry.handle_for(&key), None);
    }

    #[tokio::test]
    async fn test_remaining_cursor_survives_peer_unsubscribe() {
        let backend = MockFeedService::new();
        let registry = SubscriptionRegistry::new(backend.clone());
        let key = FeedKey::stock("MSFT");
        let (a, b) = (ConsumerId::from("A"), ConsumerId::from("B"));

        registry.subscribe(&a, &key).await.unwrap();
        registry.subscribe(&b, &key).await.unwrap();
        feed_two_buckets(&registry, &key);

        registry.unsubscribe(&a, &key).await.unwrap();

        // B still reads everything even though A left first.
        let candles = registry.read(&b, &key, minute()).unwrap();
        assert_eq!(candles.len(), 2);
    }

    #[tokio::test]
    async fn test_unsubscribe_without_cursor_fails() {
        let backend = MockFeedService::new();
        let registry = SubscriptionRegistry::new(backend.clone());
        let key = FeedKey::stock("AAPL");
        let a = ConsumerId::from("A");

        let err = registry.unsubscribe(&a, &key).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Feed(FeedError::NotSubscribed { .. })
        ));

        // Also after someone else subscribed.
        registry.subscribe(&ConsumerId::from("B"), &key).await.unwrap();
        let err = registry.unsubscribe(&a, &key).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Feed(FeedError::NotSubscribed { .. })
        ));
    }

    #[tokio::test]
    async fn test_repeat_subscribe_is_idempotent() {
        let backend = MockFeedService::new();
        let registry = SubscriptionRegistry::new(backend.clone());
        let key = FeedKey::stock("AAPL");
        let a = ConsumerId::from("A");

        let h1 = registry.subscribe(&a, &key).await.unwrap();
        let h2 = registry.subscribe(&a, &key).await.unwrap();
        assert_eq!(h1, h2);
        assert_eq!(backend.opens.load(Ordering::SeqCst), 1);

        // One unsubscribe fully releases the feed.
        registry.unsubscribe(&a, &key).await.unwrap();
        assert_eq!(registry.active_feeds(), 0);
        assert_eq!(backend.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_tick_passthrough() {
        let backend = MockFeedService::new();
        let registry = SubscriptionRegistry::new(backend);
        let key = FeedKey::stock("AAPL");
        let a = ConsumerId::from("A");

        registry.subscribe(&a, &key).await.unwrap();
        registry.ingest(&key, PriceSample::new(1, 10.0, 2.0));
        registry.ingest(&key, PriceSample::new(2, 11.0, 3.0));

        let ticks = registry.read(&a, &key, BarInterval::tick()).unwrap();
        assert_eq!(ticks.len(), 2);
        assert_eq!(ticks[0].open, 10.0);
        assert_eq!(ticks[0].volume, 2.0);
        assert_eq!(ticks[1].close, 11.0);

        assert!(registry.read(&a, &key, BarInterval::tick()).unwrap().is_empty());

        registry.ingest(&key, PriceSample::new(3, 12.0, 1.0));
        let more = registry.read(&a, &key, BarInterval::tick()).unwrap();
        assert_eq!(more.len(), 1);
        assert_eq!(more[0].open, 12.0);
    }

    #[tokio::test]
    async fn test_open_bucket_is_withheld() {
        let backend = MockFeedService::new();
        let registry = SubscriptionRegistry::new(backend);
        let key = FeedKey::stock("AAPL");
        let a = ConsumerId::from("A");

        registry.subscribe(&a, &key).await.unwrap();
        // All samples inside one still-open minute.
        registry.ingest(&key, PriceSample::new(ms(5), 100.0, 1.0));
        registry.ingest(&key, PriceSample::new(ms(30), 101.0, 1.0));
        assert!(registry.read(&a, &key, minute()).unwrap().is_empty());

        // A sample past the boundary closes the first bucket.
        registry.ingest(&key, PriceSample::new(ms(65), 102.0, 1.0));
        let candles = registry.read(&a, &key, minute()).unwrap();
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].close, 101.0);
    }

    #[tokio::test]
    async fn test_consumed_prefix_is_trimmed() {
        let backend = MockFeedService::new();
        let registry = SubscriptionRegistry::new(backend);
        let key = FeedKey::stock("AAPL");
        let (a, b) = (ConsumerId::from("A"), ConsumerId::from("B"));

        registry.subscribe(&a, &key).await.unwrap();
        registry.subscribe(&b, &key).await.unwrap();
        feed_two_buckets(&registry, &key);
        assert_eq!(registry.buffer_depth(&key), 5);

        // Only A has read; B still needs the prefix.
        registry.read(&a, &key, minute()).unwrap();
        assert_eq!(registry.buffer_depth(&key), 5);

        // Once B catches up the first four samples are droppable.
        registry.read(&b, &key, minute()).unwrap();
        assert_eq!(registry.buffer_depth(&key), 1);
    }

    #[tokio::test]
    async fn test_failed_open_leaves_no_state() {
        let backend = MockFeedService::new();
        backend.fail_open.store(true, Ordering::SeqCst);
        let registry = SubscriptionRegistry::new(backend.clone());
        let key = FeedKey::stock("AAPL");
        let a = ConsumerId::from("A");

        let err = registry.subscribe(&a, &key).await.unwrap_err();
        assert!(matches!(err, EngineError::Broker(_)));
        assert_eq!(registry.active_feeds(), 0);

        // Backend recovers; a retry subscribes cleanly.
        backend.fail_open.store(false, Ordering::SeqCst);
        registry.subscribe(&a, &key).await.unwrap();
        assert_eq!(registry.active_feeds(), 1);
    }

    #[tokio::test]
    async fn test_ingest_by_handle_routes_to_key() {
        let backend = MockFeedService::new();
        let registry = SubscriptionRegistry::new(backend);
        let key = FeedKey::stock("AAPL");
        let a = ConsumerId::from("A");

        let handle = registry.subscribe(&a, &key).await.unwrap();
        registry.ingest_by_handle(handle, PriceSample::new(1, 10.0, 1.0));
        registry.ingest_by_handle(FeedHandle(999), PriceSample::new(2, 11.0, 1.0));

        let ticks = registry.read(&a, &key, BarInterval::tick()).unwrap();
        assert_eq!(ticks.len(), 1);
    }
}
