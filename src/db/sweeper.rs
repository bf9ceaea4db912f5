//! Background eviction of expired records.
use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use flume::{Receiver, RecvTimeoutError, Sender};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace, warn};

use crate::common::KeyId;
use crate::db::{EvictorRegistry, SharedDatabase};
use crate::routing::RouteTable;
use crate::{Error, Result};

#[derive(Debug)]
/// Periodically removes the records their [Evictor](super::Evictor) deems expired.
///
/// Runs on its own thread with a fixed delay between sweeps. [Self::stop]
/// only prevents future sweeps, a sweep in progress runs to completion.
pub struct DatabaseSweeper {
    inner: Arc<Inner>,
    interval: Duration,
    state: Mutex<State>,
}

#[derive(Debug)]
struct Inner {
    database: SharedDatabase,
    evictors: Arc<RwLock<EvictorRegistry>>,
    route_table: Arc<dyn RouteTable>,
}

#[derive(Debug, Default)]
struct State {
    running: Option<Running>,
    closed: bool,
}

#[derive(Debug)]
struct Running {
    shutdown: Sender<()>,
    handle: JoinHandle<()>,
}

impl DatabaseSweeper {
    pub fn new(
        database: SharedDatabase,
        evictors: Arc<RwLock<EvictorRegistry>>,
        route_table: Arc<dyn RouteTable>,
        interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                database,
                evictors,
                route_table,
            }),
            interval,
            state: Mutex::new(State::default()),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    // === Public Methods ===

    /// Schedule sweeps every `interval`, the first one after one interval.
    ///
    /// Does nothing if already running, fails with [Error::SweeperClosed]
    /// after [Self::close].
    pub fn start(&self) -> Result<()> {
        let mut state = self.state.lock();

        if state.closed {
            return Err(Error::SweeperClosed);
        }

        if let Some(running) = &state.running {
            if !running.handle.is_finished() {
                return Ok(());
            }
        }

        let (shutdown, receiver) = flume::bounded(1);
        let inner = self.inner.clone();
        let interval = self.interval;

        let handle = thread::Builder::new()
            .name("database-sweeper".to_string())
            .spawn(move || run(inner, receiver, interval))?;

        state.running = Some(Running { shutdown, handle });

        debug!(?interval, "Started database sweeper");
        Ok(())
    }

    /// Cancel future sweeps without waiting for a running one.
    pub fn stop(&self) {
        let running = self.state.lock().running.take();

        if let Some(running) = running {
            // Dropping the sender alone also stops the thread.
            let _ = running.shutdown.try_send(());
            debug!("Stopped database sweeper");
        }
    }

    /// Stop and refuse any future [Self::start].
    pub fn close(&self) {
        self.stop();
        self.state.lock().closed = true;
    }

    pub fn is_running(&self) -> bool {
        self.state
            .lock()
            .running
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Run one sweep on the calling thread, returns the number of evicted records.
    pub fn sweep(&self) -> usize {
        self.inner.sweep()
    }
}

impl Drop for DatabaseSweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(inner: Arc<Inner>, shutdown: Receiver<()>, interval: Duration) {
    loop {
        match shutdown.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {
                inner.sweep();
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

impl Inner {
    fn sweep(&self) -> usize {
        trace!("Sweeping database");

        // Held for the whole pass: nothing is added or removed mid sweep.
        let mut database = self.database.lock();
        let evictors = self.evictors.read();
        let route_table = self.route_table.as_ref();

        let expired: Vec<(KeyId, KeyId)> = database
            .values()
            .filter(|record| {
                let evictor = evictors.evictor(record.value().value_type());

                match panic::catch_unwind(AssertUnwindSafe(|| {
                    evictor.is_expired(route_table, record)
                })) {
                    Ok(expired) => expired,
                    Err(_) => {
                        warn!(%record, "Evictor panicked, keeping record");
                        false
                    }
                }
            })
            .map(|record| (*record.primary_key(), *record.secondary_key()))
            .collect();

        for (primary_key, secondary_key) in &expired {
            database.remove(primary_key, secondary_key);
        }

        let count = expired.len();
        database.statistics().record_expired(count as u64);

        debug!(
            expired = count,
            remaining = database.value_count(),
            "Swept database"
        );

        count
    }
}

#[cfg(test)]
mod test {
    use std::{
        net::SocketAddr,
        sync::atomic::{AtomicUsize, Ordering},
        time::Instant,
    };

    use super::*;
    use crate::common::{Contact, KeyKind, Value, ValueType, Vendor, Version};
    use crate::db::{Database, Evictor, ValueRecord};
    use crate::routing::StaticRouteTable;

    fn contact(ip: [u8; 4]) -> Contact {
        Contact::new(
            KeyId::random(KeyKind::Node),
            SocketAddr::from((ip, 1000)),
            Vendor::UNKNOWN,
            Version::ZERO,
        )
        .expect("node id")
    }

    fn record(value_type: ValueType, data: &'static str) -> ValueRecord {
        let creator = contact([10, 0, 0, 1]);
        ValueRecord::remote(
            creator.clone(),
            creator,
            KeyId::random(KeyKind::Value),
            Value::new(value_type, Version::ZERO, data),
        )
        .expect("record")
    }

    /// Expires records whose value is "old".
    #[derive(Debug, Default)]
    struct ByContent {
        calls: AtomicUsize,
    }

    impl Evictor for ByContent {
        fn is_expired(&self, _: &dyn RouteTable, record: &ValueRecord) -> bool {
            self.calls.fetch_add(1, Ordering::Relaxed);
            &record.value().data()[..] == b"old"
        }
    }

    #[derive(Debug)]
    struct Panicking;

    impl Evictor for Panicking {
        fn is_expired(&self, _: &dyn RouteTable, _: &ValueRecord) -> bool {
            panic!("broken evictor")
        }
    }

    fn sweeper(evictors: EvictorRegistry) -> (SharedDatabase, DatabaseSweeper) {
        let database = Database::default().into_shared();
        let route_table = Arc::new(StaticRouteTable::new(contact([127, 0, 0, 1])));

        let sweeper = DatabaseSweeper::new(
            database.clone(),
            Arc::new(RwLock::new(evictors)),
            route_table,
            Duration::from_millis(10),
        );

        (database, sweeper)
    }

    #[test]
    fn sweep_removes_expired() {
        let mut evictors = EvictorRegistry::default();
        evictors.add_evictor(ValueType::TEST, Arc::new(ByContent::default()));
        let (database, sweeper) = sweeper(evictors);

        let old = record(ValueType::TEST, "old");
        let new = record(ValueType::TEST, "new");
        let text = record(ValueType::TEXT, "old");

        {
            let mut database = database.lock();
            database.store(old.clone()).expect("stored");
            database.store(new.clone()).expect("stored");
            database.store(text.clone()).expect("stored");
        }

        assert_eq!(sweeper.sweep(), 1);

        let database = database.lock();
        assert!(!database.contains(old.primary_key(), old.secondary_key()));
        assert!(database.get(old.primary_key()).is_none());
        assert!(database.contains(new.primary_key(), new.secondary_key()));
        // Fresh records survive the default evictor.
        assert!(database.contains(text.primary_key(), text.secondary_key()));
        assert_eq!(database.statistics().expired(), 1);
    }

    #[test]
    fn panicking_evictor_does_not_abort_sweep() {
        let mut evictors = EvictorRegistry::default();
        evictors.add_evictor(ValueType::BINARY, Arc::new(Panicking));
        evictors.add_evictor(ValueType::TEST, Arc::new(ByContent::default()));
        let (database, sweeper) = sweeper(evictors);

        let broken = record(ValueType::BINARY, "old");
        let old = record(ValueType::TEST, "old");

        {
            let mut database = database.lock();
            database.store(broken.clone()).expect("stored");
            database.store(old.clone()).expect("stored");
        }

        assert_eq!(sweeper.sweep(), 1);

        let database = database.lock();
        assert!(database.contains(broken.primary_key(), broken.secondary_key()));
        assert!(!database.contains(old.primary_key(), old.secondary_key()));
    }

    #[test]
    fn lifecycle() {
        let evictor = Arc::new(ByContent::default());
        let mut evictors = EvictorRegistry::default();
        evictors.add_evictor(ValueType::TEST, evictor.clone());
        let (database, sweeper) = sweeper(evictors);

        let old = record(ValueType::TEST, "old");
        database.lock().store(old.clone()).expect("stored");

        assert!(!sweeper.is_running());
        sweeper.start().expect("start");
        sweeper.start().expect("idempotent start");
        assert!(sweeper.is_running());

        let deadline = Instant::now() + Duration::from_secs(5);
        while database.lock().contains(old.primary_key(), old.secondary_key()) {
            assert!(Instant::now() < deadline, "sweeper never ran");
            thread::sleep(Duration::from_millis(5));
        }

        sweeper.stop();
        assert!(!sweeper.is_running());

        // Restart after stop is allowed.
        sweeper.start().expect("restart");
        assert!(sweeper.is_running());

        sweeper.close();
        assert!(sweeper.is_closed());
        assert!(!sweeper.is_running());
        assert!(matches!(sweeper.start(), Err(Error::SweeperClosed)));

        assert!(evictor.calls.load(Ordering::Relaxed) >= 1);
    }
}
