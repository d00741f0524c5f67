use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, oneshot};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, trace, warn};

use crate::pool::{ConnectionId, ConnectionListener, ListenerId, ObservedPool, PoolSignal};

use super::config::ReaperConfig;
use super::error::ReaperError;
use super::lifecycle::LifecycleObserver;
use super::metrics::ReaperMetrics;
use super::tracker::UsageTracker;
use super::types::ReapEvent;

const REAP_EVENT_CAPACITY: usize = 64;

/// Closes pool connections that have sat idle longer than the configured
/// timeout.
///
/// While running, the reaper listens to the pool's usage signals and checks
/// the front of the idle queue once per `reap_interval`. Only that single
/// connection is inspected per tick; one further back is looked at once it
/// reaches the front.
pub struct IdleReaper<P: ObservedPool> {
    inner: Arc<ReaperInner<P>>,
}

struct ReaperInner<P: ObservedPool> {
    pool: Arc<P>,
    config: ReaperConfig,
    tracker: Arc<UsageTracker>,
    observer: Arc<LifecycleObserver<P>>,
    events: broadcast::Sender<ReapEvent>,
    metrics: ReaperMetrics,
    running: AtomicBool,
    // Pool callbacks hold this shared for their whole run and `stop` holds
    // it exclusively for teardown, so no callback can track a connection
    // after `stop` has swept. Callbacks never take `state`.
    gate: RwLock<()>,
    state: Mutex<ReaperState>,
}

#[derive(Default)]
struct ReaperState {
    subscriptions: Vec<(PoolSignal, ListenerId)>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl<P: ObservedPool> IdleReaper<P> {
    pub fn new(pool: Arc<P>, config: ReaperConfig) -> Self {
        Self::with_metrics(pool, config, ReaperMetrics::default())
    }

    pub(crate) fn with_metrics(pool: Arc<P>, config: ReaperConfig, metrics: ReaperMetrics) -> Self {
        let tracker = Arc::new(UsageTracker::with_gauge(metrics.tracked.clone()));
        let observer = Arc::new(LifecycleObserver::new(pool.clone(), tracker.clone()));
        let (events, _) = broadcast::channel(REAP_EVENT_CAPACITY);

        Self {
            inner: Arc::new(ReaperInner {
                pool,
                config,
                tracker,
                observer,
                events,
                metrics,
                running: AtomicBool::new(false),
                gate: RwLock::new(()),
                state: Mutex::new(ReaperState::default()),
            }),
        }
    }

    /// Hooks into the pool and starts the periodic reap task on the current
    /// tokio runtime. One reap cycle runs before this returns.
    pub fn start(&self) -> Result<(), ReaperError> {
        self.inner.config.validate()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ReaperError::NoRuntime)?;

        {
            let mut state = self.inner.state.lock();
            if self.inner.running.load(Ordering::SeqCst) {
                warn!("Idle reaper already running");
                return Ok(());
            }

            // Attach before recording so a new connection is attached once
            let pool = &self.inner.pool;
            let id = pool.subscribe(
                PoolSignal::Established,
                self.listener(ReaperInner::on_established),
            );
            state.subscriptions.push((PoolSignal::Established, id));
            for signal in [
                PoolSignal::Established,
                PoolSignal::Acquired,
                PoolSignal::Released,
            ] {
                let id = pool.subscribe(signal, self.listener(ReaperInner::on_usage));
                state.subscriptions.push((signal, id));
            }

            self.inner.running.store(true, Ordering::SeqCst);

            let (tx, rx) = oneshot::channel();
            state.shutdown_tx = Some(tx);
            runtime.spawn(reap_loop(Arc::downgrade(&self.inner), rx));
        }

        info!(
            idle_timeout_ms = self.inner.config.idle_timeout_ms,
            reap_interval_ms = self.inner.config.reap_interval_ms,
            "Idle reaper started"
        );

        self.inner.run_cycle();
        Ok(())
    }

    /// Removes every listener this reaper installed and cancels the reap
    /// task. Safe to call at any time, any number of times.
    pub fn stop(&self) {
        let _gate = self.inner.gate.write();
        let (subscriptions, shutdown_tx) = {
            let mut state = self.inner.state.lock();
            if !self.inner.running.swap(false, Ordering::SeqCst) {
                return;
            }
            (
                std::mem::take(&mut state.subscriptions),
                state.shutdown_tx.take(),
            )
        };

        for (signal, id) in subscriptions {
            self.inner.pool.unsubscribe(signal, id);
        }
        let detached = self.inner.observer.detach_all();
        self.inner.tracker.clear();

        if let Some(tx) = shutdown_tx {
            let _ = tx.send(());
        }

        info!(detached_listeners = detached, "Idle reaper stopped");
    }

    /// Runs the inspection step once, outside the timer. Unlike a scheduled
    /// tick this does not consult the pool's closed flag, and an error from
    /// the pool's close command is returned instead of logged.
    pub fn reap(&self) -> Result<Option<ConnectionId>, ReaperError> {
        self.inner.reap_front()
    }

    /// Receives one [`ReapEvent`] per eviction.
    pub fn subscribe(&self) -> broadcast::Receiver<ReapEvent> {
        self.inner.events.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn tracked_connections(&self) -> usize {
        self.inner.tracker.len()
    }

    pub fn attached_listeners(&self) -> usize {
        self.inner.observer.len()
    }

    pub fn config(&self) -> &ReaperConfig {
        &self.inner.config
    }

    fn listener(&self, handler: fn(&ReaperInner<P>, ConnectionId)) -> ConnectionListener {
        let inner = Arc::downgrade(&self.inner);
        Arc::new(move |conn| {
            if let Some(inner) = inner.upgrade() {
                handler(&inner, conn);
            }
        })
    }
}

impl<P: ObservedPool> Drop for IdleReaper<P> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<P: ObservedPool> ReaperInner<P> {
    fn on_usage(&self, conn: ConnectionId) {
        // Recursive so a pool that re-enters us cannot queue behind `stop`
        let _gate = self.gate.read_recursive();
        if self.running.load(Ordering::SeqCst) {
            self.tracker.record_usage(conn);
            self.observer.ensure_attached(conn);
        }
    }

    fn on_established(&self, conn: ConnectionId) {
        let _gate = self.gate.read_recursive();
        if self.running.load(Ordering::SeqCst) {
            self.observer.attach(conn);
        }
    }

    fn run_cycle(&self) {
        if self.pool.is_closed() {
            trace!("Pool closed, skipping reap");
            return;
        }

        if let Err(e) = self.reap_front() {
            warn!(error = %e, "Failed to close idle connection");
        }
    }

    fn reap_front(&self) -> Result<Option<ConnectionId>, ReaperError> {
        let Some(conn) = self.pool.idle_front() else {
            return Ok(None);
        };

        // Unknown age is not the same as stale
        let Some(idle_for) = self.tracker.idle_for(conn, Instant::now()) else {
            trace!(conn_id = %conn, "Idle connection has no recorded usage, skipping");
            return Ok(None);
        };

        if idle_for <= self.config.idle_timeout() {
            return Ok(None);
        }

        debug!(conn_id = %conn, idle_ms = idle_for.as_millis() as u64, "Reaping idle connection");

        // Err only means nobody is subscribed
        let _ = self.events.send(ReapEvent {
            connection: conn,
            idle_for,
        });

        if let Err(e) = self.pool.close_connection(conn) {
            self.metrics.close_failures.inc();
            return Err(e.into());
        }
        self.metrics.reaped.inc();

        Ok(Some(conn))
    }
}

async fn reap_loop<P: ObservedPool>(inner: Weak<ReaperInner<P>>, rx: oneshot::Receiver<()>) {
    let interval = match inner.upgrade() {
        Some(inner) => inner.config.reap_interval(),
        None => return,
    };

    tokio::pin!(rx);
    loop {
        tokio::select! {
            biased;
            _ = &mut rx => {
                debug!("Reap task shutting down");
                break;
            }
            _ = sleep(interval) => {
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                if !inner.running.load(Ordering::SeqCst) {
                    break;
                }
                inner.run_cycle();
            }
        }
    }
}
