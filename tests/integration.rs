use pool_reaper::{IdleReaper, MemoryPool, ObservedPool, PoolSignal, ReaperConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::TryRecvError;

async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

async fn run_for(total_ms: u64, step_ms: u64) {
    let mut elapsed = 0;
    while elapsed < total_ms {
        let step = step_ms.min(total_ms - elapsed);
        tokio::time::advance(Duration::from_millis(step)).await;
        settle().await;
        elapsed += step;
    }
}

#[tokio::test(start_paused = true)]
async fn test_reaps_stale_front_connection_only() {
    let pool = Arc::new(MemoryPool::new());
    let reaper = IdleReaper::new(
        pool.clone(),
        ReaperConfig::new(Duration::from_millis(3000), Duration::from_millis(1000)),
    );
    let mut events = reaper.subscribe();
    reaper.start().unwrap();

    // t=0: A opens
    let a = pool.connect().unwrap();
    settle().await;

    // t=1000: A is used and returned
    run_for(1000, 500).await;
    assert_eq!(pool.acquire().unwrap(), Some(a));
    pool.release(a).unwrap();

    // t=4500: ticks up to 4000 saw A at most 3000ms idle
    run_for(3500, 500).await;
    assert_eq!(events.try_recv(), Err(TryRecvError::Empty));

    // B opens, is used and returned behind A
    let b = pool.connect().unwrap();
    assert_eq!(pool.acquire().unwrap(), Some(b));
    pool.release(b).unwrap();
    assert_eq!(pool.idle_connections(), vec![a, b]);

    // t=5000: A has been idle 4000ms
    run_for(500, 500).await;
    let event = events.try_recv().unwrap();
    assert_eq!(event.connection, a);
    assert_eq!(event.idle_for, Duration::from_millis(4000));
    assert_eq!(events.try_recv(), Err(TryRecvError::Empty));

    assert!(!pool.is_open(a));
    assert!(pool.is_open(b));
    assert_eq!(pool.idle_connections(), vec![b]);
    assert_eq!(reaper.tracked_connections(), 1);
    assert_eq!(reaper.attached_listeners(), 1);

    reaper.stop();
}

#[tokio::test(start_paused = true)]
async fn test_manual_reap_matches_scheduled_decision() {
    let config = ReaperConfig::new(Duration::from_millis(3000), Duration::from_millis(1000));

    let scheduled_pool = Arc::new(MemoryPool::new());
    let scheduled = IdleReaper::new(scheduled_pool.clone(), config.clone());
    let manual_pool = Arc::new(MemoryPool::new());
    // Interval long enough that only `reap()` ever inspects this pool
    let manual = IdleReaper::new(
        manual_pool.clone(),
        ReaperConfig::new(config.idle_timeout(), Duration::from_secs(3600)),
    );

    scheduled.start().unwrap();
    manual.start().unwrap();
    let scheduled_conn = scheduled_pool.connect().unwrap();
    let manual_conn = manual_pool.connect().unwrap();
    settle().await;

    run_for(3000, 1000).await;
    assert!(scheduled_pool.is_open(scheduled_conn));
    assert_eq!(manual.reap().unwrap(), None);

    run_for(1000, 1000).await;
    assert!(!scheduled_pool.is_open(scheduled_conn));
    assert_eq!(manual.reap().unwrap(), Some(manual_conn));

    scheduled.stop();
    manual.stop();
}

#[tokio::test]
async fn test_stop_leaves_nothing_attached() {
    let pool = Arc::new(MemoryPool::new());
    let reaper = IdleReaper::new(pool.clone(), ReaperConfig::default());
    reaper.start().unwrap();

    let conns: Vec<_> = (0..5).map(|_| pool.connect().unwrap()).collect();
    pool.close_connection(conns[0]).unwrap();
    assert_eq!(reaper.tracked_connections(), 4);
    assert_eq!(reaper.attached_listeners(), 4);

    reaper.stop();
    let after_first = (reaper.tracked_connections(), reaper.attached_listeners());
    reaper.stop();

    assert_eq!(after_first, (0, 0));
    assert_eq!(
        (reaper.tracked_connections(), reaper.attached_listeners()),
        after_first
    );
    for signal in [
        PoolSignal::Established,
        PoolSignal::Acquired,
        PoolSignal::Released,
    ] {
        assert_eq!(pool.listener_count(signal), 0);
    }
    for conn in conns {
        assert_eq!(pool.closed_listener_count(conn), 0);
    }
}

#[tokio::test(start_paused = true)]
async fn test_restart_tracks_only_new_activity() {
    let pool = Arc::new(MemoryPool::new());
    let reaper = IdleReaper::new(
        pool.clone(),
        ReaperConfig::new(Duration::from_millis(1000), Duration::from_millis(500)),
    );

    reaper.start().unwrap();
    let old = pool.connect().unwrap();
    reaper.stop();

    reaper.start().unwrap();
    run_for(3000, 500).await;
    // Timestamps were dropped on stop, so the old connection is of unknown age
    assert!(pool.is_open(old));

    // Using it again makes it known, and it ages out from there
    assert_eq!(pool.acquire().unwrap(), Some(old));
    pool.release(old).unwrap();
    run_for(1500, 500).await;
    assert!(!pool.is_open(old));
    assert_eq!(reaper.tracked_connections(), 0);

    reaper.stop();
}
