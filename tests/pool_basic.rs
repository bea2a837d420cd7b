//! Basic acquisition behavior of the global pool

use classpool::size_class::blocks_per_group;
use classpool::{BumpSegment, GlobalPool, PoolTunables, SizeClass};

fn pool() -> GlobalPool<BumpSegment> {
    GlobalPool::new(BumpSegment::unbounded(), PoolTunables::default())
}

#[test]
fn acquire_returns_at_least_min_blocks() {
    let pool = pool();
    let sc = SizeClass::from_size(64);

    for min in [1, 10, 500, 5000] {
        let list = pool.acquire_available(sc, min).expect("acquire failed");
        assert!(
            list.free_blocks() >= min,
            "asked for {min}, got {}",
            list.free_blocks()
        );
        assert_eq!(list.size_class(), sc);
        pool.exchange_release(sc, list);
    }
}

#[test]
fn acquire_zero_blocks_is_free() {
    let pool = pool();
    let sc = SizeClass::from_size(256);

    let list = pool.acquire_available(sc, 0).expect("acquire failed");
    assert!(list.is_empty());
    assert_eq!(list.free_blocks(), 0);

    // The segment manager was never contacted.
    assert_eq!(pool.segment().groups_acquired(), 0);
    assert_eq!(pool.segment().bytes_in_use(), 0);
    pool.exchange_release(sc, list);
}

#[test]
fn detached_groups_leave_the_lanes() {
    let pool = pool();
    let sc = SizeClass::from_size(64);
    let per_group = blocks_per_group(sc);

    let list = pool.acquire_available(sc, 3 * per_group).expect("acquire failed");
    assert!(list.groups() >= 3);

    // Everything handed out is gone from the pool's lanes for this class.
    let snap = pool.class_snapshot(sc);
    let acquired = pool.segment().groups_acquired();
    assert_eq!(
        snap.available_groups + snap.reclaim_groups + list.groups(),
        acquired
    );

    pool.exchange_release(sc, list);
    let snap = pool.class_snapshot(sc);
    assert_eq!(snap.available_groups + snap.reclaim_groups, acquired);
}

#[test]
fn classes_are_independent() {
    let pool = pool();
    let small = SizeClass::from_size(32);
    let large = SizeClass::from_size(4096);

    let list = pool.acquire_available(small, 100).expect("acquire failed");

    let other = pool.class_snapshot(large);
    assert_eq!(other, Default::default());

    pool.exchange_release(small, list);
    let other = pool.class_snapshot(large);
    assert_eq!(other.available_groups + other.reclaim_groups, 0);
}

#[test]
fn report_counts_operations_and_skips_unused_classes() {
    let pool = pool();
    let sc = SizeClass::from_size(128);

    let list = pool.acquire_available(sc, 10).expect("acquire failed");
    let list = pool.exchange_allocate(sc, list).expect("exchange failed");
    pool.exchange_release(sc, list);

    let report = pool.report(1);
    assert_eq!(report.classes.len(), 1, "only one class saw traffic");

    let (index, block_size, snap) = report.classes[0];
    assert_eq!(index, sc.index());
    assert_eq!(block_size, sc.block_size());
    assert_eq!(snap.acquires, 1);
    assert_eq!(snap.exchange_allocs, 1);
    assert_eq!(snap.exchange_releases, 1);
    assert!(snap.refills >= 1);
    assert!(report.refill_calls >= 1);
    assert!(report.node_allocs >= 1);

    let text = report.to_string();
    assert!(text.contains(&format!("class {:2}", sc.index())));
}

#[test]
fn report_is_side_effect_free() {
    let pool = pool();
    let sc = SizeClass::from_size(64);
    let list = pool.acquire_available(sc, 5).expect("acquire failed");

    let before = pool.class_snapshot(sc);
    let first = pool.report(1);
    let second = pool.report(1);
    assert_eq!(first.refill_calls, second.refill_calls);
    assert_eq!(pool.class_snapshot(sc), before);

    pool.exchange_release(sc, list);
}

#[test]
fn statistics_are_monotonic() {
    let pool = pool();
    let sc = SizeClass::from_size(64);

    let mut last = 0;
    for _ in 0..5 {
        let list = pool.acquire_available(sc, 1).expect("acquire failed");
        pool.exchange_release(sc, list);
        let report = pool.report(1);
        let acquires = report.classes[0].2.acquires;
        assert!(acquires > last);
        last = acquires;
    }
}
