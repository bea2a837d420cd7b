//! The exact-size path bypasses the size-class lanes

use classpool::{BumpSegment, GlobalPool, PoolTunables, SizeClass};

fn pool() -> GlobalPool<BumpSegment> {
    GlobalPool::new(BumpSegment::unbounded(), PoolTunables::default())
}

#[test]
fn exact_allocation_is_sized_precisely() {
    let pool = pool();
    let bytes = 100_000;
    let sc = SizeClass::from_size(bytes);

    let start = pool.acquire_available(sc, 0).expect("empty list");
    let list = pool.allocate_exact(bytes, sc, start).expect("exact alloc failed");

    assert_eq!(list.groups(), 1);
    assert_eq!(list.free_blocks(), 1);
    assert_eq!(list.bytes(), bytes, "no rounding to the class size");

    pool.return_memory(sc, list);
}

#[test]
fn exact_allocations_never_populate_the_lanes() {
    let pool = pool();
    let bytes = 77_777;
    let sc = SizeClass::from_size(bytes);

    for _ in 0..10 {
        let start = pool.acquire_available(sc, 0).expect("empty list");
        let list = pool.allocate_exact(bytes, sc, start).expect("exact alloc failed");
        pool.return_memory(sc, list);
    }

    for class in SizeClass::all() {
        let snap = pool.class_snapshot(class);
        assert_eq!(snap.available_groups, 0, "class {class} available lane polluted");
        assert_eq!(snap.reclaim_groups, 0, "class {class} reclaim lane polluted");
    }
}

#[test]
fn return_memory_goes_straight_to_the_segment() {
    let pool = pool();
    let bytes = 50_000;
    let sc = SizeClass::from_size(bytes);

    let start = pool.acquire_available(sc, 0).expect("empty list");
    let list = pool.allocate_exact(bytes, sc, start).expect("exact alloc failed");
    assert_eq!(pool.segment().bytes_in_use(), bytes);

    let replacement = pool.return_memory(sc, list);
    assert!(replacement.is_empty());
    assert_eq!(pool.segment().groups_released(), 1);
    assert_eq!(pool.segment().bytes_in_use(), 0);
}

#[test]
fn exact_and_standard_paths_coexist() {
    let pool = pool();
    let sc = SizeClass::from_size(4096);

    let standard = pool.acquire_available(sc, 8).expect("acquire failed");
    let lanes_before = pool.class_snapshot(sc);

    let start = pool.acquire_available(sc, 0).expect("empty list");
    let exact = pool.allocate_exact(10_000, sc, start).expect("exact alloc failed");

    // The exact allocation left the standard lanes alone.
    assert_eq!(pool.class_snapshot(sc), lanes_before);

    pool.return_memory(sc, exact);
    assert_eq!(pool.class_snapshot(sc), lanes_before);
    pool.exchange_release(sc, standard);
}

#[test]
fn exact_counters_show_up_in_the_report() {
    let pool = pool();
    let bytes = 33_000;
    let sc = SizeClass::from_size(bytes);

    let start = pool.acquire_available(sc, 0).expect("empty list");
    let list = pool.allocate_exact(bytes, sc, start).expect("exact alloc failed");
    pool.return_memory(sc, list);

    let report = pool.report(1);
    let (_, _, snap) = report
        .classes
        .iter()
        .find(|(index, _, _)| *index == sc.index())
        .expect("class missing from report");
    assert_eq!(snap.exact_allocs, 1);
    assert_eq!(snap.returns, 1);
    assert_eq!(report.released_groups, 1);
}
