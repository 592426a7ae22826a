// src/wave/pool_tests.rs

use super::*;
use crate::raster::Pixel;
use std::time::Instant;

fn params() -> WaveParams {
    WaveParams {
        threshold: 0,
        blank: Rgba::WHITE,
        fill: Rgba::new(255, 0, 0, 255),
        radius: 1,
    }
}

fn loads(min: usize, max: usize) -> WorkerLoads {
    WorkerLoads { min, max }
}

/// Wait until `count` current-epoch responses have arrived.
fn collect(pool: &mut WorkerPool, count: usize) -> Vec<WorkerResponse> {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut out = Vec::new();
    while out.len() < count {
        assert!(Instant::now() < deadline, "timed out waiting for workers");
        pool.park(Duration::from_millis(10));
        out.extend(pool.poll());
    }
    out
}

#[test_log::test]
fn slice_size_follows_min_and_max_load() {
    assert_eq!(loads(1, 0).slice_size(10, 3), 4);
    assert_eq!(loads(100, 200).slice_size(10, 3), 100);
    assert_eq!(loads(100, 200).slice_size(1000, 2), 200);
    assert_eq!(loads(100, 0).slice_size(1000, 2), 500);
    assert_eq!(loads(1, 0).slice_size(0, 0), 1);
}

#[test_log::test]
fn assigns_contiguous_slices_to_idle_workers() {
    let mut pool = WorkerPool::new(3, loads(1, 0)).unwrap();
    let snapshot = Arc::new(RasterBuffer::filled(20, 20, Rgba::WHITE));
    pool.init_all(&params(), snapshot).unwrap();
    collect(&mut pool, 3);

    let mut frames = FrameTable::seeded(Pixel::new(0, 0));
    frames
        .get_mut(0)
        .unwrap()
        .extend_shore((1..10).map(|x| Pixel::new(x * 2, 10)));
    let assigned = pool.assign_work(&mut frames, 0).unwrap();
    assert_eq!(assigned, 10);
    assert_eq!(frames.get(0).unwrap().next_idle, 10);
    assert_eq!(pool.idle_count(), 0);

    let mut worked: Vec<usize> = collect(&mut pool, 3)
        .into_iter()
        .map(|r| match r {
            WorkerResponse::Done { worked, .. } => worked,
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    worked.sort_unstable();
    assert_eq!(worked, vec![2, 4, 4]);
}

#[test_log::test]
fn min_load_can_leave_workers_idle() {
    let mut pool = WorkerPool::new(4, loads(100, 200)).unwrap();
    let snapshot = Arc::new(RasterBuffer::filled(8, 8, Rgba::WHITE));
    pool.init_all(&params(), snapshot).unwrap();

    let mut frames = FrameTable::seeded(Pixel::new(4, 4));
    assert_eq!(pool.assign_work(&mut frames, 0).unwrap(), 1);
    assert_eq!(pool.idle_count(), 3);
    // Nothing left to hand out.
    assert_eq!(pool.assign_work(&mut frames, 0).unwrap(), 0);
}

#[test_log::test]
fn done_merges_into_frame_and_next_shore() {
    let mut pool = WorkerPool::new(1, loads(1, 0)).unwrap();
    let snapshot = Arc::new(RasterBuffer::filled(10, 10, Rgba::WHITE));
    pool.init_all(&params(), snapshot).unwrap();
    collect(&mut pool, 1);

    let mut frames = FrameTable::seeded(Pixel::new(5, 5));
    pool.assign_work(&mut frames, 0).unwrap();
    for response in collect(&mut pool, 1) {
        pool.handle_response(response, &mut frames, 0, false).unwrap();
    }

    assert!(frames.is_ready(0));
    assert_eq!(frames.get(0).unwrap().filled().len(), 5);
    assert_eq!(frames.get(1).unwrap().shore_len(), 8);
    assert_eq!(pool.idle_count(), 1);
}

#[test_log::test]
fn done_for_an_unassigned_frame_is_a_fault() {
    let mut pool = WorkerPool::new(1, loads(1, 0)).unwrap();
    let mut frames = FrameTable::seeded(Pixel::new(0, 0));
    let bogus = WorkerResponse::Done {
        worker: 0,
        epoch: pool.epoch(),
        frame_index: 7,
        worked: 1,
        filled: vec![],
        edge: vec![],
    };
    let err = pool.handle_response(bogus, &mut frames, 0, false).unwrap_err();
    assert!(matches!(err, FillError::WorkerFault { worker: 0, .. }));
}

#[test_log::test]
fn responses_from_an_older_epoch_are_dropped() {
    let mut pool = WorkerPool::new(2, loads(1, 0)).unwrap();
    let snapshot = Arc::new(RasterBuffer::filled(4, 4, Rgba::WHITE));
    pool.init_all(&params(), Arc::clone(&snapshot)).unwrap();
    let second = pool.init_all(&params(), snapshot).unwrap();

    let responses = collect(&mut pool, 2);
    assert!(responses.iter().all(|r| r.epoch() == second));
    // Give the first epoch's acks time to land; they must never surface.
    std::thread::sleep(Duration::from_millis(20));
    assert!(pool.poll().iter().all(|r| r.epoch() == second));
}

#[test_log::test]
fn resize_grows_and_shrinks() {
    let mut pool = WorkerPool::new(2, loads(1, 0)).unwrap();
    pool.resize(5).unwrap();
    assert_eq!(pool.len(), 5);
    pool.resize(1).unwrap();
    assert_eq!(pool.len(), 1);
    assert!(matches!(pool.resize(0), Err(FillError::InvalidConfig(_))));
}
