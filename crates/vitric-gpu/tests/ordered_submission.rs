//! The central concurrency contract: draw-order-ascending replay of
//! independently recorded command lists, duplicate-order rejection, and the
//! recording/flush gate.

mod common;

use std::sync::mpsc;
use std::time::Duration;

use common::device;
use vitric_driver::software::SoftwareOptions;
use vitric_gpu::{
    BufferKind, CommandListDesc, DeviceConfig, DrawOrder, RenderError,
};

fn list_desc(name: &str, order: u32) -> CommandListDesc {
    CommandListDesc {
        name: name.into(),
        draw_order: DrawOrder(order),
    }
}

#[test]
fn registry_iterates_in_ascending_draw_order() {
    let (device, _driver) = device();

    let orders = [9, 1, 17, 4, 12, 2];
    let lists: Vec<_> = orders
        .iter()
        .map(|&order| {
            device
                .create_command_list(&list_desc(&format!("list-{order}"), order))
                .unwrap()
        })
        .collect();
    for list in &lists {
        device.insert(list).unwrap();
    }

    let registered: Vec<u32> = device
        .registered_draw_orders()
        .into_iter()
        .map(|order| order.0)
        .collect();
    assert_eq!(registered, [1, 2, 4, 9, 12, 17]);
}

#[test]
fn duplicate_draw_order_fails_without_mutating_the_registry() {
    let (device, driver) = device();

    let first = device.create_command_list(&list_desc("first", 3)).unwrap();
    let second = device.create_command_list(&list_desc("second", 3)).unwrap();
    device.insert(&first).unwrap();

    let err = device.insert(&second).unwrap_err();
    assert!(matches!(err, RenderError::OperationNotPermitted(_)));
    assert_eq!(device.registered_draw_orders(), vec![DrawOrder(3)]);

    // The first list is unaffected and replays normally.
    first.begin().unwrap();
    first.draw(3, 0).unwrap();
    first.end().unwrap();
    device.end_frame().unwrap();
    assert_eq!(driver.counters().snapshot().executed_command_buffers, 1);
    assert_eq!(driver.counters().snapshot().draws, 1);
}

#[test]
fn replay_is_ascending_regardless_of_insert_and_record_order() {
    let (device, driver) = device();

    // Each list overwrites the first `order` bytes of a shared buffer with
    // its own order value. Ascending replay leaves `3` everywhere the
    // highest-order list wrote; any other replay order leaves a smaller
    // value in byte 0.
    let target = device
        .make_buffer(BufferKind::Vertex, 4, 1, None)
        .unwrap();

    let lists: Vec<_> = [3u32, 1, 2]
        .iter()
        .map(|&order| {
            device
                .create_command_list(&list_desc(&format!("writer-{order}"), order))
                .unwrap()
        })
        .collect();

    // Record in the scrambled creation order, insert in yet another order.
    for list in &lists {
        let order = list.draw_order().0 as u8;
        list.begin().unwrap();
        list.update_buffer(&target, 0, &vec![order; order as usize])
            .unwrap();
        list.end().unwrap();
    }
    device.insert(&lists[1]).unwrap();
    device.insert(&lists[0]).unwrap();
    device.insert(&lists[2]).unwrap();

    device.end_frame().unwrap();

    let bytes = driver.read_resource(target.handle(), 0).unwrap();
    assert_eq!(&bytes[..3], &[3, 3, 3]);
}

#[test]
fn unfinished_lists_are_skipped_and_may_finish_later() {
    let (device, driver) = device();

    let ready = device.create_command_list(&list_desc("ready", 1)).unwrap();
    let idle = device.create_command_list(&list_desc("idle", 2)).unwrap();
    device.insert(&ready).unwrap();
    device.insert(&idle).unwrap();

    ready.begin().unwrap();
    ready.draw(3, 0).unwrap();
    ready.end().unwrap();

    // `idle` never recorded this frame; the flush skips it silently.
    device.end_frame().unwrap();
    assert_eq!(driver.counters().snapshot().executed_command_buffers, 1);

    // It can still finish in a later frame.
    idle.begin().unwrap();
    idle.dispatch(1, 1, 1).unwrap();
    idle.end().unwrap();
    device.end_frame().unwrap();
    assert_eq!(driver.counters().snapshot().executed_command_buffers, 2);
}

#[test]
fn finished_buffers_replay_at_most_once() {
    let (device, driver) = device();

    let list = device.create_command_list(&list_desc("once", 5)).unwrap();
    device.insert(&list).unwrap();
    list.begin().unwrap();
    list.draw(3, 0).unwrap();
    list.end().unwrap();

    device.end_frame().unwrap();
    device.end_frame().unwrap();
    assert_eq!(driver.counters().snapshot().executed_command_buffers, 1);
}

#[test]
fn removed_lists_are_not_replayed() {
    let (device, driver) = device();

    let list = device.create_command_list(&list_desc("removed", 1)).unwrap();
    device.insert(&list).unwrap();
    list.begin().unwrap();
    list.draw(3, 0).unwrap();
    list.end().unwrap();

    device.remove(&list);
    assert!(device.registered_draw_orders().is_empty());
    device.end_frame().unwrap();
    assert_eq!(driver.counters().snapshot().executed_command_buffers, 0);
}

#[test]
fn flush_waits_for_an_open_recording() {
    let (device, driver) = device();

    let list = device.create_command_list(&list_desc("slow", 1)).unwrap();
    device.insert(&list).unwrap();

    let (started_tx, started_rx) = mpsc::channel();
    std::thread::scope(|scope| {
        let recorder = {
            let list = list.clone();
            scope.spawn(move || {
                list.begin().unwrap();
                started_tx.send(()).unwrap();
                list.draw(3, 0).unwrap();
                std::thread::sleep(Duration::from_millis(100));
                list.end().unwrap();
            })
        };

        // Only flush once the recording window is definitely open; the
        // flush must then wait it out and replay the finished buffer.
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        device.end_frame().unwrap();
        assert_eq!(driver.counters().snapshot().executed_command_buffers, 1);

        recorder.join().unwrap();
    });
}

#[test]
fn many_threads_record_concurrently() {
    let (device, driver) = device();

    let lists: Vec<_> = (0..8)
        .map(|order| {
            let list = device
                .create_command_list(&list_desc(&format!("worker-{order}"), order))
                .unwrap();
            device.insert(&list).unwrap();
            list
        })
        .collect();

    std::thread::scope(|scope| {
        for list in &lists {
            scope.spawn(move || {
                list.begin().unwrap();
                for _ in 0..4 {
                    list.draw(3, 0).unwrap();
                }
                list.end().unwrap();
            });
        }
    });

    device.end_frame().unwrap();
    let counters = driver.counters().snapshot();
    assert_eq!(counters.executed_command_buffers, 8);
    assert_eq!(counters.draws, 32);
}

#[test]
fn deferred_lists_require_driver_support() {
    let (device, _driver) = common::device_with(
        SoftwareOptions {
            supports_deferred_contexts: false,
            ..SoftwareOptions::default()
        },
        &DeviceConfig::default(),
    );

    let err = device
        .create_command_list(&list_desc("unsupported", 1))
        .unwrap_err();
    assert!(matches!(err, RenderError::NotSupported(_)));
}

#[test]
fn recording_outside_begin_end_is_rejected() {
    let (device, _driver) = device();
    let list = device.create_command_list(&list_desc("cold", 1)).unwrap();

    assert!(matches!(
        list.draw(3, 0),
        Err(RenderError::OperationNotPermitted(_))
    ));
    assert!(matches!(
        list.end(),
        Err(RenderError::OperationNotPermitted(_))
    ));

    list.begin().unwrap();
    assert!(matches!(
        list.begin(),
        Err(RenderError::OperationNotPermitted(_))
    ));
    list.end().unwrap();
}
