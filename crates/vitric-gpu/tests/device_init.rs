//! Device creation: capability gating, debug-layer degradation, software
//! emulation, frame lifecycle and fatal device loss.

mod common;

use common::{device, device_with};
use vitric_driver::software::{SoftwareFactory, SoftwareOptions};
use vitric_driver::{DriverDevice, FeatureTier};
use vitric_gpu::{
    CommandListDesc, DebugLevel, Device, DeviceConfig, DrawOrder, RenderError,
};

#[test]
fn minimum_tier_above_hardware_is_not_supported() {
    let factory = SoftwareFactory::new(SoftwareOptions {
        feature_tier: FeatureTier::Level10_0,
        ..SoftwareOptions::default()
    });
    let config = DeviceConfig {
        minimum_feature_tier: FeatureTier::Level11_0,
        ..DeviceConfig::default()
    };

    let err = Device::create(&factory, &config).unwrap_err();
    assert!(matches!(err, RenderError::NotSupported(_)));
}

#[test]
fn missing_debug_layer_degrades_instead_of_failing() {
    let (device, driver) = device_with(
        SoftwareOptions {
            debug_layer_available: false,
            ..SoftwareOptions::default()
        },
        &DeviceConfig {
            debug_level: DebugLevel::Normal,
            ..DeviceConfig::default()
        },
    );

    // The device exists, just without driver validation.
    assert!(!device.caps().debug_layer);
    assert!(!driver.debug_layer_enabled());
}

#[test]
fn debug_layer_is_used_when_available() {
    let (device, _driver) = device_with(
        SoftwareOptions::default(),
        &DeviceConfig {
            debug_level: DebugLevel::Max,
            ..DeviceConfig::default()
        },
    );
    assert!(device.caps().debug_layer);
}

#[test]
fn capability_snapshot_reflects_driver_and_config() {
    let (device, _driver) = device_with(
        SoftwareOptions::default(),
        &DeviceConfig {
            multithreaded: false,
            use_software_emulation: true,
            ..DeviceConfig::default()
        },
    );
    let caps = device.caps();
    assert!(caps.software_emulation);
    // The driver supports deferred contexts, but the config did not ask for
    // multithreading; the capability is the conjunction.
    assert!(!caps.deferred_contexts);
}

#[test]
fn frame_ids_are_monotonic() {
    let (device, _driver) = device();
    assert_eq!(device.frame_id(), 0);
    assert_eq!(device.begin_frame().unwrap(), 1);
    device.end_frame().unwrap();
    assert_eq!(device.begin_frame().unwrap(), 2);
    assert_eq!(device.frame_id(), 2);

    let stats = device.stats().snapshot();
    assert_eq!(stats.frames_begun, 2);
    assert_eq!(stats.frames_completed, 1);
}

#[test]
fn device_loss_during_flush_is_fatal_and_not_retried() {
    let (device, driver) = device();

    let list = device
        .create_command_list(&CommandListDesc {
            name: "doomed".into(),
            draw_order: DrawOrder(1),
        })
        .unwrap();
    device.insert(&list).unwrap();
    list.begin().unwrap();
    list.draw(3, 0).unwrap();
    list.end().unwrap();

    driver.inject_device_loss();
    assert_eq!(device.end_frame().unwrap_err(), RenderError::NoSuchDevice);
    // No replay went through.
    assert_eq!(driver.counters().snapshot().executed_command_buffers, 0);
}

#[test]
fn immediate_list_carries_the_reserved_order() {
    let (device, _driver) = device();
    let immediate = device.immediate_command_list();
    assert!(immediate.is_immediate());
    assert_eq!(immediate.draw_order(), DrawOrder::IMMEDIATE);

    // The reserved order cannot be claimed by a deferred list, and the
    // immediate list cannot be registered.
    let err = device
        .create_command_list(&CommandListDesc {
            name: "imposter".into(),
            draw_order: DrawOrder::IMMEDIATE,
        })
        .unwrap_err();
    assert!(matches!(err, RenderError::InvalidArgument(_)));
    assert!(matches!(
        device.insert(immediate),
        Err(RenderError::OperationNotPermitted(_))
    ));
}

#[test]
fn stats_track_replays_and_frames() {
    let (device, _driver) = device();

    device.begin_frame().unwrap();
    let list = device
        .create_command_list(&CommandListDesc {
            name: "counted".into(),
            draw_order: DrawOrder(1),
        })
        .unwrap();
    device.insert(&list).unwrap();
    list.begin().unwrap();
    list.draw(3, 0).unwrap();
    list.end().unwrap();
    device.end_frame().unwrap();

    let stats = device.stats().snapshot();
    assert_eq!(stats.deferred_replays, 1);
    assert_eq!(stats.frames_completed, 1);
}
