//! Resource factory decisions and the update-path dispatch: DEFAULT goes
//! through replace-subresource, DYNAMIC/STAGING through map, and validation
//! failures never reach the driver.

mod common;

use common::{device, device_with};
use vitric_driver::software::SoftwareOptions;
use vitric_driver::{FeatureTier, SubresourceData, Usage};
use vitric_gpu::{
    BufferKind, DeviceConfig, Format, RenderError, ResourceFlags, ResourceInfo,
};

fn rgba_payload(width: u32, height: u32) -> Vec<u8> {
    vec![0x7F; (width * height * 4) as usize]
}

#[test]
fn default_usage_updates_never_map() {
    let (device, driver) = device();
    let immediate = device.immediate_command_list();

    let buffer = device.make_buffer(BufferKind::Vertex, 16, 64, None).unwrap();
    assert_eq!(buffer.usage(), Usage::Default);

    immediate.update_buffer(&buffer, 0, &[1u8; 1024]).unwrap();
    immediate.update_buffer(&buffer, 64, &[2u8; 32]).unwrap();

    let counters = driver.counters().snapshot();
    assert_eq!(counters.update_subresource_calls, 2);
    assert_eq!(counters.map_calls, 0);
    assert_eq!(device.stats().snapshot().direct_updates, 2);
}

#[test]
fn dynamic_usage_updates_never_take_the_direct_path() {
    let (device, driver) = device();
    let immediate = device.immediate_command_list();

    let buffer = device
        .make_buffer(BufferKind::Constant, 16, 16, None)
        .unwrap();
    assert_eq!(buffer.usage(), Usage::Dynamic);

    immediate.update_buffer(&buffer, 0, &[3u8; 256]).unwrap();
    immediate.update_buffer(&buffer, 16, &[4u8; 16]).unwrap();

    let counters = driver.counters().snapshot();
    assert_eq!(counters.map_calls, 2);
    assert_eq!(counters.update_subresource_calls, 0);
    assert_eq!(device.stats().snapshot().mapped_updates, 2);

    // The bytes actually landed.
    let stored = driver.read_resource(buffer.handle(), 0).unwrap();
    assert_eq!(&stored[16..32], &[4u8; 16]);
}

#[test]
fn default_texture_updates_take_the_direct_path() {
    let (device, driver) = device();
    let immediate = device.immediate_command_list();

    let texture = device
        .make_texture(
            &ResourceInfo {
                flags: ResourceFlags::empty(),
                ..ResourceInfo::plain_2d(16, 16, Format::Rgba8Unorm)
            },
            &[],
        )
        .unwrap();
    // Reference tier, no target flags, no init: plain DEFAULT texture.
    assert_eq!(texture.usage(), Usage::Default);

    let payload = rgba_payload(16, 16);
    immediate
        .update_texture(
            &texture,
            0,
            None,
            &SubresourceData {
                data: &payload,
                row_pitch: 64,
                slice_pitch: 64 * 16,
            },
        )
        .unwrap();
    assert_eq!(driver.counters().snapshot().update_subresource_calls, 1);
    assert_eq!(driver.counters().snapshot().map_calls, 0);
}

#[test]
fn low_tier_forces_dynamic_except_vertex_and_index() {
    let (device, _driver) = device_with(
        SoftwareOptions {
            feature_tier: FeatureTier::Level9_3,
            ..SoftwareOptions::default()
        },
        &DeviceConfig {
            minimum_feature_tier: FeatureTier::Level9_1,
            ..DeviceConfig::default()
        },
    );

    let vertex = device.make_buffer(BufferKind::Vertex, 16, 8, None).unwrap();
    let index = device.make_buffer(BufferKind::Index, 2, 12, None).unwrap();
    let structured = device
        .make_buffer(BufferKind::Structured, 16, 8, None)
        .unwrap();
    assert_eq!(vertex.usage(), Usage::Default);
    assert_eq!(index.usage(), Usage::Default);
    assert_eq!(structured.usage(), Usage::Dynamic);

    let texture = device
        .make_texture(&ResourceInfo::plain_2d(8, 8, Format::Rgba8Unorm), &[])
        .unwrap();
    assert_eq!(texture.usage(), Usage::Dynamic);
}

#[test]
fn init_data_makes_resources_immutable_and_sealed() {
    let (device, _driver) = device();
    let immediate = device.immediate_command_list();

    let data = vec![5u8; 16 * 8];
    let vertex = device
        .make_buffer(BufferKind::Vertex, 16, 8, Some(&data))
        .unwrap();
    assert_eq!(vertex.usage(), Usage::Immutable);

    assert!(matches!(
        immediate.update_buffer(&vertex, 0, &data),
        Err(RenderError::OperationNotPermitted(_))
    ));
}

#[test]
fn constant_buffer_size_rules() {
    let (device, _driver) = device();

    // 20 bytes: not 16-byte aligned.
    assert!(matches!(
        device.make_buffer(BufferKind::Constant, 20, 1, None),
        Err(RenderError::InvalidArgument(_))
    ));
    // 80 KiB: over the 64 KiB limit.
    assert!(matches!(
        device.make_buffer(BufferKind::Constant, 16, 5 * 1024, None),
        Err(RenderError::InvalidArgument(_))
    ));
    assert!(device.make_buffer(BufferKind::Constant, 16, 4096, None).is_ok());
}

#[test]
fn index_buffer_stride_must_match_an_index_width() {
    let (device, _driver) = device();
    assert!(matches!(
        device.make_buffer(BufferKind::Index, 3, 12, None),
        Err(RenderError::InvalidArgument(_))
    ));
    assert!(device.make_buffer(BufferKind::Index, 2, 12, None).is_ok());
    assert!(device.make_buffer(BufferKind::Index, 4, 12, None).is_ok());
}

#[test]
fn raw_buffer_rules() {
    let (device, _driver) = device();
    assert!(matches!(
        device.make_buffer(BufferKind::Raw, 8, 16, None),
        Err(RenderError::InvalidArgument(_))
    ));
    assert!(matches!(
        device.make_buffer(BufferKind::Raw, 4, 2, None),
        Err(RenderError::InvalidArgument(_))
    ));
    assert!(device.make_buffer(BufferKind::Raw, 4, 3, None).is_ok());

    // Below the reference tier the kind itself is unavailable.
    let (low, _driver) = device_with(
        SoftwareOptions {
            feature_tier: FeatureTier::Level10_1,
            ..SoftwareOptions::default()
        },
        &DeviceConfig {
            minimum_feature_tier: FeatureTier::Level9_1,
            ..DeviceConfig::default()
        },
    );
    assert!(matches!(
        low.make_buffer(BufferKind::Raw, 4, 16, None),
        Err(RenderError::NotSupported(_))
    ));
}

#[test]
fn cube_texture_array_size_must_be_a_positive_multiple_of_six() {
    let (device, _driver) = device();

    let mut info = ResourceInfo::plain_2d(32, 32, Format::Rgba8Unorm);
    info.flags = ResourceFlags::CUBE | ResourceFlags::ARRAY;
    info.array_size = 4;
    assert!(matches!(
        device.make_texture(&info, &[]),
        Err(RenderError::InvalidArgument(_))
    ));

    info.array_size = 6;
    let cube = device.make_texture(&info, &[]).unwrap();
    assert_eq!(cube.array_layers(), 6);
}

#[test]
fn readback_excludes_target_flags() {
    let (device, _driver) = device();

    let mut info = ResourceInfo::plain_2d(8, 8, Format::Rgba8Unorm);
    info.flags = ResourceFlags::READBACK | ResourceFlags::RENDER_TARGET;
    assert!(matches!(
        device.make_texture(&info, &[]),
        Err(RenderError::InvalidArgument(_))
    ));
}

#[test]
fn unordered_access_requires_the_reference_tier() {
    let (low, _driver) = device_with(
        SoftwareOptions {
            feature_tier: FeatureTier::Level10_0,
            ..SoftwareOptions::default()
        },
        &DeviceConfig {
            minimum_feature_tier: FeatureTier::Level9_1,
            ..DeviceConfig::default()
        },
    );

    let mut info = ResourceInfo::plain_2d(8, 8, Format::Rgba8Unorm);
    info.flags = ResourceFlags::UNORDERED_ACCESS;
    assert!(matches!(
        low.make_texture(&info, &[]),
        Err(RenderError::NotSupported(_))
    ));
}

#[test]
fn depth_textures_store_typeless_and_derive_both_views() {
    let (device, _driver) = device();

    let mut info = ResourceInfo::plain_2d(256, 256, Format::Depth24UnormStencil8);
    info.flags = ResourceFlags::DEPTH_TARGET;
    let depth = device.make_texture(&info, &[]).unwrap();

    // Both views resolve through the format triple against the typeless
    // storage; the software driver rejects any illegal family member.
    let target = device.make_target_view(&depth).unwrap();
    assert!(target.is_depth());
    let _shader = device.make_shader_view(&depth).unwrap();
}

#[test]
fn mip_chain_resolution() {
    let (device, _driver) = device();

    let mut info = ResourceInfo::plain_2d(256, 64, Format::Rgba8Unorm);
    info.flags = ResourceFlags::MIPPED;
    info.mip_levels = 0;
    let texture = device.make_texture(&info, &[]).unwrap();
    assert_eq!(texture.mip_levels(), 9);
    assert_eq!(texture.mip_extent(8), (1, 1, 1));
    assert_eq!(texture.mip_extent(2), (64, 16, 1));
}

#[test]
fn pitched_update_repacks_rows() {
    let (device, driver) = device();
    let immediate = device.immediate_command_list();

    let texture = device
        .make_texture(&ResourceInfo::plain_2d(4, 2, Format::Rgba8Unorm), &[])
        .unwrap();

    // Source rows padded to 24 bytes; the tight row is 16.
    let mut payload = vec![0u8; 48];
    for (row, chunk) in payload.chunks_mut(24).enumerate() {
        for b in chunk[..16].iter_mut() {
            *b = row as u8 + 1;
        }
    }
    immediate
        .update_texture(
            &texture,
            0,
            None,
            &SubresourceData {
                data: &payload,
                row_pitch: 24,
                slice_pitch: 48,
            },
        )
        .unwrap();

    let stored = driver.read_resource(texture.handle(), 0).unwrap();
    assert_eq!(&stored[..16], &[1u8; 16]);
    assert_eq!(&stored[16..32], &[2u8; 16]);
}

#[test]
fn readback_round_trip_through_copy() {
    let (device, _driver) = device();
    let immediate = device.immediate_command_list();

    let source = device.make_buffer(BufferKind::Vertex, 4, 16, None).unwrap();
    let readback = device
        .make_buffer(BufferKind::Readback, 4, 16, None)
        .unwrap();

    immediate.update_buffer(&source, 0, &[9u8; 64]).unwrap();
    immediate.copy_buffer(&source, &readback).unwrap();

    let bytes = immediate
        .read_buffer(&readback, |data| data.to_vec())
        .unwrap();
    assert_eq!(bytes, vec![9u8; 64]);

    // Readback memory is not CPU-writable.
    assert!(matches!(
        immediate.update_buffer(&readback, 0, &[1u8; 64]),
        Err(RenderError::OperationNotPermitted(_))
    ));
}

#[test]
fn scratch_reservations_die_with_the_frame() {
    let (device, _driver) = device();

    device.begin_frame().unwrap();
    let slice = device
        .scratch()
        .reserve(64, 16, |bytes| bytes.fill(0xAB))
        .unwrap();
    device
        .scratch()
        .with_slice(slice, |bytes| assert_eq!(bytes[0], 0xAB))
        .unwrap();
    device.end_frame().unwrap();

    // The next frame recycles the arena; the old reservation is invalid.
    device.begin_frame().unwrap();
    assert!(matches!(
        device.scratch().with_slice(slice, |_| ()),
        Err(RenderError::OperationNotPermitted(_))
    ));
}
