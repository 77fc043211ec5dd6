//! Presentation surface state machine: bind-once-per-window, minimize on
//! zero-area resize, fullscreen snapping, view recreation across resizes,
//! thread-affine present and fatal device loss.

mod common;

use common::{device, device_with};
use vitric_driver::software::SoftwareOptions;
use vitric_driver::WindowHandle;
use vitric_gpu::{
    DeviceConfig, Format, RenderError, RenderSurface, SurfaceDesc, SurfaceState,
};

fn desc(width: u32, height: u32) -> SurfaceDesc {
    SurfaceDesc {
        width,
        height,
        ..SurfaceDesc::default()
    }
}

#[test]
fn a_window_binds_at_most_one_surface() {
    let (device, _driver) = device();
    let window = WindowHandle(0x10);

    let surface = RenderSurface::bind(&device, window, &desc(640, 480)).unwrap();
    assert_eq!(
        surface.state(),
        SurfaceState::Bound {
            width: 640,
            height: 480
        }
    );

    assert!(matches!(
        RenderSurface::bind(&device, window, &desc(640, 480)),
        Err(RenderError::OperationNotPermitted(_))
    ));

    // Releasing frees the window for a new surface.
    drop(surface);
    let _second = RenderSurface::bind(&device, window, &desc(640, 480)).unwrap();
}

#[test]
fn zero_area_resize_minimizes_without_error() {
    let (device, _driver) = device();
    let mut surface =
        RenderSurface::bind(&device, WindowHandle(0x11), &desc(640, 480)).unwrap();

    surface.resize(0, 0).unwrap();
    assert_eq!(surface.state(), SurfaceState::Minimized);
    assert!(surface.target_view().is_none());

    // Present has no target while minimized: transient, not fatal.
    assert!(matches!(
        surface.present(1),
        Err(RenderError::TryAgain(_))
    ));

    // A later nonzero resize restores the surface.
    surface.resize(800, 600).unwrap();
    assert_eq!(
        surface.state(),
        SurfaceState::Bound {
            width: 800,
            height: 600
        }
    );
    surface.present(1).unwrap();
}

#[test]
fn resize_releases_and_recreates_derived_views() {
    let (device, driver) = device();
    let mut surface =
        RenderSurface::bind(&device, WindowHandle(0x12), &desc(640, 480)).unwrap();

    let old_handle = surface.target_view().unwrap().handle();
    surface.resize(1024, 768).unwrap();
    let new_handle = surface.target_view().unwrap().handle();

    // The software driver refuses to resize while views of the old back
    // buffer are alive, so reaching here at all proves the release-first
    // ordering; the fresh handle proves recreation.
    assert_ne!(old_handle, new_handle);
    assert!(surface.shader_view().is_some());
    assert_eq!(driver.counters().snapshot().swap_chain_resizes, 1);
}

#[test]
fn fullscreen_resize_snaps_to_the_output_resolution() {
    let (device, _driver) = device_with(
        SoftwareOptions {
            output_resolution: (2560, 1440),
            ..SoftwareOptions::default()
        },
        &DeviceConfig::default(),
    );
    let mut surface =
        RenderSurface::bind(&device, WindowHandle(0x13), &desc(640, 480)).unwrap();

    surface.set_fullscreen_exclusive(true).unwrap();
    surface.resize(800, 600).unwrap();
    assert_eq!(
        surface.state(),
        SurfaceState::Bound {
            width: 2560,
            height: 1440
        }
    );

    // Windowed again, the requested size is honored.
    surface.set_fullscreen_exclusive(false).unwrap();
    surface.resize(800, 600).unwrap();
    assert_eq!(
        surface.state(),
        SurfaceState::Bound {
            width: 800,
            height: 600
        }
    );
}

#[test]
fn present_from_a_foreign_thread_is_rejected() {
    let (device, driver) = device();
    let mut surface =
        RenderSurface::bind(&device, WindowHandle(0x14), &desc(640, 480)).unwrap();

    std::thread::scope(|scope| {
        let handle = scope.spawn(|| surface.present(1));
        let result = handle.join().unwrap();
        assert!(matches!(
            result,
            Err(RenderError::OperationNotPermitted(_))
        ));
    });
    assert_eq!(driver.counters().snapshot().presents, 0);
}

#[test]
fn present_device_loss_is_fatal() {
    let (device, driver) = device();
    let mut surface =
        RenderSurface::bind(&device, WindowHandle(0x15), &desc(640, 480)).unwrap();

    surface.present(1).unwrap();
    driver.inject_device_loss();
    assert_eq!(surface.present(1).unwrap_err(), RenderError::NoSuchDevice);
}

#[test]
fn depth_formats_are_not_presentable() {
    let (device, _driver) = device();
    let result = RenderSurface::bind(
        &device,
        WindowHandle(0x16),
        &SurfaceDesc {
            format: Format::Depth32Float,
            ..desc(640, 480)
        },
    );
    assert!(matches!(result, Err(RenderError::InvalidArgument(_))));

    // A failed bind leaves the window free.
    let _surface = RenderSurface::bind(&device, WindowHandle(0x16), &desc(640, 480)).unwrap();
}

#[test]
fn unordered_back_buffer_views_are_tier_gated() {
    let (low, _driver) = device_with(
        SoftwareOptions {
            feature_tier: vitric_driver::FeatureTier::Level10_1,
            ..SoftwareOptions::default()
        },
        &DeviceConfig {
            minimum_feature_tier: vitric_driver::FeatureTier::Level9_1,
            ..DeviceConfig::default()
        },
    );
    let result = RenderSurface::bind(
        &low,
        WindowHandle(0x17),
        &SurfaceDesc {
            with_unordered: true,
            ..desc(640, 480)
        },
    );
    assert!(matches!(result, Err(RenderError::NotSupported(_))));

    let (device, _driver) = device();
    let surface = RenderSurface::bind(
        &device,
        WindowHandle(0x17),
        &SurfaceDesc {
            with_unordered: true,
            ..desc(640, 480)
        },
    )
    .unwrap();
    assert!(surface.unordered_view().is_some());
}

#[test]
fn rendering_into_the_surface_back_buffer() {
    let (device, driver) = device();
    let surface = RenderSurface::bind(&device, WindowHandle(0x18), &desc(640, 480)).unwrap();
    let immediate = device.immediate_command_list();

    immediate
        .set_render_targets(&[surface.target_view().unwrap()], None)
        .unwrap();
    immediate
        .clear_target(surface.target_view().unwrap(), [0.0, 0.0, 0.0, 1.0])
        .unwrap();
    immediate.draw(3, 0).unwrap();
    assert_eq!(driver.counters().snapshot().draws, 1);
}
