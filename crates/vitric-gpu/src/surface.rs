//! Presentation surface: the swap chain plus its derived views.
//!
//! One surface per window, enforced at bind time. The surface follows the
//! single-view-with-derived-views policy: the back buffer carries exactly
//! one render-target view, one shader-read view and (on capable hardware,
//! when asked) one unordered view, all of which are released before a native
//! resize and recreated against the new back buffer afterwards.
//!
//! Present must happen on the thread that bound the surface — the native
//! swap chain has thread affinity — and a zero-area resize means the window
//! minimized: the surface quietly drops to an unbound state instead of
//! erroring.

use std::sync::Arc;
use std::thread::ThreadId;

use tracing::{debug, info};

use vitric_driver::{
    DriverSwapChain, FeatureTier, SwapChainDesc, ViewKind, WindowHandle,
};

use crate::device::{Device, DeviceShared};
use crate::error::{RenderError, RenderResult};
use crate::format::Format;
use crate::resource::{ShaderView, TargetView, UnorderedView};

/// Surface creation parameters.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceDesc {
    pub width: u32,
    pub height: u32,
    pub format: Format,
    pub buffer_count: u32,
    /// Also derive an unordered view of the back buffer (compute writes to
    /// the frame). Requires the reference tier.
    pub with_unordered: bool,
}

impl Default for SurfaceDesc {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            format: Format::Bgra8Unorm,
            buffer_count: 2,
            with_unordered: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceState {
    /// Bound to a window with live views, at the given size.
    Bound { width: u32, height: u32 },
    /// The window minimized; views are released, presents report
    /// `TryAgain` until a nonzero resize.
    Minimized,
    /// Released for good.
    Released,
}

struct DerivedViews {
    target: TargetView,
    shader: ShaderView,
    unordered: Option<UnorderedView>,
}

/// A window's swap chain and derived views. Single-threaded by design: it
/// lives on the thread that binds it.
pub struct RenderSurface {
    device: Arc<DeviceShared>,
    window: WindowHandle,
    owner: ThreadId,
    swap_chain: Box<dyn DriverSwapChain>,
    views: Option<DerivedViews>,
    with_unordered: bool,
    released: bool,
}

impl RenderSurface {
    /// Bind a surface to `window`. Fails if the window already has one.
    pub fn bind(device: &Device, window: WindowHandle, desc: &SurfaceDesc) -> RenderResult<Self> {
        let shared = Arc::clone(device.shared());

        if desc.width == 0 || desc.height == 0 {
            return Err(RenderError::InvalidArgument(format!(
                "surface size {}x{} has a zero axis",
                desc.width, desc.height
            )));
        }
        if desc.format.is_depth() {
            return Err(RenderError::InvalidArgument(format!(
                "surface format {:?} must be a color format",
                desc.format
            )));
        }
        if desc.with_unordered && shared.caps.feature_tier < FeatureTier::REFERENCE {
            return Err(RenderError::NotSupported(format!(
                "unordered back-buffer access requires {:?}, device is {:?}",
                FeatureTier::REFERENCE,
                shared.caps.feature_tier
            )));
        }

        {
            let mut bound = shared.bound_windows.lock().unwrap();
            if !bound.insert(window.0) {
                return Err(RenderError::OperationNotPermitted(format!(
                    "window {:#x} is already bound to a surface",
                    window.0
                )));
            }
        }

        let create = || -> RenderResult<Self> {
            let swap_chain = shared.driver.create_swap_chain(
                window,
                &SwapChainDesc {
                    width: desc.width,
                    height: desc.height,
                    format: desc.format.to_native(),
                    buffer_count: desc.buffer_count,
                    allow_unordered: desc.with_unordered,
                },
            )?;
            let mut surface = Self {
                device: Arc::clone(&shared),
                window,
                owner: std::thread::current().id(),
                swap_chain,
                views: None,
                with_unordered: desc.with_unordered,
                released: false,
            };
            surface.views = Some(surface.derive_views()?);
            info!(
                window = window.0,
                width = desc.width,
                height = desc.height,
                format = ?desc.format,
                "surface bound"
            );
            Ok(surface)
        };

        // Unbind the window again if any creation step failed, so the caller
        // can retry with a corrected descriptor.
        create().inspect_err(|_| {
            shared.bound_windows.lock().unwrap().remove(&window.0);
        })
    }

    fn derive_views(&mut self) -> RenderResult<DerivedViews> {
        let back = self.swap_chain.back_buffer()?;
        let format = self.swap_chain.desc().format;
        let driver = &self.device.driver;

        let target = TargetView {
            handle: driver.create_view(back, ViewKind::RenderTarget, format)?,
            is_depth: false,
            device: Arc::clone(&self.device),
        };
        let shader = ShaderView {
            handle: driver.create_view(back, ViewKind::ShaderResource, format)?,
            device: Arc::clone(&self.device),
        };
        let unordered = if self.with_unordered {
            Some(UnorderedView {
                handle: driver.create_view(back, ViewKind::UnorderedAccess, format)?,
                device: Arc::clone(&self.device),
            })
        } else {
            None
        };
        Ok(DerivedViews {
            target,
            shader,
            unordered,
        })
    }

    pub fn state(&self) -> SurfaceState {
        if self.released {
            SurfaceState::Released
        } else if self.views.is_none() {
            SurfaceState::Minimized
        } else {
            let desc = self.swap_chain.desc();
            SurfaceState::Bound {
                width: desc.width,
                height: desc.height,
            }
        }
    }

    pub fn window(&self) -> WindowHandle {
        self.window
    }

    /// The render-target view of the current back buffer.
    pub fn target_view(&self) -> Option<&TargetView> {
        self.views.as_ref().map(|v| &v.target)
    }

    /// The shader-read view of the current back buffer.
    pub fn shader_view(&self) -> Option<&ShaderView> {
        self.views.as_ref().map(|v| &v.shader)
    }

    pub fn unordered_view(&self) -> Option<&UnorderedView> {
        self.views.as_ref().and_then(|v| v.unordered.as_ref())
    }

    /// Resize the surface.
    ///
    /// Zero area deinitializes (minimized, not an error). In exclusive
    /// fullscreen the request is snapped to the output's full resolution.
    pub fn resize(&mut self, width: u32, height: u32) -> RenderResult<()> {
        self.ensure_live()?;

        if width == 0 || height == 0 {
            self.views = None;
            debug!(window = self.window.0, "surface minimized");
            return Ok(());
        }

        let (width, height) = if self.swap_chain.is_fullscreen() {
            let (out_w, out_h) = self.swap_chain.output_resolution();
            if (out_w, out_h) != (width, height) {
                debug!(
                    window = self.window.0,
                    requested_w = width,
                    requested_h = height,
                    out_w,
                    out_h,
                    "fullscreen resize snapped to output resolution"
                );
            }
            (out_w, out_h)
        } else {
            (width, height)
        };

        // Views of the old back buffer must be gone before the native
        // resize; the driver refuses otherwise.
        self.views = None;
        self.swap_chain.resize_buffers(width, height)?;
        self.views = Some(self.derive_views()?);
        self.device.stats.inc_surface_resizes();
        debug!(window = self.window.0, width, height, "surface resized");
        Ok(())
    }

    pub fn set_fullscreen_exclusive(&mut self, exclusive: bool) -> RenderResult<()> {
        self.ensure_live()?;
        self.swap_chain.set_fullscreen(exclusive).map_err(Into::into)
    }

    pub fn is_fullscreen(&self) -> bool {
        self.swap_chain.is_fullscreen()
    }

    /// Present the back buffer.
    ///
    /// Must be called from the binding thread. Device removal during present
    /// is fatal and surfaces as [`RenderError::NoSuchDevice`].
    pub fn present(&mut self, sync_interval: u32) -> RenderResult<()> {
        self.ensure_live()?;
        if std::thread::current().id() != self.owner {
            return Err(RenderError::OperationNotPermitted(
                "present called from a thread that does not own the surface".into(),
            ));
        }
        if self.views.is_none() {
            return Err(RenderError::TryAgain(
                "surface is minimized; present has no target".into(),
            ));
        }
        self.swap_chain.present(sync_interval)?;
        self.device.stats.inc_presents();
        Ok(())
    }

    /// Release the surface and unbind its window.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.views = None;
        self.released = true;
        self.device.bound_windows.lock().unwrap().remove(&self.window.0);
        info!(window = self.window.0, "surface released");
    }

    fn ensure_live(&self) -> RenderResult<()> {
        if self.released {
            return Err(RenderError::OperationNotPermitted(
                "surface has been released".into(),
            ));
        }
        Ok(())
    }
}

impl Drop for RenderSurface {
    fn drop(&mut self) {
        self.release();
    }
}
