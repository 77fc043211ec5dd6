//! Driver traits: the exact call surface the submission core consumes.
//!
//! One [`DriverDevice`] fronts one physical adapter. It hands out exactly one
//! immediate [`DriverContext`] (the real hardware queue) plus any number of
//! deferred contexts, which record into private [`DriverCommandBuffer`]s that
//! only the immediate context may replay. Drivers validate their own rules
//! (usage-class legality, context flavor misuse) and report violations as
//! [`DriverError::InvalidCall`] rather than corrupting state.

use std::any::Any;

use crate::types::{
    BlendDesc, BufferDesc, DepthStencilDesc, DriverCreateOptions, DriverFormat, FeatureTier,
    MapMode, MappedSubresource, RasterizerDesc, Region, ResourceHandle, SamplerDesc, ShaderHandle,
    ShaderStage, StateHandle, SwapChainDesc, SubresourceData, TextureDesc, ViewHandle, ViewKind,
    Viewport, WindowHandle,
};

/// Errors surfaced by the native driver.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DriverError {
    /// The device was removed or reset. Fatal; the device must be recreated.
    #[error("device removed or reset")]
    DeviceLost,
    /// Driver-side allocation failure.
    #[error("native allocation failed: {0}")]
    OutOfMemory(String),
    /// The caller violated a driver rule (wrong usage class for an update
    /// path, deferred-only call on the immediate context, ...).
    #[error("invalid driver call: {0}")]
    InvalidCall(String),
    /// The hardware tier does not support the requested operation.
    #[error("unsupported by this driver: {0}")]
    Unsupported(String),
    /// The validation/debug layer was requested but is not installed.
    #[error("driver debug layer unavailable")]
    DebugLayerUnavailable,
}

pub type DriverResult<T> = Result<T, DriverError>;

/// An opaque, finished recording produced by a deferred context.
///
/// The payload type is private to the driver that produced it; the core only
/// moves these around and feeds them back to the same driver's immediate
/// context.
pub struct DriverCommandBuffer {
    inner: Box<dyn Any + Send>,
}

impl DriverCommandBuffer {
    pub fn new(inner: Box<dyn Any + Send>) -> Self {
        Self { inner }
    }

    /// Recover the driver-private payload. Returns `None` if `buffer` was
    /// produced by a different driver implementation.
    pub fn downcast<T: 'static>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl std::fmt::Debug for DriverCommandBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverCommandBuffer").finish_non_exhaustive()
    }
}

/// Creates driver devices. The core uses this indirection to retry device
/// creation with degraded options (e.g. without the debug layer).
pub trait DriverFactory {
    fn create_device(
        &self,
        options: &DriverCreateOptions,
    ) -> DriverResult<std::sync::Arc<dyn DriverDevice>>;
}

/// One physical adapter. Creation calls are internally synchronized and may
/// be issued from any thread; context calls are not (see [`DriverContext`]).
pub trait DriverDevice: Send + Sync {
    fn feature_tier(&self) -> FeatureTier;
    fn supports_deferred_contexts(&self) -> bool;
    /// True for software/reference rasterizer devices.
    fn is_software(&self) -> bool;
    fn debug_layer_enabled(&self) -> bool;

    fn create_buffer(
        &self,
        desc: &BufferDesc,
        init: Option<&SubresourceData<'_>>,
    ) -> DriverResult<ResourceHandle>;

    /// `init` carries one entry per subresource (mip-major, then layer) or is
    /// empty for uninitialized resources.
    fn create_texture(
        &self,
        desc: &TextureDesc,
        init: &[SubresourceData<'_>],
    ) -> DriverResult<ResourceHandle>;

    fn create_view(
        &self,
        resource: ResourceHandle,
        kind: ViewKind,
        format: DriverFormat,
    ) -> DriverResult<ViewHandle>;

    fn create_shader(&self, stage: ShaderStage, bytecode: &[u8]) -> DriverResult<ShaderHandle>;

    fn create_blend_state(&self, desc: &BlendDesc) -> DriverResult<StateHandle>;
    fn create_rasterizer_state(&self, desc: &RasterizerDesc) -> DriverResult<StateHandle>;
    fn create_depth_stencil_state(&self, desc: &DepthStencilDesc) -> DriverResult<StateHandle>;
    fn create_sampler_state(&self, desc: &SamplerDesc) -> DriverResult<StateHandle>;

    fn destroy_resource(&self, resource: ResourceHandle);
    fn destroy_view(&self, view: ViewHandle);
    fn destroy_shader(&self, shader: ShaderHandle);
    fn destroy_state(&self, state: StateHandle);

    /// Hand out the single immediate context. Fails on the second call.
    fn take_immediate_context(&self) -> DriverResult<Box<dyn DriverContext>>;

    /// Create a private recording context. Fails with
    /// [`DriverError::Unsupported`] when the driver cannot record deferred
    /// command lists.
    fn create_deferred_context(&self) -> DriverResult<Box<dyn DriverContext>>;

    fn create_swap_chain(
        &self,
        window: WindowHandle,
        desc: &SwapChainDesc,
    ) -> DriverResult<Box<dyn DriverSwapChain>>;
}

/// A command recording/submission context.
///
/// Contexts are single-threaded objects: at most one thread may call into a
/// given context at a time, and calls are not reentrant. The core enforces
/// this above the boundary; drivers may assume it.
pub trait DriverContext: Send {
    fn is_deferred(&self) -> bool;

    /// Whole-or-region subresource replacement. Illegal on DYNAMIC and
    /// STAGING resources; the source bytes are consumed before returning.
    fn update_subresource(
        &mut self,
        resource: ResourceHandle,
        subresource: u32,
        region: Option<Region>,
        data: &SubresourceData<'_>,
    ) -> DriverResult<()>;

    /// Map a subresource for CPU access for the duration of `access`.
    /// Illegal on IMMUTABLE and DEFAULT resources.
    fn map(
        &mut self,
        resource: ResourceHandle,
        subresource: u32,
        mode: MapMode,
        access: &mut dyn FnMut(MappedSubresource<'_>),
    ) -> DriverResult<()>;

    fn set_render_targets(
        &mut self,
        colors: &[ViewHandle],
        depth: Option<ViewHandle>,
    ) -> DriverResult<()>;
    fn set_viewport(&mut self, viewport: &Viewport) -> DriverResult<()>;

    fn set_blend_state(&mut self, state: StateHandle) -> DriverResult<()>;
    fn set_rasterizer_state(&mut self, state: StateHandle) -> DriverResult<()>;
    fn set_depth_stencil_state(&mut self, state: StateHandle) -> DriverResult<()>;
    fn set_sampler(&mut self, slot: u32, state: StateHandle) -> DriverResult<()>;

    fn set_shader(&mut self, stage: ShaderStage, shader: ShaderHandle) -> DriverResult<()>;
    fn set_shader_resource(&mut self, slot: u32, view: ViewHandle) -> DriverResult<()>;
    fn set_constant_buffer(
        &mut self,
        stage: ShaderStage,
        slot: u32,
        buffer: ResourceHandle,
    ) -> DriverResult<()>;
    fn set_vertex_buffer(
        &mut self,
        slot: u32,
        buffer: ResourceHandle,
        stride: u32,
        offset: u64,
    ) -> DriverResult<()>;
    fn set_index_buffer(
        &mut self,
        buffer: ResourceHandle,
        format: DriverFormat,
        offset: u64,
    ) -> DriverResult<()>;

    fn clear_render_target(&mut self, view: ViewHandle, color: [f32; 4]) -> DriverResult<()>;
    fn clear_depth_stencil(
        &mut self,
        view: ViewHandle,
        depth: f32,
        stencil: u8,
    ) -> DriverResult<()>;

    fn draw(&mut self, vertex_count: u32, start_vertex: u32) -> DriverResult<()>;
    fn draw_indexed(
        &mut self,
        index_count: u32,
        start_index: u32,
        base_vertex: i32,
    ) -> DriverResult<()>;
    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> DriverResult<()>;

    /// GPU-side whole-resource copy. Source and destination must match in
    /// size and subresource layout; the destination must not be IMMUTABLE.
    /// This is the only way data reaches a readback resource.
    fn copy_resource(&mut self, src: ResourceHandle, dst: ResourceHandle) -> DriverResult<()>;

    /// Deferred contexts only: close the recording and return the replayable
    /// buffer. The context is reset and may record again afterwards.
    fn finish(&mut self) -> DriverResult<DriverCommandBuffer>;

    /// Immediate context only: replay a finished deferred recording onto the
    /// hardware queue.
    fn execute(&mut self, buffer: &DriverCommandBuffer) -> DriverResult<()>;
}

/// The swappable front/back buffer pair bound to a window.
pub trait DriverSwapChain: Send {
    fn desc(&self) -> SwapChainDesc;

    /// Resize the back buffers. All views derived from the previous back
    /// buffer must already be released.
    fn resize_buffers(&mut self, width: u32, height: u32) -> DriverResult<()>;

    /// The current back buffer. The returned handle is owned by the swap
    /// chain and is invalidated by `resize_buffers`.
    fn back_buffer(&mut self) -> DriverResult<ResourceHandle>;

    fn present(&mut self, sync_interval: u32) -> DriverResult<()>;

    fn set_fullscreen(&mut self, exclusive: bool) -> DriverResult<()>;
    fn is_fullscreen(&self) -> bool;

    /// Full resolution of the output the swap chain currently occupies.
    fn output_resolution(&self) -> (u32, u32);
}
