//! Command lists: recorders of GPU commands.
//!
//! Exactly two flavors exist. The *immediate* list wraps the single real
//! hardware queue and is driven, by convention, by the presentation thread.
//! *Deferred* lists record into a private driver context and carry a
//! caller-assigned draw order; their finished buffers are replayed onto the
//! immediate queue at `end_frame`, in ascending draw order, regardless of
//! which threads recorded them in which order.
//!
//! Recording into one list is single-writer: calls are serialized through
//! the context lock, but interleaving two threads in one recording is a
//! caller error this module does not try to detect.

use std::sync::{Arc, Mutex};

use tracing::trace;

use vitric_driver::{
    DriverCommandBuffer, DriverContext, Region, ShaderStage, SubresourceData, Viewport,
};

use crate::device::DeviceShared;
use crate::error::{RenderError, RenderResult};
use crate::format::Format;
use crate::resource::{Buffer, BufferKind, ShaderView, TargetView};
use crate::shader::Shader;
use crate::state::{BlendPreset, DepthStencilPreset, RasterizerPreset, SamplerPreset};

/// Caller-assigned replay key. Smaller orders replay first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DrawOrder(pub u32);

impl DrawOrder {
    /// Reserved key designating the one list that maps directly onto the
    /// real hardware queue.
    pub const IMMEDIATE: DrawOrder = DrawOrder(u32::MAX);

    pub fn is_immediate(self) -> bool {
        self == Self::IMMEDIATE
    }
}

#[derive(Debug, Clone)]
pub struct CommandListDesc {
    pub name: String,
    pub draw_order: DrawOrder,
}

/// `recording → finished → (replayed | discarded)` per frame; see module
/// docs for the threading contract.
pub struct CommandList {
    name: String,
    draw_order: DrawOrder,
    pub(crate) device: Arc<DeviceShared>,
    pub(crate) ctx: Mutex<Box<dyn DriverContext>>,
    /// Finished recording, taken (at most once) by the flush.
    pub(crate) finished: Mutex<Option<DriverCommandBuffer>>,
    recording: Mutex<bool>,
}

impl std::fmt::Debug for CommandList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandList")
            .field("name", &self.name)
            .field("draw_order", &self.draw_order)
            .finish_non_exhaustive()
    }
}

impl CommandList {
    pub(crate) fn new(
        name: String,
        draw_order: DrawOrder,
        device: Arc<DeviceShared>,
        ctx: Box<dyn DriverContext>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name,
            draw_order,
            device,
            ctx: Mutex::new(ctx),
            finished: Mutex::new(None),
            recording: Mutex::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn draw_order(&self) -> DrawOrder {
        self.draw_order
    }

    pub fn is_immediate(&self) -> bool {
        self.draw_order.is_immediate()
    }

    pub fn is_recording(&self) -> bool {
        *self.recording.lock().unwrap()
    }

    /// Whether a finished buffer is waiting to be replayed.
    pub fn is_finished(&self) -> bool {
        self.finished.lock().unwrap().is_some()
    }

    /// Open a recording. For deferred lists this blocks the submission
    /// window: no flush can start until the matching [`CommandList::end`].
    pub fn begin(&self) -> RenderResult<()> {
        if self.is_immediate() {
            // The immediate list issues straight into the hardware queue;
            // there is no recording window to protect.
            return Ok(());
        }
        let mut recording = self.recording.lock().unwrap();
        if *recording {
            return Err(RenderError::OperationNotPermitted(format!(
                "command list '{}' is already recording",
                self.name
            )));
        }
        self.device.gate.block_submission();
        *recording = true;
        trace!(list = %self.name, order = self.draw_order.0, "recording opened");
        Ok(())
    }

    /// Close the recording, finalizing it into a replayable buffer, and
    /// release the submission window.
    pub fn end(&self) -> RenderResult<()> {
        if self.is_immediate() {
            return Ok(());
        }
        let mut recording = self.recording.lock().unwrap();
        if !*recording {
            return Err(RenderError::OperationNotPermitted(format!(
                "command list '{}' is not recording",
                self.name
            )));
        }
        // The gate must be released even when the driver refuses to close
        // the recording, or the next flush would deadlock.
        let result = self.ctx.lock().unwrap().finish();
        *recording = false;
        self.device.gate.unblock_submission();
        match result {
            Ok(buffer) => {
                *self.finished.lock().unwrap() = Some(buffer);
                trace!(list = %self.name, order = self.draw_order.0, "recording finished");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Run `f` against the underlying context, enforcing that deferred
    /// lists only record inside a `begin`/`end` window.
    pub(crate) fn with_ctx<R>(
        &self,
        f: impl FnOnce(&mut dyn DriverContext) -> Result<R, vitric_driver::DriverError>,
    ) -> RenderResult<R> {
        if !self.is_immediate() && !self.is_recording() {
            return Err(RenderError::OperationNotPermitted(format!(
                "command list '{}' is not recording; call begin() first",
                self.name
            )));
        }
        let mut ctx = self.ctx.lock().unwrap();
        f(ctx.as_mut()).map_err(RenderError::from)
    }

    // -- state binding ----------------------------------------------------

    pub fn set_blend(&self, preset: BlendPreset) -> RenderResult<()> {
        let handle = self.device.blend.handle(preset);
        self.with_ctx(|ctx| ctx.set_blend_state(handle))
    }

    pub fn set_rasterizer(&self, preset: RasterizerPreset) -> RenderResult<()> {
        let handle = self.device.rasterizer.handle(preset);
        self.with_ctx(|ctx| ctx.set_rasterizer_state(handle))
    }

    pub fn set_depth_stencil(&self, preset: DepthStencilPreset) -> RenderResult<()> {
        let handle = self.device.depth_stencil.handle(preset);
        self.with_ctx(|ctx| ctx.set_depth_stencil_state(handle))
    }

    pub fn set_sampler(&self, slot: u32, preset: SamplerPreset) -> RenderResult<()> {
        let handle = self.device.samplers.handle(preset);
        self.with_ctx(|ctx| ctx.set_sampler(slot, handle))
    }

    // -- target & shader binding ------------------------------------------

    pub fn set_render_targets(
        &self,
        colors: &[&TargetView],
        depth: Option<&TargetView>,
    ) -> RenderResult<()> {
        if let Some(color) = colors.iter().find(|v| v.is_depth()) {
            return Err(RenderError::InvalidArgument(format!(
                "depth view {:?} bound as a color target",
                color.handle()
            )));
        }
        if let Some(depth) = depth {
            if !depth.is_depth() {
                return Err(RenderError::InvalidArgument(format!(
                    "color view {:?} bound as the depth target",
                    depth.handle()
                )));
            }
        }
        let handles: Vec<_> = colors.iter().map(|v| v.handle()).collect();
        let depth = depth.map(|v| v.handle());
        self.with_ctx(|ctx| ctx.set_render_targets(&handles, depth))
    }

    pub fn set_viewport(&self, viewport: &Viewport) -> RenderResult<()> {
        self.with_ctx(|ctx| ctx.set_viewport(viewport))
    }

    pub fn set_shader(&self, shader: &Shader) -> RenderResult<()> {
        let (stage, handle) = (shader.stage(), shader.handle());
        self.with_ctx(|ctx| ctx.set_shader(stage, handle))
    }

    pub fn set_shader_resource(&self, slot: u32, view: &ShaderView) -> RenderResult<()> {
        let handle = view.handle();
        self.with_ctx(|ctx| ctx.set_shader_resource(slot, handle))
    }

    pub fn set_constant_buffer(
        &self,
        stage: ShaderStage,
        slot: u32,
        buffer: &Buffer,
    ) -> RenderResult<()> {
        if buffer.kind() != BufferKind::Constant {
            return Err(RenderError::InvalidArgument(format!(
                "{:?} buffer bound as a constant buffer",
                buffer.kind()
            )));
        }
        let handle = buffer.handle();
        self.with_ctx(|ctx| ctx.set_constant_buffer(stage, slot, handle))
    }

    pub fn set_vertex_buffer(&self, slot: u32, buffer: &Buffer, offset: u64) -> RenderResult<()> {
        let (handle, stride) = (buffer.handle(), buffer.stride());
        self.with_ctx(|ctx| ctx.set_vertex_buffer(slot, handle, stride, offset))
    }

    pub fn set_index_buffer(&self, buffer: &Buffer, offset: u64) -> RenderResult<()> {
        let format = match buffer.stride() {
            2 => Format::R16Uint,
            4 => Format::R32Uint,
            other => {
                return Err(RenderError::InvalidArgument(format!(
                    "index buffer stride {other} matches no index width"
                )))
            }
        };
        let handle = buffer.handle();
        self.with_ctx(|ctx| ctx.set_index_buffer(handle, format.to_native(), offset))
    }

    // -- clears, draws, dispatch ------------------------------------------

    pub fn clear_target(&self, view: &TargetView, color: [f32; 4]) -> RenderResult<()> {
        let handle = view.handle();
        if view.is_depth() {
            return Err(RenderError::InvalidArgument(
                "clear_target on a depth view; use clear_depth".into(),
            ));
        }
        self.with_ctx(|ctx| ctx.clear_render_target(handle, color))
    }

    pub fn clear_depth(&self, view: &TargetView, depth: f32, stencil: u8) -> RenderResult<()> {
        let handle = view.handle();
        if !view.is_depth() {
            return Err(RenderError::InvalidArgument(
                "clear_depth on a color view; use clear_target".into(),
            ));
        }
        self.with_ctx(|ctx| ctx.clear_depth_stencil(handle, depth, stencil))
    }

    pub fn draw(&self, vertex_count: u32, start_vertex: u32) -> RenderResult<()> {
        self.with_ctx(|ctx| ctx.draw(vertex_count, start_vertex))
    }

    pub fn draw_indexed(
        &self,
        index_count: u32,
        start_index: u32,
        base_vertex: i32,
    ) -> RenderResult<()> {
        self.with_ctx(|ctx| ctx.draw_indexed(index_count, start_index, base_vertex))
    }

    pub fn dispatch(&self, x: u32, y: u32, z: u32) -> RenderResult<()> {
        self.with_ctx(|ctx| ctx.dispatch(x, y, z))
    }

    /// Take the finished buffer for replay, leaving `None` behind so a
    /// recording is replayed at most once.
    pub(crate) fn take_finished(&self) -> Option<DriverCommandBuffer> {
        self.finished.lock().unwrap().take()
    }

    /// Raw subresource write, used by the update dispatch in `update.rs`.
    pub(crate) fn driver_update(
        &self,
        resource: vitric_driver::ResourceHandle,
        subresource: u32,
        region: Option<Region>,
        data: &SubresourceData<'_>,
    ) -> RenderResult<()> {
        self.with_ctx(|ctx| ctx.update_subresource(resource, subresource, region, data))
    }
}
