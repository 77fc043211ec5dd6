//! `vitric-gpu` is the command submission and resource residency core of the
//! vitric rendering backend.
//!
//! It turns a small set of semantic graphics concepts — textures, buffers,
//! shaders, render targets, draw/dispatch — into calls against a stateful,
//! single-queue native driver (the [`vitric_driver`] boundary), while hiding
//! the driver's quirks:
//!
//! - **Threading**: only one thread may issue calls into a native context at
//!   a time. Deferred [`CommandList`]s record privately on any thread; the
//!   [`Device`]'s frame flush replays them onto the one real queue in
//!   caller-assigned [`DrawOrder`], behind a shared/exclusive submission
//!   gate that never observes a half-recorded list.
//! - **Resource paths**: creation picks a usage class from the semantic
//!   resource kind and the hardware tier; updates dispatch between the
//!   replace-subresource and map/copy paths, because the wrong path is a
//!   driver error, not a slow path.
//! - **Formats**: depth and typeless formats resolve to a (storage, target,
//!   shader-read) native format triple; everything else collapses to one id.
//!
//! Window creation, shader compilation and image decoding live outside this
//! crate; their contracts enter through [`vitric_driver::WindowHandle`],
//! shader blobs with a byte-length header, and pitched pixel payloads.

mod command_list;
mod device;
mod error;
mod format;
mod resource;
mod shader;
mod state;
mod stats;
mod surface;
mod update;
mod upload;

pub use command_list::{CommandList, CommandListDesc, DrawOrder};
pub use device::{DebugLevel, Device, DeviceCaps, DeviceConfig};
pub use error::{RenderError, RenderResult};
pub use format::{Format, FormatTriple};
pub use resource::{
    Buffer, BufferKind, ResourceFlags, ResourceInfo, ShaderView, TargetView, Texture,
    UnorderedView,
};
pub use shader::{frame_blob, Shader};
pub use state::{
    BlendPreset, DepthStencilPreset, RasterizerPreset, SamplerPreset, StatePreset, StateRegistry,
};
pub use stats::{DeviceStats, DeviceStatsSnapshot};
pub use surface::{RenderSurface, SurfaceDesc, SurfaceState};
pub use upload::{ScratchArena, ScratchSlice};

pub use vitric_driver::{
    Region, ShaderStage, SubresourceData, Usage, Viewport, WindowHandle,
};
