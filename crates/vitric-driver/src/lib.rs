//! `vitric-driver` pins down the boundary between the vitric submission core
//! and the native GPU driver underneath it.
//!
//! The core never talks to driver objects directly; it goes through the
//! [`DriverDevice`] / [`DriverContext`] / [`DriverSwapChain`] traits and the
//! plain-data descriptors in [`types`]. A hardware backend implements these
//! traits over the vendor API; this crate ships the one backend that is
//! always available, the [`software`] emulation driver, which doubles as the
//! instrumented device the test suite runs against.
//!
//! Contract highlights drivers must honor:
//! - exactly one immediate context per device (the real hardware queue);
//!   deferred contexts record into private [`DriverCommandBuffer`]s.
//! - `update_subresource` is illegal on DYNAMIC/STAGING resources, `map` is
//!   illegal on DEFAULT/IMMUTABLE ones; violations are [`DriverError::InvalidCall`].
//! - device removal/reset surfaces as [`DriverError::DeviceLost`] from every
//!   entry point and is permanent for that device.

mod device;
mod types;

pub mod software;

pub use device::{
    DriverCommandBuffer, DriverContext, DriverDevice, DriverError, DriverFactory, DriverResult,
    DriverSwapChain,
};
pub use types::{
    AddressMode, BindFlags, BlendDesc, BlendFactor, BlendOp, BufferDesc, CompareFunc, CpuAccess,
    DepthStencilDesc, DriverCreateOptions, DriverFormat, FeatureTier, FillMode, Filter,
    FormatLayout, CullMode, MapMode, MappedSubresource, MiscFlags, RasterizerDesc, Region,
    ResourceHandle, SamplerDesc, ShaderHandle, ShaderStage, StateHandle, SubresourceData,
    SwapChainDesc, TextureDesc, Usage, ViewHandle, ViewKind, Viewport, WindowHandle,
};
