//! Resource factory: buffers, textures and their views.
//!
//! Creation descriptors are validated up front and lowered onto a driver
//! usage class, bind flags and misc flags. Picking the wrong class is not a
//! performance detail — the driver's update paths are only legal for
//! specific classes — so the decision table lives here, in one place, and
//! the update dispatch in `update.rs` keys off the class recorded on the
//! resource.

use std::sync::Arc;

use bitflags::bitflags;

use vitric_driver::{
    BindFlags, BufferDesc, CpuAccess, FeatureTier, MiscFlags, ResourceHandle, SubresourceData,
    TextureDesc, Usage, ViewHandle, ViewKind,
};

use crate::device::{Device, DeviceShared};
use crate::error::{RenderError, RenderResult};
use crate::format::Format;

bitflags! {
    /// Semantic type flags of a texture resource.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ResourceFlags: u32 {
        const MIPPED           = 1 << 0;
        const ARRAY            = 1 << 1;
        const CUBE             = 1 << 2;
        const RENDER_TARGET    = 1 << 3;
        const DEPTH_TARGET     = 1 << 4;
        const UNORDERED_ACCESS = 1 << 5;
        const READBACK         = 1 << 6;
    }
}

/// Semantic texture descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceInfo {
    pub width: u32,
    pub height: u32,
    /// Depth for volume textures; 0 or 1 otherwise.
    pub depth: u32,
    /// Number of array layers; 0 or 1 for non-array resources. Cube
    /// textures count each face as a layer.
    pub array_size: u32,
    /// Explicit mip count when [`ResourceFlags::MIPPED`]; 0 requests the
    /// full chain.
    pub mip_levels: u32,
    pub format: Format,
    pub flags: ResourceFlags,
}

impl ResourceInfo {
    pub fn plain_2d(width: u32, height: u32, format: Format) -> Self {
        Self {
            width,
            height,
            depth: 1,
            array_size: 1,
            mip_levels: 1,
            format,
            flags: ResourceFlags::empty(),
        }
    }

    fn validate(&self, tier: FeatureTier) -> RenderResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::InvalidArgument(format!(
                "texture extent {}x{} has a zero axis",
                self.width, self.height
            )));
        }
        let targets = ResourceFlags::RENDER_TARGET
            | ResourceFlags::DEPTH_TARGET
            | ResourceFlags::UNORDERED_ACCESS;
        if self.flags.contains(ResourceFlags::READBACK) && self.flags.intersects(targets) {
            return Err(RenderError::InvalidArgument(
                "readback excludes render-target/depth-target/unordered-access".into(),
            ));
        }
        if self.flags.contains(ResourceFlags::UNORDERED_ACCESS) && tier < FeatureTier::Level11_0 {
            return Err(RenderError::NotSupported(format!(
                "unordered access requires {:?}, device is {tier:?}",
                FeatureTier::Level11_0
            )));
        }
        if self.flags.contains(ResourceFlags::CUBE) {
            if self.array_size == 0 || self.array_size % 6 != 0 {
                return Err(RenderError::InvalidArgument(format!(
                    "cube texture array_size {} is not a positive multiple of 6",
                    self.array_size
                )));
            }
        }
        if self.flags.contains(ResourceFlags::DEPTH_TARGET) && !self.format.is_depth() {
            return Err(RenderError::InvalidArgument(format!(
                "depth target requires a depth format, got {:?}",
                self.format
            )));
        }
        if !self.flags.contains(ResourceFlags::DEPTH_TARGET) && self.format.is_depth() {
            return Err(RenderError::InvalidArgument(format!(
                "depth format {:?} requires the depth-target flag",
                self.format
            )));
        }
        Ok(())
    }

    fn resolved_mip_levels(&self) -> u32 {
        if !self.flags.contains(ResourceFlags::MIPPED) {
            return 1;
        }
        if self.mip_levels > 0 {
            return self.mip_levels;
        }
        let largest = self.width.max(self.height).max(self.depth.max(1));
        32 - largest.leading_zeros()
    }

    fn resolved_array_layers(&self) -> u32 {
        self.array_size.max(1)
    }
}

/// Semantic buffer kind. Drives the usage/bind/misc decision table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    Vertex,
    Index,
    Constant,
    Structured,
    /// Raw byte-address buffer with unordered access.
    Raw,
    /// CPU-writable transfer memory.
    Staging,
    /// GPU-to-CPU transfer memory.
    Readback,
}

/// A device buffer. Owns its driver handle; released on drop.
pub struct Buffer {
    pub(crate) handle: ResourceHandle,
    pub(crate) kind: BufferKind,
    pub(crate) usage: Usage,
    pub(crate) cpu_access: CpuAccess,
    pub(crate) stride: u32,
    pub(crate) byte_width: u64,
    pub(crate) device: Arc<DeviceShared>,
}

impl Buffer {
    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    pub fn usage(&self) -> Usage {
        self.usage
    }

    pub fn cpu_access(&self) -> CpuAccess {
        self.cpu_access
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn byte_width(&self) -> u64 {
        self.byte_width
    }

    pub fn handle(&self) -> ResourceHandle {
        self.handle
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.device.driver.destroy_resource(self.handle);
    }
}

/// A device texture. Owns its driver handle; released on drop.
pub struct Texture {
    pub(crate) handle: ResourceHandle,
    pub(crate) info: ResourceInfo,
    pub(crate) usage: Usage,
    pub(crate) cpu_access: CpuAccess,
    pub(crate) mip_levels: u32,
    pub(crate) array_layers: u32,
    pub(crate) device: Arc<DeviceShared>,
}

impl Texture {
    pub fn info(&self) -> &ResourceInfo {
        &self.info
    }

    pub fn usage(&self) -> Usage {
        self.usage
    }

    pub fn cpu_access(&self) -> CpuAccess {
        self.cpu_access
    }

    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    pub fn array_layers(&self) -> u32 {
        self.array_layers
    }

    pub fn subresource_count(&self) -> u32 {
        self.mip_levels * self.array_layers
    }

    pub fn handle(&self) -> ResourceHandle {
        self.handle
    }

    /// Extent of `mip`, clamped to 1 per axis.
    pub fn mip_extent(&self, mip: u32) -> (u32, u32, u32) {
        (
            (self.info.width >> mip).max(1),
            (self.info.height >> mip).max(1),
            (self.info.depth.max(1) >> mip).max(1),
        )
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        self.device.driver.destroy_resource(self.handle);
    }
}

/// Shader-read view. Holds a non-owning back-reference to its resource.
pub struct ShaderView {
    pub(crate) handle: ViewHandle,
    pub(crate) device: Arc<DeviceShared>,
}

impl ShaderView {
    pub fn handle(&self) -> ViewHandle {
        self.handle
    }
}

impl Drop for ShaderView {
    fn drop(&mut self) {
        self.device.driver.destroy_view(self.handle);
    }
}

/// Render-target or depth-target view.
pub struct TargetView {
    pub(crate) handle: ViewHandle,
    pub(crate) is_depth: bool,
    pub(crate) device: Arc<DeviceShared>,
}

impl TargetView {
    pub fn handle(&self) -> ViewHandle {
        self.handle
    }

    pub fn is_depth(&self) -> bool {
        self.is_depth
    }
}

impl Drop for TargetView {
    fn drop(&mut self) {
        self.device.driver.destroy_view(self.handle);
    }
}

/// Unordered-access view.
pub struct UnorderedView {
    pub(crate) handle: ViewHandle,
    pub(crate) device: Arc<DeviceShared>,
}

impl UnorderedView {
    pub fn handle(&self) -> ViewHandle {
        self.handle
    }
}

impl Drop for UnorderedView {
    fn drop(&mut self) {
        self.device.driver.destroy_view(self.handle);
    }
}

/// (usage, bind, misc, cpu_access) decision for a buffer kind.
///
/// Two rules matter here beyond the obvious bind flags: kinds that do not
/// force a usage degrade from DEFAULT to DYNAMIC below the reference tier
/// (a driver restriction, not a preference), and vertex/index buffers are
/// exempt from that degradation.
fn buffer_layout(
    kind: BufferKind,
    tier: FeatureTier,
    has_init: bool,
) -> (Usage, BindFlags, MiscFlags, CpuAccess) {
    match kind {
        BufferKind::Vertex => (
            if has_init { Usage::Immutable } else { Usage::Default },
            BindFlags::VERTEX_BUFFER,
            MiscFlags::empty(),
            CpuAccess::empty(),
        ),
        BufferKind::Index => (
            if has_init { Usage::Immutable } else { Usage::Default },
            BindFlags::INDEX_BUFFER,
            MiscFlags::empty(),
            CpuAccess::empty(),
        ),
        BufferKind::Constant => (
            Usage::Dynamic,
            BindFlags::CONSTANT_BUFFER,
            MiscFlags::empty(),
            CpuAccess::WRITE,
        ),
        BufferKind::Structured => {
            let usage = if has_init {
                Usage::Immutable
            } else if tier < FeatureTier::REFERENCE {
                Usage::Dynamic
            } else {
                Usage::Default
            };
            let cpu = if usage == Usage::Dynamic {
                CpuAccess::WRITE
            } else {
                CpuAccess::empty()
            };
            (
                usage,
                BindFlags::SHADER_RESOURCE,
                MiscFlags::BUFFER_STRUCTURED,
                cpu,
            )
        }
        BufferKind::Raw => (
            Usage::Default,
            BindFlags::SHADER_RESOURCE | BindFlags::UNORDERED_ACCESS,
            MiscFlags::BUFFER_RAW,
            CpuAccess::empty(),
        ),
        BufferKind::Staging => (
            Usage::Staging,
            BindFlags::empty(),
            MiscFlags::empty(),
            CpuAccess::WRITE,
        ),
        BufferKind::Readback => (
            Usage::Staging,
            BindFlags::empty(),
            MiscFlags::empty(),
            CpuAccess::READ,
        ),
    }
}

impl Device {
    /// Create a buffer of `count` elements of `stride` bytes.
    pub fn make_buffer(
        &self,
        kind: BufferKind,
        stride: u32,
        count: u32,
        init: Option<&[u8]>,
    ) -> RenderResult<Buffer> {
        let shared = self.shared();
        let tier = shared.caps.feature_tier;

        if stride == 0 || count == 0 {
            return Err(RenderError::InvalidArgument(format!(
                "buffer stride {stride} / count {count} must both be nonzero"
            )));
        }
        let byte_width = stride as u64 * count as u64;

        match kind {
            BufferKind::Constant => {
                if byte_width % 16 != 0 || byte_width > 64 * 1024 {
                    return Err(RenderError::InvalidArgument(format!(
                        "constant buffer size {byte_width} must be 16-byte aligned and at most 64 KiB"
                    )));
                }
            }
            BufferKind::Index => {
                if stride != 2 && stride != 4 {
                    return Err(RenderError::InvalidArgument(format!(
                        "index buffer stride {stride} must be 2 or 4 bytes"
                    )));
                }
            }
            BufferKind::Raw => {
                if stride != 4 {
                    return Err(RenderError::InvalidArgument(format!(
                        "raw buffer stride must be 4 bytes, got {stride}"
                    )));
                }
                if count < 3 {
                    return Err(RenderError::InvalidArgument(format!(
                        "raw buffer needs at least 3 elements, got {count}"
                    )));
                }
                if tier < FeatureTier::Level11_0 {
                    return Err(RenderError::NotSupported(format!(
                        "raw unordered buffers require {:?}, device is {tier:?}",
                        FeatureTier::Level11_0
                    )));
                }
            }
            BufferKind::Structured => {
                if stride % 4 != 0 {
                    return Err(RenderError::InvalidArgument(format!(
                        "structured buffer stride {stride} must be a multiple of 4"
                    )));
                }
            }
            BufferKind::Vertex | BufferKind::Staging | BufferKind::Readback => {}
        }

        if let Some(init) = init {
            if init.len() as u64 != byte_width {
                return Err(RenderError::InvalidArgument(format!(
                    "init data is {} bytes, buffer is {byte_width}",
                    init.len()
                )));
            }
        }

        let (usage, bind, misc, cpu_access) = buffer_layout(kind, tier, init.is_some());
        let desc = BufferDesc {
            byte_width,
            structure_stride: if kind == BufferKind::Structured { stride } else { 0 },
            usage,
            bind,
            misc,
            cpu_access,
        };
        let init_data = init.map(|data| SubresourceData {
            data,
            row_pitch: byte_width as u32,
            slice_pitch: byte_width as u32,
        });
        let handle = shared.driver.create_buffer(&desc, init_data.as_ref())?;
        Ok(Buffer {
            handle,
            kind,
            usage,
            cpu_access,
            stride,
            byte_width,
            device: Arc::clone(shared),
        })
    }

    /// Create a texture described by `info`, optionally initialized with one
    /// payload per subresource (mip-major within each layer).
    pub fn make_texture(
        &self,
        info: &ResourceInfo,
        init: &[SubresourceData<'_>],
    ) -> RenderResult<Texture> {
        let shared = self.shared();
        let tier = shared.caps.feature_tier;
        info.validate(tier)?;

        let mip_levels = info.resolved_mip_levels();
        let array_layers = info.resolved_array_layers();
        let sub_count = (mip_levels * array_layers) as usize;
        if !init.is_empty() && init.len() != sub_count {
            return Err(RenderError::InvalidArgument(format!(
                "texture init covers {} of {sub_count} subresources",
                init.len()
            )));
        }

        let is_target = info.flags.intersects(
            ResourceFlags::RENDER_TARGET
                | ResourceFlags::DEPTH_TARGET
                | ResourceFlags::UNORDERED_ACCESS,
        );
        let usage = if info.flags.contains(ResourceFlags::READBACK) {
            Usage::Staging
        } else if is_target {
            Usage::Default
        } else if !init.is_empty() {
            Usage::Immutable
        } else if tier < FeatureTier::REFERENCE {
            // Tier-dependent restriction: plain CPU-fed textures must be
            // DYNAMIC below the reference tier.
            Usage::Dynamic
        } else {
            Usage::Default
        };
        let cpu_access = match usage {
            Usage::Staging => CpuAccess::READ,
            Usage::Dynamic => CpuAccess::WRITE,
            _ => CpuAccess::empty(),
        };

        let mut bind = BindFlags::empty();
        if usage != Usage::Staging {
            bind |= BindFlags::SHADER_RESOURCE;
        }
        if info.flags.contains(ResourceFlags::RENDER_TARGET) {
            bind |= BindFlags::RENDER_TARGET;
        }
        if info.flags.contains(ResourceFlags::DEPTH_TARGET) {
            bind |= BindFlags::DEPTH_STENCIL;
        }
        if info.flags.contains(ResourceFlags::UNORDERED_ACCESS) {
            bind |= BindFlags::UNORDERED_ACCESS;
        }

        let mut misc = MiscFlags::empty();
        if info.flags.contains(ResourceFlags::CUBE) {
            misc |= MiscFlags::TEXTURE_CUBE;
        }

        // Depth textures are stored typeless so both the depth view and the
        // shader-read view can be created against the same storage.
        let storage_format = info.format.triple().storage;

        let desc = TextureDesc {
            width: info.width,
            height: info.height,
            depth: info.depth.max(1),
            mip_levels,
            array_layers,
            format: storage_format,
            usage,
            bind,
            misc,
            cpu_access,
        };
        let handle = shared.driver.create_texture(&desc, init)?;
        Ok(Texture {
            handle,
            info: *info,
            usage,
            cpu_access,
            mip_levels,
            array_layers,
            device: Arc::clone(shared),
        })
    }

    /// Create a shader-read view of `texture`, resolving the shader-read
    /// member of the format triple.
    pub fn make_shader_view(&self, texture: &Texture) -> RenderResult<ShaderView> {
        let shared = self.shared();
        if texture.usage == Usage::Staging {
            return Err(RenderError::InvalidArgument(
                "readback textures cannot be shader-read".into(),
            ));
        }
        let triple = texture.info.format.triple();
        let handle =
            shared
                .driver
                .create_view(texture.handle, ViewKind::ShaderResource, triple.shader)?;
        Ok(ShaderView {
            handle,
            device: Arc::clone(shared),
        })
    }

    /// Create the render- or depth-target view of `texture`, resolving the
    /// target member of the format triple.
    pub fn make_target_view(&self, texture: &Texture) -> RenderResult<TargetView> {
        let shared = self.shared();
        let is_depth = texture.info.format.is_depth();
        let wanted = if is_depth {
            ResourceFlags::DEPTH_TARGET
        } else {
            ResourceFlags::RENDER_TARGET
        };
        if !texture.info.flags.contains(wanted) {
            return Err(RenderError::InvalidArgument(format!(
                "texture was not created with {wanted:?}"
            )));
        }
        let triple = texture.info.format.triple();
        let kind = if is_depth {
            ViewKind::DepthStencil
        } else {
            ViewKind::RenderTarget
        };
        let handle = shared.driver.create_view(texture.handle, kind, triple.target)?;
        Ok(TargetView {
            handle,
            is_depth,
            device: Arc::clone(shared),
        })
    }

    pub fn make_unordered_view(&self, texture: &Texture) -> RenderResult<UnorderedView> {
        let shared = self.shared();
        if !texture.info.flags.contains(ResourceFlags::UNORDERED_ACCESS) {
            return Err(RenderError::InvalidArgument(
                "texture was not created with unordered access".into(),
            ));
        }
        let handle = shared.driver.create_view(
            texture.handle,
            ViewKind::UnorderedAccess,
            texture.info.format.triple().storage,
        )?;
        Ok(UnorderedView {
            handle,
            device: Arc::clone(shared),
        })
    }
}
