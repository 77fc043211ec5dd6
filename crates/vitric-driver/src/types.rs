//! Plain-data vocabulary of the native driver boundary: formats, feature
//! tiers, usage classes, flag sets and creation descriptors.
//!
//! Everything here is deliberately dumb data. Policy (which usage class a
//! semantic resource kind gets, which format a view uses, ...) lives above
//! this crate; drivers below it only validate and execute.

use bitflags::bitflags;

/// Native resource/view format enumeration.
///
/// This is the driver's format space, which is wider than the semantic one:
/// depth/stencil resources are stored under a `*Typeless` format and viewed
/// through a depth format (target views) or a color-cast format (shader
/// views). Non-depth formats are their own storage format.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverFormat {
    Unknown = 0,

    Rgba8Typeless,
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Typeless,
    Bgra8Unorm,
    Bgra8UnormSrgb,
    Rgba16Float,
    Rgba32Float,
    Rg11B10Float,
    Rgb10A2Unorm,
    R8Unorm,
    Rg8Unorm,
    R16Float,
    R16Uint,
    R16Unorm,
    R16Typeless,
    R32Float,
    R32Uint,
    R32Typeless,

    // Depth/stencil family. `R24G8Typeless` and friends are the storage
    // formats; the `Depth*` entries are only legal for depth-target views and
    // the `*X8*` entries only for shader-read views.
    R24G8Typeless,
    Depth24UnormStencil8,
    R24UnormX8Typeless,
    R32G8X24Typeless,
    Depth32FloatStencil8,
    R32FloatX8X24Typeless,
    Depth16Unorm,
    Depth32Float,

    // Block-compressed.
    Bc1Unorm,
    Bc1UnormSrgb,
    Bc3Unorm,
    Bc3UnormSrgb,
    Bc7Unorm,
    Bc7UnormSrgb,
}

/// Memory layout of one format: block extent in texels and bytes per block.
/// Uncompressed formats are 1x1 blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatLayout {
    pub block_width: u32,
    pub block_height: u32,
    pub block_bytes: u32,
}

impl DriverFormat {
    pub fn layout(self) -> FormatLayout {
        use DriverFormat::*;
        let (block_width, block_height, block_bytes) = match self {
            Unknown => (1, 1, 0),
            R8Unorm => (1, 1, 1),
            Rg8Unorm | R16Float | R16Uint | R16Unorm | R16Typeless | Depth16Unorm => (1, 1, 2),
            Rgba8Typeless | Rgba8Unorm | Rgba8UnormSrgb | Bgra8Typeless | Bgra8Unorm
            | Bgra8UnormSrgb | Rg11B10Float | Rgb10A2Unorm | R32Float | R32Uint | R32Typeless
            | R24G8Typeless | Depth24UnormStencil8 | R24UnormX8Typeless | Depth32Float => {
                (1, 1, 4)
            }
            Rgba16Float | R32G8X24Typeless | Depth32FloatStencil8 | R32FloatX8X24Typeless => {
                (1, 1, 8)
            }
            Rgba32Float => (1, 1, 16),
            Bc1Unorm | Bc1UnormSrgb => (4, 4, 8),
            Bc3Unorm | Bc3UnormSrgb | Bc7Unorm | Bc7UnormSrgb => (4, 4, 16),
        };
        FormatLayout {
            block_width,
            block_height,
            block_bytes,
        }
    }

    /// Tightly-packed bytes per row of texel blocks at `width` texels.
    pub fn unpadded_bytes_per_row(self, width: u32) -> u32 {
        let layout = self.layout();
        width.div_ceil(layout.block_width) * layout.block_bytes
    }

    /// Number of block rows covering `height` texels.
    pub fn rows_per_slice(self, height: u32) -> u32 {
        height.div_ceil(self.layout().block_height)
    }
}

/// Ranked hardware capability level.
///
/// Ordering is meaningful: a higher tier is a strict superset of a lower one
/// for every capability this crate models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FeatureTier {
    Level9_1,
    Level9_3,
    Level10_0,
    Level10_1,
    Level11_0,
    Level11_1,
}

impl FeatureTier {
    /// The tier at which no resource-path restrictions apply.
    pub const REFERENCE: FeatureTier = FeatureTier::Level11_0;
}

/// Resource memory/access policy. Constrains which update path is legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Usage {
    /// GPU-only, contents fixed at creation.
    Immutable,
    /// GPU read/write; CPU writes go through whole-subresource replacement.
    Default,
    /// GPU read, frequent CPU write through mapping.
    Dynamic,
    /// CPU-mappable transfer memory, both directions.
    Staging,
}

bitflags! {
    /// Pipeline bind points a resource may be attached to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BindFlags: u32 {
        const VERTEX_BUFFER    = 1 << 0;
        const INDEX_BUFFER     = 1 << 1;
        const CONSTANT_BUFFER  = 1 << 2;
        const SHADER_RESOURCE  = 1 << 3;
        const RENDER_TARGET    = 1 << 4;
        const DEPTH_STENCIL    = 1 << 5;
        const UNORDERED_ACCESS = 1 << 6;
    }
}

bitflags! {
    /// Creation-time oddities that change driver-internal layout.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MiscFlags: u32 {
        const TEXTURE_CUBE      = 1 << 0;
        const BUFFER_RAW        = 1 << 1;
        const BUFFER_STRUCTURED = 1 << 2;
        const GENERATE_MIPS     = 1 << 3;
    }
}

bitflags! {
    /// CPU access granted at creation. Must agree with [`Usage`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CpuAccess: u32 {
        const READ  = 1 << 0;
        const WRITE = 1 << 1;
    }
}

/// How a subresource is mapped for CPU access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapMode {
    Read,
    Write,
    /// Discard previous contents; driver may hand back fresh memory.
    WriteDiscard,
    /// Caller promises not to touch bytes the GPU may still be reading.
    WriteNoOverwrite,
}

impl MapMode {
    pub fn is_write(self) -> bool {
        !matches!(self, MapMode::Read)
    }
}

/// Opaque id of a driver-owned buffer or texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceHandle(pub u64);

/// Opaque id of a driver-owned resource view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewHandle(pub u64);

/// Opaque id of a driver-owned render-state object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateHandle(pub u64);

/// Opaque id of a driver-owned shader object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderHandle(pub u64);

/// Opaque id of a native window, supplied by the windowing collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub u64);

/// Which view of a resource to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    ShaderResource,
    RenderTarget,
    DepthStencil,
    UnorderedAccess,
}

/// Shader pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Pixel,
    Compute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDesc {
    pub byte_width: u64,
    /// Element stride for structured buffers, 0 otherwise.
    pub structure_stride: u32,
    pub usage: Usage,
    pub bind: BindFlags,
    pub misc: MiscFlags,
    pub cpu_access: CpuAccess,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    /// Depth for volume textures; 1 otherwise.
    pub depth: u32,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub format: DriverFormat,
    pub usage: Usage,
    pub bind: BindFlags,
    pub misc: MiscFlags,
    pub cpu_access: CpuAccess,
}

/// Initial or update payload for one subresource.
///
/// `row_pitch` is the byte distance between rows of the source data,
/// `slice_pitch` the distance between depth slices (or array layers for
/// initialization payloads). Both may exceed the tightly-packed size.
#[derive(Debug, Clone, Copy)]
pub struct SubresourceData<'a> {
    pub data: &'a [u8],
    pub row_pitch: u32,
    pub slice_pitch: u32,
}

/// A 3D sub-region of a subresource, in texels (or bytes for buffers).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub z: u32,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl Region {
    pub fn from_size(width: u32, height: u32, depth: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            z: 0,
            width,
            height,
            depth,
        }
    }
}

/// CPU view of a mapped subresource, valid only inside the map callback.
#[derive(Debug)]
pub struct MappedSubresource<'a> {
    pub data: &'a mut [u8],
    pub row_pitch: u32,
    pub slice_pitch: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

// ---------------------------------------------------------------------------
// Render-state descriptors.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    InvSrcAlpha,
    SrcColor,
    InvSrcColor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendOp {
    Add,
    Subtract,
    RevSubtract,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendDesc {
    pub enable: bool,
    pub src: BlendFactor,
    pub dst: BlendFactor,
    pub op: BlendOp,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
    pub op_alpha: BlendOp,
}

impl BlendDesc {
    pub const DISABLED: BlendDesc = BlendDesc {
        enable: false,
        src: BlendFactor::One,
        dst: BlendFactor::Zero,
        op: BlendOp::Add,
        src_alpha: BlendFactor::One,
        dst_alpha: BlendFactor::Zero,
        op_alpha: BlendOp::Add,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillMode {
    Solid,
    Wireframe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterizerDesc {
    pub fill: FillMode,
    pub cull: CullMode,
    pub front_ccw: bool,
    pub depth_clip: bool,
    pub scissor: bool,
    pub multisample: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareFunc {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthStencilDesc {
    pub depth_enable: bool,
    pub depth_write: bool,
    pub depth_func: CompareFunc,
    pub stencil_enable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Point,
    Linear,
    Anisotropic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMode {
    Wrap,
    Clamp,
    Mirror,
    Border,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerDesc {
    pub filter: Filter,
    pub address_u: AddressMode,
    pub address_v: AddressMode,
    pub address_w: AddressMode,
    pub max_anisotropy: u32,
}

/// Swap-chain creation parameters. The window itself is owned by the
/// windowing collaborator; the driver only borrows its native handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapChainDesc {
    pub width: u32,
    pub height: u32,
    pub format: DriverFormat,
    pub buffer_count: u32,
    /// Create the back buffer with unordered-access bind in addition to
    /// render-target and shader-read.
    pub allow_unordered: bool,
}

/// Options for creating a driver device through a [`crate::DriverFactory`].
#[derive(Debug, Clone, Default)]
pub struct DriverCreateOptions {
    /// Request the driver's validation/debug layer.
    pub debug: bool,
    /// Request deferred-context support.
    pub multithreaded: bool,
    /// Prefer the software/reference rasterizer over hardware.
    pub software: bool,
    pub debug_name: String,
}
