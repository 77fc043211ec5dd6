//! Software-emulation driver.
//!
//! A complete, rule-enforcing implementation of the driver boundary that
//! keeps every resource in CPU memory. It exists for two reasons: it is the
//! device the core hands out when `use_software_emulation` is requested, and
//! it is the instrumented double the test suite runs against — every driver
//! entry point bumps a counter, illegal calls fail the same way the real
//! driver's debug layer would, and device loss can be injected on demand.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::device::{
    DriverCommandBuffer, DriverContext, DriverDevice, DriverError, DriverFactory, DriverResult,
    DriverSwapChain,
};
use crate::types::{
    BindFlags, BlendDesc, BufferDesc, CpuAccess, DepthStencilDesc, DriverCreateOptions,
    DriverFormat, FeatureTier, MapMode, MappedSubresource, MiscFlags, RasterizerDesc, Region,
    ResourceHandle, SamplerDesc, ShaderHandle, ShaderStage, StateHandle, SubresourceData,
    SwapChainDesc, TextureDesc, ViewHandle, ViewKind, Viewport, Usage, WindowHandle,
};

/// Construction-time knobs for the software device, used by tests to shape
/// the "hardware" under the core.
#[derive(Debug, Clone)]
pub struct SoftwareOptions {
    pub feature_tier: FeatureTier,
    pub supports_deferred_contexts: bool,
    /// When false, requesting a debug device fails with
    /// [`DriverError::DebugLayerUnavailable`], exercising the core's
    /// degrade-and-retry path.
    pub debug_layer_available: bool,
    /// Resolution reported for the output a swap chain occupies.
    pub output_resolution: (u32, u32),
}

impl Default for SoftwareOptions {
    fn default() -> Self {
        Self {
            feature_tier: FeatureTier::Level11_0,
            supports_deferred_contexts: true,
            debug_layer_available: true,
            output_resolution: (1920, 1080),
        }
    }
}

/// Per-call counters. All relaxed; read with [`SoftwareCounters::snapshot`].
#[derive(Debug, Default)]
pub struct SoftwareCounters {
    pub buffer_creates: AtomicU64,
    pub texture_creates: AtomicU64,
    pub view_creates: AtomicU64,
    pub shader_creates: AtomicU64,
    pub state_creates: AtomicU64,
    pub update_subresource_calls: AtomicU64,
    pub map_calls: AtomicU64,
    pub copies: AtomicU64,
    pub finished_command_buffers: AtomicU64,
    pub executed_command_buffers: AtomicU64,
    pub draws: AtomicU64,
    pub dispatches: AtomicU64,
    pub presents: AtomicU64,
    pub swap_chain_resizes: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub buffer_creates: u64,
    pub texture_creates: u64,
    pub view_creates: u64,
    pub shader_creates: u64,
    pub state_creates: u64,
    pub update_subresource_calls: u64,
    pub map_calls: u64,
    pub copies: u64,
    pub finished_command_buffers: u64,
    pub executed_command_buffers: u64,
    pub draws: u64,
    pub dispatches: u64,
    pub presents: u64,
    pub swap_chain_resizes: u64,
}

impl SoftwareCounters {
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            buffer_creates: self.buffer_creates.load(Ordering::Relaxed),
            texture_creates: self.texture_creates.load(Ordering::Relaxed),
            view_creates: self.view_creates.load(Ordering::Relaxed),
            shader_creates: self.shader_creates.load(Ordering::Relaxed),
            state_creates: self.state_creates.load(Ordering::Relaxed),
            update_subresource_calls: self.update_subresource_calls.load(Ordering::Relaxed),
            map_calls: self.map_calls.load(Ordering::Relaxed),
            copies: self.copies.load(Ordering::Relaxed),
            finished_command_buffers: self.finished_command_buffers.load(Ordering::Relaxed),
            executed_command_buffers: self.executed_command_buffers.load(Ordering::Relaxed),
            draws: self.draws.load(Ordering::Relaxed),
            dispatches: self.dispatches.load(Ordering::Relaxed),
            presents: self.presents.load(Ordering::Relaxed),
            swap_chain_resizes: self.swap_chain_resizes.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// One stored subresource: its own backing bytes plus the pitches the driver
/// chose for it (tightly packed here).
#[derive(Debug, Clone)]
struct SubStorage {
    data: Vec<u8>,
    row_pitch: u32,
    slice_pitch: u32,
    /// Block rows per slice and slices, for bounds checks on pitched copies.
    rows: u32,
    slices: u32,
}

#[derive(Debug)]
enum ResourceKind {
    Buffer { desc: BufferDesc },
    Texture { desc: TextureDesc },
}

#[derive(Debug)]
struct SoftwareResource {
    kind: ResourceKind,
    subresources: Vec<SubStorage>,
}

impl SoftwareResource {
    fn usage(&self) -> Usage {
        match &self.kind {
            ResourceKind::Buffer { desc } => desc.usage,
            ResourceKind::Texture { desc } => desc.usage,
        }
    }

    fn cpu_access(&self) -> CpuAccess {
        match &self.kind {
            ResourceKind::Buffer { desc } => desc.cpu_access,
            ResourceKind::Texture { desc } => desc.cpu_access,
        }
    }

    fn bind(&self) -> BindFlags {
        match &self.kind {
            ResourceKind::Buffer { desc } => desc.bind,
            ResourceKind::Texture { desc } => desc.bind,
        }
    }
}

#[derive(Debug)]
struct SoftwareView {
    resource: ResourceHandle,
    kind: ViewKind,
    #[allow(dead_code)]
    format: DriverFormat,
}

#[derive(Debug)]
struct DeviceState {
    resources: HashMap<u64, SoftwareResource>,
    views: HashMap<u64, SoftwareView>,
    shaders: HashMap<u64, ShaderStage>,
    states: HashMap<u64, &'static str>,
    next_id: u64,
}

impl DeviceState {
    fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

struct Inner {
    options: SoftwareOptions,
    debug_layer: bool,
    state: Mutex<DeviceState>,
    counters: SoftwareCounters,
    lost: AtomicBool,
}

impl Inner {
    fn check_alive(&self) -> DriverResult<()> {
        if self.lost.load(Ordering::SeqCst) {
            Err(DriverError::DeviceLost)
        } else {
            Ok(())
        }
    }
}

/// The software device. Normally used behind `Arc<dyn DriverDevice>`; tests
/// keep a concrete `Arc<SoftwareDevice>` clone around for
/// [`SoftwareDevice::counters`] and [`SoftwareDevice::inject_device_loss`].
pub struct SoftwareDevice {
    inner: Arc<Inner>,
    immediate_taken: AtomicBool,
}

impl SoftwareDevice {
    pub fn new(options: SoftwareOptions, debug_layer: bool) -> Arc<Self> {
        Arc::new(Self {
            inner: Arc::new(Inner {
                options,
                debug_layer,
                state: Mutex::new(DeviceState {
                    resources: HashMap::new(),
                    views: HashMap::new(),
                    shaders: HashMap::new(),
                    states: HashMap::new(),
                    next_id: 1,
                }),
                counters: SoftwareCounters::default(),
                lost: AtomicBool::new(false),
            }),
            immediate_taken: AtomicBool::new(false),
        })
    }

    pub fn counters(&self) -> &SoftwareCounters {
        &self.inner.counters
    }

    /// Make every subsequent driver call fail with
    /// [`DriverError::DeviceLost`], as a removed/reset adapter would.
    pub fn inject_device_loss(&self) {
        self.inner.lost.store(true, Ordering::SeqCst);
    }

    /// Number of live resources, for leak checks in tests.
    pub fn live_resources(&self) -> usize {
        self.inner.state.lock().unwrap().resources.len()
    }

    /// Number of live views of `resource`.
    pub fn live_views_of(&self, resource: ResourceHandle) -> usize {
        let state = self.inner.state.lock().unwrap();
        state
            .views
            .values()
            .filter(|v| v.resource == resource)
            .count()
    }

    /// Debug hook: the stored bytes of one subresource. `None` for unknown
    /// handles or out-of-range subresources.
    pub fn read_resource(&self, resource: ResourceHandle, subresource: u32) -> Option<Vec<u8>> {
        let state = self.inner.state.lock().unwrap();
        state
            .resources
            .get(&resource.0)?
            .subresources
            .get(subresource as usize)
            .map(|sub| sub.data.clone())
    }
}

/// Subresource allocation for a texture: one entry per (layer, mip), mip-major
/// within each layer, matching the native subresource index
/// `mip + layer * mip_levels`.
fn texture_substorages(desc: &TextureDesc) -> Vec<SubStorage> {
    let mut subs = Vec::with_capacity((desc.mip_levels * desc.array_layers) as usize);
    for _layer in 0..desc.array_layers {
        for mip in 0..desc.mip_levels {
            let w = (desc.width >> mip).max(1);
            let h = (desc.height >> mip).max(1);
            let d = (desc.depth >> mip).max(1);
            let row_pitch = desc.format.unpadded_bytes_per_row(w);
            let rows = desc.format.rows_per_slice(h);
            let slice_pitch = row_pitch * rows;
            subs.push(SubStorage {
                data: vec![0; (slice_pitch as usize) * (d as usize)],
                row_pitch,
                slice_pitch,
                rows,
                slices: d,
            });
        }
    }
    subs
}

/// Copy pitched `src` rows into pitched destination storage, honoring
/// differing pitches on both sides.
fn copy_pitched(
    dst: &mut SubStorage,
    dst_offset_bytes: usize,
    rows: u32,
    slices: u32,
    row_bytes: usize,
    src: &SubresourceData<'_>,
) -> DriverResult<()> {
    for slice in 0..slices {
        for row in 0..rows {
            let src_off = (slice as usize) * (src.slice_pitch as usize)
                + (row as usize) * (src.row_pitch as usize);
            let dst_off = dst_offset_bytes
                + (slice as usize) * (dst.slice_pitch as usize)
                + (row as usize) * (dst.row_pitch as usize);
            let src_row = src
                .data
                .get(src_off..src_off + row_bytes)
                .ok_or_else(|| DriverError::InvalidCall("source data too small".into()))?;
            let dst_row = dst
                .data
                .get_mut(dst_off..dst_off + row_bytes)
                .ok_or_else(|| DriverError::InvalidCall("write exceeds subresource".into()))?;
            dst_row.copy_from_slice(src_row);
        }
    }
    Ok(())
}

/// View formats legal on a typeless storage format, by view kind.
fn view_format_legal(storage: DriverFormat, kind: ViewKind, view: DriverFormat) -> bool {
    use DriverFormat::*;
    if storage == view {
        // Fully-typed storage: only depth formats restrict the view kind.
        return true;
    }
    match (storage, kind, view) {
        (Rgba8Typeless, _, Rgba8Unorm | Rgba8UnormSrgb) => true,
        (Bgra8Typeless, _, Bgra8Unorm | Bgra8UnormSrgb) => true,
        (R16Typeless, ViewKind::DepthStencil, Depth16Unorm) => true,
        (R16Typeless, ViewKind::ShaderResource, R16Unorm) => true,
        (R32Typeless, ViewKind::DepthStencil, Depth32Float) => true,
        (R32Typeless, ViewKind::ShaderResource, R32Float) => true,
        (R24G8Typeless, ViewKind::DepthStencil, Depth24UnormStencil8) => true,
        (R24G8Typeless, ViewKind::ShaderResource, R24UnormX8Typeless) => true,
        (R32G8X24Typeless, ViewKind::DepthStencil, Depth32FloatStencil8) => true,
        (R32G8X24Typeless, ViewKind::ShaderResource, R32FloatX8X24Typeless) => true,
        _ => false,
    }
}

fn required_bind_for_view(kind: ViewKind) -> BindFlags {
    match kind {
        ViewKind::ShaderResource => BindFlags::SHADER_RESOURCE,
        ViewKind::RenderTarget => BindFlags::RENDER_TARGET,
        ViewKind::DepthStencil => BindFlags::DEPTH_STENCIL,
        ViewKind::UnorderedAccess => BindFlags::UNORDERED_ACCESS,
    }
}

impl DriverDevice for SoftwareDevice {
    fn feature_tier(&self) -> FeatureTier {
        self.inner.options.feature_tier
    }

    fn supports_deferred_contexts(&self) -> bool {
        self.inner.options.supports_deferred_contexts
    }

    fn is_software(&self) -> bool {
        true
    }

    fn debug_layer_enabled(&self) -> bool {
        self.inner.debug_layer
    }

    fn create_buffer(
        &self,
        desc: &BufferDesc,
        init: Option<&SubresourceData<'_>>,
    ) -> DriverResult<ResourceHandle> {
        self.inner.check_alive()?;
        if desc.byte_width == 0 {
            return Err(DriverError::InvalidCall("buffer byte_width is zero".into()));
        }
        if desc.usage == Usage::Immutable && init.is_none() {
            return Err(DriverError::InvalidCall(
                "immutable buffer created without initial data".into(),
            ));
        }

        let mut storage = SubStorage {
            data: vec![0; desc.byte_width as usize],
            row_pitch: desc.byte_width as u32,
            slice_pitch: desc.byte_width as u32,
            rows: 1,
            slices: 1,
        };
        if let Some(init) = init {
            let len = storage.data.len().min(init.data.len());
            storage.data[..len].copy_from_slice(&init.data[..len]);
        }

        let mut state = self.inner.state.lock().unwrap();
        let id = state.alloc_id();
        state.resources.insert(
            id,
            SoftwareResource {
                kind: ResourceKind::Buffer { desc: *desc },
                subresources: vec![storage],
            },
        );
        SoftwareCounters::bump(&self.inner.counters.buffer_creates);
        Ok(ResourceHandle(id))
    }

    fn create_texture(
        &self,
        desc: &TextureDesc,
        init: &[SubresourceData<'_>],
    ) -> DriverResult<ResourceHandle> {
        self.inner.check_alive()?;
        if desc.width == 0 || desc.height == 0 || desc.depth == 0 {
            return Err(DriverError::InvalidCall("texture has a zero extent".into()));
        }
        if desc.mip_levels == 0 || desc.array_layers == 0 {
            return Err(DriverError::InvalidCall(
                "texture mip_levels/array_layers must be >= 1".into(),
            ));
        }
        if desc.misc.contains(MiscFlags::TEXTURE_CUBE) && desc.array_layers % 6 != 0 {
            return Err(DriverError::InvalidCall(format!(
                "cube texture array_layers {} is not a multiple of 6",
                desc.array_layers
            )));
        }
        if desc.bind.contains(BindFlags::UNORDERED_ACCESS)
            && self.inner.options.feature_tier < FeatureTier::Level11_0
        {
            return Err(DriverError::Unsupported(format!(
                "unordered access requires {:?}, device is {:?}",
                FeatureTier::Level11_0,
                self.inner.options.feature_tier
            )));
        }
        let sub_count = (desc.mip_levels * desc.array_layers) as usize;
        if desc.usage == Usage::Immutable && init.len() != sub_count {
            return Err(DriverError::InvalidCall(format!(
                "immutable texture needs {sub_count} init subresources, got {}",
                init.len()
            )));
        }
        if !init.is_empty() && init.len() != sub_count {
            return Err(DriverError::InvalidCall(format!(
                "partial texture init: {} of {sub_count} subresources",
                init.len()
            )));
        }

        let mut subs = texture_substorages(desc);
        for (storage, src) in subs.iter_mut().zip(init) {
            let rows = storage.rows;
            let slices = storage.slices;
            let row_bytes = storage.row_pitch as usize;
            copy_pitched(storage, 0, rows, slices, row_bytes, src)?;
        }

        let mut state = self.inner.state.lock().unwrap();
        let id = state.alloc_id();
        state.resources.insert(
            id,
            SoftwareResource {
                kind: ResourceKind::Texture { desc: *desc },
                subresources: subs,
            },
        );
        SoftwareCounters::bump(&self.inner.counters.texture_creates);
        Ok(ResourceHandle(id))
    }

    fn create_view(
        &self,
        resource: ResourceHandle,
        kind: ViewKind,
        format: DriverFormat,
    ) -> DriverResult<ViewHandle> {
        self.inner.check_alive()?;
        let mut state = self.inner.state.lock().unwrap();
        let res = state
            .resources
            .get(&resource.0)
            .ok_or_else(|| DriverError::InvalidCall(format!("unknown resource {resource:?}")))?;
        let required = required_bind_for_view(kind);
        if !res.bind().contains(required) {
            return Err(DriverError::InvalidCall(format!(
                "resource {resource:?} was not created with {required:?}"
            )));
        }
        if let ResourceKind::Texture { desc } = &res.kind {
            if !view_format_legal(desc.format, kind, format) {
                return Err(DriverError::InvalidCall(format!(
                    "view format {format:?} is not legal for storage {:?} ({kind:?})",
                    desc.format
                )));
            }
        }
        let id = state.alloc_id();
        state.views.insert(
            id,
            SoftwareView {
                resource,
                kind,
                format,
            },
        );
        SoftwareCounters::bump(&self.inner.counters.view_creates);
        Ok(ViewHandle(id))
    }

    fn create_shader(&self, stage: ShaderStage, bytecode: &[u8]) -> DriverResult<ShaderHandle> {
        self.inner.check_alive()?;
        if bytecode.is_empty() {
            return Err(DriverError::InvalidCall("empty shader bytecode".into()));
        }
        let mut state = self.inner.state.lock().unwrap();
        let id = state.alloc_id();
        state.shaders.insert(id, stage);
        SoftwareCounters::bump(&self.inner.counters.shader_creates);
        Ok(ShaderHandle(id))
    }

    fn create_blend_state(&self, _desc: &BlendDesc) -> DriverResult<StateHandle> {
        self.create_state("blend")
    }

    fn create_rasterizer_state(&self, _desc: &RasterizerDesc) -> DriverResult<StateHandle> {
        self.create_state("rasterizer")
    }

    fn create_depth_stencil_state(&self, _desc: &DepthStencilDesc) -> DriverResult<StateHandle> {
        self.create_state("depth-stencil")
    }

    fn create_sampler_state(&self, desc: &SamplerDesc) -> DriverResult<StateHandle> {
        if desc.max_anisotropy > 16 {
            return Err(DriverError::InvalidCall(format!(
                "max_anisotropy {} exceeds 16",
                desc.max_anisotropy
            )));
        }
        self.create_state("sampler")
    }

    fn destroy_resource(&self, resource: ResourceHandle) {
        let mut state = self.inner.state.lock().unwrap();
        state.resources.remove(&resource.0);
        state.views.retain(|_, v| v.resource != resource);
    }

    fn destroy_view(&self, view: ViewHandle) {
        self.inner.state.lock().unwrap().views.remove(&view.0);
    }

    fn destroy_shader(&self, shader: ShaderHandle) {
        self.inner.state.lock().unwrap().shaders.remove(&shader.0);
    }

    fn destroy_state(&self, state: StateHandle) {
        self.inner.state.lock().unwrap().states.remove(&state.0);
    }

    fn take_immediate_context(&self) -> DriverResult<Box<dyn DriverContext>> {
        self.inner.check_alive()?;
        if self.immediate_taken.swap(true, Ordering::SeqCst) {
            return Err(DriverError::InvalidCall(
                "immediate context already taken".into(),
            ));
        }
        Ok(Box::new(SoftwareContext {
            inner: Arc::clone(&self.inner),
            recording: None,
        }))
    }

    fn create_deferred_context(&self) -> DriverResult<Box<dyn DriverContext>> {
        self.inner.check_alive()?;
        if !self.inner.options.supports_deferred_contexts {
            return Err(DriverError::Unsupported(
                "driver cannot create deferred contexts".into(),
            ));
        }
        Ok(Box::new(SoftwareContext {
            inner: Arc::clone(&self.inner),
            recording: Some(Vec::new()),
        }))
    }

    fn create_swap_chain(
        &self,
        window: WindowHandle,
        desc: &SwapChainDesc,
    ) -> DriverResult<Box<dyn DriverSwapChain>> {
        self.inner.check_alive()?;
        if desc.buffer_count < 2 {
            return Err(DriverError::InvalidCall(format!(
                "swap chain needs at least 2 buffers, got {}",
                desc.buffer_count
            )));
        }
        let back = create_back_buffer(self, desc)?;
        debug!(window = window.0, ?desc, "software swap chain created");
        Ok(Box::new(SoftwareSwapChain {
            inner: Arc::clone(&self.inner),
            device_view: SwapDeviceView {
                inner: Arc::clone(&self.inner),
            },
            desc: *desc,
            back,
            fullscreen: false,
        }))
    }
}

impl SoftwareDevice {
    fn create_state(&self, kind: &'static str) -> DriverResult<StateHandle> {
        self.inner.check_alive()?;
        let mut state = self.inner.state.lock().unwrap();
        let id = state.alloc_id();
        state.states.insert(id, kind);
        SoftwareCounters::bump(&self.inner.counters.state_creates);
        Ok(StateHandle(id))
    }
}

fn back_buffer_bind(desc: &SwapChainDesc) -> BindFlags {
    let mut bind = BindFlags::RENDER_TARGET | BindFlags::SHADER_RESOURCE;
    if desc.allow_unordered {
        bind |= BindFlags::UNORDERED_ACCESS;
    }
    bind
}

fn create_back_buffer(device: &SoftwareDevice, desc: &SwapChainDesc) -> DriverResult<ResourceHandle> {
    device.create_texture(
        &TextureDesc {
            width: desc.width,
            height: desc.height,
            depth: 1,
            mip_levels: 1,
            array_layers: 1,
            format: desc.format,
            usage: Usage::Default,
            bind: back_buffer_bind(desc),
            misc: MiscFlags::empty(),
            cpu_access: CpuAccess::empty(),
        },
        &[],
    )
}

/// Minimal device facade the swap chain uses to recreate its back buffer
/// without holding the public `SoftwareDevice` (which owns the take-once
/// immediate flag).
struct SwapDeviceView {
    inner: Arc<Inner>,
}

impl SwapDeviceView {
    fn create_back_buffer(&self, desc: &SwapChainDesc) -> DriverResult<ResourceHandle> {
        self.inner.check_alive()?;
        let format = desc.format;
        let row_pitch = format.unpadded_bytes_per_row(desc.width);
        let rows = format.rows_per_slice(desc.height);
        let mut state = self.inner.state.lock().unwrap();
        let id = state.alloc_id();
        state.resources.insert(
            id,
            SoftwareResource {
                kind: ResourceKind::Texture {
                    desc: TextureDesc {
                        width: desc.width,
                        height: desc.height,
                        depth: 1,
                        mip_levels: 1,
                        array_layers: 1,
                        format,
                        usage: Usage::Default,
                        bind: back_buffer_bind(desc),
                        misc: MiscFlags::empty(),
                        cpu_access: CpuAccess::empty(),
                    },
                },
                subresources: vec![SubStorage {
                    data: vec![0; (row_pitch * rows) as usize],
                    row_pitch,
                    slice_pitch: row_pitch * rows,
                    rows,
                    slices: 1,
                }],
            },
        );
        SoftwareCounters::bump(&self.inner.counters.texture_creates);
        Ok(ResourceHandle(id))
    }
}

// ---------------------------------------------------------------------------
// Contexts.
// ---------------------------------------------------------------------------

/// Recorded deferred command. Owned copies only: the source buffers of
/// updates are released by the caller as soon as the recording call returns.
#[derive(Debug, Clone)]
enum SoftwareCmd {
    WriteSubresource {
        resource: ResourceHandle,
        subresource: u32,
        region: Option<Region>,
        data: Vec<u8>,
        row_pitch: u32,
        slice_pitch: u32,
    },
    CopyResource {
        src: ResourceHandle,
        dst: ResourceHandle,
    },
    SetRenderTargets,
    SetViewport,
    SetState,
    SetShader,
    SetBinding,
    Clear,
    Draw,
    Dispatch,
}

/// Finished recording payload stored inside [`DriverCommandBuffer`].
#[derive(Debug)]
pub struct SoftwareCommandList {
    commands: Vec<SoftwareCmd>,
}

impl SoftwareCommandList {
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

struct SoftwareContext {
    inner: Arc<Inner>,
    /// `Some` for deferred contexts (the recording in progress), `None` for
    /// the immediate context.
    recording: Option<Vec<SoftwareCmd>>,
}

impl SoftwareContext {
    fn validate_update_target(&self, resource: ResourceHandle, subresource: u32) -> DriverResult<()> {
        let state = self.inner.state.lock().unwrap();
        let res = state
            .resources
            .get(&resource.0)
            .ok_or_else(|| DriverError::InvalidCall(format!("unknown resource {resource:?}")))?;
        match res.usage() {
            Usage::Default => {}
            Usage::Immutable => {
                return Err(DriverError::InvalidCall(
                    "update_subresource on an immutable resource".into(),
                ))
            }
            Usage::Dynamic | Usage::Staging => {
                return Err(DriverError::InvalidCall(format!(
                    "update_subresource on a {:?} resource; map it instead",
                    res.usage()
                )))
            }
        }
        if subresource as usize >= res.subresources.len() {
            return Err(DriverError::InvalidCall(format!(
                "subresource {subresource} out of range"
            )));
        }
        Ok(())
    }

    fn validate_map(&self, resource: ResourceHandle, mode: MapMode) -> DriverResult<()> {
        let state = self.inner.state.lock().unwrap();
        let res = state
            .resources
            .get(&resource.0)
            .ok_or_else(|| DriverError::InvalidCall(format!("unknown resource {resource:?}")))?;
        match (res.usage(), mode) {
            (Usage::Dynamic, MapMode::WriteDiscard | MapMode::WriteNoOverwrite) => {}
            (Usage::Staging, MapMode::Read) if res.cpu_access().contains(CpuAccess::READ) => {}
            (Usage::Staging, MapMode::Write | MapMode::WriteDiscard)
                if res.cpu_access().contains(CpuAccess::WRITE) => {}
            (usage, mode) => {
                return Err(DriverError::InvalidCall(format!(
                    "map {mode:?} is illegal on a {usage:?} resource"
                )))
            }
        }
        if self.recording.is_some() && mode == MapMode::Read {
            return Err(DriverError::InvalidCall(
                "read maps are not allowed on a deferred context".into(),
            ));
        }
        Ok(())
    }

    fn apply_write(
        inner: &Inner,
        resource: ResourceHandle,
        subresource: u32,
        region: Option<Region>,
        data: &[u8],
        row_pitch: u32,
        slice_pitch: u32,
    ) -> DriverResult<()> {
        let mut state = inner.state.lock().unwrap();
        let res = state
            .resources
            .get_mut(&resource.0)
            .ok_or_else(|| DriverError::InvalidCall(format!("unknown resource {resource:?}")))?;

        let format = match &res.kind {
            ResourceKind::Texture { desc } => Some(desc.format),
            ResourceKind::Buffer { .. } => None,
        };
        let sub = res
            .subresources
            .get_mut(subresource as usize)
            .ok_or_else(|| {
                DriverError::InvalidCall(format!("subresource {subresource} out of range"))
            })?;

        let src = SubresourceData {
            data,
            row_pitch,
            slice_pitch,
        };
        match region {
            None => {
                let rows = sub.rows;
                let slices = sub.slices;
                let row_bytes = sub.row_pitch as usize;
                copy_pitched(sub, 0, rows, slices, row_bytes, &src)
            }
            Some(region) => match format {
                None => {
                    // Buffer: region.x/width are byte offsets.
                    let start = region.x as usize;
                    let len = region.width as usize;
                    let dst = sub.data.get_mut(start..start + len).ok_or_else(|| {
                        DriverError::InvalidCall("buffer region out of range".into())
                    })?;
                    let src_bytes = data
                        .get(..len)
                        .ok_or_else(|| DriverError::InvalidCall("source data too small".into()))?;
                    dst.copy_from_slice(src_bytes);
                    Ok(())
                }
                Some(format) => {
                    let layout = format.layout();
                    if region.x % layout.block_width != 0 || region.y % layout.block_height != 0 {
                        return Err(DriverError::InvalidCall(
                            "texture region is not block-aligned".into(),
                        ));
                    }
                    let row_bytes = format.unpadded_bytes_per_row(region.width) as usize;
                    let rows = format.rows_per_slice(region.height);
                    let dst_offset = (region.z as usize) * (sub.slice_pitch as usize)
                        + ((region.y / layout.block_height) as usize) * (sub.row_pitch as usize)
                        + ((region.x / layout.block_width) as usize) * (layout.block_bytes as usize);
                    copy_pitched(sub, dst_offset, rows, region.depth, row_bytes, &src)
                }
            },
        }
    }

    fn record_or_run(&mut self, cmd: SoftwareCmd) -> DriverResult<()> {
        self.inner.check_alive()?;
        match &mut self.recording {
            Some(commands) => {
                commands.push(cmd);
                Ok(())
            }
            None => Self::run_immediate(&self.inner, &cmd),
        }
    }

    fn run_immediate(inner: &Inner, cmd: &SoftwareCmd) -> DriverResult<()> {
        match cmd {
            SoftwareCmd::WriteSubresource {
                resource,
                subresource,
                region,
                data,
                row_pitch,
                slice_pitch,
            } => Self::apply_write(
                inner,
                *resource,
                *subresource,
                *region,
                data,
                *row_pitch,
                *slice_pitch,
            ),
            SoftwareCmd::CopyResource { src, dst } => {
                let mut state = inner.state.lock().unwrap();
                let src_subs = state
                    .resources
                    .get(&src.0)
                    .ok_or_else(|| DriverError::InvalidCall(format!("unknown resource {src:?}")))?
                    .subresources
                    .iter()
                    .map(|sub| sub.data.clone())
                    .collect::<Vec<_>>();
                let dst_res = state
                    .resources
                    .get_mut(&dst.0)
                    .ok_or_else(|| DriverError::InvalidCall(format!("unknown resource {dst:?}")))?;
                if dst_res.subresources.len() != src_subs.len() {
                    return Err(DriverError::InvalidCall(
                        "copy between resources with different subresource layouts".into(),
                    ));
                }
                for (dst_sub, src_data) in dst_res.subresources.iter_mut().zip(src_subs) {
                    if dst_sub.data.len() != src_data.len() {
                        return Err(DriverError::InvalidCall(
                            "copy between resources of different sizes".into(),
                        ));
                    }
                    dst_sub.data.copy_from_slice(&src_data);
                }
                SoftwareCounters::bump(&inner.counters.copies);
                Ok(())
            }
            SoftwareCmd::Draw => {
                SoftwareCounters::bump(&inner.counters.draws);
                Ok(())
            }
            SoftwareCmd::Dispatch => {
                SoftwareCounters::bump(&inner.counters.dispatches);
                Ok(())
            }
            SoftwareCmd::SetRenderTargets
            | SoftwareCmd::SetViewport
            | SoftwareCmd::SetState
            | SoftwareCmd::SetShader
            | SoftwareCmd::SetBinding
            | SoftwareCmd::Clear => Ok(()),
        }
    }
}

impl DriverContext for SoftwareContext {
    fn is_deferred(&self) -> bool {
        self.recording.is_some()
    }

    fn update_subresource(
        &mut self,
        resource: ResourceHandle,
        subresource: u32,
        region: Option<Region>,
        data: &SubresourceData<'_>,
    ) -> DriverResult<()> {
        self.inner.check_alive()?;
        self.validate_update_target(resource, subresource)?;
        SoftwareCounters::bump(&self.inner.counters.update_subresource_calls);
        self.record_or_run(SoftwareCmd::WriteSubresource {
            resource,
            subresource,
            region,
            data: data.data.to_vec(),
            row_pitch: data.row_pitch,
            slice_pitch: data.slice_pitch,
        })
    }

    fn map(
        &mut self,
        resource: ResourceHandle,
        subresource: u32,
        mode: MapMode,
        access: &mut dyn FnMut(MappedSubresource<'_>),
    ) -> DriverResult<()> {
        self.inner.check_alive()?;
        self.validate_map(resource, mode)?;
        SoftwareCounters::bump(&self.inner.counters.map_calls);

        if let Some(commands) = &mut self.recording {
            // Deferred maps hand out fresh discard memory; the write is
            // applied when the finished list is replayed.
            let (len, row_pitch, slice_pitch) = {
                let state = self.inner.state.lock().unwrap();
                let res = state.resources.get(&resource.0).ok_or_else(|| {
                    DriverError::InvalidCall(format!("unknown resource {resource:?}"))
                })?;
                let sub = res.subresources.get(subresource as usize).ok_or_else(|| {
                    DriverError::InvalidCall(format!("subresource {subresource} out of range"))
                })?;
                (sub.data.len(), sub.row_pitch, sub.slice_pitch)
            };
            let mut scratch = vec![0u8; len];
            access(MappedSubresource {
                data: &mut scratch,
                row_pitch,
                slice_pitch,
            });
            commands.push(SoftwareCmd::WriteSubresource {
                resource,
                subresource,
                region: None,
                data: scratch,
                row_pitch,
                slice_pitch,
            });
            return Ok(());
        }

        let mut state = self.inner.state.lock().unwrap();
        let res = state
            .resources
            .get_mut(&resource.0)
            .ok_or_else(|| DriverError::InvalidCall(format!("unknown resource {resource:?}")))?;
        let sub = res
            .subresources
            .get_mut(subresource as usize)
            .ok_or_else(|| {
                DriverError::InvalidCall(format!("subresource {subresource} out of range"))
            })?;
        if mode == MapMode::WriteDiscard {
            sub.data.fill(0);
        }
        access(MappedSubresource {
            data: &mut sub.data,
            row_pitch: sub.row_pitch,
            slice_pitch: sub.slice_pitch,
        });
        Ok(())
    }

    fn set_render_targets(
        &mut self,
        colors: &[ViewHandle],
        depth: Option<ViewHandle>,
    ) -> DriverResult<()> {
        {
            let state = self.inner.state.lock().unwrap();
            for view in colors.iter().chain(depth.iter()) {
                if !state.views.contains_key(&view.0) {
                    return Err(DriverError::InvalidCall(format!("unknown view {view:?}")));
                }
            }
        }
        self.record_or_run(SoftwareCmd::SetRenderTargets)
    }

    fn set_viewport(&mut self, _viewport: &Viewport) -> DriverResult<()> {
        self.record_or_run(SoftwareCmd::SetViewport)
    }

    fn set_blend_state(&mut self, state: StateHandle) -> DriverResult<()> {
        self.validate_state(state)?;
        self.record_or_run(SoftwareCmd::SetState)
    }

    fn set_rasterizer_state(&mut self, state: StateHandle) -> DriverResult<()> {
        self.validate_state(state)?;
        self.record_or_run(SoftwareCmd::SetState)
    }

    fn set_depth_stencil_state(&mut self, state: StateHandle) -> DriverResult<()> {
        self.validate_state(state)?;
        self.record_or_run(SoftwareCmd::SetState)
    }

    fn set_sampler(&mut self, _slot: u32, state: StateHandle) -> DriverResult<()> {
        self.validate_state(state)?;
        self.record_or_run(SoftwareCmd::SetState)
    }

    fn set_shader(&mut self, stage: ShaderStage, shader: ShaderHandle) -> DriverResult<()> {
        {
            let state = self.inner.state.lock().unwrap();
            match state.shaders.get(&shader.0) {
                None => {
                    return Err(DriverError::InvalidCall(format!(
                        "unknown shader {shader:?}"
                    )))
                }
                Some(actual) if *actual != stage => {
                    return Err(DriverError::InvalidCall(format!(
                        "shader {shader:?} is a {actual:?} shader, bound as {stage:?}"
                    )))
                }
                Some(_) => {}
            }
        }
        self.record_or_run(SoftwareCmd::SetShader)
    }

    fn set_shader_resource(&mut self, _slot: u32, view: ViewHandle) -> DriverResult<()> {
        {
            let state = self.inner.state.lock().unwrap();
            if !state.views.contains_key(&view.0) {
                return Err(DriverError::InvalidCall(format!("unknown view {view:?}")));
            }
        }
        self.record_or_run(SoftwareCmd::SetBinding)
    }

    fn set_constant_buffer(
        &mut self,
        _stage: ShaderStage,
        _slot: u32,
        buffer: ResourceHandle,
    ) -> DriverResult<()> {
        self.validate_buffer_bind(buffer, BindFlags::CONSTANT_BUFFER)?;
        self.record_or_run(SoftwareCmd::SetBinding)
    }

    fn set_vertex_buffer(
        &mut self,
        _slot: u32,
        buffer: ResourceHandle,
        _stride: u32,
        _offset: u64,
    ) -> DriverResult<()> {
        self.validate_buffer_bind(buffer, BindFlags::VERTEX_BUFFER)?;
        self.record_or_run(SoftwareCmd::SetBinding)
    }

    fn set_index_buffer(
        &mut self,
        buffer: ResourceHandle,
        format: DriverFormat,
        _offset: u64,
    ) -> DriverResult<()> {
        if !matches!(format, DriverFormat::R16Uint | DriverFormat::R32Uint) {
            return Err(DriverError::InvalidCall(format!(
                "index buffer format must be R16Uint or R32Uint, got {format:?}"
            )));
        }
        self.validate_buffer_bind(buffer, BindFlags::INDEX_BUFFER)?;
        self.record_or_run(SoftwareCmd::SetBinding)
    }

    fn clear_render_target(&mut self, view: ViewHandle, _color: [f32; 4]) -> DriverResult<()> {
        self.validate_view(view, ViewKind::RenderTarget)?;
        self.record_or_run(SoftwareCmd::Clear)
    }

    fn clear_depth_stencil(
        &mut self,
        view: ViewHandle,
        _depth: f32,
        _stencil: u8,
    ) -> DriverResult<()> {
        self.validate_view(view, ViewKind::DepthStencil)?;
        self.record_or_run(SoftwareCmd::Clear)
    }

    fn draw(&mut self, _vertex_count: u32, _start_vertex: u32) -> DriverResult<()> {
        self.record_or_run(SoftwareCmd::Draw)
    }

    fn draw_indexed(
        &mut self,
        _index_count: u32,
        _start_index: u32,
        _base_vertex: i32,
    ) -> DriverResult<()> {
        self.record_or_run(SoftwareCmd::Draw)
    }

    fn dispatch(&mut self, _x: u32, _y: u32, _z: u32) -> DriverResult<()> {
        self.record_or_run(SoftwareCmd::Dispatch)
    }

    fn copy_resource(&mut self, src: ResourceHandle, dst: ResourceHandle) -> DriverResult<()> {
        self.inner.check_alive()?;
        {
            let state = self.inner.state.lock().unwrap();
            for handle in [src, dst] {
                if !state.resources.contains_key(&handle.0) {
                    return Err(DriverError::InvalidCall(format!(
                        "unknown resource {handle:?}"
                    )));
                }
            }
            let dst_res = &state.resources[&dst.0];
            if dst_res.usage() == Usage::Immutable {
                return Err(DriverError::InvalidCall(
                    "copy into an immutable resource".into(),
                ));
            }
        }
        self.record_or_run(SoftwareCmd::CopyResource { src, dst })
    }

    fn finish(&mut self) -> DriverResult<DriverCommandBuffer> {
        self.inner.check_alive()?;
        let commands = match &mut self.recording {
            Some(commands) => std::mem::take(commands),
            None => {
                return Err(DriverError::InvalidCall(
                    "finish called on the immediate context".into(),
                ))
            }
        };
        SoftwareCounters::bump(&self.inner.counters.finished_command_buffers);
        Ok(DriverCommandBuffer::new(Box::new(SoftwareCommandList {
            commands,
        })))
    }

    fn execute(&mut self, buffer: &DriverCommandBuffer) -> DriverResult<()> {
        self.inner.check_alive()?;
        if self.recording.is_some() {
            return Err(DriverError::InvalidCall(
                "execute called on a deferred context".into(),
            ));
        }
        let list = buffer
            .downcast::<SoftwareCommandList>()
            .ok_or_else(|| DriverError::InvalidCall("foreign command buffer".into()))?;
        for cmd in &list.commands {
            Self::run_immediate(&self.inner, cmd)?;
        }
        SoftwareCounters::bump(&self.inner.counters.executed_command_buffers);
        Ok(())
    }
}

impl SoftwareContext {
    fn validate_state(&self, state: StateHandle) -> DriverResult<()> {
        let guard = self.inner.state.lock().unwrap();
        if !guard.states.contains_key(&state.0) {
            return Err(DriverError::InvalidCall(format!(
                "unknown state object {state:?}"
            )));
        }
        Ok(())
    }

    fn validate_view(&self, view: ViewHandle, kind: ViewKind) -> DriverResult<()> {
        let guard = self.inner.state.lock().unwrap();
        match guard.views.get(&view.0) {
            None => Err(DriverError::InvalidCall(format!("unknown view {view:?}"))),
            Some(v) if v.kind != kind => Err(DriverError::InvalidCall(format!(
                "view {view:?} is {:?}, expected {kind:?}",
                v.kind
            ))),
            Some(_) => Ok(()),
        }
    }

    fn validate_buffer_bind(&self, buffer: ResourceHandle, bind: BindFlags) -> DriverResult<()> {
        let guard = self.inner.state.lock().unwrap();
        let res = guard
            .resources
            .get(&buffer.0)
            .ok_or_else(|| DriverError::InvalidCall(format!("unknown resource {buffer:?}")))?;
        if !res.bind().contains(bind) {
            return Err(DriverError::InvalidCall(format!(
                "buffer {buffer:?} was not created with {bind:?}"
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Swap chain.
// ---------------------------------------------------------------------------

struct SoftwareSwapChain {
    inner: Arc<Inner>,
    device_view: SwapDeviceView,
    desc: SwapChainDesc,
    back: ResourceHandle,
    fullscreen: bool,
}

impl DriverSwapChain for SoftwareSwapChain {
    fn desc(&self) -> SwapChainDesc {
        self.desc
    }

    fn resize_buffers(&mut self, width: u32, height: u32) -> DriverResult<()> {
        self.inner.check_alive()?;
        if width == 0 || height == 0 {
            return Err(DriverError::InvalidCall(
                "swap chain resize to zero area".into(),
            ));
        }
        {
            let state = self.inner.state.lock().unwrap();
            let outstanding = state
                .views
                .values()
                .filter(|v| v.resource == self.back)
                .count();
            if outstanding > 0 {
                return Err(DriverError::InvalidCall(format!(
                    "{outstanding} views of the back buffer still alive during resize"
                )));
            }
        }
        {
            let mut state = self.inner.state.lock().unwrap();
            state.resources.remove(&self.back.0);
        }
        self.desc.width = width;
        self.desc.height = height;
        self.back = self.device_view.create_back_buffer(&self.desc)?;
        SoftwareCounters::bump(&self.inner.counters.swap_chain_resizes);
        Ok(())
    }

    fn back_buffer(&mut self) -> DriverResult<ResourceHandle> {
        self.inner.check_alive()?;
        Ok(self.back)
    }

    fn present(&mut self, _sync_interval: u32) -> DriverResult<()> {
        self.inner.check_alive()?;
        SoftwareCounters::bump(&self.inner.counters.presents);
        Ok(())
    }

    fn set_fullscreen(&mut self, exclusive: bool) -> DriverResult<()> {
        self.inner.check_alive()?;
        self.fullscreen = exclusive;
        Ok(())
    }

    fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    fn output_resolution(&self) -> (u32, u32) {
        self.inner.options.output_resolution
    }
}

impl Drop for SoftwareSwapChain {
    fn drop(&mut self) {
        let mut state = self.inner.state.lock().unwrap();
        state.resources.remove(&self.back.0);
        let back = self.back;
        state.views.retain(|_, v| v.resource != back);
    }
}

// ---------------------------------------------------------------------------
// Factory.
// ---------------------------------------------------------------------------

/// Factory producing [`SoftwareDevice`]s. Keeps the last created device
/// reachable so tests can inject faults after the core took ownership.
#[derive(Default)]
pub struct SoftwareFactory {
    options: SoftwareOptions,
    last_created: Mutex<Option<Arc<SoftwareDevice>>>,
}

impl SoftwareFactory {
    pub fn new(options: SoftwareOptions) -> Self {
        Self {
            options,
            last_created: Mutex::new(None),
        }
    }

    /// The device produced by the most recent `create_device` call.
    pub fn last_created(&self) -> Option<Arc<SoftwareDevice>> {
        self.last_created.lock().unwrap().clone()
    }
}

impl DriverFactory for SoftwareFactory {
    fn create_device(
        &self,
        options: &DriverCreateOptions,
    ) -> DriverResult<Arc<dyn DriverDevice>> {
        if options.debug && !self.options.debug_layer_available {
            return Err(DriverError::DebugLayerUnavailable);
        }
        let device = SoftwareDevice::new(self.options.clone(), options.debug);
        *self.last_created.lock().unwrap() = Some(Arc::clone(&device));
        debug!(
            name = %options.debug_name,
            debug = options.debug,
            tier = ?self.options.feature_tier,
            "software device created"
        );
        Ok(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> Arc<SoftwareDevice> {
        SoftwareDevice::new(SoftwareOptions::default(), false)
    }

    fn plain_texture(usage: Usage, cpu: CpuAccess) -> TextureDesc {
        TextureDesc {
            width: 8,
            height: 8,
            depth: 1,
            mip_levels: 1,
            array_layers: 1,
            format: DriverFormat::Rgba8Unorm,
            usage,
            bind: if usage == Usage::Staging {
                BindFlags::empty()
            } else {
                BindFlags::SHADER_RESOURCE
            },
            misc: MiscFlags::empty(),
            cpu_access: cpu,
        }
    }

    #[test]
    fn update_subresource_rejects_dynamic_and_staging() {
        let dev = device();
        let mut ctx = dev.take_immediate_context().unwrap();
        let dynamic = dev
            .create_texture(&plain_texture(Usage::Dynamic, CpuAccess::WRITE), &[])
            .unwrap();
        let data = [0u8; 8 * 8 * 4];
        let src = SubresourceData {
            data: &data,
            row_pitch: 32,
            slice_pitch: 32 * 8,
        };
        let err = ctx.update_subresource(dynamic, 0, None, &src).unwrap_err();
        assert!(matches!(err, DriverError::InvalidCall(_)));
    }

    #[test]
    fn map_rejects_default_usage() {
        let dev = device();
        let mut ctx = dev.take_immediate_context().unwrap();
        let default = dev
            .create_texture(&plain_texture(Usage::Default, CpuAccess::empty()), &[])
            .unwrap();
        let err = ctx
            .map(default, 0, MapMode::WriteDiscard, &mut |_| {})
            .unwrap_err();
        assert!(matches!(err, DriverError::InvalidCall(_)));
    }

    #[test]
    fn deferred_recording_replays_on_immediate_execute() {
        let dev = device();
        let mut immediate = dev.take_immediate_context().unwrap();
        let mut deferred = dev.create_deferred_context().unwrap();

        deferred.draw(3, 0).unwrap();
        deferred.draw(3, 0).unwrap();
        let buffer = deferred.finish().unwrap();

        assert_eq!(dev.counters().snapshot().draws, 0);
        immediate.execute(&buffer).unwrap();
        assert_eq!(dev.counters().snapshot().draws, 2);
    }

    #[test]
    fn immediate_context_is_take_once() {
        let dev = device();
        let _ctx = dev.take_immediate_context().unwrap();
        assert!(dev.take_immediate_context().is_err());
    }

    #[test]
    fn injected_loss_poisons_every_call() {
        let dev = device();
        let mut ctx = dev.take_immediate_context().unwrap();
        dev.inject_device_loss();
        assert_eq!(ctx.draw(3, 0).unwrap_err(), DriverError::DeviceLost);
        assert_eq!(
            dev.create_deferred_context().err(),
            Some(DriverError::DeviceLost)
        );
    }

    #[test]
    fn swap_chain_resize_requires_views_released() {
        let dev = device();
        let mut sc = dev
            .create_swap_chain(
                WindowHandle(7),
                &SwapChainDesc {
                    width: 64,
                    height: 64,
                    format: DriverFormat::Bgra8Unorm,
                    buffer_count: 2,
                    allow_unordered: false,
                },
            )
            .unwrap();
        let back = sc.back_buffer().unwrap();
        let view = dev
            .create_view(back, ViewKind::RenderTarget, DriverFormat::Bgra8Unorm)
            .unwrap();
        assert!(sc.resize_buffers(128, 128).is_err());
        dev.destroy_view(view);
        sc.resize_buffers(128, 128).unwrap();
        assert_ne!(sc.back_buffer().unwrap(), back);
    }

    #[test]
    fn cube_texture_layer_count_must_be_multiple_of_six() {
        let dev = device();
        let mut desc = plain_texture(Usage::Default, CpuAccess::empty());
        desc.misc = MiscFlags::TEXTURE_CUBE;
        desc.array_layers = 4;
        assert!(dev.create_texture(&desc, &[]).is_err());
        desc.array_layers = 6;
        assert!(dev.create_texture(&desc, &[]).is_ok());
    }
}
