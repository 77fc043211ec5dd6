//! Render-state object registries.
//!
//! Each of the four state kinds (blend, rasterizer, depth-stencil, sampler)
//! exposes a small closed set of policy values. A registry creates one
//! native state object per value at device initialization, stores it in a
//! fixed array, and never mutates the table again — lookups are plain
//! indexing with no locking. One generic registry is instantiated per kind
//! instead of four near-identical hand-rolled tables.

use vitric_driver::{
    AddressMode, BlendDesc, BlendFactor, BlendOp, CompareFunc, CullMode, DepthStencilDesc,
    DriverDevice, DriverResult, FillMode, Filter, RasterizerDesc, SamplerDesc, StateHandle,
};

/// A closed enumeration of common state combinations, plus the recipe for
/// creating the native object behind each value.
pub trait StatePreset: Copy + Eq + 'static {
    const ALL: &'static [Self];

    fn index(self) -> usize;
    fn name(self) -> &'static str;
    fn create(self, device: &dyn DriverDevice) -> DriverResult<StateHandle>;
}

/// Fixed table of native state objects, indexed by preset.
///
/// Immutable after [`StateRegistry::initialize`]; `handle` is lock-free and
/// returns the identical handle on every call for a given preset.
pub struct StateRegistry<P: StatePreset> {
    handles: Vec<StateHandle>,
    _marker: std::marker::PhantomData<P>,
}

impl<P: StatePreset> StateRegistry<P> {
    pub fn initialize(device: &dyn DriverDevice) -> DriverResult<Self> {
        let mut handles = Vec::with_capacity(P::ALL.len());
        for &preset in P::ALL {
            debug_assert_eq!(preset.index(), handles.len());
            handles.push(preset.create(device)?);
        }
        Ok(Self {
            handles,
            _marker: std::marker::PhantomData,
        })
    }

    pub fn handle(&self, preset: P) -> StateHandle {
        self.handles[preset.index()]
    }

    /// Release every native object unconditionally.
    pub fn deinitialize(&mut self, device: &dyn DriverDevice) {
        for handle in self.handles.drain(..) {
            device.destroy_state(handle);
        }
    }
}

/// Output blending policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendPreset {
    Opaque,
    AlphaBlend,
    Additive,
    NonPremultiplied,
}

impl StatePreset for BlendPreset {
    const ALL: &'static [Self] = &[
        BlendPreset::Opaque,
        BlendPreset::AlphaBlend,
        BlendPreset::Additive,
        BlendPreset::NonPremultiplied,
    ];

    fn index(self) -> usize {
        self as usize
    }

    fn name(self) -> &'static str {
        match self {
            BlendPreset::Opaque => "opaque",
            BlendPreset::AlphaBlend => "alpha-blend",
            BlendPreset::Additive => "additive",
            BlendPreset::NonPremultiplied => "non-premultiplied",
        }
    }

    fn create(self, device: &dyn DriverDevice) -> DriverResult<StateHandle> {
        let desc = match self {
            BlendPreset::Opaque => BlendDesc::DISABLED,
            BlendPreset::AlphaBlend => blend(BlendFactor::One, BlendFactor::InvSrcAlpha),
            BlendPreset::Additive => blend(BlendFactor::SrcAlpha, BlendFactor::One),
            BlendPreset::NonPremultiplied => {
                blend(BlendFactor::SrcAlpha, BlendFactor::InvSrcAlpha)
            }
        };
        device.create_blend_state(&desc)
    }
}

fn blend(src: BlendFactor, dst: BlendFactor) -> BlendDesc {
    BlendDesc {
        enable: true,
        src,
        dst,
        op: BlendOp::Add,
        src_alpha: src,
        dst_alpha: dst,
        op_alpha: BlendOp::Add,
    }
}

/// Triangle rasterization policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterizerPreset {
    CullNone,
    CullFront,
    CullBack,
    Wireframe,
}

impl StatePreset for RasterizerPreset {
    const ALL: &'static [Self] = &[
        RasterizerPreset::CullNone,
        RasterizerPreset::CullFront,
        RasterizerPreset::CullBack,
        RasterizerPreset::Wireframe,
    ];

    fn index(self) -> usize {
        self as usize
    }

    fn name(self) -> &'static str {
        match self {
            RasterizerPreset::CullNone => "cull-none",
            RasterizerPreset::CullFront => "cull-front",
            RasterizerPreset::CullBack => "cull-back",
            RasterizerPreset::Wireframe => "wireframe",
        }
    }

    fn create(self, device: &dyn DriverDevice) -> DriverResult<StateHandle> {
        let (fill, cull) = match self {
            RasterizerPreset::CullNone => (FillMode::Solid, CullMode::None),
            RasterizerPreset::CullFront => (FillMode::Solid, CullMode::Front),
            RasterizerPreset::CullBack => (FillMode::Solid, CullMode::Back),
            RasterizerPreset::Wireframe => (FillMode::Wireframe, CullMode::None),
        };
        device.create_rasterizer_state(&RasterizerDesc {
            fill,
            cull,
            front_ccw: false,
            depth_clip: true,
            scissor: false,
            multisample: false,
        })
    }
}

/// Depth test/write policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthStencilPreset {
    /// No depth test, no depth write.
    Disabled,
    /// Test and write (standard opaque pass).
    Default,
    /// Test without writing (transparents after the opaque pass).
    Read,
}

impl StatePreset for DepthStencilPreset {
    const ALL: &'static [Self] = &[
        DepthStencilPreset::Disabled,
        DepthStencilPreset::Default,
        DepthStencilPreset::Read,
    ];

    fn index(self) -> usize {
        self as usize
    }

    fn name(self) -> &'static str {
        match self {
            DepthStencilPreset::Disabled => "depth-disabled",
            DepthStencilPreset::Default => "depth-default",
            DepthStencilPreset::Read => "depth-read",
        }
    }

    fn create(self, device: &dyn DriverDevice) -> DriverResult<StateHandle> {
        let (enable, write) = match self {
            DepthStencilPreset::Disabled => (false, false),
            DepthStencilPreset::Default => (true, true),
            DepthStencilPreset::Read => (true, false),
        };
        device.create_depth_stencil_state(&DepthStencilDesc {
            depth_enable: enable,
            depth_write: write,
            depth_func: CompareFunc::LessEqual,
            stencil_enable: false,
        })
    }
}

/// Texture sampling policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerPreset {
    PointWrap,
    PointClamp,
    LinearWrap,
    LinearClamp,
    AnisotropicWrap,
    AnisotropicClamp,
}

impl StatePreset for SamplerPreset {
    const ALL: &'static [Self] = &[
        SamplerPreset::PointWrap,
        SamplerPreset::PointClamp,
        SamplerPreset::LinearWrap,
        SamplerPreset::LinearClamp,
        SamplerPreset::AnisotropicWrap,
        SamplerPreset::AnisotropicClamp,
    ];

    fn index(self) -> usize {
        self as usize
    }

    fn name(self) -> &'static str {
        match self {
            SamplerPreset::PointWrap => "point-wrap",
            SamplerPreset::PointClamp => "point-clamp",
            SamplerPreset::LinearWrap => "linear-wrap",
            SamplerPreset::LinearClamp => "linear-clamp",
            SamplerPreset::AnisotropicWrap => "anisotropic-wrap",
            SamplerPreset::AnisotropicClamp => "anisotropic-clamp",
        }
    }

    fn create(self, device: &dyn DriverDevice) -> DriverResult<StateHandle> {
        let (filter, address) = match self {
            SamplerPreset::PointWrap => (Filter::Point, AddressMode::Wrap),
            SamplerPreset::PointClamp => (Filter::Point, AddressMode::Clamp),
            SamplerPreset::LinearWrap => (Filter::Linear, AddressMode::Wrap),
            SamplerPreset::LinearClamp => (Filter::Linear, AddressMode::Clamp),
            SamplerPreset::AnisotropicWrap => (Filter::Anisotropic, AddressMode::Wrap),
            SamplerPreset::AnisotropicClamp => (Filter::Anisotropic, AddressMode::Clamp),
        };
        device.create_sampler_state(&SamplerDesc {
            filter,
            address_u: address,
            address_v: address,
            address_w: address,
            max_anisotropy: if filter == Filter::Anisotropic { 16 } else { 1 },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitric_driver::software::{SoftwareDevice, SoftwareOptions};

    #[test]
    fn registry_lookup_is_idempotent() {
        let device = SoftwareDevice::new(SoftwareOptions::default(), false);
        let registry = StateRegistry::<SamplerPreset>::initialize(device.as_ref()).unwrap();

        for &preset in SamplerPreset::ALL {
            let first = registry.handle(preset);
            for _ in 0..4 {
                assert_eq!(registry.handle(preset), first, "{}", preset.name());
            }
        }
        assert_eq!(
            device.counters().snapshot().state_creates,
            SamplerPreset::ALL.len() as u64
        );
    }

    #[test]
    fn every_preset_creates_exactly_one_native_object() {
        let device = SoftwareDevice::new(SoftwareOptions::default(), false);
        let _blend = StateRegistry::<BlendPreset>::initialize(device.as_ref()).unwrap();
        let _raster = StateRegistry::<RasterizerPreset>::initialize(device.as_ref()).unwrap();
        let _depth = StateRegistry::<DepthStencilPreset>::initialize(device.as_ref()).unwrap();

        let expected =
            (BlendPreset::ALL.len() + RasterizerPreset::ALL.len() + DepthStencilPreset::ALL.len())
                as u64;
        assert_eq!(device.counters().snapshot().state_creates, expected);
    }
}
