//! Semantic pixel/resource formats and their lowering onto the native
//! format space.
//!
//! The native space is wider than the semantic one because depth formats
//! need three different native ids depending on which view is being created:
//! a typeless id for the storage itself, a depth id for the target view and
//! a color-cast id for shader reads. [`Format::triple`] resolves that set;
//! for non-depth formats it collapses to the same id three times.

use vitric_driver::DriverFormat;

/// Semantic format enumeration exposed to callers of the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Rgba8Unorm,
    Rgba8UnormSrgb,
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
    R32Float,
    R32Uint,
    Depth16Unorm,
    Depth24UnormStencil8,
    Depth32Float,
    Depth32FloatStencil8,
    Bc1Unorm,
    Bc1UnormSrgb,
    Bc3Unorm,
    Bc3UnormSrgb,
    Bc7Unorm,
    Bc7UnormSrgb,
}

/// The (storage, target-view, shader-view) native format set derived from
/// one semantic format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatTriple {
    pub storage: DriverFormat,
    pub target: DriverFormat,
    pub shader: DriverFormat,
}

impl Format {
    pub const ALL: &'static [Format] = &[
        Format::Rgba8Unorm,
        Format::Rgba8UnormSrgb,
        Format::Bgra8Unorm,
        Format::Bgra8UnormSrgb,
        Format::Rgba16Float,
        Format::Rgba32Float,
        Format::Rg11B10Float,
        Format::Rgb10A2Unorm,
        Format::R8Unorm,
        Format::Rg8Unorm,
        Format::R16Float,
        Format::R16Uint,
        Format::R16Unorm,
        Format::R32Float,
        Format::R32Uint,
        Format::Depth16Unorm,
        Format::Depth24UnormStencil8,
        Format::Depth32Float,
        Format::Depth32FloatStencil8,
        Format::Bc1Unorm,
        Format::Bc1UnormSrgb,
        Format::Bc3Unorm,
        Format::Bc3UnormSrgb,
        Format::Bc7Unorm,
        Format::Bc7UnormSrgb,
    ];

    pub fn is_depth(self) -> bool {
        matches!(
            self,
            Format::Depth16Unorm
                | Format::Depth24UnormStencil8
                | Format::Depth32Float
                | Format::Depth32FloatStencil8
        )
    }

    pub fn is_compressed(self) -> bool {
        matches!(
            self,
            Format::Bc1Unorm
                | Format::Bc1UnormSrgb
                | Format::Bc3Unorm
                | Format::Bc3UnormSrgb
                | Format::Bc7Unorm
                | Format::Bc7UnormSrgb
        )
    }

    /// The fully-typed native format this semantic format names.
    ///
    /// For depth formats this is the depth-view id; use [`Format::triple`]
    /// when creating storage or shader views.
    pub fn to_native(self) -> DriverFormat {
        match self {
            Format::Rgba8Unorm => DriverFormat::Rgba8Unorm,
            Format::Rgba8UnormSrgb => DriverFormat::Rgba8UnormSrgb,
            Format::Bgra8Unorm => DriverFormat::Bgra8Unorm,
            Format::Bgra8UnormSrgb => DriverFormat::Bgra8UnormSrgb,
            Format::Rgba16Float => DriverFormat::Rgba16Float,
            Format::Rgba32Float => DriverFormat::Rgba32Float,
            Format::Rg11B10Float => DriverFormat::Rg11B10Float,
            Format::Rgb10A2Unorm => DriverFormat::Rgb10A2Unorm,
            Format::R8Unorm => DriverFormat::R8Unorm,
            Format::Rg8Unorm => DriverFormat::Rg8Unorm,
            Format::R16Float => DriverFormat::R16Float,
            Format::R16Uint => DriverFormat::R16Uint,
            Format::R16Unorm => DriverFormat::R16Unorm,
            Format::R32Float => DriverFormat::R32Float,
            Format::R32Uint => DriverFormat::R32Uint,
            Format::Depth16Unorm => DriverFormat::Depth16Unorm,
            Format::Depth24UnormStencil8 => DriverFormat::Depth24UnormStencil8,
            Format::Depth32Float => DriverFormat::Depth32Float,
            Format::Depth32FloatStencil8 => DriverFormat::Depth32FloatStencil8,
            Format::Bc1Unorm => DriverFormat::Bc1Unorm,
            Format::Bc1UnormSrgb => DriverFormat::Bc1UnormSrgb,
            Format::Bc3Unorm => DriverFormat::Bc3Unorm,
            Format::Bc3UnormSrgb => DriverFormat::Bc3UnormSrgb,
            Format::Bc7Unorm => DriverFormat::Bc7Unorm,
            Format::Bc7UnormSrgb => DriverFormat::Bc7UnormSrgb,
        }
    }

    /// Map a native format back to its semantic name.
    ///
    /// Typeless storage and shader-cast ids resolve to the semantic depth
    /// format they belong to; `None` means the native format has no semantic
    /// equivalent (e.g. `Unknown`).
    pub fn from_native(native: DriverFormat) -> Option<Format> {
        Some(match native {
            DriverFormat::Rgba8Unorm => Format::Rgba8Unorm,
            DriverFormat::Rgba8UnormSrgb => Format::Rgba8UnormSrgb,
            DriverFormat::Bgra8Unorm => Format::Bgra8Unorm,
            DriverFormat::Bgra8UnormSrgb => Format::Bgra8UnormSrgb,
            DriverFormat::Rgba16Float => Format::Rgba16Float,
            DriverFormat::Rgba32Float => Format::Rgba32Float,
            DriverFormat::Rg11B10Float => Format::Rg11B10Float,
            DriverFormat::Rgb10A2Unorm => Format::Rgb10A2Unorm,
            DriverFormat::R8Unorm => Format::R8Unorm,
            DriverFormat::Rg8Unorm => Format::Rg8Unorm,
            DriverFormat::R16Float => Format::R16Float,
            DriverFormat::R16Uint => Format::R16Uint,
            DriverFormat::R16Unorm => Format::R16Unorm,
            DriverFormat::R32Float => Format::R32Float,
            DriverFormat::R32Uint => Format::R32Uint,
            DriverFormat::Depth16Unorm | DriverFormat::R16Typeless => Format::Depth16Unorm,
            DriverFormat::Depth24UnormStencil8
            | DriverFormat::R24G8Typeless
            | DriverFormat::R24UnormX8Typeless => Format::Depth24UnormStencil8,
            DriverFormat::Depth32Float | DriverFormat::R32Typeless => Format::Depth32Float,
            DriverFormat::Depth32FloatStencil8
            | DriverFormat::R32G8X24Typeless
            | DriverFormat::R32FloatX8X24Typeless => Format::Depth32FloatStencil8,
            DriverFormat::Bc1Unorm => Format::Bc1Unorm,
            DriverFormat::Bc1UnormSrgb => Format::Bc1UnormSrgb,
            DriverFormat::Bc3Unorm => Format::Bc3Unorm,
            DriverFormat::Bc3UnormSrgb => Format::Bc3UnormSrgb,
            DriverFormat::Bc7Unorm => Format::Bc7Unorm,
            DriverFormat::Bc7UnormSrgb => Format::Bc7UnormSrgb,
            DriverFormat::Unknown
            | DriverFormat::Rgba8Typeless
            | DriverFormat::Bgra8Typeless => return None,
        })
    }

    /// Resolve the compatible native format set for this semantic format.
    pub fn triple(self) -> FormatTriple {
        match self {
            Format::Depth16Unorm => FormatTriple {
                storage: DriverFormat::R16Typeless,
                target: DriverFormat::Depth16Unorm,
                shader: DriverFormat::R16Unorm,
            },
            Format::Depth24UnormStencil8 => FormatTriple {
                storage: DriverFormat::R24G8Typeless,
                target: DriverFormat::Depth24UnormStencil8,
                shader: DriverFormat::R24UnormX8Typeless,
            },
            Format::Depth32Float => FormatTriple {
                storage: DriverFormat::R32Typeless,
                target: DriverFormat::Depth32Float,
                shader: DriverFormat::R32Float,
            },
            Format::Depth32FloatStencil8 => FormatTriple {
                storage: DriverFormat::R32G8X24Typeless,
                target: DriverFormat::Depth32FloatStencil8,
                shader: DriverFormat::R32FloatX8X24Typeless,
            },
            other => {
                let native = other.to_native();
                FormatTriple {
                    storage: native,
                    target: native,
                    shader: native,
                }
            }
        }
    }

    /// Tightly-packed bytes per row at `width` texels.
    pub fn bytes_per_row(self, width: u32) -> u32 {
        self.to_native().unpadded_bytes_per_row(width)
    }

    /// Block rows covering `height` texels (texel rows for uncompressed
    /// formats, 4-texel block rows for BC).
    pub fn rows_per_slice(self, height: u32) -> u32 {
        self.to_native().rows_per_slice(height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_round_trip_is_stable() {
        // For every semantic format representable in the native space,
        // native(semantic(native(f))) == native(f).
        for &format in Format::ALL {
            let native = format.to_native();
            let back = Format::from_native(native).expect("typed native formats map back");
            assert_eq!(back.to_native(), native, "{format:?}");
        }
    }

    #[test]
    fn depth_triples_split_storage_and_views() {
        let triple = Format::Depth24UnormStencil8.triple();
        assert_eq!(triple.storage, DriverFormat::R24G8Typeless);
        assert_eq!(triple.target, DriverFormat::Depth24UnormStencil8);
        assert_eq!(triple.shader, DriverFormat::R24UnormX8Typeless);

        // Every member of the triple resolves back to the same semantic
        // format.
        for native in [triple.storage, triple.target, triple.shader] {
            assert_eq!(
                Format::from_native(native),
                Some(Format::Depth24UnormStencil8)
            );
        }
    }

    #[test]
    fn color_triples_collapse() {
        for &format in Format::ALL.iter().filter(|f| !f.is_depth()) {
            let triple = format.triple();
            assert_eq!(triple.storage, triple.target);
            assert_eq!(triple.target, triple.shader);
        }
    }

    #[test]
    fn compressed_row_math_uses_block_layout() {
        // BC1: 4x4 blocks, 8 bytes each. 64 texels -> 16 blocks -> 128 bytes.
        assert_eq!(Format::Bc1Unorm.bytes_per_row(64), 128);
        assert_eq!(Format::Bc1Unorm.rows_per_slice(64), 16);
        // Non-multiple-of-4 extents round up to whole blocks.
        assert_eq!(Format::Bc1Unorm.bytes_per_row(66), 136);
        assert_eq!(Format::Rgba8Unorm.bytes_per_row(66), 264);
    }
}
