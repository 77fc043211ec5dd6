//! Resource update dispatch.
//!
//! One entry point per resource type, branching on the usage class recorded
//! at creation. DEFAULT resources take the direct replace-subresource call;
//! DYNAMIC and STAGING resources take the map/copy/unmap path. The branch is
//! a correctness requirement, not a fast path: the native driver rejects the
//! other combination outright.

use vitric_driver::{MapMode, MappedSubresource, Region, SubresourceData, Usage, CpuAccess};

use crate::command_list::CommandList;
use crate::error::{RenderError, RenderResult};
use crate::resource::{Buffer, Texture};

/// Copy `rows * slices` pitched rows from `src` into `dst`, honoring the
/// differing pitches on both sides. Row length is `row_bytes`.
pub(crate) fn copy_rows(
    dst: &mut MappedSubresource<'_>,
    src: &SubresourceData<'_>,
    rows: u32,
    slices: u32,
    row_bytes: usize,
) -> RenderResult<()> {
    for slice in 0..slices {
        for row in 0..rows {
            let src_off = slice as usize * src.slice_pitch as usize
                + row as usize * src.row_pitch as usize;
            let dst_off = slice as usize * dst.slice_pitch as usize
                + row as usize * dst.row_pitch as usize;
            let src_row = src
                .data
                .get(src_off..src_off + row_bytes)
                .ok_or_else(|| {
                    RenderError::InvalidArgument(format!(
                        "source data ends inside row {row} of slice {slice}"
                    ))
                })?;
            let dst_row = dst
                .data
                .get_mut(dst_off..dst_off + row_bytes)
                .ok_or_else(|| {
                    RenderError::InvalidArgument(format!(
                        "mapped subresource ends inside row {row} of slice {slice}"
                    ))
                })?;
            dst_row.copy_from_slice(src_row);
        }
    }
    Ok(())
}

impl CommandList {
    /// Write `data` into `buffer` at `offset` bytes.
    pub fn update_buffer(&self, buffer: &Buffer, offset: u64, data: &[u8]) -> RenderResult<()> {
        let end = offset
            .checked_add(data.len() as u64)
            .ok_or_else(|| RenderError::InvalidArgument("buffer write overflows u64".into()))?;
        if end > buffer.byte_width() {
            return Err(RenderError::InvalidArgument(format!(
                "write of {} bytes at {offset} exceeds buffer size {}",
                data.len(),
                buffer.byte_width()
            )));
        }

        match buffer.usage() {
            Usage::Immutable => Err(RenderError::OperationNotPermitted(
                "immutable buffers cannot be updated".into(),
            )),
            Usage::Default => {
                let region = Region {
                    x: offset as u32,
                    y: 0,
                    z: 0,
                    width: data.len() as u32,
                    height: 1,
                    depth: 1,
                };
                let src = SubresourceData {
                    data,
                    row_pitch: data.len() as u32,
                    slice_pitch: data.len() as u32,
                };
                self.driver_update(buffer.handle(), 0, Some(region), &src)?;
                self.device.stats.inc_direct_updates();
                Ok(())
            }
            Usage::Dynamic | Usage::Staging => {
                if buffer.usage() == Usage::Staging
                    && !buffer.cpu_access().contains(CpuAccess::WRITE)
                {
                    return Err(RenderError::OperationNotPermitted(
                        "readback buffers are written by the GPU, not the CPU".into(),
                    ));
                }
                // Whole-buffer dynamic writes discard; partial writes must
                // promise not to stomp in-flight bytes.
                let mode = if buffer.usage() == Usage::Staging {
                    MapMode::Write
                } else if offset == 0 && data.len() as u64 == buffer.byte_width() {
                    MapMode::WriteDiscard
                } else {
                    MapMode::WriteNoOverwrite
                };
                let handle = buffer.handle();
                self.with_ctx(|ctx| {
                    ctx.map(handle, 0, mode, &mut |mapped| {
                        let start = offset as usize;
                        mapped.data[start..start + data.len()].copy_from_slice(data);
                    })
                })?;
                self.device.stats.inc_mapped_updates();
                Ok(())
            }
        }
    }

    /// Write pitched `data` into one subresource of `texture`, optionally
    /// restricted to `region` (texels, block-aligned for compressed
    /// formats).
    pub fn update_texture(
        &self,
        texture: &Texture,
        subresource: u32,
        region: Option<Region>,
        data: &SubresourceData<'_>,
    ) -> RenderResult<()> {
        if subresource >= texture.subresource_count() {
            return Err(RenderError::InvalidArgument(format!(
                "subresource {subresource} out of range (texture has {})",
                texture.subresource_count()
            )));
        }

        match texture.usage() {
            Usage::Immutable => Err(RenderError::OperationNotPermitted(
                "immutable textures cannot be updated".into(),
            )),
            Usage::Default => {
                self.driver_update(texture.handle(), subresource, region, data)?;
                self.device.stats.inc_direct_updates();
                Ok(())
            }
            Usage::Dynamic => {
                if region.is_some() {
                    // A dynamic map discards the whole subresource; a partial
                    // write would leave the rest undefined.
                    return Err(RenderError::InvalidArgument(
                        "partial updates of dynamic textures are not supported".into(),
                    ));
                }
                self.mapped_texture_write(texture, subresource, MapMode::WriteDiscard, data)
            }
            Usage::Staging => {
                if !texture.cpu_access().contains(CpuAccess::WRITE) {
                    return Err(RenderError::OperationNotPermitted(
                        "readback textures are written by the GPU, not the CPU".into(),
                    ));
                }
                if region.is_some() {
                    return Err(RenderError::InvalidArgument(
                        "partial updates of staging textures are not supported".into(),
                    ));
                }
                self.mapped_texture_write(texture, subresource, MapMode::Write, data)
            }
        }
    }

    fn mapped_texture_write(
        &self,
        texture: &Texture,
        subresource: u32,
        mode: MapMode,
        data: &SubresourceData<'_>,
    ) -> RenderResult<()> {
        let mip = subresource % texture.mip_levels();
        let (width, height, depth) = texture.mip_extent(mip);
        let format = texture.info().format;
        let row_bytes = format.bytes_per_row(width) as usize;
        let rows = format.rows_per_slice(height);

        let handle = texture.handle();
        let mut copy_result = Ok(());
        self.with_ctx(|ctx| {
            ctx.map(handle, subresource, mode, &mut |mut mapped| {
                copy_result = copy_rows(&mut mapped, data, rows, depth, row_bytes);
            })
        })?;
        copy_result?;
        self.device.stats.inc_mapped_updates();
        Ok(())
    }

    /// GPU-side copy between identically-sized buffers. This is how data
    /// reaches a readback buffer.
    pub fn copy_buffer(&self, src: &Buffer, dst: &Buffer) -> RenderResult<()> {
        if dst.usage() == Usage::Immutable {
            return Err(RenderError::OperationNotPermitted(
                "copy into an immutable buffer".into(),
            ));
        }
        if src.byte_width() != dst.byte_width() {
            return Err(RenderError::InvalidArgument(format!(
                "copy between buffers of {} and {} bytes",
                src.byte_width(),
                dst.byte_width()
            )));
        }
        let (src, dst) = (src.handle(), dst.handle());
        self.with_ctx(|ctx| ctx.copy_resource(src, dst))
    }

    /// GPU-side copy between identically-laid-out textures.
    pub fn copy_texture(&self, src: &Texture, dst: &Texture) -> RenderResult<()> {
        if dst.usage() == Usage::Immutable {
            return Err(RenderError::OperationNotPermitted(
                "copy into an immutable texture".into(),
            ));
        }
        if src.subresource_count() != dst.subresource_count()
            || src.mip_extent(0) != dst.mip_extent(0)
        {
            return Err(RenderError::InvalidArgument(
                "copy between textures with different layouts".into(),
            ));
        }
        let (src, dst) = (src.handle(), dst.handle());
        self.with_ctx(|ctx| ctx.copy_resource(src, dst))
    }

    /// Read the contents of a readback buffer. Blocks briefly on driver
    /// synchronization; only legal on the immediate list.
    pub fn read_buffer<R>(
        &self,
        buffer: &Buffer,
        read: impl FnOnce(&[u8]) -> R,
    ) -> RenderResult<R> {
        if !self.is_immediate() {
            return Err(RenderError::OperationNotPermitted(
                "readback maps are only legal on the immediate list".into(),
            ));
        }
        if buffer.usage() != Usage::Staging || !buffer.cpu_access().contains(CpuAccess::READ) {
            return Err(RenderError::OperationNotPermitted(format!(
                "buffer is {:?}; reads need readback staging",
                buffer.usage()
            )));
        }
        let handle = buffer.handle();
        let mut result = None;
        let mut read = Some(read);
        self.with_ctx(|ctx| {
            ctx.map(handle, 0, MapMode::Read, &mut |mapped| {
                if let Some(read) = read.take() {
                    result = Some(read(mapped.data));
                }
            })
        })?;
        result.ok_or_else(|| RenderError::Io("driver completed map without data".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_rows_repacks_pitches() {
        // 2 rows of 4 bytes, source padded to 8, destination padded to 6.
        let src_bytes = [1u8, 2, 3, 4, 0, 0, 0, 0, 5, 6, 7, 8, 0, 0, 0, 0];
        let src = SubresourceData {
            data: &src_bytes,
            row_pitch: 8,
            slice_pitch: 16,
        };
        let mut dst_bytes = [0u8; 12];
        let mut dst = MappedSubresource {
            data: &mut dst_bytes,
            row_pitch: 6,
            slice_pitch: 12,
        };
        copy_rows(&mut dst, &src, 2, 1, 4).unwrap();
        assert_eq!(dst_bytes, [1, 2, 3, 4, 0, 0, 5, 6, 7, 8, 0, 0]);
    }

    #[test]
    fn copy_rows_rejects_short_source() {
        let src_bytes = [1u8, 2, 3];
        let src = SubresourceData {
            data: &src_bytes,
            row_pitch: 4,
            slice_pitch: 4,
        };
        let mut dst_bytes = [0u8; 8];
        let mut dst = MappedSubresource {
            data: &mut dst_bytes,
            row_pitch: 4,
            slice_pitch: 8,
        };
        assert!(matches!(
            copy_rows(&mut dst, &src, 1, 1, 4),
            Err(RenderError::InvalidArgument(_))
        ));
    }
}
