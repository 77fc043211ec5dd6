//! Compiled-shader handling.
//!
//! The shader front end hands the core opaque bytecode blobs; the only
//! structure the core reads is the embedded little-endian byte-length
//! header, used to validate the blob before the bytes go to the driver.

use std::sync::Arc;

use vitric_driver::{ShaderHandle, ShaderStage};

use crate::device::{Device, DeviceShared};
use crate::error::{RenderError, RenderResult};

/// Byte length of the blob header: a little-endian `u32` payload length.
const BLOB_HEADER_LEN: usize = 4;

/// Split a shader blob into its declared payload.
pub(crate) fn blob_payload(blob: &[u8]) -> RenderResult<&[u8]> {
    if blob.len() < BLOB_HEADER_LEN {
        return Err(RenderError::Io(format!(
            "shader blob is {} bytes, too short for the length header",
            blob.len()
        )));
    }
    let declared = u32::from_le_bytes([blob[0], blob[1], blob[2], blob[3]]) as usize;
    let payload = &blob[BLOB_HEADER_LEN..];
    if declared != payload.len() {
        return Err(RenderError::Io(format!(
            "shader blob declares {declared} payload bytes but carries {}",
            payload.len()
        )));
    }
    if declared == 0 {
        return Err(RenderError::Io("shader blob has an empty payload".into()));
    }
    Ok(payload)
}

/// A stage-tagged driver shader object. Owns its handle; released on drop.
pub struct Shader {
    handle: ShaderHandle,
    stage: ShaderStage,
    device: Arc<DeviceShared>,
}

impl Shader {
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn handle(&self) -> ShaderHandle {
        self.handle
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        self.device.driver.destroy_shader(self.handle);
    }
}

impl Device {
    /// Create a shader object from a front-end blob.
    pub fn make_shader(&self, stage: ShaderStage, blob: &[u8]) -> RenderResult<Shader> {
        let shared = self.shared();
        let payload = blob_payload(blob)?;
        let handle = shared.driver.create_shader(stage, payload)?;
        Ok(Shader {
            handle,
            stage,
            device: Arc::clone(shared),
        })
    }
}

/// Wrap raw bytecode in the blob framing, for tests and in-process
/// front ends.
pub fn frame_blob(payload: &[u8]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(BLOB_HEADER_LEN + payload.len());
    blob.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    blob.extend_from_slice(payload);
    blob
}
