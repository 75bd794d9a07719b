//! Record storage on the device and its staging path back to the host.
//!
//! Record buffers are created once per role and sized up front by
//! [`device_byte_width`]; a failed size check never reaches the device.
//! Reading back always goes through a short-lived staging copy, so the
//! storage buffers themselves are never mapped.

use std::marker::PhantomData;

use bytemuck::{cast_slice, Pod};
use log::debug;
use wgpu::{Buffer, BufferDescriptor, BufferUsages};

use crate::error::{Error, Result};
use crate::GpuContext;

/// Byte size of `len` elements of `T`, checked against the 32-bit width
/// devices use for buffer and view sizes.
///
/// This runs before any device call so an oversized request never
/// reaches the driver.
pub fn device_byte_width<T: Pod>(len: usize) -> Result<u32> {
    if len == 0 {
        return Err(Error::Allocation("cannot create a buffer of zero elements".into()));
    }
    let elements = u32::try_from(len).map_err(|_| {
        Error::Allocation(format!(
            "element count {len} exceeds max u32 value {}",
            u32::MAX
        ))
    })?;
    let bytes = (elements as u64) * std::mem::size_of::<T>() as u64;
    u32::try_from(bytes).map_err(|_| {
        Error::Allocation(format!(
            "buffer size of {bytes} bytes exceeds max u32 value {}",
            u32::MAX
        ))
    })
}

/// Device buffer holding `len` values of `T`, such as one role's records.
pub struct GpuBuffer<T: Pod> {
    pub buffer: Buffer,
    pub len: usize,
    _marker: PhantomData<T>,
}

impl<T: Pod> GpuBuffer<T> {
    fn create(
        context: &GpuContext,
        label: &str,
        len: usize,
        usage: BufferUsages,
    ) -> Result<Self> {
        let size = device_byte_width::<T>(len)?;
        let limit = context.device.limits().max_storage_buffer_binding_size;
        if usage.contains(BufferUsages::STORAGE) && size > limit {
            return Err(Error::Allocation(format!(
                "{label}: {size} bytes exceeds the device storage binding limit of {limit}"
            )));
        }
        let (buffer, error) = context.capture_errors(|device| {
            device.create_buffer(&BufferDescriptor {
                label: Some(label),
                size: size as u64,
                usage,
                mapped_at_creation: false,
            })
        });
        if let Some(e) = error {
            return Err(Error::Allocation(format!("{label}: {e}")));
        }
        Ok(Self {
            buffer,
            len,
            _marker: PhantomData,
        })
    }

    /// Create a new storage buffer from a slice of data.
    ///
    /// The buffer will have usage `STORAGE | COPY_SRC | COPY_DST` so it
    /// can be bound to a compute shader and read back later.
    pub fn from_slice(context: &GpuContext, label: &str, data: &[T]) -> Result<Self> {
        let this = Self::new_storage(context, label, data.len())?;
        // Write the contents via a queue write.  This avoids requiring
        // the `MAP_WRITE` usage flag.
        context.queue.write_buffer(&this.buffer, 0, cast_slice(data));
        Ok(this)
    }

    /// Create a zero-initialised storage buffer of `len` elements with the
    /// same usages as [`Self::from_slice`].
    pub fn new_storage(context: &GpuContext, label: &str, len: usize) -> Result<Self> {
        Self::create(
            context,
            label,
            len,
            BufferUsages::STORAGE | BufferUsages::COPY_SRC | BufferUsages::COPY_DST,
        )
    }

    /// Staging target for [`read_back`](Self::read_back): copy destination,
    /// host-mappable, never bound to a kernel.
    pub fn new_download(context: &GpuContext, len: usize) -> Result<Self> {
        Self::create(
            context,
            "staging_buffer",
            len,
            BufferUsages::COPY_DST | BufferUsages::MAP_READ,
        )
    }

    pub fn byte_size(&self) -> u64 {
        self.buffer.size()
    }

    /// Copy the whole buffer into a fresh staging buffer and read it.
    ///
    /// Blocks until the GPU has finished all work touching this buffer.
    /// Elements come back in index order.
    pub fn read_back(&self, context: &GpuContext) -> Result<Vec<T>> {
        let staging = Self::new_download(context, self.len)?;
        let mut encoder = context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("read_back_encoder") });
        encoder.copy_buffer_to_buffer(&self.buffer, 0, &staging.buffer, 0, self.byte_size());
        context.queue.submit([encoder.finish()]);
        debug!("read back {} bytes", self.byte_size());
        staging.read_to_vec(context)
    }

    /// Read the contents of the buffer back to the CPU.
    ///
    /// The buffer must have the `MAP_READ` usage.  This method blocks
    /// the current thread until the GPU has finished writing to the
    /// buffer and the data is ready to be read.  After reading the data
    /// the buffer is unmapped.
    pub fn read_to_vec(&self, context: &GpuContext) -> Result<Vec<T>> {
        let slice = self.buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            // The receiver outlives the poll below.
            let _ = sender.send(result);
        });

        // Block until the mapping is ready.
        context
            .device
            .poll(wgpu::PollType::Wait)
            .map_err(|e| Error::Map(format!("device polling failed: {e}")))?;
        receiver
            .recv()
            .map_err(|_| Error::Map("map callback never ran".into()))?
            .map_err(|e| Error::Map(e.to_string()))?;

        let data = slice.get_mapped_range();
        let result: Vec<T> = cast_slice(&data).to_vec();
        // The mapped view must be released before unmapping.
        drop(data);
        self.buffer.unmap();
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;

    #[test]
    fn byte_width_of_small_buffers() {
        assert_eq!(device_byte_width::<Record>(10).unwrap(), 240);
        assert_eq!(device_byte_width::<f32>(1).unwrap(), 4);
    }

    #[test]
    fn zero_elements_is_an_allocation_error() {
        assert!(matches!(device_byte_width::<Record>(0), Err(Error::Allocation(_))));
    }

    #[test]
    fn byte_width_overflow_is_rejected() {
        let largest = u32::MAX as usize / std::mem::size_of::<Record>();
        assert!(device_byte_width::<Record>(largest).is_ok());
        assert!(matches!(
            device_byte_width::<Record>(largest + 1),
            Err(Error::Allocation(_))
        ));
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn element_count_overflow_is_rejected() {
        let err = device_byte_width::<u8>(u32::MAX as usize + 1).unwrap_err();
        assert!(err.to_string().contains("element count"));
    }
}
