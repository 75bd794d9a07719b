//! The buffer pair at the heart of the loop.
//!
//! Each buffer travels together with its read-view and write-view as a
//! [`Role`].  Swapping exchanges whole roles, so a buffer can never end up
//! paired with another buffer's views.

use log::debug;
use wgpu::BindGroup;

use crate::buffer::GpuBuffer;
use crate::error::{Error, Result};
use crate::record::Record;
use crate::GpuContext;

/// A record buffer and both of its views.
pub struct Role {
    pub buffer: GpuBuffer<Record>,
    pub read_view: BindGroup,
    pub write_view: BindGroup,
}

impl Role {
    fn new(context: &GpuContext, buffer: GpuBuffer<Record>) -> Result<Self> {
        let ((read_view, write_view), error) = context.capture_errors(|device| {
            (
                context.views.read_view(device, &buffer.buffer),
                context.views.write_view(device, &buffer.buffer),
            )
        });
        if let Some(e) = error {
            return Err(Error::Allocation(format!("view creation failed: {e}")));
        }
        Ok(Self {
            buffer,
            read_view,
            write_view,
        })
    }

    pub fn len(&self) -> usize {
        self.buffer.len
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.len == 0
    }

    /// Synchronously copy this role's buffer into host memory.
    pub fn read_back(&self, context: &GpuContext) -> Result<Vec<Record>> {
        self.buffer.read_back(context)
    }
}

/// Two equally sized record buffers, one designated read and one write.
pub struct BufferPair {
    read: Role,
    write: Role,
}

impl BufferPair {
    /// Allocate both buffers.  The read buffer starts with `initial`; the
    /// write buffer starts zeroed and is fully overwritten by the first
    /// dispatch before anything reads it.
    pub fn create(context: &GpuContext, initial: &[Record]) -> Result<Self> {
        let a = GpuBuffer::from_slice(context, "points_a", initial)?;
        let b = GpuBuffer::new_storage(context, "points_b", initial.len())?;
        debug!(
            "created buffer pair of {} records ({} bytes each)",
            initial.len(),
            a.byte_size()
        );
        Ok(Self {
            read: Role::new(context, a)?,
            write: Role::new(context, b)?,
        })
    }

    pub fn len(&self) -> usize {
        self.read.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read.is_empty()
    }

    /// The role holding the current state.
    pub fn read(&self) -> &Role {
        &self.read
    }

    /// The role the next dispatch writes into.
    pub fn write(&self) -> &Role {
        &self.write
    }

    /// Exchange the read and write roles.
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.read, &mut self.write);
    }
}
