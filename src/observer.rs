//! Downstream consumers of each iteration's output.
//!
//! An observer runs after the written buffer has been read back and before
//! the roles swap.  It only ever binds the written buffer through its
//! read-view, so it cannot feed back into the simulation.

use log::debug;

use crate::buffer::GpuBuffer;
use crate::compute::encode_dispatch;
use crate::error::{Error, Result};
use crate::pingpong::Role;
use crate::program::{Program, TargetProfile};
use crate::record::Record;
use crate::GpuContext;

pub trait Observer {
    /// Called once per iteration with the role that was just written.
    /// `iteration` is 1-based.
    fn observe(&mut self, context: &GpuContext, iteration: usize, written: &Role) -> Result<()>;
}

/// The observer used when no downstream stage is attached.
#[derive(Debug, Default)]
pub struct NoObserver;

impl Observer for NoObserver {
    fn observe(&mut self, _: &GpuContext, _: usize, _: &Role) -> Result<()> {
        Ok(())
    }
}

/// Runs a capture kernel over the written buffer and keeps its output.
///
/// The capture buffer is a third buffer, outside the ping-pong pair.
pub struct StreamCapture {
    program: Program,
    target: GpuBuffer<Record>,
    target_view: wgpu::BindGroup,
    captured: Vec<Record>,
    iterations: usize,
}

impl StreamCapture {
    /// Build a capture stage for `len` records using `program`, which must
    /// target [`TargetProfile::Capture`].
    pub fn new(context: &GpuContext, program: Program, len: usize) -> Result<Self> {
        if program.profile != TargetProfile::Capture {
            return Err(Error::Load(format!(
                "capture stage needs a capture program, got {:?}",
                program.profile
            )));
        }
        let target = GpuBuffer::new_storage(context, "capture_buffer", len)?;
        let (target_view, error) =
            context.capture_errors(|device| context.views.write_view(device, &target.buffer));
        if let Some(e) = error {
            return Err(Error::Allocation(format!("capture view creation failed: {e}")));
        }
        Ok(Self {
            program,
            target,
            target_view,
            captured: Vec::new(),
            iterations: 0,
        })
    }

    /// Output of the most recent iteration.
    pub fn captured(&self) -> &[Record] {
        &self.captured
    }

    /// Number of iterations observed so far.
    pub fn iterations(&self) -> usize {
        self.iterations
    }
}

impl Observer for StreamCapture {
    fn observe(&mut self, context: &GpuContext, iteration: usize, written: &Role) -> Result<()> {
        if written.len() != self.target.len {
            return Err(Error::Allocation(format!(
                "capture buffer holds {} records but the written buffer has {}",
                self.target.len,
                written.len()
            )));
        }
        let mut encoder = context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("capture_encoder") });
        encode_dispatch(
            context,
            &mut encoder,
            "capture_pass",
            &self.program,
            &[&written.read_view, &self.target_view],
            written.len() as u32,
        );
        context.queue.submit([encoder.finish()]);
        self.captured = self.target.read_back(context)?;
        self.iterations += 1;
        debug!("captured {} records at iteration {iteration}", self.captured.len());
        Ok(())
    }
}
