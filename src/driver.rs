//! The iteration driver.
//!
//! Every iteration walks the same four states in order:
//!
//! 1. `Idle → Dispatching`: bind the program, the read role's read-view,
//!    the write role's write-view and the params, then dispatch one
//!    invocation per record.
//! 2. `Dispatching → ReadingBack`: copy the written buffer into the host
//!    mirror, replacing it entirely.  The attached [`Observer`] then sees
//!    the written role.
//! 3. `ReadingBack → Swapped`: exchange the read and write roles.
//! 4. `Swapped → Idle`.
//!
//! The iteration count is fixed by the caller.  Any error ends the run.

use log::{debug, info};
use wgpu::util::DeviceExt;

use crate::compute::encode_dispatch;
use crate::error::{Error, Result};
use crate::observer::{NoObserver, Observer};
use crate::pingpong::BufferPair;
use crate::program::{Program, TargetProfile};
use crate::record::{Record, SimParams};
use crate::GpuContext;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Dispatching,
    ReadingBack,
    Swapped,
}

/// Owns the buffer pair, the host mirror and an optional downstream stage.
pub struct IterationDriver<'a, O: Observer = NoObserver> {
    context: &'a GpuContext,
    program: &'a Program,
    pair: BufferPair,
    // Keeps the uniform alive for as long as its view.
    _params_buffer: wgpu::Buffer,
    params_view: wgpu::BindGroup,
    points: Vec<Record>,
    state: DriverState,
    completed: usize,
    observer: O,
}

impl<'a> IterationDriver<'a, NoObserver> {
    /// Upload `initial` and prepare the loop.
    ///
    /// `program` must target [`TargetProfile::Integrate`].
    pub fn new(
        context: &'a GpuContext,
        program: &'a Program,
        initial: &[Record],
        params: SimParams,
    ) -> Result<Self> {
        if program.profile != TargetProfile::Integrate {
            return Err(Error::Load(format!(
                "driver needs an integration program, got {:?}",
                program.profile
            )));
        }
        let pair = BufferPair::create(context, initial)?;
        let ((params_buffer, params_view), error) = context.capture_errors(|device| {
            let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("sim_params"),
                contents: bytemuck::bytes_of(&params),
                usage: wgpu::BufferUsages::UNIFORM,
            });
            let view = context.views.params_view(device, &buffer);
            (buffer, view)
        });
        if let Some(e) = error {
            return Err(Error::Allocation(format!("params uniform: {e}")));
        }
        info!(
            "prepared {} records with k={} mass={} rest_length={} dt={}",
            initial.len(),
            params.k,
            params.mass,
            params.rest_length,
            params.dt
        );
        Ok(Self {
            context,
            program,
            pair,
            _params_buffer: params_buffer,
            params_view,
            points: initial.to_vec(),
            state: DriverState::Idle,
            completed: 0,
            observer: NoObserver,
        })
    }
}

impl<'a, O: Observer> IterationDriver<'a, O> {
    /// Attach a downstream stage that runs after every read-back.
    pub fn with_observer<P: Observer>(self, observer: P) -> IterationDriver<'a, P> {
        IterationDriver {
            context: self.context,
            program: self.program,
            pair: self.pair,
            _params_buffer: self._params_buffer,
            params_view: self.params_view,
            points: self.points,
            state: self.state,
            completed: self.completed,
            observer,
        }
    }

    /// The host mirror: the state after the last completed iteration, or
    /// the initial records before the first.
    pub fn points(&self) -> &[Record] {
        &self.points
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Number of completed iterations.
    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn into_observer(self) -> O {
        self.observer
    }

    fn transition(&mut self, next: DriverState) {
        debug!("iteration {}: {:?} -> {:?}", self.completed + 1, self.state, next);
        self.state = next;
    }

    fn dispatch(&mut self) {
        self.transition(DriverState::Dispatching);
        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("integrate_encoder") });
        encode_dispatch(
            self.context,
            &mut encoder,
            "integrate_pass",
            self.program,
            &[
                &self.pair.read().read_view,
                &self.pair.write().write_view,
                &self.params_view,
            ],
            self.pair.len() as u32,
        );
        self.context.queue.submit([encoder.finish()]);
    }

    fn read_back(&mut self) -> Result<()> {
        self.transition(DriverState::ReadingBack);
        let written = self.pair.write().read_back(self.context)?;
        self.points.copy_from_slice(&written);
        self.observer
            .observe(self.context, self.completed + 1, self.pair.write())
    }

    /// Run one full iteration.
    pub fn step(&mut self) -> Result<()> {
        self.dispatch();
        self.read_back()?;
        self.transition(DriverState::Swapped);
        self.pair.swap();
        self.transition(DriverState::Idle);
        self.completed += 1;
        Ok(())
    }

    /// Run exactly `iterations` steps, calling `on_iteration` with the
    /// 1-based iteration number and the host mirror after each one.
    pub fn run(
        &mut self,
        iterations: usize,
        mut on_iteration: impl FnMut(usize, &[Record]),
    ) -> Result<()> {
        for _ in 0..iterations {
            self.step()?;
            on_iteration(self.completed, &self.points);
        }
        Ok(())
    }
}
