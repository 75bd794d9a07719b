//! A double-buffered compute loop on the GPU using
//! [wgpu](https://github.com/gfx-rs/wgpu).
//!
//! Two equally sized buffers of [`Record`]s take turns as the read source
//! and the write target of a compute kernel.  Each iteration dispatches the
//! kernel, reads the written buffer back into a host mirror and swaps the
//! roles, so the kernel always consumes the previous iteration's output.
//! The bundled kernel integrates a small spring-force particle system and
//! [`reference`] holds a CPU version of the same step for checking results.
//!
//! The API is synchronous and blocking: every iteration waits for the GPU
//! before returning.

pub mod buffer;
pub mod compute;
pub mod config;
pub mod context;
pub mod driver;
pub mod error;
pub mod observer;
pub mod pingpong;
pub mod program;
pub mod record;
pub mod reference;
pub mod views;

// Re-export the most common types at the crate root so that users can
// simply `use pingpong_compute::*;`.
pub use buffer::GpuBuffer;
pub use config::SimConfig;
pub use context::GpuContext;
pub use driver::{DriverState, IterationDriver};
pub use error::{Error, Result};
pub use observer::{NoObserver, Observer, StreamCapture};
pub use pingpong::{BufferPair, Role};
pub use program::{Program, TargetProfile};
pub use record::{Record, SimParams};
