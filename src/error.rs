//! Error taxonomy for the compute loop.
//!
//! Every failure is fatal to a run: nothing in the crate retries or
//! degrades.  Errors bubble up with `?` to the caller, which for the
//! `pingpong` binary means a message on stderr and exit status 1.

use std::path::PathBuf;

/// All errors raised while setting up or driving the loop.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A kernel file does not exist.
    #[error("kernel file not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// Kernel source failed to compile; `diagnostic` is the compiler output.
    #[error("failed to compile {}:\n{diagnostic}", path.display())]
    Compile { path: PathBuf, diagnostic: String },

    /// The device rejected a kernel or the pipeline built from it.
    #[error("failed to load kernel: {0}")]
    Load(String),

    /// Buffer or view creation failed, including capacity overflow.
    #[error("allocation failed: {0}")]
    Allocation(String),

    /// A staging buffer could not be mapped for reading.
    #[error("read-back failed: {0}")]
    Map(String),

    /// The logical device could not be created.
    #[error("device initialisation failed: {0}")]
    DeviceInit(String),

    /// Physical adapters could not be enumerated at all.
    #[error("adapter enumeration failed: {0}")]
    AdapterEnumeration(String),

    /// Bad command-line input.
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_error_carries_diagnostic() {
        let err = Error::Compile {
            path: PathBuf::from("kernel.wgsl"),
            diagnostic: "expected ';'".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("kernel.wgsl"));
        assert!(msg.contains("expected ';'"));
    }
}
