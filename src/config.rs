//! Command-line configuration for the `pingpong` binary.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::record::SimParams;

pub const USAGE: &str = "\
usage: pingpong [options]

  --count N             number of records (default 10)
  --iterations K        number of iterations (default 10)
  --seed S              seed for the initial positions (default 42)
  --k VALUE             spring constant (default 0.01)
  --mass VALUE          record mass (default 1.0)
  --rest-length VALUE   spring rest length (default 0.2)
  --dt VALUE            time step (default 0.01)
  --kernel PATH         integration kernel; .spv is loaded, anything else compiled
  --entry NAME          integration entry point (default integrate)
  --workgroup-size N    @workgroup_size of --kernel/--capture-kernel (default 64)
  --capture             attach the capture stage
  --capture-kernel PATH capture kernel (implies --capture)
  --help                print this message

Relative kernel paths are resolved against the executable's directory.";

#[derive(Clone, Debug, PartialEq)]
pub struct SimConfig {
    pub count: usize,
    pub iterations: usize,
    pub seed: u64,
    pub params: SimParams,
    pub kernel: Option<PathBuf>,
    pub entry_point: String,
    pub workgroup_size: u32,
    pub capture: bool,
    pub capture_kernel: Option<PathBuf>,
    pub help: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            count: 10,
            iterations: 10,
            seed: 42,
            params: SimParams::default(),
            kernel: None,
            entry_point: crate::program::INTEGRATE_ENTRY.to_owned(),
            workgroup_size: crate::compute::WORKGROUP_SIZE,
            capture: false,
            capture_kernel: None,
            help: false,
        }
    }
}

fn value<I: Iterator<Item = String>>(args: &mut I, flag: &str) -> Result<String> {
    args.next()
        .ok_or_else(|| Error::Config(format!("{flag} expects a value")))
}

fn parsed<T: std::str::FromStr, I: Iterator<Item = String>>(args: &mut I, flag: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    let raw = value(args, flag)?;
    raw.parse()
        .map_err(|e| Error::Config(format!("{flag} {raw:?}: {e}")))
}

impl SimConfig {
    /// Parse flags, not including the program name.
    pub fn from_args(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut config = Self::default();
        let mut args = args.into_iter();
        while let Some(flag) = args.next() {
            match flag.as_str() {
                "--count" => config.count = parsed(&mut args, &flag)?,
                "--iterations" => config.iterations = parsed(&mut args, &flag)?,
                "--seed" => config.seed = parsed(&mut args, &flag)?,
                "--k" => config.params.k = parsed(&mut args, &flag)?,
                "--mass" => config.params.mass = parsed(&mut args, &flag)?,
                "--rest-length" => config.params.rest_length = parsed(&mut args, &flag)?,
                "--dt" => config.params.dt = parsed(&mut args, &flag)?,
                "--kernel" => config.kernel = Some(PathBuf::from(value(&mut args, &flag)?)),
                "--entry" => config.entry_point = value(&mut args, &flag)?,
                "--workgroup-size" => config.workgroup_size = parsed(&mut args, &flag)?,
                "--capture" => config.capture = true,
                "--capture-kernel" => {
                    config.capture = true;
                    config.capture_kernel = Some(PathBuf::from(value(&mut args, &flag)?));
                }
                "--help" | "-h" => config.help = true,
                other => return Err(Error::Config(format!("unknown argument {other:?}"))),
            }
        }
        if config.count == 0 {
            return Err(Error::Config("--count must be at least 1".into()));
        }
        if config.workgroup_size == 0 {
            return Err(Error::Config("--workgroup-size must be at least 1".into()));
        }
        if config.params.mass == 0.0 {
            return Err(Error::Config("--mass must be non-zero".into()));
        }
        Ok(config)
    }
}

/// Resolves `path` against `base` unless it is already absolute.
pub fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Resolves a kernel path relative to the running executable's directory.
pub fn resolve_kernel_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let exe = std::env::current_exe()
        .map_err(|e| Error::Config(format!("cannot locate the executable: {e}")))?;
    let dir = exe
        .parent()
        .ok_or_else(|| Error::Config(format!("{} has no parent directory", exe.display())))?;
    Ok(resolve_against(dir, path))
}

/// True if `path` names a precompiled SPIR-V binary.
pub fn is_spirv(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("spv"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_match_the_reference_run() {
        let config = SimConfig::from_args(Vec::new()).unwrap();
        assert_eq!(config, SimConfig::default());
        assert_eq!(config.count, 10);
        assert_eq!(config.iterations, 10);
        assert_eq!(config.params, SimParams::default());
        assert_eq!(config.workgroup_size, 64);
        assert!(!config.capture);
    }

    #[test]
    fn flags_override_defaults() {
        let config = SimConfig::from_args(args(&[
            "--count", "64", "--iterations", "3", "--seed", "9", "--dt", "0.5", "--kernel",
            "nbody.spv", "--capture-kernel", "capture.wgsl",
        ]))
        .unwrap();
        assert_eq!(config.count, 64);
        assert_eq!(config.iterations, 3);
        assert_eq!(config.seed, 9);
        assert_eq!(config.params.dt, 0.5);
        assert_eq!(config.kernel, Some(PathBuf::from("nbody.spv")));
        assert!(config.capture);
        assert_eq!(config.capture_kernel, Some(PathBuf::from("capture.wgsl")));
    }

    #[test]
    fn workgroup_size_follows_the_loaded_kernel() {
        let config =
            SimConfig::from_args(args(&["--kernel", "serial.wgsl", "--workgroup-size", "1"])).unwrap();
        assert_eq!(config.workgroup_size, 1);
        assert_eq!(config.kernel, Some(PathBuf::from("serial.wgsl")));
    }

    #[test]
    fn bad_input_is_a_config_error() {
        for bad in [
            args(&["--count"]),
            args(&["--count", "ten"]),
            args(&["--count", "0"]),
            args(&["--mass", "0"]),
            args(&["--workgroup-size", "0"]),
            args(&["--workgroup-size", "-4"]),
            args(&["--frobnicate"]),
        ] {
            assert!(matches!(SimConfig::from_args(bad), Err(Error::Config(_))));
        }
    }

    #[test]
    fn relative_paths_resolve_against_base() {
        let base = Path::new("/opt/pingpong/bin");
        assert_eq!(
            resolve_against(base, Path::new("kernels/a.spv")),
            PathBuf::from("/opt/pingpong/bin/kernels/a.spv")
        );
        assert_eq!(
            resolve_against(base, Path::new("/tmp/a.spv")),
            PathBuf::from("/tmp/a.spv")
        );
    }

    #[test]
    fn spirv_is_detected_by_extension() {
        assert!(is_spirv(Path::new("integrate.spv")));
        assert!(is_spirv(Path::new("INTEGRATE.SPV")));
        assert!(!is_spirv(Path::new("integrate.wgsl")));
        assert!(!is_spirv(Path::new("integrate")));
    }
}
