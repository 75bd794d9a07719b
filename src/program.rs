//! Program objects: compiled compute pipelines.
//!
//! A [`Program`] is created once, from precompiled SPIR-V
//! ([`Program::load`]), WGSL source on disk ([`Program::compile`]) or
//! WGSL embedded in the binary ([`Program::from_wgsl`]), and is immutable
//! afterwards.  Device-side rejections are captured with error scopes and
//! turned into [`Error::Compile`] or [`Error::Load`].
//!
//! The caller states the kernel's `@workgroup_size` (x dimension) when
//! building a program; dispatches size their grid from it.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use wgpu::{ComputePipeline, ShaderModule};

use crate::compute::WORKGROUP_SIZE;
use crate::error::{Error, Result};
use crate::GpuContext;

/// Built-in integration kernel.
pub const INTEGRATE_WGSL: &str = include_str!("../shaders/integrate.wgsl");
/// Built-in capture kernel.
pub const CAPTURE_WGSL: &str = include_str!("../shaders/capture.wgsl");

pub const INTEGRATE_ENTRY: &str = "integrate";
pub const CAPTURE_ENTRY: &str = "capture";

const SPIRV_MAGIC: u32 = 0x0723_0203;

/// The binding interface an entry point is compiled against.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TargetProfile {
    /// Read-view at group 0, write-view at group 1, params at group 2.
    Integrate,
    /// Read-view at group 0, capture write-view at group 1.
    Capture,
}

/// An immutable compute pipeline plus what it was built from.
#[derive(Debug)]
pub struct Program {
    pub pipeline: ComputePipeline,
    pub profile: TargetProfile,
    pub entry_point: String,
    /// Invocations per workgroup declared by the entry point.
    pub workgroup_size: u32,
}

/// Reads a kernel file, failing with [`Error::NotFound`] before any
/// device work if it is missing.
pub fn read_kernel_file(path: &Path) -> Result<Vec<u8>> {
    if !path.exists() {
        return Err(Error::NotFound {
            path: path.to_path_buf(),
        });
    }
    fs::read(path).map_err(|e| Error::Load(format!("failed to read {}: {e}", path.display())))
}

/// Reinterprets a SPIR-V binary as little-endian words.
pub fn spirv_words(bytes: &[u8]) -> Result<Vec<u32>> {
    if bytes.is_empty() || bytes.len() % 4 != 0 {
        return Err(Error::Load(format!(
            "SPIR-V binary length {} is not a non-zero multiple of 4",
            bytes.len()
        )));
    }
    let words: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();
    if words[0] != SPIRV_MAGIC {
        return Err(Error::Load(format!(
            "bad SPIR-V magic number {:#010x}",
            words[0]
        )));
    }
    Ok(words)
}

/// Checks a declared workgroup size against the device limit.
pub fn check_workgroup_size(workgroup_size: u32, limit: u32) -> Result<u32> {
    if workgroup_size == 0 || workgroup_size > limit {
        return Err(Error::Load(format!(
            "workgroup size {workgroup_size} is outside 1..={limit}"
        )));
    }
    Ok(workgroup_size)
}

impl Program {
    /// Load a precompiled SPIR-V kernel from `path` whose entry point
    /// declares `@workgroup_size(workgroup_size)`.
    pub fn load(
        context: &GpuContext,
        path: impl AsRef<Path>,
        entry_point: &str,
        profile: TargetProfile,
        workgroup_size: u32,
    ) -> Result<Self> {
        let path = path.as_ref();
        info!("loading kernel {}", path.display());
        let words = spirv_words(&read_kernel_file(path)?)?;
        let label = path.display().to_string();
        let (module, error) = context.capture_errors(|device| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&label),
                source: wgpu::ShaderSource::SpirV(Cow::Owned(words)),
            })
        });
        if let Some(e) = error {
            return Err(Error::Load(format!("{label}: {e}")));
        }
        Self::link(context, &label, &module, entry_point, profile, workgroup_size)
    }

    /// Compile WGSL source from `source_path`.
    pub fn compile(
        context: &GpuContext,
        source_path: impl AsRef<Path>,
        entry_point: &str,
        profile: TargetProfile,
        workgroup_size: u32,
    ) -> Result<Self> {
        let path = source_path.as_ref();
        info!("compiling kernel {}", path.display());
        let bytes = read_kernel_file(path)?;
        let source = String::from_utf8(bytes).map_err(|e| Error::Compile {
            path: path.to_path_buf(),
            diagnostic: format!("source is not valid UTF-8: {e}"),
        })?;
        Self::build_wgsl(context, path.to_path_buf(), &source, entry_point, profile, workgroup_size)
    }

    /// Compile WGSL held in memory, such as [`INTEGRATE_WGSL`].
    pub fn from_wgsl(
        context: &GpuContext,
        label: &str,
        source: &str,
        entry_point: &str,
        profile: TargetProfile,
        workgroup_size: u32,
    ) -> Result<Self> {
        info!("compiling built-in kernel {label}");
        Self::build_wgsl(context, PathBuf::from(label), source, entry_point, profile, workgroup_size)
    }

    /// The built-in integration kernel.
    pub fn integrate(context: &GpuContext) -> Result<Self> {
        Self::from_wgsl(
            context,
            "integrate.wgsl",
            INTEGRATE_WGSL,
            INTEGRATE_ENTRY,
            TargetProfile::Integrate,
            WORKGROUP_SIZE,
        )
    }

    /// The built-in capture kernel.
    pub fn capture(context: &GpuContext) -> Result<Self> {
        Self::from_wgsl(
            context,
            "capture.wgsl",
            CAPTURE_WGSL,
            CAPTURE_ENTRY,
            TargetProfile::Capture,
            WORKGROUP_SIZE,
        )
    }

    fn build_wgsl(
        context: &GpuContext,
        path: PathBuf,
        source: &str,
        entry_point: &str,
        profile: TargetProfile,
        workgroup_size: u32,
    ) -> Result<Self> {
        let label = path.display().to_string();
        let (module, error) = context.capture_errors(|device| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&label),
                source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(source)),
            })
        });
        if let Some(e) = error {
            return Err(Error::Compile {
                path,
                diagnostic: e.to_string(),
            });
        }
        Self::link(context, &label, &module, entry_point, profile, workgroup_size)
    }

    fn link(
        context: &GpuContext,
        label: &str,
        module: &ShaderModule,
        entry_point: &str,
        profile: TargetProfile,
        workgroup_size: u32,
    ) -> Result<Self> {
        let workgroup_size = check_workgroup_size(
            workgroup_size,
            context.device.limits().max_compute_workgroup_size_x,
        )?;
        let views = &context.views;
        let all_groups = [&views.read, &views.write, &views.params];
        let layouts: &[&wgpu::BindGroupLayout] = match profile {
            TargetProfile::Integrate => &all_groups,
            TargetProfile::Capture => &all_groups[..2],
        };
        let (pipeline, error) = context.capture_errors(|device| {
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: layouts,
                push_constant_ranges: &[],
            });
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                module,
                entry_point: Some(entry_point),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            })
        });
        if let Some(e) = error {
            return Err(Error::Load(format!("{label} ({entry_point}): {e}")));
        }
        Ok(Self {
            pipeline,
            profile,
            entry_point: entry_point.to_owned(),
            workgroup_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_not_found() {
        let path = Path::new("definitely/not/here/integrate.spv");
        match read_kernel_file(path) {
            Err(Error::NotFound { path: p }) => assert_eq!(p, path),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn spirv_length_must_be_word_aligned() {
        assert!(matches!(spirv_words(&[]), Err(Error::Load(_))));
        assert!(matches!(spirv_words(&[0x03, 0x02, 0x23]), Err(Error::Load(_))));
    }

    #[test]
    fn spirv_magic_is_checked() {
        assert!(matches!(spirv_words(&[0, 0, 0, 0]), Err(Error::Load(_))));
        let words = spirv_words(&[0x03, 0x02, 0x23, 0x07, 0x00, 0x00, 0x01, 0x00]).unwrap();
        assert_eq!(words, vec![SPIRV_MAGIC, 0x0001_0000]);
    }

    #[test]
    fn workgroup_size_must_fit_the_device() {
        assert!(matches!(check_workgroup_size(0, 256), Err(Error::Load(_))));
        assert!(matches!(check_workgroup_size(257, 256), Err(Error::Load(_))));
        assert_eq!(check_workgroup_size(1, 256).unwrap(), 1);
        assert_eq!(check_workgroup_size(256, 256).unwrap(), 256);
    }

    #[test]
    fn built_in_kernels_declare_the_default_workgroup_size() {
        let attribute = format!("@workgroup_size({WORKGROUP_SIZE})");
        assert!(INTEGRATE_WGSL.contains(&attribute));
        assert!(CAPTURE_WGSL.contains(&attribute));
    }

    #[test]
    fn built_in_kernels_name_their_entry_points() {
        assert!(INTEGRATE_WGSL.contains(&format!("fn {INTEGRATE_ENTRY}(")));
        assert!(CAPTURE_WGSL.contains(&format!("fn {CAPTURE_ENTRY}(")));
    }
}
