//! Read and write views over record buffers.
//!
//! A view is a single-entry bind group.  Keeping read and write access in
//! separate groups lets a dispatch combine the read-view of one buffer with
//! the write-view of another without building a bind group per pairing:
//!
//! | group | layout  | binding 0                    |
//! |-------|---------|------------------------------|
//! | 0     | `read`  | `var<storage, read>`         |
//! | 1     | `write` | `var<storage, read_write>`   |
//! | 2     | `params`| `var<uniform>` (integration) |

use std::num::NonZeroU64;

use wgpu::{BindGroup, BindGroupLayout, Buffer, Device};

use crate::record::{Record, SimParams};

fn layout(
    device: &Device,
    label: &str,
    ty: wgpu::BufferBindingType,
    min_binding_size: u64,
) -> BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty,
                has_dynamic_offset: false,
                min_binding_size: NonZeroU64::new(min_binding_size),
            },
            count: None,
        }],
    })
}

/// Bind group layouts shared by all programs and views of a device.
pub struct ViewLayouts {
    pub read: BindGroupLayout,
    pub write: BindGroupLayout,
    pub params: BindGroupLayout,
}

impl ViewLayouts {
    pub fn new(device: &Device) -> Self {
        Self {
            read: layout(
                device,
                "record_read_view_layout",
                wgpu::BufferBindingType::Storage { read_only: true },
                Record::SIZE,
            ),
            write: layout(
                device,
                "record_write_view_layout",
                wgpu::BufferBindingType::Storage { read_only: false },
                Record::SIZE,
            ),
            params: layout(
                device,
                "params_layout",
                wgpu::BufferBindingType::Uniform,
                std::mem::size_of::<SimParams>() as u64,
            ),
        }
    }

    fn bind(&self, device: &Device, label: &str, layout: &BindGroupLayout, buffer: &Buffer) -> BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        })
    }

    /// Read-only view, bound at group 0.
    pub fn read_view(&self, device: &Device, buffer: &Buffer) -> BindGroup {
        self.bind(device, "record_read_view", &self.read, buffer)
    }

    /// Read-write view, bound at group 1.
    pub fn write_view(&self, device: &Device, buffer: &Buffer) -> BindGroup {
        self.bind(device, "record_write_view", &self.write, buffer)
    }

    /// Uniform view, bound at group 2.
    pub fn params_view(&self, device: &Device, buffer: &Buffer) -> BindGroup {
        self.bind(device, "params_view", &self.params, buffer)
    }
}
