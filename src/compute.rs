//! Helpers for recording compute dispatches.
//!
//! The grid is derived from the workgroup size the program was built
//! with, so any `@workgroup_size` covers every element.  Kernels recover
//! their linear index from a 2-D grid, so large record counts can exceed
//! the per-dimension workgroup limit.

use wgpu::{BindGroup, CommandEncoder};

use crate::program::Program;
use crate::GpuContext;

/// Invocations per workgroup of the built-in kernels in `shaders/`.
pub const WORKGROUP_SIZE: u32 = 64;

/// Calculate an (x, y) workgroup grid that covers `total_groups`
/// workgroups without exceeding the per-dimension limit.
pub fn split_workgroups(total_groups: u32, limit: u32) -> (u32, u32) {
    if total_groups <= limit {
        (total_groups, 1)
    } else {
        let x = limit;
        let y = total_groups.div_ceil(limit);
        (x, y)
    }
}

/// Number of workgroups of `workgroup_size` invocations needed for `len`
/// elements.
pub fn total_workgroups(len: u32, workgroup_size: u32) -> u32 {
    len.div_ceil(workgroup_size)
}

/// Workgroup grid covering `len` invocations on this device.
pub fn workgroup_grid(context: &GpuContext, len: u32, workgroup_size: u32) -> (u32, u32) {
    let limit = context.device.limits().max_compute_workgroups_per_dimension;
    split_workgroups(total_workgroups(len, workgroup_size), limit)
}

/// Record one compute pass dispatching `program` over `len` elements.
///
/// `bind_groups[i]` is bound at group `i`.  Bindings end with the pass, so
/// nothing stays bound for later work on the same encoder.
pub fn encode_dispatch(
    context: &GpuContext,
    encoder: &mut CommandEncoder,
    label: &str,
    program: &Program,
    bind_groups: &[&BindGroup],
    len: u32,
) {
    let (groups_x, groups_y) = workgroup_grid(context, len, program.workgroup_size);
    log::debug!(
        "{label}: dispatching {groups_x}x{groups_y} workgroups of {} for {len} elements",
        program.workgroup_size
    );
    let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
        label: Some(label),
        timestamp_writes: None,
    });
    cpass.set_pipeline(&program.pipeline);
    for (index, group) in bind_groups.iter().enumerate() {
        cpass.set_bind_group(index as u32, *group, &[]);
    }
    cpass.dispatch_workgroups(groups_x, groups_y, 1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_grids_stay_one_dimensional() {
        assert_eq!(split_workgroups(1, 65_535), (1, 1));
        assert_eq!(split_workgroups(65_535, 65_535), (65_535, 1));
    }

    #[test]
    fn large_grids_wrap_into_rows() {
        assert_eq!(split_workgroups(65_536, 65_535), (65_535, 2));
        assert_eq!(split_workgroups(200_000, 65_535), (65_535, 4));
    }

    #[test]
    fn workgroup_count_follows_the_program_size() {
        assert_eq!(total_workgroups(10, 64), 1);
        assert_eq!(total_workgroups(130, 64), 3);
        // One invocation per group needs one group per record.
        assert_eq!(total_workgroups(10, 1), 10);
        assert_eq!(total_workgroups(10, 4), 3);
    }
}
