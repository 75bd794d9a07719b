//! Host/device shared data layouts.
//!
//! [`Record`] is the element type of both ping-pong buffers and
//! [`SimParams`] is the uniform block read by the integration kernel.
//! Their byte layouts must match the WGSL declarations in `shaders/`
//! exactly, so size and field offsets are pinned at compile time.

use std::fmt;

use bytemuck::{Pod, Zeroable};

/// One simulated point: position followed by velocity.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Record {
    pub position: [f32; 3],
    pub velocity: [f32; 3],
}

const _: () = assert!(
    std::mem::size_of::<Record>() == 24,
    "size of Record does not match WGSL"
);
const _: () = assert!(
    std::mem::offset_of!(Record, position) == 0,
    "offset of Record.position does not match WGSL"
);
const _: () = assert!(
    std::mem::offset_of!(Record, velocity) == 12,
    "offset of Record.velocity does not match WGSL"
);

impl Record {
    /// Size of one record in device memory.
    pub const SIZE: u64 = std::mem::size_of::<Record>() as u64;

    pub fn at_rest(position: [f32; 3]) -> Self {
        Self {
            position,
            velocity: [0.0; 3],
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [px, py, pz] = self.position;
        let [vx, vy, vz] = self.velocity;
        write!(
            f,
            "Position: ({px:.4}, {py:.4}, {pz:.4}); Velocity: ({vx:.4}, {vy:.4}, {vz:.4})"
        )
    }
}

/// Constants of the force law and integrator.
///
/// The force between two records is `k * (|d| - rest_length)` along the
/// unit vector `d / |d|`, where `d` points from the record being updated
/// towards the other one.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct SimParams {
    pub k: f32,
    pub mass: f32,
    pub rest_length: f32,
    pub dt: f32,
}

const _: () = assert!(
    std::mem::size_of::<SimParams>() == 16,
    "size of SimParams does not match WGSL"
);

impl Default for SimParams {
    fn default() -> Self {
        Self {
            k: 0.01,
            mass: 1.0,
            rest_length: 0.2,
            dt: 0.01,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_bytes_are_two_packed_vectors() {
        let r = Record {
            position: [1.0, 2.0, 3.0],
            velocity: [4.0, 5.0, 6.0],
        };
        let floats: &[f32] = bytemuck::cast_slice(bytemuck::bytes_of(&r));
        assert_eq!(floats, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn display_uses_four_decimals() {
        let r = Record {
            position: [0.5, 0.25, 1.0],
            velocity: [0.0, -0.125, 0.0],
        };
        assert_eq!(
            r.to_string(),
            "Position: (0.5000, 0.2500, 1.0000); Velocity: (0.0000, -0.1250, 0.0000)"
        );
    }
}
