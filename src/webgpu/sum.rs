//! GPU summation of a u32 buffer.

use super::{WebGpuEngine, WORKGROUP_SIZE};
use crate::GpResult;

impl WebGpuEngine {
    /// Sum a u32 buffer on the GPU. Arithmetic wraps, matching a
    /// `wrapping_add` fold on the host.
    pub fn sum_u32(&self, values: &[u32]) -> GpResult<u32> {
        if values.is_empty() {
            return Ok(0);
        }
        let pipelines = self.reduce_pipelines();

        let src = self.create_buffer_init(
            "sum_src",
            bytemuck::cast_slice(values),
            wgpu::BufferUsages::STORAGE,
        );
        let total = self.create_buffer_init(
            "sum_total",
            bytemuck::cast_slice(&[0u32]),
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        );
        let params =
            self.uniform_params("sum_params", &[values.len() as u32, 0, 0, 0]);

        let bg = self.bind_group(
            &pipelines.sum,
            "reduce_sum_bg",
            &[(0, &src), (1, &total), (2, &params)],
        );
        let workgroups = (values.len() as u32).div_ceil(WORKGROUP_SIZE);
        self.dispatch(&pipelines.sum, &bg, workgroups, "reduce_sum")?;

        Ok(self.read_buffer_u32(&total, 1)?[0])
    }
}
