//! GPU radix-sort pipeline controller, plus the standalone scan and
//! transpose entry points it is built from.
//!
//! One pass over a digit runs, strictly in order:
//! reset counters → local stable sort (log2(W) merge steps) → histogram →
//! local prefix scan + shift → transpose → global prefix scan + shift →
//! scatter → key-buffer swap. Exactly `32 / digit_bits` passes execute;
//! there is no early termination and no retry — any stage failure aborts
//! the whole run. Cross-partition ordering is guaranteed only by
//! dispatch-to-dispatch ordering on the queue.

use super::{DeviceBufferPair, WebGpuEngine};
use crate::radix::RadixConfig;
use crate::{GpError, GpResult};

/// Partition width W, compiled into the kernels' `@workgroup_size`.
/// Must match WORKGROUP_SIZE in kernels/radix_sort.wgsl.
pub const WORKGROUP_SIZE: u32 = 128;

impl WebGpuEngine {
    /// Sort unsigned 32-bit keys on the GPU under the default configuration
    /// (4-bit digits, 8 passes).
    pub fn radix_sort_u32(&self, keys: &[u32]) -> GpResult<Vec<u32>> {
        self.radix_sort_u32_with(keys, &RadixConfig::default())
    }

    /// Sort unsigned 32-bit keys on the GPU.
    ///
    /// The configured partition size must equal the compiled workgroup
    /// width ([`WORKGROUP_SIZE`]); the digit width is honored as configured.
    pub fn radix_sort_u32_with(&self, keys: &[u32], config: &RadixConfig) -> GpResult<Vec<u32>> {
        config.validate()?;
        if config.partition_size != WORKGROUP_SIZE as usize {
            return Err(GpError::InvalidConfig(
                "GPU path requires the compiled partition size",
            ));
        }
        let n = keys.len();
        if n == 0 {
            return Ok(Vec::new());
        }
        if n > u32::MAX as usize {
            return Err(GpError::InvalidConfig("input exceeds u32 indexing"));
        }
        let n32 = n as u32;

        let groups = n32.div_ceil(WORKGROUP_SIZE);
        let digit_count = config.digit_count();
        let matrix_len = (groups * digit_count) as usize;

        // Key pair persists for the whole sort; the matrices are cleared
        // once per pass.
        let mut keys_pair = DeviceBufferPair::new(self, "radix_keys", n);
        keys_pair.write(self, keys)?;

        let counts = self.create_buffer(
            "radix_counts",
            (matrix_len * 4) as u64,
            wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
        );
        let mut local_scan = DeviceBufferPair::new(self, "radix_local_scan", matrix_len);
        let mut global_scan = DeviceBufferPair::new(self, "radix_global_scan", matrix_len);

        let pipelines = self.radix_pipelines();
        let key_workgroups = n32.div_ceil(WORKGROUP_SIZE);

        for pass in 0..config.pass_count() {
            let mask = config.mask_for(pass);
            let shift = config.shift_for(pass);

            // ResetCounters: clear the per-pass matrices.
            let mut encoder =
                self.device
                    .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                        label: Some("radix_reset"),
                    });
            encoder.clear_buffer(&counts, 0, None);
            encoder.clear_buffer(local_scan.active(), 0, None);
            encoder.clear_buffer(local_scan.scratch(), 0, None);
            encoder.clear_buffer(global_scan.active(), 0, None);
            encoder.clear_buffer(global_scan.scratch(), 0, None);
            self.queue.submit(Some(encoder.finish()));

            // LocalSort: stable merge network over doubling half-widths.
            let mut m = 1u32;
            while m < WORKGROUP_SIZE {
                let params =
                    self.uniform_params("local_merge_params", &[n32, mask, shift, m, 0, 0, 0, 0]);
                let bg = self.bind_group(
                    &pipelines.local_merge,
                    "local_merge_bg",
                    &[
                        (0, keys_pair.active()),
                        (1, keys_pair.scratch()),
                        (4, &params),
                    ],
                );
                self.dispatch(
                    &pipelines.local_merge,
                    &bg,
                    key_workgroups,
                    "local_stable_merge_sort",
                )?;
                keys_pair.swap();
                m *= 2;
            }

            // Histogram: one workgroup per partition fills its counting row.
            {
                let params = self.uniform_params(
                    "local_counts_params",
                    &[n32, mask, shift, 0, groups, digit_count, 0, 0],
                );
                let bg = self.bind_group(
                    &pipelines.counts,
                    "local_counts_bg",
                    &[(0, keys_pair.active()), (1, &counts), (4, &params)],
                );
                self.dispatch(&pipelines.counts, &bg, groups, "local_counts")?;
            }

            // LocalPrefix: exclusive scan over the flat G x D matrix.
            {
                let mut encoder =
                    self.device
                        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                            label: Some("radix_copy_counts"),
                        });
                encoder.copy_buffer_to_buffer(
                    &counts,
                    0,
                    local_scan.active(),
                    0,
                    (matrix_len * 4) as u64,
                );
                self.queue.submit(Some(encoder.finish()));
            }
            self.scan_doubling_passes(&mut local_scan, matrix_len as u32)?;
            self.shift_right_pass(&mut local_scan, matrix_len as u32)?;

            // Transpose the counting matrix to D x G for the global scan.
            {
                let params = self.uniform_params(
                    "transpose_params",
                    &[0, 0, 0, 0, 0, 0, groups, digit_count],
                );
                let bg = self.bind_group(
                    &pipelines.transpose,
                    "transpose_bg",
                    &[(0, &counts), (1, global_scan.active()), (4, &params)],
                );
                self.dispatch_2d(
                    &pipelines.transpose,
                    &bg,
                    digit_count.div_ceil(16),
                    groups.div_ceil(16),
                    "matrix_transpose",
                )?;
            }

            // GlobalPrefix: exclusive scan over the flat D x G matrix.
            self.scan_doubling_passes(&mut global_scan, matrix_len as u32)?;
            self.shift_right_pass(&mut global_scan, matrix_len as u32)?;

            // Scatter to final positions for this pass, then swap roles.
            {
                let params = self.uniform_params(
                    "radix_scatter_params",
                    &[n32, mask, shift, 0, groups, digit_count, 0, 0],
                );
                let bg = self.bind_group(
                    &pipelines.scatter,
                    "radix_scatter_bg",
                    &[
                        (0, keys_pair.active()),
                        (1, keys_pair.scratch()),
                        (2, local_scan.active()),
                        (3, global_scan.active()),
                        (4, &params),
                    ],
                );
                self.dispatch(&pipelines.scatter, &bg, key_workgroups, "radix_scatter")?;
                keys_pair.swap();
            }
        }

        keys_pair.read(self, n)
    }

    /// Inclusive prefix sum over a u32 buffer using the doubling engine.
    pub fn inclusive_scan_u32(&self, values: &[u32]) -> GpResult<Vec<u32>> {
        if values.is_empty() {
            return Ok(Vec::new());
        }
        let mut pair = DeviceBufferPair::new(self, "scan", values.len());
        pair.write(self, values)?;
        self.scan_doubling_passes(&mut pair, values.len() as u32)?;
        pair.read(self, values.len())
    }

    /// Exclusive prefix sum: the inclusive scan followed by one
    /// shift-right step.
    pub fn exclusive_scan_u32(&self, values: &[u32]) -> GpResult<Vec<u32>> {
        if values.is_empty() {
            return Ok(Vec::new());
        }
        let mut pair = DeviceBufferPair::new(self, "scan", values.len());
        pair.write(self, values)?;
        self.scan_doubling_passes(&mut pair, values.len() as u32)?;
        self.shift_right_pass(&mut pair, values.len() as u32)?;
        pair.read(self, values.len())
    }

    /// Transpose a row-major (rows x cols) u32 matrix on the GPU.
    pub fn transpose_u32(&self, values: &[u32], rows: usize, cols: usize) -> GpResult<Vec<u32>> {
        if values.len() != rows * cols {
            return Err(GpError::InvalidConfig("shape does not cover the buffer"));
        }
        if values.is_empty() {
            return Ok(Vec::new());
        }
        let pipelines = self.radix_pipelines();
        let src = self.create_buffer_init(
            "transpose_src",
            bytemuck::cast_slice(values),
            wgpu::BufferUsages::STORAGE,
        );
        let dst = self.create_buffer(
            "transpose_dst",
            (values.len() * 4) as u64,
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        );
        let params = self.uniform_params(
            "transpose_params",
            &[0, 0, 0, 0, 0, 0, rows as u32, cols as u32],
        );
        let bg = self.bind_group(
            &pipelines.transpose,
            "transpose_bg",
            &[(0, &src), (1, &dst), (4, &params)],
        );
        self.dispatch_2d(
            &pipelines.transpose,
            &bg,
            (cols as u32).div_ceil(16),
            (rows as u32).div_ceil(16),
            "matrix_transpose",
        )?;
        self.read_buffer_u32(&dst, values.len())
    }

    /// Run the doubling steps s = 1, 2, 4, ... while s < len, ping-ponging
    /// the pair. Leaves the inclusive scan in the active buffer.
    fn scan_doubling_passes(&self, pair: &mut DeviceBufferPair, len: u32) -> GpResult<()> {
        let pipelines = self.radix_pipelines();
        let workgroups = len.div_ceil(WORKGROUP_SIZE);
        let mut offset = 1u32;
        while offset < len {
            let params =
                self.uniform_params("prefix_sum_params", &[len, 0, 0, offset, 0, 0, 0, 0]);
            let bg = self.bind_group(
                &pipelines.prefix_sum,
                "prefix_sum_bg",
                &[(0, pair.active()), (1, pair.scratch()), (4, &params)],
            );
            self.dispatch(&pipelines.prefix_sum, &bg, workgroups, "prefix_sum")?;
            pair.swap();
            offset *= 2;
        }
        Ok(())
    }

    /// Convert the inclusive scan in the active buffer to an exclusive one.
    fn shift_right_pass(&self, pair: &mut DeviceBufferPair, len: u32) -> GpResult<()> {
        let pipelines = self.radix_pipelines();
        let workgroups = len.div_ceil(WORKGROUP_SIZE);
        let params = self.uniform_params("shift_right_params", &[len, 0, 0, 0, 0, 0, 0, 0]);
        let bg = self.bind_group(
            &pipelines.shift_right,
            "shift_right_bg",
            &[(0, pair.active()), (1, pair.scratch()), (4, &params)],
        );
        self.dispatch(&pipelines.shift_right, &bg, workgroups, "shift_right")?;
        pair.swap();
        Ok(())
    }
}
