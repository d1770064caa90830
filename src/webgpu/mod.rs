//! WebGPU (wgpu) compute backend for gpuprims.
//!
//! Hosts the device/queue, the lazily-compiled compute pipelines, and the
//! buffer plumbing shared by the radix-sort pipeline, the standalone scan
//! and transpose entry points, and the reduction kernel.
//!
//! # Usage
//!
//! ```rust,no_run
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use gpuprims::webgpu::WebGpuEngine;
//!
//! let engine = WebGpuEngine::new()?;
//! println!("Using device: {}", engine.device_name());
//!
//! let keys = vec![42u32, 7, 19, 3];
//! let sorted = engine.radix_sort_u32(&keys)?;
//! assert_eq!(sorted, vec![3, 7, 19, 42]);
//! # Ok(())
//! # }
//! ```

use crate::{GpError, GpResult};

use std::sync::OnceLock;

use wgpu::util::DeviceExt;

mod sort;
mod sum;

pub use sort::WORKGROUP_SIZE;


/// Embedded WGSL kernel source: the radix-sort pipeline stage family.
const RADIX_SORT_KERNEL_SOURCE: &str = include_str!("../../kernels/radix_sort.wgsl");

/// Embedded WGSL kernel source: u32 summation.
const REDUCE_SUM_KERNEL_SOURCE: &str = include_str!("../../kernels/reduce_sum.wgsl");

/// Information about a discovered compute adapter.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// Human-readable device name.
    pub name: String,
    /// Device vendor string.
    pub vendor: String,
    /// Whether this is a discrete or integrated GPU device.
    pub is_gpu: bool,
    /// Maximum workgroup size.
    pub max_work_group_size: usize,
}

/// Probe all available adapters without creating an engine.
pub fn probe_devices() -> Vec<DeviceInfo> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    let adapters = instance.enumerate_adapters(wgpu::Backends::all());
    adapters
        .into_iter()
        .map(|adapter| {
            let info = adapter.get_info();
            let limits = adapter.limits();
            DeviceInfo {
                name: info.name.clone(),
                vendor: format!("{:?}", info.vendor),
                is_gpu: matches!(
                    info.device_type,
                    wgpu::DeviceType::DiscreteGpu | wgpu::DeviceType::IntegratedGpu
                ),
                max_work_group_size: limits.max_compute_workgroup_size_x as usize,
            }
        })
        .collect()
}

/// Return the number of available compute adapters.
pub fn device_count() -> usize {
    probe_devices().len()
}

// ---------------------------------------------------------------------------
// Lazy pipeline group structs — one per WGSL shader module.
// Pipelines are compiled on first use via OnceLock, not at engine creation.
// ---------------------------------------------------------------------------

/// Radix-sort pipelines (6 entry points in radix_sort.wgsl).
struct RadixPipelines {
    local_merge: wgpu::ComputePipeline,
    counts: wgpu::ComputePipeline,
    prefix_sum: wgpu::ComputePipeline,
    shift_right: wgpu::ComputePipeline,
    transpose: wgpu::ComputePipeline,
    scatter: wgpu::ComputePipeline,
}

/// Reduction pipeline (1 entry point in reduce_sum.wgsl).
struct ReducePipelines {
    sum: wgpu::ComputePipeline,
}

/// WebGPU compute engine.
///
/// Manages the wgpu device, queue, and lazily-compiled compute pipelines.
/// Create one engine and reuse it across calls; pipelines are compiled on
/// first use so callers that only need one kernel family don't pay for the
/// others.
pub struct WebGpuEngine {
    device: wgpu::Device,
    queue: wgpu::Queue,
    // Lazily-compiled pipeline groups (one OnceLock per WGSL shader module).
    radix: OnceLock<RadixPipelines>,
    reduce: OnceLock<ReducePipelines>,
    /// Device name for diagnostics.
    device_name: String,
    /// Maximum compute workgroup size.
    max_work_group_size: usize,
    /// Maximum workgroups per dispatch dimension (device-queried, typically 65535).
    max_workgroups_per_dim: u32,
    /// Whether the selected device is a CPU (not GPU).
    is_cpu: bool,
    /// Whether per-stage wall-clock timing is logged to stderr.
    profiling: bool,
}

impl std::fmt::Debug for WebGpuEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebGpuEngine")
            .field("device_name", &self.device_name)
            .field("max_work_group_size", &self.max_work_group_size)
            .finish_non_exhaustive()
    }
}

impl WebGpuEngine {
    /// Create a new engine, selecting the best available GPU device.
    pub fn new() -> GpResult<Self> {
        Self::create(true, false)
    }

    /// Create a new engine with explicit GPU preference. Passing `false`
    /// also accepts software (CPU) adapters, useful on headless machines.
    pub fn with_device_preference(prefer_gpu: bool) -> GpResult<Self> {
        Self::create(prefer_gpu, false)
    }

    /// Create a new engine that logs per-stage wall-clock timings to stderr.
    pub fn with_profiling(profiling: bool) -> GpResult<Self> {
        Self::create(true, profiling)
    }

    fn create(prefer_gpu: bool, profiling: bool) -> GpResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let power_pref = if prefer_gpu {
            wgpu::PowerPreference::HighPerformance
        } else {
            wgpu::PowerPreference::None
        };

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: power_pref,
            force_fallback_adapter: false,
            compatible_surface: None,
        }))
        .map_err(|_| GpError::Unsupported)?;

        let info = adapter.get_info();
        let device_name = info.name.clone();
        let is_cpu = matches!(info.device_type, wgpu::DeviceType::Cpu);

        // Reject software/CPU adapters (e.g. WARP on Windows) when a real GPU
        // was requested — they're too slow for compute workloads and can hang.
        if prefer_gpu && is_cpu {
            return Err(GpError::Unsupported);
        }

        let limits = adapter.limits();
        let max_work_group_size = limits.max_compute_workgroup_size_x as usize;
        let max_workgroups_per_dim = limits.max_compute_workgroups_per_dimension;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("gpuprims"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults(),
            memory_hints: wgpu::MemoryHints::Performance,
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            trace: wgpu::Trace::Off,
        }))
        .map_err(|_| GpError::Unsupported)?;

        Ok(WebGpuEngine {
            device,
            queue,
            radix: OnceLock::new(),
            reduce: OnceLock::new(),
            device_name,
            max_work_group_size,
            max_workgroups_per_dim,
            is_cpu,
            profiling,
        })
    }

    /// Return the name of the selected compute device.
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Return the maximum work-group size for the device.
    pub fn max_work_group_size(&self) -> usize {
        self.max_work_group_size
    }

    /// Check if the selected device is a CPU (not a GPU or accelerator).
    pub fn is_cpu_device(&self) -> bool {
        self.is_cpu
    }

    /// Whether per-stage timing is logged.
    pub fn profiling(&self) -> bool {
        self.profiling
    }

    /// Block the host until all submitted GPU work completes.
    pub(crate) fn poll_wait(&self) {
        let _ = self.device.poll(wgpu::PollType::wait_indefinitely());
    }

    // --- Buffer helpers ---

    pub(crate) fn create_buffer_init(
        &self,
        label: &str,
        data: &[u8],
        usage: wgpu::BufferUsages,
    ) -> wgpu::Buffer {
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: data,
                usage,
            })
    }

    pub(crate) fn create_buffer(
        &self,
        label: &str,
        size: u64,
        usage: wgpu::BufferUsages,
    ) -> wgpu::Buffer {
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage,
            mapped_at_creation: false,
        })
    }

    /// Uniform parameter block from a small slice of u32 values.
    pub(crate) fn uniform_params(&self, label: &str, values: &[u32]) -> wgpu::Buffer {
        self.create_buffer_init(label, bytemuck::cast_slice(values), wgpu::BufferUsages::UNIFORM)
    }

    /// Read a buffer back to the CPU.
    fn read_buffer(&self, buffer: &wgpu::Buffer, size: u64) -> GpResult<Vec<u8>> {
        let staging = self.create_buffer(
            "staging",
            size,
            wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        );

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("read_buffer"),
            });
        encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, size);
        self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.poll_wait();
        rx.recv()
            .map_err(|_| GpError::Dispatch {
                stage: "read_buffer",
            })?
            .map_err(|_| GpError::Dispatch {
                stage: "read_buffer",
            })?;

        let data = slice.get_mapped_range().to_vec();
        staging.unmap();
        Ok(data)
    }

    /// Read `len` u32 elements back from a device buffer.
    pub(crate) fn read_buffer_u32(&self, buffer: &wgpu::Buffer, len: usize) -> GpResult<Vec<u32>> {
        if len == 0 {
            return Ok(Vec::new());
        }
        let raw = self.read_buffer(buffer, (len * 4) as u64)?;
        Ok(bytemuck::cast_slice(&raw).to_vec())
    }

    // --- Dispatch helpers ---

    /// Compute 2D tiling dimensions for a given workgroup count.
    fn tile_workgroups(&self, workgroups_x: u32, stage: &'static str) -> GpResult<(u32, u32)> {
        let max = self.max_workgroups_per_dim;
        if workgroups_x <= max {
            Ok((workgroups_x.max(1), 1))
        } else {
            let wy = workgroups_x.div_ceil(max);
            if wy > max {
                return Err(GpError::Dispatch { stage });
            }
            Ok((max, wy))
        }
    }

    /// Record a compute pass into an existing command encoder (no submit).
    pub(crate) fn record_dispatch(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        pipeline: &wgpu::ComputePipeline,
        bind_group: &wgpu::BindGroup,
        workgroups_x: u32,
        stage: &'static str,
    ) -> GpResult<()> {
        let (wx, wy) = self.tile_workgroups(workgroups_x, stage)?;
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(stage),
            timestamp_writes: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.dispatch_workgroups(wx, wy, 1);
        Ok(())
    }

    /// Record and immediately submit a single compute dispatch.
    pub(crate) fn dispatch(
        &self,
        pipeline: &wgpu::ComputePipeline,
        bind_group: &wgpu::BindGroup,
        workgroups_x: u32,
        stage: &'static str,
    ) -> GpResult<()> {
        let t0 = if self.profiling {
            Some(std::time::Instant::now())
        } else {
            None
        };
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(stage) });
        self.record_dispatch(&mut encoder, pipeline, bind_group, workgroups_x, stage)?;
        self.queue.submit(Some(encoder.finish()));
        if let Some(t0) = t0 {
            self.poll_wait();
            let ms = t0.elapsed().as_secs_f64() * 1000.0;
            eprintln!("[gpuprims] {stage}: {ms:.3} ms");
        }
        Ok(())
    }

    /// Submit a single dispatch with an explicit 2D workgroup grid
    /// (used by the tiled transpose).
    pub(crate) fn dispatch_2d(
        &self,
        pipeline: &wgpu::ComputePipeline,
        bind_group: &wgpu::BindGroup,
        workgroups_x: u32,
        workgroups_y: u32,
        stage: &'static str,
    ) -> GpResult<()> {
        let max = self.max_workgroups_per_dim;
        if workgroups_x > max || workgroups_y > max {
            return Err(GpError::Dispatch { stage });
        }
        let t0 = if self.profiling {
            Some(std::time::Instant::now())
        } else {
            None
        };
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(stage) });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(stage),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            pass.dispatch_workgroups(workgroups_x.max(1), workgroups_y.max(1), 1);
        }
        self.queue.submit(Some(encoder.finish()));
        if let Some(t0) = t0 {
            self.poll_wait();
            let ms = t0.elapsed().as_secs_f64() * 1000.0;
            eprintln!("[gpuprims] {stage}: {ms:.3} ms");
        }
        Ok(())
    }

    /// Bind group over `(binding, buffer)` pairs, using the pipeline's
    /// auto-derived layout.
    pub(crate) fn bind_group(
        &self,
        pipeline: &wgpu::ComputePipeline,
        label: &str,
        buffers: &[(u32, &wgpu::Buffer)],
    ) -> wgpu::BindGroup {
        let layout = pipeline.get_bind_group_layout(0);
        let entries: Vec<wgpu::BindGroupEntry> = buffers
            .iter()
            .map(|&(binding, buffer)| wgpu::BindGroupEntry {
                binding,
                resource: buffer.as_entire_binding(),
            })
            .collect();
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &layout,
            entries: &entries,
        })
    }

    // -------------------------------------------------------------------
    // Lazy pipeline accessors — compile on first use via OnceLock.
    // -------------------------------------------------------------------

    /// Helper: create a compute pipeline for one entry point of a module.
    fn make_pipeline(
        &self,
        module: &wgpu::ShaderModule,
        label: &str,
        entry: &str,
    ) -> wgpu::ComputePipeline {
        self.device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: None,
                module,
                entry_point: Some(entry),
                compilation_options: Default::default(),
                cache: None,
            })
    }

    fn radix_pipelines(&self) -> &RadixPipelines {
        self.radix.get_or_init(|| {
            let t0 = std::time::Instant::now();
            let module = self
                .device
                .create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some("radix_sort"),
                    source: wgpu::ShaderSource::Wgsl(RADIX_SORT_KERNEL_SOURCE.into()),
                });
            let group = RadixPipelines {
                local_merge: self.make_pipeline(
                    &module,
                    "local_stable_merge_sort",
                    "local_stable_merge_sort",
                ),
                counts: self.make_pipeline(&module, "local_counts", "local_counts"),
                prefix_sum: self.make_pipeline(&module, "prefix_sum", "prefix_sum"),
                shift_right: self.make_pipeline(&module, "shift_right", "shift_right"),
                transpose: self.make_pipeline(&module, "matrix_transpose", "matrix_transpose"),
                scatter: self.make_pipeline(&module, "radix_scatter", "radix_scatter"),
            };
            if self.profiling {
                let ms = t0.elapsed().as_secs_f64() * 1000.0;
                eprintln!("[gpuprims] compile radix_sort.wgsl: {ms:.3} ms");
            }
            group
        })
    }

    fn reduce_pipelines(&self) -> &ReducePipelines {
        self.reduce.get_or_init(|| {
            let t0 = std::time::Instant::now();
            let module = self
                .device
                .create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some("reduce_sum"),
                    source: wgpu::ShaderSource::Wgsl(REDUCE_SUM_KERNEL_SOURCE.into()),
                });
            let group = ReducePipelines {
                sum: self.make_pipeline(&module, "reduce_sum", "reduce_sum"),
            };
            if self.profiling {
                let ms = t0.elapsed().as_secs_f64() * 1000.0;
                eprintln!("[gpuprims] compile reduce_sum.wgsl: {ms:.3} ms");
            }
            group
        })
    }
}

// ---------------------------------------------------------------------------
// DeviceBufferPair — double-buffered device storage with O(1) role swap
// ---------------------------------------------------------------------------

/// Two same-capacity device buffers plus an active/scratch role index.
///
/// A pipeline stage reads the active buffer and writes the scratch one, then
/// calls [`swap()`](DeviceBufferPair::swap) to toggle the roles without
/// copying any data. The non-active buffer is never read while a stage that
/// writes it is in flight: the host issues stages strictly sequentially, so
/// dispatch ordering is the synchronization point.
pub struct DeviceBufferPair {
    bufs: [wgpu::Buffer; 2],
    active: usize,
    /// Allocated capacity in u32 elements.
    capacity: usize,
}

impl DeviceBufferPair {
    /// Allocate both buffers with room for `capacity` u32 elements.
    pub fn new(engine: &WebGpuEngine, label: &str, capacity: usize) -> Self {
        let size = (capacity.max(1) * 4) as u64;
        let usage = wgpu::BufferUsages::STORAGE
            | wgpu::BufferUsages::COPY_SRC
            | wgpu::BufferUsages::COPY_DST;
        DeviceBufferPair {
            bufs: [
                engine.create_buffer(&format!("{label}_a"), size, usage),
                engine.create_buffer(&format!("{label}_b"), size, usage),
            ],
            active: 0,
            capacity,
        }
    }

    /// Toggle the active/scratch roles. O(1); never copies data.
    pub fn swap(&mut self) {
        self.active ^= 1;
    }

    /// The buffer currently holding live data.
    pub fn active(&self) -> &wgpu::Buffer {
        &self.bufs[self.active]
    }

    /// The buffer currently acting as scratch output.
    pub fn scratch(&self) -> &wgpu::Buffer {
        &self.bufs[self.active ^ 1]
    }

    /// Allocated capacity in u32 elements.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Transfer host data into the active buffer.
    pub fn write(&self, engine: &WebGpuEngine, data: &[u32]) -> GpResult<()> {
        if data.len() > self.capacity {
            return Err(GpError::BufferTooSmall {
                requested: data.len(),
                capacity: self.capacity,
            });
        }
        engine
            .queue
            .write_buffer(self.active(), 0, bytemuck::cast_slice(data));
        Ok(())
    }

    /// Transfer `len` elements of the active buffer back to host memory.
    pub fn read(&self, engine: &WebGpuEngine, len: usize) -> GpResult<Vec<u32>> {
        if len > self.capacity {
            return Err(GpError::BufferTooSmall {
                requested: len,
                capacity: self.capacity,
            });
        }
        engine.read_buffer_u32(self.active(), len)
    }
}
