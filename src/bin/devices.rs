//! List the compute devices visible to the engine.

use gpuprims::webgpu;

fn main() {
    let devices = webgpu::probe_devices();
    if devices.is_empty() {
        println!("no compute devices found");
        return;
    }
    for (i, info) in devices.iter().enumerate() {
        println!(
            "[{}] {} (vendor {}, max workgroup {}){}",
            i,
            info.name,
            info.vendor,
            info.max_work_group_size,
            if info.is_gpu { "" } else { " [software]" }
        );
    }
}
