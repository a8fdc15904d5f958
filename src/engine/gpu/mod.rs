//! wgpu-accelerated execution path for the bundled engine.

pub mod gpu_accelerator;
pub mod shaders;

pub use gpu_accelerator::{AcceleratorOptions, GpuAccelerator, enumerate_adapters};
