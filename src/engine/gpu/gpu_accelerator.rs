//! wgpu-backed execution of a dense layer stack.

use crate::activation::Activation;
use crate::engine::gpu::shaders::{DENSE_WORKGROUP_SIZE, get_dense_layer_wgsl};
use crate::engine::native_network::DenseLayer;
use crate::errors::{EngineError, EngineResult};
use log::{debug, info};
use pollster::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use wgpu::util::DeviceExt;

/// How the accelerator picks its adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceleratorOptions {
    /// Backend hint: `vulkan`, `metal`, `dx12`, `gl` or `primary`. `None` allows all.
    pub backend: Option<String>,
    /// Prefer a low-power adapter instead of the high-performance one.
    #[serde(default)]
    pub low_power: bool,
    /// Ask for the software fallback adapter.
    #[serde(default)]
    pub force_fallback_adapter: bool,
}

impl AcceleratorOptions {
    /// Backend set the instance is restricted to.
    pub fn backends(&self) -> wgpu::Backends {
        match self.backend.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("vulkan") => wgpu::Backends::VULKAN,
            Some("metal") => wgpu::Backends::METAL,
            Some("dx12") => wgpu::Backends::DX12,
            Some("gl") | Some("opengl") => wgpu::Backends::GL,
            Some("primary") => wgpu::Backends::PRIMARY,
            _ => wgpu::Backends::all(),
        }
    }

    fn power_preference(&self) -> wgpu::PowerPreference {
        if self.low_power {
            wgpu::PowerPreference::LowPower
        } else {
            wgpu::PowerPreference::HighPerformance
        }
    }

    fn instance(&self) -> wgpu::Instance {
        wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: self.backends(),
            ..Default::default()
        })
    }
}

/// Describe every adapter visible under `options`.
pub fn enumerate_adapters(options: &AcceleratorOptions) -> Vec<Value> {
    options
        .instance()
        .enumerate_adapters(options.backends())
        .iter()
        .map(|adapter| describe_adapter(&adapter.get_info()))
        .collect()
}

fn describe_adapter(info: &wgpu::AdapterInfo) -> Value {
    json!({
        "adapter": info.name,
        "backend": format!("{:?}", info.backend),
        "device_type": format!("{:?}", info.device_type),
        "driver": info.driver,
    })
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct LayerParams {
    input_size: u32,
    output_size: u32,
    activation: u32,
    _padding: u32,
}

impl LayerParams {
    fn for_layer(index: usize, layer: &DenseLayer) -> EngineResult<Self> {
        let dim = |size: usize, what: &str| {
            u32::try_from(size).map_err(|_| EngineError::AcceleratorInit {
                message: format!("layer {index} {what} size {size} exceeds the shader limit"),
            })
        };
        Ok(Self {
            input_size: dim(layer.input_size, "input")?,
            output_size: dim(layer.output_size, "output")?,
            activation: layer.activation.shader_id(),
            _padding: 0,
        })
    }
}

struct GpuDenseLayer {
    weights: wgpu::Buffer,
    bias: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    workgroups: u32,
}

/// Device-resident copy of a dense network.
///
/// Activations live in one storage buffer per layer; layer `i` reads buffer
/// `i` and writes buffer `i + 1`. The last buffer is copied to a staging
/// buffer for readback.
pub struct GpuAccelerator {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    layers: Vec<GpuDenseLayer>,
    activation_buffers: Vec<wgpu::Buffer>,
    staging_buffer: wgpu::Buffer,
    input_size: usize,
    output_size: usize,
    adapter_info: wgpu::AdapterInfo,
}

impl std::fmt::Debug for GpuAccelerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuAccelerator")
            .field("adapter", &self.adapter_info.name)
            .field("backend", &self.adapter_info.backend)
            .field("layers", &self.layers.len())
            .field("input_size", &self.input_size)
            .field("output_size", &self.output_size)
            .finish()
    }
}

impl GpuAccelerator {
    /// Bring up a device and upload `layers`.
    ///
    /// Returns `Ok(None)` when no compute-capable adapter exists.
    pub fn new(options: &AcceleratorOptions, layers: &[DenseLayer]) -> EngineResult<Option<Self>> {
        Self::new_async(options, layers).block_on()
    }

    async fn new_async(
        options: &AcceleratorOptions,
        layers: &[DenseLayer],
    ) -> EngineResult<Option<Self>> {
        let (Some(first), Some(last)) = (layers.first(), layers.last()) else {
            return Err(EngineError::AcceleratorInit {
                message: "network has no dense layers".to_string(),
            });
        };
        if let Some(index) = layers[..layers.len() - 1]
            .iter()
            .position(|l| l.activation == Activation::Softmax)
        {
            return Err(EngineError::AcceleratorInit {
                message: format!("softmax is only supported on the output layer (layer {index})"),
            });
        }
        let layer_params = layers
            .iter()
            .enumerate()
            .map(|(index, layer)| LayerParams::for_layer(index, layer))
            .collect::<EngineResult<Vec<_>>>()?;

        let instance = options.instance();
        let Some(adapter) = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: options.power_preference(),
                force_fallback_adapter: options.force_fallback_adapter,
                compatible_surface: None,
            })
            .await
        else {
            debug!("No wgpu adapter found for backends {:?}", options.backends());
            return Ok(None);
        };

        let adapter_info = adapter.get_info();
        if !adapter
            .get_downlevel_capabilities()
            .flags
            .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS)
        {
            debug!("Adapter '{}' lacks compute shader support", adapter_info.name);
            return Ok(None);
        }

        let limits = adapter.limits();
        let largest_binding = layers
            .iter()
            .map(|l| (l.weights.len() * std::mem::size_of::<f32>()) as u64)
            .max()
            .unwrap_or(0);
        if largest_binding > u64::from(limits.max_storage_buffer_binding_size) {
            return Err(EngineError::AcceleratorInit {
                message: format!(
                    "weight matrix of {largest_binding} bytes exceeds the adapter binding limit of {} bytes",
                    limits.max_storage_buffer_binding_size
                ),
            });
        }

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Parity Bench Device"),
                    required_limits: limits,
                    ..Default::default()
                },
                None,
            )
            .await
            .map_err(|e| EngineError::AcceleratorInit {
                message: e.to_string(),
            })?;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Dense Layer Shader"),
            source: wgpu::ShaderSource::Wgsl(get_dense_layer_wgsl(DENSE_WORKGROUP_SIZE).into()),
        });

        let storage_entry = |binding: u32, read_only: bool| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Dense Layer Bind Group Layout"),
            entries: &[
                storage_entry(0, true),
                storage_entry(1, true),
                storage_entry(2, true),
                storage_entry(3, false),
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Dense Layer Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Dense Layer Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let mut activation_buffers = Vec::with_capacity(layers.len() + 1);
        activation_buffers.push(device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Input Activations"),
            size: f32_bytes(first.input_size),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }));
        for layer in layers {
            activation_buffers.push(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Layer Activations"),
                size: f32_bytes(layer.output_size),
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            }));
        }

        let mut gpu_layers = Vec::with_capacity(layers.len());
        for (index, layer) in layers.iter().enumerate() {
            let weights = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Layer Weights"),
                contents: bytemuck::cast_slice(&layer.weights),
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            });
            let bias = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Layer Bias"),
                contents: bytemuck::cast_slice(&layer.bias),
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            });
            let params = layer_params[index];
            let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Layer Params"),
                contents: bytemuck::cast_slice(&[params]),
                usage: wgpu::BufferUsages::UNIFORM,
            });

            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Dense Layer Bind Group"),
                layout: &bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: activation_buffers[index].as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: weights.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: bias.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: activation_buffers[index + 1].as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: params_buffer.as_entire_binding(),
                    },
                ],
            });

            gpu_layers.push(GpuDenseLayer {
                weights,
                bias,
                bind_group,
                workgroups: params.output_size.div_ceil(DENSE_WORKGROUP_SIZE),
            });
        }

        let staging_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Staging Buffer"),
            size: f32_bytes(last.output_size),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        info!(
            "Accelerator ready on '{}' ({:?}, {} layers)",
            adapter_info.name,
            adapter_info.backend,
            gpu_layers.len()
        );

        Ok(Some(Self {
            device,
            queue,
            pipeline,
            layers: gpu_layers,
            activation_buffers,
            staging_buffer,
            input_size: first.input_size,
            output_size: last.output_size,
            adapter_info,
        }))
    }

    /// Adapter description returned from backend initialization.
    pub fn descriptor(&self) -> Value {
        describe_adapter(&self.adapter_info)
    }

    /// Overwrite device weights after the host copy changed.
    pub fn upload_weights(&self, layers: &[DenseLayer]) {
        for (gpu_layer, layer) in self.layers.iter().zip(layers) {
            self.queue
                .write_buffer(&gpu_layer.weights, 0, bytemuck::cast_slice(&layer.weights));
            self.queue
                .write_buffer(&gpu_layer.bias, 0, bytemuck::cast_slice(&layer.bias));
        }
    }

    /// Run every layer on the device and read back the output layer
    /// (before any host-side softmax).
    pub fn run(&self, input: &[f32]) -> EngineResult<Vec<f32>> {
        if input.len() != self.input_size {
            return Err(EngineError::InputSizeMismatch {
                expected: self.input_size,
                actual: input.len(),
            });
        }

        self.queue
            .write_buffer(&self.activation_buffers[0], 0, bytemuck::cast_slice(input));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Dense Forward"),
            });
        for layer in &self.layers {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor::default());
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &layer.bind_group, &[]);
            pass.dispatch_workgroups(layer.workgroups, 1, 1);
        }
        if let Some(output) = self.activation_buffers.last() {
            encoder.copy_buffer_to_buffer(
                output,
                0,
                &self.staging_buffer,
                0,
                f32_bytes(self.output_size),
            );
        }
        self.queue.submit(Some(encoder.finish()));

        let slice = self.staging_buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);

        receiver
            .recv()
            .map_err(|e| EngineError::AcceleratorExecution {
                message: e.to_string(),
            })?
            .map_err(|e| EngineError::AcceleratorExecution {
                message: e.to_string(),
            })?;

        let data = slice.get_mapped_range();
        let output: Vec<f32> = bytemuck::cast_slice(&data).to_vec();
        drop(data);
        self.staging_buffer.unmap();

        Ok(output)
    }
}

fn f32_bytes(count: usize) -> u64 {
    (count.max(1) * std::mem::size_of::<f32>()) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_hint_parsing() {
        let mut options = AcceleratorOptions::default();
        assert_eq!(options.backends(), wgpu::Backends::all());
        options.backend = Some("Vulkan".to_string());
        assert_eq!(options.backends(), wgpu::Backends::VULKAN);
        options.backend = Some("gl".to_string());
        assert_eq!(options.backends(), wgpu::Backends::GL);
        options.backend = Some("whatever".to_string());
        assert_eq!(options.backends(), wgpu::Backends::all());
    }

    #[test]
    fn test_layer_params_layout() {
        assert_eq!(std::mem::size_of::<LayerParams>(), 16);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_oversized_layer_is_an_init_error() {
        let layer = DenseLayer {
            input_size: 4,
            output_size: u32::MAX as usize + 1,
            weights: Vec::new(),
            bias: Vec::new(),
            activation: Activation::Softmax,
        };
        let err = LayerParams::for_layer(0, &layer).unwrap_err();
        assert!(matches!(err, EngineError::AcceleratorInit { .. }));

        let fitting = DenseLayer {
            output_size: 2,
            ..layer
        };
        let params = LayerParams::for_layer(0, &fitting).unwrap();
        assert_eq!((params.input_size, params.output_size), (4, 2));
    }
}
