//! WGSL shader sources for the accelerated dense-layer path.

/// Threads per workgroup for the dense-layer kernel.
pub const DENSE_WORKGROUP_SIZE: u32 = 64;

/// Get the dense-layer compute shader with the workgroup size substituted.
pub fn get_dense_layer_wgsl(workgroup_size: u32) -> String {
    include_str!("dense_layer.wgsl").replace("WORKGROUP_SIZE", &workgroup_size.to_string())
}
