/// Failures surfaced by the simulation core.
///
/// Device capability and shader problems are static: they are reported once
/// at startup and never retried.
#[derive(Debug, thiserror::Error)]
pub enum FluidError {
    /// No floating-point render target exists on this device.
    #[error("device cannot render to any floating-point texture format")]
    UnsupportedDevice,
    /// A GPU adapter or device could not be acquired.
    #[error("failed to acquire GPU {stage}: {message}")]
    Device {
        stage: &'static str,
        message: String,
    },
    /// A pass program failed to compile or link.
    #[error("failed to build {program} program: {diagnostic}")]
    ShaderBuild {
        program: &'static str,
        diagnostic: String,
    },
    /// Presenting to the output surface failed.
    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
}

impl FluidError {
    pub fn as_surface_error(&self) -> Option<&wgpu::SurfaceError> {
        match self {
            FluidError::Surface(err) => Some(err),
            _ => None,
        }
    }
}
