use fluidconfig::GpuPower;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::error::FluidError;
use crate::types::SurfaceSize;

/// Adapter, device and presentation surface shared by every pass.
pub(crate) struct GpuContext {
    pub _instance: wgpu::Instance,
    pub surface: wgpu::Surface<'static>,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub size: SurfaceSize,
    pub surface_format: wgpu::TextureFormat,
    /// The compositor expects premultiplied color, so the display pass must
    /// scale rgb by alpha itself.
    pub premultiply_output: bool,
}

impl GpuContext {
    /// Creates a surface for `target`, which must outlive the context.
    pub(crate) fn new<T>(
        target: &T,
        initial_size: SurfaceSize,
        power: GpuPower,
        transparent: bool,
    ) -> Result<Self, FluidError>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
            backend_options: wgpu::BackendOptions::default(),
        });

        let window_handle = target
            .window_handle()
            .map_err(|err| device_error("window handle", err))?;
        let display_handle = target
            .display_handle()
            .map_err(|err| device_error("display handle", err))?;

        let surface = unsafe {
            instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
                raw_display_handle: display_handle.as_raw(),
                raw_window_handle: window_handle.as_raw(),
            })
        }
        .map_err(|err| device_error("surface", err))?;

        let power_preference = match power {
            GpuPower::Low => wgpu::PowerPreference::LowPower,
            GpuPower::High => wgpu::PowerPreference::HighPerformance,
        };
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .map_err(|err| device_error("adapter", err))?;

        let adapter_info = adapter.get_info();
        tracing::debug!(
            name = %adapter_info.name,
            backend = ?adapter_info.backend,
            device_type = ?adapter_info.device_type,
            "selected GPU adapter"
        );

        let limits = adapter.limits();
        let max_dimension = limits.max_texture_dimension_2d;
        let width = initial_size.width.max(1);
        let height = initial_size.height.max(1);
        if width > max_dimension || height > max_dimension {
            return Err(FluidError::Device {
                stage: "surface",
                message: format!(
                    "GPU max texture dimension is {max_dimension}, requested surface is {width}x{height}"
                ),
            });
        }

        // Adapter-specific format features let capability probing see what the
        // hardware really offers instead of the portable baseline.
        let optional = wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES
            | wgpu::Features::FLOAT32_FILTERABLE;
        let required_features = adapter.features() & optional;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("inkflow device"),
            required_features,
            required_limits: limits.clone(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::default(),
        }))
        .map_err(|err| device_error("device", err))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|format| !format.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| FluidError::Device {
                stage: "surface",
                message: "surface reports no supported formats".to_string(),
            })?;

        let (alpha_mode, premultiply_output) =
            select_alpha_mode(transparent, &surface_caps.alpha_modes);

        let present_mode = surface_caps
            .present_modes
            .iter()
            .copied()
            .find(|mode| *mode == wgpu::PresentMode::Fifo)
            .or_else(|| surface_caps.present_modes.first().copied())
            .unwrap_or(wgpu::PresentMode::Fifo);

        tracing::debug!(?surface_format, ?alpha_mode, ?present_mode, "configuring surface");

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Ok(Self {
            _instance: instance,
            surface,
            adapter,
            device,
            queue,
            config,
            size: initial_size,
            surface_format,
            premultiply_output,
        })
    }

    pub(crate) fn resize(&mut self, new_size: SurfaceSize) {
        if new_size.is_empty() {
            return;
        }

        let limit = self.device.limits().max_texture_dimension_2d;
        if new_size.width > limit || new_size.height > limit {
            tracing::warn!(
                width = new_size.width,
                height = new_size.height,
                limit,
                "surface exceeds the GPU texture limit; clamping"
            );
        }
        self.size = new_size;
        self.config.width = new_size.width.min(limit);
        self.config.height = new_size.height.min(limit);
        self.surface.configure(&self.device, &self.config);
    }

    /// Reapplies the current configuration after the surface was lost.
    pub(crate) fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
    }
}

/// Picks how the compositor blends the surface and whether the display pass
/// has to premultiply.
///
/// Straight alpha is preferred since the display pass emits it natively.
pub(crate) fn select_alpha_mode(
    transparent: bool,
    available: &[wgpu::CompositeAlphaMode],
) -> (wgpu::CompositeAlphaMode, bool) {
    let fallback = available
        .first()
        .copied()
        .unwrap_or(wgpu::CompositeAlphaMode::Auto);
    if !transparent {
        return (fallback, false);
    }
    if available.contains(&wgpu::CompositeAlphaMode::PostMultiplied) {
        (wgpu::CompositeAlphaMode::PostMultiplied, false)
    } else if available.contains(&wgpu::CompositeAlphaMode::PreMultiplied) {
        (wgpu::CompositeAlphaMode::PreMultiplied, true)
    } else {
        tracing::warn!("surface cannot composite with alpha; transparency disabled");
        (fallback, false)
    }
}

fn device_error(stage: &'static str, err: impl std::fmt::Display) -> FluidError {
    FluidError::Device {
        stage,
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wgpu::CompositeAlphaMode::{Inherit, Opaque, PostMultiplied, PreMultiplied};

    #[test]
    fn straight_alpha_is_preferred_when_transparent() {
        let modes = [Opaque, PreMultiplied, PostMultiplied];
        assert_eq!(select_alpha_mode(true, &modes), (PostMultiplied, false));
    }

    #[test]
    fn premultiplied_compositor_requests_shader_premultiply() {
        let modes = [Opaque, PreMultiplied];
        assert_eq!(select_alpha_mode(true, &modes), (PreMultiplied, true));
    }

    #[test]
    fn opaque_surfaces_take_the_first_mode() {
        assert_eq!(
            select_alpha_mode(false, &[Inherit, PostMultiplied]),
            (Inherit, false)
        );
        assert_eq!(select_alpha_mode(true, &[Opaque]), (Opaque, false));
        assert_eq!(
            select_alpha_mode(true, &[]),
            (wgpu::CompositeAlphaMode::Auto, false)
        );
    }
}
