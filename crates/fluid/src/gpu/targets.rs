use fluidconfig::SimulationConfig;

use crate::field::PingPong;
use crate::resolution::{compute_dye_resolution, compute_sim_resolution, fit_within};
use crate::types::{ChannelLayout, GridSize, SurfaceSize};

use super::caps::{FormatTier, TexelFormat};

/// A floating-point texture that passes render into and sample from.
pub(crate) struct RenderTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    pub format: TexelFormat,
}

impl RenderTarget {
    /// Creates an uncleared target; [`TargetPool::new`] clears every target it allocates.
    pub fn allocate(
        device: &wgpu::Device,
        label: &str,
        size: GridSize,
        format: TexelFormat,
        filter: wgpu::FilterMode,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: format.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(label),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        Self {
            texture,
            view,
            sampler,
            format,
        }
    }

    fn clear(&self, encoder: &mut wgpu::CommandEncoder) {
        let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("target clear"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
    }
}

impl Drop for RenderTarget {
    fn drop(&mut self) {
        self.texture.destroy();
    }
}

pub(crate) type DoubleTarget = PingPong<RenderTarget>;

/// Every simulation target for one surface size.
pub(crate) struct TargetPool {
    pub sim: GridSize,
    pub dye_size: GridSize,
    pub velocity: DoubleTarget,
    pub dye: DoubleTarget,
    pub pressure: DoubleTarget,
    pub divergence: RenderTarget,
    pub curl: RenderTarget,
}

impl TargetPool {
    /// Allocates all targets and clears them to zero before returning.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        tier: &FormatTier,
        config: &SimulationConfig,
        surface: SurfaceSize,
    ) -> Self {
        let limit = device.limits().max_texture_dimension_2d;
        let sim = within_device_limit("sim", compute_sim_resolution(config, surface), limit);
        let dye_size = within_device_limit("dye", compute_dye_resolution(config, surface), limit);
        let linear = if tier.linear_filtering {
            wgpu::FilterMode::Linear
        } else {
            wgpu::FilterMode::Nearest
        };
        let nearest = wgpu::FilterMode::Nearest;

        let single = |label: &str, size, layout, filter| {
            RenderTarget::allocate(device, label, size, tier.for_layout(layout), filter)
        };
        let double = |label: &str, size, layout, filter| {
            PingPong::new(
                single(&format!("{label} read"), size, layout, filter),
                single(&format!("{label} write"), size, layout, filter),
            )
        };

        let pool = Self {
            sim,
            dye_size,
            velocity: double("velocity", sim, ChannelLayout::Rg, linear),
            dye: double("dye", dye_size, ChannelLayout::Rgba, linear),
            pressure: double("pressure", sim, ChannelLayout::R, nearest),
            divergence: single("divergence", sim, ChannelLayout::R, nearest),
            curl: single("curl", sim, ChannelLayout::R, nearest),
        };

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("target pool clear"),
        });
        for target in pool.targets() {
            target.clear(&mut encoder);
        }
        queue.submit(std::iter::once(encoder.finish()));

        tracing::debug!(
            sim_width = sim.width,
            sim_height = sim.height,
            dye_width = dye_size.width,
            dye_height = dye_size.height,
            "allocated simulation targets"
        );
        pool
    }

    fn targets(&self) -> [&RenderTarget; 8] {
        [
            self.velocity.read(),
            self.velocity.write(),
            self.dye.read(),
            self.dye.write(),
            self.pressure.read(),
            self.pressure.write(),
            &self.divergence,
            &self.curl,
        ]
    }
}

fn within_device_limit(field: &'static str, requested: GridSize, limit: u32) -> GridSize {
    let fitted = fit_within(requested, limit);
    if fitted != requested {
        tracing::warn!(
            field,
            requested_width = requested.width,
            requested_height = requested.height,
            width = fitted.width,
            height = fitted.height,
            limit,
            "grid exceeds the GPU texture limit; shrinking"
        );
    }
    fitted
}
