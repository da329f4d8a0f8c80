//! Floating-point render target negotiation.

use crate::error::FluidError;
use crate::types::{ChannelLayout, FilterStrategy};

/// A concrete texture format chosen for one requested channel layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TexelFormat {
    pub format: wgpu::TextureFormat,
    /// Layout the format actually provides; may be wider than requested.
    pub layout: ChannelLayout,
}

/// Formats selected for every field layout plus the filtering capability.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FormatTier {
    pub rgba: TexelFormat,
    pub rg: TexelFormat,
    pub r: TexelFormat,
    pub linear_filtering: bool,
}

impl FormatTier {
    pub fn for_layout(&self, layout: ChannelLayout) -> TexelFormat {
        match layout {
            ChannelLayout::R => self.r,
            ChannelLayout::Rg => self.rg,
            ChannelLayout::Rgba => self.rgba,
        }
    }

    pub fn filter_strategy(&self) -> FilterStrategy {
        FilterStrategy::from_linear_support(self.linear_filtering)
    }
}

/// Answers capability questions about texture formats.
pub trait FormatProbe {
    /// True if the format can be rendered into on this device.
    fn renderable(&mut self, format: wgpu::TextureFormat) -> bool;
    /// True if the format supports linear filtering when sampled.
    fn filterable(&self, format: wgpu::TextureFormat) -> bool;
}

const RGBA_CANDIDATES: [wgpu::TextureFormat; 2] = [
    wgpu::TextureFormat::Rgba16Float,
    wgpu::TextureFormat::Rgba32Float,
];

/// Picks render target formats, widening layouts the device cannot render.
///
/// R falls back to RG, RG falls back to RGBA, and RGBA tries half then full
/// precision. Fails only when no RGBA float format is renderable.
pub fn negotiate_formats(probe: &mut dyn FormatProbe) -> Result<FormatTier, FluidError> {
    let rgba = RGBA_CANDIDATES
        .into_iter()
        .find(|format| probe.renderable(*format))
        .map(|format| TexelFormat {
            format,
            layout: ChannelLayout::Rgba,
        })
        .ok_or(FluidError::UnsupportedDevice)?;

    let rg = if probe.renderable(wgpu::TextureFormat::Rg16Float) {
        TexelFormat {
            format: wgpu::TextureFormat::Rg16Float,
            layout: ChannelLayout::Rg,
        }
    } else {
        rgba
    };

    let r = if probe.renderable(wgpu::TextureFormat::R16Float) {
        TexelFormat {
            format: wgpu::TextureFormat::R16Float,
            layout: ChannelLayout::R,
        }
    } else {
        rg
    };

    let linear_filtering = [rgba, rg, r]
        .iter()
        .all(|texel| probe.filterable(texel.format));

    let tier = FormatTier {
        rgba,
        rg,
        r,
        linear_filtering,
    };
    tracing::info!(
        rgba = ?tier.rgba.format,
        rg = ?tier.rg.format,
        r = ?tier.r.format,
        linear_filtering,
        "negotiated render target formats"
    );
    Ok(tier)
}

/// Probes a live device by allocating and clearing a tiny target.
pub(crate) struct DeviceProbe<'a> {
    pub adapter: &'a wgpu::Adapter,
    pub device: &'a wgpu::Device,
}

impl DeviceProbe<'_> {
    fn features(&self, format: wgpu::TextureFormat) -> wgpu::TextureFormatFeatures {
        if self
            .device
            .features()
            .contains(wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES)
        {
            self.adapter.get_texture_format_features(format)
        } else {
            format.guaranteed_format_features(self.device.features())
        }
    }
}

impl FormatProbe for DeviceProbe<'_> {
    fn renderable(&mut self, format: wgpu::TextureFormat) -> bool {
        if !self
            .features(format)
            .allowed_usages
            .contains(wgpu::TextureUsages::RENDER_ATTACHMENT)
        {
            return false;
        }

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("format probe"),
            size: wgpu::Extent3d {
                width: 4,
                height: 4,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("format probe encoder"),
            });
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("format probe clear"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
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
        drop(encoder.finish());
        let error = pollster::block_on(self.device.pop_error_scope());
        texture.destroy();

        match error {
            None => true,
            Some(err) => {
                tracing::debug!(?format, error = %err, "format is not renderable");
                false
            }
        }
    }

    fn filterable(&self, format: wgpu::TextureFormat) -> bool {
        self.features(format)
            .flags
            .contains(wgpu::TextureFormatFeatureFlags::FILTERABLE)
    }
}
