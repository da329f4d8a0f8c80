use std::collections::HashMap;

use wgpu::util::DeviceExt;

use crate::error::FluidError;

use super::caps::FormatTier;
use super::shaders::{compile_fragment_shader, compile_vertex_shader, Program};
use super::targets::RenderTarget;
use super::uniforms::PassUniforms;

/// Where a pass writes its output.
pub(crate) enum PassTarget<'a> {
    /// A simulation field. Holding it mutably keeps it out of the inputs.
    Field(&'a mut RenderTarget),
    /// The presentation surface.
    Surface {
        view: &'a wgpu::TextureView,
        format: wgpu::TextureFormat,
    },
}

impl PassTarget<'_> {
    fn view(&self) -> &wgpu::TextureView {
        match self {
            PassTarget::Field(target) => &target.view,
            PassTarget::Surface { view, .. } => view,
        }
    }

    fn format(&self) -> wgpu::TextureFormat {
        match self {
            PassTarget::Field(target) => target.format.format,
            PassTarget::Surface { format, .. } => *format,
        }
    }
}

/// One full-screen draw: program, parameters, ordered inputs and output.
pub(crate) struct PassDescriptor<'a> {
    pub program: Program,
    pub uniforms: PassUniforms,
    pub inputs: &'a [&'a RenderTarget],
    pub target: PassTarget<'a>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: Program,
    format: wgpu::TextureFormat,
}

/// Compiled programs plus the shared layouts and uniform buffer.
pub(crate) struct PassLibrary {
    _uniform_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    texture_layouts: [wgpu::BindGroupLayout; 2],
    pipeline_layouts: [wgpu::PipelineLayout; 2],
    vertex_module: wgpu::ShaderModule,
    fragment_modules: HashMap<Program, wgpu::ShaderModule>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl PassLibrary {
    /// Compiles every program and prepares pipelines for the formats in use.
    pub fn new(
        device: &wgpu::Device,
        tier: &FormatTier,
        surface_format: wgpu::TextureFormat,
    ) -> Result<Self, FluidError> {
        let filter = tier.filter_strategy();
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("pass uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("pass uniforms"),
            size: std::mem::size_of::<PassUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("pass uniform bind group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let texture_layouts = [
            texture_layout(device, 1, tier.linear_filtering),
            texture_layout(device, 2, tier.linear_filtering),
        ];
        let pipeline_layouts = [
            pipeline_layout(device, &uniform_layout, &texture_layouts[0]),
            pipeline_layout(device, &uniform_layout, &texture_layouts[1]),
        ];

        let vertex_module = compile_vertex_shader(device)?;
        let mut fragment_modules = HashMap::new();
        for program in Program::ALL {
            fragment_modules.insert(program, compile_fragment_shader(device, program, filter)?);
        }

        let mut library = Self {
            _uniform_layout: uniform_layout,
            uniform_buffer,
            uniform_bind_group,
            texture_layouts,
            pipeline_layouts,
            vertex_module,
            fragment_modules,
            pipelines: HashMap::new(),
        };

        let required = [
            (Program::Curl, tier.r.format),
            (Program::Divergence, tier.r.format),
            (Program::Clear, tier.r.format),
            (Program::Pressure, tier.r.format),
            (Program::Vorticity, tier.rg.format),
            (Program::GradientSubtract, tier.rg.format),
            (Program::Advection, tier.rg.format),
            (Program::Advection, tier.rgba.format),
            (Program::Splat, tier.rg.format),
            (Program::Splat, tier.rgba.format),
            (Program::Display, surface_format),
        ];
        for (program, format) in required {
            library.ensure_pipeline(device, program, format);
        }

        tracing::debug!(
            pipelines = library.pipelines.len(),
            ?filter,
            "pass library ready"
        );
        Ok(library)
    }

    /// Records one pass into `encoder`.
    pub fn encode(
        &mut self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        pass: PassDescriptor<'_>,
    ) {
        let PassDescriptor {
            program,
            uniforms,
            inputs,
            target,
        } = pass;
        debug_assert_eq!(
            inputs.len(),
            program.inputs().len(),
            "{program} pass bound the wrong number of inputs"
        );

        let format = target.format();
        let pipeline = self.ensure_pipeline(device, program, format).clone();
        let layout = &self.texture_layouts[inputs.len().clamp(1, 2) - 1];

        let mut entries = Vec::with_capacity(inputs.len() * 2);
        for (slot, input) in inputs.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: (slot * 2) as u32,
                resource: wgpu::BindingResource::TextureView(&input.view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: (slot * 2 + 1) as u32,
                resource: wgpu::BindingResource::Sampler(&input.sampler),
            });
        }
        let texture_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(program.name()),
            layout,
            entries: &entries,
        });

        // Each pass gets its own uniform values via a staging copy recorded
        // ahead of the draw.
        let staging = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("pass uniform staging"),
            contents: bytemuck::bytes_of(&uniforms),
            usage: wgpu::BufferUsages::COPY_SRC,
        });
        encoder.copy_buffer_to_buffer(
            &staging,
            0,
            &self.uniform_buffer,
            0,
            std::mem::size_of::<PassUniforms>() as u64,
        );

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(program.name()),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.view(),
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
        render_pass.set_pipeline(&pipeline);
        render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
        render_pass.set_bind_group(1, &texture_bind_group, &[]);
        render_pass.draw(0..3, 0..1);
    }

    fn ensure_pipeline(
        &mut self,
        device: &wgpu::Device,
        program: Program,
        format: wgpu::TextureFormat,
    ) -> &wgpu::RenderPipeline {
        let key = PipelineKey { program, format };
        if !self.pipelines.contains_key(&key) {
            let layout = &self.pipeline_layouts[program.inputs().len().clamp(1, 2) - 1];
            let fragment = &self.fragment_modules[&program];
            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(program.name()),
                layout: Some(layout),
                vertex: wgpu::VertexState {
                    module: &self.vertex_module,
                    entry_point: Some("main"),
                    buffers: &[],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: fragment,
                    entry_point: Some("main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                multiview: None,
                cache: None,
            });
            self.pipelines.insert(key, pipeline);
        }
        &self.pipelines[&key]
    }
}

fn texture_layout(device: &wgpu::Device, inputs: u32, filterable: bool) -> wgpu::BindGroupLayout {
    let sampler = if filterable {
        wgpu::SamplerBindingType::Filtering
    } else {
        wgpu::SamplerBindingType::NonFiltering
    };
    let entries: Vec<_> = (0..inputs)
        .flat_map(|slot| {
            [
                wgpu::BindGroupLayoutEntry {
                    binding: slot * 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: slot * 2 + 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(sampler),
                    count: None,
                },
            ]
        })
        .collect();
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(if inputs == 1 {
            "single input layout"
        } else {
            "double input layout"
        }),
        entries: &entries,
    })
}

fn pipeline_layout(
    device: &wgpu::Device,
    uniform_layout: &wgpu::BindGroupLayout,
    texture_layout: &wgpu::BindGroupLayout,
) -> wgpu::PipelineLayout {
    device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("pass pipeline layout"),
        bind_group_layouts: &[uniform_layout, texture_layout],
        push_constant_ranges: &[],
    })
}
