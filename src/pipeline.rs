use wgpu::{
    BindGroup, BindGroupLayout, Buffer, RenderPipeline, Sampler, Texture, TextureFormat,
    TextureView,
};

use crate::config::BloomConfig;
use crate::overlay::Canvas;
use crate::renderer::GpuContext;

/// Margins (uv fractions) for the overlay's corner placement.
const OVERLAY_MARGIN_X: f32 = 0.04;
const OVERLAY_MARGIN_Y: f32 = 0.06;

/// Uniform block shared by every post pass.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct BloomUniform {
    /// strength, radius, threshold, unused
    settings: [f32; 4],
    /// blur direction xy, texel size zw
    direction: [f32; 4],
    /// overlay origin xy, overlay extent zw (uv fractions)
    overlay_rect: [f32; 4],
}

/// Offscreen render target.
struct Target {
    _texture: Texture,
    view: TextureView,
}

impl Target {
    fn new(
        gpu: &GpuContext,
        width: u32,
        height: u32,
        format: TextureFormat,
        usage: wgpu::TextureUsages,
        label: &str,
    ) -> Self {
        let texture = gpu.device().create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

/// Ordered post-process passes: base scene render target, bloom
/// extract/blur/blur, and the composite that writes the visible surface.
///
/// Every frame routes through the full ordered list; partial pipelines are
/// not a supported configuration. All targets resize in lockstep with the
/// viewport before the next frame renders.
pub struct PostProcessPipeline {
    gpu: GpuContext,
    width: u32,
    height: u32,
    bloom: BloomConfig,

    scene_target: Target,
    depth_target: Target,
    bloom_a: Target,
    bloom_b: Target,

    sampler: Sampler,
    post_layout: BindGroupLayout,
    composite_extra_layout: BindGroupLayout,

    extract_pipeline: RenderPipeline,
    blur_pipeline: RenderPipeline,
    composite_pipeline: RenderPipeline,

    extract_uniform: Buffer,
    blur_h_uniform: Buffer,
    blur_v_uniform: Buffer,
    composite_uniform: Buffer,

    extract_bind: BindGroup,
    blur_h_bind: BindGroup,
    blur_v_bind: BindGroup,
    composite_bind: BindGroup,
    composite_extra_bind: BindGroup,

    overlay_texture: Texture,
    overlay_size: (u32, u32),
}

const SCENE_FORMAT: TextureFormat = TextureFormat::Rgba16Float;
const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

impl PostProcessPipeline {
    pub fn new(
        gpu: GpuContext,
        surface_format: TextureFormat,
        width: u32,
        height: u32,
        bloom: BloomConfig,
        overlay_size: (u32, u32),
    ) -> Self {
        let device = gpu.device();

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Post Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("post.wgsl").into()),
        });

        let post_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Post Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let composite_extra_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Composite Extra Bind Group Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                ],
            });

        let single_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Post Pipeline Layout"),
            bind_group_layouts: &[&post_layout],
            push_constant_ranges: &[],
        });
        let composite_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Composite Pipeline Layout"),
            bind_group_layouts: &[&post_layout, &composite_extra_layout],
            push_constant_ranges: &[],
        });

        let fullscreen_pipeline = |layout: &wgpu::PipelineLayout,
                                   entry: &str,
                                   format: TextureFormat,
                                   label: &str| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_fullscreen"),
                    buffers: &[],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some(entry),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };

        let extract_pipeline =
            fullscreen_pipeline(&single_layout, "fs_extract", SCENE_FORMAT, "Bloom Extract");
        let blur_pipeline =
            fullscreen_pipeline(&single_layout, "fs_blur", SCENE_FORMAT, "Bloom Blur");
        let composite_pipeline = fullscreen_pipeline(
            &composite_layout,
            "fs_composite",
            surface_format,
            "Composite",
        );

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Post Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let uniform = |label: &str| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: std::mem::size_of::<BloomUniform>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        let extract_uniform = uniform("Bloom Extract Uniform");
        let blur_h_uniform = uniform("Bloom Blur H Uniform");
        let blur_v_uniform = uniform("Bloom Blur V Uniform");
        let composite_uniform = uniform("Composite Uniform");

        let overlay_texture = Self::create_overlay_texture(&gpu, overlay_size);

        let width = width.max(1);
        let height = height.max(1);
        let (scene_target, depth_target, bloom_a, bloom_b) = Self::create_targets(&gpu, width, height);

        let overlay_view = overlay_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let (extract_bind, blur_h_bind, blur_v_bind, composite_bind, composite_extra_bind) =
            Self::create_bind_groups(
                &gpu,
                &post_layout,
                &composite_extra_layout,
                &sampler,
                &scene_target,
                &bloom_a,
                &bloom_b,
                &overlay_view,
                &extract_uniform,
                &blur_h_uniform,
                &blur_v_uniform,
                &composite_uniform,
            );

        let pipeline = Self {
            gpu,
            width,
            height,
            bloom,
            scene_target,
            depth_target,
            bloom_a,
            bloom_b,
            sampler,
            post_layout,
            composite_extra_layout,
            extract_pipeline,
            blur_pipeline,
            composite_pipeline,
            extract_uniform,
            blur_h_uniform,
            blur_v_uniform,
            composite_uniform,
            extract_bind,
            blur_h_bind,
            blur_v_bind,
            composite_bind,
            composite_extra_bind,
            overlay_texture,
            overlay_size,
        };
        pipeline.write_uniforms();
        pipeline
    }

    fn create_targets(gpu: &GpuContext, width: u32, height: u32) -> (Target, Target, Target, Target) {
        let color_usage =
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
        (
            Target::new(gpu, width, height, SCENE_FORMAT, color_usage, "Scene Target"),
            Target::new(
                gpu,
                width,
                height,
                DEPTH_FORMAT,
                wgpu::TextureUsages::RENDER_ATTACHMENT,
                "Depth Target",
            ),
            Target::new(gpu, width, height, SCENE_FORMAT, color_usage, "Bloom A"),
            Target::new(gpu, width, height, SCENE_FORMAT, color_usage, "Bloom B"),
        )
    }

    fn create_overlay_texture(gpu: &GpuContext, size: (u32, u32)) -> Texture {
        gpu.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("Overlay Texture"),
            size: wgpu::Extent3d {
                width: size.0.max(1),
                height: size.1.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn create_bind_groups(
        gpu: &GpuContext,
        post_layout: &BindGroupLayout,
        composite_extra_layout: &BindGroupLayout,
        sampler: &Sampler,
        scene_target: &Target,
        bloom_a: &Target,
        bloom_b: &Target,
        overlay_view: &TextureView,
        extract_uniform: &Buffer,
        blur_h_uniform: &Buffer,
        blur_v_uniform: &Buffer,
        composite_uniform: &Buffer,
    ) -> (BindGroup, BindGroup, BindGroup, BindGroup, BindGroup) {
        let device = gpu.device();
        let post_bind = |src: &TextureView, uniform: &Buffer, label: &str| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: post_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(src),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: uniform.as_entire_binding(),
                    },
                ],
            })
        };

        let extract_bind = post_bind(&scene_target.view, extract_uniform, "Extract Bind");
        let blur_h_bind = post_bind(&bloom_a.view, blur_h_uniform, "Blur H Bind");
        let blur_v_bind = post_bind(&bloom_b.view, blur_v_uniform, "Blur V Bind");
        let composite_bind = post_bind(&scene_target.view, composite_uniform, "Composite Bind");

        let composite_extra_bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Composite Extra Bind"),
            layout: composite_extra_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&bloom_a.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(overlay_view),
                },
            ],
        });

        (
            extract_bind,
            blur_h_bind,
            blur_v_bind,
            composite_bind,
            composite_extra_bind,
        )
    }

    fn write_uniforms(&self) {
        let texel = [1.0 / self.width as f32, 1.0 / self.height as f32];
        let extent = [
            self.overlay_size.0 as f32 / self.width as f32,
            self.overlay_size.1 as f32 / self.height as f32,
        ];
        let overlay_rect = [
            OVERLAY_MARGIN_X,
            1.0 - extent[1] - OVERLAY_MARGIN_Y,
            extent[0],
            extent[1],
        ];
        let settings = [self.bloom.strength, self.bloom.radius, self.bloom.threshold, 0.0];

        let write = |buffer: &Buffer, direction: [f32; 2]| {
            let uniform = BloomUniform {
                settings,
                direction: [direction[0], direction[1], texel[0], texel[1]],
                overlay_rect,
            };
            self.gpu
                .queue()
                .write_buffer(buffer, 0, bytemuck::cast_slice(&[uniform]));
        };

        write(&self.extract_uniform, [0.0, 0.0]);
        write(&self.blur_h_uniform, [1.0, 0.0]);
        write(&self.blur_v_uniform, [0.0, 1.0]);
        write(&self.composite_uniform, [0.0, 0.0]);
    }

    /// Recreates every pass target at the new viewport size, in lockstep,
    /// before the next frame renders.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.width = width;
        self.height = height;

        let (scene_target, depth_target, bloom_a, bloom_b) =
            Self::create_targets(&self.gpu, width, height);
        self.scene_target = scene_target;
        self.depth_target = depth_target;
        self.bloom_a = bloom_a;
        self.bloom_b = bloom_b;

        let overlay_view = self
            .overlay_texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let (extract_bind, blur_h_bind, blur_v_bind, composite_bind, composite_extra_bind) =
            Self::create_bind_groups(
                &self.gpu,
                &self.post_layout,
                &self.composite_extra_layout,
                &self.sampler,
                &self.scene_target,
                &self.bloom_a,
                &self.bloom_b,
                &overlay_view,
                &self.extract_uniform,
                &self.blur_h_uniform,
                &self.blur_v_uniform,
                &self.composite_uniform,
            );
        self.extract_bind = extract_bind;
        self.blur_h_bind = blur_h_bind;
        self.blur_v_bind = blur_v_bind;
        self.composite_bind = composite_bind;
        self.composite_extra_bind = composite_extra_bind;

        self.write_uniforms();
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// The base pass renders into this color target.
    pub fn scene_view(&self) -> &TextureView {
        &self.scene_target.view
    }

    pub fn depth_view(&self) -> &TextureView {
        &self.depth_target.view
    }

    /// Uploads the overlay canvas pixels. `None` clears the overlay.
    pub fn update_overlay(&self, canvas: Option<&Canvas>) {
        let (width, height) = self.overlay_size;
        let pixels;
        let data: &[u8] = match canvas {
            Some(canvas) if canvas.dimensions() == (width, height) => canvas.pixels(),
            _ => {
                pixels = vec![0u8; (width * height * 4) as usize];
                &pixels
            }
        };

        self.gpu.queue().write_texture(
            self.overlay_texture.as_image_copy(),
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }

    /// Encodes the ordered pass list after the base scene pass: extract,
    /// horizontal blur, vertical blur, composite to the surface.
    pub fn encode(&self, encoder: &mut wgpu::CommandEncoder, surface_view: &TextureView) {
        let fullscreen = |encoder: &mut wgpu::CommandEncoder,
                          label: &str,
                          pipeline: &RenderPipeline,
                          bind: &BindGroup,
                          extra: Option<&BindGroup>,
                          target: &TextureView| {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(label),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, bind, &[]);
            if let Some(extra) = extra {
                pass.set_bind_group(1, extra, &[]);
            }
            pass.draw(0..3, 0..1);
        };

        fullscreen(
            encoder,
            "Bloom Extract Pass",
            &self.extract_pipeline,
            &self.extract_bind,
            None,
            &self.bloom_a.view,
        );
        fullscreen(
            encoder,
            "Bloom Blur H Pass",
            &self.blur_pipeline,
            &self.blur_h_bind,
            None,
            &self.bloom_b.view,
        );
        fullscreen(
            encoder,
            "Bloom Blur V Pass",
            &self.blur_pipeline,
            &self.blur_v_bind,
            None,
            &self.bloom_a.view,
        );
        fullscreen(
            encoder,
            "Composite Pass",
            &self.composite_pipeline,
            &self.composite_bind,
            Some(&self.composite_extra_bind),
            surface_view,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bloom_uniform_is_pod_sized_for_wgsl() {
        // Three vec4s, no padding surprises.
        assert_eq!(std::mem::size_of::<BloomUniform>(), 48);
    }

    #[test]
    fn overlay_rect_fits_in_unit_square() {
        let extent = [320.0 / 1280.0, 96.0 / 720.0];
        let origin_y = 1.0 - extent[1] - OVERLAY_MARGIN_Y;
        assert!(origin_y > 0.0 && origin_y + extent[1] <= 1.0);
        assert!(OVERLAY_MARGIN_X + extent[0] <= 1.0);
    }
}
