use std::sync::Arc;

use wgpu::util::DeviceExt;
use wgpu::{
    Adapter, BindGroup, BindGroupLayout, Buffer, Device, DeviceDescriptor, Features, Instance,
    Limits, Queue, RenderPipeline, Sampler, Surface, SurfaceConfiguration, TextureView,
};
use winit::window::Window;

use crate::body::{Material, Vertex};
use crate::camera::ParallaxCamera;
use crate::config::BackdropConfig;
use crate::overlay::Canvas;
use crate::pipeline::PostProcessPipeline;
use crate::scene::{NodeId, NodeKind, Scene};
use crate::scheduler::FrameSink;
use crate::texture::TextureImage;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Star points render slightly translucent so dense shells blend.
const STAR_OPACITY: f32 = 0.9;

/// Shared GPU handles, cloned cheaply (Arc) between the renderer and the
/// post-process pipeline.
#[derive(Clone)]
pub struct GpuContext {
    device: Arc<Device>,
    queue: Arc<Queue>,
}

impl GpuContext {
    /// Create a GPU context compatible with a surface. Returns the adapter
    /// as well so the caller can query surface capabilities.
    pub async fn new_for_surface(
        instance: &Instance,
        surface: &Surface<'_>,
    ) -> Result<(Self, Adapter)> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| format!("Failed to find appropriate adapter: {:?}", e))?;

        let (device, queue) = Self::request_device(&adapter).await?;
        Ok((
            Self {
                device: Arc::new(device),
                queue: Arc::new(queue),
            },
            adapter,
        ))
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    async fn request_device(adapter: &Adapter) -> Result<(Device, Queue)> {
        adapter
            .request_device(&DeviceDescriptor {
                label: Some("Backdrop Device"),
                required_features: Features::empty(),
                required_limits: Limits::default(),
                memory_hints: Default::default(),
                experimental_features: Default::default(),
                trace: Default::default(),
            })
            .await
            .map_err(|e| format!("Failed to create device: {:?}", e).into())
    }
}

/// Per-frame globals, one copy shared by both scene pipelines.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct SceneUniform {
    view_proj: [[f32; 4]; 4],
    /// xyz = camera position, w = fog density
    camera_pos: [f32; 4],
    /// rgb = fog color, w = ambient intensity
    fog_color: [f32; 4],
    /// xyz = key light position, w = key light intensity
    light_pos: [f32; 4],
    light_color: [f32; 4],
}

/// Per-object transform and material properties.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct ModelUniform {
    model: [[f32; 4]; 4],
    /// rgb = base color, w = opacity
    color: [f32; 4],
    /// rgb = emissive, w = 1.0 when a surface texture is bound
    emissive: [f32; 4],
    /// x = roughness, y = metalness, z = 1.0 for unlit materials
    params: [f32; 4],
}

impl ModelUniform {
    fn new(model: glam::Mat4, material: &Material, textured: bool) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            color: [
                material.color[0],
                material.color[1],
                material.color[2],
                material.opacity,
            ],
            emissive: [
                material.emissive[0],
                material.emissive[1],
                material.emissive[2],
                if textured { 1.0 } else { 0.0 },
            ],
            params: [
                material.roughness,
                material.metalness,
                if material.unlit { 1.0 } else { 0.0 },
                0.0,
            ],
        }
    }
}

/// GPU-side state for one mesh node.
struct DrawNode {
    node: NodeId,
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    index_count: u32,
    model_buffer: Buffer,
    bind_group: BindGroup,
    /// True once the node's surface texture has been uploaded.
    textured: bool,
}

/// Owns the surface, the two scene pipelines and all per-node GPU buffers,
/// and drives the post-process chain. This is the real [`FrameSink`].
pub struct Renderer {
    gpu: GpuContext,
    surface: Surface<'static>,
    surface_config: SurfaceConfiguration,
    post: PostProcessPipeline,

    mesh_pipeline: RenderPipeline,
    star_pipeline: RenderPipeline,

    scene_buffer: Buffer,
    scene_bind: BindGroup,
    model_layout: BindGroupLayout,

    draw_nodes: Vec<DrawNode>,
    star_buffer: Buffer,
    star_count: u32,
    star_model_buffer: Buffer,
    star_bind: BindGroup,

    white_view: TextureView,
    mesh_sampler: Sampler,

    fog_color: wgpu::Color,
    fog_density: f32,
    star_color: [f32; 3],
}

const SCENE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

impl Renderer {
    pub fn new(
        window: Arc<Window>,
        config: &BackdropConfig,
        scene: &Scene,
        overlay_size: (u32, u32),
    ) -> Result<Self> {
        let size = window.inner_size();
        let width = size.width.max(1);
        let height = size.height.max(1);

        let instance = Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance.create_surface(window)?;
        let (gpu, adapter) = pollster::block_on(GpuContext::new_for_surface(&instance, &surface))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let surface_config = SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(gpu.device(), &surface_config);

        let device = gpu.device();

        let scene_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Scene Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let model_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Model Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
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
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let star_model_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Star Model Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let scene_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Scene Uniform Buffer"),
            size: std::mem::size_of::<SceneUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let scene_bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Scene Bind Group"),
            layout: &scene_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: scene_buffer.as_entire_binding(),
            }],
        });

        let mesh_pipeline = Self::create_mesh_pipeline(device, &scene_layout, &model_layout);
        let star_pipeline = Self::create_star_pipeline(device, &scene_layout, &star_model_layout);

        let white_view = Self::create_white_texture(&gpu);
        let mesh_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Mesh Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let draw_nodes = scene
            .mesh_nodes()
            .map(|(node, mesh, material)| {
                let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Mesh Vertex Buffer"),
                    contents: bytemuck::cast_slice(&mesh.vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                });
                let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Mesh Index Buffer"),
                    contents: bytemuck::cast_slice(&mesh.indices),
                    usage: wgpu::BufferUsages::INDEX,
                });
                let model_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("Model Uniform Buffer"),
                    size: std::mem::size_of::<ModelUniform>() as u64,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });

                let (view, textured) = match &material.texture {
                    Some(image) => (Self::upload_texture(&gpu, image), true),
                    None => (white_view.clone(), false),
                };
                let bind_group = Self::create_model_bind_group(
                    device,
                    &model_layout,
                    &model_buffer,
                    &view,
                    &mesh_sampler,
                );

                DrawNode {
                    node,
                    vertex_buffer,
                    index_buffer,
                    index_count: mesh.indices.len() as u32,
                    model_buffer,
                    bind_group,
                    textured,
                }
            })
            .collect();

        let star_positions: &[f32] = match scene.starfield().map(|id| &scene.node(id).kind) {
            Some(NodeKind::StarField { positions, .. }) => positions,
            _ => &[],
        };
        let star_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Star Vertex Buffer"),
            contents: bytemuck::cast_slice(star_positions),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let star_count = (star_positions.len() / 3) as u32;

        let star_model_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Star Model Uniform Buffer"),
            size: std::mem::size_of::<ModelUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let star_bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Star Bind Group"),
            layout: &star_model_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: star_model_buffer.as_entire_binding(),
            }],
        });

        let post = PostProcessPipeline::new(
            gpu.clone(),
            surface_format,
            width,
            height,
            config.bloom,
            overlay_size,
        );

        let fog_color = wgpu::Color {
            r: config.fog_color[0] as f64,
            g: config.fog_color[1] as f64,
            b: config.fog_color[2] as f64,
            a: 1.0,
        };

        Ok(Self {
            gpu,
            surface,
            surface_config,
            post,
            mesh_pipeline,
            star_pipeline,
            scene_buffer,
            scene_bind,
            model_layout,
            draw_nodes,
            star_buffer,
            star_count,
            star_model_buffer,
            star_bind,
            white_view,
            mesh_sampler,
            fog_color,
            fog_density: config.fog_density,
            star_color: config.starfield.color,
        })
    }

    fn create_mesh_pipeline(
        device: &Device,
        scene_layout: &BindGroupLayout,
        model_layout: &BindGroupLayout,
    ) -> RenderPipeline {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Scene Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("scene.wgsl").into()),
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Mesh Pipeline Layout"),
            bind_group_layouts: &[scene_layout, model_layout],
            push_constant_ranges: &[],
        });

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Mesh Pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<Vertex>() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2],
                }],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: SCENE_FORMAT,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                // The ring is visible from both sides.
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    }

    fn create_star_pipeline(
        device: &Device,
        scene_layout: &BindGroupLayout,
        star_model_layout: &BindGroupLayout,
    ) -> RenderPipeline {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Star Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("stars.wgsl").into()),
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Star Pipeline Layout"),
            bind_group_layouts: &[scene_layout, star_model_layout],
            push_constant_ranges: &[],
        });

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Star Pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: (3 * std::mem::size_of::<f32>()) as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x3],
                }],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: SCENE_FORMAT,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::PointList,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                // Stars never occlude bodies.
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    }

    /// 1x1 white placeholder bound to every mesh until its texture arrives.
    fn create_white_texture(gpu: &GpuContext) -> TextureView {
        let texture = gpu.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("White Texture"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        gpu.queue().write_texture(
            texture.as_image_copy(),
            &[255, 255, 255, 255],
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4),
                rows_per_image: Some(1),
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }

    fn upload_texture(gpu: &GpuContext, image: &TextureImage) -> TextureView {
        let texture = gpu.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("Surface Texture"),
            size: wgpu::Extent3d {
                width: image.width,
                height: image.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        gpu.queue().write_texture(
            texture.as_image_copy(),
            &image.pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * image.width),
                rows_per_image: Some(image.height),
            },
            wgpu::Extent3d {
                width: image.width,
                height: image.height,
                depth_or_array_layers: 1,
            },
        );
        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }

    fn create_model_bind_group(
        device: &Device,
        layout: &BindGroupLayout,
        model_buffer: &Buffer,
        view: &TextureView,
        sampler: &Sampler,
    ) -> BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Model Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: model_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        })
    }

    /// Uploads per-node uniforms for this frame, swapping in any surface
    /// texture that finished loading since the last one.
    fn sync_draw_nodes(&mut self, scene: &Scene) {
        for draw in &mut self.draw_nodes {
            let node = scene.node(draw.node);
            let NodeKind::Mesh { material, .. } = &node.kind else {
                continue;
            };

            if !draw.textured {
                if let Some(image) = &material.texture {
                    let view = Self::upload_texture(&self.gpu, image);
                    draw.bind_group = Self::create_model_bind_group(
                        self.gpu.device(),
                        &self.model_layout,
                        &draw.model_buffer,
                        &view,
                        &self.mesh_sampler,
                    );
                    draw.textured = true;
                }
            }

            let uniform = ModelUniform::new(
                scene.world_transform(draw.node),
                material,
                draw.textured,
            );
            self.gpu
                .queue()
                .write_buffer(&draw.model_buffer, 0, bytemuck::cast_slice(&[uniform]));
        }

        if let Some(starfield) = scene.starfield() {
            let model = scene.world_transform(starfield);
            let material = Material::unlit(self.star_color, STAR_OPACITY);
            let uniform = ModelUniform::new(model, &material, false);
            self.gpu
                .queue()
                .write_buffer(&self.star_model_buffer, 0, bytemuck::cast_slice(&[uniform]));
        }
    }

    fn write_scene_uniform(&self, scene: &Scene, camera: &ParallaxCamera) {
        let position = camera.position();
        let (light_pos, light_color, light_intensity) = scene
            .key_light()
            .unwrap_or((glam::Vec3::ZERO, [0.0, 0.0, 0.0], 0.0));

        let uniform = SceneUniform {
            view_proj: camera.view_proj().to_cols_array_2d(),
            camera_pos: [position.x, position.y, position.z, self.fog_density],
            fog_color: [
                self.fog_color.r as f32,
                self.fog_color.g as f32,
                self.fog_color.b as f32,
                scene.ambient_intensity(),
            ],
            light_pos: [light_pos.x, light_pos.y, light_pos.z, light_intensity],
            light_color: [light_color[0], light_color[1], light_color[2], 1.0],
        };
        self.gpu
            .queue()
            .write_buffer(&self.scene_buffer, 0, bytemuck::cast_slice(&[uniform]));
    }
}

impl FrameSink for Renderer {
    /// Produce one frame: base scene pass into the offscreen target, then
    /// the full post chain onto the surface. Returns `Ok(false)` without
    /// touching the surface when the frame cannot render this tick.
    fn render(
        &mut self,
        scene: &Scene,
        camera: &ParallaxCamera,
    ) -> std::result::Result<bool, Box<dyn std::error::Error>> {
        if self.surface_config.width == 0 || self.surface_config.height == 0 {
            return Ok(false);
        }

        let surface_texture = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::OutOfMemory) => {
                return Err("Surface out of memory".into());
            }
            Err(err) => {
                // Lost / Outdated / Timeout: reconfigure and skip the frame.
                log::warn!("Skipping frame after surface error: {:?}", err);
                self.surface
                    .configure(self.gpu.device(), &self.surface_config);
                return Ok(false);
            }
        };
        let surface_view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.write_scene_uniform(scene, camera);
        self.sync_draw_nodes(scene);

        let mut encoder = self
            .gpu
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: self.post.scene_view(),
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.fog_color),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: self.post.depth_view(),
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_bind_group(0, &self.scene_bind, &[]);

            if self.star_count > 0 {
                pass.set_pipeline(&self.star_pipeline);
                pass.set_bind_group(1, &self.star_bind, &[]);
                pass.set_vertex_buffer(0, self.star_buffer.slice(..));
                pass.draw(0..self.star_count, 0..1);
            }

            pass.set_pipeline(&self.mesh_pipeline);
            for draw in &self.draw_nodes {
                pass.set_bind_group(1, &draw.bind_group, &[]);
                pass.set_vertex_buffer(0, draw.vertex_buffer.slice(..));
                pass.set_index_buffer(draw.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..draw.index_count, 0, 0..1);
            }
        }

        self.post.encode(&mut encoder, &surface_view);

        self.gpu.queue().submit(Some(encoder.finish()));
        surface_texture.present();

        Ok(true)
    }

    /// Reconfigures the surface and resizes every post target in lockstep.
    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            // Remember the degenerate size so render() skips frames until a
            // real size arrives.
            self.surface_config.width = 0;
            self.surface_config.height = 0;
            return;
        }

        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface
            .configure(self.gpu.device(), &self.surface_config);
        self.post.resize(width, height);
    }

    /// Uploads the overlay canvas for the next composite pass.
    fn update_overlay(&mut self, canvas: Option<&Canvas>) {
        self.post.update_overlay(canvas);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_uniform_matches_wgsl_layout() {
        // mat4 + four vec4s.
        assert_eq!(std::mem::size_of::<SceneUniform>(), 64 + 4 * 16);
    }

    #[test]
    fn model_uniform_matches_wgsl_layout() {
        assert_eq!(std::mem::size_of::<ModelUniform>(), 64 + 3 * 16);
    }

    #[test]
    fn model_uniform_encodes_material_flags() {
        let material = Material::standard([0.2, 0.4, 0.6], None);
        let uniform = ModelUniform::new(glam::Mat4::IDENTITY, &material, true);
        assert_eq!(uniform.color[3], 1.0);
        assert_eq!(uniform.emissive[3], 1.0);
        assert_eq!(uniform.params[2], 0.0);

        let unlit = Material::unlit([1.0, 1.0, 1.0], 0.4);
        let uniform = ModelUniform::new(glam::Mat4::IDENTITY, &unlit, false);
        assert_eq!(uniform.color[3], 0.4);
        assert_eq!(uniform.emissive[3], 0.0);
        assert_eq!(uniform.params[2], 1.0);
    }

    #[test]
    fn gpu_context_is_cheaply_cloneable() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<GpuContext>();
    }
}
