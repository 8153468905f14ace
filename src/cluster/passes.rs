//! wgpu pipelines for the cluster assignment passes.
//!
//! List pass: instanced proxy quads rasterize each light's tile/slice
//! footprint into the RGBA8 list target with additive (ONE, ONE) blending.
//! Master pass: fullscreen reduction of list rows into per-tile occupancy
//! words. Super-master pass: optional 8x reduction of master.

use super::ClusterGrid;
use crate::error::CandelaError;
use crate::gpu::{ClusterTargets, GpuContext, LightTextures};
use crate::view::CameraState;

/// Uniform block shared by the list and master shaders. Layout must match
/// `ClusterUniforms` in `assets/shaders/cluster/*.wgsl`.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct ClusterUniforms {
    cluster_params: [f32; 4],
    slice_params: [i32; 4],
    counts: [f32; 4],
    proj: [f32; 4],
    grid: [u32; 4],
    misc: [f32; 4],
}

fn uniform_entry(
    binding: u32,
    visibility: wgpu::ShaderStages,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn texture_entry(
    binding: u32,
    visibility: wgpu::ShaderStages,
    sample_type: wgpu::TextureSampleType,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Texture {
            sample_type,
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

const UNFILTERED: wgpu::TextureSampleType =
    wgpu::TextureSampleType::Float { filterable: false };

struct ListPass {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
}

impl ListPass {
    fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Cluster List Shader"),
            source: wgpu::ShaderSource::Wgsl(
                include_str!("../../assets/shaders/cluster/list.wgsl").into(),
            ),
        });
        let layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Cluster List Bind Group Layout"),
                entries: &[
                    uniform_entry(
                        0,
                        wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ),
                    texture_entry(1, wgpu::ShaderStages::VERTEX, UNFILTERED),
                    texture_entry(2, wgpu::ShaderStages::VERTEX, UNFILTERED),
                    texture_entry(3, wgpu::ShaderStages::VERTEX, UNFILTERED),
                ],
            });
        let pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Cluster List Pipeline Layout"),
                bind_group_layouts: &[&layout],
                push_constant_ranges: &[],
            });
        // Additive blending ORs the per-light channel bits into the union
        let blend = wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
        };
        let pipeline =
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Cluster List Pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: wgpu::TextureFormat::Rgba8Unorm,
                        blend: Some(blend),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleStrip,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });
        Self { pipeline, layout }
    }

    fn bind(
        &self,
        device: &wgpu::Device,
        uniforms: &wgpu::Buffer,
        lights: &LightTextures,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Cluster List Bind Group"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(
                        lights.point_view(),
                    ),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(
                        lights.spot_view(),
                    ),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(
                        lights.rect_view(),
                    ),
                },
            ],
        })
    }
}

struct MasterPass {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    format: wgpu::TextureFormat,
}

impl MasterPass {
    fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Cluster Master Shader"),
            source: wgpu::ShaderSource::Wgsl(
                include_str!("../../assets/shaders/cluster/master.wgsl").into(),
            ),
        });
        let layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Cluster Master Bind Group Layout"),
                entries: &[
                    uniform_entry(0, wgpu::ShaderStages::FRAGMENT),
                    texture_entry(1, wgpu::ShaderStages::FRAGMENT, UNFILTERED),
                ],
            });
        let pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Cluster Master Pipeline Layout"),
                bind_group_layouts: &[&layout],
                push_constant_ranges: &[],
            });
        let pipeline =
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Cluster Master Pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });
        Self {
            pipeline,
            layout,
            format,
        }
    }

    fn bind(
        &self,
        device: &wgpu::Device,
        uniforms: &wgpu::Buffer,
        list_view: &wgpu::TextureView,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Cluster Master Bind Group"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(list_view),
                },
            ],
        })
    }
}

struct SuperMasterPass {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
}

impl SuperMasterPass {
    fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Cluster Super Master Shader"),
            source: wgpu::ShaderSource::Wgsl(
                include_str!("../../assets/shaders/cluster/super_master.wgsl")
                    .into(),
            ),
        });
        let layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Cluster Super Master Bind Group Layout"),
                entries: &[texture_entry(
                    0,
                    wgpu::ShaderStages::FRAGMENT,
                    wgpu::TextureSampleType::Uint,
                )],
            });
        let pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Cluster Super Master Pipeline Layout"),
                bind_group_layouts: &[&layout],
                push_constant_ranges: &[],
            });
        let pipeline =
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Cluster Super Master Pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: wgpu::TextureFormat::R8Uint,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });
        Self { pipeline, layout }
    }

    fn bind(
        &self,
        device: &wgpu::Device,
        master_view: &wgpu::TextureView,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Cluster Super Master Bind Group"),
            layout: &self.layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(master_view),
            }],
        })
    }
}

/// The complete cluster assignment pipeline: render targets, pass
/// pipelines, bind groups, and the shared uniform buffer.
pub(crate) struct ClusterPipeline {
    uniforms: wgpu::Buffer,
    targets: ClusterTargets,
    list: ListPass,
    master: MasterPass,
    super_master: Option<SuperMasterPass>,
    list_bind: wgpu::BindGroup,
    master_bind: wgpu::BindGroup,
    super_bind: Option<wgpu::BindGroup>,
}

impl ClusterPipeline {
    pub(crate) fn new(
        context: &GpuContext,
        grid: &ClusterGrid,
        enable_super_master: bool,
        lights: &LightTextures,
    ) -> Result<Self, CandelaError> {
        let device = &context.device;
        let targets = ClusterTargets::new(context, grid, enable_super_master)?;

        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Cluster Uniforms"),
            size: std::mem::size_of::<ClusterUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let list = ListPass::new(device);
        let master = MasterPass::new(device, targets.master_format);
        let super_master =
            enable_super_master.then(|| SuperMasterPass::new(device));

        let list_bind = list.bind(device, &uniforms, lights);
        let master_bind = master.bind(device, &uniforms, &targets.list.view);
        let super_bind = super_master.as_ref().map(|pass| {
            pass.bind(device, &targets.master.view)
        });

        Ok(Self {
            uniforms,
            targets,
            list,
            master,
            super_master,
            list_bind,
            master_bind,
            super_bind,
        })
    }

    /// The pipeline's render targets (for the engine's texture accessors).
    pub(crate) fn targets(&self) -> &ClusterTargets {
        &self.targets
    }

    /// Recreate targets and dependent state after a grid change.
    pub(crate) fn rebuild(
        &mut self,
        context: &GpuContext,
        grid: &ClusterGrid,
        lights: &LightTextures,
    ) -> Result<(), CandelaError> {
        let enable_super = self.super_master.is_some();
        self.targets = ClusterTargets::new(context, grid, enable_super)?;
        if self.targets.master_format != self.master.format {
            log::debug!(
                "master texture format changed to {:?}",
                self.targets.master_format
            );
            self.master =
                MasterPass::new(&context.device, self.targets.master_format);
        }
        self.rebind(context, lights);
        Ok(())
    }

    /// Rebuild all bind groups (after light textures were recreated).
    pub(crate) fn rebind(&mut self, context: &GpuContext, lights: &LightTextures) {
        let device = &context.device;
        self.list_bind = self.list.bind(device, &self.uniforms, lights);
        self.master_bind =
            self.master.bind(device, &self.uniforms, &self.targets.list.view);
        self.super_bind = self.super_master.as_ref().map(|pass| {
            pass.bind(device, &self.targets.master.view)
        });
    }

    /// Refresh the shared uniform block.
    pub(crate) fn write_uniforms(
        &self,
        queue: &wgpu::Queue,
        grid: &ClusterGrid,
        camera: &CameraState,
        counts: [u32; 3],
        point_texture_width: u32,
        max_tile_span: f32,
    ) {
        let scale = camera.proj_scale();
        let [list_w, list_h] = grid.list_size();
        let uniforms = ClusterUniforms {
            cluster_params: grid.cluster_params(camera).to_array(),
            slice_params: grid.slice_params().to_array(),
            counts: [
                counts[0] as f32,
                counts[1] as f32,
                counts[2] as f32,
                (counts[0] + counts[1] + counts[2]) as f32,
            ],
            proj: [scale.x, scale.y, camera.znear, camera.zfar],
            grid: [grid.groups_per_word, point_texture_width, list_w, list_h],
            misc: [max_tile_span, 0.0, 0.0, 0.0],
        };
        queue.write_buffer(&self.uniforms, 0, bytemuck::bytes_of(&uniforms));
    }

    /// Record the list → master → super-master passes.
    pub(crate) fn encode(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        instance_count: u32,
    ) {
        {
            let mut pass =
                encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Cluster List Pass"),
                    color_attachments: &[Some(
                        wgpu::RenderPassColorAttachment {
                            view: &self.targets.list.view,
                            depth_slice: None,
                            resolve_target: None,
                            ops: wgpu::Operations {
                                load: wgpu::LoadOp::Clear(
                                    wgpu::Color::TRANSPARENT,
                                ),
                                store: wgpu::StoreOp::Store,
                            },
                        },
                    )],
                    ..Default::default()
                });
            if instance_count > 0 {
                pass.set_pipeline(&self.list.pipeline);
                pass.set_bind_group(0, &self.list_bind, &[]);
                pass.draw(0..4, 0..instance_count);
            }
        }

        {
            let mut pass =
                encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Cluster Master Pass"),
                    color_attachments: &[Some(
                        wgpu::RenderPassColorAttachment {
                            view: &self.targets.master.view,
                            depth_slice: None,
                            resolve_target: None,
                            ops: wgpu::Operations {
                                load: wgpu::LoadOp::Clear(
                                    wgpu::Color::TRANSPARENT,
                                ),
                                store: wgpu::StoreOp::Store,
                            },
                        },
                    )],
                    ..Default::default()
                });
            pass.set_pipeline(&self.master.pipeline);
            pass.set_bind_group(0, &self.master_bind, &[]);
            pass.draw(0..3, 0..1);
        }

        if let (Some(super_pass), Some(bind), Some(target)) = (
            self.super_master.as_ref(),
            self.super_bind.as_ref(),
            self.targets.super_master.as_ref(),
        ) {
            let mut pass =
                encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Cluster Super Master Pass"),
                    color_attachments: &[Some(
                        wgpu::RenderPassColorAttachment {
                            view: &target.view,
                            depth_slice: None,
                            resolve_target: None,
                            ops: wgpu::Operations {
                                load: wgpu::LoadOp::Clear(
                                    wgpu::Color::TRANSPARENT,
                                ),
                                store: wgpu::StoreOp::Store,
                            },
                        },
                    )],
                    ..Default::default()
                });
            pass.set_pipeline(&super_pass.pipeline);
            pass.set_bind_group(0, bind, &[]);
            pass.draw(0..3, 0..1);
        }
    }
}
