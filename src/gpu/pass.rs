use std::borrow::Cow;

use smallvec::SmallVec;

use super::GpuContext;
use crate::errors::{Result, SsfxError};
use crate::shaders::{EffectKind, ShaderProgram};
use crate::targets::RenderTargetManager;

/// One effect program compiled into a fullscreen render pipeline.
///
/// Group 0 holds the program's texture slots, group 1 binding 0 its `Params`
/// uniform block. Both layouts come from the program's reflection, so a
/// hot-reloaded source with different slots gets a matching pipeline.
pub struct DevicePass {
    effect: EffectKind,
    source_hash: u128,
    pipeline: wgpu::RenderPipeline,
    texture_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    uniform_group: wgpu::BindGroup,
    slots: SmallVec<[u32; 4]>,
}

impl DevicePass {
    pub fn new(
        gpu: &GpuContext,
        program: &ShaderProgram,
        output_format: wgpu::TextureFormat,
    ) -> Result<Self> {
        let effect = program.effect();
        let device = &gpu.device;
        let label = effect.name();

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(program.wgsl())),
        });

        let slots: SmallVec<[u32; 4]> = program.texture_slots().map(|(slot, _)| slot).collect();
        let texture_entries: SmallVec<[wgpu::BindGroupLayoutEntry; 4]> = slots
            .iter()
            .map(|&binding| wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            })
            .collect();
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Effect Textures Layout"),
            entries: &texture_entries,
        });

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Effect Params Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let block = program.pack_uniforms();
        if block.is_empty() {
            return Err(SsfxError::ShaderCompile {
                effect,
                diagnostic: "program declares no uniform block".to_string(),
            });
        }
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Effect Params"),
            size: block.len() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Effect Params BindGroup"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Effect Pipeline Layout"),
            bind_group_layouts: &[Some(&texture_layout), Some(&uniform_layout)],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: output_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        log::debug!("Built {effect} GPU pipeline ({} texture slots)", slots.len());

        Ok(Self {
            effect,
            source_hash: program.source_hash(),
            pipeline,
            texture_layout,
            uniform_buffer,
            uniform_group,
            slots,
        })
    }

    #[inline]
    #[must_use]
    pub fn effect(&self) -> EffectKind {
        self.effect
    }

    /// Hash of the expanded WGSL this pipeline was built from.
    #[inline]
    #[must_use]
    pub fn source_hash(&self) -> u128 {
        self.source_hash
    }

    /// Uploads the program's uniforms and records the fullscreen draw.
    ///
    /// Fails without recording anything if a slot is unbound or a target is
    /// not on the GPU.
    pub fn encode(
        &self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        targets: &RenderTargetManager,
        program: &ShaderProgram,
    ) -> Result<()> {
        let mut entries: SmallVec<[wgpu::BindGroupEntry; 4]> = SmallVec::new();
        for &slot in &self.slots {
            let name = program.bound_target(slot)?;
            let view = targets.target(name).view().ok_or(SsfxError::WrongResidency(name))?;
            entries.push(wgpu::BindGroupEntry {
                binding: slot,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }

        let output_name = self.effect.output_target();
        let output = targets
            .target(output_name)
            .view()
            .ok_or(SsfxError::WrongResidency(output_name))?;

        let texture_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Effect Textures BindGroup"),
            layout: &self.texture_layout,
            entries: &entries,
        });

        gpu.queue
            .write_buffer(&self.uniform_buffer, 0, &program.pack_uniforms());

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(self.effect.name()),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: output,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            ..Default::default()
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &texture_group, &[]);
        pass.set_bind_group(1, &self.uniform_group, &[]);
        pass.draw(0..3, 0..1);
        Ok(())
    }
}
