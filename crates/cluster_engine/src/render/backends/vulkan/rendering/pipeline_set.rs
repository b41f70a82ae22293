//! The five frame pipelines and their shared layout
//!
//! All pipelines use one pipeline layout: the scene descriptor set plus a
//! single push-constant range covering [`PushConstants`] in every stage.
//! Graphics pipelines target dynamic rendering and pull vertices from the
//! scene buffer, so they declare no vertex input.

use ash::{vk, Device};
use std::ffi::CStr;

use crate::core::config::{RendererConfig, ShaderConfig};
use crate::render::backends::vulkan::resources::descriptor::scene_stages;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};
use crate::render::scene::PushConstants;
use crate::render::sequencer::{Pass, PassSet};

use super::shader::ShaderModule;

const ENTRY_POINT: &[u8] = b"main\0";

fn entry_point() -> &'static CStr {
    // SAFETY: the literal is NUL-terminated with no interior NULs
    unsafe { CStr::from_bytes_with_nul_unchecked(ENTRY_POINT) }
}

/// Fixed-function setup of one graphics pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphicsPassConfig {
    /// Vertex shader path
    pub vertex_shader: String,
    /// Fragment shader path, if the pass has one
    pub fragment_shader: Option<String>,
    /// Whether the pass writes the swapchain image
    pub writes_color: bool,
    /// Whether the pass writes depth
    pub depth_write: bool,
    /// Depth comparison
    pub depth_compare: vk::CompareOp,
}

impl GraphicsPassConfig {
    /// Setup for `pass`, or `None` for compute passes
    pub fn for_pass(pass: Pass, shaders: &ShaderConfig) -> Option<Self> {
        match pass {
            Pass::Cluster | Pass::CullObjects => None,
            Pass::MeshletVisibility => Some(Self {
                vertex_shader: shaders.meshlet_vert.clone(),
                fragment_shader: Some(shaders.meshlet_frag.clone()),
                writes_color: false,
                depth_write: true,
                depth_compare: vk::CompareOp::LESS,
            }),
            Pass::DepthPrepass => Some(Self {
                vertex_shader: shaders.zprepass_vert.clone(),
                fragment_shader: None,
                writes_color: false,
                depth_write: true,
                depth_compare: vk::CompareOp::LESS,
            }),
            // Only the fragments that won the prepass get shaded
            Pass::Shading => Some(Self {
                vertex_shader: shaders.main_vert.clone(),
                fragment_shader: Some(shaders.main_frag.clone()),
                writes_color: true,
                depth_write: false,
                depth_compare: vk::CompareOp::EQUAL,
            }),
        }
    }
}

/// Compute shader path and workgroup size for a compute pass
pub fn compute_pass_setup(pass: Pass, config: &RendererConfig) -> Option<(&str, [u32; 3])> {
    match pass {
        Pass::Cluster => Some((config.shaders.cluster_comp.as_str(), config.cluster_local_size)),
        Pass::CullObjects => Some((config.shaders.object_comp.as_str(), [config.cull_local_size, 1, 1])),
        _ => None,
    }
}

/// Attachment formats the graphics pipelines render into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentFormats {
    /// Swapchain format
    pub color: vk::Format,
    /// Depth format
    pub depth: vk::Format,
}

/// One pipeline per pass, built once at startup
pub struct PipelineSet {
    device: Device,
    layout: vk::PipelineLayout,
    pipelines: [vk::Pipeline; 5],
    built: PassSet,
}

impl PipelineSet {
    /// Create a new pipeline set; fails unless every pass builds
    pub fn new(
        device: Device,
        descriptor_layout: vk::DescriptorSetLayout,
        config: &RendererConfig,
        formats: AttachmentFormats,
    ) -> VulkanResult<Self> {
        let push_constant_ranges = [vk::PushConstantRange {
            stage_flags: scene_stages(),
            offset: 0,
            size: PushConstants::SIZE,
        }];
        let set_layouts = [descriptor_layout];
        let layout_info = vk::PipelineLayoutCreateInfo::builder()
            .set_layouts(&set_layouts)
            .push_constant_ranges(&push_constant_ranges);
        let layout = unsafe {
            device
                .create_pipeline_layout(&layout_info, None)
                .map_err(VulkanError::api("vkCreatePipelineLayout"))?
        };

        // Drop destroys whatever was built if a later pass fails
        let mut set = Self {
            device,
            layout,
            pipelines: [vk::Pipeline::null(); 5],
            built: PassSet::empty(),
        };

        for (index, pass) in Pass::ALL.into_iter().enumerate() {
            let pipeline = if pass.is_compute() {
                set.create_compute(pass, config)?
            } else {
                set.create_graphics(pass, &config.shaders, formats)?
            };
            set.pipelines[index] = pipeline;
            set.built |= pass.flag();
            log::debug!("Created {} pipeline", pass.name());
        }

        log::info!("Pipeline set ready ({} passes)", set.built.passes().count());
        Ok(set)
    }

    /// Shared pipeline layout
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }

    /// Pipeline for `pass`
    pub fn pipeline(&self, pass: Pass) -> vk::Pipeline {
        self.pipelines[pass_index(pass)]
    }

    /// Bind point `pass` runs at
    pub fn bind_point(pass: Pass) -> vk::PipelineBindPoint {
        if pass.is_compute() {
            vk::PipelineBindPoint::COMPUTE
        } else {
            vk::PipelineBindPoint::GRAPHICS
        }
    }

    /// Passes that were built
    pub fn passes(&self) -> PassSet {
        self.built
    }

    fn create_compute(&self, pass: Pass, config: &RendererConfig) -> VulkanResult<vk::Pipeline> {
        let (path, local_size) = compute_pass_setup(pass, config).ok_or_else(|| VulkanError::InvalidOperation {
            reason: format!("{} is not a compute pass", pass.name()),
        })?;
        let module = ShaderModule::from_file(self.device.clone(), pass.name(), path)?;

        // local_size_x/y/z are specialization constants 0, 1 and 2
        let map_entries = [0u32, 1, 2].map(|id| {
            vk::SpecializationMapEntry::builder()
                .constant_id(id)
                .offset(id * 4)
                .size(4)
                .build()
        });
        let data: Vec<u8> = local_size.iter().flat_map(|v| v.to_ne_bytes()).collect();
        let specialization = vk::SpecializationInfo::builder()
            .map_entries(&map_entries)
            .data(&data);

        let stage = vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::COMPUTE)
            .module(module.handle())
            .name(entry_point())
            .specialization_info(&specialization);
        let create_info = vk::ComputePipelineCreateInfo::builder()
            .stage(stage.build())
            .layout(self.layout);

        let pipelines = unsafe {
            self.device
                .create_compute_pipelines(vk::PipelineCache::null(), &[create_info.build()], None)
                .map_err(|(_, err)| VulkanError::api("vkCreateComputePipelines")(err))?
        };
        first_pipeline(pipelines, pass)
    }

    fn create_graphics(
        &self,
        pass: Pass,
        shaders: &ShaderConfig,
        formats: AttachmentFormats,
    ) -> VulkanResult<vk::Pipeline> {
        let pass_config = GraphicsPassConfig::for_pass(pass, shaders).ok_or_else(|| VulkanError::InvalidOperation {
            reason: format!("{} is not a graphics pass", pass.name()),
        })?;

        let vertex = ShaderModule::from_file(self.device.clone(), pass.name(), &pass_config.vertex_shader)?;
        let fragment = pass_config
            .fragment_shader
            .as_ref()
            .map(|path| ShaderModule::from_file(self.device.clone(), pass.name(), path))
            .transpose()?;

        let mut stages = vec![vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(vertex.handle())
            .name(entry_point())
            .build()];
        if let Some(fragment) = &fragment {
            stages.push(
                vk::PipelineShaderStageCreateInfo::builder()
                    .stage(vk::ShaderStageFlags::FRAGMENT)
                    .module(fragment.handle())
                    .name(entry_point())
                    .build(),
            );
        }

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder();
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);
        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);
        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::BACK)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .depth_bias_enable(false);
        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);
        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(true)
            .depth_write_enable(pass_config.depth_write)
            .depth_compare_op(pass_config.depth_compare)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let color_blend_attachments = [vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false)
            .build()];
        let color_formats = [formats.color];
        let (color_blend_attachments, color_formats): (&[_], &[_]) = if pass_config.writes_color {
            (&color_blend_attachments, &color_formats)
        } else {
            (&[], &[])
        };
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(color_blend_attachments);

        let mut rendering_info = vk::PipelineRenderingCreateInfo::builder()
            .color_attachment_formats(color_formats)
            .depth_attachment_format(formats.depth);

        let create_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(self.layout)
            .push_next(&mut rendering_info);

        let pipelines = unsafe {
            self.device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[create_info.build()], None)
                .map_err(|(_, err)| VulkanError::api("vkCreateGraphicsPipelines")(err))?
        };
        first_pipeline(pipelines, pass)
    }
}

impl Drop for PipelineSet {
    fn drop(&mut self) {
        unsafe {
            for &pipeline in &self.pipelines {
                if pipeline != vk::Pipeline::null() {
                    self.device.destroy_pipeline(pipeline, None);
                }
            }
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

fn pass_index(pass: Pass) -> usize {
    Pass::ALL.iter().position(|&p| p == pass).unwrap_or_default()
}

fn first_pipeline(pipelines: Vec<vk::Pipeline>, pass: Pass) -> VulkanResult<vk::Pipeline> {
    pipelines.into_iter().next().ok_or_else(|| VulkanError::ShaderUnavailable {
        pass: pass.name(),
        reason: "driver returned no pipeline".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_shading_writes_color() {
        let shaders = ShaderConfig::in_directory("shaders");
        let graphics: Vec<_> = Pass::ALL
            .into_iter()
            .filter_map(|pass| GraphicsPassConfig::for_pass(pass, &shaders).map(|c| (pass, c)))
            .collect();
        assert_eq!(graphics.len(), 3);
        for (pass, config) in graphics {
            assert_eq!(config.writes_color, pass == Pass::Shading);
        }
    }

    #[test]
    fn test_shading_reuses_prepass_depth() {
        let shaders = ShaderConfig::in_directory("shaders");
        let shading = GraphicsPassConfig::for_pass(Pass::Shading, &shaders);
        let prepass = GraphicsPassConfig::for_pass(Pass::DepthPrepass, &shaders);
        assert_eq!(shading.as_ref().map(|c| (c.depth_write, c.depth_compare)), Some((false, vk::CompareOp::EQUAL)));
        assert_eq!(prepass.as_ref().map(|c| c.fragment_shader.is_none()), Some(true));
    }

    #[test]
    fn test_compute_setup_uses_configured_local_sizes() {
        let mut config = RendererConfig::default();
        config.cull_local_size = 64;
        config.cluster_local_size = [3, 3, 3];
        assert_eq!(compute_pass_setup(Pass::CullObjects, &config).map(|(_, size)| size), Some([64, 1, 1]));
        assert_eq!(compute_pass_setup(Pass::Cluster, &config).map(|(_, size)| size), Some([3, 3, 3]));
        assert!(compute_pass_setup(Pass::Shading, &config).is_none());
    }

    #[test]
    fn test_pass_indices_follow_frame_order() {
        for (i, pass) in Pass::ALL.into_iter().enumerate() {
            assert_eq!(pass_index(pass), i);
        }
    }
}
