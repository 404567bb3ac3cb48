// Graphics pipeline assembly
//
// The fixed-function configuration for drawing a triangle whose vertices
// live inside the vertex shader. Only the pipeline layout is created on the
// device for now; the description keeps every other stage so a pipeline
// can be built from it once a render pass exists.

use ash::vk;
use std::ffi::CStr;

use super::error::{InitError, InitResult};

/// Entry point every shader stage uses.
pub const SHADER_ENTRY_POINT: &CStr = c"main";

/// One programmable stage.
#[derive(Debug, Clone, Copy)]
pub struct ShaderStage {
    pub stage: vk::ShaderStageFlags,
    pub module: vk::ShaderModule,
}

/// Immutable description of every pipeline stage.
#[derive(Debug, Clone)]
pub struct PipelineDescription {
    pub stages: Vec<ShaderStage>,
    pub vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    pub vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    pub input_assembly: vk::PipelineInputAssemblyStateCreateInfo,
    pub viewport: vk::Viewport,
    pub scissor: vk::Rect2D,
    pub rasterization: vk::PipelineRasterizationStateCreateInfo,
    pub multisample: vk::PipelineMultisampleStateCreateInfo,
    pub color_blend_attachment: vk::PipelineColorBlendAttachmentState,
}

impl PipelineDescription {
    /// Vertex + fragment stages drawing into a target of `extent`.
    pub fn new(
        extent: vk::Extent2D,
        vertex: vk::ShaderModule,
        fragment: vk::ShaderModule,
    ) -> Self {
        let stages = vec![
            ShaderStage {
                stage: vk::ShaderStageFlags::VERTEX,
                module: vertex,
            },
            ShaderStage {
                stage: vk::ShaderStageFlags::FRAGMENT,
                module: fragment,
            },
        ];

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false)
            .build();

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };

        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };

        let rasterization = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::BACK)
            .front_face(vk::FrontFace::CLOCKWISE)
            .depth_bias_enable(false)
            .build();

        let multisample = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1)
            .build();

        // Alpha-over: color = a*src + (1-a)*dst, alpha = src alpha
        let color_blend_attachment = vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(true)
            .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
            .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
            .alpha_blend_op(vk::BlendOp::ADD)
            .build();

        Self {
            stages,
            vertex_bindings: Vec::new(),
            vertex_attributes: Vec::new(),
            input_assembly,
            viewport,
            scissor,
            rasterization,
            multisample,
            color_blend_attachment,
        }
    }

    pub fn shader_stage_infos(&self) -> Vec<vk::PipelineShaderStageCreateInfo> {
        self.stages
            .iter()
            .map(|stage| {
                vk::PipelineShaderStageCreateInfo::builder()
                    .stage(stage.stage)
                    .module(stage.module)
                    .name(SHADER_ENTRY_POINT)
                    .build()
            })
            .collect()
    }

    pub fn vertex_input_state(&self) -> vk::PipelineVertexInputStateCreateInfoBuilder<'_> {
        vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&self.vertex_bindings)
            .vertex_attribute_descriptions(&self.vertex_attributes)
    }

    pub fn viewport_state(&self) -> vk::PipelineViewportStateCreateInfoBuilder<'_> {
        vk::PipelineViewportStateCreateInfo::builder()
            .viewports(std::slice::from_ref(&self.viewport))
            .scissors(std::slice::from_ref(&self.scissor))
    }

    pub fn color_blend_state(&self) -> vk::PipelineColorBlendStateCreateInfoBuilder<'_> {
        vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(std::slice::from_ref(&self.color_blend_attachment))
    }

    /// No descriptor sets and no push constants.
    pub fn layout_create_info(&self) -> vk::PipelineLayoutCreateInfo {
        vk::PipelineLayoutCreateInfo::builder().build()
    }
}

/// Create the (empty) pipeline layout for `description`.
pub fn build_pipeline_layout(
    device: &ash::Device,
    description: &PipelineDescription,
) -> InitResult<vk::PipelineLayout> {
    log::debug!(
        "Assembling pipeline: {} stages, {:?}, {}x{} viewport",
        description.stages.len(),
        description.input_assembly.topology,
        description.viewport.width,
        description.viewport.height
    );

    let create_info = description.layout_create_info();
    unsafe { device.create_pipeline_layout(&create_info, None) }
        .map_err(InitError::PipelineLayoutCreationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    // What the fixed-function blender does to one pixel. Factors and ops not
    // listed are treated as `ONE` / `ADD`.
    fn blend(
        state: &vk::PipelineColorBlendAttachmentState,
        src: [f32; 4],
        dst: [f32; 4],
    ) -> [f32; 4] {
        if state.blend_enable == vk::FALSE {
            return src;
        }

        let factor = |factor: vk::BlendFactor, channel: usize| -> f32 {
            match factor {
                vk::BlendFactor::ZERO => 0.0,
                vk::BlendFactor::ONE => 1.0,
                vk::BlendFactor::SRC_COLOR => src[channel],
                vk::BlendFactor::ONE_MINUS_SRC_COLOR => 1.0 - src[channel],
                vk::BlendFactor::DST_COLOR => dst[channel],
                vk::BlendFactor::ONE_MINUS_DST_COLOR => 1.0 - dst[channel],
                vk::BlendFactor::SRC_ALPHA => src[3],
                vk::BlendFactor::ONE_MINUS_SRC_ALPHA => 1.0 - src[3],
                vk::BlendFactor::DST_ALPHA => dst[3],
                vk::BlendFactor::ONE_MINUS_DST_ALPHA => 1.0 - dst[3],
                _ => 1.0,
            }
        };
        let apply = |op: vk::BlendOp, s: f32, d: f32| -> f32 {
            match op {
                vk::BlendOp::SUBTRACT => s - d,
                vk::BlendOp::REVERSE_SUBTRACT => d - s,
                vk::BlendOp::MIN => s.min(d),
                vk::BlendOp::MAX => s.max(d),
                _ => s + d,
            }
        };

        let mut out = [0.0; 4];
        for channel in 0..3 {
            let s = src[channel] * factor(state.src_color_blend_factor, channel);
            let d = dst[channel] * factor(state.dst_color_blend_factor, channel);
            out[channel] = apply(state.color_blend_op, s, d);
        }
        let s = src[3] * factor(state.src_alpha_blend_factor, 3);
        let d = dst[3] * factor(state.dst_alpha_blend_factor, 3);
        out[3] = apply(state.alpha_blend_op, s, d);

        let mask = state.color_write_mask;
        let channels = [
            vk::ColorComponentFlags::R,
            vk::ColorComponentFlags::G,
            vk::ColorComponentFlags::B,
            vk::ColorComponentFlags::A,
        ];
        for (channel, flag) in channels.into_iter().enumerate() {
            if !mask.contains(flag) {
                out[channel] = dst[channel];
            }
        }
        out
    }

    fn description() -> PipelineDescription {
        PipelineDescription::new(
            vk::Extent2D {
                width: 800,
                height: 600,
            },
            vk::ShaderModule::from_raw(1),
            vk::ShaderModule::from_raw(2),
        )
    }

    fn approx(a: [f32; 4], b: [f32; 4]) -> bool {
        a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-6)
    }

    #[test]
    fn vertices_come_from_the_shader() {
        let description = description();
        let state = description.vertex_input_state();

        assert_eq!(state.vertex_binding_description_count, 0);
        assert_eq!(state.vertex_attribute_description_count, 0);
    }

    #[test]
    fn triangle_list_without_restart() {
        let description = description();

        assert_eq!(description.input_assembly.topology, vk::PrimitiveTopology::TRIANGLE_LIST);
        assert_eq!(description.input_assembly.primitive_restart_enable, vk::FALSE);
    }

    #[test]
    fn viewport_and_scissor_match_extent() {
        let description = description();
        let state = description.viewport_state();

        assert_eq!(state.viewport_count, 1);
        assert_eq!(state.scissor_count, 1);
        assert_eq!(description.viewport.width, 800.0);
        assert_eq!(description.viewport.height, 600.0);
        assert_eq!(description.viewport.max_depth, 1.0);
        assert_eq!(description.scissor.extent.width, 800);
        assert_eq!(description.scissor.extent.height, 600);
        assert_eq!(description.scissor.offset.x, 0);
    }

    #[test]
    fn rasterizer_culls_back_faces_clockwise() {
        let raster = description().rasterization;

        assert_eq!(raster.cull_mode, vk::CullModeFlags::BACK);
        assert_eq!(raster.front_face, vk::FrontFace::CLOCKWISE);
        assert_eq!(raster.polygon_mode, vk::PolygonMode::FILL);
        assert_eq!(raster.line_width, 1.0);
        assert_eq!(raster.depth_clamp_enable, vk::FALSE);
        assert_eq!(raster.depth_bias_enable, vk::FALSE);
        assert_eq!(raster.rasterizer_discard_enable, vk::FALSE);
    }

    #[test]
    fn single_sample() {
        let multisample = description().multisample;

        assert_eq!(multisample.rasterization_samples, vk::SampleCountFlags::TYPE_1);
        assert_eq!(multisample.sample_shading_enable, vk::FALSE);
    }

    #[test]
    fn shader_stages_use_main() {
        let description = description();
        let infos = description.shader_stage_infos();

        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].stage, vk::ShaderStageFlags::VERTEX);
        assert_eq!(infos[0].module, vk::ShaderModule::from_raw(1));
        assert_eq!(infos[1].stage, vk::ShaderStageFlags::FRAGMENT);
        let name = unsafe { CStr::from_ptr(infos[1].p_name) };
        assert_eq!(name.to_str().unwrap(), "main");
    }

    #[test]
    fn layout_is_empty() {
        let info = description().layout_create_info();

        assert_eq!(info.set_layout_count, 0);
        assert_eq!(info.push_constant_range_count, 0);
    }

    #[test]
    fn one_blend_attachment_writing_all_channels() {
        let description = description();
        let state = description.color_blend_state();

        assert_eq!(state.attachment_count, 1);
        assert_eq!(state.logic_op_enable, vk::FALSE);
        assert_eq!(
            description.color_blend_attachment.color_write_mask,
            vk::ColorComponentFlags::RGBA
        );
    }

    #[test]
    fn blending_is_alpha_over() {
        let state = description().color_blend_attachment;
        let src = [1.0, 0.0, 0.0, 0.25];
        let dst = [0.0, 0.0, 1.0, 1.0];

        let out = blend(&state, src, dst);

        assert!(approx(out, [0.25, 0.0, 0.75, 0.25]), "{out:?}");
    }

    #[test]
    fn opaque_source_replaces_destination() {
        let state = description().color_blend_attachment;
        let out = blend(&state, [0.2, 0.4, 0.6, 1.0], [0.9, 0.9, 0.9, 0.5]);

        assert!(approx(out, [0.2, 0.4, 0.6, 1.0]), "{out:?}");
    }

    #[test]
    fn write_mask_keeps_destination_channels() {
        let mut state = description().color_blend_attachment;
        state.color_write_mask = vk::ColorComponentFlags::R | vk::ColorComponentFlags::A;

        let out = blend(&state, [1.0, 1.0, 1.0, 0.5], [0.0, 0.2, 0.4, 1.0]);

        assert!(approx(out, [0.5, 0.2, 0.4, 0.5]), "{out:?}");
    }

    #[test]
    fn disabled_blending_passes_source_through() {
        let mut state = description().color_blend_attachment;
        state.blend_enable = vk::FALSE;

        assert_eq!(blend(&state, [0.1, 0.2, 0.3, 0.4], [1.0; 4]), [0.1, 0.2, 0.3, 0.4]);
    }
}
