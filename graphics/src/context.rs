//! The host graphics context seam.
//!
//! `GraphicsContext` mirrors the subset of a WebGL2 rendering context that
//! the bridge forwards to. Implementations are treated as a correct black
//! box: errors are reported the GL way, through `get_error`, and object
//! creation returns `None` when the host refuses.
//!
//! The trait is deliberately not `Send`; a host graphics context belongs to
//! the execution context that created it.

use alloc::string::String;
use alloc::vec::Vec;
use core::any::Any;

use crate::types::{
    AttribType, BufferObject, ClearMask, ProgramObject, ShaderObject, ShaderPrecisionFormat,
    UniformLocation, VertexArrayObject,
};

/// A stateful host graphics context.
pub trait GraphicsContext {
    /// The concrete context, for embedders that need it back.
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// String-valued parameter, `None` when the host has no value.
    fn get_parameter_string(&mut self, pname: u32) -> Option<String>;
    /// Integer-valued parameter.
    fn get_parameter_i32(&mut self, pname: u32) -> i32;
    /// Names of the extensions the host supports.
    fn supported_extensions(&mut self) -> Vec<String>;
    fn get_error(&mut self) -> u32;
    fn get_shader_precision_format(
        &mut self,
        shader_type: u32,
        precision_type: u32,
    ) -> Option<ShaderPrecisionFormat>;

    // ------------------------------------------------------------------
    // Fixed-function state
    // ------------------------------------------------------------------

    fn pixel_storei(&mut self, pname: u32, param: i32);
    fn line_width(&mut self, width: f32);
    fn front_face(&mut self, mode: u32);
    fn cull_face(&mut self, mode: u32);
    fn enable(&mut self, cap: u32);
    fn disable(&mut self, cap: u32);
    fn depth_mask(&mut self, flag: bool);
    fn color_mask(&mut self, red: bool, green: bool, blue: bool, alpha: bool);
    fn clear_color(&mut self, red: f32, green: f32, blue: f32, alpha: f32);
    fn clear_stencil(&mut self, s: i32);
    fn clear(&mut self, mask: ClearMask);
    fn blend_func(&mut self, sfactor: u32, dfactor: u32);
    fn blend_equation(&mut self, mode: u32);
    fn blend_color(&mut self, red: f32, green: f32, blue: f32, alpha: f32);
    fn active_texture(&mut self, texture: u32);
    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32);
    fn read_buffer(&mut self, src: u32);
    fn flush(&mut self);
    fn finish(&mut self);

    // ------------------------------------------------------------------
    // Buffers
    // ------------------------------------------------------------------

    fn create_buffer(&mut self) -> Option<BufferObject>;
    fn delete_buffer(&mut self, buffer: BufferObject);
    fn bind_buffer(&mut self, target: u32, buffer: Option<BufferObject>);
    /// Upload `data` as the whole store of the buffer bound to `target`.
    fn buffer_data(&mut self, target: u32, data: &[u8], usage: u32);
    /// Allocate `size` zeroed bytes for the buffer bound to `target`.
    fn buffer_data_size(&mut self, target: u32, size: i64, usage: u32);
    fn buffer_sub_data(&mut self, target: u32, offset: i64, data: &[u8]);
    fn copy_buffer_sub_data(
        &mut self,
        read_target: u32,
        write_target: u32,
        read_offset: i64,
        write_offset: i64,
        size: i64,
    );

    // ------------------------------------------------------------------
    // Shaders and programs
    // ------------------------------------------------------------------

    fn create_shader(&mut self, kind: u32) -> Option<ShaderObject>;
    fn delete_shader(&mut self, shader: ShaderObject);
    fn shader_source(&mut self, shader: ShaderObject, source: &str);
    fn compile_shader(&mut self, shader: ShaderObject);
    fn get_shader_parameter(&mut self, shader: ShaderObject, pname: u32) -> i32;
    fn get_shader_info_log(&mut self, shader: ShaderObject) -> Option<String>;
    fn create_program(&mut self) -> Option<ProgramObject>;
    fn delete_program(&mut self, program: ProgramObject);
    fn attach_shader(&mut self, program: ProgramObject, shader: ShaderObject);
    fn bind_attrib_location(&mut self, program: ProgramObject, index: u32, name: &str);
    fn link_program(&mut self, program: ProgramObject);
    fn get_program_parameter(&mut self, program: ProgramObject, pname: u32) -> i32;
    fn use_program(&mut self, program: Option<ProgramObject>);
    fn get_uniform_location(&mut self, program: ProgramObject, name: &str)
        -> Option<UniformLocation>;
    fn uniform4fv(&mut self, location: UniformLocation, values: &[f32]);

    // ------------------------------------------------------------------
    // Vertex specification
    // ------------------------------------------------------------------

    fn enable_vertex_attrib_array(&mut self, index: u32);
    fn disable_vertex_attrib_array(&mut self, index: u32);
    fn vertex_attrib_pointer(
        &mut self,
        index: u32,
        size: i32,
        ty: AttribType,
        normalized: bool,
        stride: i32,
        offset: i64,
    );
    fn vertex_attrib_i_pointer(&mut self, index: u32, size: i32, ty: u32, stride: i32, offset: i64);
    fn vertex_attrib_divisor(&mut self, index: u32, divisor: u32);
    fn create_vertex_array(&mut self) -> Option<VertexArrayObject>;
    fn delete_vertex_array(&mut self, array: VertexArrayObject);
    fn bind_vertex_array(&mut self, array: Option<VertexArrayObject>);

    // ------------------------------------------------------------------
    // Drawing
    // ------------------------------------------------------------------

    fn draw_arrays(&mut self, mode: u32, first: i32, count: i32);
    fn draw_elements(&mut self, mode: u32, count: i32, ty: u32, offset: i64);
    fn draw_arrays_instanced(&mut self, mode: u32, first: i32, count: i32, instance_count: i32);
    fn draw_elements_instanced(
        &mut self,
        mode: u32,
        count: i32,
        ty: u32,
        offset: i64,
        instance_count: i32,
    );
    fn draw_range_elements(
        &mut self,
        mode: u32,
        start: u32,
        end: u32,
        count: i32,
        ty: u32,
        offset: i64,
    );

    // ------------------------------------------------------------------
    // Textures, renderbuffers and framebuffers
    // ------------------------------------------------------------------

    fn tex_storage_2d(
        &mut self,
        target: u32,
        levels: i32,
        internal_format: u32,
        width: i32,
        height: i32,
    );
    #[allow(clippy::too_many_arguments)]
    fn copy_tex_sub_image_2d(
        &mut self,
        target: u32,
        level: i32,
        xoffset: i32,
        yoffset: i32,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    );
    /// Compressed upload sourced from the bound pixel-unpack buffer at `offset`.
    #[allow(clippy::too_many_arguments)]
    fn compressed_tex_image_2d(
        &mut self,
        target: u32,
        level: i32,
        internal_format: u32,
        width: i32,
        height: i32,
        border: i32,
        image_size: i32,
        offset: i64,
    );
    #[allow(clippy::too_many_arguments)]
    fn compressed_tex_sub_image_2d(
        &mut self,
        target: u32,
        level: i32,
        xoffset: i32,
        yoffset: i32,
        width: i32,
        height: i32,
        format: u32,
        image_size: i32,
        offset: i64,
    );
    fn generate_mipmap(&mut self, target: u32);
    /// Bind the default (surface) framebuffer.
    fn bind_default_framebuffer(&mut self, target: u32);
    fn check_framebuffer_status(&mut self, target: u32) -> u32;
    fn renderbuffer_storage(&mut self, target: u32, internal_format: u32, width: i32, height: i32);
    fn renderbuffer_storage_multisample(
        &mut self,
        target: u32,
        samples: i32,
        internal_format: u32,
        width: i32,
        height: i32,
    );
    #[allow(clippy::too_many_arguments)]
    fn blit_framebuffer(
        &mut self,
        src_x0: i32,
        src_y0: i32,
        src_x1: i32,
        src_y1: i32,
        dst_x0: i32,
        dst_y0: i32,
        dst_x1: i32,
        dst_y1: i32,
        mask: u32,
        filter: u32,
    );
}
