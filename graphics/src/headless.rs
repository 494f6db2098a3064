//! In-memory graphics context.
//!
//! `HeadlessContext` keeps just enough object state to behave like a real
//! context from the bridge's point of view: buffers hold their bytes,
//! shaders compile when their source declares an entry point, programs link
//! when every attached shader compiled, and uniforms resolve when their name
//! appears in an attached shader. Every other call is recorded so callers can
//! inspect what reached the host.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;
use core::any::Any;

use hashbrown::{HashMap, HashSet};
use log::debug;

use crate::consts;
use crate::context::GraphicsContext;
use crate::types::{
    AttribType, BufferObject, ClearMask, ProgramObject, ShaderObject, ShaderPrecisionFormat,
    UniformLocation, VertexArrayObject,
};

/// Default `SHADING_LANGUAGE_VERSION` reported by a headless context.
pub const HEADLESS_GLSL_VERSION: &str = "WebGL GLSL ES 3.00 (headless)";

struct Shader {
    kind: u32,
    source: String,
    compiled: bool,
    log: String,
}

#[derive(Default)]
struct Program {
    shaders: Vec<u64>,
    linked: bool,
    attrib_bindings: Vec<(u32, String)>,
    uniforms: HashMap<String, u64>,
}

/// A recording graphics context with no rendering backend.
pub struct HeadlessContext {
    next_id: u64,
    error: u32,
    refuse_creation: bool,
    strings: HashMap<u32, String>,
    integers: HashMap<u32, i32>,
    extensions: Vec<String>,
    buffers: HashMap<u64, Vec<u8>>,
    buffer_bindings: HashMap<u32, u64>,
    shaders: HashMap<u64, Shader>,
    programs: HashMap<u64, Program>,
    vertex_arrays: HashSet<u64>,
    bound_vertex_array: Option<u64>,
    current_program: Option<u64>,
    uniform_values: HashMap<u64, Vec<f32>>,
    enabled: HashSet<u32>,
    calls: Vec<String>,
}

impl HeadlessContext {
    /// Create a context reporting the default headless parameters.
    pub fn new() -> Self {
        let mut strings = HashMap::new();
        strings.insert(consts::VENDOR, "glbridge".to_string());
        strings.insert(consts::RENDERER, "headless".to_string());
        strings.insert(consts::VERSION, "WebGL 2.0 (headless)".to_string());
        strings.insert(
            consts::SHADING_LANGUAGE_VERSION,
            HEADLESS_GLSL_VERSION.to_string(),
        );

        let mut integers = HashMap::new();
        integers.insert(consts::MAX_TEXTURE_SIZE, 4096);
        integers.insert(consts::MAX_VERTEX_ATTRIBS, 16);

        HeadlessContext {
            next_id: 1,
            error: consts::NO_ERROR,
            refuse_creation: false,
            strings,
            integers,
            extensions: vec![
                "EXT_color_buffer_float".to_string(),
                "OES_texture_float_linear".to_string(),
            ],
            buffers: HashMap::new(),
            buffer_bindings: HashMap::new(),
            shaders: HashMap::new(),
            programs: HashMap::new(),
            vertex_arrays: HashSet::new(),
            bound_vertex_array: None,
            current_program: None,
            uniform_values: HashMap::new(),
            enabled: HashSet::new(),
            calls: Vec::new(),
        }
    }

    /// Override a string parameter. An empty value reads back as absent.
    pub fn set_parameter_string(&mut self, pname: u32, value: &str) {
        if value.is_empty() {
            self.strings.remove(&pname);
        } else {
            self.strings.insert(pname, value.to_string());
        }
    }

    pub fn set_parameter_i32(&mut self, pname: u32, value: i32) {
        self.integers.insert(pname, value);
    }

    pub fn set_extensions(&mut self, extensions: &[&str]) {
        self.extensions = extensions.iter().map(|e| e.to_string()).collect();
    }

    /// Make every `create_*` call fail, as a host out of resources would.
    pub fn set_refuse_creation(&mut self, refuse: bool) {
        self.refuse_creation = refuse;
    }

    /// Pass-through calls in the order they arrived.
    pub fn calls(&self) -> &[String] {
        &self.calls
    }

    pub fn buffer_contents(&self, buffer: BufferObject) -> Option<&[u8]> {
        self.buffers.get(&buffer.raw()).map(Vec::as_slice)
    }

    pub fn bound_buffer(&self, target: u32) -> Option<BufferObject> {
        self.buffer_bindings.get(&target).copied().map(BufferObject)
    }

    pub fn shader_source_of(&self, shader: ShaderObject) -> Option<&str> {
        self.shaders.get(&shader.raw()).map(|s| s.source.as_str())
    }

    pub fn attrib_bindings(&self, program: ProgramObject) -> Option<&[(u32, String)]> {
        self.programs
            .get(&program.raw())
            .map(|p| p.attrib_bindings.as_slice())
    }

    pub fn current_program(&self) -> Option<ProgramObject> {
        self.current_program.map(ProgramObject)
    }

    pub fn bound_vertex_array(&self) -> Option<VertexArrayObject> {
        self.bound_vertex_array.map(VertexArrayObject)
    }

    pub fn uniform_values(&self, location: UniformLocation) -> Option<&[f32]> {
        self.uniform_values.get(&location.raw()).map(Vec::as_slice)
    }

    pub fn is_enabled(&self, cap: u32) -> bool {
        self.enabled.contains(&cap)
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    fn record(&mut self, call: String) {
        self.calls.push(call);
    }

    fn fail(&mut self, error: u32) {
        // GL keeps the first error until it is read
        if self.error == consts::NO_ERROR {
            self.error = error;
        }
    }

    fn allocate_id(&mut self) -> Option<u64> {
        if self.refuse_creation {
            return None;
        }
        let id = self.next_id;
        self.next_id += 1;
        Some(id)
    }

    fn bound_buffer_mut(&mut self, target: u32) -> Option<&mut Vec<u8>> {
        let id = *self.buffer_bindings.get(&target)?;
        self.buffers.get_mut(&id)
    }
}

impl Default for HeadlessContext {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsContext for HeadlessContext {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn get_parameter_string(&mut self, pname: u32) -> Option<String> {
        self.strings.get(&pname).cloned()
    }

    fn get_parameter_i32(&mut self, pname: u32) -> i32 {
        match pname {
            consts::CURRENT_PROGRAM => self.current_program.map_or(0, |p| p as i32),
            consts::FRAMEBUFFER_BINDING => 0,
            _ => match self.integers.get(&pname).copied() {
                Some(value) => value,
                None => {
                    self.fail(consts::INVALID_ENUM);
                    0
                }
            },
        }
    }

    fn supported_extensions(&mut self) -> Vec<String> {
        self.extensions.clone()
    }

    fn get_error(&mut self) -> u32 {
        core::mem::replace(&mut self.error, consts::NO_ERROR)
    }

    fn get_shader_precision_format(
        &mut self,
        _shader_type: u32,
        precision_type: u32,
    ) -> Option<ShaderPrecisionFormat> {
        let (range_min, range_max, precision) = match precision_type {
            consts::LOW_FLOAT => (1, 1, 8),
            consts::MEDIUM_FLOAT => (15, 15, 10),
            consts::HIGH_FLOAT => (127, 127, 23),
            consts::LOW_INT => (7, 7, 0),
            consts::MEDIUM_INT => (15, 14, 0),
            consts::HIGH_INT => (31, 30, 0),
            _ => {
                self.fail(consts::INVALID_ENUM);
                return None;
            }
        };
        Some(ShaderPrecisionFormat {
            range_min,
            range_max,
            precision,
        })
    }

    fn pixel_storei(&mut self, pname: u32, param: i32) {
        self.record(format!("pixel_storei({pname:#x}, {param})"));
    }

    fn line_width(&mut self, width: f32) {
        self.record(format!("line_width({width})"));
    }

    fn front_face(&mut self, mode: u32) {
        self.record(format!("front_face({mode:#x})"));
    }

    fn cull_face(&mut self, mode: u32) {
        self.record(format!("cull_face({mode:#x})"));
    }

    fn enable(&mut self, cap: u32) {
        self.enabled.insert(cap);
        self.record(format!("enable({cap:#x})"));
    }

    fn disable(&mut self, cap: u32) {
        self.enabled.remove(&cap);
        self.record(format!("disable({cap:#x})"));
    }

    fn depth_mask(&mut self, flag: bool) {
        self.record(format!("depth_mask({flag})"));
    }

    fn color_mask(&mut self, red: bool, green: bool, blue: bool, alpha: bool) {
        self.record(format!("color_mask({red}, {green}, {blue}, {alpha})"));
    }

    fn clear_color(&mut self, red: f32, green: f32, blue: f32, alpha: f32) {
        self.record(format!("clear_color({red}, {green}, {blue}, {alpha})"));
    }

    fn clear_stencil(&mut self, s: i32) {
        self.record(format!("clear_stencil({s})"));
    }

    fn clear(&mut self, mask: ClearMask) {
        self.record(format!("clear({:#x})", mask.bits()));
    }

    fn blend_func(&mut self, sfactor: u32, dfactor: u32) {
        self.record(format!("blend_func({sfactor:#x}, {dfactor:#x})"));
    }

    fn blend_equation(&mut self, mode: u32) {
        self.record(format!("blend_equation({mode:#x})"));
    }

    fn blend_color(&mut self, red: f32, green: f32, blue: f32, alpha: f32) {
        self.record(format!("blend_color({red}, {green}, {blue}, {alpha})"));
    }

    fn active_texture(&mut self, texture: u32) {
        self.record(format!("active_texture({texture:#x})"));
    }

    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.record(format!("viewport({x}, {y}, {width}, {height})"));
    }

    fn read_buffer(&mut self, src: u32) {
        self.record(format!("read_buffer({src:#x})"));
    }

    fn flush(&mut self) {
        self.record("flush()".to_string());
    }

    fn finish(&mut self) {
        self.record("finish()".to_string());
    }

    fn create_buffer(&mut self) -> Option<BufferObject> {
        let id = self.allocate_id()?;
        self.buffers.insert(id, Vec::new());
        Some(BufferObject(id))
    }

    fn delete_buffer(&mut self, buffer: BufferObject) {
        self.buffers.remove(&buffer.raw());
        self.buffer_bindings.retain(|_, bound| *bound != buffer.raw());
    }

    fn bind_buffer(&mut self, target: u32, buffer: Option<BufferObject>) {
        match buffer {
            Some(buffer) if self.buffers.contains_key(&buffer.raw()) => {
                self.buffer_bindings.insert(target, buffer.raw());
            }
            Some(_) => self.fail(consts::INVALID_OPERATION),
            None => {
                self.buffer_bindings.remove(&target);
            }
        }
    }

    fn buffer_data(&mut self, target: u32, data: &[u8], _usage: u32) {
        match self.bound_buffer_mut(target) {
            Some(store) => {
                store.clear();
                store.extend_from_slice(data);
            }
            None => self.fail(consts::INVALID_OPERATION),
        }
    }

    fn buffer_data_size(&mut self, target: u32, size: i64, _usage: u32) {
        let Ok(size) = usize::try_from(size) else {
            self.fail(consts::INVALID_VALUE);
            return;
        };
        match self.bound_buffer_mut(target) {
            Some(store) => {
                store.clear();
                store.resize(size, 0);
            }
            None => self.fail(consts::INVALID_OPERATION),
        }
    }

    fn buffer_sub_data(&mut self, target: u32, offset: i64, data: &[u8]) {
        let Some(store) = self.bound_buffer_mut(target) else {
            self.fail(consts::INVALID_OPERATION);
            return;
        };
        let range = usize::try_from(offset)
            .ok()
            .and_then(|start| Some(start..start.checked_add(data.len())?))
            .filter(|range| range.end <= store.len());
        match range {
            Some(range) => store[range].copy_from_slice(data),
            None => self.fail(consts::INVALID_VALUE),
        }
    }

    fn copy_buffer_sub_data(
        &mut self,
        read_target: u32,
        write_target: u32,
        read_offset: i64,
        write_offset: i64,
        size: i64,
    ) {
        let source = self
            .buffer_bindings
            .get(&read_target)
            .and_then(|id| self.buffers.get(id))
            .and_then(|store| {
                let start = usize::try_from(read_offset).ok()?;
                let end = start.checked_add(usize::try_from(size).ok()?)?;
                store.get(start..end).map(<[u8]>::to_vec)
            });
        match source {
            Some(bytes) => self.buffer_sub_data(write_target, write_offset, &bytes),
            None => self.fail(consts::INVALID_VALUE),
        }
    }

    fn create_shader(&mut self, kind: u32) -> Option<ShaderObject> {
        if kind != consts::VERTEX_SHADER && kind != consts::FRAGMENT_SHADER {
            self.fail(consts::INVALID_ENUM);
            return None;
        }
        let id = self.allocate_id()?;
        self.shaders.insert(
            id,
            Shader {
                kind,
                source: String::new(),
                compiled: false,
                log: String::new(),
            },
        );
        Some(ShaderObject(id))
    }

    fn delete_shader(&mut self, shader: ShaderObject) {
        self.shaders.remove(&shader.raw());
    }

    fn shader_source(&mut self, shader: ShaderObject, source: &str) {
        match self.shaders.get_mut(&shader.raw()) {
            Some(entry) => entry.source = source.to_string(),
            None => self.fail(consts::INVALID_VALUE),
        }
    }

    fn compile_shader(&mut self, shader: ShaderObject) {
        let Some(entry) = self.shaders.get_mut(&shader.raw()) else {
            self.fail(consts::INVALID_VALUE);
            return;
        };
        entry.compiled = entry.source.contains("main");
        entry.log = if entry.compiled {
            String::new()
        } else {
            "ERROR: 0:1: 'main' : missing entry point".to_string()
        };
        debug!("headless: compiled shader {} -> {}", shader.raw(), entry.compiled);
    }

    fn get_shader_parameter(&mut self, shader: ShaderObject, pname: u32) -> i32 {
        let Some(entry) = self.shaders.get(&shader.raw()) else {
            self.fail(consts::INVALID_VALUE);
            return 0;
        };
        match pname {
            consts::COMPILE_STATUS => entry.compiled as i32,
            consts::SHADER_TYPE => entry.kind as i32,
            consts::DELETE_STATUS => 0,
            _ => {
                self.fail(consts::INVALID_ENUM);
                0
            }
        }
    }

    fn get_shader_info_log(&mut self, shader: ShaderObject) -> Option<String> {
        self.shaders.get(&shader.raw()).map(|s| s.log.clone())
    }

    fn create_program(&mut self) -> Option<ProgramObject> {
        let id = self.allocate_id()?;
        self.programs.insert(id, Program::default());
        Some(ProgramObject(id))
    }

    fn delete_program(&mut self, program: ProgramObject) {
        if let Some(entry) = self.programs.remove(&program.raw()) {
            for location in entry.uniforms.values() {
                self.uniform_values.remove(location);
            }
        }
        if self.current_program == Some(program.raw()) {
            self.current_program = None;
        }
    }

    fn attach_shader(&mut self, program: ProgramObject, shader: ShaderObject) {
        if !self.shaders.contains_key(&shader.raw()) {
            self.fail(consts::INVALID_VALUE);
            return;
        }
        match self.programs.get_mut(&program.raw()) {
            Some(entry) => entry.shaders.push(shader.raw()),
            None => self.fail(consts::INVALID_VALUE),
        }
    }

    fn bind_attrib_location(&mut self, program: ProgramObject, index: u32, name: &str) {
        match self.programs.get_mut(&program.raw()) {
            Some(entry) => entry.attrib_bindings.push((index, name.to_string())),
            None => self.fail(consts::INVALID_VALUE),
        }
    }

    fn link_program(&mut self, program: ProgramObject) {
        let shaders = &self.shaders;
        let Some(entry) = self.programs.get_mut(&program.raw()) else {
            self.fail(consts::INVALID_VALUE);
            return;
        };
        entry.linked = !entry.shaders.is_empty()
            && entry
                .shaders
                .iter()
                .all(|id| shaders.get(id).map_or(false, |s| s.compiled));
    }

    fn get_program_parameter(&mut self, program: ProgramObject, pname: u32) -> i32 {
        let Some(entry) = self.programs.get(&program.raw()) else {
            self.fail(consts::INVALID_VALUE);
            return 0;
        };
        match pname {
            consts::LINK_STATUS => entry.linked as i32,
            consts::ATTACHED_SHADERS => entry.shaders.len() as i32,
            consts::DELETE_STATUS => 0,
            _ => {
                self.fail(consts::INVALID_ENUM);
                0
            }
        }
    }

    fn use_program(&mut self, program: Option<ProgramObject>) {
        match program {
            Some(program) if self.programs.get(&program.raw()).map_or(false, |p| p.linked) => {
                self.current_program = Some(program.raw());
            }
            Some(_) => self.fail(consts::INVALID_OPERATION),
            None => self.current_program = None,
        }
    }

    fn get_uniform_location(
        &mut self,
        program: ProgramObject,
        name: &str,
    ) -> Option<UniformLocation> {
        let entry = self.programs.get(&program.raw())?;
        if !entry.linked {
            self.fail(consts::INVALID_OPERATION);
            return None;
        }
        if let Some(location) = entry.uniforms.get(name) {
            return Some(UniformLocation(*location));
        }
        let declared = entry.shaders.iter().any(|id| {
            self.shaders
                .get(id)
                .map_or(false, |s| s.source.contains(name))
        });
        if !declared {
            return None;
        }
        let location = self.next_id;
        self.next_id += 1;
        self.programs
            .get_mut(&program.raw())?
            .uniforms
            .insert(name.to_string(), location);
        Some(UniformLocation(location))
    }

    fn uniform4fv(&mut self, location: UniformLocation, values: &[f32]) {
        if values.len() % 4 != 0 {
            self.fail(consts::INVALID_VALUE);
            return;
        }
        self.uniform_values.insert(location.raw(), values.to_vec());
    }

    fn enable_vertex_attrib_array(&mut self, index: u32) {
        self.record(format!("enable_vertex_attrib_array({index})"));
    }

    fn disable_vertex_attrib_array(&mut self, index: u32) {
        self.record(format!("disable_vertex_attrib_array({index})"));
    }

    fn vertex_attrib_pointer(
        &mut self,
        index: u32,
        size: i32,
        ty: AttribType,
        normalized: bool,
        stride: i32,
        offset: i64,
    ) {
        self.record(format!(
            "vertex_attrib_pointer({index}, {size}, {:#x}, {normalized}, {stride}, {offset})",
            ty.raw()
        ));
    }

    fn vertex_attrib_i_pointer(&mut self, index: u32, size: i32, ty: u32, stride: i32, offset: i64) {
        self.record(format!(
            "vertex_attrib_i_pointer({index}, {size}, {ty:#x}, {stride}, {offset})"
        ));
    }

    fn vertex_attrib_divisor(&mut self, index: u32, divisor: u32) {
        self.record(format!("vertex_attrib_divisor({index}, {divisor})"));
    }

    fn create_vertex_array(&mut self) -> Option<VertexArrayObject> {
        let id = self.allocate_id()?;
        self.vertex_arrays.insert(id);
        Some(VertexArrayObject(id))
    }

    fn delete_vertex_array(&mut self, array: VertexArrayObject) {
        self.vertex_arrays.remove(&array.raw());
        if self.bound_vertex_array == Some(array.raw()) {
            self.bound_vertex_array = None;
        }
    }

    fn bind_vertex_array(&mut self, array: Option<VertexArrayObject>) {
        match array {
            Some(array) if self.vertex_arrays.contains(&array.raw()) => {
                self.bound_vertex_array = Some(array.raw());
            }
            Some(_) => self.fail(consts::INVALID_OPERATION),
            None => self.bound_vertex_array = None,
        }
    }

    fn draw_arrays(&mut self, mode: u32, first: i32, count: i32) {
        self.record(format!("draw_arrays({mode:#x}, {first}, {count})"));
    }

    fn draw_elements(&mut self, mode: u32, count: i32, ty: u32, offset: i64) {
        self.record(format!("draw_elements({mode:#x}, {count}, {ty:#x}, {offset})"));
    }

    fn draw_arrays_instanced(&mut self, mode: u32, first: i32, count: i32, instance_count: i32) {
        self.record(format!(
            "draw_arrays_instanced({mode:#x}, {first}, {count}, {instance_count})"
        ));
    }

    fn draw_elements_instanced(
        &mut self,
        mode: u32,
        count: i32,
        ty: u32,
        offset: i64,
        instance_count: i32,
    ) {
        self.record(format!(
            "draw_elements_instanced({mode:#x}, {count}, {ty:#x}, {offset}, {instance_count})"
        ));
    }

    fn draw_range_elements(
        &mut self,
        mode: u32,
        start: u32,
        end: u32,
        count: i32,
        ty: u32,
        offset: i64,
    ) {
        self.record(format!(
            "draw_range_elements({mode:#x}, {start}, {end}, {count}, {ty:#x}, {offset})"
        ));
    }

    fn tex_storage_2d(
        &mut self,
        target: u32,
        levels: i32,
        internal_format: u32,
        width: i32,
        height: i32,
    ) {
        self.record(format!(
            "tex_storage_2d({target:#x}, {levels}, {internal_format:#x}, {width}, {height})"
        ));
    }

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
    ) {
        self.record(format!(
            "copy_tex_sub_image_2d({target:#x}, {level}, {xoffset}, {yoffset}, {x}, {y}, {width}, {height})"
        ));
    }

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
    ) {
        self.record(format!(
            "compressed_tex_image_2d({target:#x}, {level}, {internal_format:#x}, {width}, {height}, {border}, {image_size}, {offset})"
        ));
    }

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
    ) {
        self.record(format!(
            "compressed_tex_sub_image_2d({target:#x}, {level}, {xoffset}, {yoffset}, {width}, {height}, {format:#x}, {image_size}, {offset})"
        ));
    }

    fn generate_mipmap(&mut self, target: u32) {
        self.record(format!("generate_mipmap({target:#x})"));
    }

    fn bind_default_framebuffer(&mut self, target: u32) {
        self.record(format!("bind_default_framebuffer({target:#x})"));
    }

    fn check_framebuffer_status(&mut self, _target: u32) -> u32 {
        consts::FRAMEBUFFER_COMPLETE
    }

    fn renderbuffer_storage(&mut self, target: u32, internal_format: u32, width: i32, height: i32) {
        self.record(format!(
            "renderbuffer_storage({target:#x}, {internal_format:#x}, {width}, {height})"
        ));
    }

    fn renderbuffer_storage_multisample(
        &mut self,
        target: u32,
        samples: i32,
        internal_format: u32,
        width: i32,
        height: i32,
    ) {
        self.record(format!(
            "renderbuffer_storage_multisample({target:#x}, {samples}, {internal_format:#x}, {width}, {height})"
        ));
    }

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
    ) {
        self.record(format!(
            "blit_framebuffer({src_x0}, {src_y0}, {src_x1}, {src_y1}, {dst_x0}, {dst_y0}, {dst_x1}, {dst_y1}, {mask:#x}, {filter:#x})"
        ));
    }
}
