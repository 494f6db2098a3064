//! Graphics binding.
//!
//! Each bound operation validates its closed enumerations, resolves handle
//! arguments, marshals buffers and strings out of linear memory, calls the
//! host context, and marshals results back. Pure pass-through operations go
//! straight to [`GlBinding::host`].
//!
//! The binding keeps exactly one piece of derived state: the program in use,
//! which scopes `glUniform*` location ids.

use hashbrown::HashMap;
use log::debug;

use glbridge_graphics::consts;
use glbridge_graphics::{
    AttribType, BufferObject, ClearMask, GraphicsContext, ShaderObject, VertexArrayObject,
};

use crate::allocator::GuestAllocator;
use crate::handles::{HandleKind, HandleTable, ProgramEntry};
use crate::memory::{write_new_c_string, GuestMemory};
use crate::BridgeError;

/// Program binding state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramBinding {
    NoProgram,
    Bound(u32),
}

/// Query key to guest pointer of a NUL-terminated copy.
#[derive(Debug, Default)]
pub struct StringCache {
    entries: HashMap<u32, u32>,
}

impl StringCache {
    pub fn get(&self, key: u32) -> Option<u32> {
        self.entries.get(&key).copied()
    }

    pub fn insert(&mut self, key: u32, ptr: u32) {
        self.entries.insert(key, ptr);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// GL boolean coercion: nonzero is true.
pub fn flag(value: i32) -> bool {
    value != 0
}

/// Rewrite a WebGL shading language version as its GLES equivalent.
///
/// `WebGL GLSL ES 3.00 (...)` becomes `OpenGL ES GLSL ES 3.00 (WebGL GLSL
/// ES 3.00 (...))`; a one-digit minor version is padded to two digits.
/// Strings that do not follow the WebGL pattern are returned unchanged.
pub fn gles_shading_language_version(host: &str) -> String {
    let Some(rest) = host.strip_prefix("WebGL GLSL ES ") else {
        return host.to_string();
    };
    let version = rest.split(' ').next().unwrap_or_default();
    let number = match version.as_bytes() {
        [major, b'.', minor] if major.is_ascii_digit() && minor.is_ascii_digit() => {
            format!("{version}0")
        }
        [major, b'.', minor, minor2]
            if major.is_ascii_digit() && minor.is_ascii_digit() && minor2.is_ascii_digit() =>
        {
            version.to_string()
        }
        _ => return host.to_string(),
    };
    format!("OpenGL ES GLSL ES {number} ({host})")
}

fn non_negative(op: &'static str, what: &str, value: i32) -> Result<usize, BridgeError> {
    usize::try_from(value).map_err(|_| BridgeError::InvalidArgument {
        op,
        detail: format!("negative {what} {value}"),
    })
}

/// Address of element `index` in a guest array of `stride`-byte elements.
fn element_addr(op: &'static str, base: u32, index: usize, stride: u32) -> Result<u32, BridgeError> {
    u32::try_from(index)
        .ok()
        .and_then(|index| index.checked_mul(stride))
        .and_then(|offset| base.checked_add(offset))
        .ok_or_else(|| BridgeError::InvalidArgument {
            op,
            detail: format!("element {index} of the array at {base:#x} wraps the address space"),
        })
}

/// Reject a `count`-element array whose last element wraps the address space.
fn check_array(op: &'static str, base: u32, count: usize, stride: u32) -> Result<(), BridgeError> {
    match count.checked_sub(1) {
        Some(last) => element_addr(op, base, last, stride).map(drop),
        None => Ok(()),
    }
}

/// Graphics state of the main execution context.
pub struct GlBinding {
    context: Box<dyn GraphicsContext>,
    buffers: HandleTable<BufferObject>,
    shaders: HandleTable<ShaderObject>,
    programs: HandleTable<ProgramEntry>,
    vertex_arrays: HandleTable<VertexArrayObject>,
    binding: ProgramBinding,
    strings: StringCache,
}

impl GlBinding {
    pub fn new(context: Box<dyn GraphicsContext>) -> Self {
        GlBinding {
            context,
            buffers: HandleTable::new(HandleKind::Buffer),
            shaders: HandleTable::new(HandleKind::Shader),
            programs: HandleTable::new(HandleKind::Program),
            vertex_arrays: HandleTable::new(HandleKind::VertexArray),
            binding: ProgramBinding::NoProgram,
            strings: StringCache::default(),
        }
    }

    /// The host context, for pass-through calls.
    pub fn host(&mut self) -> &mut dyn GraphicsContext {
        self.context.as_mut()
    }

    /// The host context as its concrete type.
    pub fn host_as<T: 'static>(&self) -> Option<&T> {
        self.context.as_any().downcast_ref()
    }

    pub fn host_as_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.context.as_any_mut().downcast_mut()
    }

    pub fn into_host(self) -> Box<dyn GraphicsContext> {
        self.context
    }

    pub fn binding(&self) -> ProgramBinding {
        self.binding
    }

    pub fn buffers(&self) -> &HandleTable<BufferObject> {
        &self.buffers
    }

    pub fn shaders(&self) -> &HandleTable<ShaderObject> {
        &self.shaders
    }

    pub fn programs(&self) -> &HandleTable<ProgramEntry> {
        &self.programs
    }

    pub fn vertex_arrays(&self) -> &HandleTable<VertexArrayObject> {
        &self.vertex_arrays
    }

    pub fn strings(&self) -> &StringCache {
        &self.strings
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// `glGetString`: pointer to a cached NUL-terminated copy.
    pub fn get_string(
        &mut self,
        memory: &dyn GuestMemory,
        allocator: &mut dyn GuestAllocator,
        name: u32,
    ) -> Result<u32, BridgeError> {
        if let Some(ptr) = self.strings.get(name) {
            return Ok(ptr);
        }

        let value = match name {
            consts::EXTENSIONS => self.context.supported_extensions().join(" "),
            consts::VENDOR
            | consts::RENDERER
            | consts::UNMASKED_VENDOR_WEBGL
            | consts::UNMASKED_RENDERER_WEBGL => self
                .context
                .get_parameter_string(name)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| BridgeError::InvalidArgument {
                    op: "glGetString",
                    detail: format!("host has no value for query {name:#x}"),
                })?,
            consts::VERSION => {
                let host = self.context.get_parameter_string(name).unwrap_or_default();
                format!("OpenGL ES 3.0 ({host})")
            }
            consts::SHADING_LANGUAGE_VERSION => {
                let host = self.context.get_parameter_string(name).unwrap_or_default();
                gles_shading_language_version(&host)
            }
            _ => {
                return Err(BridgeError::InvalidArgument {
                    op: "glGetString",
                    detail: format!("unknown string query {name:#x}"),
                })
            }
        };

        let ptr = write_new_c_string(memory, allocator, &value)?;
        self.strings.insert(name, ptr);
        debug!("glGetString({name:#x}) cached at {ptr:#x}: {value}");
        Ok(ptr)
    }

    /// `glGetIntegerv`
    pub fn get_integerv(
        &mut self,
        memory: &dyn GuestMemory,
        pname: u32,
        params: u32,
    ) -> Result<(), BridgeError> {
        let value = match pname {
            consts::NUM_EXTENSIONS => self.context.supported_extensions().len() as i32,
            _ => self.context.get_parameter_i32(pname),
        };
        memory.write_i32(params, value)?;
        Ok(())
    }

    /// `glGetShaderPrecisionFormat`: writes `range[2]` and `*precision`.
    pub fn get_shader_precision_format(
        &mut self,
        memory: &dyn GuestMemory,
        shader_type: u32,
        precision_type: u32,
        range: u32,
        precision: u32,
    ) -> Result<(), BridgeError> {
        let format = self
            .context
            .get_shader_precision_format(shader_type, precision_type)
            .ok_or_else(|| BridgeError::InvalidArgument {
                op: "glGetShaderPrecisionFormat",
                detail: format!("no format for {shader_type:#x}/{precision_type:#x}"),
            })?;
        let range_max = element_addr("glGetShaderPrecisionFormat", range, 1, 4)?;
        memory.write_i32(range, format.range_min)?;
        memory.write_i32(range_max, format.range_max)?;
        memory.write_i32(precision, format.precision)?;
        Ok(())
    }

    /// `glClear`
    pub fn clear(&mut self, mask: u32) -> Result<(), BridgeError> {
        let mask = ClearMask::from_raw(mask).ok_or_else(|| BridgeError::InvalidArgument {
            op: "glClear",
            detail: format!("mask {mask:#x} has bits outside COLOR|DEPTH|STENCIL"),
        })?;
        self.context.clear(mask);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Buffers
    // ------------------------------------------------------------------

    /// `glGenBuffers`
    pub fn gen_buffers(
        &mut self,
        memory: &dyn GuestMemory,
        n: i32,
        buffers: u32,
    ) -> Result<(), BridgeError> {
        let n = non_negative("glGenBuffers", "count", n)?;
        check_array("glGenBuffers", buffers, n, 4)?;
        for i in 0..n {
            let slot = element_addr("glGenBuffers", buffers, i, 4)?;
            let buffer = self
                .context
                .create_buffer()
                .ok_or(BridgeError::HostRefused("glGenBuffers"))?;
            let handle = self.buffers.allocate(buffer);
            memory.write_u32(slot, handle)?;
            debug!("buffer {handle} created");
        }
        Ok(())
    }

    /// `glDeleteBuffers`. Zero entries are skipped.
    pub fn delete_buffers(
        &mut self,
        memory: &dyn GuestMemory,
        n: i32,
        buffers: u32,
    ) -> Result<(), BridgeError> {
        let n = non_negative("glDeleteBuffers", "count", n)?;
        for handle in memory.read_u32_array(buffers, n)? {
            if handle == 0 {
                continue;
            }
            let buffer = self.buffers.release(handle)?;
            self.context.delete_buffer(buffer);
            debug!("buffer {handle} deleted");
        }
        Ok(())
    }

    /// `glBindBuffer`; buffer 0 unbinds the target.
    pub fn bind_buffer(&mut self, target: u32, buffer: u32) -> Result<(), BridgeError> {
        let buffer = match buffer {
            0 => None,
            handle => Some(*self.buffers.resolve(handle)?),
        };
        self.context.bind_buffer(target, buffer);
        Ok(())
    }

    /// `glBufferData`; a null `data` allocates `size` bytes without upload.
    pub fn buffer_data(
        &mut self,
        memory: &dyn GuestMemory,
        target: u32,
        size: i32,
        data: u32,
        usage: u32,
    ) -> Result<(), BridgeError> {
        let len = non_negative("glBufferData", "size", size)?;
        if data == 0 {
            self.context.buffer_data_size(target, size as i64, usage);
            return Ok(());
        }
        let bytes = memory.read_bytes(data, len)?;
        self.context.buffer_data(target, &bytes, usage);
        Ok(())
    }

    /// `glBufferSubData`
    pub fn buffer_sub_data(
        &mut self,
        memory: &dyn GuestMemory,
        target: u32,
        offset: i32,
        size: i32,
        data: u32,
    ) -> Result<(), BridgeError> {
        let len = non_negative("glBufferSubData", "size", size)?;
        let bytes = memory.read_bytes(data, len)?;
        self.context.buffer_sub_data(target, offset as i64, &bytes);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Shaders
    // ------------------------------------------------------------------

    /// `glCreateShader`
    pub fn create_shader(&mut self, kind: u32) -> Result<u32, BridgeError> {
        let shader = self
            .context
            .create_shader(kind)
            .ok_or(BridgeError::HostRefused("glCreateShader"))?;
        let handle = self.shaders.allocate(shader);
        debug!("shader {handle} created ({kind:#x})");
        Ok(handle)
    }

    /// `glDeleteShader`. Shader 0 is ignored.
    pub fn delete_shader(&mut self, shader: u32) -> Result<(), BridgeError> {
        if shader == 0 {
            return Ok(());
        }
        let object = self.shaders.release(shader)?;
        self.context.delete_shader(object);
        debug!("shader {shader} deleted");
        Ok(())
    }

    /// `glShaderSource`: concatenates `count` spans.
    ///
    /// A null `lengths` array, or a negative entry in it, marks the matching
    /// string as NUL-terminated.
    pub fn shader_source(
        &mut self,
        memory: &dyn GuestMemory,
        shader: u32,
        count: i32,
        strings: u32,
        lengths: u32,
    ) -> Result<(), BridgeError> {
        let object = *self.shaders.resolve(shader)?;
        let count = non_negative("glShaderSource", "count", count)?;
        check_array("glShaderSource", strings, count, 4)?;
        if lengths != 0 {
            check_array("glShaderSource", lengths, count, 4)?;
        }

        let mut source = Vec::new();
        for i in 0..count {
            let ptr = memory.read_u32(element_addr("glShaderSource", strings, i, 4)?)?;
            let len = match lengths {
                0 => -1,
                _ => memory.read_i32(element_addr("glShaderSource", lengths, i, 4)?)?,
            };
            match usize::try_from(len) {
                Ok(len) => source.extend_from_slice(&memory.read_bytes(ptr, len)?),
                Err(_) => source.extend_from_slice(memory.read_c_string(ptr)?.as_bytes()),
            }
        }
        let source = String::from_utf8_lossy(&source);
        self.context.shader_source(object, &source);
        Ok(())
    }

    /// `glCompileShader`
    pub fn compile_shader(&mut self, shader: u32) -> Result<(), BridgeError> {
        let object = *self.shaders.resolve(shader)?;
        self.context.compile_shader(object);
        Ok(())
    }

    /// `glGetShaderiv`
    pub fn get_shaderiv(
        &mut self,
        memory: &dyn GuestMemory,
        shader: u32,
        pname: u32,
        params: u32,
    ) -> Result<(), BridgeError> {
        let object = *self.shaders.resolve(shader)?;
        let value = match pname {
            consts::INFO_LOG_LENGTH => match self.context.get_shader_info_log(object) {
                Some(log) if !log.is_empty() => log.len() as i32 + 1,
                _ => 0,
            },
            consts::SHADER_SOURCE_LENGTH => {
                return Err(BridgeError::NotImplemented(
                    "glGetShaderiv(GL_SHADER_SOURCE_LENGTH)",
                ))
            }
            _ => self.context.get_shader_parameter(object, pname),
        };
        memory.write_i32(params, value)?;
        Ok(())
    }

    /// `glGetShaderInfoLog`: at most `max_length - 1` bytes plus a NUL.
    pub fn get_shader_info_log(
        &mut self,
        memory: &dyn GuestMemory,
        shader: u32,
        max_length: i32,
        length: u32,
        info_log: u32,
    ) -> Result<(), BridgeError> {
        let object = *self.shaders.resolve(shader)?;
        let log = self.context.get_shader_info_log(object).unwrap_or_default();
        let max_length = non_negative("glGetShaderInfoLog", "buffer size", max_length)?;

        if log.is_empty() || max_length == 0 {
            if length != 0 {
                memory.write_i32(length, 0)?;
            }
            return Ok(());
        }

        let mut end = log.len().min(max_length - 1);
        while !log.is_char_boundary(end) {
            end -= 1;
        }
        let mut bytes = log.as_bytes()[..end].to_vec();
        bytes.push(0);
        memory.write(info_log, &bytes)?;
        if length != 0 {
            memory.write_i32(length, end as i32)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Programs
    // ------------------------------------------------------------------

    /// `glCreateProgram`
    pub fn create_program(&mut self) -> Result<u32, BridgeError> {
        let program = self
            .context
            .create_program()
            .ok_or(BridgeError::HostRefused("glCreateProgram"))?;
        let handle = self.programs.allocate(ProgramEntry::new(program));
        debug!("program {handle} created");
        Ok(handle)
    }

    /// `glDeleteProgram`. Drops the program's uniform caches and leaves
    /// `NoProgram` behind when it was the program in use.
    pub fn delete_program(&mut self, program: u32) -> Result<(), BridgeError> {
        if program == 0 {
            return Ok(());
        }
        let entry = self.programs.release(program)?;
        self.context.delete_program(entry.program);
        if self.binding == ProgramBinding::Bound(program) {
            self.binding = ProgramBinding::NoProgram;
        }
        debug!(
            "program {program} deleted ({} cached uniforms dropped)",
            entry.uniforms.len()
        );
        Ok(())
    }

    /// `glAttachShader`
    pub fn attach_shader(&mut self, program: u32, shader: u32) -> Result<(), BridgeError> {
        let program = self.programs.resolve(program)?.program;
        let shader = *self.shaders.resolve(shader)?;
        self.context.attach_shader(program, shader);
        Ok(())
    }

    /// `glBindAttribLocation`
    pub fn bind_attrib_location(
        &mut self,
        memory: &dyn GuestMemory,
        program: u32,
        index: u32,
        name: u32,
    ) -> Result<(), BridgeError> {
        let program = self.programs.resolve(program)?.program;
        let name = memory.read_c_string(name)?;
        self.context.bind_attrib_location(program, index, &name);
        Ok(())
    }

    /// `glLinkProgram`
    pub fn link_program(&mut self, program: u32) -> Result<(), BridgeError> {
        let program = self.programs.resolve(program)?.program;
        self.context.link_program(program);
        Ok(())
    }

    /// `glGetProgramiv`
    pub fn get_programiv(
        &mut self,
        memory: &dyn GuestMemory,
        program: u32,
        pname: u32,
        params: u32,
    ) -> Result<(), BridgeError> {
        let program = self.programs.resolve(program)?.program;
        let value = self.context.get_program_parameter(program, pname);
        memory.write_i32(params, value)?;
        Ok(())
    }

    /// `glUseProgram`; program 0 leaves no program in use.
    pub fn use_program(&mut self, program: u32) -> Result<(), BridgeError> {
        if program == 0 {
            self.context.use_program(None);
            self.binding = ProgramBinding::NoProgram;
            return Ok(());
        }
        let object = self.programs.resolve(program)?.program;
        self.context.use_program(Some(object));
        self.binding = ProgramBinding::Bound(program);
        Ok(())
    }

    /// `glGetUniformLocation`: a per-program id, or -1 when the host has
    /// no such uniform.
    pub fn get_uniform_location(
        &mut self,
        memory: &dyn GuestMemory,
        program: u32,
        name: u32,
    ) -> Result<i32, BridgeError> {
        let name = memory.read_c_string(name)?;
        let entry = self.programs.resolve_mut(program)?;
        if let Some(id) = entry.uniforms.id_of(&name) {
            return Ok(id);
        }
        match self.context.get_uniform_location(entry.program, &name) {
            Some(location) => Ok(entry.uniforms.insert(&name, location)),
            None => Ok(-1),
        }
    }

    /// `glUniform4fv` against the program in use. Location -1 is ignored.
    pub fn uniform4fv(
        &mut self,
        memory: &dyn GuestMemory,
        location: i32,
        count: i32,
        value: u32,
    ) -> Result<(), BridgeError> {
        let ProgramBinding::Bound(program) = self.binding else {
            return Err(BridgeError::InvalidArgument {
                op: "glUniform4fv",
                detail: "no program is in use".into(),
            });
        };
        if location == -1 {
            return Ok(());
        }
        let count = non_negative("glUniform4fv", "count", count)?;
        let location = self.programs.resolve(program)?.uniforms.location(location)?;
        let components = count.checked_mul(4).ok_or_else(|| BridgeError::InvalidArgument {
            op: "glUniform4fv",
            detail: format!("count {count} overflows"),
        })?;
        let values = memory.read_f32_array(value, components)?;
        self.context.uniform4fv(location, &values);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Vertex specification
    // ------------------------------------------------------------------

    /// `glVertexAttribPointer`; the component type must be a WebGL type.
    pub fn vertex_attrib_pointer(
        &mut self,
        index: u32,
        size: i32,
        ty: u32,
        normalized: i32,
        stride: i32,
        offset: u32,
    ) -> Result<(), BridgeError> {
        let ty = AttribType::try_from(ty).map_err(|ty| BridgeError::InvalidArgument {
            op: "glVertexAttribPointer",
            detail: format!("component type {ty:#x}"),
        })?;
        self.context
            .vertex_attrib_pointer(index, size, ty, flag(normalized), stride, offset as i64);
        Ok(())
    }

    /// `glGenVertexArrays`
    pub fn gen_vertex_arrays(
        &mut self,
        memory: &dyn GuestMemory,
        n: i32,
        arrays: u32,
    ) -> Result<(), BridgeError> {
        let n = non_negative("glGenVertexArrays", "count", n)?;
        check_array("glGenVertexArrays", arrays, n, 4)?;
        for i in 0..n {
            let slot = element_addr("glGenVertexArrays", arrays, i, 4)?;
            let array = self
                .context
                .create_vertex_array()
                .ok_or(BridgeError::HostRefused("glGenVertexArrays"))?;
            let handle = self.vertex_arrays.allocate(array);
            memory.write_u32(slot, handle)?;
            debug!("vertex array {handle} created");
        }
        Ok(())
    }

    /// `glDeleteVertexArrays`. Zero entries are skipped.
    pub fn delete_vertex_arrays(
        &mut self,
        memory: &dyn GuestMemory,
        n: i32,
        arrays: u32,
    ) -> Result<(), BridgeError> {
        let n = non_negative("glDeleteVertexArrays", "count", n)?;
        for handle in memory.read_u32_array(arrays, n)? {
            if handle == 0 {
                continue;
            }
            let array = self.vertex_arrays.release(handle)?;
            self.context.delete_vertex_array(array);
            debug!("vertex array {handle} deleted");
        }
        Ok(())
    }

    /// `glBindVertexArray`; array 0 unbinds.
    pub fn bind_vertex_array(&mut self, array: u32) -> Result<(), BridgeError> {
        let array = match array {
            0 => None,
            handle => Some(*self.vertex_arrays.resolve(handle)?),
        };
        self.context.bind_vertex_array(array);
        Ok(())
    }

    /// `glBindFramebuffer`: only the default framebuffer is bound.
    pub fn bind_framebuffer(&mut self, target: u32, framebuffer: u32) -> Result<(), BridgeError> {
        if framebuffer != 0 {
            return Err(BridgeError::NotImplemented("glBindFramebuffer(non-default)"));
        }
        self.context.bind_default_framebuffer(target);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::BumpAllocator;
    use crate::memory::LinearMemory;
    use glbridge_graphics::{HeadlessContext, ProgramObject};

    struct Fixture {
        gl: GlBinding,
        mem: LinearMemory,
        alloc: BumpAllocator,
    }

    fn fixture() -> Fixture {
        fixture_with(HeadlessContext::new())
    }

    fn fixture_with(ctx: HeadlessContext) -> Fixture {
        Fixture {
            gl: GlBinding::new(Box::new(ctx)),
            mem: LinearMemory::new(1, Some(1)).unwrap(),
            alloc: BumpAllocator::new(0x8000, 0x10000),
        }
    }

    impl Fixture {
        fn headless(&self) -> &HeadlessContext {
            self.gl.host_as().unwrap()
        }

        fn c_string(&mut self, s: &str) -> u32 {
            write_new_c_string(&self.mem, &mut self.alloc, s).unwrap()
        }

        fn shader(&mut self, kind: u32, source: &str) -> u32 {
            let shader = self.gl.create_shader(kind).unwrap();
            let src = self.c_string(source);
            self.mem.write_u32(0x100, src).unwrap();
            self.gl.shader_source(&self.mem, shader, 1, 0x100, 0).unwrap();
            self.gl.compile_shader(shader).unwrap();
            shader
        }

        fn linked_program(&mut self) -> u32 {
            let vs = self.shader(consts::VERTEX_SHADER, "void main() {}");
            let fs = self.shader(
                consts::FRAGMENT_SHADER,
                "uniform vec4 u_color; void main() {}",
            );
            let program = self.gl.create_program().unwrap();
            self.gl.attach_shader(program, vs).unwrap();
            self.gl.attach_shader(program, fs).unwrap();
            self.gl.link_program(program).unwrap();
            program
        }
    }

    #[test]
    fn glsl_version_is_rewritten_for_gles() {
        assert_eq!(
            gles_shading_language_version("WebGL GLSL ES 3.0 (Chromium)"),
            "OpenGL ES GLSL ES 3.00 (WebGL GLSL ES 3.0 (Chromium))"
        );
        assert_eq!(
            gles_shading_language_version("WebGL GLSL ES 1.00"),
            "OpenGL ES GLSL ES 1.00 (WebGL GLSL ES 1.00)"
        );
        assert_eq!(gles_shading_language_version("GLSL 4.60"), "GLSL 4.60");
        assert_eq!(
            gles_shading_language_version("WebGL GLSL ES 3.0x"),
            "WebGL GLSL ES 3.0x"
        );
    }

    #[test]
    fn string_cache_returns_identical_pointer() {
        let mut f = fixture();
        let first = f.gl.get_string(&f.mem, &mut f.alloc, consts::VERSION).unwrap();
        let bytes = f.mem.read_c_string(first).unwrap();
        let second = f.gl.get_string(&f.mem, &mut f.alloc, consts::VERSION).unwrap();

        assert_eq!(first, second);
        assert_eq!(f.mem.read_c_string(second).unwrap(), bytes);
        assert_eq!(bytes, "OpenGL ES 3.0 (WebGL 2.0 (headless))");
        assert_eq!(f.alloc.allocations().len(), 1);
    }

    #[test]
    fn extensions_are_space_joined() {
        let mut f = fixture();
        let ptr = f.gl.get_string(&f.mem, &mut f.alloc, consts::EXTENSIONS).unwrap();
        assert_eq!(
            f.mem.read_c_string(ptr).unwrap(),
            "EXT_color_buffer_float OES_texture_float_linear"
        );

        f.gl.get_integerv(&f.mem, consts::NUM_EXTENSIONS, 0x40).unwrap();
        assert_eq!(f.mem.read_i32(0x40).unwrap(), 2);
    }

    #[test]
    fn missing_unmasked_vendor_is_invalid() {
        let mut f = fixture();
        let err = f
            .gl
            .get_string(&f.mem, &mut f.alloc, consts::UNMASKED_VENDOR_WEBGL)
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArgument { op: "glGetString", .. }));
        assert!(f.gl.strings().is_empty());
    }

    #[test]
    fn unknown_string_query_is_invalid() {
        let mut f = fixture();
        assert!(f.gl.get_string(&f.mem, &mut f.alloc, 0x1234).is_err());
    }

    #[test]
    fn buffer_lifecycle() {
        let mut f = fixture();
        f.gl.gen_buffers(&f.mem, 2, 0x40).unwrap();
        assert_eq!(f.mem.read_u32_array(0x40, 2).unwrap(), vec![1, 2]);

        f.gl.bind_buffer(consts::ARRAY_BUFFER, 1).unwrap();
        f.mem.write(0x200, &[1, 2, 3, 4]).unwrap();
        f.gl.buffer_data(&f.mem, consts::ARRAY_BUFFER, 4, 0x200, consts::STATIC_DRAW)
            .unwrap();
        let host = *f.gl.buffers().resolve(1).unwrap();
        assert_eq!(f.headless().buffer_contents(host), Some(&[1, 2, 3, 4][..]));

        f.gl.delete_buffers(&f.mem, 2, 0x40).unwrap();
        assert!(f.gl.buffers().is_empty());
        assert_eq!(
            f.gl.bind_buffer(consts::ARRAY_BUFFER, 1),
            Err(BridgeError::HandleNotFound {
                kind: HandleKind::Buffer,
                handle: 1
            })
        );
    }

    #[test]
    fn null_buffer_data_allocates_size_only() {
        let mut f = fixture();
        f.gl.gen_buffers(&f.mem, 1, 0x40).unwrap();
        f.gl.bind_buffer(consts::ARRAY_BUFFER, 1).unwrap();
        f.gl.buffer_data(&f.mem, consts::ARRAY_BUFFER, 8, 0, consts::DYNAMIC_DRAW)
            .unwrap();
        f.mem.write(0x300, &[9, 9]).unwrap();
        f.gl.buffer_sub_data(&f.mem, consts::ARRAY_BUFFER, 6, 2, 0x300)
            .unwrap();

        let host = *f.gl.buffers().resolve(1).unwrap();
        assert_eq!(
            f.headless().buffer_contents(host),
            Some(&[0, 0, 0, 0, 0, 0, 9, 9][..])
        );
    }

    #[test]
    fn bind_buffer_zero_unbinds() {
        let mut f = fixture();
        f.gl.gen_buffers(&f.mem, 1, 0x40).unwrap();
        f.gl.bind_buffer(consts::ARRAY_BUFFER, 1).unwrap();
        f.gl.bind_buffer(consts::ARRAY_BUFFER, 0).unwrap();
        assert_eq!(f.headless().bound_buffer(consts::ARRAY_BUFFER), None);
    }

    #[test]
    fn shader_source_concatenates_spans() {
        let mut f = fixture();
        let shader = f.gl.create_shader(consts::VERTEX_SHADER).unwrap();
        f.mem.write(0x400, b"void mainXXX").unwrap();
        f.mem.write(0x500, b"() {}").unwrap();
        f.mem.write_u32_array(0x100, &[0x400, 0x500]).unwrap();
        f.mem.write_u32_array(0x110, &[9, 5]).unwrap();

        f.gl.shader_source(&f.mem, shader, 2, 0x100, 0x110).unwrap();
        let host = *f.gl.shaders().resolve(shader).unwrap();
        assert_eq!(f.headless().shader_source_of(host), Some("void main() {}"));
    }

    #[test]
    fn shader_info_log_is_truncated_with_nul() {
        let mut f = fixture();
        let shader = f.shader(consts::FRAGMENT_SHADER, "precision mediump float;");
        let log_len = "ERROR: 0:1: 'main' : missing entry point".len();

        f.gl.get_shaderiv(&f.mem, shader, consts::INFO_LOG_LENGTH, 0x40).unwrap();
        assert_eq!(f.mem.read_i32(0x40).unwrap(), log_len as i32 + 1);

        f.gl.get_shader_info_log(&f.mem, shader, 6, 0x44, 0x600).unwrap();
        assert_eq!(f.mem.read_i32(0x44).unwrap(), 5);
        assert_eq!(f.mem.read_c_string(0x600).unwrap(), "ERROR");
    }

    #[test]
    fn empty_shader_log_reports_zero_length() {
        let mut f = fixture();
        let shader = f.shader(consts::VERTEX_SHADER, "void main() {}");
        f.mem.write_i32(0x44, 77).unwrap();
        f.gl.get_shader_info_log(&f.mem, shader, 64, 0x44, 0x600).unwrap();
        assert_eq!(f.mem.read_i32(0x44).unwrap(), 0);

        f.gl.get_shaderiv(&f.mem, shader, consts::INFO_LOG_LENGTH, 0x40).unwrap();
        assert_eq!(f.mem.read_i32(0x40).unwrap(), 0);
    }

    #[test]
    fn shader_source_length_is_not_implemented() {
        let mut f = fixture();
        let shader = f.gl.create_shader(consts::VERTEX_SHADER).unwrap();
        let err = f
            .gl
            .get_shaderiv(&f.mem, shader, consts::SHADER_SOURCE_LENGTH, 0x40)
            .unwrap_err();
        assert!(matches!(err, BridgeError::NotImplemented(_)));
    }

    #[test]
    fn uniform_locations_are_cached_per_program() {
        let mut f = fixture();
        let program = f.linked_program();
        let name = f.c_string("u_color");
        let missing = f.c_string("u_missing");

        assert_eq!(f.gl.get_uniform_location(&f.mem, program, name).unwrap(), 1);
        assert_eq!(f.gl.get_uniform_location(&f.mem, program, name).unwrap(), 1);
        assert_eq!(f.gl.get_uniform_location(&f.mem, program, missing).unwrap(), -1);

        f.gl.use_program(program).unwrap();
        f.mem.write_f32(0x700, 0.25).unwrap();
        f.gl.uniform4fv(&f.mem, 1, 1, 0x700).unwrap();
        let location = f.gl.programs().resolve(program).unwrap().uniforms.location(1).unwrap();
        assert_eq!(
            f.headless().uniform_values(location),
            Some(&[0.25, 0.0, 0.0, 0.0][..])
        );
    }

    #[test]
    fn uniform_without_program_is_rejected() {
        let mut f = fixture();
        assert!(matches!(
            f.gl.uniform4fv(&f.mem, 1, 1, 0x700),
            Err(BridgeError::InvalidArgument { op: "glUniform4fv", .. })
        ));
    }

    #[test]
    fn unknown_uniform_id_is_not_found() {
        let mut f = fixture();
        let program = f.linked_program();
        f.gl.use_program(program).unwrap();
        assert!(matches!(
            f.gl.uniform4fv(&f.mem, 5, 1, 0x700),
            Err(BridgeError::HandleNotFound {
                kind: HandleKind::UniformLocation,
                handle: 5
            })
        ));
        assert!(f.gl.uniform4fv(&f.mem, -1, 1, 0x700).is_ok());
    }

    #[test]
    fn deleting_bound_program_clears_binding() {
        let mut f = fixture();
        let a = f.linked_program();
        let b = f.linked_program();

        f.gl.use_program(a).unwrap();
        f.gl.delete_program(b).unwrap();
        assert_eq!(f.gl.binding(), ProgramBinding::Bound(a));

        f.gl.delete_program(a).unwrap();
        assert_eq!(f.gl.binding(), ProgramBinding::NoProgram);
        assert!(f.gl.use_program(a).is_err());
    }

    #[test]
    fn use_program_zero_unbinds() {
        let mut f = fixture();
        let program = f.linked_program();
        f.gl.use_program(program).unwrap();
        f.gl.use_program(0).unwrap();
        assert_eq!(f.gl.binding(), ProgramBinding::NoProgram);
        assert_eq!(f.headless().current_program(), None);
    }

    #[test]
    fn attrib_location_name_is_marshaled() {
        let mut f = fixture();
        let program = f.gl.create_program().unwrap();
        let name = f.c_string("a_position");
        f.gl.bind_attrib_location(&f.mem, program, 3, name).unwrap();
        let host: ProgramObject = f.gl.programs().resolve(program).unwrap().program;
        assert_eq!(
            f.headless().attrib_bindings(host).unwrap(),
            &[(3, "a_position".to_string())]
        );
    }

    #[test]
    fn vertex_attrib_pointer_validates_type() {
        let mut f = fixture();
        f.gl.vertex_attrib_pointer(0, 3, consts::FLOAT, 0, 12, 0).unwrap();
        let err = f.gl.vertex_attrib_pointer(0, 3, 0x140A, 1, 12, 0).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::InvalidArgument { op: "glVertexAttribPointer", .. }
        ));
        assert_eq!(f.headless().calls().len(), 1);
    }

    #[test]
    fn clear_rejects_unknown_bits() {
        let mut f = fixture();
        f.gl.clear(consts::COLOR_BUFFER_BIT | consts::DEPTH_BUFFER_BIT).unwrap();
        assert!(f.gl.clear(0x1).is_err());
        assert_eq!(f.headless().calls(), &["clear(0x4100)".to_string()]);
    }

    #[test]
    fn vertex_array_lifecycle() {
        let mut f = fixture();
        f.gl.gen_vertex_arrays(&f.mem, 1, 0x40).unwrap();
        let handle = f.mem.read_u32(0x40).unwrap();
        f.gl.bind_vertex_array(handle).unwrap();
        assert!(f.headless().bound_vertex_array().is_some());

        f.gl.bind_vertex_array(0).unwrap();
        assert!(f.headless().bound_vertex_array().is_none());

        f.gl.delete_vertex_arrays(&f.mem, 1, 0x40).unwrap();
        assert!(f.gl.bind_vertex_array(handle).is_err());
    }

    #[test]
    fn only_default_framebuffer_binds() {
        let mut f = fixture();
        f.gl.bind_framebuffer(consts::FRAMEBUFFER, 0).unwrap();
        assert!(matches!(
            f.gl.bind_framebuffer(consts::FRAMEBUFFER, 3),
            Err(BridgeError::NotImplemented(_))
        ));
    }

    #[test]
    fn refused_creation_is_reported() {
        let mut ctx = HeadlessContext::new();
        ctx.set_refuse_creation(true);
        let mut f = fixture_with(ctx);
        assert_eq!(
            f.gl.create_program(),
            Err(BridgeError::HostRefused("glCreateProgram"))
        );
        assert!(f.gl.gen_buffers(&f.mem, 1, 0x40).is_err());
    }

    #[test]
    fn precision_format_is_written() {
        let mut f = fixture();
        f.gl.get_shader_precision_format(
            &f.mem,
            consts::FRAGMENT_SHADER,
            consts::HIGH_FLOAT,
            0x40,
            0x48,
        )
        .unwrap();
        assert_eq!(f.mem.read_i32(0x40).unwrap(), 127);
        assert_eq!(f.mem.read_i32(0x44).unwrap(), 127);
        assert_eq!(f.mem.read_i32(0x48).unwrap(), 23);
    }

    #[test]
    fn arrays_wrapping_the_address_space_are_rejected() {
        let mut f = fixture();
        let wraps = |result: Result<(), BridgeError>| {
            matches!(result, Err(BridgeError::InvalidArgument { .. }))
        };

        assert!(wraps(f.gl.gen_buffers(&f.mem, 2, 0xFFFF_FFFC)));
        assert!(wraps(f.gl.gen_vertex_arrays(&f.mem, 3, 0xFFFF_FFF8)));
        assert_eq!(f.headless().live_buffers(), 0);
        assert!(f.headless().calls().is_empty());

        let shader = f.gl.create_shader(consts::VERTEX_SHADER).unwrap();
        assert!(wraps(f.gl.shader_source(&f.mem, shader, 2, 0xFFFF_FFFC, 0)));
        f.mem.write_u32_array(0x100, &[0x400, 0x500]).unwrap();
        assert!(wraps(f.gl.shader_source(&f.mem, shader, 2, 0x100, 0xFFFF_FFFC)));

        f.mem.write_i32(0x48, -1).unwrap();
        assert!(wraps(f.gl.get_shader_precision_format(
            &f.mem,
            consts::FRAGMENT_SHADER,
            consts::HIGH_FLOAT,
            0xFFFF_FFFC,
            0x48,
        )));
        assert_eq!(f.mem.read_i32(0x48).unwrap(), -1);
    }
}
