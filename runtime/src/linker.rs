//! Import registration and dispatch.
//!
//! Every catalogue entry is registered on a `wasmtime::Linker` with its
//! declared signature. All entries share one dispatcher: an exhaustive
//! `match` over [`Import`], so a catalogue entry without a binding does not
//! compile. A failing call is logged with its raw arguments and returned to
//! wasmtime as a [`BridgeError`], trapping the calling context.

use std::fmt;
use std::mem;

use log::{error, trace};
use wasmtime::{Caller, FuncType, Instance, Linker, Module, SharedMemory, Store, Val};

use glbridge_graphics::GraphicsContext;

use crate::allocator::{ExportAllocator, GuestAllocator};
use crate::catalogue::Import;
use crate::context::ContextState;
use crate::engine::LinkerHook;
use crate::gl::{flag, GlBinding};
use crate::quad::{QuadCmp, QuadEmulator, QuadOp};
use crate::setjmp::JumpState;
use crate::{BootError, BridgeError};

/// Build a linker for the store's context and instantiate `module`.
///
/// Defines `env.memory` as the context's shared memory, registers the whole
/// catalogue, then runs the embedder hook.
pub fn instantiate(
    store: &mut Store<ContextState>,
    module: &Module,
    hook: Option<&LinkerHook>,
) -> Result<Instance, BootError> {
    let link = |err: wasmtime::Error| BootError::Link(format!("{err:#}"));

    let mut linker = Linker::new(store.engine());
    register_all(&mut linker).map_err(link)?;
    let memory = store.data().memory().clone();
    linker.define(&*store, "env", "memory", memory).map_err(link)?;
    if let Some(hook) = hook {
        hook(&mut linker).map_err(link)?;
    }
    if store.data().config().trap_unknown_imports {
        linker.define_unknown_imports_as_traps(module).map_err(link)?;
    }

    linker
        .instantiate(&mut *store, module)
        .map_err(|err| BootError::Instantiate(format!("{err:#}")))
}

/// Register every catalogue entry.
pub fn register_all(linker: &mut Linker<ContextState>) -> wasmtime::Result<()> {
    for &import in Import::ALL {
        let ty = FuncType::new(
            import.params().iter().map(|ty| ty.val_type()),
            import.results().iter().map(|ty| ty.val_type()),
        );
        linker.func_new(
            import.module(),
            import.name(),
            ty,
            move |mut caller, params, results| call(import, &mut caller, params, results),
        )?;
    }
    Ok(())
}

fn call(
    import: Import,
    caller: &mut Caller<'_, ContextState>,
    params: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    let args = Args(params);
    if caller.data().config().trace_imports {
        trace!("[{}] {}({args})", caller.data().role(), import.name());
    }

    match dispatch(import, caller, &args) {
        Ok(value) => {
            if let (Some(value), Some(slot)) = (value, results.first_mut()) {
                *slot = value;
            }
            Ok(())
        }
        Err(err) => {
            error!("{} failed ({args}): {err}", import.name());
            Err(wasmtime::Error::new(err))
        }
    }
}

/// Positional call arguments, typed by the catalogue signature.
struct Args<'a>(&'a [Val]);

impl Args<'_> {
    fn i32(&self, index: usize) -> i32 {
        self.0.get(index).and_then(Val::i32).unwrap_or_default()
    }

    fn u32(&self, index: usize) -> u32 {
        self.i32(index) as u32
    }

    /// A pointer or offset argument widened for host calls taking `GLintptr`.
    fn offset(&self, index: usize) -> i64 {
        i64::from(self.u32(index))
    }

    fn i64(&self, index: usize) -> i64 {
        self.0.get(index).and_then(Val::i64).unwrap_or_default()
    }

    fn f32(&self, index: usize) -> f32 {
        self.0.get(index).and_then(Val::f32).unwrap_or_default()
    }

    fn f64(&self, index: usize) -> f64 {
        self.0.get(index).and_then(Val::f64).unwrap_or_default()
    }

    fn flag(&self, index: usize) -> bool {
        flag(self.i32(index))
    }
}

impl fmt::Display for Args<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match value {
                Val::I32(v) => write!(f, "{v:#x}")?,
                Val::I64(v) => write!(f, "{v:#x}")?,
                Val::F32(bits) => write!(f, "{}", f32::from_bits(*bits))?,
                Val::F64(bits) => write!(f, "{}", f64::from_bits(*bits))?,
                _ => f.write_str("?")?,
            }
        }
        Ok(())
    }
}

type CallResult = Result<Option<Val>, BridgeError>;

fn unit<E>(result: Result<(), E>) -> Result<Option<Val>, E> {
    result.map(|()| None)
}

fn int(value: i32) -> Option<Val> {
    Some(Val::I32(value))
}

fn ptr(value: u32) -> Option<Val> {
    Some(Val::I32(value as i32))
}

/// Run `f` on the host context directly.
fn with_host<R>(
    caller: &mut Caller<'_, ContextState>,
    import: Import,
    f: impl FnOnce(&mut dyn GraphicsContext) -> R,
) -> Result<R, BridgeError> {
    let gl = caller
        .data_mut()
        .gl_mut()
        .ok_or(BridgeError::HostNotReady(import.name()))?;
    Ok(f(gl.host()))
}

/// Run `f` on the graphics binding with access to linear memory.
fn with_binding<R>(
    caller: &mut Caller<'_, ContextState>,
    import: Import,
    f: impl FnOnce(&mut GlBinding, &SharedMemory) -> Result<R, BridgeError>,
) -> Result<R, BridgeError> {
    let memory = caller.data().memory().clone();
    let gl = caller
        .data_mut()
        .gl_mut()
        .ok_or(BridgeError::HostNotReady(import.name()))?;
    f(gl, &memory)
}

/// Run `f` on the graphics binding with the guest allocator available.
///
/// The binding is detached from the store while `f` runs, so the caller can
/// re-enter the guest for `malloc`.
fn with_allocator<R>(
    caller: &mut Caller<'_, ContextState>,
    import: Import,
    f: impl FnOnce(&mut GlBinding, &SharedMemory, &mut dyn GuestAllocator) -> Result<R, BridgeError>,
) -> Result<R, BridgeError> {
    let mut gl = caller
        .data_mut()
        .take_gl()
        .ok_or(BridgeError::HostNotReady(import.name()))?;
    let memory = caller.data().memory().clone();
    let mut allocator = ExportAllocator::new(&mut *caller);
    let result = f(gl.as_mut(), &memory, &mut allocator);
    caller.data_mut().restore_gl(gl);
    result
}

fn with_jumps<R>(
    caller: &mut Caller<'_, ContextState>,
    f: impl FnOnce(&mut JumpState, &SharedMemory, &mut dyn GuestAllocator) -> Result<R, BridgeError>,
) -> Result<R, BridgeError> {
    let mut jumps = mem::take(&mut caller.data_mut().jumps);
    let memory = caller.data().memory().clone();
    let mut allocator = ExportAllocator::new(&mut *caller);
    let result = f(&mut jumps, &memory, &mut allocator);
    caller.data_mut().jumps = jumps;
    result
}

fn with_quad<R>(
    caller: &mut Caller<'_, ContextState>,
    f: impl FnOnce(&mut QuadEmulator, &SharedMemory, &mut dyn GuestAllocator) -> Result<R, BridgeError>,
) -> Result<R, BridgeError> {
    let mut quad = mem::take(&mut caller.data_mut().quad);
    let memory = caller.data().memory().clone();
    let mut allocator = ExportAllocator::new(&mut *caller);
    let result = f(&mut quad, &memory, &mut allocator);
    caller.data_mut().quad = quad;
    result
}

fn compare(caller: &mut Caller<'_, ContextState>, cmp: QuadCmp, a: &Args<'_>) -> CallResult {
    with_quad(caller, |quad, memory, _| quad.compare(memory, cmp, a.u32(0), a.u32(1))).map(int)
}

fn arith(caller: &mut Caller<'_, ContextState>, op: QuadOp, a: &Args<'_>) -> CallResult {
    with_quad(caller, |quad, memory, alloc| {
        quad.arith(memory, alloc, op, a.u32(0), a.u32(1))
    })
    .map(ptr)
}

fn dispatch(import: Import, caller: &mut Caller<'_, ContextState>, a: &Args<'_>) -> CallResult {
    use Import::*;

    match import {
        // Core
        New => ExportAllocator::new(caller).allocate(a.u32(0)).map(ptr),
        Delete => unit(ExportAllocator::new(caller).free(a.u32(0))),

        // Graphics: state
        GetError => with_host(caller, import, |host| host.get_error()).map(ptr),
        GetString => {
            with_allocator(caller, import, |gl, memory, alloc| {
                gl.get_string(memory, alloc, a.u32(0))
            })
            .map(ptr)
        }
        GetIntegerv => unit(with_binding(caller, import, |gl, memory| {
            gl.get_integerv(memory, a.u32(0), a.u32(1))
        })),
        GetShaderPrecisionFormat => unit(with_binding(caller, import, |gl, memory| {
            gl.get_shader_precision_format(memory, a.u32(0), a.u32(1), a.u32(2), a.u32(3))
        })),
        PixelStorei => unit(with_host(caller, import, |host| {
            host.pixel_storei(a.u32(0), a.i32(1))
        })),
        LineWidth => unit(with_host(caller, import, |host| host.line_width(a.f32(0)))),
        FrontFace => unit(with_host(caller, import, |host| host.front_face(a.u32(0)))),
        CullFace => unit(with_host(caller, import, |host| host.cull_face(a.u32(0)))),
        Enable => unit(with_host(caller, import, |host| host.enable(a.u32(0)))),
        Disable => unit(with_host(caller, import, |host| host.disable(a.u32(0)))),
        DepthMask => unit(with_host(caller, import, |host| host.depth_mask(a.flag(0)))),
        ColorMask => unit(with_host(caller, import, |host| {
            host.color_mask(a.flag(0), a.flag(1), a.flag(2), a.flag(3))
        })),
        Clear => unit(with_binding(caller, import, |gl, _| gl.clear(a.u32(0)))),
        ClearColor => unit(with_host(caller, import, |host| {
            host.clear_color(a.f32(0), a.f32(1), a.f32(2), a.f32(3))
        })),
        ClearStencil => unit(with_host(caller, import, |host| host.clear_stencil(a.i32(0)))),
        BlendFunc => unit(with_host(caller, import, |host| {
            host.blend_func(a.u32(0), a.u32(1))
        })),
        BlendEquation => unit(with_host(caller, import, |host| host.blend_equation(a.u32(0)))),
        BlendColor => unit(with_host(caller, import, |host| {
            host.blend_color(a.f32(0), a.f32(1), a.f32(2), a.f32(3))
        })),
        Viewport => unit(with_host(caller, import, |host| {
            host.viewport(a.i32(0), a.i32(1), a.i32(2), a.i32(3))
        })),
        ActiveTexture => unit(with_host(caller, import, |host| host.active_texture(a.u32(0)))),
        ReadBuffer => unit(with_host(caller, import, |host| host.read_buffer(a.u32(0)))),
        Flush => unit(with_host(caller, import, |host| host.flush())),
        Finish => unit(with_host(caller, import, |host| host.finish())),

        // Graphics: buffers
        GenBuffers => unit(with_binding(caller, import, |gl, memory| {
            gl.gen_buffers(memory, a.i32(0), a.u32(1))
        })),
        DeleteBuffers => unit(with_binding(caller, import, |gl, memory| {
            gl.delete_buffers(memory, a.i32(0), a.u32(1))
        })),
        BindBuffer => unit(with_binding(caller, import, |gl, _| {
            gl.bind_buffer(a.u32(0), a.u32(1))
        })),
        BufferData => unit(with_binding(caller, import, |gl, memory| {
            gl.buffer_data(memory, a.u32(0), a.i32(1), a.u32(2), a.u32(3))
        })),
        BufferSubData => unit(with_binding(caller, import, |gl, memory| {
            gl.buffer_sub_data(memory, a.u32(0), a.i32(1), a.i32(2), a.u32(3))
        })),
        CopyBufferSubData => unit(with_host(caller, import, |host| {
            host.copy_buffer_sub_data(
                a.u32(0),
                a.u32(1),
                i64::from(a.i32(2)),
                i64::from(a.i32(3)),
                i64::from(a.i32(4)),
            )
        })),

        // Graphics: shaders and programs
        CreateShader => with_binding(caller, import, |gl, _| gl.create_shader(a.u32(0))).map(ptr),
        DeleteShader => unit(with_binding(caller, import, |gl, _| gl.delete_shader(a.u32(0)))),
        ShaderSource => unit(with_binding(caller, import, |gl, memory| {
            gl.shader_source(memory, a.u32(0), a.i32(1), a.u32(2), a.u32(3))
        })),
        CompileShader => unit(with_binding(caller, import, |gl, _| gl.compile_shader(a.u32(0)))),
        GetShaderiv => unit(with_binding(caller, import, |gl, memory| {
            gl.get_shaderiv(memory, a.u32(0), a.u32(1), a.u32(2))
        })),
        GetShaderInfoLog => unit(with_binding(caller, import, |gl, memory| {
            gl.get_shader_info_log(memory, a.u32(0), a.i32(1), a.u32(2), a.u32(3))
        })),
        CreateProgram => with_binding(caller, import, |gl, _| gl.create_program()).map(ptr),
        DeleteProgram => unit(with_binding(caller, import, |gl, _| gl.delete_program(a.u32(0)))),
        AttachShader => unit(with_binding(caller, import, |gl, _| {
            gl.attach_shader(a.u32(0), a.u32(1))
        })),
        BindAttribLocation => unit(with_binding(caller, import, |gl, memory| {
            gl.bind_attrib_location(memory, a.u32(0), a.u32(1), a.u32(2))
        })),
        LinkProgram => unit(with_binding(caller, import, |gl, _| gl.link_program(a.u32(0)))),
        GetProgramiv => unit(with_binding(caller, import, |gl, memory| {
            gl.get_programiv(memory, a.u32(0), a.u32(1), a.u32(2))
        })),
        UseProgram => unit(with_binding(caller, import, |gl, _| gl.use_program(a.u32(0)))),
        GetUniformLocation => with_binding(caller, import, |gl, memory| {
            gl.get_uniform_location(memory, a.u32(0), a.u32(1))
        })
        .map(int),
        Uniform4fv => unit(with_binding(caller, import, |gl, memory| {
            gl.uniform4fv(memory, a.i32(0), a.i32(1), a.u32(2))
        })),

        // Graphics: vertex specification
        EnableVertexAttribArray => unit(with_host(caller, import, |host| {
            host.enable_vertex_attrib_array(a.u32(0))
        })),
        DisableVertexAttribArray => unit(with_host(caller, import, |host| {
            host.disable_vertex_attrib_array(a.u32(0))
        })),
        VertexAttribPointer => unit(with_binding(caller, import, |gl, _| {
            gl.vertex_attrib_pointer(a.u32(0), a.i32(1), a.u32(2), a.i32(3), a.i32(4), a.u32(5))
        })),
        VertexAttribIPointer => unit(with_host(caller, import, |host| {
            host.vertex_attrib_i_pointer(a.u32(0), a.i32(1), a.u32(2), a.i32(3), a.offset(4))
        })),
        VertexAttribDivisor => unit(with_host(caller, import, |host| {
            host.vertex_attrib_divisor(a.u32(0), a.u32(1))
        })),
        GenVertexArrays => unit(with_binding(caller, import, |gl, memory| {
            gl.gen_vertex_arrays(memory, a.i32(0), a.u32(1))
        })),
        DeleteVertexArrays => unit(with_binding(caller, import, |gl, memory| {
            gl.delete_vertex_arrays(memory, a.i32(0), a.u32(1))
        })),
        BindVertexArray => unit(with_binding(caller, import, |gl, _| {
            gl.bind_vertex_array(a.u32(0))
        })),

        // Graphics: drawing
        DrawArrays => unit(with_host(caller, import, |host| {
            host.draw_arrays(a.u32(0), a.i32(1), a.i32(2))
        })),
        DrawElements => unit(with_host(caller, import, |host| {
            host.draw_elements(a.u32(0), a.i32(1), a.u32(2), a.offset(3))
        })),
        DrawArraysInstanced => unit(with_host(caller, import, |host| {
            host.draw_arrays_instanced(a.u32(0), a.i32(1), a.i32(2), a.i32(3))
        })),
        DrawElementsInstanced => unit(with_host(caller, import, |host| {
            host.draw_elements_instanced(a.u32(0), a.i32(1), a.u32(2), a.offset(3), a.i32(4))
        })),
        DrawRangeElements => unit(with_host(caller, import, |host| {
            host.draw_range_elements(a.u32(0), a.u32(1), a.u32(2), a.i32(3), a.u32(4), a.offset(5))
        })),

        // Graphics: textures
        TexStorage2D => unit(with_host(caller, import, |host| {
            host.tex_storage_2d(a.u32(0), a.i32(1), a.u32(2), a.i32(3), a.i32(4))
        })),
        CopyTexSubImage2D => unit(with_host(caller, import, |host| {
            host.copy_tex_sub_image_2d(
                a.u32(0),
                a.i32(1),
                a.i32(2),
                a.i32(3),
                a.i32(4),
                a.i32(5),
                a.i32(6),
                a.i32(7),
            )
        })),
        CompressedTexImage2D => unit(with_host(caller, import, |host| {
            host.compressed_tex_image_2d(
                a.u32(0),
                a.i32(1),
                a.u32(2),
                a.i32(3),
                a.i32(4),
                a.i32(5),
                a.i32(6),
                a.offset(7),
            )
        })),
        CompressedTexSubImage2D => unit(with_host(caller, import, |host| {
            host.compressed_tex_sub_image_2d(
                a.u32(0),
                a.i32(1),
                a.i32(2),
                a.i32(3),
                a.i32(4),
                a.i32(5),
                a.u32(6),
                a.i32(7),
                a.offset(8),
            )
        })),
        GenerateMipmap => unit(with_host(caller, import, |host| host.generate_mipmap(a.u32(0)))),

        // Graphics: framebuffers
        BindFramebuffer => unit(with_binding(caller, import, |gl, _| {
            gl.bind_framebuffer(a.u32(0), a.u32(1))
        })),
        CheckFramebufferStatus => with_host(caller, import, |host| {
            host.check_framebuffer_status(a.u32(0))
        })
        .map(ptr),
        RenderbufferStorage => unit(with_host(caller, import, |host| {
            host.renderbuffer_storage(a.u32(0), a.u32(1), a.i32(2), a.i32(3))
        })),
        RenderbufferStorageMultisample => unit(with_host(caller, import, |host| {
            host.renderbuffer_storage_multisample(a.u32(0), a.i32(1), a.u32(2), a.i32(3), a.i32(4))
        })),
        BlitFramebuffer => unit(with_host(caller, import, |host| {
            host.blit_framebuffer(
                a.i32(0),
                a.i32(1),
                a.i32(2),
                a.i32(3),
                a.i32(4),
                a.i32(5),
                a.i32(6),
                a.i32(7),
                a.u32(8),
                a.u32(9),
            )
        })),

        // Graphics: outside the bound working set. This arm is the only
        // list of stubs; they fail before any context is consulted.
        GetStringi | GetFloatv | StencilFunc | StencilFuncSeparate | StencilMask
        | StencilMaskSeparate | StencilOp | StencilOpSeparate | Scissor | DrawBuffers
        | ReadPixels | GetBufferParameteriv | GetProgramInfoLog | Uniform1f | Uniform1fv
        | Uniform1i | Uniform1iv | Uniform2f | Uniform2fv | Uniform2i | Uniform2iv | Uniform3f
        | Uniform3fv | Uniform3i | Uniform3iv | Uniform4f | Uniform4i | Uniform4iv
        | UniformMatrix2fv | UniformMatrix3fv | UniformMatrix4fv | VertexAttrib1f
        | VertexAttrib2fv | VertexAttrib3fv | VertexAttrib4fv | GenVertexArraysOES
        | DeleteVertexArraysOES | BindVertexArrayOES | DrawArraysInstancedBaseInstance
        | DrawElementsInstancedBaseVertexBaseInstance | MultiDrawArraysInstancedBaseInstance
        | MultiDrawElementsInstancedBaseVertexBaseInstance | GenTextures | DeleteTextures
        | BindTexture | IsTexture | TexImage2D | TexSubImage2D | TexParameterf | TexParameterfv
        | TexParameteri | TexParameteriv | GenSamplers | DeleteSamplers | BindSampler
        | SamplerParameterf | SamplerParameteri | SamplerParameteriv | GenFramebuffers
        | DeleteFramebuffers | FramebufferTexture2D | FramebufferRenderbuffer
        | GetFramebufferAttachmentParameteriv | InvalidateFramebuffer | InvalidateSubFramebuffer
        | GenRenderbuffers | DeleteRenderbuffers | BindRenderbuffer | GetRenderbufferParameteriv
        | FenceSync | IsSync | DeleteSync | ClientWaitSync | WaitSync => {
            Err(BridgeError::NotImplemented(import.name()))
        }

        // Emulation: setjmp
        SaveSetjmp => with_jumps(caller, |jumps, memory, alloc| {
            jumps.save(memory, alloc, a.u32(0), a.u32(1), a.u32(2), a.u32(3))
        })
        .map(ptr),
        TestSetjmp => with_jumps(caller, |jumps, memory, _| {
            jumps.test(memory, a.u32(0), a.u32(1), a.u32(2))
        })
        .map(ptr),
        GetTempRet0 => Ok(ptr(caller.data().jumps().temp_ret0())),
        SetTempRet0 => {
            caller.data_mut().jumps.set_temp_ret0(a.u32(0));
            Ok(None)
        }

        // Emulation: binary128
        EqTf2 => compare(caller, QuadCmp::Eq, a),
        NeTf2 => compare(caller, QuadCmp::Ne, a),
        LtTf2 => compare(caller, QuadCmp::Lt, a),
        LeTf2 => compare(caller, QuadCmp::Le, a),
        GtTf2 => compare(caller, QuadCmp::Gt, a),
        GeTf2 => compare(caller, QuadCmp::Ge, a),
        UnordTf2 => compare(caller, QuadCmp::Unordered, a),
        AddTf3 => arith(caller, QuadOp::Add, a),
        SubTf3 => arith(caller, QuadOp::Sub, a),
        MulTf3 => arith(caller, QuadOp::Mul, a),
        DivTf3 => arith(caller, QuadOp::Div, a),
        FloatSiTf => with_quad(caller, |quad, memory, alloc| {
            quad.from_i64(memory, alloc, i64::from(a.i32(0)))
        })
        .map(ptr),
        FloatUnsiTf => with_quad(caller, |quad, memory, alloc| {
            quad.from_u64(memory, alloc, u64::from(a.u32(0)))
        })
        .map(ptr),
        FloatDiTf => with_quad(caller, |quad, memory, alloc| {
            quad.from_i64(memory, alloc, a.i64(0))
        })
        .map(ptr),
        FloatUndiTf => with_quad(caller, |quad, memory, alloc| {
            quad.from_u64(memory, alloc, a.i64(0) as u64)
        })
        .map(ptr),
        FixTfSi => with_quad(caller, |quad, memory, _| quad.to_i32(memory, a.u32(0))).map(int),
        FixUnsTfSi => with_quad(caller, |quad, memory, _| quad.to_u32(memory, a.u32(0))).map(ptr),
        FixTfDi => with_quad(caller, |quad, memory, _| quad.to_i64(memory, a.u32(0)))
            .map(|v| Some(Val::I64(v))),
        FixUnsTfDi => with_quad(caller, |quad, memory, _| quad.to_u64(memory, a.u32(0)))
            .map(|v| Some(Val::I64(v as i64))),
        ExtendDfTf2 => with_quad(caller, |quad, memory, alloc| {
            quad.from_f64(memory, alloc, a.f64(0))
        })
        .map(ptr),
        ExtendSfTf2 => with_quad(caller, |quad, memory, alloc| {
            quad.from_f64(memory, alloc, f64::from(a.f32(0)))
        })
        .map(ptr),
        TruncTfDf2 => with_quad(caller, |quad, memory, _| quad.to_f64(memory, a.u32(0)))
            .map(|v| Some(Val::from(v))),
        TruncTfSf2 => with_quad(caller, |quad, memory, _| quad.to_f32(memory, a.u32(0)))
            .map(|v| Some(Val::from(v))),

        // Threads
        ThreadSpawn => Ok(int(caller.data().spawner().spawn(a.u32(0)))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_format_as_hex() {
        let params = [Val::I32(16), Val::I64(-1), Val::F32(1.5f32.to_bits())];
        assert_eq!(Args(&params).to_string(), "0x10, 0xffffffffffffffff, 1.5");
    }

    #[test]
    fn args_reinterpret_signedness() {
        let params = [Val::I32(-1), Val::F64(2.5f64.to_bits())];
        let args = Args(&params);
        assert_eq!(args.u32(0), u32::MAX);
        assert_eq!(args.offset(0), u32::MAX as i64);
        assert_eq!(args.f64(1), 2.5);
        assert!(args.flag(0));
        assert_eq!(args.i32(7), 0);
    }
}
