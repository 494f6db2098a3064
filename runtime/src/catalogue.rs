//! The import catalogue.
//!
//! Every function a compiled module may import from the bridge is a variant
//! of [`Import`], declared once below with its module, field name, wasm32
//! signature and group. Signatures follow the C prototypes under the wasm32
//! ABI: enumerations, integers, sizes, offsets and pointers are `i32`,
//! `GLfloat` is `f32`, `GLuint64` and `long long` are `i64`.

use std::fmt;

use wasmtime::ValType;

/// Value type of one import parameter or result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WasmType {
    I32,
    I64,
    F32,
    F64,
}

impl WasmType {
    pub fn val_type(self) -> ValType {
        match self {
            WasmType::I32 => ValType::I32,
            WasmType::I64 => ValType::I64,
            WasmType::F32 => ValType::F32,
            WasmType::F64 => ValType::F64,
        }
    }
}

/// Catalogue groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImportGroup {
    /// Allocator forwarders.
    Core,
    /// The graphics subset.
    Graphics,
    /// setjmp registration and binary128 emulation.
    Emulation,
    /// wasi-threads spawning.
    Threads,
}

macro_rules! catalogue {
    ($(
        $variant:ident => $module:literal $name:literal
            ($($param:ident),*) -> ($($result:ident),*) $group:ident;
    )*) => {
        /// One importable function.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Import {
            $($variant,)*
        }

        impl Import {
            /// Every entry, in declaration order.
            pub const ALL: &'static [Import] = &[$(Import::$variant,)*];

            pub fn module(self) -> &'static str {
                match self {
                    $(Import::$variant => $module,)*
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(Import::$variant => $name,)*
                }
            }

            pub fn params(self) -> &'static [WasmType] {
                match self {
                    $(Import::$variant => &[$(WasmType::$param),*],)*
                }
            }

            pub fn results(self) -> &'static [WasmType] {
                match self {
                    $(Import::$variant => &[$(WasmType::$result),*],)*
                }
            }

            pub fn group(self) -> ImportGroup {
                match self {
                    $(Import::$variant => ImportGroup::$group,)*
                }
            }
        }
    };
}

catalogue! {
    // Core
    New => "env" "_Znwm" (I32) -> (I32) Core;
    Delete => "env" "_ZdlPv" (I32) -> () Core;

    // Graphics: state
    GetError => "env" "glGetError" () -> (I32) Graphics;
    GetString => "env" "glGetString" (I32) -> (I32) Graphics;
    GetStringi => "env" "glGetStringi" (I32, I32) -> (I32) Graphics;
    GetIntegerv => "env" "glGetIntegerv" (I32, I32) -> () Graphics;
    GetFloatv => "env" "glGetFloatv" (I32, I32) -> () Graphics;
    GetShaderPrecisionFormat => "env" "glGetShaderPrecisionFormat" (I32, I32, I32, I32) -> () Graphics;
    PixelStorei => "env" "glPixelStorei" (I32, I32) -> () Graphics;
    LineWidth => "env" "glLineWidth" (F32) -> () Graphics;
    FrontFace => "env" "glFrontFace" (I32) -> () Graphics;
    CullFace => "env" "glCullFace" (I32) -> () Graphics;
    Enable => "env" "glEnable" (I32) -> () Graphics;
    Disable => "env" "glDisable" (I32) -> () Graphics;
    DepthMask => "env" "glDepthMask" (I32) -> () Graphics;
    ColorMask => "env" "glColorMask" (I32, I32, I32, I32) -> () Graphics;
    Clear => "env" "glClear" (I32) -> () Graphics;
    ClearColor => "env" "glClearColor" (F32, F32, F32, F32) -> () Graphics;
    ClearStencil => "env" "glClearStencil" (I32) -> () Graphics;
    BlendFunc => "env" "glBlendFunc" (I32, I32) -> () Graphics;
    BlendEquation => "env" "glBlendEquation" (I32) -> () Graphics;
    BlendColor => "env" "glBlendColor" (F32, F32, F32, F32) -> () Graphics;
    StencilFunc => "env" "glStencilFunc" (I32, I32, I32) -> () Graphics;
    StencilFuncSeparate => "env" "glStencilFuncSeparate" (I32, I32, I32, I32) -> () Graphics;
    StencilMask => "env" "glStencilMask" (I32) -> () Graphics;
    StencilMaskSeparate => "env" "glStencilMaskSeparate" (I32, I32) -> () Graphics;
    StencilOp => "env" "glStencilOp" (I32, I32, I32) -> () Graphics;
    StencilOpSeparate => "env" "glStencilOpSeparate" (I32, I32, I32, I32) -> () Graphics;
    Scissor => "env" "glScissor" (I32, I32, I32, I32) -> () Graphics;
    Viewport => "env" "glViewport" (I32, I32, I32, I32) -> () Graphics;
    ActiveTexture => "env" "glActiveTexture" (I32) -> () Graphics;
    ReadBuffer => "env" "glReadBuffer" (I32) -> () Graphics;
    DrawBuffers => "env" "glDrawBuffers" (I32, I32) -> () Graphics;
    ReadPixels => "env" "glReadPixels" (I32, I32, I32, I32, I32, I32, I32) -> () Graphics;
    Flush => "env" "glFlush" () -> () Graphics;
    Finish => "env" "glFinish" () -> () Graphics;

    // Graphics: buffers
    GenBuffers => "env" "glGenBuffers" (I32, I32) -> () Graphics;
    DeleteBuffers => "env" "glDeleteBuffers" (I32, I32) -> () Graphics;
    BindBuffer => "env" "glBindBuffer" (I32, I32) -> () Graphics;
    BufferData => "env" "glBufferData" (I32, I32, I32, I32) -> () Graphics;
    BufferSubData => "env" "glBufferSubData" (I32, I32, I32, I32) -> () Graphics;
    CopyBufferSubData => "env" "glCopyBufferSubData" (I32, I32, I32, I32, I32) -> () Graphics;
    GetBufferParameteriv => "env" "glGetBufferParameteriv" (I32, I32, I32) -> () Graphics;

    // Graphics: shaders and programs
    CreateShader => "env" "glCreateShader" (I32) -> (I32) Graphics;
    DeleteShader => "env" "glDeleteShader" (I32) -> () Graphics;
    ShaderSource => "env" "glShaderSource" (I32, I32, I32, I32) -> () Graphics;
    CompileShader => "env" "glCompileShader" (I32) -> () Graphics;
    GetShaderiv => "env" "glGetShaderiv" (I32, I32, I32) -> () Graphics;
    GetShaderInfoLog => "env" "glGetShaderInfoLog" (I32, I32, I32, I32) -> () Graphics;
    CreateProgram => "env" "glCreateProgram" () -> (I32) Graphics;
    DeleteProgram => "env" "glDeleteProgram" (I32) -> () Graphics;
    AttachShader => "env" "glAttachShader" (I32, I32) -> () Graphics;
    BindAttribLocation => "env" "glBindAttribLocation" (I32, I32, I32) -> () Graphics;
    LinkProgram => "env" "glLinkProgram" (I32) -> () Graphics;
    GetProgramiv => "env" "glGetProgramiv" (I32, I32, I32) -> () Graphics;
    GetProgramInfoLog => "env" "glGetProgramInfoLog" (I32, I32, I32, I32) -> () Graphics;
    UseProgram => "env" "glUseProgram" (I32) -> () Graphics;
    GetUniformLocation => "env" "glGetUniformLocation" (I32, I32) -> (I32) Graphics;

    // Graphics: uniforms
    Uniform1f => "env" "glUniform1f" (I32, F32) -> () Graphics;
    Uniform1fv => "env" "glUniform1fv" (I32, I32, I32) -> () Graphics;
    Uniform1i => "env" "glUniform1i" (I32, I32) -> () Graphics;
    Uniform1iv => "env" "glUniform1iv" (I32, I32, I32) -> () Graphics;
    Uniform2f => "env" "glUniform2f" (I32, F32, F32) -> () Graphics;
    Uniform2fv => "env" "glUniform2fv" (I32, I32, I32) -> () Graphics;
    Uniform2i => "env" "glUniform2i" (I32, I32, I32) -> () Graphics;
    Uniform2iv => "env" "glUniform2iv" (I32, I32, I32) -> () Graphics;
    Uniform3f => "env" "glUniform3f" (I32, F32, F32, F32) -> () Graphics;
    Uniform3fv => "env" "glUniform3fv" (I32, I32, I32) -> () Graphics;
    Uniform3i => "env" "glUniform3i" (I32, I32, I32, I32) -> () Graphics;
    Uniform3iv => "env" "glUniform3iv" (I32, I32, I32) -> () Graphics;
    Uniform4f => "env" "glUniform4f" (I32, F32, F32, F32, F32) -> () Graphics;
    Uniform4fv => "env" "glUniform4fv" (I32, I32, I32) -> () Graphics;
    Uniform4i => "env" "glUniform4i" (I32, I32, I32, I32, I32) -> () Graphics;
    Uniform4iv => "env" "glUniform4iv" (I32, I32, I32) -> () Graphics;
    UniformMatrix2fv => "env" "glUniformMatrix2fv" (I32, I32, I32, I32) -> () Graphics;
    UniformMatrix3fv => "env" "glUniformMatrix3fv" (I32, I32, I32, I32) -> () Graphics;
    UniformMatrix4fv => "env" "glUniformMatrix4fv" (I32, I32, I32, I32) -> () Graphics;

    // Graphics: vertex specification
    EnableVertexAttribArray => "env" "glEnableVertexAttribArray" (I32) -> () Graphics;
    DisableVertexAttribArray => "env" "glDisableVertexAttribArray" (I32) -> () Graphics;
    VertexAttribPointer => "env" "glVertexAttribPointer" (I32, I32, I32, I32, I32, I32) -> () Graphics;
    VertexAttribIPointer => "env" "glVertexAttribIPointer" (I32, I32, I32, I32, I32) -> () Graphics;
    VertexAttribDivisor => "env" "glVertexAttribDivisor" (I32, I32) -> () Graphics;
    VertexAttrib1f => "env" "glVertexAttrib1f" (I32, F32) -> () Graphics;
    VertexAttrib2fv => "env" "glVertexAttrib2fv" (I32, I32) -> () Graphics;
    VertexAttrib3fv => "env" "glVertexAttrib3fv" (I32, I32) -> () Graphics;
    VertexAttrib4fv => "env" "glVertexAttrib4fv" (I32, I32) -> () Graphics;
    GenVertexArrays => "env" "glGenVertexArrays" (I32, I32) -> () Graphics;
    DeleteVertexArrays => "env" "glDeleteVertexArrays" (I32, I32) -> () Graphics;
    BindVertexArray => "env" "glBindVertexArray" (I32) -> () Graphics;
    GenVertexArraysOES => "env" "glGenVertexArraysOES" (I32, I32) -> () Graphics;
    DeleteVertexArraysOES => "env" "glDeleteVertexArraysOES" (I32, I32) -> () Graphics;
    BindVertexArrayOES => "env" "glBindVertexArrayOES" (I32) -> () Graphics;

    // Graphics: drawing
    DrawArrays => "env" "glDrawArrays" (I32, I32, I32) -> () Graphics;
    DrawElements => "env" "glDrawElements" (I32, I32, I32, I32) -> () Graphics;
    DrawArraysInstanced => "env" "glDrawArraysInstanced" (I32, I32, I32, I32) -> () Graphics;
    DrawElementsInstanced => "env" "glDrawElementsInstanced" (I32, I32, I32, I32, I32) -> () Graphics;
    DrawRangeElements => "env" "glDrawRangeElements" (I32, I32, I32, I32, I32, I32) -> () Graphics;
    DrawArraysInstancedBaseInstance => "env" "glDrawArraysInstancedBaseInstanceWEBGL"
        (I32, I32, I32, I32, I32) -> () Graphics;
    DrawElementsInstancedBaseVertexBaseInstance => "env" "glDrawElementsInstancedBaseVertexBaseInstanceWEBGL"
        (I32, I32, I32, I32, I32, I32, I32) -> () Graphics;
    MultiDrawArraysInstancedBaseInstance => "env" "glMultiDrawArraysInstancedBaseInstanceWEBGL"
        (I32, I32, I32, I32, I32, I32) -> () Graphics;
    MultiDrawElementsInstancedBaseVertexBaseInstance => "env" "glMultiDrawElementsInstancedBaseVertexBaseInstanceWEBGL"
        (I32, I32, I32, I32, I32, I32, I32, I32) -> () Graphics;

    // Graphics: textures and samplers
    GenTextures => "env" "glGenTextures" (I32, I32) -> () Graphics;
    DeleteTextures => "env" "glDeleteTextures" (I32, I32) -> () Graphics;
    BindTexture => "env" "glBindTexture" (I32, I32) -> () Graphics;
    IsTexture => "env" "glIsTexture" (I32) -> (I32) Graphics;
    TexImage2D => "env" "glTexImage2D" (I32, I32, I32, I32, I32, I32, I32, I32, I32) -> () Graphics;
    TexSubImage2D => "env" "glTexSubImage2D" (I32, I32, I32, I32, I32, I32, I32, I32, I32) -> () Graphics;
    TexStorage2D => "env" "glTexStorage2D" (I32, I32, I32, I32, I32) -> () Graphics;
    TexParameterf => "env" "glTexParameterf" (I32, I32, F32) -> () Graphics;
    TexParameterfv => "env" "glTexParameterfv" (I32, I32, I32) -> () Graphics;
    TexParameteri => "env" "glTexParameteri" (I32, I32, I32) -> () Graphics;
    TexParameteriv => "env" "glTexParameteriv" (I32, I32, I32) -> () Graphics;
    CopyTexSubImage2D => "env" "glCopyTexSubImage2D" (I32, I32, I32, I32, I32, I32, I32, I32) -> () Graphics;
    CompressedTexImage2D => "env" "glCompressedTexImage2D" (I32, I32, I32, I32, I32, I32, I32, I32) -> () Graphics;
    CompressedTexSubImage2D => "env" "glCompressedTexSubImage2D"
        (I32, I32, I32, I32, I32, I32, I32, I32, I32) -> () Graphics;
    GenerateMipmap => "env" "glGenerateMipmap" (I32) -> () Graphics;
    GenSamplers => "env" "glGenSamplers" (I32, I32) -> () Graphics;
    DeleteSamplers => "env" "glDeleteSamplers" (I32, I32) -> () Graphics;
    BindSampler => "env" "glBindSampler" (I32, I32) -> () Graphics;
    SamplerParameterf => "env" "glSamplerParameterf" (I32, I32, F32) -> () Graphics;
    SamplerParameteri => "env" "glSamplerParameteri" (I32, I32, I32) -> () Graphics;
    SamplerParameteriv => "env" "glSamplerParameteriv" (I32, I32, I32) -> () Graphics;

    // Graphics: framebuffers and renderbuffers
    GenFramebuffers => "env" "glGenFramebuffers" (I32, I32) -> () Graphics;
    DeleteFramebuffers => "env" "glDeleteFramebuffers" (I32, I32) -> () Graphics;
    BindFramebuffer => "env" "glBindFramebuffer" (I32, I32) -> () Graphics;
    CheckFramebufferStatus => "env" "glCheckFramebufferStatus" (I32) -> (I32) Graphics;
    FramebufferTexture2D => "env" "glFramebufferTexture2D" (I32, I32, I32, I32, I32) -> () Graphics;
    FramebufferRenderbuffer => "env" "glFramebufferRenderbuffer" (I32, I32, I32, I32) -> () Graphics;
    GetFramebufferAttachmentParameteriv => "env" "glGetFramebufferAttachmentParameteriv"
        (I32, I32, I32, I32) -> () Graphics;
    InvalidateFramebuffer => "env" "glInvalidateFramebuffer" (I32, I32, I32) -> () Graphics;
    InvalidateSubFramebuffer => "env" "glInvalidateSubFramebuffer"
        (I32, I32, I32, I32, I32, I32, I32) -> () Graphics;
    BlitFramebuffer => "env" "glBlitFramebuffer"
        (I32, I32, I32, I32, I32, I32, I32, I32, I32, I32) -> () Graphics;
    GenRenderbuffers => "env" "glGenRenderbuffers" (I32, I32) -> () Graphics;
    DeleteRenderbuffers => "env" "glDeleteRenderbuffers" (I32, I32) -> () Graphics;
    BindRenderbuffer => "env" "glBindRenderbuffer" (I32, I32) -> () Graphics;
    RenderbufferStorage => "env" "glRenderbufferStorage" (I32, I32, I32, I32) -> () Graphics;
    RenderbufferStorageMultisample => "env" "glRenderbufferStorageMultisample"
        (I32, I32, I32, I32, I32) -> () Graphics;
    GetRenderbufferParameteriv => "env" "glGetRenderbufferParameteriv" (I32, I32, I32) -> () Graphics;

    // Graphics: sync objects
    FenceSync => "env" "glFenceSync" (I32, I32) -> (I32) Graphics;
    IsSync => "env" "glIsSync" (I32) -> (I32) Graphics;
    DeleteSync => "env" "glDeleteSync" (I32) -> () Graphics;
    ClientWaitSync => "env" "glClientWaitSync" (I32, I32, I64) -> (I32) Graphics;
    WaitSync => "env" "glWaitSync" (I32, I32, I64) -> () Graphics;

    // Emulation: setjmp
    SaveSetjmp => "env" "saveSetjmp" (I32, I32, I32, I32) -> (I32) Emulation;
    TestSetjmp => "env" "testSetjmp" (I32, I32, I32) -> (I32) Emulation;
    GetTempRet0 => "env" "getTempRet0" () -> (I32) Emulation;
    SetTempRet0 => "env" "setTempRet0" (I32) -> () Emulation;

    // Emulation: binary128
    EqTf2 => "env" "__eqtf2" (I32, I32) -> (I32) Emulation;
    NeTf2 => "env" "__netf2" (I32, I32) -> (I32) Emulation;
    LtTf2 => "env" "__lttf2" (I32, I32) -> (I32) Emulation;
    LeTf2 => "env" "__letf2" (I32, I32) -> (I32) Emulation;
    GtTf2 => "env" "__gttf2" (I32, I32) -> (I32) Emulation;
    GeTf2 => "env" "__getf2" (I32, I32) -> (I32) Emulation;
    UnordTf2 => "env" "__unordtf2" (I32, I32) -> (I32) Emulation;
    AddTf3 => "env" "__addtf3" (I32, I32) -> (I32) Emulation;
    SubTf3 => "env" "__subtf3" (I32, I32) -> (I32) Emulation;
    MulTf3 => "env" "__multf3" (I32, I32) -> (I32) Emulation;
    DivTf3 => "env" "__divtf3" (I32, I32) -> (I32) Emulation;
    FloatSiTf => "env" "__floatsitf" (I32) -> (I32) Emulation;
    FloatUnsiTf => "env" "__floatunsitf" (I32) -> (I32) Emulation;
    FloatDiTf => "env" "__floatditf" (I64) -> (I32) Emulation;
    FloatUndiTf => "env" "__floatunditf" (I64) -> (I32) Emulation;
    FixTfSi => "env" "__fixtfsi" (I32) -> (I32) Emulation;
    FixUnsTfSi => "env" "__fixunstfsi" (I32) -> (I32) Emulation;
    FixTfDi => "env" "__fixtfdi" (I32) -> (I64) Emulation;
    FixUnsTfDi => "env" "__fixunstfdi" (I32) -> (I64) Emulation;
    ExtendDfTf2 => "env" "__extenddftf2" (F64) -> (I32) Emulation;
    ExtendSfTf2 => "env" "__extendsftf2" (F32) -> (I32) Emulation;
    TruncTfDf2 => "env" "__trunctfdf2" (I32) -> (F64) Emulation;
    TruncTfSf2 => "env" "__trunctfsf2" (I32) -> (F32) Emulation;

    // Threads
    ThreadSpawn => "wasi" "thread-spawn" (I32) -> (I32) Threads;
}

impl fmt::Display for Import {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module(), self.name())
    }
}
