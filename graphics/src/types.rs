//! Host object references and validated closed enumerations.

use bitflags::bitflags;

use crate::consts;

macro_rules! host_object {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub u64);

        impl $name {
            /// Raw host identifier.
            pub fn raw(self) -> u64 {
                self.0
            }
        }
    };
}

host_object!(
    /// Opaque reference to a host buffer object.
    BufferObject
);
host_object!(
    /// Opaque reference to a host shader object.
    ShaderObject
);
host_object!(
    /// Opaque reference to a host program object.
    ProgramObject
);
host_object!(
    /// Opaque reference to a host vertex array object.
    VertexArrayObject
);
host_object!(
    /// Opaque reference to a uniform location inside a linked program.
    UniformLocation
);

bitflags! {
    /// Buffers cleared by `clear`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClearMask: u32 {
        const DEPTH = consts::DEPTH_BUFFER_BIT;
        const STENCIL = consts::STENCIL_BUFFER_BIT;
        const COLOR = consts::COLOR_BUFFER_BIT;
    }
}

impl ClearMask {
    /// Accepts only masks made of the three buffer bits.
    pub fn from_raw(mask: u32) -> Option<Self> {
        Self::from_bits(mask)
    }
}

/// Component type accepted by `vertex_attrib_pointer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttribType {
    Byte,
    UnsignedByte,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    Float,
    HalfFloat,
    Int2101010Rev,
    UnsignedInt2101010Rev,
}

impl AttribType {
    /// GL enumeration value.
    pub fn raw(self) -> u32 {
        match self {
            AttribType::Byte => consts::BYTE,
            AttribType::UnsignedByte => consts::UNSIGNED_BYTE,
            AttribType::Short => consts::SHORT,
            AttribType::UnsignedShort => consts::UNSIGNED_SHORT,
            AttribType::Int => consts::INT,
            AttribType::UnsignedInt => consts::UNSIGNED_INT,
            AttribType::Float => consts::FLOAT,
            AttribType::HalfFloat => consts::HALF_FLOAT,
            AttribType::Int2101010Rev => consts::INT_2_10_10_10_REV,
            AttribType::UnsignedInt2101010Rev => consts::UNSIGNED_INT_2_10_10_10_REV,
        }
    }
}

impl TryFrom<u32> for AttribType {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Ok(match value {
            consts::BYTE => AttribType::Byte,
            consts::UNSIGNED_BYTE => AttribType::UnsignedByte,
            consts::SHORT => AttribType::Short,
            consts::UNSIGNED_SHORT => AttribType::UnsignedShort,
            consts::INT => AttribType::Int,
            consts::UNSIGNED_INT => AttribType::UnsignedInt,
            consts::FLOAT => AttribType::Float,
            consts::HALF_FLOAT => AttribType::HalfFloat,
            consts::INT_2_10_10_10_REV => AttribType::Int2101010Rev,
            consts::UNSIGNED_INT_2_10_10_10_REV => AttribType::UnsignedInt2101010Rev,
            other => return Err(other),
        })
    }
}

/// Result of a shader precision query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderPrecisionFormat {
    pub range_min: i32,
    pub range_max: i32,
    pub precision: i32,
}
