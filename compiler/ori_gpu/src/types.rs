//! Structural types and constants of the kernel IR.
//!
//! Types are plain structural values: two `Type`s describe the same type
//! exactly when they compare equal. Backends rely on this to deduplicate
//! declarations, so every type carries everything needed to declare it
//! (element types, lengths, address spaces) and nothing else.
//!
//! Integer types carry no signedness. Signed vs. unsigned behavior is a
//! property of the operation (see [`ArithmeticFlags`](crate::ArithmeticFlags)).

use std::fmt;

// ── Scalar widths ───────────────────────────────────────────────────

/// Width of an integer type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IntWidth {
    I8,
    I16,
    I32,
    I64,
}

impl IntWidth {
    /// Width in bits.
    #[inline]
    pub fn bits(self) -> u32 {
        match self {
            IntWidth::I8 => 8,
            IntWidth::I16 => 16,
            IntWidth::I32 => 32,
            IntWidth::I64 => 64,
        }
    }

    /// Mask selecting the bits that belong to a value of this width.
    #[inline]
    pub fn mask(self) -> u64 {
        match self {
            IntWidth::I64 => u64::MAX,
            w => (1u64 << w.bits()) - 1,
        }
    }
}

/// Width of a floating-point type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FloatWidth {
    F16,
    F32,
    F64,
}

impl FloatWidth {
    /// Width in bits.
    #[inline]
    pub fn bits(self) -> u32 {
        match self {
            FloatWidth::F16 => 16,
            FloatWidth::F32 => 32,
            FloatWidth::F64 => 64,
        }
    }
}

/// Memory region a pointer refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AddressSpace {
    /// Device-wide global memory (kernel buffers).
    Global,
    /// Memory shared by all work items of a group.
    Shared,
    /// Private per-work-item memory (stack allocations).
    Local,
    /// Address space resolved at runtime.
    Generic,
}

// ── Types ───────────────────────────────────────────────────────────

/// A structural IR type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    /// No value; only valid as a return type or for effect-only values.
    Void,
    Bool,
    Int(IntWidth),
    Float(FloatWidth),
    /// Fixed-size vector of scalars.
    Vector { elem: Box<Type>, count: u32 },
    /// Fixed-size array.
    Array { elem: Box<Type>, len: u32 },
    /// Structure with fields in declaration order.
    Struct { fields: Vec<Type> },
    /// Pointer into an address space.
    Pointer {
        pointee: Box<Type>,
        space: AddressSpace,
    },
}

/// Classification of a type for instruction selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarClass {
    Bool,
    Int(IntWidth),
    Float(FloatWidth),
    Pointer,
    /// Aggregates, `Void`, and vectors of non-scalars.
    Other,
}

impl Type {
    pub const I8: Type = Type::Int(IntWidth::I8);
    pub const I16: Type = Type::Int(IntWidth::I16);
    pub const I32: Type = Type::Int(IntWidth::I32);
    pub const I64: Type = Type::Int(IntWidth::I64);
    pub const F16: Type = Type::Float(FloatWidth::F16);
    pub const F32: Type = Type::Float(FloatWidth::F32);
    pub const F64: Type = Type::Float(FloatWidth::F64);

    /// Pointer to `pointee` in `space`.
    pub fn pointer(pointee: Type, space: AddressSpace) -> Type {
        Type::Pointer {
            pointee: Box::new(pointee),
            space,
        }
    }

    /// Vector of `count` elements.
    pub fn vector(elem: Type, count: u32) -> Type {
        Type::Vector {
            elem: Box::new(elem),
            count,
        }
    }

    /// Array of `len` elements.
    pub fn array(elem: Type, len: u32) -> Type {
        Type::Array {
            elem: Box::new(elem),
            len,
        }
    }

    /// True for `Type::Void`.
    #[inline]
    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    /// Scalar class of this type. Vectors classify by their element type.
    pub fn scalar_class(&self) -> ScalarClass {
        match self {
            Type::Bool => ScalarClass::Bool,
            Type::Int(w) => ScalarClass::Int(*w),
            Type::Float(w) => ScalarClass::Float(*w),
            Type::Pointer { .. } => ScalarClass::Pointer,
            Type::Vector { elem, .. } => match elem.scalar_class() {
                ScalarClass::Pointer => ScalarClass::Other,
                class => class,
            },
            Type::Void | Type::Array { .. } | Type::Struct { .. } => ScalarClass::Other,
        }
    }

    /// The pointee of a pointer type.
    pub fn pointee(&self) -> Option<&Type> {
        match self {
            Type::Pointer { pointee, .. } => Some(pointee.as_ref()),
            _ => None,
        }
    }

    /// The address space of a pointer type.
    pub fn address_space(&self) -> Option<AddressSpace> {
        match self {
            Type::Pointer { space, .. } => Some(*space),
            _ => None,
        }
    }

    /// Type of field/element `index` of an aggregate.
    pub fn field(&self, index: u32) -> Option<&Type> {
        match self {
            Type::Struct { fields } => fields.get(index as usize),
            Type::Array { elem, len } | Type::Vector { elem, count: len } if index < *len => {
                Some(elem.as_ref())
            }
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Bool => write!(f, "bool"),
            Type::Int(w) => write!(f, "i{}", w.bits()),
            Type::Float(w) => write!(f, "f{}", w.bits()),
            Type::Vector { elem, count } => write!(f, "<{count} x {elem}>"),
            Type::Array { elem, len } => write!(f, "[{elem}; {len}]"),
            Type::Struct { fields } => {
                write!(f, "{{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{field}")?;
                }
                write!(f, "}}")
            }
            Type::Pointer { pointee, space } => write!(f, "{pointee}* {space:?}"),
        }
    }
}

// ── Constants ───────────────────────────────────────────────────────

/// A structural constant.
///
/// Floats are stored as raw bit patterns so constants can be hashed and
/// compared structurally (`-0.0` and `0.0` are distinct constants).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Constant {
    Bool(bool),
    Int { width: IntWidth, bits: u64 },
    Float { width: FloatWidth, bits: u64 },
    /// Zero/null value of any type.
    Null(Type),
}

impl Constant {
    /// 32-bit integer constant.
    pub fn i32(value: i32) -> Self {
        Self::int(IntWidth::I32, i64::from(value))
    }

    /// 64-bit integer constant.
    pub fn i64(value: i64) -> Self {
        Self::int(IntWidth::I64, value)
    }

    /// 32-bit unsigned integer constant.
    pub fn u32(value: u32) -> Self {
        Constant::Int {
            width: IntWidth::I32,
            bits: u64::from(value),
        }
    }

    /// Integer constant truncated to `width`.
    #[allow(clippy::cast_sign_loss, reason = "two's complement bit pattern")]
    pub fn int(width: IntWidth, value: i64) -> Self {
        Constant::Int {
            width,
            bits: (value as u64) & width.mask(),
        }
    }

    /// 32-bit float constant.
    pub fn f32(value: f32) -> Self {
        Constant::Float {
            width: FloatWidth::F32,
            bits: u64::from(value.to_bits()),
        }
    }

    /// 64-bit float constant.
    pub fn f64(value: f64) -> Self {
        Constant::Float {
            width: FloatWidth::F64,
            bits: value.to_bits(),
        }
    }

    /// The type of this constant.
    pub fn ty(&self) -> Type {
        match self {
            Constant::Bool(_) => Type::Bool,
            Constant::Int { width, .. } => Type::Int(*width),
            Constant::Float { width, .. } => Type::Float(*width),
            Constant::Null(ty) => ty.clone(),
        }
    }
}
