//! SPIR-V binary constants: opcodes, enumerants, and operand bitmasks.
//!
//! Only the subset emitted by this backend (Kernel/OpenCL flavour) is
//! listed. Numeric values follow the SPIR-V unified specification.

use bitflags::bitflags;

/// First word of every SPIR-V module.
pub const MAGIC: u32 = 0x0723_0203;

/// Exclusive upper limit for result IDs.
pub const MAX_ID_BOUND: u32 = 0x3F_FFFF;

/// Number of words in the module header.
pub const HEADER_WORDS: usize = 5;

/// Name of the OpenCL extended instruction set.
pub const OPENCL_STD: &str = "OpenCL.std";

// ── Opcodes ─────────────────────────────────────────────────────────

macro_rules! opcodes {
    ($($name:ident = $value:literal,)*) => {
        /// SPIR-V opcode.
        ///
        /// `Debug` prints the name without the `Op` prefix; [`Op::name`]
        /// returns the full mnemonic.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u16)]
        pub enum Op {
            $($name = $value,)*
        }

        impl Op {
            /// Decode an opcode word's low half.
            pub fn from_u16(raw: u16) -> Option<Op> {
                match raw {
                    $($value => Some(Op::$name),)*
                    _ => None,
                }
            }

            /// Mnemonic as written in disassembly, e.g. `OpLabel`.
            pub fn name(self) -> &'static str {
                match self {
                    $(Op::$name => concat!("Op", stringify!($name)),)*
                }
            }
        }
    };
}

opcodes! {
    Undef = 1,
    Name = 5,
    ExtInstImport = 11,
    ExtInst = 12,
    MemoryModel = 14,
    EntryPoint = 15,
    ExecutionMode = 16,
    Capability = 17,
    TypeVoid = 19,
    TypeBool = 20,
    TypeInt = 21,
    TypeFloat = 22,
    TypeVector = 23,
    TypeArray = 28,
    TypeStruct = 30,
    TypePointer = 32,
    TypeFunction = 33,
    ConstantTrue = 41,
    ConstantFalse = 42,
    Constant = 43,
    ConstantNull = 46,
    SpecConstant = 50,
    Function = 54,
    FunctionParameter = 55,
    FunctionEnd = 56,
    FunctionCall = 57,
    Variable = 59,
    Load = 61,
    Store = 62,
    InBoundsAccessChain = 66,
    InBoundsPtrAccessChain = 70,
    Decorate = 71,
    CompositeExtract = 81,
    CopyObject = 83,
    ConvertFToU = 109,
    ConvertFToS = 110,
    ConvertSToF = 111,
    ConvertUToF = 112,
    UConvert = 113,
    SConvert = 114,
    FConvert = 115,
    ConvertPtrToU = 117,
    ConvertUToPtr = 120,
    PtrCastToGeneric = 121,
    GenericCastToPtr = 122,
    Bitcast = 124,
    SNegate = 126,
    FNegate = 127,
    IAdd = 128,
    FAdd = 129,
    ISub = 130,
    FSub = 131,
    IMul = 132,
    FMul = 133,
    UDiv = 134,
    SDiv = 135,
    FDiv = 136,
    UMod = 137,
    SRem = 138,
    FRem = 140,
    IsNan = 156,
    IsInf = 157,
    LogicalEqual = 164,
    LogicalNotEqual = 165,
    LogicalOr = 166,
    LogicalAnd = 167,
    LogicalNot = 168,
    Select = 169,
    IEqual = 170,
    INotEqual = 171,
    UGreaterThan = 172,
    SGreaterThan = 173,
    UGreaterThanEqual = 174,
    SGreaterThanEqual = 175,
    ULessThan = 176,
    SLessThan = 177,
    ULessThanEqual = 178,
    SLessThanEqual = 179,
    FOrdEqual = 180,
    FUnordEqual = 181,
    FOrdNotEqual = 182,
    FUnordNotEqual = 183,
    FOrdLessThan = 184,
    FUnordLessThan = 185,
    FOrdGreaterThan = 186,
    FUnordGreaterThan = 187,
    FOrdLessThanEqual = 188,
    FUnordLessThanEqual = 189,
    FOrdGreaterThanEqual = 190,
    FUnordGreaterThanEqual = 191,
    ShiftRightLogical = 194,
    ShiftRightArithmetic = 195,
    ShiftLeftLogical = 196,
    BitwiseOr = 197,
    BitwiseXor = 198,
    BitwiseAnd = 199,
    Not = 200,
    BitCount = 205,
    ControlBarrier = 224,
    Phi = 245,
    Label = 248,
    Branch = 249,
    BranchConditional = 250,
    Switch = 251,
    Return = 253,
    ReturnValue = 254,
    Unreachable = 255,
}

impl Op {
    /// Index of the first string operand, for instructions that carry one.
    pub fn string_operand(self) -> Option<usize> {
        match self {
            Op::ExtInstImport | Op::Name => Some(1),
            Op::EntryPoint => Some(2),
            _ => None,
        }
    }
}

// ── Enumerants ──────────────────────────────────────────────────────

/// Capability operand of `OpCapability`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Capability {
    Addresses = 4,
    Kernel = 6,
    Float16 = 9,
    Float64 = 10,
    Int64 = 11,
    Int16 = 22,
    GenericPointer = 38,
    Int8 = 39,
}

/// Storage class of a pointer or variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum StorageClass {
    UniformConstant = 0,
    Input = 1,
    Workgroup = 4,
    CrossWorkgroup = 5,
    Function = 7,
    Generic = 8,
}

/// Decoration operand of `OpDecorate`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Decoration {
    SpecId = 1,
    BuiltIn = 11,
}

/// Built-in variables of the Kernel execution model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum BuiltIn {
    NumWorkgroups = 24,
    WorkgroupSize = 25,
    WorkgroupId = 26,
    LocalInvocationId = 27,
    GlobalInvocationId = 28,
}

pub const ADDRESSING_PHYSICAL64: u32 = 2;
pub const MEMORY_MODEL_OPENCL: u32 = 2;
pub const EXECUTION_MODEL_KERNEL: u32 = 6;
pub const EXECUTION_MODE_LOCAL_SIZE: u32 = 17;
pub const SCOPE_WORKGROUP: u32 = 2;

// ── Bitmasks ────────────────────────────────────────────────────────

bitflags! {
    /// Capabilities a module declares.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Capabilities: u16 {
        const ADDRESSES = 1 << 0;
        const KERNEL = 1 << 1;
        const FLOAT16 = 1 << 2;
        const FLOAT64 = 1 << 3;
        const INT64 = 1 << 4;
        const INT16 = 1 << 5;
        const GENERIC_POINTER = 1 << 6;
        const INT8 = 1 << 7;
    }
}

impl Capabilities {
    /// The capabilities every kernel module requires.
    pub const BASE: Capabilities = Capabilities::ADDRESSES.union(Capabilities::KERNEL);

    /// Capabilities as `OpCapability` operands, in ascending numeric order.
    pub fn operands(self) -> Vec<Capability> {
        const TABLE: [(Capabilities, Capability); 8] = [
            (Capabilities::ADDRESSES, Capability::Addresses),
            (Capabilities::KERNEL, Capability::Kernel),
            (Capabilities::FLOAT16, Capability::Float16),
            (Capabilities::FLOAT64, Capability::Float64),
            (Capabilities::INT64, Capability::Int64),
            (Capabilities::INT16, Capability::Int16),
            (Capabilities::GENERIC_POINTER, Capability::GenericPointer),
            (Capabilities::INT8, Capability::Int8),
        ];
        let mut caps: Vec<Capability> = TABLE
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|&(_, cap)| cap)
            .collect();
        caps.sort_by_key(|&cap| cap as u32);
        caps
    }
}

bitflags! {
    /// Memory semantics operand of barriers.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct MemorySemantics: u32 {
        const SEQUENTIALLY_CONSISTENT = 0x10;
        const WORKGROUP_MEMORY = 0x100;
        const CROSS_WORKGROUP_MEMORY = 0x200;
    }
}

bitflags! {
    /// Function control mask of `OpFunction`.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct FunctionControl: u32 {
        const INLINE = 0x1;
        const DONT_INLINE = 0x2;
        const PURE = 0x4;
        const CONST = 0x8;
    }
}
