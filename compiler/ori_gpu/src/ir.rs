//! Kernel IR: basic-block representation consumed by device backends.
//!
//! The frontend hands backends a fully optimized [`Program`]: a list of
//! [`Method`]s, each an ordered list of [`Block`]s. A block is a sequence of
//! typed [`Value`]s followed by exactly one [`Terminator`].
//!
//! - **[`Method`]**: signature plus blocks in stored order; `blocks[0]` is the entry
//! - **[`Block`]**: straight-line values and one terminator
//! - **[`Value`]**: a single typed instruction, named by a [`ValueId`]
//! - **[`Terminator`]**: block exit (return, branch, conditional branch, switch)
//!
//! Blocks reference each other only through [`BlockId`] edges, never by
//! nesting. Stored order is not required to be an execution order.

use crate::flags::{ArithmeticFlags, ConvertFlags};
use crate::types::{Constant, Type};

// ── ID newtypes ─────────────────────────────────────────────────────

/// Value ID within a [`Method`].
///
/// Parameters and instructions share one ID space per method.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ValueId(u32);

impl ValueId {
    /// Create a value ID from a raw index.
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw `u32` value.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Get the index as `usize`.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Basic block ID within a [`Method`].
///
/// IDs are names, not positions: a block's ID need not match its index in
/// [`Method::blocks`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct BlockId(u32);

impl BlockId {
    /// Create a block ID from a raw index.
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw `u32` value.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Get the index as `usize`.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Method ID within a [`Program`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct MethodId(u32);

impl MethodId {
    /// Create a method ID from a raw index.
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw `u32` value.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

// ── Operators ───────────────────────────────────────────────────────

/// Two-operand arithmetic, bitwise, and logical operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

/// One-operand operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// Comparison predicates. Signedness/ordering come from [`ArithmeticFlags`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompareKind {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Math library functions the frontend has already resolved to intrinsics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MathIntrinsic {
    Sin,
    Cos,
    Tan,
    Sqrt,
    Rsqrt,
    Exp,
    Exp2,
    Log,
    Log2,
    Pow,
    Floor,
    Ceil,
    Fma,
    Abs,
    Min,
    Max,
    IsNaN,
    IsInfinity,
    PopCount,
}

/// Work-item builtins of the launch grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GridBuiltin {
    /// Index of the work item within the whole grid.
    GlobalIndex,
    /// Index of the work item within its group.
    GroupIndex,
    /// Index of the group within the grid.
    GridIndex,
    /// Number of work items per group.
    GroupDimension,
    /// Number of groups in the grid.
    GridDimension,
}

/// Number of elements reserved by an [`ValueKind::Alloca`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AllocaLength {
    /// One element.
    Single,
    /// A fixed number of elements.
    Fixed(u32),
    /// Sized at launch time (shared memory only).
    Dynamic,
}

/// Call target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Callee {
    /// Another method of the same program.
    Method(MethodId),
    /// A math intrinsic, lowered to a device-native instruction.
    Intrinsic(MathIntrinsic),
}

// ── Values ──────────────────────────────────────────────────────────

/// The operation performed by a [`Value`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// A constant.
    Constant(Constant),
    /// An undefined value of the value's type.
    Undef,
    /// `lhs op rhs`.
    Binary {
        op: BinaryOp,
        lhs: ValueId,
        rhs: ValueId,
        flags: ArithmeticFlags,
    },
    /// `op value`.
    Unary { op: UnaryOp, value: ValueId },
    /// `lhs kind rhs`, producing a `bool`.
    Compare {
        kind: CompareKind,
        lhs: ValueId,
        rhs: ValueId,
        flags: ArithmeticFlags,
    },
    /// Conversion of `value` to the value's type.
    Convert { value: ValueId, flags: ConvertFlags },
    /// `cond ? then_value : else_value`.
    Select {
        cond: ValueId,
        then_value: ValueId,
        else_value: ValueId,
    },
    /// Stack or shared-memory allocation. The value's type is a pointer to
    /// `elem` in the allocation's address space.
    Alloca { elem: Type, len: AllocaLength },
    /// Load through a pointer.
    Load { ptr: ValueId },
    /// Store through a pointer. Produces no value (`Void`).
    Store { ptr: ValueId, value: ValueId },
    /// Address of element `index` relative to `base`.
    ElementAddress { base: ValueId, index: ValueId },
    /// Address of field `field` of the aggregate `base` points to.
    FieldAddress { base: ValueId, field: u32 },
    /// Field `field` of an aggregate value.
    ExtractField { aggregate: ValueId, field: u32 },
    /// Call of a method or intrinsic.
    Call {
        callee: Callee,
        args: Vec<ValueId>,
        flags: ArithmeticFlags,
    },
    /// SSA merge of values flowing in from predecessor blocks.
    Phi { incoming: Vec<(ValueId, BlockId)> },
    /// Work-item builtin along one grid dimension (0 = x, 1 = y, 2 = z).
    GridIndex { builtin: GridBuiltin, dimension: u8 },
    /// Group-wide execution and memory barrier. Produces no value.
    Barrier,
    /// Target-specific inline assembly.
    InlineAsm { template: String, args: Vec<ValueId> },
}

impl ValueKind {
    /// Short name of this kind, for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::Constant(_) => "constant",
            ValueKind::Undef => "undef",
            ValueKind::Binary { .. } => "binary",
            ValueKind::Unary { .. } => "unary",
            ValueKind::Compare { .. } => "compare",
            ValueKind::Convert { .. } => "convert",
            ValueKind::Select { .. } => "select",
            ValueKind::Alloca { .. } => "alloca",
            ValueKind::Load { .. } => "load",
            ValueKind::Store { .. } => "store",
            ValueKind::ElementAddress { .. } => "element address",
            ValueKind::FieldAddress { .. } => "field address",
            ValueKind::ExtractField { .. } => "extract field",
            ValueKind::Call { .. } => "call",
            ValueKind::Phi { .. } => "phi",
            ValueKind::GridIndex { .. } => "grid index",
            ValueKind::Barrier => "barrier",
            ValueKind::InlineAsm { .. } => "inline assembly",
        }
    }
}

/// A typed instruction.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Value {
    pub id: ValueId,
    /// Result type; `Void` for effect-only values.
    pub ty: Type,
    pub kind: ValueKind,
}

// ── Terminators ─────────────────────────────────────────────────────

/// Block terminator: how control leaves a basic block.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Terminator {
    /// Return from the method, with a value unless the method returns `Void`.
    Return { value: Option<ValueId> },
    /// Unconditional branch.
    Branch { target: BlockId },
    /// Two-way branch on a `bool`.
    CondBranch {
        cond: ValueId,
        then_block: BlockId,
        else_block: BlockId,
    },
    /// Multi-way branch on an integer selector.
    Switch {
        value: ValueId,
        cases: Vec<(u64, BlockId)>,
        default: BlockId,
    },
    /// Control never reaches the end of this block.
    Unreachable,
}

impl Terminator {
    /// Successor blocks in operand order.
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Return { .. } | Terminator::Unreachable => vec![],
            Terminator::Branch { target } => vec![*target],
            Terminator::CondBranch {
                then_block,
                else_block,
                ..
            } => vec![*then_block, *else_block],
            Terminator::Switch { cases, default, .. } => {
                let mut succs = Vec::with_capacity(cases.len() + 1);
                succs.push(*default);
                succs.extend(cases.iter().map(|&(_, block)| block));
                succs
            }
        }
    }
}

// ── Blocks, methods, programs ───────────────────────────────────────

/// A basic block.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Block {
    pub id: BlockId,
    /// Values in execution order.
    pub body: Vec<Value>,
    pub terminator: Terminator,
}

/// A method parameter.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Param {
    pub value: ValueId,
    pub ty: Type,
}

/// A method: signature plus blocks in stored order.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Method {
    pub id: MethodId,
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Type,
    /// Blocks in stored order. `blocks[0]` is the entry block.
    pub blocks: Vec<Block>,
}

impl Method {
    /// The entry block, if the method has a body.
    pub fn entry(&self) -> Option<&Block> {
        self.blocks.first()
    }

    /// Look up a block by ID.
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.iter().find(|block| block.id == id)
    }

    /// All values of all blocks, in stored order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.blocks.iter().flat_map(|block| block.body.iter())
    }

    /// Number of values across all blocks.
    pub fn value_count(&self) -> usize {
        self.blocks.iter().map(|block| block.body.len()).sum()
    }
}

/// A program: every method a backend must generate.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Program {
    pub methods: Vec<Method>,
}

impl Program {
    /// Create a program from methods in generation order.
    pub fn new(methods: Vec<Method>) -> Self {
        Self { methods }
    }

    /// Look up a method by ID.
    pub fn method(&self, id: MethodId) -> Option<&Method> {
        self.methods.iter().find(|method| method.id == id)
    }
}
