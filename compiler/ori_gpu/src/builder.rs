//! Builder for in-progress kernel IR methods.
//!
//! Follows the "position at a block, emit values, terminate" pattern: the
//! frontend creates blocks up front (so branches can name blocks that are
//! filled later), positions the builder, and appends values. Value IDs are
//! allocated sequentially per method, parameters first.
//!
//! ```ignore
//! let mut b = MethodBuilder::new(MethodId::new(0), "add_one", Type::I32);
//! let x = b.param(Type::I32);
//! let one = b.constant(Constant::i32(1));
//! let sum = b.binary(BinaryOp::Add, x, one);
//! b.ret(Some(sum));
//! let method = b.finish();
//! ```

use crate::flags::{ArithmeticFlags, ConvertFlags};
use crate::ir::{
    AllocaLength, BinaryOp, Block, BlockId, Callee, CompareKind, GridBuiltin, MathIntrinsic, Method,
    MethodId, Param, Terminator, UnaryOp, Value, ValueId, ValueKind,
};
use crate::types::{AddressSpace, Constant, Type};

/// In-progress basic block.
struct BlockBuilder {
    id: BlockId,
    body: Vec<Value>,
    terminator: Option<Terminator>,
}

/// Builder for a [`Method`].
///
/// Consumed by [`finish`](MethodBuilder::finish). Blocks keep the order in
/// which they were created; an unterminated block is closed with
/// [`Terminator::Unreachable`].
pub struct MethodBuilder {
    id: MethodId,
    name: String,
    return_type: Type,
    params: Vec<Param>,
    blocks: Vec<BlockBuilder>,
    current: usize,
    value_types: Vec<Type>,
}

impl MethodBuilder {
    /// Create a builder with an entry block (`BlockId(0)`) already positioned.
    pub fn new(id: MethodId, name: impl Into<String>, return_type: Type) -> Self {
        Self {
            id,
            name: name.into(),
            return_type,
            params: Vec::new(),
            blocks: vec![BlockBuilder {
                id: BlockId::new(0),
                body: Vec::new(),
                terminator: None,
            }],
            current: 0,
            value_types: Vec::new(),
        }
    }

    // Blocks

    /// Allocate a new empty block and return its ID.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "block counts never exceed u32"
    )]
    pub fn new_block(&mut self) -> BlockId {
        let id = BlockId::new(self.blocks.len() as u32);
        self.blocks.push(BlockBuilder {
            id,
            body: Vec::new(),
            terminator: None,
        });
        id
    }

    /// Continue emitting into `block`.
    ///
    /// # Panics
    ///
    /// Panics if `block` was not created by this builder.
    pub fn position_at(&mut self, block: BlockId) {
        self.current = self
            .blocks
            .iter()
            .position(|b| b.id == block)
            .unwrap_or_else(|| panic!("block {} not created by this builder", block.raw()));
    }

    /// The block values are currently appended to.
    #[inline]
    pub fn current_block(&self) -> BlockId {
        self.blocks[self.current].id
    }

    /// True if the current block already has a terminator.
    #[inline]
    pub fn is_terminated(&self) -> bool {
        self.blocks[self.current].terminator.is_some()
    }

    // Values

    #[expect(
        clippy::cast_possible_truncation,
        reason = "value counts never exceed u32"
    )]
    fn fresh_value(&mut self, ty: Type) -> ValueId {
        let id = ValueId::new(self.value_types.len() as u32);
        self.value_types.push(ty);
        id
    }

    /// Type of a previously created value.
    ///
    /// # Panics
    ///
    /// Panics if `value` was not created by this builder.
    pub fn value_type(&self, value: ValueId) -> &Type {
        &self.value_types[value.index()]
    }

    /// Add a parameter.
    pub fn param(&mut self, ty: Type) -> ValueId {
        let value = self.fresh_value(ty.clone());
        self.params.push(Param { value, ty });
        value
    }

    /// Append a value of any kind to the current block.
    pub fn emit(&mut self, ty: Type, kind: ValueKind) -> ValueId {
        let id = self.fresh_value(ty.clone());
        self.blocks[self.current].body.push(Value { id, ty, kind });
        id
    }

    /// Constant value.
    pub fn constant(&mut self, constant: Constant) -> ValueId {
        self.emit(constant.ty(), ValueKind::Constant(constant))
    }

    /// Signed/float binary operation; the result has the type of `lhs`.
    pub fn binary(&mut self, op: BinaryOp, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.binary_with(op, lhs, rhs, ArithmeticFlags::empty())
    }

    /// Binary operation with explicit flags.
    pub fn binary_with(
        &mut self,
        op: BinaryOp,
        lhs: ValueId,
        rhs: ValueId,
        flags: ArithmeticFlags,
    ) -> ValueId {
        let ty = self.value_type(lhs).clone();
        self.emit(
            ty,
            ValueKind::Binary {
                op,
                lhs,
                rhs,
                flags,
            },
        )
    }

    /// Unary operation; the result has the operand's type.
    pub fn unary(&mut self, op: UnaryOp, value: ValueId) -> ValueId {
        let ty = self.value_type(value).clone();
        self.emit(ty, ValueKind::Unary { op, value })
    }

    /// Comparison producing a `bool`.
    pub fn compare(
        &mut self,
        kind: CompareKind,
        lhs: ValueId,
        rhs: ValueId,
        flags: ArithmeticFlags,
    ) -> ValueId {
        self.emit(
            Type::Bool,
            ValueKind::Compare {
                kind,
                lhs,
                rhs,
                flags,
            },
        )
    }

    /// Conversion to `ty`.
    pub fn convert(&mut self, value: ValueId, ty: Type, flags: ConvertFlags) -> ValueId {
        self.emit(ty, ValueKind::Convert { value, flags })
    }

    /// `cond ? then_value : else_value`.
    pub fn select(&mut self, cond: ValueId, then_value: ValueId, else_value: ValueId) -> ValueId {
        let ty = self.value_type(then_value).clone();
        self.emit(
            ty,
            ValueKind::Select {
                cond,
                then_value,
                else_value,
            },
        )
    }

    /// Allocation of `len` elements of `elem` in `space`.
    pub fn alloca(&mut self, elem: Type, len: AllocaLength, space: AddressSpace) -> ValueId {
        let ty = Type::pointer(elem.clone(), space);
        self.emit(ty, ValueKind::Alloca { elem, len })
    }

    /// Load through `ptr`.
    ///
    /// # Panics
    ///
    /// Panics if `ptr` is not a pointer.
    pub fn load(&mut self, ptr: ValueId) -> ValueId {
        let ty = self
            .value_type(ptr)
            .pointee()
            .cloned()
            .unwrap_or_else(|| panic!("load through non-pointer value {}", ptr.raw()));
        self.emit(ty, ValueKind::Load { ptr })
    }

    /// Store `value` through `ptr`.
    pub fn store(&mut self, ptr: ValueId, value: ValueId) {
        self.emit(Type::Void, ValueKind::Store { ptr, value });
    }

    /// Address of element `index` relative to `base`.
    pub fn element_address(&mut self, base: ValueId, index: ValueId) -> ValueId {
        let ty = self.value_type(base).clone();
        self.emit(ty, ValueKind::ElementAddress { base, index })
    }

    /// Address of field `field` of the aggregate behind `base`.
    ///
    /// # Panics
    ///
    /// Panics if `base` does not point to an aggregate with that field.
    pub fn field_address(&mut self, base: ValueId, field: u32) -> ValueId {
        let base_ty = self.value_type(base);
        let space = base_ty.address_space();
        let field_ty = base_ty.pointee().and_then(|pointee| pointee.field(field));
        let (Some(space), Some(field_ty)) = (space, field_ty) else {
            panic!("field {field} not addressable through value {}", base.raw());
        };
        let ty = Type::pointer(field_ty.clone(), space);
        self.emit(ty, ValueKind::FieldAddress { base, field })
    }

    /// Field `field` of an aggregate value.
    ///
    /// # Panics
    ///
    /// Panics if the aggregate has no such field.
    pub fn extract_field(&mut self, aggregate: ValueId, field: u32) -> ValueId {
        let ty = self
            .value_type(aggregate)
            .field(field)
            .cloned()
            .unwrap_or_else(|| panic!("no field {field} in value {}", aggregate.raw()));
        self.emit(ty, ValueKind::ExtractField { aggregate, field })
    }

    /// Call of another method returning `ty`.
    pub fn call(&mut self, method: MethodId, args: Vec<ValueId>, ty: Type) -> ValueId {
        self.emit(
            ty,
            ValueKind::Call {
                callee: Callee::Method(method),
                args,
                flags: ArithmeticFlags::empty(),
            },
        )
    }

    /// Call of a math intrinsic returning `ty`.
    pub fn intrinsic(
        &mut self,
        intrinsic: MathIntrinsic,
        args: Vec<ValueId>,
        ty: Type,
        flags: ArithmeticFlags,
    ) -> ValueId {
        self.emit(
            ty,
            ValueKind::Call {
                callee: Callee::Intrinsic(intrinsic),
                args,
                flags,
            },
        )
    }

    /// Phi node of type `ty`.
    pub fn phi(&mut self, ty: Type, incoming: Vec<(ValueId, BlockId)>) -> ValueId {
        self.emit(ty, ValueKind::Phi { incoming })
    }

    /// Work-item builtin of type `ty` along `dimension`.
    pub fn grid_index(&mut self, builtin: GridBuiltin, dimension: u8, ty: Type) -> ValueId {
        self.emit(ty, ValueKind::GridIndex { builtin, dimension })
    }

    /// Group-wide barrier.
    pub fn barrier(&mut self) {
        self.emit(Type::Void, ValueKind::Barrier);
    }

    // Terminators

    /// Terminate the current block.
    ///
    /// # Panics
    ///
    /// Debug-panics if the block is already terminated.
    pub fn terminate(&mut self, terminator: Terminator) {
        let block = &mut self.blocks[self.current];
        debug_assert!(
            block.terminator.is_none(),
            "block {} terminated twice",
            block.id.raw()
        );
        block.terminator = Some(terminator);
    }

    /// `return value`.
    pub fn ret(&mut self, value: Option<ValueId>) {
        self.terminate(Terminator::Return { value });
    }

    /// Unconditional branch.
    pub fn br(&mut self, target: BlockId) {
        self.terminate(Terminator::Branch { target });
    }

    /// Conditional branch.
    pub fn cond_br(&mut self, cond: ValueId, then_block: BlockId, else_block: BlockId) {
        self.terminate(Terminator::CondBranch {
            cond,
            then_block,
            else_block,
        });
    }

    /// Multi-way branch.
    pub fn switch(&mut self, value: ValueId, cases: Vec<(u64, BlockId)>, default: BlockId) {
        self.terminate(Terminator::Switch {
            value,
            cases,
            default,
        });
    }

    /// Finish the method.
    pub fn finish(self) -> Method {
        let blocks = self
            .blocks
            .into_iter()
            .map(|b| Block {
                id: b.id,
                body: b.body,
                terminator: b.terminator.unwrap_or(Terminator::Unreachable),
            })
            .collect();
        Method {
            id: self.id,
            name: self.name,
            params: self.params,
            return_type: self.return_type,
            blocks,
        }
    }
}
