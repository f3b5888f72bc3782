//! Module-wide type, constant, and global-variable declarations.
//!
//! SPIR-V forbids declaring the same type twice, so every declaration goes
//! through one [`TypeGenerator`] per module. Requests are keyed by
//! structure: asking for an equal [`Type`] or [`Constant`] any number of
//! times emits one declaration and returns one ID. Dependencies (element
//! types, array length constants, pointees) are declared before the
//! declaration that uses them.
//!
//! Declarations are emitted into the generator's own [`SpirvBuilder`]
//! (debug, annotation, and declaration sections), which the backend folds
//! into the module when it finishes.

use std::sync::Arc;

use ori_gpu::{AddressSpace, AllocaLength, Constant, FloatWidth, IntWidth, Type};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::builder::{Section, SpirvBuilder};
use crate::error::{CodegenError, CodegenResult};
use crate::id::{IdCounter, SpirvId};
use crate::spirv::{BuiltIn, Capabilities, Decoration, Op, StorageClass};

/// Cache key of a declaration.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum Declaration {
    Type(Type),
    Pointer { pointee: Type, storage: StorageClass },
    Constant(Constant),
    Signature { ret: Type, params: Vec<Type> },
    Builtin(BuiltIn),
}

/// Storage class of pointers into an IR address space.
pub fn storage_class(space: AddressSpace) -> StorageClass {
    match space {
        AddressSpace::Global => StorageClass::CrossWorkgroup,
        AddressSpace::Shared => StorageClass::Workgroup,
        AddressSpace::Local => StorageClass::Function,
        AddressSpace::Generic => StorageClass::Generic,
    }
}

/// Deduplicating declaration generator.
#[derive(Debug)]
pub struct TypeGenerator {
    ids: Arc<IdCounter>,
    cache: FxHashMap<Declaration, SpirvId>,
    builder: SpirvBuilder,
    capabilities: Capabilities,
    /// Builtin variables, in first-use order.
    interface: Vec<SpirvId>,
    /// `SpecId`s of dynamic shared-memory sizes, in declaration order.
    specialization_ids: Vec<u32>,
}

impl TypeGenerator {
    /// A generator allocating IDs from `ids`.
    pub fn new(ids: Arc<IdCounter>) -> Self {
        Self {
            ids,
            cache: FxHashMap::default(),
            builder: SpirvBuilder::new(),
            capabilities: Capabilities::BASE,
            interface: Vec::new(),
            specialization_ids: Vec::new(),
        }
    }

    /// Emitted declarations.
    pub fn builder(&self) -> &SpirvBuilder {
        &self.builder
    }

    /// Capabilities required by the declarations so far.
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Builtin variables to list on the entry point.
    pub fn interface(&self) -> &[SpirvId] {
        &self.interface
    }

    /// Specialization constant IDs sizing dynamic shared memory.
    pub fn specialization_ids(&self) -> &[u32] {
        &self.specialization_ids
    }

    /// Number of distinct declarations made.
    pub fn declaration_count(&self) -> usize {
        self.cache.len()
    }

    fn cached(&self, key: &Declaration) -> Option<SpirvId> {
        self.cache.get(key).copied()
    }

    /// Emit a declaration and cache its ID under `key`. `result_type`
    /// precedes the result ID for constants and variables.
    fn declare(
        &mut self,
        key: Declaration,
        op: Op,
        result_type: Option<SpirvId>,
        operands: &[u32],
    ) -> CodegenResult<SpirvId> {
        let id = self.ids.next_id()?;
        let mut words: SmallVec<[u32; 8]> = SmallVec::with_capacity(operands.len() + 2);
        words.extend(result_type.map(SpirvId::raw));
        words.push(id.raw());
        words.extend_from_slice(operands);
        self.builder.emit(Section::Declarations, op, &words);
        self.cache.insert(key, id);
        Ok(id)
    }

    // ── Types ───────────────────────────────────────────────────────

    /// ID of the declaration of `ty`.
    pub fn type_id(&mut self, ty: &Type) -> CodegenResult<SpirvId> {
        let key = Declaration::Type(ty.clone());
        if let Some(id) = self.cached(&key) {
            return Ok(id);
        }
        let (op, operands): (Op, SmallVec<[u32; 8]>) = match ty {
            Type::Void => (Op::TypeVoid, SmallVec::new()),
            Type::Bool => (Op::TypeBool, SmallVec::new()),
            Type::Int(width) => {
                self.capabilities |= match width {
                    IntWidth::I8 => Capabilities::INT8,
                    IntWidth::I16 => Capabilities::INT16,
                    IntWidth::I32 => Capabilities::empty(),
                    IntWidth::I64 => Capabilities::INT64,
                };
                // Kernel integers are signless.
                (Op::TypeInt, SmallVec::from_slice(&[width.bits(), 0]))
            }
            Type::Float(width) => {
                self.capabilities |= match width {
                    FloatWidth::F16 => Capabilities::FLOAT16,
                    FloatWidth::F32 => Capabilities::empty(),
                    FloatWidth::F64 => Capabilities::FLOAT64,
                };
                (Op::TypeFloat, SmallVec::from_slice(&[width.bits()]))
            }
            Type::Vector { elem, count } => {
                let elem = self.type_id(elem)?;
                (Op::TypeVector, SmallVec::from_slice(&[elem.raw(), *count]))
            }
            Type::Array { elem, len } => {
                let elem = self.type_id(elem)?;
                let len = self.u32_constant(*len)?;
                (Op::TypeArray, SmallVec::from_slice(&[elem.raw(), len.raw()]))
            }
            Type::Struct { fields } => {
                let fields = fields
                    .iter()
                    .map(|field| self.type_id(field).map(SpirvId::raw))
                    .collect::<CodegenResult<_>>()?;
                (Op::TypeStruct, fields)
            }
            Type::Pointer { pointee, space } => {
                return self.pointer_id(pointee, storage_class(*space));
            }
        };
        self.declare(key, op, None, &operands)
    }

    /// ID of a pointer to `pointee` in `storage`.
    pub fn pointer_id(&mut self, pointee: &Type, storage: StorageClass) -> CodegenResult<SpirvId> {
        let key = Declaration::Pointer {
            pointee: pointee.clone(),
            storage,
        };
        if let Some(id) = self.cached(&key) {
            return Ok(id);
        }
        if storage == StorageClass::Generic {
            self.capabilities |= Capabilities::GENERIC_POINTER;
        }
        let pointee = self.type_id(pointee)?;
        self.declare(key, Op::TypePointer, None, &[storage as u32, pointee.raw()])
    }

    /// ID of an `OpTypeFunction` signature.
    pub fn function_type_id(&mut self, ret: &Type, params: &[Type]) -> CodegenResult<SpirvId> {
        let key = Declaration::Signature {
            ret: ret.clone(),
            params: params.to_vec(),
        };
        if let Some(id) = self.cached(&key) {
            return Ok(id);
        }
        let mut operands: SmallVec<[u32; 8]> = SmallVec::with_capacity(params.len() + 1);
        operands.push(self.type_id(ret)?.raw());
        for param in params {
            operands.push(self.type_id(param)?.raw());
        }
        self.declare(key, Op::TypeFunction, None, &operands)
    }

    // ── Constants ───────────────────────────────────────────────────

    /// ID of the declaration of `constant`.
    ///
    /// Literal bits above the constant's width are ignored, so constants
    /// differing only there share one declaration.
    pub fn constant_id(&mut self, constant: &Constant) -> CodegenResult<SpirvId> {
        let constant = &truncated(constant);
        let key = Declaration::Constant(constant.clone());
        if let Some(id) = self.cached(&key) {
            return Ok(id);
        }
        let ty = Some(self.type_id(&constant.ty())?);
        match constant {
            Constant::Bool(true) => self.declare(key, Op::ConstantTrue, ty, &[]),
            Constant::Bool(false) => self.declare(key, Op::ConstantFalse, ty, &[]),
            Constant::Int { width, bits } => {
                self.declare(key, Op::Constant, ty, &literal_words(*bits, width.bits()))
            }
            Constant::Float { width, bits } => {
                self.declare(key, Op::Constant, ty, &literal_words(*bits, width.bits()))
            }
            Constant::Null(_) => self.declare(key, Op::ConstantNull, ty, &[]),
        }
    }

    /// ID of a 32-bit integer constant.
    pub fn u32_constant(&mut self, value: u32) -> CodegenResult<SpirvId> {
        self.constant_id(&Constant::u32(value))
    }

    // ── Global variables ────────────────────────────────────────────

    /// ID of the `Input` variable holding `builtin` (a `vec3<u64>`).
    ///
    /// The first request declares and decorates the variable and records
    /// it as an entry-point interface variable.
    pub fn builtin_variable(&mut self, builtin: BuiltIn) -> CodegenResult<SpirvId> {
        let key = Declaration::Builtin(builtin);
        if let Some(id) = self.cached(&key) {
            return Ok(id);
        }
        let ptr = self.pointer_id(&builtin_type(), StorageClass::Input)?;
        let id = self.declare(key, Op::Variable, Some(ptr), &[StorageClass::Input as u32])?;
        self.builder.emit(
            Section::Annotations,
            Op::Decorate,
            &[id.raw(), Decoration::BuiltIn as u32, builtin as u32],
        );
        self.interface.push(id);
        Ok(id)
    }

    /// A new `Workgroup` variable for one shared allocation.
    ///
    /// Never deduplicated: every allocation gets its own storage. Arrayed
    /// allocations declare an array of `elem`; dynamic ones take their
    /// length from a fresh specialization constant (default 1).
    pub fn workgroup_variable(&mut self, elem: &Type, len: AllocaLength) -> CodegenResult<SpirvId> {
        let storage = match len {
            AllocaLength::Single => self.pointer_id(elem, StorageClass::Workgroup)?,
            AllocaLength::Fixed(n) => {
                self.pointer_id(&Type::array(elem.clone(), n), StorageClass::Workgroup)?
            }
            AllocaLength::Dynamic => self.dynamic_array_pointer(elem)?,
        };
        let id = self.ids.next_id()?;
        self.builder.emit(
            Section::Declarations,
            Op::Variable,
            &[storage.raw(), id.raw(), StorageClass::Workgroup as u32],
        );
        Ok(id)
    }

    /// Pointer to a `Workgroup` array whose length is a specialization
    /// constant. Uncached: the length differs per allocation.
    fn dynamic_array_pointer(&mut self, elem: &Type) -> CodegenResult<SpirvId> {
        let u32_ty = self.type_id(&Type::I32)?;
        let elem_ty = self.type_id(elem)?;
        let spec_id = u32::try_from(self.specialization_ids.len())
            .map_err(|_| CodegenError::IdSpaceExhausted)?;

        let len = self.ids.next_id()?;
        self.builder.emit(
            Section::Declarations,
            Op::SpecConstant,
            &[u32_ty.raw(), len.raw(), 1],
        );
        self.builder.emit(
            Section::Annotations,
            Op::Decorate,
            &[len.raw(), Decoration::SpecId as u32, spec_id],
        );
        self.specialization_ids.push(spec_id);

        let array = self.ids.next_id()?;
        self.builder.emit(
            Section::Declarations,
            Op::TypeArray,
            &[array.raw(), elem_ty.raw(), len.raw()],
        );
        let ptr = self.ids.next_id()?;
        self.builder.emit(
            Section::Declarations,
            Op::TypePointer,
            &[ptr.raw(), StorageClass::Workgroup as u32, array.raw()],
        );
        Ok(ptr)
    }
}

/// Type of the builtin variables.
pub fn builtin_type() -> Type {
    Type::vector(Type::I64, 3)
}

/// `constant` with its literal bits cut to its width.
fn truncated(constant: &Constant) -> Constant {
    match *constant {
        Constant::Int { width, bits } => Constant::Int {
            width,
            bits: bits & low_bits(width.bits()),
        },
        Constant::Float { width, bits } => Constant::Float {
            width,
            bits: bits & low_bits(width.bits()),
        },
        ref other => other.clone(),
    }
}

fn low_bits(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// Low-order-first literal words of a `width`-bit number.
#[expect(
    clippy::cast_possible_truncation,
    reason = "splitting a 64-bit literal into words"
)]
fn literal_words(bits: u64, width: u32) -> SmallVec<[u32; 2]> {
    if width > 32 {
        SmallVec::from_slice(&[bits as u32, (bits >> 32) as u32])
    } else {
        SmallVec::from_slice(&[bits as u32])
    }
}

#[cfg(test)]
mod tests;
