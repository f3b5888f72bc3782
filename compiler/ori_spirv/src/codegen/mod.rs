//! Kernel IR → SPIR-V function generation.
//!
//! One generator is constructed per method. It reserves an ID range,
//! emits the function header, then the body in two passes over the
//! method's blocks:
//!
//! 1. **Pre-allocation**: every block gets its label ID, so branches can
//!    name blocks that are emitted later.
//! 2. **Emission**: for each block in stored order, `OpLabel`, the block's
//!    values, then its terminator. The entry block starts with the
//!    method's private `OpVariable`s.
//!
//! Blocks are emitted in the order the method stores them; the generator
//! does not recompute a control-flow order.
//!
//! # Architecture
//!
//! ```text
//! BackendCodeGenerator (trait)
//!   ├── FunctionGenerator ──┐
//!   └── KernelGenerator  ───┴── GeneralCodeGenerator (traversal, lowering)
//! ```
//!
//! Lowering of values lives in `values.rs`, terminators in
//! `terminators.rs`.

mod function;
mod terminators;
mod values;

use std::fmt;

use ori_gpu::{AddressSpace, AllocaLength, Allocas, Constant, Method, Type, ValueId, ValueKind};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::builder::{Section, SpirvBuilder};
use crate::error::{CodegenError, CodegenResult};
use crate::id::{id_budget, IdAllocator, SpirvId};
use crate::resources::ModuleResources;
use crate::spirv::{FunctionControl, Op, StorageClass};
use crate::types::TypeGenerator;

pub use function::{FunctionGenerator, KernelGenerator};

// ---------------------------------------------------------------------------
// Generator interface
// ---------------------------------------------------------------------------

/// Lifecycle of one generator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GeneratorState {
    Constructed,
    HeaderEmitted,
    BodyEmitted,
    Merged,
}

impl fmt::Display for GeneratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GeneratorState::Constructed => "constructed",
            GeneratorState::HeaderEmitted => "after header",
            GeneratorState::BodyEmitted => "after body",
            GeneratorState::Merged => "merged",
        })
    }
}

/// A per-method SPIR-V generator.
///
/// Calls must follow `generate_header` → `generate_code` →
/// `generate_constants` (optional) → `merge`; anything else fails with
/// [`CodegenError::OutOfOrder`].
pub trait BackendCodeGenerator {
    /// Emit the function header into the generator's local builder.
    /// Nothing is written to `module` before [`merge`](Self::merge).
    fn generate_header(&mut self, module: &mut SpirvBuilder) -> CodegenResult<()>;

    /// Emit the function body into the generator's local builder.
    fn generate_code(&mut self) -> CodegenResult<()>;

    /// Emit function-local constants. All constants of this backend are
    /// module-level, so the default does nothing.
    fn generate_constants(&mut self, _module: &mut SpirvBuilder) -> CodegenResult<()> {
        Ok(())
    }

    /// Append everything generated so far to `module`. Exactly once, and
    /// the only way generated instructions reach the module.
    fn merge(&mut self, module: &mut SpirvBuilder) -> CodegenResult<()>;

    /// Current lifecycle state.
    fn state(&self) -> GeneratorState;
}

// ---------------------------------------------------------------------------
// GeneralCodeGenerator
// ---------------------------------------------------------------------------

/// `OpPhi` operand whose incoming value had no ID yet when the phi was
/// emitted.
#[derive(Clone, Copy, Debug)]
struct PhiFixup {
    /// Word offset in the local function section.
    word: usize,
    value: ValueId,
}

/// Traversal and lowering shared by every generator kind.
pub struct GeneralCodeGenerator<'a> {
    method: &'a Method,
    allocas: &'a Allocas,
    resources: &'a ModuleResources,
    ids: IdAllocator,
    /// Local builder: debug names, execution modes, and the function.
    builder: SpirvBuilder,
    state: GeneratorState,
    function_id: SpirvId,
    value_types: FxHashMap<ValueId, &'a Type>,
    phi_fixups: Vec<PhiFixup>,
}

impl<'a> GeneralCodeGenerator<'a> {
    /// Create a generator for `method`, reserving its ID range.
    pub fn new(
        method: &'a Method,
        allocas: &'a Allocas,
        resources: &'a ModuleResources,
    ) -> CodegenResult<Self> {
        let function_id = resources.functions().get(method.id)?;
        let range = resources.ids().reserve(id_budget(method))?;
        let mut value_types = FxHashMap::default();
        for param in &method.params {
            value_types.insert(param.value, &param.ty);
        }
        for value in method.values() {
            value_types.insert(value.id, &value.ty);
        }
        Ok(Self {
            method,
            allocas,
            resources,
            ids: IdAllocator::new(range),
            builder: SpirvBuilder::new(),
            state: GeneratorState::Constructed,
            function_id,
            value_types,
            phi_fixups: Vec::new(),
        })
    }

    /// The method being generated.
    pub fn method(&self) -> &'a Method {
        self.method
    }

    /// The pre-assigned function ID.
    pub fn function_id(&self) -> SpirvId {
        self.function_id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> GeneratorState {
        self.state
    }

    /// The local builder.
    pub fn builder(&self) -> &SpirvBuilder {
        &self.builder
    }

    pub(crate) fn expect_state(
        &self,
        operation: &'static str,
        expected: GeneratorState,
    ) -> CodegenResult<()> {
        if self.state == expected {
            return Ok(());
        }
        tracing::error!(
            method = %self.method.name,
            operation,
            state = %self.state,
            "generator operation out of order"
        );
        Err(CodegenError::OutOfOrder {
            operation,
            state: self.state,
        })
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// `OpFunction` and its parameters, plus the function's debug name.
    ///
    /// The signature and the types and constants the body will need are
    /// declared here, so that headers emitted in program order fix their
    /// IDs even when bodies are generated in parallel.
    pub fn generate_header(&mut self) -> CodegenResult<()> {
        self.expect_state("generate_header", GeneratorState::Constructed)?;
        let method = self.method;
        let param_types: Vec<Type> = method.params.iter().map(|p| p.ty.clone()).collect();
        let (ret, signature) = {
            let mut types = self.resources.types().lock();
            let ret = types.type_id(&method.return_type)?;
            let signature = types.function_type_id(&method.return_type, &param_types)?;
            predeclare(&mut types, method);
            (ret, signature)
        };
        self.emit(
            Op::Function,
            &[
                ret.raw(),
                self.function_id.raw(),
                FunctionControl::empty().bits(),
                signature.raw(),
            ],
        );
        for param in &method.params {
            let ty = self.type_id(&param.ty)?;
            let id = self.ids.allocate(param.value)?;
            self.emit(Op::FunctionParameter, &[ty, id.raw()]);
        }
        if self.resources.debug_names() {
            self.builder.emit_with_string(
                Section::Debug,
                Op::Name,
                &[self.function_id.raw()],
                &method.name,
                &[],
            );
        }
        self.state = GeneratorState::HeaderEmitted;
        Ok(())
    }

    /// The function body, ending with `OpFunctionEnd`.
    pub fn generate_code(&mut self) -> CodegenResult<()> {
        self.expect_state("generate_code", GeneratorState::HeaderEmitted)?;
        let method = self.method;
        if method.blocks.is_empty() {
            tracing::error!(method = %method.name, "method has no blocks");
            return Err(CodegenError::EmptyMethod(method.name.clone()));
        }
        tracing::debug!(
            method = %method.name,
            blocks = method.blocks.len(),
            values = method.value_count(),
            "generating SPIR-V function"
        );

        for block in &method.blocks {
            self.ids.allocate(block.id)?;
        }

        for (index, block) in method.blocks.iter().enumerate() {
            tracing::trace!(block = block.id.raw(), values = block.body.len(), "emit block");
            let label = self.ids.load(block.id)?;
            self.builder.generate_op_label(label);
            if index == 0 {
                self.emit_allocas()?;
            }
            for value in &block.body {
                self.emit_value(value)?;
            }
            self.emit_terminator(&block.terminator)?;
        }

        self.resolve_phi_fixups()?;
        self.emit(Op::FunctionEnd, &[]);
        self.state = GeneratorState::BodyEmitted;
        Ok(())
    }

    /// Move everything generated into `module`.
    pub fn merge(&mut self, module: &mut SpirvBuilder) -> CodegenResult<()> {
        self.expect_state("merge", GeneratorState::BodyEmitted)?;
        module.merge(&std::mem::take(&mut self.builder));
        self.state = GeneratorState::Merged;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Allocations
    // -----------------------------------------------------------------------

    /// Storage for every allocation of the method, at the top of the entry
    /// block.
    ///
    /// Private allocations become `Function` variables; shared ones get a
    /// module `Workgroup` variable. Arrayed allocations are then cast to a
    /// pointer to their element, which is what the IR value denotes.
    fn emit_allocas(&mut self) -> CodegenResult<()> {
        let allocas = self.allocas;
        let mut casts: SmallVec<[(SpirvId, ValueId, &Type, StorageClass); 4]> = SmallVec::new();

        for info in allocas.local.iter() {
            match self.value_type(info.value)?.address_space() {
                Some(AddressSpace::Local) => {}
                Some(space) => {
                    tracing::error!(
                        method = %self.method.name,
                        value = info.value.raw(),
                        ?space,
                        "private allocation outside local memory"
                    );
                    return Err(CodegenError::unsupported(format!(
                        "allocation in {space:?} address space"
                    )));
                }
                None => return Err(CodegenError::unsupported("allocation of a non-pointer")),
            }
            let pointee = match info.len {
                AllocaLength::Single => info.elem.clone(),
                AllocaLength::Fixed(n) => Type::array(info.elem.clone(), n),
                AllocaLength::Dynamic => {
                    return Err(CodegenError::unsupported(
                        "dynamically sized private allocation",
                    ));
                }
            };
            let ptr = self
                .resources
                .types()
                .lock()
                .pointer_id(&pointee, StorageClass::Function)?;
            let variable = if info.is_array() {
                let variable = self.ids.fresh()?;
                casts.push((variable, info.value, &info.elem, StorageClass::Function));
                variable
            } else {
                self.ids.allocate(info.value)?
            };
            self.emit(
                Op::Variable,
                &[ptr.raw(), variable.raw(), StorageClass::Function as u32],
            );
        }

        for info in allocas.shared.iter().chain(allocas.dynamic_shared.iter()) {
            let variable = self
                .resources
                .types()
                .lock()
                .workgroup_variable(&info.elem, info.len)?;
            if info.is_array() {
                casts.push((variable, info.value, &info.elem, StorageClass::Workgroup));
            } else {
                self.ids.bind(info.value, variable)?;
            }
        }

        for (variable, value, elem, storage) in casts {
            let ty = self.resources.types().lock().pointer_id(elem, storage)?;
            let id = self.ids.allocate(value)?;
            self.emit(Op::Bitcast, &[ty.raw(), id.raw(), variable.raw()]);
        }
        Ok(())
    }

    fn emit_execution_mode(&mut self, mode: u32, operands: &[u32]) {
        let mut words: SmallVec<[u32; 5]> = SmallVec::new();
        words.push(self.function_id.raw());
        words.push(mode);
        words.extend_from_slice(operands);
        self.builder.emit(Section::ExecutionModes, Op::ExecutionMode, &words);
    }

    fn resolve_phi_fixups(&mut self) -> CodegenResult<()> {
        for fixup in std::mem::take(&mut self.phi_fixups) {
            let id = self.ids.load(fixup.value)?;
            self.builder.patch(Section::Functions, fixup.word, id.raw());
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn emit(&mut self, op: Op, operands: &[u32]) -> usize {
        self.builder.emit(Section::Functions, op, operands)
    }

    fn type_id(&self, ty: &Type) -> CodegenResult<u32> {
        self.resources.types().lock().type_id(ty).map(SpirvId::raw)
    }

    fn constant_id(&self, constant: &Constant) -> CodegenResult<u32> {
        self.resources
            .types()
            .lock()
            .constant_id(constant)
            .map(SpirvId::raw)
    }

    fn u32_constant(&self, value: u32) -> CodegenResult<u32> {
        self.resources
            .types()
            .lock()
            .u32_constant(value)
            .map(SpirvId::raw)
    }

    /// ID of an operand.
    fn operand(&self, value: ValueId) -> CodegenResult<u32> {
        self.ids.load(value).map(SpirvId::raw)
    }

    /// Type of a parameter or value of the method.
    fn value_type(&self, value: ValueId) -> CodegenResult<&'a Type> {
        self.value_types.get(&value).copied().ok_or_else(|| {
            tracing::error!(value = value.raw(), method = %self.method.name, "unknown value");
            CodegenError::UnknownValue(value)
        })
    }
}

/// Declare the value types and constants of `method` ahead of its body.
///
/// Types the body cannot lower are skipped here; the body reports them.
fn predeclare(types: &mut TypeGenerator, method: &Method) {
    for value in method.values() {
        if value.ty.is_void() || matches!(value.kind, ValueKind::InlineAsm { .. }) {
            continue;
        }
        let declared = match &value.kind {
            ValueKind::Constant(constant) => types.constant_id(constant),
            _ => types.type_id(&value.ty),
        };
        if declared.is_err() {
            tracing::trace!(method = %method.name, value = value.id.raw(), "left to the body");
        }
    }
}

#[cfg(test)]
mod tests;
