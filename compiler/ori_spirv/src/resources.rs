//! Module-level state shared by every method generator.

use std::sync::Arc;

use ori_gpu::{MethodId, Program};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::error::{CodegenError, CodegenResult};
use crate::id::{IdCounter, SpirvId};
use crate::types::TypeGenerator;

/// Function IDs, assigned before any body is generated so calls can name
/// methods that come later in the program.
#[derive(Debug, Default)]
pub struct FunctionTable {
    ids: FxHashMap<MethodId, SpirvId>,
}

impl FunctionTable {
    /// The function ID of `method`.
    pub fn get(&self, method: MethodId) -> CodegenResult<SpirvId> {
        self.ids.get(&method).copied().ok_or_else(|| {
            tracing::error!(method = method.raw(), "call to unknown method");
            CodegenError::UnknownMethod(method)
        })
    }

    /// Number of functions.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True if the program has no methods.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Resources shared across the generators of one module.
///
/// Generators take `&ModuleResources`; the counter is atomic and the type
/// generator sits behind a mutex, so generators may run on several threads.
#[derive(Debug)]
pub struct ModuleResources {
    ids: Arc<IdCounter>,
    types: Mutex<TypeGenerator>,
    functions: FunctionTable,
    opencl: SpirvId,
    debug_names: bool,
}

impl ModuleResources {
    /// Resources for `program`: the `OpenCL.std` import takes the first ID,
    /// then every method gets its function ID in program order.
    pub fn new(program: &Program, debug_names: bool) -> CodegenResult<Self> {
        let ids = Arc::new(IdCounter::new());
        let opencl = ids.next_id()?;
        let mut functions = FunctionTable::default();
        for method in &program.methods {
            functions.ids.insert(method.id, ids.next_id()?);
        }
        Ok(Self {
            types: Mutex::new(TypeGenerator::new(Arc::clone(&ids))),
            ids,
            functions,
            opencl,
            debug_names,
        })
    }

    /// The module-wide ID counter.
    pub fn ids(&self) -> &IdCounter {
        &self.ids
    }

    /// The shared type generator.
    pub fn types(&self) -> &Mutex<TypeGenerator> {
        &self.types
    }

    /// Pre-assigned function IDs.
    pub fn functions(&self) -> &FunctionTable {
        &self.functions
    }

    /// ID of the `OpenCL.std` import.
    pub fn opencl(&self) -> SpirvId {
        self.opencl
    }

    /// Whether generators emit `OpName`s.
    pub fn debug_names(&self) -> bool {
        self.debug_names
    }

    /// Take the type generator out once generation is done.
    pub fn into_types(self) -> TypeGenerator {
        self.types.into_inner()
    }
}
