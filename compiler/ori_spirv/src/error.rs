//! Error types for SPIR-V generation.
//!
//! Every error here is fatal for the module being generated: the backend
//! never retries and never returns a partial module.

use ori_gpu::{MethodId, ValueId};

use crate::codegen::GeneratorState;
use crate::id::Entity;

/// Failure while generating one method or a module-level declaration.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CodegenError {
    /// An operand was loaded before its identifier was allocated.
    #[error("no identifier allocated for {0}")]
    UnallocatedEntity(Entity),

    /// An entity was allocated twice.
    #[error("identifier already allocated for {0}")]
    DuplicateAllocation(Entity),

    /// A generator operation was called in the wrong state.
    #[error("`{operation}` called while generator is {state}")]
    OutOfOrder {
        operation: &'static str,
        state: GeneratorState,
    },

    /// An IR construct with no SPIR-V lowering.
    #[error("unsupported construct: {0}")]
    Unsupported(String),

    /// A generator used up its reserved identifier range.
    #[error("identifier range exhausted")]
    IdRangeExhausted,

    /// The module ran past the SPIR-V identifier bound.
    #[error("SPIR-V identifier space exhausted")]
    IdSpaceExhausted,

    /// A call names a method that is not part of the program.
    #[error("call to unknown method #{}", .0.raw())]
    UnknownMethod(MethodId),

    /// An alloca that the allocation analysis did not classify.
    #[error("alloca %{} has no allocation kind", .0.raw())]
    UnclassifiedAlloca(ValueId),

    /// A method without any blocks.
    #[error("method `{0}` has no blocks")]
    EmptyMethod(String),

    /// An operand that is neither a parameter nor a value of the method.
    #[error("value %{} is not defined in this method", .0.raw())]
    UnknownValue(ValueId),
}

impl CodegenError {
    /// Shorthand for [`CodegenError::Unsupported`].
    pub fn unsupported(what: impl Into<String>) -> Self {
        CodegenError::Unsupported(what.into())
    }
}

/// Failure of a whole-module compilation.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Generating a method failed.
    #[error("failed to generate `{method}`: {source}")]
    Codegen {
        method: String,
        #[source]
        source: CodegenError,
    },

    /// The entry point names a method that is not in the program.
    #[error("entry point method #{} is not part of the program", .0.raw())]
    MissingEntryPoint(MethodId),

    /// A module-level step (ID reservation, declarations) failed.
    #[error(transparent)]
    Module(#[from] CodegenError),
}

impl BackendError {
    /// The underlying codegen error, if any.
    pub fn codegen_error(&self) -> Option<&CodegenError> {
        match self {
            BackendError::Codegen { source, .. } | BackendError::Module(source) => Some(source),
            BackendError::MissingEntryPoint(_) => None,
        }
    }
}

/// Result alias for generation steps.
pub type CodegenResult<T> = Result<T, CodegenError>;
