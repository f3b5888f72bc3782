//! SPIR-V Backend for Ori
//!
//! Turns kernel IR ([`ori_gpu::Program`]) into an OpenCL-flavoured SPIR-V
//! module (`Kernel` capability, `Physical64` addressing) ready to be handed
//! to a driver.
//!
//! # Debug Environment Variables
//!
//! - `ORI_DEBUG_SPIRV`: Print the disassembly of every compiled module to
//!   stderr. Any non-empty value enables this.
//!   Example: `ORI_DEBUG_SPIRV=1 cargo test -p ori_spirv`
//!
//! - `RUST_LOG=ori_spirv=debug`: One event per module and per function.
//!
//! - `RUST_LOG=ori_spirv=trace`: Also one event per basic block.
//!
//! Tracing output requires [`init_tracing`].
//!
//! # Architecture
//!
//! - **Identifiers** (`id.rs`): module-wide counter, per-method ranges,
//!   per-method entity tables
//! - **Declarations** (`types.rs`): deduplicated types, constants, and
//!   module-scope variables
//! - **Generators** (`codegen/`): one per method; header, body, merge
//! - **Module builder** (`builder.rs`): sectioned word buffers in logical
//!   layout order
//! - **Driver** (`backend.rs`): ties it together, optionally in parallel
//!
//! # Example
//!
//! ```ignore
//! use ori_gpu::{EntryPoint, IndexDimension, MethodBuilder, MethodId, Program, Type};
//! use ori_spirv::{Backend, SpirvOptions};
//!
//! let mut b = MethodBuilder::new(MethodId::new(0), "noop", Type::Void);
//! b.ret(None);
//! let program = Program::new(vec![b.finish()]);
//! let entry = EntryPoint::new(MethodId::new(0), "noop", IndexDimension::One);
//! let module = Backend::new(SpirvOptions::default()).compile(&program, &entry)?;
//! ```

use std::sync::Once;

mod backend;
pub mod builder;
pub mod codegen;
pub mod disasm;
pub mod error;
pub mod id;
pub mod intrinsics;
pub mod resources;
pub mod spirv;
pub mod types;

pub use backend::{Backend, SpirvModule, SpirvOptions, DEBUG_ENV};
pub use builder::{Section, SpirvBuilder};
pub use codegen::{BackendCodeGenerator, FunctionGenerator, GeneratorState, KernelGenerator};
pub use error::{BackendError, CodegenError, CodegenResult};
pub use id::{IdAllocator, IdCounter, SpirvId};
pub use resources::ModuleResources;
pub use types::TypeGenerator;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing based on `RUST_LOG`.
///
/// Safe to call more than once; only the first call has any effect, and
/// nothing is installed unless `RUST_LOG` is set.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}
