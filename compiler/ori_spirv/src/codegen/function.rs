//! Concrete generators: ordinary device functions and kernel entry points.
//!
//! Both compose a [`GeneralCodeGenerator`] and forward to it; the kernel
//! adds its own header checks and execution modes.

use ori_gpu::{Allocas, EntryPoint, Method};

use super::{BackendCodeGenerator, GeneralCodeGenerator, GeneratorState};
use crate::builder::SpirvBuilder;
use crate::error::{CodegenError, CodegenResult};
use crate::resources::ModuleResources;
use crate::spirv::EXECUTION_MODE_LOCAL_SIZE;

/// Generator for a device function called from kernels.
pub struct FunctionGenerator<'a> {
    general: GeneralCodeGenerator<'a>,
}

impl<'a> FunctionGenerator<'a> {
    pub fn new(
        method: &'a Method,
        allocas: &'a Allocas,
        resources: &'a ModuleResources,
    ) -> CodegenResult<Self> {
        Ok(Self {
            general: GeneralCodeGenerator::new(method, allocas, resources)?,
        })
    }

    /// The shared generator.
    pub fn general(&self) -> &GeneralCodeGenerator<'a> {
        &self.general
    }
}

impl BackendCodeGenerator for FunctionGenerator<'_> {
    fn generate_header(&mut self, _module: &mut SpirvBuilder) -> CodegenResult<()> {
        self.general.generate_header()
    }

    fn generate_code(&mut self) -> CodegenResult<()> {
        self.general.generate_code()
    }

    fn merge(&mut self, module: &mut SpirvBuilder) -> CodegenResult<()> {
        self.general.merge(module)
    }

    fn state(&self) -> GeneratorState {
        self.general.state()
    }
}

/// Generator for the kernel a module is launched through.
///
/// Kernels return `Void`. A fixed work-group size becomes a `LocalSize`
/// execution mode; the `OpEntryPoint` itself is emitted by the backend once
/// every builtin the module uses is known.
pub struct KernelGenerator<'a> {
    general: GeneralCodeGenerator<'a>,
    entry: &'a EntryPoint,
}

impl<'a> KernelGenerator<'a> {
    pub fn new(
        method: &'a Method,
        allocas: &'a Allocas,
        resources: &'a ModuleResources,
        entry: &'a EntryPoint,
    ) -> CodegenResult<Self> {
        Ok(Self {
            general: GeneralCodeGenerator::new(method, allocas, resources)?,
            entry,
        })
    }

    /// The shared generator.
    pub fn general(&self) -> &GeneralCodeGenerator<'a> {
        &self.general
    }
}

impl BackendCodeGenerator for KernelGenerator<'_> {
    fn generate_header(&mut self, _module: &mut SpirvBuilder) -> CodegenResult<()> {
        self.general
            .expect_state("generate_header", GeneratorState::Constructed)?;
        let method = self.general.method();
        if !method.return_type.is_void() {
            tracing::error!(kernel = %method.name, ty = %method.return_type, "kernel returns a value");
            return Err(CodegenError::unsupported(format!(
                "kernel `{}` returning {}",
                method.name, method.return_type
            )));
        }
        self.general.generate_header()?;
        if let Some(size) = self.entry.local_size {
            self.general.emit_execution_mode(EXECUTION_MODE_LOCAL_SIZE, &size);
        }
        Ok(())
    }

    fn generate_code(&mut self) -> CodegenResult<()> {
        self.general.generate_code()
    }

    fn merge(&mut self, module: &mut SpirvBuilder) -> CodegenResult<()> {
        self.general.merge(module)
    }

    fn state(&self) -> GeneratorState {
        self.general.state()
    }
}
