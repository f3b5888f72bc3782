//! Whole-module compilation.
//!
//! [`Backend::compile`] drives one generator per method: headers in program
//! order, bodies sequentially or on the rayon pool, then merges in program
//! order. Module-level instructions (capabilities, memory model, entry
//! point, declarations) are emitted last, once every generator has said
//! which types, constants, and builtins it needs.

use ori_gpu::{Allocas, EntryPoint, Method, Program};
use rayon::prelude::*;

use crate::builder::{Header, Operands, Section, SpirvBuilder};
use crate::codegen::{BackendCodeGenerator, FunctionGenerator, KernelGenerator};
use crate::disasm;
use crate::error::{BackendError, CodegenError};
use crate::resources::ModuleResources;
use crate::spirv::{
    Op, ADDRESSING_PHYSICAL64, EXECUTION_MODEL_KERNEL, MEMORY_MODEL_OPENCL, OPENCL_STD,
};

/// Environment variable that dumps every compiled module to stderr.
pub const DEBUG_ENV: &str = "ORI_DEBUG_SPIRV";

// ── Options ─────────────────────────────────────────────────────────

/// Module-wide code generation options.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpirvOptions {
    /// Target SPIR-V version `(major, minor)`.
    pub version: (u8, u8),
    /// Generator magic number written to the header.
    pub generator: u32,
    /// Emit `OpName` for every function.
    pub debug_names: bool,
    /// Generate function bodies in parallel.
    pub parallel: bool,
}

impl Default for SpirvOptions {
    fn default() -> Self {
        Self {
            version: (1, 3),
            generator: 0,
            debug_names: true,
            parallel: false,
        }
    }
}

impl SpirvOptions {
    #[must_use]
    pub fn with_version(mut self, major: u8, minor: u8) -> Self {
        self.version = (major, minor);
        self
    }

    #[must_use]
    pub fn with_generator(mut self, generator: u32) -> Self {
        self.generator = generator;
        self
    }

    #[must_use]
    pub fn with_debug_names(mut self, debug_names: bool) -> Self {
        self.debug_names = debug_names;
        self
    }

    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// The header version word.
    pub fn version_word(&self) -> u32 {
        let (major, minor) = self.version;
        (u32::from(major) << 16) | (u32::from(minor) << 8)
    }
}

// ── Output ──────────────────────────────────────────────────────────

/// A serialized SPIR-V module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpirvModule {
    words: Vec<u32>,
    specialization_ids: Vec<u32>,
}

impl SpirvModule {
    /// The module words, header included.
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Take the module words.
    pub fn into_words(self) -> Vec<u32> {
        self.words
    }

    /// The module as little-endian bytes, as loaded by OpenCL drivers.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.words.iter().flat_map(|word| word.to_le_bytes()).collect()
    }

    /// The ID bound from the header.
    pub fn bound(&self) -> u32 {
        self.words.get(3).copied().unwrap_or_default()
    }

    /// `SpecId`s the host sets to size dynamic shared memory, in
    /// declaration order.
    pub fn specialization_ids(&self) -> &[u32] {
        &self.specialization_ids
    }
}

// ── Backend ─────────────────────────────────────────────────────────

/// A method and its generator.
struct Job<'a> {
    method: &'a Method,
    generator: Box<dyn BackendCodeGenerator + Send + 'a>,
}

impl Job<'_> {
    fn generate_body(&mut self) -> Result<(), BackendError> {
        self.generator
            .generate_code()
            .map_err(|source| method_error(self.method, source))
    }
}

fn method_error(method: &Method, source: CodegenError) -> BackendError {
    BackendError::Codegen {
        method: method.name.clone(),
        source,
    }
}

/// SPIR-V kernel backend.
#[derive(Clone, Debug, Default)]
pub struct Backend {
    options: SpirvOptions,
}

impl Backend {
    pub fn new(options: SpirvOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SpirvOptions {
        &self.options
    }

    /// Compile `program` into a module launched through `entry`.
    ///
    /// Any failure discards the whole module.
    pub fn compile(
        &self,
        program: &Program,
        entry: &EntryPoint,
    ) -> Result<SpirvModule, BackendError> {
        if program.method(entry.method).is_none() {
            tracing::error!(method = entry.method.raw(), kernel = %entry.name, "entry point not in program");
            return Err(BackendError::MissingEntryPoint(entry.method));
        }
        tracing::debug!(
            kernel = %entry.name,
            methods = program.methods.len(),
            parallel = self.options.parallel,
            "compiling SPIR-V module"
        );

        let resources = ModuleResources::new(program, self.options.debug_names)?;
        let mut module = SpirvBuilder::new();
        module.emit_with_string(
            Section::ExtInstImports,
            Op::ExtInstImport,
            &[resources.opencl().raw()],
            OPENCL_STD,
            &[],
        );

        let allocas: Vec<Allocas> = program.methods.iter().map(Allocas::collect).collect();
        let mut jobs = Vec::with_capacity(program.methods.len());
        for (method, allocas) in program.methods.iter().zip(&allocas) {
            let generator: Box<dyn BackendCodeGenerator + Send + '_> =
                if method.id == entry.method {
                    Box::new(
                        KernelGenerator::new(method, allocas, &resources, entry)
                            .map_err(|source| method_error(method, source))?,
                    )
                } else {
                    Box::new(
                        FunctionGenerator::new(method, allocas, &resources)
                            .map_err(|source| method_error(method, source))?,
                    )
                };
            let mut job = Job { method, generator };
            job.generator
                .generate_header(&mut module)
                .map_err(|source| method_error(method, source))?;
            jobs.push(job);
        }

        if self.options.parallel {
            jobs.par_iter_mut().try_for_each(Job::generate_body)?;
        } else {
            jobs.iter_mut().try_for_each(Job::generate_body)?;
        }

        for job in &mut jobs {
            job.generator
                .generate_constants(&mut module)
                .map_err(|source| method_error(job.method, source))?;
            job.generator
                .merge(&mut module)
                .map_err(|source| method_error(job.method, source))?;
        }
        drop(jobs);

        let kernel_id = resources.functions().get(entry.method)?;
        let bound = resources.ids().bound();
        let types = resources.into_types();

        for capability in types.capabilities().operands() {
            module.emit(Section::Capabilities, Op::Capability, &[capability as u32]);
        }
        module.emit(
            Section::MemoryModel,
            Op::MemoryModel,
            &[ADDRESSING_PHYSICAL64, MEMORY_MODEL_OPENCL],
        );
        let interface: Operands = types.interface().iter().map(|id| id.raw()).collect();
        module.emit_with_string(
            Section::EntryPoints,
            Op::EntryPoint,
            &[EXECUTION_MODEL_KERNEL, kernel_id.raw()],
            &entry.name,
            &interface,
        );
        module.merge(types.builder());

        let words = module.serialize(Header {
            version: self.options.version_word(),
            generator: self.options.generator,
            bound,
        });
        tracing::debug!(
            kernel = %entry.name,
            words = words.len(),
            bound,
            declarations = types.declaration_count(),
            "SPIR-V module complete"
        );
        if std::env::var(DEBUG_ENV).is_ok_and(|value| !value.is_empty()) {
            eprintln!("; {DEBUG_ENV}: kernel `{}`", entry.name);
            eprintln!("{}", disasm::disassemble(&words));
        }

        Ok(SpirvModule {
            words,
            specialization_ids: types.specialization_ids().to_vec(),
        })
    }
}
