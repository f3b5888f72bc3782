use ori_gpu::{
    AddressSpace, AllocaLength, Allocas, ArithmeticFlags, BinaryOp, BlockId, CompareKind, Constant,
    ConvertFlags, EntryPoint, FloatWidth, GridBuiltin, IndexDimension, IntWidth, MathIntrinsic,
    Method, MethodBuilder, MethodId, Program, ScalarClass, Type, UnaryOp, ValueId, ValueKind,
};
use pretty_assertions::assert_eq;

use super::values::{binary_op, compare_op, conversion, unary_op, Conversion};
use super::*;
use crate::builder::InstructionIter;
use crate::id::Entity;
use crate::spirv::EXECUTION_MODE_LOCAL_SIZE;

fn ok<T>(result: CodegenResult<T>) -> T {
    result.unwrap_or_else(|e| panic!("{e}"))
}

fn resources_for(method: &Method) -> ModuleResources {
    ok(ModuleResources::new(
        &Program::new(vec![method.clone()]),
        true,
    ))
}

/// Run one function generator through its whole lifecycle.
fn generate(method: &Method) -> CodegenResult<SpirvBuilder> {
    let resources = resources_for(method);
    let allocas = Allocas::collect(method);
    let mut generator = FunctionGenerator::new(method, &allocas, &resources)?;
    let mut module = SpirvBuilder::new();
    generator.generate_header(&mut module)?;
    generator.generate_code()?;
    generator.merge(&mut module)?;
    Ok(module)
}

fn instructions(module: &SpirvBuilder, section: Section) -> Vec<(Op, Vec<u32>)> {
    InstructionIter::new(module.section(section))
        .filter_map(|inst| inst.op().map(|op| (op, inst.operands.to_vec())))
        .collect()
}

fn ops(module: &SpirvBuilder) -> Vec<Op> {
    instructions(module, Section::Functions)
        .into_iter()
        .map(|(op, _)| op)
        .collect()
}

fn find(module: &SpirvBuilder, wanted: Op) -> Vec<u32> {
    instructions(module, Section::Functions)
        .into_iter()
        .find(|(op, _)| *op == wanted)
        .map(|(_, operands)| operands)
        .unwrap_or_else(|| panic!("no {} emitted", wanted.name()))
}

fn void_method(name: &str) -> MethodBuilder {
    MethodBuilder::new(MethodId::new(0), name, Type::Void)
}

// ── Instruction selection ───────────────────────────────────────────

#[test]
fn integer_division_follows_signedness() {
    let int = ScalarClass::Int(IntWidth::I32);
    assert_eq!(
        binary_op(BinaryOp::Div, int, ArithmeticFlags::empty()),
        Ok(Op::SDiv)
    );
    assert_eq!(
        binary_op(BinaryOp::Div, int, ArithmeticFlags::UNSIGNED),
        Ok(Op::UDiv)
    );
    assert_eq!(
        binary_op(BinaryOp::Shr, int, ArithmeticFlags::UNSIGNED),
        Ok(Op::ShiftRightLogical)
    );
    assert_eq!(
        binary_op(BinaryOp::Rem, int, ArithmeticFlags::empty()),
        Ok(Op::SRem)
    );
}

#[test]
fn float_and_bool_binary_ops() {
    let float = ScalarClass::Float(FloatWidth::F32);
    assert_eq!(
        binary_op(BinaryOp::Mul, float, ArithmeticFlags::empty()),
        Ok(Op::FMul)
    );
    assert_eq!(
        binary_op(BinaryOp::Xor, ScalarClass::Bool, ArithmeticFlags::empty()),
        Ok(Op::LogicalNotEqual)
    );
    assert!(matches!(
        binary_op(BinaryOp::Shl, float, ArithmeticFlags::empty()),
        Err(CodegenError::Unsupported(_))
    ));
}

#[test]
fn unary_ops() {
    assert_eq!(
        unary_op(UnaryOp::Neg, ScalarClass::Int(IntWidth::I64)),
        Ok(Op::SNegate)
    );
    assert_eq!(unary_op(UnaryOp::Not, ScalarClass::Bool), Ok(Op::LogicalNot));
    assert!(unary_op(UnaryOp::Not, ScalarClass::Float(FloatWidth::F64)).is_err());
}

#[test]
fn float_comparisons_are_ordered_unless_flagged() {
    let float = ScalarClass::Float(FloatWidth::F32);
    assert_eq!(
        compare_op(CompareKind::Lt, float, ArithmeticFlags::empty()),
        Ok(Op::FOrdLessThan)
    );
    assert_eq!(
        compare_op(CompareKind::Lt, float, ArithmeticFlags::UNORDERED),
        Ok(Op::FUnordLessThan)
    );
    assert_eq!(
        compare_op(
            CompareKind::Ge,
            ScalarClass::Int(IntWidth::I32),
            ArithmeticFlags::UNSIGNED
        ),
        Ok(Op::UGreaterThanEqual)
    );
    assert!(compare_op(CompareKind::Lt, ScalarClass::Bool, ArithmeticFlags::empty()).is_err());
}

#[test]
fn integer_conversions() {
    let none = ConvertFlags::empty();
    assert_eq!(
        conversion(&Type::I32, &Type::I64, none),
        Ok(Conversion::Op(Op::SConvert))
    );
    assert_eq!(
        conversion(&Type::I32, &Type::I64, ConvertFlags::SOURCE_UNSIGNED),
        Ok(Conversion::Op(Op::UConvert))
    );
    // Truncation ignores signedness.
    assert_eq!(
        conversion(&Type::I64, &Type::I8, none),
        Ok(Conversion::Op(Op::UConvert))
    );
    assert_eq!(
        conversion(&Type::I32, &Type::I32, none),
        Ok(Conversion::Op(Op::CopyObject))
    );
}

#[test]
fn float_bool_and_pointer_conversions() {
    let none = ConvertFlags::empty();
    assert_eq!(
        conversion(&Type::F32, &Type::I32, ConvertFlags::TARGET_UNSIGNED),
        Ok(Conversion::Op(Op::ConvertFToU))
    );
    assert_eq!(
        conversion(&Type::I32, &Type::F64, none),
        Ok(Conversion::Op(Op::ConvertSToF))
    );
    assert_eq!(
        conversion(&Type::Bool, &Type::I32, none),
        Ok(Conversion::BoolToNumber)
    );
    assert_eq!(
        conversion(&Type::F32, &Type::Bool, none),
        Ok(Conversion::NumberToBool(Op::FUnordNotEqual))
    );

    let global = Type::pointer(Type::F32, AddressSpace::Global);
    let generic = Type::pointer(Type::F32, AddressSpace::Generic);
    let shared = Type::pointer(Type::F32, AddressSpace::Shared);
    assert_eq!(
        conversion(&global, &generic, none),
        Ok(Conversion::Op(Op::PtrCastToGeneric))
    );
    assert_eq!(
        conversion(&generic, &shared, none),
        Ok(Conversion::Op(Op::GenericCastToPtr))
    );
    assert!(conversion(&global, &shared, none).is_err());
    assert_eq!(
        conversion(&global, &Type::I64, none),
        Ok(Conversion::Op(Op::ConvertPtrToU))
    );
}

// ── Lifecycle ───────────────────────────────────────────────────────

#[test]
fn body_before_header_is_out_of_order() {
    let mut b = void_method("k");
    b.ret(None);
    let method = b.finish();
    let resources = resources_for(&method);
    let allocas = Allocas::collect(&method);
    let mut generator = ok(FunctionGenerator::new(&method, &allocas, &resources));

    assert_eq!(
        generator.generate_code(),
        Err(CodegenError::OutOfOrder {
            operation: "generate_code",
            state: GeneratorState::Constructed,
        })
    );
    assert_eq!(generator.state(), GeneratorState::Constructed);
}

#[test]
fn merge_happens_exactly_once() {
    let mut b = void_method("k");
    b.ret(None);
    let method = b.finish();
    let resources = resources_for(&method);
    let allocas = Allocas::collect(&method);
    let mut generator = ok(FunctionGenerator::new(&method, &allocas, &resources));
    let mut module = SpirvBuilder::new();

    ok(generator.generate_header(&mut module));
    assert!(generator.merge(&mut module).is_err());
    ok(generator.generate_code());
    ok(generator.generate_constants(&mut module));
    assert!(module.is_empty());
    ok(generator.merge(&mut module));
    let words = module.word_count();
    assert_eq!(instructions(&module, Section::Debug).len(), 1);

    assert_eq!(
        generator.merge(&mut module),
        Err(CodegenError::OutOfOrder {
            operation: "merge",
            state: GeneratorState::Merged,
        })
    );
    assert_eq!(module.word_count(), words);
    assert_eq!(generator.state(), GeneratorState::Merged);
}

#[test]
fn function_name_goes_to_debug_section() {
    let mut b = void_method("saxpy");
    b.ret(None);
    let module = ok(generate(&b.finish()));
    let names = instructions(&module, Section::Debug);
    assert_eq!(names.len(), 1);
    assert_eq!(names[0].0, Op::Name);
}

// ── Blocks ──────────────────────────────────────────────────────────

#[test]
fn blocks_are_emitted_in_stored_order() {
    let mut b = void_method("k");
    let exit = b.new_block();
    let middle = b.new_block();
    b.br(middle);
    b.position_at(middle);
    b.br(exit);
    b.position_at(exit);
    b.ret(None);
    let module = ok(generate(&b.finish()));

    assert_eq!(
        ops(&module),
        vec![
            Op::Function,
            Op::Label,
            Op::Branch,
            Op::Label,
            Op::Return,
            Op::Label,
            Op::Branch,
            Op::FunctionEnd,
        ]
    );

    let functions = instructions(&module, Section::Functions);
    let labels: Vec<u32> = functions
        .iter()
        .filter(|(op, _)| *op == Op::Label)
        .map(|(_, operands)| operands[0])
        .collect();
    // The entry block branches forward to the block stored last.
    assert_eq!(functions[2].1, vec![labels[2]]);
    assert_eq!(functions[6].1, vec![labels[1]]);
}

#[test]
fn unterminated_blocks_become_unreachable() {
    let mut b = void_method("k");
    let dead = b.new_block();
    b.ret(None);
    b.position_at(dead);
    let module = ok(generate(&b.finish()));
    assert_eq!(
        ops(&module),
        vec![
            Op::Function,
            Op::Label,
            Op::Return,
            Op::Label,
            Op::Unreachable,
            Op::FunctionEnd,
        ]
    );
}

#[test]
fn method_without_blocks_is_rejected() {
    let mut method = void_method("empty").finish();
    method.blocks.clear();
    assert_eq!(
        generate(&method),
        Err(CodegenError::EmptyMethod("empty".to_owned()))
    );
}

#[test]
fn switch_literals_follow_selector_width() {
    let mut b = void_method("k");
    let wide = b.param(Type::I64);
    let narrow = b.param(Type::I8);
    let second = b.new_block();
    let done = b.new_block();
    b.switch(wide, vec![(u64::MAX, second)], done);
    b.position_at(second);
    b.switch(narrow, vec![(0x1FF, done)], done);
    b.position_at(done);
    b.ret(None);
    let module = ok(generate(&b.finish()));

    let switches: Vec<Vec<u32>> = instructions(&module, Section::Functions)
        .into_iter()
        .filter(|(op, _)| *op == Op::Switch)
        .map(|(_, operands)| operands)
        .collect();
    assert_eq!(switches.len(), 2);
    // [selector, default, literal words..., target]
    assert_eq!(switches[0].len(), 5);
    assert_eq!(&switches[0][2..4], &[u32::MAX, u32::MAX]);
    assert_eq!(switches[1].len(), 4);
    assert_eq!(switches[1][2], 0xFF);
}

#[test]
fn switch_on_float_is_unsupported() {
    let mut b = void_method("k");
    let x = b.param(Type::F32);
    let other = b.new_block();
    b.switch(x, vec![(0, other)], other);
    b.position_at(other);
    b.ret(None);
    assert!(matches!(
        generate(&b.finish()),
        Err(CodegenError::Unsupported(_))
    ));
}

// ── Values ──────────────────────────────────────────────────────────

#[test]
fn parameters_and_results_flow_into_operands() {
    let mut b = MethodBuilder::new(MethodId::new(0), "add", Type::I32);
    let x = b.param(Type::I32);
    let y = b.param(Type::I32);
    let sum = b.binary(BinaryOp::Add, x, y);
    b.ret(Some(sum));
    let module = ok(generate(&b.finish()));

    let functions = instructions(&module, Section::Functions);
    let params: Vec<u32> = functions
        .iter()
        .filter(|(op, _)| *op == Op::FunctionParameter)
        .map(|(_, operands)| operands[1])
        .collect();
    let add = find(&module, Op::IAdd);
    assert_eq!(&add[2..], params.as_slice());
    assert_eq!(find(&module, Op::ReturnValue), vec![add[1]]);
}

#[test]
fn constants_use_module_declarations() {
    let mut b = MethodBuilder::new(MethodId::new(0), "seven", Type::I32);
    let seven = b.constant(Constant::i32(7));
    b.ret(Some(seven));
    let method = b.finish();
    let resources = resources_for(&method);
    let allocas = Allocas::collect(&method);
    let mut generator = ok(FunctionGenerator::new(&method, &allocas, &resources));
    let mut module = SpirvBuilder::new();
    ok(generator.generate_header(&mut module));
    ok(generator.generate_code());
    ok(generator.merge(&mut module));

    let declared = ok(resources.types().lock().constant_id(&Constant::i32(7)));
    assert_eq!(find(&module, Op::ReturnValue), vec![declared.raw()]);
}

#[test]
fn phi_forward_references_are_patched() {
    let mut b = void_method("count");
    let head = b.new_block();
    let exit = b.new_block();
    let zero = b.constant(Constant::i32(0));
    b.br(head);
    b.position_at(head);
    let counter = b.phi(Type::I32, vec![]);
    let one = b.constant(Constant::i32(1));
    let next = b.binary(BinaryOp::Add, counter, one);
    let ten = b.constant(Constant::i32(10));
    let more = b.compare(CompareKind::Lt, next, ten, ArithmeticFlags::empty());
    b.cond_br(more, head, exit);
    b.position_at(exit);
    b.ret(None);
    let mut method = b.finish();
    method.blocks[1].body[0].kind = ValueKind::Phi {
        incoming: vec![(zero, BlockId::new(0)), (next, head)],
    };

    let module = ok(generate(&method));
    let phi = find(&module, Op::Phi);
    let add = find(&module, Op::IAdd);
    // [type, result, value, block, value, block]
    assert_eq!(phi.len(), 6);
    assert_eq!(phi[4], add[1]);
    assert_ne!(phi[4], 0);
    assert_eq!(add[2], phi[1]);
}

#[test]
fn undefined_operand_is_reported() {
    let mut b = void_method("k");
    let x = b.param(Type::I32);
    b.compare(CompareKind::Eq, ValueId::new(99), x, ArithmeticFlags::empty());
    b.ret(None);
    assert_eq!(
        generate(&b.finish()),
        Err(CodegenError::UnknownValue(ValueId::new(99)))
    );
}

#[test]
fn use_before_definition_is_reported() {
    let mut b = void_method("k");
    let x = b.param(Type::I32);
    b.unary(UnaryOp::Neg, x);
    b.ret(None);
    let mut method = b.finish();
    // Operand defined nowhere in the method.
    method.blocks[0].body[0].kind = ValueKind::Unary {
        op: UnaryOp::Neg,
        value: ValueId::new(42),
    };
    assert_eq!(
        generate(&method),
        Err(CodegenError::UnallocatedEntity(Entity::Value(ValueId::new(
            42
        ))))
    );
}

#[test]
fn inline_assembly_is_unsupported() {
    let mut b = void_method("k");
    b.emit(
        Type::Void,
        ValueKind::InlineAsm {
            template: "nop".to_owned(),
            args: vec![],
        },
    );
    b.ret(None);
    assert_eq!(
        generate(&b.finish()),
        Err(CodegenError::unsupported("inline assembly"))
    );
}

#[test]
fn intrinsics_use_the_opencl_set() {
    let mut b = MethodBuilder::new(MethodId::new(0), "root", Type::F32);
    let x = b.param(Type::F32);
    let root = b.intrinsic(
        MathIntrinsic::Sqrt,
        vec![x],
        Type::F32,
        ArithmeticFlags::empty(),
    );
    b.ret(Some(root));
    let method = b.finish();
    let resources = resources_for(&method);
    let module = ok(generate(&method));

    let ext = find(&module, Op::ExtInst);
    assert_eq!(ext[2], resources.opencl().raw());
    assert_eq!(ext[3], crate::intrinsics::opencl::SQRT);
}

#[test]
fn grid_index_narrows_to_value_width() {
    let mut b = void_method("k");
    b.grid_index(GridBuiltin::GlobalIndex, 0, Type::I32);
    b.grid_index(GridBuiltin::GroupIndex, 1, Type::I64);
    b.ret(None);
    let module = ok(generate(&b.finish()));
    assert_eq!(
        ops(&module),
        vec![
            Op::Function,
            Op::Label,
            Op::Load,
            Op::CompositeExtract,
            Op::UConvert,
            Op::Load,
            Op::CompositeExtract,
            Op::Return,
            Op::FunctionEnd,
        ]
    );
}

#[test]
fn grid_index_past_z_is_unsupported() {
    let mut b = void_method("k");
    b.grid_index(GridBuiltin::GlobalIndex, 3, Type::I32);
    b.ret(None);
    assert!(matches!(
        generate(&b.finish()),
        Err(CodegenError::Unsupported(_))
    ));
}

#[test]
fn barrier_uses_workgroup_scope() {
    let mut b = void_method("k");
    b.barrier();
    b.ret(None);
    let method = b.finish();
    let resources = resources_for(&method);
    let allocas = Allocas::collect(&method);
    let mut generator = ok(FunctionGenerator::new(&method, &allocas, &resources));
    let mut module = SpirvBuilder::new();
    ok(generator.generate_header(&mut module));
    ok(generator.generate_code());
    ok(generator.merge(&mut module));

    let scope = ok(resources.types().lock().u32_constant(2));
    let barrier = find(&module, Op::ControlBarrier);
    assert_eq!(barrier[0], scope.raw());
    assert_eq!(barrier[1], scope.raw());
}

// ── Allocations ─────────────────────────────────────────────────────

#[test]
fn private_arrays_are_variables_cast_to_element_pointers() {
    let mut b = void_method("k");
    let single = b.alloca(Type::I32, AllocaLength::Single, AddressSpace::Local);
    b.alloca(Type::F32, AllocaLength::Fixed(8), AddressSpace::Local);
    let zero = b.constant(Constant::i32(0));
    b.store(single, zero);
    b.ret(None);
    let module = ok(generate(&b.finish()));

    assert_eq!(
        ops(&module),
        vec![
            Op::Function,
            Op::Label,
            Op::Variable,
            Op::Variable,
            Op::Bitcast,
            Op::Store,
            Op::Return,
            Op::FunctionEnd,
        ]
    );
    let functions = instructions(&module, Section::Functions);
    let first_variable = &functions[2].1;
    assert_eq!(first_variable[2], StorageClass::Function as u32);
    assert_eq!(find(&module, Op::Store)[0], first_variable[1]);
}

#[test]
fn shared_allocations_live_in_workgroup_variables() {
    let mut b = void_method("k");
    let tile = b.alloca(Type::F32, AllocaLength::Single, AddressSpace::Shared);
    let value = b.load(tile);
    b.store(tile, value);
    b.ret(None);
    let module = ok(generate(&b.finish()));

    assert!(!ops(&module).contains(&Op::Variable));
    let load = find(&module, Op::Load);
    assert_eq!(find(&module, Op::Store), vec![load[2], load[1]]);
}

#[test]
fn dynamic_private_allocation_is_unsupported() {
    let mut b = void_method("k");
    b.alloca(Type::F32, AllocaLength::Dynamic, AddressSpace::Local);
    b.ret(None);
    assert!(matches!(
        generate(&b.finish()),
        Err(CodegenError::Unsupported(_))
    ));
}

#[test]
fn allocations_outside_local_memory_are_rejected() {
    for space in [AddressSpace::Global, AddressSpace::Generic] {
        let mut b = void_method("k");
        let buffer = b.alloca(Type::I32, AllocaLength::Fixed(4), space);
        let one = b.constant(Constant::i32(1));
        let slot = b.element_address(buffer, one);
        b.store(slot, one);
        b.ret(None);
        assert_eq!(
            generate(&b.finish()).err(),
            Some(CodegenError::Unsupported(format!(
                "allocation in {space:?} address space"
            )))
        );
    }
}

#[test]
fn unclassified_alloca_is_reported() {
    let mut b = void_method("k");
    let slot = b.alloca(Type::I32, AllocaLength::Single, AddressSpace::Local);
    b.ret(None);
    let method = b.finish();
    let resources = resources_for(&method);
    let allocas = Allocas::default();
    let mut generator = ok(FunctionGenerator::new(&method, &allocas, &resources));
    let mut module = SpirvBuilder::new();
    ok(generator.generate_header(&mut module));
    assert_eq!(
        generator.generate_code(),
        Err(CodegenError::UnclassifiedAlloca(slot))
    );
}

// ── Kernels ─────────────────────────────────────────────────────────

#[test]
fn kernel_local_size_becomes_execution_mode() {
    let mut b = void_method("k");
    b.ret(None);
    let method = b.finish();
    let resources = resources_for(&method);
    let allocas = Allocas::collect(&method);
    let entry = EntryPoint::new(method.id, "k", IndexDimension::Two).with_local_size([16, 16, 1]);
    let mut generator = ok(KernelGenerator::new(&method, &allocas, &resources, &entry));
    let mut module = SpirvBuilder::new();
    ok(generator.generate_header(&mut module));
    ok(generator.generate_code());
    assert!(module.is_empty());
    ok(generator.merge(&mut module));

    let function_id = generator.general().function_id().raw();
    assert_eq!(
        instructions(&module, Section::ExecutionModes),
        vec![(
            Op::ExecutionMode,
            vec![function_id, EXECUTION_MODE_LOCAL_SIZE, 16, 16, 1]
        )]
    );
}

#[test]
fn kernel_must_return_void() {
    let mut b = MethodBuilder::new(MethodId::new(0), "k", Type::I32);
    let zero = b.constant(Constant::i32(0));
    b.ret(Some(zero));
    let method = b.finish();
    let resources = resources_for(&method);
    let allocas = Allocas::collect(&method);
    let entry = EntryPoint::new(method.id, "k", IndexDimension::One);
    let mut generator = ok(KernelGenerator::new(&method, &allocas, &resources, &entry));
    let mut module = SpirvBuilder::new();

    assert!(matches!(
        generator.generate_header(&mut module),
        Err(CodegenError::Unsupported(_))
    ));
    assert!(module.is_empty());
    assert!(generator.general().builder().is_empty());
    assert_eq!(generator.state(), GeneratorState::Constructed);
}
