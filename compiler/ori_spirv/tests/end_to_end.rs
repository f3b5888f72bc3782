//! End-to-end module compilation tests.
//!
//! Each test builds kernel IR with `MethodBuilder`, compiles it through
//! `Backend`, and inspects the emitted function words.

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use ori_gpu::{
    AddressSpace, BinaryOp, Constant, EntryPoint, IndexDimension, MethodBuilder, MethodId,
    Program, Type, ValueKind,
};
use ori_spirv::builder::InstructionIter;
use ori_spirv::spirv::{Op, HEADER_WORDS};
use ori_spirv::{Backend, BackendError, CodegenError, SpirvModule, SpirvOptions};
use pretty_assertions::assert_eq;

fn entry(name: &str) -> EntryPoint {
    EntryPoint::new(MethodId::new(0), name, IndexDimension::One)
}

/// Opcodes from the first `OpFunction` on.
fn function_ops(module: &SpirvModule) -> Vec<Op> {
    InstructionIter::new(&module.words()[HEADER_WORDS..])
        .filter_map(|inst| inst.op())
        .skip_while(|op| *op != Op::Function)
        .collect()
}

/// Entry block: one addition, then a branch to a block that returns.
fn two_block_kernel() -> Program {
    let mut b = MethodBuilder::new(MethodId::new(0), "two_blocks", Type::Void);
    let out = b.param(Type::pointer(Type::I32, AddressSpace::Global));
    let x = b.param(Type::I32);
    let exit = b.new_block();
    let one = b.constant(Constant::i32(1));
    let sum = b.binary(BinaryOp::Add, x, one);
    b.br(exit);
    b.position_at(exit);
    b.store(out, sum);
    b.ret(None);
    Program::new(vec![b.finish()])
}

#[test]
fn two_block_function() {
    let program = two_block_kernel();
    let module = Backend::default()
        .compile(&program, &entry("two_blocks"))
        .unwrap();

    assert_eq!(
        function_ops(&module),
        vec![
            Op::Function,
            Op::FunctionParameter,
            Op::FunctionParameter,
            Op::Label,
            Op::IAdd,
            Op::Branch,
            Op::Label,
            Op::Store,
            Op::Return,
            Op::FunctionEnd,
        ]
    );

    let insts: Vec<_> = InstructionIter::new(&module.words()[HEADER_WORDS..]).collect();
    let branch = insts.iter().find(|i| i.op() == Some(Op::Branch)).unwrap();
    let second_label = insts
        .iter()
        .filter(|i| i.op() == Some(Op::Label))
        .nth(1)
        .unwrap();
    assert_eq!(branch.operands, second_label.operands);
}

#[test]
fn compilation_is_deterministic() {
    let program = two_block_kernel();
    let backend = Backend::default();
    let first = backend.compile(&program, &entry("two_blocks")).unwrap();
    let second = backend.compile(&program, &entry("two_blocks")).unwrap();
    assert_eq!(first.to_bytes(), second.to_bytes());
}

#[test]
fn unsupported_value_fails_the_whole_module() {
    let mut b = MethodBuilder::new(MethodId::new(0), "asm", Type::Void);
    b.emit(
        Type::Void,
        ValueKind::InlineAsm {
            template: "s_nop 0".to_owned(),
            args: vec![],
        },
    );
    b.ret(None);
    let program = Program::new(vec![b.finish()]);

    let err = Backend::default()
        .compile(&program, &entry("asm"))
        .unwrap_err();
    assert!(matches!(
        err.codegen_error(),
        Some(CodegenError::Unsupported(what)) if what == "inline assembly"
    ));
    assert!(err.to_string().contains("asm"));
}

#[test]
fn single_block_method() {
    let mut b = MethodBuilder::new(MethodId::new(0), "noop", Type::Void);
    b.ret(None);
    let program = Program::new(vec![b.finish()]);
    let module = Backend::default().compile(&program, &entry("noop")).unwrap();
    assert_eq!(
        function_ops(&module),
        vec![Op::Function, Op::Label, Op::Return, Op::FunctionEnd]
    );
}

#[test]
fn unreachable_blocks_are_still_emitted() {
    let mut b = MethodBuilder::new(MethodId::new(0), "dead_code", Type::Void);
    let dead = b.new_block();
    let live = b.new_block();
    b.br(live);
    b.position_at(dead);
    b.br(live);
    b.position_at(live);
    b.ret(None);
    let program = Program::new(vec![b.finish()]);
    let module = Backend::default()
        .compile(&program, &entry("dead_code"))
        .unwrap();
    assert_eq!(
        function_ops(&module),
        vec![
            Op::Function,
            Op::Label,
            Op::Branch,
            Op::Label,
            Op::Branch,
            Op::Label,
            Op::Return,
            Op::FunctionEnd,
        ]
    );
}

#[test]
fn every_method_is_merged_exactly_once() {
    let mut methods = Vec::new();
    for raw in 0..4 {
        let mut b = MethodBuilder::new(MethodId::new(raw), format!("m{raw}"), Type::Void);
        b.ret(None);
        methods.push(b.finish());
    }
    let program = Program::new(methods);
    let module = Backend::default().compile(&program, &entry("m0")).unwrap();
    let ops = function_ops(&module);
    assert_eq!(ops.iter().filter(|op| **op == Op::Function).count(), 4);
    assert_eq!(ops.iter().filter(|op| **op == Op::FunctionEnd).count(), 4);
}

#[test]
fn parallel_generation_matches_sequential_bodies() {
    let mut methods = Vec::new();
    for raw in 0..16 {
        let mut b = MethodBuilder::new(MethodId::new(raw), format!("f{raw}"), Type::I64);
        let x = b.param(Type::I64);
        let y = b.binary(BinaryOp::Mul, x, x);
        b.ret(Some(y));
        methods.push(b.finish());
    }
    let mut kernel = MethodBuilder::new(MethodId::new(16), "main", Type::Void);
    kernel.ret(None);
    methods.push(kernel.finish());
    let program = Program::new(methods);
    let entry = EntryPoint::new(MethodId::new(16), "main", IndexDimension::One);

    let sequential = Backend::default().compile(&program, &entry).unwrap();
    let parallel = Backend::new(SpirvOptions::default().with_parallel(true))
        .compile(&program, &entry)
        .unwrap();
    assert_eq!(function_ops(&sequential), function_ops(&parallel));
    assert_eq!(sequential.bound(), parallel.bound());
    // Every type these bodies use is declared while emitting headers.
    assert_eq!(sequential.to_bytes(), parallel.to_bytes());
}

#[test]
fn kernel_returning_a_value_is_rejected() {
    let mut b = MethodBuilder::new(MethodId::new(0), "bad", Type::I32);
    let zero = b.constant(Constant::i32(0));
    b.ret(Some(zero));
    let program = Program::new(vec![b.finish()]);
    let err = Backend::default().compile(&program, &entry("bad")).unwrap_err();
    assert!(matches!(err, BackendError::Codegen { ref method, .. } if method == "bad"));
}
