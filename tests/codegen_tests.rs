use inkwell::context::Context;
use inkwell::targets::{InitializationConfig, Target};
use inkwell::values::InstructionOpcode;
use inkwell::OptimizationLevel;

use emberc::codegen::CodeGen;
use emberc::Compiler;

fn compile<'ctx>(context: &'ctx Context, source: &str) -> CodeGen<'ctx> {
    let module = Compiler::new()
        .compile_source(source)
        .expect("front end should succeed");
    let mut codegen = CodeGen::new(context, "test");
    codegen.generate(&module).expect("codegen should succeed");
    codegen
}

/// Compile, JIT, and run `main`, returning its exit value.
fn run_main(source: &str) -> i32 {
    Target::initialize_native(&InitializationConfig::default())
        .expect("native target should initialize");
    let context = Context::create();
    let codegen = compile(&context, source);
    let engine = codegen
        .module()
        .create_jit_execution_engine(OptimizationLevel::None)
        .expect("jit engine should build");
    unsafe {
        let main = engine
            .get_function::<unsafe extern "C" fn() -> i32>("main")
            .expect("main should be jit-compiled");
        main.call()
    }
}

fn assert_structural_invariants(codegen: &CodeGen) {
    let mut function = codegen.module().get_first_function();
    while let Some(current) = function {
        let blocks = current.get_basic_blocks();
        for (index, block) in blocks.iter().enumerate() {
            // Every block ends in exactly one terminator.
            assert!(
                block.get_terminator().is_some(),
                "block without terminator in '{:?}'",
                current.get_name()
            );

            // Allocas live only in the entry block.
            if index > 0 {
                let mut instruction = block.get_first_instruction();
                while let Some(current_instruction) = instruction {
                    assert_ne!(
                        current_instruction.get_opcode(),
                        InstructionOpcode::Alloca,
                        "alloca outside the entry block in '{:?}'",
                        current.get_name()
                    );
                    instruction = current_instruction.get_next_instruction();
                }
            }
        }
        function = current.get_next_function();
    }
}

#[test]
fn arithmetic_and_return() {
    let source = "fn main() -> i32 { let x: i32 = 42; let y: i32 = x + 8; return y; }";
    assert_eq!(run_main(source), 50);
}

#[test]
fn for_range_sum() {
    let source = "fn main() -> i32 {\n\
                      let mut sum: i32 = 0;\n\
                      for i in 0..10 { sum = sum + i; }\n\
                      return sum;\n\
                  }";
    assert_eq!(run_main(source), 45);
}

#[test]
fn struct_and_field_arithmetic() {
    let source = "struct Point { pub x: i32, pub y: i32 }\n\
                  fn main() -> i32 { let p = Point { x: 3, y: 4 }; return p.x * p.x + p.y * p.y; }";
    assert_eq!(run_main(source), 25);
}

#[test]
fn mutable_parameter() {
    let source = "fn inc(mut x: i32) -> i32 { x = x + 1; return x; }\n\
                  fn main() -> i32 { return inc(41); }";
    assert_eq!(run_main(source), 42);
}

#[test]
fn match_inside_loop_verifies_and_runs() {
    let source = "fn main() -> i32 {\n\
                      let mut acc: i32 = 0;\n\
                      for i in 0..5 {\n\
                          acc = acc + match i { 0 => 10, 1 => 20, _ => 0 };\n\
                      }\n\
                      return acc;\n\
                  }";
    assert_eq!(run_main(source), 30);

    // The regression fix: the match result slot must be an entry-block
    // alloca, not a fresh one per iteration.
    let context = Context::create();
    let codegen = compile(&context, source);
    assert_structural_invariants(&codegen);
}

#[test]
fn while_with_mutation() {
    let source = "fn main() -> i32 { let mut n: i32 = 0; while n < 7 { n = n + 1; } return n; }";
    assert_eq!(run_main(source), 7);
}

#[test]
fn immutable_let_stays_in_ssa_form() {
    let context = Context::create();
    let codegen = compile(
        &context,
        "fn main() -> i32 { let x: i32 = 1; let y: i32 = x + 2; return y; }",
    );
    let ir = codegen.print_ir();
    assert!(!ir.contains("alloca"), "unexpected alloca in:\n{ir}");
}

#[test]
fn mutable_let_lowers_to_one_alloca_and_assignment_to_a_store() {
    let context = Context::create();
    let codegen = compile(
        &context,
        "fn main() -> i32 { let x: i32 = 1; let mut y: i32 = 2; y = x; return y; }",
    );
    let ir = codegen.print_ir();
    assert_eq!(
        ir.matches("alloca").count(),
        1,
        "expected exactly one alloca in:\n{ir}"
    );
    // Initial store plus the assignment.
    assert_eq!(
        ir.matches("store").count(),
        2,
        "expected two stores in:\n{ir}"
    );
}

#[test]
fn if_else_values_merge_through_a_phi() {
    let context = Context::create();
    let codegen = compile(
        &context,
        "fn main() -> i32 { let x: i32 = if 1 < 2 { 10 } else { 20 }; return x; }",
    );
    let ir = codegen.print_ir();
    assert!(ir.contains("phi"), "expected a phi node in:\n{ir}");
    assert_structural_invariants(&codegen);
}

#[test]
fn if_with_both_branches_returning_discards_the_merge_block() {
    let context = Context::create();
    let codegen = compile(
        &context,
        "fn main() -> i32 { if 1 < 2 { return 1; } else { return 2; } }",
    );
    let ir = codegen.print_ir();
    assert!(!ir.contains("ifcont"), "unexpected merge block in:\n{ir}");
    assert_structural_invariants(&codegen);
}

#[test]
fn every_scenario_keeps_allocas_in_the_entry_block() {
    let sources = [
        "fn main() -> i32 { let mut sum: i32 = 0; for i in 0..10 { sum = sum + i; } return sum; }",
        "fn main() -> i32 { let mut n: i32 = 0; while n < 7 { n = n + 1; } return n; }",
        "fn main() -> i32 {\n\
             let mut acc: i32 = 0;\n\
             for i in 0..5 { acc = acc + match i { 0 => 10, 1 => 20, _ => 0 }; }\n\
             return acc;\n\
         }",
        "fn main() -> i32 { for i in 0..3 { let mut inner: i32 = i; inner = inner + 1; } return 0; }",
    ];
    for source in sources {
        let context = Context::create();
        let codegen = compile(&context, source);
        assert_structural_invariants(&codegen);
    }
}

#[test]
fn break_and_continue_lower_to_loop_branches() {
    let source = "fn main() -> i32 {\n\
                      let mut total: i32 = 0;\n\
                      for i in 0..10 {\n\
                          if i == 3 { continue; }\n\
                          if i == 6 { break; }\n\
                          total = total + i;\n\
                      }\n\
                      return total;\n\
                  }";
    // 0+1+2+4+5 = 12; i == 3 is skipped and 6 stops the loop.
    assert_eq!(run_main(source), 12);

    let context = Context::create();
    let codegen = compile(&context, source);
    assert_structural_invariants(&codegen);
}

#[test]
fn inclusive_range_for_loop() {
    let source = "fn main() -> i32 { let mut sum: i32 = 0; for i in 0..=4 { sum = sum + i; } return sum; }";
    assert_eq!(run_main(source), 10);
}

#[test]
fn logical_operators_lower_bitwise_on_i1() {
    let source =
        "fn main() -> i32 { if 1 < 2 && 3 < 4 { return 1; } else { return 0; } }";
    assert_eq!(run_main(source), 1);
}

#[test]
fn match_guard_falls_through_to_later_arms() {
    let source = "fn check(n: i32) -> i32 { return match n { x if x > 10 => 100, 0..=10 => 50, _ => 0 }; }\n\
                  fn main() -> i32 { return check(11) + check(5); }";
    assert_eq!(run_main(source), 150);
}

#[test]
fn nested_function_calls() {
    let source = "fn double(x: i32) -> i32 { return x * 2; }\n\
                  fn main() -> i32 { return double(double(10)); }";
    assert_eq!(run_main(source), 40);
}

#[test]
fn cast_between_integer_widths() {
    let source = "fn main() -> i32 { let x: i32 = 300; return (x as i8) as i32; }";
    // 300 truncates to 44 in i8 and sign-extends back.
    assert_eq!(run_main(source), 44);
}

#[test]
fn unsuffixed_integer_literals_default_to_i32() {
    let context = Context::create();
    let codegen = compile(&context, "fn main() -> i32 { return 7; }");
    let ir = codegen.print_ir();
    assert!(ir.contains("ret i32 7"), "unexpected return in:\n{ir}");
}

#[test]
fn struct_type_is_registered_by_name() {
    let context = Context::create();
    let codegen = compile(
        &context,
        "struct Pair { a: i32, b: i64 }\n\
         fn main() -> i32 { let p = Pair { a: 1, b: 2 }; return p.a; }",
    );
    let ir = codegen.print_ir();
    assert!(
        ir.contains("%Pair = type { i32, i64 }"),
        "missing struct type in:\n{ir}"
    );
}
