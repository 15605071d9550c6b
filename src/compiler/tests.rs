//! End-to-end compiler tests: feed source text to [`super::compile`] and
//! inspect the emitted opcode sequence directly, per spec.md §8's worked
//! scenarios.

use pretty_assertions::assert_eq;

use super::limits;
use super::{compile, CompileOutcome};
use crate::chunk::{Chunk, OpCode};
use crate::value::{Constant, FunctionObject};

fn ok(outcome: &CompileOutcome) -> &Chunk {
    assert!(
        !outcome.had_error(),
        "expected successful compile, got diagnostics: {:?}",
        outcome.diagnostics
    );
    &outcome.function.as_ref().unwrap().chunk
}

fn opcodes(chunk: &Chunk) -> Vec<u8> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < chunk.code.len() {
        let op = OpCode::from_u8(chunk.code[i]).expect("valid opcode");
        out.push(op as u8);
        i += 1 + op.operand_size();
        if op == OpCode::Clo {
            // Skip the variable-length upvalue-pair tail: we don't know U
            // from the opcode alone, so walk it off by constant lookup.
            let const_idx = chunk.code[i - 1] as usize;
            if let Some(Constant::Function(f)) = chunk.constants.get(const_idx) {
                i += f.upvalue_count * 2;
            }
        }
    }
    out
}

fn nested_function(chunk: &Chunk) -> &FunctionObject {
    chunk
        .constants
        .iter()
        .find_map(|c| match c {
            Constant::Function(f) => Some(f.as_ref()),
            _ => None,
        })
        .expect("expected a nested function constant")
}

#[test]
fn global_var_declare_and_assign() {
    let outcome = compile("var x = 1; x = 2;");
    let chunk = ok(&outcome);
    assert_eq!(
        opcodes(chunk),
        vec![
            OpCode::Const as u8,
            OpCode::Def as u8,
            OpCode::Const as u8,
            OpCode::Gst as u8,
            OpCode::Pop as u8,
            OpCode::Null as u8,
            OpCode::Ret as u8,
        ]
    );
}

#[test]
fn block_scope_pops_locals_on_exit() {
    // A nested `{ ... }` block statement pops its locals on exit; the
    // function's own outermost scope does not (the frame is discarded
    // wholesale by RET instead, matching the enclosing call convention).
    let outcome = compile("fun f() { { var a = 1; var b = 2; } }");
    let chunk = ok(&outcome);
    let inner = nested_function(chunk);
    assert_eq!(
        opcodes(&inner.chunk),
        vec![
            OpCode::Const as u8, // a = 1
            OpCode::Const as u8, // b = 2
            OpCode::Pop as u8,   // end of block: pop b
            OpCode::Pop as u8,   // pop a
            OpCode::Null as u8,  // implicit return
            OpCode::Ret as u8,
        ]
    );
}

#[test]
fn if_without_else_has_no_trailing_pop() {
    let outcome = compile("if (true) puts 1;");
    let chunk = ok(&outcome);
    assert_eq!(
        opcodes(chunk),
        vec![
            OpCode::True as u8,
            OpCode::Jmpf as u8,
            OpCode::Pop as u8,
            OpCode::Const as u8,
            OpCode::Puts as u8,
            OpCode::Pop as u8,
            OpCode::Null as u8,
            OpCode::Ret as u8,
        ]
    );
    // No POP immediately follows the JMPF's patch target for the false
    // path — the condition's false-branch POP is intentionally omitted
    // when there is no `else` clause.
}

#[test]
fn if_with_else_pops_on_both_paths() {
    let outcome = compile("if (true) puts 1; else puts 2;");
    let chunk = ok(&outcome);
    assert_eq!(
        opcodes(chunk),
        vec![
            OpCode::True as u8,
            OpCode::Jmpf as u8,
            OpCode::Pop as u8,
            OpCode::Const as u8,
            OpCode::Puts as u8,
            OpCode::Pop as u8,
            OpCode::Jmp as u8,
            OpCode::Pop as u8,
            OpCode::Const as u8,
            OpCode::Puts as u8,
            OpCode::Pop as u8,
            OpCode::Null as u8,
            OpCode::Ret as u8,
        ]
    );
}

#[test]
fn while_loop_emits_backward_jump() {
    let outcome = compile("while (true) puts 1;");
    let chunk = ok(&outcome);
    assert_eq!(
        opcodes(chunk),
        vec![
            OpCode::True as u8,
            OpCode::Jmpf as u8,
            OpCode::Pop as u8,
            OpCode::Const as u8,
            OpCode::Puts as u8,
            OpCode::Pop as u8,
            OpCode::Loop as u8,
            OpCode::Pop as u8,
            OpCode::Null as u8,
            OpCode::Ret as u8,
        ]
    );
}

#[test]
fn function_call_emits_call_with_arg_count() {
    let outcome = compile("fun f(x) { return x; } f(3);");
    let chunk = ok(&outcome);
    assert_eq!(
        opcodes(chunk),
        vec![
            OpCode::Const as u8, // non-capturing function constant
            OpCode::Def as u8,
            OpCode::Gld as u8,
            OpCode::Const as u8,
            OpCode::Call as u8,
            OpCode::Pop as u8,
            OpCode::Null as u8,
            OpCode::Ret as u8,
        ]
    );
    let inner = nested_function(chunk);
    assert_eq!(inner.arity, 1);
    // The explicit `return x;` is followed by the unconditional implicit
    // return every function chunk gets on frame pop, unreachable but
    // always emitted (spec.md §4.2: "end compiler: emit implicit return").
    assert_eq!(
        opcodes(&inner.chunk),
        vec![
            OpCode::Ld as u8,
            OpCode::Ret as u8,
            OpCode::Null as u8,
            OpCode::Ret as u8,
        ]
    );
}

#[test]
fn single_level_closure_capture() {
    let outcome = compile("fun outer() { var a = 1; fun inner() { return a; } return inner; }");
    let chunk = ok(&outcome);
    let outer = nested_function(chunk);
    assert!(opcodes(&outer.chunk).contains(&(OpCode::Clo as u8)));

    let inner = nested_function(&outer.chunk);
    assert_eq!(inner.upvalue_count, 1);
    assert_eq!(
        opcodes(&inner.chunk),
        vec![
            OpCode::Uld as u8,
            OpCode::Ret as u8,
            OpCode::Null as u8,
            OpCode::Ret as u8,
        ]
    );
}

#[test]
fn transitive_closure_capture_through_two_frames() {
    let outcome = compile(
        "fun a() { var x = 1; \
           fun b() { \
             fun c() { return x; } \
             return c; \
           } \
           return b; \
         }",
    );
    let chunk = ok(&outcome);
    let fn_a = nested_function(chunk);
    assert!(opcodes(&fn_a.chunk).contains(&(OpCode::Clo as u8)));

    let fn_b = nested_function(&fn_a.chunk);
    assert_eq!(fn_b.upvalue_count, 1);
    assert!(opcodes(&fn_b.chunk).contains(&(OpCode::Clo as u8)));

    let fn_c = nested_function(&fn_b.chunk);
    assert_eq!(fn_c.upvalue_count, 1);
    assert_eq!(
        opcodes(&fn_c.chunk),
        vec![
            OpCode::Uld as u8,
            OpCode::Ret as u8,
            OpCode::Null as u8,
            OpCode::Ret as u8,
        ]
    );
}

#[test]
fn cannot_return_from_top_level() {
    let outcome = compile("return 1;");
    assert!(outcome.had_error());
    assert!(outcome
        .diagnostics
        .iter()
        .any(|d| d.message.contains("Cannot return from top-level code.")));
}

#[test]
fn invalid_assignment_target_is_reported() {
    let outcome = compile("1 = 2;");
    assert!(outcome.had_error());
    assert!(outcome
        .diagnostics
        .iter()
        .any(|d| d.message == "Invalid assignment target."));
}

#[test]
fn panic_mode_recovers_and_reports_multiple_errors() {
    // Two separate malformed statements, neither aborting the compile.
    let outcome = compile("var = ; var = ;");
    assert!(outcome.had_error());
    assert!(outcome.diagnostics.len() >= 2, "{:?}", outcome.diagnostics);
}

#[test]
fn unterminated_string_renders_plain_error_not_at_end() {
    // An `ERROR` token's diagnostic skips the "at ..." clause entirely — it
    // must not be confused with running off the end of the file, even
    // though this unterminated string happens to trail all the way to EOF.
    let outcome = compile("\"abc");
    assert!(outcome.had_error());
    assert_eq!(outcome.diagnostics.len(), 1, "{:?}", outcome.diagnostics);
    let rendered = outcome.diagnostics[0].to_string();
    assert!(rendered.contains("Error: Unterminated string."), "{rendered}");
    assert!(!rendered.contains("Error at end"), "{rendered}");
}

fn source_with_locals(n: usize) -> String {
    let mut source = String::from("fun f() {");
    for i in 0..n {
        source.push_str(&format!("var v{i} = 0;"));
    }
    source.push('}');
    source
}

#[test]
fn locals_at_capacity_compile_but_one_more_overflows() {
    let ok_source = source_with_locals(limits::MAX_LOCALS - 1);
    let outcome = compile(&ok_source);
    assert!(!outcome.had_error(), "{:?}", outcome.diagnostics);

    let overflow_source = source_with_locals(limits::MAX_LOCALS);
    let outcome = compile(&overflow_source);
    assert!(outcome.had_error());
    assert!(outcome
        .diagnostics
        .iter()
        .any(|d| d.message.contains("Too many local variables")));
}

fn source_with_number_constants(n: usize) -> String {
    let mut source = String::from("fun f() {");
    for i in 0..n {
        source.push_str(&format!("puts {i}.5;"));
    }
    source.push('}');
    source
}

#[test]
fn constants_at_capacity_compile_but_one_more_overflows() {
    let ok_source = source_with_number_constants(limits::MAX_CONSTANTS);
    let outcome = compile(&ok_source);
    assert!(!outcome.had_error(), "{:?}", outcome.diagnostics);

    let overflow_source = source_with_number_constants(limits::MAX_CONSTANTS + 1);
    let outcome = compile(&overflow_source);
    assert!(outcome.had_error());
    assert!(outcome
        .diagnostics
        .iter()
        .any(|d| d.message.contains("Too many constants in one chunk.")));
}

fn source_with_params(n: usize) -> String {
    let params: Vec<String> = (0..n).map(|i| format!("p{i}")).collect();
    format!("fun f({}) {{}}", params.join(","))
}

#[test]
fn params_at_capacity_compile_but_one_more_overflows() {
    let ok_source = source_with_params(limits::MAX_PARAMS);
    let outcome = compile(&ok_source);
    assert!(!outcome.had_error(), "{:?}", outcome.diagnostics);

    let overflow_source = source_with_params(limits::MAX_PARAMS + 1);
    let outcome = compile(&overflow_source);
    assert!(outcome.had_error());
    assert!(outcome
        .diagnostics
        .iter()
        .any(|d| d.message.contains("Cannot have more than 255 parameters.")));
}

fn source_with_call_args(n: usize) -> String {
    let args: Vec<String> = (0..n).map(|i| i.to_string()).collect();
    format!("f({});", args.join(","))
}

#[test]
fn args_at_capacity_compile_but_one_more_overflows() {
    let ok_source = source_with_call_args(limits::MAX_ARGS);
    let outcome = compile(&ok_source);
    assert!(!outcome.had_error(), "{:?}", outcome.diagnostics);

    let overflow_source = source_with_call_args(limits::MAX_ARGS + 1);
    let outcome = compile(&overflow_source);
    assert!(outcome.had_error());
    assert!(outcome
        .diagnostics
        .iter()
        .any(|d| d.message.contains("Cannot have more than 32 arguments.")));
}

/// `n` distinct variables captured transitively by the innermost of three
/// nested functions, split across the two enclosing frames since a single
/// frame can hold at most 255 *capturable* locals (`locals[0]` is reserved).
/// `a` declares up to 255 of them directly; `b` (nested in `a`) declares the
/// remainder; `c` (nested in `b`) reads every one, so `c`'s own upvalue
/// count is exactly `n`.
fn source_with_captured_vars(n: usize) -> String {
    let first = n.min(limits::MAX_LOCALS - 1);
    let second = n - first;
    let mut src = String::from("fun a() {");
    for i in 0..first {
        src.push_str(&format!("var v{i} = {i};"));
    }
    src.push_str("fun b() {");
    for i in 0..second {
        src.push_str(&format!("var w{i} = {i};"));
    }
    src.push_str("fun c() {");
    for i in 0..first {
        src.push_str(&format!("v{i};"));
    }
    for i in 0..second {
        src.push_str(&format!("w{i};"));
    }
    src.push_str("}}}");
    src
}

#[test]
fn upvalues_at_capacity_compile_but_one_more_overflows() {
    let ok_source = source_with_captured_vars(limits::MAX_UPVALUES);
    let outcome = compile(&ok_source);
    assert!(!outcome.had_error(), "{:?}", outcome.diagnostics);

    let overflow_source = source_with_captured_vars(limits::MAX_UPVALUES + 1);
    let outcome = compile(&overflow_source);
    assert!(outcome.had_error());
    assert!(outcome
        .diagnostics
        .iter()
        .any(|d| d.message.contains("Too many closure variables in function.")));
}
