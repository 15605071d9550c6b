//! Declaration and statement drivers (spec.md §4.4's grammar-level
//! productions, as opposed to rules.rs's expression-level Pratt rules).
//!
//! Grounded in `parser/core.rs`'s `declaration`/`statement` dispatch shape.
//! The `if` statement's no-pop-on-the-false-path shape (see
//! `if_statement` below) is preserved exactly as spec.md §4.4/§8 describe
//! it rather than "fixed" to pop symmetrically on both branches — recorded
//! as a deliberate Open Question resolution in `DESIGN.md`.

use crate::chunk::OpCode;
use crate::lexer::TokenKind;

use super::frame::FrameKind;
use super::limits::MAX_ARGS;
use super::rules::{expression, function_body};
use super::ParserState;

pub(super) fn declaration(state: &mut ParserState) {
    if state.match_kind(&TokenKind::Fun) {
        function_declaration(state);
    } else if state.match_kind(&TokenKind::Var) {
        var_declaration(state);
    } else if state.match_kind(&TokenKind::Global) {
        global_declaration(state);
    } else {
        statement(state);
    }
    state.synchronize();
}

fn function_declaration(state: &mut ParserState) {
    let global = state.parse_variable("Expect function name.");
    state.mark_initialized();
    let name = match &state.previous.kind {
        TokenKind::Identifier(name) => name.clone(),
        _ => String::new(),
    };
    let name_rc = state.heap.intern_string(&name);
    function_body(state, name_rc);
    state.define_variable(global);
}

fn var_declaration(state: &mut ParserState) {
    let global = state.parse_variable("Expect variable name.");
    if state.match_kind(&TokenKind::Equal) {
        expression(state);
    } else {
        state.emit_byte(OpCode::Null);
    }
    state.consume(&TokenKind::Semicolon, "Expect ';' after variable declaration.");
    state.define_variable(global);
}

/// `global name [= expr] (, name [= expr])* ;` always binds at VM-global
/// scope, regardless of the current lexical nesting (spec.md §4.4).
fn global_declaration(state: &mut ParserState) {
    loop {
        let name = state.consume_identifier("Expect global name.");
        let name_const = state.intern_name_constant(&name);
        if state.match_kind(&TokenKind::Equal) {
            expression(state);
        } else {
            state.emit_byte(OpCode::Null);
        }
        state.emit_bytes(OpCode::Def, name_const);
        if !state.match_kind(&TokenKind::Comma) {
            break;
        }
    }
    state.consume(&TokenKind::Semicolon, "Expect ';' after global declaration.");
}

fn statement(state: &mut ParserState) {
    if state.match_kind(&TokenKind::Puts) {
        puts_statement(state);
    } else if state.match_kind(&TokenKind::If) {
        if_statement(state);
    } else if state.match_kind(&TokenKind::Return) {
        return_statement(state);
    } else if state.match_kind(&TokenKind::While) {
        while_statement(state);
    } else if state.match_kind(&TokenKind::LeftBrace) {
        state.begin_scope();
        block(state);
        state.end_scope();
    } else {
        expression_statement(state);
    }
}

pub(super) fn block(state: &mut ParserState) {
    while !state.check(&TokenKind::RightBrace) && !state.at_end() {
        declaration(state);
    }
    state.consume(&TokenKind::RightBrace, "Expect '}' after block.");
}

/// `puts expr (, expr)* ;`: emit `PUTS n`, then pop each printed value
/// (spec.md §4.4, §8 scenario 3).
fn puts_statement(state: &mut ParserState) {
    let mut count: usize = 0;
    loop {
        expression(state);
        if count >= MAX_ARGS {
            state.error_at_previous(format!("Cannot have more than {MAX_ARGS} arguments."));
        }
        count += 1;
        if !state.match_kind(&TokenKind::Comma) {
            break;
        }
    }
    state.consume(&TokenKind::Semicolon, "Expect ';' after value.");
    state.emit_bytes(OpCode::Puts, count.min(u8::MAX as usize) as u8);
    for _ in 0..count {
        state.emit_byte(OpCode::Pop);
    }
}

/// `if (cond) [then] stmt [else stmt]`. Preserves the contract's asymmetric
/// shape: when there is no `else` clause, the false path falls straight to
/// the merge point without a balancing `POP` of the condition (spec.md §8
/// scenario 3's worked byte sequence has no trailing `POP` after the jump
/// target when `else` is absent).
fn if_statement(state: &mut ParserState) {
    let has_paren = state.match_kind(&TokenKind::LeftParen);
    expression(state);
    if has_paren {
        state.consume(&TokenKind::RightParen, "Expect ')' after condition.");
    }
    state.match_kind(&TokenKind::Then);

    let then_jump = state.emit_jump(OpCode::Jmpf);
    state.emit_byte(OpCode::Pop);
    statement(state);

    if state.match_kind(&TokenKind::Else) {
        let else_jump = state.emit_jump(OpCode::Jmp);
        state.patch_jump(then_jump);
        state.emit_byte(OpCode::Pop);
        statement(state);
        state.patch_jump(else_jump);
    } else {
        state.patch_jump(then_jump);
    }
}

/// `while (cond) stmt`: classic structured loop (spec.md §4.4).
fn while_statement(state: &mut ParserState) {
    let loop_start = state.current_offset();
    let has_paren = state.match_kind(&TokenKind::LeftParen);
    expression(state);
    if has_paren {
        state.consume(&TokenKind::RightParen, "Expect ')' after condition.");
    }
    let exit_jump = state.emit_jump(OpCode::Jmpf);
    state.emit_byte(OpCode::Pop);
    statement(state);
    state.emit_loop(loop_start);
    state.patch_jump(exit_jump);
    state.emit_byte(OpCode::Pop);
}

fn return_statement(state: &mut ParserState) {
    if state.frame.kind == FrameKind::Script {
        state.error_at_previous("Cannot return from top-level code.".to_string());
    }
    if state.match_kind(&TokenKind::Semicolon) {
        state.emit_return();
    } else {
        expression(state);
        state.consume(&TokenKind::Semicolon, "Expect ';' after return value.");
        state.emit_byte(OpCode::Ret);
    }
}

fn expression_statement(state: &mut ParserState) {
    expression(state);
    state.consume(&TokenKind::Semicolon, "Expect ';' after expression.");
    state.emit_byte(OpCode::Pop);
}
