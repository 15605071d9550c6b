//! The Pratt parser (spec.md §4.4): `parse_precedence` plus every
//! prefix/infix handler, fused directly with emission — there is no
//! intermediate expression tree.
//!
//! Grounded in `parser/core.rs`'s rule-table dispatch shape, with the rule
//! table itself trimmed to spec.md's token set (no brackets, no
//! interpolation, no pipeline/spread/range — this language has none of
//! those).

use std::rc::Rc;

use crate::chunk::OpCode;
use crate::lexer::TokenKind;
use crate::value::Constant;

use super::frame::FrameKind;
use super::limits::MAX_ARGS;
use super::precedence::Precedence;
use super::ParserState;

type PrefixFn = fn(&mut ParserState, bool);
type InfixFn = fn(&mut ParserState, bool);

struct ParseRule {
    prefix: Option<PrefixFn>,
    infix: Option<InfixFn>,
    precedence: Precedence,
}

const fn rule(prefix: Option<PrefixFn>, infix: Option<InfixFn>, precedence: Precedence) -> ParseRule {
    ParseRule { prefix, infix, precedence }
}

fn get_rule(kind: &TokenKind) -> ParseRule {
    match kind {
        TokenKind::LeftParen => rule(Some(grouping), Some(call), Precedence::Call),
        TokenKind::Minus => rule(Some(unary), Some(binary), Precedence::Term),
        TokenKind::Plus => rule(None, Some(binary), Precedence::Term),
        TokenKind::Slash => rule(None, Some(binary), Precedence::Factor),
        TokenKind::Star => rule(None, Some(binary), Precedence::Factor),
        TokenKind::Bang => rule(Some(unary), None, Precedence::None),
        TokenKind::BangEqual => rule(None, Some(binary), Precedence::Equality),
        TokenKind::EqualEqual => rule(None, Some(binary), Precedence::Equality),
        TokenKind::Greater => rule(None, Some(binary), Precedence::Comparison),
        TokenKind::GreaterEqual => rule(None, Some(binary), Precedence::Comparison),
        TokenKind::Less => rule(None, Some(binary), Precedence::Comparison),
        TokenKind::LessEqual => rule(None, Some(binary), Precedence::Comparison),
        TokenKind::Identifier(_) => rule(Some(variable), None, Precedence::None),
        TokenKind::Str(_) => rule(Some(string_literal), None, Precedence::None),
        TokenKind::Number(_) => rule(Some(number_literal), None, Precedence::None),
        TokenKind::Integer(_) | TokenKind::Hexadecimal(_) => {
            rule(Some(integer_literal), None, Precedence::None)
        }
        TokenKind::True | TokenKind::False | TokenKind::Null | TokenKind::Fun => {
            rule(Some(literal_keyword), None, Precedence::None)
        }
        TokenKind::And => rule(None, Some(and_), Precedence::And),
        TokenKind::Or => rule(None, Some(or_), Precedence::Or),
        _ => rule(None, None, Precedence::None),
    }
}

/// `expression`: parse at `ASSIGNMENT`, the lowest real precedence.
pub(super) fn expression(state: &mut ParserState) {
    parse_precedence(state, Precedence::Assignment);
}

/// `parsePrecedence(minPrec)`: the Pratt loop itself.
fn parse_precedence(state: &mut ParserState, min_prec: Precedence) {
    state.advance();
    let prefix = get_rule(&state.previous.kind).prefix;
    let Some(prefix) = prefix else {
        state.error_at_previous("Expect expression.".to_string());
        return;
    };
    let can_assign = min_prec <= Precedence::Assignment;
    prefix(state, can_assign);

    while min_prec <= get_rule(&state.current.kind).precedence {
        state.advance();
        let infix = get_rule(&state.previous.kind)
            .infix
            .expect("precedence table guarantees an infix handler here");
        infix(state, can_assign);
    }

    if can_assign && state.match_kind(&TokenKind::Equal) {
        state.error_at_previous("Invalid assignment target.".to_string());
    }
}

fn number_literal(state: &mut ParserState, _can_assign: bool) {
    let text = match &state.previous.kind {
        TokenKind::Number(text) => text.clone(),
        _ => unreachable!("number_literal only invoked on a Number token"),
    };
    let value: f64 = text.parse().unwrap_or(0.0);
    state.emit_constant(Constant::Number(value));
}

fn integer_literal(state: &mut ParserState, _can_assign: bool) {
    let value = match &state.previous.kind {
        TokenKind::Integer(text) => i64::from_str_radix(text, 10).unwrap_or(0),
        TokenKind::Hexadecimal(text) => i64::from_str_radix(text, 16).unwrap_or(0),
        _ => unreachable!("integer_literal only invoked on an Integer/Hexadecimal token"),
    };
    state.emit_constant(Constant::Integer(value));
}

fn string_literal(state: &mut ParserState, _can_assign: bool) {
    let text = match &state.previous.kind {
        TokenKind::Str(text) => text.clone(),
        _ => unreachable!("string_literal only invoked on a Str token"),
    };
    let rc = state.heap.intern_string(&text);
    state.emit_constant(Constant::Str(rc));
}

fn literal_keyword(state: &mut ParserState, _can_assign: bool) {
    match state.previous.kind {
        TokenKind::True => {
            state.emit_byte(OpCode::True);
        }
        TokenKind::False => {
            state.emit_byte(OpCode::False);
        }
        TokenKind::Null => {
            state.emit_byte(OpCode::Null);
        }
        TokenKind::Fun => {
            state.emit_byte(OpCode::SelfRef);
        }
        _ => unreachable!("literal_keyword only invoked on True/False/Null/Fun"),
    }
}

fn grouping(state: &mut ParserState, _can_assign: bool) {
    expression(state);
    state.consume(&TokenKind::RightParen, "Expect ')' after expression.");
}

fn unary(state: &mut ParserState, _can_assign: bool) {
    let operator = state.previous.kind.clone();
    parse_precedence(state, Precedence::Unary);
    match operator {
        TokenKind::Minus => {
            state.emit_byte(OpCode::Neg);
        }
        TokenKind::Bang => {
            state.emit_byte(OpCode::Not);
        }
        _ => unreachable!("unary only invoked on Minus/Bang"),
    }
}

fn binary(state: &mut ParserState, _can_assign: bool) {
    let operator = state.previous.kind.clone();
    let rule = get_rule(&operator);
    parse_precedence(state, rule.precedence.next());
    match operator {
        TokenKind::Plus => {
            state.emit_byte(OpCode::Add);
        }
        TokenKind::Minus => {
            state.emit_byte(OpCode::Sub);
        }
        TokenKind::Star => {
            state.emit_byte(OpCode::Mul);
        }
        TokenKind::Slash => {
            state.emit_byte(OpCode::Div);
        }
        TokenKind::EqualEqual => {
            state.emit_byte(OpCode::Eq);
        }
        TokenKind::BangEqual => {
            state.emit_byte(OpCode::Eq);
            state.emit_byte(OpCode::Not);
        }
        TokenKind::Less => {
            state.emit_byte(OpCode::Lt);
        }
        TokenKind::LessEqual => {
            state.emit_byte(OpCode::Le);
        }
        TokenKind::Greater => {
            state.emit_byte(OpCode::Le);
            state.emit_byte(OpCode::Not);
        }
        TokenKind::GreaterEqual => {
            state.emit_byte(OpCode::Lt);
            state.emit_byte(OpCode::Not);
        }
        _ => unreachable!("binary only invoked on arithmetic/comparison operators"),
    }
}

/// Short-circuiting `and`: mirror of `or_` below.
fn and_(state: &mut ParserState, _can_assign: bool) {
    let end_jump = state.emit_jump(OpCode::Jmpf);
    state.emit_byte(OpCode::Pop);
    parse_precedence(state, Precedence::And);
    state.patch_jump(end_jump);
}

/// Short-circuiting `or`: `JMPF` past a `JMP` that skips straight to the
/// right operand when the left was truthy; otherwise fall through, pop the
/// falsy left value, and evaluate the right operand (spec.md §4.4).
fn or_(state: &mut ParserState, _can_assign: bool) {
    let else_jump = state.emit_jump(OpCode::Jmpf);
    let end_jump = state.emit_jump(OpCode::Jmp);

    state.patch_jump(else_jump);
    state.emit_byte(OpCode::Pop);

    parse_precedence(state, Precedence::Or);
    state.patch_jump(end_jump);
}

fn call(state: &mut ParserState, _can_assign: bool) {
    let count = argument_list(state);
    state.emit_bytes(OpCode::Call, count);
}

fn argument_list(state: &mut ParserState) -> u8 {
    let mut count: usize = 0;
    if !state.check(&TokenKind::RightParen) {
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
    }
    state.consume(&TokenKind::RightParen, "Expect ')' after arguments.");
    count.min(u8::MAX as usize) as u8
}

fn variable(state: &mut ParserState, can_assign: bool) {
    let name = match &state.previous.kind {
        TokenKind::Identifier(name) => name.clone(),
        _ => unreachable!("variable only invoked on an Identifier token"),
    };
    let access = state.resolve_variable(&name);
    if can_assign && state.match_kind(&TokenKind::Equal) {
        expression(state);
        state.emit_set(access);
    } else {
        state.emit_get(access);
    }
}

// ---- Function declarations (shared by decl.rs) ----

/// Parses a `fun name(params) { body }` after the name has already been
/// consumed via `parse_variable`, pushing a child compiler frame and wiring
/// the finished closure into the *enclosing* chunk on return.
pub(super) fn function_body(state: &mut ParserState, name: Rc<str>) {
    state.push_function_frame(FrameKind::Function, Some(name));
    state.begin_scope();

    state.consume(&TokenKind::LeftParen, "Expect '(' after function name.");
    if !state.check(&TokenKind::RightParen) {
        loop {
            if state.frame.function.arity as usize >= super::limits::MAX_PARAMS {
                state.error_at_current("Cannot have more than 255 parameters.".to_string());
            }
            state.frame.function.arity = state.frame.function.arity.saturating_add(1);
            let param_const = state.parse_variable("Expect parameter name.");
            state.define_variable(param_const);
            if !state.match_kind(&TokenKind::Comma) {
                break;
            }
        }
    }
    state.consume(&TokenKind::RightParen, "Expect ')' after parameters.");
    state.consume(&TokenKind::LeftBrace, "Expect '{' before function body.");
    super::decl::block(state);

    let (function, upvalues) = state.pop_function_frame();
    let const_idx = state.add_constant(Constant::Function(Rc::new(function)));
    if upvalues.is_empty() {
        state.emit_bytes(OpCode::Const, const_idx);
    } else {
        state.emit_bytes(OpCode::Clo, const_idx);
        for uv in &upvalues {
            state.emit_raw_byte(if uv.is_local { 1 } else { 0 });
            state.emit_raw_byte(uv.index);
        }
    }
}
