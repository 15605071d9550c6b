//! The single-pass bytecode compiler (spec.md). Four cooperating pieces,
//! leaves-first: the token cursor and chunk emitter live as methods right
//! on [`ParserState`] below (spec.md §4.1/§4.2); the scope/upvalue resolver
//! is [`frame`]; the Pratt expression parser is [`rules`]; the
//! declaration/statement drivers are [`decl`].
//!
//! Grounded in the teacher's `vm/compiler.rs` for the frame shape and
//! `parser/core.rs` for the cursor primitives — see `DESIGN.md` for the
//! file-by-file ledger.

pub mod frame;
pub mod limits;
pub mod precedence;

mod decl;
mod rules;

#[cfg(test)]
mod tests;

use std::rc::Rc;

use crate::chunk::{Chunk, JumpPatch, OpCode};
use crate::diagnostic::{Diagnostic, DiagnosticBag, DiagnosticKind, DiagnosticLocation};
use crate::lexer::{Scanner, Token, TokenKind};
use crate::span::Span;
use crate::value::{Constant, FunctionObject, Heap};

use frame::{resolve_upvalue, CompilerFrame, FrameKind, Local, ResolveOutcome};
use precedence::Precedence;

/// The compiler's public surface (spec.md §6.3): `compile` never panics and
/// never aborts on a diagnostic — it runs to EOF and suppresses the
/// function object from the result iff any error was reported.
pub struct CompileOutcome {
    pub function: Option<Rc<FunctionObject>>,
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileOutcome {
    pub fn had_error(&self) -> bool {
        self.function.is_none()
    }
}

/// How a resolved variable reference is read/written at runtime (spec.md
/// §4.4's "variable reference" production: resolves to one of three
/// `(getOp, setOp)` pairs).
#[derive(Debug, Clone, Copy)]
pub enum VariableAccess {
    Local(u8),
    Upvalue(u8),
    /// Constant-pool index of the interned name.
    Global(u8),
}

/// Parser state, singleton for the duration of one `compile` call (spec.md
/// §3). Owns the token cursor (two-token sliding window), the active
/// compiler frame stack (via `frame`'s `enclosing` chain), the VM allocator
/// stand-in, and the diagnostic sink.
pub struct ParserState {
    tokens: Vec<Token>,
    pos: usize,
    current: Token,
    previous: Token,
    had_error: bool,
    panic_mode: bool,
    diagnostics: DiagnosticBag,
    heap: Heap,
    frame: Box<CompilerFrame>,
}

/// `compile(vm, source) -> Function | null` (spec.md §6.3).
pub fn compile(source: &str) -> CompileOutcome {
    let mut state = ParserState::new(source);
    state.advance();
    while !state.at_end() {
        state.declaration();
    }
    state.emit_return();

    if state.had_error {
        CompileOutcome {
            function: None,
            diagnostics: state.diagnostics.into_vec(),
        }
    } else {
        let mut root = *state.frame;
        root.function.upvalue_count = root.upvalues.len();
        CompileOutcome {
            function: Some(Rc::new(root.function)),
            diagnostics: state.diagnostics.into_vec(),
        }
    }
}

/// `markCompilerRoots(vm)` (spec.md §5, §6.2): visits every function still
/// under construction, innermost frame first, by walking `enclosing`.
/// There is no tracing GC behind this (Non-goal) — the hook's contract
/// (visit every in-progress function) is exercised directly in tests
/// instead of by a real collector.
pub fn mark_compiler_roots(frame: &CompilerFrame, visit: &mut dyn FnMut(&FunctionObject)) {
    visit(&frame.function);
    if let Some(enclosing) = &frame.enclosing {
        mark_compiler_roots(enclosing, visit);
    }
}

impl ParserState {
    fn new(source: &str) -> Self {
        let mut scanner = Scanner::new(source);
        let mut tokens = Vec::new();
        loop {
            let tok = scanner.scan_token();
            let is_eof = tok.is_eof();
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        let dummy = Token::new(TokenKind::Eof, Span::new(1, 1));
        Self {
            tokens,
            pos: 0,
            current: dummy.clone(),
            previous: dummy,
            had_error: false,
            panic_mode: false,
            diagnostics: DiagnosticBag::new(),
            heap: Heap::new(),
            frame: Box::new(CompilerFrame::new(FrameKind::Script, None)),
        }
    }

    // ---- 4.1 Token Cursor ----

    /// Move `previous <- current`, pulling tokens until a non-`Error` token
    /// arrives; every skipped `Error` token raises a lexical diagnostic.
    fn advance(&mut self) {
        self.previous = self.current.clone();
        loop {
            if self.pos >= self.tokens.len() {
                self.current = Token::new(TokenKind::Eof, self.previous.span);
                break;
            }
            let tok = self.tokens[self.pos].clone();
            self.pos += 1;
            if let TokenKind::Error(msg) = tok.kind.clone() {
                self.report(tok.span, &TokenKind::Error(msg.clone()), msg, DiagnosticKind::Lexical);
                continue;
            }
            self.current = tok;
            break;
        }
    }

    fn at_end(&self) -> bool {
        self.current.is_eof()
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current.kind) == std::mem::discriminant(kind)
    }

    fn check_identifier(&self) -> bool {
        matches!(self.current.kind, TokenKind::Identifier(_))
    }

    fn match_kind(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, kind: &TokenKind, message: &str) {
        if self.check(kind) {
            self.advance();
        } else {
            self.error_at_current(message.to_string());
        }
    }

    fn consume_identifier(&mut self, message: &str) -> String {
        if self.check_identifier() {
            self.advance();
        } else {
            self.error_at_current(message.to_string());
        }
        match &self.previous.kind {
            TokenKind::Identifier(name) => name.clone(),
            _ => String::new(),
        }
    }

    // ---- 4.6 Error handling ----

    fn report(&mut self, span: Span, kind: &TokenKind, message: String, diag_kind: DiagnosticKind) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        self.had_error = true;
        let location = match kind {
            TokenKind::Eof => DiagnosticLocation::End,
            TokenKind::Error(_) => DiagnosticLocation::ErrorToken,
            other => DiagnosticLocation::Lexeme(other.lexeme_text()),
        };
        self.diagnostics
            .report(Diagnostic::new(diag_kind, span, message, location));
    }

    fn error_at_current(&mut self, message: String) {
        let span = self.current.span;
        let kind = self.current.kind.clone();
        self.report(span, &kind, message, DiagnosticKind::Syntactic);
    }

    fn error_at_previous(&mut self, message: String) {
        let span = self.previous.span;
        let kind = self.previous.kind.clone();
        self.report(span, &kind, message, DiagnosticKind::Semantic);
    }

    /// `synchronize` is idempotent: a call while not already panicking is a
    /// no-op that does not advance (spec.md §8's round-trip property).
    fn synchronize(&mut self) {
        if !self.panic_mode {
            return;
        }
        self.panic_mode = false;

        while !self.at_end() {
            if self.previous.kind == TokenKind::Semicolon {
                return;
            }
            match self.current.kind {
                TokenKind::Class
                | TokenKind::Fun
                | TokenKind::For
                | TokenKind::Global
                | TokenKind::If
                | TokenKind::Puts
                | TokenKind::Return
                | TokenKind::Var
                | TokenKind::While => return,
                _ => self.advance(),
            }
        }
    }

    // ---- 4.2 Chunk Emitter ----

    fn chunk(&mut self) -> &mut Chunk {
        &mut self.frame.function.chunk
    }

    fn line(&self) -> Span {
        self.previous.span
    }

    fn emit_byte(&mut self, op: OpCode) -> usize {
        let span = self.line();
        self.chunk().emit_byte(op, span)
    }

    fn emit_bytes(&mut self, op: OpCode, operand: u8) -> usize {
        let span = self.line();
        self.chunk().emit_bytes(op, operand, span)
    }

    fn emit_raw_byte(&mut self, byte: u8) {
        let span = self.line();
        self.chunk().write_operand_byte(byte, span);
    }

    fn emit_jump(&mut self, op: OpCode) -> JumpPatch {
        let span = self.line();
        self.chunk().emit_jump(op, span)
    }

    fn patch_jump(&mut self, patch: JumpPatch) {
        if let Err(message) = self.chunk().patch_jump(patch) {
            self.error_at_previous(message);
        }
    }

    fn emit_loop(&mut self, loop_start: usize) {
        let span = self.line();
        if let Err(message) = self.chunk().emit_loop(loop_start, span) {
            self.error_at_previous(message);
        }
    }

    fn emit_return(&mut self) {
        let span = self.line();
        self.chunk().emit_return(span);
    }

    fn current_offset(&mut self) -> usize {
        self.chunk().len()
    }

    fn add_constant(&mut self, constant: Constant) -> u8 {
        match self.chunk().add_constant(constant) {
            Some(idx) => idx,
            None => {
                self.error_at_previous("Too many constants in one chunk.".to_string());
                0
            }
        }
    }

    fn emit_constant(&mut self, constant: Constant) {
        let idx = self.add_constant(constant);
        self.emit_bytes(OpCode::Const, idx);
    }

    fn intern_name_constant(&mut self, name: &str) -> u8 {
        let rc = self.heap.intern_string(name);
        self.add_constant(Constant::Str(rc))
    }

    // ---- 4.3 Scope / Upvalue Resolver ----

    fn begin_scope(&mut self) {
        self.frame.scope_depth += 1;
    }

    fn end_scope(&mut self) {
        self.frame.scope_depth -= 1;
        while let Some(local) = self.frame.locals.last() {
            if local.depth <= self.frame.scope_depth {
                break;
            }
            if local.is_captured {
                self.emit_byte(OpCode::Clu);
            } else {
                self.emit_byte(OpCode::Pop);
            }
            self.frame.locals.pop();
        }
    }

    fn declare_variable(&mut self, name: &str) {
        if self.frame.scope_depth == 0 {
            return;
        }
        let scope_depth = self.frame.scope_depth;
        let mut collision = false;
        for local in self.frame.locals.iter().rev() {
            if local.depth != -1 && local.depth < scope_depth {
                break;
            }
            if local.name == name {
                collision = true;
                break;
            }
        }
        if collision {
            self.error_at_previous(
                "Variable with this name already declared in this scope.".to_string(),
            );
            return;
        }
        if self.frame.locals.len() >= limits::MAX_LOCALS {
            self.error_at_previous("Too many local variables in function.".to_string());
            return;
        }
        self.frame.locals.push(Local {
            name: name.to_string(),
            depth: -1,
            is_captured: false,
        });
    }

    fn mark_initialized(&mut self) {
        if self.frame.scope_depth == 0 {
            return;
        }
        let depth = self.frame.scope_depth;
        if let Some(local) = self.frame.locals.last_mut() {
            local.depth = depth;
        }
    }

    /// `parseVariable(msg)`: consume the name, declare it (no-op at global
    /// scope), and return the global constant index (unused for locals).
    fn parse_variable(&mut self, message: &str) -> u8 {
        let name = self.consume_identifier(message);
        self.declare_variable(&name);
        if self.frame.scope_depth > 0 {
            return 0;
        }
        self.intern_name_constant(&name)
    }

    fn define_variable(&mut self, global: u8) {
        if self.frame.scope_depth > 0 {
            self.mark_initialized();
            return;
        }
        self.emit_bytes(OpCode::Def, global);
    }

    fn resolve_variable(&mut self, name: &str) -> VariableAccess {
        if let Some((slot, uninitialized)) = self.frame.resolve_local(name) {
            if uninitialized {
                self.error_at_previous(
                    "Cannot read local variable in its own initializer.".to_string(),
                );
            }
            return VariableAccess::Local(slot);
        }
        match resolve_upvalue(&mut self.frame, name) {
            ResolveOutcome::Found(idx) => VariableAccess::Upvalue(idx),
            ResolveOutcome::Overflow(message) => {
                self.error_at_previous(message.to_string());
                VariableAccess::Upvalue(0)
            }
            ResolveOutcome::NotFound => {
                let idx = self.intern_name_constant(name);
                VariableAccess::Global(idx)
            }
        }
    }

    fn emit_get(&mut self, access: VariableAccess) {
        match access {
            VariableAccess::Local(slot) => self.emit_bytes(OpCode::Ld, slot),
            VariableAccess::Upvalue(idx) => self.emit_bytes(OpCode::Uld, idx),
            VariableAccess::Global(idx) => self.emit_bytes(OpCode::Gld, idx),
        };
    }

    fn emit_set(&mut self, access: VariableAccess) {
        match access {
            VariableAccess::Local(slot) => self.emit_bytes(OpCode::St, slot),
            VariableAccess::Upvalue(idx) => self.emit_bytes(OpCode::Ust, idx),
            VariableAccess::Global(idx) => self.emit_bytes(OpCode::Gst, idx),
        };
    }

    // ---- Function frame transitions ----

    fn push_function_frame(&mut self, kind: FrameKind, name: Option<Rc<str>>) {
        let new_frame = Box::new(CompilerFrame::new(kind, name));
        let old_frame = std::mem::replace(&mut self.frame, new_frame);
        self.frame.enclosing = Some(old_frame);
    }

    /// Emits the implicit return, pops the frame, and hands back the
    /// finished function plus its upvalue descriptors for the caller
    /// (`rules::function_body`) to wire into the enclosing chunk.
    fn pop_function_frame(&mut self) -> (FunctionObject, Vec<frame::UpvalueDescriptor>) {
        self.emit_return();
        let enclosing = self
            .frame
            .enclosing
            .take()
            .expect("compiler frame stack underflow");
        let finished = std::mem::replace(&mut self.frame, enclosing);
        let mut finished = *finished;
        let upvalues = std::mem::take(&mut finished.upvalues);
        finished.function.upvalue_count = upvalues.len();
        (finished.function, upvalues)
    }
}
