//! Scope/upvalue resolver (spec.md §4.3): one [`CompilerFrame`] per function
//! being compiled, each owning a bounded array of [`Local`]s and upvalue
//! descriptors plus a link to its enclosing frame.
//!
//! Grounded in `vm/compiler.rs::Compiler` — its recursive
//! `enclosing: Option<Box<Compiler>>` shape (not `bytecode/compiler.rs`'s
//! flat `Vec<FunctionCompiler>` stack) is structurally closer to spec.md
//! §3's "link to parent frame," and its `resolve_upvalue` is already
//! correctly recursive, walking `enclosing` transitively — unlike the other
//! teacher variant, whose own comment admits it only checks one level up.

use std::rc::Rc;

use crate::value::FunctionObject;

/// A name bound in the current lexical scope of one frame (spec.md §3).
#[derive(Debug, Clone)]
pub struct Local {
    pub name: String,
    /// `-1` means "declared but not yet initialized" — reading it is an
    /// error (spec.md invariant 3).
    pub depth: i32,
    pub is_captured: bool,
}

/// Per-frame upvalue descriptor (spec.md §3). `index` is either a local slot
/// in the enclosing frame (`is_local = true`) or another upvalue index in
/// the enclosing frame (`is_local = false`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpvalueDescriptor {
    pub is_local: bool,
    pub index: u8,
}

/// Whether a frame is compiling the top-level script or a nested function
/// (spec.md §3: "`type`: `SCRIPT` or `FUNCTION`").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Script,
    Function,
}

/// One function under compilation (spec.md §3's "Compiler Frame").
pub struct CompilerFrame {
    pub enclosing: Option<Box<CompilerFrame>>,
    pub function: FunctionObject,
    pub kind: FrameKind,
    pub locals: Vec<Local>,
    pub upvalues: Vec<UpvalueDescriptor>,
    pub scope_depth: i32,
}

impl CompilerFrame {
    /// A fresh frame with the reserved `locals[0]` slot already populated
    /// (spec.md §3: "locals[0] in every frame is reserved with empty name
    /// and depth 0. It holds the callee on the runtime stack.").
    pub fn new(kind: FrameKind, name: Option<Rc<str>>) -> Self {
        Self {
            enclosing: None,
            function: FunctionObject::new(name),
            kind,
            locals: vec![Local {
                name: String::new(),
                depth: 0,
                is_captured: false,
            }],
            upvalues: Vec::new(),
            scope_depth: 0,
        }
    }

    /// `resolveLocal`: scan top-to-bottom for the nearest name-equal local.
    /// Returns `(slot, uninitialized)`; `uninitialized` signals the
    /// use-before-init error the caller reports ("Cannot read local
    /// variable in its own initializer.") while still returning the slot,
    /// per spec.md §4.3.
    pub fn resolve_local(&self, name: &str) -> Option<(u8, bool)> {
        for (i, local) in self.locals.iter().enumerate().rev() {
            if local.name == name {
                return Some((i as u8, local.depth == -1));
            }
        }
        None
    }

    /// `addUpvalue`: dedup by `(index, isLocal)`, else append. `None` on
    /// overflow (spec.md: "Too many closure variables in function.").
    pub fn add_upvalue(&mut self, index: u8, is_local: bool) -> Option<u8> {
        for (i, uv) in self.upvalues.iter().enumerate() {
            if uv.index == index && uv.is_local == is_local {
                return Some(i as u8);
            }
        }
        if self.upvalues.len() >= crate::compiler::limits::MAX_UPVALUES {
            return None;
        }
        let idx = self.upvalues.len() as u8;
        self.upvalues.push(UpvalueDescriptor { is_local, index });
        Some(idx)
    }
}

/// `resolveUpvalue(frame, name)` (spec.md §4.3), implemented as free
/// recursion over the `enclosing` chain rather than a method on
/// `CompilerFrame` directly — marking the enclosing local `is_captured`
/// requires mutable access to a frame we don't otherwise hold `&mut` to at
/// the call site in `rules.rs`, so the whole walk is threaded through here.
///
/// Returns the upvalue index in `frame`, or `None` if the enclosing chain
/// has no such variable. `Some(Err(..))` surfaces an overflow diagnostic.
pub enum ResolveOutcome {
    Found(u8),
    Overflow(&'static str),
    NotFound,
}

pub fn resolve_upvalue(frame: &mut CompilerFrame, name: &str) -> ResolveOutcome {
    let Some(enclosing) = frame.enclosing.as_deref_mut() else {
        return ResolveOutcome::NotFound;
    };

    if let Some((local_idx, _uninitialized)) = enclosing.resolve_local(name) {
        enclosing.locals[local_idx as usize].is_captured = true;
        return match frame.add_upvalue(local_idx, true) {
            Some(idx) => ResolveOutcome::Found(idx),
            None => ResolveOutcome::Overflow("Too many closure variables in function."),
        };
    }

    match resolve_upvalue(enclosing, name) {
        ResolveOutcome::Found(upvalue_idx) => match frame.add_upvalue(upvalue_idx, false) {
            Some(idx) => ResolveOutcome::Found(idx),
            None => ResolveOutcome::Overflow("Too many closure variables in function."),
        },
        other => other,
    }
}
