//! The minimal VM/heap collaborator spec.md §6.2 requires: string interning,
//! function-object allocation, and a GC-root-marking hook.
//!
//! There is no tracing collector behind this — that is explicitly out of
//! scope (spec.md §1) — so allocation is plain `Rc`, the way every teacher
//! variant already represents functions (`Rc<FunctionProto>` in
//! `vm/compiler.rs`, `Rc<CompiledFunction>` in `bytecode/chunk.rs`). What
//! *is* real and tested is the root-walk contract: `mark_compiler_roots`
//! visits every function still under construction, innermost frame first.

use std::rc::Rc;

use indexmap::IndexSet;

use crate::chunk::Chunk;

/// A function under construction, or fully compiled.
///
/// Grounded in `bytecode/chunk.rs::CompiledFunction`, trimmed to this
/// language's feature set: no `full_arity`/`default_values` (no default
/// parameters here) and no `is_method` (no classes).
#[derive(Debug, Clone)]
pub struct FunctionObject {
    pub name: Option<Rc<str>>,
    pub arity: u8,
    pub upvalue_count: usize,
    pub chunk: Chunk,
}

impl FunctionObject {
    pub fn new(name: Option<Rc<str>>) -> Self {
        Self {
            name,
            arity: 0,
            upvalue_count: 0,
            chunk: Chunk::new(),
        }
    }
}

/// One constant-pool entry (spec.md §6.4's `CONST` operand). `TRUE`/`FALSE`/
/// `NULL` are dedicated zero-operand opcodes, never constant-pool entries —
/// same split the teacher's bytecode variants both make.
#[derive(Debug, Clone)]
pub enum Constant {
    Number(f64),
    Integer(i64),
    Str(Rc<str>),
    Function(Rc<FunctionObject>),
}

impl PartialEq for Constant {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Constant::Number(a), Constant::Number(b)) => a == b,
            (Constant::Integer(a), Constant::Integer(b)) => a == b,
            (Constant::Str(a), Constant::Str(b)) => a == b,
            // Each compiled function is unique; never dedup these.
            _ => false,
        }
    }
}

/// The VM's allocator, as seen by the compiler (spec.md §6.2:
/// `newFunction`, `copyString`). Owns the string-intern table.
pub struct Heap {
    strings: IndexSet<Rc<str>, ahash::RandomState>,
}

impl Heap {
    pub fn new() -> Self {
        Self {
            strings: IndexSet::default(),
        }
    }

    /// `copyString(vm, ptr, len)`: intern `text`, returning the shared
    /// instance if one already exists.
    pub fn intern_string(&mut self, text: &str) -> Rc<str> {
        if let Some(existing) = self.strings.get(text) {
            return existing.clone();
        }
        let rc: Rc<str> = Rc::from(text);
        self.strings.insert(rc.clone());
        rc
    }

    /// `newFunction(vm)`: a fresh function object, empty chunk, arity 0.
    pub fn new_function(&mut self, name: Option<Rc<str>>) -> FunctionObject {
        FunctionObject::new(name)
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}
