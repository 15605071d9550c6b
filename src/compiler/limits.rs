//! Resource bounds (spec.md §5). `const`s, not a config file — the
//! compiler's one tunable surface is as hardcoded here as the teacher
//! hardcodes its own bytecode-format constants (e.g. the `65536`
//! constant-pool ceiling in `bytecode/chunk.rs::add_constant`).

pub const MAX_LOCALS: usize = 256;
pub const MAX_UPVALUES: usize = 256;
pub const MAX_CONSTANTS: usize = 256;
pub const MAX_ARGS: usize = 32;
pub const MAX_PARAMS: usize = 255;
pub const MAX_JUMP: usize = 65_535;
