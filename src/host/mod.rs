// Module execution hosts: pluggable sandboxes for resolved source text.

pub mod traits;
pub mod wasm;
