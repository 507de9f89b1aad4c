// Persistent state: a file-per-entry substrate plus the two namespaced views.

pub mod fallback;
pub mod kv;
pub mod overrides;
