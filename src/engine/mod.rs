// Load pipeline: manifest schema, the orchestrating engine, and the report.

pub mod loader;
pub mod manifest;
pub mod report;
