// Library exports for cortex-decomposer
// This allows the modules to be imported in tests and external code

pub mod config;
pub mod decomposer;
pub mod llm;
pub mod workflow;
