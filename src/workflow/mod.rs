//! Workflow Module
//!
//! Dependency-linked step plans: building them, checking that their
//! dependency graph is sound, and running them against pluggable
//! collaborators.

pub mod builder;
pub mod executor;
pub mod registry;
pub mod types;
pub mod validate;

pub use builder::WorkflowBuilder;
pub use executor::{
    ApprovalHandler, CancelCause, ExecuteError, StepCallback, TemplateExecutor, ToolExecutor,
    WorkflowEvent, WorkflowExecutor,
};
pub use registry::{ToolHandler, ToolRegistry};
pub use types::{RiskLevel, Step, StepKind, StepResult, Variables, Workflow, WorkflowResult};
pub use validate::{validate_steps, validate_workflow, WorkflowError};
