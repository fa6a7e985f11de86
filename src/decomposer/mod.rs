//! Task Decomposition Module
//!
//! Scores how complex a request is, decides whether it should be broken into
//! steps, and asks the model for a step plan when it should.

pub mod complexity;
pub mod extract;
pub mod planner;
pub mod policy;

pub use complexity::{
    level_for_score, score_complexity, score_complexity_with_type, ComplexityLevel,
    ComplexityResult, Scorer, TaskType, THRESHOLD_MEDIUM, THRESHOLD_SIMPLE,
};
pub use extract::extract_json;
pub use planner::{DecomposeError, Decomposer, DecompositionResult, DECOMPOSITION_SYSTEM_PROMPT};
pub use policy::{
    should_decompose, should_decompose_detailed, should_decompose_with_threshold,
    DecompositionDecision, TEMPLATE_MATCH_THRESHOLD,
};
