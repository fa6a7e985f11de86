//! Complexity scoring for incoming requests
//!
//! Six additive factors, each capped on its own, are summed and scaled by a
//! per-task-type coefficient. The result gates whether a request is run
//! directly or decomposed first.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Scores at or below this are simple
pub const THRESHOLD_SIMPLE: u8 = 30;
/// Scores at or below this (and above simple) are medium; above is complex
pub const THRESHOLD_MEDIUM: u8 = 70;

const STEP_INDICATORS: &[&str] = &[
    "first",
    "then",
    "next",
    "after",
    "finally",
    "lastly",
    "step 1",
    "step 2",
    "step 3",
    "1.",
    "2.",
    "3.",
    "and then",
    "followed by",
];

const CONDITIONALS: &[&str] = &[
    "if",
    "else",
    "otherwise",
    "unless",
    "when",
    "depending",
    "either",
    "or",
    "both",
    "neither",
];

const TECHNICAL_TERMS: &[&str] = &[
    "database",
    "api",
    "authentication",
    "authorization",
    "encryption",
    "migration",
    "deployment",
    "kubernetes",
    "docker",
    "terraform",
    "microservice",
    "distributed",
    "concurrent",
    "async",
    "parallel",
    "transaction",
    "rollback",
    "failover",
    "replication",
    "security",
    "vulnerability",
    "ssl",
    "certificate",
];

const QUESTION_WORDS: &[&str] = &["why", "how", "explain", "what causes", "what if"];

lazy_static! {
    static ref FILE_PATTERNS: [Regex; 3] = [
        // file.ext
        Regex::new(r"\b[\w/-]+\.\w{2,4}\b").unwrap(),
        // /path/to/something
        Regex::new(r"/[\w/-]+").unwrap(),
        // dir/subdir/file
        Regex::new(r"\b\w+/\w+/\w+").unwrap(),
    ];
}

/// Kind of task the request was classified as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    #[default]
    General,
    Explain,
    Review,
    Debug,
    #[serde(alias = "codegen")]
    CodeGen,
    Planning,
    Refactor,
    Infrastructure,
}

impl TaskType {
    pub const ALL: [TaskType; 8] = [
        TaskType::General,
        TaskType::Explain,
        TaskType::Review,
        TaskType::Debug,
        TaskType::CodeGen,
        TaskType::Planning,
        TaskType::Refactor,
        TaskType::Infrastructure,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::General => "general",
            TaskType::Explain => "explain",
            TaskType::Review => "review",
            TaskType::Debug => "debug",
            TaskType::CodeGen => "code_gen",
            TaskType::Planning => "planning",
            TaskType::Refactor => "refactor",
            TaskType::Infrastructure => "infrastructure",
        }
    }

    /// Score coefficient for this task type
    pub fn multiplier(&self) -> f64 {
        match self {
            TaskType::General => 1.0,
            TaskType::Explain => 0.6,
            TaskType::Review => 0.8,
            TaskType::Debug => 1.2,
            TaskType::CodeGen => 1.3,
            TaskType::Planning => 1.4,
            TaskType::Refactor => 1.5,
            TaskType::Infrastructure => 1.5,
        }
    }

    /// Parse a task type name, treating anything unrecognized as `General`
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or_else(|_| {
            tracing::debug!("Unknown task type '{}', scoring as general", s);
            TaskType::General
        })
    }
}

impl FromStr for TaskType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "general" => Ok(TaskType::General),
            "explain" => Ok(TaskType::Explain),
            "review" => Ok(TaskType::Review),
            "debug" => Ok(TaskType::Debug),
            "codegen" | "code_gen" | "code-gen" => Ok(TaskType::CodeGen),
            "planning" => Ok(TaskType::Planning),
            "refactor" => Ok(TaskType::Refactor),
            "infrastructure" => Ok(TaskType::Infrastructure),
            other => Err(anyhow::anyhow!(
                "Invalid task type '{}'. Valid types: general, explain, review, debug, codegen, planning, refactor, infrastructure",
                other
            )),
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Complexity bucket for a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityLevel {
    /// 0-30
    Simple,
    /// 31-70
    Medium,
    /// 71-100
    Complex,
}

impl ComplexityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplexityLevel::Simple => "simple",
            ComplexityLevel::Medium => "medium",
            ComplexityLevel::Complex => "complex",
        }
    }
}

impl fmt::Display for ComplexityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexityResult {
    /// 0-100
    pub score: u8,
    pub level: ComplexityLevel,
    /// Human-readable reasons, in the order they were found
    pub factors: Vec<String>,
    pub needs_decomposition: bool,
}

/// Convert a score to its complexity level
pub fn level_for_score(score: u8) -> ComplexityLevel {
    match score {
        0..=THRESHOLD_SIMPLE => ComplexityLevel::Simple,
        s if s <= THRESHOLD_MEDIUM => ComplexityLevel::Medium,
        _ => ComplexityLevel::Complex,
    }
}

/// Stateless request scorer
#[derive(Debug, Clone, Copy, Default)]
pub struct Scorer;

impl Scorer {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, input: &str, task_type: TaskType) -> ComplexityResult {
        let mut factors = Vec::new();
        let input_lower = input.to_lowercase();

        // Factor 1: length (10 tokens = 1 point, max 20)
        let token_count = input.split_whitespace().count();
        let length_score = (token_count as f64 / 10.0).min(20.0);
        if token_count > 50 {
            factors.push("lengthy request".to_string());
        }

        // Factor 2: step indicators (5 each, max 15)
        let step_count = count_contained(&input_lower, STEP_INDICATORS);
        let step_score = (step_count as f64 * 5.0).min(15.0);
        if step_count >= 3 {
            factors.push("multi-step process".to_string());
        }

        // Factor 3: file references (3 each, max 15)
        let file_count: usize = FILE_PATTERNS
            .iter()
            .map(|re| re.find_iter(input).count())
            .sum();
        let file_score = (file_count as f64 * 3.0).min(15.0);
        if file_count >= 3 {
            factors.push("multiple files involved".to_string());
        }

        // Factor 4: conditional language, whole words only (4 each, max 12)
        let conditional_count = input_lower
            .split_whitespace()
            .filter(|word| CONDITIONALS.contains(word))
            .count();
        let conditional_score = (conditional_count as f64 * 4.0).min(12.0);
        if conditional_count >= 3 {
            factors.push("conditional logic".to_string());
        }

        // Factor 5: technical terms (5 each, max 20)
        let tech_count = count_contained(&input_lower, TECHNICAL_TERMS);
        let tech_score = (tech_count as f64 * 5.0).min(20.0);
        if tech_count >= 2 {
            factors.push("technical complexity".to_string());
        }

        // Factor 6: question complexity (3 each, max 10)
        let question_count = count_contained(&input_lower, QUESTION_WORDS);
        let question_score = (question_count as f64 * 3.0).min(10.0);

        let base_score = length_score
            + step_score
            + file_score
            + conditional_score
            + tech_score
            + question_score;

        let multiplier = task_type.multiplier();
        let score = (base_score * multiplier).clamp(0.0, 100.0) as u8;
        let level = level_for_score(score);

        if multiplier > 1.2 {
            factors.push("high-complexity task type".to_string());
        }

        if factors.is_empty() {
            factors.push(
                if level == ComplexityLevel::Simple {
                    "straightforward request"
                } else {
                    "moderate complexity"
                }
                .to_string(),
            );
        }

        ComplexityResult {
            score,
            level,
            factors,
            needs_decomposition: level == ComplexityLevel::Complex,
        }
    }
}

/// Score a general-purpose request
pub fn score_complexity(input: &str) -> u8 {
    Scorer::new().score(input, TaskType::General).score
}

pub fn score_complexity_with_type(input: &str, task_type: TaskType) -> u8 {
    Scorer::new().score(input, task_type).score
}

/// Count how many of the phrases occur at least once in the text
fn count_contained(text: &str, phrases: &[&str]) -> usize {
    phrases.iter().filter(|p| text.contains(*p)).count()
}
