//! Pure in-memory admission and runtime guard against runaway agent work.
//!
//! `ScopeControl` classifies incoming specifications, issues immutable
//! constraints, tracks active [`TaskScope`] entries, and evaluates
//! auto-stop conditions. It holds no outward references (per the
//! acyclic-dependency design note) and performs no I/O.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::{ComplexityLevel, Constraints, TaskScope};

const SIMPLE_KEYWORDS: &[&str] = &[
    "fix",
    "update",
    "add comment",
    "rename",
    "format",
    "lint",
    "single file",
    "quick",
    "minor",
    "small change",
    "typo",
];

const COMPLEX_KEYWORDS: &[&str] = &[
    "system",
    "architecture",
    "framework",
    "database",
    "api",
    "auth",
    "complete",
    "full",
    "comprehensive",
    "enterprise",
    "scalable",
    "microservice",
    "distributed",
    "production",
    "deployment",
];

const PROHIBITED_KEYWORDS: &[&str] = &[
    "comprehensive",
    "enterprise-grade",
    "production-ready",
    "scalable",
    "microservices",
    "distributed",
    "full-stack",
    "complete system",
    "authentication system",
    "user management",
    "advanced features",
];

const COMPLETION_CRITERIA_HINTS: &[&str] = &[
    "deliverable",
    "specific",
    "bounded",
    "tests",
    "function",
    "component",
    "for the",
];

const INFRASTRUCTURE_INDICATORS: &[&str] = &[
    "framework",
    "architecture",
    "microservice",
    "api gateway",
    "load balancer",
    "database schema",
    "authentication system",
    "user management",
    "role-based access",
    "middleware",
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    Warning,
    Critical,
    /// Reserved: no path in this implementation emits `Blocking`, matching
    /// the spec's "none emitted by default" note, but admission logic
    /// checks for it so a future rule can use it without changing callers.
    Blocking,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Violation {
    pub kind: String,
    pub severity: ViolationSeverity,
    pub message: String,
    pub matches: Vec<String>,
}

impl Violation {
    fn warning(kind: &str, message: impl Into<String>) -> Self {
        Violation {
            kind: kind.to_string(),
            severity: ViolationSeverity::Warning,
            message: message.into(),
            matches: Vec::new(),
        }
    }

    fn critical(kind: &str, message: impl Into<String>, matches: Vec<String>) -> Self {
        Violation {
            kind: kind.to_string(),
            severity: ViolationSeverity::Critical,
            message: message.into(),
            matches,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoStopDecision {
    pub should_stop: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub total_size_bytes: u64,
    pub file_count: u32,
    pub directory_depth: u32,
}

/// Classifies `specs` for `agent_type` into a complexity bucket, per the
/// keyword-set rules.
pub fn analyze_complexity(specs: &str, agent_type: &str) -> ComplexityLevel {
    let lower = specs.to_lowercase();
    let manager_bias = {
        let at = agent_type.to_lowercase();
        at.contains("manager") || at.contains("lead")
    };

    let complex_hits = COMPLEX_KEYWORDS
        .iter()
        .filter(|kw| lower.contains(*kw))
        .count();
    let has_simple = SIMPLE_KEYWORDS.iter().any(|kw| lower.contains(kw));

    if manager_bias {
        return ComplexityLevel::Complex;
    }
    if has_simple && complex_hits == 0 {
        return ComplexityLevel::Simple;
    }
    if complex_hits >= 2 {
        return ComplexityLevel::Complex;
    }
    ComplexityLevel::Moderate
}

/// Validates `specs` against `constraints`, returning every violation
/// found (empty if none).
pub fn validate_specifications(specs: &str, constraints: &Constraints) -> Vec<Violation> {
    let mut violations = Vec::new();
    let lower = specs.to_lowercase();

    if specs.len() > constraints.max_spec_length {
        violations.push(Violation::warning(
            "specification_length",
            format!(
                "specification length {} exceeds max {}",
                specs.len(),
                constraints.max_spec_length
            ),
        ));
    }

    let prohibited_hits: Vec<String> = PROHIBITED_KEYWORDS
        .iter()
        .filter(|kw| lower.contains(**kw))
        .map(|kw| kw.to_string())
        .collect();
    if !prohibited_hits.is_empty() {
        violations.push(Violation::critical(
            "prohibited_keywords",
            format!("specification contains prohibited keywords: {prohibited_hits:?}"),
            prohibited_hits,
        ));
    }

    if !COMPLETION_CRITERIA_HINTS.iter().any(|hint| lower.contains(hint)) {
        violations.push(Violation::warning(
            "completion_criteria",
            "specification does not name any concrete completion criteria",
        ));
    }

    violations
}

/// Pure in-memory classifier/guard. Not `Clone`; share behind `Arc`.
pub struct ScopeControl {
    scopes: Mutex<HashMap<String, TaskScope>>,
    violation_history: Mutex<HashMap<String, Vec<Violation>>>,
    component_inflation: Vec<Regex>,
}

impl Default for ScopeControl {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeControl {
    pub fn new() -> Self {
        let patterns = [
            r"(?i)created? \d+ (components?|files?|modules?)",
            r"(?i)implementing \d+ (features?|endpoints?|services?)",
            r"(?i)building (complete|full|comprehensive) (system|solution)",
        ];
        ScopeControl {
            scopes: Mutex::new(HashMap::new()),
            violation_history: Mutex::new(HashMap::new()),
            component_inflation: patterns
                .iter()
                .map(|p| Regex::new(p).expect("static regex is valid"))
                .collect(),
        }
    }

    /// Classifies, validates, and (if admitted) registers a [`TaskScope`].
    /// Returns the violations found and whether the task was admitted
    /// (rejected only if a `Blocking` violation is present; none are
    /// emitted today, so admission is effectively unconditional).
    pub fn register_task(
        &self,
        task_id: &str,
        workflow_id: &str,
        agent_type: &str,
        specifications: &str,
    ) -> (bool, Vec<Violation>, Constraints) {
        let complexity = analyze_complexity(specifications, agent_type);
        let constraints = Constraints::for_complexity(complexity);
        let violations = validate_specifications(specifications, &constraints);

        let admitted = !violations
            .iter()
            .any(|v| v.severity == ViolationSeverity::Blocking);

        if admitted {
            let scope = TaskScope {
                id: task_id.to_string(),
                workflow_id: workflow_id.to_string(),
                agent_type: agent_type.to_string(),
                specifications: specifications.to_string(),
                constraints,
                start_time: Utc::now(),
                estimated_complexity: complexity,
                success_criteria: Vec::new(),
                boundaries: Vec::new(),
            };
            self.scopes.lock().unwrap().insert(task_id.to_string(), scope);
        }

        if !violations.is_empty() {
            self.violation_history
                .lock()
                .unwrap()
                .entry(task_id.to_string())
                .or_default()
                .extend(violations.clone());
        }

        (admitted, violations, Constraints::for_complexity(complexity))
    }

    /// Removes the active scope for `task_id` once the task reaches a
    /// terminal state, preserving the violation history for reporting.
    pub fn complete_task(&self, task_id: &str) {
        self.scopes.lock().unwrap().remove(task_id);
    }

    pub fn get_scope(&self, task_id: &str) -> Option<TaskScope> {
        self.scopes.lock().unwrap().get(task_id).cloned()
    }

    pub fn violation_history(&self, task_id: &str) -> Vec<Violation> {
        self.violation_history
            .lock()
            .unwrap()
            .get(task_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Checks resource usage against the task's registered constraints.
    pub fn monitor_resource_usage(&self, task_id: &str, usage: &ResourceUsage) -> Vec<Violation> {
        let scope = match self.get_scope(task_id) {
            Some(s) => s,
            None => return Vec::new(),
        };
        let mut violations = Vec::new();
        let c = &scope.constraints;

        if usage.total_size_bytes > c.max_workspace_size_bytes {
            violations.push(Violation::critical(
                "workspace_size",
                format!(
                    "workspace size {} exceeds max {} bytes",
                    usage.total_size_bytes, c.max_workspace_size_bytes
                ),
                Vec::new(),
            ));
        }

        let elapsed = (Utc::now() - scope.start_time).num_seconds().max(0) as u64;
        if elapsed > c.max_execution_time_secs {
            violations.push(Violation::critical(
                "execution_time",
                format!(
                    "elapsed {elapsed}s exceeds max {}s",
                    c.max_execution_time_secs
                ),
                Vec::new(),
            ));
        }

        if usage.file_count > c.max_file_count {
            violations.push(Violation::warning(
                "file_count",
                format!(
                    "file count {} exceeds max {}",
                    usage.file_count, c.max_file_count
                ),
            ));
        }

        if !violations.is_empty() {
            self.violation_history
                .lock()
                .unwrap()
                .entry(task_id.to_string())
                .or_default()
                .extend(violations.clone());
        }

        violations
    }

    /// Scans worker output lines for infrastructure-sprawl and
    /// component-inflation signals.
    pub fn detect_over_engineering(&self, task_id: &str, agent_log_lines: &[String]) -> Vec<Violation> {
        let joined = agent_log_lines.join("\n").to_lowercase();
        let mut violations = Vec::new();

        let infra_hits: Vec<String> = INFRASTRUCTURE_INDICATORS
            .iter()
            .filter(|kw| joined.contains(**kw))
            .map(|kw| kw.to_string())
            .collect();
        if infra_hits.len() >= 3 {
            violations.push(Violation::critical(
                "infrastructure_complexity",
                format!("detected infrastructure indicators: {infra_hits:?}"),
                infra_hits,
            ));
        }

        let inflation_hits = self
            .component_inflation
            .iter()
            .filter(|re| re.is_match(&joined))
            .count();
        if inflation_hits >= 2 {
            violations.push(Violation::warning(
                "component_count",
                "detected component/feature-count inflation language",
            ));
        }

        if !violations.is_empty() {
            self.violation_history
                .lock()
                .unwrap()
                .entry(task_id.to_string())
                .or_default()
                .extend(violations.clone());
        }

        violations
    }

    /// Decides whether a task showing `resource` and `over_engineering`
    /// violations should be auto-stopped.
    pub fn should_auto_stop(
        &self,
        task_id: &str,
        resource_violations: &[Violation],
        over_engineering_violations: &[Violation],
    ) -> AutoStopDecision {
        let scope = match self.get_scope(task_id) {
            Some(s) => s,
            None => {
                return AutoStopDecision {
                    should_stop: false,
                    reason: None,
                }
            }
        };

        if !scope.constraints.auto_stop_on_overengineering {
            return AutoStopDecision {
                should_stop: false,
                reason: None,
            };
        }

        let critical_resource = resource_violations
            .iter()
            .find(|v| v.severity == ViolationSeverity::Critical);
        let critical_overeng = over_engineering_violations
            .iter()
            .find(|v| v.severity == ViolationSeverity::Critical);

        if let Some(v) = critical_resource {
            return AutoStopDecision {
                should_stop: true,
                reason: Some(format!("resource violation: {}", v.message)),
            };
        }
        if let Some(v) = critical_overeng {
            return AutoStopDecision {
                should_stop: true,
                reason: Some(format!("over-engineering violation: {}", v.message)),
            };
        }

        AutoStopDecision {
            should_stop: false,
            reason: None,
        }
    }

    /// Appends a fixed constraints banner to `specs`, enumerating the hard
    /// limits a worker must respect.
    pub fn generate_scoped_specifications(specs: &str, constraints: &Constraints) -> String {
        format!(
            "{specs}\n\n---\nSCOPE CONSTRAINTS (enforced automatically):\n\
             - max_workspace_size: {:.1} MiB\n\
             - max_execution_time: {} minutes\n\
             - max_team_size: {} agents\n\
             - auto_stop_on_overengineering: {}\n\
             Success criteria: the task is complete when its stated deliverable \
             exists and is bounded to the files named above; do not introduce new \
             services, frameworks, or infrastructure beyond what was requested.",
            constraints.max_workspace_size_mib(),
            constraints.max_execution_time_secs / 60,
            constraints.max_team_size,
            constraints.auto_stop_on_overengineering,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_simple_task() {
        assert_eq!(
            analyze_complexity("Fix the typo in the README", "test-writer"),
            ComplexityLevel::Simple
        );
    }

    #[test]
    fn classifies_complex_by_keyword_count() {
        assert_eq!(
            analyze_complexity(
                "Design the system architecture for the new api and database layer",
                "backend-developer"
            ),
            ComplexityLevel::Complex
        );
    }

    #[test]
    fn manager_biases_to_complex_regardless_of_keywords() {
        assert_eq!(
            analyze_complexity("fix a typo", "team-manager"),
            ComplexityLevel::Complex
        );
    }

    #[test]
    fn moderate_is_the_fallback() {
        assert_eq!(
            analyze_complexity("Improve the onboarding flow copy", "associate"),
            ComplexityLevel::Moderate
        );
    }

    #[test]
    fn prohibited_keywords_are_critical() {
        let constraints = Constraints::for_complexity(ComplexityLevel::Complex);
        let violations = validate_specifications(
            "Build a comprehensive enterprise-grade scalable microservices authentication system",
            &constraints,
        );
        assert!(violations
            .iter()
            .any(|v| v.kind == "prohibited_keywords" && v.severity == ViolationSeverity::Critical));
    }

    #[test]
    fn missing_completion_criteria_warns() {
        let constraints = Constraints::for_complexity(ComplexityLevel::Moderate);
        let violations = validate_specifications("do something vague", &constraints);
        assert!(violations.iter().any(|v| v.kind == "completion_criteria"));
    }

    #[test]
    fn completion_criteria_hint_suppresses_warning() {
        let constraints = Constraints::for_complexity(ComplexityLevel::Simple);
        let violations = validate_specifications(
            "Add unit tests for the calculateTotal function with specific test cases",
            &constraints,
        );
        assert!(!violations.iter().any(|v| v.kind == "completion_criteria"));
    }

    #[test]
    fn register_task_admits_and_tracks_scope() {
        let sc = ScopeControl::new();
        let (admitted, violations, _) =
            sc.register_task("t1-w1", "w1", "test-writer", "Add unit tests for the thing");
        assert!(admitted);
        assert!(violations.is_empty());
        assert!(sc.get_scope("t1-w1").is_some());
    }

    #[test]
    fn register_task_records_critical_violation_but_still_admits() {
        let sc = ScopeControl::new();
        let (admitted, violations, _) = sc.register_task(
            "t2-w2",
            "w2",
            "team-manager",
            "Build a comprehensive enterprise-grade scalable microservices authentication system",
        );
        assert!(admitted);
        assert!(violations
            .iter()
            .any(|v| v.severity == ViolationSeverity::Critical));
    }

    #[test]
    fn should_auto_stop_on_critical_overengineering() {
        let sc = ScopeControl::new();
        sc.register_task("t3-w3", "w3", "team-manager", "Build a complete system");
        let logs = vec![
            "detected microservice boundary".to_string(),
            "configured an api gateway".to_string(),
            "added a load balancer in front".to_string(),
            "wired an authentication system".to_string(),
        ];
        let over_eng = sc.detect_over_engineering("t3-w3", &logs);
        let decision = sc.should_auto_stop("t3-w3", &[], &over_eng);
        assert!(decision.should_stop);
    }

    #[test]
    fn component_inflation_regexes_match() {
        let sc = ScopeControl::new();
        sc.register_task("t4-w4", "w4", "associate", "implement the feature");
        let logs = vec![
            "Created 12 components for the dashboard".to_string(),
            "Implementing 8 endpoints for the api".to_string(),
        ];
        let violations = sc.detect_over_engineering("t4-w4", &logs);
        assert!(violations.iter().any(|v| v.kind == "component_count"));
    }

    #[test]
    fn monitor_resource_usage_flags_size_and_time() {
        let sc = ScopeControl::new();
        sc.register_task("t5-w5", "w5", "test-writer", "Fix a typo");
        let usage = ResourceUsage {
            total_size_bytes: 2 * 1024 * 1024,
            file_count: 2,
            directory_depth: 1,
        };
        let violations = sc.monitor_resource_usage("t5-w5", &usage);
        assert!(violations
            .iter()
            .any(|v| v.kind == "workspace_size" && v.severity == ViolationSeverity::Critical));
    }

    #[test]
    fn scoped_specifications_mentions_limits() {
        let constraints = Constraints::for_complexity(ComplexityLevel::Complex);
        let scoped = ScopeControl::generate_scoped_specifications("original spec", &constraints);
        assert!(scoped.contains("original spec"));
        assert!(scoped.contains("20 minutes"));
        assert!(scoped.contains("4 agents"));
    }
}
