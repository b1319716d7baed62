//! Role-dependent task prompt composition. Grounded on the same
//! `handlebars`-templating approach used elsewhere in this lineage for
//! structured agent prompts: a small set of named templates rendered
//! against a JSON context built from the scoped specification.

use handlebars::Handlebars;
use serde_json::json;

use crate::models::AgentRole;

const MANAGER_TEMPLATE: &str = r#"You are the manager agent for workflow {{workflow_id}}.

## Task
{{specifications}}

## Coordination protocol
- Break the work into associate-sized tasks and delegate via handoffs.
- Review associate output before marking a handoff `Approved for Integration`.
- Do not implement associate-level work yourself.

## Forbidden actions
- Spawning more than {{max_team_size}} concurrent associates.
- Expanding scope beyond what is written above.
"#;

const ASSOCIATE_TEMPLATE: &str = r#"You are an associate agent for workflow {{workflow_id}}.

## Task
{{specifications}}

## Constraints
- Do not delegate further; this task is yours to complete directly.
- Stay within the stated deliverable; do not introduce new files or
  services beyond what the task requires.
"#;

/// Renders the role-dependent task prompt for a pending task.
pub fn compose_prompt(
    role: AgentRole,
    workflow_id: &str,
    scoped_specifications: &str,
    max_team_size: u32,
) -> String {
    let hb = Handlebars::new();
    let template = match role {
        AgentRole::Manager => MANAGER_TEMPLATE,
        AgentRole::Associate | AgentRole::Specialist => ASSOCIATE_TEMPLATE,
    };
    let context = json!({
        "workflow_id": workflow_id,
        "specifications": scoped_specifications,
        "max_team_size": max_team_size,
    });
    hb.render_template(template, &context)
        .unwrap_or_else(|_| scoped_specifications.to_string())
}
