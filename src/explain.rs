use std::collections::HashSet;

use crate::ast::Term;
use crate::backward::Trace;
use crate::kb::{FactId, KnowledgeBase, Origin, RuleId};

/// One rule application in a justification chain, fully instantiated.
/// The variable-bearing rule itself is never shown to users.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub rule: RuleId,
    pub conditions: Vec<Term>,
    pub conclusion: Term,
}

/// Flatten a proof trace into its rule applications, innermost
/// justifications first. A conclusion reached through a shared
/// sub-proof is explained once.
pub fn explain(trace: &Trace) -> Vec<Step> {
    let mut steps = vec![];
    let mut seen = HashSet::new();
    walk(trace, &mut steps, &mut seen);
    steps
}

fn walk(trace: &Trace, steps: &mut Vec<Step>, seen: &mut HashSet<Term>) {
    if let Trace::Rule { rule, conclusion, premises, .. } = trace {
        for p in premises {
            walk(p, steps, seen);
        }
        if seen.insert(conclusion.clone()) {
            steps.push(Step {
                rule: *rule,
                conditions: premises.iter().map(|p| p.conclusion().clone()).collect(),
                conclusion: conclusion.clone(),
            });
        }
    }
}

/// Rebuild the justification tree of a stored fact from its
/// forward-chaining provenance, so both chaining modes share one
/// explanation path.
pub fn trace_for(kb: &KnowledgeBase, id: FactId) -> Trace {
    let fact = kb.fact(id);
    match &fact.origin {
        Origin::Asserted => Trace::Fact {
            id,
            term: fact.term.clone(),
        },
        Origin::Derived { rule, binding, support } => Trace::Rule {
            rule: *rule,
            binding: binding.clone(),
            conclusion: fact.term.clone(),
            premises: support.iter().map(|&s| trace_for(kb, s)).collect(),
        },
    }
}

/// Render a justification chain as user-facing lines.
pub fn describe(kb: &KnowledgeBase, trace: &Trace) -> Vec<String> {
    explain(trace)
        .iter()
        .map(|step| {
            let conditions: Vec<String> = step.conditions.iter().map(Term::to_string).collect();
            format!(
                "{} via {} from {}",
                step.conclusion,
                kb.rule_label(step.rule),
                conditions.join(", ")
            )
        })
        .collect()
}
