use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, info};

use crate::ast::{Clause, Term};
use crate::unify::{unify, Subst};

/// Arena index of a stored fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FactId(pub usize);

/// Arena index of a loaded rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuleId(pub usize);

/// Where a fact came from. Derived facts carry the rule, the binding
/// it fired under, and the facts that satisfied each condition in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Origin {
    Asserted,
    Derived {
        rule: RuleId,
        binding: Subst,
        support: Vec<FactId>,
    },
}

/// A ground compound stored in the base, plus its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct Fact {
    pub term: Term,
    pub origin: Origin,
}

/// A Horn rule: ordered conditions and a single conclusion whose
/// variables all appear in the conditions.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub id: RuleId,
    pub head: Term,
    pub body: Vec<Term>,
}

#[derive(Debug, Error)]
pub enum KbError {
    #[error("line {line}: head variable {var} does not appear in the rule body")]
    UnsafeRule { line: usize, var: String },
    #[error("line {line}: fact {term} is not ground")]
    NonGroundFact { line: usize, term: Term },
    #[error("line {line}: {predicate} used with arity {found}, previously seen with arity {expected}")]
    ArityMismatch {
        line: usize,
        predicate: String,
        expected: usize,
        found: usize,
    },
    #[error("line {line}: {term} cannot be used as a clause component")]
    NotAPredicate { line: usize, term: Term },
}

/// The fact and rule store, with predicate indexes so matching never
/// scans the whole base.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    facts: Vec<Fact>,
    rules: Vec<Rule>,
    fact_ids: HashMap<Term, FactId>,
    facts_by_pred: HashMap<String, Vec<FactId>>,
    rules_by_head: HashMap<String, Vec<RuleId>>,
    rules_by_body: HashMap<String, Vec<RuleId>>,
    arities: HashMap<String, usize>,
}

impl KnowledgeBase {
    pub fn new() -> KnowledgeBase {
        KnowledgeBase::default()
    }

    /// Build a base from parsed clauses. Any structural problem rejects
    /// the whole load; no partial base escapes.
    pub fn load(clauses: &[Clause]) -> Result<KnowledgeBase, KbError> {
        let mut kb = KnowledgeBase::new();

        for clause in clauses {
            kb.register_predicate(&clause.head, clause.line)?;
            for cond in &clause.body {
                kb.register_predicate(cond, clause.line)?;
            }

            if clause.is_fact() {
                if !clause.head.is_ground() {
                    return Err(KbError::NonGroundFact {
                        line: clause.line,
                        term: clause.head.clone(),
                    });
                }
                kb.assert_fact(clause.head.clone(), Origin::Asserted);
            } else {
                kb.add_rule(clause)?;
            }
        }

        info!(
            "loaded corpus: {} facts, {} rules, {} predicates",
            kb.facts.len(),
            kb.rules.len(),
            kb.arities.len()
        );
        Ok(kb)
    }

    /// First use of a predicate fixes its arity for the whole corpus.
    fn register_predicate(&mut self, term: &Term, line: usize) -> Result<(), KbError> {
        let (name, arity) = term.predicate().ok_or_else(|| KbError::NotAPredicate {
            line,
            term: term.clone(),
        })?;

        match self.arities.get(name) {
            Some(&expected) if expected != arity => Err(KbError::ArityMismatch {
                line,
                predicate: name.to_string(),
                expected,
                found: arity,
            }),
            Some(_) => Ok(()),
            None => {
                self.arities.insert(name.to_string(), arity);
                Ok(())
            }
        }
    }

    fn add_rule(&mut self, clause: &Clause) -> Result<RuleId, KbError> {
        let body_vars: std::collections::BTreeSet<String> = clause
            .body
            .iter()
            .flat_map(|c| c.variables())
            .collect();
        for var in clause.head.variables() {
            if !body_vars.contains(&var) {
                return Err(KbError::UnsafeRule {
                    line: clause.line,
                    var,
                });
            }
        }

        let id = RuleId(self.rules.len());
        if let Some((name, _)) = clause.head.predicate() {
            self.rules_by_head.entry(name.to_string()).or_default().push(id);
        }
        for cond in &clause.body {
            if let Some((name, _)) = cond.predicate() {
                let ids = self.rules_by_body.entry(name.to_string()).or_default();
                if ids.last() != Some(&id) {
                    ids.push(id);
                }
            }
        }
        self.rules.push(Rule {
            id,
            head: clause.head.clone(),
            body: clause.body.clone(),
        });
        Ok(id)
    }

    /// Insert a ground fact. Re-asserting a structurally identical fact
    /// is a no-op returning the existing id; the first origin wins.
    pub fn assert_fact(&mut self, term: Term, origin: Origin) -> FactId {
        if let Some(&id) = self.fact_ids.get(&term) {
            return id;
        }
        let id = FactId(self.facts.len());
        if let Some((name, _)) = term.predicate() {
            self.facts_by_pred.entry(name.to_string()).or_default().push(id);
        }
        debug!("assert {}", term);
        self.fact_ids.insert(term.clone(), id);
        self.facts.push(Fact { term, origin });
        id
    }

    pub fn has_fact(&self, term: &Term) -> bool {
        self.fact_ids.contains_key(term)
    }

    pub fn fact(&self, id: FactId) -> &Fact {
        &self.facts[id.0]
    }

    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.rules[id.0]
    }

    pub fn fact_count(&self) -> usize {
        self.facts.len()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// All facts in assertion order.
    pub fn facts(&self) -> impl Iterator<Item = (FactId, &Fact)> {
        self.facts.iter().enumerate().map(|(i, f)| (FactId(i), f))
    }

    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    /// Stored facts whose predicate matches the pattern's and that unify
    /// with it under the given substitution. Lazy over the predicate index.
    pub fn facts_matching<'a>(
        &'a self,
        pattern: &'a Term,
        env: &'a Subst,
    ) -> impl Iterator<Item = (FactId, Subst)> + 'a {
        let ids: &[FactId] = pattern
            .predicate()
            .and_then(|(name, _)| self.facts_by_pred.get(name))
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        ids.iter().filter_map(move |&id| {
            let mut env2 = env.clone();
            unify(pattern, &self.facts[id.0].term, &mut env2).map(|_| (id, env2))
        })
    }

    /// Rules that could prove a goal of this predicate.
    pub fn rules_with_head_predicate(&self, name: &str) -> &[RuleId] {
        self.rules_by_head.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Rules that could newly fire when a fact of this predicate arrives.
    pub fn rules_with_body_predicate(&self, name: &str) -> &[RuleId] {
        self.rules_by_body.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Human-readable rule identifier, e.g. `rule #2 (citizen/1)`.
    pub fn rule_label(&self, id: RuleId) -> String {
        let rule = &self.rules[id.0];
        match rule.head.predicate() {
            Some((name, arity)) => format!("rule #{} ({name}/{arity})", id.0 + 1),
            None => format!("rule #{}", id.0 + 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_corpus;

    fn load(src: &str) -> Result<KnowledgeBase, KbError> {
        KnowledgeBase::load(&parse_corpus(src).unwrap())
    }

    #[test]
    fn load_splits_facts_and_rules() {
        let kb = load(
            "citizen(ali).\n\
             parent(ali, hassan).\n\
             citizen(X) :- parent(Y, X), citizen(Y).\n",
        )
        .unwrap();

        assert_eq!(kb.fact_count(), 2);
        assert_eq!(kb.rule_count(), 1);
        assert!(kb.has_fact(&Term::compound("citizen", vec![Term::atom("ali")])));
        assert_eq!(kb.rules_with_head_predicate("citizen").len(), 1);
        assert_eq!(kb.rules_with_body_predicate("parent").len(), 1);
        assert_eq!(kb.rules_with_body_predicate("citizen").len(), 1);
        assert!(kb.rules_with_head_predicate("parent").is_empty());
    }

    #[test]
    fn assert_fact_is_idempotent() {
        let mut kb = KnowledgeBase::new();
        let t = Term::compound("citizen", vec![Term::atom("ali")]);
        let a = kb.assert_fact(t.clone(), Origin::Asserted);
        let b = kb.assert_fact(t, Origin::Asserted);
        assert_eq!(a, b);
        assert_eq!(kb.fact_count(), 1);
    }

    #[test]
    fn unsafe_rule_is_rejected() {
        let err = load("eligible(X, Z) :- citizen(X).").unwrap_err();
        assert!(matches!(err, KbError::UnsafeRule { var, .. } if var == "Z"));
    }

    #[test]
    fn non_ground_fact_is_rejected() {
        let err = load("citizen(X).").unwrap_err();
        assert!(matches!(err, KbError::NonGroundFact { line: 1, .. }));
    }

    #[test]
    fn arity_mismatch_is_rejected() {
        let err = load("parent(ali, hassan).\nparent(ali).").unwrap_err();
        assert!(matches!(
            err,
            KbError::ArityMismatch { line: 2, expected: 2, found: 1, .. }
        ));
    }

    #[test]
    fn variable_clause_component_is_rejected() {
        let err = load("ok :- X.").unwrap_err();
        assert!(matches!(err, KbError::NotAPredicate { .. }));
    }

    #[test]
    fn facts_matching_respects_the_given_substitution() {
        let kb = load("parent(ali, hassan).\nparent(ali, siti).\nparent(omar, ali).\n").unwrap();

        let pattern = Term::compound("parent", vec![Term::var("P"), Term::var("C")]);
        assert_eq!(kb.facts_matching(&pattern, &Subst::new()).count(), 3);

        let mut env = Subst::new();
        env.insert("P".to_string(), Term::atom("ali"));
        let bound: Vec<_> = kb.facts_matching(&pattern, &env).collect();
        assert_eq!(bound.len(), 2);
    }

    #[test]
    fn duplicate_body_predicate_indexes_rule_once() {
        let kb = load("sibling(X, Y) :- parent(P, X), parent(P, Y).").unwrap();
        assert_eq!(kb.rules_with_body_predicate("parent").len(), 1);
    }
}
