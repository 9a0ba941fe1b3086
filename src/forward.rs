use std::collections::VecDeque;

use tracing::{debug, info};

use crate::ast::Term;
use crate::kb::{FactId, KnowledgeBase, Origin};
use crate::unify::{apply, unify, Subst};

/// Saturate the base: fire rules against known facts until no new fact
/// is derivable. Derived facts carry full provenance. The agenda holds
/// facts not yet used to probe for derivations, so each fact triggers
/// candidate rules exactly once; set semantics on facts guarantees the
/// fixpoint is reached.
pub fn forward_chain(mut kb: KnowledgeBase) -> KnowledgeBase {
    let before = kb.fact_count();
    let mut agenda: VecDeque<FactId> = kb.facts().map(|(id, _)| id).collect();

    while let Some(fid) = agenda.pop_front() {
        let fact_term = kb.fact(fid).term.clone();
        let Some((pred, _)) = fact_term.predicate() else {
            continue;
        };

        let candidates = kb.rules_with_body_predicate(pred).to_vec();
        for rid in candidates {
            let rule = kb.rule(rid).clone();

            // The fact may satisfy any condition slot of the rule.
            for slot in 0..rule.body.len() {
                let mut env = Subst::new();
                if unify(&rule.body[slot], &fact_term, &mut env).is_none() {
                    continue;
                }

                let mut support = vec![None; rule.body.len()];
                support[slot] = Some(fid);

                let mut matches = vec![];
                satisfy_rest(&kb, &rule.body, slot, 0, &env, &mut support, &mut matches);

                for (binding, support) in matches {
                    let derived = apply(&rule.head, &binding);
                    if kb.has_fact(&derived) {
                        continue;
                    }
                    debug!("derived {} via {}", derived, kb.rule_label(rule.id));
                    let new_id = kb.assert_fact(
                        derived,
                        Origin::Derived { rule: rule.id, binding, support },
                    );
                    agenda.push_back(new_id);
                }
            }
        }
    }

    info!(
        "forward chaining reached fixpoint: {} facts ({} derived this run)",
        kb.fact_count(),
        kb.fact_count() - before
    );
    kb
}

/// Satisfy the remaining condition slots in order against the whole
/// base, skipping the slot pinned to the agenda fact. Every complete
/// substitution is one way the rule fires.
fn satisfy_rest(
    kb: &KnowledgeBase,
    body: &[Term],
    pinned: usize,
    idx: usize,
    env: &Subst,
    support: &mut Vec<Option<FactId>>,
    out: &mut Vec<(Subst, Vec<FactId>)>,
) {
    if idx == body.len() {
        out.push((env.clone(), support.iter().copied().flatten().collect()));
        return;
    }
    if idx == pinned {
        satisfy_rest(kb, body, pinned, idx + 1, env, support, out);
        return;
    }

    let candidates: Vec<(FactId, Subst)> = kb.facts_matching(&body[idx], env).collect();
    for (fid, env2) in candidates {
        support[idx] = Some(fid);
        satisfy_rest(kb, body, pinned, idx + 1, &env2, support, out);
        support[idx] = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_corpus;

    fn saturated(src: &str) -> KnowledgeBase {
        let kb = KnowledgeBase::load(&parse_corpus(src).unwrap()).unwrap();
        forward_chain(kb)
    }

    fn citizen(name: &str) -> Term {
        Term::compound("citizen", vec![Term::atom(name)])
    }

    #[test]
    fn derives_transitively_to_fixpoint() {
        let kb = saturated(
            "citizen(ali).\n\
             parent(ali, hassan).\n\
             parent(hassan, siti).\n\
             citizen(X) :- parent(Y, X), citizen(Y).\n",
        );

        assert!(kb.has_fact(&citizen("hassan")));
        assert!(kb.has_fact(&citizen("siti")));
        assert_eq!(kb.fact_count(), 5);
    }

    #[test]
    fn derived_facts_record_provenance() {
        let kb = saturated(
            "citizen(ali).\n\
             parent(ali, hassan).\n\
             citizen(X) :- parent(Y, X), citizen(Y).\n",
        );

        let (id, _) = kb
            .facts()
            .find(|(_, f)| f.term == citizen("hassan"))
            .unwrap();
        match &kb.fact(id).origin {
            Origin::Derived { rule, binding, support } => {
                assert_eq!(kb.rule(*rule).body.len(), 2);
                assert_eq!(support.len(), 2);
                assert_eq!(apply(&Term::var("X"), binding), Term::atom("hassan"));
                assert_eq!(apply(&Term::var("Y"), binding), Term::atom("ali"));
                let supporting: Vec<String> = support
                    .iter()
                    .map(|&s| kb.fact(s).term.to_string())
                    .collect();
                assert!(supporting.contains(&"parent(ali, hassan)".to_string()));
                assert!(supporting.contains(&"citizen(ali)".to_string()));
            }
            other => panic!("expected derived origin, got {other:?}"),
        }
    }

    #[test]
    fn saturation_is_idempotent() {
        let once = saturated(
            "citizen(ali).\n\
             parent(ali, hassan).\n\
             citizen(X) :- parent(Y, X), citizen(Y).\n",
        );
        let count = once.fact_count();
        let twice = forward_chain(once);
        assert_eq!(twice.fact_count(), count);
    }

    #[test]
    fn saturation_is_monotonic() {
        let src = "citizen(ali).\n\
                   parent(ali, hassan).\n\
                   citizen(X) :- parent(Y, X), citizen(Y).\n";
        let base = KnowledgeBase::load(&parse_corpus(src).unwrap()).unwrap();
        let asserted: Vec<Term> = base.facts().map(|(_, f)| f.term.clone()).collect();

        let full = forward_chain(base);
        for t in asserted {
            assert!(full.has_fact(&t));
        }
    }

    #[test]
    fn one_fact_may_fill_several_slots() {
        // related(ali, ali) satisfies both conditions of the rule.
        let kb = saturated(
            "related(ali, ali).\n\
             linked(X, Y) :- related(X, Z), related(Z, Y).\n",
        );
        assert!(kb.has_fact(&Term::compound(
            "linked",
            vec![Term::atom("ali"), Term::atom("ali")]
        )));
    }

    #[test]
    fn no_rules_means_no_change() {
        let kb = saturated("citizen(ali).\nparent(ali, hassan).\n");
        assert_eq!(kb.fact_count(), 2);
    }

    #[test]
    fn rule_with_unsatisfied_condition_does_not_fire() {
        let kb = saturated(
            "parent(ali, hassan).\n\
             citizen(X) :- parent(Y, X), citizen(Y).\n",
        );
        assert!(!kb.has_fact(&citizen("hassan")));
        assert_eq!(kb.fact_count(), 1);
    }
}
