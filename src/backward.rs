use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use thiserror::Error;
use tracing::trace;

use crate::ast::Term;
use crate::kb::{FactId, KnowledgeBase, RuleId};
use crate::unify::{apply, rename_apart, unify, Subst};

/// Bound on nested rule applications along one proof branch. Statute
/// corpora stay far below this; unguarded recursive rules hit it.
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Justification tree for one proven goal. Leaves are asserted facts;
/// inner nodes are rule applications with fully instantiated terms.
#[derive(Debug, Clone, PartialEq)]
pub enum Trace {
    Fact {
        id: FactId,
        term: Term,
    },
    Rule {
        rule: RuleId,
        binding: Subst,
        conclusion: Term,
        premises: Vec<Trace>,
    },
}

impl Trace {
    /// The concrete term this node establishes.
    pub fn conclusion(&self) -> &Term {
        match self {
            Trace::Fact { term, .. } => term,
            Trace::Rule { conclusion, .. } => conclusion,
        }
    }
}

/// One solution: the grounding substitution for the goal's variables
/// and the justification tree behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct Proof {
    pub binding: Subst,
    pub trace: Trace,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProveError {
    #[error("no proof found")]
    NoProofFound,
    #[error("inference depth exceeded")]
    DepthExceeded,
}

// Partial proof tree; holes are filled as goals are discharged.
#[derive(Debug, Clone)]
enum Node {
    Hole,
    Fact(FactId),
    Rule {
        rule: RuleId,
        head: Term,
        renames: HashMap<String, String>,
        children: Vec<Node>,
    },
}

impl Node {
    fn set(&mut self, path: &[usize], node: Node) {
        match path.split_first() {
            None => *self = node,
            Some((&i, rest)) => {
                if let Node::Rule { children, .. } = self {
                    children[i].set(rest, node);
                }
            }
        }
    }
}

// Goals already expanded on the current branch, for the loop guard.
#[derive(Debug)]
struct AncestorLink {
    goal: Term,
    parent: Option<Rc<AncestorLink>>,
}

#[derive(Debug, Clone)]
struct GoalEntry {
    term: Term,
    path: Vec<usize>,
    depth: usize,
    ancestors: Option<Rc<AncestorLink>>,
}

// One alternative in the depth-first search: pending goals (next on
// top), the substitution so far, and the partial proof tree.
#[derive(Debug, Clone)]
struct State {
    env: Subst,
    goals: Vec<GoalEntry>,
    proof: Node,
}

/// Lazy enumeration of proofs, depth-first with backtracking via an
/// explicit work-stack. Each `next()` resumes the search where the
/// previous solution left off, so callers pay only for the proofs they
/// take.
pub struct Proofs<'a> {
    kb: &'a KnowledgeBase,
    stack: Vec<State>,
    goal_vars: BTreeSet<String>,
    max_depth: usize,
    depth_exceeded: bool,
    fresh: usize,
}

/// Prove a goal against the base with the default depth bound.
pub fn prove<'a>(kb: &'a KnowledgeBase, goal: &Term) -> Proofs<'a> {
    prove_with_depth(kb, goal, DEFAULT_MAX_DEPTH)
}

pub fn prove_with_depth<'a>(kb: &'a KnowledgeBase, goal: &Term, max_depth: usize) -> Proofs<'a> {
    let root = GoalEntry {
        term: goal.clone(),
        path: vec![],
        depth: 0,
        ancestors: None,
    };
    Proofs {
        kb,
        stack: vec![State {
            env: Subst::new(),
            goals: vec![root],
            proof: Node::Hole,
        }],
        goal_vars: goal.variables(),
        max_depth,
        depth_exceeded: false,
        fresh: 0,
    }
}

/// First solution, with the search outcome made explicit when there is
/// none: a cleanly exhausted search is `NoProofFound`, a search that had
/// to cut a branch is `DepthExceeded`.
pub fn prove_first(kb: &KnowledgeBase, goal: &Term) -> Result<Proof, ProveError> {
    let mut proofs = prove(kb, goal);
    match proofs.next() {
        Some(p) => Ok(p),
        None if proofs.depth_exceeded() => Err(ProveError::DepthExceeded),
        None => Err(ProveError::NoProofFound),
    }
}

impl Proofs<'_> {
    /// True once the depth or loop guard has cut any branch. Meaningful
    /// after the iterator is exhausted: distinguishes "definitely
    /// unprovable" from "gave up within bounds".
    pub fn depth_exceeded(&self) -> bool {
        self.depth_exceeded
    }

    fn emit(&self, state: &State) -> Option<Proof> {
        let trace = finish(&state.proof, &state.env, self.kb)?;
        let mut binding = Subst::new();
        for v in &self.goal_vars {
            let t = apply(&Term::Var(v.clone()), &state.env);
            if t != Term::Var(v.clone()) {
                binding.insert(v.clone(), t);
            }
        }
        Some(Proof { binding, trace })
    }
}

impl Iterator for Proofs<'_> {
    type Item = Proof;

    fn next(&mut self) -> Option<Proof> {
        while let Some(mut state) = self.stack.pop() {
            let Some(entry) = state.goals.pop() else {
                // no goals left: the proof tree is complete
                if let Some(proof) = self.emit(&state) {
                    return Some(proof);
                }
                continue;
            };

            let goal = apply(&entry.term, &state.env);

            if on_branch(&goal, &entry.ancestors) || entry.depth >= self.max_depth {
                // unguarded recursion; give up on this branch, not the search
                self.depth_exceeded = true;
                continue;
            }

            trace!("goal {} (depth {})", goal, entry.depth);

            let mut alts: Vec<State> = vec![];

            // 1) stored facts
            for (fid, env2) in self.kb.facts_matching(&goal, &state.env) {
                let mut next = state.clone();
                next.env = env2;
                next.proof.set(&entry.path, Node::Fact(fid));
                alts.push(next);
            }

            // 2) rules concluding the goal's predicate
            if let Some((pred, _)) = goal.predicate() {
                for &rid in self.kb.rules_with_head_predicate(pred) {
                    let rule = self.kb.rule(rid);
                    self.fresh += 1;
                    let (head, body, renames) = rename_apart(&rule.head, &rule.body, self.fresh);

                    let mut env2 = state.env.clone();
                    if unify(&goal, &head, &mut env2).is_none() {
                        continue;
                    }

                    let mut next = state.clone();
                    next.env = env2;
                    next.proof.set(
                        &entry.path,
                        Node::Rule {
                            rule: rid,
                            head,
                            renames,
                            children: vec![Node::Hole; body.len()],
                        },
                    );

                    let link = Rc::new(AncestorLink {
                        goal: goal.clone(),
                        parent: entry.ancestors.clone(),
                    });
                    // conditions are proved left-to-right: push in reverse
                    for (i, cond) in body.iter().enumerate().rev() {
                        let mut path = entry.path.clone();
                        path.push(i);
                        next.goals.push(GoalEntry {
                            term: cond.clone(),
                            path,
                            depth: entry.depth + 1,
                            ancestors: Some(link.clone()),
                        });
                    }
                    alts.push(next);
                }
            }

            // facts before rules, each in base order: push reversed so the
            // first alternative is popped next
            while let Some(alt) = alts.pop() {
                self.stack.push(alt);
            }
        }
        None
    }
}

fn on_branch(goal: &Term, ancestors: &Option<Rc<AncestorLink>>) -> bool {
    let mut cur = ancestors;
    while let Some(link) = cur {
        if link.goal == *goal {
            return true;
        }
        cur = &link.parent;
    }
    false
}

// Resolve a completed partial tree into a Trace with concrete terms.
fn finish(node: &Node, env: &Subst, kb: &KnowledgeBase) -> Option<Trace> {
    match node {
        Node::Hole => None,
        Node::Fact(id) => Some(Trace::Fact {
            id: *id,
            term: kb.fact(*id).term.clone(),
        }),
        Node::Rule { rule, head, renames, children } => {
            let premises = children
                .iter()
                .map(|c| finish(c, env, kb))
                .collect::<Option<Vec<_>>>()?;
            let binding = renames
                .iter()
                .map(|(orig, fresh)| (orig.clone(), apply(&Term::Var(fresh.clone()), env)))
                .collect();
            Some(Trace::Rule {
                rule: *rule,
                binding,
                conclusion: apply(head, env),
                premises,
            })
        }
    }
}
