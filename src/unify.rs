use std::collections::HashMap;

use crate::ast::Term;

/// Variable bindings built up during matching and proof search.
/// Triangular: a binding may map to a term containing further-bound
/// variables, so lookups walk the chain.
pub type Subst = HashMap<String, Term>;

/// Walk root-level variable bindings until a non-variable or an
/// unbound variable is reached.
fn shallow_resolve(t: &Term, env: &Subst) -> Term {
    let mut cur = t.clone();
    while let Term::Var(v) = &cur {
        match env.get(v) {
            Some(next) => cur = next.clone(),
            None => break,
        }
    }
    cur
}

/// A variable must never be bound to a compound containing itself.
fn occurs(var: &str, t: &Term, env: &Subst) -> bool {
    match shallow_resolve(t, env) {
        Term::Atom(_) => false,
        Term::Var(v) => v == var,
        Term::Compound { args, .. } => args.iter().any(|a| occurs(var, a, env)),
    }
}

/// Syntactic unification. Extends `env` in place; `None` means the two
/// terms do not match, which is an expected outcome, not an error.
pub fn unify(a: &Term, b: &Term, env: &mut Subst) -> Option<()> {
    let a = shallow_resolve(a, env);
    let b = shallow_resolve(b, env);

    match (a, b) {
        (Term::Atom(x), Term::Atom(y)) => {
            if x == y {
                Some(())
            } else {
                None
            }
        }

        (Term::Var(x), Term::Var(y)) if x == y => Some(()),

        (Term::Var(x), t) | (t, Term::Var(x)) => {
            if occurs(&x, &t, env) {
                None
            } else {
                env.insert(x, t);
                Some(())
            }
        }

        (Term::Compound { functor: f, args: xs }, Term::Compound { functor: g, args: ys }) => {
            if f != g || xs.len() != ys.len() {
                return None;
            }
            for (x, y) in xs.iter().zip(&ys) {
                unify(x, y, env)?;
            }
            Some(())
        }

        _ => None,
    }
}

/// Most general unifier of two terms under an existing substitution,
/// leaving the input substitution untouched.
pub fn unify_terms(a: &Term, b: &Term, env: &Subst) -> Option<Subst> {
    let mut env2 = env.clone();
    unify(a, b, &mut env2)?;
    Some(env2)
}

/// Substitute through the binding chains, producing a new term.
/// Stored facts and rules are never mutated.
pub fn apply(t: &Term, env: &Subst) -> Term {
    match t {
        Term::Atom(_) => t.clone(),
        Term::Var(v) => match env.get(v) {
            Some(bound) => apply(bound, env),
            None => t.clone(),
        },
        Term::Compound { functor, args } => Term::Compound {
            functor: functor.clone(),
            args: args.iter().map(|a| apply(a, env)).collect(),
        },
    }
}

/// Rename a rule's variables to fresh names scoped to one proof-search
/// invocation, so sibling and recursive uses cannot capture each other.
/// Returns the renamed head and body plus the original -> fresh name map.
pub fn rename_apart(
    head: &Term,
    body: &[Term],
    salt: usize,
) -> (Term, Vec<Term>, HashMap<String, String>) {
    let mut map = HashMap::new();
    let h = fresh_term(head, salt, &mut map);
    let b = body.iter().map(|t| fresh_term(t, salt, &mut map)).collect();
    (h, b, map)
}

fn fresh_term(t: &Term, salt: usize, map: &mut HashMap<String, String>) -> Term {
    match t {
        Term::Atom(_) => t.clone(),
        Term::Var(v) => {
            let nv = map
                .entry(v.clone())
                .or_insert_with(|| format!("{v}__{salt}"))
                .clone();
            Term::Var(nv)
        }
        Term::Compound { functor, args } => Term::Compound {
            functor: functor.clone(),
            args: args.iter().map(|a| fresh_term(a, salt, map)).collect(),
        },
    }
}
