use std::collections::BTreeSet;
use std::fmt;

/// A term: symbolic constant, variable, or predicate over argument terms.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    Atom(String),
    Var(String),
    Compound { functor: String, args: Vec<Term> },
}

impl Term {
    pub fn atom(name: impl Into<String>) -> Term {
        Term::Atom(name.into())
    }

    pub fn var(name: impl Into<String>) -> Term {
        Term::Var(name.into())
    }

    pub fn compound(functor: impl Into<String>, args: Vec<Term>) -> Term {
        Term::Compound { functor: functor.into(), args }
    }

    /// Predicate name and arity, if this term can head or condition a clause.
    /// Atoms are zero-arity predicates; variables have no predicate.
    pub fn predicate(&self) -> Option<(&str, usize)> {
        match self {
            Term::Atom(name) => Some((name, 0)),
            Term::Var(_) => None,
            Term::Compound { functor, args } => Some((functor, args.len())),
        }
    }

    pub fn is_ground(&self) -> bool {
        match self {
            Term::Atom(_) => true,
            Term::Var(_) => false,
            Term::Compound { args, .. } => args.iter().all(Term::is_ground),
        }
    }

    /// All variable names occurring in the term, in name order.
    pub fn variables(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables(&self, out: &mut BTreeSet<String>) {
        match self {
            Term::Atom(_) => {}
            Term::Var(v) => {
                out.insert(v.clone());
            }
            Term::Compound { args, .. } => {
                for a in args {
                    a.collect_variables(out);
                }
            }
        }
    }
}

/// A parsed corpus clause: a fact (empty body) or a Horn rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub head: Term,
    pub body: Vec<Term>,
    /// Source line of the clause, for load-time error reports.
    pub line: usize,
}

impl Clause {
    pub fn is_fact(&self) -> bool {
        self.body.is_empty()
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Atom(name) => write_atom(f, name),
            Term::Var(v) => write!(f, "{v}"),
            Term::Compound { functor, args } => {
                write_atom(f, functor)?;
                write!(f, "(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{a}")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.head)?;
        if !self.body.is_empty() {
            write!(f, " :- ")?;
            for (i, c) in self.body.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{c}")?;
            }
        }
        write!(f, ".")
    }
}

/// Atoms that no longer match plain syntax are re-quoted on output.
fn write_atom(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    let plain = name.chars().next().is_some_and(|c| c.is_ascii_lowercase())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    let numeric = !name.is_empty() && name.chars().all(|c| c.is_ascii_digit());
    if plain || numeric {
        write!(f, "{name}")
    } else {
        write!(f, "'{name}'")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicate_of_atom_and_compound() {
        assert_eq!(Term::atom("raining").predicate(), Some(("raining", 0)));
        let t = Term::compound("parent", vec![Term::atom("ali"), Term::var("X")]);
        assert_eq!(t.predicate(), Some(("parent", 2)));
        assert_eq!(Term::var("X").predicate(), None);
    }

    #[test]
    fn groundness_and_variables() {
        let t = Term::compound("parent", vec![Term::atom("ali"), Term::var("X")]);
        assert!(!t.is_ground());
        assert!(Term::compound("parent", vec![Term::atom("ali")]).is_ground());
        let vars: Vec<String> = t.variables().into_iter().collect();
        assert_eq!(vars, vec!["X".to_string()]);
    }

    #[test]
    fn display_round_trips_plain_terms() {
        let t = Term::compound("citizen", vec![Term::atom("ali")]);
        assert_eq!(t.to_string(), "citizen(ali)");
        let q = Term::compound("section", vec![Term::atom("Part II"), Term::atom("12")]);
        assert_eq!(q.to_string(), "section('Part II', 12)");
    }
}
