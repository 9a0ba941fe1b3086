use pest::iterators::Pair;
use pest::Parser as PestParser; // <- trait (gives CorpusParser::parse)
use pest_derive::Parser;        // <- derive macro (generates Rule enum + impl)
use thiserror::Error;

use crate::ast::{Clause, Term};

#[derive(Parser)]
#[grammar = "prolog.pest"]
struct CorpusParser;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("parse error: {0}")]
    Pest(#[from] pest::error::Error<Rule>),
    #[error("unexpected rule: {0:?}")]
    Unexpected(Rule),
}

/// Parse a corpus text into clauses, preserving source order.
pub fn parse_corpus(input: &str) -> Result<Vec<Clause>, ParseError> {
    let mut pairs = CorpusParser::parse(Rule::corpus, input)?;
    let corpus_pair = pairs.next().ok_or(ParseError::Unexpected(Rule::corpus))?;

    let mut clauses = vec![];
    let mut wildcards = 0usize;

    for item in corpus_pair.into_inner() {
        if item.as_rule() == Rule::clause {
            clauses.push(build_clause(item, &mut wildcards)?);
        }
    }

    Ok(clauses)
}

/// Parse a single query term, e.g. `eligible_for_divorce(X)`.
/// The trailing dot is optional.
pub fn parse_goal(input: &str) -> Result<Term, ParseError> {
    let mut pairs = CorpusParser::parse(Rule::goal, input)?;
    let goal_pair = pairs.next().ok_or(ParseError::Unexpected(Rule::goal))?;
    let mut wildcards = 0usize;

    for item in goal_pair.into_inner() {
        if item.as_rule() == Rule::term {
            return build_term(item, &mut wildcards);
        }
    }

    Err(ParseError::Unexpected(Rule::goal))
}

fn build_clause(pair: Pair<Rule>, wildcards: &mut usize) -> Result<Clause, ParseError> {
    let line = pair.as_span().start_pos().line_col().0;
    let mut it = pair.into_inner();

    let head_pair = it.next().ok_or(ParseError::Unexpected(Rule::clause))?;
    let head = build_term(head_pair, wildcards)?;

    let mut body = vec![];
    if let Some(body_pair) = it.next() {
        for cond in body_pair.into_inner() {
            if cond.as_rule() == Rule::term {
                body.push(build_term(cond, wildcards)?);
            }
        }
    }

    Ok(Clause { head, body, line })
}

fn build_term(pair: Pair<Rule>, wildcards: &mut usize) -> Result<Term, ParseError> {
    match pair.as_rule() {
        Rule::term => {
            let inner = pair.into_inner().next().ok_or(ParseError::Unexpected(Rule::term))?;
            build_term(inner, wildcards)
        }
        Rule::compound => {
            let mut it = pair.into_inner();
            let functor = it.next().ok_or(ParseError::Unexpected(Rule::compound))?;
            let args = it
                .map(|a| build_term(a, wildcards))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Term::Compound { functor: functor.as_str().to_string(), args })
        }
        Rule::atom => {
            let inner = pair.into_inner().next().ok_or(ParseError::Unexpected(Rule::atom))?;
            build_term(inner, wildcards)
        }
        Rule::atom_name | Rule::integer => Ok(Term::Atom(pair.as_str().to_string())),
        Rule::quoted_atom => Ok(Term::Atom(pair.as_str().trim_matches('\'').to_string())),
        Rule::variable => {
            let name = pair.as_str();
            // each bare `_` is its own placeholder
            if name == "_" {
                *wildcards += 1;
                Ok(Term::Var(format!("_{wildcards}")))
            } else {
                Ok(Term::Var(name.to_string()))
            }
        }
        r => Err(ParseError::Unexpected(r)),
    }
}
