use std::{env, fs};

use lexlite::{
    describe, forward_chain, parse_corpus, parse_goal, prove, trace_for, KnowledgeBase, Origin,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let path = env::args().nth(1).expect("usage: lexlite <corpus.pl> [goal]");
    let input = fs::read_to_string(path)?;

    let clauses = parse_corpus(&input)?;
    let kb = KnowledgeBase::load(&clauses)?;

    match env::args().nth(2) {
        Some(goal_text) => query(&kb, &goal_text),
        None => saturate(kb),
    }

    Ok(())
}

/// Goal mode: backward chaining, every solution with its justification.
fn query(kb: &KnowledgeBase, goal_text: &str) {
    let goal = match parse_goal(goal_text) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("bad goal: {e}");
            return;
        }
    };

    let mut proofs = prove(kb, &goal);
    let mut found = 0usize;

    for proof in proofs.by_ref() {
        found += 1;
        if proof.binding.is_empty() {
            println!("yes: {goal}");
        } else {
            let mut bindings: Vec<String> = proof
                .binding
                .iter()
                .map(|(v, t)| format!("{v} = {t}"))
                .collect();
            bindings.sort();
            println!("yes: {}", bindings.join(", "));
        }
        for line in describe(kb, &proof.trace) {
            println!("  {line}");
        }
    }

    if found == 0 {
        if proofs.depth_exceeded() {
            println!("no proof found within bounds (inference depth exceeded)");
        } else {
            println!("no");
        }
    }
}

/// No goal: saturate and print what forward chaining added, with the
/// rule that produced each fact. Output is deterministic.
fn saturate(kb: KnowledgeBase) {
    let kb = forward_chain(kb);

    let mut derived: Vec<_> = kb
        .facts()
        .filter(|(_, f)| matches!(f.origin, Origin::Derived { .. }))
        .collect();
    derived.sort_by_key(|(_, f)| f.term.to_string());

    if derived.is_empty() {
        println!("nothing new derivable.");
        return;
    }

    for (id, fact) in derived {
        println!("{}.", fact.term);
        for line in describe(&kb, &trace_for(&kb, id)) {
            println!("  % {line}");
        }
    }
}
