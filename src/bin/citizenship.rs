use std::fs;

use lexlite::{describe, forward_chain, parse_corpus, parse_goal, prove_first, KnowledgeBase};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let input = fs::read_to_string("corpus/family_law.pl")?;

    // 1) parse + load
    let kb = KnowledgeBase::load(&parse_corpus(&input)?)?;

    // 2) forward chain to fixpoint
    let full = forward_chain(kb.clone());
    println!("{} facts after saturation ({} asserted).", full.fact_count(), kb.fact_count());

    // 3) check entailment of a grandchild's citizenship
    let goal = parse_goal("citizen(noor)")?;
    println!("Entails citizen(noor)? {}", full.has_fact(&goal));

    // 4) prove the same goal against the unsaturated base and explain it
    let proof = prove_first(&kb, &goal)?;
    for line in describe(&kb, &proof.trace) {
        println!("  {line}");
    }

    Ok(())
}
