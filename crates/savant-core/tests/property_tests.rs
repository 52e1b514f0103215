//! # Property-Based Tests
//!
//! Atomicity and determinism invariants of the store, checked with proptest.

use proptest::collection::vec;
use proptest::prelude::*;
use savant_core::{
    GraphError, KnowledgeGraphStore, Mutation, MutationBatch, MutationFault, Properties,
    export_graph,
};

// =============================================================================
// STRATEGIES
// =============================================================================

/// A batch entry drawn from a small id space so links often hit existing nodes.
fn mutation_strategy() -> impl Strategy<Value = Mutation> {
    let id = (0u8..12).prop_map(|n| format!("n{}", n));
    prop_oneof![
        (id.clone(), prop::sample::select(vec!["Person", "Paper", "Topic"]))
            .prop_map(|(id, label)| Mutation::add_node(id, &[label], Properties::new())),
        (id.clone(), id.clone(), prop::sample::select(vec!["KNOWS", "CITES"]))
            .prop_map(|(s, t, ty)| Mutation::add_relationship(s, t, ty)),
        (id, 0i64..100).prop_map(|(id, v)| Mutation::update_property(id, "score", v)),
    ]
}

fn batch_strategy() -> impl Strategy<Value = MutationBatch> {
    vec(mutation_strategy(), 0..20).prop_map(MutationBatch::from)
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// A batch either commits completely or leaves the store byte-identical.
    #[test]
    fn batches_are_all_or_nothing(seed in batch_strategy(), batch in batch_strategy()) {
        let store = KnowledgeGraphStore::new();
        let _ = store.apply_mutations(&seed);

        let before = export_graph(&store.snapshot()).expect("export");
        match store.apply_mutations(&batch) {
            Ok(receipt) => {
                let after = store.snapshot();
                prop_assert_eq!(after.version(), receipt.version);
                if !batch.is_empty() {
                    prop_assert_eq!(after.version(), before.version + 1);
                }
            }
            Err(err) => {
                prop_assert!(err.is_invalid_mutation());
                let after = export_graph(&store.snapshot()).expect("export");
                prop_assert_eq!(before, after);
            }
        }
    }

    /// Every committed link has both endpoints in the same snapshot.
    #[test]
    fn no_dangling_links_after_any_sequence(batches in vec(batch_strategy(), 1..8)) {
        let store = KnowledgeGraphStore::new();
        for batch in &batches {
            let _ = store.apply_mutations(batch);
        }

        let snapshot = store.snapshot();
        for link in snapshot.links() {
            prop_assert!(snapshot.contains_node(&link.source));
            prop_assert!(snapshot.contains_node(&link.target));
        }
    }

    /// The same batches in the same order produce identical exports.
    #[test]
    fn identical_input_produces_identical_graph(batches in vec(batch_strategy(), 1..6)) {
        let first = KnowledgeGraphStore::new();
        let second = KnowledgeGraphStore::new();
        for batch in &batches {
            let _ = first.apply_mutations(batch);
            let _ = second.apply_mutations(batch);
        }

        let a = export_graph(&first.snapshot()).expect("export");
        let b = export_graph(&second.snapshot()).expect("export");
        prop_assert_eq!(a, b);
    }

    /// Linking to an id nobody created always fails with a dangling-endpoint fault.
    #[test]
    fn link_to_unknown_node_fails(prefix in batch_strategy()) {
        let store = KnowledgeGraphStore::new();
        let mut batch = prefix;
        batch.push(Mutation::add_node("anchor", &[], Properties::new()));
        batch.push(Mutation::add_relationship("anchor", "never-created", "KNOWS"));

        let err = store.apply_mutations(&batch).expect_err("must fail");
        let dangling = matches!(
            err,
            GraphError::InvalidMutation {
                fault: MutationFault::DanglingTarget(_) | MutationFault::DanglingSource(_)
                    | MutationFault::UnknownNode(_),
                ..
            }
        );
        prop_assert!(dangling);
        prop_assert!(store.snapshot().is_empty());
    }
}
