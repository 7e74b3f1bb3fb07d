// tests/dag_acyclic_property.rs

use proptest::prelude::*;

use growdag::dag::{Dag, Node, NodeId};
use growdag::errors::GrowdagError;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

// Arbitrary edge requests between node indices; some will close cycles and
// must be rejected.
fn edge_requests(max_nodes: usize) -> impl Strategy<Value = (usize, Vec<(usize, usize)>)> {
    (1..=max_nodes).prop_flat_map(|n| {
        (
            Just(n),
            proptest::collection::vec((0..n, 0..n), 0..(n * 3)),
        )
    })
}

proptest! {
    #[test]
    fn dag_stays_acyclic_under_arbitrary_edges((n, requests) in edge_requests(12)) {
        let mut dag: Dag<usize> = Dag::new();
        let ids: Vec<NodeId> = (0..n)
            .map(|i| dag.add_node(Node::new(format!("n{i}"), i)).unwrap())
            .collect();

        for (from, to) in requests {
            let before = dag.edges();
            match dag.add_edge(ids[from], ids[to]) {
                Ok(()) => {}
                Err(GrowdagError::CycleDetected { .. }) => {
                    prop_assert_eq!(dag.edges(), before);
                }
                Err(e) => prop_assert!(false, "unexpected error: {e:?}"),
            }
        }

        let mut check: DiGraphMap<NodeId, ()> = DiGraphMap::new();
        for id in &ids {
            check.add_node(*id);
        }
        for (from, to) in dag.edges() {
            check.add_edge(from, to, ());
        }
        prop_assert!(toposort(&check, None).is_ok());
    }

    #[test]
    fn forward_edges_are_always_accepted((n, requests) in edge_requests(12)) {
        let mut dag: Dag<usize> = Dag::new();
        let ids: Vec<NodeId> = (0..n)
            .map(|i| dag.add_node(Node::new(format!("n{i}"), i)).unwrap())
            .collect();

        for (a, b) in requests {
            if a == b {
                continue;
            }
            let (from, to) = if a < b { (a, b) } else { (b, a) };
            prop_assert!(dag.add_edge(ids[from], ids[to]).is_ok());
        }
    }
}
