use dp_analysis::graph::{AttributedGraph, Attributes};
use dp_analysis::{compute_metrics, Dag};
use proptest::prelude::*;
use std::collections::HashMap;

/// Random DAG: edges only go from lower to higher index, so any subset is acyclic.
fn dag_strategy() -> impl Strategy<Value = (Vec<u64>, Vec<(usize, usize)>)> {
    (1usize..16).prop_flat_map(|n| {
        let costs = prop::collection::vec(1u64..50, n);
        let edges = prop::collection::vec((0..n, 0..n), 0..(n * 2));
        (costs, edges)
    })
}

fn build(costs: &[u64], edges: &[(usize, usize)], label: impl Fn(usize) -> String) -> AttributedGraph {
    let mut g = AttributedGraph::new("prop");
    for (i, c) in costs.iter().enumerate() {
        g.add_node(&label(i), Attributes::with_cost(*c));
    }
    for &(a, b) in edges {
        let (u, v) = if a <= b { (a, b) } else { (b, a) };
        // u == v becomes a self-loop, which must be ignored
        g.add_edge(&label(u), &label(v), Attributes::new()).unwrap();
    }
    g
}

proptest! {
    #[test]
    fn work_is_sum_of_costs_and_relabel_invariant((costs, edges) in dag_strategy()) {
        let g = build(&costs, &edges, |i| format!("t{i}"));
        let h = build(&costs, &edges, |i| format!("renamed_{}", costs.len() - i));
        let mg = compute_metrics(&g, &[1]).unwrap();
        let mh = compute_metrics(&h, &[1]).unwrap();
        prop_assert_eq!(mg.work, costs.iter().sum::<u64>());
        prop_assert_eq!(mg.work, mh.work);
        prop_assert_eq!(mg.span, mh.span);
    }

    #[test]
    fn span_is_bounded((costs, edges) in dag_strategy()) {
        let g = build(&costs, &edges, |i| format!("t{i}"));
        let m = compute_metrics(&g, &[1]).unwrap();
        let max_single = costs.iter().copied().max().unwrap_or(0);
        prop_assert!(m.span >= max_single);
        prop_assert!(m.span <= m.work);
        let along: u64 = m.critical_path.iter().map(|n| g.node(n).map(|x| x.cost()).unwrap_or(0)).sum();
        prop_assert_eq!(along, m.span);
        prop_assert!(m.parallelism_ratio >= 1.0 - 1e-9);
    }

    #[test]
    fn critical_path_follows_edges((costs, edges) in dag_strategy()) {
        let g = build(&costs, &edges, |i| format!("t{i}"));
        let m = compute_metrics(&g, &[]).unwrap();
        for w in m.critical_path.windows(2) {
            let linked = g.edges().iter().any(|e| e.source == w[0] && e.target == w[1]);
            prop_assert!(linked, "{} -> {} is not an edge", w[0], w[1]);
        }
    }

    #[test]
    fn generations_partition_nodes_and_follow_edges((costs, edges) in dag_strategy()) {
        let g = build(&costs, &edges, |i| format!("t{i}"));
        let m = compute_metrics(&g, &[]).unwrap();
        let mut gen_of: HashMap<&str, usize> = HashMap::new();
        for (k, s) in m.stages.iter().enumerate() {
            for n in &s.nodes {
                prop_assert!(gen_of.insert(n.as_str(), k).is_none(), "{} listed twice", n);
            }
        }
        prop_assert_eq!(gen_of.len(), g.node_count());
        for e in g.edges().iter().filter(|e| !e.is_self_loop()) {
            prop_assert!(gen_of[e.source.as_str()] < gen_of[e.target.as_str()]);
        }
        // earliest layer: every node past the first has a predecessor one layer up
        for e_target in m.stages.iter().skip(1).flat_map(|s| s.nodes.iter()) {
            let k = gen_of[e_target.as_str()];
            let has_prev = g
                .edges()
                .iter()
                .any(|e| &e.target == e_target && !e.is_self_loop() && gen_of[e.source.as_str()] == k - 1);
            prop_assert!(has_prev);
        }
    }

    #[test]
    fn self_loops_never_count((costs, edges) in dag_strategy()) {
        let g = build(&costs, &edges, |i| format!("t{i}"));
        let dag = Dag::new(&g).unwrap();
        prop_assert_eq!(dag.self_loops_removed(), g.self_loop_count());
        prop_assert_eq!(dag.edge_count(), g.edge_count() - g.self_loop_count());
    }
}

#[test]
fn single_chain_has_unit_ratio() {
    let g = dp_analysis::graph::fixtures::chain(&[5, 1, 7, 2]);
    let m = compute_metrics(&g, &[1]).unwrap();
    assert_eq!(m.work, m.span);
    assert!((m.parallelism_ratio - 1.0).abs() < 1e-9);
}
