// tests/rules_engine.rs

mod common;
use crate::common::{WorkflowBuilder, add_when_succeeded};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::anyhow;
use growdag::dag::{Dag, DagExtension, Node, NodeId};
use growdag::errors::GrowdagError;
use growdag::rules::Rule;
use growdag::workflow::Workflow;

fn always_add(name: &'static str, counter: Arc<AtomicUsize>) -> Rule<String> {
    Rule::from_fns(
        name,
        Vec::new(),
        |_scope: &[NodeId], _dag: &Dag<String>| Ok(true),
        move |_scope: &[NodeId], dag: &mut DagExtension<'_, String>| {
            counter.fetch_add(1, Ordering::SeqCst);
            dag.add_node(Node::new(name, name.to_string()))?;
            Ok(())
        },
    )
}

#[test]
fn ready_rule_fires_exactly_once() {
    let counter = Arc::new(AtomicUsize::new(0));
    let mut workflow = Workflow::new(Dag::new(), vec![always_add("grow", Arc::clone(&counter))]);

    let first = workflow.apply_rules().unwrap();
    assert_eq!(first.len(), 1);
    assert!(workflow.is_applied(first[0]));
    assert!(workflow.rules().is_empty());

    let second = workflow.apply_rules().unwrap();
    assert!(second.is_empty());
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(workflow.dag().find_by_name("grow").len(), 1);
}

#[test]
fn rule_waits_until_predicate_holds() {
    let builder = WorkflowBuilder::new().node("A");
    let a = builder.id("A");
    let (mut workflow, _) = builder
        .rule(add_when_succeeded("after-A", vec![a], "B", true))
        .build();

    assert!(workflow.apply_rules().unwrap().is_empty());
    assert_eq!(workflow.rules().len(), 1);
    assert!(workflow.applied_rules().is_empty());
    assert_eq!(workflow.dag().len(), 1);
}

#[test]
fn failed_action_commits_nothing_and_rule_stays_pending() {
    let rule = Rule::from_fns(
        "half-done",
        Vec::new(),
        |_scope: &[NodeId], _dag: &Dag<String>| Ok(true),
        |_scope: &[NodeId], dag: &mut DagExtension<'_, String>| {
            dag.add_node(Node::new("orphan", "orphan".to_string()))?;
            Err(anyhow!("gave up halfway"))
        },
    );
    let rule_id = rule.id();
    let mut workflow = Workflow::new(Dag::new(), vec![rule]);

    match workflow.apply_rules() {
        Err(GrowdagError::RuleAction { rule, name, cause }) => {
            assert_eq!(rule, rule_id);
            assert_eq!(name, "half-done");
            assert!(cause.to_string().contains("halfway"));
        }
        other => panic!("expected RuleAction error, got {other:?}"),
    }
    assert!(workflow.dag().is_empty());
    assert_eq!(workflow.rules().len(), 1);
    assert!(workflow.applied_rules().is_empty());
}

#[test]
fn failing_predicate_is_reported() {
    let rule = Rule::from_fns(
        "broken",
        Vec::new(),
        |_scope: &[NodeId], _dag: &Dag<String>| Err(anyhow!("cannot decide")),
        |_scope: &[NodeId], _dag: &mut DagExtension<'_, String>| Ok(()),
    );
    let mut workflow = Workflow::new(Dag::new(), vec![rule]);

    let err = workflow.apply_rules().unwrap_err();
    assert!(matches!(err, GrowdagError::RuleEvaluation { .. }), "{err:?}");
    assert!(err.to_string().contains("cannot decide"));
}

#[test]
fn predicates_see_the_graph_from_before_the_round() {
    // The second rule fires only if it can see the node the first rule adds.
    // Within one round it must not.
    let first = Rule::from_fns(
        "add-x",
        Vec::new(),
        |_scope: &[NodeId], _dag: &Dag<String>| Ok(true),
        |_scope: &[NodeId], dag: &mut DagExtension<'_, String>| {
            dag.add_node(Node::new("x", "x".to_string()))?;
            Ok(())
        },
    );
    let second = Rule::from_fns(
        "needs-x",
        Vec::new(),
        |_scope: &[NodeId], dag: &Dag<String>| Ok(!dag.find_by_name("x").is_empty()),
        |_scope: &[NodeId], dag: &mut DagExtension<'_, String>| {
            dag.add_node(Node::new("y", "y".to_string()))?;
            Ok(())
        },
    );
    let mut workflow = Workflow::new(Dag::new(), vec![first, second]);

    assert_eq!(workflow.apply_rules().unwrap().len(), 1);
    assert!(workflow.dag().find_by_name("y").is_empty());

    assert_eq!(workflow.apply_rules().unwrap().len(), 1);
    assert_eq!(workflow.dag().find_by_name("y").len(), 1);
}

#[test]
fn actions_see_the_graph_from_before_the_round() {
    let seen = Arc::new(AtomicUsize::new(usize::MAX));
    let first = always_add("x", Arc::new(AtomicUsize::new(0)));
    let second = {
        let seen = Arc::clone(&seen);
        Rule::from_fns(
            "extend-x",
            Vec::new(),
            |_scope: &[NodeId], _dag: &Dag<String>| Ok(true),
            move |_scope: &[NodeId], dag: &mut DagExtension<'_, String>| {
                let xs = dag.dag().find_by_name("x");
                seen.store(xs.len(), Ordering::SeqCst);
                if !xs.is_empty() {
                    dag.add_node_after("y", "y".to_string(), &xs)?;
                }
                Ok(())
            },
        )
    };
    let mut workflow = Workflow::new(Dag::new(), vec![first, second]);

    assert_eq!(workflow.apply_rules().unwrap().len(), 2);
    assert_eq!(seen.load(Ordering::SeqCst), 0);
    assert_eq!(workflow.dag().find_by_name("x").len(), 1);
    assert!(workflow.dag().find_by_name("y").is_empty());
}

#[test]
fn failing_action_keeps_earlier_actions_of_the_round() {
    let counter = Arc::new(AtomicUsize::new(0));
    let broken = Rule::from_fns(
        "broken",
        Vec::new(),
        |_scope: &[NodeId], _dag: &Dag<String>| Ok(true),
        |_scope: &[NodeId], dag: &mut DagExtension<'_, String>| {
            dag.add_node(Node::new("half", "half".to_string()))?;
            Err(anyhow!("no luck"))
        },
    );
    let later = always_add("later", Arc::clone(&counter));
    let mut workflow = Workflow::new(
        Dag::new(),
        vec![always_add("early", Arc::clone(&counter)), broken, later],
    );

    let err = workflow.apply_rules().unwrap_err();
    assert!(matches!(err, GrowdagError::RuleAction { .. }), "{err:?}");

    let names: Vec<&str> = workflow.dag().nodes().map(|n| n.name()).collect();
    assert_eq!(names, ["early"]);
    assert_eq!(workflow.applied_rules().len(), 1);
    let pending: Vec<&str> = workflow.rules().iter().map(|r| r.name()).collect();
    assert_eq!(pending, ["broken", "later"]);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn actions_apply_in_registration_order() {
    let counter = Arc::new(AtomicUsize::new(0));
    let rules = vec![
        always_add("one", Arc::clone(&counter)),
        always_add("two", Arc::clone(&counter)),
        always_add("three", Arc::clone(&counter)),
    ];
    let ids: Vec<_> = rules.iter().map(Rule::id).collect();
    let mut workflow = Workflow::new(Dag::new(), rules);

    assert_eq!(workflow.apply_rules().unwrap(), ids);
    let names: Vec<&str> = workflow.dag().nodes().map(|n| n.name()).collect();
    assert_eq!(names, ["one", "two", "three"]);
}

#[test]
fn extension_rejects_cycles_and_unknown_dependencies() {
    let builder = WorkflowBuilder::new().node("A").node_after("B", &["A"]);
    let (a, b) = (builder.id("A"), builder.id("B"));
    let rule = Rule::from_fns(
        "close-cycle",
        vec![a, b],
        |_scope: &[NodeId], _dag: &Dag<String>| Ok(true),
        |scope: &[NodeId], dag: &mut DagExtension<'_, String>| {
            let staged = dag.add_node_after("C", "C".to_string(), &[scope[1]])?;
            assert!(matches!(
                dag.add_edge(staged, scope[0]),
                Err(GrowdagError::CycleDetected { .. })
            ));
            assert!(matches!(
                dag.add_node_after("D", "D".to_string(), &[NodeId::new()]),
                Err(GrowdagError::UnknownNode(_))
            ));
            assert_eq!(dag.staged_nodes(), vec![staged]);
            Ok(())
        },
    );
    let (mut workflow, _) = builder.rule(rule).build();

    workflow.apply_rules().unwrap();
    let c = workflow.dag().find_by_name("C")[0];
    assert_eq!(workflow.dag().predecessors(c), vec![b]);
    assert!(workflow.dag().find_by_name("D").is_empty());
}
