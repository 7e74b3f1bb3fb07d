// tests/checkpoint_codec.rs

mod common;
use crate::common::{FakeBackend, Script, WorkflowBuilder, fast_options, json_hooks, with_timeout};

use serde_json::{Value, json};
use tempfile::tempdir;

use growdag::codec::{
    CheckpointHooks, CheckpointTree, OpaqueHooks, OpaqueKind, SENTINEL_KEY, decode,
    decode_detached, encode, load_tree, save, to_bytes,
};
use growdag::dag::{Dag, DagExtension, Node, NodeId, NodeState};
use growdag::engine::{RetryPolicy, RunOptions, Runner, Termination};
use growdag::errors::{GrowdagError, Result};
use growdag::exec::Backend;
use growdag::rules::Rule;
use growdag::workflow::Workflow;

fn sample_workflow() -> growdag::workflow::Workflow<String> {
    WorkflowBuilder::new()
        .node("A")
        .node("B")
        .node_after("C", &["A", "B"])
        .rule_when_succeeded("after-C", &["C"], "D", true)
        .build()
        .0
}

#[test]
fn fresh_workflow_round_trips_byte_for_byte() {
    let hooks = json_hooks();
    let workflow = sample_workflow();

    let tree = encode(&workflow, &hooks).unwrap();
    let restored = decode_detached(&tree, &hooks, None).unwrap();
    let again = encode(&restored, &hooks).unwrap();

    assert_eq!(to_bytes(&tree).unwrap(), to_bytes(&again).unwrap());
    assert_eq!(restored.rules().len(), 1);
    assert_eq!(restored.rules()[0].id(), workflow.rules()[0].id());
    let names: Vec<&str> = restored.dag().nodes().map(|n| n.name()).collect();
    assert_eq!(names, ["A", "B", "C"]);
    assert_eq!(restored.dag().edges(), workflow.dag().edges());
}

#[test]
fn tree_has_the_documented_shape() {
    let hooks = json_hooks();
    let tree = encode(&sample_workflow(), &hooks).unwrap();

    let node = &tree["dag"]["nodes"][0];
    assert_eq!(node["name"], json!("A"));
    assert_eq!(node["task"], json!("A"));
    assert_eq!(node["state"], json!("DEFINED"));
    assert_eq!(node["proxy"], Value::Null);
    assert!(node["timestamps"]["defined"].is_string());
    assert!(node["timestamps"]["submit"].is_null());
    assert!(node["timestamps"]
        .as_object()
        .unwrap()
        .contains_key("ready by"));

    assert_eq!(tree["dag"]["edges"].as_array().unwrap().len(), 2);
    assert_eq!(tree["rules"][0]["kind"], json!("add-when-succeeded"));
    assert_eq!(tree["applied"], json!([]));
}

#[tokio::test]
async fn run_workflow_round_trips_with_reattached_proxies() {
    let backend = FakeBackend::new();
    let hooks = json_hooks();
    let report = with_timeout(
        Runner::new(&backend)
            .options(fast_options())
            .run(sample_workflow()),
    )
    .await;
    assert!(report.is_success(), "{:?}", report.termination);

    let tree = encode(&report.workflow, &hooks).unwrap();
    let restored =
        decode_detached(&tree, &hooks, Some(&backend as &dyn Backend<String>)).unwrap();
    let again = encode(&restored, &hooks).unwrap();

    assert_eq!(to_bytes(&tree).unwrap(), to_bytes(&again).unwrap());
    assert_eq!(restored.applied_rules().len(), 1);
    let d = restored.dag().find_by_name("D")[0];
    assert_eq!(restored.dag().result_of(d).unwrap(), json!("D:done"));
}

#[test]
fn opaque_hooks_write_sentinels() {
    let workflow = sample_workflow();
    let tree = encode(&workflow, &OpaqueHooks).unwrap();

    assert_eq!(tree["dag"]["nodes"][0]["task"][SENTINEL_KEY], json!("task"));
    assert_eq!(tree["rules"][0], json!({ "unserializable": "rule" }));

    match decode_detached::<String>(&tree, &OpaqueHooks, None) {
        Err(GrowdagError::Unserializable { what, .. }) => assert_eq!(what, OpaqueKind::Task),
        other => panic!("expected Unserializable, got {other:?}"),
    }
}

#[test]
fn unregistered_rule_kind_is_saved_as_opaque() {
    let hooks = json_hooks();
    let closure_rule = Rule::from_fns(
        "ad-hoc",
        Vec::new(),
        |_scope: &[NodeId], _dag: &Dag<String>| Ok(true),
        |_scope: &[NodeId], _dag: &mut DagExtension<'_, String>| Ok(()),
    );
    let (workflow, _) = WorkflowBuilder::new().node("A").rule(closure_rule).build();

    let tree = encode(&workflow, &hooks).unwrap();
    assert_eq!(tree["rules"][0], json!({ "unserializable": "rule" }));
    assert_eq!(tree["dag"]["nodes"][0]["task"], json!("A"));

    match decode_detached(&tree, &hooks, None) {
        Err(GrowdagError::Unserializable { what, .. }) => assert_eq!(what, OpaqueKind::Rule),
        other => panic!("expected Unserializable, got {other:?}"),
    }
}

/// Tolerant hooks: tasks are optional strings and anything saved as opaque
/// comes back as a placeholder.
struct PlaceholderHooks;

impl CheckpointHooks<Option<String>> for PlaceholderHooks {
    fn deserialize_task(&self, data: &Value) -> Result<Option<String>> {
        Ok(data.as_str().map(str::to_string))
    }

    fn restore_opaque_task(&self, _context: &str) -> Result<Option<String>> {
        Ok(None)
    }

    fn restore_opaque_rule(&self, context: &str) -> Result<Rule<Option<String>>> {
        Ok(Rule::from_fns(
            format!("placeholder ({context})"),
            Vec::new(),
            |_scope: &[NodeId], _dag: &Dag<Option<String>>| Ok(false),
            |_scope: &[NodeId], _dag: &mut DagExtension<'_, Option<String>>| Ok(()),
        ))
    }
}

#[test]
fn hooks_can_restore_opaque_tasks_and_rules() {
    let mut dag = Dag::new();
    let a = dag.add_node(Node::new("A", Some("a".to_string()))).unwrap();
    let b = dag.add_node(Node::new("B", None)).unwrap();
    dag.add_edge(a, b).unwrap();
    let rule = Rule::from_fns(
        "ad-hoc",
        vec![a],
        |_scope: &[NodeId], _dag: &Dag<Option<String>>| Ok(true),
        |_scope: &[NodeId], _dag: &mut DagExtension<'_, Option<String>>| Ok(()),
    );
    let workflow = Workflow::new(dag, vec![rule]);

    let tree = encode(&workflow, &OpaqueHooks).unwrap();
    assert_eq!(tree["dag"]["nodes"][0]["task"], json!({ "unserializable": "task" }));
    assert!(decode_detached::<Option<String>>(&tree, &OpaqueHooks, None).is_err());

    let restored = decode_detached::<Option<String>>(&tree, &PlaceholderHooks, None).unwrap();
    let names: Vec<&str> = restored.dag().nodes().map(|n| n.name()).collect();
    assert_eq!(names, ["A", "B"]);
    assert!(restored.dag().nodes().all(|n| n.task().is_none()));
    assert_eq!(restored.dag().edges(), vec![(a, b)]);
    assert_eq!(restored.dag().state_of(a), Some(NodeState::Defined));
    assert_eq!(
        restored.dag().node(a).unwrap().define_time(),
        workflow.dag().node(a).unwrap().define_time()
    );
    assert_eq!(restored.rules().len(), 1);
    assert!(restored.rules()[0].name().starts_with("placeholder"));
}

#[test]
fn unknown_state_name_is_rejected() {
    let hooks = json_hooks();
    let mut tree = encode(&sample_workflow(), &hooks).unwrap();
    tree["dag"]["nodes"][1]["state"] = json!("HALF_DONE");

    match decode_detached(&tree, &hooks, None) {
        Err(GrowdagError::UnknownState(s)) => assert_eq!(s, "HALF_DONE"),
        other => panic!("expected UnknownState, got {other:?}"),
    }
}

#[test]
fn malformed_tree_is_rejected() {
    let hooks = json_hooks();
    let err = decode_detached(&json!({ "nodes": [] }), &hooks, None).unwrap_err();
    assert!(matches!(err, GrowdagError::MalformedCheckpoint(_)), "{err:?}");
}

#[test]
fn opaque_proxy_restores_node_without_one() {
    let hooks = json_hooks();
    let mut tree = encode(&sample_workflow(), &hooks).unwrap();
    tree["dag"]["nodes"][0]["state"] = json!("SUBMITTED");
    tree["dag"]["nodes"][0]["proxy"] = json!({ "unserializable": "proxy" });

    let restored = decode_detached(&tree, &hooks, None).unwrap();
    let a = restored.dag().find_by_name("A")[0];
    let node = restored.dag().node(a).unwrap();
    assert_eq!(node.state(), NodeState::Submitted);
    assert!(node.proxy().is_none());
}

#[tokio::test]
async fn decode_with_backend_reconciles_stale_states() {
    let backend =
        FakeBackend::new().with_script("A", Script::succeed(json!("late")).running_for(1));
    let hooks = json_hooks();
    let (workflow, ids) = WorkflowBuilder::new().node("A").build();

    let options = RunOptions {
        max_iterations: Some(1),
        ..fast_options()
    };
    let report = with_timeout(Runner::new(&backend).options(options).run(workflow)).await;
    assert!(matches!(report.termination, Termination::IterationLimit(1)));
    assert_eq!(
        report.workflow.dag().state_of(ids["A"]),
        Some(NodeState::Running)
    );

    let tree = encode(&report.workflow, &hooks).unwrap();

    let detached = decode_detached(&tree, &hooks, None).unwrap();
    assert_eq!(detached.dag().state_of(ids["A"]), Some(NodeState::Running));

    let live = decode(&tree, &hooks, Some(&backend as &dyn Backend<String>))
        .await
        .unwrap();
    assert_eq!(live.dag().state_of(ids["A"]), Some(NodeState::Success));
    assert_eq!(live.dag().result_of(ids["A"]).unwrap(), json!("late"));
    assert!(live.dag().node(ids["A"]).unwrap().ready_by_time().is_some());
}

#[tokio::test]
async fn reconcile_poll_errors_do_not_count_against_the_next_run() {
    let backend =
        FakeBackend::new().with_script("A", Script::succeed(json!("ok")).poll_errors(3));
    let hooks = json_hooks();
    let (workflow, ids) = WorkflowBuilder::new().node("A").build();

    let first = RunOptions {
        max_iterations: Some(1),
        ..fast_options()
    };
    let report = with_timeout(Runner::new(&backend).options(first).run(workflow)).await;
    assert_eq!(
        report.workflow.dag().state_of(ids["A"]),
        Some(NodeState::Submitted)
    );

    // The reconcile poll is the second failed poll in a row.
    let tree = encode(&report.workflow, &hooks).unwrap();
    let live = decode(&tree, &hooks, Some(&backend as &dyn Backend<String>))
        .await
        .unwrap();
    assert_eq!(live.dag().state_of(ids["A"]), Some(NodeState::Submitted));

    let second = RunOptions {
        retry: RetryPolicy {
            max_poll_failures: 2,
            ..fast_options().retry
        },
        ..fast_options()
    };
    let report = with_timeout(Runner::new(&backend).options(second).run(live)).await;
    assert!(report.is_success(), "{:?}", report.termination);
    assert_eq!(report.workflow.dag().result_of(ids["A"]).unwrap(), json!("ok"));
}

#[test]
fn save_and_load_from_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("checkpoint.json");
    let hooks = json_hooks();
    let workflow = sample_workflow();

    save(&workflow, &hooks, &path).unwrap();
    let tree = load_tree(&path).unwrap();

    assert_eq!(tree, encode(&workflow, &hooks).unwrap());
    let parsed = CheckpointTree::from_value(&tree).unwrap();
    assert_eq!(parsed.dag.nodes.len(), 3);
    assert_eq!(parsed.rules.len(), 1);
}
