use cellgraph_core::{ActionError, Scheduler, Value};
use cellgraph_recipe::{InstanceState, Node, Recipe, RecipeError, Runner};
use cellgraph_test_utils::{
    alias, doubling_recipe, inner_doubling_recipe, inner_passthrough_recipe, json_value,
    nested_recipe, passthrough_recipe, path, sample_registry,
};
use pretty_assertions::assert_eq;
use serde_json::json;

#[tokio::test]
async fn test_passthrough_copies_input() {
    let instance = Runner::default()
        .run(&passthrough_recipe(), Value::Undefined)
        .unwrap();
    instance.settle().await.unwrap();

    assert_eq!(instance.get().unwrap().to_json(), json!({"input": 1, "output": 1}));
}

#[tokio::test]
async fn test_function_node_doubles_value() {
    let instance = Runner::default()
        .run(&doubling_recipe(), Value::Undefined)
        .unwrap();
    instance.settle().await.unwrap();

    assert_eq!(instance.get().unwrap().to_json(), json!({"value": 1, "result": 2}));
}

#[tokio::test]
async fn test_nested_passthrough() {
    let instance = Runner::default()
        .run(&nested_recipe(inner_passthrough_recipe(), 5), Value::Undefined)
        .unwrap();
    instance.settle().await.unwrap();

    assert_eq!(instance.get().unwrap().to_json(), json!({"value": 5, "result": 5}));
    assert_eq!(instance.children().len(), 1);
    assert_eq!(instance.children()[0].state(), InstanceState::Settled);
}

#[tokio::test]
async fn test_nested_doubling() {
    let instance = Runner::default()
        .run(&nested_recipe(inner_doubling_recipe(), 1), Value::Undefined)
        .unwrap();
    instance.settle().await.unwrap();

    assert_eq!(instance.get().unwrap().to_json(), json!({"value": 1, "result": 2}));
}

#[tokio::test]
async fn test_bindings_override_initial() {
    let bindings = json_value(json!({"input": 7, "extra": true}));
    let instance = Runner::default()
        .run(&passthrough_recipe(), bindings)
        .unwrap();
    instance.settle().await.unwrap();

    assert_eq!(
        instance.get().unwrap().to_json(),
        json!({"input": 7, "output": 7, "extra": true})
    );
}

#[tokio::test]
async fn test_input_change_reruns_node() {
    let instance = Runner::default()
        .run(&doubling_recipe(), Value::Undefined)
        .unwrap();
    instance.settle().await.unwrap();

    instance.root().set_at_path(&path("value"), 21, None).unwrap();
    instance.settle().await.unwrap();

    assert_eq!(instance.root().get_at_path(&path("result")), 42.into());
    assert_eq!(instance.state(), InstanceState::Settled);
}

#[tokio::test]
async fn test_outer_change_reaches_nested_recipe() {
    let instance = Runner::default()
        .run(&nested_recipe(inner_doubling_recipe(), 1), Value::Undefined)
        .unwrap();
    instance.settle().await.unwrap();

    instance.root().set_at_path(&path("value"), 4, None).unwrap();
    instance.settle().await.unwrap();

    assert_eq!(instance.get().unwrap().to_json(), json!({"value": 4, "result": 8}));
}

#[tokio::test]
async fn test_chained_nodes_settle_in_one_call() {
    let registry = sample_registry();
    let recipe = Recipe::from_json_str(
        &json!({
            "name": "chain",
            "initial": {"value": 3},
            "nodes": [
                {"module": {"type": "function", "name": "increment"},
                 "inputs": {"$alias": {"path": ["doubled"]}},
                 "outputs": {"$alias": {"path": ["result"]}}},
                {"module": {"type": "function", "name": "double"},
                 "inputs": {"$alias": {"path": ["value"]}},
                 "outputs": {"$alias": {"path": ["doubled"]}}}
            ]
        })
        .to_string(),
        &registry,
    )
    .unwrap();

    let instance = Runner::default().run(&recipe, Value::Undefined).unwrap();
    instance.settle().await.unwrap();

    assert_eq!(
        instance.get().unwrap().to_json(),
        json!({"value": 3, "doubled": 6, "result": 7})
    );
    assert!(instance.node_errors().is_empty());
}

#[tokio::test]
async fn test_sequence_inputs_track_every_element() {
    let registry = sample_registry();
    let recipe = Recipe::new(json_value(json!({"a": 1, "b": 2})))
        .with_node(Node::new(
            cellgraph_recipe::Module::Function {
                name: "sum".into(),
                run: registry.get("sum").unwrap(),
            },
            Value::Sequence(vec![alias("a"), alias("b")]),
            alias("total"),
        ));

    let instance = Runner::default().run(&recipe, Value::Undefined).unwrap();
    instance.settle().await.unwrap();
    assert_eq!(instance.root().get_at_path(&path("total")), 3.into());

    instance.root().set_at_path(&path("b"), 10, None).unwrap();
    instance.settle().await.unwrap();
    assert_eq!(instance.root().get_at_path(&path("total")), 11.into());
}

#[tokio::test]
async fn test_nested_definition_from_json() {
    let recipe = Recipe::from_json_str(
        &json!({
            "initial": {"value": 5},
            "nodes": [{
                "module": {"type": "recipe", "implementation": {
                    "name": "inner",
                    "nodes": [{
                        "module": {"type": "function", "name": "double"},
                        "inputs": {"$alias": {"path": ["input"]}},
                        "outputs": {"$alias": {"path": ["output"]}}
                    }]
                }},
                "inputs": {"input": {"$alias": {"path": ["value"]}}},
                "outputs": {"output": {"$alias": {"path": ["result"]}}}
            }]
        })
        .to_string(),
        &sample_registry(),
    )
    .unwrap();

    let instance = Runner::default().run(&recipe, Value::Undefined).unwrap();
    instance.settle().await.unwrap();

    assert_eq!(instance.get().unwrap().to_json(), json!({"value": 5, "result": 10}));
    assert_eq!(instance.children()[0].name(), "inner");
}

#[tokio::test]
async fn test_failing_node_is_reported_without_blocking_others() {
    let recipe = Recipe::from_json_str(
        &json!({
            "initial": {"value": 2},
            "nodes": [
                {"module": {"type": "function", "name": "fail"},
                 "inputs": {"$alias": {"path": ["value"]}},
                 "outputs": {"$alias": {"path": ["broken"]}}},
                {"module": {"type": "function", "name": "double"},
                 "inputs": {"$alias": {"path": ["value"]}},
                 "outputs": {"$alias": {"path": ["result"]}}}
            ]
        })
        .to_string(),
        &sample_registry(),
    )
    .unwrap();

    let instance = Runner::default().run(&recipe, Value::Undefined).unwrap();
    instance.settle().await.unwrap();

    assert_eq!(instance.root().get_at_path(&path("result")), 4.into());
    let errors = instance.node_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].node, "recipe#0:fail");
    assert!(matches!(errors[0].error, ActionError::Failed(_)));
}

#[tokio::test]
async fn test_invalid_input_type_is_a_node_error() {
    let instance = Runner::default()
        .run(&doubling_recipe(), json_value(json!({"value": "one"})))
        .unwrap();
    instance.settle().await.unwrap();

    assert!(instance.root().get_at_path(&path("result")).is_undefined());
    assert_eq!(instance.node_errors().len(), 1);
}

#[tokio::test]
async fn test_teardown_unregisters_and_is_terminal() {
    let scheduler = Scheduler::new();
    let runner = Runner::new(scheduler.clone());
    let instance = runner
        .run(&nested_recipe(inner_doubling_recipe(), 1), Value::Undefined)
        .unwrap();
    assert_eq!(scheduler.action_count(), 1);

    instance.teardown().unwrap();
    assert_eq!(scheduler.action_count(), 0);
    assert_eq!(instance.state(), InstanceState::TornDown);
    assert_eq!(instance.children()[0].state(), InstanceState::TornDown);

    assert_eq!(
        instance.teardown(),
        Err(RecipeError::IllegalTransition {
            from: InstanceState::TornDown,
            to: InstanceState::TornDown,
        })
    );
    assert!(matches!(
        instance.settle().await,
        Err(RecipeError::IllegalTransition { .. })
    ));
}

#[tokio::test]
async fn test_teardown_after_child_teardown_unregisters_parent() {
    let scheduler = Scheduler::new();
    let runner = Runner::new(scheduler.clone());
    let recipe = nested_recipe(inner_passthrough_recipe(), 1)
        .with_node(Node::passthrough(alias("value"), alias("copy")));
    let instance = runner.run(&recipe, Value::Undefined).unwrap();
    instance.settle().await.unwrap();
    assert_eq!(scheduler.action_count(), 2);

    instance.children()[0].teardown().unwrap();
    assert_eq!(scheduler.action_count(), 1);

    instance.teardown().unwrap();
    assert_eq!(scheduler.action_count(), 0);
    assert_eq!(instance.state(), InstanceState::TornDown);

    instance.root().set_at_path(&path("value"), 5, None).unwrap();
    scheduler.idle().await.unwrap();
    assert_eq!(instance.root().get_at_path(&path("copy")), 1.into());
}

#[tokio::test]
async fn test_torn_down_instance_stops_reacting() {
    let instance = Runner::default()
        .run(&doubling_recipe(), Value::Undefined)
        .unwrap();
    instance.settle().await.unwrap();
    instance.teardown().unwrap();

    instance.root().set_at_path(&path("value"), 9, None).unwrap();
    instance.scheduler().idle().await.unwrap();
    assert_eq!(instance.root().get_at_path(&path("result")), 2.into());
}

#[tokio::test]
async fn test_instances_share_a_scheduler() {
    let runner = Runner::default();
    let first = runner.run(&doubling_recipe(), Value::Undefined).unwrap();
    let second = runner
        .run(&doubling_recipe(), json_value(json!({"value": 10})))
        .unwrap();
    assert_eq!(runner.scheduler().action_count(), 2);

    first.settle().await.unwrap();
    second.settle().await.unwrap();

    assert_eq!(first.root().get_at_path(&path("result")), 2.into());
    assert_eq!(second.root().get_at_path(&path("result")), 20.into());
}
