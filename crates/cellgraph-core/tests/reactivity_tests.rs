use cellgraph_core::{ActionError, LogHandle, Path, Scheduler, Value, ViewValue};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn p(s: &str) -> Path {
    s.parse().unwrap()
}

#[tokio::test]
async fn test_action_follows_alias_to_source_cell() {
    let scheduler = Scheduler::new();
    let source = scheduler.cell(Value::from_json(json!({"value": 1})));
    let holder = scheduler.cell(Value::empty_map());
    holder
        .set_at_path(&p("input"), Value::alias_in(&source, p("value")), None)
        .unwrap();

    let h = holder.clone();
    scheduler.add_action("double", move |log: &LogHandle| {
        let input = h.view(&p("input"), Some(log))?.as_f64().unwrap_or_default();
        h.set_at_path(&p("output"), input * 2.0, Some(log))?;
        Ok::<(), ActionError>(())
    });
    scheduler.idle().await.unwrap();
    assert_eq!(holder.get_at_path(&p("output")), 2.into());

    source.set_at_path(&p("value"), 5, None).unwrap();
    scheduler.idle().await.unwrap();
    assert_eq!(holder.get_at_path(&p("output")), 10.into());
}

#[tokio::test]
async fn test_rebinding_alias_retriggers() {
    let scheduler = Scheduler::new();
    let a = scheduler.cell(Value::from_json(json!({"v": "a"})));
    let b = scheduler.cell(Value::from_json(json!({"v": "b"})));
    let holder = scheduler.cell(Value::empty_map());
    holder
        .set_at_path(&p("src"), Value::alias_in(&a, p("v")), None)
        .unwrap();

    let h = holder.clone();
    scheduler.add_action("copy", move |log| {
        let value = h.view(&p("src"), Some(log))?.to_value()?;
        h.set_at_path(&p("dst"), value, Some(log))?;
        Ok(())
    });
    scheduler.idle().await.unwrap();
    assert_eq!(holder.get_at_path(&p("dst")), "a".into());

    holder
        .set_at_path(&p("src"), Value::alias_in(&b, p("v")), None)
        .unwrap();
    scheduler.idle().await.unwrap();
    assert_eq!(holder.get_at_path(&p("dst")), "b".into());

    // The old source no longer matters.
    a.set_at_path(&p("v"), "changed", None).unwrap();
    scheduler.idle().await.unwrap();
    assert_eq!(holder.get_at_path(&p("dst")), "b".into());
}

#[tokio::test]
async fn test_push_through_view_triggers_list_reader_once() {
    let scheduler = Scheduler::new();
    let cell = scheduler.cell(Value::from_json(json!({"items": [1], "total": 0})));
    let runs = Arc::new(AtomicUsize::new(0));

    let (c, r) = (cell.clone(), Arc::clone(&runs));
    scheduler.add_action("sum", move |log| {
        r.fetch_add(1, Ordering::SeqCst);
        let ViewValue::Structured(items) = c.view(&p("items"), Some(log))? else {
            return Err(ActionError::Failed("items is not a list".into()));
        };
        let total: f64 = items.to_vec()?.iter().filter_map(Value::as_f64).sum();
        c.set_at_path(&p("total"), total, Some(log))?;
        Ok(())
    });
    scheduler.idle().await.unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    let ViewValue::Structured(items) = cell.view(&p("items"), None).unwrap() else {
        panic!("expected list");
    };
    items.push(2).unwrap();
    items.push(3).unwrap();
    scheduler.idle().await.unwrap();

    assert_eq!(cell.get_at_path(&p("total")), 6.into());
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_simple_cell_writes_propagate() {
    let scheduler = Scheduler::new();
    let cell = scheduler.cell(Value::from_json(json!({"in": 1})));
    let c = cell.clone();
    scheduler.add_action("inc", move |log| {
        let n = c.as_simple_cell(p("in"), Some(log)).get()?.as_f64().unwrap_or_default();
        c.as_simple_cell(p("out"), Some(log)).set(n + 1.0)?;
        Ok(())
    });
    scheduler.idle().await.unwrap();
    cell.as_simple_cell(p("in"), None).set(41).unwrap();
    scheduler.idle().await.unwrap();
    assert_eq!(cell.get_at_path(&p("out")), 42.into());
}
