// SPDX-License-Identifier: MIT

//! Sequential execution, data routing and error conversion.

use crate::prelude::*;

#[test]
fn linear_two_state_run_skips_unreferenced_sibling() {
    // Root with A wired to the root outcome and B left dangling.
    let root = StateRef::new(State::hierarchy("root").with_id("ROOT"));
    root.write().add_outcome("done").unwrap();
    root.add_child(quick_leaf("A")).unwrap();
    root.add_child(quick_leaf("B")).unwrap();
    root.set_start_state(Some(StateId::new("A"))).unwrap();
    root.add_transition(Some(StateId::new("A")), Some(0), None, Some(0)).unwrap();
    let machine = machine(root);

    assert_eq!(run(&machine), Some(0));

    let b = machine.root().read().child(&StateId::new("B")).unwrap();
    assert!(b.read().run.run_id.is_none(), "B must never be activated");
    assert_eq!(b.read().run.status, machina_core::ExecutionStatus::Inactive);
}

#[test]
fn data_flows_carry_sibling_outputs() {
    let root = StateRef::new(State::hierarchy("root").with_id("ROOT"));
    root.write().add_outcome("done").unwrap();
    root.write().add_output_port("total", DataType::Int, None).unwrap();

    let mut producer = State::execution("produce").with_id("P");
    producer.add_outcome("done").unwrap();
    producer.add_output_port("n", DataType::Int, None).unwrap();
    let producer = producer.with_body(|ctx: &mut LeafContext<'_>| -> LeafResult {
        ctx.set_output("n", json!(20));
        Ok(LeafReturn::Id(0))
    });

    let mut consumer = State::execution("consume").with_id("C");
    consumer.add_outcome("done").unwrap();
    consumer.add_input_port("n", DataType::Int, Some(json!(1))).unwrap();
    consumer.add_output_port("doubled", DataType::Int, None).unwrap();
    let consumer = consumer.with_body(|ctx: &mut LeafContext<'_>| -> LeafResult {
        let n = ctx.input("n").and_then(Value::as_i64).unwrap_or(0);
        ctx.set_output("doubled", json!(n * 2));
        Ok(LeafReturn::Id(0))
    });

    root.add_child(producer).unwrap();
    root.add_child(consumer).unwrap();
    root.set_start_state(Some(StateId::new("P"))).unwrap();
    root.add_transition(Some(StateId::new("P")), Some(0), Some(StateId::new("C")), None).unwrap();
    root.add_transition(Some(StateId::new("C")), Some(0), None, Some(0)).unwrap();
    // P.n -> C.n, C.doubled -> root.total
    root.add_data_flow(StateId::new("P"), 0, StateId::new("C"), 0).unwrap();
    root.add_data_flow(StateId::new("C"), 1, StateId::new("ROOT"), 0).unwrap();

    let machine = machine(root);
    assert_eq!(run(&machine), Some(0));
    let total = machine.root().read().run.output_data.get("total").cloned();
    assert_eq!(total, Some(json!(40)));
}

#[test]
fn scoped_variables_accumulate_across_children() {
    let root = StateRef::new(State::hierarchy("root").with_id("ROOT"));
    root.write().add_outcome("done").unwrap();
    root.add_scoped_variable("acc", DataType::Int, Some(json!(5))).unwrap();

    let mut bump = State::execution("bump").with_id("A");
    bump.add_outcome("done").unwrap();
    let bump = bump.with_body(|ctx: &mut LeafContext<'_>| -> LeafResult {
        let current = ctx.scoped().get("acc").and_then(|v| v.as_i64()).unwrap_or(0);
        assert!(ctx.scoped().set("acc", json!(current + 1)));
        Ok(LeafReturn::Id(0))
    });

    let mut check = State::execution("check").with_id("B");
    check.add_outcome("done").unwrap();
    check.add_output_port("seen", DataType::Int, None).unwrap();
    let check = check.with_body(|ctx: &mut LeafContext<'_>| -> LeafResult {
        ctx.set_output("seen", ctx.scoped().get("acc").unwrap_or(Value::Null));
        Ok(LeafReturn::Id(0))
    });

    root.add_child(bump).unwrap();
    root.add_child(check).unwrap();
    root.set_start_state(Some(StateId::new("A"))).unwrap();
    root.add_transition(Some(StateId::new("A")), Some(0), Some(StateId::new("B")), None).unwrap();
    root.add_transition(Some(StateId::new("B")), Some(0), None, Some(0)).unwrap();

    let machine = machine(root);
    assert_eq!(run(&machine), Some(0));
    let b = machine.root().read().child(&StateId::new("B")).unwrap();
    assert_eq!(b.read().run.output_data.get("seen"), Some(&json!(6)));
}

#[test]
fn dollar_defaults_resolve_through_the_global_store() {
    let build = || {
        let root = StateRef::new(State::hierarchy("root").with_id("ROOT"));
        root.write().add_outcome("done").unwrap();
        let mut leaf = State::execution("reader").with_id("A");
        leaf.add_outcome("done").unwrap();
        leaf.add_input_port("port", DataType::Any, Some(json!("$x"))).unwrap();
        leaf.add_output_port("seen", DataType::Any, None).unwrap();
        let leaf = leaf.with_body(|ctx: &mut LeafContext<'_>| -> LeafResult {
            ctx.set_output("seen", ctx.input("port").cloned().unwrap_or(Value::Null));
            Ok(LeafReturn::Id(0))
        });
        root.add_child(leaf).unwrap();
        root.set_start_state(Some(StateId::new("A"))).unwrap();
        root.add_transition(Some(StateId::new("A")), Some(0), None, Some(0)).unwrap();
        machine(root)
    };

    let engine = ExecutionEngine::new();
    engine.globals().set("x", json!(42)).unwrap();
    let machine = build();
    assert_eq!(run_on(&engine, &machine), Some(0));
    let a = machine.root().read().child(&StateId::new("A")).unwrap();
    assert_eq!(a.read().run.output_data.get("seen"), Some(&json!(42)));

    // Deleting the global downgrades the default to null (and logs).
    engine.globals().delete("x").unwrap();
    assert_eq!(run_on(&engine, &machine), Some(0));
    let a = machine.root().read().child(&StateId::new("A")).unwrap();
    assert_eq!(a.read().run.output_data.get("seen"), Some(&Value::Null));
}

#[test]
fn raising_leaf_aborts_with_error_output() {
    let root = StateRef::new(State::hierarchy("root").with_id("ROOT"));
    root.write().add_outcome("done").unwrap();
    let mut failing = State::execution("boom").with_id("A");
    failing.add_outcome("done").unwrap();
    failing.add_output_port("error", DataType::Any, None).unwrap();
    let failing = failing.with_body(|_ctx: &mut LeafContext<'_>| -> LeafResult {
        Err("sensor offline".into())
    });
    root.add_child(failing).unwrap();
    root.set_start_state(Some(StateId::new("A"))).unwrap();
    let machine = machine(root);

    // The error never crosses the state: the container sees only -1.
    assert_eq!(run(&machine), Some(OUTCOME_ABORTED));
    let a = machine.root().read().child(&StateId::new("A")).unwrap();
    assert_eq!(a.read().run.output_data.get("error"), Some(&json!("sensor offline")));
}

#[test]
fn unknown_returned_outcome_aborts() {
    let root = StateRef::new(State::hierarchy("root").with_id("ROOT"));
    root.write().add_outcome("done").unwrap();
    let mut leaf = State::execution("off").with_id("A");
    leaf.add_outcome("done").unwrap();
    let leaf = leaf.with_body(|_ctx: &mut LeafContext<'_>| -> LeafResult {
        Ok(LeafReturn::Name("no-such-outcome".to_string()))
    });
    root.add_child(leaf).unwrap();
    root.set_start_state(Some(StateId::new("A"))).unwrap();
    let machine = machine(root);

    assert_eq!(run(&machine), Some(OUTCOME_ABORTED));
}

#[test]
fn outcome_names_resolve_like_ids() {
    let root = chain(vec![{
        let mut leaf = State::execution("named").with_id("A");
        leaf.add_outcome("done").unwrap();
        leaf.with_body(|_ctx: &mut LeafContext<'_>| -> LeafResult {
            Ok(LeafReturn::Name("done".to_string()))
        })
    }]);
    assert_eq!(run(&machine(root)), Some(0));
}

#[test]
fn empty_container_terminates_with_aborted() {
    let root = StateRef::new(State::hierarchy("root").with_id("ROOT"));
    let machine = machine(root);
    assert_eq!(run(&machine), Some(OUTCOME_ABORTED));
}

#[test]
fn library_reference_delegates_and_maps_ports() {
    let mut inner = State::execution("increment").with_id("IMPL");
    inner.add_outcome("done").unwrap();
    inner.add_input_port("x", DataType::Int, Some(json!(1))).unwrap();
    inner.add_output_port("y", DataType::Int, None).unwrap();
    let inner = inner.with_body(|ctx: &mut LeafContext<'_>| -> LeafResult {
        let x = ctx.input("x").and_then(Value::as_i64).unwrap_or(0);
        ctx.set_output("y", json!(x + 1));
        Ok(LeafReturn::Id(0))
    });

    let registry = machina_core::LibraryRegistry::new();
    registry.register("math/increment", inner);

    let mut lib = registry.instantiate("math/increment", "inc").unwrap().with_id("LIB");
    lib.set_use_runtime_value(0, true).unwrap();
    lib.set_runtime_value(0, json!(5)).unwrap();

    let root = StateRef::new(State::hierarchy("root").with_id("ROOT"));
    root.write().add_outcome("done").unwrap();
    root.write().add_output_port("out", DataType::Int, None).unwrap();
    root.add_child(lib).unwrap();
    root.set_start_state(Some(StateId::new("LIB"))).unwrap();
    root.add_transition(Some(StateId::new("LIB")), Some(0), None, Some(0)).unwrap();
    root.add_data_flow(StateId::new("LIB"), 1, StateId::new("ROOT"), 0).unwrap();

    let machine = machine(root);
    assert_eq!(run(&machine), Some(0));
    let out = machine.root().read().run.output_data.get("out").cloned();
    assert_eq!(out, Some(json!(6)));
}
