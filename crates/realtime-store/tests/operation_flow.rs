use std::cell::RefCell;
use std::rc::Rc;

use realtime_store::{
    BaseModelEvent, Bridge, Collaborative, EventHandler, EventType, Model, ObjectId, ObjectKind,
    OpComponent, Operation, ReplicaConfig, Sequencer, SequencerBridge, StoreError, Value,
};

fn model() -> Model {
    Model::new(ReplicaConfig::with_session("alice", "s-alice"))
}

fn replica(sequencer: &Rc<RefCell<Sequencer>>, user: &str, session: &str) -> Model {
    let config = ReplicaConfig::with_session(user, session);
    let bridge = SequencerBridge::new(Rc::clone(sequencer), &config);
    Model::with_bridge(config, Box::new(bridge))
}

// ── Echo on acknowledgement ────────────────────────────────────────────────

#[test]
fn local_creation_is_registered_after_pump() {
    let mut model = model();
    let id = model.create_string("abc").expect("create");
    assert!(!model.contains(&id));
    assert!(id.as_str().starts_with("s-alice."));

    assert_eq!(model.pump().expect("pump"), 2);
    assert_eq!(model.get_string(&id).expect("string").text(), "abc");
}

#[test]
fn local_edit_is_invisible_until_echoed() {
    let mut model = model();
    let id = model.create_string("abc").expect("create");
    model.pump().expect("pump");

    model.string(&id).expect("handle").insert(3, "d").expect("insert");
    assert_eq!(model.get_string(&id).expect("string").text(), "abc");

    model.pump().expect("pump");
    assert_eq!(model.get_string(&id).expect("string").text(), "abcd");
}

#[test]
fn handles_edit_every_variant() {
    let mut model = model();
    let text = model.create_string("héllo").expect("string");
    let list = model
        .create_list(vec![Value::from(1), Value::from(2), Value::from(3)])
        .expect("list");
    let map = model
        .create_map([("a", Value::from(1)), ("b", Value::from(2))])
        .expect("map");
    model.pump().expect("pump");

    {
        let mut s = model.string(&text).expect("handle");
        s.delete(1, 1).expect("delete");
        s.insert(1, "e").expect("insert");
    }
    {
        let mut l = model.list(&list).expect("handle");
        l.set(0, 10).expect("set");
        l.push("end").expect("push");
        l.delete(1, 1).expect("delete");
    }
    {
        let mut root = model.root().expect("root");
        root.set_ref("list", &list).expect("set ref");
    }
    {
        let mut m = model.map(&map).expect("handle");
        m.remove("a").expect("remove");
        m.remove("missing").expect("remove absent");
        m.set("c", true).expect("set");
    }
    model.pump().expect("pump");

    assert_eq!(model.get_string(&text).expect("string").text(), "hello");
    assert_eq!(
        model.get_list(&list).expect("list").values(),
        &[Value::from(10), Value::from(3), Value::from("end")]
    );
    let root = model.get_map(&model.root_id()).expect("root");
    assert_eq!(root.get("list"), Some(&Value::Ref(list.clone())));
    let map = model.get_map(&map).expect("map");
    assert_eq!(map.keys().collect::<Vec<_>>(), vec!["b", "c"]);
}

#[test]
fn set_text_replaces_content() {
    let mut model = model();
    let id = model.create_string("old").expect("create");
    model.pump().expect("pump");
    model.string(&id).expect("handle").set_text("new").expect("set");
    model.pump().expect("pump");
    assert_eq!(model.get_string(&id).expect("string").text(), "new");
}

#[test]
fn consecutive_appends_keep_submission_order() {
    let mut model = model();
    let text = model.create_string("").expect("string");
    let list = model.create_list(vec![]).expect("list");
    model.pump().expect("pump");

    {
        let mut s = model.string(&text).expect("handle");
        s.append("x").expect("append");
        s.append("y").expect("append");
        assert_eq!(s.text(), "xy");
    }
    // A fresh handle still sees the edits in flight.
    model.string(&text).expect("handle").append("z").expect("append");
    {
        let mut l = model.list(&list).expect("handle");
        l.push(1).expect("push");
        l.push(2).expect("push");
    }
    model.list(&list).expect("handle").push(3).expect("push");
    assert_eq!(model.get_string(&text).expect("string").text(), "");

    assert_eq!(model.pump().expect("pump"), 6);
    assert_eq!(model.get_string(&text).expect("string").text(), "xyz");
    assert_eq!(
        model.get_list(&list).expect("list").values(),
        &[Value::from(1), Value::from(2), Value::from(3)]
    );
}

#[test]
fn repeated_clear_submits_once_and_pump_succeeds() {
    let mut model = model();
    let list = model.create_list(vec![Value::from(1)]).expect("list");
    model.pump().expect("pump");

    model.list(&list).expect("handle").clear().expect("clear");
    model.list(&list).expect("handle").clear().expect("clear again");

    assert_eq!(model.pump().expect("pump"), 1);
    assert!(model.get_list(&list).expect("list").is_empty());
}

#[test]
fn deletes_between_pumps_index_into_pending_state() {
    let mut model = model();
    let text = model.create_string("abcdef").expect("string");
    let list = model
        .create_list((0..4i64).map(Value::from).collect())
        .expect("list");
    model.pump().expect("pump");

    {
        let mut s = model.string(&text).expect("handle");
        s.delete(0, 2).expect("delete");
        s.delete(0, 2).expect("delete");
        let err = s.delete(1, 5).expect_err("only two chars remain");
        assert!(matches!(err, StoreError::OutOfBounds { .. }));
    }
    {
        let mut l = model.list(&list).expect("handle");
        l.delete(3, 1).expect("delete last");
        l.set(2, 20).expect("set new last");
        let err = l.set(3, 30).expect_err("index 3 is gone");
        assert!(matches!(err, StoreError::OutOfBounds { .. }));
    }
    {
        let mut m = model.root().expect("root");
        m.set("k", 1).expect("set");
        m.remove("k").expect("remove pending key");
    }

    model.pump().expect("pump");
    assert_eq!(model.get_string(&text).expect("string").text(), "ef");
    assert_eq!(
        model.get_list(&list).expect("list").values(),
        &[Value::from(0), Value::from(1), Value::from(20)]
    );
    assert!(!model.get_map(&model.root_id()).expect("root").contains_key("k"));
}

#[test]
fn created_object_is_editable_before_pump() {
    let mut model = model();
    let text = model.create_string("ab").expect("string");
    model.string(&text).expect("handle").append("c").expect("append");

    assert_eq!(model.pump().expect("pump"), 3);
    assert_eq!(model.get_string(&text).expect("string").text(), "abc");
}

#[test]
fn model_submission_is_checked_against_pending_state() {
    let mut model = model();
    let list = model.create_list(vec![Value::from(1)]).expect("list");
    model.pump().expect("pump");

    model
        .consume_and_submit(Operation::new(
            list.clone(),
            OpComponent::ListDelete { index: 0, len: 1 },
        ))
        .expect("delete");
    let err = model
        .consume_and_submit(Operation::new(
            list.clone(),
            OpComponent::ListDelete { index: 0, len: 1 },
        ))
        .expect_err("nothing left to delete");
    assert!(matches!(err, StoreError::OutOfBounds { .. }));

    assert_eq!(model.pump().expect("pump"), 1);
    assert!(model.get_list(&list).expect("list").is_empty());
}

#[test]
fn replicas_converge_with_several_edits_per_pump() {
    let sequencer = Sequencer::shared();
    let mut alice = replica(&sequencer, "alice", "s-alice");
    let mut bob = replica(&sequencer, "bob", "s-bob");

    let text = alice.create_string("").expect("create");
    alice.pump().expect("pump");
    bob.pump().expect("pump");

    {
        let mut s = alice.string(&text).expect("handle");
        s.append("ab").expect("append");
        s.append("cd").expect("append");
    }
    alice.pump().expect("pump");
    bob.pump().expect("pump");

    assert_eq!(alice.get_string(&text).expect("string").text(), "abcd");
    assert_eq!(bob.get_string(&text).expect("string").text(), "abcd");
}

// ── Rejections ─────────────────────────────────────────────────────────────

#[test]
fn foreign_operation_is_unsupported() {
    let mut model = model();
    let id = ObjectId::from("s");
    model
        .consume("bob", "s-bob", Operation::create(id.clone(), ObjectKind::String))
        .expect("create");

    let err = model
        .consume(
            "bob",
            "s-bob",
            Operation::new(
                id.clone(),
                OpComponent::MapSet {
                    key: "k".into(),
                    value: None,
                },
            ),
        )
        .expect_err("map op on a string");
    assert!(matches!(
        err,
        StoreError::UnsupportedOperation {
            kind: ObjectKind::String,
            operation: "map_set",
            ..
        }
    ));
    assert_eq!(model.document().pending_events(), 0);
}

#[test]
fn operation_for_another_object_is_rejected() {
    let mut model = model();
    let id = ObjectId::from("s");
    model
        .consume("bob", "s-bob", Operation::create(id.clone(), ObjectKind::String))
        .expect("create");
    let mut detached = model.object(&id).expect("object").clone();

    let stray = Operation::new(
        ObjectId::from("other"),
        OpComponent::StringInsert {
            index: 0,
            text: "x".into(),
        },
    );
    let err = detached
        .consume(model.document_mut(), "bob", "s-bob", stray.clone())
        .expect_err("wrong target");
    assert!(matches!(err, StoreError::MisroutedOperation { .. }));

    let err = detached
        .consume_and_submit(model.bridge_mut(), stray)
        .expect_err("wrong target");
    assert!(matches!(err, StoreError::MisroutedOperation { .. }));

    assert_eq!(model.document().pending_events(), 0);
    assert_eq!(model.pump().expect("pump"), 0);
}

#[test]
fn out_of_bounds_operation_leaves_state_untouched() {
    let mut model = model();
    let id = ObjectId::from("l");
    model
        .consume("bob", "s-bob", Operation::create(id.clone(), ObjectKind::List))
        .expect("create");
    model
        .consume(
            "bob",
            "s-bob",
            Operation::new(
                id.clone(),
                OpComponent::ListInsert {
                    index: 0,
                    values: vec![Value::from(1), Value::from(2)],
                },
            ),
        )
        .expect("insert");
    model.flush_events();

    let err = model
        .consume(
            "bob",
            "s-bob",
            Operation::new(id.clone(), OpComponent::ListDelete { index: 1, len: 5 }),
        )
        .expect_err("delete past the end");
    assert!(matches!(err, StoreError::OutOfBounds { .. }));
    assert_eq!(model.get_list(&id).expect("list").len(), 2);
    assert_eq!(model.document().pending_events(), 0);
}

#[test]
fn handles_validate_before_submitting() {
    let mut model = model();
    let id = model.create_string("ab").expect("create");
    model.pump().expect("pump");

    let err = model
        .string(&id)
        .expect("handle")
        .insert(3, "x")
        .expect_err("insert past the end");
    assert!(matches!(err, StoreError::OutOfBounds { .. }));
    assert_eq!(model.pump().expect("pump"), 0);
}

#[test]
fn handle_of_the_wrong_kind_is_rejected() {
    let mut model = model();
    let id = model.create_string("x").expect("create");
    model.pump().expect("pump");
    let err = model.list(&id).err().expect("wrong kind");
    assert!(matches!(
        err,
        StoreError::WrongType {
            expected: ObjectKind::List,
            actual: ObjectKind::String,
            ..
        }
    ));
}

#[test]
fn pump_stops_at_rejected_operation_but_flushes_earlier_events() {
    let mut model = model();
    let id = model.create_list(vec![]).expect("create");
    model.pump().expect("pump");

    let hits = Rc::new(RefCell::new(0));
    let h = Rc::clone(&hits);
    model
        .add_object_changed_listener(&id, EventHandler::new(move |_| *h.borrow_mut() += 1))
        .expect("listen");

    model.list(&id).expect("handle").push(1).expect("push");
    model
        .bridge_mut()
        .consume_and_submit(Operation::new(
            ObjectId::from("ghost"),
            OpComponent::ListDelete { index: 0, len: 1 },
        ))
        .expect("bridge accepts anything");
    model.list(&id).expect("handle").push(2).expect("push");

    let err = model.pump().expect_err("ghost target");
    assert!(matches!(err, StoreError::NotFound(_)));
    assert_eq!(*hits.borrow(), 1);
    assert_eq!(model.get_list(&id).expect("list").len(), 1);

    // The remainder is still queued.
    assert_eq!(model.pump().expect("pump"), 1);
    assert_eq!(model.get_list(&id).expect("list").len(), 2);
}

// ── Sequenced replicas ─────────────────────────────────────────────────────

#[test]
fn replicas_converge_through_a_shared_sequencer() {
    let sequencer = Sequencer::shared();
    let mut alice = replica(&sequencer, "alice", "s-alice");
    let mut bob = replica(&sequencer, "bob", "s-bob");

    let list = alice.create_list(vec![]).expect("create");
    alice.pump().expect("pump");
    bob.pump().expect("pump");
    assert!(bob.contains(&list));

    alice.root().expect("root").set_ref("items", &list).expect("link");
    alice.list(&list).expect("handle").push("a").expect("push");
    bob.list(&list).expect("handle").push("b").expect("push");

    alice.pump().expect("pump");
    bob.pump().expect("pump");

    let expected = [Value::from("b"), Value::from("a")];
    assert_eq!(alice.get_list(&list).expect("list").values(), &expected);
    assert_eq!(bob.get_list(&list).expect("list").values(), &expected);
    assert_eq!(
        alice.describe(&alice.root_id()).expect("describe"),
        bob.describe(&bob.root_id()).expect("describe")
    );
}

#[test]
fn remote_events_carry_the_author_session() {
    let sequencer = Sequencer::shared();
    let mut alice = replica(&sequencer, "alice", "s-alice");
    let mut bob = replica(&sequencer, "bob", "s-bob");

    let text = alice.create_string("").expect("create");
    alice.pump().expect("pump");
    bob.pump().expect("pump");

    let seen: Rc<RefCell<Vec<BaseModelEvent>>> = Rc::default();
    let sink = Rc::clone(&seen);
    bob.add_event_listener(
        &text,
        EventType::TextInserted,
        EventHandler::new(move |e| sink.borrow_mut().push(e.clone())),
        false,
    )
    .expect("listen");

    alice.string(&text).expect("handle").append("hi").expect("append");
    alice.pump().expect("pump");
    bob.pump().expect("pump");

    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].user_id(), "alice");
    assert_eq!(seen[0].session_id(), "s-alice");
}

#[test]
fn sequencer_bridge_tracks_own_pending_submissions() {
    let sequencer = Sequencer::shared();
    let config = ReplicaConfig::with_session("alice", "s-alice");
    let mut bridge = SequencerBridge::new(Rc::clone(&sequencer), &config);

    let op = Operation::create(ObjectId::from("x"), ObjectKind::Map);
    bridge.consume_and_submit(op.clone()).expect("submit");
    assert_eq!(bridge.pending(), 1);
    assert_eq!(sequencer.borrow().len(), 1);

    let echoed = bridge.poll().expect("echo");
    assert_eq!(echoed.seq, 1);
    assert_eq!(echoed.session_id, "s-alice");
    assert_eq!(echoed.operation, op);
    assert_eq!(bridge.pending(), 0);
    assert!(bridge.poll().is_none());
}

// ── Snapshots ──────────────────────────────────────────────────────────────

fn populated() -> Model {
    let mut model = model();
    let text = model.create_string("notes").expect("string");
    let list = model
        .create_list(vec![Value::from(1), Value::from("two")])
        .expect("list");
    model.pump().expect("pump");
    {
        let mut root = model.root().expect("root");
        root.set_ref("text", &text).expect("link");
        root.set_ref("list", &list).expect("link");
        root.set("title", "doc").expect("set");
    }
    model.list(&list).expect("handle").push(list.clone()).expect("self link");
    model.pump().expect("pump");
    model
}

#[test]
fn snapshot_rebuilds_an_equivalent_model() {
    let original = populated();
    let restored = Model::load(
        ReplicaConfig::with_session("carol", "s-carol"),
        original.snapshot(),
    )
    .expect("load");

    assert_eq!(restored.len(), original.len());
    assert_eq!(
        restored.describe(&restored.root_id()).expect("describe"),
        original.describe(&original.root_id()).expect("describe")
    );
}

#[test]
fn operation_log_round_trips_a_model() {
    let original = populated();
    let bytes = original.to_operation_log().expect("encode");
    let restored =
        Model::from_operation_log(ReplicaConfig::with_session("carol", "s-carol"), &bytes)
            .expect("decode");

    assert_eq!(
        restored.describe(&restored.root_id()).expect("describe"),
        original.describe(&original.root_id()).expect("describe")
    );
}

#[test]
fn corrupt_operation_log_is_rejected() {
    let err = Model::from_operation_log(ReplicaConfig::default(), &[9, 0, 0])
        .expect_err("bad version");
    assert!(matches!(err, StoreError::Log(_)));
}
