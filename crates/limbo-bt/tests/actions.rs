use std::rc::Rc;

use limbo_bt::{
    BehaviorTree, BtInstance, CallMethod, CheckAgentProperty, CheckTrigger, CheckVar,
    ConsolePrint, Fail, RandomWait, SetAgentProperty, SetVar, Task, Wait, WaitTicks,
};
use limbo_core::{
    BbParam, Blackboard, CheckType, HostObject, ObjectRef, Operation, PropertyBag, Status, Value,
    VariantType,
};

use Status::{Failure, Running, Success};

fn single(task: impl Task, bb: &Blackboard, agent: Option<ObjectRef>) -> BtInstance {
    let mut bt = BehaviorTree::new();
    bt.set_root_task(task);
    let scene_root = agent.clone();
    bt.instantiate(agent, bb, scene_root).unwrap()
}

fn ticks(instance: &mut BtInstance, n: usize, delta: f64) -> Vec<Status> {
    (0..n).map(|_| instance.update(delta)).collect()
}

#[test]
fn wait_counts_time_after_entry() {
    let mut instance = single(Wait::new(1.0), &Blackboard::new(), None);
    assert_eq!(ticks(&mut instance, 3, 0.5), [Running, Running, Success]);
}

#[test]
fn wait_ticks_counts_ticks() {
    let mut instance = single(WaitTicks::new(2), &Blackboard::new(), None);
    assert_eq!(ticks(&mut instance, 3, 0.0), [Running, Running, Success]);
    // A new run starts counting again.
    assert_eq!(ticks(&mut instance, 3, 0.0), [Running, Running, Success]);
}

#[test]
fn random_wait_stays_within_bounds() {
    let mut instance = single(RandomWait::new(0.2, 0.4), &Blackboard::new(), None);
    instance.set_seed(11);
    let statuses = ticks(&mut instance, 6, 0.1);
    let first_success = statuses.iter().position(|s| *s == Success).unwrap();
    assert!((2..=4).contains(&first_success), "finished at tick {first_success}");
    let duration = instance
        .tasks()
        .get::<RandomWait>(instance.root_task())
        .unwrap()
        .duration();
    assert!((0.2..=0.4).contains(&duration));
}

#[test]
fn fail_fails() {
    assert_eq!(single(Fail, &Blackboard::new(), None).update(0.1), Failure);
}

#[test]
fn console_print_substitutes_in_order() {
    assert_eq!(
        ConsolePrint::format("%s has %s hp", &[Value::from("orc"), Value::Int(12)]),
        "orc has 12 hp"
    );
    assert_eq!(
        ConsolePrint::format("%s and %s", &[Value::Int(1)]),
        "1 and %s"
    );

    let bb = Blackboard::new();
    bb.set_var("name", "orc");
    let print = ConsolePrint::new("hello %s").with_args(["name"]);
    assert_eq!(single(print, &bb, None).update(0.1), Success);
}

#[test]
fn set_var_assigns_or_combines() {
    let bb = Blackboard::new();
    bb.set_var("gold", 2);
    let add = SetVar::new("gold", BbParam::int(3)).with_operation(Operation::Addition);
    let mut instance = single(add, &bb, None);
    assert_eq!(instance.update(0.1), Success);
    assert_eq!(instance.update(0.1), Success);
    assert_eq!(bb.get_var("gold", Value::Nil, true), Value::Int(8));

    bb.set_var("source", 42);
    let copy = SetVar::new("target", BbParam::var(VariantType::Int, "source"));
    assert_eq!(single(copy, &bb, None).update(0.1), Success);
    assert_eq!(bb.get_var("target", Value::Nil, true), Value::Int(42));
}

#[test]
fn set_var_rejects_incompatible_operands() {
    let bb = Blackboard::new();
    bb.set_var("label", "x");
    let bad = SetVar::new("label", BbParam::int(1)).with_operation(Operation::BitShiftLeft);
    assert_eq!(single(bad, &bb, None).update(0.1), Failure);
    assert_eq!(bb.get_var("label", Value::Nil, true), Value::from("x"));

    let unnamed = SetVar::new("", BbParam::int(1));
    assert_eq!(single(unnamed, &bb, None).update(0.1), Failure);
}

#[test]
fn agent_properties_are_written_and_checked() {
    let agent = PropertyBag::new("agent")
        .with_property("speed", 2.0)
        .into_ref();
    let bb = Blackboard::new();

    let faster = SetAgentProperty::new("speed", BbParam::float(1.5))
        .with_operation(Operation::Multiplication);
    assert_eq!(single(faster, &bb, Some(agent.clone())).update(0.1), Success);
    assert_eq!(agent.get_property("speed"), Some(Value::Float(3.0)));

    let check = CheckAgentProperty::new("speed", CheckType::GreaterThan, BbParam::float(2.5));
    assert_eq!(single(check, &bb, Some(agent.clone())).update(0.1), Success);
    let missing = CheckAgentProperty::new("armor", CheckType::Equal, BbParam::int(0));
    assert_eq!(single(missing, &bb, Some(agent)).update(0.1), Failure);
}

#[test]
fn call_method_passes_arguments_and_stores_the_result() {
    let agent = Rc::new(
        PropertyBag::new("agent").with_method("add", |args: &[Value]| {
            let sum: f64 = args.iter().filter_map(Value::as_float).sum();
            Value::Float(sum)
        }),
    );
    let handle: ObjectRef = agent.clone();
    let bb = Blackboard::new();
    bb.set_var("bonus", 2.0);

    let call = CallMethod::new(BbParam::node(""), "add")
        .with_args(vec![
            BbParam::float(1.0),
            BbParam::var(VariantType::Float, "bonus"),
        ])
        .with_delta(true)
        .with_result_var("total");
    assert_eq!(single(call, &bb, Some(handle.clone())).update(0.5), Success);
    assert_eq!(bb.get_var("total", Value::Nil, true), Value::Float(3.5));
    assert_eq!(
        agent.calls(),
        [(
            "add".to_string(),
            vec![Value::Float(0.5), Value::Float(1.0), Value::Float(2.0)]
        )]
    );

    let unknown = CallMethod::new(BbParam::node(""), "jump");
    assert_eq!(single(unknown, &bb, Some(handle)).update(0.1), Failure);
}

#[test]
fn check_var_compares_against_a_parameter() {
    let bb = Blackboard::new();
    bb.set_var("hp", 10);
    bb.set_var("max_hp", 10);
    let full = CheckVar::new(
        "hp",
        CheckType::GreaterThanOrEqual,
        BbParam::var(VariantType::Int, "max_hp"),
    );
    assert_eq!(single(full, &bb, None).update(0.1), Success);

    let low = CheckVar::new("hp", CheckType::LessThan, BbParam::int(5));
    assert_eq!(single(low, &bb, None).update(0.1), Failure);
    let missing = CheckVar::new("mana", CheckType::Equal, BbParam::int(0));
    assert_eq!(single(missing, &bb, None).update(0.1), Failure);
}

#[test]
fn check_trigger_consumes_the_flag() {
    let bb = Blackboard::new();
    bb.set_var("alarm", true);
    let mut instance = single(CheckTrigger::new("alarm"), &bb, None);
    assert_eq!(instance.update(0.1), Success);
    assert_eq!(bb.get_var("alarm", Value::Nil, true), Value::Bool(false));
    assert_eq!(instance.update(0.1), Failure);
}

#[test]
fn generated_names_describe_the_task() {
    let set = SetVar::new("gold", BbParam::int(3)).with_operation(Operation::Addition);
    assert_eq!(set.generated_name(), "Set $gold += 3");
    let check = CheckVar::new("hp", CheckType::LessThan, BbParam::var(VariantType::Int, "low"));
    assert_eq!(check.generated_name(), "Check if: $hp < $low");
    assert_eq!(
        ConsolePrint::new("hi").generated_name(),
        "ConsolePrint \"hi\""
    );
}
