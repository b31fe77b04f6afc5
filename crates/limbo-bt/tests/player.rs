use std::cell::{Cell, RefCell};
use std::rc::Rc;

use limbo_bt::{BehaviorTree, BtError, CustomTask, BtPlayer, BtPlayerConfig, SetVar, UpdateMode, WaitTicks};
use limbo_core::{BbParam, BbVariable, BlackboardPlan, Operation, Status, Value};

fn counting_tree() -> Rc<BehaviorTree> {
    let mut plan = BlackboardPlan::new();
    plan.add_var("runs", BbVariable::with_value(0)).unwrap();
    let mut bt = BehaviorTree::new().with_description("counter");
    bt.set_root_task(SetVar::new("runs", BbParam::int(1)).with_operation(Operation::Addition));
    bt.set_blackboard_plan(Some(plan.into_shared()));
    Rc::new(bt)
}

#[test]
fn player_populates_its_blackboard_from_the_tree_plan() {
    let mut player = BtPlayer::new(counting_tree());
    player.initialize(None, None).unwrap();
    assert_eq!(player.blackboard().get_var("runs", Value::Nil, true), Value::Int(0));
    assert!(player.blackboard_plan().borrow().is_derived());

    player.update(0.1);
    player.update(0.1);
    assert_eq!(player.blackboard().get_var("runs", Value::Nil, true), Value::Int(2));
}

#[test]
fn values_set_before_initialize_are_kept() {
    let mut player = BtPlayer::new(counting_tree());
    player.blackboard().set_var("runs", 10);
    player.initialize(None, None).unwrap();
    player.update(0.1);
    assert_eq!(player.blackboard().get_var("runs", Value::Nil, true), Value::Int(11));
}

#[test]
fn auto_restart_off_stops_after_the_first_finish() {
    let finished = Rc::new(RefCell::new(Vec::new()));
    let sink = finished.clone();
    let mut player = BtPlayer::with_config(
        counting_tree(),
        BtPlayerConfig::default().with_auto_restart(false),
    );
    player.on_finished(move |status| sink.borrow_mut().push(status));
    player.initialize(None, None).unwrap();

    assert_eq!(player.update(0.1), Some(Status::Success));
    assert!(!player.is_active());
    assert_eq!(player.update(0.1), None);
    assert_eq!(*finished.borrow(), [Status::Success]);

    player.restart();
    assert!(player.is_active());
    assert_eq!(player.update(0.1), Some(Status::Success));
    assert_eq!(player.blackboard().get_var("runs", Value::Nil, true), Value::Int(2));
}

#[test]
fn notifications_follow_the_update_mode() {
    let mut bt = BehaviorTree::new();
    bt.set_root_task(WaitTicks::new(10));
    let mut player = BtPlayer::new(Rc::new(bt));
    player.initialize(None, None).unwrap();
    assert_eq!(player.update_mode(), UpdateMode::Physics);

    assert_eq!(player.notify_process(0.1), None);
    assert_eq!(player.notify_physics_process(0.1), Some(Status::Running));

    player.set_update_mode(UpdateMode::Manual);
    assert_eq!(player.notify_physics_process(0.1), None);
    assert_eq!(player.update(0.1), Some(Status::Running));

    player.set_update_mode(UpdateMode::Idle);
    assert_eq!(player.notify_process(0.1), Some(Status::Running));
    assert_eq!(player.last_status(), Status::Running);
}

#[test]
fn updated_listeners_see_every_tick() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let mut bt = BehaviorTree::new();
    bt.set_root_task(WaitTicks::new(1));
    let mut player = BtPlayer::new(Rc::new(bt));
    player.on_updated(move |status| sink.borrow_mut().push(status));
    player.initialize(None, None).unwrap();
    for _ in 0..3 {
        player.update(0.1);
    }
    assert_eq!(
        *seen.borrow(),
        [Status::Running, Status::Success, Status::Running]
    );
}

#[test]
fn inactive_or_uninitialized_players_do_nothing() {
    let mut player = BtPlayer::new(counting_tree());
    assert_eq!(player.update(0.1), None);
    player.initialize(None, None).unwrap();
    player.set_active(false);
    assert_eq!(player.update(0.1), None);
    assert_eq!(player.last_status(), Status::Fresh);
}

#[test]
fn tree_without_root_cannot_be_initialized() {
    let mut player = BtPlayer::new(Rc::new(BehaviorTree::new()));
    assert_eq!(player.initialize(None, None), Err(BtError::NoRootTask));
    assert!(player.instance().is_none());
}

#[test]
fn initializing_again_exits_the_running_tree() {
    let exits = Rc::new(Cell::new(0));
    let counter = exits.clone();
    let mut bt = BehaviorTree::new();
    bt.set_root_task(
        CustomTask::action("Endless")
            .on_exit(move |_| counter.set(counter.get() + 1))
            .on_tick(|_| Status::Running),
    );
    let mut player = BtPlayer::new(Rc::new(bt));
    player.initialize(None, None).unwrap();
    assert_eq!(player.update(0.1), Some(Status::Running));

    player.initialize(None, None).unwrap();
    assert_eq!(exits.get(), 1);
}
