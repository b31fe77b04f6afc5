#![cfg(all(feature = "bt", feature = "hsm", feature = "goap"))]

use std::rc::Rc;

use limbo::bt::{BehaviorTree, Sequence, SetVar, Task};
use limbo::core::{BbParam, Status, Value};
use limbo::goap::{GoapAction, GoapGoal, RunGoapPlan, RunGoapPlanConfig};
use limbo::hsm::{BtState, Hsm, LimboState};

fn tree_of(task: impl Task) -> Rc<BehaviorTree> {
    let mut bt = BehaviorTree::new();
    bt.set_root_task(task);
    Rc::new(bt)
}

fn attack_tree() -> Rc<BehaviorTree> {
    let mut bt = BehaviorTree::new().with_description("attack");
    let seq = bt.set_root_task(Sequence::new());
    bt.tasks_mut()
        .spawn(seq, SetVar::new("target_dead", BbParam::bool(true)))
        .unwrap();
    bt.tasks_mut()
        .spawn(seq, SetVar::new("enemy_visible", BbParam::bool(false)))
        .unwrap();
    Rc::new(bt)
}

#[test]
fn guard_patrols_plans_an_attack_and_returns() {
    let combat_plan = RunGoapPlan::new(GoapGoal::new("KillTarget").with_target("target_dead", true))
        .with_action(
            GoapAction::new("DrawWeapon")
                .with_effect("armed", true)
                .with_execution_tree(tree_of(SetVar::new("armed", BbParam::bool(true)))),
        )
        .with_action(
            GoapAction::new("Attack")
                .with_precondition("armed", true)
                .with_effect("target_dead", true)
                .with_execution_tree(attack_tree()),
        )
        .with_config(RunGoapPlanConfig::default().with_replan_cooldown(0.0));
    let combat = BtState::new("Combat", tree_of(combat_plan));
    let combat_tree = combat.handle();

    let patrol = LimboState::leaf("Patrol").on_update(|ctx| {
        if ctx.blackboard().get_var("enemy_visible", Value::Nil, false).truthy() {
            ctx.dispatch("enemy_seen");
        }
    });

    let mut hsm = Hsm::new(LimboState::machine("Guard"));
    let root = hsm.root();
    let patrolling = hsm.add_state(root, patrol).unwrap();
    let fighting = hsm.add_state(root, combat.into_state()).unwrap();
    hsm.add_transition(root, patrolling, fighting, "enemy_seen").unwrap();
    hsm.add_transition(root, fighting, patrolling, "success").unwrap();
    hsm.initialize(None, None).unwrap();

    let bb = hsm.blackboard(root).unwrap().clone();
    bb.set_var("enemy_visible", false);
    bb.set_var("armed", false);
    bb.set_var("target_dead", false);
    hsm.set_active(true).unwrap();

    hsm.update(0.1);
    assert_eq!(hsm.active_state(root), Some(patrolling));

    bb.set_var("enemy_visible", true);
    hsm.update(0.1);
    assert_eq!(hsm.active_state(root), Some(fighting));

    hsm.update(0.1);
    assert_eq!(combat_tree.last_status(), Status::Running);
    assert_eq!(bb.get_var("armed", Value::Nil, false), Value::Bool(true));

    // Leaving Combat aborts its tree, so the finished run is no longer visible on the handle.
    hsm.update(0.1);
    assert_eq!(combat_tree.last_status(), Status::Fresh);
    assert_eq!(bb.get_var("target_dead", Value::Nil, false), Value::Bool(true));
    assert_eq!(hsm.active_state(root), Some(patrolling));
    assert_eq!(hsm.previous_active_state(root), Some(fighting));
}
