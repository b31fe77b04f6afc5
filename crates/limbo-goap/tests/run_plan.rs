#![cfg(feature = "bt")]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use limbo_bt::{BehaviorTree, BtInstance, CheckVar, CustomTask, Sequence, SetVar, Task, Wait};
use limbo_core::{BbParam, Blackboard, CheckType, Status, Value};
use limbo_goap::{GoapAction, GoapGoal, RunGoapPlan, RunGoapPlanConfig, MAX_NESTING_DEPTH};
use limbo_tools::{SharedTraceSink, TraceLog};

use Status::{Failure, Running, Success};

fn tree_of(task: impl Task) -> Rc<BehaviorTree> {
    let mut bt = BehaviorTree::new();
    bt.set_root_task(task);
    Rc::new(bt)
}

fn sets(fact: &str) -> Rc<BehaviorTree> {
    tree_of(SetVar::new(fact, BbParam::bool(true)))
}

fn forever() -> Rc<BehaviorTree> {
    tree_of(Wait::new(1.0e9))
}

fn run(leaf: RunGoapPlan, bb: &Blackboard) -> (BtInstance, Rc<RefCell<TraceLog>>) {
    let mut bt = BehaviorTree::new();
    bt.set_root_task(leaf);
    let mut instance = bt.instantiate(None, bb, None).unwrap();
    let log = Rc::new(RefCell::new(TraceLog::default()));
    let sink: SharedTraceSink = log.clone();
    instance.set_trace_sink(Some(sink));
    (instance, log)
}

fn leaf(instance: &BtInstance) -> &RunGoapPlan {
    instance
        .tasks()
        .get::<RunGoapPlan>(instance.root_task())
        .unwrap()
}

fn plan_names(instance: &BtInstance) -> Vec<String> {
    leaf(instance)
        .current_plan()
        .iter()
        .map(|a| a.name().to_string())
        .collect()
}

fn replans(log: &Rc<RefCell<TraceLog>>) -> usize {
    log.borrow().tagged("goap.replan").count()
}

fn kill_target() -> GoapGoal {
    GoapGoal::new("KillTarget").with_target("target_dead", true)
}

#[test]
fn runs_planned_actions_in_order() {
    let bb = Blackboard::new();
    bb.set_var("near_weapon", true);
    bb.set_var("has_weapon", false);
    bb.set_var("target_dead", false);

    let plan = RunGoapPlan::new(kill_target())
        .with_action(
            GoapAction::new("Shoot")
                .with_precondition("has_weapon", true)
                .with_effect("target_dead", true)
                .with_execution_tree(sets("target_dead")),
        )
        .with_action(
            GoapAction::new("PickUpWeapon")
                .with_precondition("near_weapon", true)
                .with_effect("has_weapon", true)
                .with_execution_tree(sets("has_weapon")),
        );
    let (mut instance, log) = run(plan, &bb);

    assert_eq!(instance.update(0.1), Running);
    assert_eq!(plan_names(&instance), ["PickUpWeapon", "Shoot"]);
    assert_eq!(leaf(&instance).current_action_index(), 1);
    assert!(leaf(&instance).is_plan_active());

    assert_eq!(instance.update(0.1), Success);
    assert_eq!(bb.get_var("target_dead", Value::Nil, false), Value::Bool(true));
    assert_eq!(leaf(&instance).current_action_index(), 2);
    assert!(!leaf(&instance).is_plan_active());

    let log = log.borrow();
    let events: Vec<_> = log.tagged("goap.replan").collect();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].a, 2);
    assert_eq!(events[0].label.as_deref(), Some("KillTarget"));
    let started: Vec<_> = log
        .tagged("goap.action")
        .map(|e| (e.a, e.label.clone().unwrap_or_default()))
        .collect();
    assert_eq!(started, [(0, "PickUpWeapon".to_string()), (1, "Shoot".to_string())]);
}

#[test]
fn satisfied_goal_succeeds_without_acting() {
    let bb = Blackboard::new();
    bb.set_var("target_dead", true);
    let plan = RunGoapPlan::new(kill_target())
        .with_action(GoapAction::new("Shoot").with_effect("target_dead", true).with_execution_tree(forever()));
    let (mut instance, _) = run(plan, &bb);

    assert_eq!(instance.update(0.1), Success);
    assert!(leaf(&instance).current_plan().is_empty());
}

#[test]
fn no_plan_without_fallback_fails() {
    let bb = Blackboard::new();
    bb.set_var("target_dead", false);
    let (mut instance, _) = run(RunGoapPlan::new(kill_target()), &bb);
    assert_eq!(instance.update(0.1), Failure);
}

#[test]
fn no_plan_runs_the_fallback_tree() {
    let bb = Blackboard::new();
    bb.set_var("target_dead", false);
    let plan = RunGoapPlan::new(kill_target()).with_fallback_tree(sets("gave_up"));
    let (mut instance, log) = run(plan, &bb);

    assert_eq!(instance.update(0.1), Success);
    assert_eq!(bb.get_var("gave_up", Value::Nil, false), Value::Bool(true));
    let log = log.borrow();
    let fallbacks: Vec<_> = log.tagged("goap.fallback").collect();
    assert_eq!(fallbacks.len(), 1);
    assert_eq!(fallbacks[0].label.as_deref(), Some("KillTarget"));
}

#[test]
fn running_fallback_keeps_ticking_before_any_replan() {
    let bb = Blackboard::new();
    bb.set_var("target_dead", false);
    let plan = RunGoapPlan::new(kill_target())
        .with_fallback_tree(tree_of(Wait::new(0.25)))
        .with_config(RunGoapPlanConfig::default().with_replan_cooldown(0.0));
    let (mut instance, log) = run(plan, &bb);

    let statuses: Vec<_> = (0..3).map(|_| instance.update(0.125)).collect();
    assert_eq!(statuses, [Running, Running, Success]);
    assert_eq!(replans(&log), 1);
}

#[test]
fn failed_action_replans_after_the_cooldown() {
    let bb = Blackboard::new();
    bb.set_var("ready", false);
    bb.set_var("done", false);

    let mut body = BehaviorTree::new();
    let root = body.set_root_task(Sequence::new());
    body.tasks_mut()
        .spawn(root, CheckVar::new("ready", CheckType::Equal, BbParam::bool(true)))
        .unwrap();
    body.tasks_mut()
        .spawn(root, SetVar::new("done", BbParam::bool(true)))
        .unwrap();

    let plan = RunGoapPlan::new(GoapGoal::new("Finish").with_target("done", true))
        .with_action(GoapAction::new("Flaky").with_effect("done", true).with_execution_tree(Rc::new(body)))
        .with_config(RunGoapPlanConfig::default().with_replan_cooldown(0.25));
    let (mut instance, log) = run(plan, &bb);

    assert_eq!(instance.update(0.125), Running);
    assert!(!leaf(&instance).is_plan_active());
    assert_eq!(instance.update(0.125), Running);
    assert_eq!(replans(&log), 1);

    bb.set_var("ready", true);
    assert_eq!(instance.update(0.125), Success);
    assert_eq!(replans(&log), 2);
}

#[test]
fn failed_procedural_precondition_keeps_running() {
    let bb = Blackboard::new();
    bb.set_var("target_dead", false);
    bb.set_var("line_of_sight", false);

    let shoot = GoapAction::new("Shoot")
        .with_effect("target_dead", true)
        .with_procedural_precondition(|ctx| {
            ctx.blackboard
                .is_some_and(|bb| bb.get_var("line_of_sight", Value::Nil, false).truthy())
        })
        .with_execution_tree(sets("target_dead"));
    let plan = RunGoapPlan::new(kill_target())
        .with_action(shoot)
        .with_config(RunGoapPlanConfig::default().with_replan_cooldown(0.0));
    let (mut instance, log) = run(plan, &bb);

    assert_eq!(instance.update(0.1), Running);
    assert_eq!(instance.update(0.1), Running);
    bb.set_var("line_of_sight", true);
    assert_eq!(instance.update(0.1), Success);
    assert_eq!(replans(&log), 3);
}

#[test]
fn action_without_tree_fails() {
    let bb = Blackboard::new();
    bb.set_var("target_dead", false);
    let plan = RunGoapPlan::new(kill_target()).with_action(GoapAction::new("Shoot").with_effect("target_dead", true));
    assert!(!plan.configuration_warnings().is_empty());
    let (mut instance, _) = run(plan, &bb);
    assert_eq!(instance.update(0.1), Failure);
}

fn energy_world() -> (Blackboard, RunGoapPlan) {
    let bb = Blackboard::new();
    bb.set_var("energy", true);
    bb.set_var("at_target", false);
    let plan = RunGoapPlan::new(GoapGoal::new("Arrive").with_target("at_target", true))
        .with_action(
            GoapAction::new("Approach")
                .with_precondition("energy", true)
                .with_effect("at_target", true)
                .with_execution_tree(forever()),
        )
        .with_action(
            GoapAction::new("Rest")
                .with_effect("energy", true)
                .with_execution_tree(forever()),
        )
        .with_config(
            RunGoapPlanConfig::default()
                .with_replan_cooldown(0.0)
                .with_replan_debounce(0.25),
        );
    (bb, plan)
}

#[test]
fn changed_facts_replan_after_the_debounce() {
    let (bb, plan) = energy_world();
    let (mut instance, log) = run(plan, &bb);

    assert_eq!(instance.update(0.125), Running);
    assert_eq!(plan_names(&instance), ["Approach"]);

    bb.set_var("energy", false);
    let mut counts = Vec::new();
    for _ in 0..3 {
        assert_eq!(instance.update(0.125), Running);
        counts.push(replans(&log));
    }
    assert_eq!(counts, [1, 1, 2]);
    assert_eq!(plan_names(&instance), ["Rest", "Approach"]);
}

#[test]
fn a_burst_of_changes_restarts_the_debounce() {
    let (bb, plan) = energy_world();
    let (mut instance, log) = run(plan, &bb);
    instance.update(0.125);

    bb.set_var("energy", false);
    instance.update(0.125);
    bb.set_var("energy", true);
    let mut counts = Vec::new();
    for _ in 0..3 {
        instance.update(0.125);
        counts.push(replans(&log));
    }
    assert_eq!(counts, [1, 1, 2]);
    assert_eq!(plan_names(&instance), ["Approach"]);
}

#[test]
fn interrupt_waits_for_the_cooldown() {
    let bb = Blackboard::new();
    bb.set_var("at_target", false);
    let plan = RunGoapPlan::new(GoapGoal::new("Arrive").with_target("at_target", true))
        .with_action(GoapAction::new("Approach").with_effect("at_target", true).with_execution_tree(forever()))
        .with_config(RunGoapPlanConfig::default().with_replan_cooldown(1.0));
    let (mut instance, log) = run(plan, &bb);

    assert_eq!(instance.update(0.25), Running);
    let root = instance.root_task();
    instance
        .tasks_mut()
        .get_mut::<RunGoapPlan>(root)
        .unwrap()
        .interrupt();

    let mut counts = Vec::new();
    for _ in 0..4 {
        assert_eq!(instance.update(0.25), Running);
        counts.push(replans(&log));
    }
    assert_eq!(counts, [1, 1, 1, 2]);
}

fn unreachable(fallback: Rc<BehaviorTree>) -> RunGoapPlan {
    RunGoapPlan::new(GoapGoal::new("Impossible").with_target("solved", true)).with_fallback_tree(fallback)
}

#[test]
fn nesting_depth_is_capped() {
    let bb = Blackboard::new();
    let (mut instance, _) = run(unreachable(sets("reached")), &bb);
    instance.set_nesting_depth(MAX_NESTING_DEPTH);
    assert_eq!(instance.update(0.1), Failure);
    assert!(!bb.has_var("reached"));
}

#[test]
fn nested_fallbacks_stop_at_the_depth_cap() {
    let bb = Blackboard::new();
    let two_deep = tree_of(unreachable(tree_of(unreachable(sets("reached")))));
    let (mut instance, _) = run(unreachable(two_deep), &bb);
    assert_eq!(instance.update(0.1), Success);
    assert!(bb.has_var("reached"));

    let bb = Blackboard::new();
    let three_deep = tree_of(unreachable(tree_of(unreachable(tree_of(unreachable(sets("reached")))))));
    let (mut instance, _) = run(unreachable(three_deep), &bb);
    assert_eq!(instance.update(0.1), Failure);
    assert!(!bb.has_var("reached"));
}

#[test]
fn generated_name_mentions_the_goal() {
    let bb = Blackboard::new();
    let (instance, _) = run(RunGoapPlan::new(kill_target()), &bb);
    assert_eq!(instance.tasks().task_name(instance.root_task()), "RunGoapPlan: KillTarget");
    assert_eq!(RunGoapPlan::default().generated_name(), "RunGoapPlan");
    assert_eq!(RunGoapPlan::default().configuration_warnings().len(), 2);
}

/// Tree that never finishes and counts how often it is exited.
fn endless(exits: &Rc<Cell<u32>>) -> Rc<BehaviorTree> {
    let exits = exits.clone();
    tree_of(
        CustomTask::action("Endless")
            .on_exit(move |_| exits.set(exits.get() + 1))
            .on_tick(|_| Running),
    )
}

#[test]
fn aborting_the_outer_tree_exits_the_running_action() {
    let bb = Blackboard::new();
    bb.set_var("target_dead", false);
    let exits = Rc::new(Cell::new(0));
    let plan = RunGoapPlan::new(kill_target())
        .with_action(GoapAction::new("Shoot").with_effect("target_dead", true).with_execution_tree(endless(&exits)));
    let (mut instance, _) = run(plan, &bb);

    assert_eq!(instance.update(0.1), Running);
    assert_eq!(exits.get(), 0);
    instance.abort();
    assert_eq!(exits.get(), 1);
    assert_eq!(instance.last_status(), Status::Fresh);
}

#[test]
fn aborting_the_outer_tree_exits_the_running_fallback() {
    let bb = Blackboard::new();
    bb.set_var("target_dead", false);
    let exits = Rc::new(Cell::new(0));
    let plan = RunGoapPlan::new(kill_target()).with_fallback_tree(endless(&exits));
    let (mut instance, _) = run(plan, &bb);

    assert_eq!(instance.update(0.1), Running);
    assert_eq!(instance.update(0.1), Running);
    instance.abort();
    assert_eq!(exits.get(), 1);
}

#[test]
fn replanning_exits_the_interrupted_action() {
    let bb = Blackboard::new();
    bb.set_var("at_target", false);
    let exits = Rc::new(Cell::new(0));
    let plan = RunGoapPlan::new(GoapGoal::new("Arrive").with_target("at_target", true))
        .with_action(GoapAction::new("Approach").with_effect("at_target", true).with_execution_tree(endless(&exits)))
        .with_config(RunGoapPlanConfig::default().with_replan_cooldown(0.0));
    let (mut instance, log) = run(plan, &bb);

    assert_eq!(instance.update(0.1), Running);
    let root = instance.root_task();
    instance
        .tasks_mut()
        .get_mut::<RunGoapPlan>(root)
        .unwrap()
        .interrupt();

    assert_eq!(instance.update(0.1), Running);
    assert_eq!(replans(&log), 2);
    assert_eq!(exits.get(), 1);
    assert_eq!(log.borrow().tagged("goap.action").count(), 2);
}
