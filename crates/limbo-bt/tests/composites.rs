use std::cell::{Cell, RefCell};
use std::rc::Rc;

use limbo_bt::{
    BehaviorTree, BtInstance, CustomTask, DynamicSelector, DynamicSequence, Parallel,
    ProbabilitySelector, RandomSelector, RandomSequence, Selector, Sequence, Task, TaskId,
};
use limbo_core::{Blackboard, Status};

type Log = Rc<RefCell<Vec<String>>>;

/// Leaf whose result is controlled from the test.
struct Leaf {
    result: Rc<Cell<Status>>,
}

fn leaf(name: &'static str, log: &Log, initial: Status) -> (CustomTask, Leaf) {
    let result = Rc::new(Cell::new(initial));
    let (l1, l2, r) = (log.clone(), log.clone(), result.clone());
    let task = CustomTask::action(name)
        .on_exit(move |_| l1.borrow_mut().push(format!("exit {name}")))
        .on_tick(move |_| {
            l2.borrow_mut().push(name.to_string());
            r.get()
        });
    (task, Leaf { result })
}

fn build(root: impl Task, children: Vec<CustomTask>) -> (BehaviorTree, TaskId) {
    let mut bt = BehaviorTree::new();
    let root = bt.set_root_task(root);
    for child in children {
        bt.tasks_mut().spawn(root, child).unwrap();
    }
    (bt, root)
}

fn run(bt: &BehaviorTree) -> BtInstance {
    bt.instantiate(None, &Blackboard::new(), None).unwrap()
}

fn take(log: &Log) -> Vec<String> {
    std::mem::take(&mut *log.borrow_mut())
}

#[test]
fn sequence_resumes_the_running_child() {
    let log = Log::default();
    let (a, _) = leaf("a", &log, Status::Success);
    let (b, b_ctl) = leaf("b", &log, Status::Running);
    let (c, _) = leaf("c", &log, Status::Success);
    let (bt, _) = build(Sequence::new(), vec![a, b, c]);
    let mut instance = run(&bt);

    assert_eq!(instance.update(0.1), Status::Running);
    assert_eq!(take(&log), ["a", "exit a", "b"]);
    assert_eq!(instance.update(0.1), Status::Running);
    assert_eq!(take(&log), ["b"]);

    b_ctl.result.set(Status::Success);
    assert_eq!(instance.update(0.1), Status::Success);
    assert_eq!(take(&log), ["b", "exit b", "c", "exit c"]);
}

#[test]
fn sequence_stops_at_the_first_failure() {
    let log = Log::default();
    let (a, _) = leaf("a", &log, Status::Failure);
    let (b, _) = leaf("b", &log, Status::Success);
    let (bt, _) = build(Sequence::new(), vec![a, b]);
    let mut instance = run(&bt);
    assert_eq!(instance.update(0.1), Status::Failure);
    assert_eq!(take(&log), ["a", "exit a"]);
}

#[test]
fn selector_stops_at_the_first_success() {
    let log = Log::default();
    let (a, _) = leaf("a", &log, Status::Failure);
    let (b, _) = leaf("b", &log, Status::Success);
    let (c, _) = leaf("c", &log, Status::Success);
    let (bt, _) = build(Selector::new(), vec![a, b, c]);
    let mut instance = run(&bt);
    assert_eq!(instance.update(0.1), Status::Success);
    assert_eq!(take(&log), ["a", "exit a", "b", "exit b"]);
}

#[test]
fn empty_composites() {
    let (bt, _) = build(Sequence::new(), vec![]);
    assert_eq!(run(&bt).update(0.1), Status::Success);
    let (bt, _) = build(Selector::new(), vec![]);
    assert_eq!(run(&bt).update(0.1), Status::Failure);
}

#[test]
fn dynamic_selector_lets_an_earlier_child_take_over() {
    let log = Log::default();
    let (guard, guard_ctl) = leaf("guard", &log, Status::Failure);
    let (fallback, _) = leaf("fallback", &log, Status::Running);
    let (bt, _) = build(DynamicSelector::new(), vec![guard, fallback]);
    let mut instance = run(&bt);

    assert_eq!(instance.update(0.1), Status::Running);
    assert_eq!(instance.update(0.1), Status::Running);
    assert_eq!(
        take(&log),
        ["guard", "exit guard", "fallback", "guard", "exit guard", "fallback"]
    );

    guard_ctl.result.set(Status::Success);
    assert_eq!(instance.update(0.1), Status::Success);
    assert_eq!(take(&log), ["guard", "exit guard", "exit fallback"]);
}

#[test]
fn dynamic_sequence_rechecks_earlier_children() {
    let log = Log::default();
    let (check, check_ctl) = leaf("check", &log, Status::Success);
    let (work, _) = leaf("work", &log, Status::Running);
    let (bt, _) = build(DynamicSequence::new(), vec![check, work]);
    let mut instance = run(&bt);

    assert_eq!(instance.update(0.1), Status::Running);
    assert_eq!(instance.update(0.1), Status::Running);
    assert_eq!(
        take(&log),
        ["check", "exit check", "work", "check", "exit check", "work"]
    );

    check_ctl.result.set(Status::Failure);
    assert_eq!(instance.update(0.1), Status::Failure);
    assert_eq!(take(&log), ["check", "exit check", "exit work"]);
}

#[test]
fn random_sequence_visits_every_child_once() {
    let log = Log::default();
    let names = ["a", "b", "c", "d", "e"];
    let children = names
        .into_iter()
        .map(|n| leaf(n, &log, Status::Success).0)
        .collect();
    let (bt, _) = build(RandomSequence::new(), children);
    let mut instance = run(&bt);
    instance.set_seed(7);

    assert_eq!(instance.update(0.1), Status::Success);
    let mut ticked: Vec<String> = take(&log)
        .into_iter()
        .filter(|e| !e.starts_with("exit"))
        .collect();
    ticked.sort();
    assert_eq!(ticked, names);
}

#[test]
fn random_order_is_reproducible_for_a_seed() {
    let order_for = |seed: u64| {
        let log = Log::default();
        let children = ["a", "b", "c", "d", "e", "f"]
            .into_iter()
            .map(|n| leaf(n, &log, Status::Failure).0)
            .collect();
        let (bt, _) = build(RandomSelector::new(), children);
        let mut instance = run(&bt);
        instance.set_seed(seed);
        assert_eq!(instance.update(0.1), Status::Failure);
        take(&log)
    };
    assert_eq!(order_for(42), order_for(42));
}

#[test]
fn random_selector_keeps_its_permutation_while_running() {
    let log = Log::default();
    let (a, _) = leaf("a", &log, Status::Running);
    let (b, _) = leaf("b", &log, Status::Running);
    let (bt, _) = build(RandomSelector::new(), vec![a, b]);
    let mut instance = run(&bt);
    instance.set_seed(3);
    instance.update(0.1);
    let first = take(&log);
    instance.update(0.1);
    assert_eq!(take(&log), first);
}

#[test]
fn parallel_succeeds_at_the_success_threshold() {
    let log = Log::default();
    let (a, _) = leaf("a", &log, Status::Success);
    let (b, b_ctl) = leaf("b", &log, Status::Running);
    let (c, _) = leaf("c", &log, Status::Running);
    let (bt, _) = build(
        Parallel::new()
            .with_successes_required(2)
            .with_failures_required(2),
        vec![a, b, c],
    );
    let mut instance = run(&bt);

    assert_eq!(instance.update(0.1), Status::Running);
    assert_eq!(take(&log), ["a", "exit a", "b", "c"]);

    b_ctl.result.set(Status::Success);
    assert_eq!(instance.update(0.1), Status::Success);
    // Finished children are not ticked again without repeat.
    assert_eq!(take(&log), ["b", "exit b", "c"]);
}

#[test]
fn parallel_fails_when_all_children_finish_short_of_the_threshold() {
    let log = Log::default();
    let (a, _) = leaf("a", &log, Status::Success);
    let (b, _) = leaf("b", &log, Status::Failure);
    let (bt, _) = build(
        Parallel::new()
            .with_successes_required(2)
            .with_failures_required(2),
        vec![a, b],
    );
    assert_eq!(run(&bt).update(0.1), Status::Failure);
}

#[test]
fn parallel_with_repeat_reticks_finished_children() {
    let log = Log::default();
    let (a, _) = leaf("a", &log, Status::Success);
    let (b, _) = leaf("b", &log, Status::Running);
    let (bt, _) = build(
        Parallel::new()
            .with_successes_required(5)
            .with_repeat(true),
        vec![a, b],
    );
    let mut instance = run(&bt);
    instance.update(0.1);
    take(&log);
    assert_eq!(instance.update(0.1), Status::Running);
    assert_eq!(take(&log), ["a", "exit a", "b"]);
}

#[test]
fn probability_selector_respects_zero_weights() {
    let log = Log::default();
    let (a, _) = leaf("a", &log, Status::Success);
    let (b, _) = leaf("b", &log, Status::Success);
    let (bt, _) = build(
        ProbabilitySelector::new().with_weights(vec![0.0, 1.0]),
        vec![a, b],
    );
    let mut instance = run(&bt);
    for seed in 0..20 {
        instance.set_seed(seed);
        assert_eq!(instance.update(0.1), Status::Success);
    }
    assert!(take(&log).iter().all(|e| e.ends_with('b')));
}

#[test]
fn probability_selector_falls_through_failures_unless_aborting() {
    let log = Log::default();
    let (a, _) = leaf("a", &log, Status::Failure);
    let (b, _) = leaf("b", &log, Status::Failure);
    let (bt, _) = build(ProbabilitySelector::new(), vec![a, b]);
    let mut instance = run(&bt);
    assert_eq!(instance.update(0.1), Status::Failure);
    let ticks: Vec<String> = take(&log)
        .into_iter()
        .filter(|e| !e.starts_with("exit"))
        .collect();
    assert_eq!(ticks.len(), 2);

    let (a, _) = leaf("a", &log, Status::Failure);
    let (b, _) = leaf("b", &log, Status::Failure);
    let (bt, _) = build(
        ProbabilitySelector::new().with_abort_on_failure(true),
        vec![a, b],
    );
    assert_eq!(run(&bt).update(0.1), Status::Failure);
    let ticks = take(&log)
        .into_iter()
        .filter(|e| !e.starts_with("exit"))
        .count();
    assert_eq!(ticks, 1);
}

#[test]
fn probability_selector_reports_pick_chances() {
    let mut selector = ProbabilitySelector::new();
    selector.set_weight(0, 1.0);
    selector.set_weight(2, 2.0);
    assert_eq!(selector.weight(1), 1.0);
    assert!((selector.probability(2, 3) - 0.5).abs() < 1e-9);
    assert!((selector.probability(0, 3) - 0.25).abs() < 1e-9);
}
