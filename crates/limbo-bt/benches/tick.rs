use criterion::{black_box, criterion_group, criterion_main, Criterion};
use limbo_bt::{BehaviorTree, CheckVar, DynamicSequence, Sequence, SetVar, Wait};
use limbo_core::{BbParam, Blackboard, CheckType, Operation};

fn build_tree(conditions: usize) -> BehaviorTree {
    let mut bt = BehaviorTree::new();
    let root = bt.set_root_task(DynamicSequence::new());
    let tasks = bt.tasks_mut();
    for _ in 0..conditions {
        let _ = tasks.spawn(
            root,
            CheckVar::new("alive", CheckType::Equal, BbParam::bool(true)),
        );
    }
    if let Ok(body) = tasks.spawn(root, Sequence::new()) {
        let _ = tasks.spawn(
            body,
            SetVar::new("ticks", BbParam::int(1)).with_operation(Operation::Addition),
        );
        let _ = tasks.spawn(body, Wait::new(1.0e9));
    }
    bt
}

fn bench_bt_tick(c: &mut Criterion) {
    let bt = build_tree(32);
    let bb = Blackboard::new();
    bb.set_var("alive", true);
    bb.set_var("ticks", 0);
    let mut instance = match bt.instantiate(None, &bb, None) {
        Ok(instance) => instance,
        Err(err) => panic!("bench tree failed to instantiate: {err}"),
    };

    c.bench_function("limbo-bt/tick(conditions=32)", |b| {
        b.iter(|| black_box(instance.update(0.016)))
    });

    c.bench_function("limbo-bt/instantiate(conditions=32)", |b| {
        b.iter(|| black_box(bt.instantiate(None, &bb, None).is_ok()))
    });
}

criterion_group!(benches, bench_bt_tick);
criterion_main!(benches);
