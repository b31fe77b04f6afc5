use limbo_bt::{
    AlwaysSucceed, Comment, ConsolePrint, Fail, ForEach, Selector, Sequence, Subtree, TaskTree,
    TreeError, Wait,
};

#[test]
fn children_keep_a_single_parent() {
    let mut tree = TaskTree::new();
    let a = tree.add(Sequence::new());
    let b = tree.add(Selector::new());
    let leaf = tree.add(Fail);

    tree.add_child(a, leaf).unwrap();
    assert_eq!(tree.add_child(b, leaf), Err(TreeError::AlreadyHasParent(leaf)));
    assert_eq!(tree.get_parent(leaf), Some(a));
    assert!(!tree.has_child(b, leaf));

    tree.remove_child(a, leaf).unwrap();
    assert_eq!(tree.get_parent(leaf), None);
    tree.add_child(b, leaf).unwrap();
    assert_eq!(tree.get_parent(leaf), Some(b));
}

#[test]
fn cycles_are_rejected() {
    let mut tree = TaskTree::new();
    let root = tree.add(Sequence::new());
    let mid = tree.spawn(root, Selector::new()).unwrap();

    assert_eq!(
        tree.add_child(mid, root),
        Err(TreeError::WouldCreateCycle {
            parent: mid,
            child: root
        })
    );
    assert_eq!(
        tree.add_child(mid, mid),
        Err(TreeError::WouldCreateCycle {
            parent: mid,
            child: mid
        })
    );
    assert_eq!(tree.get_child_count(mid), 0);
}

#[test]
fn removal_errors_leave_the_tree_untouched() {
    let mut tree = TaskTree::new();
    let root = tree.add(Sequence::new());
    let child = tree.spawn(root, Fail).unwrap();
    let stranger = tree.add(Fail);

    assert_eq!(
        tree.remove_child(root, stranger),
        Err(TreeError::NotAChild {
            parent: root,
            child: stranger
        })
    );
    assert_eq!(
        tree.remove_child_at_index(root, 3),
        Err(TreeError::IndexOutOfRange { index: 3, len: 1 })
    );
    assert_eq!(tree.children(root), [child]);
    assert_eq!(tree.remove_child_at_index(root, 0), Ok(child));
    assert!(tree.children(root).is_empty());
}

#[test]
fn insert_at_index_clamps_to_the_end() {
    let mut tree = TaskTree::new();
    let root = tree.add(Sequence::new());
    let first = tree.spawn(root, Fail).unwrap();
    let last = tree.add(Fail);
    let front = tree.add(Fail);

    tree.add_child_at_index(root, last, 99).unwrap();
    tree.add_child_at_index(root, front, 0).unwrap();
    assert_eq!(tree.children(root), [front, first, last]);
    assert_eq!(tree.get_child_index(root, last), Some(2));
    assert_eq!(tree.next_sibling(front), Some(first));
    assert_eq!(tree.next_sibling(last), None);
}

#[test]
fn navigation_follows_parent_links() {
    let mut tree = TaskTree::new();
    let root = tree.add(Sequence::new());
    let mid = tree.spawn(root, AlwaysSucceed::new()).unwrap();
    let leaf = tree.spawn(mid, Wait::new(1.0)).unwrap();

    assert_eq!(tree.get_root(leaf), root);
    assert!(tree.is_root(root));
    assert!(!tree.is_root(leaf));
    assert!(tree.is_descendant_of(leaf, root));
    assert!(!tree.is_descendant_of(root, leaf));
    assert_eq!(tree.get_child(mid, 0), Some(leaf));
    assert_eq!(tree.get_child(mid, 1), None);
}

#[test]
fn comments_do_not_count_as_enabled_children() {
    let mut tree = TaskTree::new();
    let root = tree.add(Sequence::new());
    tree.spawn(root, Comment::new("note")).unwrap();
    tree.spawn(root, Fail).unwrap();
    assert_eq!(tree.get_child_count(root), 2);
    assert_eq!(tree.get_enabled_child_count(root), 1);
}

#[test]
fn task_names_prefer_the_custom_name() {
    let mut tree = TaskTree::new();
    let root = tree.add(Sequence::new());
    let wait = tree.spawn(root, Wait::new(1.5)).unwrap();
    assert_eq!(tree.task_name(wait), "Wait 1.5s");
    tree.set_custom_name(wait, "Catch breath");
    assert_eq!(tree.task_name(wait), "Catch breath");
    assert_eq!(
        tree.print_tree(root),
        "Sequence : Sequence\n  Catch breath : Wait\n"
    );
}

#[test]
fn configuration_warnings_follow_child_count_contracts() {
    let mut tree = TaskTree::new();
    let root = tree.add(Sequence::new());
    let empty_composite = tree.spawn(root, Selector::new()).unwrap();
    let decorator = tree.spawn(root, AlwaysSucceed::new()).unwrap();
    tree.spawn(decorator, Fail).unwrap();
    tree.spawn(decorator, Fail).unwrap();
    let action = tree.spawn(root, Fail).unwrap();
    tree.spawn(action, Fail).unwrap();
    let printer = tree.spawn(root, ConsolePrint::new("%s").with_args(["a", "b", "c", "d", "e", "f"])).unwrap();

    assert!(tree.configuration_warnings(root).is_empty());
    assert_eq!(
        tree.configuration_warnings(empty_composite),
        ["Composite should have at least one child task."]
    );
    assert_eq!(
        tree.configuration_warnings(decorator),
        ["Decorator should have a single child task."]
    );
    assert_eq!(
        tree.configuration_warnings(action),
        ["Action shouldn't have child tasks."]
    );
    assert_eq!(tree.configuration_warnings(printer).len(), 1);

    let all = tree.collect_warnings(root);
    let owners: Vec<_> = all.iter().map(|(id, _)| *id).collect();
    assert_eq!(owners, [empty_composite, decorator, action, printer]);
}

#[test]
fn comment_warnings() {
    let mut tree = TaskTree::new();
    let orphan = tree.add(Comment::new("alone"));
    assert_eq!(tree.configuration_warnings(orphan), ["Can't be the root task."]);

    let root = tree.add(Sequence::new());
    let note = tree.spawn(root, Comment::new("with child")).unwrap();
    tree.spawn(note, Fail).unwrap();
    assert_eq!(
        tree.configuration_warnings(note),
        ["Can only have other comment tasks as children."]
    );
}

#[test]
fn task_specific_warnings_are_appended() {
    let mut tree = TaskTree::new();
    let each = tree.add(ForEach::default());
    tree.spawn(each, Fail).unwrap();
    assert_eq!(
        tree.configuration_warnings(each),
        ["Array variable is not set.", "Save variable is not set."]
    );

    let subtree = tree.add(Subtree::default());
    assert_eq!(
        tree.configuration_warnings(subtree),
        ["Subtree needs to be assigned."]
    );
}

#[test]
fn typed_access_downcasts() {
    let mut tree = TaskTree::new();
    let wait = tree.add(Wait::new(2.0));
    assert_eq!(tree.get::<Wait>(wait).map(|w| w.duration), Some(2.0));
    assert!(tree.get::<Fail>(wait).is_none());
    if let Some(w) = tree.get_mut::<Wait>(wait) {
        w.duration = 3.0;
    }
    assert_eq!(tree.task_name(wait), "Wait 3s");
}
