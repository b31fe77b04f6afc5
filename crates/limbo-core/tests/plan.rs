use std::io;
use std::sync::{Arc, Mutex};

use limbo_core::{
    BbVariable, Blackboard, BlackboardPlan, NodePath, PlanError, PropertyBag, PropertyHint, Value,
    VariantType,
};

fn int_var(value: i64) -> BbVariable {
    let var = BbVariable::new(VariantType::Int, PropertyHint::None, "");
    var.set_value(value);
    var.reset_value_changed();
    var
}

#[test]
fn add_rejects_empty_and_duplicate_names() {
    let mut plan = BlackboardPlan::new();
    plan.add_var("hp", int_var(10)).unwrap();
    assert_eq!(plan.add_var("", int_var(1)), Err(PlanError::EmptyName));
    assert_eq!(
        plan.add_var("hp", int_var(1)),
        Err(PlanError::DuplicateVar("hp".into()))
    );
    assert_eq!(plan.len(), 1);
}

#[test]
fn create_blackboard_duplicates_cells() {
    let mut plan = BlackboardPlan::new();
    plan.add_var("hp", int_var(10)).unwrap();

    let a = plan.create_blackboard(None, None);
    let b = plan.create_blackboard(None, None);
    a.set_var("hp", 1);

    assert_eq!(b.get_var("hp", Value::Nil, false), Value::Int(10));
    assert_eq!(plan.get_var("hp").unwrap().value(), Value::Int(10));
}

#[test]
fn populate_does_not_clobber_without_overwrite() {
    let mut plan = BlackboardPlan::new();
    plan.add_var("hp", int_var(10)).unwrap();
    plan.add_var("armor", int_var(3)).unwrap();

    let bb = Blackboard::new();
    bb.set_var("hp", 99);
    plan.populate_blackboard(&bb, false, None);
    assert_eq!(bb.get_var("hp", Value::Nil, false), Value::Int(99));
    assert_eq!(bb.get_var("armor", Value::Nil, false), Value::Int(3));

    plan.populate_blackboard(&bb, true, None);
    assert_eq!(bb.get_var("hp", Value::Nil, false), Value::Int(10));
}

#[test]
fn rename_move_and_names() {
    let mut plan = BlackboardPlan::new();
    plan.add_var("a", int_var(1)).unwrap();
    plan.add_var("b", int_var(2)).unwrap();
    plan.add_var("c", int_var(3)).unwrap();

    plan.rename_var("a", "alpha").unwrap();
    assert!(matches!(
        plan.rename_var("b", "c"),
        Err(PlanError::InvalidName(_))
    ));
    assert!(matches!(
        plan.rename_var("zzz", "y"),
        Err(PlanError::VarNotFound(_))
    ));

    plan.move_var(0, 2).unwrap();
    assert_eq!(plan.list_vars(), vec!["b", "c", "alpha"]);
    assert_eq!(
        plan.move_var(5, 0),
        Err(PlanError::IndexOutOfRange { index: 5, len: 3 })
    );

    let cell = plan.get_var("c").unwrap();
    assert_eq!(plan.get_var_name(&cell).as_deref(), Some("c"));
    assert_eq!(plan.get_var_by_index(0).map(|(n, _)| n).as_deref(), Some("b"));
}

#[test]
fn var_name_validation() {
    let mut plan = BlackboardPlan::new();
    plan.add_var("taken", int_var(0)).unwrap();
    assert!(plan.is_valid_var_name("speed_2"));
    assert!(!plan.is_valid_var_name("2fast"));
    assert!(!plan.is_valid_var_name("has space"));
    assert!(!plan.is_valid_var_name("resource_path"));
    assert!(!plan.is_valid_var_name("taken"));
}

#[test]
fn derived_plan_follows_base_structure() {
    let mut base = BlackboardPlan::new();
    base.add_var("hp", int_var(10)).unwrap();
    base.add_var("speed", int_var(5)).unwrap();
    let base = base.into_shared();

    let mut derived = BlackboardPlan::new();
    derived.set_base_plan(Some(base.clone()));
    assert_eq!(derived.list_vars(), vec!["hp", "speed"]);
    assert_eq!(derived.add_var("x", int_var(1)), Err(PlanError::DerivedPlan));
    assert_eq!(derived.remove_var("hp"), Err(PlanError::DerivedPlan));

    // Locally edited values survive a sync, untouched ones follow the base.
    derived.get_var("hp").unwrap().set_value(50);
    base.borrow().get_var("hp").unwrap().set_value(20);
    base.borrow().get_var("speed").unwrap().set_value(7);
    base.borrow_mut().move_var(1, 0).unwrap();
    base.borrow_mut().add_var("stamina", int_var(1)).unwrap();
    derived.sync_with_base_plan();

    assert_eq!(derived.list_vars(), vec!["speed", "hp", "stamina"]);
    assert_eq!(derived.get_var("hp").unwrap().value(), Value::Int(50));
    assert_eq!(derived.get_var("speed").unwrap().value(), Value::Int(7));

    base.borrow_mut().remove_var("hp").unwrap();
    derived.sync_with_base_plan();
    assert_eq!(derived.list_vars(), vec!["speed", "stamina"]);
}

#[test]
fn mapping_links_to_parent_scope() {
    let mut plan = BlackboardPlan::new();
    plan.add_var("local_target", BbVariable::default()).unwrap();
    plan.set_parent_scope_mapping("local_target", "target");

    let parent = Blackboard::new();
    parent.set_var("target", "enemy");
    let bb = plan.create_blackboard(None, Some(&parent));

    assert_eq!(
        bb.get_var("local_target", Value::Nil, false),
        Value::String("enemy".into())
    );
    bb.set_var("local_target", "ally");
    assert_eq!(
        parent.get_var("target", Value::Nil, false),
        Value::String("ally".into())
    );
}

#[test]
fn binding_and_prefetch_resolve_through_scene_root() {
    let weapon = PropertyBag::new("Weapon").with_property("ammo", 12).into_ref();
    let root = PropertyBag::new("Root")
        .with_child("Weapon", weapon.clone())
        .into_ref();

    let mut plan = BlackboardPlan::new();
    plan.add_var("ammo", int_var(0)).unwrap();
    plan.set_property_binding("ammo", NodePath::new("Weapon:ammo"));
    let node_var = BbVariable::new(VariantType::NodePath, PropertyHint::None, "");
    node_var.set_value(NodePath::new("Weapon"));
    plan.add_var("weapon", node_var).unwrap();

    let bb = plan.create_blackboard(Some(&root), None);
    assert_eq!(bb.get_var("ammo", Value::Nil, false), Value::Int(12));
    assert_eq!(
        bb.get_var("weapon", Value::Nil, false),
        Value::Object(weapon.clone())
    );

    // Without a root, NodePath values stay unresolved.
    let bb = plan.create_blackboard(None, None);
    assert_eq!(
        bb.get_var("weapon", Value::Nil, false),
        Value::NodePath(NodePath::new("Weapon"))
    );
}

#[test]
fn property_keys_read_and_write() {
    let mut plan = BlackboardPlan::new();
    assert!(plan.set_property("var/hp/name", Value::StringName("hp".into())));
    assert!(plan.set_property("var/hp/type", Value::Int(VariantType::Int.index())));
    assert!(plan.set_property("var/hp/value", Value::Int(30)));
    assert!(plan.set_property("var/hp/hint_string", Value::String("0,100".into())));

    assert_eq!(plan.get_property("hp"), Some(Value::Int(30)));
    assert_eq!(
        plan.get_property("var/hp/type"),
        Some(Value::Int(VariantType::Int.index()))
    );
    assert_eq!(
        plan.get_property("var/hp/hint_string"),
        Some(Value::String("0,100".into()))
    );
    assert_eq!(plan.get_property("var/ghost/value"), None);

    let descriptors = plan.descriptors();
    assert_eq!(descriptors.len(), 1);
    assert_eq!(descriptors[0].name, "hp");
    assert_eq!(descriptors[0].var_type, VariantType::Int);
}

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn logged_errors(f: impl FnOnce()) -> String {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::ERROR)
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    let bytes = captured.0.lock().unwrap().clone();
    String::from_utf8(bytes).unwrap()
}

#[test]
fn rejected_structure_edits_are_logged() {
    let mut plan = BlackboardPlan::new();
    plan.add_var("hp", int_var(1)).unwrap();

    let output = logged_errors(|| {
        assert_eq!(plan.add_var("hp", int_var(2)), Err(PlanError::DuplicateVar("hp".into())));
        assert!(plan.remove_var("missing").is_err());
        assert!(plan.rename_var("hp", "1bad").is_err());
        assert!(plan.move_var(0, 5).is_err());
    });

    assert!(output.contains("can't add variable"), "{output}");
    assert!(output.contains("can't remove variable"), "{output}");
    assert!(output.contains("can't rename variable"), "{output}");
    assert!(output.contains("can't move variable"), "{output}");
    assert_eq!(plan.list_vars(), vec!["hp"]);
    assert_eq!(plan.get_var("hp").unwrap().value(), Value::Int(1));
}
