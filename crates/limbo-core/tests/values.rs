use limbo_core::{
    CheckType, DeterministicRng, Operation, SplitMix64, Status, Value, VariantType, Vector2,
};

#[test]
fn float_matching_is_epsilon_tolerant() {
    assert!(Value::Float(1.0).matches(&Value::Float(1.0005)));
    assert!(!Value::Float(1.0).matches(&Value::Float(1.01)));
    assert!(!Value::Int(1).matches(&Value::Float(1.0)));
    assert!(Value::Bool(true).matches(&Value::Bool(true)));
}

#[test]
fn check_types_compare_numbers_across_int_and_float() {
    assert!(CheckType::Equal.evaluate(&Value::Int(2), &Value::Float(2.0)));
    assert!(CheckType::LessThan.evaluate(&Value::Int(1), &Value::Float(1.5)));
    assert!(CheckType::GreaterThanOrEqual.evaluate(&Value::Int(3), &Value::Int(3)));
    assert!(CheckType::NotEqual.evaluate(&Value::from("a"), &Value::from("b")));
    assert!(!CheckType::LessThan.evaluate(&Value::Nil, &Value::Int(1)));
}

#[test]
fn operations_apply_by_operand_type() {
    let op = |o: Operation, a: Value, b: Value| o.apply(&a, &b);

    assert_eq!(op(Operation::None, Value::Int(1), Value::Int(9)), Some(Value::Int(9)));
    assert_eq!(op(Operation::Addition, Value::Int(2), Value::Int(3)), Some(Value::Int(5)));
    assert_eq!(
        op(Operation::Addition, Value::Int(2), Value::Float(0.5)),
        Some(Value::Float(2.5))
    );
    assert_eq!(
        op(Operation::Addition, Value::from("ab"), Value::from("cd")),
        Some(Value::from("abcd"))
    );
    assert_eq!(op(Operation::Division, Value::Int(1), Value::Int(0)), None);
    assert_eq!(op(Operation::Power, Value::Int(2), Value::Int(10)), Some(Value::Int(1024)));
    assert_eq!(op(Operation::BitShiftLeft, Value::Int(1), Value::Int(4)), Some(Value::Int(16)));
    assert_eq!(op(Operation::BitXor, Value::Int(6), Value::Int(3)), Some(Value::Int(5)));
    assert_eq!(op(Operation::BitAnd, Value::Float(1.0), Value::Int(1)), None);
    assert_eq!(
        op(
            Operation::Multiplication,
            Value::Vector2(Vector2::new(1.0, 2.0)),
            Value::Float(2.0)
        ),
        Some(Value::Vector2(Vector2::new(2.0, 4.0)))
    );
}

#[test]
fn conversions() {
    assert_eq!(Value::Int(3).convert(VariantType::Float), Some(Value::Float(3.0)));
    assert_eq!(Value::Nil.convert(VariantType::Int), Some(Value::Int(0)));
    assert_eq!(Value::from("x").convert(VariantType::Int), None);
    assert_eq!(Value::Int(5).convert(VariantType::String), Some(Value::from("5")));
}

#[test]
fn hashing_is_stable_and_type_aware() {
    assert_eq!(Value::Int(1).hash_value(), Value::Int(1).hash_value());
    assert_ne!(Value::Int(1).hash_value(), Value::Bool(true).hash_value());
}

#[test]
fn match_hash_agrees_with_epsilon_matching() {
    let a = Value::Float(1.0);
    let b = Value::Float(1.0005);
    assert!(a.matches(&b));
    assert_ne!(a.hash_value(), b.hash_value());
    assert_eq!(a.match_hash(), b.match_hash());

    let v = Value::Vector2(Vector2::new(1.0, 2.0));
    let w = Value::Vector2(Vector2::new(1.0002, 1.9999));
    assert!(v.matches(&w));
    assert_eq!(v.match_hash(), w.match_hash());

    assert_ne!(Value::Int(1).match_hash(), Value::Int(2).match_hash());
    assert_ne!(Value::Float(1.0).match_hash(), Value::Int(1).match_hash());
}

#[test]
fn status_codes_round_trip() {
    for status in [Status::Fresh, Status::Running, Status::Failure, Status::Success] {
        assert_eq!(Status::from_code(status.code()), Some(status));
    }
    assert_eq!(Status::from_code(9), None);
    assert_eq!(Status::Running.to_string(), "RUNNING");
}

#[test]
fn rng_is_deterministic_and_in_range() {
    let mut a = SplitMix64::new(7);
    let mut b = SplitMix64::new(7);
    for _ in 0..100 {
        let x = a.range_f64(1.0, 2.0);
        assert_eq!(x, b.range_f64(1.0, 2.0));
        assert!((1.0..=2.0).contains(&x));
        let i = a.range_i64(-3, 3);
        b.range_i64(-3, 3);
        assert!((-3..=3).contains(&i));
    }

    let mut items = [0, 1, 2, 3, 4, 5];
    a.shuffle(&mut items);
    let mut sorted = items;
    sorted.sort();
    assert_eq!(sorted, [0, 1, 2, 3, 4, 5]);
}
