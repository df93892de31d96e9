use tagihan::{
    encode, FeatureSchema, FeatureValue, RawInput, ScalarType, MONTH_CODES, MONTH_GROUP,
    TARIFF_CLASSES, TARIFF_GROUP,
};

fn input(month: &str, tariff: &str) -> RawInput {
    RawInput {
        kwh: 350.0,
        ac_units: 1,
        ac_hours_per_day: 5.0,
        family_size: 4,
        month_name: month.to_string(),
        tariff_class: tariff.to_string(),
    }
}

#[test]
fn test_row_matches_schema_for_every_category() {
    let schema = FeatureSchema::shared();
    for month in MONTH_CODES {
        for tariff in TARIFF_CLASSES {
            let row = encode(&input(month, tariff), schema);
            assert!(row.conforms());
            assert_eq!(row.len(), schema.len());

            let names: Vec<&str> = row.iter().map(|(c, _)| c.name.as_str()).collect();
            let expected: Vec<&str> = schema.column_names().collect();
            assert_eq!(names, expected);
        }
    }
}

#[test]
fn test_at_most_one_flag_per_group() {
    let schema = FeatureSchema::shared();
    for month in MONTH_CODES {
        let row = encode(&input(month, "R1"), schema);
        let active = row.active_levels(MONTH_GROUP);
        if month == "Apr" {
            assert!(active.is_empty(), "baseline month must not set a flag");
        } else {
            assert_eq!(active, vec![month]);
        }
    }
    for tariff in TARIFF_CLASSES {
        let row = encode(&input("Jan", tariff), schema);
        let active = row.active_levels(TARIFF_GROUP);
        if tariff == "R1" {
            assert!(active.is_empty(), "baseline tariff must not set a flag");
        } else {
            assert_eq!(active, vec![tariff]);
        }
    }
}

#[test]
fn test_july_r1_scenario() {
    let row = encode(&input("Jul", "R1"), FeatureSchema::shared());

    assert_eq!(row.get("kwh"), Some(FeatureValue::Float(350.0)));
    assert_eq!(row.get("ac_units"), Some(FeatureValue::Integer(1)));
    assert_eq!(row.get("ac_hours_per_day"), Some(FeatureValue::Float(5.0)));
    assert_eq!(row.get("family_size"), Some(FeatureValue::Integer(4)));
    assert_eq!(row.get("month_name_Jul"), Some(FeatureValue::Flag(true)));

    let flags_set = row
        .values()
        .iter()
        .filter(|v| matches!(v, FeatureValue::Flag(true)))
        .count();
    assert_eq!(flags_set, 1);
}

#[test]
fn test_january_is_not_the_baseline() {
    let row = encode(&input("Jan", "R1"), FeatureSchema::shared());
    assert_eq!(row.get("month_name_Jan"), Some(FeatureValue::Flag(true)));
    assert_eq!(row.active_levels(MONTH_GROUP), vec!["Jan"]);
}

#[test]
fn test_april_sets_no_month_flag() {
    let row = encode(&input("Apr", "R1"), FeatureSchema::shared());
    assert!(row.active_levels(MONTH_GROUP).is_empty());
    assert!(row.active_levels(TARIFF_GROUP).is_empty());
    assert_eq!(row.get("month_name_Apr"), None);
    assert_eq!(row.get("kwh"), Some(FeatureValue::Float(350.0)));
}

#[test]
fn test_unknown_categories_fall_back_to_baseline() {
    let schema = FeatureSchema::shared();
    let baseline = encode(&input("Apr", "R1"), schema);

    for (month, tariff) in [("Sept", "R1"), ("jul", "R1"), ("Apr", "R9"), ("", "")] {
        let row = encode(&input(month, tariff), schema);
        assert!(row.conforms());
        assert_eq!(row, baseline, "{}/{} should encode as baseline", month, tariff);
    }
}

#[test]
fn test_encoding_is_idempotent() {
    let schema = FeatureSchema::shared();
    let raw = input("Nov", "R3");
    let first = encode(&raw, schema);
    let second = encode(&raw, schema);
    assert_eq!(first, second);
    assert_eq!(first.to_array(), second.to_array());
}

#[test]
fn test_out_of_range_values_do_not_panic() {
    let raw = RawInput {
        kwh: f64::INFINITY,
        ac_units: i64::MAX,
        ac_hours_per_day: -3.0,
        family_size: -1,
        month_name: "Dec".into(),
        tariff_class: "R2".into(),
    };
    let row = encode(&raw, FeatureSchema::shared());
    assert!(row.conforms());
    assert_eq!(row.get("ac_units"), Some(FeatureValue::Integer(i64::MAX)));
    assert_eq!(row.get("family_size"), Some(FeatureValue::Integer(-1)));
    assert_eq!(row.get("kwh"), Some(FeatureValue::Float(f64::INFINITY)));
}

#[test]
fn test_schema_without_direct_column() {
    let schema = FeatureSchema::new([
        ("kwh", ScalarType::Float),
        ("month_name_Jul", ScalarType::Flag),
    ]).unwrap();
    let row = encode(&input("Jul", "R2"), &schema);
    assert_eq!(row.values(), &[FeatureValue::Float(350.0), FeatureValue::Flag(true)]);
}
