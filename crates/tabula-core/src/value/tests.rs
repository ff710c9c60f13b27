use super::*;
use crate::model::TypeAffinity;
use chrono::NaiveDate;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

#[test]
fn null_and_array_pass_through_every_affinity() {
    let array = Value::Array(vec![Value::Int(1), Value::Int(2)]);

    for affinity in [
        TypeAffinity::Boolean,
        TypeAffinity::Integer,
        TypeAffinity::Text,
        TypeAffinity::DateTime,
        TypeAffinity::Binary,
    ] {
        assert_eq!(Value::Null.coerce_to(affinity), Ok(Value::Null));
        assert_eq!(array.clone().coerce_to(affinity), Ok(array.clone()));
    }
}

#[test]
fn text_coerces_into_numeric_columns() {
    assert_eq!(
        Value::from(" 42 ").coerce_to(TypeAffinity::Integer),
        Ok(Value::Int(42))
    );
    assert_eq!(
        Value::from("2.5").coerce_to(TypeAffinity::Decimal),
        Ok(Value::Float(2.5))
    );
    assert!(matches!(
        Value::from("forty").coerce_to(TypeAffinity::Integer),
        Err(CoercionError::Parse { to: "int", .. })
    ));
}

#[test]
fn fractional_float_is_not_an_integer() {
    assert_eq!(
        Value::Float(3.0).coerce_to(TypeAffinity::Integer),
        Ok(Value::Int(3))
    );
    assert!(matches!(
        Value::Float(3.5).coerce_to(TypeAffinity::Integer),
        Err(CoercionError::OutOfRange { .. })
    ));
}

#[test]
fn float_at_the_integer_ceiling_is_out_of_range() {
    // 2^63 is exactly representable as f64 but not as i64
    let ceiling = 9_223_372_036_854_775_808.0_f64;

    assert!(matches!(
        Value::Float(ceiling).coerce_to(TypeAffinity::Integer),
        Err(CoercionError::OutOfRange { .. })
    ));
    assert_eq!(
        Value::Float(-ceiling).coerce_to(TypeAffinity::Integer),
        Ok(Value::Int(i64::MIN))
    );
}

#[test]
fn dates_widen_and_narrow() {
    let day = date(2024, 2, 29);
    let midnight = day.and_hms_opt(0, 0, 0).expect("valid time");

    assert_eq!(
        Value::Date(day).coerce_to(TypeAffinity::DateTime),
        Ok(Value::DateTime(midnight))
    );
    assert_eq!(
        Value::DateTime(midnight).coerce_to(TypeAffinity::Date),
        Ok(Value::Date(day))
    );
    assert_eq!(
        Value::from("2024-02-29 00:00:00").coerce_to(TypeAffinity::DateTime),
        Ok(Value::DateTime(midnight))
    );
}

#[test]
fn blob_does_not_become_text() {
    assert!(matches!(
        Value::Blob(vec![1]).coerce_to(TypeAffinity::Text),
        Err(CoercionError::Incompatible { from: "blob", .. })
    ));
}

#[test]
fn typed_reads_coerce_and_range_check() {
    assert_eq!(i32::from_value(&Value::from("12")), Ok(12));
    assert_eq!(bool::from_value(&Value::Int(0)), Ok(false));
    assert_eq!(String::from_value(&Value::Int(7)), Ok("7".to_string()));
    assert!(matches!(
        u8::from_value(&Value::Int(300)),
        Err(CoercionError::OutOfRange { to: "u8", .. })
    ));
    assert_eq!(Option::<i64>::from_value(&Value::Null), Ok(None));
    assert_eq!(Option::<i64>::from_value(&Value::Int(5)), Ok(Some(5)));
}

#[test]
fn display_uses_sql_friendly_text() {
    let at = date(2023, 1, 5).and_hms_opt(14, 3, 9).expect("valid time");

    assert_eq!(Value::DateTime(at).to_string(), "2023-01-05 14:03:09");
    assert_eq!(Value::Date(date(2023, 1, 5)).to_string(), "2023-01-05");
    assert_eq!(Value::Blob(vec![0xAB, 0x01]).to_string(), "0xAB01");
    assert_eq!(Value::Null.to_string(), "NULL");
    assert_eq!(
        Value::Array(vec![Value::Int(1), Value::from("x")]).to_string(),
        "{1,x}"
    );
}

#[test]
fn option_converts_to_null() {
    assert_eq!(Value::from(None::<i32>), Value::Null);
    assert_eq!(Value::from(Some("a")), Value::Text("a".to_string()));
}
