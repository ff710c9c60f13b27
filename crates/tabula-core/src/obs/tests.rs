use super::*;
use crate::value::Value;
use chrono::NaiveDate;
use parking_lot::Mutex;
use std::sync::Arc;

fn event(text: &str, params: Vec<(&str, Value)>) -> CommandEvent {
    CommandEvent::new(
        text.to_string(),
        params
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect(),
        connection_hash("Server=.;Database=test"),
    )
}

#[test]
fn raw_sql_inlines_escaped_literals() {
    let when = NaiveDate::from_ymd_opt(2024, 3, 9)
        .and_then(|d| d.and_hms_opt(14, 5, 6))
        .expect("valid datetime");
    let ev = event(
        "SELECT * FROM [dbo].[Employees] WHERE [Name] = @p0 AND [Hired] > @p1 AND [Id] = @p2",
        vec![
            ("@p0", Value::from("O'Brien")),
            ("@p1", Value::from(when)),
            ("@p2", Value::from(7)),
        ],
    );

    assert_eq!(
        ev.to_raw_sql(),
        "SELECT * FROM [dbo].[Employees] WHERE [Name] = 'O''Brien' AND [Hired] > '2024-03-09 14:05:06' AND [Id] = 7"
    );
}

#[test]
fn raw_sql_matches_whole_tokens_only() {
    let params = (0..=10).map(|i| (format!("@p{i}"), Value::from(i))).collect();
    let ev = CommandEvent::new("VALUES (@p1, @p10)".to_string(), params, String::new());

    assert_eq!(ev.to_raw_sql(), "VALUES (1, 10)");
}

#[test]
fn raw_sql_renders_null_and_blob_in_default_form() {
    let ev = event(
        "UPDATE t SET a = @p0, b = @p1",
        vec![("@p0", Value::Null), ("@p1", Value::Blob(vec![0xAB, 0x01]))],
    );

    assert_eq!(ev.to_raw_sql(), "UPDATE t SET a = NULL, b = 0xAB01");
}

#[test]
fn param_info_lists_each_parameter() {
    let ev = event("SELECT @p0", vec![("@p0", Value::from("x"))]);

    assert_eq!(
        ev.to_raw_sql_with_param_info(),
        "SELECT 'x'\n-- params: @p0='x' (text)"
    );
}

#[test]
fn connection_hash_is_stable_hex_sha256() {
    let a = connection_hash("Server=a");
    assert_eq!(a.len(), 64);
    assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(a, connection_hash("Server=a"));
    assert_ne!(a, connection_hash("Server=b"));
}

#[test]
fn registry_delivers_until_unsubscribed() {
    let registry = EventRegistry::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&seen);
    let id = registry.subscribe(move |ev| sink.lock().push(ev.text.clone()));
    assert_eq!(registry.len(), 1);

    registry.publish(&event("SELECT 1", vec![]));
    assert!(registry.unsubscribe(id));
    assert!(!registry.unsubscribe(id));
    registry.publish(&event("SELECT 2", vec![]));

    assert_eq!(*seen.lock(), vec!["SELECT 1".to_string()]);
    assert!(registry.is_empty());
}

#[test]
fn observer_may_unsubscribe_itself_while_publishing() {
    let registry = Arc::new(EventRegistry::new());
    let slot = Arc::new(Mutex::new(None));

    let inner_registry = Arc::clone(&registry);
    let inner_slot = Arc::clone(&slot);
    let id = registry.subscribe(move |_| {
        if let Some(id) = inner_slot.lock().take() {
            inner_registry.unsubscribe(id);
        }
    });
    *slot.lock() = Some(id);

    registry.publish(&event("SELECT 1", vec![]));
    assert!(registry.is_empty());
}
