use super::*;
use crate::{
    model::TypeAffinity,
    test_support::{RecordingTracker, employee_columns, employees, order_columns, orders, orders_employee_fk},
};
use proptest::prelude::*;

fn loaded_employee(tracker: &Arc<dyn ChangeTracker>) -> EntityRef {
    Entity::materialize(
        employees(),
        employee_columns(),
        [
            ("Id", Value::Int(7)),
            ("FirstName", Value::from("Ada")),
            ("LastName", Value::from("Lovelace")),
        ],
        Some(tracker),
    )
}

#[test]
fn first_edit_moves_unchanged_to_modified() {
    let (_recorder, tracker) = RecordingTracker::shared();
    let entity = loaded_employee(&tracker);

    let _ = entity.get_column::<String>("FirstName").expect("read");
    assert_eq!(entity.state(), EntityState::Unchanged);

    entity.set_column("FirstName", "Grace").expect("edit");
    assert_eq!(
        entity.state(),
        EntityState::Modified(vec!["FirstName".to_string()])
    );
}

#[test]
fn further_edits_accumulate_without_duplicates() {
    let (_recorder, tracker) = RecordingTracker::shared();
    let entity = loaded_employee(&tracker);

    entity.set_column("FirstName", "Grace").expect("edit");
    entity.set_column("LastName", "Hopper").expect("edit");
    entity.set_column("FirstName", "Grace B.").expect("edit");

    assert_eq!(
        entity.state(),
        EntityState::Modified(vec!["FirstName".to_string(), "LastName".to_string()])
    );
}

#[test]
fn created_rows_absorb_edits() {
    let (recorder, tracker) = RecordingTracker::shared();
    let entity = Entity::create(employees(), employee_columns(), Some(&tracker));

    entity.set_column("FirstName", "Grace").expect("edit");

    assert_eq!(entity.state(), EntityState::Created);
    assert_eq!(recorder.tracked(), vec![entity.id(), entity.id()]);
}

#[test]
fn edits_notify_the_owning_context() {
    let (recorder, tracker) = RecordingTracker::shared();
    let entity = loaded_employee(&tracker);

    entity.set_column("LastName", "Hopper").expect("edit");

    assert_eq!(recorder.tracked(), vec![entity.id()]);
    assert_eq!(
        recorder.changed_columns(),
        vec![(entity.id(), "LastName".to_string())]
    );
}

#[test]
fn set_coerces_to_column_affinity() {
    let entity = Entity::create(employees(), employee_columns(), None);

    entity.set_column("Id", "42").expect("coerced");
    assert_eq!(entity.get_value("Id"), Some(Value::Int(42)));

    let err = entity.set_column("Id", "forty-two").expect_err("not an int");
    assert!(matches!(err, EntityError::Coercion { ref column, .. } if column == "Id"));
}

#[test]
fn unknown_columns_are_rejected_when_the_model_is_known() {
    let entity = Entity::create(employees(), employee_columns(), None);

    let err = entity.set_column("Nickname", "Al").expect_err("unknown");
    assert!(matches!(err, EntityError::UnknownColumn { .. }));
}

#[test]
fn option_none_removes_the_entry() {
    let (_recorder, tracker) = RecordingTracker::shared();
    let entity = loaded_employee(&tracker);

    entity
        .set_column_option::<String>("LastName", None)
        .expect("edit");

    assert!(entity.get_value("LastName").is_none());
    assert_eq!(entity.get_column_option::<String>("LastName").expect("read"), None);
    assert_eq!(entity.state().modified_columns(), ["LastName".to_string()]);
}

#[test]
fn deleting_a_created_row_discards_it() {
    let (recorder, tracker) = RecordingTracker::shared();
    let entity = Entity::create(employees(), employee_columns(), Some(&tracker));

    entity.delete();

    assert_eq!(entity.state(), EntityState::Deleted);
    assert_eq!(recorder.forgotten(), vec![entity.id()]);
}

#[test]
fn deleting_a_loaded_row_marks_it_pending() {
    let (recorder, tracker) = RecordingTracker::shared();
    let entity = loaded_employee(&tracker);

    entity.delete();

    assert_eq!(entity.state(), EntityState::Delete);
    assert_eq!(recorder.tracked(), vec![entity.id()]);
}

proptest! {
    #[test]
    fn pending_delete_rejects_every_column(column in "[A-Za-z_][A-Za-z0-9_]{0,12}") {
        let (_recorder, tracker) = RecordingTracker::shared();
        let entity = loaded_employee(&tracker);
        entity.delete();

        let err = entity.set_column(&column, 1).expect_err("delete pending");
        let is_invalid_for_column = matches!(
            err,
            EntityError::InvalidOperation { column: ref c, .. } if c == &column
        );
        prop_assert!(is_invalid_for_column);
    }

    #[test]
    fn silent_int_round_trips(value in any::<i64>()) {
        let entity = Entity::create(employees(), Arc::new(ColumnMap::new()), None);
        entity.set_column_silent("n", value);
        prop_assert_eq!(entity.get_column::<i64>("n").expect("read"), value);
    }

    #[test]
    fn silent_float_round_trips(value in any::<f64>().prop_filter("finite", |v| v.is_finite())) {
        let entity = Entity::create(employees(), Arc::new(ColumnMap::new()), None);
        entity.set_column_silent("f", value);
        prop_assert_eq!(entity.get_column::<f64>("f").expect("read"), value);
    }

    #[test]
    fn silent_text_round_trips(value in ".*") {
        let entity = Entity::create(employees(), Arc::new(ColumnMap::new()), None);
        entity.set_column_silent("s", value.clone());
        prop_assert_eq!(entity.get_column::<String>("s").expect("read"), value);
    }

    #[test]
    fn silent_bool_round_trips(value in any::<bool>()) {
        let entity = Entity::create(employees(), Arc::new(ColumnMap::new()), None);
        entity.set_column_silent("b", value);
        prop_assert_eq!(entity.get_column::<bool>("b").expect("read"), value);
    }
}

#[test]
fn absent_and_null_columns_read_as_defaults() {
    let entity = Entity::create(employees(), employee_columns(), None);
    entity.set_column_silent("LastName", Value::Null);

    assert_eq!(entity.get_column::<i64>("Id").expect("read"), 0);
    assert_eq!(entity.get_column::<String>("LastName").expect("read"), "");
    assert!(!entity.get_column::<bool>("Active").expect("read"));
    assert_eq!(entity.get_column::<f64>("Salary").expect("read"), 0.0);
    assert!(!entity.has_value("LastName"));
}

#[test]
fn sub_entity_accepts_every_quoting_convention() {
    for column in ["[o].[Id]", "o.Id", "`o`.`Id`", "\"o\".\"Id\"", "o_Id", "O_Id"] {
        let row = Entity::materialize(
            employees(),
            Arc::new(ColumnMap::new()),
            [(column, Value::Int(99)), ("e.Id", Value::Int(1))],
            None,
        );

        let order = row.sub_entity("o", &orders());

        assert_eq!(order.column_values(), vec![("Id".to_string(), Value::Int(99))], "{column}");
        assert_eq!(order.table(), &orders());
        assert_eq!(order.state(), EntityState::Unchanged);
    }
}

#[test]
fn sub_entities_are_cached_per_alias() {
    let row = Entity::materialize(
        employees(),
        Arc::new(ColumnMap::new()),
        [("o.Id", Value::Int(1)), ("e.Id", Value::Int(2))],
        None,
    );

    let first = row.sub_entity("o", &orders());
    let again = row.sub_entity("o", &orders());
    let other = row.sub_entity("e", &employees());

    assert!(Arc::ptr_eq(&first, &again));
    assert_eq!(other.get_value("Id"), Some(Value::Int(2)));
}

#[test]
fn sub_entity_uses_the_trackers_column_model() {
    let (_recorder, tracker) = RecordingTracker::shared();
    let row = Entity::materialize(
        employees(),
        Arc::new(ColumnMap::new()),
        [("o_Id", Value::Int(3))],
        Some(&tracker),
    );

    let order = row.sub_entity("o", &orders());

    assert_eq!(order.columns().as_ref(), order_columns().as_ref());
}

#[test]
fn insert_clone_drops_key_and_nulls() {
    let (_recorder, tracker) = RecordingTracker::shared();
    let source = loaded_employee(&tracker);
    source.set_column_silent("Salary", Value::Null);

    let clone = source.clone_as(CloneMode::Insert);

    assert_eq!(clone.state(), EntityState::Created);
    assert!(clone.get_value("Id").is_none());
    assert!(clone.get_value("Salary").is_none());
    assert_eq!(clone.get_value("FirstName"), Some(Value::from("Ada")));
    assert_ne!(clone.id(), source.id());
}

#[test]
fn update_clone_marks_every_non_key_column() {
    let (recorder, tracker) = RecordingTracker::shared();
    let source = loaded_employee(&tracker);
    source.set_column_silent("Salary", Value::Null);

    let (other_recorder, other_tracker) = RecordingTracker::shared();
    let clone = source.clone_to_context(CloneMode::Update, Some(&other_tracker));

    assert_eq!(
        clone.state(),
        EntityState::Modified(vec![
            "FirstName".to_string(),
            "LastName".to_string(),
            "Salary".to_string(),
        ])
    );
    assert!(clone.get_value("Id").is_none());
    assert_eq!(other_recorder.tracked(), vec![clone.id()]);
    assert!(recorder.tracked().is_empty());
}

#[derive(Debug, Default, PartialEq)]
struct EmployeeView {
    first_name: String,
    salary: f64,
}

impl RowTarget for EmployeeView {
    fn fields() -> &'static [&'static str] {
        &["first_name", "salary"]
    }

    fn assign(&mut self, field: &str, value: Value) -> Result<(), CoercionError> {
        match field {
            "first_name" => self.first_name = String::from_value(&value)?,
            "salary" => self.salary = f64::from_value(&value)?,
            _ => {}
        }
        Ok(())
    }
}

#[test]
fn map_matches_names_loosely_and_transforms() {
    let entity = Entity::materialize(
        employees(),
        employee_columns(),
        [
            ("FirstName", Value::from("ada")),
            ("[Salary]", Value::Int(10)),
        ],
        None,
    );

    let view: EmployeeView = entity
        .map_with(|column, value| match (column, value) {
            ("FirstName", Value::Text(name)) => Value::Text(name.to_uppercase()),
            (_, other) => other,
        })
        .expect("mapped");

    assert_eq!(
        view,
        EmployeeView {
            first_name: "ADA".to_string(),
            salary: 10.0,
        }
    );
}

#[test]
fn link_parent_copies_known_keys() {
    let parent = Entity::materialize(
        employees(),
        employee_columns(),
        [("Id", Value::Int(5))],
        None,
    );
    let child = Entity::create(orders(), order_columns(), None);

    child
        .link_parent(&orders_employee_fk(), &parent)
        .expect("linked");

    assert_eq!(child.get_value("EmployeeId"), Some(Value::Int(5)));
    assert_eq!(child.parent_links().len(), 1);
}

#[test]
fn link_parent_rejects_wrong_tables() {
    let parent = Entity::create(orders(), order_columns(), None);
    let child = Entity::create(employees(), employee_columns(), None);

    let err = child
        .link_parent(&orders_employee_fk(), &parent)
        .expect_err("mismatch");
    assert!(matches!(err, EntityError::RelationshipMismatch { .. }));
}

#[test]
fn fill_if_absent_never_overwrites() {
    let entity = Entity::create(employees(), employee_columns(), None);

    assert!(entity.fill_if_absent("Id", Value::Int(1)));
    assert!(!entity.fill_if_absent("Id", Value::Int(2)));
    assert!(!entity.fill_if_absent("Salary", Value::Null));
    assert_eq!(entity.get_value("Id"), Some(Value::Int(1)));
}

#[test]
fn column_definitions_follow_the_model() {
    let entity = Entity::materialize(
        employees(),
        employee_columns(),
        [("Id", Value::Int(1)), ("o.Extra", Value::Int(2))],
        None,
    );

    let defs = entity.column_values_with_definition();
    let id = defs.iter().find(|(name, _, _)| name == "Id").expect("id");
    let extra = defs.iter().find(|(name, _, _)| name == "o.Extra").expect("extra");

    assert_eq!(id.2.as_ref().map(|c| c.affinity), Some(TypeAffinity::Integer));
    assert!(extra.2.is_none());
}
