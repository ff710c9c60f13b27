use super::*;

#[test]
fn full_name_splits_on_first_dot() {
    let table = Table::from_full_name("dbo.Order.Lines");

    assert_eq!(table.schema(), "dbo");
    assert_eq!(table.name(), "Order.Lines");
    assert_eq!(table.full_name(), "dbo.Order.Lines");
}

#[test]
fn table_without_schema_uses_bare_name() {
    let table = Table::from_full_name("Employees");

    assert_eq!(table.schema(), "");
    assert_eq!(table.full_name(), "Employees");
    assert_eq!(table.to_string(), "Employees");
}

#[test]
fn column_map_lists_primary_keys_in_name_order() {
    let columns: ColumnMap = [
        Column::new("Region", TypeAffinity::Text, "nvarchar").primary_key(),
        Column::new("Code", TypeAffinity::Integer, "int").primary_key(),
        Column::new("Name", TypeAffinity::Text, "nvarchar"),
    ]
    .into_iter()
    .collect();

    assert_eq!(columns.primary_keys(), vec!["Code", "Region"]);
    assert!(columns.is_primary_key("Code"));
    assert!(!columns.is_primary_key("Name"));
    assert!(!columns.is_primary_key("Missing"));
}

#[test]
fn sproc_name_walks_nested_descriptor() {
    let def = SprocDefinition {
        name: SprocName::new("dbo", "GetEmployees"),
        params: Vec::new(),
    };
    let nested = Sproc::Root(
        "Procedures".to_string(),
        Box::new(Sproc::Definition(def.clone())),
    );

    assert_eq!(nested.name(), "Procedures.dbo.GetEmployees");
    assert_eq!(Sproc::Definition(def).name(), "dbo.GetEmployees");
    assert_eq!(Sproc::Empty.name(), "");
    assert_eq!(
        Sproc::Package("Payroll".to_string(), Vec::new()).name(),
        "Payroll"
    );
}

#[test]
fn sproc_inputs_are_ordered_by_ordinal() {
    let def = SprocDefinition {
        name: SprocName::new("dbo", "Raise"),
        params: vec![
            QueryParameter::input("@amount", "decimal", 2),
            QueryParameter {
                name: "@result".to_string(),
                type_tag: "int".to_string(),
                direction: ParameterDirection::Return,
                ordinal: 0,
            },
            QueryParameter::input("@id", "int", 1),
        ],
    };

    let names: Vec<_> = def.inputs().iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["@id", "@amount"]);
    assert_eq!(def.outputs().len(), 1);
}

#[test]
fn relationship_set_partitions_by_role() {
    let employees = Table::new("dbo", "Employees");
    let orders = Table::new("dbo", "Orders");
    let rel = Relationship {
        name: "FK_Orders_Employees".to_string(),
        primary_table: employees.clone(),
        primary_keys: vec!["Id".to_string()],
        foreign_table: orders.clone(),
        foreign_keys: vec!["EmployeeId".to_string()],
    };

    let for_employees = RelationshipSet::partition(&employees, [rel.clone()]);
    let for_orders = RelationshipSet::partition(&orders, [rel.clone()]);

    assert_eq!(for_employees.children, vec![rel.clone()]);
    assert!(for_employees.parents.is_empty());
    assert_eq!(for_orders.parents, vec![rel.clone()]);
    assert!(rel.is_parent_of(&orders));
    assert_eq!(rel.key_pairs().collect::<Vec<_>>(), vec![("Id", "EmployeeId")]);
}
