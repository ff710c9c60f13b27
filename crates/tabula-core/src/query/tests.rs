use super::*;
use crate::{
    model::{RelationshipDirection, Table},
    test_support::{employees, orders, orders_employee_fk},
};
use proptest::prelude::*;
use std::sync::Arc;

fn employee_query() -> Query {
    Query::from_table("e", employees())
}

///
/// Terminal operators
///

#[derive(Clone, Debug)]
enum Step {
    Filter,
    Select,
    Order,
    Skip,
}

fn apply(query: &Query, step: &Step, n: u64) -> Query {
    match step {
        Step::Filter => query.filter(Expr::col("e", "Id").gt(1)),
        Step::Select => query.select(Expr::col("e", "FirstName")),
        Step::Order => query.order_by("e", "LastName"),
        Step::Skip => query.skip(n),
    }
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        Just(Step::Filter),
        Just(Step::Select),
        Just(Step::Order),
        Just(Step::Skip),
    ]
}

proptest! {
    #[test]
    fn single_distinct_anywhere_flattens(
        steps in prop::collection::vec(step_strategy(), 0..8),
        at in any::<prop::sample::Index>(),
    ) {
        // only the first skip survives; drop repeats so the chain stays valid
        let mut seen_skip = false;
        let steps: Vec<Step> = steps
            .into_iter()
            .filter(|s| !matches!(s, Step::Skip) || !std::mem::replace(&mut seen_skip, true))
            .collect();
        let position = at.index(steps.len() + 1);

        let mut query = employee_query();
        for (i, step) in steps.iter().enumerate() {
            if i == position {
                query = query.distinct();
            }
            query = apply(&query, step, 5);
        }
        if position == steps.len() {
            query = query.distinct();
        }

        let desc = query.flatten().expect("single distinct flattens");
        prop_assert!(desc.distinct);

        let doubled = query.filter(Expr::col("e", "Active").eq(true)).distinct();
        prop_assert_eq!(doubled.flatten(), Err(QueryError::DuplicateDistinct));
    }

    #[test]
    fn second_take_accepted_iff_smaller_or_one(first in 0u64..200, second in 0u64..200) {
        let result = employee_query().take(first).take(second).flatten();

        if second <= first || second == 1 {
            let desc = result.expect("compatible take");
            prop_assert_eq!(desc.take, Some(first.min(second)));
        } else {
            prop_assert_eq!(
                result,
                Err(QueryError::IncompatibleTake { previous: first, requested: second })
            );
        }
    }
}

#[test]
fn projection_over_base_table_resolves_base_as_ultimate_child() {
    let desc = employee_query()
        .select(Expr::col("e", "FirstName"))
        .flatten()
        .expect("flatten");

    assert_eq!(desc.ultimate_child, Some(("e".to_string(), employees())));
    assert_eq!(desc.projections.len(), 1);
    assert!(desc.joins.is_empty());
    assert!(desc.grouping.is_empty());
}

#[test]
fn builder_never_mutates_the_receiver() {
    let base = employee_query().filter(Expr::col("e", "Active").eq(true));
    let paged = base.take(10);

    assert_eq!(base.flatten().expect("base").take, None);
    assert_eq!(paged.flatten().expect("paged").take, Some(10));
    assert!(Arc::ptr_eq(
        paged.node().input().expect("input"),
        base.node()
    ));
}

#[test]
fn join_from_base_keeps_base_as_ultimate_child() {
    let desc = employee_query()
        .join("e", &orders_employee_fk(), RelationshipDirection::Children, "o")
        .flatten()
        .expect("flatten");

    assert_eq!(desc.ultimate_child, Some(("e".to_string(), employees())));
    assert_eq!(desc.aliases.get("o"), Some(&orders()));
    assert_eq!(desc.source_alias(), "e");
}

#[test]
fn join_from_renamed_base_resolves_first_candidate() {
    let desc = employee_query()
        .join("emp", &orders_employee_fk(), RelationshipDirection::Children, "o")
        .filter(Expr::col("e", "Active").eq(true))
        .flatten()
        .expect("flatten");

    assert_eq!(desc.ultimate_child, Some(("emp".to_string(), employees())));
    assert_eq!(desc.aliases.get("emp"), Some(&employees()));
    assert_eq!(desc.source_alias(), "emp");
    assert_eq!(desc.resolve_alias("e"), "emp");
    assert_eq!(desc.resolve_alias("o"), "o");
}

#[test]
fn unregistered_first_candidate_falls_back_to_base_table() {
    // parent join declared from the child side: "o" is observed first
    let desc = Query::from_table("x", employees())
        .join("o", &orders_employee_fk(), RelationshipDirection::Parents, "e")
        .flatten()
        .expect("flatten");

    assert_eq!(desc.ultimate_child, Some(("o".to_string(), employees())));
    assert_eq!(desc.aliases.get("e"), Some(&employees()));
}

#[test]
fn duplicate_terminals_fail() {
    let q = employee_query();

    assert_eq!(
        q.skip(1).skip(2).flatten(),
        Err(QueryError::DuplicateSkip {
            previous: 1,
            requested: 2
        })
    );
    assert_eq!(q.count().count().flatten(), Err(QueryError::DuplicateCount));
    assert_eq!(
        q.union("SELECT 1", vec![]).except("SELECT 2", vec![]).flatten(),
        Err(QueryError::DuplicateSetOperation)
    );
}

#[test]
fn set_operation_conflicts_with_take_and_count() {
    let q = employee_query();

    assert_eq!(
        q.take(5).union("SELECT 1", vec![]).flatten(),
        Err(QueryError::SetOperationWithTake)
    );
    assert_eq!(
        q.union_all("SELECT 1", vec![]).take(5).flatten(),
        Err(QueryError::SetOperationWithTake)
    );
    assert_eq!(
        q.count().intersect("SELECT 1", vec![]).flatten(),
        Err(QueryError::SetOperationWithCount)
    );
    assert_eq!(
        q.intersect("SELECT 1", vec![]).count().flatten(),
        Err(QueryError::SetOperationWithCount)
    );
}

#[test]
fn nested_base_table_is_rejected() {
    let inner = QueryNode::base("e", employees());
    let nested = QueryNode::wrap(
        inner,
        QueryOp::BaseTable {
            alias: "o".to_string(),
            table: orders(),
        },
    );

    assert_eq!(
        flatten(&nested),
        Err(QueryError::NestedBaseTable {
            alias: "o".to_string()
        })
    );
}

#[test]
fn grouping_requires_keys() {
    let result = employee_query()
        .group_by("e", Vec::new(), vec![(AggregateOp::Sum, ColumnRef::new("e", "Salary"))])
        .flatten();

    assert_eq!(
        result,
        Err(QueryError::GroupingWithoutKeys {
            alias: "e".to_string()
        })
    );
}

#[test]
fn projection_columns_group_by_resolved_alias() {
    let desc = employee_query()
        .join("e", &orders_employee_fk(), RelationshipDirection::Children, "o")
        .select(Expr::col("e", "FirstName"))
        .select(Expr::col("o", "Id").eq(Expr::col("e", "Id")))
        .select(Expr::col("e", "FirstName"))
        .flatten()
        .expect("flatten");

    let columns = desc.projection_columns();
    assert_eq!(
        columns.get("e"),
        Some(&vec!["FirstName".to_string(), "Id".to_string()])
    );
    assert_eq!(columns.get("o"), Some(&vec!["Id".to_string()]));
}

#[test]
fn cross_join_registers_alias() {
    let regions = Table::new("dbo", "Regions");
    let desc = employee_query()
        .cross_join("e", regions.clone(), "r")
        .flatten()
        .expect("flatten");

    assert_eq!(desc.cross_joins, vec![("r".to_string(), regions.clone())]);
    assert_eq!(desc.aliases.get("r"), Some(&regions));
}

#[test]
fn long_chain_flattens_and_drops_without_recursion() {
    let mut query = employee_query();
    for i in 0..100_000_i64 {
        query = query.filter(Expr::col("e", "Id").not_eq(i));
    }

    let desc = query.flatten().expect("flatten");
    assert_eq!(desc.filters.len(), 100_000);
    drop(query);
}

#[test]
fn expr_columns_in_evaluation_order() {
    let expr = Expr::col("e", "A")
        .eq(1)
        .and(Expr::col("o", "B").is_null().negate())
        .or(Expr::col("e", "C").in_list([1, 2]));

    let names: Vec<_> = expr.columns().into_iter().map(|c| c.column.as_str()).collect();
    assert_eq!(names, vec!["A", "B", "C"]);
}
