//! End-to-end use of the public facade over an in-memory driver.

use futures::executor::block_on;
use parking_lot::Mutex;
use std::sync::Arc;
use tabula_core::{
    cache::SchemaCache,
    driver::{
        Command, CommandResult, Connection, ConnectionFactory, DriverError, RawColumn, ResultSet,
        SchemaDiscovery,
    },
    error::ErrorClass,
    model::{Relationship, Sproc},
    obs::{CommandEvent, EventRegistry},
    persist::TransactionOptions,
    prelude::*,
    sql::MsSqlProvider,
};

fn employees() -> Table {
    Table::new("dbo", "Employees")
}

fn orders() -> Table {
    Table::new("dbo", "Orders")
}

fn raw(name: &str, type_tag: &str, key: bool) -> RawColumn {
    RawColumn {
        name: name.to_string(),
        type_tag: type_tag.to_string(),
        is_nullable: !key,
        is_primary_key: key,
        is_identity: key,
    }
}

///
/// Catalog
///

struct Catalog;

impl SchemaDiscovery for Catalog {
    fn tables(&self) -> Result<Vec<Table>, DriverError> {
        Ok(vec![employees(), orders()])
    }

    fn columns(&self, table: &Table) -> Result<Vec<RawColumn>, DriverError> {
        Ok(match table.name() {
            "Employees" => vec![
                raw("Id", "int", true),
                raw("FirstName", "nvarchar(50)", false),
                raw("LastName", "nvarchar(50)", false),
            ],
            "Orders" => vec![
                raw("Id", "int", true),
                raw("EmployeeId", "int", false),
                raw("Total", "decimal(10,2)", false),
            ],
            _ => Vec::new(),
        })
    }

    fn relationships(&self, table: &Table) -> Result<Vec<Relationship>, DriverError> {
        let fk = Relationship {
            name: "FK_Orders_Employees".to_string(),
            primary_table: employees(),
            primary_keys: vec!["Id".to_string()],
            foreign_table: orders(),
            foreign_keys: vec!["EmployeeId".to_string()],
        };

        Ok(if table == &employees() || table == &orders() {
            vec![fk]
        } else {
            Vec::new()
        })
    }

    fn sprocs(&self) -> Result<Vec<Sproc>, DriverError> {
        Ok(Vec::new())
    }
}

///
/// Database
///
/// Hands out identities from 1 and remembers every command text.
///

#[derive(Clone, Default)]
struct Database {
    commands: Arc<Mutex<Vec<String>>>,
    next_id: Arc<Mutex<i64>>,
}

impl ConnectionFactory for Database {
    fn connect(&self, _connection_string: &str) -> Result<Box<dyn Connection>, DriverError> {
        Ok(Box::new(self.clone()))
    }
}

impl Connection for Database {
    fn execute(&mut self, command: &Command) -> Result<CommandResult, DriverError> {
        self.commands.lock().push(command.text.clone());

        if command.text.contains("SCOPE_IDENTITY") {
            let mut next = self.next_id.lock();
            *next += 1;
            Ok(CommandResult::Scalar(Value::Int(*next)))
        } else if command.text.starts_with("SELECT") {
            Ok(CommandResult::Rows(ResultSet::new(
                vec!["Id".into(), "FirstName".into(), "LastName".into()],
                vec![vec![Value::Int(1), "Ada".into(), "Byron".into()]],
            )))
        } else {
            Ok(CommandResult::Affected(1))
        }
    }

    fn begin(&mut self, _options: &TransactionOptions) -> Result<(), DriverError> {
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DriverError> {
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DriverError> {
        Ok(())
    }
}

fn context(db: &Database, events: Arc<EventRegistry>) -> DataContext {
    let provider = MsSqlProvider::new(
        Arc::new(db.clone()),
        Arc::new(Catalog),
        Arc::new(SchemaCache::new()),
    );

    DataContext::new(Arc::new(provider), "Server=integration", events)
}

#[test]
fn parent_inserted_before_child_created_first() {
    let db = Database::default();
    let events = Arc::new(EventRegistry::new());
    let raw_sql = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&raw_sql);
    events.subscribe(move |event: &CommandEvent| sink.lock().push(event.to_raw_sql()));
    let ctx = context(&db, Arc::clone(&events));

    let fk = ctx
        .provider()
        .get_relationships(&orders())
        .expect("relationships")
        .parents
        .remove(0);

    let order = ctx.create_entity(&orders()).expect("order");
    order.set_column("Total", 12.5).expect("total");
    let employee = ctx.create_entity(&employees()).expect("employee");
    employee.set_column("FirstName", "Ada").expect("name");
    order.link_parent(&fk, &employee).expect("linked");

    assert_eq!(ctx.submit_updates().expect("submitted"), 2);

    let commands = db.commands.lock().clone();
    assert!(commands[0].starts_with("INSERT INTO [dbo].[Employees]"), "{commands:?}");
    assert!(commands[1].starts_with("INSERT INTO [dbo].[Orders]"), "{commands:?}");

    assert_eq!(employee.get_column::<i64>("Id").expect("id"), 1);
    assert_eq!(order.get_column::<i64>("Id").expect("id"), 2);
    assert_eq!(order.get_column::<i64>("EmployeeId").expect("fk"), 1);
    assert_eq!(order.state(), EntityState::Unchanged);
    assert!(ctx.pending_entities().is_empty());

    let raw_sql = raw_sql.lock();
    assert_eq!(raw_sql.len(), 2);
    assert!(raw_sql[0].contains("'Ada'"), "{}", raw_sql[0]);
}

#[test]
fn loaded_rows_update_and_delete() {
    let db = Database::default();
    let ctx = context(&db, Arc::new(EventRegistry::new()));

    let rows = ctx
        .execute_query(
            &Query::from_table("e", employees())
                .filter(Expr::col("e", "LastName").eq("Byron"))
                .take(1),
        )
        .expect("rows");
    let ada = &rows[0];

    ada.set_column("LastName", "Lovelace").expect("rename");
    assert!(matches!(ada.state(), EntityState::Modified(_)));
    ctx.submit_updates().expect("updated");
    assert_eq!(ada.state(), EntityState::Unchanged);

    ada.delete();
    assert_eq!(block_on(ctx.submit_updates_async()).expect("deleted"), 1);
    assert_eq!(ada.state(), EntityState::Deleted);

    let err = ada.set_column("FirstName", "Augusta").expect_err("deleted rows are frozen");
    assert!(err.to_string().contains("FirstName"));

    let commands = db.commands.lock().clone();
    assert_eq!(
        commands[1..],
        [
            "UPDATE [dbo].[Employees] SET [LastName] = @p0 WHERE [Id] = @p1",
            "DELETE FROM [dbo].[Employees] WHERE [Id] = @p0",
        ]
    );
}

#[test]
fn structural_query_errors_surface_before_any_command() {
    let db = Database::default();
    let ctx = context(&db, Arc::new(EventRegistry::new()));

    let err = ctx
        .execute_query(&Query::from_table("e", employees()).take(5).take(10))
        .expect_err("incompatible take");

    assert_eq!(err.class, ErrorClass::InvariantViolation);
    assert!(db.commands.lock().is_empty());
}
