//! Fixtures shared by unit tests: a two-table schema, a recording change
//! tracker and a scripted in-memory driver.

use crate::{
    driver::{
        Command, CommandResult, Connection, ConnectionFactory, DriverError, RawColumn, ResultSet,
        SchemaDiscovery,
    },
    entity::{ChangeTracker, EntityId, EntityRef},
    model::{Column, ColumnMap, Relationship, RelationshipSet, Sproc, Table, TypeAffinity},
    persist::{SchemaSource, TransactionOptions},
    sql::ProviderError,
    value::Value,
};
use parking_lot::Mutex;
use std::sync::Arc;

// ----------------------------------------------------------------------
// Schema
// ----------------------------------------------------------------------

pub(crate) fn employees() -> Table {
    Table::new("dbo", "Employees")
}

pub(crate) fn orders() -> Table {
    Table::new("dbo", "Orders")
}

pub(crate) fn employee_columns() -> Arc<ColumnMap> {
    Arc::new(
        [
            Column::new("Id", TypeAffinity::Integer, "int")
                .primary_key()
                .identity(),
            Column::new("FirstName", TypeAffinity::Text, "nvarchar"),
            Column::new("LastName", TypeAffinity::Text, "nvarchar"),
            Column::new("Active", TypeAffinity::Boolean, "bit"),
            Column::new("Salary", TypeAffinity::Float, "float"),
        ]
        .into_iter()
        .collect(),
    )
}

pub(crate) fn order_columns() -> Arc<ColumnMap> {
    Arc::new(
        [
            Column::new("Id", TypeAffinity::Integer, "int")
                .primary_key()
                .identity(),
            Column::new("EmployeeId", TypeAffinity::Integer, "int").not_null(),
            Column::new("Total", TypeAffinity::Float, "float"),
        ]
        .into_iter()
        .collect(),
    )
}

pub(crate) fn orders_employee_fk() -> Relationship {
    Relationship {
        name: "FK_Orders_Employees".to_string(),
        primary_table: employees(),
        primary_keys: vec!["Id".to_string()],
        foreign_table: orders(),
        foreign_keys: vec!["EmployeeId".to_string()],
    }
}

fn columns_for(table: &Table) -> Option<Arc<ColumnMap>> {
    if table == &employees() {
        Some(employee_columns())
    } else if table == &orders() {
        Some(order_columns())
    } else {
        None
    }
}

///
/// StaticSchema
///
/// Metadata source over the fixture schema.
///

#[derive(Default)]
pub(crate) struct StaticSchema {
    pub(crate) relationships: Vec<Relationship>,
}

impl StaticSchema {
    pub(crate) fn with_fk() -> Self {
        Self {
            relationships: vec![orders_employee_fk()],
        }
    }
}

impl SchemaSource for StaticSchema {
    fn columns(&self, table: &Table) -> Result<Arc<ColumnMap>, ProviderError> {
        columns_for(table).ok_or_else(|| ProviderError::UnknownTable {
            table: table.full_name().to_string(),
        })
    }

    fn relationships(&self, table: &Table) -> Result<RelationshipSet, ProviderError> {
        Ok(RelationshipSet::partition(
            table,
            self.relationships.iter().cloned(),
        ))
    }
}

///
/// StaticDiscovery
///
/// Live-catalog stand-in reporting the fixture schema.
///

#[derive(Default)]
pub(crate) struct StaticDiscovery {
    pub(crate) sprocs: Vec<Sproc>,
}

impl SchemaDiscovery for StaticDiscovery {
    fn tables(&self) -> Result<Vec<Table>, DriverError> {
        Ok(vec![employees(), orders()])
    }

    fn columns(&self, table: &Table) -> Result<Vec<RawColumn>, DriverError> {
        Ok(columns_for(table)
            .map(|columns| {
                columns
                    .values()
                    .map(|column| RawColumn {
                        name: column.name.clone(),
                        type_tag: column.type_tag.clone(),
                        is_nullable: column.is_nullable,
                        is_primary_key: column.is_primary_key,
                        is_identity: column.is_identity,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn relationships(&self, table: &Table) -> Result<Vec<Relationship>, DriverError> {
        let fk = orders_employee_fk();
        let touches = &fk.primary_table == table || &fk.foreign_table == table;

        Ok(if touches { vec![fk] } else { Vec::new() })
    }

    fn sprocs(&self) -> Result<Vec<Sproc>, DriverError> {
        Ok(self.sprocs.clone())
    }
}

// ----------------------------------------------------------------------
// Change tracking
// ----------------------------------------------------------------------

///
/// RecordingTracker
///

#[derive(Default)]
pub(crate) struct RecordingTracker {
    tracked: Mutex<Vec<EntityId>>,
    forgotten: Mutex<Vec<EntityId>>,
    changed: Mutex<Vec<(EntityId, String)>>,
}

impl RecordingTracker {
    /// The recorder plus the same value as a tracker handle.
    pub(crate) fn shared() -> (Arc<Self>, Arc<dyn ChangeTracker>) {
        let recorder = Arc::new(Self::default());
        let tracker: Arc<dyn ChangeTracker> = recorder.clone();

        (recorder, tracker)
    }

    pub(crate) fn tracked(&self) -> Vec<EntityId> {
        self.tracked.lock().clone()
    }

    pub(crate) fn forgotten(&self) -> Vec<EntityId> {
        self.forgotten.lock().clone()
    }

    pub(crate) fn changed_columns(&self) -> Vec<(EntityId, String)> {
        self.changed.lock().clone()
    }
}

impl ChangeTracker for RecordingTracker {
    fn track(&self, entity: &EntityRef) {
        self.tracked.lock().push(entity.id());
    }

    fn forget(&self, id: EntityId) {
        self.forgotten.lock().push(id);
    }

    fn column_changed(&self, entity: &EntityRef, column: &str) {
        self.changed.lock().push((entity.id(), column.to_string()));
    }

    fn column_model(&self, table: &Table) -> Option<Arc<ColumnMap>> {
        columns_for(table)
    }
}

// ----------------------------------------------------------------------
// Driver
// ----------------------------------------------------------------------

type Responder = dyn Fn(&Command) -> Result<CommandResult, DriverError> + Send + Sync;

///
/// DriverLog
///
/// Everything a scripted connection was asked to do.
///

#[derive(Debug, Default)]
pub(crate) struct DriverLog {
    pub(crate) commands: Vec<Command>,
    pub(crate) begins: usize,
    pub(crate) commits: usize,
    pub(crate) rollbacks: usize,
}

impl DriverLog {
    pub(crate) fn texts(&self) -> Vec<String> {
        self.commands.iter().map(|c| c.text.clone()).collect()
    }
}

///
/// ScriptedDriver
///
/// Connection factory whose connections share one log and answer every
/// command through one responder. The default responder hands out
/// identities from 100 upward and reports one affected row otherwise.
///

#[derive(Clone)]
pub(crate) struct ScriptedDriver {
    log: Arc<Mutex<DriverLog>>,
    responder: Arc<Responder>,
}

impl ScriptedDriver {
    pub(crate) fn new() -> Self {
        let next_identity = Arc::new(Mutex::new(100_i64));

        Self::responding(move |command| {
            if command.text.contains("SCOPE_IDENTITY") {
                let mut next = next_identity.lock();
                let id = *next;
                *next += 1;
                Ok(CommandResult::Scalar(Value::Int(id)))
            } else if command.text.starts_with("SELECT") {
                Ok(CommandResult::Rows(ResultSet::default()))
            } else {
                Ok(CommandResult::Affected(1))
            }
        })
    }

    pub(crate) fn responding(
        responder: impl Fn(&Command) -> Result<CommandResult, DriverError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            log: Arc::new(Mutex::new(DriverLog::default())),
            responder: Arc::new(responder),
        }
    }

    /// Default responses, except commands containing `needle` fail.
    pub(crate) fn failing_on(needle: &'static str, error: fn(String) -> DriverError) -> Self {
        let fallback = Self::new().responder;

        Self::responding(move |command| {
            if command.text.contains(needle) {
                Err(error(format!("scripted failure on {needle}")))
            } else {
                fallback(command)
            }
        })
    }

    pub(crate) fn log(&self) -> parking_lot::MutexGuard<'_, DriverLog> {
        self.log.lock()
    }

    pub(crate) fn connection(&self) -> Box<dyn Connection> {
        Box::new(ScriptedConnection {
            log: Arc::clone(&self.log),
            responder: Arc::clone(&self.responder),
        })
    }
}

impl ConnectionFactory for ScriptedDriver {
    fn connect(&self, _connection_string: &str) -> Result<Box<dyn Connection>, DriverError> {
        Ok(self.connection())
    }
}

struct ScriptedConnection {
    log: Arc<Mutex<DriverLog>>,
    responder: Arc<Responder>,
}

impl Connection for ScriptedConnection {
    fn execute(&mut self, command: &Command) -> Result<CommandResult, DriverError> {
        self.log.lock().commands.push(command.clone());
        (self.responder)(command)
    }

    fn begin(&mut self, _options: &TransactionOptions) -> Result<(), DriverError> {
        self.log.lock().begins += 1;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DriverError> {
        self.log.lock().commits += 1;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DriverError> {
        self.log.lock().rollbacks += 1;
        Ok(())
    }
}
