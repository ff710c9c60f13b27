use crate::{
    driver::{CommandResult, DriverError},
    entity::EntityRef,
    model::ColumnMap,
    persist::{
        ConflictPolicy, PendingChanges, PersistError, SchemaSource, TransactionOptions,
        WriteOperation, WritePlan, WriteStatement, statement,
    },
    sql::{CommandScope, Dialect},
    value::Value,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

///
/// Batch
///
/// Bookkeeping for one submission: what was written, and which key values
/// were filled in along the way so a rollback can take them back.
///

#[derive(Default)]
struct Batch {
    written: Vec<(EntityRef, WriteOperation)>,
    filled: Vec<(EntityRef, String)>,
}

impl Batch {
    fn fill(&mut self, entity: &EntityRef, column: &str, value: Value) -> bool {
        let filled = entity.fill_if_absent(column, value);
        if filled {
            self.filled.push((Arc::clone(entity), column.to_string()));
        }
        filled
    }

    // copy now-known parent keys into the entity's foreign-key columns
    fn resolve_links(&mut self, entity: &EntityRef) -> Vec<String> {
        let mut filled = Vec::new();
        for link in entity.parent_links() {
            for (pk, fk) in link.relationship.key_pairs() {
                if let Some(value) = link.parent.get_value(pk)
                    && self.fill(entity, fk, value)
                {
                    filled.push(fk.to_string());
                }
            }
        }
        filled
    }

    fn render(
        &mut self,
        dialect: &dyn Dialect,
        operation: WriteOperation,
        entity: &EntityRef,
        columns: &ColumnMap,
    ) -> Result<Option<WriteStatement>, PersistError> {
        let filled = match operation {
            WriteOperation::Delete => Vec::new(),
            WriteOperation::Insert | WriteOperation::Update => self.resolve_links(entity),
        };

        match operation {
            WriteOperation::Insert => statement::insert(dialect, entity, columns).map(Some),
            WriteOperation::Update => statement::update(dialect, entity, columns, &filled),
            WriteOperation::Delete => statement::delete(dialect, entity, columns).map(Some),
        }
    }

    fn absorb(
        &mut self,
        entity: &EntityRef,
        statement: Option<&WriteStatement>,
        operation: WriteOperation,
        columns: &ColumnMap,
        result: Option<CommandResult>,
    ) {
        if let (Some(statement), Some(result)) = (statement, result)
            && statement.reads_identity
            && let [key] = columns.primary_keys().as_slice()
            && let Some(value) = identity_value(result)
        {
            let value = match columns.get(*key) {
                Some(column) => value.clone().coerce_to(column.affinity).unwrap_or(value),
                None => value,
            };
            self.fill(entity, key, value);
        }

        self.written.push((Arc::clone(entity), operation));
    }

    fn revert(self) {
        for (entity, column) in self.filled {
            entity.clear_value(&column);
        }
    }

    fn finish(self, pending: &PendingChanges) -> usize {
        for (entity, operation) in &self.written {
            match operation {
                WriteOperation::Insert | WriteOperation::Update => entity.accept_changes(),
                WriteOperation::Delete => entity.mark_deleted(),
            }
            pending.remove(entity.id());
        }

        self.written.len()
    }
}

fn identity_value(result: CommandResult) -> Option<Value> {
    let value = match result {
        CommandResult::Scalar(value) => value,
        CommandResult::Rows(rows) => rows.first_value()?.clone(),
        CommandResult::Sets(mut sets) => return identity_value(sets.pop()?.1),
        CommandResult::Affected(_) => return None,
    };

    (!value.is_null()).then_some(value)
}

fn statement_error(entity: &EntityRef, statement: &WriteStatement, source: DriverError) -> PersistError {
    match source {
        DriverError::Constraint(message)
            if statement.operation == WriteOperation::Insert
                && entity.on_conflict() == ConflictPolicy::Throw =>
        {
            PersistError::Conflict {
                entity: entity.id(),
                table: entity.table().clone(),
                message,
            }
        }
        source => PersistError::Statement {
            entity: entity.id(),
            table: entity.table().clone(),
            operation: statement.operation,
            source,
        },
    }
}

///
/// Prepared
///
/// Plan plus the column model of every touched table.
///

struct Prepared {
    plan: WritePlan,
    // one per plan step
    columns: Vec<Arc<ColumnMap>>,
}

fn prepare(entities: &[EntityRef], schema: &dyn SchemaSource) -> Result<Prepared, PersistError> {
    let plan = WritePlan::build(entities, schema)?;

    let mut columns = Vec::with_capacity(plan.len());
    for (_, entity) in plan.steps() {
        let mut model = schema.columns(entity.table())?;
        if model.is_empty() {
            model = Arc::clone(entity.columns());
        }
        columns.push(model);
    }

    Ok(Prepared { plan, columns })
}

fn log_rollback(err: &PersistError, rollback: Result<(), DriverError>) {
    warn!(error = %err, "write batch failed; rolling back");
    if let Err(rollback) = rollback {
        warn!(error = %rollback, "rollback failed");
    }
}

/// Submit every dirty entity in `pending` as one transaction.
///
/// Statements are issued in plan order. Entity states move only after the
/// commit succeeds; any failure rolls the transaction back and leaves the
/// dirty set as it was. Returns the number of entities written.
pub fn apply_pending(
    scope: &mut CommandScope<'_>,
    dialect: &dyn Dialect,
    schema: &dyn SchemaSource,
    pending: &PendingChanges,
    options: &TransactionOptions,
) -> Result<usize, PersistError> {
    let entities = pending.snapshot();
    if entities.is_empty() {
        return Ok(0);
    }
    let Prepared { plan, columns } = prepare(&entities, schema)?;

    scope.begin(options).map_err(PersistError::Transaction)?;
    let mut batch = Batch::default();

    let outcome = plan
        .steps()
        .zip(&columns)
        .try_for_each(|((operation, entity), model)| {
            let statement = batch.render(dialect, operation, entity, model)?;
            let result = match &statement {
                Some(statement) => {
                    debug!(%operation, table = %entity.table(), entity = %entity.id(), "issuing write");
                    Some(
                        scope
                            .execute(statement.command.clone())
                            .map_err(|err| statement_error(entity, statement, err))?,
                    )
                }
                None => None,
            };
            batch.absorb(entity, statement.as_ref(), operation, model, result);

            Ok(())
        })
        .and_then(|()| scope.commit().map_err(PersistError::Transaction));

    match outcome {
        Ok(()) => {
            let written = batch.finish(pending);
            info!(written, "committed write batch");
            Ok(written)
        }
        Err(err) => {
            log_rollback(&err, scope.rollback());
            batch.revert();
            Err(err)
        }
    }
}

/// Asynchronous [`apply_pending`]. Statements are awaited one at a time in
/// the same order.
pub async fn apply_pending_async(
    scope: &mut CommandScope<'_>,
    dialect: &dyn Dialect,
    schema: &dyn SchemaSource,
    pending: &PendingChanges,
    options: &TransactionOptions,
) -> Result<usize, PersistError> {
    let entities = pending.snapshot();
    if entities.is_empty() {
        return Ok(0);
    }
    let Prepared { plan, columns } = prepare(&entities, schema)?;

    scope
        .begin_async(options)
        .await
        .map_err(PersistError::Transaction)?;
    let mut batch = Batch::default();

    let mut outcome = Ok(());
    for ((operation, entity), model) in plan.steps().zip(&columns) {
        let statement = match batch.render(dialect, operation, entity, model) {
            Ok(statement) => statement,
            Err(err) => {
                outcome = Err(err);
                break;
            }
        };

        let mut result = None;
        if let Some(statement) = &statement {
            debug!(%operation, table = %entity.table(), entity = %entity.id(), "issuing write");
            match scope.execute_async(statement.command.clone()).await {
                Ok(r) => result = Some(r),
                Err(err) => {
                    outcome = Err(statement_error(entity, statement, err));
                    break;
                }
            }
        }
        batch.absorb(entity, statement.as_ref(), operation, model, result);
    }

    if outcome.is_ok() {
        outcome = scope
            .commit_async()
            .await
            .map_err(PersistError::Transaction);
    }

    match outcome {
        Ok(()) => {
            let written = batch.finish(pending);
            info!(written, "committed write batch");
            Ok(written)
        }
        Err(err) => {
            let rollback = scope.rollback_async().await;
            log_rollback(&err, rollback);
            batch.revert();
            Err(err)
        }
    }
}
