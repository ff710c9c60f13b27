use crate::{
    driver::{Command, CommandResult, Connection, DriverError},
    obs::{CommandEvent, EventRegistry},
    persist::TransactionOptions,
};
use std::time::Duration;

///
/// CommandScope
///
/// One open connection plus the context it executes for. Every command
/// is published to the event registry before it reaches the driver.
///

pub struct CommandScope<'a> {
    connection: Box<dyn Connection>,
    events: &'a EventRegistry,
    connection_hash: &'a str,
    timeout: Option<Duration>,
}

impl<'a> CommandScope<'a> {
    #[must_use]
    pub fn new(
        connection: Box<dyn Connection>,
        events: &'a EventRegistry,
        connection_hash: &'a str,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            connection,
            events,
            connection_hash,
            timeout,
        }
    }

    fn prepare(&self, mut command: Command) -> Command {
        if command.timeout.is_none() {
            command.timeout = self.timeout;
        }
        self.events.publish(&CommandEvent::new(
            command.text.clone(),
            command.param_pairs(),
            self.connection_hash.to_string(),
        ));

        command
    }

    pub fn execute(&mut self, command: Command) -> Result<CommandResult, DriverError> {
        let command = self.prepare(command);
        self.connection.execute(&command)
    }

    pub async fn execute_async(&mut self, command: Command) -> Result<CommandResult, DriverError> {
        let command = self.prepare(command);
        self.connection.execute_async(&command).await
    }

    pub fn begin(&mut self, options: &TransactionOptions) -> Result<(), DriverError> {
        self.connection.begin(options)
    }

    pub fn commit(&mut self) -> Result<(), DriverError> {
        self.connection.commit()
    }

    pub fn rollback(&mut self) -> Result<(), DriverError> {
        self.connection.rollback()
    }

    pub async fn begin_async(&mut self, options: &TransactionOptions) -> Result<(), DriverError> {
        self.connection.begin_async(options).await
    }

    pub async fn commit_async(&mut self) -> Result<(), DriverError> {
        self.connection.commit_async().await
    }

    pub async fn rollback_async(&mut self) -> Result<(), DriverError> {
        self.connection.rollback_async().await
    }
}
