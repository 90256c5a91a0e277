//! A regression session backed by a PostgreSQL container.

use std::time::Duration;

use pgharness_docker::{
    CancellationToken, ContainerController, ContainerRuntime, ContainerSpec, InfraError,
    InfraResult, ManagedContainer, PgCredentials, PollPolicy, ResourceLedger, ResourceLimits,
    RunIdentity, SqlOutput, SqlRunner, SqlTarget,
};

use crate::catalog::Tier;
use crate::comparator::ScriptRunner;
use crate::orchestrator::TierSession;

/// Database recreated for every tier.
pub const REGRESSION_DATABASE: &str = "regression";

/// Role name of the session's container.
pub const SESSION_ROLE: &str = "regress";

/// How to start the session's container.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Image reference.
    pub image: String,
    pub credentials: PgCredentials,
    /// `shared_preload_libraries` value; empty for none.
    pub preload: String,
    /// Readiness polling.
    pub readiness: PollPolicy,
    pub limits: ResourceLimits,
    /// Log lines captured on failure.
    pub log_tail_lines: usize,
    /// Bound for each psql invocation.
    pub statement_timeout: Option<Duration>,
}

impl SessionConfig {
    /// Defaults for `image` with the given preload string.
    pub fn new(image: impl Into<String>, preload: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            credentials: PgCredentials::default(),
            preload: preload.into(),
            readiness: PollPolicy::first_boot(),
            limits: ResourceLimits::default(),
            log_tail_lines: pgharness_docker::lifecycle::DEFAULT_LOG_TAIL_LINES,
            statement_timeout: None,
        }
    }
}

/// A healthy container with a fresh regression database per tier.
pub struct ContainerSession<'a> {
    runtime: &'a dyn ContainerRuntime,
    controller: ContainerController<'a>,
    container: ManagedContainer,
    admin: SqlTarget,
    target: SqlTarget,
    statement_timeout: Option<Duration>,
}

impl<'a> ContainerSession<'a> {
    /// Starts the container and waits for readiness.
    ///
    /// The container is recorded in `ledger` before it starts; the caller
    /// tears the ledger down on every path, including this one failing.
    pub fn start(
        runtime: &'a dyn ContainerRuntime,
        identity: &RunIdentity,
        config: &SessionConfig,
        cancel: CancellationToken,
        ledger: &mut ResourceLedger,
    ) -> InfraResult<Self> {
        let spec = ContainerSpec::postgres(
            identity,
            SESSION_ROLE,
            &config.image,
            &config.credentials,
            &config.preload,
        )
        .limits(config.limits.clone());
        if !config.preload.is_empty() {
            tracing::info!(preload = %config.preload, "shared_preload_libraries");
        }

        let controller =
            ContainerController::new(runtime, cancel).log_tail_lines(config.log_tail_lines);
        let mut container = controller.start(&spec, config.credentials.clone(), ledger)?;
        controller.wait_until_ready(&mut container, &config.readiness)?;

        let admin = container.sql_target()?;
        let target = admin.with_database(REGRESSION_DATABASE);
        Ok(Self {
            runtime,
            controller,
            container,
            admin,
            target,
            statement_timeout: config.statement_timeout,
        })
    }

    /// The managed container.
    pub fn container(&self) -> &ManagedContainer {
        &self.container
    }

    /// Where regression scripts run.
    pub fn target(&self) -> &SqlTarget {
        &self.target
    }

    /// Runs administrative SQL on the maintenance database.
    pub fn admin_sql(&self, sql: &str) -> SqlOutput {
        self.sql().run(sql, &self.admin)
    }

    fn sql(&self) -> SqlRunner<'a> {
        let runner = SqlRunner::new(self.runtime);
        match self.statement_timeout {
            Some(timeout) => runner.timeout(timeout),
            None => runner,
        }
    }

    fn ensure_running(&self) -> InfraResult<()> {
        let name = self.container.name();
        let status = self.runtime.inspect(name)?;
        if status.state.is_terminal() {
            return Err(InfraError::ContainerExited {
                name: name.to_string(),
                state: status.state,
                exit_code: status.exit_code,
                log_tail: self.controller.log_tail(name),
            });
        }
        Ok(())
    }
}

impl ScriptRunner for ContainerSession<'_> {
    fn run_script(&self, sql: &str) -> SqlOutput {
        self.sql().run_regression(sql, &self.target)
    }
}

impl TierSession for ContainerSession<'_> {
    fn prepare_tier(&mut self, tier: Tier) -> InfraResult<()> {
        self.ensure_running()?;
        let statements = [
            format!("DROP DATABASE IF EXISTS {} WITH (FORCE)", REGRESSION_DATABASE),
            format!("CREATE DATABASE {}", REGRESSION_DATABASE),
        ];
        for statement in &statements {
            let output = self.admin_sql(statement);
            if !output.success {
                return Err(InfraError::command_failed(
                    statement.as_str(),
                    output.exit_code,
                    output.stderr,
                ));
            }
        }
        tracing::debug!(tier = %tier, database = REGRESSION_DATABASE, "database recreated");
        Ok(())
    }
}
