//! Container infrastructure for pgharness.
//!
//! This crate owns everything that touches a container engine: locating the
//! docker binary, starting PostgreSQL containers, polling them to readiness,
//! running psql inside them, compose stacks, and teardown. Every external
//! program is run with a typed argv through [`CommandRunner`]; nothing is
//! passed through a host shell.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use pgharness_docker::{
//!     CancellationToken, ContainerController, ContainerSpec, DockerCli, PgCredentials,
//!     PollPolicy, ResourceLedger, RunIdentity, SqlRunner, SystemRunner,
//! };
//!
//! let cancel = CancellationToken::new();
//! let docker = DockerCli::locate(None, Arc::new(SystemRunner::new(cancel.clone())))?;
//! let identity = RunIdentity::new();
//! let mut ledger = ResourceLedger::new(identity.clone());
//!
//! let credentials = PgCredentials::default();
//! let spec = ContainerSpec::postgres(&identity, "primary", "postgres:17", &credentials, "");
//! let controller = ContainerController::new(&docker, cancel);
//! let mut primary = controller.start(&spec, credentials, &mut ledger)?;
//! controller.wait_until_ready(&mut primary, &PollPolicy::first_boot())?;
//!
//! let version = SqlRunner::new(&docker).query_scalar("SHOW server_version", &primary.sql_target()?);
//! println!("{:?}", version);
//! ledger.teardown(&docker);
//! # Ok::<(), pgharness_docker::InfraError>(())
//! ```

pub mod cancel;
pub mod cleanup;
pub mod compose;
pub mod docker;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod policy;
pub mod process;
pub mod runtime;
pub mod sql;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use cancel::{install_signal_handlers, CancellationToken, SIGINT, SIGTERM};
pub use cleanup::{cleanup_run, CleanupReport, ResourceLedger};
pub use compose::ComposeStack;
pub use docker::{find_docker, DockerCli, DOCKER_ENV};
pub use error::{InfraError, InfraResult};
pub use identity::{RunIdentity, NAME_PREFIX, RUN_LABEL};
pub use lifecycle::{ContainerController, LifecycleState, ManagedContainer};
pub use policy::{PollError, PollPolicy, PollStep};
pub use process::{CommandRunner, ProcessError, ProcessOutput, ProcessSpec, SystemRunner};
pub use runtime::{
    ContainerRuntime, ContainerSpec, ContainerState, ExecRequest, HealthStatus, PgCredentials,
    ResourceLimits, RunResources, ServiceStatus,
};
pub use sql::{SqlOutput, SqlRunner, SqlTarget};
