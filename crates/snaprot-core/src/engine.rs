use std::path::PathBuf;
use std::rc::Rc;

use crate::backend::SnapshotBackend;
use crate::config::{Settings, TransportConfig};
use crate::error::SnaprotError;
use crate::exec::CommandRunner;
use crate::ops::{Mode, Operator};
use crate::policy::RetentionPolicy;
use crate::source::SourceEntry;
use crate::store::SlotStore;

/// Everything one invocation needs to rotate, prune and create slots.
///
/// The operations themselves live in [`rotate`](crate::rotate),
/// [`prune`](crate::prune), [`create`](crate::create),
/// [`nested`](crate::nested) and [`lifecycle`](crate::lifecycle).
pub struct Engine {
    pub(crate) store: SlotStore,
    pub(crate) policy: RetentionPolicy,
    pub(crate) ops: Operator,
    pub(crate) sources: Vec<SourceEntry>,
    pub(crate) transport: TransportConfig,
}

impl Engine {
    pub fn new(
        root: impl Into<PathBuf>,
        policy: RetentionPolicy,
        backend: Rc<dyn SnapshotBackend>,
        runner: Box<dyn CommandRunner>,
        mode: Mode,
    ) -> Self {
        Self {
            store: SlotStore::new(root, Rc::clone(&backend)),
            policy,
            ops: Operator::new(backend, runner, mode),
            sources: Vec::new(),
            transport: TransportConfig::default(),
        }
    }

    /// Build from loaded settings; fails when the root is unset.
    pub fn from_settings(
        settings: &Settings,
        backend: Rc<dyn SnapshotBackend>,
        runner: Box<dyn CommandRunner>,
        mode: Mode,
    ) -> Result<Self, SnaprotError> {
        let root = settings.require_root()?;
        Ok(
            Self::new(root, RetentionPolicy::from(&settings.keep), backend, runner, mode)
                .with_sources(settings.sources.clone())
                .with_transport(settings.transport.clone()),
        )
    }

    #[must_use]
    pub fn with_sources(mut self, sources: Vec<SourceEntry>) -> Self {
        self.sources = sources;
        self
    }

    #[must_use]
    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    #[must_use]
    pub const fn store(&self) -> &SlotStore {
        &self.store
    }

    #[must_use]
    pub const fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    #[must_use]
    pub const fn ops(&self) -> &Operator {
        &self.ops
    }
}
