//! Registry of logical database targets.

use std::fmt;
use std::sync::Arc;

use evsql_driver::ConnectParams;
use hashbrown::HashMap;

use crate::error::PoolError;

/// A named database endpoint. Immutable once registered.
#[derive(Debug, PartialEq, Eq)]
pub struct LogicalTarget {
    name: String,
    params: ConnectParams,
}

impl LogicalTarget {
    /// Target name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Connection parameters.
    #[must_use]
    pub fn params(&self) -> &ConnectParams {
        &self.params
    }
}

/// How a query names the target it runs against.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum TargetSelector<'a> {
    /// By registered name.
    Name(&'a str),
    /// By credentials; every field must match a single registered target.
    Credentials {
        /// Server host.
        host: &'a str,
        /// Login user.
        user: &'a str,
        /// Login password.
        password: &'a str,
        /// Database name.
        database: &'a str,
    },
}

impl<'a> From<&'a str> for TargetSelector<'a> {
    fn from(name: &'a str) -> Self {
        Self::Name(name)
    }
}

impl fmt::Debug for TargetSelector<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.debug_tuple("Name").field(name).finish(),
            Self::Credentials {
                host, user, database, ..
            } => f
                .debug_struct("Credentials")
                .field("host", host)
                .field("user", user)
                .field("database", database)
                .finish_non_exhaustive(),
        }
    }
}

impl fmt::Display for TargetSelector<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Credentials {
                host, user, database, ..
            } => write!(f, "{user}@{host}/{database}"),
        }
    }
}

/// Process-lifetime set of registered targets.
#[derive(Debug, Default)]
pub struct Registry {
    targets: Vec<Arc<LogicalTarget>>,
    by_name: HashMap<String, usize>,
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `params` under `name`.
    ///
    /// Fails with [`PoolError::DuplicateTarget`] if the name is taken; the
    /// existing registration is left untouched.
    pub fn register(&mut self, name: impl Into<String>, params: ConnectParams) -> Result<Arc<LogicalTarget>, PoolError> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(PoolError::DuplicateTarget { name });
        }
        if !params.has_endpoint() {
            return Err(PoolError::Config(format!(
                "target '{name}' has neither a host nor a unix socket"
            )));
        }

        tracing::debug!(
            target_name = %name,
            host = %params.host,
            database = %params.database,
            "registered database target"
        );

        let target = Arc::new(LogicalTarget {
            name: name.clone(),
            params,
        });
        self.by_name.insert(name, self.targets.len());
        self.targets.push(Arc::clone(&target));
        Ok(target)
    }

    /// Look a target up by name.
    pub fn lookup(&self, name: &str) -> Result<&Arc<LogicalTarget>, PoolError> {
        self.by_name
            .get(name)
            .map(|&idx| &self.targets[idx])
            .ok_or_else(|| PoolError::TargetNotFound { name: name.into() })
    }

    /// Look a target up by credentials.
    ///
    /// Host, user, password and database must all match. When several
    /// targets share credentials the earliest registration wins.
    pub fn lookup_credentials(
        &self,
        host: &str,
        user: &str,
        password: &str,
        database: &str,
    ) -> Result<&Arc<LogicalTarget>, PoolError> {
        self.targets
            .iter()
            .find(|t| t.params.matches_credentials(host, user, password, database))
            .ok_or_else(|| PoolError::TargetNotFound {
                name: format!("{user}@{host}/{database}"),
            })
    }

    /// Resolve a [`TargetSelector`].
    pub fn resolve(&self, selector: TargetSelector<'_>) -> Result<&Arc<LogicalTarget>, PoolError> {
        match selector {
            TargetSelector::Name(name) => self.lookup(name),
            TargetSelector::Credentials {
                host,
                user,
                password,
                database,
            } => self.lookup_credentials(host, user, password, database),
        }
    }

    /// Number of registered targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether no target is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Iterate over targets in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<LogicalTarget>> {
        self.targets.iter()
    }
}
