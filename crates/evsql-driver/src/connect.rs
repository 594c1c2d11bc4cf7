//! Connection parameters for a logical database target.

use std::fmt;

use crate::error::DriverError;

/// Driver-specific client flags passed through at connect time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ClientFlags(pub u64);

impl ClientFlags {
    /// No flags.
    pub const NONE: Self = Self(0);

    /// Raw flag bits.
    #[must_use]
    pub fn bits(self) -> u64 {
        self.0
    }
}

/// Everything a driver needs to open a connection.
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ConnectParams {
    /// Server hostname or IP address. Empty when connecting over a socket.
    pub host: String,

    /// Login user.
    pub user: String,

    /// Login password.
    pub password: String,

    /// Database (schema) selected after login.
    pub database: String,

    /// TCP port, 0 for the driver default.
    pub port: u16,

    /// Unix-domain socket path, used instead of `host`/`port` when set.
    pub unix_socket: Option<String>,

    /// Driver client flags.
    pub client_flags: ClientFlags,
}

impl Default for ConnectParams {
    fn default() -> Self {
        Self {
            host: String::new(),
            user: String::new(),
            password: String::new(),
            database: String::new(),
            port: 0,
            unix_socket: None,
            client_flags: ClientFlags::NONE,
        }
    }
}

impl ConnectParams {
    /// Create empty parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `key=value;` connection string.
    ///
    /// ```text
    /// host=db.internal;user=app;password=secret;database=orders;port=3306
    /// socket=/run/mysqld/mysqld.sock;user=app;database=orders;flags=0x20
    /// ```
    pub fn from_connection_string(conn_str: &str) -> Result<Self, DriverError> {
        let mut params = Self::default();

        for part in conn_str.split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| DriverError::Connect(format!("invalid key-value: {part}")))?;

            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "host" | "server" | "hostaddr" => {
                    if let Some((host, port)) = value.rsplit_once(':') {
                        params.host = host.to_string();
                        params.port = parse_port(port)?;
                    } else {
                        params.host = value.to_string();
                    }
                }
                "port" => params.port = parse_port(value)?,
                "user" | "user id" | "uid" => params.user = value.to_string(),
                "password" | "pwd" => params.password = value.to_string(),
                "database" | "dbname" | "db" => params.database = value.to_string(),
                "socket" | "unix_socket" => params.unix_socket = Some(value.to_string()),
                "flags" | "client_flags" => params.client_flags = parse_flags(value)?,
                _ => {
                    tracing::debug!(key = key, "ignoring unknown connection string option");
                }
            }
        }

        Ok(params)
    }

    /// Whether the parameters name somewhere to connect to.
    #[must_use]
    pub fn has_endpoint(&self) -> bool {
        !self.host.is_empty() || self.unix_socket.is_some()
    }

    /// Whether host, user, password and database all equal the given values.
    #[must_use]
    pub fn matches_credentials(&self, host: &str, user: &str, password: &str, database: &str) -> bool {
        self.host == host && self.user == user && self.password == password && self.database == database
    }

    /// Set the server host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the login user.
    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Set the login password.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Set the database name.
    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Set the TCP port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Connect over a Unix-domain socket.
    #[must_use]
    pub fn unix_socket(mut self, path: impl Into<String>) -> Self {
        self.unix_socket = Some(path.into());
        self
    }

    /// Set the driver client flags.
    #[must_use]
    pub fn client_flags(mut self, flags: ClientFlags) -> Self {
        self.client_flags = flags;
        self
    }
}

// Password stays out of logs.
impl fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectParams")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("port", &self.port)
            .field("unix_socket", &self.unix_socket)
            .field("client_flags", &self.client_flags)
            .finish()
    }
}

fn parse_port(value: &str) -> Result<u16, DriverError> {
    value
        .parse()
        .map_err(|_| DriverError::Connect(format!("invalid port: {value}")))
}

fn parse_flags(value: &str) -> Result<ClientFlags, DriverError> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed
        .map(ClientFlags)
        .map_err(|_| DriverError::Connect(format!("invalid client flags: {value}")))
}
