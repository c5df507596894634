use std::time::Duration;

const URL_SCHEME: &str = "memory://";

/// Connection settings for the in-memory backend
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    /// Database name, used in logs and URLs
    pub database: String,

    /// How long `begin` waits for a free connection
    pub connect_timeout: Duration,

    /// Maximum number of connections leased at once
    pub max_connections: usize,

    /// Connections created eagerly when the pool is built
    pub min_connections: usize,

    /// Idle connections older than this are discarded instead of reused
    pub idle_timeout: Option<Duration>,
}

impl ConnectionConfig {
    pub fn new(database: &str) -> Self {
        Self {
            database: database.to_string(),
            connect_timeout: Duration::from_secs(30),
            max_connections: 10,
            min_connections: 1,
            idle_timeout: Some(Duration::from_secs(600)),
        }
    }

    pub fn database(mut self, database: &str) -> Self {
        self.database = database.to_string();
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: usize) -> Self {
        self.min_connections = min;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Parse from connection string
    ///
    /// Format: `memory://<database>[?max_connections=N&min_connections=N&connect_timeout_ms=N&idle_timeout_ms=N]`
    ///
    /// # Examples
    ///
    /// ```
    /// use uow_template::ConnectionConfig;
    ///
    /// let config = ConnectionConfig::from_url("memory://orders?max_connections=4").unwrap();
    /// assert_eq!(config.database, "orders");
    /// assert_eq!(config.max_connections, 4);
    /// ```
    pub fn from_url(url: &str) -> Result<Self, String> {
        let rest = url
            .strip_prefix(URL_SCHEME)
            .ok_or_else(|| format!("URL must start with '{}'", URL_SCHEME))?;

        let (database, query) = match rest.split_once('?') {
            Some((db, query)) => (db, Some(query)),
            None => (rest, None),
        };
        if database.is_empty() || database.contains('/') {
            return Err("Invalid database name".to_string());
        }

        let mut config = Self::new(database);
        for pair in query.into_iter().flat_map(|q| q.split('&')) {
            let (name, value) = pair
                .split_once('=')
                .ok_or_else(|| format!("Invalid parameter '{}'", pair))?;
            let number: u64 = value
                .parse()
                .map_err(|_| format!("Invalid value for '{}': {}", name, value))?;
            let count = || {
                usize::try_from(number)
                    .map_err(|_| format!("Value for '{}' out of range: {}", name, value))
            };
            config = match name {
                "max_connections" => config.max_connections(count()?),
                "min_connections" => config.min_connections(count()?),
                "connect_timeout_ms" => config.connect_timeout(Duration::from_millis(number)),
                "idle_timeout_ms" => config.idle_timeout(Duration::from_millis(number)),
                other => return Err(format!("Unknown parameter '{}'", other)),
            };
        }

        Ok(config)
    }

    pub fn to_url(&self) -> String {
        let mut url = format!(
            "{}{}?max_connections={}&min_connections={}&connect_timeout_ms={}",
            URL_SCHEME,
            self.database,
            self.max_connections,
            self.min_connections,
            self.connect_timeout.as_millis()
        );
        if let Some(idle) = self.idle_timeout {
            url.push_str(&format!("&idle_timeout_ms={}", idle.as_millis()));
        }
        url
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.database.is_empty() {
            return Err("Database name cannot be empty".to_string());
        }

        if self.max_connections == 0 {
            return Err("max_connections must be > 0".to_string());
        }

        if self.min_connections > self.max_connections {
            return Err("min_connections cannot exceed max_connections".to_string());
        }

        Ok(())
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new("uow")
    }
}
