use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::SqliteGatewayError;

use super::connection::SqliteConnection;

/// Callback invoked with the text of every raw script before it runs,
/// including the `BEGIN TRANSACTION` / `COMMIT` emitted for async units.
pub type ScriptObserver = Arc<dyn Fn(&str) + Send + Sync>;

/// Where the database comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum DbSource {
    /// File-backed database; created if missing.
    Path(PathBuf),
    /// Private in-memory database.
    Memory,
    /// In-memory database restored from a serialized byte image.
    Image(Vec<u8>),
}

impl fmt::Debug for DbSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            DbSource::Memory => f.write_str("Memory"),
            DbSource::Image(bytes) => write!(f, "Image({} bytes)", bytes.len()),
        }
    }
}

impl From<PathBuf> for DbSource {
    fn from(path: PathBuf) -> Self {
        DbSource::Path(path)
    }
}

impl From<&std::path::Path> for DbSource {
    fn from(path: &std::path::Path) -> Self {
        DbSource::Path(path.to_path_buf())
    }
}

impl From<&str> for DbSource {
    fn from(path: &str) -> Self {
        if path == ":memory:" {
            DbSource::Memory
        } else {
            DbSource::Path(PathBuf::from(path))
        }
    }
}

impl From<Vec<u8>> for DbSource {
    fn from(image: Vec<u8>) -> Self {
        DbSource::Image(image)
    }
}

/// Options for opening a [`SqliteConnection`].
#[derive(Clone)]
pub struct SqliteOptions {
    pub source: DbSource,
    /// Switch file-backed databases to `journal_mode = WAL`.
    pub wal: bool,
    pub busy_timeout: Option<Duration>,
    /// Register the `regexp(pattern, text)` scalar function.
    pub register_regexp: bool,
    pub script_observer: Option<ScriptObserver>,
}

impl SqliteOptions {
    #[must_use]
    pub fn new(source: impl Into<DbSource>) -> Self {
        Self {
            source: source.into(),
            wal: false,
            busy_timeout: None,
            register_regexp: true,
            script_observer: None,
        }
    }

    #[must_use]
    pub fn with_wal(mut self, wal: bool) -> Self {
        self.wal = wal;
        self
    }

    #[must_use]
    pub fn with_script_observer(mut self, observer: ScriptObserver) -> Self {
        self.script_observer = Some(observer);
        self
    }

    /// Open a connection with these options.
    ///
    /// # Errors
    /// Returns `SqliteGatewayError::Open` if the database cannot be opened.
    pub async fn open(self) -> Result<SqliteConnection, SqliteGatewayError> {
        SqliteConnection::open_with(self).await
    }

    pub(crate) fn validate(&self) -> Result<(), SqliteGatewayError> {
        if let DbSource::Path(path) = &self.source
            && path.as_os_str().is_empty()
        {
            return Err(SqliteGatewayError::ConfigError(
                "database path is empty".into(),
            ));
        }
        if self.busy_timeout.is_some_and(|t| t.is_zero()) {
            return Err(SqliteGatewayError::ConfigError(
                "busy timeout must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for SqliteOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteOptions")
            .field("source", &self.source)
            .field("wal", &self.wal)
            .field("busy_timeout", &self.busy_timeout)
            .field("register_regexp", &self.register_regexp)
            .field("script_observer", &self.script_observer.is_some())
            .finish()
    }
}

/// Fluent builder for `SQLite` options.
#[derive(Debug, Clone)]
pub struct SqliteOptionsBuilder {
    opts: SqliteOptions,
}

impl SqliteOptionsBuilder {
    #[must_use]
    pub fn new(source: impl Into<DbSource>) -> Self {
        Self {
            opts: SqliteOptions::new(source),
        }
    }

    #[must_use]
    pub fn wal(mut self, wal: bool) -> Self {
        self.opts.wal = wal;
        self
    }

    #[must_use]
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.opts.busy_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn register_regexp(mut self, register: bool) -> Self {
        self.opts.register_regexp = register;
        self
    }

    #[must_use]
    pub fn script_observer(mut self, observer: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.opts.script_observer = Some(Arc::new(observer));
        self
    }

    #[must_use]
    pub fn finish(self) -> SqliteOptions {
        self.opts
    }

    /// Open a connection with the accumulated options.
    ///
    /// # Errors
    /// Returns `SqliteGatewayError` if the options are invalid or the database cannot be opened.
    pub async fn open(self) -> Result<SqliteConnection, SqliteGatewayError> {
        self.finish().open().await
    }
}
