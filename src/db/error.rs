use thiserror::Error;

/// Errors surfaced by the connection provider and the repositories.
///
/// Store-originated failures are never swallowed: they carry the underlying
/// `sqlx::Error` plus a short description of what was being attempted.
/// A single-row lookup that finds nothing is not an error (`Ok(None)`).
#[derive(Debug, Error)]
pub enum DbError {
    /// Pool exhausted, pool closed, or the store could not be reached
    #[error("{context}: {source}")]
    Connection {
        context: String,
        #[source]
        source: sqlx::Error,
    },

    /// Statement execution failed (constraint violation, bad SQL, type mismatch...)
    #[error("{context}: {source}")]
    Store {
        context: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("invalid database configuration: {0}")]
    Config(String),

    #[error("no value supplied for named parameter '{0}'")]
    MissingParameter(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl DbError {
    /// Classify a driver error as a connection or a statement failure
    pub fn from_sqlx(context: impl Into<String>, source: sqlx::Error) -> Self {
        let context = context.into();
        if is_connection_failure(&source) {
            Self::Connection { context, source }
        } else {
            Self::Store { context, source }
        }
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    pub fn is_store(&self) -> bool {
        matches!(self, Self::Store { .. })
    }
}

fn is_connection_failure(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::PoolTimedOut |
            sqlx::Error::PoolClosed |
            sqlx::Error::Io(_) |
            sqlx::Error::Tls(_) |
            sqlx::Error::WorkerCrashed
    )
}

pub type DbResult<T> = std::result::Result<T, DbError>;

/// `anyhow::Context`-style helpers for driver results
pub trait DbResultExt<T> {
    fn db_context(self, context: &str) -> DbResult<T>;

    fn with_db_context<F>(self, f: F) -> DbResult<T> where F: FnOnce() -> String;
}

impl<T> DbResultExt<T> for std::result::Result<T, sqlx::Error> {
    fn db_context(self, context: &str) -> DbResult<T> {
        self.map_err(|err| DbError::from_sqlx(context, err))
    }

    fn with_db_context<F>(self, f: F) -> DbResult<T> where F: FnOnce() -> String {
        self.map_err(|err| DbError::from_sqlx(f(), err))
    }
}
