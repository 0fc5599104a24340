use std::io;

use countries::db::error::DbResultExt;
use countries::DbError;

// Pool and transport failures are connection errors
#[test]
fn test_connection_failures() {
    assert!(DbError::from_sqlx("acquire", sqlx::Error::PoolTimedOut).is_connection());
    assert!(DbError::from_sqlx("acquire", sqlx::Error::PoolClosed).is_connection());

    let refused = sqlx::Error::Io(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
    assert!(DbError::from_sqlx("connect", refused).is_connection());
}

// Everything raised while running a statement is a store error
#[test]
fn test_store_failures() {
    let err = DbError::from_sqlx("fetch", sqlx::Error::RowNotFound);
    assert!(err.is_store());
    assert!(!err.is_connection());

    let err = DbError::from_sqlx("read", sqlx::Error::ColumnNotFound("population".to_string()));
    assert!(err.is_store());
}

// Context is kept in the message and the driver error stays reachable
#[test]
fn test_context_and_source() {
    let result: Result<(), sqlx::Error> = Err(sqlx::Error::RowNotFound);
    let err = result.db_context("Failed to fetch country 9").unwrap_err();

    assert!(err.to_string().starts_with("Failed to fetch country 9: "));
    let source = std::error::Error::source(&err).expect("driver error is the source");
    assert_eq!(source.to_string(), sqlx::Error::RowNotFound.to_string());
}

// Lazy context is only built on failure
#[test]
fn test_with_db_context() {
    let ok: Result<i64, sqlx::Error> = Ok(3);
    let value = ok.with_db_context(|| panic!("context built for a success")).unwrap();
    assert_eq!(value, 3);

    let failed: Result<i64, sqlx::Error> = Err(sqlx::Error::PoolClosed);
    let err = failed.with_db_context(|| format!("chunk {} of {}", 2, 5)).unwrap_err();
    assert!(err.is_connection());
    assert!(err.to_string().starts_with("chunk 2 of 5"));
}

// Argument and parameter errors are neither connection nor store failures
#[test]
fn test_local_errors() {
    let err = DbError::InvalidArgument("batch size must be at least 1".to_string());
    assert!(!err.is_connection());
    assert!(!err.is_store());
    assert_eq!(err.to_string(), "invalid argument: batch size must be at least 1");

    let err = DbError::MissingParameter("id".to_string());
    assert_eq!(err.to_string(), "no value supplied for named parameter 'id'");
}
