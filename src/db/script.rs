use sqlx::PgPool;

use crate::db::error::{ DbResult, DbResultExt };

/// Table, stored procedure and stored function
pub const SCHEMA_SQL: &str = include_str!("../../database/schema/countries/schema.sql");

/// Drops everything `SCHEMA_SQL` creates
pub const DELETE_SQL: &str = include_str!("../../database/schema/countries/delete.sql");

/// Empties the table, restarts ids at 1 and inserts the three reference rows
pub const SEED_SQL: &str = include_str!("../../database/schema/countries/seed.sql");

/// Split a script on `;`, keeping dollar-quoted routine bodies intact
pub fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current_stmt = String::new();
    let mut in_dollar_quoted = false;
    let chars: Vec<char> = sql.chars().collect();

    for i in 0..chars.len() {
        current_stmt.push(chars[i]);

        // Check for dollar-quoted string start/end
        if i >= 1 && chars[i - 1] == '$' && chars[i] == '$' {
            in_dollar_quoted = !in_dollar_quoted;
        }

        // Split on semicolon only if not in a dollar-quoted block
        if chars[i] == ';' && !in_dollar_quoted {
            let stmt = current_stmt.trim();
            if stmt != ";" {
                statements.push(stmt.to_string());
            }
            current_stmt.clear();
        }
    }

    // Add any remaining statement
    if !current_stmt.trim().is_empty() {
        statements.push(current_stmt.trim().to_string());
    }

    statements
}

/// Run every statement of a script in order, stopping at the first failure
pub async fn execute_script(pool: &PgPool, sql: &str) -> DbResult<usize> {
    let statements = split_statements(sql);

    for stmt in &statements {
        log::debug!("Executing: {}", stmt);
        sqlx
            ::query(stmt)
            .execute(pool).await
            .with_db_context(|| format!("Failed to execute SQL: {}", stmt))?;
    }

    Ok(statements.len())
}

/// Drop, recreate and seed the schema
pub async fn reset(pool: &PgPool) -> DbResult<()> {
    execute_script(pool, DELETE_SQL).await?;
    execute_script(pool, SCHEMA_SQL).await?;
    execute_script(pool, SEED_SQL).await?;
    Ok(())
}
