use futures::TryStreamExt;
use sqlx::{ PgPool, Row };

use crate::db::common::Repository;
use crate::db::error::{ DbResult, DbResultExt };
use crate::db::named::NamedStatement;
use crate::db::pool::acquire_from;
use crate::models::{ Country, CountryQuery };

const SELECT_ALL: &str = "SELECT id, name, population FROM countries ORDER BY name";

const SELECT_BY_NAME: &str =
    "SELECT id, name, population FROM countries WHERE name LIKE $1 ORDER BY name";

const SELECT_BY_ID: &str = "SELECT id, name, population FROM countries WHERE id = $1";

const SELECT_BY_POPULATION: &str =
    "SELECT id, name, population FROM countries WHERE population BETWEEN $1 AND $2 ORDER BY name";

const SELECT_BY_POPULATION_NAMED: &str =
    "SELECT id, name, population FROM countries WHERE population BETWEEN :min_population AND :max_population ORDER BY name";

const INSERT: &str = "INSERT INTO countries (name, population) VALUES ($1, $2)";

const INSERT_RETURNING_ID: &str =
    "INSERT INTO countries (name, population) VALUES ($1, $2) RETURNING id";

const INSERT_NAMED: &str =
    "INSERT INTO countries (name, population) VALUES (:name, :population) RETURNING id";

const UPDATE_POPULATION: &str = "UPDATE countries SET population = $2 WHERE id = $1";

/// Stored procedure with an INOUT `total` column
pub const COUNT_PROCEDURE: &str = "proc_count_countries_by_name";

/// Stored function returning the same count as a scalar
pub const COUNT_FUNCTION: &str = "func_count_countries_by_name";

/// Repository for `countries` table operations
#[derive(Clone)]
pub struct CountryRepository {
    pool: PgPool,
}

impl CountryRepository {
    /// Create a new repository instance
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Every country, ordered by name
    pub async fn find_all(&self) -> DbResult<Vec<Country>> {
        log::debug!("{}", SELECT_ALL);
        let rows = sqlx
            ::query(SELECT_ALL)
            .fetch_all(&self.pool).await
            .db_context("Failed to fetch countries")?;

        rows.iter()
            .map(Country::from_row)
            .collect::<Result<Vec<_>, _>>()
            .db_context("Failed to map country rows")
    }

    /// Same result as `find_all`, reading row by row from one explicitly held connection
    pub async fn find_all_raw(&self) -> DbResult<Vec<Country>> {
        let mut conn = acquire_from(&self.pool).await?;
        let mut countries = Vec::new();

        {
            let mut rows = sqlx::query(SELECT_ALL).fetch(&mut *conn);
            while let Some(row) = rows.try_next().await.db_context("Failed to read country row")? {
                let country = Country {
                    id: Some(row.try_get("id").db_context("Failed to read column id")?),
                    name: row.try_get("name").db_context("Failed to read column name")?,
                    population: row
                        .try_get("population")
                        .db_context("Failed to read column population")?,
                };
                countries.push(country);
            }
        }

        drop(conn);
        Ok(countries)
    }

    /// Countries whose name matches a LIKE pattern
    pub async fn find_by_name(&self, pattern: &str) -> DbResult<Vec<Country>> {
        log::debug!("{} [{}]", SELECT_BY_NAME, pattern);
        let rows = sqlx
            ::query(SELECT_BY_NAME)
            .bind(pattern)
            .fetch_all(&self.pool).await
            .with_db_context(|| format!("Failed to fetch countries matching '{}'", pattern))?;

        rows.iter()
            .map(Country::from_row)
            .collect::<Result<Vec<_>, _>>()
            .db_context("Failed to map country rows")
    }

    /// A single country, or `None` when no row has that id
    pub async fn find_by_id(&self, id: i64) -> DbResult<Option<Country>> {
        log::debug!("{} [{}]", SELECT_BY_ID, id);
        let row = sqlx
            ::query(SELECT_BY_ID)
            .bind(id)
            .fetch_optional(&self.pool).await
            .with_db_context(|| format!("Failed to fetch country {}", id))?;

        match row {
            Some(row) => Ok(Some(Country::from_row(&row).db_context("Failed to map country row")?)),
            None => Ok(None),
        }
    }

    /// Countries with `min <= population <= max`, bound positionally
    pub async fn find_by_population(&self, min: i32, max: i32) -> DbResult<Vec<Country>> {
        log::debug!("{} [{}, {}]", SELECT_BY_POPULATION, min, max);
        let rows = sqlx
            ::query(SELECT_BY_POPULATION)
            .bind(min)
            .bind(max)
            .fetch_all(&self.pool).await
            .db_context("Failed to fetch countries by population")?;

        rows.iter()
            .map(Country::from_row)
            .collect::<Result<Vec<_>, _>>()
            .db_context("Failed to map country rows")
    }

    /// Same range lookup, bound by name from a query object
    pub async fn find_by_population_query(&self, query: &CountryQuery) -> DbResult<Vec<Country>> {
        let statement = NamedStatement::parse(SELECT_BY_POPULATION_NAMED);
        log::debug!("{} [{:?}]", statement.sql(), query);

        let rows = statement
            .bind(query)?
            .fetch_all(&self.pool).await
            .db_context("Failed to fetch countries by population")?;

        rows.iter()
            .map(Country::from_row)
            .collect::<Result<Vec<_>, _>>()
            .db_context("Failed to map country rows")
    }

    /// Total number of rows
    pub async fn count(&self) -> DbResult<i64> {
        sqlx
            ::query_scalar::<_, i64>("SELECT COUNT(*) FROM countries")
            .fetch_one(&self.pool).await
            .db_context("Failed to count countries")
    }

    /// Delete every row, returning how many were removed
    pub async fn delete_all(&self) -> DbResult<u64> {
        let result = sqlx
            ::query("DELETE FROM countries")
            .execute(&self.pool).await
            .db_context("Failed to delete countries")?;

        log::debug!("Deleted {} countries", result.rows_affected());
        Ok(result.rows_affected())
    }

    /// Plain insert; the generated id is not read back
    pub async fn insert_with_query(&self, name: &str, population: i32) -> DbResult<()> {
        sqlx
            ::query(INSERT)
            .bind(name)
            .bind(population)
            .execute(&self.pool).await
            .with_db_context(|| format!("Failed to insert country '{}'", name))?;

        Ok(())
    }

    /// Insert and return the id the store assigned, from the same statement
    pub async fn insert_with_generated_key(&self, name: &str, population: i32) -> DbResult<i64> {
        sqlx
            ::query_scalar::<_, i64>(INSERT_RETURNING_ID)
            .bind(name)
            .bind(population)
            .fetch_one(&self.pool).await
            .with_db_context(|| format!("Failed to insert country '{}'", name))
    }

    /// Insert a transient record, binding columns by name from the record
    pub async fn insert(&self, country: &Country) -> DbResult<i64> {
        let statement = NamedStatement::parse(INSERT_NAMED);
        let row = statement
            .bind(country)?
            .fetch_one(&self.pool).await
            .with_db_context(|| format!("Failed to insert country '{}'", country.name))?;

        row.try_get("id").db_context("Failed to read generated id")
    }

    /// Set the population of one country; 0 when the id does not exist
    pub async fn update_population(&self, id: i64, population: i32) -> DbResult<u64> {
        let result = sqlx
            ::query(UPDATE_POPULATION)
            .bind(id)
            .bind(population)
            .execute(&self.pool).await
            .with_db_context(|| format!("Failed to update population of country {}", id))?;

        Ok(result.rows_affected())
    }

    /// Invoke the counting stored procedure and read its `total` output
    pub async fn call_procedure(&self, name: &str) -> DbResult<i32> {
        let sql = format!("CALL {}($1, NULL)", COUNT_PROCEDURE);
        let row = sqlx
            ::query(&sql)
            .bind(name)
            .fetch_one(&self.pool).await
            .with_db_context(|| format!("Failed to call procedure {}", COUNT_PROCEDURE))?;

        row.try_get("total").db_context("Failed to read procedure output 'total'")
    }

    /// Invoke the counting stored function
    pub async fn call_function(&self, name: &str) -> DbResult<i32> {
        let sql = format!("SELECT {}($1)", COUNT_FUNCTION);
        sqlx
            ::query_scalar::<_, i32>(&sql)
            .bind(name)
            .fetch_one(&self.pool).await
            .with_db_context(|| format!("Failed to call function {}", COUNT_FUNCTION))
    }
}

impl Repository for CountryRepository {
    fn pool(&self) -> &PgPool {
        &self.pool
    }
}
