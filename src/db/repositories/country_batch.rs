use async_trait::async_trait;
use sqlx::PgPool;

use crate::db::batch::{ chunk_count, chunks, last_by_key };
use crate::db::common::Repository;
use crate::db::error::{ DbError, DbResult, DbResultExt };
use crate::db::named::NamedStatement;
use crate::db::repositories::CountryRepository;
use crate::models::Country;
use crate::utils::logging::log_stats;

// Each column travels as one array, so a chunk of any size binds a fixed
// number of parameters
const INSERT_UNNEST: &str =
    "INSERT INTO countries (name, population) SELECT * FROM UNNEST($1::text[], $2::int4[])";

const UPDATE_UNNEST: &str =
    "UPDATE countries AS c SET name = v.name, population = v.population \
     FROM UNNEST($1::int8[], $2::text[], $3::int4[]) AS v(id, name, population) \
     WHERE c.id = v.id";

const UPDATE_NAMED: &str =
    "UPDATE countries SET name = :name, population = :population WHERE id = :id";

/// Extension trait to add batch operations to CountryRepository.
///
/// Each chunk travels as a single array-bound statement, so a chunk either
/// applies completely or not at all. Chunks that were already sent stay
/// applied when a later chunk fails; the error names the failing chunk.
/// Records repeating an id are applied in input order: the last one wins.
#[async_trait]
pub trait CountryBatchRepository {
    /// Insert in chunks of `batch_size`, one round trip per chunk
    async fn insert_batch(&self, countries: &[Country], batch_size: usize) -> DbResult<()>;

    /// Insert everything in a single round trip
    async fn insert_batch_all(&self, countries: &[Country]) -> DbResult<()>;

    /// Update name and population by id, in chunks of `batch_size`
    async fn update_batch(&self, countries: &[Country], batch_size: usize) -> DbResult<()>;

    /// Update by id with a named statement bound from each record, in one transaction
    async fn update_batch_named(&self, countries: &[Country]) -> DbResult<()>;
}

#[async_trait]
impl CountryBatchRepository for CountryRepository {
    async fn insert_batch(&self, countries: &[Country], batch_size: usize) -> DbResult<()> {
        let total = chunk_count(countries.len(), batch_size);

        for (idx, chunk) in chunks(countries, batch_size)?.enumerate() {
            insert_chunk(Repository::pool(self), chunk).await.with_db_context(||
                format!("Failed to insert batch chunk {} of {}", idx + 1, total)
            )?;
        }

        if total > 0 {
            log_stats(
                "CountryBatch",
                "inserted",
                &format!("{} countries in {} round trips", countries.len(), total)
            );
        }
        Ok(())
    }

    async fn insert_batch_all(&self, countries: &[Country]) -> DbResult<()> {
        self.insert_batch(countries, countries.len().max(1)).await
    }

    async fn update_batch(&self, countries: &[Country], batch_size: usize) -> DbResult<()> {
        require_ids(countries)?;
        let total = chunk_count(countries.len(), batch_size);

        for (idx, chunk) in chunks(countries, batch_size)?.enumerate() {
            update_chunk(Repository::pool(self), chunk).await.with_db_context(||
                format!("Failed to update batch chunk {} of {}", idx + 1, total)
            )?;
        }

        if total > 0 {
            log_stats(
                "CountryBatch",
                "updated",
                &format!("{} countries in {} round trips", countries.len(), total)
            );
        }
        Ok(())
    }

    async fn update_batch_named(&self, countries: &[Country]) -> DbResult<()> {
        // Early return if there is nothing to update
        if countries.is_empty() {
            return Ok(());
        }
        require_ids(countries)?;

        let statement = NamedStatement::parse(UPDATE_NAMED);
        let mut tx = Repository::pool(self).begin().await.db_context("Failed to begin transaction")?;

        for country in countries {
            statement
                .bind(country)?
                .execute(&mut *tx).await
                .with_db_context(|| format!("Failed to update country '{}'", country.name))?;
        }

        tx.commit().await.db_context("Failed to commit batch update")?;
        log_stats("CountryBatch", "updated", &format!("{} countries by name", countries.len()));
        Ok(())
    }
}

fn require_ids(countries: &[Country]) -> DbResult<()> {
    match countries.iter().position(|c| c.id.is_none()) {
        Some(idx) =>
            Err(
                DbError::InvalidArgument(
                    format!("country '{}' at position {} has no id", countries[idx].name, idx)
                )
            ),
        None => Ok(()),
    }
}

async fn insert_chunk(pool: &PgPool, chunk: &[Country]) -> Result<u64, sqlx::Error> {
    let names: Vec<String> = chunk
        .iter()
        .map(|c| c.name.clone())
        .collect();
    let populations: Vec<i32> = chunk
        .iter()
        .map(|c| c.population)
        .collect();

    let result = sqlx
        ::query(INSERT_UNNEST)
        .bind(names)
        .bind(populations)
        .execute(pool).await?;
    Ok(result.rows_affected())
}

async fn update_chunk(pool: &PgPool, chunk: &[Country]) -> Result<u64, sqlx::Error> {
    // Last write wins for an id repeated inside the chunk
    let rows = last_by_key(chunk, |c| c.id);

    let mut ids: Vec<i64> = Vec::with_capacity(rows.len());
    let mut names: Vec<String> = Vec::with_capacity(rows.len());
    let mut populations: Vec<i32> = Vec::with_capacity(rows.len());
    for country in rows {
        if let Some(id) = country.id {
            ids.push(id);
            names.push(country.name.clone());
            populations.push(country.population);
        }
    }

    let result = sqlx
        ::query(UPDATE_UNNEST)
        .bind(ids)
        .bind(names)
        .bind(populations)
        .execute(pool).await?;
    Ok(result.rows_affected())
}
