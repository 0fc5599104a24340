use serde::{ Deserialize, Serialize };
use sqlx::postgres::PgRow;
use sqlx::Row;

/// A row of the `countries` table.
///
/// `id` stays `None` until the store assigns one on insert; records mapped
/// from query results always carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    pub id: Option<i64>,
    pub name: String,
    pub population: i32,
}

impl Country {
    /// Transient record, ready to be inserted
    pub fn new(name: impl Into<String>, population: i32) -> Self {
        Self {
            id: None,
            name: name.into(),
            population,
        }
    }

    /// Record for a row that already exists
    pub fn with_id(id: i64, name: impl Into<String>, population: i32) -> Self {
        Self {
            id: Some(id),
            name: name.into(),
            population,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Map a `SELECT id, name, population` row
    pub fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: Some(row.try_get("id")?),
            name: row.try_get("name")?,
            population: row.try_get("population")?,
        })
    }
}

/// Inclusive population bounds for a range lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountryQuery {
    min_population: i32,
    max_population: i32,
}

impl CountryQuery {
    pub fn new(min_population: i32, max_population: i32) -> Self {
        Self {
            min_population,
            max_population,
        }
    }

    pub fn min_population(&self) -> i32 {
        self.min_population
    }

    pub fn max_population(&self) -> i32 {
        self.max_population
    }

    /// Whether a population falls inside the bounds
    pub fn contains(&self, population: i32) -> bool {
        self.min_population <= population && population <= self.max_population
    }
}
