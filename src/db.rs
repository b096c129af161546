use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{IntegrityViolation, StoreError};
use crate::models::{Company, NewVacancy, Vacancy};

pub type DbPool = r2d2::Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS companies (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        hh_id INTEGER NOT NULL UNIQUE,
        name TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS vacancies (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        company_id INTEGER NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
        title TEXT NOT NULL,
        salary_min INTEGER,
        salary_max INTEGER,
        salary_currency TEXT,
        url TEXT NOT NULL UNIQUE
    );

    CREATE INDEX IF NOT EXISTS idx_vacancies_company ON vacancies(company_id);
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    AlreadyPresent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VacancyUpsert {
    Inserted,
    AlreadyPresent,
    Skipped(IntegrityViolation),
}

pub struct Store {
    pool: DbPool,
    location: String,
}

impl Store {
    pub fn open(path: &Path, pool_size: u32) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let manager = SqliteConnectionManager::file(path).with_init(init_connection);
        let pool = r2d2::Pool::builder()
            .max_size(pool_size.max(1))
            .build(manager)?;
        Ok(Self {
            pool,
            location: path.display().to_string(),
        })
    }

    /// A single-connection in-memory store. Each SQLite memory connection is
    /// its own database, so the pool never holds more than one and never
    /// recycles it.
    pub fn in_memory() -> Result<Self, StoreError> {
        let manager = SqliteConnectionManager::memory().with_init(init_connection);
        let pool = r2d2::Pool::builder()
            .max_size(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .build(manager)?;
        Ok(Self {
            pool,
            location: ":memory:".to_string(),
        })
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub(crate) fn conn(&self) -> Result<DbConnection, StoreError> {
        Ok(self.pool.get()?)
    }

    /// Creates the schema. With `reset`, existing tables and their rows are
    /// dropped first.
    pub fn init(&self, reset: bool) -> Result<(), StoreError> {
        let conn = self.conn()?;
        if reset {
            conn.execute_batch(
                "DROP TABLE IF EXISTS vacancies;
                 DROP TABLE IF EXISTS companies;",
            )?;
        }
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    pub fn ensure_initialized(&self) -> Result<(), StoreError> {
        let tables: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM sqlite_master
             WHERE type = 'table' AND name IN ('companies', 'vacancies')",
            [],
            |row| row.get(0),
        )?;
        if tables < 2 {
            return Err(StoreError::NotInitialized);
        }
        Ok(())
    }

    // --- Company operations ---

    pub fn upsert_company(
        &self,
        external_id: i64,
        name: &str,
    ) -> Result<UpsertOutcome, StoreError> {
        let changed = self.conn()?.execute(
            "INSERT INTO companies (hh_id, name) VALUES (?1, ?2)
             ON CONFLICT (hh_id) DO NOTHING",
            params![external_id, name],
        )?;
        let outcome = if changed == 1 {
            UpsertOutcome::Inserted
        } else {
            UpsertOutcome::AlreadyPresent
        };
        debug!(external_id, name, ?outcome, "upsert company");
        Ok(outcome)
    }

    pub fn company_by_external_id(&self, external_id: i64) -> Result<Option<Company>, StoreError> {
        let company = self
            .conn()?
            .query_row(
                "SELECT id, hh_id, name FROM companies WHERE hh_id = ?1",
                [external_id],
                Self::row_to_company,
            )
            .optional()?;
        Ok(company)
    }

    pub fn company_count(&self) -> Result<i64, StoreError> {
        let count = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM companies", [], |row| row.get(0))?;
        Ok(count)
    }

    fn row_to_company(row: &rusqlite::Row) -> rusqlite::Result<Company> {
        Ok(Company {
            id: row.get(0)?,
            external_id: row.get(1)?,
            name: row.get(2)?,
        })
    }

    // --- Vacancy operations ---

    /// Stores a vacancy under the company with the given hh.ru id. A company
    /// the store has never seen yields `Skipped`, and nothing is written.
    pub fn upsert_vacancy(
        &self,
        company_external_id: i64,
        vacancy: &NewVacancy,
    ) -> Result<VacancyUpsert, StoreError> {
        let conn = self.conn()?;

        let company_id: Option<i64> = conn
            .query_row(
                "SELECT id FROM companies WHERE hh_id = ?1",
                [company_external_id],
                |row| row.get(0),
            )
            .optional()?;

        let Some(company_id) = company_id else {
            let violation = IntegrityViolation {
                company_external_id,
                url: vacancy.url.clone(),
            };
            warn!(
                company = company_external_id,
                url = %vacancy.url,
                "company not in store, skipping vacancy"
            );
            return Ok(VacancyUpsert::Skipped(violation));
        };

        let changed = conn.execute(
            "INSERT INTO vacancies (company_id, title, salary_min, salary_max, salary_currency, url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (url) DO NOTHING",
            params![
                company_id,
                vacancy.title,
                vacancy.salary_min,
                vacancy.salary_max,
                vacancy.salary_currency,
                vacancy.url,
            ],
        )?;

        let outcome = if changed == 1 {
            VacancyUpsert::Inserted
        } else {
            VacancyUpsert::AlreadyPresent
        };
        debug!(company = company_external_id, url = %vacancy.url, ?outcome, "upsert vacancy");
        Ok(outcome)
    }

    pub fn vacancy_by_url(&self, url: &str) -> Result<Option<Vacancy>, StoreError> {
        let vacancy = self
            .conn()?
            .query_row(
                "SELECT id, company_id, title, salary_min, salary_max, salary_currency, url
                 FROM vacancies WHERE url = ?1",
                [url],
                Self::row_to_vacancy,
            )
            .optional()?;
        Ok(vacancy)
    }

    pub fn vacancy_count(&self) -> Result<i64, StoreError> {
        let count = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM vacancies", [], |row| row.get(0))?;
        Ok(count)
    }

    fn row_to_vacancy(row: &rusqlite::Row) -> rusqlite::Result<Vacancy> {
        Ok(Vacancy {
            id: row.get(0)?,
            company_id: row.get(1)?,
            title: row.get(2)?,
            salary_min: row.get(3)?,
            salary_max: row.get(4)?,
            salary_currency: row.get(5)?,
            url: row.get(6)?,
        })
    }
}

fn init_connection(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.busy_timeout(Duration::from_secs(5))
}
