use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use tracing::{info, warn};

use crate::client::{Endpoint, ListingSource};
use crate::db::{Store, UpsertOutcome, VacancyUpsert};
use crate::error::{IngestError, IntegrityViolation, SchemaError, StoreError};
use crate::models::{NewCompany, NewVacancy};
use crate::normalize::{company_from_item, vacancy_from_item};

/// What to do with a raw record that fails normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedPolicy {
    /// The first malformed record fails the page it came from.
    #[default]
    Abort,
    /// Malformed records are logged, counted and dropped.
    Skip,
}

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub per_page: u32,
    pub workers: usize,
    pub malformed: MalformedPolicy,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            per_page: 10,
            workers: 4,
            malformed: MalformedPolicy::Abort,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompanyFetchFailure {
    pub external_id: i64,
    pub status: Option<u16>,
    pub error: String,
}

/// Everything fetched in one run, held in memory until it is loaded.
#[derive(Debug, Default)]
pub struct Batch {
    pub companies: Vec<NewCompany>,
    pub vacancies: BTreeMap<i64, Vec<NewVacancy>>,
    pub failures: Vec<CompanyFetchFailure>,
    pub malformed_skipped: usize,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct LoadReport {
    pub companies_inserted: usize,
    pub companies_present: usize,
    pub vacancies_inserted: usize,
    pub vacancies_present: usize,
    pub integrity_violations: Vec<IntegrityViolation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub companies_fetched: usize,
    pub vacancies_fetched: usize,
    pub malformed_skipped: usize,
    pub failures: Vec<CompanyFetchFailure>,
    pub load: LoadReport,
}

pub fn run<S: ListingSource>(
    source: &S,
    store: &Store,
    options: &IngestOptions,
) -> Result<IngestReport, IngestError> {
    let started_at = Local::now();
    let batch = collect(source, options)?;

    let companies_fetched = batch.companies.len();
    let vacancies_fetched = batch.vacancies.values().map(Vec::len).sum();
    let malformed_skipped = batch.malformed_skipped;
    let failures = batch.failures.clone();

    let load = load(store, &batch)?;

    Ok(IngestReport {
        started_at,
        finished_at: Local::now(),
        companies_fetched,
        vacancies_fetched,
        malformed_skipped,
        failures,
        load,
    })
}

// --- Fetch phases ---

pub fn collect<S: ListingSource>(
    source: &S,
    options: &IngestOptions,
) -> Result<Batch, IngestError> {
    let items = source.fetch_page(
        Endpoint::Employers,
        &[("per_page", options.per_page.to_string())],
    )?;
    let (companies, mut malformed_skipped) =
        normalize_all(&items, company_from_item, options.malformed)?;
    info!(companies = companies.len(), "company phase complete");

    let mut batch = Batch {
        companies,
        ..Batch::default()
    };

    let results = fetch_all_vacancies(source, &batch.companies, options);
    for (external_id, result) in results {
        match result {
            Ok((vacancies, skipped)) => {
                malformed_skipped += skipped;
                batch.vacancies.insert(external_id, vacancies);
            }
            Err(e) => {
                warn!(company = external_id, error = %e, "vacancy fetch failed");
                let status = match &e {
                    IngestError::Transport(t) => t.status(),
                    _ => None,
                };
                batch.failures.push(CompanyFetchFailure {
                    external_id,
                    status,
                    error: e.to_string(),
                });
            }
        }
    }
    batch.failures.sort_by_key(|f| f.external_id);
    batch.malformed_skipped = malformed_skipped;

    info!(
        companies = batch.vacancies.len(),
        failed = batch.failures.len(),
        "vacancy phase complete"
    );
    Ok(batch)
}

type VacancyResult = Result<(Vec<NewVacancy>, usize), IngestError>;

/// Fetches every company's vacancy page on a bounded set of scoped workers.
/// Each result is handed back whole once its fetch has finished.
fn fetch_all_vacancies<S: ListingSource>(
    source: &S,
    companies: &[NewCompany],
    options: &IngestOptions,
) -> Vec<(i64, VacancyResult)> {
    if companies.is_empty() {
        return Vec::new();
    }

    let workers = options.workers.clamp(1, companies.len());
    let next = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel();

    thread::scope(|scope| {
        for _ in 0..workers {
            let tx = tx.clone();
            let next = &next;
            scope.spawn(move || {
                while let Some(company) = companies.get(next.fetch_add(1, Ordering::Relaxed)) {
                    let result =
                        fetch_company_vacancies(source, company.external_id, options.malformed);
                    if tx.send((company.external_id, result)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);
        rx.into_iter().collect()
    })
}

fn fetch_company_vacancies<S: ListingSource>(
    source: &S,
    external_id: i64,
    policy: MalformedPolicy,
) -> VacancyResult {
    info!(company = external_id, "fetching vacancies");
    let items = source.fetch_page(
        Endpoint::Vacancies,
        &[("employer_id", external_id.to_string())],
    )?;
    Ok(normalize_all(&items, vacancy_from_item, policy)?)
}

fn normalize_all<T>(
    items: &[Value],
    normalize: fn(&Value) -> Result<T, SchemaError>,
    policy: MalformedPolicy,
) -> Result<(Vec<T>, usize), SchemaError> {
    let mut records = Vec::with_capacity(items.len());
    let mut skipped = 0;
    for item in items {
        match normalize(item) {
            Ok(record) => records.push(record),
            Err(e) if policy == MalformedPolicy::Skip => {
                warn!(error = %e, "skipping malformed record");
                skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }
    Ok((records, skipped))
}

// --- Load phase ---

/// Applies a batch to the store: every company, then every vacancy batch.
pub fn load(store: &Store, batch: &Batch) -> Result<LoadReport, StoreError> {
    let mut report = LoadReport::default();

    for company in &batch.companies {
        match store.upsert_company(company.external_id, &company.name)? {
            UpsertOutcome::Inserted => report.companies_inserted += 1,
            UpsertOutcome::AlreadyPresent => report.companies_present += 1,
        }
    }

    for (external_id, vacancies) in &batch.vacancies {
        for vacancy in vacancies {
            match store.upsert_vacancy(*external_id, vacancy)? {
                VacancyUpsert::Inserted => report.vacancies_inserted += 1,
                VacancyUpsert::AlreadyPresent => report.vacancies_present += 1,
                VacancyUpsert::Skipped(violation) => report.integrity_violations.push(violation),
            }
        }
    }

    info!(
        companies_inserted = report.companies_inserted,
        vacancies_inserted = report.vacancies_inserted,
        skipped = report.integrity_violations.len(),
        "batch loaded"
    );
    Ok(report)
}
