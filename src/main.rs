mod client;
mod config;
mod db;
mod error;
mod ingest;
mod models;
mod normalize;
mod queries;
mod telemetry;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client::HhClient;
use config::Settings;
use db::Store;
use ingest::{IngestReport, MalformedPolicy};
use models::VacancyListing;
use serde::Serialize;

#[derive(Parser)]
#[command(name = "hh-harvest")]
#[command(about = "Collect hh.ru employers and vacancies into SQLite and report on them")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema
    Init {
        /// Drop existing tables first
        #[arg(long)]
        reset: bool,
    },

    /// Fetch employers and their vacancies into the database
    Fetch {
        #[command(flatten)]
        ingest: IngestArgs,

        /// Print the ingest report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show every company with its vacancy count
    Companies {
        #[arg(long)]
        json: bool,
    },

    /// Show every stored vacancy
    Vacancies {
        #[arg(long)]
        json: bool,
    },

    /// Show the average midpoint salary
    AvgSalary {
        #[arg(long)]
        json: bool,
    },

    /// Show vacancies paying above the average midpoint salary
    TopPaid {
        #[arg(long)]
        json: bool,
    },

    /// Search vacancy titles (case-insensitive)
    Search {
        keyword: String,

        #[arg(long)]
        json: bool,
    },

    /// Show one stored vacancy
    Show {
        /// Vacancy URL
        url: String,
    },

    /// Show one stored company
    Company {
        /// hh.ru employer id
        hh_id: i64,
    },

    /// Initialize, fetch, and print every report
    Run {
        /// Drop existing tables first
        #[arg(long)]
        reset: bool,

        /// Keyword for the title search report
        #[arg(short, long, default_value = "python")]
        keyword: String,

        #[command(flatten)]
        ingest: IngestArgs,
    },
}

#[derive(clap::Args)]
struct IngestArgs {
    /// Number of employers to fetch
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    per_page: Option<u32>,

    /// Concurrent vacancy fetches
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    workers: Option<u32>,

    /// Skip malformed records instead of failing
    #[arg(long)]
    skip_malformed: bool,
}

impl IngestArgs {
    fn apply(&self, settings: &mut Settings) {
        if let Some(per_page) = self.per_page {
            settings.ingest.per_page = per_page;
        }
        if let Some(workers) = self.workers {
            settings.ingest.workers = workers as usize;
        }
        if self.skip_malformed {
            settings.ingest.malformed = MalformedPolicy::Skip;
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = Settings::load().context("Failed to load configuration")?;
    telemetry::init(&settings.log_level)?;

    let store = Store::open(&settings.db_path, settings.pool_size)
        .with_context(|| format!("Failed to open database at {}", settings.db_path.display()))?;

    match cli.command {
        Commands::Init { reset } => {
            store.init(reset)?;
            println!("Database initialized at {}", store.location());
        }

        Commands::Fetch { ingest, json } => {
            store.ensure_initialized()?;
            ingest.apply(&mut settings);
            let report = fetch(&settings, &store)?;
            if json {
                print_json(&report)?;
            } else {
                print_ingest_report(&report);
                print_totals(&store)?;
            }
        }

        Commands::Companies { json } => {
            store.ensure_initialized()?;
            let counts = store.company_vacancy_counts()?;
            if json {
                print_json(&counts)?;
            } else if counts.is_empty() {
                println!("No companies found.");
            } else {
                println!("{:<10} {:<40} {:>10}", "HH ID", "COMPANY", "VACANCIES");
                println!("{}", "-".repeat(62));
                for company in counts {
                    println!(
                        "{:<10} {:<40} {:>10}",
                        company.external_id,
                        truncate(&company.name, 38),
                        company.vacancy_count
                    );
                }
            }
        }

        Commands::Vacancies { json } => {
            store.ensure_initialized()?;
            let vacancies = store.all_vacancies()?;
            print_listings(&vacancies, json)?;
        }

        Commands::AvgSalary { json } => {
            store.ensure_initialized()?;
            let avg = store.average_salary()?;
            if json {
                print_json(&avg)?;
            } else {
                print_average(avg);
            }
        }

        Commands::TopPaid { json } => {
            store.ensure_initialized()?;
            let vacancies = store.above_average_salary_vacancies()?;
            print_listings(&vacancies, json)?;
        }

        Commands::Search { keyword, json } => {
            store.ensure_initialized()?;
            let vacancies = store.vacancies_matching_keyword(&keyword)?;
            print_listings(&vacancies, json)?;
        }

        Commands::Show { url } => {
            store.ensure_initialized()?;
            match store.vacancy_by_url(&url)? {
                Some(vacancy) => {
                    println!("Vacancy #{}", vacancy.id);
                    println!("Title: {}", vacancy.title);
                    println!("Salary: {}", format_salary(vacancy.salary_min, vacancy.salary_max));
                    let currency = vacancy.salary_currency.as_deref().unwrap_or_default();
                    if !currency.is_empty() {
                        println!("Currency: {}", currency);
                    }
                    if let Some(midpoint) = vacancy.midpoint_salary() {
                        println!("Midpoint: {:.2}", midpoint);
                    }
                    println!("URL: {}", vacancy.url);
                }
                None => {
                    println!("Vacancy '{}' not found.", url);
                }
            }
        }

        Commands::Company { hh_id } => {
            store.ensure_initialized()?;
            match store.company_by_external_id(hh_id)? {
                Some(company) => {
                    println!("Company #{}", company.id);
                    println!("HH ID: {}", company.external_id);
                    println!("Name: {}", company.name);
                }
                None => {
                    println!("Company {} not found.", hh_id);
                }
            }
        }

        Commands::Run {
            reset,
            keyword,
            ingest,
        } => {
            store.init(reset)?;
            ingest.apply(&mut settings);
            let report = fetch(&settings, &store)?;
            print_ingest_report(&report);
            print_totals(&store)?;

            println!("\nCompanies and vacancy count:");
            for company in store.company_vacancy_counts()? {
                println!("  {:<40} {:>6}", truncate(&company.name, 38), company.vacancy_count);
            }

            println!("\nAll vacancies:");
            print_listings(&store.all_vacancies()?, false)?;

            println!("\nAverage salary:");
            print_average(store.average_salary()?);

            println!("\nVacancies above average salary:");
            print_listings(&store.above_average_salary_vacancies()?, false)?;

            println!("\nVacancies matching '{}':", keyword);
            print_listings(&store.vacancies_matching_keyword(&keyword)?, false)?;
        }
    }

    Ok(())
}

fn fetch(settings: &Settings, store: &Store) -> Result<IngestReport> {
    let client = HhClient::new(&settings.api_base, &settings.user_agent)
        .context("Failed to build HTTP client")?;
    let report = ingest::run(&client, store, &settings.ingest).context("Ingestion failed")?;
    Ok(report)
}

fn print_ingest_report(report: &IngestReport) {
    println!("\nResults:");
    println!("  Companies fetched:  {}", report.companies_fetched);
    println!("  Companies added:    {}", report.load.companies_inserted);
    println!("  Vacancies fetched:  {}", report.vacancies_fetched);
    println!("  Vacancies added:    {}", report.load.vacancies_inserted);
    if report.load.vacancies_present > 0 {
        println!("  Already stored:     {}", report.load.vacancies_present);
    }
    if report.malformed_skipped > 0 {
        println!("  Malformed skipped:  {}", report.malformed_skipped);
    }
    if !report.load.integrity_violations.is_empty() {
        println!("  Orphans skipped:    {}", report.load.integrity_violations.len());
    }
    for failure in &report.failures {
        match failure.status {
            Some(status) => println!(
                "  Failed company {} (HTTP {}): {}",
                failure.external_id, status, failure.error
            ),
            None => println!("  Failed company {}: {}", failure.external_id, failure.error),
        }
    }
    let elapsed = report.finished_at - report.started_at;
    println!(
        "  Finished {} ({:.1}s)",
        report.finished_at.format("%Y-%m-%d %H:%M:%S"),
        elapsed.num_milliseconds() as f64 / 1000.0
    );
}

fn print_totals(store: &Store) -> Result<()> {
    println!(
        "  Stored in total:    {} companies, {} vacancies",
        store.company_count()?,
        store.vacancy_count()?
    );
    Ok(())
}

fn print_listings(vacancies: &[VacancyListing], json: bool) -> Result<()> {
    if json {
        return print_json(&vacancies);
    }
    if vacancies.is_empty() {
        println!("No vacancies found.");
        return Ok(());
    }
    println!("{:<22} {:<36} {:>16}  {}", "COMPANY", "TITLE", "SALARY", "URL");
    println!("{}", "-".repeat(110));
    for vacancy in vacancies {
        println!(
            "{:<22} {:<36} {:>16}  {}",
            truncate(&vacancy.company_name, 20),
            truncate(&vacancy.title, 34),
            format_salary(vacancy.salary_min, vacancy.salary_max),
            vacancy.url
        );
    }
    Ok(())
}

fn print_average(avg: Option<f64>) {
    match avg {
        Some(avg) => println!("{:.2}", avg),
        None => println!("No vacancies with a full salary range."),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn format_salary(min: Option<i64>, max: Option<i64>) -> String {
    match (min, max) {
        (Some(min), Some(max)) => format!("{}-{}", min, max),
        (Some(min), None) => format!("{}+", min),
        (None, Some(max)) => format!("<{}", max),
        (None, None) => "-".to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_counts_characters() {
        assert_eq!(truncate("Яндекс", 10), "Яндекс");
        assert_eq!(truncate("Разработчик Python", 8), "Разра...");
    }

    #[test]
    fn test_format_salary() {
        assert_eq!(format_salary(Some(100), Some(200)), "100-200");
        assert_eq!(format_salary(Some(100), None), "100+");
        assert_eq!(format_salary(None, Some(200)), "<200");
        assert_eq!(format_salary(None, None), "-");
    }

    #[test]
    fn test_cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "hh-harvest",
            "run",
            "--reset",
            "--keyword",
            "rust",
            "--workers",
            "2",
            "--skip-malformed",
        ])
        .unwrap();
        match cli.command {
            Commands::Run {
                reset,
                keyword,
                ingest,
            } => {
                assert!(reset);
                assert_eq!(keyword, "rust");
                assert_eq!(ingest.workers, Some(2));
                assert!(ingest.skip_malformed);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_cli_rejects_zero_ingest_sizes() {
        for flag in ["--per-page", "--workers"] {
            let parsed = Cli::try_parse_from(["hh-harvest", "fetch", flag, "0"]);
            assert!(parsed.is_err(), "{flag} 0 should be rejected");
        }

        let cli = Cli::try_parse_from(["hh-harvest", "fetch", "--per-page", "1", "--workers", "1"])
            .unwrap();
        let Commands::Fetch { ingest, .. } = cli.command else {
            panic!("expected fetch");
        };
        let mut settings = Settings::from_lookup(|_| None).unwrap();
        ingest.apply(&mut settings);
        assert_eq!(settings.ingest.per_page, 1);
        assert_eq!(settings.ingest.workers, 1);
    }
}
