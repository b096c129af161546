use rusqlite::params;

use crate::db::Store;
use crate::error::StoreError;
use crate::models::{CompanyVacancyCount, VacancyListing};

const LISTING_SELECT: &str = "SELECT c.name, v.title, v.salary_min, v.salary_max, v.url
     FROM vacancies v
     JOIN companies c ON v.company_id = c.id";

impl Store {
    /// Every company with its number of stored vacancies, including companies
    /// that have none.
    pub fn company_vacancy_counts(&self) -> Result<Vec<CompanyVacancyCount>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT c.hh_id, c.name, COUNT(v.id)
             FROM companies c
             LEFT JOIN vacancies v ON v.company_id = c.id
             GROUP BY c.id
             ORDER BY c.name, c.hh_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(CompanyVacancyCount {
                external_id: row.get(0)?,
                name: row.get(1)?,
                vacancy_count: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn all_vacancies(&self) -> Result<Vec<VacancyListing>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("{LISTING_SELECT} ORDER BY v.id"))?;
        let rows = stmt.query_map([], row_to_listing)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Mean midpoint salary over vacancies that have both bounds, or `None`
    /// when there are no such vacancies.
    pub fn average_salary(&self) -> Result<Option<f64>, StoreError> {
        let avg: Option<f64> = self.conn()?.query_row(
            "SELECT AVG((salary_min + salary_max) / 2.0)
             FROM vacancies
             WHERE salary_min IS NOT NULL AND salary_max IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(avg)
    }

    /// Vacancies whose midpoint salary is strictly above `average_salary`.
    pub fn above_average_salary_vacancies(&self) -> Result<Vec<VacancyListing>, StoreError> {
        let Some(avg) = self.average_salary()? else {
            return Ok(Vec::new());
        };

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{LISTING_SELECT}
             WHERE v.salary_min IS NOT NULL AND v.salary_max IS NOT NULL
               AND (v.salary_min + v.salary_max) / 2.0 > ?1
             ORDER BY v.id"
        ))?;
        let rows = stmt.query_map(params![avg], row_to_listing)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Case-insensitive substring search over titles. SQLite's LIKE only folds
    /// ASCII, so matching happens here on full Unicode lowercase.
    pub fn vacancies_matching_keyword(
        &self,
        keyword: &str,
    ) -> Result<Vec<VacancyListing>, StoreError> {
        let needle = keyword.to_lowercase();
        let matches = self
            .all_vacancies()?
            .into_iter()
            .filter(|v| v.title.to_lowercase().contains(&needle))
            .collect();
        Ok(matches)
    }
}

fn row_to_listing(row: &rusqlite::Row) -> rusqlite::Result<VacancyListing> {
    Ok(VacancyListing {
        company_name: row.get(0)?,
        title: row.get(1)?,
        salary_min: row.get(2)?,
        salary_max: row.get(3)?,
        url: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::db::tests::{test_store, vacancy};

    #[test]
    fn test_counts_include_companies_without_vacancies() {
        let store = test_store();
        store.upsert_company(1, "Acme").unwrap();
        store.upsert_company(2, "Globex").unwrap();
        store
            .upsert_vacancy(1, &vacancy("Dev", None, None, "https://hh.ru/vacancy/1"))
            .unwrap();
        store
            .upsert_vacancy(1, &vacancy("Ops", None, None, "https://hh.ru/vacancy/2"))
            .unwrap();

        let counts = store.company_vacancy_counts().unwrap();
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0].name, "Acme");
        assert_eq!(counts[0].vacancy_count, 2);
        assert_eq!(counts[1].name, "Globex");
        assert_eq!(counts[1].external_id, 2);
        assert_eq!(counts[1].vacancy_count, 0);
    }

    #[test]
    fn test_counts_keep_same_named_companies_apart() {
        let store = test_store();
        store.upsert_company(1, "Acme").unwrap();
        store.upsert_company(2, "Acme").unwrap();
        store
            .upsert_vacancy(2, &vacancy("Dev", None, None, "https://hh.ru/vacancy/1"))
            .unwrap();

        let counts = store.company_vacancy_counts().unwrap();
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0].vacancy_count, 0);
        assert_eq!(counts[1].vacancy_count, 1);
    }

    #[test]
    fn test_all_vacancies_joins_company_name() {
        let store = test_store();
        store.upsert_company(1, "Acme").unwrap();
        store
            .upsert_vacancy(1, &vacancy("Dev", Some(10), None, "https://hh.ru/vacancy/1"))
            .unwrap();

        let all = store.all_vacancies().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].company_name, "Acme");
        assert_eq!(all[0].title, "Dev");
        assert_eq!(all[0].salary_min, Some(10));
        assert_eq!(all[0].salary_max, None);
        assert_eq!(all[0].url, "https://hh.ru/vacancy/1");
    }

    #[test]
    fn test_average_uses_only_fully_specified_salaries() {
        let store = test_store();
        store.upsert_company(1, "Acme").unwrap();
        store
            .upsert_vacancy(1, &vacancy("A", Some(100), Some(200), "https://hh.ru/vacancy/1"))
            .unwrap();
        store
            .upsert_vacancy(1, &vacancy("B", None, Some(300), "https://hh.ru/vacancy/2"))
            .unwrap();
        store
            .upsert_vacancy(1, &vacancy("C", Some(400), None, "https://hh.ru/vacancy/3"))
            .unwrap();

        assert_eq!(store.average_salary().unwrap(), Some(150.0));
    }

    #[test]
    fn test_average_is_none_without_complete_salaries() {
        let store = test_store();
        assert_eq!(store.average_salary().unwrap(), None);

        store.upsert_company(1, "Acme").unwrap();
        store
            .upsert_vacancy(1, &vacancy("B", None, Some(300), "https://hh.ru/vacancy/2"))
            .unwrap();
        store
            .upsert_vacancy(1, &vacancy("C", Some(400), None, "https://hh.ru/vacancy/3"))
            .unwrap();
        assert_eq!(store.average_salary().unwrap(), None);
        assert!(store.above_average_salary_vacancies().unwrap().is_empty());
    }

    #[test]
    fn test_above_average_is_strictly_greater() {
        let store = test_store();
        store.upsert_company(1, "Acme").unwrap();
        store
            .upsert_vacancy(1, &vacancy("Low", Some(148), Some(150), "https://hh.ru/vacancy/1"))
            .unwrap();
        store
            .upsert_vacancy(1, &vacancy("Mid", Some(150), Some(150), "https://hh.ru/vacancy/2"))
            .unwrap();
        store
            .upsert_vacancy(1, &vacancy("High", Some(150), Some(152), "https://hh.ru/vacancy/3"))
            .unwrap();
        store
            .upsert_vacancy(1, &vacancy("Open", Some(9000), None, "https://hh.ru/vacancy/4"))
            .unwrap();

        assert_eq!(store.average_salary().unwrap(), Some(150.0));
        let above = store.above_average_salary_vacancies().unwrap();
        assert_eq!(above.len(), 1);
        assert_eq!(above[0].title, "High");
        assert_eq!((above[0].salary_min, above[0].salary_max), (Some(150), Some(152)));
    }

    #[test]
    fn test_keyword_search_ignores_case() {
        let store = test_store();
        store.upsert_company(1, "Acme").unwrap();
        let titles = [
            "junior python developer",
            "Java engineer",
            "Ведущий Python-разработчик",
        ];
        for (i, title) in titles.iter().enumerate() {
            let url = format!("https://hh.ru/vacancy/{}", i + 1);
            store
                .upsert_vacancy(1, &vacancy(title, None, None, &url))
                .unwrap();
        }

        let hits = store.vacancies_matching_keyword("Python").unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "junior python developer");

        let cyrillic = store.vacancies_matching_keyword("РАЗРАБОТЧИК").unwrap();
        assert_eq!(cyrillic.len(), 1);
    }

    #[test]
    fn test_empty_keyword_matches_everything() {
        let store = test_store();
        store.upsert_company(1, "Acme").unwrap();
        store
            .upsert_vacancy(1, &vacancy("", None, None, "https://hh.ru/vacancy/1"))
            .unwrap();
        store
            .upsert_vacancy(1, &vacancy("Dev", None, None, "https://hh.ru/vacancy/2"))
            .unwrap();

        assert_eq!(store.vacancies_matching_keyword("").unwrap().len(), 2);
    }
}
