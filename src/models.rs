use serde::{Deserialize, Serialize};

/// A company as normalized from the job board, before it has a store id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCompany {
    pub external_id: i64,
    pub name: String,
}

/// A vacancy as normalized from the job board. Belongs to whichever company
/// batch it was fetched for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVacancy {
    pub title: String,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub salary_currency: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: i64,
    pub external_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vacancy {
    pub id: i64,
    pub company_id: i64,
    pub title: String,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub salary_currency: Option<String>,
    pub url: String,
}

impl Vacancy {
    pub fn midpoint_salary(&self) -> Option<f64> {
        midpoint(self.salary_min, self.salary_max)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyVacancyCount {
    pub external_id: i64,
    pub name: String,
    pub vacancy_count: i64,
}

/// One row of the vacancy reports: the vacancy joined with its company name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VacancyListing {
    pub company_name: String,
    pub title: String,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub url: String,
}

fn midpoint(min: Option<i64>, max: Option<i64>) -> Option<f64> {
    match (min, max) {
        (Some(min), Some(max)) => Some((min as f64 + max as f64) / 2.0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midpoint_requires_both_bounds() {
        let vacancy = Vacancy {
            id: 1,
            company_id: 1,
            title: "Engineer".to_string(),
            salary_min: Some(100),
            salary_max: Some(201),
            salary_currency: Some("RUR".to_string()),
            url: "https://hh.ru/vacancy/1".to_string(),
        };
        assert_eq!(vacancy.midpoint_salary(), Some(150.5));

        let open_ended = Vacancy {
            salary_max: None,
            ..vacancy.clone()
        };
        assert_eq!(open_ended.midpoint_salary(), None);

        let no_floor = Vacancy {
            salary_min: None,
            ..vacancy
        };
        assert_eq!(no_floor.midpoint_salary(), None);
    }
}
