use serde_json::Value;

use crate::error::SchemaError;
use crate::models::{NewCompany, NewVacancy};

/// Maps a raw employer item. Both `id` and `name` are required; hh.ru sends
/// ids as numeric strings, plain integers are accepted too.
pub fn company_from_item(item: &Value) -> Result<NewCompany, SchemaError> {
    let external_id = match item.get("id") {
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| SchemaError::company(format!("id {} is not an integer", n)))?,
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| SchemaError::company(format!("id '{}' is not an integer", s)))?,
        Some(other) => {
            return Err(SchemaError::company(format!(
                "id has unexpected type: {}",
                other
            )));
        }
        None => return Err(SchemaError::company("missing id")),
    };

    let name = match item.get("name") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(Value::String(_)) => {
            return Err(SchemaError::company(format!(
                "company {} has a blank name",
                external_id
            )));
        }
        Some(_) => {
            return Err(SchemaError::company(format!(
                "company {} name is not a string",
                external_id
            )));
        }
        None => {
            return Err(SchemaError::company(format!(
                "company {} is missing a name",
                external_id
            )));
        }
    };

    Ok(NewCompany { external_id, name })
}

/// Maps a raw vacancy item. Every field is optional; `salary` may be absent
/// or null, and its bounds default independently.
pub fn vacancy_from_item(item: &Value) -> Result<NewVacancy, SchemaError> {
    if !item.is_object() {
        return Err(SchemaError::vacancy(format!(
            "expected an object, got {}",
            item
        )));
    }

    let salary = item.get("salary").filter(|s| s.is_object());

    Ok(NewVacancy {
        title: string_or_empty(item.get("name")),
        salary_min: salary_field(salary, "from").and_then(Value::as_i64),
        salary_max: salary_field(salary, "to").and_then(Value::as_i64),
        salary_currency: string_or_empty(salary_field(salary, "currency")),
        url: string_or_empty(item.get("alternate_url")),
    })
}

fn salary_field<'a>(salary: Option<&'a Value>, key: &str) -> Option<&'a Value> {
    salary.and_then(|s| s.get(key))
}

fn string_or_empty(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_default()
}
