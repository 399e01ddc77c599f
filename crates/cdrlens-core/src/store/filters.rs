use chrono::NaiveDate;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

/// Leg-level selection shared by every store query.
///
/// Dates are inclusive and compare the calendar date of `start_time`.
/// A location of `"all"` (any case) or an empty string matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub location: Option<String>,
    /// Substring of the caller number.
    pub phone_number: Option<String>,
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
}

impl LegFilter {
    /// A filter restricted to the given date range and location.
    pub fn range(
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        location: Option<String>,
    ) -> Self {
        LegFilter {
            start_date,
            end_date,
            location,
            ..Default::default()
        }
    }

    /// Build the `WHERE` clause (with leading `WHERE` when non-empty) and its
    /// positional parameters.
    pub(crate) fn where_clause(&self) -> (String, Vec<Value>) {
        let mut clauses: Vec<&str> = Vec::new();
        let mut params: Vec<Value> = Vec::new();

        if let Some(start) = self.start_date {
            clauses.push("start_date >= ?");
            params.push(Value::Text(start.format("%Y-%m-%d").to_string()));
        }
        if let Some(end) = self.end_date {
            clauses.push("start_date <= ?");
            params.push(Value::Text(end.format("%Y-%m-%d").to_string()));
        }
        if let Some(location) = self.effective_location() {
            clauses.push("location = ?");
            params.push(Value::Text(location.to_string()));
        }
        if let Some(phone) = self.phone_number.as_deref().map(str::trim) {
            if !phone.is_empty() {
                clauses.push("instr(caller_number, ?) > 0");
                params.push(Value::Text(phone.to_string()));
            }
        }

        if clauses.is_empty() {
            (String::new(), params)
        } else {
            (format!(" WHERE {}", clauses.join(" AND ")), params)
        }
    }

    /// `LIMIT`/`OFFSET` suffix with its parameters.
    pub(crate) fn page_clause(&self) -> (String, Vec<Value>) {
        match (self.limit, self.offset) {
            (None, 0) => (String::new(), Vec::new()),
            (limit, offset) => (
                " LIMIT ? OFFSET ?".to_string(),
                vec![
                    Value::Integer(limit.map(|l| l as i64).unwrap_or(-1)),
                    Value::Integer(offset as i64),
                ],
            ),
        }
    }

    fn effective_location(&self) -> Option<&str> {
        self.location
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.eq_ignore_ascii_case("all"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_has_no_clauses() {
        let (sql, params) = LegFilter::default().where_clause();
        assert!(sql.is_empty());
        assert!(params.is_empty());
        assert!(LegFilter::default().page_clause().0.is_empty());
    }

    #[test]
    fn test_all_location_ignored() {
        let filter = LegFilter {
            location: Some("All".into()),
            ..Default::default()
        };
        assert!(filter.where_clause().0.is_empty());
    }

    #[test]
    fn test_full_filter() {
        let filter = LegFilter {
            start_date: NaiveDate::from_ymd_opt(2025, 6, 1),
            end_date: NaiveDate::from_ymd_opt(2025, 6, 30),
            location: Some("Main".into()),
            phone_number: Some("555".into()),
            limit: Some(10),
            offset: 20,
        };
        let (sql, params) = filter.where_clause();
        assert_eq!(
            sql,
            " WHERE start_date >= ? AND start_date <= ? AND location = ? AND instr(caller_number, ?) > 0"
        );
        assert_eq!(params.len(), 4);
        let (page, page_params) = filter.page_clause();
        assert_eq!(page, " LIMIT ? OFFSET ?");
        assert_eq!(page_params, vec![Value::Integer(10), Value::Integer(20)]);
    }

    #[test]
    fn test_offset_without_limit() {
        let filter = LegFilter {
            offset: 5,
            ..Default::default()
        };
        assert_eq!(
            filter.page_clause().1,
            vec![Value::Integer(-1), Value::Integer(5)]
        );
    }
}
