/// Generic search, filtering, sorting and pagination
///
/// A [`SearchConfig`] whitelists the columns of one listing. A
/// [`SearchRequest`] names columns from that whitelist; [`SearchQuery`]
/// validates it and renders parameterized SQL through `sqlx::QueryBuilder`.
/// Identifiers only ever come from the config, never from the request.
///
/// # Example
///
/// ```no_run
/// use keystone_shared::search::{SearchQuery, SearchRequest};
/// use keystone_shared::models::workspace::{Workspace, WORKSPACE_SEARCH};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let request: SearchRequest = serde_json::from_str(
///     r#"{"search": "notes", "filter": [{"column": "id", "value": "10", "operator": "less_than"}]}"#,
/// )?;
/// let page = SearchQuery::new(&WORKSPACE_SEARCH, &request)?
///     .fetch_page::<Workspace>(&pool, None)
///     .await?;
/// println!("{} of {}", page.items.len(), page.total);
/// # Ok(())
/// # }
/// ```

pub mod config;
pub mod query;

pub use config::{Column, ColumnKind, ScopedPredicate, SearchConfig};
pub use query::SearchQuery;

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use validator::Validate;

/// Errors produced while validating or running a search
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Field '{0}' is not a valid filter field")]
    InvalidFilterField(String),

    #[error("Field '{0}' is not a valid sort field")]
    InvalidSortField(String),

    /// Free-text search on a listing without searchable columns
    #[error("No searchable fields configured for {0}")]
    InvalidSearchField(&'static str),

    #[error("Cannot convert value '{value}' to {expected} for field '{column}'")]
    FilterValue {
        column: String,
        value: String,
        expected: &'static str,
    },

    #[error("Operator '{operator}' is not supported for field '{column}'")]
    UnsupportedOperator {
        column: String,
        operator: &'static str,
    },

    #[error("Invalid sort direction '{0}'")]
    InvalidSortDirection(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Filter operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Contains,
    DoesNotContain,
    Equals,
    NotEquals,
    StartsWith,
    EndsWith,
    IsEmpty,
    IsNotEmpty,
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
    In,
    NotIn,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Contains => "contains",
            FilterOperator::DoesNotContain => "does_not_contain",
            FilterOperator::Equals => "equals",
            FilterOperator::NotEquals => "not_equals",
            FilterOperator::StartsWith => "starts_with",
            FilterOperator::EndsWith => "ends_with",
            FilterOperator::IsEmpty => "is_empty",
            FilterOperator::IsNotEmpty => "is_not_empty",
            FilterOperator::GreaterThan => "greater_than",
            FilterOperator::LessThan => "less_than",
            FilterOperator::GreaterOrEqual => "greater_or_equal",
            FilterOperator::LessOrEqual => "less_or_equal",
            FilterOperator::In => "in",
            FilterOperator::NotIn => "not_in",
        }
    }
}

/// Sort direction, parsed case-insensitively
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            _ => Err(SearchError::InvalidSortDirection(s.to_string())),
        }
    }
}

/// One filter clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub column: String,

    /// Strings, numbers and booleans are accepted; arrays feed `in`/`not_in`
    #[serde(default)]
    pub value: serde_json::Value,

    pub operator: FilterOperator,
}

impl FilterSpec {
    /// Filter value as text; arrays are joined with commas
    pub fn raw_value(&self) -> String {
        fn scalar(value: &serde_json::Value) -> String {
            match value {
                serde_json::Value::Null => String::new(),
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            }
        }

        match &self.value {
            serde_json::Value::Array(items) => {
                items.iter().map(scalar).collect::<Vec<_>>().join(",")
            }
            other => scalar(other),
        }
    }
}

/// One ordering clause
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub column: String,
    pub direction: String,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    20
}

/// Search request body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    /// Free-text term matched against the searchable columns
    #[serde(default)]
    pub search: Option<String>,

    #[serde(default = "default_page")]
    #[validate(range(min = 1, message = "Page must be at least 1"))]
    pub page: u32,

    #[serde(default = "default_page_size")]
    #[validate(range(min = 1, max = 100, message = "Page size must be between 1 and 100"))]
    pub page_size: u32,

    #[serde(default)]
    pub filter: Option<Vec<FilterSpec>>,

    #[serde(default)]
    pub sort: Option<Vec<SortSpec>>,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            search: None,
            page: default_page(),
            page_size: default_page_size(),
            filter: None,
            sort: None,
        }
    }
}

/// One page of results plus pagination metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: i64,
}

impl<T> SearchResponse<T> {
    pub fn new(items: Vec<T>, total: i64, page: u32, page_size: u32) -> Self {
        Self {
            items,
            total,
            page,
            page_size,
            total_pages: total_pages(total, page_size),
        }
    }
}

/// Number of pages needed for `total` rows
pub fn total_pages(total: i64, page_size: u32) -> i64 {
    if total <= 0 || page_size == 0 {
        return 0;
    }
    let page_size = i64::from(page_size);
    (total + page_size - 1) / page_size
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request: SearchRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request, SearchRequest::default());
        assert_eq!(request.page, 1);
        assert_eq!(request.page_size, 20);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_request_camel_case_and_nulls() {
        let request: SearchRequest = serde_json::from_str(
            r#"{"pageSize": 5, "page": 2, "filter": null, "sort": [{"column": "id", "direction": "DESC"}]}"#,
        )
        .unwrap();
        assert_eq!(request.page_size, 5);
        assert_eq!(request.page, 2);
        assert!(request.filter.is_none());
        assert_eq!(request.sort.unwrap()[0].direction, "DESC");
    }

    #[test]
    fn test_request_validation_bounds() {
        let request = SearchRequest {
            page: 0,
            ..Default::default()
        };
        assert!(request.validate().is_err());

        let request = SearchRequest {
            page_size: 101,
            ..Default::default()
        };
        assert!(request.validate().is_err());

        let request = SearchRequest {
            page_size: 100,
            ..Default::default()
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_unknown_operator_rejected() {
        let result: Result<FilterSpec, _> =
            serde_json::from_str(r#"{"column": "id", "value": "1", "operator": "like"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_sort_direction_parse() {
        assert_eq!("asc".parse::<SortDirection>().unwrap(), SortDirection::Asc);
        assert_eq!("DESC".parse::<SortDirection>().unwrap(), SortDirection::Desc);
        assert_eq!(" Desc ".parse::<SortDirection>().unwrap(), SortDirection::Desc);
        assert!(matches!(
            "sideways".parse::<SortDirection>(),
            Err(SearchError::InvalidSortDirection(_))
        ));
    }

    #[test]
    fn test_filter_raw_value() {
        let spec: FilterSpec =
            serde_json::from_str(r#"{"column": "id", "value": [1, "2", 3], "operator": "in"}"#)
                .unwrap();
        assert_eq!(spec.raw_value(), "1,2,3");

        let spec: FilterSpec =
            serde_json::from_str(r#"{"column": "title", "operator": "is_empty"}"#).unwrap();
        assert_eq!(spec.raw_value(), "");

        let spec: FilterSpec =
            serde_json::from_str(r#"{"column": "flag", "value": true, "operator": "equals"}"#)
                .unwrap();
        assert_eq!(spec.raw_value(), "true");
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 20), 0);
        assert_eq!(total_pages(1, 20), 1);
        assert_eq!(total_pages(20, 20), 1);
        assert_eq!(total_pages(21, 20), 2);
        assert_eq!(total_pages(101, 10), 11);
    }

    #[test]
    fn test_response_serialization() {
        let response = SearchResponse::new(vec![1, 2], 42, 3, 2);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["pageSize"], 2);
        assert_eq!(json["totalPages"], 21);
        assert_eq!(json["items"], serde_json::json!([1, 2]));
    }
}
