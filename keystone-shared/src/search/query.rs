/// Validated search query and SQL rendering

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{postgres::PgRow, FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::config::{Column, ColumnKind, ScopedPredicate, SearchConfig};
use super::{FilterOperator, SearchError, SearchRequest, SearchResponse, SortDirection};

/// A typed parameter value
#[derive(Debug, Clone, PartialEq)]
enum Value {
    Integer(i64),
    Text(String),
    Uuid(Uuid),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
}

impl Value {
    fn parse(column: &Column, raw: &str) -> Result<Self, SearchError> {
        let raw = raw.trim();
        let invalid = || SearchError::FilterValue {
            column: column.name.to_string(),
            value: raw.to_string(),
            expected: column.kind.name(),
        };

        match column.kind {
            ColumnKind::Text => Ok(Value::Text(raw.to_string())),
            ColumnKind::Integer => raw.parse().map(Value::Integer).map_err(|_| invalid()),
            ColumnKind::Uuid => Uuid::parse_str(raw).map(Value::Uuid).map_err(|_| invalid()),
            ColumnKind::Boolean => match raw.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(Value::Boolean(true)),
                "false" | "0" | "no" | "off" => Ok(Value::Boolean(false)),
                _ => Err(invalid()),
            },
            ColumnKind::Timestamp => parse_timestamp(raw).map(Value::Timestamp).ok_or_else(invalid),
        }
    }

    fn push(self, qb: &mut QueryBuilder<'static, Postgres>) {
        match self {
            Value::Integer(v) => qb.push_bind(v),
            Value::Text(v) => qb.push_bind(v),
            Value::Uuid(v) => qb.push_bind(v),
            Value::Boolean(v) => qb.push_bind(v),
            Value::Timestamp(v) => qb.push_bind(v),
        };
    }
}

/// RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC)
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Escapes LIKE wildcards so user input matches literally
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[derive(Debug, Clone, PartialEq)]
enum Condition {
    /// `expr <op> $n`
    Compare {
        expr: &'static str,
        op: &'static str,
        value: Value,
    },
    /// Case-insensitive LIKE with an already-escaped pattern
    Like {
        expr: &'static str,
        pattern: String,
        negate: bool,
    },
    Empty {
        expr: &'static str,
        text: bool,
        negate: bool,
    },
    List {
        expr: &'static str,
        values: Vec<Value>,
        negate: bool,
    },
}

impl Condition {
    fn build(column: &'static Column, operator: FilterOperator, raw: &str) -> Result<Self, SearchError> {
        let expr = column.expr;
        let is_text = column.kind == ColumnKind::Text;
        let unsupported = || SearchError::UnsupportedOperator {
            column: column.name.to_string(),
            operator: operator.as_str(),
        };

        let like = |pattern: String, negate: bool| -> Result<Condition, SearchError> {
            if !is_text {
                return Err(unsupported());
            }
            Ok(Condition::Like {
                expr,
                pattern,
                negate,
            })
        };
        let compare = |op: &'static str| -> Result<Condition, SearchError> {
            if matches!(column.kind, ColumnKind::Boolean | ColumnKind::Uuid) {
                return Err(unsupported());
            }
            Ok(Condition::Compare {
                expr,
                op,
                value: Value::parse(column, raw)?,
            })
        };
        let list = |negate: bool| -> Result<Condition, SearchError> {
            let values = raw
                .split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| Value::parse(column, v))
                .collect::<Result<Vec<_>, _>>()?;
            if values.is_empty() {
                return Err(SearchError::FilterValue {
                    column: column.name.to_string(),
                    value: raw.to_string(),
                    expected: "comma-separated list",
                });
            }
            Ok(Condition::List {
                expr,
                values,
                negate,
            })
        };
        // Exact match, case-sensitive like the list operators
        let equals = |negate: bool| -> Result<Condition, SearchError> {
            Ok(Condition::Compare {
                expr,
                op: if negate { " IS DISTINCT FROM " } else { " = " },
                value: Value::parse(column, raw)?,
            })
        };

        let term = escape_like(raw.trim());
        match operator {
            FilterOperator::Contains => like(format!("%{}%", term), false),
            FilterOperator::DoesNotContain => like(format!("%{}%", term), true),
            FilterOperator::StartsWith => like(format!("{}%", term), false),
            FilterOperator::EndsWith => like(format!("%{}", term), false),
            FilterOperator::Equals => equals(false),
            FilterOperator::NotEquals => equals(true),
            FilterOperator::IsEmpty => Ok(Condition::Empty {
                expr,
                text: is_text,
                negate: false,
            }),
            FilterOperator::IsNotEmpty => Ok(Condition::Empty {
                expr,
                text: is_text,
                negate: true,
            }),
            FilterOperator::GreaterThan => compare(" > "),
            FilterOperator::LessThan => compare(" < "),
            FilterOperator::GreaterOrEqual => compare(" >= "),
            FilterOperator::LessOrEqual => compare(" <= "),
            FilterOperator::In => list(false),
            FilterOperator::NotIn => list(true),
        }
    }

    fn push(&self, qb: &mut QueryBuilder<'static, Postgres>) {
        match self {
            Condition::Compare { expr, op, value } => {
                qb.push(*expr).push(*op);
                value.clone().push(qb);
            }
            Condition::Like {
                expr,
                pattern,
                negate,
            } => {
                if *negate {
                    qb.push("(").push(*expr).push(" IS NULL OR ").push(*expr).push(" NOT ILIKE ");
                    qb.push_bind(pattern.clone()).push(r" ESCAPE '\')");
                } else {
                    qb.push(*expr).push(" ILIKE ");
                    qb.push_bind(pattern.clone()).push(r" ESCAPE '\'");
                }
            }
            Condition::Empty { expr, text, negate } => match (text, negate) {
                (true, false) => {
                    qb.push("(").push(*expr).push(" IS NULL OR ").push(*expr).push(" = '')");
                }
                (true, true) => {
                    qb.push("(").push(*expr).push(" IS NOT NULL AND ").push(*expr).push(" <> '')");
                }
                (false, false) => {
                    qb.push(*expr).push(" IS NULL");
                }
                (false, true) => {
                    qb.push(*expr).push(" IS NOT NULL");
                }
            },
            Condition::List {
                expr,
                values,
                negate,
            } => {
                qb.push(*expr).push(if *negate { " NOT IN (" } else { " IN (" });
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        qb.push(", ");
                    }
                    value.clone().push(qb);
                }
                qb.push(")");
            }
        }
    }
}

/// A search request validated against a [`SearchConfig`]
#[derive(Debug, Clone)]
pub struct SearchQuery {
    config: SearchConfig,
    search: Option<String>,
    conditions: Vec<Condition>,
    order: Vec<(&'static str, SortDirection)>,
    page: u32,
    page_size: u32,
}

impl SearchQuery {
    /// Validates every column, operator, value and direction in the request
    ///
    /// # Errors
    ///
    /// Returns a [`SearchError`] naming the first offending field.
    pub fn new(config: &SearchConfig, request: &SearchRequest) -> Result<Self, SearchError> {
        let search = request
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", escape_like(s)));
        if search.is_some() && config.searchable_columns().next().is_none() {
            return Err(SearchError::InvalidSearchField(config.name));
        }

        let conditions = request
            .filter
            .iter()
            .flatten()
            .map(|spec| {
                let column = config
                    .column(&spec.column)
                    .ok_or_else(|| SearchError::InvalidFilterField(spec.column.clone()))?;
                Condition::build(column, spec.operator, &spec.raw_value())
            })
            .collect::<Result<Vec<_>, _>>()?;

        let order = request
            .sort
            .iter()
            .flatten()
            .map(|spec| {
                let column = config
                    .column(&spec.column)
                    .filter(|c| c.sortable)
                    .ok_or_else(|| SearchError::InvalidSortField(spec.column.clone()))?;
                Ok((column.expr, spec.direction.parse::<SortDirection>()?))
            })
            .collect::<Result<Vec<_>, SearchError>>()?;

        Ok(Self {
            config: *config,
            search,
            conditions,
            order,
            page: request.page.max(1),
            page_size: request.page_size.clamp(1, 100),
        })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }

    fn push_from_where(&self, qb: &mut QueryBuilder<'static, Postgres>, scope: Option<&ScopedPredicate>) {
        qb.push(" FROM ").push(self.config.from);

        let mut first = true;
        let mut clause = |qb: &mut QueryBuilder<'static, Postgres>| {
            qb.push(if first { " WHERE " } else { " AND " });
            first = false;
        };

        if let Some(scope) = scope {
            clause(qb);
            scope.push(qb);
        }

        if let Some(pattern) = &self.search {
            clause(qb);
            qb.push("(");
            for (i, column) in self.config.searchable_columns().enumerate() {
                if i > 0 {
                    qb.push(" OR ");
                }
                qb.push(column.expr).push(" ILIKE ");
                qb.push_bind(pattern.clone()).push(r" ESCAPE '\'");
            }
            qb.push(")");
        }

        for condition in &self.conditions {
            clause(qb);
            condition.push(qb);
        }
    }

    /// `SELECT COUNT(*)` over every matching row
    pub fn count_query(&self, scope: Option<&ScopedPredicate>) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*)");
        self.push_from_where(&mut qb, scope);
        qb
    }

    /// Ordered, paginated `SELECT` for the requested page
    pub fn page_query(&self, scope: Option<&ScopedPredicate>) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("SELECT ");
        qb.push(self.config.select);
        self.push_from_where(&mut qb, scope);

        let mut order = self.order.clone();
        // Unique tie-breaker keeps pages stable over equal sort keys
        if !order.iter().any(|(expr, _)| *expr == self.config.default_sort) {
            order.push((self.config.default_sort, SortDirection::Asc));
        }

        qb.push(" ORDER BY ");
        for (i, (expr, direction)) in order.iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            qb.push(*expr).push(" ").push(direction.as_sql());
        }

        qb.push(" LIMIT ").push_bind(i64::from(self.page_size));
        qb.push(" OFFSET ").push_bind(self.offset());
        qb
    }

    /// Runs the count and page queries
    pub async fn fetch_page<T>(
        &self,
        pool: &PgPool,
        scope: Option<&ScopedPredicate>,
    ) -> Result<SearchResponse<T>, SearchError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let total: i64 = self
            .count_query(scope)
            .build_query_scalar()
            .fetch_one(pool)
            .await?;

        let mut page_query = self.page_query(scope);
        tracing::debug!(listing = self.config.name, sql = page_query.sql(), "Executing search query");
        let items = page_query.build_query_as::<T>().fetch_all(pool).await?;

        Ok(SearchResponse::new(items, total, self.page, self.page_size))
    }
}
