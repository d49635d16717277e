/// Column whitelists for searchable listings

use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

/// Value type of a column; drives filter value conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Text,
    Uuid,
    Boolean,
    Timestamp,
}

impl ColumnKind {
    pub fn name(&self) -> &'static str {
        match self {
            ColumnKind::Integer => "integer",
            ColumnKind::Text => "text",
            ColumnKind::Uuid => "uuid",
            ColumnKind::Boolean => "boolean",
            ColumnKind::Timestamp => "timestamp",
        }
    }
}

/// A column exposed to search requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    /// Name used in requests
    pub name: &'static str,

    /// SQL expression the name maps to, e.g. `o.email`
    pub expr: &'static str,

    pub kind: ColumnKind,

    /// Included in free-text search
    pub searchable: bool,

    pub sortable: bool,
}

impl Column {
    /// Filterable and sortable, not searchable
    pub const fn new(name: &'static str, expr: &'static str, kind: ColumnKind) -> Self {
        Self {
            name,
            expr,
            kind,
            searchable: false,
            sortable: true,
        }
    }

    pub const fn searchable(mut self) -> Self {
        self.searchable = true;
        self
    }

    pub const fn unsortable(mut self) -> Self {
        self.sortable = false;
        self
    }
}

/// Search configuration for one listing
#[derive(Debug, Clone, Copy)]
pub struct SearchConfig {
    /// Listing name used in error messages
    pub name: &'static str,

    /// `SELECT` list returned for each row
    pub select: &'static str,

    /// `FROM` clause including joins
    pub from: &'static str,

    /// Every column requests may reference; all are filterable
    pub columns: &'static [Column],

    /// Ordering used when the request has no sort
    pub default_sort: &'static str,
}

impl SearchConfig {
    pub fn column(&self, name: &str) -> Option<&'static Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn searchable_columns(&self) -> impl Iterator<Item = &'static Column> {
        self.columns.iter().filter(|c| c.searchable)
    }
}

/// Caller-scoped predicate appended to every search
///
/// `parts` are raw SQL fragments; `value` is bound between each consecutive
/// pair. `["(a = ", " OR b = ", ")"]` renders as `(a = $1 OR b = $2)` with
/// both parameters set to `value`.
#[derive(Debug, Clone, Copy)]
pub struct ScopedPredicate {
    pub parts: &'static [&'static str],
    pub value: Uuid,
}

impl ScopedPredicate {
    pub fn push(&self, qb: &mut QueryBuilder<'static, Postgres>) {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                qb.push_bind(self.value);
            }
            qb.push(*part);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLUMNS: &[Column] = &[
        Column::new("id", "t.id", ColumnKind::Integer),
        Column::new("name", "t.name", ColumnKind::Text).searchable(),
        Column::new("blob", "t.blob", ColumnKind::Text).unsortable(),
    ];

    const CONFIG: SearchConfig = SearchConfig {
        name: "things",
        select: "t.id, t.name",
        from: "things t",
        columns: COLUMNS,
        default_sort: "t.id",
    };

    #[test]
    fn test_column_lookup() {
        assert_eq!(CONFIG.column("name").map(|c| c.expr), Some("t.name"));
        assert!(CONFIG.column("t.name").is_none());
        assert!(!CONFIG.column("blob").unwrap().sortable);
        assert_eq!(CONFIG.searchable_columns().count(), 1);
    }

    #[test]
    fn test_scoped_predicate_binds_between_parts() {
        let predicate = ScopedPredicate {
            parts: &["(a = ", " OR b = ", ")"],
            value: Uuid::new_v4(),
        };
        let mut qb = QueryBuilder::new("SELECT 1 WHERE ");
        predicate.push(&mut qb);
        assert_eq!(qb.sql(), "SELECT 1 WHERE (a = $1 OR b = $2)");
    }
}
