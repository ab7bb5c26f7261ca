//! Query constraints and their compiled form.
//!
//! [`QueryFilter`] is the mutable set of constraints a query builder
//! accumulates. [`QueryFilter::compile`] turns it into a [`QuerySpec`]: a
//! [`Selection`] (the `WHERE` part), an optional [`OrderBy`] and an optional
//! limit. Clause order in the selection is fixed regardless of the order in
//! which constraints were set:
//!
//! 1. `id BETWEEN from AND to` when both id bounds are set
//! 2. `type = t` when a type is set
//! 3. `created BETWEEN from AND to` when both time bounds are non-negative
//!
//! No clause means "match all". That is an absent predicate, not an
//! always-true expression, so engines can skip filtering altogether.
//!
//! Id ranges compare strings lexicographically, even when ids look numeric:
//! `"10"` sorts before `"9"`.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Column, Direction, Row};

/// Sentinel for an unset creation-time bound.
pub const UNSET_TIME: i64 = -1;

/// One predicate of a selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum Clause {
    /// Primary-key point lookup.
    IdEquals { id: String },
    /// Inclusive lexicographic id range.
    IdBetween { from: String, to: String },
    /// Exact match on the type column.
    TypeEquals { record_type: String },
    /// Inclusive creation-time range.
    CreatedBetween { from: i64, to: i64 },
}

impl Clause {
    /// Evaluates the clause against a row.
    #[must_use]
    pub fn matches(&self, row: &Row) -> bool {
        match self {
            Clause::IdEquals { id } => row.id == *id,
            Clause::IdBetween { from, to } => {
                row.id.as_str() >= from.as_str() && row.id.as_str() <= to.as_str()
            }
            Clause::TypeEquals { record_type } => {
                row.record_type.as_deref() == Some(record_type.as_str())
            }
            Clause::CreatedBetween { from, to } => row.created >= *from && row.created <= *to,
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Clause::IdEquals { id } => write!(f, "({} = '{id}')", Column::Id),
            Clause::IdBetween { from, to } => {
                write!(f, "({} BETWEEN '{from}' AND '{to}')", Column::Id)
            }
            Clause::TypeEquals { record_type } => {
                write!(f, "({} = '{record_type}')", Column::Type)
            }
            Clause::CreatedBetween { from, to } => {
                write!(f, "({} BETWEEN '{from}' AND '{to}')", Column::Created)
            }
        }
    }
}

/// Conjunction of clauses. Empty means "match all".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selection {
    clauses: Vec<Clause>,
}

impl Selection {
    /// The absent predicate: every row matches.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Selection of the single row with primary key `id`.
    #[must_use]
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            clauses: vec![Clause::IdEquals { id: id.into() }],
        }
    }

    /// Returns `true` when the selection has no predicate.
    #[must_use]
    pub fn is_all(&self) -> bool {
        self.clauses.is_empty()
    }

    #[must_use]
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Returns `true` if every clause matches the row.
    #[must_use]
    pub fn matches(&self, row: &Row) -> bool {
        self.clauses.iter().all(|clause| clause.matches(row))
    }

    fn push(&mut self, clause: Clause) {
        self.clauses.push(clause);
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                f.write_str(" AND ")?;
            }
            write!(f, "{clause}")?;
        }
        Ok(())
    }
}

/// Sort specification. Only built when the direction is not `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: Column,
    pub direction: Direction,
}

impl OrderBy {
    /// Compares two rows according to this ordering.
    #[must_use]
    pub fn compare(&self, a: &Row, b: &Row) -> Ordering {
        let ordering = self.column.compare(a, b);
        match self.direction {
            Direction::Desc => ordering.reverse(),
            Direction::Asc | Direction::None => ordering,
        }
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.column, self.direction)
    }
}

/// Compiled selection, order and limit, ready for a storage engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub selection: Selection,
    pub order: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl QuerySpec {
    /// Filters, sorts and truncates `rows` in memory.
    ///
    /// For engines without native query support. The sort is stable, so rows
    /// that compare equal keep the order in which `rows` yielded them.
    pub fn apply<I>(&self, rows: I) -> Vec<Row>
    where
        I: IntoIterator<Item = Row>,
    {
        let matching = rows.into_iter().filter(|row| self.selection.matches(row));

        let Some(order) = self.order else {
            return match self.limit {
                Some(limit) => matching.take(limit).collect(),
                None => matching.collect(),
            };
        };

        let mut rows: Vec<Row> = matching.collect();
        rows.sort_by(|a, b| order.compare(a, b));
        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }
        rows
    }
}

/// Mutable constraint state of a query builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFilter {
    pub id_from: Option<String>,
    pub id_to: Option<String>,
    pub record_type: Option<String>,
    /// Lower creation-time bound; negative means unset.
    pub created_from: i64,
    /// Upper creation-time bound; negative means unset.
    pub created_to: i64,
    pub order_column: Option<Column>,
    pub direction: Direction,
    pub limit: Option<usize>,
}

impl Default for QueryFilter {
    fn default() -> Self {
        Self {
            id_from: None,
            id_to: None,
            record_type: None,
            created_from: UNSET_TIME,
            created_to: UNSET_TIME,
            order_column: None,
            direction: Direction::None,
            limit: None,
        }
    }
}

impl QueryFilter {
    /// Restores every constraint to its default.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Returns `true` if no constraint, order or limit is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Builds the selection alone.
    #[must_use]
    pub fn selection(&self) -> Selection {
        let mut selection = Selection::all();

        if let (Some(from), Some(to)) = (&self.id_from, &self.id_to) {
            selection.push(Clause::IdBetween {
                from: from.clone(),
                to: to.clone(),
            });
        }

        if let Some(record_type) = &self.record_type {
            selection.push(Clause::TypeEquals {
                record_type: record_type.clone(),
            });
        }

        if self.created_from >= 0 && self.created_to >= 0 {
            selection.push(Clause::CreatedBetween {
                from: self.created_from,
                to: self.created_to,
            });
        }

        selection
    }

    /// Builds the ordering, if both a column and a real direction are set.
    #[must_use]
    pub fn order(&self) -> Option<OrderBy> {
        match (self.order_column, self.direction) {
            (Some(column), direction) if direction != Direction::None => {
                Some(OrderBy { column, direction })
            }
            _ => None,
        }
    }

    /// Compiles the constraints into a [`QuerySpec`].
    #[must_use]
    pub fn compile(&self) -> QuerySpec {
        let spec = QuerySpec {
            selection: self.selection(),
            order: self.order(),
            limit: self.limit,
        };
        tracing::trace!(
            selection = %spec.selection,
            order = ?spec.order,
            limit = ?spec.limit,
            "compiled query filter"
        );
        spec
    }
}
