use std::{cmp::Ordering, fmt::Display};

use serde::{Deserialize, Serialize};

use crate::expr::Lambda;

#[derive(Clone, Copy, Eq, PartialEq, Default, Serialize, Deserialize, Debug)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

impl Direction {
    /// Re-order an [Ordering] by this direction
    pub fn reorder(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Ascending => ordering,
            Self::Descending => ordering.reverse(),
        }
    }
}

/// The ordering operators of the query surface
#[derive(Clone, Copy, Eq, PartialEq, Serialize, Deserialize, Debug)]
pub enum OrderMethod {
    OrderBy,
    OrderByDescending,
    ThenBy,
    ThenByDescending,
}

impl OrderMethod {
    pub fn direction(self) -> Direction {
        match self {
            Self::OrderBy | Self::ThenBy => Direction::Ascending,
            Self::OrderByDescending | Self::ThenByDescending => Direction::Descending,
        }
    }

    /// Whether this method refines a previously established ordering
    pub fn is_then(self) -> bool {
        matches!(self, Self::ThenBy | Self::ThenByDescending)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::OrderBy => "OrderBy",
            Self::OrderByDescending => "OrderByDescending",
            Self::ThenBy => "ThenBy",
            Self::ThenByDescending => "ThenByDescending",
        }
    }
}

impl Display for OrderMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize, Debug)]
pub struct OrderClause {
    pub method: OrderMethod,
    pub key_selector: Lambda,
}

/// Order clauses of an operation.
///
/// Clauses are pushed outermost operator first, so the primary `OrderBy`
/// ends up on top and is popped first.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize, Debug)]
pub struct OrderStack(Vec<OrderClause>);

impl OrderStack {
    pub fn push(&mut self, clause: OrderClause) {
        self.0.push(clause);
    }

    pub fn pop(&mut self) -> Option<OrderClause> {
        self.0.pop()
    }

    pub fn peek(&self) -> Option<&OrderClause> {
        self.0.last()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in pop order, top first
    pub fn iter(&self) -> impl Iterator<Item = &OrderClause> {
        self.0.iter().rev()
    }
}

impl FromIterator<OrderClause> for OrderStack {
    fn from_iter<I: IntoIterator<Item = OrderClause>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
