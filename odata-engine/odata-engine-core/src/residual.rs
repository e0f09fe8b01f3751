//! Query operators applied in memory to what a repository returned.
//!
//! All functions keep the sub-sequence (paging) information of their input.

use std::cmp::Ordering;

use odata_runtime::{
    expr::{CompiledLambda, Lambda},
    query::{
        order::{Direction, OrderClause},
        projection::Projection,
    },
    sequence::Sequence,
    value::Value,
};
use tracing::trace;

use crate::domain_error::{DomainError, DomainErrorKind, DomainResult};

pub fn filter(sequence: Sequence<Value>, predicate: &Lambda) -> DomainResult<Sequence<Value>> {
    let predicate = predicate.compile();
    let (elements, sub_seq) = sequence.split();

    let output = Sequence::from_parts(
        elements
            .into_iter()
            .filter_map(|element| match predicate.test(&element) {
                Ok(true) => Some(Ok(element)),
                Ok(false) => None,
                Err(error) => Some(Err(error)),
            })
            .collect::<Result<_, _>>()?,
        sub_seq,
    );

    trace!("filter kept {} elements", output.len());
    Ok(output)
}

pub fn skip(sequence: Sequence<Value>, count: usize) -> Sequence<Value> {
    let (elements, sub_seq) = sequence.split();
    Sequence::from_parts(elements.into_iter().skip(count).collect(), sub_seq)
}

pub fn take(sequence: Sequence<Value>, count: usize) -> Sequence<Value> {
    let (elements, sub_seq) = sequence.split();
    Sequence::from_parts(elements.into_iter().take(count).collect(), sub_seq)
}

/// Map the compiled projection over each element
pub fn project(sequence: Sequence<Value>, projection: &Projection) -> DomainResult<Sequence<Value>> {
    let lambda = projection.lambda.compile();
    let (elements, sub_seq) = sequence.split();

    let output = elements
        .into_iter()
        .map(|element| lambda.call(&element))
        .collect::<Result<_, _>>()?;

    Ok(Sequence::from_parts(output, sub_seq))
}

/// The ordering established by the order clauses applied so far.
///
/// `OrderBy` starts a new ordering, `ThenBy` refines the current one.
/// Sorting is stable, so elements with equal keys keep their relative order.
#[derive(Default)]
pub struct OrderChain {
    keys: Vec<(Direction, CompiledLambda)>,
}

impl OrderChain {
    pub fn apply(
        &mut self,
        sequence: Sequence<Value>,
        clause: &OrderClause,
    ) -> DomainResult<Sequence<Value>> {
        if !clause.method.is_then() {
            self.keys.clear();
        }
        self.keys
            .push((clause.method.direction(), clause.key_selector.compile()));

        trace!("{} over {} keys", clause.method, self.keys.len());
        self.sort(sequence)
    }

    fn sort(&self, sequence: Sequence<Value>) -> DomainResult<Sequence<Value>> {
        let (elements, sub_seq) = sequence.split();

        let mut decorated = elements
            .into_iter()
            .map(|element| -> DomainResult<_> {
                let keys = self
                    .keys
                    .iter()
                    .map(|(_, selector)| selector.call(&element))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((keys, element))
            })
            .collect::<DomainResult<Vec<_>>>()?;

        let mut cmp_error: Option<DomainError> = None;

        decorated.sort_by(|(a, _), (b, _)| {
            for ((direction, _), (a, b)) in self.keys.iter().zip(a.iter().zip(b)) {
                match compare(a, b) {
                    Ok(Ordering::Equal) => continue,
                    Ok(ordering) => return direction.reorder(ordering),
                    Err(error) => {
                        cmp_error.get_or_insert(error);
                        return Ordering::Equal;
                    }
                }
            }
            Ordering::Equal
        });

        if let Some(error) = cmp_error {
            return Err(error);
        }

        Ok(Sequence::from_parts(
            decorated.into_iter().map(|(_, element)| element).collect(),
            sub_seq,
        ))
    }
}

fn compare(a: &Value, b: &Value) -> DomainResult<Ordering> {
    a.compare(b)
        .ok_or_else(|| DomainErrorKind::Incomparable(a.kind_name(), b.kind_name()).into_error())
}
