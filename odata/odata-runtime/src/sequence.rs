use serde::{Deserialize, Serialize};
use thin_vec::ThinVec;

/// A materialized sequence of elements.
///
/// A sequence may be a page of a larger sequence, in which case
/// it carries [SubSequence] information.
#[derive(Clone, PartialEq, Serialize, Deserialize, Debug)]
pub struct Sequence<T> {
    /// The elements of this sequence
    pub(crate) elements: ThinVec<T>,
    /// The subsequence information, if any.
    /// If this is None, the sequence is considered complete.
    pub(crate) sub_seq: Option<Box<SubSequence>>,
}

impl<T> Default for Sequence<T> {
    fn default() -> Self {
        Self {
            elements: Default::default(),
            sub_seq: None,
        }
    }
}

impl<T> Sequence<T> {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            elements: ThinVec::with_capacity(cap),
            sub_seq: None,
        }
    }

    pub fn with_sub(self, sub: SubSequence) -> Self {
        Self {
            elements: self.elements,
            sub_seq: Some(Box::new(sub)),
        }
    }

    pub fn push(&mut self, element: T) {
        self.elements.push(element);
    }

    pub fn extend(&mut self, iter: impl IntoIterator<Item = T>) {
        self.elements.extend(iter);
    }

    pub fn elements(&self) -> &[T] {
        &self.elements
    }

    pub fn elements_mut(&mut self) -> &mut [T] {
        &mut self.elements
    }

    pub fn into_elements(self) -> ThinVec<T> {
        self.elements
    }

    pub fn into_first(self) -> Option<T> {
        self.elements.into_iter().next()
    }

    pub fn first(&self) -> Option<&T> {
        self.elements.first()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.elements.iter()
    }

    pub fn sub(&self) -> Option<&SubSequence> {
        self.sub_seq.as_deref()
    }

    pub fn split(self) -> (ThinVec<T>, Option<Box<SubSequence>>) {
        (self.elements, self.sub_seq)
    }

    /// Rebuild a sequence from parts produced by [Self::split].
    pub fn from_parts(elements: ThinVec<T>, sub_seq: Option<Box<SubSequence>>) -> Self {
        Self { elements, sub_seq }
    }
}

/// Create a new sequence that is not a subsequence.
impl<T> FromIterator<T> for Sequence<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            elements: iter.into_iter().collect(),
            sub_seq: None,
        }
    }
}

impl<T> From<ThinVec<T>> for Sequence<T> {
    fn from(value: ThinVec<T>) -> Self {
        Self {
            elements: value,
            sub_seq: None,
        }
    }
}

impl<T> From<Vec<T>> for Sequence<T> {
    fn from(value: Vec<T>) -> Self {
        value.into_iter().collect()
    }
}

impl<T> IntoIterator for Sequence<T> {
    type Item = T;
    type IntoIter = thin_vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a Sequence<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

#[derive(Clone, Serialize, PartialEq, Eq, Hash, Deserialize, Default, Debug)]
pub struct SubSequence {
    /// The continuation token for the page _following_ this subsequence
    pub next_token: Option<String>,
    /// Are there more items in the sequence _following_ the concrete subsequence?
    pub has_next: bool,
    /// Total number of elements in the sequence
    pub total_len: Option<usize>,
}

impl SubSequence {
    pub fn total_len(&self) -> Option<usize> {
        self.total_len
    }
}
