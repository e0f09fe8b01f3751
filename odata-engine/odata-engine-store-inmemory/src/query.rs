use odata_engine_core::{
    DomainResult, RepositoryBehavior,
    residual::{self, OrderChain},
};
use odata_runtime::{
    query::operation::QueryOperation,
    sequence::{Sequence, SubSequence},
    value::Value,
};
use tracing::{debug, debug_span, trace};

use crate::{InMemoryRepository, cursor::Cursor};

impl InMemoryRepository {
    pub(crate) fn get_all(
        &self,
        operation: &QueryOperation,
        behavior: RepositoryBehavior,
    ) -> DomainResult<Value> {
        let _entered = debug_span!("get_all", entity = %self.entity_type).entered();

        let sequence = self.entities.read().iter().cloned().collect();
        self.query(sequence, operation, behavior)
    }

    pub(crate) fn get_one(&self, operation: &QueryOperation) -> DomainResult<Value> {
        let Some(keys) = operation.keys() else {
            return Ok(Value::Null);
        };

        let entities = self.entities.read();
        let found = entities.iter().find(|entity| {
            keys.iter()
                .all(|(key, value)| property_text(entity, key).as_deref() == Some(value))
        });

        debug!("get one of {} by {keys:?}: {}", self.entity_type, found.is_some());
        Ok(found.cloned().unwrap_or_default())
    }

    pub(crate) fn count_all(&self, operation: &QueryOperation) -> DomainResult<Value> {
        let sequence = self.entities.read().iter().cloned().collect();
        self.count(sequence, operation)
    }

    pub(crate) fn get_by_parent(
        &self,
        operation: &QueryOperation,
        foreign_key: &str,
        behavior: RepositoryBehavior,
    ) -> DomainResult<Value> {
        let _entered =
            debug_span!("get_by_parent", entity = %self.entity_type, foreign_key).entered();

        let sequence = self.children(operation, foreign_key);
        self.query(sequence, operation, behavior)
    }

    pub(crate) fn count_by_parent(
        &self,
        operation: &QueryOperation,
        foreign_key: &str,
    ) -> DomainResult<Value> {
        let sequence = self.children(operation, foreign_key);
        self.count(sequence, operation)
    }

    /// The entities whose foreign key refers to the parent selected by the operation.
    ///
    /// The parent key named like the foreign key is preferred over the first key.
    fn children(&self, operation: &QueryOperation, foreign_key: &str) -> Sequence<Value> {
        let parent_key = operation
            .keys()
            .and_then(|keys| keys.get(foreign_key))
            .or_else(|| operation.key());

        self.entities
            .read()
            .iter()
            .filter(|entity| {
                parent_key.is_some() && property_text(entity, foreign_key).as_deref() == parent_key
            })
            .cloned()
            .collect()
    }

    fn count(&self, sequence: Sequence<Value>, operation: &QueryOperation) -> DomainResult<Value> {
        let sequence = match &operation.filter {
            Some(filter) => residual::filter(sequence, filter)?,
            None => sequence,
        };

        Ok(Value::I64(sequence.len() as i64))
    }

    /// Apply the declared operators, then the page of the continuation token
    fn query(
        &self,
        mut sequence: Sequence<Value>,
        operation: &QueryOperation,
        behavior: RepositoryBehavior,
    ) -> DomainResult<Value> {
        if let Some(filter) = &operation.filter {
            if behavior.handles(RepositoryBehavior::HANDLES_FILTER) {
                sequence = residual::filter(sequence, filter)?;
            }
        }

        if behavior.handles(RepositoryBehavior::HANDLES_ORDER_BY) {
            let mut order_stack = operation.order_stack.clone();
            let mut order_chain = OrderChain::default();
            while let Some(clause) = order_stack.pop() {
                sequence = order_chain.apply(sequence, &clause)?;
            }
        }

        if operation.skip_count > 0 && behavior.handles(RepositoryBehavior::HANDLES_SKIP) {
            sequence = residual::skip(sequence, operation.skip_count);
        }

        if operation.top_count > 0 && behavior.handles(RepositoryBehavior::HANDLES_TOP) {
            sequence = residual::take(sequence, operation.top_count);
        }

        let sequence = match self.page_size {
            Some(page_size) => self.page(sequence, operation, page_size)?,
            None => sequence,
        };

        trace!("{} returns {} elements", self.name, sequence.len());
        Ok(Value::Sequence(sequence))
    }

    fn page(
        &self,
        sequence: Sequence<Value>,
        operation: &QueryOperation,
        page_size: usize,
    ) -> DomainResult<Sequence<Value>> {
        let offset = match &operation.continuation_token {
            Some(token) => Cursor::decode(token)?.offset,
            None => 0,
        };

        let total_len = sequence.len();
        let end = offset.saturating_add(page_size);
        let has_next = end < total_len;

        debug!("page {offset}..{end} of {total_len}");

        Ok(residual::take(residual::skip(sequence, offset), page_size).with_sub(SubSequence {
            next_token: has_next.then(|| Cursor { offset: end }.encode()),
            has_next,
            total_len: Some(total_len),
        }))
    }
}

pub(crate) fn property_text(entity: &Value, property: &str) -> Option<String> {
    entity
        .get(property)
        .filter(|value| !value.is_null())
        .map(Value::to_string)
}
