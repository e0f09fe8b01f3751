use odata_engine_core::{DomainError, DomainErrorKind, DomainResult};
use odata_runtime::{schema::PropertyKind, value::Value};
use tracing::{debug, debug_span};

use crate::InMemoryRepository;

impl InMemoryRepository {
    /// Insert the entity, or replace the stored entity with the same key
    pub(crate) fn save(&self, entity: &Value) -> DomainResult<Value> {
        let _entered = debug_span!("save", entity = %self.entity_type).entered();
        self.check_type(entity)?;

        let mut entities = self.entities.write();
        match entities
            .iter_mut()
            .find(|stored| self.same_key(stored, entity))
        {
            Some(stored) => {
                debug!("update");
                *stored = entity.clone();
            }
            None => {
                debug!("insert");
                entities.push(entity.clone());
            }
        }

        Ok(Value::Null)
    }

    pub(crate) fn remove(&self, entity: &Value) -> DomainResult<Value> {
        let _entered = debug_span!("remove", entity = %self.entity_type).entered();
        self.check_type(entity)?;

        let mut entities = self.entities.write();
        let len = entities.len();
        entities.retain(|stored| !self.same_key(stored, entity));

        if entities.len() == len {
            debug!("nothing to remove");
        }

        Ok(Value::Null)
    }

    /// Relate `related` to the stored `parent` through the inline navigation of the parent
    /// whose target is the type of `related`.
    pub(crate) fn create_relation(&self, parent: &Value, related: &Value) -> DomainResult<Value> {
        let _entered = debug_span!("create_relation", entity = %self.entity_type).entered();
        self.check_type(parent)?;

        let Some(related_type) = related.type_name() else {
            return Err(DomainErrorKind::NotAnEntity(related.kind_name()).into_error());
        };
        let Some(type_info) = self.schema.find_type(&self.entity_type) else {
            return Err(DomainErrorKind::EntityTypeNotFound(self.entity_type.to_string()).into_error());
        };
        let Some((property, many)) = type_info
            .properties
            .values()
            .filter(|property| property.foreign.is_none())
            .find_map(|property| match &property.kind {
                PropertyKind::Navigation { target, many } if target == related_type => {
                    Some((property.name.as_str(), *many))
                }
                _ => None,
            })
        else {
            return Err(DomainError::data_store(format!(
                "{} has no navigation to {related_type}",
                self.entity_type
            )));
        };

        let mut entities = self.entities.write();
        let Some(stored) = entities
            .iter_mut()
            .find(|stored| self.same_key(stored, parent))
            .and_then(Value::as_struct_mut)
        else {
            return Err(DomainError::data_store(format!(
                "{} is not stored in {}",
                self.entity_type, self.name
            )));
        };

        let slot = stored.props.entry(property.to_string()).or_default();
        if !many {
            *slot = related.clone();
        } else if let Value::Sequence(sequence) = &mut *slot {
            sequence.push(related.clone());
        } else {
            *slot = Value::sequence([related.clone()]);
        }

        debug!("related {related_type} through {property}");
        Ok(Value::Null)
    }

    /// A new entity with every declared property unset
    pub(crate) fn create_default_entity(&self) -> Value {
        let properties = self
            .schema
            .find_type(&self.entity_type)
            .map(|type_info| type_info.properties.keys().cloned().collect::<Vec<_>>())
            .unwrap_or_default();

        Value::new_struct(
            self.entity_type.clone(),
            properties.into_iter().map(|name| (name, Value::Null)),
        )
    }

    fn check_type(&self, entity: &Value) -> DomainResult<()> {
        match entity.type_name() {
            Some(type_name) if *type_name == self.entity_type => Ok(()),
            Some(type_name) => Err(DomainErrorKind::ElementTypeMismatch {
                expected: self.entity_type.to_string(),
                actual: type_name.to_string(),
            }
            .into_error()),
            None => Err(DomainErrorKind::NotAnEntity(entity.kind_name()).into_error()),
        }
    }

    /// Entities match when every key property has the same non-null value
    fn same_key(&self, stored: &Value, entity: &Value) -> bool {
        !self.key_properties.is_empty()
            && self.key_properties.iter().all(|key| {
                matches!(
                    (stored.get(key), entity.get(key)),
                    (Some(a), Some(b)) if !a.is_null() && a == b
                )
            })
    }
}
