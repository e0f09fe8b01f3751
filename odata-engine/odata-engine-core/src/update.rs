//! Entity writes, tracked per request and dispatched to repository methods by name.
//!
//! The host reports the resources it creates, modifies, deletes and relates.
//! [UpdateContext::save_changes] hands the pending change to the repository of the entity type:
//!
//! | change | repository method |
//! |---|---|
//! | create or modify | `Save(entity)` |
//! | delete | `Remove(entity)` |
//! | add reference | `CreateRelation(entity, related)` |
//!
//! A repository without the method silently ignores the change.

use odata_runtime::{
    query::expression::QueryExpr,
    value::{Struct, Value},
};
use tracing::debug;

use crate::{
    domain_error::{DomainError, DomainErrorKind, DomainResult},
    provider::{QueryProvider, QueryResult, RequestContext},
    repository::{Arguments, MethodSignature, Param, Repository},
};

pub const SAVE: &str = "Save";
pub const REMOVE: &str = "Remove";
pub const CREATE_RELATION: &str = "CreateRelation";
pub const CREATE_DEFAULT_ENTITY: &str = "CreateDefaultEntity";
pub const CREATE_DEFAULT_COMPLEX_TYPE: &str = "CreateDefaultComplexType";

/// Key prefix of entities the host has not stored yet
pub const TEMPORARY_KEY_PREFIX: &str = "temp-";

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum ChangeKind {
    Create,
    Modify,
    Delete,
    AddReference,
}

/// The pending change of one request.
pub struct UpdateContext<'p> {
    provider: &'p QueryProvider,
    change: Option<ChangeKind>,
    entity: Option<Value>,
    related: Option<Value>,
}

impl<'p> UpdateContext<'p> {
    pub fn new(provider: &'p QueryProvider) -> Self {
        Self {
            provider,
            change: None,
            entity: None,
            related: None,
        }
    }

    pub fn change(&self) -> Option<ChangeKind> {
        self.change
    }

    /// The entity the pending change applies to
    pub fn entity(&self) -> Option<&Value> {
        self.entity.as_ref()
    }

    /// Look up the resource addressed by a select-one expression.
    ///
    /// A temporary key means the host is about to create the resource.
    pub fn get_resource(
        &mut self,
        expr: &QueryExpr,
        ctx: &RequestContext,
    ) -> DomainResult<Option<&Value>> {
        let Some(operation) = self.provider.parse(expr) else {
            return Ok(None);
        };
        let Some(key) = operation.as_select_one().map(|one| one.key().map(str::to_string)) else {
            return Ok(self.entity.as_ref());
        };

        self.entity = match self.provider.execute_operation(operation, ctx)? {
            QueryResult::Sequence(sequence) => sequence.into_first(),
            QueryResult::Null | QueryResult::Count(_) => None,
        };

        if key.is_some_and(|key| key.starts_with(TEMPORARY_KEY_PREFIX)) {
            self.change = Some(ChangeKind::Create);
        }

        Ok(self.entity.as_ref())
    }

    /// Create a default instance of an entity type or a complex type.
    ///
    /// Entities come from `CreateDefaultEntity` and become the pending entity.
    /// Complex values come from `CreateDefaultComplexType(typeName)`.
    /// Without those methods, a value with every declared property unset is created.
    /// Returns `None` when no repository serves the type.
    pub fn create_resource(&mut self, type_full_name: &str) -> DomainResult<Option<Value>> {
        let provider = self.provider;
        let Some(repository) = provider.repository_for(type_full_name) else {
            return Ok(None);
        };

        let schema = provider.schema();
        let is_entity = !schema.is_complex_type(type_full_name);

        let resource = if is_entity {
            invoke_if_exists(
                repository.as_ref(),
                CREATE_DEFAULT_ENTITY,
                |signature| signature.takes_entities(0),
                Arguments::None,
            )?
        } else {
            invoke_if_exists(
                repository.as_ref(),
                CREATE_DEFAULT_COMPLEX_TYPE,
                |signature| matches!(signature.params.as_slice(), [Param::Named(_)]),
                Arguments::Values(vec![Some(type_full_name)]),
            )?
        };
        self.change = Some(ChangeKind::Create);

        let resource = match resource {
            Some(resource) => resource,
            None => match schema.find_type(type_full_name) {
                Some(info) => Value::new_struct(
                    info.full_name.clone(),
                    info.properties.keys().map(|name| (name.as_str(), Value::Null)),
                ),
                None => {
                    return Err(
                        DomainErrorKind::EntityTypeNotFound(type_full_name.to_string())
                            .into_error(),
                    );
                }
            },
        };

        if is_entity {
            self.entity = Some(resource.clone());
        }

        debug!("created {type_full_name} resource");
        Ok(Some(resource))
    }

    pub fn delete_resource(&mut self, target: Value) {
        self.change = Some(ChangeKind::Delete);
        self.entity = target.wrap_into_sequence().into_first();
    }

    /// Mark the resource as modified, returning it unwrapped
    pub fn reset_resource(&mut self, resource: Value) -> Option<Value> {
        self.change = Some(ChangeKind::Modify);
        resource.wrap_into_sequence().into_first()
    }

    pub fn resolve_resource(&self, resource: Value) -> Option<Value> {
        resource.wrap_into_sequence().into_first()
    }

    /// Set a property of the pending entity
    pub fn set_value(&mut self, property: &str, value: Value) -> DomainResult<()> {
        self.change = Some(ChangeKind::Modify);
        let provider = self.provider;
        set_property(provider, self.entity_struct()?, property, value)
    }

    /// A property of the pending entity
    pub fn get_value(&self, property: &str) -> Option<&Value> {
        self.entity.as_ref()?.get(property)
    }

    /// Make `target` the pending entity, with `property` referring to `value`
    pub fn set_reference(
        &mut self,
        target: Value,
        property: &str,
        value: Value,
    ) -> DomainResult<()> {
        self.change = Some(ChangeKind::Modify);
        self.entity = target.wrap_into_sequence().into_first();
        let provider = self.provider;
        set_property(provider, self.entity_struct()?, property, value)
    }

    /// Relate `related` to `target` through a navigation property of `target`
    pub fn add_reference_to_collection(
        &mut self,
        target: Value,
        property: &str,
        related: Value,
    ) -> DomainResult<()> {
        let type_name = match &target {
            Value::Struct(target) => target.type_name.clone(),
            other => return Err(DomainErrorKind::NotAnEntity(other.kind_name()).into_error()),
        };
        let is_navigation = self
            .provider
            .schema()
            .property(&type_name, property)
            .is_some_and(|property| property.element_type().is_some());
        if !is_navigation {
            return Err(DomainErrorKind::NavigationPropertyNotFound {
                type_name: type_name.to_string(),
                property: property.to_string(),
            }
            .into_error());
        }

        self.change = Some(ChangeKind::AddReference);
        self.entity = Some(target);
        self.related = Some(related);
        Ok(())
    }

    /// Forget the pending change
    pub fn clear_changes(&mut self) {
        self.change = None;
        self.entity = None;
        self.related = None;
    }

    /// Dispatch the pending change to the repository of the pending entity.
    ///
    /// Repository errors are reported as service faults.
    pub fn save_changes(&mut self) -> DomainResult<()> {
        let Some(change) = self.change else {
            return Ok(());
        };
        let Some(entity) = &self.entity else {
            return Err(DomainErrorKind::NoPendingEntity.into_error());
        };
        let Some(type_name) = entity.type_name() else {
            return Err(DomainErrorKind::NotAnEntity(entity.kind_name()).into_error());
        };
        let Some(repository) = self.provider.repository_for(type_name) else {
            debug!("no repository for {type_name}, {change:?} ignored");
            return Ok(());
        };

        let (method, entities) = match change {
            ChangeKind::Create | ChangeKind::Modify => (SAVE, vec![entity]),
            ChangeKind::Delete => (REMOVE, vec![entity]),
            ChangeKind::AddReference => match &self.related {
                Some(related) => (CREATE_RELATION, vec![entity, related]),
                None => return Err(DomainErrorKind::NoPendingEntity.into_error()),
            },
        };
        let count = entities.len();

        invoke_if_exists(
            repository.as_ref(),
            method,
            |signature| signature.takes_entities(count),
            Arguments::Entities(entities),
        )
        .map_err(DomainError::into_service_fault)?;

        self.clear_changes();
        Ok(())
    }

    fn entity_struct(&mut self) -> DomainResult<&mut Struct> {
        match &mut self.entity {
            Some(Value::Struct(entity)) => Ok(&mut **entity),
            Some(other) => Err(DomainErrorKind::NotAnEntity(other.kind_name()).into_error()),
            None => Err(DomainErrorKind::NoPendingEntity.into_error()),
        }
    }
}

fn set_property(
    provider: &QueryProvider,
    entity: &mut Struct,
    property: &str,
    value: Value,
) -> DomainResult<()> {
    if provider.schema().property(&entity.type_name, property).is_none() {
        return Err(DomainErrorKind::PropertyNotFound {
            type_name: entity.type_name.to_string(),
            property: property.to_string(),
        }
        .into_error());
    }

    entity.props.insert(property.to_string(), value);
    Ok(())
}

/// Invoke the named method when the repository has it with a matching signature.
///
/// A null result is reported as no value.
fn invoke_if_exists(
    repository: &dyn Repository,
    method: &str,
    signature_matches: impl Fn(&MethodSignature) -> bool,
    arguments: Arguments<'_>,
) -> DomainResult<Option<Value>> {
    let Some(signature) = repository
        .method(method)
        .filter(|signature| signature_matches(signature))
    else {
        debug!("{} has no {method} method", repository.name());
        return Ok(None);
    };

    debug!("invoking {}.{method}", repository.name());
    let output = repository.invoke(signature, arguments)?;
    Ok(Some(output).filter(|output| !output.is_null()))
}
