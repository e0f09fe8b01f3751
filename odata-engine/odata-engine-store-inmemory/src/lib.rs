#![forbid(unsafe_code)]

//! A repository keeping the entities of one entity type in memory.
//!
//! Serves the conventional `GetAll`, `GetOne` and `{Type}Count` methods, plus foreign
//! navigation getters and counters keyed by a foreign key property of the stored entities.
//! Writes arrive through `Save`, `Remove`, `CreateRelation` and `CreateDefaultEntity`.

use std::sync::Arc;

use arcstr::ArcStr;
use indexmap::IndexMap;
use odata_engine_core::{
    DomainError, DomainErrorKind, DomainResult, Repository, RepositoryBehavior,
    repository::{Arguments, MethodSignature, OperationParam},
    resolver::{NavigationVerb, collection_count_method_name, navigation_method_name},
    update,
};
use parking_lot::RwLock;
use odata_runtime::{schema::Schema, simple_type_name, value::Value};
use tracing::{debug, warn};

pub use cursor::{Cursor, CursorError};

mod cursor;
mod query;
mod write;


pub struct InMemoryRepository {
    name: String,
    entity_type: ArcStr,
    schema: Arc<Schema>,
    /// Properties identifying a stored entity
    key_properties: Vec<String>,
    entities: RwLock<Vec<Value>>,
    behavior: Option<RepositoryBehavior>,
    page_size: Option<usize>,
    methods: IndexMap<String, (MethodSignature, Method)>,
}

/// The operators a paged method applies before cutting the page
const PAGED: RepositoryBehavior = RepositoryBehavior::HANDLES_FILTER
    .union(RepositoryBehavior::HANDLES_ORDER_BY)
    .union(RepositoryBehavior::HANDLES_SKIP)
    .union(RepositoryBehavior::HANDLES_TOP);

/// What a registered method does.
#[derive(Clone, Debug)]
enum Method {
    GetAll,
    GetOne,
    CountAll,
    Navigation {
        verb: NavigationVerb,
        foreign_key: String,
    },
    Save,
    Remove,
    CreateRelation,
    CreateDefaultEntity,
}

impl InMemoryRepository {
    pub fn builder(schema: Arc<Schema>, entity_type: impl Into<ArcStr>) -> Builder {
        let entity_type = entity_type.into();
        Builder {
            name: format!("{}Repository", simple_type_name(&entity_type)),
            schema,
            entity_type,
            entities: vec![],
            behavior: None,
            page_size: None,
            navigations: vec![],
        }
    }

    pub fn entity_type(&self) -> &ArcStr {
        &self.entity_type
    }

    pub fn len(&self) -> usize {
        self.entities.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.read().is_empty()
    }

    /// A snapshot of the stored entities
    pub fn entities(&self) -> Vec<Value> {
        self.entities.read().clone()
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }
}

impl Repository for InMemoryRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn behavior(&self) -> Option<RepositoryBehavior> {
        self.behavior
    }

    fn method(&self, name: &str) -> Option<&MethodSignature> {
        self.methods.get(name).map(|(signature, _)| signature)
    }

    fn invoke(&self, signature: &MethodSignature, arguments: Arguments<'_>) -> DomainResult<Value> {
        let Some((_, method)) = self.methods.get(&signature.name) else {
            return Err(DomainError::data_store(format!(
                "method {} is not registered on {}",
                signature.name, self.name
            )));
        };
        let entity = |index: usize| {
            arguments.entity(index).ok_or_else(|| {
                DomainError::data_store(format!("{} expects an entity argument", signature.name))
            })
        };

        match method {
            Method::Save => return self.save(entity(0)?),
            Method::Remove => return self.remove(entity(0)?),
            Method::CreateRelation => return self.create_relation(entity(0)?, entity(1)?),
            Method::CreateDefaultEntity => return Ok(self.create_default_entity()),
            _ => {}
        }

        let Some(operation) = arguments.operation() else {
            return Err(DomainError::data_store(format!(
                "{} expects the operation as argument",
                signature.name
            )));
        };
        let behavior = self.behavior_of(signature);

        match method {
            Method::GetAll => self.get_all(operation, behavior),
            Method::GetOne => self.get_one(operation),
            Method::CountAll => self.count_all(operation),
            Method::Navigation {
                verb: NavigationVerb::Get,
                foreign_key,
            } => self.get_by_parent(operation, foreign_key, behavior),
            Method::Navigation {
                verb: NavigationVerb::Count,
                foreign_key,
            } => self.count_by_parent(operation, foreign_key),
            Method::Save | Method::Remove | Method::CreateRelation | Method::CreateDefaultEntity => {
                Ok(Value::Null)
            }
        }
    }
}

/// A foreign navigation from a parent entity type into the stored entities
struct Navigation {
    parent_type: ArcStr,
    property: String,
    foreign_key: String,
}

pub struct Builder {
    name: String,
    schema: Arc<Schema>,
    entity_type: ArcStr,
    entities: Vec<Value>,
    behavior: Option<RepositoryBehavior>,
    page_size: Option<usize>,
    navigations: Vec<Navigation>,
}

impl Builder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn entities(mut self, entities: impl IntoIterator<Item = Value>) -> Self {
        self.entities.extend(entities);
        self
    }

    /// Declare the operators applied by the repository itself
    pub fn behavior(mut self, behavior: RepositoryBehavior) -> Self {
        self.behavior = Some(behavior);
        self
    }

    /// Page `GetAll` and navigation results, continued through cursor tokens.
    ///
    /// Paged methods apply filter, order, skip and top themselves.
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size).filter(|size| *size > 0);
        self
    }

    /// Serve the foreign navigation `parent_type.property`.
    ///
    /// A stored entity belongs to the parent whose key equals its `foreign_key` property.
    pub fn navigation_from(
        mut self,
        parent_type: impl Into<ArcStr>,
        property: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        self.navigations.push(Navigation {
            parent_type: parent_type.into(),
            property: property.into(),
            foreign_key: foreign_key.into(),
        });
        self
    }

    pub fn build(self) -> DomainResult<InMemoryRepository> {
        let type_info = self.schema.find_type(&self.entity_type).ok_or_else(|| {
            DomainErrorKind::EntityTypeNotFound(self.entity_type.to_string()).into_error()
        })?;

        for entity in &self.entities {
            match entity.type_name() {
                Some(type_name) if *type_name == self.entity_type => {}
                Some(type_name) => {
                    return Err(DomainErrorKind::ElementTypeMismatch {
                        expected: self.entity_type.to_string(),
                        actual: type_name.to_string(),
                    }
                    .into_error());
                }
                None => return Err(DomainErrorKind::NotAnEntity(entity.kind_name()).into_error()),
            }
        }

        let mut methods = IndexMap::new();
        let mut register = |signature: MethodSignature, method: Method| {
            methods.insert(signature.name.clone(), (signature, method));
        };

        let paged_behavior = self
            .page_size
            .map(|_| self.behavior.unwrap_or(RepositoryBehavior::empty()) | PAGED);

        let mut get_all = MethodSignature::new("GetAll").with_operation_param(OperationParam::Query);
        if let Some(behavior) = paged_behavior {
            get_all = get_all.with_behavior(behavior);
        }
        register(get_all, Method::GetAll);
        register(
            MethodSignature::new("GetOne").with_operation_param(OperationParam::SelectOne),
            Method::GetOne,
        );
        if let Some(count_method) = collection_count_method_name(&self.schema, &type_info.full_name)
        {
            // counts are final, the filter is always applied
            register(
                MethodSignature::new(count_method)
                    .with_operation_param(OperationParam::Query)
                    .with_behavior(RepositoryBehavior::HANDLES_FILTER),
                Method::CountAll,
            );
        }

        for navigation in &self.navigations {
            let property = self
                .schema
                .property(&navigation.parent_type, &navigation.property)
                .ok_or_else(|| {
                    DomainErrorKind::NavigationPropertyNotFound {
                        type_name: navigation.parent_type.to_string(),
                        property: navigation.property.clone(),
                    }
                    .into_error()
                })?;

            let markers = [
                (
                    NavigationVerb::Get,
                    &property.foreign,
                    paged_behavior.or(self.behavior),
                ),
                (
                    NavigationVerb::Count,
                    &property.foreign_count,
                    Some(RepositoryBehavior::HANDLES_FILTER),
                ),
            ];
            let mut served = false;

            for (verb, marker, behavior) in markers {
                let Some(marker) = marker else {
                    continue;
                };
                let method_name =
                    navigation_method_name(verb, marker, &property.name, &navigation.parent_type);
                let mut signature = MethodSignature::new(method_name)
                    .with_operation_param(OperationParam::SelectMany);
                if let Some(behavior) = behavior {
                    signature = signature.with_behavior(behavior);
                }

                register(
                    signature,
                    Method::Navigation {
                        verb,
                        foreign_key: navigation.foreign_key.clone(),
                    },
                );
                served = true;
            }

            if !served {
                warn!(
                    "{}.{} is not a foreign navigation",
                    navigation.parent_type, navigation.property
                );
            }
        }

        register(
            MethodSignature::new(update::SAVE).with_entity_param(),
            Method::Save,
        );
        register(
            MethodSignature::new(update::REMOVE).with_entity_param(),
            Method::Remove,
        );
        register(
            MethodSignature::new(update::CREATE_RELATION)
                .with_entity_param()
                .with_entity_param(),
            Method::CreateRelation,
        );
        register(
            MethodSignature::new(update::CREATE_DEFAULT_ENTITY),
            Method::CreateDefaultEntity,
        );

        let key_properties = match type_info.declared_keys() {
            Some(keys) => keys.to_vec(),
            None => type_info
                .properties
                .keys()
                .filter(|name| type_info.is_key_property(name))
                .cloned()
                .collect(),
        };

        debug!(
            "{} serves {} entities of {} through {:?}",
            self.name,
            self.entities.len(),
            self.entity_type,
            methods.keys().collect::<Vec<_>>()
        );

        Ok(InMemoryRepository {
            name: self.name,
            entity_type: self.entity_type,
            schema: self.schema.clone(),
            key_properties,
            entities: RwLock::new(self.entities),
            behavior: self.behavior,
            page_size: self.page_size,
            methods,
        })
    }
}
