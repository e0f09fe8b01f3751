//! The contract between the query engine and the repositories serving entity types.

use std::{fmt::Display, sync::Arc};

use fnv::FnvHashMap;
use indexmap::IndexMap;
use odata_runtime::{
    query::operation::{OperationKind, QueryOperation},
    value::Value,
};
use serde::{Deserialize, Serialize};

use crate::domain_error::{DomainError, DomainResult};

bitflags::bitflags! {
    /// Which residual operators a repository (method) applies by itself.
    ///
    /// Operators not handled are applied by the engine after invocation.
    #[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default, Serialize, Deserialize, Debug)]
    pub struct RepositoryBehavior: u8 {
        const HANDLES_EVERYTHING = 0b00000001;
        const HANDLES_FILTER     = 0b00000010;
        const HANDLES_ORDER_BY   = 0b00000100;
        /// Informational, the projection is always applied by the engine
        const HANDLES_SELECT     = 0b00001000;
        const HANDLES_SKIP       = 0b00010000;
        const HANDLES_TOP        = 0b00100000;
    }
}

impl RepositoryBehavior {
    pub fn handles_everything(self) -> bool {
        self.contains(Self::HANDLES_EVERYTHING)
    }

    pub fn handles(self, flag: Self) -> bool {
        self.handles_everything() || self.contains(flag)
    }
}

/// A repository serving one entity type through named methods.
pub trait Repository {
    /// Name of the repository, used in diagnostics
    fn name(&self) -> &str;

    /// Type-level behavior
    fn behavior(&self) -> Option<RepositoryBehavior> {
        None
    }

    /// Look up a method by exact name
    fn method(&self, name: &str) -> Option<&MethodSignature>;

    /// Invoke a method previously returned by [Repository::method].
    fn invoke(&self, method: &MethodSignature, arguments: Arguments<'_>) -> DomainResult<Value>;

    /// The behavior in effect for a method.
    ///
    /// Method-level behavior overrides the type-level behavior, which overrides "handles nothing".
    fn behavior_of(&self, method: &MethodSignature) -> RepositoryBehavior {
        method
            .behavior
            .or_else(|| self.behavior())
            .unwrap_or_default()
    }
}

/// A [Repository] in an [Arc].
pub type ArcRepository = Arc<dyn Repository + Send + Sync>;

/// Finds the repository serving an entity type.
#[cfg_attr(feature = "unimock", unimock::unimock(api = RepositoryResolverMock))]
pub trait RepositoryResolver {
    /// Resolve by the full name of the entity type
    fn resolve(&self, type_full_name: &str) -> Option<ArcRepository>;
}

/// A [RepositoryResolver] backed by a closure.
pub struct ResolverFn<F>(pub F);

impl<F> RepositoryResolver for ResolverFn<F>
where
    F: Fn(&str) -> Option<ArcRepository>,
{
    fn resolve(&self, type_full_name: &str) -> Option<ArcRepository> {
        (self.0)(type_full_name)
    }
}

/// Repositories registered at startup, keyed by entity type full name.
#[derive(Default, Clone)]
pub struct RepositoryRegistry {
    repositories: FnvHashMap<String, ArcRepository>,
}

impl RepositoryRegistry {
    pub fn register(mut self, type_full_name: impl Into<String>, repository: ArcRepository) -> Self {
        self.repositories.insert(type_full_name.into(), repository);
        self
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }
}

impl RepositoryResolver for RepositoryRegistry {
    fn resolve(&self, type_full_name: &str) -> Option<ArcRepository> {
        self.repositories.get(type_full_name).cloned()
    }
}

/// What a resolved repository method is asked to do.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum Capability {
    GetAll,
    GetOne,
    CountAll,
    NavigationGetter,
    NavigationCounter,
}

impl Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::GetAll => "get all",
            Self::GetOne => "get one",
            Self::CountAll => "count all",
            Self::NavigationGetter => "navigation getter",
            Self::NavigationCounter => "navigation counter",
        };
        write!(f, "{name}")
    }
}

/// The declared shape of a repository method.
#[derive(Clone, PartialEq, Debug)]
pub struct MethodSignature {
    pub name: String,
    pub params: Vec<Param>,
    /// Method-level behavior, overriding the type-level behavior
    pub behavior: Option<RepositoryBehavior>,
}

impl MethodSignature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: vec![],
            behavior: None,
        }
    }

    /// Append a named text parameter
    pub fn with_param(mut self, name: impl Into<String>) -> Self {
        self.params.push(Param::Named(name.into()));
        self
    }

    /// Append a parameter receiving the whole operation
    pub fn with_operation_param(mut self, param: OperationParam) -> Self {
        self.params.push(Param::Operation(param));
        self
    }

    /// Append a parameter receiving an entity value
    pub fn with_entity_param(mut self) -> Self {
        self.params.push(Param::Entity);
        self
    }

    /// Whether the method takes exactly `count` entity values
    pub fn takes_entities(&self, count: usize) -> bool {
        self.params.len() == count && self.params.iter().all(|param| *param == Param::Entity)
    }

    pub fn with_behavior(mut self, behavior: RepositoryBehavior) -> Self {
        self.behavior = Some(behavior);
        self
    }
}

#[derive(Clone, PartialEq, Debug)]
pub enum Param {
    /// A text value bound by name from keys or context parameters
    Named(String),
    /// The operation itself
    Operation(OperationParam),
    /// An entity value written through the update context
    Entity,
}

/// The operation kinds a parameter can receive.
///
/// Operation kinds form a hierarchy: a compound operation is a select-many,
/// which is a select-one, which is a query.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum OperationParam {
    Query,
    SelectOne,
    SelectMany,
    Compound,
}

impl OperationParam {
    pub fn accepts(self, kind: &OperationKind) -> bool {
        match self {
            Self::Query => true,
            Self::SelectOne => !matches!(kind, OperationKind::Query),
            Self::SelectMany => matches!(
                kind,
                OperationKind::SelectMany(_) | OperationKind::Compound(_)
            ),
            Self::Compound => matches!(kind, OperationKind::Compound(_)),
        }
    }
}

/// Arguments bound for one method invocation.
#[derive(Clone, Debug)]
pub enum Arguments<'o> {
    /// The method has no parameters
    None,
    /// The method receives the operation
    Operation(&'o QueryOperation),
    /// One slot per declared parameter, in declaration order
    Values(Vec<Option<&'o str>>),
    /// Entity values of a write, in declaration order
    Entities(Vec<&'o Value>),
}

impl<'o> Arguments<'o> {
    pub fn operation(&self) -> Option<&'o QueryOperation> {
        match self {
            Self::Operation(operation) => Some(*operation),
            _ => None,
        }
    }

    pub fn values(&self) -> &[Option<&'o str>] {
        match self {
            Self::Values(values) => values,
            _ => &[],
        }
    }

    /// The value bound to the parameter at `index`
    pub fn value(&self, index: usize) -> Option<&'o str> {
        self.values().get(index).copied().flatten()
    }

    /// The entity bound to the parameter at `index`
    pub fn entity(&self, index: usize) -> Option<&'o Value> {
        match self {
            Self::Entities(entities) => entities.get(index).copied(),
            _ => None,
        }
    }
}

type MethodFn = Box<dyn Fn(Arguments<'_>) -> DomainResult<Value> + Send + Sync>;

/// A repository defined by a table of closures.
pub struct FnRepository {
    name: String,
    behavior: Option<RepositoryBehavior>,
    methods: IndexMap<String, (MethodSignature, MethodFn)>,
}

impl FnRepository {
    pub fn builder(name: impl Into<String>) -> FnRepositoryBuilder {
        FnRepositoryBuilder {
            repository: FnRepository {
                name: name.into(),
                behavior: None,
                methods: IndexMap::new(),
            },
        }
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }
}

pub struct FnRepositoryBuilder {
    repository: FnRepository,
}

impl FnRepositoryBuilder {
    pub fn behavior(mut self, behavior: RepositoryBehavior) -> Self {
        self.repository.behavior = Some(behavior);
        self
    }

    pub fn method(
        mut self,
        signature: MethodSignature,
        func: impl Fn(Arguments<'_>) -> DomainResult<Value> + Send + Sync + 'static,
    ) -> Self {
        self.repository
            .methods
            .insert(signature.name.clone(), (signature, Box::new(func)));
        self
    }

    pub fn build(self) -> FnRepository {
        self.repository
    }
}

impl Repository for FnRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn behavior(&self) -> Option<RepositoryBehavior> {
        self.behavior
    }

    fn method(&self, name: &str) -> Option<&MethodSignature> {
        self.methods.get(name).map(|(signature, _)| signature)
    }

    fn invoke(&self, method: &MethodSignature, arguments: Arguments<'_>) -> DomainResult<Value> {
        match self.methods.get(&method.name) {
            Some((_, func)) => func(arguments),
            None => Err(DomainError::data_store(format!(
                "method {} is not registered on {}",
                method.name, self.name
            ))),
        }
    }
}
