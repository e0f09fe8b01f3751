//! Resolution of the repository, method and arguments serving an operation.

use arcstr::ArcStr;
use odata_runtime::{
    query::operation::QueryOperation,
    schema::{ForeignMarker, PropertyDef, Schema},
    simple_type_name,
};
use tracing::debug;

use crate::{
    domain_error::{DomainErrorKind, DomainResult},
    repository::{
        Arguments, ArcRepository, Capability, MethodSignature, Param, Repository,
        RepositoryBehavior, RepositoryResolver,
    },
};

/// Verb of a conventional navigation method name
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum NavigationVerb {
    Get,
    Count,
}

impl NavigationVerb {
    fn as_str(self) -> &'static str {
        match self {
            Self::Get => "Get",
            Self::Count => "Count",
        }
    }
}

/// The method name of a foreign navigation getter or counter.
///
/// The explicit method of the marker wins, otherwise `{Verb}{PropertyAlias}By{ParentAlias}`.
pub fn navigation_method_name(
    verb: NavigationVerb,
    marker: &ForeignMarker,
    property_name: &str,
    parent_type_name: &str,
) -> String {
    if let Some(method) = marker.repository_method.as_deref().filter(|m| !m.is_empty()) {
        return method.to_string();
    }

    format!(
        "{verb}{property}By{parent}",
        verb = verb.as_str(),
        property = marker.property_alias.as_deref().unwrap_or(property_name),
        parent = marker
            .parent_alias
            .as_deref()
            .unwrap_or(simple_type_name(parent_type_name)),
    )
}

/// The method name counting a whole collection of the given type, if the type counts itself.
pub fn collection_count_method_name(schema: &Schema, type_full_name: &str) -> Option<String> {
    let info = schema.find_type(type_full_name)?;
    let collection_count = info.collection_count.as_ref()?;

    Some(match collection_count.repository_method.as_deref() {
        Some(method) if !method.is_empty() => method.to_string(),
        _ => format!("{}Count", info.name),
    })
}

/// A method found on a repository
#[derive(Clone, Copy, Debug)]
pub struct ResolvedMethod<'r> {
    pub signature: &'r MethodSignature,
    pub capability: Capability,
}

pub struct OperationResolver<'a> {
    operation: &'a QueryOperation,
    schema: &'a Schema,
}

impl<'a> OperationResolver<'a> {
    pub fn for_operation(operation: &'a QueryOperation, schema: &'a Schema) -> Self {
        Self { operation, schema }
    }

    /// Full name of the entity type whose repository serves the operation.
    ///
    /// Foreign navigations are served by the repository of the navigation target.
    pub fn repository_type(&self) -> &'a ArcStr {
        if let Some(property) = self.navigation_property() {
            let counter = self.operation.is_count_request && property.foreign_count.is_some();
            if counter || property.foreign.is_some() {
                if let Some(target) = property.element_type() {
                    return target;
                }
            }
        }

        &self.operation.of_type
    }

    pub fn repository(&self, resolver: &dyn RepositoryResolver) -> DomainResult<ArcRepository> {
        let repository_type = self.repository_type();

        match resolver.resolve(repository_type) {
            Some(repository) => {
                debug!(
                    "resolved repository {} for {repository_type}",
                    repository.name()
                );
                Ok(repository)
            }
            None => Err(DomainErrorKind::RepositoryNotFound(
                simple_type_name(repository_type).to_string(),
            )
            .into_error()),
        }
    }

    pub fn method<'r>(&self, repository: &'r dyn Repository) -> DomainResult<ResolvedMethod<'r>> {
        let (method_name, capability) = self.method_name(repository);

        match repository.method(&method_name) {
            Some(signature) => {
                debug!("resolved method {method_name} ({capability})");
                Ok(ResolvedMethod {
                    signature,
                    capability,
                })
            }
            None => Err(DomainErrorKind::MethodNotFound {
                method: method_name,
                repository: repository.name().to_string(),
                capability,
            }
            .into_error()),
        }
    }

    fn method_name(&self, repository: &dyn Repository) -> (String, Capability) {
        let operation = self.operation;

        if let Some(property) = self.navigation_property() {
            if operation.is_count_request {
                if let Some(marker) = &property.foreign_count {
                    let method_name =
                        self.navigation_method_name(NavigationVerb::Count, marker, property);
                    let handles_filter = repository.method(&method_name).is_some_and(|method| {
                        repository
                            .behavior_of(method)
                            .handles(RepositoryBehavior::HANDLES_FILTER)
                    });

                    if operation.filter.is_none() || handles_filter {
                        return (method_name, Capability::NavigationCounter);
                    }
                }
            }

            if let Some(marker) = &property.foreign {
                return (
                    self.navigation_method_name(NavigationVerb::Get, marker, property),
                    Capability::NavigationGetter,
                );
            }
        }

        if operation.as_select_one().is_some() {
            return ("GetOne".to_string(), Capability::GetOne);
        }

        if operation.is_count_request {
            if let Some(method_name) = collection_count_method_name(self.schema, &operation.of_type)
            {
                return (method_name, Capability::CountAll);
            }
        }

        ("GetAll".to_string(), Capability::GetAll)
    }

    fn navigation_method_name(
        &self,
        verb: NavigationVerb,
        marker: &ForeignMarker,
        property: &PropertyDef,
    ) -> String {
        navigation_method_name(verb, marker, &property.name, &self.operation.of_type)
    }

    fn navigation_property(&self) -> Option<&'a PropertyDef> {
        self.operation.navigation_property(self.schema)
    }

    /// Bind the method's parameters.
    ///
    /// A method whose first parameter accepts the operation receives the operation.
    /// Otherwise each parameter is bound by name: `id` to the first key, then a key
    /// of the same name, then a context parameter of the same name.
    /// Names compare case-insensitively and unmatched parameters are left empty.
    pub fn arguments(&self, method: &MethodSignature) -> Arguments<'a> {
        let operation = self.operation;

        match method.params.first() {
            None => return Arguments::None,
            Some(Param::Operation(param)) if param.accepts(&operation.kind) => {
                return Arguments::Operation(operation);
            }
            Some(_) => {}
        }

        let select_one = operation.as_select_one();

        Arguments::Values(
            method
                .params
                .iter()
                .map(|param| {
                    let Param::Named(name) = param else {
                        return None;
                    };

                    if let Some(select_one) = select_one {
                        if name.eq_ignore_ascii_case("id") {
                            return select_one.key();
                        }
                        if let Some(value) = select_one.keys.get(name) {
                            return Some(value);
                        }
                    }

                    operation.context_parameters.get(name)
                })
                .collect(),
        )
    }
}
