use std::sync::Arc;

use odata_runtime::{
    context::ContextParameters,
    query::{expression::QueryExpr, operation::QueryOperation},
    schema::Schema,
    sequence::Sequence,
    value::Value,
};
use tracing::{debug, trace};

use crate::{
    Config, PagingStrategy,
    domain_error::{DomainError, DomainErrorKind, DomainResult},
    paging::parse_offset_token,
    repository::{ArcRepository, RepositoryBehavior, RepositoryResolver},
    residual::{self, OrderChain},
    resolver::OperationResolver,
    visitor,
};

/// Request-scoped inputs to query execution
#[derive(Clone, Default, Debug)]
pub struct RequestContext {
    pub context_parameters: ContextParameters,
    /// The continuation token of the request, if any.
    /// In offset paging this is a `skip:top` pair.
    pub continuation_token: Option<String>,
}

impl RequestContext {
    pub fn with_context_parameters(mut self, context_parameters: ContextParameters) -> Self {
        self.context_parameters = context_parameters;
        self
    }

    pub fn with_continuation_token(mut self, token: impl Into<String>) -> Self {
        self.continuation_token = Some(token.into());
        self
    }

    /// The same request without its continuation token
    fn without_continuation_token(&self) -> Self {
        Self {
            context_parameters: self.context_parameters.clone(),
            continuation_token: None,
        }
    }
}

/// The outcome of a query
#[derive(Clone, PartialEq, Debug)]
pub enum QueryResult {
    Null,
    Count(i64),
    Sequence(Sequence<Value>),
}

impl QueryResult {
    pub fn as_sequence(&self) -> Option<&Sequence<Value>> {
        match self {
            Self::Sequence(sequence) => Some(sequence),
            _ => None,
        }
    }

    pub fn into_sequence(self) -> Option<Sequence<Value>> {
        match self {
            Self::Sequence(sequence) => Some(sequence),
            _ => None,
        }
    }

    /// The count of a count request
    pub fn count(&self) -> Option<i64> {
        match self {
            Self::Count(count) => Some(*count),
            _ => None,
        }
    }
}

/// Executes query expressions against the repositories.
pub struct QueryProvider {
    schema: Arc<Schema>,
    config: Arc<Config>,
    resolver: Arc<dyn RepositoryResolver + Send + Sync>,
}

impl QueryProvider {
    pub fn builder(
        schema: Arc<Schema>,
        resolver: Arc<dyn RepositoryResolver + Send + Sync>,
    ) -> Builder {
        Builder {
            schema,
            config: Config::default(),
            resolver,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The repository serving an entity type
    pub fn repository_for(&self, type_full_name: &str) -> Option<ArcRepository> {
        self.resolver.resolve(type_full_name)
    }

    /// Parse without executing
    pub fn parse(&self, expr: &QueryExpr) -> Option<QueryOperation> {
        visitor::parse(expr, &self.schema)
    }

    /// Parse and execute a query expression.
    ///
    /// Any error is reported as a service fault.
    pub fn execute(&self, expr: &QueryExpr, ctx: &RequestContext) -> DomainResult<QueryResult> {
        match self.parse(expr) {
            Some(operation) => self.execute_operation(operation, ctx),
            None => Err(DomainErrorKind::UnsupportedQuery
                .into_error()
                .into_service_fault()),
        }
    }

    /// Execute an already parsed operation.
    ///
    /// Any error is reported as a service fault.
    pub fn execute_operation(
        &self,
        operation: QueryOperation,
        ctx: &RequestContext,
    ) -> DomainResult<QueryResult> {
        self.run(operation, ctx)
            .map_err(DomainError::into_service_fault)
    }

    /// Resolve the intermediate entity of a compound operation.
    ///
    /// The anonymous navigation is executed and its first element identifies the owner
    /// of the navigation property: the operation takes over its type and declared keys.
    /// Does nothing for other operations, or when already resolved.
    pub fn resolve_compound(
        &self,
        operation: &mut QueryOperation,
        ctx: &RequestContext,
    ) -> DomainResult<()> {
        let Some(compound) = operation.as_compound() else {
            return Ok(());
        };
        if !compound.many.one.keys.is_empty() {
            return Ok(());
        }

        let anonymous_get_many = compound.anonymous_get_many.as_ref().clone();
        let navigation_property = anonymous_get_many
            .as_select_many()
            .map(|many| many.navigation_property.clone())
            .unwrap_or_default();

        let intermediate = match self.run(anonymous_get_many, &ctx.without_continuation_token())? {
            QueryResult::Sequence(sequence) => sequence.into_first(),
            QueryResult::Null | QueryResult::Count(_) => None,
        }
        .ok_or_else(|| DomainErrorKind::IntermediateNotFound(navigation_property).into_error())?;

        let intermediate = match intermediate {
            Value::Struct(intermediate) => intermediate,
            other => return Err(DomainErrorKind::NotAnEntity(other.kind_name()).into_error()),
        };

        let type_info = self
            .schema
            .find_type(&intermediate.type_name)
            .ok_or_else(|| {
                DomainErrorKind::EntityTypeNotFound(intermediate.type_name.to_string())
                    .into_error()
            })?;
        let declared_keys = type_info.declared_keys().ok_or_else(|| {
            DomainErrorKind::NoDeclaredKeys(type_info.full_name.to_string()).into_error()
        })?;

        debug!(
            "resolved compound intermediate {} by {declared_keys:?}",
            type_info.full_name
        );

        operation.of_type = type_info.full_name.clone();
        if let Some(one) = operation.as_select_one_mut() {
            for key in declared_keys {
                let value = intermediate
                    .props
                    .get(key)
                    .filter(|value| !value.is_null())
                    .ok_or_else(|| {
                        DomainErrorKind::MissingKey {
                            type_name: type_info.full_name.to_string(),
                            key: key.clone(),
                        }
                        .into_error()
                    })?;
                one.keys.insert(key.as_str(), value.to_string());
            }
        }

        Ok(())
    }

    fn run(&self, mut operation: QueryOperation, ctx: &RequestContext) -> DomainResult<QueryResult> {
        self.resolve_compound(&mut operation, ctx)?;

        for (name, value) in ctx.context_parameters.iter() {
            operation.context_parameters.insert(name, value);
        }
        self.apply_continuation_token(&mut operation, ctx)?;

        let resolver = OperationResolver::for_operation(&operation, &self.schema);
        let repository = resolver.repository(self.resolver.as_ref())?;
        let method = resolver.method(repository.as_ref())?;
        let arguments = resolver.arguments(method.signature);

        debug!(
            "invoking {}.{} for {} operation",
            repository.name(),
            method.signature.name,
            operation.kind_name()
        );

        let output = repository.invoke(method.signature, arguments)?;
        let behavior = repository.behavior_of(method.signature);

        self.shape_output(operation, output, behavior)
    }

    fn apply_continuation_token(
        &self,
        operation: &mut QueryOperation,
        ctx: &RequestContext,
    ) -> DomainResult<()> {
        match self.config.paging {
            PagingStrategy::Token => {
                operation.continuation_token = ctx.continuation_token.clone();
            }
            PagingStrategy::Offset => {
                if let Some(token) = &ctx.continuation_token {
                    let (skip, top) = parse_offset_token(token)?;
                    operation.skip_count = skip;
                    operation.top_count = top;
                }
            }
        }
        Ok(())
    }

    fn shape_output(
        &self,
        mut operation: QueryOperation,
        output: Value,
        behavior: RepositoryBehavior,
    ) -> DomainResult<QueryResult> {
        if output.is_null() {
            return Ok(QueryResult::Null);
        }

        if let Value::I64(count) = output {
            if operation.is_count_request && self.counts_itself(&operation) {
                return Ok(QueryResult::Count(count));
            }
        }

        let element_type = match operation.as_select_many() {
            Some(many) => {
                let property = operation
                    .navigation_property(&self.schema)
                    .ok_or_else(|| {
                        DomainErrorKind::NavigationPropertyNotFound {
                            type_name: operation.of_type.to_string(),
                            property: many.navigation_property.clone(),
                        }
                        .into_error()
                    })?;
                property.element_type().unwrap_or(&operation.of_type).clone()
            }
            None => operation.of_type.clone(),
        };

        let output = match operation.navigation_property(&self.schema) {
            Some(property) if property.foreign.is_none() => match output {
                Value::Struct(mut parent) => match parent.props.swap_remove(&property.name) {
                    None | Some(Value::Null) => Value::Sequence(Sequence::default()),
                    Some(value) => value,
                },
                other => return Err(DomainErrorKind::NotAnEntity(other.kind_name()).into_error()),
            },
            _ => output,
        };

        let mut sequence = output.wrap_into_sequence();

        let entity_elements = self.schema.find_type(&element_type).is_some();
        for element in sequence.iter() {
            let actual = match element.type_name() {
                Some(type_name) if *type_name == element_type => continue,
                Some(type_name) => type_name.to_string(),
                None if entity_elements => element.kind_name().to_string(),
                None => continue,
            };
            return Err(DomainErrorKind::ElementTypeMismatch {
                expected: element_type.to_string(),
                actual,
            }
            .into_error());
        }

        if !behavior.handles_everything() {
            if let Some(filter) = &operation.filter {
                if !behavior.contains(RepositoryBehavior::HANDLES_FILTER) {
                    sequence = residual::filter(sequence, filter)?;
                }
            }

            let mut order_chain = OrderChain::default();
            while let Some(clause) = operation.order_stack.pop() {
                if !behavior.contains(RepositoryBehavior::HANDLES_ORDER_BY) {
                    sequence = order_chain.apply(sequence, &clause)?;
                }
            }

            if operation.skip_count > 0 && !behavior.contains(RepositoryBehavior::HANDLES_SKIP) {
                sequence = residual::skip(sequence, operation.skip_count);
            }

            if operation.top_count > 0 && !behavior.contains(RepositoryBehavior::HANDLES_TOP) {
                sequence = residual::take(sequence, operation.top_count);
            }
        }

        trace!("{} elements after residual operators", sequence.len());

        if operation.is_count_request {
            return Ok(QueryResult::Count(sequence.len() as i64));
        }

        if let Some(projection) = &operation.projection {
            sequence = residual::project(sequence, projection)?;
        }

        Ok(QueryResult::Sequence(sequence))
    }

    /// Whether a raw count returned by the repository is the final count
    fn counts_itself(&self, operation: &QueryOperation) -> bool {
        let collection_count = self
            .schema
            .find_type(&operation.of_type)
            .is_some_and(|info| info.collection_count.is_some());
        let foreign_count = operation
            .navigation_property(&self.schema)
            .is_some_and(|property| property.foreign_count.is_some());

        collection_count || foreign_count
    }
}

pub struct Builder {
    schema: Arc<Schema>,
    config: Config,
    resolver: Arc<dyn RepositoryResolver + Send + Sync>,
}

impl Builder {
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> QueryProvider {
        QueryProvider {
            schema: self.schema,
            config: Arc::new(self.config),
            resolver: self.resolver,
        }
    }
}
