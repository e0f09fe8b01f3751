//! Mock entity types and stub repositories shared by the engine tests.

use std::sync::Arc;

use anyhow::anyhow;
use odata_engine_core::{
    ArcRepository, DomainError, DomainResult, RepositoryBehavior,
    repository::{Arguments, FnRepository, MethodSignature, OperationParam},
};
use odata_runtime::{
    expr::Lambda,
    query::{operation::QueryOperation, projection::Projection},
    schema::{CollectionCount, ForeignMarker, PropertyDef, Schema, TypeInfo},
    value::Value,
};

pub const MOCK_ENTITY: &str = "Mock.MockEntity";
pub const MOCK_NAVIGATION_PROPERTY: &str = "Mock.MockNavigationProperty";
pub const MOCK_COMPLEX_TYPE: &str = "Mock.MockComplexType";
pub const MOCK_ENTITY_WITH_COLLECTION_COUNT: &str = "Mock.MockEntityWithCollectionCountAttribute";
pub const MOCK_ENTITY_2: &str = "Mock.MockEntity2";
pub const ENTITY: &str = "Mock.Entity";

pub const CUSTOMER: &str = "Mock.Customer";
pub const ORDER: &str = "Mock.Order";
pub const ORDER_LINE: &str = "Mock.OrderLine";

pub fn mock_schema() -> Arc<Schema> {
    let schema = Schema::builder()
        .add_type(
            TypeInfo::new(MOCK_ENTITY)
                .with_property(PropertyDef::scalar("ID"))
                .with_property(PropertyDef::scalar("Value"))
                .with_property(PropertyDef::navigation(
                    "NavigationProperty",
                    MOCK_NAVIGATION_PROPERTY,
                ))
                .with_property(PropertyDef::navigation_many(
                    "NavigationProperties",
                    MOCK_NAVIGATION_PROPERTY,
                ))
                .with_property(
                    PropertyDef::navigation(
                        "DecoratedNavigationProperty",
                        MOCK_NAVIGATION_PROPERTY,
                    )
                    .with_foreign(ForeignMarker::default()),
                )
                .with_property(
                    PropertyDef::navigation(
                        "DecoratedNavigationPropertyWithMethodName",
                        MOCK_NAVIGATION_PROPERTY,
                    )
                    .with_foreign(ForeignMarker::with_repository_method(
                        "MockMethodForDecoratedNavigationProperty",
                    )),
                )
                .with_property(
                    PropertyDef::navigation(
                        "RemoteCountedNavigationProperty",
                        MOCK_NAVIGATION_PROPERTY,
                    )
                    .with_foreign_count(ForeignMarker::default()),
                )
                .with_property(
                    PropertyDef::navigation(
                        "RemoteCountedNavigationPropertyWithMethodName",
                        MOCK_NAVIGATION_PROPERTY,
                    )
                    .with_foreign(ForeignMarker::default())
                    .with_foreign_count(ForeignMarker::with_repository_method(
                        "CountRemoteCountedProperties",
                    )),
                )
                .with_property(PropertyDef::complex(
                    "ComplexTypeProperty",
                    MOCK_COMPLEX_TYPE,
                ))
                .with_property(PropertyDef::collection("ComplexTypeCollectionValues")),
        )
        .add_type(
            TypeInfo::new(MOCK_NAVIGATION_PROPERTY)
                .with_property(PropertyDef::scalar("ID"))
                .with_property(PropertyDef::scalar("Value")),
        )
        .add_type(
            TypeInfo::new(MOCK_COMPLEX_TYPE)
                .with_property(PropertyDef::scalar("Name"))
                .with_property(PropertyDef::scalar("Description")),
        )
        .add_type(
            TypeInfo::new(MOCK_ENTITY_WITH_COLLECTION_COUNT)
                .with_collection_count(CollectionCount::default()),
        )
        .add_type(TypeInfo::new(MOCK_ENTITY_2).with_collection_count(CollectionCount::default()))
        .add_type(
            TypeInfo::new(ENTITY)
                .with_keys(["parameterOne", "parameterTwo", "parameterThree"])
                .with_property(PropertyDef::scalar("parameterOne"))
                .with_property(PropertyDef::scalar("parameterTwo"))
                .with_property(PropertyDef::scalar("parameterThree")),
        )
        .add_type(
            TypeInfo::new(CUSTOMER)
                .with_property(PropertyDef::scalar("ID"))
                .with_property(PropertyDef::scalar("Name"))
                .with_property(PropertyDef::navigation_many("Orders", ORDER)),
        )
        .add_type(
            TypeInfo::new(ORDER)
                .with_keys(["OrderNumber"])
                .with_property(PropertyDef::scalar("OrderNumber"))
                .with_property(PropertyDef::scalar("CustomerID"))
                .with_property(PropertyDef::scalar("Total"))
                .with_property(
                    PropertyDef::navigation_many("Lines", ORDER_LINE)
                        .with_foreign(ForeignMarker::default())
                        .with_foreign_count(ForeignMarker::default()),
                ),
        )
        .add_type(
            TypeInfo::new(ORDER_LINE)
                .with_keys(["OrderNumber", "LineNumber"])
                .with_property(PropertyDef::scalar("OrderNumber"))
                .with_property(PropertyDef::scalar("LineNumber"))
                .with_property(PropertyDef::scalar("Product"))
                .with_property(PropertyDef::scalar("Quantity")),
        )
        .build()
        .expect("mock schema is valid");

    Arc::new(schema)
}

pub fn mock_entity<'a>(props: impl IntoIterator<Item = (&'a str, Value)>) -> Value {
    Value::new_struct(MOCK_ENTITY, props)
}

pub fn mock_navigation_property(value: &str) -> Value {
    Value::new_struct(MOCK_NAVIGATION_PROPERTY, [("Value", Value::text(value))])
}

pub fn customer(id: i64, name: &str) -> Value {
    Value::new_struct(
        CUSTOMER,
        [("ID", Value::I64(id)), ("Name", Value::text(name))],
    )
}

pub fn order(order_number: i64, customer_id: i64, total: f64) -> Value {
    Value::new_struct(
        ORDER,
        [
            ("OrderNumber", Value::I64(order_number)),
            ("CustomerID", Value::I64(customer_id)),
            ("Total", Value::from(total)),
        ],
    )
}

pub fn order_line(order_number: i64, line_number: i64, product: &str, quantity: i64) -> Value {
    Value::new_struct(
        ORDER_LINE,
        [
            ("OrderNumber", Value::I64(order_number)),
            ("LineNumber", Value::I64(line_number)),
            ("Product", Value::text(product)),
            ("Quantity", Value::I64(quantity)),
        ],
    )
}

/// `e => e == null ? null : new { e.Value }`
pub fn value_projection(param_type: &str) -> Projection {
    Projection::from_lambda(
        Lambda::null_guarded_projection(param_type, "Mock.ValueProjection", &["Value"]),
        &mock_schema(),
    )
    .expect("null guarded projection")
}

fn not_implemented(method: &str) -> DomainError {
    DomainError::repository(anyhow!("{method} is not implemented"))
}

fn get_all() -> MethodSignature {
    MethodSignature::new("GetAll").with_operation_param(OperationParam::Query)
}

fn get_one() -> MethodSignature {
    MethodSignature::new("GetOne").with_operation_param(OperationParam::SelectOne)
}

fn navigation_method(name: &str) -> MethodSignature {
    MethodSignature::new(name).with_operation_param(OperationParam::SelectMany)
}

/// A repository following every naming convention of the engine.
///
/// Only the remote navigation counter is implemented, counting `10`.
pub fn repository_stub() -> FnRepository {
    let mut builder = FnRepository::builder("RepositoryStub")
        .method(get_all(), |_| Err(not_implemented("GetAll")))
        .method(get_one(), |_| Err(not_implemented("GetOne")))
        .method(
            navigation_method("CountRemoteCountedNavigationPropertyByMockEntity"),
            |_| Ok(Value::I64(10)),
        )
        .method(
            MethodSignature::new("MockEntityWithCollectionCountAttributeCount")
                .with_operation_param(OperationParam::Query),
            |_| Err(not_implemented("MockEntityWithCollectionCountAttributeCount")),
        );

    for name in [
        "MockMethodForDecoratedNavigationProperty",
        "GetDecoratedNavigationPropertyByMockEntity",
        "CountRemoteCountedProperties",
    ] {
        builder = builder.method(navigation_method(name), move |_| {
            Err(not_implemented(name))
        });
    }

    builder.build()
}

/// A repository with plain text parameters instead of operations
pub fn custom_repository_stub() -> FnRepository {
    FnRepository::builder("CustomRepositoryStub")
        .method(MethodSignature::new("GetAll"), |_| Ok(Value::Null))
        .method(MethodSignature::new("GetOne").with_param("key"), |_| {
            Ok(Value::Null)
        })
        .build()
}

fn get_one_by(repository: &str, params: &[&str]) -> FnRepository {
    let signature = params
        .iter()
        .fold(MethodSignature::new("GetOne"), |signature, param| {
            signature.with_param(*param)
        });

    FnRepository::builder(repository)
        .method(signature, |_| Ok(Value::Null))
        .build()
}

pub fn entity_repository() -> FnRepository {
    get_one_by("EntityRepository", &["parameterOne", "parameterTwo"])
}

pub fn entity_repository_2() -> FnRepository {
    get_one_by("EntityRepository2", &["parameterTwo"])
}

pub fn entity_repository_3() -> FnRepository {
    get_one_by("EntityRepository3", &["parameterTwo", "parameterThree"])
}

/// Lacks `GetAll`
pub fn incomplete_entity_repository() -> FnRepository {
    get_one_by("IncompleteEntityRepository", &["parameterOne", "parameterTwo"])
}

/// A repository whose `GetOne` answers through `get_one`
pub fn mockable_repository(
    get_one_fn: impl Fn(&QueryOperation) -> DomainResult<Value> + Send + Sync + 'static,
) -> FnRepository {
    FnRepository::builder("MockeableRepository")
        .method(get_all(), |_| Err(not_implemented("GetAll")))
        .method(get_one(), move |arguments: Arguments<'_>| {
            match arguments.operation() {
                Some(operation) => get_one_fn(operation),
                None => Err(DomainError::data_store("GetOne called without operation")),
            }
        })
        .build()
}

fn returning_repository(name: &str, behavior: RepositoryBehavior, result: Value) -> FnRepository {
    FnRepository::builder(name)
        .behavior(behavior)
        .method(get_all(), |_| Err(not_implemented("GetAll")))
        .method(get_one(), move |_| Ok(result.clone()))
        .build()
}

pub fn handles_all_repository(result: Value) -> FnRepository {
    returning_repository(
        "HandlesAllRepository",
        RepositoryBehavior::HANDLES_EVERYTHING,
        result,
    )
}

pub fn handles_select_repository(result: Value) -> FnRepository {
    returning_repository(
        "HandlesSelectRepository",
        RepositoryBehavior::HANDLES_SELECT,
        result,
    )
}

/// Counts `MockEntity2` collections as `1`
pub fn mock_repository_2() -> FnRepository {
    FnRepository::builder("MockRepository2")
        .method(get_all(), |_| Err(not_implemented("GetAll")))
        .method(
            MethodSignature::new("MockEntity2Count").with_operation_param(OperationParam::Query),
            |_| Ok(Value::I64(1)),
        )
        .method(get_one(), |_| Err(not_implemented("GetOne")))
        .build()
}

pub fn arc(repository: FnRepository) -> ArcRepository {
    Arc::new(repository)
}
