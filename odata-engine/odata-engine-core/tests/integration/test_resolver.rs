use odata_engine_core::{
    ArcRepository, Repository,
    repository::{
        Arguments, FnRepository, MethodSignature, RepositoryBehavior, RepositoryResolverMock,
        ResolverFn,
    },
    resolver::OperationResolver,
};
use odata_engine_test_utils::{
    assert_error_msg, expect_eq,
    mock::*,
    unimock::{MockFn, Unimock, matching},
};
use odata_runtime::{
    expr::{Expr, Lambda},
    query::operation::{KeyValues, QueryOperation},
};
use rstest::rstest;

fn keys(pairs: &[(&str, &str)]) -> KeyValues {
    pairs.iter().copied().collect()
}

fn select_one() -> QueryOperation {
    QueryOperation::select_one(MOCK_ENTITY, keys(&[("key", "foo")]))
}

fn select_many(navigation_property: &str) -> QueryOperation {
    QueryOperation::select_many(MOCK_ENTITY, keys(&[("key", "foo")]), navigation_property)
}

#[test]
fn repository_of_select_one_is_resolved_by_full_name() {
    let schema = mock_schema();
    let resolver = Unimock::new(
        RepositoryResolverMock::resolve
            .next_call(matching!("Mock.MockEntity"))
            .returns(Some(arc(repository_stub()))),
    );

    let repository = OperationResolver::for_operation(&select_one(), &schema)
        .repository(&resolver)
        .unwrap();

    expect_eq!(expected = "RepositoryStub", actual = repository.name());
}

#[test]
fn repository_of_root_collection_is_resolved_by_full_name() {
    let schema = mock_schema();
    let resolver = Unimock::new(
        RepositoryResolverMock::resolve
            .next_call(matching!("Mock.MockEntity"))
            .returns(Some(arc(repository_stub()))),
    );

    OperationResolver::for_operation(&QueryOperation::new(MOCK_ENTITY), &schema)
        .repository(&resolver)
        .unwrap();
}

#[rstest]
#[case::local_navigation(select_many("NavigationProperty"))]
#[case::local_navigation_count(select_many("NavigationProperty").with_count_request())]
fn repository_of_local_navigation_is_the_parent_repository(#[case] operation: QueryOperation) {
    let schema = mock_schema();
    let resolver = Unimock::new(
        RepositoryResolverMock::resolve
            .next_call(matching!("Mock.MockEntity"))
            .returns(Some(arc(repository_stub()))),
    );

    OperationResolver::for_operation(&operation, &schema)
        .repository(&resolver)
        .unwrap();
}

#[rstest]
#[case::foreign(select_many("DecoratedNavigationProperty"))]
#[case::foreign_count(select_many("RemoteCountedNavigationProperty").with_count_request())]
fn repository_of_foreign_navigation_is_the_target_repository(#[case] operation: QueryOperation) {
    let schema = mock_schema();
    let resolver = Unimock::new(
        RepositoryResolverMock::resolve
            .next_call(matching!("Mock.MockNavigationProperty"))
            .returns(Some(arc(repository_stub()))),
    );

    OperationResolver::for_operation(&operation, &schema)
        .repository(&resolver)
        .unwrap();
}

#[test]
fn foreign_count_marker_is_ignored_without_count_request() {
    let schema = mock_schema();
    let operation = select_many("RemoteCountedNavigationProperty");

    expect_eq!(
        expected = MOCK_ENTITY,
        actual = OperationResolver::for_operation(&operation, &schema)
            .repository_type()
            .as_str()
    );
}

#[test]
fn repository_not_found() {
    let schema = mock_schema();
    let operation = QueryOperation::new(MOCK_ENTITY_WITH_COLLECTION_COUNT);

    assert_error_msg!(
        OperationResolver::for_operation(&operation, &schema)
            .repository(&ResolverFn(|_: &str| -> Option<ArcRepository> { None }))
            .map(|_| ()),
        "No repository found for MockEntityWithCollectionCountAttribute."
    );
}

#[rstest]
#[case::select_one(select_one(), "GetOne")]
#[case::named_foreign(
    select_many("DecoratedNavigationPropertyWithMethodName"),
    "MockMethodForDecoratedNavigationProperty"
)]
#[case::conventional_foreign(
    select_many("DecoratedNavigationProperty"),
    "GetDecoratedNavigationPropertyByMockEntity"
)]
#[case::local_navigation(select_many("NavigationProperty"), "GetOne")]
#[case::conventional_foreign_count(
    select_many("RemoteCountedNavigationProperty").with_count_request(),
    "CountRemoteCountedNavigationPropertyByMockEntity"
)]
#[case::named_foreign_count(
    select_many("RemoteCountedNavigationPropertyWithMethodName").with_count_request(),
    "CountRemoteCountedProperties"
)]
#[case::get_all(QueryOperation::new(MOCK_ENTITY), "GetAll")]
#[case::root_count_without_collection_count(
    QueryOperation::new(MOCK_ENTITY).with_count_request(),
    "GetAll"
)]
#[case::root_count_with_collection_count(
    QueryOperation::new(MOCK_ENTITY_WITH_COLLECTION_COUNT).with_count_request(),
    "MockEntityWithCollectionCountAttributeCount"
)]
fn method_of_repository_stub(#[case] operation: QueryOperation, #[case] expected: &str) {
    let schema = mock_schema();
    let repository = repository_stub();

    let method = OperationResolver::for_operation(&operation, &schema)
        .method(&repository)
        .unwrap();

    expect_eq!(expected = expected, actual = method.signature.name.as_str());
}

#[test]
fn filtered_foreign_count_falls_back_to_foreign_getter() {
    let schema = mock_schema();
    let operation = select_many("RemoteCountedNavigationPropertyWithMethodName")
        .with_count_request()
        .with_filter(Lambda::new(
            MOCK_NAVIGATION_PROPERTY,
            Expr::prop("Value").equals(Expr::constant("x")),
        ));

    assert_error_msg!(
        OperationResolver::for_operation(&operation, &schema).method(&repository_stub()),
        "The method GetRemoteCountedNavigationPropertyWithMethodNameByMockEntity cannot be found on the repository RepositoryStub."
    );
}

#[test]
fn filtered_foreign_count_is_kept_when_the_counter_filters() {
    let schema = mock_schema();
    let repository = FnRepository::builder("FilteringCounter")
        .method(
            MethodSignature::new("CountRemoteCountedProperties")
                .with_behavior(RepositoryBehavior::HANDLES_FILTER),
            |_| Ok(odata_runtime::value::Value::I64(0)),
        )
        .build();
    let operation = select_many("RemoteCountedNavigationPropertyWithMethodName")
        .with_count_request()
        .with_filter(Lambda::new(
            MOCK_NAVIGATION_PROPERTY,
            Expr::prop("Value").equals(Expr::constant("x")),
        ));

    let method = OperationResolver::for_operation(&operation, &schema)
        .method(&repository)
        .unwrap();

    expect_eq!(
        expected = "CountRemoteCountedProperties",
        actual = method.signature.name.as_str()
    );
}

#[test]
fn method_not_found() {
    let schema = mock_schema();
    let operation = QueryOperation::new(MOCK_ENTITY_WITH_COLLECTION_COUNT);

    assert_error_msg!(
        OperationResolver::for_operation(&operation, &schema)
            .method(&incomplete_entity_repository()),
        "The method GetAll cannot be found on the repository IncompleteEntityRepository."
    );
}

#[rstest]
#[case::select_one(QueryOperation::select_one(
    MOCK_ENTITY_WITH_COLLECTION_COUNT,
    keys(&[("key", "key")])
))]
#[case::get_all(QueryOperation::new(MOCK_ENTITY_WITH_COLLECTION_COUNT))]
fn operation_is_passed_to_operation_parameter(#[case] operation: QueryOperation) {
    let schema = mock_schema();
    let repository = repository_stub();
    let resolver = OperationResolver::for_operation(&operation, &schema);
    let method = resolver.method(&repository).unwrap();

    expect_eq!(
        expected = Some(&operation),
        actual = resolver.arguments(method.signature).operation()
    );
}

#[test]
fn key_is_passed_to_text_parameter() {
    let schema = mock_schema();
    let repository = custom_repository_stub();
    let operation =
        QueryOperation::select_one(MOCK_ENTITY_WITH_COLLECTION_COUNT, keys(&[("key", "key")]));
    let resolver = OperationResolver::for_operation(&operation, &schema);
    let method = resolver.method(&repository).unwrap();

    expect_eq!(
        expected = vec![Some("key")],
        actual = resolver.arguments(method.signature).values().to_vec()
    );
}

#[test]
fn method_without_parameters_gets_no_arguments() {
    let schema = mock_schema();
    let repository = custom_repository_stub();
    let operation = QueryOperation::new(MOCK_ENTITY_WITH_COLLECTION_COUNT);
    let resolver = OperationResolver::for_operation(&operation, &schema);
    let method = resolver.method(&repository).unwrap();

    assert!(matches!(
        resolver.arguments(method.signature),
        Arguments::None
    ));
}

#[rstest]
#[case::declaration_order(
    entity_repository(),
    &[("parameterTwo", "valueTwo"), ("parameterOne", "valueOne")],
    &["valueOne", "valueTwo"]
)]
#[case::unused_key(
    entity_repository_2(),
    &[("parameterTwo", "valueTwo"), ("parameterOne", "valueOne")],
    &["valueTwo"]
)]
#[case::case_insensitive(
    entity_repository_3(),
    &[("parameterOne", "valueOne"), ("parameterTwo", "valueTwo"), ("PaRaMeTeRThRee", "valueThree")],
    &["valueTwo", "valueThree"]
)]
fn keys_are_ordered_by_parameters(
    #[case] repository: FnRepository,
    #[case] key_values: &[(&str, &str)],
    #[case] expected: &[&str],
) {
    let schema = mock_schema();
    let operation = QueryOperation::select_one(ENTITY, keys(key_values));
    let resolver = OperationResolver::for_operation(&operation, &schema);
    let method = resolver.method(&repository).unwrap();

    expect_eq!(
        expected = expected.iter().copied().map(Some).collect::<Vec<_>>(),
        actual = resolver.arguments(method.signature).values().to_vec()
    );
}

#[test]
fn id_parameter_takes_the_first_key() {
    let schema = mock_schema();
    let repository = FnRepository::builder("OrderRepository")
        .method(MethodSignature::new("GetOne").with_param("Id"), |_| {
            Ok(odata_runtime::value::Value::Null)
        })
        .build();
    let operation = QueryOperation::select_one(ORDER, keys(&[("OrderNumber", "7")]));
    let resolver = OperationResolver::for_operation(&operation, &schema);
    let method = resolver.method(&repository).unwrap();

    expect_eq!(
        expected = Some("7"),
        actual = resolver.arguments(method.signature).value(0)
    );
}

#[test]
fn context_parameters_fill_remaining_parameters() {
    let schema = mock_schema();
    let repository = FnRepository::builder("CustomerRepository")
        .method(
            MethodSignature::new("GetAll")
                .with_param("tenant")
                .with_param("region"),
            |_| Ok(odata_runtime::value::Value::Null),
        )
        .build();
    let mut operation = QueryOperation::new(CUSTOMER);
    operation.context_parameters.insert("Tenant", "acme");

    let resolver = OperationResolver::for_operation(&operation, &schema);
    let method = resolver.method(&repository).unwrap();

    expect_eq!(
        expected = vec![Some("acme"), None],
        actual = resolver.arguments(method.signature).values().to_vec()
    );
}
