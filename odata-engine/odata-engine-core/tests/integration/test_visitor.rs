use odata_engine_core::visitor::parse;
use odata_engine_test_utils::{expect_eq, mock::*};
use odata_runtime::{
    expr::Expr,
    query::{
        expression::Queryable,
        operation::{OperationKind, QueryOperation},
        order::OrderMethod,
    },
};

fn parse_query(query: Queryable) -> Option<QueryOperation> {
    parse(&query.into_expr(), &mock_schema())
}

fn customer_orders() -> Queryable {
    Queryable::source(CUSTOMER)
        .key("ID", 1)
        .navigate_many("Orders", ORDER)
}

#[test]
fn root_source_is_a_plain_query() {
    let operation = parse_query(Queryable::source(MOCK_ENTITY)).unwrap();

    expect_eq!(expected = OperationKind::Query, actual = operation.kind);
    expect_eq!(expected = MOCK_ENTITY, actual = operation.of_type.as_str());
    assert!(!operation.is_count_request);
    assert!(operation.filter.is_none());
}

#[test]
fn paging_projection_and_ordering_are_collected() {
    let operation = parse_query(
        Queryable::source(CUSTOMER)
            .filter(Expr::prop("Name").not_equals(Expr::constant("x")))
            .order_by(Expr::prop("Name"))
            .then_by_descending(Expr::prop("ID"))
            .skip(5)
            .take(10)
            .select("Mock.CustomerProjection", &["Name"]),
    )
    .unwrap();

    expect_eq!(expected = 5, actual = operation.skip_count);
    expect_eq!(expected = 10, actual = operation.top_count);
    assert!(operation.filter.is_some());

    let projection = operation.projection.as_ref().unwrap();
    expect_eq!(
        expected = Some("Mock.CustomerProjection"),
        actual = projection.projected_type.as_deref()
    );
    assert!(operation.is_property_in_projection("Name"));
    assert!(!operation.is_property_in_projection("ID"));

    let mut order_stack = operation.order_stack;
    expect_eq!(
        expected = Some(OrderMethod::OrderBy),
        actual = order_stack.pop().map(|clause| clause.method)
    );
    expect_eq!(
        expected = Some(OrderMethod::ThenByDescending),
        actual = order_stack.pop().map(|clause| clause.method)
    );
    assert!(order_stack.pop().is_none());
}

#[test]
fn long_count_is_a_count_request() {
    let operation = parse_query(
        Queryable::source(MOCK_ENTITY_WITH_COLLECTION_COUNT).long_count(),
    )
    .unwrap();

    assert!(operation.is_count_request);
    expect_eq!(expected = OperationKind::Query, actual = operation.kind);
}

#[test]
fn key_filter_selects_one() {
    let operation =
        parse_query(Queryable::source(MOCK_ENTITY).key("ID", "foo")).unwrap();

    expect_eq!(expected = "select-one", actual = operation.kind_name());
    expect_eq!(expected = Some("foo"), actual = operation.key());
    assert!(operation.filter.is_none());
}

#[test]
fn declared_keys_are_merged_into_one_selection() {
    let operation = parse_query(
        Queryable::source(ORDER_LINE)
            .key("OrderNumber", 7)
            .key("LineNumber", 2),
    )
    .unwrap();

    let keys = operation.keys().unwrap();
    expect_eq!(expected = Some("7"), actual = keys.get("OrderNumber"));
    expect_eq!(expected = Some("2"), actual = keys.get("LineNumber"));
}

#[test]
fn navigation_with_filter_selects_many() {
    let operation = parse_query(
        customer_orders()
            .filter(Expr::prop("Total").greater_than(Expr::constant(10.0)))
            .take(3),
    )
    .unwrap();

    let many = operation.as_select_many().unwrap();
    expect_eq!(expected = CUSTOMER, actual = operation.of_type.as_str());
    expect_eq!(expected = "Orders", actual = many.navigation_property.as_str());
    expect_eq!(expected = Some("1"), actual = operation.key());
    expect_eq!(expected = 3, actual = operation.top_count);
    expect_eq!(
        expected = ORDER,
        actual = operation.filter.as_ref().unwrap().param_type.as_str()
    );
}

#[test]
fn single_valued_navigation_selects_many() {
    let operation = parse_query(
        Queryable::source(MOCK_ENTITY)
            .key("ID", "key")
            .navigate("NavigationProperty", MOCK_NAVIGATION_PROPERTY),
    )
    .unwrap();

    expect_eq!(
        expected = Some("NavigationProperty"),
        actual = operation
            .as_select_many()
            .map(|many| many.navigation_property.as_str())
    );
}

#[test]
fn navigation_count_is_a_count_request_on_select_many() {
    let operation = parse_query(
        Queryable::source(MOCK_ENTITY)
            .key("ID", "key")
            .navigate_many("RemoteCountedNavigationProperty", MOCK_NAVIGATION_PROPERTY)
            .long_count(),
    )
    .unwrap();

    assert!(operation.is_count_request);
    assert!(operation.as_select_many().is_some());
}

#[test]
fn two_navigations_form_a_compound() {
    let operation = parse_query(customer_orders().navigate_many("Lines", ORDER_LINE)).unwrap();

    let compound = operation.as_compound().unwrap();
    expect_eq!(expected = ORDER, actual = operation.of_type.as_str());
    expect_eq!(
        expected = "Lines",
        actual = compound.many.navigation_property.as_str()
    );
    assert!(compound.many.one.keys.is_empty());

    let anonymous = compound.anonymous_get_many.as_ref();
    expect_eq!(expected = CUSTOMER, actual = anonymous.of_type.as_str());
    expect_eq!(expected = Some("1"), actual = anonymous.key());
    expect_eq!(
        expected = Some("Orders"),
        actual = anonymous
            .as_select_many()
            .map(|many| many.navigation_property.as_str())
    );
}

#[test]
fn key_after_navigation_keeps_the_parent() {
    let operation = parse_query(customer_orders().key("OrderNumber", 7)).unwrap();

    let one = operation.as_select_one().unwrap();
    expect_eq!(expected = ORDER, actual = operation.of_type.as_str());
    expect_eq!(expected = Some("7"), actual = one.key());

    let parent = one.parent.as_deref().unwrap();
    expect_eq!(expected = "select-many", actual = parent.kind_name());
    expect_eq!(expected = CUSTOMER, actual = parent.of_type.as_str());
}

#[test]
fn key_on_root_has_no_parent() {
    let operation = parse_query(Queryable::source(ORDER).key("OrderNumber", 7)).unwrap();

    assert!(operation.as_select_one().unwrap().parent.is_none());
}

#[test]
fn two_filters_are_unsupported() {
    let query = Queryable::source(CUSTOMER)
        .filter(Expr::prop("Name").equals(Expr::constant("a")))
        .filter(Expr::prop("Name").not_equals(Expr::constant("b")));

    assert!(parse_query(query).is_none());
}

#[test]
fn skip_after_take_is_unsupported() {
    assert!(parse_query(Queryable::source(CUSTOMER).take(2).skip(1)).is_none());
}

#[test]
fn duplicate_key_is_unsupported() {
    let query = Queryable::source(ORDER)
        .key("OrderNumber", 1)
        .key("OrderNumber", 2);

    assert!(parse_query(query).is_none());
}
