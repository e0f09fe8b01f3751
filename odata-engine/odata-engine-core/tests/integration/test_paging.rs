use odata_engine_core::{
    Config, PagingStrategy, QueryProvider, RequestContext,
    paging::{GenericPaging, PageState, PagingRequest, encode_public_token},
    repository::{FnRepository, MethodSignature, OperationParam},
};
use odata_engine_test_utils::{assert_error_msg, expect_eq, mock::*};
use odata_runtime::{
    query::expression::{QueryExpr, Queryable},
    value::Value,
};

use crate::provider_with_config;

fn config() -> Config {
    Config {
        paging: PagingStrategy::Offset,
        page_sizes: [("Customer".to_string(), 2)].into_iter().collect(),
        ..Default::default()
    }
}

fn provider() -> QueryProvider {
    let repository = FnRepository::builder("CustomerRepository")
        .method(
            MethodSignature::new("GetAll").with_operation_param(OperationParam::Query),
            |_| {
                Ok(Value::sequence(
                    ["a", "b", "c", "d", "e"]
                        .into_iter()
                        .zip(1..)
                        .map(|(name, id)| customer(id, name)),
                ))
            },
        )
        .build();

    provider_with_config(arc(repository), config())
}

fn all_customers() -> QueryExpr {
    Queryable::source(CUSTOMER).into_expr()
}

fn page(token: Option<&str>) -> PageState {
    GenericPaging::from_config(&config())
        .set_continuation_token(
            CUSTOMER,
            PagingRequest {
                continuation_token: token,
                ..Default::default()
            },
        )
        .unwrap()
        .unwrap()
}

fn names_on(provider: &QueryProvider, state: &PageState) -> Vec<String> {
    provider
        .execute(
            &all_customers(),
            &RequestContext::default().with_continuation_token(state.offset_token().unwrap()),
        )
        .unwrap()
        .into_sequence()
        .unwrap()
        .iter()
        .filter_map(|customer| customer.get("Name").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

#[test]
fn first_page_links_to_the_second() {
    let provider = provider();
    let paging = GenericPaging::from_config(provider.config());
    let state = page(None);

    expect_eq!(expected = vec!["a", "b"], actual = names_on(&provider, &state));
    expect_eq!(
        expected = Some(encode_public_token("Customer", 2)),
        actual = paging
            .next_continuation_token(&provider, &all_customers(), &RequestContext::default(), &state)
            .unwrap()
    );
}

#[test]
fn last_page_has_no_next_token() {
    let provider = provider();
    let paging = GenericPaging::from_config(provider.config());
    let token = encode_public_token("Customer", 3);
    let state = page(Some(&token));

    expect_eq!(expected = "4:2", actual = state.offset_token().unwrap());
    expect_eq!(expected = vec!["e"], actual = names_on(&provider, &state));
    expect_eq!(
        expected = None,
        actual = paging
            .next_continuation_token(&provider, &all_customers(), &RequestContext::default(), &state)
            .unwrap()
    );
}

#[test]
fn entities_without_page_size_are_not_paged() {
    let state = GenericPaging::from_config(&config())
        .set_continuation_token(ORDER, PagingRequest::default())
        .unwrap();

    expect_eq!(expected = None, actual = state);
}

#[test]
fn overflowing_page_has_no_next_token() {
    let provider = provider();
    let paging = GenericPaging::from_config(provider.config());
    let state = PageState {
        entity_name: "Customer".to_string(),
        page: usize::MAX / 2,
        page_size: 2,
        current_offset: 0,
    };

    assert_error_msg!(
        paging.next_continuation_token(
            &provider,
            &all_customers(),
            &RequestContext::default(),
            &state
        ),
        "invalid continuation token"
    );
}

#[test]
fn overflowing_public_token_is_rejected() {
    let token = encode_public_token("Customer", usize::MAX / 2);

    assert_error_msg!(
        GenericPaging::from_config(&config()).set_continuation_token(
            CUSTOMER,
            PagingRequest {
                continuation_token: Some(&token),
                ..Default::default()
            },
        ),
        "invalid continuation token"
    );
}
