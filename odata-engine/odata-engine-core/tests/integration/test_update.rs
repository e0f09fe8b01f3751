use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use odata_engine_core::{
    ChangeKind, DomainError, QueryProvider, RequestContext, UpdateContext,
    repository::{FnRepository, MethodSignature, OperationParam, RepositoryRegistry},
    update,
};
use odata_engine_test_utils::{assert_error_msg, expect_eq, init_test_tracing, mock::*};
use odata_runtime::{query::expression::Queryable, value::Value};

use crate::provider_with;

type WriteLog = Arc<Mutex<Vec<(&'static str, Vec<Value>)>>>;

/// A repository logging every `Save`, `Remove` and `CreateRelation`.
///
/// `GetOne` returns a `MockEntity` carrying the requested key as `ID`.
fn recording_repository(log: &WriteLog) -> FnRepository {
    let mut builder = FnRepository::builder("MockRepository").method(
        MethodSignature::new("GetOne").with_operation_param(OperationParam::SelectOne),
        |arguments| {
            let key = arguments
                .operation()
                .and_then(|operation| operation.key())
                .unwrap_or_default();
            Ok(mock_entity([("ID", Value::text(key))]))
        },
    );

    for (method, arity) in [
        (update::SAVE, 1),
        (update::REMOVE, 1),
        (update::CREATE_RELATION, 2),
    ] {
        let log = log.clone();
        let signature = (0..arity).fold(MethodSignature::new(method), |signature, _| {
            signature.with_entity_param()
        });
        builder = builder.method(signature, move |arguments| {
            let entities = (0..arity)
                .filter_map(|index| arguments.entity(index).cloned())
                .collect();
            log.lock().unwrap().push((method, entities));
            Ok(Value::Null)
        });
    }

    builder.build()
}

fn entity(id: i64) -> Value {
    mock_entity([("ID", Value::I64(id))])
}

#[test]
fn changes_are_dispatched_by_kind() {
    let log = WriteLog::default();
    let provider = provider_with(Arc::new(recording_repository(&log)));
    let mut changes = UpdateContext::new(&provider);

    changes
        .set_reference(entity(1), "Value", Value::text("v"))
        .unwrap();
    expect_eq!(expected = Some(ChangeKind::Modify), actual = changes.change());
    changes.save_changes().unwrap();

    changes.delete_resource(Value::sequence([entity(2)]));
    expect_eq!(expected = Some(ChangeKind::Delete), actual = changes.change());
    changes.save_changes().unwrap();

    changes
        .add_reference_to_collection(
            entity(3),
            "NavigationProperties",
            mock_navigation_property("n"),
        )
        .unwrap();
    expect_eq!(
        expected = Some(ChangeKind::AddReference),
        actual = changes.change()
    );
    changes.save_changes().unwrap();

    expect_eq!(
        expected = vec![
            (
                update::SAVE,
                vec![mock_entity([
                    ("ID", Value::I64(1)),
                    ("Value", Value::text("v"))
                ])]
            ),
            (update::REMOVE, vec![entity(2)]),
            (
                update::CREATE_RELATION,
                vec![entity(3), mock_navigation_property("n")]
            ),
        ],
        actual = log.lock().unwrap().clone()
    );
    expect_eq!(expected = None, actual = changes.change());
    expect_eq!(expected = None, actual = changes.entity());
}

#[test]
fn nothing_to_save() {
    let log = WriteLog::default();
    let provider = provider_with(Arc::new(recording_repository(&log)));

    UpdateContext::new(&provider).save_changes().unwrap();

    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn missing_write_methods_are_ignored() {
    let provider = provider_with(Arc::new(FnRepository::builder("ReadOnlyRepository").build()));
    let mut changes = UpdateContext::new(&provider);

    changes.delete_resource(entity(1));
    changes.save_changes().unwrap();

    expect_eq!(expected = None, actual = changes.change());
}

#[test]
fn unregistered_entity_types_are_ignored() {
    init_test_tracing();
    let provider = QueryProvider::builder(
        mock_schema(),
        Arc::new(RepositoryRegistry::default()),
    )
    .build();
    let mut changes = UpdateContext::new(&provider);

    changes.delete_resource(entity(1));
    changes.save_changes().unwrap();

    expect_eq!(expected = None, actual = changes.create_resource(MOCK_ENTITY).unwrap());
}

#[test]
fn temporary_key_marks_a_create() {
    let log = WriteLog::default();
    let provider = provider_with(Arc::new(recording_repository(&log)));
    let ctx = RequestContext::default();
    let mut changes = UpdateContext::new(&provider);

    let existing = changes
        .get_resource(&Queryable::source(MOCK_ENTITY).key("ID", "7").into_expr(), &ctx)
        .unwrap()
        .cloned();
    expect_eq!(
        expected = Some(mock_entity([("ID", Value::text("7"))])),
        actual = existing
    );
    expect_eq!(expected = None, actual = changes.change());

    changes
        .get_resource(
            &Queryable::source(MOCK_ENTITY).key("ID", "temp-1").into_expr(),
            &ctx,
        )
        .unwrap();
    expect_eq!(expected = Some(ChangeKind::Create), actual = changes.change());

    changes.save_changes().unwrap();
    expect_eq!(
        expected = vec![(
            update::SAVE,
            vec![mock_entity([("ID", Value::text("temp-1"))])]
        )],
        actual = log.lock().unwrap().clone()
    );
}

#[test]
fn default_resources_without_repository_support() {
    let provider = provider_with(Arc::new(FnRepository::builder("MockRepository").build()));
    let mut changes = UpdateContext::new(&provider);

    let complex = changes.create_resource(MOCK_COMPLEX_TYPE).unwrap();
    expect_eq!(
        expected = Some(Value::new_struct(
            MOCK_COMPLEX_TYPE,
            [("Name", Value::Null), ("Description", Value::Null)]
        )),
        actual = complex
    );
    expect_eq!(expected = None, actual = changes.entity());

    let created = changes.create_resource(MOCK_NAVIGATION_PROPERTY).unwrap();
    expect_eq!(
        expected = Some(Value::new_struct(
            MOCK_NAVIGATION_PROPERTY,
            [("ID", Value::Null), ("Value", Value::Null)]
        )),
        actual = created
    );
    expect_eq!(expected = created.as_ref(), actual = changes.entity());
    expect_eq!(expected = Some(ChangeKind::Create), actual = changes.change());

    assert_error_msg!(
        changes.create_resource("Mock.Unknown"),
        "entity type Mock.Unknown not found"
    );
}

#[test]
fn default_resources_from_the_repository() {
    let repository = FnRepository::builder("MockRepository")
        .method(MethodSignature::new(update::CREATE_DEFAULT_ENTITY), |_| {
            Ok(mock_entity([("ID", Value::text("temp-0"))]))
        })
        .method(
            MethodSignature::new(update::CREATE_DEFAULT_COMPLEX_TYPE).with_param("typeName"),
            |arguments| {
                Ok(Value::new_struct(
                    arguments.value(0).unwrap_or_default(),
                    [("Name", Value::text("default"))],
                ))
            },
        )
        .build();
    let provider = provider_with(Arc::new(repository));
    let mut changes = UpdateContext::new(&provider);

    expect_eq!(
        expected = Some(Value::new_struct(
            MOCK_COMPLEX_TYPE,
            [("Name", Value::text("default"))]
        )),
        actual = changes.create_resource(MOCK_COMPLEX_TYPE).unwrap()
    );
    expect_eq!(
        expected = Some(mock_entity([("ID", Value::text("temp-0"))])),
        actual = changes.create_resource(MOCK_ENTITY).unwrap()
    );
}

#[test]
fn values_of_the_pending_entity() {
    let log = WriteLog::default();
    let provider = provider_with(Arc::new(recording_repository(&log)));
    let mut changes = UpdateContext::new(&provider);

    assert_error_msg!(
        changes.set_value("Value", Value::text("v")),
        "no entity is being updated"
    );

    changes.create_resource(MOCK_ENTITY).unwrap();
    changes.set_value("Value", Value::text("v")).unwrap();
    expect_eq!(
        expected = Some(&Value::text("v")),
        actual = changes.get_value("Value")
    );

    assert_error_msg!(
        changes.set_value("Missing", Value::Null),
        "property `Missing` not found on Mock.MockEntity"
    );
    assert_error_msg!(
        changes.add_reference_to_collection(entity(1), "Value", entity(2)),
        "navigation property `Value` not found on Mock.MockEntity"
    );
    assert_error_msg!(
        changes.add_reference_to_collection(Value::I64(1), "Value", entity(2)),
        "expected an entity, found integer value"
    );

    changes.clear_changes();
    expect_eq!(expected = None, actual = changes.change());
    expect_eq!(expected = None, actual = changes.get_value("Value"));
}

#[test]
fn repository_errors_become_service_faults() {
    let repository = FnRepository::builder("MockRepository")
        .method(
            MethodSignature::new(update::SAVE).with_entity_param(),
            |_| Err(DomainError::repository(anyhow!("disk full"))),
        )
        .build();
    let provider = provider_with(Arc::new(repository));
    let mut changes = UpdateContext::new(&provider);

    changes.set_reference(entity(1), "Value", Value::Null).unwrap();
    let error = changes.save_changes().unwrap_err();

    expect_eq!(
        expected = Some(500),
        actual = error.as_service_fault().map(|fault| fault.status_code)
    );
    expect_eq!(expected = "disk full", actual = error.to_string());
    expect_eq!(expected = Some(ChangeKind::Modify), actual = changes.change());
}
