mod common;

use std::sync::Arc;
use std::thread;

use common::{invoice_fields, TestFixture, TENANT_A, TENANT_B};
use foliodb::{EngineError, FieldDefinition, FieldType, SchemaCreate, SchemaPatch};

#[test]
fn versions_are_auto_assigned_monotonically() {
    let fx = TestFixture::new();
    let v1 = fx
        .engine
        .create_schema(SchemaCreate::new(TENANT_A, "invoice").with_fields(invoice_fields()))
        .unwrap();
    let v2 = fx
        .engine
        .create_schema(SchemaCreate::new(TENANT_A, "invoice").with_fields(invoice_fields()))
        .unwrap();
    assert_eq!(v1.version, 1);
    assert_eq!(v2.version, 2);
}

#[test]
fn explicit_version_reuse_is_a_conflict() {
    let fx = TestFixture::new();
    fx.engine
        .create_schema(SchemaCreate::new(TENANT_A, "invoice").with_version(3))
        .unwrap();
    let err = fx
        .engine
        .create_schema(SchemaCreate::new(TENANT_A, "invoice").with_version(3))
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
}

#[test]
fn version_zero_is_rejected() {
    let fx = TestFixture::new();
    let err = fx
        .engine
        .create_schema(SchemaCreate::new(TENANT_A, "invoice").with_version(0))
        .unwrap_err();
    assert!(matches!(err, EngineError::BadRequest(_)));
}

#[test]
fn deleted_versions_do_not_block_renumbering() {
    let fx = TestFixture::new();
    fx.engine
        .create_schema(SchemaCreate::new(TENANT_A, "invoice"))
        .unwrap();
    let v2 = fx
        .engine
        .create_schema(SchemaCreate::new(TENANT_A, "invoice"))
        .unwrap();
    fx.engine.delete_schema(&v2.id).unwrap();

    let next = fx
        .engine
        .create_schema(SchemaCreate::new(TENANT_A, "invoice"))
        .unwrap();
    assert_eq!(next.version, 2);
}

#[test]
fn creating_an_active_version_deactivates_the_others() {
    let fx = TestFixture::new();
    let v1 = fx
        .engine
        .create_schema(SchemaCreate::new(TENANT_A, "invoice").active())
        .unwrap();
    assert!(v1.is_active);

    let v2 = fx
        .engine
        .create_schema(SchemaCreate::new(TENANT_A, "invoice").active())
        .unwrap();
    assert!(v2.is_active);

    let versions = fx.engine.list_schema_versions(TENANT_A, "invoice").unwrap();
    let active: Vec<_> = versions.iter().filter(|s| s.is_active).collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].version, 2);
}

#[test]
fn activate_flips_back_to_an_older_version() {
    let fx = TestFixture::new();
    let v1 = fx
        .engine
        .create_schema(SchemaCreate::new(TENANT_A, "invoice").active())
        .unwrap();
    fx.engine
        .create_schema(SchemaCreate::new(TENANT_A, "invoice").active())
        .unwrap();

    let reactivated = fx.engine.activate_schema(&v1.id).unwrap();
    assert!(reactivated.is_active);

    let versions = fx.engine.list_schema_versions(TENANT_A, "invoice").unwrap();
    let active: Vec<_> = versions.iter().filter(|s| s.is_active).collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].version, 1);
}

#[test]
fn update_can_activate_and_replace_fields() {
    let fx = TestFixture::new();
    let v1 = fx
        .engine
        .create_schema(
            SchemaCreate::new(TENANT_A, "invoice")
                .with_fields(invoice_fields())
                .active(),
        )
        .unwrap();
    let v2 = fx
        .engine
        .create_schema(SchemaCreate::new(TENANT_A, "invoice").with_fields(invoice_fields()))
        .unwrap();

    let new_fields = vec![FieldDefinition::new("total", FieldType::Number).required()];
    let updated = fx
        .engine
        .update_schema(
            &v2.id,
            SchemaPatch {
                fields: Some(new_fields),
                description: Some("second shape".to_string()),
                is_active: Some(true),
                updated_by: None,
            },
        )
        .unwrap();
    assert!(updated.is_active);
    assert_eq!(updated.fields.len(), 1);
    assert_eq!(updated.fields[0].name, "total");
    assert_eq!(updated.description.as_deref(), Some("second shape"));

    let v1_after = fx.engine.get_schema(&v1.id).unwrap();
    assert!(!v1_after.is_active);
    assert!(v1_after.updated_at > v1.updated_at);
}

#[test]
fn list_versions_is_newest_first_and_missing_pair_is_not_found() {
    let fx = TestFixture::new();
    for _ in 0..3 {
        fx.engine
            .create_schema(SchemaCreate::new(TENANT_A, "invoice"))
            .unwrap();
    }
    let versions = fx.engine.list_schema_versions(TENANT_A, "invoice").unwrap();
    let numbers: Vec<u32> = versions.iter().map(|s| s.version).collect();
    assert_eq!(numbers, vec![3, 2, 1]);

    let err = fx
        .engine
        .list_schema_versions(TENANT_A, "purchase_order")
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[test]
fn get_active_requires_an_active_version() {
    let fx = TestFixture::new();
    fx.engine
        .create_schema(SchemaCreate::new(TENANT_A, "invoice"))
        .unwrap();
    let err = fx.engine.get_active_schema(TENANT_A, "invoice").unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[test]
fn tenants_do_not_see_each_others_schemas() {
    let fx = TestFixture::new();
    fx.engine
        .create_schema(SchemaCreate::new(TENANT_A, "invoice").active())
        .unwrap();
    assert!(fx
        .engine
        .list_schemas_for_tenant(TENANT_B)
        .unwrap()
        .is_empty());
    let err = fx.engine.get_active_schema(TENANT_B, "invoice").unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[test]
fn batch_create_rejects_duplicates_and_bad_input() {
    let fx = TestFixture::new();

    let err = fx.engine.create_schemas(Vec::new()).unwrap_err();
    assert!(matches!(err, EngineError::BadRequest(_)));

    let err = fx
        .engine
        .create_schemas(vec![SchemaCreate::new("not-a-uuid", "invoice")])
        .unwrap_err();
    assert!(matches!(err, EngineError::BadRequest(_)));

    let err = fx
        .engine
        .create_schemas(vec![
            SchemaCreate::new(TENANT_A, "invoice"),
            SchemaCreate::new(TENANT_A, "invoice"),
        ])
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));

    // Nothing from the rejected batch may have been written.
    assert!(fx
        .engine
        .list_schemas_for_tenant(TENANT_A)
        .unwrap()
        .is_empty());
}

#[test]
fn duplicate_field_names_in_a_schema_are_rejected() {
    let fx = TestFixture::new();
    let fields = vec![
        FieldDefinition::new("sku", FieldType::String),
        FieldDefinition::new("sku", FieldType::Number),
    ];
    let err = fx
        .engine
        .create_schema(SchemaCreate::new(TENANT_A, "invoice").with_fields(fields))
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
}

#[test]
fn concurrent_activations_keep_a_single_active_version() {
    let fx = TestFixture::new();
    let v1 = fx
        .engine
        .create_schema(SchemaCreate::new(TENANT_A, "invoice"))
        .unwrap();
    let v2 = fx
        .engine
        .create_schema(SchemaCreate::new(TENANT_A, "invoice"))
        .unwrap();

    let engine = Arc::new(fx.engine);
    let mut handles = Vec::new();
    for _ in 0..4 {
        for id in [v1.id.clone(), v2.id.clone()] {
            let engine = Arc::clone(&engine);
            handles.push(thread::spawn(move || {
                engine.activate_schema(&id).unwrap();
            }));
        }
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let versions = engine.list_schema_versions(TENANT_A, "invoice").unwrap();
    let active = versions.iter().filter(|s| s.is_active).count();
    assert_eq!(active, 1);
}
