mod common;

use std::sync::Arc;

use common::{invoice_fields, payload, TestFixture, TENANT_A, TENANT_B};
use foliodb::documents::CollectionConfigCache;
use foliodb::{EngineError, FieldDefinition, FieldType, SchemaCreate};
use serde_json::json;

fn invoice_number_fields(unique: bool) -> Vec<FieldDefinition> {
    let field = FieldDefinition::new("invoice_number", FieldType::String).required();
    vec![if unique { field.unique() } else { field }]
}

#[test]
fn invoice_lifecycle_with_index_enforced_uniqueness() {
    let fx = TestFixture::new();
    fx.engine
        .create_schema(
            SchemaCreate::new(TENANT_A, "invoice")
                .with_fields(invoice_number_fields(true))
                .active(),
        )
        .unwrap();

    let refs = fx
        .engine
        .create_documents(
            TENANT_A,
            "invoice",
            vec![payload(json!({"invoice_number": "INV-001"}))],
            Some("user-1"),
        )
        .unwrap();
    let doc = fx
        .engine
        .get_document(TENANT_A, "invoice", &refs[0].id)
        .unwrap();
    assert_eq!(doc["invoice_number"], json!("INV-001"));

    // Uniqueness is index-enforced, not validator-enforced: the duplicate
    // passes validation and fails at the storage layer.
    let err = fx
        .engine
        .create_documents(
            TENANT_A,
            "invoice",
            vec![payload(json!({"invoice_number": "INV-001"}))],
            None,
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
}

#[test]
fn uniqueness_is_scoped_per_tenant() {
    let fx = TestFixture::new();
    for tenant in [TENANT_A, TENANT_B] {
        fx.engine
            .create_schema(
                SchemaCreate::new(tenant, "invoice")
                    .with_fields(invoice_number_fields(true))
                    .active(),
            )
            .unwrap();
    }

    for tenant in [TENANT_A, TENANT_B] {
        fx.engine
            .create_documents(
                tenant,
                "invoice",
                vec![payload(json!({"invoice_number": "INV-001"}))],
                None,
            )
            .unwrap();
    }
}

#[test]
fn dropping_the_unique_flag_heals_on_the_next_write() {
    let fx = TestFixture::new();
    fx.engine
        .create_schema(
            SchemaCreate::new(TENANT_A, "invoice")
                .with_fields(invoice_number_fields(true))
                .active(),
        )
        .unwrap();
    fx.engine
        .create_documents(
            TENANT_A,
            "invoice",
            vec![payload(json!({"invoice_number": "INV-001"}))],
            None,
        )
        .unwrap();

    // Version 2 keeps the field but drops the uniqueness declaration.
    fx.engine
        .create_schema(
            SchemaCreate::new(TENANT_A, "invoice")
                .with_fields(invoice_number_fields(false))
                .active(),
        )
        .unwrap();

    // The next write reconciles against the live schema, drops the stale
    // index, and the duplicate goes through.
    fx.engine
        .create_documents(
            TENANT_A,
            "invoice",
            vec![payload(json!({"invoice_number": "INV-001"}))],
            None,
        )
        .unwrap();

    let docs = fx.engine.list_documents(TENANT_A, "invoice", 0, 10).unwrap();
    assert_eq!(docs.len(), 2);
}

#[test]
fn cached_field_lists_stay_stale_until_cleared() {
    let fx = TestFixture::new();
    fx.engine
        .create_schema(
            SchemaCreate::new(TENANT_A, "invoice")
                .with_fields(invoice_number_fields(false))
                .active(),
        )
        .unwrap();
    fx.engine
        .create_documents(
            TENANT_A,
            "invoice",
            vec![payload(json!({"invoice_number": "INV-001"}))],
            None,
        )
        .unwrap();

    // Version 2 adds a new required field.
    let mut fields = invoice_number_fields(false);
    fields.push(FieldDefinition::new("due_date", FieldType::Date).required());
    fx.engine
        .create_schema(
            SchemaCreate::new(TENANT_A, "invoice")
                .with_fields(fields)
                .active(),
        )
        .unwrap();

    // The cached config still validates against version 1.
    fx.engine
        .create_documents(
            TENANT_A,
            "invoice",
            vec![payload(json!({"invoice_number": "INV-002"}))],
            None,
        )
        .unwrap();

    // Clearing the cache is the documented invalidation trigger.
    fx.engine.clear_collection_cache();
    let err = fx
        .engine
        .create_documents(
            TENANT_A,
            "invoice",
            vec![payload(json!({"invoice_number": "INV-003"}))],
            None,
        )
        .unwrap_err();
    match err {
        EngineError::Validation(report) => {
            assert!(report.to_string().contains("due_date"));
        }
        other => panic!("expected validation error, got {other}"),
    }

    fx.engine
        .create_documents(
            TENANT_A,
            "invoice",
            vec![payload(json!({
                "invoice_number": "INV-003",
                "due_date": "2026-09-01",
            }))],
            None,
        )
        .unwrap();
}

#[test]
fn cache_returns_the_same_config_object_per_key() {
    let fx = TestFixture::new();
    let cache = CollectionConfigCache::new(fx.engine.db_ops().clone());

    let first = cache.get_or_create(TENANT_A, "invoice", &[]).unwrap();
    // A different field list for the same key still returns the cached
    // object, field list included.
    let second = cache
        .get_or_create(TENANT_A, "invoice", &invoice_fields())
        .unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert!(second.fields().is_empty());

    cache.clear();
    let rebuilt = cache
        .get_or_create(TENANT_A, "invoice", &invoice_fields())
        .unwrap();
    assert!(!Arc::ptr_eq(&first, &rebuilt));
    assert_eq!(rebuilt.fields().len(), invoice_fields().len());
}

#[test]
fn cached_configs_are_shared_per_pair() {
    let fx = TestFixture::new();
    fx.create_invoice_schema(TENANT_A);
    fx.engine
        .create_documents(
            TENANT_A,
            "invoice",
            vec![payload(json!({"invoice_number": "INV-001", "amount": 1}))],
            None,
        )
        .unwrap();
    fx.engine
        .list_documents(TENANT_A, "invoice", 0, 10)
        .unwrap();

    let keys = fx.engine.cached_collections();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0], (TENANT_A.to_string(), "invoice".to_string()));
}
