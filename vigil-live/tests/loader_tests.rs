use serde_json::json;
use std::sync::{Arc, Mutex};
use vigil_live::{BindMode, EntityLoader, EntityRegistry, LoadError};
use vigil_model::{
    EntityTypeVersion, LazyLoadDirective, LifecycleState, PropertyDescriptor,
};
use vigil_types::{EntityUid, Record};

fn make_registry() -> EntityRegistry {
    let registry = EntityRegistry::new();
    registry
        .register(
            EntityTypeVersion::new("Order", 1)
                .with_key("number")
                .with_property(PropertyDescriptor::text("number").required())
                .with_property(
                    PropertyDescriptor::text("status")
                        .required()
                        .with_ui("catalog", "Status", 2),
                )
                .with_property(PropertyDescriptor::number("total").with_ui("catalog", "Total", 1))
                .with_property(PropertyDescriptor::relation("Customer"))
                .with_property(PropertyDescriptor::relation("Comments")),
        )
        .unwrap();
    registry
}

fn make_loader(registry: &EntityRegistry) -> Arc<EntityLoader> {
    registry.loader("Order").unwrap()
}

fn make_record(key: &str) -> Record {
    Record::new(key, "Order")
        .with_field("number", key)
        .with_field("status", "open")
        .with_field("total", 99.5)
        .with_field("Customer", json!({"name": "Ada"}))
        .with_field("Comments", json!(["first!"]))
}

// ── create_entity ────────────────────────────────────────────────

#[test]
fn create_builds_an_idle_entity_with_bound_fields() {
    let registry = make_registry();
    let loader = make_loader(&registry);

    let entity = loader
        .create_entity(&make_record("ord-1"), &LazyLoadDirective::default())
        .unwrap();

    assert_eq!(entity.state(), LifecycleState::Idle);
    assert_eq!(entity.type_name(), "Order");
    assert_eq!(entity.key().as_str(), "ord-1");
    assert_eq!(entity.property("number"), Some(&json!("ord-1")));
    assert_eq!(entity.property("status"), Some(&json!("open")));
    assert_eq!(entity.property("total"), Some(&json!(99.5)));
    // Relation fields never land in the property map.
    assert_eq!(entity.property("Customer"), None);
}

#[test]
fn create_assigns_increasing_uids() {
    let registry = make_registry();
    let loader = make_loader(&registry);

    let a = loader
        .create_entity(&make_record("ord-1"), &LazyLoadDirective::default())
        .unwrap();
    let b = loader
        .create_entity(&make_record("ord-2"), &LazyLoadDirective::default())
        .unwrap();

    assert_eq!(a.uid(), EntityUid::from_raw(1));
    assert_eq!(b.uid(), EntityUid::from_raw(2));
}

#[test]
fn default_directive_materializes_every_relation() {
    let registry = make_registry();
    let loader = make_loader(&registry);

    let entity = loader
        .create_entity(&make_record("ord-1"), &LazyLoadDirective::default())
        .unwrap();

    assert!(entity.relation("Customer").unwrap().is_loaded());
    assert!(entity.relation("Comments").unwrap().is_loaded());
}

#[test]
fn exclude_directive_leaves_named_relations_lazy() {
    let registry = make_registry();
    let loader = make_loader(&registry);

    let entity = loader
        .create_entity(
            &make_record("ord-1"),
            &LazyLoadDirective::exclude(["Comments"]),
        )
        .unwrap();

    assert!(!entity.relation("Comments").unwrap().is_loaded());
    assert!(entity.relation("Customer").unwrap().is_loaded());
}

#[test]
fn include_directive_materializes_only_named_relations() {
    let registry = make_registry();
    let loader = make_loader(&registry);

    let entity = loader
        .create_entity(
            &make_record("ord-1"),
            &LazyLoadDirective::include(["Customer"]),
        )
        .unwrap();

    assert!(entity.relation("Customer").unwrap().is_loaded());
    assert!(!entity.relation("Comments").unwrap().is_loaded());
}

#[test]
fn lazy_relation_resolves_later() {
    let registry = make_registry();
    let loader = make_loader(&registry);

    let mut entity = loader
        .create_entity(
            &make_record("ord-1"),
            &LazyLoadDirective::include(Vec::<String>::new()),
        )
        .unwrap();

    let slot = entity.relation_mut("Comments").unwrap();
    let value = slot
        .resolve_with("Comments", || Ok(json!(["fetched later"])))
        .unwrap();
    assert_eq!(value, &json!(["fetched later"]));
}

#[test]
fn create_rejects_missing_required_property() {
    let registry = make_registry();
    let loader = make_loader(&registry);

    let record = Record::new("ord-1", "Order").with_field("number", "ord-1");
    let err = loader
        .create_entity(&record, &LazyLoadDirective::default())
        .unwrap_err();

    match err {
        LoadError::SchemaMismatch {
            key,
            type_name,
            version,
            property,
        } => {
            assert_eq!(key, "ord-1");
            assert_eq!(type_name, "Order");
            assert_eq!(version, 1);
            assert_eq!(property, "status");
        }
        other => panic!("expected schema mismatch, got {other:?}"),
    }
}

#[test]
fn create_rejects_foreign_record_type() {
    let registry = make_registry();
    let loader = make_loader(&registry);

    let record = Record::new("inv-1", "Invoice").with_field("number", "inv-1");
    let err = loader
        .create_entity(&record, &LazyLoadDirective::default())
        .unwrap_err();
    assert!(matches!(err, LoadError::TypeMismatch { .. }));
}

#[test]
fn create_installs_required_property_validators() {
    let registry = make_registry();
    let loader = make_loader(&registry);

    let mut entity = loader
        .create_entity(&make_record("ord-1"), &LazyLoadDirective::default())
        .unwrap();
    assert!(entity.validate().unwrap().is_valid());

    // Drop every property; both required validators must now fail.
    entity.restore_properties(serde_json::Map::new());
    let outcome = entity.validate().unwrap();
    assert_eq!(
        outcome.failures,
        vec![
            "required property 'number' is missing".to_string(),
            "required property 'status' is missing".to_string(),
        ]
    );
}

#[test]
fn initialized_channel_fires_per_construction() {
    let registry = make_registry();
    let loader = make_loader(&registry);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    loader.on_initialized(move |args| {
        sink.lock().unwrap().push(args.entity.key.as_str().to_string());
        Ok(())
    });

    loader
        .create_entity(&make_record("ord-1"), &LazyLoadDirective::default())
        .unwrap();
    loader
        .create_entity(&make_record("ord-2"), &LazyLoadDirective::default())
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec!["ord-1", "ord-2"]);
}

#[test]
fn unsubscribed_initialized_listener_hears_nothing() {
    let registry = make_registry();
    let loader = make_loader(&registry);

    let count = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&count);
    let subscription = loader.on_initialized(move |_| {
        *sink.lock().unwrap() += 1;
        Ok(())
    });

    loader
        .create_entity(&make_record("ord-1"), &LazyLoadDirective::default())
        .unwrap();
    assert!(loader.unsubscribe_initialized(subscription));
    loader
        .create_entity(&make_record("ord-2"), &LazyLoadDirective::default())
        .unwrap();

    assert_eq!(*count.lock().unwrap(), 1);
    assert!(!loader.unsubscribe_initialized(subscription));
}

// ── Descriptors ──────────────────────────────────────────────────

#[test]
fn record_descriptor_projects_context_fields() {
    let registry = make_registry();
    let loader = make_loader(&registry);

    let descriptor = loader
        .create_descriptor(&make_record("ord-1"), Some("catalog"))
        .unwrap();

    assert_eq!(descriptor.uid, EntityUid::UNASSIGNED);
    assert_eq!(descriptor.type_name, "Order");
    assert_eq!(descriptor.key.as_str(), "ord-1");
    assert_eq!(descriptor.field("total"), Some(&json!(99.5)));
    assert_eq!(descriptor.field("status"), Some(&json!("open")));
    // "number" carries no catalog configuration.
    assert_eq!(descriptor.field("number"), None);
}

#[test]
fn unscoped_descriptor_carries_all_scalar_fields() {
    let registry = make_registry();
    let loader = make_loader(&registry);

    let descriptor = loader
        .create_descriptor(&make_record("ord-1"), None)
        .unwrap();

    assert_eq!(descriptor.field("number"), Some(&json!("ord-1")));
    assert_eq!(descriptor.field("status"), Some(&json!("open")));
    assert_eq!(descriptor.field("Customer"), None);
}

#[test]
fn entity_descriptor_carries_the_uid() {
    let registry = make_registry();
    let loader = make_loader(&registry);

    let entity = loader
        .create_entity(&make_record("ord-1"), &LazyLoadDirective::default())
        .unwrap();
    let descriptor = loader.describe(&entity, Some("catalog")).unwrap();

    assert_eq!(descriptor.uid, entity.uid());
    assert_eq!(descriptor.field("status"), Some(&json!("open")));
}

// ── bind ─────────────────────────────────────────────────────────

#[test]
fn refresh_bind_reports_changed_names() {
    let registry = make_registry();
    let loader = make_loader(&registry);

    let mut entity = loader
        .create_entity(&make_record("ord-1"), &LazyLoadDirective::default())
        .unwrap();

    let mut updated = make_record("ord-1");
    updated.set_field("status", "shipped");
    updated.set_field("total", 120.0);

    let changed = loader
        .bind(&updated, BindMode::Refresh, &mut entity)
        .unwrap();

    assert_eq!(changed, vec!["status".to_string(), "total".to_string()]);
    assert_eq!(entity.property("status"), Some(&json!("shipped")));
}

#[test]
fn refresh_bind_is_idempotent() {
    let registry = make_registry();
    let loader = make_loader(&registry);

    let mut entity = loader
        .create_entity(&make_record("ord-1"), &LazyLoadDirective::default())
        .unwrap();

    let mut updated = make_record("ord-1");
    updated.set_field("status", "shipped");

    let first = loader
        .bind(&updated, BindMode::Refresh, &mut entity)
        .unwrap();
    assert_eq!(first, vec!["status".to_string()]);

    let second = loader
        .bind(&updated, BindMode::Refresh, &mut entity)
        .unwrap();
    assert!(second.is_empty());
}

#[test]
fn refresh_bind_fires_property_changed() {
    let registry = make_registry();
    let loader = make_loader(&registry);

    let mut entity = loader
        .create_entity(&make_record("ord-1"), &LazyLoadDirective::default())
        .unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    entity
        .events
        .property_changed
        .observe(move |args| sink.lock().unwrap().push(args.property.clone()));

    let mut updated = make_record("ord-1");
    updated.set_field("status", "shipped");
    loader
        .bind(&updated, BindMode::Refresh, &mut entity)
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec!["status".to_string()]);
}

#[test]
fn initial_bind_stays_silent() {
    let registry = make_registry();
    let loader = make_loader(&registry);

    let mut entity = loader
        .create_entity(&make_record("ord-1"), &LazyLoadDirective::default())
        .unwrap();

    let seen = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&seen);
    entity.events.property_changed.observe(move |_| *sink.lock().unwrap() += 1);

    let mut updated = make_record("ord-1");
    updated.set_field("status", "shipped");
    loader
        .bind(&updated, BindMode::Initial, &mut entity)
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), 0);
}

#[test]
fn bind_refreshes_loaded_relations_only() {
    let registry = make_registry();
    let loader = make_loader(&registry);

    let mut entity = loader
        .create_entity(
            &make_record("ord-1"),
            &LazyLoadDirective::exclude(["Comments"]),
        )
        .unwrap();

    let mut updated = make_record("ord-1");
    updated.set_field("Customer", json!({"name": "Grace"}));
    updated.set_field("Comments", json!(["second"]));

    let changed = loader
        .bind(&updated, BindMode::Refresh, &mut entity)
        .unwrap();

    assert_eq!(changed, vec!["Customer".to_string()]);
    assert_eq!(
        entity.relation("Customer").unwrap().value(),
        Some(&json!({"name": "Grace"}))
    );
    // A slot that was never materialized stays lazy.
    assert!(!entity.relation("Comments").unwrap().is_loaded());
}

#[test]
fn bind_rejects_missing_required_property() {
    let registry = make_registry();
    let loader = make_loader(&registry);

    let mut entity = loader
        .create_entity(&make_record("ord-1"), &LazyLoadDirective::default())
        .unwrap();

    let partial = Record::new("ord-1", "Order").with_field("number", "ord-1");
    let err = loader
        .bind(&partial, BindMode::Refresh, &mut entity)
        .unwrap_err();
    assert!(matches!(err, LoadError::SchemaMismatch { .. }));
}
