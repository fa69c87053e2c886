use super::*;

fn create_test_registry() -> Registry {
    let registry = Registry::new_custom(Some("listen".to_string()), None).unwrap();
    register_custom_metrics(&registry).unwrap();
    registry
}

#[test]
fn test_custom_registry() {
    let registry = create_test_registry();

    LISTEN_STREAM_ERRORS.with_label_values(&["transient"]).inc();
    let metrics = &registry.gather();
    assert!(!metrics.is_empty());

    let metric_names: Vec<_> = metrics.iter().map(|m| m.get_name()).collect();
    assert!(
        metric_names.contains(&"listen_listen_stream_errors"),
        "Missing listen_listen_stream_errors"
    );
}

#[test]
fn test_registering_twice_fails() {
    let registry = create_test_registry();

    assert!(register_custom_metrics(&registry).is_err());
}

#[test]
fn test_counter_labels_are_independent() {
    DOCUMENT_CHANGES.with_label_values(&["added"]).reset();
    DOCUMENT_CHANGES.with_label_values(&["removed"]).reset();

    DOCUMENT_CHANGES.with_label_values(&["added"]).inc();
    DOCUMENT_CHANGES.with_label_values(&["added"]).inc();

    assert_eq!(DOCUMENT_CHANGES.with_label_values(&["added"]).get(), 2);
    assert_eq!(DOCUMENT_CHANGES.with_label_values(&["removed"]).get(), 0);
}

#[test]
fn test_gather_metrics_text_format() {
    let registry = create_test_registry();
    SNAPSHOTS_DELIVERED.inc();

    let body = gather_metrics(&registry);

    assert!(body.contains("# TYPE listen_snapshots_delivered counter"));
    assert!(body.contains("listen_active_subscriptions"));
}
