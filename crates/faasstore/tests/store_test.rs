use faascore::{Function, FunctionError, Language, MetricsSample, RuntimeKind};
use faasstore::{Store, StoreError};

fn sample_function(name: &str, route: &str) -> Function {
    Function::new(name, route, Language::Python)
        .with_code("print('hi')")
        .with_timeout(10)
}

#[test]
fn insert_assigns_sequential_ids() {
    let store = Store::open_in_memory().unwrap();

    let first = store.insert_function(&sample_function("a", "/a")).unwrap();
    let second = store.insert_function(&sample_function("b", "/b")).unwrap();

    assert_eq!(first, 1);
    assert_eq!(second, 2);
}

#[test]
fn get_round_trips_settings() {
    let store = Store::open_in_memory().unwrap();
    let mut function = sample_function("hello", "/hello");
    function
        .settings
        .insert("env".to_string(), "prod".to_string());

    let id = store.insert_function(&function).unwrap();
    let loaded = store.get_function(id).unwrap();

    assert_eq!(loaded.id, id);
    assert_eq!(loaded.name, "hello");
    assert_eq!(loaded.code(), Some("print('hi')"));
    assert_eq!(loaded.settings.get("env").map(String::as_str), Some("prod"));
    assert_eq!(loaded.language, Language::Python);
    assert_eq!(loaded.timeout_secs, 10);
}

#[test]
fn get_unknown_id_is_not_found() {
    let store = Store::open_in_memory().unwrap();
    match store.get_function(42) {
        Err(StoreError::Function(FunctionError::NotFound(42))) => {}
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[test]
fn duplicate_route_is_rejected() {
    let store = Store::open_in_memory().unwrap();
    store.insert_function(&sample_function("a", "/same")).unwrap();

    match store.insert_function(&sample_function("b", "/same")) {
        Err(StoreError::Function(FunctionError::RouteTaken(route))) => {
            assert_eq!(route, "/same")
        }
        other => panic!("expected RouteTaken, got {other:?}"),
    }
}

#[test]
fn invalid_function_is_rejected_before_insert() {
    let store = Store::open_in_memory().unwrap();
    let function = Function::new("bad", "no-slash", Language::Node);
    assert!(store.insert_function(&function).is_err());
    assert!(store.list_functions().unwrap().is_empty());
}

#[test]
fn update_replaces_definition_and_keeps_id() {
    let store = Store::open_in_memory().unwrap();
    let id = store.insert_function(&sample_function("a", "/a")).unwrap();

    let replacement = Function::new("a2", "/a2", Language::Node)
        .with_code("console.log('hi')")
        .with_runtime(RuntimeKind::Runsc)
        .with_timeout(5);
    let updated = store.update_function(id, &replacement).unwrap();

    assert_eq!(updated.id, id);
    assert_eq!(updated.name, "a2");
    assert_eq!(updated.runtime, RuntimeKind::Runsc);
    assert_eq!(store.find_by_route("/a2").unwrap().id, id);
}

#[test]
fn update_unknown_id_is_not_found() {
    let store = Store::open_in_memory().unwrap();
    let res = store.update_function(9, &sample_function("x", "/x"));
    assert!(matches!(
        res,
        Err(StoreError::Function(FunctionError::NotFound(9)))
    ));
}

#[test]
fn delete_removes_function_but_ids_do_not_shift() {
    let store = Store::open_in_memory().unwrap();
    let first = store.insert_function(&sample_function("a", "/a")).unwrap();
    let second = store.insert_function(&sample_function("b", "/b")).unwrap();

    store.delete_function(first).unwrap();

    assert!(store.get_function(first).is_err());
    assert_eq!(store.get_function(second).unwrap().name, "b");

    // New inserts never reuse a deleted id
    let third = store.insert_function(&sample_function("c", "/c")).unwrap();
    assert!(third > second);
}

#[test]
fn find_by_route_unknown_route_errors() {
    let store = Store::open_in_memory().unwrap();
    assert!(matches!(
        store.find_by_route("/nope"),
        Err(StoreError::Function(FunctionError::UnknownRoute(_)))
    ));
}

#[test]
fn latest_metrics_returns_most_recent_row() {
    let store = Store::open_in_memory().unwrap();

    let mut older = MetricsSample::new("f", RuntimeKind::Runc);
    older.response_time = 1.0;
    store.record_metrics(&older).unwrap();

    let mut newer = MetricsSample::new("f", RuntimeKind::Runsc);
    newer.response_time = 2.0;
    newer.stdout = "out".to_string();
    newer.error = true;
    store.record_metrics(&newer).unwrap();

    let latest = store.latest_metrics("f").unwrap().unwrap();
    assert_eq!(latest.response_time, 2.0);
    assert_eq!(latest.runtime, RuntimeKind::Runsc);
    assert_eq!(latest.stdout, "out");
    assert!(latest.error);
}

#[test]
fn latest_metrics_for_unknown_function_is_none() {
    let store = Store::open_in_memory().unwrap();
    assert!(store.latest_metrics("ghost").unwrap().is_none());
}

#[test]
fn aggregate_groups_by_function_and_runtime() {
    let store = Store::open_in_memory().unwrap();

    for (rt, response, mem, err) in [
        (RuntimeKind::Runc, 1.0, 10.0, false),
        (RuntimeKind::Runc, 3.0, 30.0, true),
        (RuntimeKind::Runsc, 5.0, 50.0, false),
    ] {
        let mut s = MetricsSample::new("f", rt);
        s.response_time = response;
        s.memory_usage = mem;
        s.error = err;
        store.record_metrics(&s).unwrap();
    }

    let aggregates = store.aggregate_metrics().unwrap();
    assert_eq!(aggregates.len(), 2);

    let runc = aggregates
        .iter()
        .find(|a| a.runtime == RuntimeKind::Runc)
        .unwrap();
    assert_eq!(runc.avg_response_time, 2.0);
    assert_eq!(runc.avg_memory_usage_mb, 20.0);
    assert_eq!(runc.error_count, 1);

    let runsc = aggregates
        .iter()
        .find(|a| a.runtime == RuntimeKind::Runsc)
        .unwrap();
    assert_eq!(runsc.avg_response_time, 5.0);
    assert_eq!(runsc.error_count, 0);
}
