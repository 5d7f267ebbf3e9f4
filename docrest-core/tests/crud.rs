mod common;

use bson::{Bson, doc};
use serde_json::json;

use docrest_core::{
    descriptor::{QueryDescriptor, Request},
    envelope::EnvelopeError,
    error::{EngineError, ErrorKind},
    hooks::Hooks,
    options::{Call, CallOptions, StatusCodes},
    store::DocumentStore,
};
use docrest_memory::InMemoryStore;

use common::{ALICE, CountingStore, id_of, oid, product_rules, products_config, seeded};

fn names(data: &Bson) -> Vec<String> {
    data.as_array()
        .unwrap()
        .iter()
        .map(|item| item.as_document().unwrap().get_str("name").unwrap().to_string())
        .collect()
}

fn qty(data: &Bson) -> i64 {
    match data.as_document().unwrap().get("qty") {
        Some(Bson::Int32(n)) => i64::from(*n),
        Some(Bson::Int64(n)) => *n,
        other => panic!("unexpected qty {other:?}"),
    }
}

fn query(value: serde_json::Value) -> Request {
    Request::from_json(None, &value, None).unwrap()
}

#[tokio::test]
async fn create_one_validates_before_storing() {
    let store = DocumentStore::new(InMemoryStore::new());
    let products = store
        .resource(products_config())
        .unwrap()
        .with_validator(product_rules());

    let failure = products
        .create_one(Request::new().with_body(doc! { "qty": 2 }), &Call::new())
        .await
        .unwrap_err();

    assert_eq!(failure.code, 435);
    assert_eq!(failure.kind(), ErrorKind::Validation);
    assert_eq!(failure.to_string(), "name is required");
    assert_eq!(store.backend().count("products").await, 0);

    let envelope = products
        .create_one(Request::new().with_body(doc! { "name": "Desk", "qty": 2 }), &Call::new())
        .await
        .unwrap();

    assert!(envelope.success);
    assert_eq!(envelope.code, 200);
    let created = envelope.data.as_document().unwrap();
    assert!(created.get_object_id("_id").is_ok());
    assert_eq!(created.get_str("name").unwrap(), "Desk");
    assert_eq!(store.backend().count("products").await, 1);
}

#[tokio::test]
async fn create_many_reports_partial_success() {
    let store = DocumentStore::new(InMemoryStore::new());
    let products = store
        .resource(products_config())
        .unwrap()
        .with_validator(product_rules());

    let body = Bson::Array(vec![
        doc! { "name": "Desk" }.into(),
        doc! { "name": "x" }.into(),
        doc! { "name": "Lamp", "qty": 4 }.into(),
        doc! { "qty": -1 }.into(),
    ]);

    let envelope = products
        .create_many(Request::new().with_body(body), &Call::new())
        .await
        .unwrap();

    assert!(envelope.success);
    assert_eq!(names(&envelope.data), ["Desk", "Lamp"]);

    match envelope.error {
        Some(EnvelopeError::Items(items)) => {
            let keys: Vec<_> = items.iter().map(|item| item.key.as_str()).collect();
            assert_eq!(keys, ["1", "3"]);
            assert_eq!(items[1].messages, ["name is required", "qty must be at least 0"]);
        }
        other => panic!("expected item failures, got {other:?}"),
    }
    assert_eq!(store.backend().count("products").await, 2);
}

#[tokio::test]
async fn create_many_accepts_keyed_candidates() {
    let store = DocumentStore::new(InMemoryStore::new());
    let products = store.resource(products_config()).unwrap();

    let envelope = products
        .create_many(
            Request::new().with_body(doc! { "first": { "name": "Desk" }, "second": "oops" }),
            &Call::new(),
        )
        .await
        .unwrap();

    assert_eq!(envelope.len(), 1);
    match envelope.error {
        Some(EnvelopeError::Items(items)) => assert_eq!(items[0].key, "second"),
        other => panic!("expected item failures, got {other:?}"),
    }
}

#[tokio::test]
async fn get_many_compiles_boolean_strings_to_booleans() {
    let store = DocumentStore::new(seeded().await);
    let products = store.resource(products_config()).unwrap();

    let envelope = products
        .get_many(query(json!({ "where": { "active": "true" } })), &Call::new())
        .await
        .unwrap();

    assert_eq!(names(&envelope.data), ["Desk", "Desk mat"]);
}

#[tokio::test]
async fn get_many_sorts_and_paginates() {
    let store = DocumentStore::new(seeded().await);
    let products = store.resource(products_config()).unwrap();

    let request = Request::new().with_query(
        QueryDescriptor::from_pairs([
            ("sort[qty]", "desc"),
            ("paginate[page]", "2"),
            ("paginate[limit]", "2"),
        ])
        .unwrap(),
    );

    let envelope = products.get_many(request, &Call::new()).await.unwrap();
    assert_eq!(names(&envelope.data), ["Desk", "Chair"]);

    let empty = products
        .get_many(query(json!({ "like": { "name": "sofa" } })), &Call::new())
        .await
        .unwrap();
    assert!(empty.success);
    assert!(empty.is_empty());
}

#[tokio::test]
async fn where_object_wins_over_where_and_like() {
    let store = DocumentStore::new(seeded().await);
    let products = store.resource(products_config()).unwrap();

    let envelope = products
        .get_many(
            query(json!({
                "like": { "owner": "zzz", "name": "desk" },
                "where": { "owner": "nobody" },
                "whereObject": { "owner": ALICE },
            })),
            &Call::new(),
        )
        .await
        .unwrap();

    assert_eq!(names(&envelope.data), ["Desk"]);
}

#[tokio::test]
async fn malformed_identifier_fails_before_touching_the_store() {
    let store = DocumentStore::new(CountingStore::new(seeded().await));
    let products = store.resource(products_config()).unwrap();

    let rejected = Request::from_json(None, &json!({ "whereObject": { "owner": "not-an-id" } }), None).unwrap_err();
    assert_eq!(rejected.kind(), ErrorKind::Execution);
    assert_eq!(Call::new().fail(rejected).code, 500);

    let failure = products
        .get_one_by_id(Request::new().with_id("123"), &Call::new())
        .await
        .unwrap_err();
    assert_eq!(failure.kind(), ErrorKind::Execution);
    assert_eq!(store.backend().calls(), 0);
}

#[tokio::test]
async fn missing_document_is_not_found_with_empty_data() {
    let store = DocumentStore::new(seeded().await);
    let products = store.resource(products_config()).unwrap();

    let failure = products
        .get_one_by_id(Request::new().with_id("64f000000000000000000000"), &Call::new())
        .await
        .unwrap_err();

    let envelope = failure.envelope();
    assert!(!envelope.success);
    assert_eq!(envelope.code, 404);
    assert_eq!(envelope.data, Bson::Document(doc! {}));

    let call = Call::new().with_options(CallOptions {
        codes: StatusCodes { not_found: 410, ..StatusCodes::default() },
        ..CallOptions::default()
    });
    let failure = products
        .get_one_where(query(json!({ "where": { "name": "Sofa" } })), &call)
        .await
        .unwrap_err();
    assert_eq!(failure.code, 410);
}

#[tokio::test]
async fn get_one_by_id_populates_and_projects() {
    let store = DocumentStore::new(seeded().await);
    let products = store.resource(products_config()).unwrap();
    let desk = id_of(store.backend(), "Desk").await;

    let request = Request::from_json(
        Some(desk.to_hex()),
        &json!({ "select": "name owner", "populate": { "owner": true, "category": "0" } }),
        None,
    )
    .unwrap();

    let envelope = products.get_one_by_id(request, &Call::new()).await.unwrap();
    let found = envelope.data.as_document().unwrap();

    assert_eq!(found.get_object_id("_id").unwrap(), desk);
    assert_eq!(found.get_document("owner").unwrap().get_str("name").unwrap(), "Alice");
    assert!(found.get("category").is_none());
    assert!(found.get("qty").is_none());
}

#[tokio::test]
async fn populate_flag_includes_every_relation() {
    let store = DocumentStore::new(seeded().await);
    let products = store.resource(products_config()).unwrap();

    let envelope = products
        .get_many(query(json!({ "like": { "name": "desk" }, "populate": "1" })), &Call::new())
        .await
        .unwrap();

    let items = envelope.data.as_array().unwrap();
    let desk = items[0].as_document().unwrap();
    assert_eq!(desk.get_document("owner").unwrap().get_str("name").unwrap(), "Alice");
    assert_eq!(desk.get_document("category").unwrap().get_str("title").unwrap(), "Furniture");

    // The second desk references an owner that does not exist.
    let mat = items[1].as_document().unwrap();
    assert_eq!(mat.get("owner"), Some(&Bson::Null));
}

#[tokio::test]
async fn update_by_id_patches_and_stamps() {
    let store = DocumentStore::new(seeded().await);
    let products = store
        .resource(products_config())
        .unwrap()
        .with_validator(product_rules());
    let lamp = id_of(store.backend(), "Lamp").await;

    let call = Call::new().with_options(CallOptions {
        updated_at_field: Some("updatedAt".into()),
        ..CallOptions::default()
    });

    let envelope = products
        .update_by_id(
            Request::new()
                .with_id(lamp.to_hex())
                .with_body(doc! { "qty": 12, "_id": "ignored" }),
            &call,
        )
        .await
        .unwrap();

    let updated = envelope.data.as_document().unwrap();
    assert_eq!(updated.get_object_id("_id").unwrap(), lamp);
    assert_eq!(updated.get_i32("qty").unwrap(), 12);
    assert_eq!(updated.get_str("name").unwrap(), "Lamp");
    assert!(updated.get_datetime("updatedAt").is_ok());

    let rejected = products
        .update_by_id(Request::new().with_id(lamp.to_hex()).with_body(doc! { "qty": -3 }), &call)
        .await
        .unwrap_err();
    assert_eq!(rejected.kind(), ErrorKind::Validation);

    let missing = products
        .update_by_id(
            Request::new()
                .with_id("64f000000000000000000000")
                .with_body(doc! { "qty": 1 }),
            &call,
        )
        .await
        .unwrap_err();
    assert_eq!(missing.code, 404);
}

#[tokio::test]
async fn find_update_validates_before_lookup() {
    let store = DocumentStore::new(CountingStore::new(seeded().await));
    let products = store
        .resource(products_config())
        .unwrap()
        .with_validator(product_rules());

    let failure = products
        .find_update(
            Request::from_json(None, &json!({ "where": { "name": "Sofa" } }), Some(&json!({ "name": "x" }))).unwrap(),
            &Call::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(failure.kind(), ErrorKind::Validation);
    assert_eq!(store.backend().calls(), 0);

    let failure = products
        .find_update(
            Request::from_json(None, &json!({ "where": { "name": "Sofa" } }), Some(&json!({ "qty": 1 }))).unwrap(),
            &Call::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(failure.kind(), ErrorKind::NotFound);

    let envelope = products
        .find_update(
            Request::from_json(None, &json!({ "where": { "name": "Desk" } }), Some(&json!({ "qty": 5 }))).unwrap(),
            &Call::new(),
        )
        .await
        .unwrap();
    assert_eq!(qty(&envelope.data), 5);
}

#[tokio::test]
async fn find_update_or_create_branches() {
    let store = DocumentStore::new(seeded().await);
    let products = store
        .resource(products_config())
        .unwrap()
        .with_validator(product_rules());

    // No match and an invalid candidate: nothing is created.
    let failure = products
        .find_update_or_create(
            Request::from_json(None, &json!({ "where": { "sku": "S-1" } }), Some(&json!({ "qty": 1 }))).unwrap(),
            &Call::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(failure.kind(), ErrorKind::Validation);
    assert_eq!(store.backend().count("products").await, 4);

    // No match: the filter equalities seed the created document.
    let created = products
        .find_update_or_create(
            Request::from_json(
                None,
                &json!({ "where": { "sku": "S-1" }, "whereObject": { "owner": ALICE } }),
                Some(&json!({ "name": "Stool" })),
            )
            .unwrap(),
            &Call::new(),
        )
        .await
        .unwrap();
    let created = created.data.as_document().unwrap();
    assert_eq!(created.get_str("sku").unwrap(), "S-1");
    assert_eq!(created.get_object_id("owner").unwrap(), oid(ALICE));
    assert_eq!(store.backend().count("products").await, 5);

    // Match: only update rules apply, so a patch without a name is fine.
    let updated = products
        .find_update_or_create(
            Request::from_json(None, &json!({ "where": { "sku": "S-1" } }), Some(&json!({ "qty": 9 }))).unwrap(),
            &Call::new(),
        )
        .await
        .unwrap();
    assert_eq!(qty(&updated.data), 9);
    assert_eq!(store.backend().count("products").await, 5);
}

#[tokio::test]
async fn delete_by_id_returns_prior_state() {
    let store = DocumentStore::new(seeded().await);
    let products = store.resource(products_config()).unwrap();
    let chair = id_of(store.backend(), "Chair").await;

    let envelope = products
        .delete_by_id(Request::new().with_id(chair.to_hex()), &Call::new())
        .await
        .unwrap();
    assert_eq!(envelope.data.as_document().unwrap().get_str("name").unwrap(), "Chair");

    let failure = products
        .delete_by_id(Request::new().with_id(chair.to_hex()), &Call::new())
        .await
        .unwrap_err();
    assert_eq!(failure.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn hooks_rewrite_requests_and_results() {
    let store = DocumentStore::new(seeded().await);
    let products = store.resource(products_config()).unwrap();

    let hooks = Hooks::new()
        .pre_fn("active-only", |request, _pipeline| {
            request.query = QueryDescriptor::from_json(&json!({ "where": { "active": true } }))?;
            Ok(())
        })
        .post_fn("count", |result| {
            let count = result.as_array().map_or(0, Vec::len) as i64;
            *result = Bson::Document(doc! { "count": count });
            Ok(())
        });

    let envelope = products
        .get_many(Request::new(), &Call::new().with_hooks(hooks))
        .await
        .unwrap();
    assert_eq!(envelope.data, Bson::Document(doc! { "count": 2_i64 }));

    let denying = Hooks::new().pre_fn("deny", |_request, _pipeline| {
        Err(EngineError::Validation(vec!["read access denied".into()]))
    });
    let failure = products
        .get_many(Request::new(), &Call::new().with_hooks(denying))
        .await
        .unwrap_err();
    assert_eq!(failure.code, 435);
    assert_eq!(failure.to_string(), "read access denied");
}

#[tokio::test]
async fn dynamic_store_runs_operations() {
    let store = DocumentStore::new(seeded().await).into_dyn();
    assert!(store.downcast_backend::<InMemoryStore>().is_some());

    let products = store.resource(products_config()).unwrap();
    let envelope = products
        .get_one_where(query(json!({ "where": { "qty": "10" } })), &Call::new())
        .await
        .unwrap();

    assert_eq!(envelope.data.as_document().unwrap().get_str("name").unwrap(), "Lamp");
    store.shutdown().await.unwrap();
}

#[tokio::test]
async fn registration_is_validated() {
    let store = DocumentStore::new(InMemoryStore::new());
    let duplicated = products_config().relation(docrest_core::resource::Relation::new("owner", "people"));

    assert!(store.resource(duplicated).is_err());
}

#[tokio::test]
async fn dotted_select_shapes_writes_like_reads() {
    let store = DocumentStore::new(InMemoryStore::new());
    let products = store.resource(products_config()).unwrap();
    let select = json!({ "select": "address.city" });

    let created = products
        .create_one(
            Request::from_json(None, &select, Some(&json!({ "name": "Desk", "address": { "city": "Lagos", "zip": "100001" } })))
                .unwrap(),
            &Call::new(),
        )
        .await
        .unwrap();

    let id = created.data.as_document().unwrap().get_object_id("_id").unwrap();
    let fetched = products
        .get_one_by_id(Request::from_json(Some(id.to_hex()), &select, None).unwrap(), &Call::new())
        .await
        .unwrap();

    assert_eq!(created.data, Bson::Document(doc! { "_id": id, "address": { "city": "Lagos" } }));
    assert_eq!(created.data, fetched.data);

    let updated = products
        .update_by_id(
            Request::from_json(Some(id.to_hex()), &select, Some(&json!({ "name": "Desk lamp" }))).unwrap(),
            &Call::new(),
        )
        .await
        .unwrap();
    assert_eq!(updated.data, fetched.data);
}
