mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::json;
use sqlx::PgPool;

struct Fixture {
    app: axum::Router,
    character: String,
    connery: String,
    moore: String,
}

async fn fixture(pool: PgPool) -> Fixture {
    let app = build_test_app(pool).await;
    let connery = create_actor(&app, "Sean", "Connery", "1930-08-25", None).await;
    let moore = create_actor(&app, "Roger", "Moore", "1927-10-14", None).await;
    let character = create(&app, "/api/characters", json!({"name": "James Bond"})).await;
    Fixture {
        app,
        character,
        connery,
        moore,
    }
}

#[sqlx::test]
async fn post_adds_and_put_replaces_links(pool: PgPool) {
    let f = fixture(pool).await;
    let actors = format!("{}/actors", f.character);

    let res = post_uri_list(&f.app, &actors, &[&uri(&f.connery)]).await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);
    let res = post_uri_list(&f.app, &actors, &[&f.moore, &uri(&f.connery)]).await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);
    assert_eq!(get(&f.app, &actors).await.body["_embedded"]["actors"].as_array().unwrap().len(), 2);

    let res = put_uri_list(&f.app, &actors, &[&uri(&f.moore)]).await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);
    let res = get(&f.app, &actors).await;
    assert_eq!(embedded_field(&res.body, "actors", "last_name"), vec![json!("Moore")]);
}

#[sqlx::test]
async fn reads_and_removes_single_link(pool: PgPool) {
    let f = fixture(pool).await;
    let actors = format!("{}/actors", f.character);
    put_uri_list(&f.app, &actors, &[&uri(&f.connery), &uri(&f.moore)]).await;

    let connery_id = f.connery.rsplit('/').next().unwrap();
    let linked = format!("{}/{}", actors, connery_id);
    let res = get(&f.app, &linked).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["last_name"], "Connery");
    assert_eq!(res.body["_links"]["self"]["href"], uri(&f.connery));

    assert_eq!(delete(&f.app, &linked).await.status, StatusCode::NO_CONTENT);
    assert_eq!(get(&f.app, &linked).await.status, StatusCode::NOT_FOUND);
    assert_eq!(delete(&f.app, &linked).await.status, StatusCode::NOT_FOUND);
    assert_eq!(get(&f.app, &f.connery).await.status, StatusCode::OK);
}

#[sqlx::test]
async fn delete_clears_to_many_association(pool: PgPool) {
    let f = fixture(pool).await;
    let actors = format!("{}/actors", f.character);
    put_uri_list(&f.app, &actors, &[&uri(&f.connery), &uri(&f.moore)]).await;

    assert_eq!(delete(&f.app, &actors).await.status, StatusCode::NO_CONTENT);
    assert_eq!(get(&f.app, &actors).await.body["_embedded"]["actors"], json!([]));
}

#[sqlx::test]
async fn rejects_bad_uri_lists(pool: PgPool) {
    let f = fixture(pool).await;
    let actors = format!("{}/actors", f.character);

    let res = post_json(&f.app, &actors, json!([uri(&f.connery)])).await;
    assert_eq!(res.status, StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let res = put_uri_list(&f.app, &actors, &[&uri(&f.character)]).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = put_uri_list(&f.app, &actors, &[&uri("/api/actors/999")]).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = put_uri_list(&f.app, "/api/characters/999/actors", &[&uri(&f.connery)]).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = put_uri_list(&f.app, &format!("{}/villains", f.character), &[&uri(&f.connery)]).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}
