mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::json;
use sqlx::PgPool;

#[sqlx::test]
async fn creates_and_reads_director(pool: PgPool) {
    let app = build_test_app(pool).await;
    let path = create_director(&app, "Terence", "Young").await;

    let res = get(&app, &path).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["first_name"], "Terence");
    assert_eq!(res.body["_links"]["director"]["href"], uri(&path));
    assert_eq!(res.body["_links"]["movies"]["href"], uri(&format!("{}/movies", path)));
}

#[sqlx::test]
async fn plain_json_when_requested(pool: PgPool) {
    let app = build_test_app(pool).await;
    let path = create_director(&app, "Guy", "Hamilton").await;

    let res = get_accepting(&app, &path, "application/json").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.content_type(), "application/json");
    assert_eq!(res.body["last_name"], "Hamilton");

    let res = get_accepting(&app, "/api/directors", "application/hal+json").await;
    assert_eq!(res.content_type(), "application/hal+json");
}

#[sqlx::test]
async fn filters_directors(pool: PgPool) {
    let app = build_test_app(pool).await;
    create_director(&app, "Terence", "Young").await;
    create_director(&app, "Guy", "Hamilton").await;
    create_director(&app, "Lewis", "Gilbert").await;

    let res = get(&app, "/api/directors?lastName=IL").await;
    let mut names = embedded_field(&res.body, "directors", "last_name");
    names.sort_by(|a, b| a.as_str().cmp(&b.as_str()));
    assert_eq!(names, vec![json!("Gilbert"), json!("Hamilton")]);
}

#[sqlx::test]
async fn movies_are_read_only_from_director(pool: PgPool) {
    let app = build_test_app(pool).await;
    let director = create_director(&app, "Terence", "Young").await;
    let movie = create(
        &app,
        "/api/movies",
        json!({"title": "Dr. No", "release_date": "1962-10-05", "director": uri(&director)}),
    )
    .await;

    let res = get(&app, &format!("{}/movies", director)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(embedded_field(&res.body, "movies", "title"), vec![json!("Dr. No")]);

    let res = patch_json(&app, &director, json!({"movies": [uri(&movie)]})).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = put_uri_list(&app, &format!("{}/movies", director), &[&uri(&movie)]).await;
    assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED);
    let res = delete(&app, &format!("{}/movies", director)).await;
    assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED);
}

#[sqlx::test]
async fn referenced_director_cannot_be_deleted(pool: PgPool) {
    let app = build_test_app(pool).await;
    let director = create_director(&app, "Terence", "Young").await;
    let movie = create(
        &app,
        "/api/movies",
        json!({"title": "Thunderball", "release_date": "1965-12-09", "director": uri(&director)}),
    )
    .await;

    let res = delete(&app, &director).await;
    assert_eq!(res.status, StatusCode::CONFLICT);
    assert_eq!(res.body["error"]["code"], "conflict");

    assert_eq!(delete(&app, &movie).await.status, StatusCode::NO_CONTENT);
    assert_eq!(delete(&app, &director).await.status, StatusCode::NO_CONTENT);
}
