mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::json;
use sqlx::PgPool;

#[sqlx::test]
async fn creates_character_played_by_actors(pool: PgPool) {
    let app = build_test_app(pool).await;
    let connery = create_actor(&app, "Sean", "Connery", "1930-08-25", Some("2020-10-31")).await;
    let moore = create_actor(&app, "Roger", "Moore", "1927-10-14", Some("2017-05-23")).await;

    let res = post_json(
        &app,
        "/api/characters",
        json!({"name": "James Bond", "actors": [uri(&connery), uri(&moore), uri(&connery)]}),
    )
    .await;
    assert_eq!(res.status, StatusCode::CREATED);
    let character = self_href(&res.body);
    assert_eq!(res.body["_links"]["character"]["href"], uri(&character));
    assert_eq!(res.body["_links"]["actors"]["href"], uri(&format!("{}/actors", character)));
    assert_eq!(res.body["_links"]["movies"]["href"], uri(&format!("{}/movies", character)));

    let res = get(&app, &format!("{}/actors", character)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["_links"]["self"]["href"], uri(&format!("{}/actors", character)));
    let mut names = embedded_field(&res.body, "actors", "last_name");
    names.sort_by(|a, b| a.as_str().cmp(&b.as_str()));
    assert_eq!(names, vec![json!("Connery"), json!("Moore")]);

    let res = get(&app, &format!("{}/characters", moore)).await;
    assert_eq!(embedded_field(&res.body, "characters", "name"), vec![json!("James Bond")]);
}

#[sqlx::test]
async fn character_without_links_has_empty_associations(pool: PgPool) {
    let app = build_test_app(pool).await;
    let character = create(&app, "/api/characters", json!({"name": "Q"})).await;

    let res = get(&app, &format!("{}/actors", character)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["_embedded"]["actors"], json!([]));
    assert_eq!(get(&app, "/api/characters/999/actors").await.status, StatusCode::NOT_FOUND);
    assert_eq!(get(&app, &format!("{}/sidekicks", character)).await.status, StatusCode::NOT_FOUND);
}

#[sqlx::test]
async fn put_without_actors_keeps_links(pool: PgPool) {
    let app = build_test_app(pool).await;
    let actor = create_actor(&app, "Desmond", "Llewelyn", "1914-09-12", Some("1999-12-19")).await;
    let character = create(&app, "/api/characters", json!({"name": "Q", "actors": [uri(&actor)]})).await;

    let res = put_json(&app, &character, json!({"name": "Major Boothroyd"})).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["name"], "Major Boothroyd");
    let res = get(&app, &format!("{}/actors", character)).await;
    assert_eq!(embedded_field(&res.body, "actors", "last_name"), vec![json!("Llewelyn")]);

    let res = patch_json(&app, &character, json!({"actors": []})).await;
    assert_eq!(res.status, StatusCode::OK);
    let res = get(&app, &format!("{}/actors", character)).await;
    assert_eq!(res.body["_embedded"]["actors"], json!([]));
}

#[sqlx::test]
async fn filters_characters_through_actors(pool: PgPool) {
    let app = build_test_app(pool).await;
    let connery = create_actor(&app, "Sean", "Connery", "1930-08-25", None).await;
    let llewelyn = create_actor(&app, "Desmond", "Llewelyn", "1914-09-12", None).await;
    create(&app, "/api/characters", json!({"name": "James Bond", "actors": [uri(&connery)]})).await;
    create(&app, "/api/characters", json!({"name": "Q", "actors": [uri(&llewelyn)]})).await;
    create(&app, "/api/characters", json!({"name": "M"})).await;

    let res = get(&app, "/api/characters?actors.lastName=connery").await;
    assert_eq!(embedded_field(&res.body, "characters", "name"), vec![json!("James Bond")]);

    let res = get(&app, "/api/characters?name=q").await;
    assert_eq!(embedded_field(&res.body, "characters", "name"), vec![json!("Q")]);
}

#[sqlx::test]
async fn deleting_actor_unlinks_characters(pool: PgPool) {
    let app = build_test_app(pool).await;
    let actor = create_actor(&app, "Sean", "Connery", "1930-08-25", None).await;
    let character = create(&app, "/api/characters", json!({"name": "James Bond", "actors": [uri(&actor)]})).await;

    assert_eq!(delete(&app, &actor).await.status, StatusCode::NO_CONTENT);
    let res = get(&app, &format!("{}/actors", character)).await;
    assert_eq!(res.body["_embedded"]["actors"], json!([]));
}
