mod support;

use axum::http::StatusCode;
use yatube::cache::CacheConfig;

use support::{MultipartBody, TestApp, body_to_string};

#[tokio::test]
async fn index_is_served_from_cache_until_a_post_is_written() {
    let app = TestApp::new();
    let author = app.repo.seed_user("leo", "", "").await;
    app.repo.seed_post(&author, "Уже опубликовано", None).await;

    let first = body_to_string(app.get("/", None).await).await;
    assert_eq!(app.state.cache.len(), 1);

    // Written behind the service's back, so nothing invalidates the fragment.
    app.repo.seed_post(&author, "Тихая запись", None).await;
    let second = body_to_string(app.get("/", None).await).await;
    assert_eq!(first, second);
    assert!(!second.contains("Тихая запись"));

    let cookie = app.session_cookie(&author).await;
    let form = MultipartBody::new().text("text", "Громкая запись");
    let response = app.post_multipart("/new", form, Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert!(app.state.cache.is_empty());

    let third = body_to_string(app.get("/", None).await).await;
    assert_ne!(first, third);
    assert!(third.contains("Тихая запись"));
    assert!(third.contains("Громкая запись"));
}

#[tokio::test]
async fn pages_are_cached_separately() {
    let app = TestApp::new();
    let author = app.repo.seed_user("leo", "", "").await;
    for n in 1..=11 {
        app.repo.seed_post(&author, &format!("Запись {n}"), None).await;
    }

    app.get("/", None).await;
    app.get("/?page=2", None).await;
    assert_eq!(app.state.cache.len(), 2);
}

#[tokio::test]
async fn cached_list_does_not_leak_the_viewer() {
    let app = TestApp::new();
    let author = app.repo.seed_user("leo", "", "").await;
    app.repo.seed_post(&author, "Общая запись", None).await;
    let cookie = app.session_cookie(&author).await;

    let signed_in = body_to_string(app.get("/", Some(&cookie)).await).await;
    assert!(signed_in.contains("Выйти"));

    let anonymous = body_to_string(app.get("/", None).await).await;
    assert!(anonymous.contains("Общая запись"));
    assert!(anonymous.contains("Войти"));
    assert!(!anonymous.contains("Выйти"));
}

#[tokio::test]
async fn deleting_a_post_clears_the_cache() {
    let app = TestApp::new();
    let author = app.repo.seed_user("leo", "", "").await;
    let post = app.repo.seed_post(&author, "Скоро исчезнет", None).await;

    assert!(body_to_string(app.get("/", None).await).await.contains("Скоро исчезнет"));

    let cookie = app.session_cookie(&author).await;
    app.post_form(
        &format!("/profile/leo/post/{}/delete", post.id),
        "",
        Some(&cookie),
    )
    .await;

    assert!(!body_to_string(app.get("/", None).await).await.contains("Скоро исчезнет"));
}

#[tokio::test]
async fn disabled_cache_always_renders_fresh() {
    let app = TestApp::with_cache(CacheConfig {
        enabled: false,
        ..Default::default()
    });
    let author = app.repo.seed_user("leo", "", "").await;

    app.get("/", None).await;
    app.repo.seed_post(&author, "Сразу видно", None).await;

    let body = body_to_string(app.get("/", None).await).await;
    assert!(body.contains("Сразу видно"));
    assert_eq!(app.state.cache.len(), 0);
}
