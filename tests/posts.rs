mod support;

use axum::http::StatusCode;

use support::{MultipartBody, TINY_PNG, TestApp, body_to_string, location};

#[tokio::test]
async fn new_post_form_redirects_anonymous_visitors_to_login() {
    let app = TestApp::new();

    let response = app.get("/new", None).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/auth/login?next=%2Fnew");
}

#[tokio::test]
async fn new_post_form_lists_groups() {
    let app = TestApp::new();
    let author = app.repo.seed_user("leo", "", "").await;
    app.repo.seed_group("Кошки", "cats").await;
    let cookie = app.session_cookie(&author).await;

    let response = app.get("/new", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_string(response).await;
    assert!(body.contains("enctype=\"multipart/form-data\""));
    assert!(body.contains("Кошки"));
}

#[tokio::test]
async fn creating_a_post_redirects_home() {
    let app = TestApp::new();
    let author = app.repo.seed_user("leo", "", "").await;
    let group = app.repo.seed_group("Кошки", "cats").await;
    let cookie = app.session_cookie(&author).await;

    let form = MultipartBody::new()
        .text("text", "Новая запись про кошек")
        .text("group", &group.id.to_string());
    let response = app.post_multipart("/new", form, Some(&cookie)).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/");

    let post = app.repo.latest_post().await.expect("post stored");
    assert_eq!(post.text, "Новая запись про кошек");
    assert_eq!(post.author_id, author.id);
    assert_eq!(post.group_id, Some(group.id));

    let group_page = body_to_string(app.get("/group/cats", None).await).await;
    assert!(group_page.contains("Новая запись про кошек"));
}

#[tokio::test]
async fn invalid_post_is_shown_again_with_errors() {
    let app = TestApp::new();
    let author = app.repo.seed_user("leo", "", "").await;
    let cookie = app.session_cookie(&author).await;

    let blank = MultipartBody::new().text("text", "   ");
    let response = app.post_multipart("/new", blank, Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_string(response).await;
    assert!(body.contains("Обязательное поле."));

    let banned = MultipartBody::new().text("text", "Всё это python-зло");
    let response = app.post_multipart("/new", banned, Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_string(response).await;
    assert!(body.contains("Такого не может быть!"));
    assert!(body.contains("Всё это python-зло"));

    let unknown_group = MultipartBody::new()
        .text("text", "Текст")
        .text("group", "not-a-uuid");
    let response = app.post_multipart("/new", unknown_group, Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_to_string(response).await.contains("Некорректная группа"));

    assert_eq!(app.repo.post_count().await, 0);
}

#[tokio::test]
async fn non_image_upload_is_rejected() {
    let app = TestApp::new();
    let author = app.repo.seed_user("leo", "", "").await;
    let cookie = app.session_cookie(&author).await;

    let form = MultipartBody::new().text("text", "С картинкой").file(
        "image",
        "notes.png",
        "image/png",
        b"definitely not a picture",
    );
    let response = app.post_multipart("/new", form, Some(&cookie)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_string(response).await;
    assert!(body.contains("Загрузите правильное изображение."));
    assert_eq!(app.repo.post_count().await, 0);
}

#[tokio::test]
async fn uploaded_image_is_stored_and_served() {
    let app = TestApp::new();
    let author = app.repo.seed_user("leo", "", "").await;
    let cookie = app.session_cookie(&author).await;

    let form = MultipartBody::new()
        .text("text", "С картинкой")
        .file("image", "pixel.png", "image/png", TINY_PNG);
    let response = app.post_multipart("/new", form, Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::FOUND);

    let post = app.repo.latest_post().await.expect("post stored");
    let image_path = post.image_path.expect("image stored");
    assert!(image_path.ends_with(".png"));

    let detail = body_to_string(
        app.get(&format!("/profile/leo/post/{}", post.id), None)
            .await,
    )
    .await;
    assert!(detail.contains(&format!("/media/{image_path}")));

    let media = app.get(&format!("/media/{image_path}"), None).await;
    assert_eq!(media.status(), StatusCode::OK);
    assert_eq!(
        media.headers().get("content-type").map(|v| v.as_bytes()),
        Some(&b"image/png"[..])
    );
}

#[tokio::test]
async fn missing_media_is_not_found() {
    let app = TestApp::new();
    let response = app.get("/media/posts/nothing.png", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn only_the_author_may_edit() {
    let app = TestApp::new();
    let author = app.repo.seed_user("leo", "", "").await;
    let intruder = app.repo.seed_user("intruder", "", "").await;
    let post = app.repo.seed_post(&author, "Оригинал", None).await;
    let detail = format!("/profile/leo/post/{}", post.id);
    let edit = format!("{detail}/edit");

    let intruder_cookie = app.session_cookie(&intruder).await;
    let response = app.get(&edit, Some(&intruder_cookie)).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), detail);

    let form = MultipartBody::new().text("text", "Подмена");
    let response = app.post_multipart(&edit, form, Some(&intruder_cookie)).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), detail);
    let unchanged = app.repo.find_post(post.id).await.expect("post kept");
    assert_eq!(unchanged.text, "Оригинал");

    let author_cookie = app.session_cookie(&author).await;
    let form_page = body_to_string(app.get(&edit, Some(&author_cookie)).await).await;
    assert!(form_page.contains("Оригинал"));

    let form = MultipartBody::new().text("text", "Исправлено");
    let response = app.post_multipart(&edit, form, Some(&author_cookie)).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), detail);
    let edited = app.repo.find_post(post.id).await.expect("post kept");
    assert_eq!(edited.text, "Исправлено");
}

#[tokio::test]
async fn editing_under_the_wrong_author_is_not_found() {
    let app = TestApp::new();
    let author = app.repo.seed_user("leo", "", "").await;
    app.repo.seed_user("anna", "", "").await;
    let post = app.repo.seed_post(&author, "Оригинал", None).await;
    let cookie = app.session_cookie(&author).await;

    let response = app
        .get(&format!("/profile/anna/post/{}/edit", post.id), Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn author_can_delete_a_post() {
    let app = TestApp::new();
    let author = app.repo.seed_user("leo", "", "").await;
    let other = app.repo.seed_user("other", "", "").await;
    let post = app.repo.seed_post(&author, "Удаляемая", None).await;
    let delete = format!("/profile/leo/post/{}/delete", post.id);

    let other_cookie = app.session_cookie(&other).await;
    let response = app.post_form(&delete, "", Some(&other_cookie)).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert!(app.repo.find_post(post.id).await.is_some());

    let cookie = app.session_cookie(&author).await;
    let response = app.post_form(&delete, "", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/");
    assert!(app.repo.find_post(post.id).await.is_none());
}

#[tokio::test]
async fn comments_require_login_and_text() {
    let app = TestApp::new();
    let author = app.repo.seed_user("leo", "", "").await;
    let reader = app.repo.seed_user("reader", "Читатель", "").await;
    let post = app.repo.seed_post(&author, "Обсуждаемая запись", None).await;
    let detail = format!("/profile/leo/post/{}", post.id);
    let comment = format!("{detail}/comment");

    let response = app.post_form(&comment, "text=hello", None).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert!(location(&response).starts_with("/auth/login?next="));
    assert_eq!(app.repo.comment_count().await, 0);

    let cookie = app.session_cookie(&reader).await;
    let response = app.post_form(&comment, "text=", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_to_string(response).await.contains("Обязательное поле."));
    assert_eq!(app.repo.comment_count().await, 0);

    let response = app
        .post_form(&comment, "text=%D0%9E%D1%82%D0%BB%D0%B8%D1%87%D0%BD%D0%BE", Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), detail);

    let page = body_to_string(app.get(&detail, None).await).await;
    assert!(page.contains("Отлично"));
    assert!(page.contains("Читатель"));
}

#[tokio::test]
async fn editing_the_group_moves_the_post() {
    let app = TestApp::new();
    let author = app.repo.seed_user("leo", "", "").await;
    let cats = app.repo.seed_group("Кошки", "cats").await;
    let dogs = app.repo.seed_group("Собаки", "dogs").await;
    let post = app.repo.seed_post(&author, "Переезжающая запись", Some(&cats)).await;
    let cookie = app.session_cookie(&author).await;

    let form = MultipartBody::new()
        .text("text", "Переезжающая запись")
        .text("group", &dogs.id.to_string());
    let response = app
        .post_multipart(
            &format!("/profile/leo/post/{}/edit", post.id),
            form,
            Some(&cookie),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);

    let cats_page = body_to_string(app.get("/group/cats", None).await).await;
    assert!(!cats_page.contains("Переезжающая запись"));
    let dogs_page = body_to_string(app.get("/group/dogs", None).await).await;
    assert!(dogs_page.contains("Переезжающая запись"));
}

#[tokio::test]
async fn new_post_appears_on_every_listing() {
    let app = TestApp::new();
    let author = app.repo.seed_user("leo", "", "").await;
    let group = app.repo.seed_group("Кошки", "cats").await;
    let cookie = app.session_cookie(&author).await;

    let form = MultipartBody::new()
        .text("text", "Везде видна")
        .text("group", &group.id.to_string());
    app.post_multipart("/new", form, Some(&cookie)).await;
    assert_eq!(app.repo.post_count().await, 1);
    let post = app.repo.latest_post().await.expect("post stored");

    for page in [
        "/".to_string(),
        "/profile/leo".to_string(),
        "/group/cats".to_string(),
        format!("/profile/leo/post/{}", post.id),
    ] {
        let body = body_to_string(app.get(&page, None).await).await;
        assert!(body.contains("Везде видна"), "missing on {page}");
    }
}
