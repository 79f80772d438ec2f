mod support;

use axum::http::{StatusCode, header};

use support::{TestApp, body_to_string, location};

const SIGNUP_BODY: &str = "first_name=%D0%9B%D0%B5%D0%B2&last_name=%D0%A2%D0%BE%D0%BB%D1%81%D1%82%D0%BE%D0%B9\
&username=leo&email=leo%40example.com&password1=war-and-peace&password2=war-and-peace";

fn session_from(response: &axum::http::Response<axum::body::Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with("yatube_session="))
        .and_then(|value| value.split(';').next())
        .map(str::to_string)
}

#[tokio::test]
async fn sign_up_then_log_in_shows_profile() {
    let app = TestApp::new();

    let response = app.post_form("/auth/signup", SIGNUP_BODY, None).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/auth/login");

    let response = app
        .post_form(
            "/auth/login",
            "username=leo&password=war-and-peace&next=%2Fnew",
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/new");
    let cookie = session_from(&response).expect("session cookie issued");

    let profile = body_to_string(app.get("/profile/leo", Some(&cookie)).await).await;
    assert!(profile.contains("Лев Толстой"));
    assert!(profile.contains("@leo"));
    assert!(profile.contains("Выйти"));

    let new_post = app.get("/new", Some(&cookie)).await;
    assert_eq!(new_post.status(), StatusCode::OK);
}

#[tokio::test]
async fn sign_up_reports_field_errors() {
    let app = TestApp::new();
    app.repo.seed_user("taken", "", "").await;

    let response = app
        .post_form(
            "/auth/signup",
            "username=taken&email=bad&password1=long-enough-1&password2=different-2",
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_string(response).await;
    assert!(body.contains("Пользователь с таким именем уже существует."));
    assert!(body.contains("Введите правильный адрес электронной почты."));
    assert!(body.contains("Введенные пароли не совпадают."));
    assert!(body.contains("value=\"taken\""));
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let app = TestApp::new();
    app.post_form("/auth/signup", SIGNUP_BODY, None).await;

    let response = app
        .post_form("/auth/login", "username=leo&password=nope", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(session_from(&response).is_none());
    let body = body_to_string(response).await;
    assert!(body.contains("Пожалуйста, введите правильные имя пользователя и пароль."));
}

#[tokio::test]
async fn login_ignores_offsite_next() {
    let app = TestApp::new();
    app.post_form("/auth/signup", SIGNUP_BODY, None).await;

    let response = app
        .post_form(
            "/auth/login",
            "username=leo&password=war-and-peace&next=%2F%2Fevil.example",
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn logout_ends_the_session() {
    let app = TestApp::new();
    let user = app.repo.seed_user("leo", "", "").await;
    let cookie = app.session_cookie(&user).await;

    assert_eq!(app.get("/follow", Some(&cookie)).await.status(), StatusCode::OK);

    let response = app.post_form("/auth/logout", "", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/");

    let after = app.get("/follow", Some(&cookie)).await;
    assert_eq!(after.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn login_form_keeps_next() {
    let app = TestApp::new();
    let body = body_to_string(app.get("/auth/login?next=%2Fnew", None).await).await;
    assert!(body.contains("name=\"next\" value=\"/new\""));
}
