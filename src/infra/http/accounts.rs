//! Sign-up, log-in and log-out.

use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::warn;

use crate::{
    application::accounts::{AccountError, SignUpSubmission},
    presentation::views::{
        LayoutContext, LoginContent, LoginTemplate, SignupContent, SignupTemplate,
        render_error_page, render_template_response,
    },
};

use super::{
    CurrentUser, HttpState, found,
    session::{LOGIN_PATH, clear_session, safe_next, session_cookie, session_token},
};

const INVALID_CREDENTIALS_MESSAGE: &str =
    "Пожалуйста, введите правильные имя пользователя и пароль.";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct NextQuery {
    next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct LoginForm {
    username: String,
    password: String,
    next: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct SignupForm {
    first_name: String,
    last_name: String,
    username: String,
    email: String,
    password1: String,
    password2: String,
}

fn render_login(viewer: &CurrentUser, content: LoginContent, status: StatusCode) -> Response {
    let view = LayoutContext::new(viewer.principal(), "Войти", content);
    render_template_response(LoginTemplate { view }, status)
}

fn render_signup(content: SignupContent) -> Response {
    let view = LayoutContext::new(None, "Регистрация", content);
    render_template_response(SignupTemplate { view }, StatusCode::OK)
}

pub(super) async fn login_form(viewer: CurrentUser, Query(query): Query<NextQuery>) -> Response {
    let content = LoginContent {
        next: safe_next(query.next.as_deref()).to_string(),
        ..Default::default()
    };
    render_login(&viewer, content, StatusCode::OK)
}

pub(super) async fn login(
    State(state): State<HttpState>,
    viewer: CurrentUser,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    let next = safe_next(Some(form.next.as_str())).to_string();

    match state.accounts.log_in(&form.username, &form.password).await {
        Ok(session) => {
            let jar = jar.add(session_cookie(&session, state.cookie_secure));
            (jar, found(&next)).into_response()
        }
        Err(AccountError::InvalidCredentials) => {
            let content = LoginContent {
                username: form.username,
                next,
                error: Some(INVALID_CREDENTIALS_MESSAGE.to_string()),
            };
            render_login(&viewer, content, StatusCode::OK)
        }
        Err(err) => render_error_page(viewer.principal(), err.into()),
    }
}

pub(super) async fn logout(State(state): State<HttpState>, jar: CookieJar) -> Response {
    if let Some(token) = session_token(&jar)
        && let Err(err) = state.accounts.log_out(&token).await
    {
        warn!(error = %err, "Failed to delete session on log-out");
    }
    (clear_session(jar), found("/")).into_response()
}

pub(super) async fn signup_form() -> Response {
    render_signup(SignupContent::default())
}

pub(super) async fn signup(State(state): State<HttpState>, Form(form): Form<SignupForm>) -> Response {
    let SignupForm {
        first_name,
        last_name,
        username,
        email,
        password1,
        password2,
    } = form;

    let submission = SignUpSubmission {
        first_name: first_name.clone(),
        last_name: last_name.clone(),
        username: username.clone(),
        email: email.clone(),
        password1,
        password2,
    };

    match state.accounts.sign_up(submission).await {
        Ok(_) => found(LOGIN_PATH),
        Err(AccountError::Invalid(errors)) => {
            let content = SignupContent {
                first_name,
                last_name,
                username,
                email,
                ..Default::default()
            }
            .with_errors(&errors);
            render_signup(content)
        }
        Err(err) => render_error_page(None, err.into()),
    }
}
