mod accounts;
mod groups;
mod middleware;
mod posts;
mod public;
mod session;
mod social;

pub use session::{CurrentUser, RequireUser, SESSION_COOKIE};

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{StatusCode, header::LOCATION},
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::{
    application::{
        accounts::AccountService,
        error::{ErrorReport, HttpError},
        feed::FeedService,
        follows::FollowService,
        groups::GroupService,
        messages::MessageService,
        posts::PostService,
        repos::{HealthRepo, RepoError},
    },
    cache::PageCache,
    infra::uploads::UploadStorage,
};

use self::middleware::{log_responses, set_request_context};

/// Everything the handlers reach through `State`.
#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub posts: Arc<PostService>,
    pub groups: Arc<GroupService>,
    pub follows: Arc<FollowService>,
    pub messages: Arc<MessageService>,
    pub accounts: Arc<AccountService>,
    pub cache: Arc<PageCache>,
    pub upload_storage: Arc<UploadStorage>,
    pub health: Arc<dyn HealthRepo>,
    pub upload_limit_bytes: usize,
    pub cookie_secure: bool,
}

pub fn build_router(state: HttpState) -> Router {
    let upload_limit = state.upload_limit_bytes;

    Router::new()
        .route("/", get(public::index))
        .route("/search", get(public::search))
        .route("/follow", get(public::follow_index))
        .route(
            "/new",
            get(posts::new_post_form)
                .post(posts::create_post)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/group/new",
            get(groups::new_group_form).post(groups::create_group),
        )
        .route("/group/{slug}", get(public::group_feed))
        .route("/profile/{username}", get(public::profile))
        .route("/profile/{username}/post/{post_id}", get(public::post_detail))
        .route(
            "/profile/{username}/post/{post_id}/edit",
            get(posts::edit_post_form)
                .post(posts::edit_post)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/profile/{username}/post/{post_id}/comment",
            post(posts::add_comment),
        )
        .route(
            "/profile/{username}/post/{post_id}/delete",
            post(posts::delete_post),
        )
        .route("/profile/{username}/follow", get(social::follow))
        .route("/profile/{username}/unfollow", get(social::unfollow))
        .route(
            "/profile/{username}/messages",
            get(social::conversation).post(social::send_message),
        )
        .route(
            "/auth/signup",
            get(accounts::signup_form).post(accounts::signup),
        )
        .route("/auth/login", get(accounts::login_form).post(accounts::login))
        .route("/auth/logout", post(accounts::logout))
        .route("/media/{*path}", get(public::serve_media))
        .route("/_health/db", get(public::db_health))
        .fallback(public::fallback)
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

/// `302 Found`, the status browsers follow after a form post.
pub(crate) fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_string())]).into_response()
}

fn db_health_response(result: Result<(), RepoError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

/// Error for a multipart or form body that could not be read.
pub(crate) fn bad_form(source: &'static str, detail: impl Into<String>) -> HttpError {
    HttpError::new(source, StatusCode::BAD_REQUEST, "Invalid form data", detail)
}
