//! Post, comment and image handlers.

use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::Response,
};
use axum_extra::extract::Multipart;
use bytes::Bytes;
use serde::Deserialize;
use tracing::{debug, error};
use uuid::Uuid;

use crate::{
    application::{
        accounts::Principal,
        error::HttpError,
        posts::{ImageUpload, PostError, PostSubmission},
    },
    domain::{error::FieldErrors, posts::UNKNOWN_GROUP_MESSAGE},
    presentation::views::{
        CommentFormView, GroupOption, LayoutContext, PostFormContent, PostFormTemplate,
        group_options, post_href, render_error_page, render_template_response,
    },
};

use super::{CurrentUser, HttpState, RequireUser, bad_form, found, public::render_post_detail};

const SOURCE: &str = "infra::http::posts";

/// Raw multipart fields of the post form.
#[derive(Debug, Default)]
struct PostForm {
    text: String,
    group: String,
    image: Option<ImageUpload>,
    clear_image: bool,
}

impl PostForm {
    /// Splits off the group id; an unparseable id is reported like an unknown group.
    fn into_submission(self) -> (PostSubmission, Result<(), FieldErrors>) {
        let raw_group = self.group.trim();
        let (group_id, group_check) = if raw_group.is_empty() {
            (None, Ok(()))
        } else {
            match Uuid::parse_str(raw_group) {
                Ok(id) => (Some(id), Ok(())),
                Err(_) => {
                    let mut errors = FieldErrors::new();
                    errors.push("group", UNKNOWN_GROUP_MESSAGE);
                    (None, Err(errors))
                }
            }
        };

        let submission = PostSubmission {
            text: self.text,
            group_id,
            image: self.image,
            clear_image: self.clear_image,
        };
        (submission, group_check)
    }
}

async fn read_post_form(multipart: &mut Multipart) -> Result<PostForm, HttpError> {
    let mut form = PostForm::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                let status = err.status();
                error!(
                    target = SOURCE,
                    status = status.as_u16(),
                    error = %err,
                    "failed to read multipart payload"
                );
                return Err(if status == StatusCode::PAYLOAD_TOO_LARGE {
                    HttpError::new(
                        SOURCE,
                        StatusCode::PAYLOAD_TOO_LARGE,
                        "Upload too large",
                        err.body_text(),
                    )
                } else {
                    bad_form(SOURCE, err.body_text())
                });
            }
        };

        match field.name() {
            Some("text") => {
                form.text = field
                    .text()
                    .await
                    .map_err(|err| bad_form(SOURCE, err.body_text()))?;
            }
            Some("group") => {
                form.group = field
                    .text()
                    .await
                    .map_err(|err| bad_form(SOURCE, err.body_text()))?;
            }
            Some("clear_image") => {
                let value = field
                    .text()
                    .await
                    .map_err(|err| bad_form(SOURCE, err.body_text()))?;
                form.clear_image = matches!(
                    value.trim().to_ascii_lowercase().as_str(),
                    "on" | "true" | "1" | "yes"
                );
            }
            Some("image") => {
                let file_name = field
                    .file_name()
                    .map(|value| value.trim().to_string())
                    .unwrap_or_default();
                let bytes: Bytes = field
                    .bytes()
                    .await
                    .map_err(|err| bad_form(SOURCE, err.body_text()))?;
                // Browsers send an empty part when no file was chosen.
                if file_name.is_empty() && bytes.is_empty() {
                    continue;
                }
                let file_name = if file_name.is_empty() {
                    "image".to_string()
                } else {
                    file_name
                };
                form.image = Some(ImageUpload { file_name, bytes });
            }
            _ => continue,
        }
    }

    Ok(form)
}

async fn load_group_options(
    state: &HttpState,
    selected: Option<Uuid>,
) -> Result<Vec<GroupOption>, HttpError> {
    let groups = state.groups.list_groups().await?;
    Ok(group_options(&groups, selected))
}

fn render_post_form(principal: &Principal, content: PostFormContent) -> Response {
    let title = if content.is_edit {
        "Редактировать запись"
    } else {
        "Новая запись"
    };
    let view = LayoutContext::new(Some(principal), title, content);
    render_template_response(PostFormTemplate { view }, StatusCode::OK)
}

pub(super) async fn new_post_form(
    State(state): State<HttpState>,
    RequireUser(principal): RequireUser,
) -> Response {
    match load_group_options(&state, None).await {
        Ok(groups) => render_post_form(&principal, PostFormContent::create(groups)),
        Err(err) => render_error_page(Some(&principal), err),
    }
}

pub(super) async fn create_post(
    State(state): State<HttpState>,
    RequireUser(principal): RequireUser,
    mut multipart: Multipart,
) -> Response {
    let form = match read_post_form(&mut multipart).await {
        Ok(form) => form,
        Err(err) => return render_error_page(Some(&principal), err),
    };
    let (submission, group_check) = form.into_submission();
    let text = submission.text.clone();
    let group_id = submission.group_id;

    let errors = match group_check {
        Err(errors) => errors,
        Ok(()) => match state.posts.create_post(principal.user_id, submission).await {
            Ok(_) => return found("/"),
            Err(PostError::Invalid(errors)) => errors,
            Err(err) => return render_error_page(Some(&principal), err.into()),
        },
    };

    debug!(author = %principal.user_id, errors = %errors, "Post form rejected");
    match load_group_options(&state, group_id).await {
        Ok(groups) => {
            let content = PostFormContent {
                text,
                ..PostFormContent::create(groups)
            }
            .with_errors(&errors);
            render_post_form(&principal, content)
        }
        Err(err) => render_error_page(Some(&principal), err),
    }
}

pub(super) async fn edit_post_form(
    State(state): State<HttpState>,
    RequireUser(principal): RequireUser,
    Path((username, post_id)): Path<(String, i64)>,
) -> Response {
    let post = match state
        .posts
        .load_for_edit(principal.user_id, &username, post_id)
        .await
    {
        Ok(post) => post,
        Err(PostError::Forbidden) => return found(&post_href(&username, post_id)),
        Err(err) => return render_error_page(Some(&principal), err.into()),
    };

    match load_group_options(&state, post.group_id).await {
        Ok(groups) => {
            let content = PostFormContent::edit(
                &username,
                post.id,
                post.text,
                groups,
                post.image_path.as_deref(),
            );
            render_post_form(&principal, content)
        }
        Err(err) => render_error_page(Some(&principal), err),
    }
}

pub(super) async fn edit_post(
    State(state): State<HttpState>,
    RequireUser(principal): RequireUser,
    Path((username, post_id)): Path<(String, i64)>,
    mut multipart: Multipart,
) -> Response {
    let detail_href = post_href(&username, post_id);
    let form = match read_post_form(&mut multipart).await {
        Ok(form) => form,
        Err(err) => return render_error_page(Some(&principal), err),
    };
    let (submission, group_check) = form.into_submission();
    let text = submission.text.clone();
    let group_id = submission.group_id;

    let errors = match group_check {
        Err(errors) => errors,
        Ok(()) => match state
            .posts
            .edit_post(principal.user_id, &username, post_id, submission)
            .await
        {
            Ok(_) => return found(&detail_href),
            Err(PostError::Forbidden) => return found(&detail_href),
            Err(PostError::Invalid(errors)) => errors,
            Err(err) => return render_error_page(Some(&principal), err.into()),
        },
    };

    let current = match state
        .posts
        .load_for_edit(principal.user_id, &username, post_id)
        .await
    {
        Ok(post) => post,
        Err(PostError::Forbidden) => return found(&detail_href),
        Err(err) => return render_error_page(Some(&principal), err.into()),
    };

    match load_group_options(&state, group_id).await {
        Ok(groups) => {
            let content = PostFormContent::edit(
                &username,
                current.id,
                text,
                groups,
                current.image_path.as_deref(),
            )
            .with_errors(&errors);
            render_post_form(&principal, content)
        }
        Err(err) => render_error_page(Some(&principal), err),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct CommentForm {
    text: String,
}

pub(super) async fn add_comment(
    State(state): State<HttpState>,
    RequireUser(principal): RequireUser,
    Path((username, post_id)): Path<(String, i64)>,
    Form(form): Form<CommentForm>,
) -> Response {
    let detail_href = post_href(&username, post_id);
    match state
        .posts
        .add_comment(principal.user_id, &username, post_id, &form.text)
        .await
    {
        Ok(_) => found(&detail_href),
        Err(PostError::Invalid(errors)) => {
            let comment_form = CommentFormView {
                action: format!("{detail_href}/comment"),
                text: form.text,
                error: errors.get("text").map(str::to_string),
            };
            let viewer = CurrentUser(Some(principal));
            render_post_detail(&state, &viewer, &username, post_id, Some(comment_form)).await
        }
        Err(err) => render_error_page(Some(&principal), err.into()),
    }
}

pub(super) async fn delete_post(
    State(state): State<HttpState>,
    RequireUser(principal): RequireUser,
    Path((username, post_id)): Path<(String, i64)>,
) -> Response {
    match state
        .posts
        .delete_post(principal.user_id, &username, post_id)
        .await
    {
        Ok(()) => found("/"),
        Err(PostError::Forbidden) => found(&post_href(&username, post_id)),
        Err(err) => render_error_page(Some(&principal), err.into()),
    }
}
