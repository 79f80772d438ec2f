//! Follow edges and private messages.

use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::Response,
};
use serde::Deserialize;
use tracing::debug;

use crate::{
    application::{
        accounts::Principal,
        follows::FollowOutcome,
        messages::MessageError,
    },
    presentation::views::{
        ConversationContent, ConversationTemplate, LayoutContext, profile_href, render_error_page,
        render_template_response,
    },
};

use super::{HttpState, RequireUser, found};

const FOLLOW_FEED: &str = "/follow";

pub(super) async fn follow(
    State(state): State<HttpState>,
    RequireUser(principal): RequireUser,
    Path(username): Path<String>,
) -> Response {
    match state
        .follows
        .follow_username(principal.user_id, &username)
        .await
    {
        Ok(outcome) => {
            if outcome == FollowOutcome::SelfFollowIgnored {
                debug!(user = %principal.user_id, "Ignored attempt to follow oneself");
            }
            found(FOLLOW_FEED)
        }
        Err(err) => render_error_page(Some(&principal), err.into()),
    }
}

pub(super) async fn unfollow(
    State(state): State<HttpState>,
    RequireUser(principal): RequireUser,
    Path(username): Path<String>,
) -> Response {
    match state
        .follows
        .unfollow_username(principal.user_id, &username)
        .await
    {
        Ok(_) => found(FOLLOW_FEED),
        Err(err) => render_error_page(Some(&principal), err.into()),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct MessageForm {
    text: String,
}

pub(super) async fn conversation(
    State(state): State<HttpState>,
    RequireUser(principal): RequireUser,
    Path(username): Path<String>,
) -> Response {
    render_conversation(&state, &principal, &username, None).await
}

pub(super) async fn send_message(
    State(state): State<HttpState>,
    RequireUser(principal): RequireUser,
    Path(username): Path<String>,
    Form(form): Form<MessageForm>,
) -> Response {
    match state
        .messages
        .send(principal.user_id, &username, &form.text)
        .await
    {
        Ok(_) => found(&format!("{}/messages", profile_href(&username))),
        Err(MessageError::Invalid(errors)) => {
            let rejected = (form.text, errors.get("text").map(str::to_string));
            render_conversation(&state, &principal, &username, Some(rejected)).await
        }
        Err(err) => render_error_page(Some(&principal), err.into()),
    }
}

/// `rejected` is a message that failed validation, shown back with its error.
async fn render_conversation(
    state: &HttpState,
    principal: &Principal,
    username: &str,
    rejected: Option<(String, Option<String>)>,
) -> Response {
    let conversation = match state.messages.conversation(principal.user_id, username).await {
        Ok(conversation) => conversation,
        Err(err) => return render_error_page(Some(principal), err.into()),
    };

    let mut content = ConversationContent::new(
        principal,
        &conversation.partner,
        &conversation.messages,
        conversation.is_following,
    );
    if let Some((text, error)) = rejected {
        content.text = text;
        content.error = error;
    }

    let title = format!("Сообщения: {}", conversation.partner.display_name());
    let view = LayoutContext::new(Some(principal), title, content);
    render_template_response(ConversationTemplate { view }, StatusCode::OK)
}
