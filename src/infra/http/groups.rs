use axum::{Form, extract::State, http::StatusCode, response::Response};
use serde::Deserialize;

use crate::{
    application::{
        accounts::Principal,
        groups::{GroupError, GroupSubmission},
    },
    presentation::views::{
        GroupFormContent, GroupFormTemplate, LayoutContext, render_error_page,
        render_template_response,
    },
};

use super::{HttpState, RequireUser, found};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct GroupForm {
    title: String,
    slug: String,
    description: String,
}

fn render_group_form(principal: &Principal, content: GroupFormContent) -> Response {
    let view = LayoutContext::new(Some(principal), "Новая группа", content);
    render_template_response(GroupFormTemplate { view }, StatusCode::OK)
}

pub(super) async fn new_group_form(RequireUser(principal): RequireUser) -> Response {
    render_group_form(&principal, GroupFormContent::default())
}

pub(super) async fn create_group(
    State(state): State<HttpState>,
    RequireUser(principal): RequireUser,
    Form(form): Form<GroupForm>,
) -> Response {
    let submission = GroupSubmission {
        title: form.title.clone(),
        slug: form.slug.clone(),
        description: form.description.clone(),
    };

    match state.groups.create_group(submission).await {
        Ok(group) => found(&format!("/group/{}", group.slug)),
        Err(GroupError::Invalid(errors)) => {
            let content = GroupFormContent {
                title: form.title,
                slug: form.slug,
                description: form.description,
                ..Default::default()
            }
            .with_errors(&errors);
            render_group_form(&principal, content)
        }
        Err(err) => render_error_page(Some(&principal), err.into()),
    }
}
