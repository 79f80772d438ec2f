use std::sync::Arc;

use crate::application::accounts::Principal;
use crate::application::error::{ErrorReport, HttpError};
use crate::application::feed::AuthorStats;
use crate::application::pagination::NumberedPage;
use crate::domain::entities::{CommentView, GroupRecord, MessageRecord, PostSummary, UserRecord};
use crate::domain::error::FieldErrors;
use crate::infra::uploads::media_url;
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};
use uuid::Uuid;

const DISPLAY_DATE: &[BorrowedFormatItem<'static>] =
    format_description!("[day].[month].[year] [hour]:[minute]");

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    render_fragment(template).map(Html)
}

/// Renders a template to a bare string, for fragments embedded in a page.
pub fn render_fragment<T: Template>(template: T) -> Result<String, HttpError> {
    template.render().map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(viewer: Option<&Principal>, detail: &str) -> Response {
    let view = LayoutContext::new(viewer, "Страница не найдена", ErrorPageView::not_found());
    let mut response = render_template_response(NotFoundTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        detail,
    )
    .attach(&mut response);
    response
}

/// Renders the 404 or 5xx page for `err`, keeping its diagnostic report.
/// Other statuses fall back to the plain error response.
pub fn render_error_page(viewer: Option<&Principal>, err: HttpError) -> Response {
    let status = err.status();
    let mut response = if status == StatusCode::NOT_FOUND {
        let view = LayoutContext::new(viewer, "Страница не найдена", ErrorPageView::not_found());
        render_template_response(NotFoundTemplate { view }, status)
    } else if status.is_server_error() {
        let view = LayoutContext::new(viewer, "Ошибка сервера", ErrorPageView::server_error());
        render_template_response(ServerErrorTemplate { view }, status)
    } else {
        return err.into_response();
    };

    let mut fallback = err.into_response();
    if let Some(report) = fallback.extensions_mut().remove::<ErrorReport>() {
        report.attach(&mut response);
    }
    response
}

pub fn format_timestamp(value: OffsetDateTime) -> String {
    value
        .format(DISPLAY_DATE)
        .unwrap_or_else(|_| value.date().to_string())
}

fn iso_timestamp(value: OffsetDateTime) -> String {
    value
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}

pub fn profile_href(username: &str) -> String {
    format!("/profile/{username}")
}

pub fn post_href(username: &str, post_id: i64) -> String {
    format!("/profile/{username}/post/{post_id}")
}

#[derive(Clone)]
pub struct ViewerView {
    pub username: String,
    pub profile_href: String,
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub viewer: Option<ViewerView>,
    pub title: String,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(viewer: Option<&Principal>, title: impl Into<String>, content: T) -> Self {
        Self {
            viewer: viewer.map(|principal| ViewerView {
                username: principal.username.clone(),
                profile_href: profile_href(&principal.username),
            }),
            title: title.into(),
            content,
        }
    }
}

#[derive(Clone)]
pub struct LinkView {
    pub label: String,
    pub href: String,
}

#[derive(Clone)]
pub struct PostCard {
    pub id: i64,
    pub text: String,
    pub author_name: String,
    pub author_username: String,
    pub author_href: String,
    pub group: Option<LinkView>,
    pub image_url: Option<String>,
    pub comment_count: u64,
    pub published: String,
    pub iso_date: String,
    pub detail_href: String,
}

impl From<&PostSummary> for PostCard {
    fn from(post: &PostSummary) -> Self {
        let group = match (&post.group_title, &post.group_slug) {
            (Some(title), Some(slug)) => Some(LinkView {
                label: title.clone(),
                href: format!("/group/{slug}"),
            }),
            _ => None,
        };

        Self {
            id: post.id,
            text: post.text.clone(),
            author_name: post.author_name.clone(),
            author_username: post.author_username.clone(),
            author_href: profile_href(&post.author_username),
            group,
            image_url: post.image_path.as_deref().map(media_url),
            comment_count: post.comment_count,
            published: format_timestamp(post.created_at),
            iso_date: iso_timestamp(post.created_at),
            detail_href: post_href(&post.author_username, post.id),
        }
    }
}

#[derive(Clone)]
pub struct PageLinkView {
    pub number: u32,
    pub href: String,
    pub is_current: bool,
}

#[derive(Clone)]
pub struct PaginatorView {
    pub number: u32,
    pub total_pages: u32,
    pub previous_href: Option<String>,
    pub next_href: Option<String>,
    pub pages: Vec<PageLinkView>,
}

impl PaginatorView {
    /// `base` is the path plus any query that must survive paging, e.g.
    /// `/search?text=cat`.
    pub fn new<T>(page: &NumberedPage<T>, base: &str) -> Self {
        let separator = if base.contains('?') { '&' } else { '?' };
        let href = |number: u32| format!("{base}{separator}page={number}");
        let total_pages = page.total_pages();

        Self {
            number: page.number,
            total_pages,
            previous_href: page.has_previous().then(|| href(page.number - 1)),
            next_href: page.has_next().then(|| href(page.number + 1)),
            pages: (1..=total_pages)
                .map(|number| PageLinkView {
                    number,
                    href: href(number),
                    is_current: number == page.number,
                })
                .collect(),
        }
    }

    pub fn is_paginated(&self) -> bool {
        self.total_pages > 1
    }
}

/// The list of post cards with its paginator. The home page caches this
/// fragment, so it must not depend on the viewer.
#[derive(Template)]
#[template(path = "partials/post_list.html")]
pub struct PostListFragment {
    pub posts: Vec<PostCard>,
    pub paginator: PaginatorView,
    pub empty_message: &'static str,
}

impl PostListFragment {
    pub fn new(page: &NumberedPage<PostSummary>, base: &str) -> Self {
        Self {
            posts: page.items.iter().map(PostCard::from).collect(),
            paginator: PaginatorView::new(page, base),
            empty_message: "Записей пока нет.",
        }
    }

    pub fn with_empty_message(self, empty_message: &'static str) -> Self {
        Self {
            empty_message,
            ..self
        }
    }
}

/// Groups and authors listed beside the feed pages.
#[derive(Clone, Default)]
pub struct SidebarView {
    pub groups: Vec<LinkView>,
    pub users: Vec<LinkView>,
}

impl SidebarView {
    pub fn new(groups: &[GroupRecord], users: &[UserRecord]) -> Self {
        Self {
            groups: groups
                .iter()
                .map(|group| LinkView {
                    label: group.title.clone(),
                    href: format!("/group/{}", group.slug),
                })
                .collect(),
            users: users
                .iter()
                .map(|user| LinkView {
                    label: user.display_name(),
                    href: profile_href(&user.username),
                })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.users.is_empty()
    }
}

pub struct IndexContent {
    pub list_html: Arc<str>,
    pub sidebar: SidebarView,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<IndexContent>,
}

pub struct GroupContent {
    pub title: String,
    pub description: String,
    pub list_html: String,
    pub sidebar: SidebarView,
}

#[derive(Template)]
#[template(path = "group.html")]
pub struct GroupTemplate {
    pub view: LayoutContext<GroupContent>,
}

#[derive(Clone, Copy)]
pub struct StatsView {
    pub posts: u64,
    pub followers: u64,
    pub following: u64,
}

impl From<AuthorStats> for StatsView {
    fn from(stats: AuthorStats) -> Self {
        Self {
            posts: stats.posts,
            followers: stats.followers,
            following: stats.following,
        }
    }
}

/// Author header shared by the profile and the post page.
pub struct AuthorCardView {
    pub name: String,
    pub username: String,
    pub href: String,
    pub stats: StatsView,
    pub is_following: bool,
    /// Follow buttons are hidden for guests and on one's own profile.
    pub show_follow_controls: bool,
    pub follow_href: String,
    pub unfollow_href: String,
    pub messages_href: String,
}

impl AuthorCardView {
    pub fn new(
        author: &UserRecord,
        stats: AuthorStats,
        is_following: bool,
        viewer: Option<&Principal>,
    ) -> Self {
        let href = profile_href(&author.username);
        Self {
            name: author.display_name(),
            username: author.username.clone(),
            stats: stats.into(),
            is_following,
            show_follow_controls: viewer.is_some_and(|viewer| viewer.user_id != author.id),
            follow_href: format!("{href}/follow"),
            unfollow_href: format!("{href}/unfollow"),
            messages_href: format!("{href}/messages"),
            href,
        }
    }
}

pub struct ProfileContent {
    pub author: AuthorCardView,
    pub list_html: String,
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
    pub view: LayoutContext<ProfileContent>,
}

pub struct CommentItem {
    pub author_name: String,
    pub author_href: String,
    pub text: String,
    pub published: String,
}

impl From<&CommentView> for CommentItem {
    fn from(comment: &CommentView) -> Self {
        Self {
            author_name: comment.author_name.clone(),
            author_href: profile_href(&comment.author_username),
            text: comment.text.clone(),
            published: format_timestamp(comment.created_at),
        }
    }
}

pub struct CommentFormView {
    pub action: String,
    pub text: String,
    pub error: Option<String>,
}

pub struct PostDetailContent {
    pub post: PostCard,
    pub author: AuthorCardView,
    pub is_author: bool,
    pub edit_href: String,
    pub delete_href: String,
    pub comments: Vec<CommentItem>,
    /// Present when a signed-in viewer may comment.
    pub comment_form: Option<CommentFormView>,
}

#[derive(Template)]
#[template(path = "post.html")]
pub struct PostTemplate {
    pub view: LayoutContext<PostDetailContent>,
}

pub struct FollowContent {
    pub list_html: String,
    pub sidebar: SidebarView,
}

#[derive(Template)]
#[template(path = "follow.html")]
pub struct FollowTemplate {
    pub view: LayoutContext<FollowContent>,
}

pub struct SearchContent {
    pub query: String,
    pub list_html: String,
    pub sidebar: SidebarView,
}

#[derive(Template)]
#[template(path = "search.html")]
pub struct SearchTemplate {
    pub view: LayoutContext<SearchContent>,
}

pub struct GroupOption {
    pub id: String,
    pub title: String,
    pub selected: bool,
}

pub fn group_options(groups: &[GroupRecord], selected: Option<Uuid>) -> Vec<GroupOption> {
    groups
        .iter()
        .map(|group| GroupOption {
            id: group.id.to_string(),
            title: group.title.clone(),
            selected: selected == Some(group.id),
        })
        .collect()
}

fn field_error(errors: &FieldErrors, field: &str) -> Option<String> {
    errors.get(field).map(str::to_string)
}

pub struct PostFormContent {
    pub is_edit: bool,
    pub action: String,
    pub text: String,
    pub groups: Vec<GroupOption>,
    pub current_image: Option<String>,
    pub text_error: Option<String>,
    pub group_error: Option<String>,
    pub image_error: Option<String>,
}

impl PostFormContent {
    pub fn create(groups: Vec<GroupOption>) -> Self {
        Self {
            is_edit: false,
            action: "/new".to_string(),
            text: String::new(),
            groups,
            current_image: None,
            text_error: None,
            group_error: None,
            image_error: None,
        }
    }

    pub fn edit(
        username: &str,
        post_id: i64,
        text: String,
        groups: Vec<GroupOption>,
        image_path: Option<&str>,
    ) -> Self {
        Self {
            is_edit: true,
            action: format!("{}/edit", post_href(username, post_id)),
            text,
            groups,
            current_image: image_path.map(media_url),
            text_error: None,
            group_error: None,
            image_error: None,
        }
    }

    pub fn with_errors(self, errors: &FieldErrors) -> Self {
        Self {
            text_error: field_error(errors, "text"),
            group_error: field_error(errors, "group"),
            image_error: field_error(errors, "image"),
            ..self
        }
    }
}

#[derive(Template)]
#[template(path = "new_post.html")]
pub struct PostFormTemplate {
    pub view: LayoutContext<PostFormContent>,
}

#[derive(Default)]
pub struct GroupFormContent {
    pub title: String,
    pub slug: String,
    pub description: String,
    pub title_error: Option<String>,
    pub slug_error: Option<String>,
}

impl GroupFormContent {
    pub fn with_errors(self, errors: &FieldErrors) -> Self {
        Self {
            title_error: field_error(errors, "title"),
            slug_error: field_error(errors, "slug"),
            ..self
        }
    }
}

#[derive(Template)]
#[template(path = "new_group.html")]
pub struct GroupFormTemplate {
    pub view: LayoutContext<GroupFormContent>,
}

pub struct MessageItem {
    pub is_mine: bool,
    pub sender_name: String,
    pub text: String,
    pub published: String,
}

pub struct ConversationContent {
    pub partner: LinkView,
    pub partner_username: String,
    pub is_following: bool,
    pub messages: Vec<MessageItem>,
    pub action: String,
    pub text: String,
    pub error: Option<String>,
}

impl ConversationContent {
    pub fn new(
        viewer: &Principal,
        partner: &UserRecord,
        messages: &[MessageRecord],
        is_following: bool,
    ) -> Self {
        let href = profile_href(&partner.username);
        let partner_name = partner.display_name();
        Self {
            partner: LinkView {
                label: partner_name.clone(),
                href: href.clone(),
            },
            partner_username: partner.username.clone(),
            is_following,
            messages: messages
                .iter()
                .map(|message| {
                    let is_mine = message.sender_id == viewer.user_id;
                    MessageItem {
                        is_mine,
                        sender_name: if is_mine {
                            viewer.username.clone()
                        } else {
                            partner_name.clone()
                        },
                        text: message.text.clone(),
                        published: format_timestamp(message.created_at),
                    }
                })
                .collect(),
            action: format!("{href}/messages"),
            text: String::new(),
            error: None,
        }
    }
}

#[derive(Template)]
#[template(path = "messages.html")]
pub struct ConversationTemplate {
    pub view: LayoutContext<ConversationContent>,
}

#[derive(Default)]
pub struct LoginContent {
    pub username: String,
    pub next: String,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub view: LayoutContext<LoginContent>,
}

#[derive(Default)]
pub struct SignupContent {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub username_error: Option<String>,
    pub email_error: Option<String>,
    pub password1_error: Option<String>,
    pub password2_error: Option<String>,
    pub form_error: Option<String>,
}

impl SignupContent {
    pub fn with_errors(self, errors: &FieldErrors) -> Self {
        Self {
            username_error: field_error(errors, "username"),
            email_error: field_error(errors, "email"),
            password1_error: field_error(errors, "password1"),
            password2_error: field_error(errors, "password2"),
            form_error: field_error(errors, "__all__"),
            ..self
        }
    }
}

#[derive(Template)]
#[template(path = "auth/signup.html")]
pub struct SignupTemplate {
    pub view: LayoutContext<SignupContent>,
}

pub struct ErrorPageView {
    pub message: String,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            message: "Запрошенная страница не существует.".to_string(),
        }
    }

    pub fn server_error() -> Self {
        Self {
            message: "Что-то пошло не так. Попробуйте обновить страницу позже.".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "misc/404.html")]
pub struct NotFoundTemplate {
    pub view: LayoutContext<ErrorPageView>,
}

#[derive(Template)]
#[template(path = "misc/500.html")]
pub struct ServerErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}
