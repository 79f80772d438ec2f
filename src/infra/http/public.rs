use std::io::ErrorKind;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::error;
use url::form_urlencoded;

use crate::{
    application::{
        accounts::Principal,
        error::HttpError,
        feed::FeedScope,
        pagination::PageNumber,
    },
    cache::FragmentKey,
    infra::uploads::UploadStorageError,
    presentation::views::{
        AuthorCardView, CommentFormView, CommentItem, FollowContent, FollowTemplate, GroupContent,
        GroupTemplate, IndexContent, IndexTemplate, LayoutContext, PostCard, PostDetailContent,
        PostListFragment, PostTemplate, ProfileContent, ProfileTemplate, SearchContent,
        SearchTemplate, SidebarView, post_href, render_error_page, render_fragment, render_not_found_response,
        render_template_response,
    },
};

use super::{CurrentUser, HttpState, RequireUser, db_health_response};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct PageQuery {
    page: Option<String>,
}

impl PageQuery {
    fn number(&self) -> PageNumber {
        PageNumber::parse(self.page.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct SearchQuery {
    text: Option<String>,
    page: Option<String>,
}

/// Groups and authors for the feed pages. Rendered per request, outside the
/// fragment cache.
async fn load_sidebar(
    state: &HttpState,
    viewer: Option<&Principal>,
) -> Result<SidebarView, Response> {
    state
        .feed
        .sidebar()
        .await
        .map(|sidebar| SidebarView::new(&sidebar.groups, &sidebar.users))
        .map_err(|err| render_error_page(viewer, err.into()))
}

/// Home page. The post list is served from the fragment cache.
pub(super) async fn index(
    State(state): State<HttpState>,
    viewer: CurrentUser,
    Query(query): Query<PageQuery>,
) -> Response {
    let page = query.number();
    let key = FragmentKey::index_page(page);
    let feed = state.feed.clone();

    let list_html = state
        .cache
        .get_or_render(&key, || async move {
            let feed = feed.feed(&FeedScope::All, page).await?;
            render_fragment(PostListFragment::new(&feed.posts, "/"))
        })
        .await;
    let list_html = match list_html {
        Ok(html) => html,
        Err(err) => return render_error_page(viewer.principal(), err),
    };

    let sidebar = match load_sidebar(&state, viewer.principal()).await {
        Ok(sidebar) => sidebar,
        Err(response) => return response,
    };

    let content = IndexContent { list_html, sidebar };
    let view = LayoutContext::new(viewer.principal(), "Последние обновления", content);
    render_template_response(IndexTemplate { view }, StatusCode::OK)
}

pub(super) async fn group_feed(
    State(state): State<HttpState>,
    viewer: CurrentUser,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let feed = match state
        .feed
        .feed(&FeedScope::Group(slug.clone()), query.number())
        .await
    {
        Ok(feed) => feed,
        Err(err) => return render_error_page(viewer.principal(), err.into()),
    };
    let Some(group) = feed.group.as_ref() else {
        return render_not_found_response(viewer.principal(), "Unknown group slug");
    };

    let base = format!("/group/{slug}");
    let list = PostListFragment::new(&feed.posts, &base)
        .with_empty_message("В этой группе пока нет записей.");
    let list_html = match render_fragment(list) {
        Ok(html) => html,
        Err(err) => return render_error_page(viewer.principal(), err),
    };

    let sidebar = match load_sidebar(&state, viewer.principal()).await {
        Ok(sidebar) => sidebar,
        Err(response) => return response,
    };

    let content = GroupContent {
        title: group.title.clone(),
        description: group.description.clone(),
        list_html,
        sidebar,
    };
    let view = LayoutContext::new(viewer.principal(), group.title.clone(), content);
    render_template_response(GroupTemplate { view }, StatusCode::OK)
}

pub(super) async fn profile(
    State(state): State<HttpState>,
    viewer: CurrentUser,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let viewer_id = viewer.principal().map(|principal| principal.user_id);
    let context = match state
        .feed
        .profile(&username, viewer_id, query.number())
        .await
    {
        Ok(context) => context,
        Err(err) => return render_error_page(viewer.principal(), err.into()),
    };

    let base = format!("/profile/{}", context.author.username);
    let list_html = match render_fragment(PostListFragment::new(&context.posts, &base)) {
        Ok(html) => html,
        Err(err) => return render_error_page(viewer.principal(), err),
    };

    let author = AuthorCardView::new(
        &context.author,
        context.stats,
        context.is_following,
        viewer.principal(),
    );
    let title = format!("Профайл пользователя {}", author.name);
    let view = LayoutContext::new(viewer.principal(), title, ProfileContent { author, list_html });
    render_template_response(ProfileTemplate { view }, StatusCode::OK)
}

pub(super) async fn post_detail(
    State(state): State<HttpState>,
    viewer: CurrentUser,
    Path((username, post_id)): Path<(String, i64)>,
) -> Response {
    render_post_detail(&state, &viewer, &username, post_id, None).await
}

/// Renders the post page; `comment_form` carries a rejected comment back to
/// the reader.
pub(super) async fn render_post_detail(
    state: &HttpState,
    viewer: &CurrentUser,
    username: &str,
    post_id: i64,
    comment_form: Option<CommentFormView>,
) -> Response {
    let viewer_id = viewer.principal().map(|principal| principal.user_id);
    let detail = match state.feed.post_detail(username, post_id, viewer_id).await {
        Ok(detail) => detail,
        Err(err) => return render_error_page(viewer.principal(), err.into()),
    };

    let href = post_href(&detail.author.username, detail.post.id);
    let comment_form = match (viewer.principal(), comment_form) {
        (Some(_), Some(form)) => Some(form),
        (Some(_), None) => Some(CommentFormView {
            action: format!("{href}/comment"),
            text: String::new(),
            error: None,
        }),
        (None, _) => None,
    };

    let title = detail.post.text.chars().take(30).collect::<String>();
    let content = PostDetailContent {
        post: PostCard::from(&detail.post),
        author: AuthorCardView::new(
            &detail.author,
            detail.stats,
            detail.is_following,
            viewer.principal(),
        ),
        is_author: detail.is_author,
        edit_href: format!("{href}/edit"),
        delete_href: format!("{href}/delete"),
        comments: detail.comments.iter().map(CommentItem::from).collect(),
        comment_form,
    };
    let view = LayoutContext::new(viewer.principal(), title, content);
    render_template_response(PostTemplate { view }, StatusCode::OK)
}

/// Posts by the authors the viewer follows.
pub(super) async fn follow_index(
    State(state): State<HttpState>,
    RequireUser(principal): RequireUser,
    Query(query): Query<PageQuery>,
) -> Response {
    let viewer = Some(&principal);
    let feed = match state
        .feed
        .feed(&FeedScope::Following(principal.user_id), query.number())
        .await
    {
        Ok(feed) => feed,
        Err(err) => return render_error_page(viewer, err.into()),
    };

    let list = PostListFragment::new(&feed.posts, "/follow")
        .with_empty_message("Вы пока ни на кого не подписаны.");
    let list_html = match render_fragment(list) {
        Ok(html) => html,
        Err(err) => return render_error_page(viewer, err),
    };

    let sidebar = match load_sidebar(&state, viewer).await {
        Ok(sidebar) => sidebar,
        Err(response) => return response,
    };

    let content = FollowContent { list_html, sidebar };
    let view = LayoutContext::new(viewer, "Избранные авторы", content);
    render_template_response(FollowTemplate { view }, StatusCode::OK)
}

pub(super) async fn search(
    State(state): State<HttpState>,
    viewer: CurrentUser,
    Query(query): Query<SearchQuery>,
) -> Response {
    let text = query.text.unwrap_or_default().trim().to_string();
    let page = PageNumber::parse(query.page.as_deref());
    let feed = match state.feed.feed(&FeedScope::Search(text.clone()), page).await {
        Ok(feed) => feed,
        Err(err) => return render_error_page(viewer.principal(), err.into()),
    };

    let encoded: String = form_urlencoded::byte_serialize(text.as_bytes()).collect();
    let base = format!("/search?text={encoded}");
    let empty_message = if text.is_empty() {
        "Введите текст для поиска."
    } else {
        "Ничего не найдено."
    };
    let list = PostListFragment::new(&feed.posts, &base).with_empty_message(empty_message);
    let list_html = match render_fragment(list) {
        Ok(html) => html,
        Err(err) => return render_error_page(viewer.principal(), err),
    };

    let sidebar = match load_sidebar(&state, viewer.principal()).await {
        Ok(sidebar) => sidebar,
        Err(response) => return response,
    };

    let content = SearchContent {
        query: text,
        list_html,
        sidebar,
    };
    let view = LayoutContext::new(viewer.principal(), "Поиск", content);
    render_template_response(SearchTemplate { view }, StatusCode::OK)
}

pub(super) async fn serve_media(
    State(state): State<HttpState>,
    Path(path): Path<String>,
) -> Response {
    const SOURCE: &str = "infra::http::public::serve_media";

    match state.upload_storage.read(&path).await {
        Ok(bytes) => build_media_response(&path, bytes),
        Err(UploadStorageError::InvalidPath) => media_not_found(SOURCE),
        Err(UploadStorageError::Io(err)) if err.kind() == ErrorKind::NotFound => {
            media_not_found(SOURCE)
        }
        Err(err) => {
            error!(
                target = SOURCE,
                path = %path,
                error = %err,
                "failed to read stored image"
            );
            HttpError::new(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read uploaded file",
                err.to_string(),
            )
            .into_response()
        }
    }
}

fn media_not_found(source: &'static str) -> Response {
    HttpError::new(
        source,
        StatusCode::NOT_FOUND,
        "Upload not found",
        "The requested upload is not available",
    )
    .into_response()
}

fn build_media_response(path: &str, bytes: Bytes) -> Response {
    let length = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&length.to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    response
}

pub(super) async fn db_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.health.ping().await)
}

pub(super) async fn fallback(viewer: CurrentUser) -> Response {
    render_not_found_response(viewer.principal(), "No route matches the request")
}
