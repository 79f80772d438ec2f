#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use http_body_util::BodyExt;
use tempfile::TempDir;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tower::ServiceExt;
use uuid::Uuid;

use yatube::application::accounts::AccountService;
use yatube::application::feed::FeedService;
use yatube::application::follows::FollowService;
use yatube::application::groups::GroupService;
use yatube::application::messages::MessageService;
use yatube::application::pagination::{NumberedPage, PageRequest};
use yatube::application::posts::PostService;
use yatube::application::repos::{
    CommentsRepo, CreateCommentParams, CreateGroupParams, CreateMessageParams, CreatePostParams,
    CreateSessionParams, CreateUserParams, FollowsRepo, GroupsRepo, HealthRepo, MessagesRepo,
    PostQueryFilter, PostsRepo, PostsWriteRepo, RepoError, SessionsRepo, UpdatePostParams,
    UsersRepo,
};
use yatube::cache::{CacheConfig, PageCache};
use yatube::domain::entities::{
    CommentRecord, CommentView, FollowRecord, GroupRecord, MessageRecord, PostRecord,
    PostSummary, SessionRecord, UserRecord,
};
use yatube::domain::posts::matches_search;
use yatube::infra::http::{HttpState, SESSION_COOKIE, build_router};
use yatube::infra::uploads::UploadStorage;

/// Smallest valid PNG: a single transparent pixel.
pub const TINY_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

#[derive(Default)]
struct MemoryState {
    users: Vec<UserRecord>,
    groups: Vec<GroupRecord>,
    posts: Vec<PostRecord>,
    comments: Vec<CommentRecord>,
    follows: Vec<FollowRecord>,
    messages: Vec<MessageRecord>,
    sessions: Vec<SessionRecord>,
    next_post_id: i64,
    next_comment_id: i64,
}

impl MemoryState {
    fn summary(&self, post: &PostRecord) -> PostSummary {
        let author = self.users.iter().find(|user| user.id == post.author_id);
        let group = post
            .group_id
            .and_then(|id| self.groups.iter().find(|group| group.id == id));
        PostSummary {
            id: post.id,
            text: post.text.clone(),
            author_id: post.author_id,
            author_username: author.map(|user| user.username.clone()).unwrap_or_default(),
            author_name: author.map(UserRecord::display_name).unwrap_or_default(),
            group_id: post.group_id,
            group_slug: group.map(|group| group.slug.clone()),
            group_title: group.map(|group| group.title.clone()),
            image_path: post.image_path.clone(),
            comment_count: self
                .comments
                .iter()
                .filter(|comment| comment.post_id == post.id)
                .count() as u64,
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }

    fn matches(&self, post: &PostRecord, filter: &PostQueryFilter) -> bool {
        match filter {
            PostQueryFilter::All => true,
            PostQueryFilter::Group(group_id) => post.group_id == Some(*group_id),
            PostQueryFilter::Author(author_id) => post.author_id == *author_id,
            PostQueryFilter::FollowedBy(user_id) => self
                .follows
                .iter()
                .any(|edge| edge.follower_id == *user_id && edge.followed_id == post.author_id),
            PostQueryFilter::TextContains(needle) => matches_search(&post.text, needle),
        }
    }

    /// Newest first; ids break ties between posts created in the same instant.
    fn filtered(&self, filter: &PostQueryFilter) -> Vec<&PostRecord> {
        let mut posts: Vec<&PostRecord> = self
            .posts
            .iter()
            .filter(|post| self.matches(post, filter))
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        posts
    }
}

/// Every repository trait backed by vectors behind one lock.
#[derive(Default)]
pub struct MemoryRepo {
    state: Mutex<MemoryState>,
}

impl MemoryRepo {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Inserts a user directly; the password hash is unusable, so use
    /// [`TestApp::session_cookie`] to sign in.
    pub async fn seed_user(&self, username: &str, first_name: &str, last_name: &str) -> UserRecord {
        self.create_user(CreateUserParams {
            username: username.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: String::new(),
            password_hash: String::new(),
        })
        .await
        .expect("seed user")
    }

    pub async fn seed_group(&self, title: &str, slug: &str) -> GroupRecord {
        GroupsRepo::create_group(
            self,
            CreateGroupParams {
                title: title.to_string(),
                slug: slug.to_string(),
                description: format!("Описание группы {title}"),
            },
        )
        .await
        .expect("seed group")
    }

    pub async fn seed_post(&self, author: &UserRecord, text: &str, group: Option<&GroupRecord>) -> PostRecord {
        PostsWriteRepo::create_post(
            self,
            CreatePostParams {
                text: text.to_string(),
                author_id: author.id,
                group_id: group.map(|group| group.id),
                image_path: None,
            },
        )
        .await
        .expect("seed post")
    }

    pub async fn seed_follow(&self, follower: &UserRecord, followed: &UserRecord) {
        self.insert_follow(follower.id, followed.id)
            .await
            .expect("seed follow");
    }

    pub async fn post_count(&self) -> usize {
        self.state.lock().await.posts.len()
    }

    pub async fn comment_count(&self) -> usize {
        self.state.lock().await.comments.len()
    }

    pub async fn follow_count(&self) -> usize {
        self.state.lock().await.follows.len()
    }

    pub async fn find_post(&self, id: i64) -> Option<PostRecord> {
        self.state
            .lock()
            .await
            .posts
            .iter()
            .find(|post| post.id == id)
            .cloned()
    }

    pub async fn latest_post(&self) -> Option<PostRecord> {
        self.state
            .lock()
            .await
            .posts
            .iter()
            .max_by_key(|post| post.id)
            .cloned()
    }
}

#[async_trait]
impl UsersRepo for MemoryRepo {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let mut state = self.state.lock().await;
        if state.users.iter().any(|user| user.username == params.username) {
            return Err(RepoError::Duplicate {
                constraint: "users_username_key".to_string(),
            });
        }
        let user = UserRecord {
            id: Uuid::new_v4(),
            username: params.username,
            first_name: params.first_name,
            last_name: params.last_name,
            email: params.email,
            password_hash: params.password_hash,
            created_at: OffsetDateTime::now_utc(),
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|user| user.id == id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .iter()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, RepoError> {
        let mut users = self.state.lock().await.users.clone();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }
}

#[async_trait]
impl GroupsRepo for MemoryRepo {
    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError> {
        let mut state = self.state.lock().await;
        if state.groups.iter().any(|group| group.slug == params.slug) {
            return Err(RepoError::Duplicate {
                constraint: "groups_slug_key".to_string(),
            });
        }
        let group = GroupRecord {
            id: Uuid::new_v4(),
            title: params.title,
            slug: params.slug,
            description: params.description,
            created_at: OffsetDateTime::now_utc(),
        };
        state.groups.push(group.clone());
        Ok(group)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state.groups.iter().find(|group| group.slug == slug).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<GroupRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state.groups.iter().find(|group| group.id == id).cloned())
    }

    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError> {
        let mut groups = self.state.lock().await.groups.clone();
        groups.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase()));
        Ok(groups)
    }
}

#[async_trait]
impl PostsRepo for MemoryRepo {
    async fn list_posts(
        &self,
        filter: &PostQueryFilter,
        page: PageRequest,
    ) -> Result<NumberedPage<PostSummary>, RepoError> {
        let state = self.state.lock().await;
        let posts = state.filtered(filter);
        let total = posts.len() as u64;
        let items = posts
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .map(|post| state.summary(post))
            .collect();
        Ok(NumberedPage::new(items, page, total))
    }

    async fn count_posts(&self, filter: &PostQueryFilter) -> Result<u64, RepoError> {
        let state = self.state.lock().await;
        Ok(state.filtered(filter).len() as u64)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state.posts.iter().find(|post| post.id == id).cloned())
    }

    async fn find_summary(&self, id: i64) -> Result<Option<PostSummary>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .posts
            .iter()
            .find(|post| post.id == id)
            .map(|post| state.summary(post)))
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryRepo {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut state = self.state.lock().await;
        state.next_post_id += 1;
        let now = OffsetDateTime::now_utc();
        let post = PostRecord {
            id: state.next_post_id,
            text: params.text,
            author_id: params.author_id,
            group_id: params.group_id,
            image_path: params.image_path,
            created_at: now,
            updated_at: now,
        };
        state.posts.push(post.clone());
        Ok(post)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut state = self.state.lock().await;
        let post = state
            .posts
            .iter_mut()
            .find(|post| post.id == params.id)
            .ok_or(RepoError::NotFound)?;
        post.text = params.text;
        post.group_id = params.group_id;
        post.image_path = params.image_path;
        post.updated_at = OffsetDateTime::now_utc();
        Ok(post.clone())
    }

    async fn delete_post(&self, id: i64) -> Result<(), RepoError> {
        let mut state = self.state.lock().await;
        state.posts.retain(|post| post.id != id);
        state.comments.retain(|comment| comment.post_id != id);
        Ok(())
    }
}

#[async_trait]
impl CommentsRepo for MemoryRepo {
    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let mut state = self.state.lock().await;
        state.next_comment_id += 1;
        let comment = CommentRecord {
            id: state.next_comment_id,
            post_id: params.post_id,
            author_id: params.author_id,
            text: params.text,
            created_at: OffsetDateTime::now_utc(),
        };
        state.comments.push(comment.clone());
        Ok(comment)
    }

    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentView>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .comments
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .map(|comment| {
                let author = state.users.iter().find(|user| user.id == comment.author_id);
                CommentView {
                    id: comment.id,
                    post_id: comment.post_id,
                    author_username: author.map(|user| user.username.clone()).unwrap_or_default(),
                    author_name: author.map(UserRecord::display_name).unwrap_or_default(),
                    text: comment.text.clone(),
                    created_at: comment.created_at,
                }
            })
            .collect())
    }
}

#[async_trait]
impl FollowsRepo for MemoryRepo {
    async fn insert_follow(
        &self,
        follower_id: Uuid,
        followed_id: Uuid,
    ) -> Result<Option<FollowRecord>, RepoError> {
        let mut state = self.state.lock().await;
        if state
            .follows
            .iter()
            .any(|edge| edge.follower_id == follower_id && edge.followed_id == followed_id)
        {
            return Ok(None);
        }
        let edge = FollowRecord {
            id: Uuid::new_v4(),
            follower_id,
            followed_id,
            created_at: OffsetDateTime::now_utc(),
        };
        state.follows.push(edge.clone());
        Ok(Some(edge))
    }

    async fn delete_follow(&self, follower_id: Uuid, followed_id: Uuid) -> Result<bool, RepoError> {
        let mut state = self.state.lock().await;
        let before = state.follows.len();
        state
            .follows
            .retain(|edge| !(edge.follower_id == follower_id && edge.followed_id == followed_id));
        Ok(state.follows.len() != before)
    }

    async fn follow_exists(&self, follower_id: Uuid, followed_id: Uuid) -> Result<bool, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .follows
            .iter()
            .any(|edge| edge.follower_id == follower_id && edge.followed_id == followed_id))
    }

    async fn count_followers(&self, user_id: Uuid) -> Result<u64, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .follows
            .iter()
            .filter(|edge| edge.followed_id == user_id)
            .count() as u64)
    }

    async fn count_following(&self, user_id: Uuid) -> Result<u64, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .follows
            .iter()
            .filter(|edge| edge.follower_id == user_id)
            .count() as u64)
    }
}

#[async_trait]
impl MessagesRepo for MemoryRepo {
    async fn create_message(
        &self,
        params: CreateMessageParams,
    ) -> Result<MessageRecord, RepoError> {
        let mut state = self.state.lock().await;
        let message = MessageRecord {
            id: Uuid::new_v4(),
            sender_id: params.sender_id,
            recipient_id: params.recipient_id,
            text: params.text,
            created_at: OffsetDateTime::now_utc(),
        };
        state.messages.push(message.clone());
        Ok(message)
    }

    async fn list_between(&self, a: Uuid, b: Uuid) -> Result<Vec<MessageRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .messages
            .iter()
            .filter(|message| {
                (message.sender_id == a && message.recipient_id == b)
                    || (message.sender_id == b && message.recipient_id == a)
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SessionsRepo for MemoryRepo {
    async fn create_session(
        &self,
        params: CreateSessionParams,
    ) -> Result<SessionRecord, RepoError> {
        let mut state = self.state.lock().await;
        let session = SessionRecord {
            id: Uuid::new_v4(),
            user_id: params.user_id,
            prefix: params.prefix,
            hashed_secret: params.hashed_secret,
            created_at: OffsetDateTime::now_utc(),
            expires_at: params.expires_at,
        };
        state.sessions.push(session.clone());
        Ok(session)
    }

    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<SessionRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .sessions
            .iter()
            .find(|session| session.prefix == prefix)
            .cloned())
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<(), RepoError> {
        let mut state = self.state.lock().await;
        state.sessions.retain(|session| session.prefix != prefix);
        Ok(())
    }

    async fn delete_expired(&self, now: OffsetDateTime) -> Result<u64, RepoError> {
        let mut state = self.state.lock().await;
        let before = state.sessions.len();
        state.sessions.retain(|session| session.expires_at > now);
        Ok((before - state.sessions.len()) as u64)
    }
}

#[async_trait]
impl HealthRepo for MemoryRepo {
    async fn ping(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

/// The full router wired to a [`MemoryRepo`] and a throwaway media directory.
pub struct TestApp {
    pub repo: Arc<MemoryRepo>,
    pub state: HttpState,
    pub router: Router,
    _media: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_cache(CacheConfig::default())
    }

    pub fn with_cache(cache_config: CacheConfig) -> Self {
        let repo = MemoryRepo::new();
        let media = TempDir::new().expect("media dir");
        let storage =
            Arc::new(UploadStorage::new(media.path().to_path_buf()).expect("upload storage"));
        let cache = Arc::new(PageCache::new(&cache_config));

        let users: Arc<dyn UsersRepo> = repo.clone();
        let groups: Arc<dyn GroupsRepo> = repo.clone();
        let posts: Arc<dyn PostsRepo> = repo.clone();
        let writer: Arc<dyn PostsWriteRepo> = repo.clone();
        let comments: Arc<dyn CommentsRepo> = repo.clone();
        let follows: Arc<dyn FollowsRepo> = repo.clone();
        let messages: Arc<dyn MessagesRepo> = repo.clone();
        let sessions: Arc<dyn SessionsRepo> = repo.clone();
        let health: Arc<dyn HealthRepo> = repo.clone();

        let state = HttpState {
            feed: Arc::new(FeedService::new(
                users.clone(),
                groups.clone(),
                posts.clone(),
                comments.clone(),
                follows.clone(),
            )),
            posts: Arc::new(PostService::new(
                users.clone(),
                groups.clone(),
                posts,
                writer,
                comments,
                storage.clone(),
                cache.clone(),
            )),
            groups: Arc::new(GroupService::new(groups)),
            follows: Arc::new(FollowService::new(users.clone(), follows.clone())),
            messages: Arc::new(MessageService::new(users.clone(), messages, follows)),
            accounts: Arc::new(AccountService::new(
                users,
                sessions,
                time::Duration::hours(1),
            )),
            cache,
            upload_storage: storage,
            health,
            upload_limit_bytes: 1024 * 1024,
            cookie_secure: false,
        };
        let router = build_router(state.clone());

        Self {
            repo,
            state,
            router,
            _media: media,
        }
    }

    /// A `Cookie` header value signing in as `user`.
    pub async fn session_cookie(&self, user: &UserRecord) -> String {
        let session = self
            .state
            .accounts
            .open_session(user.clone())
            .await
            .expect("open session");
        format!("{SESSION_COOKIE}={}", session.token)
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::get(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).expect("request"))
            .await
    }

    pub async fn post_form(&self, uri: &str, body: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).expect("request"))
            .await
    }

    pub async fn post_multipart(
        &self,
        uri: &str,
        form: MultipartBody,
        cookie: Option<&str>,
    ) -> Response<Body> {
        let mut builder = Request::post(uri).header(header::CONTENT_TYPE, form.content_type());
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(form.finish())).expect("request"))
            .await
    }
}

pub async fn body_to_string(response: Response<Body>) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf8 body")
}

pub fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

/// Builds a `multipart/form-data` body by hand.
pub struct MultipartBody {
    boundary: String,
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self {
            boundary: "yatube-test-boundary".to_string(),
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        self.body
    }
}
