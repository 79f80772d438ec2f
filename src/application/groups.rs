//! Group creation and lookup.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::application::repos::{CreateGroupParams, GroupsRepo, RepoError};
use crate::domain::entities::GroupRecord;
use crate::domain::error::FieldErrors;
use crate::domain::slug::{SlugAsyncError, SlugError, generate_unique_slug, validate_slug};

pub const MAX_TITLE_CHARS: usize = 200;

#[derive(Debug, Clone, Default)]
pub struct GroupSubmission {
    pub title: String,
    /// Derived from the title when blank.
    pub slug: String,
    pub description: String,
}

#[derive(Debug, Error)]
pub enum GroupError {
    #[error("group form rejected: {0}")]
    Invalid(FieldErrors),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct GroupService {
    groups: Arc<dyn GroupsRepo>,
}

impl GroupService {
    pub fn new(groups: Arc<dyn GroupsRepo>) -> Self {
        Self { groups }
    }

    pub async fn create_group(&self, submission: GroupSubmission) -> Result<GroupRecord, GroupError> {
        let mut errors = FieldErrors::new();
        let title = submission.title.trim().to_string();
        if title.is_empty() {
            errors.push("title", "Обязательное поле.");
        } else if title.chars().count() > MAX_TITLE_CHARS {
            errors.push("title", format!("Не больше {MAX_TITLE_CHARS} символов."));
        }

        let requested_slug = submission.slug.trim().to_string();
        let slug = if requested_slug.is_empty() {
            if title.is_empty() {
                None
            } else {
                self.derive_unique_slug(&title, &mut errors).await?
            }
        } else {
            match validate_slug(&requested_slug) {
                Ok(()) => {
                    if self.groups.find_by_slug(&requested_slug).await?.is_some() {
                        errors.push("slug", "Группа с таким адресом уже существует.");
                    }
                    Some(requested_slug)
                }
                Err(err) => {
                    errors.push("slug", slug_message(&err));
                    None
                }
            }
        };

        let Some(slug) = slug.filter(|_| errors.is_empty()) else {
            return Err(GroupError::Invalid(errors));
        };

        let params = CreateGroupParams {
            title,
            slug,
            description: submission.description.trim().to_string(),
        };
        let group = match self.groups.create_group(params).await {
            Ok(group) => group,
            Err(RepoError::Duplicate { constraint }) => {
                let field = if constraint.contains("title") { "title" } else { "slug" };
                let mut errors = FieldErrors::new();
                errors.push(field, "Группа с таким значением уже существует.");
                return Err(GroupError::Invalid(errors));
            }
            Err(err) => return Err(err.into()),
        };

        info!(group = %group.slug, "Group created");
        Ok(group)
    }

    pub async fn list_groups(&self) -> Result<Vec<GroupRecord>, GroupError> {
        Ok(self.groups.list_groups().await?)
    }

    pub async fn find_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, GroupError> {
        Ok(self.groups.find_by_slug(slug).await?)
    }

    async fn derive_unique_slug(
        &self,
        title: &str,
        errors: &mut FieldErrors,
    ) -> Result<Option<String>, GroupError> {
        let groups = self.groups.clone();
        let result = generate_unique_slug(title, |candidate| {
            let groups = groups.clone();
            async move {
                let existing = groups.find_by_slug(&candidate).await?;
                Ok::<bool, RepoError>(existing.is_none())
            }
        })
        .await;

        match result {
            Ok(slug) => Ok(Some(slug)),
            Err(SlugAsyncError::Predicate(err)) => Err(GroupError::Repo(err)),
            Err(SlugAsyncError::Slug(err)) => {
                errors.push("slug", slug_message(&err));
                Ok(None)
            }
        }
    }
}

fn slug_message(err: &SlugError) -> &'static str {
    match err {
        SlugError::EmptyInput => "Обязательное поле.",
        SlugError::Unrepresentable { .. } => "Не удалось построить адрес из названия.",
        SlugError::InvalidCharacters { .. } => {
            "Допустимы только латинские буквы, цифры, дефис и подчёркивание."
        }
        SlugError::TooLong => "Адрес слишком длинный.",
        SlugError::Exhausted { .. } => "Не удалось подобрать свободный адрес.",
    }
}
