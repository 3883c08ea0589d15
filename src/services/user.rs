use crate::{
    config::Config,
    error::{AppError, Result},
    models::{AdminUsersQuery, UpdateProfileRequest, User, UserProfile, UserSummary},
    services::{
        auth::AuthUser,
        pagination::{paginate, Page, PageRequest, ADMIN_USERS_PAGE_SIZE},
        Database,
    },
    store::{Collection, Filter, FindOptions, Sort, Update},
    utils::{
        serde_helpers::{now, timestamp},
        validation::{validate_bio, validate_social_links, validate_username},
    },
};
use std::sync::Arc;
use tracing::{debug, info};
use validator::Validate;

/// 用户搜索最多返回的条数
pub const SEARCH_USERS_LIMIT: u64 = 50;

#[derive(Clone)]
pub struct UserService {
    db: Arc<Database>,
    max_bio_length: usize,
}

impl UserService {
    pub async fn new(db: Arc<Database>, config: &Config) -> Result<Self> {
        Ok(Self {
            db,
            max_bio_length: config.max_bio_length,
        })
    }

    pub async fn search_users(&self, query: &str) -> Result<Vec<UserSummary>> {
        let users: Vec<User> = self
            .db
            .find(
                Collection::Users,
                &Filter::text_contains("personal_info.username", query),
                &FindOptions::sorted(Sort::asc("personal_info.username")).limit(SEARCH_USERS_LIMIT),
            )
            .await?;
        debug!("User search '{}' matched {}", query, users.len());
        Ok(users.iter().map(User::summary).collect())
    }

    pub async fn get_profile(&self, username: &str) -> Result<UserProfile> {
        let user: User = self
            .db
            .find_one(
                Collection::Users,
                &Filter::eq("personal_info.username", username),
            )
            .await?
            .ok_or_else(|| AppError::not_found("User"))?;
        Ok(user.profile())
    }

    pub async fn update_profile_img(&self, user_id: &str, url: &str) -> Result<String> {
        let update = Update::new()
            .set("personal_info.profile_img", url)
            .set("updatedAt", timestamp::format(&now()));
        self.db
            .update_by_id::<User>(Collection::Users, user_id, &update)
            .await?
            .ok_or_else(|| AppError::not_found("User"))?;
        info!("Profile image updated for {}", user_id);
        Ok(url.to_string())
    }

    /// 更新用户名、简介和社交链接；用户名冲突返回 409
    pub async fn update_profile(&self, user_id: &str, request: UpdateProfileRequest) -> Result<String> {
        validate_username(&request.username)?;
        validate_bio(&request.bio, self.max_bio_length)?;
        request.validate()?;
        validate_social_links(&request.social_links)?;

        let links = serde_json::to_value(&request.social_links)?;
        let update = Update::new()
            .set("personal_info.username", request.username.as_str())
            .set("personal_info.bio", request.bio.as_str())
            .set("social_links", links)
            .set("updatedAt", timestamp::format(&now()));

        self.db
            .update_by_id::<User>(Collection::Users, user_id, &update)
            .await
            .map_err(|e| {
                if e.is_duplicate() {
                    AppError::conflict("Username is already taken")
                } else {
                    e
                }
            })?
            .ok_or_else(|| AppError::not_found("User"))?;

        info!("Profile updated for {}", user_id);
        Ok(request.username)
    }

    fn admin_filter(query: &AdminUsersQuery) -> Filter {
        Filter::all()
            .with_opt(query.admin.map(|admin| Filter::eq("admin", admin)))
            .with_opt(query.suspend.map(|suspend| Filter::eq("suspend", suspend)))
            .with_opt(
                query
                    .query
                    .as_deref()
                    .filter(|q| !q.is_empty())
                    .map(|q| Filter::text_contains("personal_info.username", q)),
            )
    }

    pub async fn admin_users(&self, actor: &AuthUser, query: &AdminUsersQuery) -> Result<Page<UserProfile>> {
        actor.require_admin()?;
        let page: Page<User> = paginate(
            &self.db,
            Collection::Users,
            &Self::admin_filter(query),
            Sort::desc("account_info.total_posts").then_desc("account_info.total_reads"),
            PageRequest::from_query(query.page, ADMIN_USERS_PAGE_SIZE, query.deleted_doc_count),
        )
        .await?;
        Ok(page.map(|u| u.profile()))
    }

    pub async fn admin_users_count(&self, actor: &AuthUser, query: &AdminUsersQuery) -> Result<u64> {
        actor.require_admin()?;
        self.db
            .count(Collection::Users, &Self::admin_filter(query))
            .await
    }
}
