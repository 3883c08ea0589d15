#![allow(dead_code)]

use campus_blog::{
    config::Config,
    models::{AccountInfo, Activity, Blog, PersonalInfo, User},
    services::{AuthUser, Database},
    state::AppState,
    store::Collection,
    utils::serde_helpers::now,
};
use serde_json::json;
use std::sync::Arc;

pub async fn state() -> Arc<AppState> {
    let db = Arc::new(Database::in_memory());
    Arc::new(
        AppState::new(Config::default(), db)
            .await
            .expect("state should build on the memory store"),
    )
}

pub fn admin() -> AuthUser {
    AuthUser {
        id: "admin".to_string(),
        admin: true,
    }
}

pub fn actor(id: &str) -> AuthUser {
    AuthUser {
        id: id.to_string(),
        admin: false,
    }
}

pub async fn seed_user(db: &Database, id: &str, total_posts: i64, total_reads: i64) -> User {
    let joined_at = now();
    let user = User {
        id: id.to_string(),
        personal_info: PersonalInfo {
            fullname: format!("User {}", id),
            email: format!("{}@poljan.ac.id", id),
            nim: None,
            password: None,
            username: id.to_string(),
            bio: String::new(),
            profile_img: String::new(),
            is_verified: true,
        },
        social_links: Default::default(),
        account_info: AccountInfo {
            total_posts,
            total_reads,
        },
        google_auth: false,
        admin: false,
        suspend: false,
        blogs: Vec::new(),
        joined_at,
        updated_at: joined_at,
    };
    db.create(Collection::Users, &user).await.expect("seed user");
    user
}

pub async fn seed_blog(db: &Database, id: &str, author: &str, draft: bool, total_reads: i64) -> Blog {
    let published_at = now();
    let blog = Blog {
        id: id.to_string(),
        blog_id: format!("{}-slug", id),
        title: format!("Blog {}", id),
        desc: "description".to_string(),
        banner: "https://cdn/banner.png".to_string(),
        content: json!({ "blocks": [{ "type": "paragraph" }] }),
        tags: vec!["campus".to_string()],
        author: author.to_string(),
        activity: Activity {
            total_likes: 3,
            total_comments: 0,
            total_reads,
            total_parent_comments: 0,
        },
        comments: Vec::new(),
        draft,
        active: true,
        published_at,
        updated_at: published_at,
    };
    db.create(Collection::Blogs, &blog).await.expect("seed blog");
    blog
}

pub async fn blog(db: &Database, id: &str) -> Blog {
    db.get_by_id(Collection::Blogs, id)
        .await
        .expect("store read")
        .expect("blog exists")
}

pub async fn user(db: &Database, id: &str) -> User {
    db.get_by_id(Collection::Users, id)
        .await
        .expect("store read")
        .expect("user exists")
}
