mod common;

use campus_blog::{
    error::AppError,
    models::{Activity, AddCommentRequest, Comment, CreateBlogRequest, NotificationType},
    services::{moderation::STEP_COMMENTS, notification::NewNotification},
    store::{Collection, Filter, FindOptions},
};
use serde_json::json;
use common::{actor, admin, blog, seed_blog, seed_user, state, user};

fn comment_on(blog_id: &str, text: &str) -> AddCommentRequest {
    AddCommentRequest {
        blog_id: blog_id.to_string(),
        comment: text.to_string(),
        replying_to: None,
        notification_id: None,
    }
}

#[tokio::test]
async fn suspending_a_blog_resets_counters_and_clears_dependents() {
    let state = state().await;
    let db = state.db.as_ref();
    seed_user(db, "author", 1, 80).await;
    seed_user(db, "reader", 0, 0).await;
    let b = seed_blog(db, "b1", "author", false, 50).await;

    state
        .notification_service
        .create(NewNotification::new(NotificationType::Like, "b1", "author", "reader"))
        .await
        .unwrap();
    state
        .comment_service
        .add_comment("reader", comment_on("b1", "nice post"))
        .await
        .unwrap();

    let report = state
        .moderation_service
        .suspend_blog(&admin(), &b.blog_id)
        .await
        .unwrap();
    assert!(report.is_clean());

    let suspended = blog(db, "b1").await;
    assert!(!suspended.active);
    assert_eq!(suspended.activity, Activity::default());
    assert!(suspended.comments.is_empty());

    let author = user(db, "author").await;
    assert_eq!(author.account_info.total_reads, 30);
    assert_eq!(author.account_info.total_posts, 0);

    let remaining = db
        .count(Collection::Notifications, &Filter::eq("blog", "b1"))
        .await
        .unwrap();
    let suspend_notices = db
        .count(
            Collection::Notifications,
            &Filter::eq("blog", "b1").with(Filter::eq("type", "suspend")),
        )
        .await
        .unwrap();
    assert_eq!(remaining, 1);
    assert_eq!(suspend_notices, 1);
    assert_eq!(
        db.count(Collection::Comments, &Filter::eq("blog_id", "b1")).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn unsuspending_restores_visibility_but_not_counters() {
    let state = state().await;
    let db = state.db.as_ref();
    seed_user(db, "author", 1, 50).await;
    let b = seed_blog(db, "b1", "author", false, 50).await;

    state.moderation_service.suspend_blog(&admin(), &b.blog_id).await.unwrap();
    state.moderation_service.unsuspend_blog(&admin(), &b.blog_id).await.unwrap();

    let restored = blog(db, "b1").await;
    assert!(restored.active);
    assert_eq!(restored.activity, Activity::default());
    assert!(restored.comments.is_empty());
    assert_eq!(user(db, "author").await.account_info.total_posts, 1);

    let unsuspend_notices = db
        .count(
            Collection::Notifications,
            &Filter::eq("blog", "b1").with(Filter::eq("type", "unsuspend")),
        )
        .await
        .unwrap();
    assert_eq!(unsuspend_notices, 1);
    assert_eq!(
        db.count(Collection::Notifications, &Filter::eq("blog", "b1")).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn blog_transitions_are_guarded_by_state() {
    let state = state().await;
    let db = state.db.as_ref();
    seed_user(db, "author", 1, 50).await;
    let b = seed_blog(db, "b1", "author", false, 50).await;
    let draft = seed_blog(db, "d1", "author", true, 0).await;

    assert!(matches!(
        state.moderation_service.unsuspend_blog(&admin(), &b.blog_id).await,
        Err(AppError::Conflict(_))
    ));
    state.moderation_service.suspend_blog(&admin(), &b.blog_id).await.unwrap();
    assert!(matches!(
        state.moderation_service.suspend_blog(&admin(), &b.blog_id).await,
        Err(AppError::Conflict(_))
    ));
    assert!(matches!(
        state.moderation_service.suspend_blog(&admin(), &draft.blog_id).await,
        Err(AppError::Conflict(_))
    ));

    // 重复封禁不会再次扣减作者计数
    let author = user(db, "author").await;
    assert_eq!(author.account_info.total_posts, 0);
    assert_eq!(author.account_info.total_reads, 0);
}

#[tokio::test]
async fn moderation_requires_admin() {
    let state = state().await;
    let db = state.db.as_ref();
    seed_user(db, "author", 1, 0).await;
    let b = seed_blog(db, "b1", "author", false, 0).await;

    let result = state
        .moderation_service
        .suspend_blog(&actor("author"), &b.blog_id)
        .await;
    assert!(matches!(result, Err(AppError::Authorization(_))));
    assert!(blog(db, "b1").await.active);

    assert!(matches!(
        state.moderation_service.delete_user(&actor("author"), "author").await,
        Err(AppError::Authorization(_))
    ));
}

#[tokio::test]
async fn missing_primary_entity_is_not_found() {
    let state = state().await;
    assert!(matches!(
        state.moderation_service.suspend_blog(&admin(), "nope").await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        state.moderation_service.suspend_user(&admin(), "nope").await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        state.moderation_service.admin_delete_blog(&admin(), "nope").await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn suspending_a_user_hides_every_blog() {
    let state = state().await;
    let db = state.db.as_ref();
    seed_user(db, "author", 2, 120).await;
    seed_user(db, "reader", 0, 0).await;
    seed_blog(db, "b1", "author", false, 70).await;
    seed_blog(db, "b2", "author", false, 50).await;
    seed_blog(db, "other", "reader", false, 5).await;

    state
        .comment_service
        .add_comment("author", comment_on("other", "hello"))
        .await
        .unwrap();
    state
        .notification_service
        .create(NewNotification::new(NotificationType::Like, "b1", "author", "reader"))
        .await
        .unwrap();

    let report = state.moderation_service.suspend_user(&admin(), "author").await.unwrap();
    assert!(report.is_clean());
    assert_eq!(report.affected(STEP_COMMENTS), Some(1));

    let suspended = user(db, "author").await;
    assert!(suspended.suspend);
    assert_eq!(suspended.account_info.total_reads, 0);
    for id in ["b1", "b2"] {
        let b = blog(db, id).await;
        assert!(!b.active);
        assert_eq!(b.activity, Activity::default());
        assert!(b.comments.is_empty());
    }
    let other = blog(db, "other").await;
    assert!(other.active);
    assert_eq!(other.activity.total_comments, 0);
    assert!(other.comments.is_empty());
    assert_eq!(
        db.count(Collection::Notifications, &Filter::eq("blog", "other"))
            .await
            .unwrap(),
        0
    );
    assert_eq!(
        db.count(Collection::Notifications, &Filter::eq("notification_for", "author"))
            .await
            .unwrap(),
        0
    );
    assert_eq!(
        db.count(Collection::Comments, &Filter::eq("commented_by", "author"))
            .await
            .unwrap(),
        0
    );

    state.moderation_service.unsuspend_user(&admin(), "author").await.unwrap();
    assert!(!user(db, "author").await.suspend);
    for id in ["b1", "b2"] {
        let b = blog(db, id).await;
        assert!(b.active);
        assert_eq!(b.activity, Activity::default());
    }
}

#[tokio::test]
async fn deleting_a_user_leaves_no_dangling_references() {
    let state = state().await;
    let db = state.db.as_ref();
    seed_user(db, "author", 1, 10).await;
    seed_user(db, "reader", 1, 0).await;
    seed_blog(db, "b1", "author", false, 10).await;
    seed_blog(db, "other", "reader", false, 0).await;

    state
        .comment_service
        .add_comment("reader", comment_on("b1", "first"))
        .await
        .unwrap();
    let top = state
        .comment_service
        .add_comment("reader", comment_on("other", "mine"))
        .await
        .unwrap();
    let mut answer = comment_on("other", "answer");
    answer.replying_to = Some(top.id.clone());
    let reply = state
        .comment_service
        .add_comment("author", answer)
        .await
        .unwrap();

    let report = state.moderation_service.delete_user(&admin(), "author").await.unwrap();
    assert!(report.is_clean());

    assert!(db
        .get_by_id::<campus_blog::models::User>(Collection::Users, "author")
        .await
        .unwrap()
        .is_none());
    assert_eq!(db.count(Collection::Blogs, &Filter::eq("author", "author")).await.unwrap(), 0);
    assert_eq!(
        db.count(Collection::Notifications, &Filter::eq("notification_for", "author"))
            .await
            .unwrap(),
        0
    );
    assert_eq!(
        db.count(Collection::Comments, &Filter::eq("blog_author", "author"))
            .await
            .unwrap(),
        0
    );

    let other = blog(db, "other").await;
    assert_eq!(other.activity.total_comments, 1);
    assert_eq!(other.comments, vec![top.id.clone()]);
    let parent: Comment = db
        .get_by_id(Collection::Comments, &top.id)
        .await
        .unwrap()
        .unwrap();
    assert!(parent.children.is_empty());
    assert_eq!(
        db.count(Collection::Notifications, &Filter::eq("comment", reply.id.as_str()))
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn suspending_a_user_unthreads_their_replies_elsewhere() {
    let state = state().await;
    let db = state.db.as_ref();
    seed_user(db, "author", 0, 0).await;
    seed_user(db, "reader", 1, 0).await;
    seed_blog(db, "other", "reader", false, 0).await;

    let top = state
        .comment_service
        .add_comment("reader", comment_on("other", "question"))
        .await
        .unwrap();
    let mut answer = comment_on("other", "answer");
    answer.replying_to = Some(top.id.clone());
    let reply = state
        .comment_service
        .add_comment("author", answer)
        .await
        .unwrap();
    let mut nested = comment_on("other", "follow-up");
    nested.replying_to = Some(reply.id.clone());
    state
        .comment_service
        .add_comment("reader", nested)
        .await
        .unwrap();

    let report = state.moderation_service.suspend_user(&admin(), "author").await.unwrap();
    assert!(report.is_clean());
    assert_eq!(report.affected(STEP_COMMENTS), Some(2));

    let remaining: Vec<Comment> = db
        .find(Collection::Comments, &Filter::all(), &FindOptions::default())
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, top.id);
    assert!(remaining[0].children.is_empty());

    let other = blog(db, "other").await;
    assert_eq!(other.activity.total_comments, 1);
    assert_eq!(other.activity.total_parent_comments, 1);
    assert_eq!(other.comments, vec![top.id.clone()]);

    assert_eq!(
        db.count(Collection::Notifications, &Filter::eq("comment", reply.id.as_str()))
            .await
            .unwrap(),
        0
    );
    assert_eq!(
        db.count(Collection::Notifications, &Filter::eq("replied_on_comment", reply.id.as_str()))
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn drafting_a_suspended_blog_leaves_post_count_alone() {
    let state = state().await;
    let db = state.db.as_ref();
    seed_user(db, "author", 2, 0).await;
    let suspended = seed_blog(db, "b1", "author", false, 0).await;
    let live = seed_blog(db, "b2", "author", false, 0).await;
    state.moderation_service.suspend_blog(&admin(), &suspended.blog_id).await.unwrap();
    assert_eq!(user(db, "author").await.account_info.total_posts, 1);

    let to_draft = |blog_id: &str| CreateBlogRequest {
        id: Some(blog_id.to_string()),
        title: "Back to the drawer".to_string(),
        desc: String::new(),
        banner: String::new(),
        content: json!({ "blocks": [] }),
        tags: Vec::new(),
        draft: true,
    };
    state
        .blog_service
        .create_or_update("author", to_draft(&suspended.blog_id))
        .await
        .unwrap();
    assert_eq!(user(db, "author").await.account_info.total_posts, 1);

    state
        .blog_service
        .create_or_update("author", to_draft(&live.blog_id))
        .await
        .unwrap();
    assert_eq!(user(db, "author").await.account_info.total_posts, 0);
}

#[tokio::test]
async fn deleting_own_account_removes_comments_on_own_blogs() {
    let state = state().await;
    let db = state.db.as_ref();
    seed_user(db, "author", 1, 0).await;
    seed_user(db, "reader", 0, 0).await;
    seed_blog(db, "b1", "author", false, 0).await;
    state
        .comment_service
        .add_comment("reader", comment_on("b1", "hi"))
        .await
        .unwrap();

    state
        .moderation_service
        .delete_own_account(&actor("author"))
        .await
        .unwrap();

    assert_eq!(db.count(Collection::Comments, &Filter::all()).await.unwrap(), 0);
    assert_eq!(db.count(Collection::Blogs, &Filter::all()).await.unwrap(), 0);
    assert!(matches!(
        state.moderation_service.delete_own_account(&actor("author")).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn owner_delete_cascades_and_respects_drafts() {
    let state = state().await;
    let db = state.db.as_ref();
    seed_user(db, "author", 1, 0).await;
    seed_user(db, "reader", 0, 0).await;
    let published = seed_blog(db, "b1", "author", false, 0).await;
    let draft = seed_blog(db, "d1", "author", true, 0).await;
    state
        .comment_service
        .add_comment("reader", comment_on("b1", "hi"))
        .await
        .unwrap();

    assert!(matches!(
        state.moderation_service.delete_blog(&actor("reader"), &published.blog_id).await,
        Err(AppError::Authorization(_))
    ));

    state
        .moderation_service
        .delete_blog(&actor("author"), &draft.blog_id)
        .await
        .unwrap();
    assert_eq!(user(db, "author").await.account_info.total_posts, 1);

    state
        .moderation_service
        .delete_blog(&actor("author"), &published.blog_id)
        .await
        .unwrap();
    assert_eq!(user(db, "author").await.account_info.total_posts, 0);
    assert_eq!(db.count(Collection::Comments, &Filter::eq("blog_id", "b1")).await.unwrap(), 0);
    assert_eq!(db.count(Collection::Notifications, &Filter::eq("blog", "b1")).await.unwrap(), 0);
}

#[tokio::test]
async fn admin_delete_decrements_posts_and_clamps_at_zero() {
    let state = state().await;
    let db = state.db.as_ref();
    seed_user(db, "author", 0, 0).await;
    let b = seed_blog(db, "b1", "author", false, 0).await;

    state.moderation_service.admin_delete_blog(&admin(), &b.blog_id).await.unwrap();

    assert_eq!(user(db, "author").await.account_info.total_posts, 0);
    assert_eq!(db.count(Collection::Blogs, &Filter::all()).await.unwrap(), 0);
}
