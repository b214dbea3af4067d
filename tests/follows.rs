//! Following authors and the followed-authors feed.

mod common;

use axum::http::StatusCode;

use yatube::application::repos::FollowsRepo;

use common::{TestApp, location, post_cards};

#[tokio::test]
async fn follow_is_idempotent() {
    let app = TestApp::new();
    let leo = app.user("leo").await;
    let ann = app.user("ann").await;

    for _ in 0..2 {
        let response = app.get("/profile/leo/follow", Some("ann")).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/profile/leo/");
    }

    assert_eq!(app.repos.count_followers(leo.id).await.expect("count"), 1);
    assert!(app.repos.is_following(ann.id, leo.id).await.expect("lookup"));

    let (_, html) = app.get_page("/profile/leo/", Some("ann")).await;
    assert!(html.contains("<span class=\"follower-count\">1</span>"));
    assert!(html.contains("href=\"/profile/leo/unfollow\""));
}

#[tokio::test]
async fn self_follow_is_ignored() {
    let app = TestApp::new();
    let leo = app.user("leo").await;

    let response = app.get("/profile/leo/follow", Some("leo")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(app.repos.count_followers(leo.id).await.expect("count"), 0);
}

#[tokio::test]
async fn following_unknown_author_is_not_found() {
    let app = TestApp::new();
    app.user("ann").await;

    let response = app.get("/profile/nobody/follow", Some("ann")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unfollow_removes_relation() {
    let app = TestApp::new();
    let leo = app.user("leo").await;
    let ann = app.user("ann").await;
    app.get("/profile/leo/follow", Some("ann")).await;

    let response = app.get("/profile/leo/unfollow", Some("ann")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/profile/leo/");
    assert!(!app.repos.is_following(ann.id, leo.id).await.expect("lookup"));
}

#[tokio::test]
async fn unfollow_without_relation_is_not_found() {
    let app = TestApp::new();
    app.user("leo").await;
    app.user("ann").await;

    let response = app.get("/profile/leo/unfollow", Some("ann")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn follow_feed_shows_only_followed_authors() {
    let app = TestApp::new();
    let leo = app.user("leo").await;
    let ann = app.user("ann").await;
    app.user("bob").await;
    app.post(&leo, "from leo", None).await;
    app.post(&ann, "from ann", None).await;

    app.get("/profile/leo/follow", Some("bob")).await;

    let (status, html) = app.get_page("/follow/", Some("bob")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("from leo"));
    assert!(!html.contains("from ann"));
    assert_eq!(post_cards(&html), 1);

    // Someone who follows nobody sees an empty feed.
    let (status, html) = app.get_page("/follow/", Some("ann")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(post_cards(&html), 0);
    assert!(html.contains("No posts yet."));
}

#[tokio::test]
async fn new_posts_reach_followers_only() {
    let app = TestApp::new();
    let leo = app.user("leo").await;
    app.user("ann").await;
    app.user("bob").await;
    app.get("/profile/leo/follow", Some("ann")).await;

    app.post(&leo, "fresh post", None).await;

    let (_, follower) = app.get_page("/follow/", Some("ann")).await;
    assert!(follower.contains("fresh post"));

    let (_, stranger) = app.get_page("/follow/", Some("bob")).await;
    assert!(!stranger.contains("fresh post"));
}
