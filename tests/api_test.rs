mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use common::{multipart_body, test_app};
use scribe::cache::listing_key;
use scribe::posts::DEFAULT_PAGE_SIZE;

#[tokio::test]
async fn register_then_login_with_session_cookie() {
    let app = test_app();
    let credentials = json!({ "email": "Reader@Example.com", "password": "hunter22" });

    let register = Request::builder()
        .method("POST")
        .uri("/api/auth")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(credentials.to_string()))
        .unwrap();
    let response = app.router.clone().oneshot(register).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("session cookie")
        .to_string();
    assert!(set_cookie.starts_with("scribe_session="));
    assert!(set_cookie.contains("HttpOnly"));
    let cookie = set_cookie.split(';').next().unwrap().to_string();

    // The OTP goes out to the normalized address.
    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, vec!["reader@example.com"]);

    let (status, body) = app.get("/api/auth/me", Some(&cookie)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "reader@example.com");
    assert_eq!(body["tier"], "unverified");

    let (status, _) = app.post_json("/api/auth", None, credentials).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .post_json(
            "/api/auth",
            None,
            json!({ "email": "reader@example.com", "password": "wrong-password" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn otp_verification_upgrades_tier() {
    let app = test_app();
    let reader = app.seed_user("reader@example.com", false, false);
    {
        let conn = app.state.db.get().unwrap();
        scribe::users::set_otp(&conn, &reader.id, "123456").unwrap();
    }

    let (status, _) = app
        .post_json("/api/auth/otp/verify", Some(&reader.cookie), json!({ "pin": "000000" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post_json("/api/auth/otp/verify", Some(&reader.cookie), json!({ "pin": "123456" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["is_verified"], true);

    let (_, body) = app.get("/api/auth/me", Some(&reader.cookie)).await;
    assert_eq!(body["tier"], "verified");
}

#[tokio::test]
async fn logout_invalidates_session() {
    let app = test_app();
    let reader = app.seed_user("reader@example.com", false, true);

    let (status, _) = app.post_json("/api/auth/logout", Some(&reader.cookie), json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get("/api/auth/me", Some(&reader.cookie)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn commenting_requires_a_verified_account() {
    let app = test_app();
    let admin = app.seed_user("admin@example.com", true, true);
    let unverified = app.seed_user("new@example.com", false, false);
    let verified = app.seed_user("reader@example.com", false, true);
    let post_id = app.seed_post(&admin.id, "Hello");
    let uri = format!("/api/posts/{}/comments", post_id);
    let body = json!({ "content": "Nice post" });

    let (status, _) = app.post_json(&uri, None, body.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.post_json(&uri, Some(&unverified.cookie), body.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) = app.post_json(&uri, Some(&verified.cookie), body.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["comment"]["content"], "Nice post");

    // Anyone may read.
    let (status, thread) = app.get(&uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(thread["total"], 1);
    assert_eq!(thread["comments"][0]["author_id"], verified.id.as_str());
}

#[tokio::test]
async fn replies_must_belong_to_the_same_post() {
    let app = test_app();
    let admin = app.seed_user("admin@example.com", true, true);
    let reader = app.seed_user("reader@example.com", false, true);
    let first = app.seed_post(&admin.id, "First");
    let second = app.seed_post(&admin.id, "Second");
    app.seed_comment("c1", &first, None, &reader.id);

    let (status, _) = app
        .post_json(
            &format!("/api/posts/{}/comments", second),
            Some(&reader.cookie),
            json!({ "content": "Reply", "parent_id": "c1" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post_json(
            &format!("/api/posts/{}/comments", first),
            Some(&reader.cookie),
            json!({ "content": "Reply", "parent_id": "c1" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["comment"]["parent_id"], "c1");

    let (status, _) = app
        .post_json(
            &format!("/api/posts/{}/comments", first),
            Some(&reader.cookie),
            json!({ "content": "   " }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn comment_thread_drops_orphans_and_caps_depth() {
    let app = test_app();
    let admin = app.seed_user("admin@example.com", true, true);
    let post_id = app.seed_post(&admin.id, "Threads");
    app.seed_comment("a", &post_id, None, &admin.id);
    app.seed_comment("b", &post_id, Some("a"), &admin.id);
    app.seed_comment("c", &post_id, Some("b"), &admin.id);
    app.seed_comment("d", &post_id, Some("c"), &admin.id);
    app.seed_comment("lost", &post_id, Some("ghost"), &admin.id);
    app.seed_comment("z", &post_id, None, &admin.id);

    let (status, body) = app
        .get(&format!("/api/posts/{}/comments?depth=2", post_id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 6);

    let roots = body["comments"].as_array().unwrap();
    let ids: Vec<&str> = roots.iter().map(|r| r["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["a", "z"]);

    let c = &roots[0]["replies"][0]["replies"][0];
    assert_eq!(c["id"], "c");
    assert_eq!(c["replies"].as_array().unwrap().len(), 0);
    assert_eq!(c["hidden_replies"], 1);
}

#[tokio::test]
async fn comments_on_unknown_post_are_not_found() {
    let app = test_app();
    let (status, _) = app.get("/api/posts/missing/comments", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_creates_post_and_listing_cache_is_refreshed() {
    let app = test_app();
    let admin = app.seed_user("admin@example.com", true, true);
    let reader = app.seed_user("reader@example.com", false, true);

    // Warm the cache with an empty feed.
    let (_, feed) = app.get("/api/posts", None).await;
    assert_eq!(feed["pagination"]["total_posts"], 0);

    let fields = [
        ("title", "Ownership in practice"),
        ("description", "Borrowing without tears"),
        ("content", "<p>Body</p>"),
        ("tags", r#"["rust","memory"]"#),
        ("category", "tech"),
    ];
    let body = multipart_body(&fields, Some(("banner.png", &b"\x89PNG fake"[..])));

    let (status, _) = app
        .post_multipart("/api/admin/posts", &reader.cookie, body.clone())
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) = app.post_multipart("/api/admin/posts", &admin.cookie, body).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["post"]["tags"], json!(["rust", "memory"]));
    let image = created["post"]["image"].as_str().unwrap().to_string();
    assert!(image.starts_with("/uploads/") && image.ends_with(".png"));

    let (_, feed) = app.get("/api/posts", None).await;
    assert_eq!(feed["pagination"]["total_posts"], 1);
    assert_eq!(feed["posts"][0]["title"], "Ownership in practice");

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri(&image).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
}

#[tokio::test]
async fn admin_post_form_is_validated() {
    let app = test_app();
    let admin = app.seed_user("admin@example.com", true, true);

    let bad_tags = multipart_body(
        &[("title", "T"), ("tags", "rust, web")],
        Some(("banner.png", &b"png"[..])),
    );
    let (status, body) = app.post_multipart("/api/admin/posts", &admin.cookie, bad_tags).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid tags format");

    let no_image = multipart_body(&[("title", "T"), ("tags", "[]")], None);
    let (status, body) = app.post_multipart("/api/admin/posts", &admin.cookie, no_image).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No banner uploaded");

    let past = multipart_body(
        &[("title", "T"), ("tags", "[]"), ("scheduled_at", "2001-01-01T00:00:00Z")],
        Some(("banner.png", &b"png"[..])),
    );
    let (status, _) = app.post_multipart("/api/admin/posts", &admin.cookie, past).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn post_detail_counts_views_and_likes_toggle() {
    let app = test_app();
    let admin = app.seed_user("admin@example.com", true, true);
    let reader = app.seed_user("reader@example.com", false, true);
    let post_id = app.seed_post(&admin.id, "Counting");
    let uri = format!("/api/posts/{}", post_id);

    let (_, first) = app.get(&uri, None).await;
    assert_eq!(first["post"]["views"], 1);
    let (_, second) = app.get(&uri, Some(&reader.cookie)).await;
    assert_eq!(second["post"]["views"], 2);
    assert_eq!(second["liked"], false);

    let like_uri = format!("/api/posts/{}/like", post_id);
    let (status, _) = app.post_json(&like_uri, None, json!({})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, liked) = app.post_json(&like_uri, Some(&reader.cookie), json!({})).await;
    assert_eq!(liked, json!({ "liked": true, "likes": 1 }));

    let (_, mine) = app.get("/api/me/liked-posts", Some(&reader.cookie)).await;
    assert_eq!(mine["posts"][0]["id"], post_id.as_str());

    let (_, unliked) = app.post_json(&like_uri, Some(&reader.cookie), json!({})).await;
    assert_eq!(unliked, json!({ "liked": false, "likes": 0 }));
}

#[tokio::test]
async fn search_and_category_only_see_published_posts() {
    let app = test_app();
    let admin = app.seed_user("admin@example.com", true, true);
    app.seed_post(&admin.id, "Async Rust patterns");
    {
        let conn = app.state.db.get().unwrap();
        conn.execute(
            "INSERT INTO posts (id, user_id, title, category, is_scheduled, scheduled_at)
             VALUES ('later', ?1, 'Async Rust sequel', 'tech', 1, '2999-01-01 00:00:00')",
            rusqlite::params![admin.id],
        )
        .unwrap();
    }

    let (status, found) = app.get("/api/posts/search?q=async", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found["pagination"]["total_posts"], 1);
    assert_eq!(found["posts"][0]["title"], "Async Rust patterns");

    let (status, _) = app.get("/api/posts/search?q=", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, tech) = app.get("/api/posts/category/tech", None).await;
    assert_eq!(tech["pagination"]["total_posts"], 1);

    let (status, _) = app.get("/api/posts/later", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn subscriptions_toggle_for_verified_readers() {
    let app = test_app();
    let admin = app.seed_user("admin@example.com", true, true);
    let reader = app.seed_user("reader@example.com", false, true);
    let unverified = app.seed_user("new@example.com", false, false);
    let uri = format!("/api/authors/{}/subscription", admin.id);

    let (status, _) = app.post_json(&uri, None, json!({})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.post_json(&uri, Some(&unverified.cookie), json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.post_json(&uri, Some(&admin.cookie), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, on) = app.post_json(&uri, Some(&reader.cookie), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(on, json!({ "subscribed": true, "subscriber_count": 1 }));

    let (_, status_body) = app.get(&uri, Some(&reader.cookie)).await;
    assert_eq!(status_body["subscribed"], true);

    let (_, mine) = app.get("/api/me/subscriptions", Some(&reader.cookie)).await;
    assert_eq!(mine["subscriptions"][0]["author_id"], admin.id.as_str());

    let (_, off) = app.post_json(&uri, Some(&reader.cookie), json!({})).await;
    assert_eq!(off, json!({ "subscribed": false, "subscriber_count": 0 }));
}

#[tokio::test]
async fn uploads_reject_path_traversal() {
    let app = test_app();
    let (status, _) = app.get("/uploads/..%2Ftest.db", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.get("/uploads/missing.png", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn listing_pages_past_the_end_are_not_cached() {
    let app = test_app();
    let admin = app.seed_user("admin@example.com", true, true);
    app.seed_post(&admin.id, "Only post");

    let (status, first) = app.get("/api/posts", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["pagination"]["total_pages"], 1);

    for page in [2, 50, 4000] {
        let (status, beyond) = app.get(&format!("/api/posts?page={page}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(beyond["posts"], json!([]));
    }

    let cached = |page: u32| listing_key("latest", page, DEFAULT_PAGE_SIZE);
    assert!(app.state.cache.get(&cached(1)).await.unwrap().is_some());
    for page in [2, 50, 4000] {
        assert!(app.state.cache.get(&cached(page)).await.unwrap().is_none());
    }
}

#[tokio::test]
async fn avatar_upload_updates_profile_and_is_served() {
    let app = test_app();
    let reader = app.seed_user("reader@example.com", false, true);
    let body = multipart_body(&[], Some(("Me.PNG", &b"\x89PNG avatar"[..])));

    let (status, _) = app
        .send_multipart("PUT", "/api/auth/avatar", None, body.clone())
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, updated) = app
        .send_multipart("PUT", "/api/auth/avatar", Some(&reader.cookie), body)
        .await;
    assert_eq!(status, StatusCode::OK);
    let avatar = updated["user"]["avatar"].as_str().unwrap().to_string();
    assert!(avatar.starts_with("/uploads/") && avatar.ends_with(".png"));

    let (_, me) = app.get("/api/auth/me", Some(&reader.cookie)).await;
    assert_eq!(me["user"]["avatar"], avatar.as_str());

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri(&avatar).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");

    // The new avatar shows up next to the reader's comments.
    let admin = app.seed_user("admin@example.com", true, true);
    let post_id = app.seed_post(&admin.id, "Avatars");
    app.seed_comment("c1", &post_id, None, &reader.id);
    let (_, thread) = app
        .get(&format!("/api/posts/{}/comments", post_id), None)
        .await;
    assert_eq!(thread["comments"][0]["author_avatar"], avatar.as_str());
}

#[tokio::test]
async fn avatar_upload_rejects_missing_or_unsupported_files() {
    let app = test_app();
    let reader = app.seed_user("reader@example.com", false, false);

    let (status, _) = app
        .send_multipart(
            "PUT",
            "/api/auth/avatar",
            Some(&reader.cookie),
            multipart_body(&[("name", "no file")], None),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send_multipart(
            "PUT",
            "/api/auth/avatar",
            Some(&reader.cookie),
            multipart_body(&[], Some(("avatar.svg", &b"<svg/>"[..]))),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, me) = app.get("/api/auth/me", Some(&reader.cookie)).await;
    assert!(me["user"]["avatar"].is_null());
}
