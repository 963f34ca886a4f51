mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use common::TestApp;
use serde_json::json;
use tunescout::management::Store;

#[tokio::test]
async fn test_health() {
    let app = TestApp::start().await;

    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_signup_validation_errors() {
    let app = TestApp::start().await;

    let (status, body) = app.json("POST", "/api/auth/signup/", None, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let errors = body["errors"].as_object().unwrap();
    for field in ["username", "email", "password", "password_confirm"] {
        assert!(errors.contains_key(field), "missing error for {field}");
    }

    let (status, body) = app
        .json(
            "POST",
            "/api/auth/signup/",
            None,
            json!({
                "username": "ann",
                "email": "not-an-email",
                "password": "short",
                "password_confirm": "different"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"]["email"][0], "Enter a valid email address.");
    assert_eq!(
        body["errors"]["password_confirm"][0],
        "Password confirmation does not match."
    );
}

#[tokio::test]
async fn test_signup_returns_profile_and_rejects_duplicates() {
    let app = TestApp::start().await;
    let signup = json!({
        "username": "ann",
        "email": "Ann@Example.com",
        "password": "Str0ng-Passphrase",
        "password_confirm": "Str0ng-Passphrase"
    });

    let (status, body) = app.json("POST", "/api/auth/signup/", None, signup.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["username"], "ann");
    assert_eq!(body["email"], "ann@example.com");
    assert_eq!(body["is_public_favorites"], true);
    assert!(body.get("password_hash").is_none());

    let (status, body) = app.json("POST", "/api/auth/signup/", None, signup).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["errors"]["username"][0],
        "A user with that username already exists."
    );
}

#[tokio::test]
async fn test_token_flow() {
    let app = TestApp::start().await;
    app.register("ann").await;

    let (status, body) = app
        .json(
            "POST",
            "/api/auth/token/",
            None,
            json!({ "username": "ann", "password": "wrong-password" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        body["detail"],
        "No active account found with the given credentials"
    );

    let (status, pair) = app
        .json(
            "POST",
            "/api/auth/token/",
            None,
            json!({ "username": "ann", "password": "Str0ng-Passphrase" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let refresh = pair["refresh"].as_str().unwrap();

    let (status, body) = app
        .json(
            "POST",
            "/api/auth/token/refresh/",
            None,
            json!({ "refresh": refresh }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let access = body["access"].as_str().unwrap();

    let (status, body) = app.get("/api/users/me/", Some(access)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "ann");

    // A refresh token is not an access token, and the other way round
    let (status, body) = app.get("/api/users/me/", Some(refresh)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "token_not_valid");

    let (status, body) = app
        .json(
            "POST",
            "/api/auth/token/refresh/",
            None,
            json!({ "refresh": access }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Token is invalid or expired");
}

#[tokio::test]
async fn test_profile_requires_authentication() {
    let app = TestApp::start().await;

    let (status, body) = app.get("/api/users/me/", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Authentication credentials were not provided.");

    let (status, _) = app.get("/api/users/me/", Some("garbage")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_profile_update() {
    let app = TestApp::start().await;
    let token = app.register("ann").await;

    let (status, body) = app
        .json(
            "PATCH",
            "/api/users/me/",
            Some(&token),
            json!({
                "bio": "Listening to everything",
                "gender": "F",
                "birth_date": "1990-04-01",
                "username": "ignored"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bio"], "Listening to everything");
    assert_eq!(body["gender"], "F");
    assert_eq!(body["birth_date"], "1990-04-01");
    assert_eq!(body["username"], "ann");

    let (status, body) = app
        .json(
            "PATCH",
            "/api/users/me/",
            Some(&token),
            json!({ "gender": "X" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["gender"][0], "\"X\" is not a valid choice.");

    let (status, body) = app
        .json("PATCH", "/api/users/me/", Some(&token), json!(["bio"]))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Invalid data. Expected a dictionary.");
}

fn multipart_request(token: &str, field: &str, filename: &str, data: &[u8]) -> Request<Body> {
    let boundary = "tunescout-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method("PATCH")
        .uri("/api/users/me/media/")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_avatar_upload() {
    let app = TestApp::start().await;
    let token = app.register("ann").await;
    let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    let (status, body) = app
        .send(multipart_request(&token, "avatar", "me.png", &png))
        .await;
    assert_eq!(status, StatusCode::OK);
    let avatar = body["avatar"].as_str().unwrap();
    assert!(avatar.starts_with("/media/avatars/"));
    assert!(avatar.ends_with(".png"));
    let stored = app
        .state
        .settings
        .media_root
        .join(avatar.trim_start_matches("/media/"));
    assert!(stored.is_file());

    let (status, body) = app
        .send(multipart_request(&token, "avatar", "me.txt", b"plain text"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["avatar"][0].as_str().unwrap().starts_with("Upload a valid image."));

    let (status, body) = app
        .send(multipart_request(&token, "other", "me.png", &png))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "No image supplied.");
}

#[tokio::test]
async fn test_failed_profile_write_discards_upload() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("db.json");
    let app = TestApp::with_store(Store::open(&db_path).await.unwrap()).await;
    let token = app.register("ann").await;

    // A directory in place of the database file makes every write fail
    std::fs::remove_file(&db_path).unwrap();
    std::fs::create_dir(&db_path).unwrap();
    std::fs::write(db_path.join("keep"), b"x").unwrap();

    let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    let (status, body) = app
        .send(multipart_request(&token, "avatar", "me.png", &png))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["detail"], "Failed to update profile.");

    let avatars = app.state.settings.media_root.join("avatars");
    assert_eq!(std::fs::read_dir(&avatars).unwrap().count(), 0);

    let (_, body) = app.get("/api/users/me/", Some(&token)).await;
    assert!(body["avatar"].is_null());
}

#[tokio::test]
async fn test_favorite_tracks() {
    let app = TestApp::start().await;
    let token = app.register("ann").await;
    let track = json!({ "name": "Karma Police", "artist": "Radiohead" });

    let (status, body) = app
        .json("POST", "/api/playlists/me/tracks/", Some(&token), track.clone())
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["detail"], "Track added.");

    let (status, body) = app
        .json(
            "POST",
            "/api/playlists/me/tracks/",
            Some(&token),
            json!({ "name": "karma police ", "artist": "RADIOHEAD" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["detail"], "Track already exists.");

    let (status, body) = app
        .json(
            "POST",
            "/api/playlists/me/tracks/",
            Some(&token),
            json!({ "name": "No Artist" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Both name and artist are required.");

    let (status, body) = app.get("/api/playlists/me/", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Favorites");
    assert_eq!(body["tracks"][0]["image_url"], "https://itunes/okc/600x600bb.jpg");

    let (status, _) = app
        .json("DELETE", "/api/playlists/me/tracks/", Some(&token), track.clone())
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .json("DELETE", "/api/playlists/me/tracks/", Some(&token), track)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Track not found.");
}

#[tokio::test]
async fn test_rename_playlist() {
    let app = TestApp::start().await;
    let token = app.register("ann").await;

    let (status, body) = app
        .json(
            "PATCH",
            "/api/playlists/me/",
            Some(&token),
            json!({ "title": "  Road trip " }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Road trip");

    let (status, _) = app
        .json("PATCH", "/api/playlists/me/", Some(&token), json!({ "title": "" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .json(
            "PATCH",
            "/api/playlists/me/",
            Some(&token),
            json!({ "title": "x".repeat(256) }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Title is too long.");
}

#[tokio::test]
async fn test_public_playlist_and_likes() {
    let app = TestApp::start().await;
    let ann = app.register("ann").await;
    let bob = app.register("bob").await;

    let (status, body) = app.get("/api/playlists/public/ANN/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["owner"]["username"], "ann");
    assert_eq!(body["playlist"]["likes_count"], 0);
    assert_eq!(body["playlist"]["liked_by_me"], false);

    let (status, body) = app
        .json("POST", "/api/playlists/public/ann/like/", Some(&bob), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["likes_count"], 1);
    assert_eq!(body["liked_by_me"], true);

    let (_, body) = app.get("/api/playlists/public/ann/", Some(&bob)).await;
    assert_eq!(body["playlist"]["liked_by_me"], true);

    let (status, body) = app
        .json("POST", "/api/playlists/public/ann/like/", Some(&ann), json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "You cannot like your own public playlist.");

    let (status, body) = app
        .json("DELETE", "/api/playlists/public/ann/like/", Some(&bob), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["likes_count"], 0);

    let (status, body) = app.get("/api/playlists/public/nobody/", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Public playlist not found.");

    let (status, _) = app
        .json("POST", "/api/playlists/public/ann/like/", None, json!({}))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_private_playlist_is_hidden() {
    let app = TestApp::start().await;
    let ann = app.register("ann").await;
    let bob = app.register("bob").await;

    app.json(
        "PATCH",
        "/api/users/me/",
        Some(&ann),
        json!({ "is_public_favorites": false }),
    )
    .await;

    let (status, _) = app.get("/api/playlists/public/ann/", Some(&bob)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .json("POST", "/api/playlists/public/ann/like/", Some(&bob), json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_like_pushes_notification() {
    let app = TestApp::start().await;
    app.register("ann").await;
    let bob = app.register("bob").await;
    let ann_id = app.state.store.user_by_username("ann").await.unwrap().id;

    let mut events = app.state.hub.subscribe(ann_id);
    app.json("POST", "/api/playlists/public/ann/like/", Some(&bob), json!({}))
        .await;

    let payload = events.try_recv().unwrap();
    assert_eq!(payload.kind, "playlist_like");
    assert_eq!(payload.actor_username, "bob");
    assert_eq!(payload.message, "bob liked your playlist \"Favorites\"");

    // A repeated like is not pushed again
    app.json("POST", "/api/playlists/public/ann/like/", Some(&bob), json!({}))
        .await;
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_notifications_list() {
    let app = TestApp::start().await;
    let ann = app.register("ann").await;
    let bob = app.register("bob").await;
    let cid = app.register("cid").await;

    for token in [&bob, &cid] {
        app.json("POST", "/api/playlists/public/ann/like/", Some(token), json!({}))
            .await;
    }

    let (status, body) = app.get("/api/notifications/", Some(&ann)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["count"], 2);

    let (_, body) = app.get("/api/notifications/?limit=1", Some(&ann)).await;
    assert_eq!(body["results"].as_array().unwrap().len(), 1);

    let (status, body) = app.get("/api/notifications/?limit=0", Some(&ann)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Limit must be 1-100.");

    let (status, _) = app.get("/api/notifications/", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_notification_socket_requires_token() {
    let app = TestApp::start().await;

    let (status, _) = app.get("/ws/notifications/", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.get("/ws/notifications/?token=garbage", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "token_not_valid");
}

#[tokio::test]
async fn test_trending_playlists() {
    let app = TestApp::start().await;
    let ann = app.register("ann").await;
    let bob = app.register("bob").await;
    let cid = app.register("cid").await;

    app.json("POST", "/api/playlists/public/bob/like/", Some(&ann), json!({}))
        .await;
    app.json("POST", "/api/playlists/public/bob/like/", Some(&cid), json!({}))
        .await;
    app.json("POST", "/api/playlists/public/cid/like/", Some(&bob), json!({}))
        .await;

    let (status, body) = app.get("/api/playlists/public/trending/", None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["username"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["bob", "cid", "ann"]);
    assert_eq!(body["results"][0]["likes_count"], 2);
    assert_eq!(body["meta"]["limit"], 8);

    let (status, body) = app.get("/api/playlists/public/trending/?limit=31", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Limit must be 1-30.");
}

#[tokio::test]
async fn test_year_chart_endpoint() {
    let app = TestApp::start().await;

    let (status, body) = app.get("/music_api/year-chart/?limit=0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Limit must be 1-75");

    let (status, body) = app.get("/music_api/year-chart/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tracks"].as_array().unwrap().len(), 3);
    assert_eq!(body["meta"]["cached"], false);

    let (_, body) = app.get("/music_api/year-chart/", None).await;
    assert_eq!(body["meta"]["cached"], true);
    assert_eq!(app.upstream.hits("lastfm:chart.gettoptracks"), 1);

    let (_, body) = app.get("/music_api/year-chart/?genre=rock", None).await;
    assert_eq!(body["tracks"][0]["name"], "Song 2");
}

#[tokio::test]
async fn test_oversized_limits_are_clamped() {
    let app = TestApp::start().await;

    let (status, body) = app
        .get("/music_api/year-chart/?limit=100000000000000000000000", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tracks"].as_array().unwrap().len(), 3);

    let (status, body) = app
        .get("/music_api/trending/?limit=100000000000000000000000", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["limit"], 75);
}

#[tokio::test]
async fn test_search_pagination() {
    let app = TestApp::start().await;

    let (status, body) = app.get("/music_api/search/", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Query required");

    let (status, body) = app.get("/music_api/search/?q=anthem", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 20);
    assert_eq!(body["results"].as_array().unwrap().len(), 14);
    assert_eq!(
        body["next"],
        "http://localhost/music_api/search/?q=anthem&page=2"
    );
    assert!(body["previous"].is_null());

    let (_, body) = app.get("/music_api/search/?q=anthem&page=2", None).await;
    assert_eq!(body["results"].as_array().unwrap().len(), 6);
    assert!(body["next"].is_null());
    assert_eq!(body["previous"], "http://localhost/music_api/search/?q=anthem");

    let (_, body) = app
        .get("/music_api/search/?q=anthem&page=last&page_size=5", None)
        .await;
    assert_eq!(body["results"][0]["name"], "anthem 16");

    let (status, body) = app.get("/music_api/search/?q=anthem&page=9", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Invalid page.");

    let (status, body) = app.get("/music_api/search/?q=nothing", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "results": [] }));
}

#[tokio::test]
async fn test_trending_artists_endpoint() {
    let app = TestApp::start().await;

    let (status, body) = app.get("/music_api/trending/?limit=abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Limit must be 1-75");

    let (status, body) = app.get("/music_api/trending/?limit=500", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["limit"], 75);
    assert_eq!(body["meta"]["genre"], "all");
    assert_eq!(body["meta"]["count"], 2);
    assert_eq!(body["artists"][0]["photo_url"], "https://deezer/radiohead.jpg");
}

#[tokio::test]
async fn test_wikipedia_endpoint() {
    let app = TestApp::start().await;

    let (status, body) = app
        .json("POST", "/api/wikipedia/artists/", None, json!({ "artists": "Radiohead" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "artists must be an array of artist names");

    let too_many: Vec<String> = (0..31).map(|i| format!("Artist {i}")).collect();
    let (status, body) = app
        .json("POST", "/api/wikipedia/artists/", None, json!({ "artists": too_many }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "artists length must be <= 30");

    let (status, body) = app
        .json(
            "POST",
            "/api/wikipedia/artists/",
            None,
            json!({ "artists": ["Radiohead"], "lang": "e1" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "lang is invalid");

    // Invalid credentials are ignored on this endpoint
    let (status, body) = app
        .json(
            "POST",
            "/api/wikipedia/artists/",
            Some("garbage"),
            json!({ "artists": ["Radiohead", null, " ", "Nirvana"], "lang": "RU" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["lang_requested"], "ru");
    assert_eq!(body["meta"]["count"], 1);
    assert_eq!(body["artists"]["Radiohead"]["lang"], "en");
}
