#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use rusqlite::params;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use scribe::auth::session;
use scribe::cache::MemoryFeedCache;
use scribe::config::Config;
use scribe::db;
use scribe::mail::{MailError, Mailer, OutgoingMail};
use scribe::state::AppState;

pub const BOUNDARY: &str = "scribe-test-boundary";

/// Captures outgoing mail instead of delivering it.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<OutgoingMail>>,
    pub fail: AtomicBool,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(MailError::Transport("relay refused connection".into()));
        }
        self.sent.lock().unwrap().push(mail);
        Ok(())
    }
}

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub mailer: Arc<RecordingMailer>,
    _dir: TempDir,
}

pub struct Seeded {
    pub id: String,
    pub cookie: String,
}

pub fn test_app() -> TestApp {
    let dir = TempDir::new().unwrap();
    let pool = db::create_pool(&dir.path().join("test.db")).expect("Failed to create test database");
    db::run_migrations(&pool).expect("Failed to run migrations");

    let mut config = Config::default();
    config.storage.path = Some(dir.path().join("uploads"));
    config.server.client_url = "https://blog.example.com".to_string();

    let mailer = Arc::new(RecordingMailer::default());
    let state = AppState {
        db: pool,
        config,
        mailer: mailer.clone(),
        cache: Arc::new(MemoryFeedCache::new(Duration::from_secs(60))),
    };
    let router = scribe::routes::app(state.clone());

    TestApp {
        state,
        router,
        mailer,
        _dir: dir,
    }
}

impl TestApp {
    /// Insert an account directly and open a session for it.
    pub fn seed_user(&self, email: &str, is_admin: bool, is_verified: bool) -> Seeded {
        let conn = self.state.db.get().unwrap();
        let id = uuid::Uuid::now_v7().to_string();
        let name = email.split('@').next().unwrap_or(email);
        conn.execute(
            "INSERT INTO users (id, email, name, is_admin, is_verified) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, email, name, is_admin, is_verified],
        )
        .unwrap();
        let token = session::create_session(&conn, &id, 1).unwrap();
        Seeded {
            id,
            cookie: format!("{}={}", self.state.config.auth.cookie_name, token),
        }
    }

    pub fn seed_post(&self, author_id: &str, title: &str) -> String {
        let conn = self.state.db.get().unwrap();
        let id = uuid::Uuid::now_v7().to_string();
        conn.execute(
            "INSERT INTO posts (id, user_id, title, description, category, tags)
             VALUES (?1, ?2, ?3, 'About ' || ?3, 'tech', '[\"rust\"]')",
            params![id, author_id, title],
        )
        .unwrap();
        id
    }

    pub fn seed_comment(&self, id: &str, post_id: &str, parent: Option<&str>, author_id: &str) {
        let conn = self.state.db.get().unwrap();
        conn.execute(
            "INSERT INTO comments (id, post_id, parent_id, user_id, content) VALUES (?1, ?2, ?3, ?4, ?1)",
            params![id, post_id, parent, author_id],
        )
        .unwrap();
    }

    pub async fn request(&self, req: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.request(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post_json(
        &self,
        uri: &str,
        cookie: Option<&str>,
        body: Value,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.request(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    pub async fn post_multipart(
        &self,
        uri: &str,
        cookie: &str,
        body: Vec<u8>,
    ) -> (StatusCode, Value) {
        self.send_multipart("POST", uri, Some(cookie), body).await
    }

    pub async fn send_multipart(
        &self,
        method: &str,
        uri: &str,
        cookie: Option<&str>,
        body: Vec<u8>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri).header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.request(builder.body(Body::from(body)).unwrap()).await
    }
}

/// Build a multipart body from text fields plus an optional file part.
pub fn multipart_body(fields: &[(&str, &str)], image: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, bytes)) = image {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\nContent-Type: image/png\r\n\r\n",
                BOUNDARY, file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}
