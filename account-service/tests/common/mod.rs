#![allow(dead_code)]

use std::sync::Arc;

use account_service::account::errors::DispatchError;
use account_service::account::models::EmailAddress;
use account_service::account::ports::LinkDispatcher;
use account_service::account::service::AccountPolicy;
use account_service::account::service::AccountService;
use account_service::inbound::http::router::create_router;
use account_service::outbound::repositories::InMemoryUserRepository;
use async_trait::async_trait;
use auth::Authenticator;
use serde_json::json;
use serde_json::Value;
use tokio::sync::Mutex;

pub const JWT_SECRET: &[u8] = b"test-secret-key-for-jwt-signing-at-least-32-bytes";
pub const PROTECTED_EMAIL: &str = "admin@example.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Verification,
    PasswordReset,
}

#[derive(Debug, Clone)]
pub struct SentLink {
    pub kind: LinkKind,
    pub email: String,
    pub link: String,
}

impl SentLink {
    pub fn token(&self) -> String {
        self.link
            .split_once("?token=")
            .map(|(_, token)| token.to_string())
            .expect("Link without token")
    }
}

/// Link dispatcher that keeps every delivered link for inspection
#[derive(Default)]
pub struct RecordingLinkDispatcher {
    sent: Mutex<Vec<SentLink>>,
}

impl RecordingLinkDispatcher {
    pub async fn last(&self, kind: LinkKind, email: &str) -> Option<SentLink> {
        self.sent
            .lock()
            .await
            .iter()
            .rev()
            .find(|sent| sent.kind == kind && sent.email == email)
            .cloned()
    }

    async fn record(&self, kind: LinkKind, email: &EmailAddress, link: &str) {
        self.sent.lock().await.push(SentLink {
            kind,
            email: email.to_string(),
            link: link.to_string(),
        });
    }
}

#[async_trait]
impl LinkDispatcher for RecordingLinkDispatcher {
    async fn send_verification_link(
        &self,
        email: &EmailAddress,
        link: &str,
    ) -> Result<(), DispatchError> {
        self.record(LinkKind::Verification, email, link).await;
        Ok(())
    }

    async fn send_password_reset_link(
        &self,
        email: &EmailAddress,
        link: &str,
    ) -> Result<(), DispatchError> {
        self.record(LinkKind::PasswordReset, email, link).await;
        Ok(())
    }
}

/// Test application that spawns a real server over the in-memory store
pub struct TestApp {
    pub address: String,
    pub api_client: reqwest::Client,
    pub repository: Arc<InMemoryUserRepository>,
    pub dispatcher: Arc<RecordingLinkDispatcher>,
    pub authenticator: Arc<Authenticator>,
}

impl TestApp {
    /// Spawn the application in a background task and return TestApp
    pub async fn spawn() -> Self {
        // Use random port (0 = OS assigns)
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind random port");
        let port = listener.local_addr().unwrap().port();
        let address = format!("http://127.0.0.1:{}", port);

        let repository = Arc::new(InMemoryUserRepository::new());
        let dispatcher = Arc::new(RecordingLinkDispatcher::default());
        let authenticator = Arc::new(Authenticator::new(JWT_SECRET));

        let policy = AccountPolicy {
            verification_url: format!("{}/api/auth/verify-email", address),
            reset_password_url: "http://localhost:5173/reset-password".to_string(),
            protected_emails: vec![PROTECTED_EMAIL.to_string()],
        };

        let account_service = Arc::new(AccountService::new(
            Arc::clone(&repository),
            Arc::clone(&dispatcher),
            Arc::clone(&authenticator),
            policy,
        ));

        let router = create_router(account_service);

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("Server error");
        });

        Self {
            address,
            api_client: reqwest::Client::new(),
            repository,
            dispatcher,
            authenticator,
        }
    }

    /// Helper to make GET request
    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.api_client.get(format!("{}{}", self.address, path))
    }

    /// Helper to make POST request
    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.api_client.post(format!("{}{}", self.address, path))
    }

    /// Helper to make PATCH request
    pub fn patch(&self, path: &str) -> reqwest::RequestBuilder {
        self.api_client.patch(format!("{}{}", self.address, path))
    }

    /// Helper to make authenticated GET request
    pub fn get_authenticated(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.get(path).bearer_auth(token)
    }

    /// Helper to make authenticated PATCH request
    pub fn patch_authenticated(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.patch(path).bearer_auth(token)
    }

    /// Helper to make authenticated DELETE request
    pub fn delete_authenticated(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.api_client
            .delete(format!("{}{}", self.address, path))
            .bearer_auth(token)
    }

    pub async fn register(&self, email: &str, username: &str, password: &str) -> reqwest::Response {
        self.post("/api/auth/register")
            .json(&json!({
                "email": email,
                "username": username,
                "password": password,
            }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn login(&self, email: &str, password: &str) -> reqwest::Response {
        self.post("/api/auth/login")
            .json(&json!({
                "email": email,
                "password": password,
            }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Follow the verification link delivered for `email`.
    pub async fn follow_verification_link(&self, email: &str) -> reqwest::Response {
        let sent = self
            .dispatcher
            .last(LinkKind::Verification, email)
            .await
            .expect("No verification link delivered");

        self.api_client
            .get(&sent.link)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn forgot_password(&self, email: &str) -> reqwest::Response {
        self.post("/api/auth/forgot-password")
            .json(&json!({ "email": email }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> reqwest::Response {
        self.post("/api/auth/reset-password")
            .json(&json!({
                "token": token,
                "newPassword": new_password,
            }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Register, verify, and log in; returns the session token.
    pub async fn signed_in_user(&self, email: &str, username: &str, password: &str) -> String {
        assert_eq!(self.register(email, username, password).await.status(), 201);
        assert_eq!(self.follow_verification_link(email).await.status(), 200);

        let response = self.login(email, password).await;
        assert_eq!(response.status(), 200);

        let body: Value = response.json().await.expect("Failed to parse response");
        body["data"]["token"]
            .as_str()
            .expect("Missing token")
            .to_string()
    }
}
