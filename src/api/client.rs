use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, redirect, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use super::traits::ChatBackend;
use super::types::{
    ApiError, ProcessInputRequest, QueryReply, SendMessageRequest, SendMessageResponse,
    StatusEnvelope,
};
use crate::config;
use crate::models::ConversationSummary;

const DEFAULT_REDIRECT: &str = "/";
const SIGN_IN_PATH: &str = "login";

/// HTTP client for the assistant server. Keeps a cookie store so the
/// server-side session (and with it the current conversation) survives
/// between calls. Redirects are never followed: the server only redirects
/// API calls when the session has no signed-in user.
pub struct ServerClient {
    client: Client,
    base: Url,
    base_str: String,
}

impl ServerClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let base = normalize_base_url(base_url)?;
        let client = Client::builder()
            .cookie_store(true)
            .redirect(redirect::Policy::none())
            .timeout(Duration::from_secs(config::REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_str: base.as_str().trim_end_matches('/').to_string(),
            base,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base
            .join(path)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", path, e)))
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || is_sign_in_redirect(&response) {
            tracing::warn!("{} requires a signed-in session", response.url());
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::status(status, &body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    async fn post_json<B, T>(&self, path: &str, body: Option<&B>) -> Result<T, ApiError>
    where
        B: serde::Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        tracing::debug!("POST {}", url);

        let mut req = self.client.post(url);
        if let Some(body) = body {
            req = req.json(body);
        }

        let response = req
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Self::read_json(response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Self::read_json(response).await
    }
}

#[async_trait]
impl ChatBackend for ServerClient {
    fn base_url(&self) -> &str {
        &self.base_str
    }

    async fn send_message(&self, message: &str) -> Result<String, ApiError> {
        let reply: SendMessageResponse = self
            .post_json("send_message", Some(&SendMessageRequest { message }))
            .await?;
        Ok(reply.response)
    }

    async fn process_input(&self, query: &str) -> Result<QueryReply, ApiError> {
        let reply: QueryReply = self
            .post_json("process_input", Some(&ProcessInputRequest { query }))
            .await?;

        if let Some(error) = reply.error.as_deref().filter(|e| !e.trim().is_empty()) {
            return Err(ApiError::Server(error.to_string()));
        }
        Ok(reply)
    }

    async fn clear_chat(&self) -> Result<(), ApiError> {
        let envelope: StatusEnvelope = self.post_json::<(), _>("clear_chat", None).await?;
        envelope.into_result()?;
        Ok(())
    }

    async fn new_conversation(&self) -> Result<String, ApiError> {
        let envelope: StatusEnvelope = self
            .post_json::<(), _>("new_conversation", None)
            .await?;
        let envelope = envelope.into_result()?;
        Ok(envelope
            .redirect
            .unwrap_or_else(|| DEFAULT_REDIRECT.to_string()))
    }

    async fn get_conversations(&self) -> Result<Vec<ConversationSummary>, ApiError> {
        let url = self.endpoint("get_conversations")?;
        let envelope: StatusEnvelope = self.get_json(url).await?;
        Ok(envelope.into_result()?.conversations)
    }

    async fn switch_conversation(&self, id: &str) -> Result<String, ApiError> {
        let mut url = self.endpoint("switch_conversation")?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_str.clone()))?
            .push(id);

        let envelope: StatusEnvelope = self.get_json(url).await?;
        let envelope = envelope.into_result()?;
        Ok(envelope
            .redirect
            .unwrap_or_else(|| DEFAULT_REDIRECT.to_string()))
    }

    async fn logout(&self) -> Result<(), ApiError> {
        let url = self.endpoint("logout")?;
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        // The server clears the session and points at the identity provider's
        // sign-out page, which is not ours to visit.
        let status = response.status();
        if status.is_success() || status.is_redirection() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::status(status, &body))
    }
}

/// True when the response sends the client to a sign-in page, either the
/// server's own `/login` route or an identity provider's `login.` host.
fn is_sign_in_redirect(response: &Response) -> bool {
    if !response.status().is_redirection() {
        return false;
    }
    let Some(location) = response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
    else {
        return false;
    };
    let Ok(target) = response.url().join(location) else {
        return false;
    };

    target.path().trim_end_matches('/').ends_with(SIGN_IN_PATH)
        || target
            .host_str()
            .is_some_and(|host| host.starts_with("login."))
}

/// Whether two user-entered addresses name the same server once normalized.
/// Unparsable input never matches.
pub fn same_server(a: &str, b: &str) -> bool {
    match (normalize_base_url(a), normalize_base_url(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Parse a user-entered server address. A missing scheme means `http`, and the
/// path always ends in `/` so relative endpoint joins keep any path prefix.
pub fn normalize_base_url(input: &str) -> Result<Url, ApiError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ApiError::InvalidUrl("empty address".to_string()));
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    let mut url =
        Url::parse(&with_scheme).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", trimmed, e)))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ApiError::InvalidUrl(format!(
            "unsupported scheme '{}'",
            url.scheme()
        )));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> ServerClient {
        ServerClient::new(&server.uri()).unwrap()
    }

    #[test]
    fn normalize_adds_scheme_and_trailing_slash() {
        let url = normalize_base_url("localhost:5000").unwrap();
        assert_eq!(url.as_str(), "http://localhost:5000/");

        let url = normalize_base_url("https://example.org/assistant?x=1").unwrap();
        assert_eq!(url.as_str(), "https://example.org/assistant/");
    }

    #[test]
    fn normalize_rejects_empty_and_foreign_schemes() {
        assert!(matches!(normalize_base_url("  "), Err(ApiError::InvalidUrl(_))));
        assert!(matches!(
            normalize_base_url("ftp://example.org"),
            Err(ApiError::InvalidUrl(_))
        ));
    }

    #[test]
    fn same_server_compares_normalized_addresses() {
        assert!(same_server("http://127.0.0.1:5000", "http://127.0.0.1:5000/"));
        assert!(same_server("127.0.0.1:5000", " http://127.0.0.1:5000 "));
        assert!(!same_server("http://127.0.0.1:5000", "http://127.0.0.1:5001"));
        assert!(!same_server("", ""));
    }

    #[test]
    fn endpoints_keep_the_base_path_prefix() {
        let client = ServerClient::new("http://example.org/assistant").unwrap();
        assert_eq!(
            client.endpoint("send_message").unwrap().as_str(),
            "http://example.org/assistant/send_message"
        );
        assert_eq!(client.base_url(), "http://example.org/assistant");
    }

    #[tokio::test]
    async fn send_message_posts_json_and_returns_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send_message"))
            .and(body_json(json!({ "message": "How many vacation days do I have?" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "response": "You have 20 days." })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let reply = client_for(&server)
            .await
            .send_message("How many vacation days do I have?")
            .await
            .unwrap();
        assert_eq!(reply, "You have 20 days.");
    }

    #[tokio::test]
    async fn non_ok_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send_message"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let err = client_for(&server).await.send_message("hi").await.unwrap_err();
        match err {
            ApiError::Status { status, body } => {
                assert_eq!(status, 502);
                assert_eq!(body, "bad gateway");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send_message"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server).await.send_message("hi").await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn unreachable_server_is_network_error() {
        // Port 9 (discard) is closed on test hosts.
        let client = ServerClient::new("http://127.0.0.1:9").unwrap();
        let err = client.send_message("hi").await.unwrap_err();
        assert!(matches!(err, ApiError::Network(_)));
    }

    #[tokio::test]
    async fn process_input_returns_rows() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/process_input"))
            .and(body_json(json!({ "query": "list employees" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": "Found 2 employees",
                "rows": [
                    { "full_name": "John Doe", "vacation_days": 25 },
                    { "full_name": "Jane Smith", "vacation_days": 30 }
                ]
            })))
            .mount(&server)
            .await;

        let reply = client_for(&server)
            .await
            .process_input("list employees")
            .await
            .unwrap();
        assert_eq!(reply.response, "Found 2 employees");
        assert_eq!(reply.rows.map(|r| r.len()), Some(2));
    }

    #[tokio::test]
    async fn process_input_error_field_fails_the_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/process_input"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "response": "", "error": "unknown column" })),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .process_input("select nonsense")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Server(ref m) if m == "unknown column"));
    }

    #[tokio::test]
    async fn clear_chat_checks_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/clear_chat"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "status": "error", "error": "nothing to clear" })),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).await.clear_chat().await.unwrap_err();
        assert_eq!(err.to_string(), "Server error: nothing to clear");
    }

    #[tokio::test]
    async fn new_conversation_returns_redirect() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/new_conversation"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "status": "success", "redirect": "/chat" })),
            )
            .mount(&server)
            .await;

        let redirect = client_for(&server).await.new_conversation().await.unwrap();
        assert_eq!(redirect, "/chat");
    }

    #[tokio::test]
    async fn get_conversations_decodes_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/get_conversations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "conversations": [
                    { "id": 1, "title": "Leave", "timestamp": "2024-05-02 10:00", "is_current": false },
                    { "id": 2, "title": "Payroll", "timestamp": "2024-05-03 09:12", "is_current": true }
                ]
            })))
            .mount(&server)
            .await;

        let conversations = client_for(&server).await.get_conversations().await.unwrap();
        assert_eq!(conversations.len(), 2);
        assert_eq!(conversations[1].id, "2");
        assert!(conversations[1].is_current);
    }

    #[tokio::test]
    async fn switch_conversation_encodes_id_as_one_segment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/switch_conversation/a%2Fb"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "status": "success", "redirect": "/" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let redirect = client_for(&server)
            .await
            .switch_conversation("a/b")
            .await
            .unwrap();
        assert_eq!(redirect, "/");
    }

    #[tokio::test]
    async fn session_cookie_is_sent_back() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/new_conversation"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("set-cookie", "session=abc123; Path=/")
                    .set_body_json(json!({ "status": "success", "redirect": "/" })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/get_conversations"))
            .and(header("cookie", "session=abc123"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "status": "success", "conversations": [] })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        client.new_conversation().await.unwrap();
        let conversations = client.get_conversations().await.unwrap();
        assert!(conversations.is_empty());
    }

    #[tokio::test]
    async fn redirect_to_login_is_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send_message"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/login"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>Sign in</html>"))
            .expect(0)
            .mount(&server)
            .await;

        let err = client_for(&server).await.send_message("hi").await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
        assert_eq!(err.to_string(), "Sign-in required");
    }

    #[tokio::test]
    async fn identity_provider_redirect_is_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/get_conversations"))
            .respond_with(ResponseTemplate::new(302).insert_header(
                "location",
                "https://login.microsoftonline.com/common/oauth2/v2.0/authorize?client_id=x",
            ))
            .mount(&server)
            .await;

        let err = client_for(&server).await.get_conversations().await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[tokio::test]
    async fn status_401_is_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/clear_chat"))
            .respond_with(ResponseTemplate::new(401).set_body_string("no user"))
            .mount(&server)
            .await;

        let err = client_for(&server).await.clear_chat().await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[tokio::test]
    async fn other_redirects_are_status_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send_message"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/maintenance"))
            .mount(&server)
            .await;

        let err = client_for(&server).await.send_message("hi").await.unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 302, .. }));
    }

    #[tokio::test]
    async fn logout_sends_session_and_ignores_provider_redirect() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/new_conversation"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("set-cookie", "session=abc123; Path=/")
                    .set_body_json(json!({ "status": "success", "redirect": "/" })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/logout"))
            .and(header("cookie", "session=abc123"))
            .respond_with(ResponseTemplate::new(302).insert_header(
                "location",
                "https://login.microsoftonline.com/common/oauth2/v2.0/logout?post_logout_redirect_uri=http://localhost/",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        client.new_conversation().await.unwrap();
        client.logout().await.unwrap();
    }

    #[tokio::test]
    async fn logout_failure_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/logout"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client_for(&server).await.logout().await.unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 500, .. }));
    }
}
