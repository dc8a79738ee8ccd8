//! Identity-provider seam.
//!
//! The session manager only ever talks to [`IdentityBroker`]; the concrete
//! [`GoogleIdentity`] runs the installed-app OAuth2 flow with PKCE: an
//! ephemeral localhost listener catches the consent redirect, and token
//! exchange/refresh/revocation go straight to the provider's endpoints.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::Rng;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::OAuthConfig;
use crate::error::{Error, Result};
use crate::models::{Credential, Provider, UserProfile};

/// How a token should be obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireMode {
    /// Walk the user through the consent flow.
    Interactive,
    /// Renew without user interaction; fails if no renewal path exists.
    Silent,
}

/// External identity-provider collaborator: token acquisition, userinfo,
/// revocation.
#[async_trait::async_trait]
pub trait IdentityBroker: Send + Sync {
    async fn acquire(&self, mode: AcquireMode) -> Result<Credential>;

    async fn fetch_userinfo(&self, access_token: &str) -> Result<UserProfile>;

    async fn revoke(&self, access_token: &str) -> Result<()>;
}

/// Google OAuth2 broker for installed applications.
pub struct GoogleIdentity {
    http: reqwest::Client,
    config: OAuthConfig,
    /// Refresh token retained from the last interactive exchange. Some
    /// grants omit it, in which case silent renewal is unavailable.
    refresh_token: Mutex<Option<String>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

impl GoogleIdentity {
    pub fn new(config: OAuthConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            refresh_token: Mutex::new(None),
        }
    }

    /// Run the full consent flow: local redirect listener, browser launch,
    /// code exchange.
    async fn interactive_flow(&self) -> Result<Credential> {
        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .map_err(|e| Error::Identity(format!("cannot bind redirect listener: {e}")))?;
        let port = listener
            .local_addr()
            .map_err(|e| Error::Identity(e.to_string()))?
            .port();
        let redirect_uri = format!("http://127.0.0.1:{port}/");

        let verifier = random_token();
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        let state = random_token();

        let scopes = self.config.scopes.join(" ");
        let auth_url = reqwest::Url::parse_with_params(
            &self.config.auth_url,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", scopes.as_str()),
                ("code_challenge", challenge.as_str()),
                ("code_challenge_method", "S256"),
                ("state", state.as_str()),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|e| Error::Identity(format!("bad auth URL: {e}")))?;

        info!("opening browser for consent");
        open::that(auth_url.as_str())
            .map_err(|e| Error::Identity(format!("cannot open browser: {e}")))?;

        let code = wait_for_redirect(&listener, &state).await?;
        debug!("authorization code received, exchanging");

        let mut params = vec![
            ("grant_type", "authorization_code".to_string()),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", self.config.client_id.clone()),
            ("code_verifier", verifier),
        ];
        if let Some(secret) = &self.config.client_secret {
            params.push(("client_secret", secret.clone()));
        }

        let token = self.exchange(&params).await?;

        if let Some(refresh) = token.refresh_token {
            *self.refresh_token.lock().await = Some(refresh);
        }

        Ok(Credential {
            access_token: token.access_token,
            issued_via: Provider::Google,
        })
    }

    async fn silent_flow(&self) -> Result<Credential> {
        let refresh = self
            .refresh_token
            .lock()
            .await
            .clone()
            .ok_or_else(|| Error::Identity("no refresh token retained".to_string()))?;

        let mut params = vec![
            ("grant_type", "refresh_token".to_string()),
            ("refresh_token", refresh),
            ("client_id", self.config.client_id.clone()),
        ];
        if let Some(secret) = &self.config.client_secret {
            params.push(("client_secret", secret.clone()));
        }

        let token = self.exchange(&params).await?;

        // Providers may rotate the refresh token on use.
        if let Some(refresh) = token.refresh_token {
            *self.refresh_token.lock().await = Some(refresh);
        }

        Ok(Credential {
            access_token: token.access_token,
            issued_via: Provider::Google,
        })
    }

    async fn exchange(&self, params: &[(&str, String)]) -> Result<TokenResponse> {
        let response = self
            .http
            .post(&self.config.token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| Error::Identity(format!("token endpoint unreachable: {e}")))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!(status, "token exchange failed: {body}");
            return Err(Error::Identity(format!(
                "token exchange failed with HTTP {status}"
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| Error::Identity(format!("malformed token response: {e}")))
    }
}

#[async_trait::async_trait]
impl IdentityBroker for GoogleIdentity {
    async fn acquire(&self, mode: AcquireMode) -> Result<Credential> {
        match mode {
            AcquireMode::Interactive => self.interactive_flow().await,
            AcquireMode::Silent => self.silent_flow().await,
        }
    }

    async fn fetch_userinfo(&self, access_token: &str) -> Result<UserProfile> {
        let response = self
            .http
            .get(&self.config.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Identity(format!(
                "userinfo fetch failed with HTTP {}",
                response.status().as_u16()
            )));
        }

        let info: UserInfoResponse = response
            .json()
            .await
            .map_err(|e| Error::Identity(format!("malformed userinfo response: {e}")))?;

        Ok(UserProfile {
            email: info.email.unwrap_or_default(),
            name: info.name.unwrap_or_default(),
            picture: info.picture,
        })
    }

    async fn revoke(&self, access_token: &str) -> Result<()> {
        let response = self
            .http
            .post(&self.config.revoke_url)
            .form(&[("token", access_token)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Identity(format!(
                "revocation failed with HTTP {}",
                response.status().as_u16()
            )));
        }
        Ok(())
    }
}

/// Accept connections until one carries the authorization code, answering
/// strays (favicon probes and the like) with a 404.
async fn wait_for_redirect(listener: &TcpListener, expected_state: &str) -> Result<String> {
    loop {
        let (mut stream, _) = listener
            .accept()
            .await
            .map_err(|e| Error::Identity(format!("redirect listener failed: {e}")))?;

        let mut buf = vec![0u8; 4096];
        let n = stream
            .read(&mut buf)
            .await
            .map_err(|e| Error::Identity(e.to_string()))?;
        let request = String::from_utf8_lossy(&buf[..n]).to_string();

        let Some(path) = request.split_whitespace().nth(1) else {
            continue;
        };

        let url = reqwest::Url::parse(&format!("http://127.0.0.1{path}"))
            .map_err(|e| Error::Identity(format!("bad redirect path: {e}")))?;

        let mut code = None;
        let mut state = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "state" => state = Some(value.into_owned()),
                "error" => {
                    let _ = respond(&mut stream, "400 Bad Request", "Sign-in was denied.").await;
                    return Err(Error::Identity(format!("consent denied: {value}")));
                }
                _ => {}
            }
        }

        let Some(code) = code else {
            let _ = respond(&mut stream, "404 Not Found", "Not found.").await;
            continue;
        };

        if state.as_deref() != Some(expected_state) {
            let _ = respond(&mut stream, "400 Bad Request", "State mismatch.").await;
            return Err(Error::Identity("state parameter mismatch".to_string()));
        }

        let _ = respond(
            &mut stream,
            "200 OK",
            "Signed in. You can close this tab and return to the application.",
        )
        .await;
        return Ok(code);
    }
}

async fn respond(
    stream: &mut tokio::net::TcpStream,
    status: &str,
    body: &str,
) -> std::io::Result<()> {
    let page = format!("<html><body><p>{body}</p></body></html>");
    let reply = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{page}",
        page.len()
    );
    stream.write_all(reply.as_bytes()).await?;
    stream.shutdown().await
}

fn random_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    URL_SAFE_NO_PAD.encode(bytes)
}
