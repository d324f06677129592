//! OAuth2 installed-app フロー
//!
//! # 流れ
//! 1. TokenStore に有効な資格情報があり、要求スコープを満たしていればそれを使う（通信なし）
//! 2. 期限切れでも refresh token があれば refresh grant で更新
//!    （失敗したら 3 にフォールバック）
//! 3. `127.0.0.1:0` で待ち受け、同意 URL（CSRF state + PKCE）を提示し、
//!    loopback redirect で code を受け取り、token endpoint で交換する
//!
//! 得た資格情報は TokenStore に書き戻します。
//! 同意を待つ間は呼び出しがブロックされます（キャンセル・タイムアウトなし）。
//!
//! # Redirect の受け取り
//! axum のルーターで待ち受けるので、接続は並行に処理されます。
//! state が一致しないリクエストは code でも error でも 400 を返して無視し、待ち続けます。

use async_trait::async_trait;
use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use oauth2::basic::{BasicClient, BasicErrorResponse, BasicTokenResponse, BasicTokenType};
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet,
    EndpointSet, PkceCodeChallenge, RedirectUrl, RefreshToken, RequestTokenError, Scope,
    TokenResponse, TokenUrl,
};
use reqwest::{Client, Url};
use std::collections::HashMap;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::domain::{AccountLabel, ClientSecrets, DriveError, SessionCredential};
use crate::ports::{Authorizer, Clock, SystemClock, TokenStore};

const PAGE_GRANTED: &str = "Authorization complete. You may close this window.";
const PAGE_DENIED: &str = "Authorization was not granted. You may close this window.";
const PAGE_UNEXPECTED: &str = "Unexpected request.";

/// auth / token endpoint を設定済みのクライアント
type GoogleOAuthClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Shows the consent URL to the user.
pub trait ConsentPrompt: Send + Sync {
    fn present(&self, url: &Url);
}

/// 標準エラー出力に URL を表示する
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl ConsentPrompt for TerminalPrompt {
    fn present(&self, url: &Url) {
        eprintln!("Open the following URL in a browser to authorize access:\n\n    {url}\n");
    }
}

/// Loopback redirect で受け取った結果
#[derive(Debug)]
enum Redirect {
    Code(String),
    Denied(String),
}

fn auth_error(context: &str, e: impl std::fmt::Display) -> DriveError {
    DriveError::Authorization(format!("{context}: {e}"))
}

fn token_error<RE: std::error::Error + 'static>(
    e: RequestTokenError<RE, BasicErrorResponse>,
) -> DriveError {
    match e {
        RequestTokenError::ServerResponse(response) => {
            let reason = match response.error_description() {
                Some(description) => format!("{}: {description}", response.error()),
                None => response.error().to_string(),
            };
            DriveError::Authorization(format!("token endpoint rejected the request: {reason}"))
        }
        other => auth_error("token request failed", other),
    }
}

fn oauth_client(secrets: &ClientSecrets) -> Result<GoogleOAuthClient, DriveError> {
    let auth_uri =
        AuthUrl::new(secrets.auth_uri.clone()).map_err(|e| auth_error("invalid auth_uri", e))?;
    let token_uri =
        TokenUrl::new(secrets.token_uri.clone()).map_err(|e| auth_error("invalid token_uri", e))?;
    Ok(BasicClient::new(ClientId::new(secrets.client_id.clone()))
        .set_client_secret(ClientSecret::new(secrets.client_secret.clone()))
        .set_auth_uri(auth_uri)
        .set_token_uri(token_uri)
        // Google は client_id / client_secret をフォームで受け取る
        .set_auth_type(AuthType::RequestBody))
}

/// Interactive OAuth2 authorizer with a persistent token cache.
///
/// # 使用例
/// ```ignore
/// let authorizer = InstalledAppAuthorizer::new(FileTokenStore::new(cache_dir));
/// let credential = authorizer.authorize(&secrets, &scopes, &account).await?;
/// ```
pub struct InstalledAppAuthorizer<S, C = SystemClock> {
    http: Client,
    store: S,
    clock: C,
    prompt: Box<dyn ConsentPrompt>,
}

impl<S: TokenStore> InstalledAppAuthorizer<S> {
    pub fn new(store: S) -> Self {
        // token endpoint のリダイレクトは追わない
        let http = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_default();
        Self {
            http,
            store,
            clock: SystemClock,
            prompt: Box::new(TerminalPrompt),
        }
    }
}

impl<S: TokenStore, C: Clock> InstalledAppAuthorizer<S, C> {
    pub fn with_clock<C2: Clock>(self, clock: C2) -> InstalledAppAuthorizer<S, C2> {
        InstalledAppAuthorizer {
            http: self.http,
            store: self.store,
            clock,
            prompt: self.prompt,
        }
    }

    pub fn with_prompt(mut self, prompt: impl ConsentPrompt + 'static) -> Self {
        self.prompt = Box::new(prompt);
        self
    }

    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn credential_from(
        &self,
        response: &BasicTokenResponse,
        requested: &[String],
        previous_refresh: Option<String>,
    ) -> SessionCredential {
        let scopes = match response.scopes() {
            Some(granted) => granted.iter().map(|scope| scope.as_str().to_string()).collect(),
            None => requested.to_vec(),
        };
        let token_type = match response.token_type() {
            BasicTokenType::Bearer => "Bearer".to_string(),
            other => other.as_ref().to_string(),
        };
        let credential = SessionCredential {
            access_token: response.access_token().secret().clone(),
            token_type,
            // refresh grant の応答には refresh_token が含まれないことがある
            refresh_token: response
                .refresh_token()
                .map(|token| token.secret().clone())
                .or(previous_refresh),
            expires_at: None,
            scopes,
        };
        match response.expires_in() {
            Some(lifetime) => {
                let secs = u32::try_from(lifetime.as_secs()).unwrap_or(u32::MAX);
                credential.expiring_in(self.clock.now(), i64::from(secs))
            }
            None => credential,
        }
    }

    async fn refresh(
        &self,
        secrets: &ClientSecrets,
        refresh_token: &str,
        scopes: &[String],
    ) -> Result<SessionCredential, DriveError> {
        let client = oauth_client(secrets)?;
        let token = RefreshToken::new(refresh_token.to_string());
        let response = client
            .exchange_refresh_token(&token)
            .request_async(&self.http)
            .await
            .map_err(token_error)?;
        Ok(self.credential_from(&response, scopes, Some(refresh_token.to_string())))
    }

    async fn interactive(
        &self,
        secrets: &ClientSecrets,
        scopes: &[String],
        account: &AccountLabel,
    ) -> Result<SessionCredential, DriveError> {
        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .map_err(|e| auth_error("cannot listen for the redirect", e))?;
        let port = listener
            .local_addr()
            .map_err(|e| auth_error("cannot listen for the redirect", e))?
            .port();
        let redirect_uri = RedirectUrl::new(format!("http://127.0.0.1:{port}/"))
            .map_err(|e| auth_error("invalid redirect uri", e))?;
        let client = oauth_client(secrets)?.set_redirect_uri(redirect_uri);

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let mut request = client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(scopes.iter().cloned().map(Scope::new))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .set_pkce_challenge(pkce_challenge);
        if account.as_str().contains('@') {
            request = request.add_extra_param("login_hint", account.as_str());
        }
        let (consent_url, csrf) = request.url();

        info!(account = %account, port, "waiting for user consent");
        self.prompt.present(&consent_url);

        let code = match wait_for_redirect(listener, csrf).await? {
            Redirect::Code(code) => code,
            Redirect::Denied(reason) => {
                return Err(DriveError::Authorization(format!(
                    "consent was not granted: {reason}"
                )));
            }
        };
        debug!(account = %account, "received authorization code");

        let response = client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(pkce_verifier)
            .request_async(&self.http)
            .await
            .map_err(token_error)?;
        Ok(self.credential_from(&response, scopes, None))
    }
}

#[derive(Clone)]
struct RedirectState {
    csrf: CsrfToken,
    received: mpsc::Sender<Redirect>,
}

async fn receive_redirect(
    State(redirect): State<RedirectState>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, &'static str) {
    if params.get("state") != Some(redirect.csrf.secret()) {
        warn!("ignoring redirect with missing or mismatched state");
        return (StatusCode::BAD_REQUEST, PAGE_UNEXPECTED);
    }

    let (outcome, page) = if let Some(error) = params.get("error") {
        (Redirect::Denied(error.clone()), PAGE_DENIED)
    } else if let Some(code) = params.get("code") {
        (Redirect::Code(code.clone()), PAGE_GRANTED)
    } else {
        return (StatusCode::BAD_REQUEST, PAGE_UNEXPECTED);
    };
    // 最初の 1 件だけが使われる
    let _ = redirect.received.try_send(outcome);
    (StatusCode::OK, page)
}

/// state の一致する redirect が来るまで待ち受ける
async fn wait_for_redirect(listener: TcpListener, csrf: CsrfToken) -> Result<Redirect, DriveError> {
    let (received, mut rx) = mpsc::channel(1);
    let app = Router::new()
        .route("/", get(receive_redirect))
        .with_state(RedirectState { csrf, received });

    let (stop, stopped) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stopped.await;
            })
            .await;
        if let Err(e) = served {
            warn!(error = %e, "redirect listener failed");
        }
    });

    let redirect = rx.recv().await;
    // 残っている接続（ブラウザの先読みなど）の終了は待たない
    let _ = stop.send(());
    redirect.ok_or_else(|| DriveError::Authorization("redirect listener stopped".to_string()))
}

#[async_trait]
impl<S: TokenStore, C: Clock> Authorizer for InstalledAppAuthorizer<S, C> {
    async fn authorize(
        &self,
        secrets: &ClientSecrets,
        scopes: &[String],
        account: &AccountLabel,
    ) -> Result<SessionCredential, DriveError> {
        if let Some(cached) = self.store.load(account).await? {
            if cached.covers(scopes) {
                if !cached.is_expired(self.clock.now()) {
                    debug!(account = %account, "using cached credential");
                    return Ok(cached);
                }
                if let Some(refresh_token) = cached.refresh_token.as_deref() {
                    match self.refresh(secrets, refresh_token, scopes).await {
                        Ok(credential) => {
                            info!(account = %account, "refreshed cached credential");
                            self.store.store(account, &credential).await?;
                            return Ok(credential);
                        }
                        Err(e) => {
                            warn!(account = %account, error = %e, "refresh failed, asking for consent again");
                        }
                    }
                }
            } else {
                debug!(account = %account, "cached credential lacks requested scopes");
            }
        }

        let credential = self.interactive(secrets, scopes, account).await?;
        self.store.store(account, &credential).await?;
        info!(account = %account, "authorization granted");
        Ok(credential)
    }
}

/// Hands out a credential obtained elsewhere.
#[derive(Debug, Clone)]
pub struct StaticAuthorizer {
    credential: SessionCredential,
}

impl StaticAuthorizer {
    pub fn new(credential: SessionCredential) -> Self {
        Self { credential }
    }
}

#[async_trait]
impl Authorizer for StaticAuthorizer {
    async fn authorize(
        &self,
        _secrets: &ClientSecrets,
        _scopes: &[String],
        _account: &AccountLabel,
    ) -> Result<SessionCredential, DriveError> {
        Ok(self.credential.clone())
    }
}
