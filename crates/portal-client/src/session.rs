//! One authenticated portal session.

use crate::jsonp::decode;
use crate::schema::{self, ActionResponse, ChallengeResponse, UserInfoResponse};
use crate::signer::{LOGIN_N, LOGIN_TYPE};
use crate::transport::{self, TransportOptions};
use crate::{
    ChallengeSigner, PortalError, PortalResult, SignRequest, SrunSigner, AC_ID, JSONP_CALLBACK,
};
use portal_lifecycle::ShutdownToken;
use portal_retry::RetryPolicy;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use url::Url;

const USER_INFO_PATH: &str = "/cgi-bin/rad_user_info";
const CHALLENGE_PATH: &str = "/cgi-bin/get_challenge";
const PORTAL_PATH: &str = "/cgi-bin/srun_portal";

/// What the authentication server knows about this host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    /// Our address as seen by the server.
    pub client_ip: Option<String>,
    pub logged_in: bool,
}

/// Identity and transport settings for a [`PortalSession`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// `http` or `https`.
    pub scheme: String,
    /// Host[:port] of the authentication server.
    pub server: String,
    pub username: String,
    pub transport: TransportOptions,
    /// Retry policy applied to every single HTTP request.
    pub network_retry: RetryPolicy,
}

/// Session with the authentication server.
///
/// Calls take `&mut self`: one session serves one logical user and the owner
/// serializes access (the daemon keeps it behind a `tokio::sync::Mutex`).
pub struct PortalSession {
    config: SessionConfig,
    client_ip: Option<String>,
    http: Option<reqwest::Client>,
    signer: Box<dyn ChallengeSigner>,
    shutdown: ShutdownToken,
}

impl std::fmt::Debug for PortalSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortalSession")
            .field("scheme", &self.config.scheme)
            .field("server", &self.config.server)
            .field("username", &self.config.username)
            .field("client_ip", &self.client_ip)
            .finish_non_exhaustive()
    }
}

impl PortalSession {
    /// Create a session using the SRUN signer.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_signer(config, SrunSigner)
    }

    pub fn with_signer(config: SessionConfig, signer: impl ChallengeSigner + 'static) -> Self {
        Self {
            config,
            client_ip: None,
            http: None,
            signer: Box::new(signer),
            shutdown: ShutdownToken::new(),
        }
    }

    /// Token that interrupts network-level retry waits.
    pub fn bind_shutdown(&mut self, token: ShutdownToken) {
        self.shutdown = token;
    }

    pub fn username(&self) -> &str {
        &self.config.username
    }

    /// Last address reported by the server, if any query succeeded.
    pub fn client_ip(&self) -> Option<&str> {
        self.client_ip.as_deref()
    }

    /// Ask the server whether this host is logged in.
    ///
    /// Any `error` other than `ok` means "not logged in", not a failure. The
    /// reported address replaces the cached client IP.
    pub async fn query_user_info(&mut self) -> PortalResult<UserInfo> {
        let response: UserInfoResponse = self.get_json(USER_INFO_PATH, &[]).await?;

        let logged_in = response.error == schema::OK;
        let online_ip = schema::non_empty(response.online_ip);
        let client_ip = if logged_in {
            Some(online_ip.ok_or(PortalError::MissingField { field: "online_ip" })?)
        } else {
            online_ip.or_else(|| schema::non_empty(response.client_ip))
        };

        if let Some(ip) = &client_ip {
            self.client_ip = Some(ip.clone());
        }
        debug!(
            logged_in,
            client_ip = client_ip.as_deref().unwrap_or(""),
            status = %response.error,
            "user info"
        );

        Ok(UserInfo {
            client_ip,
            logged_in,
        })
    }

    /// Log in with a fresh challenge.
    ///
    /// Queries user info first when no client IP is known yet.
    pub async fn login(&mut self, password: &str) -> PortalResult<()> {
        if self.client_ip.is_none() {
            self.query_user_info().await?;
        }
        let client_ip = self.client_ip.clone().unwrap_or_default();
        let username = self.config.username.clone();

        let challenge = self.get_challenge(&username, &client_ip).await?;
        let signed = self.signer.sign(&SignRequest {
            username: &username,
            password,
            client_ip: &client_ip,
            challenge: &challenge,
        })?;

        let response: ActionResponse = self
            .get_json(
                PORTAL_PATH,
                &[
                    ("action", "login"),
                    ("username", username.as_str()),
                    ("password", signed.password_digest.as_str()),
                    ("ac_id", AC_ID),
                    ("ip", client_ip.as_str()),
                    ("info", signed.info.as_str()),
                    ("chksum", signed.checksum.as_str()),
                    ("n", LOGIN_N),
                    ("type", LOGIN_TYPE),
                ],
            )
            .await?;
        check_action(response)?;

        info!(username = %username, client_ip = %client_ip, "logged in");
        Ok(())
    }

    /// Log this user out.
    pub async fn logout(&mut self) -> PortalResult<()> {
        let username = self.config.username.clone();
        let response: ActionResponse = self
            .get_json(
                PORTAL_PATH,
                &[
                    ("action", "logout"),
                    ("ac_id", AC_ID),
                    ("username", username.as_str()),
                ],
            )
            .await?;
        check_action(response)?;

        info!(username = %username, "logged out");
        Ok(())
    }

    async fn get_challenge(&mut self, username: &str, client_ip: &str) -> PortalResult<String> {
        let response: ChallengeResponse = self
            .get_json(CHALLENGE_PATH, &[("username", username), ("ip", client_ip)])
            .await?;

        match schema::non_empty(response.challenge) {
            Some(challenge) => Ok(challenge),
            None => match response.error.filter(|e| !e.is_empty() && e != schema::OK) {
                Some(reason) => Err(PortalError::Rejected {
                    reason,
                    message: schema::non_empty(response.error_msg),
                }),
                None => Err(PortalError::MissingField { field: "challenge" }),
            },
        }
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> PortalResult<Url> {
        let base = format!("{}://{}{}", self.config.scheme, self.config.server, path);
        let mut url = Url::parse(&base)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("callback", JSONP_CALLBACK);
            for (key, value) in params {
                query.append_pair(key, value);
            }
        }
        Ok(url)
    }

    fn http_client(&mut self) -> PortalResult<reqwest::Client> {
        if let Some(client) = &self.http {
            return Ok(client.clone());
        }
        let client = transport::build_client(&self.config.transport)?;
        self.http = Some(client.clone());
        Ok(client)
    }

    async fn get_json<T: DeserializeOwned>(
        &mut self,
        path: &str,
        params: &[(&str, &str)],
    ) -> PortalResult<T> {
        let url = self.endpoint(path, params)?;
        let client = self.http_client()?;
        debug!(path, "portal request");

        let (client, url) = (&client, &url);
        let body = portal_retry::run_while(
            &self.config.network_retry,
            &self.shutdown,
            || async move { fetch_body(client, url).await },
            PortalError::is_retryable,
        )
        .await
        .map_err(|err| {
            if err.is_cancelled() {
                PortalError::Cancelled
            } else {
                err.into_last_error().unwrap_or(PortalError::Cancelled)
            }
        })?;

        decode(&body)
    }
}

async fn fetch_body(client: &reqwest::Client, url: &Url) -> PortalResult<String> {
    let response = client.get(url.clone()).send().await?;
    let status = response.status();
    if status != StatusCode::OK {
        return Err(PortalError::Status {
            status: status.as_u16(),
        });
    }
    Ok(response.text().await?)
}

fn check_action(response: ActionResponse) -> PortalResult<()> {
    if response.error == schema::OK {
        return Ok(());
    }
    Err(PortalError::Rejected {
        reason: response.error,
        message: schema::non_empty(response.error_msg),
    })
}
