//! Access token handling for the Spotify Web API.
//!
//! The browser authorization step is left to the operator: [`authorize_url`]
//! builds the consent link, and the resulting refresh token goes into the
//! configuration. At run time [`SpotifyAuthenticator`] trades it for an
//! access token and looks up the user it belongs to.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{Duration, Utc};
use reqwest::{header::AUTHORIZATION, Client};
use tracing::{info, warn};
use url::Url;

use super::{client::API_BASE_URL, models::CurrentUser, models::TokenResponse};
use crate::{
    error::{Result, SpotmoverError},
    Authenticator, Session,
};

pub const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const AUTHORIZE_URL: &str = "https://accounts.spotify.com/authorize";

/// Everything a migration touches: saved albums and tracks, and playlists.
pub const SCOPES: &str = "user-library-read user-library-modify playlist-modify-private \
                          playlist-modify-public playlist-read-private playlist-read-collaborative";

#[derive(Debug, Clone, PartialEq)]
pub enum Grant {
    RefreshToken(String),
    /// A short-lived token obtained elsewhere, used as is.
    AccessToken(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpotifyCredentials {
    pub username: String,
    pub client_id: String,
    pub client_secret: String,
    pub grant: Grant,
}

/// Consent page the operator opens once to obtain a refresh token.
pub fn authorize_url(client_id: &str, redirect_uri: &str) -> Result<Url> {
    let mut url = Url::parse(AUTHORIZE_URL)?;
    url.query_pairs_mut()
        .append_pair("client_id", client_id)
        .append_pair("response_type", "code")
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("scope", SCOPES);
    Ok(url)
}

fn basic_auth(client_id: &str, client_secret: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{client_id}:{client_secret}")))
}

pub struct SpotifyAuthenticator {
    credentials: SpotifyCredentials,
    client: Client,
    token_url: Url,
    api_url: Url,
}

impl SpotifyAuthenticator {
    pub fn new(credentials: SpotifyCredentials) -> Result<Self> {
        Ok(Self {
            credentials,
            client: Client::new(),
            token_url: Url::parse(TOKEN_URL)?,
            api_url: Url::parse(&format!("{API_BASE_URL}/me"))?,
        })
    }

    fn rejected(&self, reason: impl std::fmt::Display) -> SpotmoverError {
        SpotmoverError::Auth(format!(
            "Unable to authenticate user {}: {}",
            self.credentials.username, reason
        ))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse> {
        let response = self
            .client
            .post(self.token_url.clone())
            .header(
                AUTHORIZATION,
                basic_auth(&self.credentials.client_id, &self.credentials.client_secret),
            )
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(self.rejected(format!("token endpoint returned {status}: {body}")));
        }
        serde_json::from_str(&body).map_err(|e| self.rejected(e))
    }

    async fn current_user(&self, access_token: &str) -> Result<CurrentUser> {
        let response = self
            .client
            .get(self.api_url.clone())
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(self.rejected(format!("profile lookup returned {status}: {body}")));
        }
        serde_json::from_str(&body).map_err(|e| self.rejected(e))
    }
}

#[async_trait]
impl Authenticator for SpotifyAuthenticator {
    async fn authenticate(&self) -> Result<Session> {
        let (access_token, expires_at) = match &self.credentials.grant {
            Grant::AccessToken(token) => (token.clone(), None),
            Grant::RefreshToken(refresh_token) => {
                let token = self.refresh(refresh_token).await?;
                let expires_at = token
                    .expires_in
                    .map(|seconds| Utc::now() + Duration::seconds(seconds));
                (token.access_token, expires_at)
            }
        };

        let user = self.current_user(&access_token).await?;
        if user.id != self.credentials.username {
            warn!(
                "Configured username {} differs from the authenticated user {}",
                self.credentials.username, user.id
            );
        }
        info!("Authenticated with Spotify as {}", user.id);

        Ok(Session {
            user_id: user.id,
            access_token,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_auth_header() {
        assert_eq!(basic_auth("id", "secret"), "Basic aWQ6c2VjcmV0");
    }

    #[test]
    fn test_authorize_url_carries_scopes() {
        let url = authorize_url("client", "http://localhost:8888/callback").unwrap();
        let scope = url
            .query_pairs()
            .find(|(k, _)| k == "scope")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        assert!(scope.contains("user-library-modify"));
        assert!(scope.contains("playlist-modify-private"));
        assert!(url.as_str().starts_with(AUTHORIZE_URL));
    }

    #[test]
    fn test_rejection_names_the_user() {
        let auth = SpotifyAuthenticator::new(SpotifyCredentials {
            username: "someone".to_string(),
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            grant: Grant::AccessToken("token".to_string()),
        })
        .unwrap();
        let err = auth.rejected("bad token");
        assert!(matches!(&err, SpotmoverError::Auth(_)));
        assert_eq!(
            err.to_string(),
            "Authentication failed: Unable to authenticate user someone: bad token"
        );
    }
}
