//! Platform login and channel metadata lookup.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use castbot_common::models::{ChannelInfo, Credential};

use crate::Error;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<Credential, Error>;

    /// Connection endpoints and broadcaster context for `channel`.
    async fn fetch_channel_info(&self, credential: &Credential, channel: &str) -> Result<ChannelInfo, Error>;
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// JSON-over-HTTP authenticator:
/// `POST {base}/auth/login` then `GET {base}/channels/{channel}` with a bearer token.
#[derive(Clone)]
pub struct HttpAuthenticator {
    client: reqwest::Client,
    base_url: url::Url,
}

impl HttpAuthenticator {
    pub fn new(base_url: &str) -> Result<Self, Error> {
        let mut base_url = url::Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
        })
    }

    fn endpoint(&self, path: &str) -> Result<url::Url, Error> {
        Ok(self.base_url.join(path)?)
    }
}

#[async_trait]
impl Authenticator for HttpAuthenticator {
    async fn login(&self, email: &str, password: &str) -> Result<Credential, Error> {
        let url = self.endpoint("auth/login")?;
        let response = self
            .client
            .post(url)
            .json(&LoginRequest { email, password })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Auth(format!(
                "login for {} rejected with status {}",
                email,
                response.status()
            )));
        }

        let credential: Credential = response.json().await?;
        info!("[Auth] logged in as {}", email);
        Ok(credential)
    }

    async fn fetch_channel_info(&self, credential: &Credential, channel: &str) -> Result<ChannelInfo, Error> {
        let url = self.endpoint(&format!("channels/{}", channel))?;
        let info: ChannelInfo = self
            .client
            .get(url)
            .bearer_auth(&credential.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!("[Auth] channel info for {}: room {}", channel, info.user.uin);
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_join_under_base_path() {
        let auth = HttpAuthenticator::new("https://api.example/v2").unwrap();
        assert_eq!(auth.endpoint("auth/login").unwrap().as_str(), "https://api.example/v2/auth/login");
        assert_eq!(
            auth.endpoint("channels/neko").unwrap().as_str(),
            "https://api.example/v2/channels/neko"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(HttpAuthenticator::new("not a url"), Err(Error::InvalidUrl(_))));
    }
}
