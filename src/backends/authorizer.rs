use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use tracing::debug;

use super::backend_error_message;
use crate::config::SecretServerConfig;
use crate::error::{Result, SecretsError};

/// How the client authenticates against Secret Server
///
/// Selection follows the configured credentials:
///
/// | Username | Password | Token | Domain | Authorizer          |
/// |----------|----------|-------|--------|---------------------|
/// |   def    |   def    |   *   |   -    | PasswordGrant       |
/// |   def    |   def    |   *   |  def   | DomainPasswordGrant |
/// |    -     |    -     |  def  |   *    | AccessToken         |
/// |   def    |    -     |  def  |   *    | AccessToken         |
/// |    -     |   def    |  def  |   *    | AccessToken         |
#[derive(Clone, PartialEq, Eq)]
pub enum Authorizer {
    PasswordGrant {
        username: String,
        password: String,
    },
    DomainPasswordGrant {
        username: String,
        password: String,
        domain: String,
    },
    AccessToken(String),
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

fn defined(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl Authorizer {
    /// Select the authorizer for a configuration, or fail if neither a
    /// username/password pair nor a token is available.
    pub fn select(config: &SecretServerConfig) -> Result<Self> {
        let username = defined(&config.username);
        let password = defined(&config.password);

        match (username, password, defined(&config.token)) {
            (Some(username), Some(password), _) => Ok(match defined(&config.domain) {
                Some(domain) => Authorizer::DomainPasswordGrant {
                    username: username.to_string(),
                    password: password.to_string(),
                    domain: domain.to_string(),
                },
                None => Authorizer::PasswordGrant {
                    username: username.to_string(),
                    password: password.to_string(),
                },
            }),
            (_, _, Some(token)) => Ok(Authorizer::AccessToken(token.to_string())),
            _ => Err(SecretsError::Configuration(
                "either SECRET_SERVER_USERNAME and SECRET_SERVER_PASSWORD or SECRET_SERVER_TOKEN must be set"
                    .to_string(),
            )),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Authorizer::PasswordGrant { .. } => "password-grant",
            Authorizer::DomainPasswordGrant { .. } => "domain-password-grant",
            Authorizer::AccessToken(_) => "access-token",
        }
    }

    /// Obtain a bearer token, requesting one from `{base_url}/oauth2/token`
    /// for the grant variants.
    pub async fn access_token(&self, client: &Client, base_url: &str) -> Result<String> {
        let (username, password, domain) = match self {
            Authorizer::AccessToken(token) => return Ok(token.clone()),
            Authorizer::PasswordGrant { username, password } => (username, password, None),
            Authorizer::DomainPasswordGrant {
                username,
                password,
                domain,
            } => (username, password, Some(domain)),
        };

        let url = format!("{}/oauth2/token", base_url.trim_end_matches('/'));
        debug!("Requesting {} token from: {}", self.kind(), url);

        let mut form = vec![
            ("grant_type", "password"),
            ("username", username.as_str()),
            ("password", password.as_str()),
        ];
        if let Some(domain) = domain {
            form.push(("domain", domain.as_str()));
        }

        let response = client.post(&url).form(&form).send().await?;
        if !response.status().is_success() {
            return Err(SecretsError::Backend(backend_error_message(response).await));
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }
}

impl fmt::Debug for Authorizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Authorizer::PasswordGrant { username, .. } => f
                .debug_struct("PasswordGrant")
                .field("username", username)
                .finish_non_exhaustive(),
            Authorizer::DomainPasswordGrant {
                username, domain, ..
            } => f
                .debug_struct("DomainPasswordGrant")
                .field("username", username)
                .field("domain", domain)
                .finish_non_exhaustive(),
            Authorizer::AccessToken(_) => f.write_str("AccessToken(<redacted>)"),
        }
    }
}
