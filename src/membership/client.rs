use crate::common::config::MembershipConfig;
use crate::common::{FaceLinkError, Result};
use crate::membership::normalize::{self, LoginResponse, MemberDataResponse, MembersResponse};
use crate::membership::{AuthToken, Member, MembershipApi, Order};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

trait WithAuth {
    fn with_auth(self, token: &AuthToken) -> Self;
}

impl WithAuth for RequestBuilder {
    fn with_auth(self, token: &AuthToken) -> Self {
        self.bearer_auth(&token.0)
    }
}

/// The request never produced a usable response.
fn transport(context: &str, e: reqwest::Error) -> FaceLinkError {
    FaceLinkError::MembershipUnavailable(format!("{}: {}", context, e))
}

fn decode(context: &str, e: reqwest::Error) -> FaceLinkError {
    if e.is_timeout() {
        return transport(context, e);
    }
    FaceLinkError::Membership(format!("{}: {}", context, e))
}

/// 5xx and 429 may clear up on their own; any other status will not.
fn status_error(context: &str, status: StatusCode) -> FaceLinkError {
    let message = format!("{} failed with status {}", context, status);
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        FaceLinkError::MembershipUnavailable(message)
    } else {
        FaceLinkError::Membership(message)
    }
}

fn check_status(context: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(status_error(context, status))
    }
}

/// Blocking JSON client for the membership REST API.
pub struct HttpMembershipClient {
    client: Client,
    base_url: String,
    email: String,
    password: String,
}

impl HttpMembershipClient {
    pub fn new(
        base_url: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FaceLinkError::Membership(format!("building HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            email: email.into(),
            password: password.into(),
        })
    }

    pub fn from_config(config: &MembershipConfig) -> Result<Self> {
        let (Some(base_url), Some(email), Some(password)) =
            (&config.base_url, &config.email, &config.password)
        else {
            return Err(FaceLinkError::Config(
                "membership.base_url, email and password must all be set".into(),
            ));
        };

        Self::new(
            base_url.as_str(),
            email.as_str(),
            password.as_str(),
            Duration::from_secs(config.timeout_seconds),
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

impl MembershipApi for HttpMembershipClient {
    fn login(&self) -> Result<AuthToken> {
        let response = self
            .client
            .post(self.url("login"))
            .json(&Credentials {
                email: &self.email,
                password: &self.password,
            })
            .send()
            .map_err(|e| transport("login", e))?;

        let body: LoginResponse = check_status("login", response)?
            .json()
            .map_err(|e| decode("decoding login response", e))?;

        match body.token {
            Some(token) if !token.is_empty() => {
                tracing::debug!("Authenticated with membership service");
                Ok(AuthToken(token))
            }
            _ => Err(FaceLinkError::Membership(format!(
                "login returned no token: {}",
                body.message.unwrap_or_else(|| "no message".into())
            ))),
        }
    }

    fn members(&self, token: &AuthToken) -> Result<Vec<Member>> {
        let response = self
            .client
            .get(self.url("membership/data"))
            .with_auth(token)
            .send()
            .map_err(|e| transport("fetching members", e))?;

        let body: MembersResponse = check_status("fetching members", response)?
            .json()
            .map_err(|e| decode("decoding members", e))?;

        Ok(normalize::members(body))
    }

    fn orders(&self, token: &AuthToken, link: &str) -> Result<Vec<Order>> {
        let response = self
            .client
            .get(self.url("membership/member_data"))
            .query(&[("link", link)])
            .with_auth(token)
            .send()
            .map_err(|e| transport("fetching orders", e))?;

        let body: MemberDataResponse = check_status("fetching orders", response)?
            .json()
            .map_err(|e| decode("decoding orders", e))?;

        Ok(normalize::orders(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_dropped_from_base_url() {
        let client =
            HttpMembershipClient::new("https://api.test/v1/", "a", "b", Duration::from_secs(10)).unwrap();
        assert_eq!(client.url("login"), "https://api.test/v1/login");
    }

    #[test]
    fn rejected_requests_are_not_retryable() {
        for status in [StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN, StatusCode::NOT_FOUND] {
            let err = status_error("login", status);
            assert!(matches!(err, FaceLinkError::Membership(_)));
            assert!(!err.is_transient(), "{} should not be retried", status);
        }
    }

    #[test]
    fn server_errors_are_retryable() {
        for status in [
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::SERVICE_UNAVAILABLE,
            StatusCode::TOO_MANY_REQUESTS,
        ] {
            assert!(status_error("fetching members", status).is_transient());
        }
    }

    #[test]
    fn incomplete_config_is_rejected() {
        let config = MembershipConfig {
            base_url: Some("https://api.test/v1".into()),
            ..MembershipConfig::default()
        };
        assert!(matches!(
            HttpMembershipClient::from_config(&config),
            Err(FaceLinkError::Config(_))
        ));
    }
}
