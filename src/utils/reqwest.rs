use std::fmt::{Display, Formatter};
use log::error;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{redirect, Client, Response, StatusCode};
use crate::errors::MichiError::{BackendError, InvalidArgumentError, NotFoundError};
use crate::errors::MichiResult;

#[derive(Debug, Clone, Copy)]
pub(crate) enum AuthType {
    Bearer,
}

impl Display for AuthType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bearer => write!(f, "Bearer"),
        }
    }
}

/// Build a client that sends the token on every request when one is given.
pub(crate) fn get_client_with_token(token: Option<&str>, auth_type: AuthType) -> MichiResult<Client> {
    let mut headers = HeaderMap::new();
    if let Some(token) = token {
        let mut header_value = HeaderValue::from_str(&format!("{} {}", auth_type, token))
            .map_err(|e| InvalidArgumentError(format!("Failed to parse header value: {:#?}", e)))?;
        header_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, header_value);
    }

    Client::builder()
        .default_headers(headers)
        .build()
        .map_err(|e| BackendError(format!("Failed to build client: {:#?}", e)))
}

/// Client that hands redirects back to the caller (WebHDFS two-step writes).
pub(crate) fn get_client_without_redirect() -> MichiResult<Client> {
    Client::builder()
        .redirect(redirect::Policy::none())
        .build()
        .map_err(|e| BackendError(format!("Failed to build client: {:#?}", e)))
}

pub(crate) fn send_error(target: &str, err: reqwest::Error) -> crate::errors::MichiError {
    error!("Request for {} failed: {}", target, err);
    BackendError(format!("Request for {} failed: {}", target, err))
}

/// Turn a non-success response into an error. 404 is [NotFoundError], the rest keeps
/// the status and body the server sent.
pub(crate) async fn check_response(target: &str, response: Response) -> MichiResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(NotFoundError(target.to_string()));
    }

    let body = response.text().await.unwrap_or_default();
    error!("Backend returned {} for {}: {}", status, target, body);
    Err(BackendError(format!("{} returned {}: {}", target, status, body)))
}
