//! Sign-in, sign-up and sign-out.
//!
//! These calls never carry an access token and never trigger a refresh: a
//! 401 from the login endpoint means wrong credentials, not an expired
//! session.

use serde::Serialize;

use crate::auth::{LoginResponse, Role, SessionEvent};
use crate::clients::client::AuthenticatedClient;
use crate::clients::errors::HttpError;
use crate::clients::http_request::{HttpMethod, HttpRequest};
use crate::clients::http_response::HttpResponse;

/// Path of the login endpoint, relative to the API root.
pub const LOGIN_PATH: &str = "auth/login";

/// Path of the signup endpoint, relative to the API root.
pub const SIGNUP_PATH: &str = "auth/signup";

/// Credentials for [`AuthenticatedClient::login`].
#[derive(Clone, Serialize)]
pub struct LoginRequest {
    /// The account email address.
    pub email: String,
    /// The account password.
    pub password: String,
}

impl LoginRequest {
    /// Creates a login request.
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"*****")
            .finish()
    }
}

/// Account details for [`AuthenticatedClient::signup`].
#[derive(Clone, Serialize)]
pub struct SignupRequest {
    /// Full name.
    pub name: String,
    /// Email address, used to sign in.
    pub email: String,
    /// Contact phone number.
    pub phone_number: String,
    /// The account password.
    pub password: String,
    /// The role to register with.
    pub role: Role,
    /// Account recovery question.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_question: Option<String>,
    /// Answer to the recovery question.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_answer: Option<String>,
}

impl std::fmt::Debug for SignupRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignupRequest")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("phone_number", &self.phone_number)
            .field("password", &"*****")
            .field("role", &self.role)
            .field("security_question", &self.security_question)
            .finish_non_exhaustive()
    }
}

impl AuthenticatedClient {
    /// Signs in and replaces the stored session with the returned one,
    /// including the user profile.
    ///
    /// Emits [`SessionEvent::LoggedIn`] on success.
    ///
    /// # Errors
    ///
    /// - [`HttpError::Response`] if the backend rejects the credentials
    /// - [`HttpError::Decode`] if the body is not a login response
    /// - [`HttpError::Network`] if no response is received
    pub async fn login(&self, credentials: &LoginRequest) -> Result<LoginResponse, HttpError> {
        let request = HttpRequest::builder(HttpMethod::Post, LOGIN_PATH)
            .body(serde_json::to_value(credentials)?)
            .build()?;

        let response = self.dispatcher().send(&request, None).await?;
        let login: LoginResponse = response.json()?;

        self.token_store().replace(login.to_update());
        tracing::info!(role = ?login.role, "Signed in");
        self.emit(SessionEvent::LoggedIn { role: login.role });

        Ok(login)
    }

    /// Registers a new account. The session is left untouched.
    ///
    /// # Errors
    ///
    /// - [`HttpError::Response`] if the backend rejects the registration
    /// - [`HttpError::Network`] if no response is received
    pub async fn signup(&self, account: &SignupRequest) -> Result<HttpResponse, HttpError> {
        let request = HttpRequest::builder(HttpMethod::Post, SIGNUP_PATH)
            .body(serde_json::to_value(account)?)
            .build()?;

        let response = self.dispatcher().send(&request, None).await?;
        tracing::info!(role = %account.role, "Account registered");
        Ok(response)
    }

    /// Clears the stored session and emits [`SessionEvent::LoggedOut`].
    pub fn logout(&self) {
        self.token_store().clear();
        tracing::info!("Signed out");
        self.emit(SessionEvent::LoggedOut);
    }
}
