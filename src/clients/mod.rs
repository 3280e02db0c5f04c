//! HTTP client types for the parcel API.
//!
//! # Overview
//!
//! - [`AuthenticatedClient`]: bearer authentication with transparent refresh
//! - [`RequestDispatcher`]: one request, one attempt, no session logic
//! - [`HttpRequest`] / [`HttpRequestBuilder`]: a request to be sent
//! - [`HttpResponse`]: a parsed response
//! - [`HttpError`]: everything that can go wrong
//!
//! # Refresh behavior
//!
//! - **401 on the first attempt**: the access token is refreshed (once per
//!   episode, shared by all concurrent callers) and the request is resent
//! - **401 on the resend**: returned to the caller as is
//! - **Other errors**: returned immediately, never refreshed
//!
//! # Example
//!
//! ```rust,ignore
//! use parcel_api::{AuthenticatedClient, HttpMethod, HttpRequest};
//! use serde_json::json;
//!
//! let request = HttpRequest::builder(HttpMethod::Patch, "admin/parcels/42/location")
//!     .body(json!({"current_location": "Nakuru"}))
//!     .build()?;
//!
//! let response = client.request(request).await?;
//! ```

mod account;
mod client;
mod dispatcher;
mod errors;
mod http_request;
mod http_response;

pub use account::{LoginRequest, SignupRequest, LOGIN_PATH, SIGNUP_PATH};
pub use client::AuthenticatedClient;
pub use dispatcher::{RequestDispatcher, CLIENT_VERSION};
pub use errors::{HttpError, HttpResponseError, InvalidHttpRequestError};
pub use http_request::{HttpMethod, HttpRequest, HttpRequestBuilder};
pub use http_response::HttpResponse;
