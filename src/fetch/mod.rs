//! HTTP plumbing for the directions API.
//!
//! Requests go through the [`HttpClient`] trait so credentials can be layered
//! on as wrappers (see [`auth::UrlParam`]) and tests can swap the transport.

mod basic;
mod client;
pub mod auth;

pub use basic::BasicClient;
pub use client::HttpClient;

use reqwest::{StatusCode, Url};

/// Issues a GET for `url` and returns the status together with the raw body.
///
/// Non-success statuses are not errors here; callers decide what to do with
/// the body.
pub async fn fetch_text<C: HttpClient + ?Sized>(
    client: &C,
    url: Url,
) -> reqwest::Result<(StatusCode, String)> {
    let req = reqwest::Request::new(reqwest::Method::GET, url);

    let resp = client.execute(req).await?;
    let status = resp.status();
    Ok((status, resp.text().await?))
}
