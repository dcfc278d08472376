use reqwest::Client;

const APP_USER_AGENT: &str = concat!("ModSync/", env!("CARGO_PKG_VERSION"));

/// Shared client for registry metadata and package downloads.
///
/// No request timeout is set: a hung registry call blocks the run, and the
/// next scheduled run starts from scratch anyway.
pub fn build_http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(APP_USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
}
