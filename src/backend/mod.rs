pub mod account;
pub mod catalog;
pub mod chapters;
pub mod http;
pub mod mangadex;
pub mod progress;
pub mod session;

use crate::config::Config;
use crate::error::Result;

/// Builds both API clients over one shared connection pool.
pub fn connect(config: &Config) -> Result<(mangadex::MangaDex, account::Account)> {
    let http = http::HttpClient::new(config)?;
    Ok((
        mangadex::MangaDex::new(http.clone(), config),
        account::Account::new(http, config),
    ))
}
