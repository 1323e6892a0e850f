pub mod auth;
pub mod cards;
pub mod client;

use fasternet_core::error::AppError;

pub use auth::RestAuthenticator;
pub use cards::RestStore;
pub use client::RestClient;

/// Store and authenticator sharing one hosted connection.
pub fn connect(
    url: &str,
    api_key: &str,
    timeout_ms: u64,
) -> Result<(RestStore, RestAuthenticator), AppError> {
    let client = RestClient::new(url, api_key, timeout_ms)?;
    Ok((RestStore::new(client.clone()), RestAuthenticator::new(client)))
}

#[cfg(test)]
mod tests {
    use super::client::RestClient;

    #[test]
    fn accepts_only_plain_http_base_urls() {
        assert!(RestClient::new("https://abc.supabase.co", "k", 1000).is_ok());
        assert!(RestClient::new("http://127.0.0.1:54321", "k", 1000).is_ok());
        assert!(RestClient::new("https://abc.supabase.co/", "k", 1000).is_ok()); // trimmed

        assert!(RestClient::new("", "k", 1000).is_err());
        assert!(RestClient::new("abc.supabase.co", "k", 1000).is_err());
        assert!(RestClient::new("ftp://abc.supabase.co", "k", 1000).is_err());
        assert!(RestClient::new("https://", "k", 1000).is_err());
        assert!(RestClient::new("https://abc.supabase.co/rest", "k", 1000).is_err());
        assert!(RestClient::new("https://user@abc.supabase.co", "k", 1000).is_err());
        assert!(RestClient::new("https://abc.supabase.co", "  ", 1000).is_err());
    }

    #[test]
    fn table_urls_live_under_rest_v1() {
        let c = RestClient::new("https://abc.supabase.co/", "k", 1000).unwrap();
        assert_eq!(c.base_url(), "https://abc.supabase.co");
        assert_eq!(c.table_url("cards"), "https://abc.supabase.co/rest/v1/cards");
    }
}
