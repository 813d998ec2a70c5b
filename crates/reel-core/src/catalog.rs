use std::time::Duration;

use reqwest::blocking::Client;
use serde::de::DeserializeOwned;

use crate::config::CatalogPreferences;
use crate::error::{CatalogError, ReelError};
use crate::model::{MovieCredits, PersonProfile, PopularPage};

/// Read access to the movie catalog.
pub trait Catalog {
    fn person(&self, id: u64) -> Result<PersonProfile, CatalogError>;
    fn movie_credits(&self, id: u64) -> Result<MovieCredits, CatalogError>;
    fn popular_people(&self, page: u32) -> Result<PopularPage, CatalogError>;
}

impl<T: Catalog + ?Sized> Catalog for &T {
    fn person(&self, id: u64) -> Result<PersonProfile, CatalogError> {
        (**self).person(id)
    }

    fn movie_credits(&self, id: u64) -> Result<MovieCredits, CatalogError> {
        (**self).movie_credits(id)
    }

    fn popular_people(&self, page: u32) -> Result<PopularPage, CatalogError> {
        (**self).popular_people(page)
    }
}

/// Catalog backed by the HTTP API, authenticated with an `api_key` query parameter.
#[derive(Debug, Clone)]
pub struct HttpCatalog {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpCatalog {
    pub fn new(preferences: &CatalogPreferences) -> Result<Self, ReelError> {
        let api_key = preferences
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                ReelError::Config(
                    "catalog API key is not set (TMDB_API_KEY or [catalog].api_key)".to_string(),
                )
            })?
            .to_string();

        let client = Client::builder()
            .user_agent("reeltime/0.1")
            .timeout(Duration::from_secs(preferences.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: preferences.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, CatalogError> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .query(query)
            .send()
            .map_err(|source| CatalogError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status { url, status });
        }

        response
            .json::<T>()
            .map_err(|source| CatalogError::Decode { url, source })
    }
}

impl Catalog for HttpCatalog {
    fn person(&self, id: u64) -> Result<PersonProfile, CatalogError> {
        self.get_json(&format!("person/{id}"), &[])
    }

    fn movie_credits(&self, id: u64) -> Result<MovieCredits, CatalogError> {
        self.get_json(&format!("person/{id}/movie_credits"), &[])
    }

    fn popular_people(&self, page: u32) -> Result<PopularPage, CatalogError> {
        self.get_json("person/popular", &[("page", page.to_string())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_is_a_config_error() {
        let preferences = CatalogPreferences {
            api_key: Some("   ".to_string()),
            ..CatalogPreferences::default()
        };
        assert!(matches!(
            HttpCatalog::new(&preferences),
            Err(ReelError::Config(_))
        ));
    }

    #[test]
    fn base_url_is_normalized() {
        let preferences = CatalogPreferences {
            base_url: "https://api.example.org/3/".to_string(),
            api_key: Some("key".to_string()),
            ..CatalogPreferences::default()
        };
        let catalog = HttpCatalog::new(&preferences).expect("client");
        assert_eq!(catalog.base_url, "https://api.example.org/3");
    }
}
