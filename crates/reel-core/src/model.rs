//! Rows written to storage and the explicit parsing that produces them.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::age::parse_iso_date;
use crate::error::DataError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: u64,
    pub name: String,
    pub birthdate: NaiveDate,
    pub image_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Movie {
    pub id: u64,
    pub title: String,
    pub release_date: Option<String>,
    pub poster_path: Option<String>,
}

/// One casting fact. The row id is assigned by storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Role {
    pub actor_id: u64,
    pub movie_id: u64,
    pub actor_age: Option<i32>,
}

/// `GET person/{id}` payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersonProfile {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub birthday: Option<String>,
    #[serde(default)]
    pub profile_path: Option<String>,
}

/// `GET person/{id}/movie_credits` payload; only the cast list is used.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MovieCredits {
    #[serde(default)]
    pub cast: Vec<MovieCredit>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MovieCredit {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
}

/// `GET person/popular?page=N` payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PopularPage {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub results: Vec<PopularPerson>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PopularPerson {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
}

impl PopularPage {
    /// True once the provider reports this page as the last one.
    pub fn is_last(&self) -> bool {
        self.total_pages == 0 || self.page >= self.total_pages
    }
}

impl PersonProfile {
    /// Builds the actor row keyed by `requested_id`, the id the run tracks.
    pub fn into_actor(self, requested_id: u64) -> Result<Actor, DataError> {
        let id = requested_id;
        let name = non_blank(self.name).ok_or(DataError::MissingField {
            entity: "person",
            id,
            field: "name",
        })?;
        let raw_birthday = non_blank(self.birthday).ok_or(DataError::MissingField {
            entity: "person",
            id,
            field: "birthday",
        })?;
        let birthdate = parse_iso_date(&raw_birthday).ok_or_else(|| DataError::InvalidDate {
            entity: "person",
            id,
            field: "birthday",
            value: raw_birthday.clone(),
        })?;

        Ok(Actor {
            id,
            name,
            birthdate,
            image_path: non_blank(self.profile_path),
        })
    }
}

impl MovieCredit {
    pub fn into_movie(self) -> Result<Movie, DataError> {
        let id = self.id.ok_or(DataError::MissingField {
            entity: "credit",
            id: 0,
            field: "id",
        })?;
        let title = non_blank(self.title).ok_or(DataError::MissingField {
            entity: "movie",
            id,
            field: "title",
        })?;

        Ok(Movie {
            id,
            title,
            release_date: non_blank(self.release_date),
            poster_path: non_blank(self.poster_path),
        })
    }
}

/// Parses one line of the candidate list.
pub fn parse_candidate_id(line: &str) -> Result<u64, DataError> {
    line.trim().parse::<u64>().map_err(|_| DataError::InvalidId {
        value: line.trim().to_string(),
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}
