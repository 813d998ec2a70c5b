//! Turns a candidate list or the popular-people listing into stored
//! actors, movies and roles.
//!
//! A run moves through `CreateSchema -> Clear -> FetchLoop -> (SaveBatch)* ->
//! FinalSave -> Done`. Rows are buffered in memory and committed every
//! `pages_per_batch` pages, so a crash loses at most the batch in flight. The
//! table clear is committed together with the first batch, which keeps the
//! previous dataset visible to readers until replacement rows exist.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use tracing::{debug, error, info, warn};

use crate::age::age_at_release;
use crate::catalog::Catalog;
use crate::config::IngestPreferences;
use crate::error::ReelError;
use crate::model::{Actor, MovieCredit, PersonProfile, PopularPage, Role, parse_candidate_id};
use crate::pacer::RequestPacer;
use crate::storage::{IngestBatch, Storage, WriteMode};

/// Failed listing pages in a row after which the walk stops.
pub const MAX_CONSECUTIVE_PAGE_FAILURES: u32 = 3;

/// What drives the fetch loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestSource {
    /// Ranked ids produced by the popularity snapshot.
    Candidates(Vec<u64>),
    /// The paginated popular-people listing, walked from page 1.
    Listing,
}

impl IngestSource {
    /// Reads a newline-delimited candidate list. An unreadable file aborts the
    /// run; malformed lines are logged and skipped.
    pub fn from_candidate_file(path: &Path) -> Result<Self, ReelError> {
        let raw = fs::read_to_string(path).map_err(|source| ReelError::CandidateList {
            path: path.display().to_string(),
            source,
        })?;

        let mut ids = Vec::new();
        for (index, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match parse_candidate_id(line) {
                Ok(id) => ids.push(id),
                Err(err) => {
                    warn!(file = %path.display(), line = index + 1, error = %err, "Skipping candidate line");
                }
            }
        }

        info!(file = %path.display(), candidates = ids.len(), "Loaded candidate list");
        Ok(IngestSource::Candidates(ids))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestSettings {
    pub pages_per_batch: u32,
    /// Highest listing page to request; `0` walks until the provider runs out.
    pub page_cap: u32,
    pub candidate_page_size: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self::from(&IngestPreferences::default())
    }
}

impl From<&IngestPreferences> for IngestSettings {
    fn from(preferences: &IngestPreferences) -> Self {
        Self {
            pages_per_batch: preferences.pages_per_batch.max(1),
            page_cap: preferences.page_cap,
            candidate_page_size: preferences.candidate_page_size.max(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    CreateSchema,
    Clear,
    FetchLoop,
    SaveBatch,
    FinalSave,
    Done,
}

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub pages: u32,
    pub people_seen: u64,
    pub duplicate_people: u64,
    pub actors_saved: u64,
    pub actors_skipped: u64,
    pub movies_saved: u64,
    pub roles_saved: u64,
    pub credits_without_age: u64,
    pub credits_rejected: u64,
    pub requests: u64,
    pub batches: u32,
}

pub struct CatalogFetcher<'s, C: Catalog> {
    catalog: C,
    pacer: RequestPacer,
    storage: &'s mut Storage,
    settings: IngestSettings,
    state: RunState,
    batch: IngestBatch,
    seen_people: HashSet<u64>,
    seen_movies: HashSet<u64>,
    pages_since_flush: u32,
    cleared: bool,
    stats: IngestStats,
}

impl<'s, C: Catalog> CatalogFetcher<'s, C> {
    pub fn new(
        catalog: C,
        pacer: RequestPacer,
        storage: &'s mut Storage,
        settings: IngestSettings,
    ) -> Self {
        Self {
            catalog,
            pacer,
            storage,
            settings,
            state: RunState::CreateSchema,
            batch: IngestBatch::default(),
            seen_people: HashSet::new(),
            seen_movies: HashSet::new(),
            pages_since_flush: 0,
            cleared: false,
            stats: IngestStats::default(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn run(mut self, source: IngestSource) -> Result<IngestStats, ReelError> {
        self.transition(RunState::CreateSchema);
        self.storage.create_schema()?;

        self.transition(RunState::Clear);
        self.cleared = false;

        self.transition(RunState::FetchLoop);
        match source {
            IngestSource::Candidates(ids) => self.walk_candidates(&ids)?,
            IngestSource::Listing => self.walk_listing()?,
        }

        self.transition(RunState::FinalSave);
        self.flush()?;

        self.transition(RunState::Done);
        self.stats.requests = self.pacer.requests();
        info!(
            pages = self.stats.pages,
            actors = self.stats.actors_saved,
            skipped = self.stats.actors_skipped,
            movies = self.stats.movies_saved,
            roles = self.stats.roles_saved,
            requests = self.stats.requests,
            batches = self.stats.batches,
            "Data refresh complete"
        );
        Ok(self.stats)
    }

    fn transition(&mut self, next: RunState) {
        debug!(from = ?self.state, to = ?next, "Ingest state change");
        if next == RunState::Clear {
            info!("Clearing tables; the clear commits with the first batch");
        }
        self.state = next;
    }

    fn walk_candidates(&mut self, ids: &[u64]) -> Result<(), ReelError> {
        let size = self.settings.candidate_page_size.max(1);
        for (index, chunk) in ids.chunks(size).enumerate() {
            info!(page = index + 1, people = chunk.len(), "Processing candidate page");
            for &id in chunk {
                self.visit_person(id);
            }
            self.finish_page()?;
        }
        Ok(())
    }

    fn walk_listing(&mut self) -> Result<(), ReelError> {
        let mut page = 1u32;
        let mut known_total: Option<u32> = None;
        let mut failures = 0u32;
        loop {
            if self.settings.page_cap != 0 && page > self.settings.page_cap {
                info!(cap = self.settings.page_cap, "Reached listing page cap");
                break;
            }
            if let Some(total) = known_total.filter(|total| page > *total) {
                info!(page, total_pages = total, "Passed last reported listing page");
                break;
            }

            info!(page, "Fetching popular people page");
            let Some(listing) = self.fetch_popular_page(page) else {
                failures += 1;
                if failures >= MAX_CONSECUTIVE_PAGE_FAILURES {
                    warn!(page, failures, "Giving up on listing after repeated page failures");
                    break;
                }
                page += 1;
                continue;
            };
            failures = 0;
            if listing.total_pages > 0 {
                known_total = Some(listing.total_pages);
            }
            if listing.results.is_empty() {
                info!(page, "Listing page returned no results");
                break;
            }

            for person in &listing.results {
                self.visit_person(person.id);
            }
            self.finish_page()?;

            if listing.is_last() {
                info!(page, total_pages = listing.total_pages, "Reached last listing page");
                break;
            }
            page += 1;
        }
        Ok(())
    }

    fn visit_person(&mut self, id: u64) {
        if !self.seen_people.insert(id) {
            debug!(id, "Person already processed this run");
            self.stats.duplicate_people += 1;
            return;
        }
        self.stats.people_seen += 1;
        self.process_person(id);
    }

    fn process_person(&mut self, id: u64) {
        info!(id, "Fetching data for actor");
        let Some(profile) = self.fetch_person(id) else {
            info!(id, "Skipping actor without profile");
            self.stats.actors_skipped += 1;
            return;
        };

        if let Some(payload_id) = profile.id.filter(|payload_id| *payload_id != id) {
            warn!(id, payload_id, "Profile id differs from requested id; keeping requested id");
        }
        let actor = match profile.into_actor(id) {
            Ok(actor) => actor,
            Err(err) => {
                info!(id, error = %err, "Skipping actor");
                self.stats.actors_skipped += 1;
                return;
            }
        };

        info!(id = actor.id, name = %actor.name, birthdate = %actor.birthdate, "Processing actor");
        let credits = self.fetch_movie_credits(actor.id);
        self.collect_credits(&actor, credits);
        self.batch.actors.push(actor);
    }

    fn collect_credits(&mut self, actor: &Actor, credits: Vec<MovieCredit>) {
        for credit in credits {
            let movie = match credit.into_movie() {
                Ok(movie) => movie,
                Err(err) => {
                    warn!(actor_id = actor.id, error = %err, "Skipping credit");
                    self.stats.credits_rejected += 1;
                    continue;
                }
            };

            let movie_id = movie.id;
            let age = age_at_release(actor.birthdate, movie.release_date.as_deref());
            if self.seen_movies.insert(movie_id) {
                self.batch.movies.push(movie);
            }

            match age {
                Some(age) => self.batch.roles.push(Role {
                    actor_id: actor.id,
                    movie_id,
                    actor_age: Some(age),
                }),
                None => {
                    debug!(actor_id = actor.id, movie_id, "No age for credit without a valid release date");
                    self.stats.credits_without_age += 1;
                }
            }
        }
    }

    fn finish_page(&mut self) -> Result<(), ReelError> {
        self.stats.pages += 1;
        self.pages_since_flush += 1;
        if self.pages_since_flush >= self.settings.pages_per_batch {
            self.transition(RunState::SaveBatch);
            self.flush()?;
            self.transition(RunState::FetchLoop);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ReelError> {
        let mode = if self.cleared {
            WriteMode::Append
        } else {
            WriteMode::ReplaceAll
        };

        info!(
            actors = self.batch.actors.len(),
            movies = self.batch.movies.len(),
            roles = self.batch.roles.len(),
            "Saving batch"
        );
        self.storage.save_batch(&self.batch, mode)?;

        self.cleared = true;
        self.stats.actors_saved += self.batch.actors.len() as u64;
        self.stats.movies_saved += self.batch.movies.len() as u64;
        self.stats.roles_saved += self.batch.roles.len() as u64;
        self.stats.batches += 1;
        self.batch.clear();
        self.pages_since_flush = 0;
        Ok(())
    }

    fn fetch_person(&mut self, id: u64) -> Option<PersonProfile> {
        match self.pacer.call(|| self.catalog.person(id)) {
            Ok(profile) => Some(profile),
            Err(err) => {
                error!(id, error = %err, "Failed to fetch details for person");
                None
            }
        }
    }

    fn fetch_movie_credits(&mut self, id: u64) -> Vec<MovieCredit> {
        match self.pacer.call(|| self.catalog.movie_credits(id)) {
            Ok(credits) => credits.cast,
            Err(err) => {
                error!(id, error = %err, "Failed to fetch movie credits for person");
                Vec::new()
            }
        }
    }

    fn fetch_popular_page(&mut self, page: u32) -> Option<PopularPage> {
        match self.pacer.call(|| self.catalog.popular_people(page)) {
            Ok(listing) => Some(listing),
            Err(err) => {
                error!(page, error = %err, "Failed to fetch popular people page");
                None
            }
        }
    }
}
