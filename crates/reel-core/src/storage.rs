use std::path::Path;

use rusqlite::{Connection, Transaction, params};
use tracing::debug;

use crate::model::{Actor, Movie, Role};

/// Rows buffered between checkpoints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestBatch {
    pub actors: Vec<Actor>,
    pub movies: Vec<Movie>,
    pub roles: Vec<Role>,
}

impl IngestBatch {
    pub fn clear(&mut self) {
        self.actors.clear();
        self.movies.clear();
        self.roles.clear();
    }
}

/// How a batch relates to what is already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Upsert into the existing tables.
    Append,
    /// Empty all three tables in the same transaction before writing.
    ReplaceAll,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableCounts {
    pub actors: u64,
    pub movies: u64,
    pub roles: u64,
}

/// Owned handle to the SQLite database read by the presentation layer.
#[derive(Debug)]
pub struct Storage {
    conn: Connection,
}

impl Storage {
    pub fn open(path: &Path) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn create_schema(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS actors (
                id INTEGER PRIMARY KEY,
                actor_name TEXT NOT NULL,
                birthdate TEXT NOT NULL,
                image_path TEXT
            );
            CREATE TABLE IF NOT EXISTS movies (
                id INTEGER PRIMARY KEY,
                movie_title TEXT NOT NULL,
                release_date TEXT,
                poster_path TEXT
            );
            CREATE TABLE IF NOT EXISTS roles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                actor_id INTEGER,
                movie_id INTEGER,
                actor_age INTEGER,
                FOREIGN KEY (actor_id) REFERENCES actors(id),
                FOREIGN KEY (movie_id) REFERENCES movies(id)
            );",
        )
    }

    /// Writes a batch atomically. Actors and movies replace rows with the same
    /// id; roles are always appended.
    pub fn save_batch(&mut self, batch: &IngestBatch, mode: WriteMode) -> Result<(), rusqlite::Error> {
        let tx = self.conn.transaction()?;
        if mode == WriteMode::ReplaceAll {
            clear_all(&tx)?;
        }

        {
            let mut insert_actor = tx.prepare(
                "INSERT OR REPLACE INTO actors (id, actor_name, birthdate, image_path)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for actor in &batch.actors {
                insert_actor.execute(params![
                    to_i64(actor.id),
                    actor.name,
                    actor.birthdate.format("%Y-%m-%d").to_string(),
                    actor.image_path,
                ])?;
            }

            let mut insert_movie = tx.prepare(
                "INSERT OR REPLACE INTO movies (id, movie_title, release_date, poster_path)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for movie in &batch.movies {
                insert_movie.execute(params![
                    to_i64(movie.id),
                    movie.title,
                    movie.release_date,
                    movie.poster_path,
                ])?;
            }

            let mut insert_role = tx.prepare(
                "INSERT INTO roles (actor_id, movie_id, actor_age) VALUES (?1, ?2, ?3)",
            )?;
            for role in &batch.roles {
                insert_role.execute(params![
                    to_i64(role.actor_id),
                    to_i64(role.movie_id),
                    role.actor_age,
                ])?;
            }
        }

        tx.commit()?;
        debug!(
            actors = batch.actors.len(),
            movies = batch.movies.len(),
            roles = batch.roles.len(),
            replaced = mode == WriteMode::ReplaceAll,
            "Committed batch"
        );
        Ok(())
    }

    pub fn counts(&self) -> Result<TableCounts, rusqlite::Error> {
        let count = |table: &str| -> Result<u64, rusqlite::Error> {
            let value: i64 =
                self.conn
                    .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            Ok(value.max(0) as u64)
        };
        Ok(TableCounts {
            actors: count("actors")?,
            movies: count("movies")?,
            roles: count("roles")?,
        })
    }

    /// Roles for one actor as `(movie_id, actor_age)`, ordered by row id.
    pub fn roles_for_actor(&self, actor_id: u64) -> Result<Vec<(u64, Option<i32>)>, rusqlite::Error> {
        let mut stmt = self
            .conn
            .prepare("SELECT movie_id, actor_age FROM roles WHERE actor_id = ?1 ORDER BY id")?;
        let rows = stmt.query_map(params![to_i64(actor_id)], |row| {
            let movie_id: i64 = row.get(0)?;
            Ok((movie_id.max(0) as u64, row.get::<_, Option<i32>>(1)?))
        })?;

        let mut roles = Vec::new();
        for role in rows {
            roles.push(role?);
        }
        Ok(roles)
    }

    /// Closes the connection, surfacing any error SQLite reports on close.
    pub fn close(self) -> Result<(), rusqlite::Error> {
        self.conn.close().map_err(|(_, err)| err)
    }
}

fn clear_all(tx: &Transaction<'_>) -> Result<(), rusqlite::Error> {
    tx.execute("DELETE FROM roles", [])?;
    tx.execute("DELETE FROM movies", [])?;
    tx.execute("DELETE FROM actors", [])?;
    Ok(())
}

fn to_i64(id: u64) -> i64 {
    i64::try_from(id).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn actor(id: u64, name: &str) -> Actor {
        Actor {
            id,
            name: name.to_string(),
            birthdate: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            image_path: None,
        }
    }

    fn movie(id: u64, title: &str) -> Movie {
        Movie {
            id,
            title: title.to_string(),
            release_date: Some("2010-07-16".to_string()),
            poster_path: Some("/poster.jpg".to_string()),
        }
    }

    fn storage() -> Storage {
        let storage = Storage::open_in_memory().unwrap();
        storage.create_schema().unwrap();
        storage
    }

    fn sample_batch() -> IngestBatch {
        IngestBatch {
            actors: vec![actor(1, "Actor One"), actor(2, "Actor Two")],
            movies: vec![movie(10, "Movie One")],
            roles: vec![Role {
                actor_id: 1,
                movie_id: 10,
                actor_age: Some(20),
            }],
        }
    }

    #[test]
    fn upsert_keeps_one_row_per_id() {
        let mut storage = storage();
        let batch = sample_batch();
        storage.save_batch(&batch, WriteMode::Append).unwrap();
        storage.save_batch(&batch, WriteMode::Append).unwrap();

        let counts = storage.counts().unwrap();
        assert_eq!(counts.actors, 2);
        assert_eq!(counts.movies, 1);
    }

    #[test]
    fn roles_duplicate_without_a_clear() {
        let mut storage = storage();
        let batch = sample_batch();
        storage.save_batch(&batch, WriteMode::Append).unwrap();
        storage.save_batch(&batch, WriteMode::Append).unwrap();
        assert_eq!(storage.counts().unwrap().roles, 2);

        storage.save_batch(&batch, WriteMode::ReplaceAll).unwrap();
        assert_eq!(
            storage.counts().unwrap(),
            TableCounts {
                actors: 2,
                movies: 1,
                roles: 1
            }
        );
    }

    #[test]
    fn replace_with_empty_batch_clears_everything() {
        let mut storage = storage();
        storage.save_batch(&sample_batch(), WriteMode::Append).unwrap();
        storage
            .save_batch(&IngestBatch::default(), WriteMode::ReplaceAll)
            .unwrap();
        assert_eq!(storage.counts().unwrap(), TableCounts::default());
    }

    #[test]
    fn upsert_replaces_changed_fields() {
        let mut storage = storage();
        storage.save_batch(&sample_batch(), WriteMode::Append).unwrap();

        let renamed = IngestBatch {
            actors: vec![actor(1, "Renamed")],
            ..IngestBatch::default()
        };
        storage.save_batch(&renamed, WriteMode::Append).unwrap();

        let name: String = storage
            .conn
            .query_row("SELECT actor_name FROM actors WHERE id = 1", [], |row| row.get(0))
            .unwrap();
        assert_eq!(name, "Renamed");
    }

    #[test]
    fn unknown_age_is_stored_as_null() {
        let mut storage = storage();
        let batch = IngestBatch {
            roles: vec![Role {
                actor_id: 3,
                movie_id: 30,
                actor_age: None,
            }],
            ..IngestBatch::default()
        };
        storage.save_batch(&batch, WriteMode::Append).unwrap();
        assert_eq!(storage.roles_for_actor(3).unwrap(), vec![(30, None)]);
    }

    #[test]
    fn schema_creation_is_repeatable() {
        let storage = storage();
        storage.create_schema().unwrap();
        assert_eq!(storage.counts().unwrap(), TableCounts::default());
    }
}
