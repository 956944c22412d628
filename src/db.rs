use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection};
use std::path::PathBuf;

use crate::models::{Listing, UserProfile};

pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    pub fn open() -> Result<Self> {
        let path = Self::default_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path)?;
        Ok(Self { conn, path })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn,
            path: PathBuf::from(":memory:"),
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn default_path() -> Result<PathBuf> {
        // Use XDG data directory or fallback
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "prowl") {
            Ok(proj_dirs.data_dir().join("prowl.db"))
        } else {
            // Fallback to current directory
            Ok(PathBuf::from("prowl.db"))
        }
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS profile (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                positions TEXT NOT NULL DEFAULT '',
                location TEXT NOT NULL DEFAULT '',
                years_experience INTEGER,
                skills TEXT NOT NULL DEFAULT '',
                keyword_lines TEXT NOT NULL DEFAULT '[]',
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS listings (
                listing_id TEXT PRIMARY KEY,
                title TEXT NOT NULL DEFAULT '',
                company TEXT NOT NULL DEFAULT '',
                location TEXT NOT NULL DEFAULT '',
                benefits TEXT NOT NULL DEFAULT '',
                tags TEXT NOT NULL DEFAULT '[]',
                url TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS applications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                listing_id TEXT NOT NULL REFERENCES listings(listing_id),
                outcome TEXT NOT NULL CHECK (outcome IN ('submitted', 'stuck', 'not_applicable')),
                attempted_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_listings_company ON listings(company);
            CREATE INDEX IF NOT EXISTS idx_applications_listing ON applications(listing_id);
            "#,
        )?;
        Ok(())
    }

    pub fn ensure_initialized(&self) -> Result<()> {
        let tables: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='listings'",
            [],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Err(anyhow!("Database not initialized. Run 'prowl init' first."));
        }
        Ok(())
    }

    // --- Profile operations ---

    pub fn save_profile(&self, profile: &UserProfile) -> Result<()> {
        let keyword_lines = serde_json::to_string(&profile.keyword_lines)?;
        self.conn.execute(
            "INSERT INTO profile (id, positions, location, years_experience, skills, keyword_lines)
             VALUES (1, ?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                positions = excluded.positions,
                location = excluded.location,
                years_experience = excluded.years_experience,
                skills = excluded.skills,
                keyword_lines = excluded.keyword_lines,
                updated_at = datetime('now')",
            params![
                profile.positions,
                profile.location,
                profile.years_experience,
                profile.skills,
                keyword_lines
            ],
        )?;
        Ok(())
    }

    pub fn load_profile(&self) -> Result<Option<UserProfile>> {
        let result = self.conn.query_row(
            "SELECT positions, location, years_experience, skills, keyword_lines
             FROM profile WHERE id = 1",
            [],
            Self::row_to_profile,
        );
        match result {
            Ok(profile) => Ok(Some(profile)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn row_to_profile(row: &rusqlite::Row) -> rusqlite::Result<UserProfile> {
        let keyword_lines: String = row.get(4)?;
        Ok(UserProfile {
            positions: row.get(0)?,
            location: row.get(1)?,
            years_experience: row.get(2)?,
            skills: row.get(3)?,
            keyword_lines: serde_json::from_str(&keyword_lines).unwrap_or_default(),
        })
    }

    // --- Listing operations ---

    /// Insert a listing, keyed by its platform id. Returns false when the id was
    /// already stored (idempotent across runs).
    pub fn insert_listing(&self, listing: &Listing) -> Result<bool> {
        let tags = serde_json::to_string(&listing.tags)?;
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO listings (listing_id, title, company, location, benefits, tags, url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                listing.id,
                listing.title,
                listing.company,
                listing.location,
                listing.benefits,
                tags,
                listing.url
            ],
        )?;
        Ok(inserted > 0)
    }

    pub fn list_listings(&self, limit: usize) -> Result<Vec<Listing>> {
        let mut stmt = self.conn.prepare(
            "SELECT listing_id, title, company, location, benefits, tags, url
             FROM listings ORDER BY created_at DESC, listing_id LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit as i64], Self::row_to_listing)?;
        rows.collect::<Result<Vec<_>, _>>()
            .context("Failed to list listings")
    }

    pub fn get_listing(&self, id: &str) -> Result<Option<Listing>> {
        let result = self.conn.query_row(
            "SELECT listing_id, title, company, location, benefits, tags, url
             FROM listings WHERE listing_id = ?1",
            [id],
            Self::row_to_listing,
        );
        match result {
            Ok(listing) => Ok(Some(listing)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn row_to_listing(row: &rusqlite::Row) -> rusqlite::Result<Listing> {
        let tags: String = row.get(5)?;
        Ok(Listing {
            id: row.get(0)?,
            title: row.get(1)?,
            company: row.get(2)?,
            location: row.get(3)?,
            benefits: row.get(4)?,
            tags: serde_json::from_str(&tags).unwrap_or_default(),
            url: row.get(6)?,
        })
    }

    // --- Application operations ---

    pub fn record_application(&self, listing_id: &str, outcome: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO applications (listing_id, outcome) VALUES (?1, ?2)",
            params![listing_id, outcome],
        )?;
        Ok(())
    }

    pub fn last_application_outcome(&self, listing_id: &str) -> Result<Option<String>> {
        let result = self.conn.query_row(
            "SELECT outcome FROM applications WHERE listing_id = ?1
             ORDER BY attempted_at DESC, id DESC LIMIT 1",
            [listing_id],
            |row| row.get(0),
        );
        match result {
            Ok(outcome) => Ok(Some(outcome)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.init().unwrap();
        db
    }

    fn listing(id: &str) -> Listing {
        Listing {
            id: id.to_string(),
            title: "Engineer".to_string(),
            company: "Acme".to_string(),
            location: "Berlin".to_string(),
            benefits: String::new(),
            tags: vec!["Promoted".to_string()],
            url: format!("https://www.linkedin.com/jobs/view/{id}"),
        }
    }

    #[test]
    fn test_ensure_initialized() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.ensure_initialized().is_err());
        db.init().unwrap();
        assert!(db.ensure_initialized().is_ok());
    }

    #[test]
    fn test_profile_round_trip() {
        let db = test_db();
        assert!(db.load_profile().unwrap().is_none());

        let profile = UserProfile {
            positions: "Engineer, Data Scientist".to_string(),
            location: "Berlin".to_string(),
            years_experience: Some(7),
            skills: "Rust, SQL".to_string(),
            keyword_lines: vec!["Engineer, Rust".to_string()],
        };
        db.save_profile(&profile).unwrap();

        let loaded = db.load_profile().unwrap().unwrap();
        assert_eq!(loaded.positions, profile.positions);
        assert_eq!(loaded.years_experience, Some(7));
        assert_eq!(loaded.keyword_lines, profile.keyword_lines);
    }

    #[test]
    fn test_profile_undefined_years_stays_undefined() {
        let db = test_db();
        let mut profile = UserProfile {
            positions: String::new(),
            location: String::new(),
            years_experience: None,
            skills: String::new(),
            keyword_lines: vec![],
        };
        db.save_profile(&profile).unwrap();
        assert_eq!(db.load_profile().unwrap().unwrap().years_experience, None);

        // overwrite keeps the single row
        profile.years_experience = Some(0);
        db.save_profile(&profile).unwrap();
        assert_eq!(db.load_profile().unwrap().unwrap().years_experience, Some(0));
    }

    #[test]
    fn test_insert_listing_is_idempotent() {
        let db = test_db();
        assert!(db.insert_listing(&listing("1")).unwrap());
        assert!(!db.insert_listing(&listing("1")).unwrap());
        assert!(db.insert_listing(&listing("2")).unwrap());
        assert_eq!(db.list_listings(10).unwrap().len(), 2);
    }

    #[test]
    fn test_get_listing_round_trip() {
        let db = test_db();
        db.insert_listing(&listing("42")).unwrap();

        let loaded = db.get_listing("42").unwrap().unwrap();
        assert_eq!(loaded.company, "Acme");
        assert_eq!(loaded.tags, vec!["Promoted"]);
        assert!(db.get_listing("missing").unwrap().is_none());
    }

    #[test]
    fn test_record_application_outcome() {
        let db = test_db();
        db.insert_listing(&listing("1")).unwrap();
        assert!(db.last_application_outcome("1").unwrap().is_none());

        db.record_application("1", "stuck").unwrap();
        db.record_application("1", "submitted").unwrap();
        assert_eq!(
            db.last_application_outcome("1").unwrap().as_deref(),
            Some("submitted")
        );
    }
}
