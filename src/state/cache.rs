use rusqlite::{Connection, Result as SqlResult};

use crate::paths::Paths;
use crate::state::data::{Game, GameKind, TextureHandle};

/// The GameCache manages the SQLite catalog database.
///
/// Scanning ROM folders and extracting container metadata is expensive, so
/// every discovered game is written through to this cache; the next start
/// bulk-loads from here instead of re-running the scanners. Connections are
/// opened per logical operation and dropped when the handle goes out of
/// scope - there is never a long-lived connection shared across tasks.
pub struct GameCache {
    conn: Connection,
}

impl GameCache {
    /// Whether a cache file exists at all.
    ///
    /// Absence is not an error; it just routes the caller onto the full
    /// scan path instead of the cache-load path.
    pub fn exists(paths: &Paths) -> bool {
        paths.cache_db.exists()
    }

    /// Open (or create) the cache database and make sure the schema is set up.
    pub fn open(paths: &Paths) -> SqlResult<Self> {
        // Ensure the parent directory exists
        if let Some(parent) = paths.cache_db.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let conn = Connection::open(&paths.cache_db)?;
        let cache = GameCache { conn };
        cache.init_schema()?;
        Ok(cache)
    }

    /// Delete the cache file so the next scan rebuilds it from scratch.
    pub fn purge(paths: &Paths) {
        if paths.cache_db.exists() {
            if let Err(e) = std::fs::remove_file(&paths.cache_db) {
                eprintln!("⚠️  Failed to remove cache file: {}", e);
            }
        }
    }

    /// Initialize the database schema.
    /// Creates all necessary tables and indexes if they don't exist.
    fn init_schema(&self) -> SqlResult<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS games (
                id              TEXT NOT NULL,
                kind            TEXT NOT NULL,
                title           TEXT NOT NULL,
                rom_path        TEXT NOT NULL,
                category        TEXT NOT NULL,
                imported_at     INTEGER NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_games_category
             ON games(category, kind)",
            [],
        )?;

        // Favorites survive cache purges on purpose: they are keyed by the
        // same kind-dependent identity the catalog uses, not by row id.
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS favorites (
                id              TEXT NOT NULL,
                kind            TEXT NOT NULL,
                title           TEXT NOT NULL,
                rom_path        TEXT NOT NULL,
                category        TEXT NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    /// Number of cached games, used to seed the progress total before a
    /// bulk load.
    pub fn cached_count(&self) -> SqlResult<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM games", [], |row| row.get(0))
    }

    /// Write one discovered game through to the cache.
    pub fn insert_game(&self, game: &Game) -> SqlResult<()> {
        self.conn.execute(
            "INSERT INTO games (id, kind, title, rom_path, category, imported_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                game.id,
                game.kind.as_str(),
                game.title,
                game.rom_path,
                game.category,
                chrono::Utc::now().timestamp(),
            ],
        )?;
        Ok(())
    }

    /// Bulk-fetch every cached game.
    ///
    /// Rows with a kind key this build doesn't know are skipped silently;
    /// they belong to a newer schema and will be rebuilt on the next purge.
    pub fn load_all(&self) -> SqlResult<Vec<Game>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, kind, title, rom_path, category FROM games",
        )?;

        let rows = stmt.query_map([], |row| {
            let kind: String = row.get(1)?;
            Ok((
                row.get::<_, String>(0)?,
                kind,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut games = Vec::new();
        for row in rows {
            let (id, kind, title, rom_path, category) = row?;
            if let Some(kind) = GameKind::from_str(&kind) {
                games.push(Game {
                    id,
                    kind,
                    title,
                    rom_path,
                    category,
                    favorite: false,
                    tex: TextureHandle::PLACEHOLDER,
                });
            }
        }

        Ok(games)
    }

    /// Bulk delete ahead of a targeted rescan, so re-discovered entries do
    /// not accumulate as duplicates.
    pub fn delete_by_category_and_kind(
        &self,
        category: &str,
        kind: GameKind,
    ) -> SqlResult<usize> {
        self.conn.execute(
            "DELETE FROM games WHERE category = ?1 AND kind = ?2",
            rusqlite::params![category, kind.as_str()],
        )
    }

    /// Fetch all favorites.
    pub fn favorites(&self) -> SqlResult<Vec<Game>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, kind, title, rom_path, category FROM favorites",
        )?;

        let rows = stmt.query_map([], |row| {
            let kind: String = row.get(1)?;
            Ok((
                row.get::<_, String>(0)?,
                kind,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut games = Vec::new();
        for row in rows {
            let (id, kind, title, rom_path, category) = row?;
            if let Some(kind) = GameKind::from_str(&kind) {
                games.push(Game {
                    id,
                    kind,
                    title,
                    rom_path,
                    category,
                    favorite: true,
                    tex: TextureHandle::PLACEHOLDER,
                });
            }
        }

        Ok(games)
    }

    /// Persist a favorite flag.
    pub fn add_favorite(&self, game: &Game) -> SqlResult<()> {
        self.conn.execute(
            "INSERT INTO favorites (id, kind, title, rom_path, category)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                game.id,
                game.kind.as_str(),
                game.title,
                game.rom_path,
                game.category,
            ],
        )?;
        Ok(())
    }

    /// Remove a favorite, matching by the same kind-dependent identity as
    /// the in-memory catalog.
    pub fn remove_favorite(&self, game: &Game) -> SqlResult<usize> {
        if game.kind == GameKind::Rom {
            self.conn.execute(
                "DELETE FROM favorites WHERE kind = 'rom' AND rom_path = ?1",
                rusqlite::params![game.rom_path],
            )
        } else {
            self.conn.execute(
                "DELETE FROM favorites WHERE kind != 'rom' AND id = ?1",
                rusqlite::params![game.id],
            )
        }
    }
}

// Implement Debug for better error messages
impl std::fmt::Debug for GameCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameCache").finish()
    }
}
