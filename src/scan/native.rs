/// Native app source
///
/// Installed apps come out of the system's application database rather than
/// the filesystem. They arrive pre-categorized (by title-id prefix) and are
/// never written to the game cache - the app database is its own cache and
/// is re-read on every start.
use std::path::PathBuf;

use rusqlite::{Connection, OpenFlags};

use crate::category::Registry;
use crate::state::catalog::Catalog;
use crate::state::data::{Game, GameKind, SharedProgress, TextureHandle};

/// The app-registry collaborator.
///
/// This source always succeeds or yields empty: a missing or unreadable
/// database is the same as having no installed apps.
pub trait AppRegistry: Send + Sync {
    /// How many apps a fetch is expected to return.
    fn count(&self) -> usize;
    /// All installed apps as pre-categorized bubble entries.
    fn games(&self, registry: &Registry) -> Vec<Game>;
}

/// SQLite-backed implementation reading the system app database.
pub struct AppDb {
    db_path: PathBuf,
}

impl AppDb {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        AppDb {
            db_path: db_path.into(),
        }
    }

    fn open(&self) -> Option<Connection> {
        Connection::open_with_flags(&self.db_path, OpenFlags::SQLITE_OPEN_READ_ONLY).ok()
    }
}

impl AppRegistry for AppDb {
    fn count(&self) -> usize {
        let Some(conn) = self.open() else { return 0 };
        conn.query_row("SELECT COUNT(*) FROM tbl_appinfo_icon", [], |row| {
            row.get::<_, i64>(0)
        })
        .unwrap_or(0) as usize
    }

    fn games(&self, registry: &Registry) -> Vec<Game> {
        let Some(conn) = self.open() else {
            return Vec::new();
        };

        let mut stmt = match conn.prepare("SELECT titleId, title FROM tbl_appinfo_icon") {
            Ok(stmt) => stmt,
            Err(_) => return Vec::new(),
        };

        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        });

        let mut games = Vec::new();
        if let Ok(rows) = rows {
            for row in rows.flatten() {
                let (title_id, title) = row;
                let category = registry.classify_title_id(&title_id);
                games.push(Game {
                    id: title_id,
                    kind: GameKind::Bubble,
                    title,
                    rom_path: String::new(),
                    category: category.label.to_string(),
                    favorite: false,
                    tex: TextureHandle::PLACEHOLDER,
                });
            }
        }
        games
    }
}

/// Pull every installed app into the catalog.
pub fn scan_native(
    catalog: &mut Catalog,
    registry: &Registry,
    apps: &dyn AppRegistry,
    progress: &SharedProgress,
) {
    progress.begin(apps.count(), "Reading game info from the app database");

    for game in apps.games(registry) {
        // Labels come from the collaborator; anything unknown goes to
        // whatever classify_title_id falls back to, so this lookup holds.
        if let Some(info) = registry.by_label(&game.category) {
            progress.advance(&game);
            catalog.append(info.id, game);
        }
    }
}
