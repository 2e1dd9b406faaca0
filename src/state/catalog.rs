/// In-memory game catalog
///
/// One ordered collection per category, plus the per-category paging state
/// the front end navigates. The catalog owns every `Game`; the image window
/// only ever refers back into it by index.
use std::cmp::Ordering;

use rusqlite::Result as SqlResult;

use crate::category::{CategoryId, CategoryInfo, Registry};
use crate::state::cache::GameCache;
use crate::state::data::{Game, GameKind, SharedProgress, ViewMode, GAMES_PER_PAGE};

/// Mutable per-category state.
#[derive(Debug)]
pub struct CategoryState {
    pub games: Vec<Game>,
    /// Current page, 1-based; page 0 is never valid
    pub page_num: u32,
    /// Derived from the game count; never below 1
    pub max_page: u32,
    pub view_mode: ViewMode,
}

/// The catalog: all categories' games and paging state.
pub struct Catalog {
    states: Vec<CategoryState>,
}

impl Catalog {
    pub fn new(registry: &Registry) -> Self {
        let states = registry
            .all()
            .map(|info| CategoryState {
                games: Vec::new(),
                page_num: 1,
                max_page: 1,
                view_mode: info.view_mode,
            })
            .collect();
        Catalog { states }
    }

    pub fn state(&self, id: CategoryId) -> &CategoryState {
        &self.states[id.index()]
    }

    pub fn state_mut(&mut self, id: CategoryId) -> &mut CategoryState {
        &mut self.states[id.index()]
    }

    /// Append without touching the cache - used by the native source (which
    /// is re-read on every start) and by the cache load itself.
    pub fn append(&mut self, id: CategoryId, game: Game) {
        self.states[id.index()].games.push(game);
    }

    /// Append and write through to the persistent cache.
    pub fn insert(&mut self, id: CategoryId, game: Game, cache: &GameCache) -> SqlResult<()> {
        cache.insert_game(&game)?;
        self.append(id, game);
        Ok(())
    }

    /// First game matching the probe's kind-dependent identity.
    pub fn find(&self, id: CategoryId, probe: &Game) -> Option<&Game> {
        self.states[id.index()].games.iter().find(|g| probe.matches(g))
    }

    pub fn find_mut(&mut self, id: CategoryId, probe: &Game) -> Option<&mut Game> {
        self.states[id.index()]
            .games
            .iter_mut()
            .find(|g| probe.matches(g))
    }

    pub fn find_position(&self, id: CategoryId, probe: &Game) -> Option<usize> {
        self.states[id.index()]
            .games
            .iter()
            .position(|g| probe.matches(g))
    }

    /// Remove the first match, returning the index it held.
    pub fn remove(&mut self, id: CategoryId, probe: &Game) -> Option<usize> {
        let pos = self.find_position(id, probe)?;
        self.states[id.index()].games.remove(pos);
        Some(pos)
    }

    /// Drop every entry of one kind from a category, in memory and in the
    /// cache. Runs ahead of a targeted rescan so re-discovered entries do
    /// not pile up as duplicates.
    pub fn remove_by_category_and_kind(
        &mut self,
        info: &CategoryInfo,
        kind: GameKind,
        cache: &GameCache,
    ) -> SqlResult<()> {
        cache.delete_by_category_and_kind(info.label, kind)?;
        self.states[info.id.index()].games.retain(|g| g.kind != kind);
        Ok(())
    }

    /// Sort a category by title.
    ///
    /// The comparator truncates both titles to the shorter length before
    /// comparing, so "Game" and "Game II" count as equal - which also means
    /// it is not a total order and std's sort (which may detect that and
    /// panic) cannot be used. A plain insertion sort reproduces the
    /// long-standing qsort behavior: ties keep whatever order they had, and
    /// re-sorting an already sorted category changes nothing.
    pub fn sort(&mut self, id: CategoryId) {
        let games = &mut self.states[id.index()].games;
        for i in 1..games.len() {
            let mut j = i;
            while j > 0 && title_cmp(&games[j - 1].title, &games[j].title) == Ordering::Greater {
                games.swap(j - 1, j);
                j -= 1;
            }
        }
    }

    /// Recompute the page count: ceil(count / 18), floor 1.
    pub fn set_max_page(&mut self, id: CategoryId) {
        let state = &mut self.states[id.index()];
        let pages = (state.games.len() + GAMES_PER_PAGE - 1) / GAMES_PER_PAGE;
        state.max_page = pages.max(1) as u32;
    }

    /// Bulk-populate every category from the persistent cache, bypassing
    /// the scanners entirely.
    pub fn load_from_cache(
        &mut self,
        cache: &GameCache,
        registry: &Registry,
        progress: &SharedProgress,
    ) -> SqlResult<()> {
        let total = cache.cached_count()?;
        progress.begin(total as usize, "Loading game info from cache");

        for game in cache.load_all()? {
            match registry.by_label(&game.category) {
                Some(info) => {
                    progress.advance(&game);
                    self.append(info.id, game);
                }
                // Row from a category this build no longer registers.
                None => progress.drop_expected(),
            }
        }
        Ok(())
    }

    /// Load the favorites list and cross-reference it: the Favorites
    /// category gets its own entries, and each favorited game is flagged in
    /// place inside its home category.
    pub fn load_favorites(&mut self, cache: &GameCache, registry: &Registry) -> SqlResult<()> {
        let favorites = cache.favorites()?;

        for fav in &favorites {
            if let Some(info) = registry.by_label(&fav.category) {
                if let Some(game) = self.find_mut(info.id, fav) {
                    game.favorite = true;
                }
            }
        }

        self.states[CategoryId::Favorites.index()].games = favorites;
        Ok(())
    }

    /// Drop every game from every category (full rescan entry point).
    pub fn clear_all(&mut self) {
        for state in &mut self.states {
            state.games.clear();
        }
    }
}

/// Case-sensitive byte comparison over the common prefix of both titles.
pub fn title_cmp(a: &str, b: &str) -> Ordering {
    let len = a.len().min(b.len());
    a.as_bytes()[..len].cmp(&b.as_bytes()[..len])
}
