/// Shared data structures for the launcher state
///
/// These structs represent the data model that flows between the scanners,
/// the cache database and the front end.
use std::sync::{Arc, Mutex};

/// Entries shown per page in both list and grid views
pub const GAMES_PER_PAGE: usize = 18;

/// What a catalog entry actually is on disk.
///
/// The order matters: everything at `PspIso` and above went through a
/// container extraction step and launches through the external loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GameKind {
    /// Native installed app, launched by title id
    Bubble,
    /// Plain ROM file handed to an emulator core
    Rom,
    /// PSP ISO/CSO disc image
    PspIso,
    /// PSP EBOOT package
    Eboot,
}

impl GameKind {
    /// Stable key used in cache rows.
    pub fn as_str(&self) -> &'static str {
        match self {
            GameKind::Bubble => "bubble",
            GameKind::Rom => "rom",
            GameKind::PspIso => "iso",
            GameKind::Eboot => "eboot",
        }
    }

    /// Parse a cache-row key back into a kind.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "bubble" => Some(GameKind::Bubble),
            "rom" => Some(GameKind::Rom),
            "iso" => Some(GameKind::PspIso),
            "eboot" => Some(GameKind::Eboot),
            _ => None,
        }
    }

    /// True for kinds that boot through the external loader.
    pub fn is_extracted(&self) -> bool {
        *self >= GameKind::PspIso
    }
}

/// Opaque handle to a loaded icon texture.
///
/// Handle 0 is the shared "no icon" placeholder; it is never freed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureHandle(pub u32);

impl TextureHandle {
    pub const PLACEHOLDER: TextureHandle = TextureHandle(0);

    pub fn is_placeholder(&self) -> bool {
        *self == TextureHandle::PLACEHOLDER
    }
}

/// One discovered title.
#[derive(Debug, Clone)]
pub struct Game {
    /// Stable identifier: a title id for bubbles, a synthetic id for
    /// extracted content, or a per-scan id for ROM files
    pub id: String,
    pub kind: GameKind,
    /// Display title (truncated at scan time, never at render time)
    pub title: String,
    /// Absolute content path; empty for bubbles
    pub rom_path: String,
    /// Label of the owning category
    pub category: String,
    pub favorite: bool,
    /// Lazily attached icon; placeholder until the image window loads it
    pub tex: TextureHandle,
}

impl Game {
    /// Kind-dependent identity, with `self` as the probe.
    ///
    /// ROM files have no meaningful id of their own, so they compare by
    /// content path; every other kind compares by id.
    pub fn matches(&self, other: &Game) -> bool {
        if self.kind == GameKind::Rom {
            self.rom_path == other.rom_path
        } else {
            self.id == other.id
        }
    }
}

/// How a category renders its page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    List,
    Grid,
}

/// What the front end should currently be drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuiMode {
    /// A scan task owns the catalog; the UI polls progress only
    Scanning,
    /// Catalog is stable and browsable
    Launcher,
}

/// Progress of the single in-flight scan task.
///
/// `games_to_scan` starts at the candidate count and is decremented for
/// every candidate that turns out not to be a game (wrong extension,
/// failed extraction), so `games_scanned / games_to_scan` always converges
/// to 1.0 by the end of the scan.
#[derive(Debug, Clone, Default)]
pub struct ScanProgress {
    pub games_to_scan: usize,
    pub games_scanned: usize,
    /// Human-readable status line for the progress screen
    pub message: String,
    /// Snapshot of the most recently accepted game
    pub current: Option<Game>,
}

/// Handle to the process-wide scan progress.
///
/// The scan task mutates this while the UI polls it. Readers only ever get
/// snapshots: progress is monotonic within one scan and the message updates
/// atomically from the reader's point of view.
#[derive(Clone, Default)]
pub struct SharedProgress(Arc<Mutex<ScanProgress>>);

impl SharedProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset to the start of a new scan phase.
    pub fn begin(&self, total: usize, message: impl Into<String>) {
        let mut p = self.0.lock().unwrap();
        p.games_to_scan = total;
        p.games_scanned = 0;
        p.message = message.into();
        p.current = None;
    }

    /// Record one accepted game.
    pub fn advance(&self, game: &Game) {
        let mut p = self.0.lock().unwrap();
        p.games_scanned += 1;
        p.current = Some(game.clone());
    }

    /// A candidate was rejected or failed; shrink the expected total.
    pub fn drop_expected(&self) {
        let mut p = self.0.lock().unwrap();
        p.games_to_scan = p.games_to_scan.saturating_sub(1);
    }

    pub fn set_message(&self, message: impl Into<String>) {
        self.0.lock().unwrap().message = message.into();
    }

    /// Copy of the current state, for UI polling.
    pub fn snapshot(&self) -> ScanProgress {
        self.0.lock().unwrap().clone()
    }
}
