//! Game-library core for a handheld homebrew launcher.
//!
//! This crate is the piece a launcher front end links against: it discovers
//! installed apps and emulator content, keeps a persistent catalog, pages
//! icon textures through a bounded window and encodes boot parameters for
//! an external loader. Rendering, container extraction internals and the
//! OS launch primitive stay outside, behind small collaborator traits.

use std::sync::{Arc, Mutex};

pub mod category;
pub mod error;
pub mod images;
pub mod launch;
pub mod paths;
pub mod scan;
pub mod state;
pub mod tasks;

pub use category::{CategoryId, CategoryInfo, Registry};
pub use error::{Result, ShelfError};
pub use paths::Paths;
pub use state::data::{Game, GameKind, GuiMode, ScanProgress, SharedProgress, ViewMode};

use images::Textures;
use launch::AppLauncher;
use scan::containers::{ContainerExtractor, SfoReader};
use scan::native::AppRegistry;
use state::catalog::Catalog;

/// Everything the library owns: the category registry, the catalog, and
/// the shared state background tasks report through.
///
/// Components receive a reference to one of these instead of reaching into
/// process-wide statics; tests get to build as many as they like.
pub struct ShelfContext {
    pub registry: Registry,
    pub paths: Paths,
    pub catalog: Mutex<Catalog>,
    pub progress: SharedProgress,
    mode: Mutex<GuiMode>,
    current: Mutex<CategoryId>,
}

impl ShelfContext {
    pub fn new(paths: Paths) -> Self {
        let registry = Registry::new(&paths);
        let catalog = Mutex::new(Catalog::new(&registry));
        ShelfContext {
            registry,
            paths,
            catalog,
            progress: SharedProgress::new(),
            mode: Mutex::new(GuiMode::Launcher),
            current: Mutex::new(CategoryId::Vita),
        }
    }

    /// What the front end should be drawing right now.
    pub fn mode(&self) -> GuiMode {
        *self.mode.lock().unwrap()
    }

    pub fn set_mode(&self, mode: GuiMode) {
        *self.mode.lock().unwrap() = mode;
    }

    /// The category currently on screen.
    pub fn current(&self) -> CategoryId {
        *self.current.lock().unwrap()
    }

    pub fn set_current(&self, id: CategoryId) {
        *self.current.lock().unwrap() = id;
    }
}

/// The external capability surface, injected once at startup.
///
/// Every member is an `Arc` so background tasks can hold on to the set
/// without tying their lifetime to the caller's stack.
pub struct Collaborators {
    /// System application registry (installed native apps)
    pub apps: Arc<dyn AppRegistry>,
    /// Disc-image extractors, tried in order (ISO, then CSO)
    pub iso_extractors: Vec<Arc<dyn ContainerExtractor>>,
    /// Package extractor for EBOOTs
    pub eboot_extractor: Arc<dyn ContainerExtractor>,
    /// Structured metadata reader for extracted param.sfo blobs
    pub sfo: Arc<dyn SfoReader>,
    /// Texture capability used by the image window
    pub textures: Arc<dyn Textures>,
    /// OS app-launch primitive
    pub os: Arc<dyn AppLauncher>,
}
