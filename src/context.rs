//! Per-session state: file resolution and grid/catalog caches.
//!
//! A `Context` is constructed by the top-level caller and passed by mutable
//! reference through every entry point; there is no process-wide default.
//! Grids are read-only once loaded and handed out as `Arc`s, so one context
//! per worker thread gives safe parallelism.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;

use crate::error::{GridError, TransformError};
use crate::grid::catalog::{Catalog, DateSide, Region};
use crate::grid::{loader, Grid};

/// One remembered catalog pick: the entry's region and date plus its loaded
/// grid.
#[derive(Clone)]
pub(crate) struct CachedPick {
    pub region: Region,
    pub date: f64,
    pub grid: Arc<Grid>,
}

/// The two most recent successful catalog lookups (nearest date before /
/// nearest date after the query date).
///
/// A slot is reused as long as its region still contains the query point;
/// date changes alone never invalidate it.
#[derive(Default)]
pub(crate) struct SelectionCache {
    before: Option<CachedPick>,
    after: Option<CachedPick>,
}

impl SelectionCache {
    pub fn get(&self, side: DateSide, lon: f64, lat: f64) -> Option<&CachedPick> {
        let slot = match side {
            DateSide::NotAfter => &self.before,
            DateSide::NotBefore => &self.after,
        };
        slot.as_ref().filter(|p| p.region.contains(lon, lat))
    }

    pub fn put(&mut self, side: DateSide, pick: CachedPick) {
        match side {
            DateSide::NotAfter => self.before = Some(pick),
            DateSide::NotBefore => self.after = Some(pick),
        }
    }
}

#[derive(Default)]
pub struct Context {
    search_paths: Vec<PathBuf>,
    grids: HashMap<String, Arc<Grid>>,
    catalogs: HashMap<String, Arc<Catalog>>,
    pub(crate) selection: SelectionCache,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a directory to the grid/catalog search path.
    pub fn add_search_path(&mut self, path: impl Into<PathBuf>) {
        self.search_paths.push(path.into());
    }

    /// Pre-seed the grid cache with an already-built grid.
    pub fn insert_grid(&mut self, name: &str, grid: Grid) {
        self.grids.insert(name.to_string(), Arc::new(grid));
    }

    /// Pre-seed the catalog cache.
    pub fn insert_catalog(&mut self, catalog: Catalog) {
        self.catalogs
            .insert(catalog.name.clone(), Arc::new(catalog));
    }

    fn resolve(&self, name: &str) -> Option<PathBuf> {
        let direct = Path::new(name);
        if direct.is_file() {
            return Some(direct.to_path_buf());
        }
        self.search_paths
            .iter()
            .map(|p| p.join(name))
            .find(|p| p.is_file())
    }

    /// Load a grid by file name, or return the cached copy.
    pub fn grid(&mut self, name: &str) -> Result<Arc<Grid>, GridError> {
        if let Some(g) = self.grids.get(name) {
            return Ok(g.clone());
        }
        let path = self
            .resolve(name)
            .ok_or_else(|| GridError::NotFound(name.to_string()))?;
        let data = fs::read(&path)?;
        let grid = Arc::new(loader::load(name, &data)?);
        self.grids.insert(name.to_string(), grid.clone());
        Ok(grid)
    }

    /// Resolve a comma-separated grid list into loaded grids.
    ///
    /// A leading `@` marks a name as optional: its load failure is tolerated.
    /// An empty resolved list is the fatal "no usable grid" condition.
    pub fn grid_list(&mut self, list: &str) -> Result<Vec<Arc<Grid>>, TransformError> {
        let mut out = Vec::new();
        for token in list.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let (optional, name) = match token.strip_prefix('@') {
                Some(rest) => (true, rest),
                None => (false, token),
            };
            match self.grid(name) {
                Ok(g) => out.push(g),
                Err(e) if optional => {
                    debug!("skipping optional grid {name}: {e}");
                }
                Err(e) => return Err(e.into()),
            }
        }
        if out.is_empty() {
            return Err(TransformError::NoUsableGrid);
        }
        Ok(out)
    }

    /// Load a catalog by file name, or return the cached copy.
    pub fn catalog(&mut self, name: &str) -> Result<Arc<Catalog>, GridError> {
        if let Some(c) = self.catalogs.get(name) {
            return Ok(c.clone());
        }
        let path = self
            .resolve(name)
            .ok_or_else(|| GridError::NotFound(name.to_string()))?;
        let file = fs::File::open(&path)?;
        let catalog = Arc::new(Catalog::parse(name, file)?);
        self.catalogs.insert(name.to_string(), catalog.clone());
        Ok(catalog)
    }
}
