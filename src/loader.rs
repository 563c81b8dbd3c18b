//! Loading of compiled behaviours. The generated sources are built into a shared library
//! by the user's C++ tool chain; the entry points are then looked up by name.

use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};
use tracing::debug;

use crate::behaviour::ModellingHypothesis;

/// `{Class}_{interface}_{HYPOTHESIS}`, the name of the `extern "C"` function generated
/// for one interface and one modelling hypothesis
pub fn entry_point_symbol(class: &str, interface: &str, hypothesis: ModellingHypothesis) -> String {
    format!("{}_{}_{}", class, interface, hypothesis.upper_name())
}

/// Signature of the entry points generated for the `generic` interface: stress, internal
/// state variables and tangent operator (written), then strain, strain increment,
/// material properties, external state variables and their increments, time increment
/// and the tangent request. Returns 0 on success, -1 on divergence, -2 when out of
/// bounds.
pub type GenericEntryPoint = unsafe extern "C" fn(
    *mut f64,
    *mut f64,
    *mut f64,
    *const f64,
    *const f64,
    *const f64,
    *const f64,
    *const f64,
    *const f64,
    *const i32,
) -> i32;

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("cannot load library '{path}': {source}")]
    Load {
        path: PathBuf,
        source: libloading::Error,
    },
    #[error("symbol '{symbol}' not found in '{path}': {source}")]
    Symbol {
        symbol: String,
        path: PathBuf,
        source: libloading::Error,
    },
}

/// A shared library holding compiled behaviours.
pub struct BehaviourLibrary {
    path: PathBuf,
    library: Library,
}

impl BehaviourLibrary {
    /// # Safety
    ///
    /// Loading a library runs its initialisation routines, which must be sound. The
    /// libraries compiled from the generated sources have none.
    pub unsafe fn load(path: impl AsRef<Path>) -> Result<Self, LoaderError> {
        let path = path.as_ref().to_path_buf();
        let library = unsafe { Library::new(&path) }.map_err(|source| LoaderError::Load {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "behaviour library loaded");
        Ok(Self { path, library })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// looks up the entry point `symbol`, which must have the signature `T`
    ///
    /// # Safety
    ///
    /// `T` must be the type of the function exported under `symbol`. The returned symbol
    /// borrows the library, which therefore outlives every call.
    pub unsafe fn entry_point<T>(&self, symbol: &str) -> Result<Symbol<'_, T>, LoaderError> {
        unsafe { self.library.get(symbol.as_bytes()) }.map_err(|source| LoaderError::Symbol {
            symbol: symbol.to_string(),
            path: self.path.clone(),
            source,
        })
    }

    /// the entry point of `class` compiled for the `generic` interface
    ///
    /// # Safety
    ///
    /// The library must have been built from sources generated for the `generic`
    /// interface.
    pub unsafe fn generic_entry_point(
        &self,
        class: &str,
        hypothesis: ModellingHypothesis,
    ) -> Result<Symbol<'_, GenericEntryPoint>, LoaderError> {
        let symbol = entry_point_symbol(class, "generic", hypothesis);
        unsafe { self.entry_point::<GenericEntryPoint>(&symbol) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_names() {
        assert_eq!(
            entry_point_symbol("Steel_Norton", "umat", ModellingHypothesis::PlaneStrain),
            "Steel_Norton_umat_PLANESTRAIN"
        );
        assert_eq!(
            entry_point_symbol("Norton", "generic", ModellingHypothesis::Tridimensional),
            "Norton_generic_TRIDIMENSIONAL"
        );
    }

    #[test]
    fn missing_library() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("libmissing.so");
        let err = unsafe { BehaviourLibrary::load(&path) }.err().unwrap();
        assert!(err.to_string().contains("cannot load library"));
    }
}
