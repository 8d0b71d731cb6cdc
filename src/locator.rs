//! Library Locator
//!
//! Walks the candidate sequence and keeps the first library that loads.
//! A candidate that fails to load is an expected part of the search, so
//! failures are only logged at debug level and reported together if nothing
//! loads at all.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{LibraryNotFoundError, SearchAttempt};
use crate::lifecycle::LoadedLibrary;
use crate::loader::DynamicLoader;
use crate::search::CandidatePath;

/// Load the first candidate that the loader accepts.
///
/// No candidate after the first success is attempted. On total failure the
/// error lists every candidate in order along with the loader's reason.
pub fn locate(
    library: &str,
    candidates: &[CandidatePath],
    loader: Arc<dyn DynamicLoader>,
) -> Result<LoadedLibrary, LibraryNotFoundError> {
    let mut searched = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        let path = candidate.path();
        match loader.load_library(&path) {
            Ok(handle) => {
                info!(
                    library,
                    path = %path.display(),
                    tier = %candidate.tier,
                    attempts = searched.len() + 1,
                    "native library loaded"
                );
                return Ok(LoadedLibrary::new(path, handle, loader));
            }
            Err(err) => {
                debug!(library, path = %path.display(), reason = %err.reason, "candidate rejected");
                searched.push(SearchAttempt {
                    path,
                    reason: err.reason,
                });
            }
        }
    }

    Err(LibraryNotFoundError {
        library: library.to_string(),
        searched,
    })
}
