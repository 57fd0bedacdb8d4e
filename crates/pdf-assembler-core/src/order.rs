//! Merge order resolution.
//!
//! Clients send the full list of files they know about plus an ordering of
//! ids. The ordering is authoritative: it decides both which files are merged
//! and in what order.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A client-supplied reference to a stored document.
///
/// `filename` and `path` are echoed back from the upload response; only `id`
/// is used to locate the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, alias = "storageRef", skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl DocumentRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            filename: None,
            path: None,
        }
    }

    /// Name to use in messages: the filename if known, else the id.
    pub fn display_name(&self) -> &str {
        self.filename.as_deref().unwrap_or(&self.id)
    }
}

/// Produce the files to merge, in merge order.
///
/// - With an `order`, each id maps to the first file carrying it; ids with no
///   matching file are dropped, files not named in `order` are left out, and
///   an id listed twice is merged twice.
/// - Without an `order`, the file list is used as given.
pub fn resolve_order<'a>(files: &'a [DocumentRef], order: Option<&[String]>) -> Vec<&'a DocumentRef> {
    let Some(order) = order else {
        return files.iter().collect();
    };

    let resolved: Vec<&DocumentRef> = order
        .iter()
        .filter_map(|id| {
            let found = files.iter().find(|file| &file.id == id);
            if found.is_none() {
                warn!("Dropping unknown id {} from merge order", id);
            }
            found
        })
        .collect();

    debug!(
        "Resolved merge order: {} of {} ids matched, {} files supplied",
        resolved.len(),
        order.len(),
        files.len()
    );

    resolved
}
