//! Layer descriptors.

use std::fmt;

use chrono::{DateTime, Utc};
use humansize::{BINARY, format_size};
use serde::{Deserialize, Serialize};

const SHELL_PREFIX: &str = "/bin/sh -c ";
const SHORT_ID_LEN: usize = 12;

/// Placeholder command for layers without history.
pub const MISSING_COMMAND: &str = "(missing)";

/// Strip the shell wrapper the builder puts around `RUN` commands.
pub fn strip_shell_prefix(command: &str) -> &str {
    command.strip_prefix(SHELL_PREFIX).unwrap_or(command)
}

/// Descriptive metadata of one layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    /// Position in the image, oldest first.
    pub index: usize,
    /// Content digest.
    pub digest: String,
    /// Command that produced the layer.
    pub command: String,
    /// Creation time, when the image records one.
    pub created: Option<DateTime<Utc>>,
    /// Aggregate byte size of the layer's entries.
    pub size: u64,
    /// Name of the layer tree.
    pub tree_name: String,
}

impl Layer {
    /// Digest without its algorithm prefix, cut to twelve characters.
    pub fn short_id(&self) -> &str {
        let id = self
            .digest
            .split_once(':')
            .map_or(self.digest.as_str(), |(_, hex)| hex);
        match id.char_indices().nth(SHORT_ID_LEN) {
            Some((end, _)) => &id[..end],
            None => id,
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>10}  {}", format_size(self.size, BINARY), self.command)
    }
}
