//! Work item sources: a single item, an explicit list, or a file with one
//! item per line.

use crate::error::{Error, Result};
use crate::types::WorkItem;
use std::path::{Path, PathBuf};

/// Where the work items of a run come from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ItemSource {
    /// Exactly one item
    Single(String),
    /// Items given directly
    List(Vec<String>),
    /// Text file, one item per line
    File(PathBuf),
}

impl ItemSource {
    /// Pick the source from mutually exclusive selections
    ///
    /// Exactly one of the three must be set.
    pub fn from_selection(
        single: Option<String>,
        list: Option<Vec<String>>,
        file: Option<PathBuf>,
    ) -> Result<Self> {
        match (single, list, file) {
            (Some(item), None, None) => Ok(ItemSource::Single(item)),
            (None, Some(items), None) => Ok(ItemSource::List(items)),
            (None, None, Some(path)) => Ok(ItemSource::File(path)),
            (None, None, None) => Err(Error::InvalidInput(
                "one of a single item, a list of items or an input file is required".into(),
            )),
            _ => Err(Error::InvalidInput(
                "single item, item list and input file are mutually exclusive".into(),
            )),
        }
    }

    /// Read the items in source order
    pub fn load(&self) -> Result<Vec<WorkItem>> {
        match self {
            ItemSource::Single(item) => Ok(vec![WorkItem::new(item.clone())]),
            ItemSource::List(items) => Ok(items.iter().cloned().map(WorkItem::from).collect()),
            ItemSource::File(path) => read_item_file(path),
        }
    }
}

fn read_item_file(path: &Path) -> Result<Vec<WorkItem>> {
    if !path.is_file() {
        return Err(Error::InputFileNotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    Ok(parse_lines(&content))
}

/// Trim every line and drop the blank ones
pub fn parse_lines(content: &str) -> Vec<WorkItem> {
    content
        .lines()
        .map(str::trim)
        // Blank lines never become empty work items
        .filter(|line| !line.is_empty())
        .map(WorkItem::from)
        .collect()
}
