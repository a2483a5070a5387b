use std::path::Path;

use crate::{Error, Result};

const KEYWORD_MARKER: &str = "keyword=";

/// A command from the command list and its optional keyword filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationDescriptor {
    pub command: String,
    pub keyword: String,
}

/// One concrete request shape derived from an [`OperationDescriptor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: String,
    /// `0` means no paging parameters are sent.
    pub page: u32,
    pub page_size: u32,
    pub keyword: String,
}

impl OperationDescriptor {
    /// Paged (when `page != 0`), keyword-filtered (when a keyword is set) and unfiltered, in
    /// that order.
    pub fn invocations(&self, page: u32, page_size: u32) -> Vec<Invocation> {
        let mut out = Vec::with_capacity(3);
        if page != 0 {
            out.push(Invocation {
                command: self.command.clone(),
                page,
                page_size,
                keyword: String::new(),
            });
        }
        if !self.keyword.is_empty() {
            out.push(Invocation {
                command: self.command.clone(),
                page: 0,
                page_size: 0,
                keyword: self.keyword.clone(),
            });
        }
        out.push(Invocation {
            command: self.command.clone(),
            page: 0,
            page_size: 0,
            keyword: String::new(),
        });
        out
    }
}

/// One command per line with an optional trailing `keyword=<value>`; blank lines are skipped.
pub fn parse_commands(text: &str) -> Vec<OperationDescriptor> {
    text.lines()
        .filter_map(|raw| {
            let line = raw.trim();
            let (command, keyword) = match line.find(KEYWORD_MARKER) {
                Some(idx) => (
                    line[..idx].trim(),
                    line[idx + KEYWORD_MARKER.len()..].trim(),
                ),
                None => (line, ""),
            };
            (!command.is_empty()).then(|| OperationDescriptor {
                command: command.to_string(),
                keyword: keyword.to_string(),
            })
        })
        .collect()
}

pub fn load_commands(path: &Path) -> Result<Vec<OperationDescriptor>> {
    let text = std::fs::read_to_string(path).map_err(|source| Error::CommandList {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_commands(&text))
}
