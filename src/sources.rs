use crate::concrete::SourceId;
use codespan_reporting::files::{self, Files};
use std::collections::HashMap;
use std::ops::Range;

struct SourceFile {
    name: String,
    source: String,
    line_starts: Vec<usize>,
}

/// A collection of source files for error reporting.
/// Maps SourceId to a named source for multi-file diagnostics.
#[derive(Default)]
pub struct FileSources {
    files: HashMap<SourceId, SourceFile>,
}

impl FileSources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file with a specific SourceId.
    pub fn add(&mut self, id: SourceId, name: impl Into<String>, source: impl Into<String>) {
        let source = source.into();
        let line_starts = files::line_starts(&source).collect();
        self.files.insert(
            id,
            SourceFile {
                name: name.into(),
                source,
                line_starts,
            },
        );
    }

    /// Create a FileSources with a single file using SYNTHETIC SourceId.
    pub fn single(name: impl Into<String>, source: impl Into<String>) -> Self {
        let mut files = Self::new();
        files.add(SourceId::SYNTHETIC, name, source);
        files
    }

    pub fn contains(&self, id: SourceId) -> bool {
        self.files.contains_key(&id)
    }

    fn get(&self, id: SourceId) -> Result<&SourceFile, files::Error> {
        self.files.get(&id).ok_or(files::Error::FileMissing)
    }

    fn line_start(&self, id: SourceId, line_index: usize) -> Result<usize, files::Error> {
        let file = self.get(id)?;
        match line_index.cmp(&file.line_starts.len()) {
            std::cmp::Ordering::Less => Ok(file.line_starts[line_index]),
            std::cmp::Ordering::Equal => Ok(file.source.len()),
            std::cmp::Ordering::Greater => Err(files::Error::LineTooLarge {
                given: line_index,
                max: file.line_starts.len() - 1,
            }),
        }
    }
}

impl<'a> Files<'a> for FileSources {
    type FileId = SourceId;
    type Name = &'a str;
    type Source = &'a str;

    fn name(&'a self, id: Self::FileId) -> Result<Self::Name, files::Error> {
        Ok(self.get(id)?.name.as_str())
    }

    fn source(&'a self, id: Self::FileId) -> Result<Self::Source, files::Error> {
        Ok(self.get(id)?.source.as_str())
    }

    fn line_index(&'a self, id: Self::FileId, byte_index: usize) -> Result<usize, files::Error> {
        let file = self.get(id)?;
        if byte_index > file.source.len() {
            return Err(files::Error::IndexTooLarge {
                given: byte_index,
                max: file.source.len(),
            });
        }
        Ok(file
            .line_starts
            .binary_search(&byte_index)
            .unwrap_or_else(|next| next - 1))
    }

    fn line_range(
        &'a self,
        id: Self::FileId,
        line_index: usize,
    ) -> Result<Range<usize>, files::Error> {
        let start = self.line_start(id, line_index)?;
        let end = self.line_start(id, line_index + 1)?;
        Ok(start..end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines() {
        let sources = FileSources::single("main.ard", "\\func f => g\n\\func g => f\n");
        let id = SourceId::SYNTHETIC;
        assert_eq!(sources.name(id).unwrap(), "main.ard");
        assert_eq!(sources.line_index(id, 0).unwrap(), 0);
        assert_eq!(sources.line_index(id, 13).unwrap(), 1);
        assert_eq!(sources.line_range(id, 1).unwrap(), 13..26);
        assert_eq!(sources.line_range(id, 2).unwrap(), 26..26);
        assert!(sources.line_range(id, 3).is_err());
    }

    #[test]
    fn test_missing_file() {
        let sources = FileSources::new();
        assert!(matches!(
            sources.source(SourceId(3)),
            Err(files::Error::FileMissing)
        ));
    }
}
