//! A single source file: language detection, parsing, whitespace profiling

use crate::languages::LanguageKind;
use thiserror::Error;
use tree_sitter::{Parser, Tree};

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("unknown extension: {0}")]
    UnknownExtension(String),
    #[error("failed to parse {0}")]
    Parse(String),
    #[error("{0} is not valid UTF-8")]
    NonUtf8(String),
}

/// Indentation character a file uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndentChar {
    Space,
    Tab,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

/// Detected whitespace conventions of one file, used when splicing edits
/// back into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WhitespaceProfile {
    pub indent_char: IndentChar,
    /// Number of spaces per level, or 1 for tabs.
    pub indent_size: usize,
    pub line_ending: LineEnding,
}

impl Default for WhitespaceProfile {
    fn default() -> Self {
        WhitespaceProfile {
            indent_char: IndentChar::Space,
            indent_size: 4,
            line_ending: LineEnding::Lf,
        }
    }
}

/// One source file awaiting analysis.
pub struct SourceFile {
    pub file_name: String,
    pub contents: String,
    pub lang: LanguageKind,
}

impl SourceFile {
    pub fn new(file_name: impl Into<String>, contents: impl Into<String>) -> Result<Self, AnalyzerError> {
        let file_name = file_name.into();
        let lang = LanguageKind::from_file_name(&file_name)
            .ok_or_else(|| AnalyzerError::UnknownExtension(file_name.clone()))?;
        Ok(SourceFile {
            file_name,
            contents: contents.into(),
            lang,
        })
    }

    /// Parse into a tree-sitter tree. `Ok(None)` for languages without a
    /// grammar (they index through the chunking path).
    pub fn parse(&self) -> Result<Option<Tree>, AnalyzerError> {
        let Some(rules) = self.lang.rules() else {
            return Ok(None);
        };
        let mut parser = Parser::new();
        parser
            .set_language(&rules.grammar())
            .map_err(|_| AnalyzerError::Parse(self.file_name.clone()))?;
        parser
            .parse(&self.contents, None)
            .map(Some)
            .ok_or_else(|| AnalyzerError::Parse(self.file_name.clone()))
    }

    /// Detect the whitespace conventions in use. Indent sizes seen fewer
    /// than 5 times are treated as noise.
    pub fn whitespace_profile(&self) -> WhitespaceProfile {
        let mut profile = WhitespaceProfile::default();
        if self.contents.is_empty() {
            return profile;
        }

        if let Some(first) = self.contents.split_inclusive('\n').next() {
            if first.ends_with("\r\n") {
                profile.line_ending = LineEnding::CrLf;
            }
        }

        let mut space_indents = 0usize;
        let mut tab_indents = 0usize;
        let mut space_sizes: std::collections::BTreeMap<usize, usize> = Default::default();

        for line in self.contents.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let leading_spaces = line.len() - line.trim_start_matches(' ').len();
            let leading_tabs = line.len() - line.trim_start_matches('\t').len();
            if leading_spaces > 0 {
                space_indents += 1;
                *space_sizes.entry(leading_spaces).or_insert(0) += 1;
            }
            if leading_tabs > 0 {
                tab_indents += 1;
            }
        }

        if tab_indents > space_indents {
            profile.indent_char = IndentChar::Tab;
            profile.indent_size = 1;
        } else if let Some((&size, _)) = space_sizes.iter().find(|&(_, &count)| count >= 5) {
            profile.indent_size = size;
        }

        profile
    }

    /// Re-indent a block of lines to this file's conventions, preserving
    /// internal spacing and blank lines.
    pub fn normalize_whitespace(&self, lines: &[String], profile: &WhitespaceProfile) -> Vec<String> {
        let mut normalized = Vec::with_capacity(lines.len());
        for line in lines {
            if line.trim().is_empty() {
                normalized.push(line.clone());
                continue;
            }

            let leading = line.len() - line.trim_start_matches(['\t', ' ']).len();
            let level = match profile.indent_char {
                IndentChar::Space => leading / profile.indent_size.max(1),
                IndentChar::Tab => leading,
            };

            let content = line.trim_start_matches(['\t', ' ']);
            let indentation = match profile.indent_char {
                IndentChar::Tab => "\t".repeat(level),
                IndentChar::Space => " ".repeat(profile.indent_size * level),
            };
            normalized.push(format!("{indentation}{content}"));
        }
        normalized
    }
}
