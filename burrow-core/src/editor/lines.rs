//! Row-addressed edits over an in-memory line sequence

use crate::error::{BurrowError, Result};
use serde::{Deserialize, Serialize};

/// Which rows an edit applies to.
///
/// A row set takes precedence over a single row; with neither the edit
/// covers the whole file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RowTarget {
    /// No address given
    All,
    /// A single 0-based row
    Row(i64),
    /// A set of 0-based rows, in caller order
    Rows(Vec<i64>),
}

impl RowTarget {
    /// Build a target from the optional `row` / `rows` tool arguments
    pub fn from_args(row: Option<i64>, rows: Option<Vec<i64>>) -> Self {
        match (rows, row) {
            (Some(rows), _) => RowTarget::Rows(rows),
            (None, Some(row)) => RowTarget::Row(row),
            (None, None) => RowTarget::All,
        }
    }
}

/// Whether an edit changed anything
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditOutcome {
    /// At least one row was touched
    Modified,
    /// Nothing matched; the file was left alone
    Unchanged,
}

impl EditOutcome {
    /// True for [`EditOutcome::Modified`]
    pub fn is_modified(&self) -> bool {
        matches!(self, EditOutcome::Modified)
    }

    fn from_flag(modified: bool) -> Self {
        if modified {
            EditOutcome::Modified
        } else {
            EditOutcome::Unchanged
        }
    }
}

/// A file held as lines, each carrying its own `\n` terminator.
///
/// Only the last line may lack a terminator, and only until
/// [`LineBuffer::terminate_all`] is called.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineBuffer {
    lines: Vec<String>,
}

impl LineBuffer {
    /// Split text into lines. `\r\n` and lone `\r` are read as `\n`.
    pub fn parse(text: &str) -> Self {
        let text = normalize_newlines(text);
        Self {
            lines: text.split_inclusive('\n').map(str::to_string).collect(),
        }
    }

    /// Wrap already-split lines
    pub fn from_lines(lines: Vec<String>) -> Self {
        Self { lines }
    }

    /// Number of lines
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// True if the buffer holds no lines
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The lines, terminators included
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Concatenate the lines back into file text
    pub fn to_text(&self) -> String {
        self.lines.concat()
    }

    /// Give every line a trailing `\n`
    pub fn terminate_all(&mut self) {
        for line in &mut self.lines {
            terminate(line);
        }
    }

    fn index(&self, row: i64) -> Option<usize> {
        usize::try_from(row).ok().filter(|&r| r < self.lines.len())
    }

    fn pad_to(&mut self, row: usize) {
        if row > self.lines.len() {
            self.lines.resize(row, "\n".to_string());
        }
    }

    fn splice_at(&mut self, row: usize, content: &[String]) {
        self.pad_to(row);
        self.lines.splice(row..row, content.iter().cloned());
    }

    /// Insert `content` before the addressed row(s), or append with no address.
    ///
    /// Rows past the end are padded with blank lines first and negative rows
    /// are skipped. A row set is processed in descending order so earlier
    /// insertions never shift rows still waiting to be handled.
    pub fn insert(&mut self, target: &RowTarget, content: &str) -> Result<EditOutcome> {
        self.terminate_all();

        let mut content = normalize_newlines(content).into_owned();
        if !content.is_empty() {
            terminate(&mut content);
        }
        let content_lines: Vec<String> =
            content.split_inclusive('\n').map(str::to_string).collect();

        let modified = match target {
            RowTarget::All => {
                self.lines.extend(content_lines);
                true
            }
            RowTarget::Row(row) => match usize::try_from(*row) {
                Ok(row) => {
                    self.splice_at(row, &content_lines);
                    true
                }
                Err(_) => false,
            },
            RowTarget::Rows(rows) => {
                let mut rows: Vec<usize> =
                    rows.iter().filter_map(|r| usize::try_from(*r).ok()).collect();
                rows.sort_unstable_by(|a, b| b.cmp(a));
                for row in &rows {
                    self.splice_at(*row, &content_lines);
                }
                !rows.is_empty()
            }
        };

        Ok(EditOutcome::from_flag(modified))
    }

    /// Delete rows, or with `substring` strip that text from the addressed rows.
    ///
    /// Stripped rows stay in place even when left empty. Whole-row deletion
    /// ignores duplicate and out-of-range indices; a missing address clears
    /// the file.
    pub fn delete(&mut self, target: &RowTarget, substring: Option<&str>) -> Result<EditOutcome> {
        if let Some(substring) = substring {
            return self.rewrite_matching(target, substring, "");
        }

        let modified = match target {
            RowTarget::All => {
                self.lines.clear();
                true
            }
            RowTarget::Row(row) => match self.index(*row) {
                Some(idx) => {
                    self.lines.remove(idx);
                    true
                }
                None => false,
            },
            RowTarget::Rows(rows) => {
                let mut indices: Vec<usize> =
                    rows.iter().filter_map(|r| self.index(*r)).collect();
                indices.sort_unstable_by(|a, b| b.cmp(a));
                indices.dedup();
                for idx in &indices {
                    self.lines.remove(*idx);
                }
                !indices.is_empty()
            }
        };

        Ok(EditOutcome::from_flag(modified))
    }

    /// Overwrite rows with `content`, or with `substring` replace every
    /// occurrence of it inside the addressed rows.
    ///
    /// Every listed row gets the same content. With no address the file
    /// becomes a single line holding `content`.
    pub fn update(
        &mut self,
        target: &RowTarget,
        content: &str,
        substring: Option<&str>,
    ) -> Result<EditOutcome> {
        if let Some(substring) = substring {
            return self.rewrite_matching(target, substring, content);
        }

        let mut replacement = normalize_newlines(content).into_owned();
        terminate(&mut replacement);

        let modified = match target {
            RowTarget::All => {
                self.lines = vec![replacement];
                true
            }
            RowTarget::Row(row) => match self.index(*row) {
                Some(idx) => {
                    self.lines[idx] = replacement;
                    true
                }
                None => false,
            },
            RowTarget::Rows(rows) => {
                let mut modified = false;
                for row in rows {
                    if let Some(idx) = self.index(*row) {
                        self.lines[idx] = replacement.clone();
                        modified = true;
                    }
                }
                modified
            }
        };

        Ok(EditOutcome::from_flag(modified))
    }

    fn rewrite_matching(
        &mut self,
        target: &RowTarget,
        substring: &str,
        replacement: &str,
    ) -> Result<EditOutcome> {
        if substring.is_empty() {
            return Err(BurrowError::InvalidArgument(
                "substring must not be empty".to_string(),
            ));
        }

        let rows: Vec<i64> = match target {
            RowTarget::All => (0..self.lines.len() as i64).collect(),
            RowTarget::Row(row) => vec![*row],
            RowTarget::Rows(rows) => rows.clone(),
        };

        let mut modified = false;
        for row in rows {
            let Some(idx) = self.index(row) else {
                continue;
            };
            let line = &mut self.lines[idx];
            if line.contains(substring) {
                *line = line.replace(substring, replacement);
                terminate(line);
                modified = true;
            }
        }

        Ok(EditOutcome::from_flag(modified))
    }
}

fn terminate(line: &mut String) {
    if !line.ends_with('\n') {
        line.push('\n');
    }
}

fn normalize_newlines(text: &str) -> std::borrow::Cow<'_, str> {
    if text.contains('\r') {
        std::borrow::Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        std::borrow::Cow::Borrowed(text)
    }
}
