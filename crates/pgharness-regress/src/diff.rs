//! Unified diffs between expected and actual output.

use std::fmt::Write;

use prettydiff::basic::DiffOp;
use prettydiff::diff_slice;

use crate::normalize::normalize_lines;

/// Context lines around each change unless configured otherwise.
pub const DEFAULT_CONTEXT_LINES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edit<'a> {
    Keep(&'a str),
    Delete(&'a str),
    Insert(&'a str),
}

impl Edit<'_> {
    fn in_old(&self) -> bool {
        !matches!(self, Edit::Insert(_))
    }

    fn in_new(&self) -> bool {
        !matches!(self, Edit::Delete(_))
    }
}

/// Normalizes both texts and diffs them.
///
/// Returns `None` when the normalized texts are identical.
///
/// # Example
/// ```
/// use pgharness_regress::diff::diff_outputs;
///
/// assert!(diff_outputs("SELECT 1;\r\n", "SELECT 1;\n\n", 3).is_none());
/// let diff = diff_outputs("a\nb\n", "a\nc\n", 3).unwrap();
/// assert!(diff.contains("-b\n+c\n"));
/// ```
pub fn diff_outputs(expected: &str, actual: &str, context: usize) -> Option<String> {
    unified_diff(&normalize_lines(expected), &normalize_lines(actual), context)
}

/// Unified diff of two line sequences with `context` lines around changes.
///
/// The header is `--- expected` / `+++ actual`; hunks use
/// `@@ -start,count +start,count @@`. Returns `None` if there is no change.
pub fn unified_diff(expected: &[&str], actual: &[&str], context: usize) -> Option<String> {
    let edits = edit_script(expected, actual);
    let changed: Vec<usize> = edits
        .iter()
        .enumerate()
        .filter(|(_, e)| !matches!(e, Edit::Keep(_)))
        .map(|(i, _)| i)
        .collect();
    if changed.is_empty() {
        return None;
    }

    // Line counts before each edit index, for hunk headers.
    let mut old_before = Vec::with_capacity(edits.len() + 1);
    let mut new_before = Vec::with_capacity(edits.len() + 1);
    let (mut old, mut new) = (0usize, 0usize);
    for edit in &edits {
        old_before.push(old);
        new_before.push(new);
        old += usize::from(edit.in_old());
        new += usize::from(edit.in_new());
    }
    old_before.push(old);
    new_before.push(new);

    let mut out = String::from("--- expected\n+++ actual\n");
    for (first, last) in group_changes(&changed, context) {
        let lo = first.saturating_sub(context);
        let hi = (last + context + 1).min(edits.len());
        let old_count = old_before[hi] - old_before[lo];
        let new_count = new_before[hi] - new_before[lo];
        let _ = writeln!(
            out,
            "@@ -{},{} +{},{} @@",
            hunk_start(old_before[lo], old_count),
            old_count,
            hunk_start(new_before[lo], new_count),
            new_count
        );
        for edit in &edits[lo..hi] {
            let (sign, line) = match edit {
                Edit::Keep(l) => (' ', l),
                Edit::Delete(l) => ('-', l),
                Edit::Insert(l) => ('+', l),
            };
            out.push(sign);
            out.push_str(line);
            out.push('\n');
        }
    }
    Some(out)
}

/// Flattens the changeset into per-line edits. Within each run of changes,
/// deletions come before insertions.
fn edit_script<'a>(expected: &'a [&'a str], actual: &'a [&'a str]) -> Vec<Edit<'a>> {
    let changeset = diff_slice(expected, actual);
    let mut edits = Vec::with_capacity(expected.len().max(actual.len()));
    let mut deleted: Vec<&'a str> = Vec::new();
    let mut inserted: Vec<&'a str> = Vec::new();

    for op in changeset.diff {
        match op {
            DiffOp::Equal(lines) => {
                edits.extend(deleted.drain(..).map(Edit::Delete));
                edits.extend(inserted.drain(..).map(Edit::Insert));
                edits.extend(lines.iter().copied().map(Edit::Keep));
            }
            DiffOp::Remove(lines) => deleted.extend(lines.iter().copied()),
            DiffOp::Insert(lines) => inserted.extend(lines.iter().copied()),
            DiffOp::Replace(old, new) => {
                deleted.extend(old.iter().copied());
                inserted.extend(new.iter().copied());
            }
        }
    }
    edits.extend(deleted.drain(..).map(Edit::Delete));
    edits.extend(inserted.drain(..).map(Edit::Insert));
    edits
}

/// Merges change indices into hunks; changes separated by at most
/// `2 * context` unchanged lines share a hunk.
fn group_changes(changed: &[usize], context: usize) -> Vec<(usize, usize)> {
    let mut groups: Vec<(usize, usize)> = Vec::new();
    for &index in changed {
        match groups.last_mut() {
            Some((_, last)) if index - *last - 1 <= 2 * context => *last = index,
            _ => groups.push((index, index)),
        }
    }
    groups
}

// An empty range is addressed by the line before it.
fn hunk_start(lines_before: usize, count: usize) -> usize {
    if count == 0 {
        lines_before
    } else {
        lines_before + 1
    }
}
