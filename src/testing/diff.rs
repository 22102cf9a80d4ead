//! Whitespace-insensitive line diff
//!
//! Lines are compared after removing every whitespace character, the same
//! rule as `diff -w`. Lines that are blank after that are ignored, so blank
//! lines, line endings and a missing final newline never cause a mismatch.
//! Differences are printed in classic `diff` normal format using the
//! original line numbers and text:
//!
//! ```text
//! 3c3
//! < {"responses": [1]}
//! ---
//! > {"responses": [2]}
//! ```

use std::fmt::Write;

/// Above this many LCS cells the differing middle is reported as one change
const MAX_LCS_CELLS: usize = 4_000_000;

/// A line that takes part in the comparison
#[derive(Debug)]
struct Line<'a> {
    /// 1-based number in the original text
    number: usize,
    text: &'a str,
    key: String,
}

fn significant_lines(text: &str) -> Vec<Line<'_>> {
    text.lines()
        .enumerate()
        .filter_map(|(i, raw)| {
            let key: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
            (!key.is_empty()).then(|| Line {
                number: i + 1,
                text: raw.trim_end_matches('\r'),
                key,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Equal,
    Delete,
    Insert,
}

/// Diff `expected` against `actual`; empty when they are equivalent
pub fn diff_ignoring_whitespace(expected: &str, actual: &str) -> String {
    let a = significant_lines(expected);
    let b = significant_lines(actual);
    let ops = edit_script(&a, &b);
    render(&a, &b, &ops)
}

fn edit_script(a: &[Line<'_>], b: &[Line<'_>]) -> Vec<Op> {
    let prefix = a
        .iter()
        .zip(b)
        .take_while(|(x, y)| x.key == y.key)
        .count();
    let suffix = a[prefix..]
        .iter()
        .rev()
        .zip(b[prefix..].iter().rev())
        .take_while(|(x, y)| x.key == y.key)
        .count();

    let mid_a = &a[prefix..a.len() - suffix];
    let mid_b = &b[prefix..b.len() - suffix];

    let mut ops = vec![Op::Equal; prefix];
    if mid_a.len().saturating_mul(mid_b.len()) > MAX_LCS_CELLS {
        tracing::debug!(
            expected = mid_a.len(),
            actual = mid_b.len(),
            "outputs differ too much for a line-level diff"
        );
        ops.extend(std::iter::repeat(Op::Delete).take(mid_a.len()));
        ops.extend(std::iter::repeat(Op::Insert).take(mid_b.len()));
    } else {
        ops.extend(lcs_ops(mid_a, mid_b));
    }
    ops.extend(std::iter::repeat(Op::Equal).take(suffix));
    ops
}

/// Longest-common-subsequence edit script, deletions before insertions
fn lcs_ops(a: &[Line<'_>], b: &[Line<'_>]) -> Vec<Op> {
    let (n, m) = (a.len(), b.len());
    let width = m + 1;
    // table[i * width + j] = LCS length of a[i..] and b[j..]
    let mut table = vec![0u32; (n + 1) * width];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[i * width + j] = if a[i].key == b[j].key {
                table[(i + 1) * width + j + 1] + 1
            } else {
                table[(i + 1) * width + j].max(table[i * width + j + 1])
            };
        }
    }

    let mut ops = Vec::with_capacity(n + m);
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i].key == b[j].key {
            ops.push(Op::Equal);
            i += 1;
            j += 1;
        } else if table[(i + 1) * width + j] >= table[i * width + j + 1] {
            ops.push(Op::Delete);
            i += 1;
        } else {
            ops.push(Op::Insert);
            j += 1;
        }
    }
    ops.extend(std::iter::repeat(Op::Delete).take(n - i));
    ops.extend(std::iter::repeat(Op::Insert).take(m - j));
    ops
}

/// Format a range of original line numbers as `diff` does: `7` or `7,9`
fn range(lines: &[Line<'_>]) -> String {
    match (lines.first(), lines.last()) {
        (Some(first), Some(last)) if first.number != last.number => {
            format!("{},{}", first.number, last.number)
        }
        (Some(first), _) => first.number.to_string(),
        _ => String::new(),
    }
}

fn render(a: &[Line<'_>], b: &[Line<'_>], ops: &[Op]) -> String {
    let mut out = String::new();
    let (mut i, mut j) = (0, 0);
    let mut k = 0;

    while k < ops.len() {
        if ops[k] == Op::Equal {
            i += 1;
            j += 1;
            k += 1;
            continue;
        }

        let (start_i, start_j) = (i, j);
        while k < ops.len() && ops[k] != Op::Equal {
            match ops[k] {
                Op::Delete => i += 1,
                Op::Insert => j += 1,
                Op::Equal => unreachable!(),
            }
            k += 1;
        }

        let deleted = &a[start_i..i];
        let inserted = &b[start_j..j];
        // Line number preceding a pure insertion or deletion, 0 at the top
        let before_a = start_i.checked_sub(1).map_or(0, |p| a[p].number);
        let before_b = start_j.checked_sub(1).map_or(0, |p| b[p].number);

        let _ = match (deleted.is_empty(), inserted.is_empty()) {
            (false, false) => writeln!(out, "{}c{}", range(deleted), range(inserted)),
            (false, true) => writeln!(out, "{}d{}", range(deleted), before_b),
            (true, false) => writeln!(out, "{}a{}", before_a, range(inserted)),
            (true, true) => continue,
        };

        for line in deleted {
            let _ = writeln!(out, "< {}", line.text);
        }
        if !deleted.is_empty() && !inserted.is_empty() {
            out.push_str("---\n");
        }
        for line in inserted {
            let _ = writeln!(out, "> {}", line.text);
        }
    }

    out
}
