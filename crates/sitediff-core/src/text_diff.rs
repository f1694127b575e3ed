//! Token-level text divergence
//!
//! Markup is split into word, whitespace and punctuation tokens and diffed
//! with a linear-space Myers algorithm. The divergence percent weights each
//! token by its length in chars:
//!
//! ```text
//! percent = (inserted + deleted) / (equal + inserted + deleted) * 100
//! ```

use std::ops::Range;

/// Kind of an edit-script run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffTag {
    /// Tokens shared by both sides
    Equal,
    /// Tokens only in the second text
    Insert,
    /// Tokens only in the first text
    Delete,
}

/// One run of the edit script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffOp {
    /// Run kind
    pub tag: DiffTag,
    /// Concatenated token text
    pub text: String,
}

impl DiffOp {
    /// Run length in chars
    #[inline]
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Token diff between two texts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDiff {
    ops: Vec<DiffOp>,
    equal_len: usize,
    changed_len: usize,
}

impl TextDiff {
    /// Diff two texts at token granularity
    #[must_use]
    pub fn compute(a: &str, b: &str) -> Self {
        if a == b {
            let ops = if a.is_empty() {
                Vec::new()
            } else {
                vec![DiffOp {
                    tag: DiffTag::Equal,
                    text: a.to_string(),
                }]
            };
            return Self {
                ops,
                equal_len: a.chars().count(),
                changed_len: 0,
            };
        }

        let old = tokenize(a);
        let new = tokenize(b);
        let mut builder = ScriptBuilder::default();
        Myers::new(&old, &new).run(&mut builder);
        builder.finish()
    }

    /// Edit script, adjacent runs of the same kind merged
    #[inline]
    #[must_use]
    pub fn ops(&self) -> &[DiffOp] {
        &self.ops
    }

    /// Total chars over all runs
    #[inline]
    #[must_use]
    pub fn total_len(&self) -> usize {
        self.equal_len + self.changed_len
    }

    /// Chars in inserted or deleted runs
    #[inline]
    #[must_use]
    pub fn changed_len(&self) -> usize {
        self.changed_len
    }

    /// Divergence percent in `[0, 100]`
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percent(&self) -> f64 {
        let total = self.total_len();
        if total == 0 {
            return 0.0;
        }
        self.changed_len as f64 / total as f64 * 100.0
    }

    /// Check if both texts were token-identical
    #[inline]
    #[must_use]
    pub fn is_identical(&self) -> bool {
        self.changed_len == 0
    }
}

/// Divergence percent between two texts
///
/// Identical inputs short-circuit to 0 without diffing.
#[must_use]
pub fn score_text(a: &str, b: &str) -> f64 {
    if a == b {
        return 0.0;
    }
    TextDiff::compute(a, b).percent()
}

/// Split text into word runs, whitespace runs and single punctuation chars
#[must_use]
pub fn tokenize(text: &str) -> Vec<&str> {
    #[derive(PartialEq, Clone, Copy)]
    enum Class {
        Word,
        Space,
        Punct,
    }

    fn classify(c: char) -> Class {
        if c.is_alphanumeric() || c == '_' {
            Class::Word
        } else if c.is_whitespace() {
            Class::Space
        } else {
            Class::Punct
        }
    }

    let mut tokens = Vec::new();
    let mut start = 0;
    let mut current: Option<Class> = None;

    for (idx, c) in text.char_indices() {
        let class = classify(c);
        let boundary = match current {
            None => false,
            Some(prev) => prev != class || class == Class::Punct,
        };
        if boundary {
            tokens.push(&text[start..idx]);
            start = idx;
        }
        current = Some(class);
    }
    if start < text.len() {
        tokens.push(&text[start..]);
    }
    tokens
}

/// Collects edit callbacks into merged runs
#[derive(Debug, Default)]
struct ScriptBuilder {
    ops: Vec<DiffOp>,
    equal_len: usize,
    changed_len: usize,
}

impl ScriptBuilder {
    fn push(&mut self, tag: DiffTag, tokens: &[&str]) {
        if tokens.is_empty() {
            return;
        }
        let len: usize = tokens.iter().map(|t| t.chars().count()).sum();
        match tag {
            DiffTag::Equal => self.equal_len += len,
            DiffTag::Insert | DiffTag::Delete => self.changed_len += len,
        }
        match self.ops.last_mut() {
            Some(last) if last.tag == tag => last.text.extend(tokens.iter().copied()),
            _ => self.ops.push(DiffOp {
                tag,
                text: tokens.concat(),
            }),
        }
    }

    fn finish(self) -> TextDiff {
        TextDiff {
            ops: self.ops,
            equal_len: self.equal_len,
            changed_len: self.changed_len,
        }
    }
}

/// Furthest-reaching x per diagonal, indexed by signed k
struct Frontier {
    offset: isize,
    v: Vec<usize>,
}

impl Frontier {
    fn new(max_d: usize) -> Self {
        Self {
            offset: isize::try_from(max_d).unwrap_or(isize::MAX),
            v: vec![0; 2 * max_d + 1],
        }
    }

    #[inline]
    #[allow(clippy::cast_sign_loss)]
    fn idx(&self, k: isize) -> usize {
        (k + self.offset) as usize
    }

    #[inline]
    fn get(&self, k: isize) -> usize {
        self.v[self.idx(k)]
    }

    #[inline]
    fn set(&mut self, k: isize, x: usize) {
        let i = self.idx(k);
        self.v[i] = x;
    }
}

fn max_d(n: usize, m: usize) -> usize {
    (n + m + 1) / 2 + 1
}

/// Linear-space Myers diff over token slices
struct Myers<'a, 'b> {
    old: &'a [&'b str],
    new: &'a [&'b str],
    forward: Frontier,
    backward: Frontier,
}

impl<'a, 'b> Myers<'a, 'b> {
    fn new(old: &'a [&'b str], new: &'a [&'b str]) -> Self {
        let d = max_d(old.len(), new.len());
        Self {
            old,
            new,
            forward: Frontier::new(d),
            backward: Frontier::new(d),
        }
    }

    fn run(&mut self, out: &mut ScriptBuilder) {
        self.conquer(0..self.old.len(), 0..self.new.len(), out);
    }

    fn common_prefix(&self, old: Range<usize>, new: Range<usize>) -> usize {
        self.old[old]
            .iter()
            .zip(&self.new[new])
            .take_while(|(a, b)| a == b)
            .count()
    }

    fn common_suffix(&self, old: Range<usize>, new: Range<usize>) -> usize {
        self.old[old]
            .iter()
            .rev()
            .zip(self.new[new].iter().rev())
            .take_while(|(a, b)| a == b)
            .count()
    }

    fn conquer(&mut self, mut old: Range<usize>, mut new: Range<usize>, out: &mut ScriptBuilder) {
        let prefix = self.common_prefix(old.clone(), new.clone());
        out.push(DiffTag::Equal, &self.old[old.start..old.start + prefix]);
        old.start += prefix;
        new.start += prefix;

        let suffix = self.common_suffix(old.clone(), new.clone());
        let suffix_start = old.end - suffix;
        old.end -= suffix;
        new.end -= suffix;

        if old.is_empty() {
            out.push(DiffTag::Insert, &self.new[new.clone()]);
        } else if new.is_empty() {
            out.push(DiffTag::Delete, &self.old[old.clone()]);
        } else if let Some((x, y)) = self.middle_snake(old.clone(), new.clone()) {
            self.conquer(old.start..x, new.start..y, out);
            self.conquer(x..old.end, y..new.end, out);
        } else {
            out.push(DiffTag::Delete, &self.old[old.clone()]);
            out.push(DiffTag::Insert, &self.new[new.clone()]);
        }

        out.push(DiffTag::Equal, &self.old[suffix_start..suffix_start + suffix]);
    }

    /// Find the split point of an optimal path through `old x new`
    ///
    /// Returns absolute `(x, y)` coordinates of the start of the middle snake.
    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    fn middle_snake(&mut self, old: Range<usize>, new: Range<usize>) -> Option<(usize, usize)> {
        let n = old.len();
        let m = new.len();
        let delta = n as isize - m as isize;
        let odd = delta & 1 == 1;
        self.forward.set(1, 0);
        self.backward.set(1, 0);

        let d_max = max_d(n, m) as isize;
        for d in 0..d_max {
            let mut k = d;
            while k >= -d {
                let mut x = if k == -d || (k != d && self.forward.get(k - 1) < self.forward.get(k + 1)) {
                    self.forward.get(k + 1)
                } else {
                    self.forward.get(k - 1) + 1
                };
                let y = (x as isize - k) as usize;
                let (x0, y0) = (x, y);
                if x < n && y < m {
                    x += self.common_prefix(old.start + x..old.end, new.start + y..new.end);
                }
                self.forward.set(k, x);

                if odd && (k - delta).abs() <= d - 1 && x + self.backward.get(-(k - delta)) >= n {
                    return Some((old.start + x0, new.start + y0));
                }
                k -= 2;
            }

            let mut k = d;
            while k >= -d {
                let mut x = if k == -d || (k != d && self.backward.get(k - 1) < self.backward.get(k + 1)) {
                    self.backward.get(k + 1)
                } else {
                    self.backward.get(k - 1) + 1
                };
                let mut y = (x as isize - k) as usize;
                if x < n && y < m {
                    let advance =
                        self.common_suffix(old.start..old.start + n - x, new.start..new.start + m - y);
                    x += advance;
                    y += advance;
                }
                self.backward.set(k, x);

                if !odd && (k - delta).abs() <= d && x + self.forward.get(-(k - delta)) >= n {
                    return Some((old.start + n - x, new.start + m - y));
                }
                k -= 2;
            }
        }
        None
    }
}
