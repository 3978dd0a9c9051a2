//! Page-type patterns.
//!
//! Page types are `-` separated segments, e.g. `course-view-topics` or
//! `mod-forum-view`. A pattern without `*` matches only itself. A `*`
//! segment matches exactly one segment, except in last position where it
//! matches any number of remaining segments including none, so
//! `course-view-*` matches `course-view` and `course-view-weeks`.
use std::cmp::Ordering;
use std::fmt;

/// Any page at all.
pub const ANY_PAGE: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageTypePattern {
    pattern: String,
}

impl PageTypePattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    pub fn is_wildcard(&self) -> bool {
        self.pattern.split('-').any(|s| s == "*")
    }

    /// Whether a concrete page type falls under this pattern.
    pub fn matches(&self, page_type: &str) -> bool {
        if !self.is_wildcard() {
            return self.pattern == page_type;
        }
        let pattern: Vec<&str> = self.pattern.split('-').collect();
        let page: Vec<&str> = page_type.split('-').collect();
        let (last, fixed) = match pattern.split_last() {
            Some(parts) => parts,
            None => return false,
        };
        if *last == "*" {
            page.len() >= fixed.len() && segments_match(fixed, &page[..fixed.len()])
        } else {
            page.len() == pattern.len() && segments_match(&pattern, &page)
        }
    }

    /// Ordering key: exact patterns first, then more literal segments.
    pub fn specificity(&self) -> (bool, usize) {
        let literal = self.pattern.split('-').filter(|s| *s != "*").count();
        (!self.is_wildcard(), literal)
    }

    /// `Greater` when `self` is the more specific pattern.
    pub fn cmp_specificity(&self, other: &PageTypePattern) -> Ordering {
        self.specificity().cmp(&other.specificity())
    }
}

fn segments_match(pattern: &[&str], page: &[&str]) -> bool {
    pattern.iter().zip(page).all(|(p, s)| *p == "*" || p == s)
}

impl fmt::Display for PageTypePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

impl From<&str> for PageTypePattern {
    fn from(pattern: &str) -> Self {
        Self::new(pattern)
    }
}
