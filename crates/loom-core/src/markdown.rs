//! Minimal Markdown structure: ATX headings, YAML frontmatter and sections.
//!
//! Fenced code blocks are opaque. Knowledge fragments are full of shell and
//! Python snippets whose `# comment` lines must never count as headings.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

// ---------------------------------------------------------------------------
// Heading
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Heading {
    pub level: u8,
    pub text: String,
}

impl Heading {
    pub fn new(level: u8, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into().trim().to_string(),
        }
    }

    /// Parse a single line such as `## Services`. Returns `None` for non-headings.
    pub fn parse(line: &str) -> Option<Heading> {
        let line = line.trim_end();
        let hashes = line.bytes().take_while(|&b| b == b'#').count();
        if hashes == 0 || hashes > 6 {
            return None;
        }
        let rest = &line[hashes..];
        if !rest.is_empty() && !rest.starts_with(' ') && !rest.starts_with('\t') {
            return None;
        }
        // Closing hashes are decoration: `## Title ##`.
        let text = rest.trim().trim_end_matches('#').trim_end();
        if text.is_empty() {
            return None;
        }
        Some(Heading::new(hashes as u8, text))
    }
}

impl fmt::Display for Heading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for _ in 0..self.level {
            f.write_str("#")?;
        }
        write!(f, " {}", self.text)
    }
}

impl std::str::FromStr for Heading {
    type Err = crate::error::LoomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Heading::parse(s.trim()).ok_or_else(|| crate::error::LoomError::InvalidName {
            kind: "heading",
            name: s.to_string(),
        })
    }
}

// Headings travel through YAML as their rendered form (`"## Services"`).
impl Serialize for Heading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Heading {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Line scanning
// ---------------------------------------------------------------------------

/// Tracks whether the scanner is inside a ``` or ~~~ fence.
#[derive(Default)]
struct FenceTracker {
    open: Option<(char, usize)>,
}

impl FenceTracker {
    /// Feed one line. Returns true if the line is fence content or a fence delimiter.
    fn step(&mut self, line: &str) -> bool {
        let trimmed = line.trim_start();
        let marker = trimmed.chars().next();
        let run = |c: char| trimmed.chars().take_while(|&x| x == c).count();
        match (self.open, marker) {
            (None, Some(c @ ('`' | '~'))) if run(c) >= 3 => {
                self.open = Some((c, run(c)));
                true
            }
            (Some((c, n)), Some(m)) if m == c && run(c) >= n && trimmed.trim_end().len() == run(c) => {
                self.open = None;
                true
            }
            (Some(_), _) => true,
            _ => false,
        }
    }
}

/// All headings in document order, skipping fenced code.
pub fn headings(text: &str) -> Vec<Heading> {
    let mut fence = FenceTracker::default();
    text.lines()
        .filter(|line| !fence.step(line))
        .filter_map(Heading::parse)
        .collect()
}

/// Body under `heading` up to the next heading of the same or higher rank.
///
/// Leading and trailing blank lines are trimmed. `None` if the heading is absent.
pub fn section(text: &str, heading: &Heading) -> Option<String> {
    let mut fence = FenceTracker::default();
    let mut capturing = false;
    let mut body: Vec<&str> = Vec::new();

    for line in text.lines() {
        let in_code = fence.step(line);
        let parsed = if in_code { None } else { Heading::parse(line) };
        if capturing {
            if let Some(h) = &parsed {
                if h.level <= heading.level {
                    break;
                }
            }
            body.push(line);
        } else if parsed.as_ref() == Some(heading) {
            capturing = true;
        }
    }

    if !capturing {
        return None;
    }
    let joined = body.join("\n");
    Some(joined.trim_matches('\n').trim_end().to_string())
}

/// Whether the first non-blank line of `text` is a heading.
pub fn opens_with_heading(text: &str) -> bool {
    text.lines()
        .find(|l| !l.trim().is_empty())
        .and_then(Heading::parse)
        .is_some()
}

// ---------------------------------------------------------------------------
// Frontmatter
// ---------------------------------------------------------------------------

/// Split a leading `---` YAML block from the body.
///
/// Returns `(None, content)` when there is no frontmatter.
pub fn split_frontmatter(content: &str) -> (Option<&str>, &str) {
    let Some(rest) = content.strip_prefix("---") else {
        return (None, content);
    };
    let rest = if let Some(r) = rest.strip_prefix('\n') {
        r
    } else if let Some(r) = rest.strip_prefix("\r\n") {
        r
    } else {
        return (None, content);
    };
    // Empty frontmatter: the closing delimiter is the very next line.
    if let Some(body) = rest.strip_prefix("---") {
        return (Some(""), strip_line_break(body));
    }
    let Some(end) = rest.find("\n---") else {
        return (None, content);
    };
    let fm = &rest[..end];
    let after = &rest[end + 4..];
    (Some(fm), strip_line_break(after))
}

fn strip_line_break(s: &str) -> &str {
    s.strip_prefix("\r\n")
        .or_else(|| s.strip_prefix('\n'))
        .unwrap_or(s)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
