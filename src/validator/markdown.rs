//! Lightweight markdown inspection
//!
//! Only what the checks need: ATX headings, inline links, fenced code
//! blocks and word counts. No full markdown parse.

use once_cell::sync::Lazy;
use regex::Regex;

static LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\(([^)\s]+)\)").expect("link pattern"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub line: usize,
    pub level: usize,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub line: usize,
    pub text: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    /// Line of the opening fence
    pub line: usize,
    pub lang: Option<String>,
    pub body: String,
}

/// ATX headings outside fenced code
pub fn headings(text: &str) -> Vec<Heading> {
    let mut in_fence = false;
    let mut out = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim_start();
        if line.starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence || !line.starts_with('#') {
            continue;
        }
        let level = line.chars().take_while(|c| *c == '#').count();
        let rest = &line[level..];
        if level > 6 || !(rest.is_empty() || rest.starts_with(' ')) {
            continue;
        }
        out.push(Heading {
            line: idx + 1,
            level,
            title: rest.trim().trim_end_matches('#').trim().to_string(),
        });
    }
    out
}

/// A section is present when a heading starts with its name, ignoring case
pub fn has_section(text: &str, name: &str) -> bool {
    let wanted = name.trim().to_lowercase();
    headings(text)
        .iter()
        .any(|h| h.title.to_lowercase().starts_with(&wanted))
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

pub fn links(text: &str) -> Vec<Link> {
    text.lines()
        .enumerate()
        .flat_map(|(idx, line)| {
            LINK.captures_iter(line).map(move |caps| Link {
                line: idx + 1,
                text: caps[1].to_string(),
                target: caps[2].to_string(),
            })
        })
        .collect()
}

/// Fenced code blocks; an unterminated fence runs to end of file
pub fn code_blocks(text: &str) -> Vec<CodeBlock> {
    let mut out = Vec::new();
    let mut open: Option<CodeBlock> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim_start();
        if let Some(fence) = line.strip_prefix("```") {
            match open.take() {
                Some(block) => out.push(block),
                None => {
                    let lang = fence.trim();
                    open = Some(CodeBlock {
                        line: idx + 1,
                        lang: (!lang.is_empty()).then(|| lang.to_string()),
                        body: String::new(),
                    });
                }
            }
            continue;
        }
        if let Some(block) = open.as_mut() {
            block.body.push_str(raw);
            block.body.push('\n');
        }
    }
    out.extend(open);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "# Title\n\nIntro text here.\n\n## Usage Guide\n\nSee [the changelog](CHANGELOG.md).\n\n```bash\n# not a heading\nmake\n```\n";

    #[test]
    fn test_headings_skip_fenced_code() {
        let found = headings(DOC);
        assert_eq!(found.len(), 2);
        assert_eq!(found[1].title, "Usage Guide");
        assert_eq!(found[1].line, 5);
        assert!(headings("#hashtag").is_empty());
    }

    #[test]
    fn test_section_match_is_prefix_and_case_insensitive() {
        assert!(has_section(DOC, "usage"));
        assert!(!has_section(DOC, "Rollback"));
    }

    #[test]
    fn test_links_and_code_blocks() {
        let l = links(DOC);
        assert_eq!(l.len(), 1);
        assert_eq!(l[0].target, "CHANGELOG.md");

        let blocks = code_blocks(DOC);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].lang.as_deref(), Some("bash"));
        assert!(blocks[0].body.contains("make"));
    }
}
