use regex::Regex;

const WILDCARDS: [char; 3] = ['*', '?', '['];

/// Byte offset of the first glob metacharacter, if any.
pub fn first_wildcard(pattern: &str) -> Option<usize> {
    pattern.find(|c| WILDCARDS.contains(&c))
}

pub fn has_wildcard(pattern: &str) -> bool {
    first_wildcard(pattern).is_some()
}

/// Non-empty `/`-separated parts of a path.
pub fn split_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|part| !part.is_empty()).collect()
}

#[derive(Debug, Clone)]
enum Segment {
    /// `**`: zero or more whole segments
    AnyDepth,
    Literal(String),
    Wildcard(Regex),
}

impl Segment {
    fn parse(text: &str) -> Self {
        if text == "**" {
            return Segment::AnyDepth;
        }
        if !has_wildcard(text) && !text.contains('\\') {
            return Segment::Literal(text.to_string());
        }
        match Regex::new(&translate(text)) {
            Ok(regex) => Segment::Wildcard(regex),
            Err(_) => Segment::Literal(text.to_string()),
        }
    }

    fn matches(&self, part: &str) -> bool {
        match self {
            Segment::AnyDepth => true,
            Segment::Literal(text) => text == part,
            Segment::Wildcard(regex) => regex.is_match(part),
        }
    }
}

/// Translates one fnmatch-style segment into an anchored regex.
fn translate(segment: &str) -> String {
    let chars: Vec<char> = segment.chars().collect();
    let mut out = String::from("^");
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '\\' if i + 1 < chars.len() => {
                i += 1;
                out.push_str(&regex::escape(&chars[i].to_string()));
            }
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    out.push_str(&translate_class(&chars[i + 1..end]));
                    i = end;
                }
                None => out.push_str(r"\["),
            },
            c => out.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }
    out.push('$');
    out
}

/// Index of the `]` closing the class opened at `start`.
fn class_end(chars: &[char], start: usize) -> Option<usize> {
    let mut i = start + 1;
    if i < chars.len() && (chars[i] == '!' || chars[i] == '^') {
        i += 1;
    }
    // a leading ']' is a literal member
    if i < chars.len() && chars[i] == ']' {
        i += 1;
    }
    while i < chars.len() {
        if chars[i] == ']' {
            return Some(i);
        }
        i += 1;
    }
    None
}

fn translate_class(body: &[char]) -> String {
    let mut out = String::from("[");
    let mut rest = body;
    if let Some(first) = rest.first() {
        if *first == '!' || *first == '^' {
            out.push('^');
            rest = &rest[1..];
        }
    }
    for (index, c) in rest.iter().enumerate() {
        let is_range = *c == '-' && index > 0 && index + 1 < rest.len();
        if is_range {
            out.push('-');
        } else if matches!(c, '\\' | '[' | ']' | '^' | '-' | '&' | '~') {
            out.push('\\');
            out.push(*c);
        } else {
            out.push(*c);
        }
    }
    out.push(']');
    out
}

/// A compiled path pattern, matched segment by segment.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    segments: Vec<Segment>,
}

impl GlobPattern {
    pub fn new(path: &str) -> Self {
        Self {
            segments: split_segments(path).into_iter().map(Segment::parse).collect(),
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        match_segments(&split_segments(path), &self.segments)
    }

    /// Whether anything strictly below directory `path` could match, which
    /// decides if the directory is worth listing.
    pub fn could_match_below(&self, path: &str) -> bool {
        could_descend(&split_segments(path), &self.segments)
    }
}

fn match_segments(parts: &[&str], pattern: &[Segment]) -> bool {
    match pattern.split_first() {
        None => parts.is_empty(),
        Some((Segment::AnyDepth, rest)) => {
            rest.is_empty() || (0..=parts.len()).any(|skip| match_segments(&parts[skip..], rest))
        }
        Some((segment, rest)) => match parts.split_first() {
            Some((part, remaining)) => segment.matches(part) && match_segments(remaining, rest),
            None => false,
        },
    }
}

fn could_descend(dir: &[&str], pattern: &[Segment]) -> bool {
    match pattern.split_first() {
        None => false,
        Some((Segment::AnyDepth, _)) => true,
        Some((segment, rest)) => match dir.split_first() {
            Some((part, remaining)) => segment.matches(part) && could_descend(remaining, rest),
            None => true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_wildcard() {
        assert_eq!(first_wildcard("/dir/*.parquet"), Some(5));
        assert_eq!(first_wildcard("/dir/file?.csv"), Some(9));
        assert_eq!(first_wildcard("/dir/[ab].csv"), Some(5));
        assert_eq!(first_wildcard("/dir/file.csv"), None);
    }

    #[test]
    fn test_single_segment_wildcards() {
        let pattern = GlobPattern::new("/dir/*.parquet");
        assert!(pattern.matches("/dir/a.parquet"));
        assert!(pattern.matches("/dir/.parquet"));
        assert!(!pattern.matches("/dir/sub/c.parquet"));
        assert!(!pattern.matches("/dir/b.csv"));

        let question = GlobPattern::new("/d/file?.csv");
        assert!(question.matches("/d/file1.csv"));
        assert!(!question.matches("/d/file10.csv"));
    }

    #[test]
    fn test_character_classes() {
        let pattern = GlobPattern::new("/d/part-[0-9].csv");
        assert!(pattern.matches("/d/part-3.csv"));
        assert!(!pattern.matches("/d/part-x.csv"));

        let negated = GlobPattern::new("/d/[!a]*.csv");
        assert!(negated.matches("/d/b.csv"));
        assert!(!negated.matches("/d/a.csv"));

        let unclosed = GlobPattern::new("/d/[abc.csv");
        assert!(unclosed.matches("/d/[abc.csv"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let pattern = GlobPattern::new("/d/a+b(1)*.csv");
        assert!(pattern.matches("/d/a+b(1)x.csv"));
        assert!(!pattern.matches("/d/aab1x.csv"));
    }

    #[test]
    fn test_double_star_matches_any_depth() {
        let pattern = GlobPattern::new("/dir/**/*.parquet");
        assert!(pattern.matches("/dir/a.parquet"));
        assert!(pattern.matches("/dir/sub/c.parquet"));
        assert!(pattern.matches("/dir/sub/deeper/d.parquet"));
        assert!(!pattern.matches("/other/a.parquet"));

        let everything = GlobPattern::new("/dir/**");
        assert!(everything.matches("/dir/x"));
        assert!(everything.matches("/dir/a/b/c"));
    }

    #[test]
    fn test_could_match_below_prunes_listing() {
        let shallow = GlobPattern::new("/dir/*.parquet");
        assert!(shallow.could_match_below("/dir"));
        assert!(!shallow.could_match_below("/dir/sub"));

        let deep = GlobPattern::new("/dir/**/*.parquet");
        assert!(deep.could_match_below("/dir/sub"));
        assert!(deep.could_match_below("/dir/sub/deeper"));

        let nested = GlobPattern::new("/dir/*/data.csv");
        assert!(nested.could_match_below("/dir/sub"));
        assert!(!nested.could_match_below("/dir/sub/deeper"));
        assert!(!nested.could_match_below("/elsewhere"));
    }
}
