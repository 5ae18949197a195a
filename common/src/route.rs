use std::{collections::HashMap, fmt::Debug};

/// A parsed destination, e.g. `quotes.btc.usd`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    value: String,
    segments: Vec<String>,
}

impl Route {
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

/// Matches destination patterns against routes.
pub trait RouteMatcher: Debug + Send + Sync + 'static {
    fn parse_route(&self, route: &str) -> Route;

    fn is_pattern(&self, route: &str) -> bool;

    fn combine(&self, pattern1: &str, pattern2: &str) -> String;

    fn matches(&self, pattern: &str, route: &Route) -> bool {
        self.match_and_extract(pattern, route).is_some()
    }

    /// Template variables captured by `{name}` segments, or `None` on mismatch.
    fn match_and_extract(&self, pattern: &str, route: &Route) -> Option<HashMap<String, String>>;
}

/// Segment-based matcher.
///
/// In a pattern, `*` matches one segment, `**` matches zero or more segments,
/// `{name}` captures one segment, and `?`/`*` inside a segment glob within it.
#[derive(Debug, Clone)]
pub struct PathRouteMatcher {
    separator: char,
}

impl PathRouteMatcher {
    pub fn new(separator: char) -> Self {
        Self { separator }
    }

    pub fn separator(&self) -> char {
        self.separator
    }

    fn split<'a>(&self, value: &'a str) -> impl Iterator<Item = &'a str> {
        value.split(self.separator).filter(|s| !s.is_empty())
    }
}

impl Default for PathRouteMatcher {
    fn default() -> Self {
        Self::new('/')
    }
}

impl RouteMatcher for PathRouteMatcher {
    fn parse_route(&self, route: &str) -> Route {
        Route {
            value: route.to_owned(),
            segments: self.split(route).map(str::to_owned).collect(),
        }
    }

    fn is_pattern(&self, route: &str) -> bool {
        route.contains(['*', '?']) || (route.contains('{') && route.contains('}'))
    }

    fn combine(&self, pattern1: &str, pattern2: &str) -> String {
        let sep = self.separator;
        match (pattern1.is_empty(), pattern2.is_empty()) {
            (true, _) => pattern2.to_owned(),
            (_, true) => pattern1.to_owned(),
            _ => format!(
                "{}{sep}{}",
                pattern1.trim_end_matches(sep),
                pattern2.trim_start_matches(sep)
            ),
        }
    }

    fn match_and_extract(&self, pattern: &str, route: &Route) -> Option<HashMap<String, String>> {
        let pattern: Vec<&str> = self.split(pattern).collect();
        let segments: Vec<&str> = route.segments.iter().map(String::as_str).collect();
        let mut variables = HashMap::new();
        match_segments(&pattern, &segments, &mut variables).then_some(variables)
    }
}

fn match_segments(
    pattern: &[&str],
    segments: &[&str],
    variables: &mut HashMap<String, String>,
) -> bool {
    let Some((&head, rest)) = pattern.split_first() else {
        return segments.is_empty();
    };
    if head == "**" {
        // try the shortest expansion first
        return (0..=segments.len()).any(|skip| {
            let mut attempt = variables.clone();
            let matched = match_segments(rest, &segments[skip..], &mut attempt);
            if matched {
                *variables = attempt;
            }
            matched
        });
    }
    let Some((&segment, remaining)) = segments.split_first() else {
        return false;
    };
    if let Some(name) = head.strip_prefix('{').and_then(|h| h.strip_suffix('}')) {
        variables.insert(name.to_owned(), segment.to_owned());
    } else if !glob(head.as_bytes(), segment.as_bytes()) {
        return false;
    }
    match_segments(rest, remaining, variables)
}

fn glob(pattern: &[u8], text: &[u8]) -> bool {
    match (pattern.split_first(), text.split_first()) {
        (None, None) => true,
        (Some((b'*', p)), _) => glob(p, text) || (!text.is_empty() && glob(pattern, &text[1..])),
        (Some((b'?', p)), Some((_, t))) => glob(p, t),
        (Some((pc, p)), Some((tc, t))) if pc == tc => glob(p, t),
        _ => false,
    }
}
