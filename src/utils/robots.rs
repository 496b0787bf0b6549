// src/utils/robots.rs

//! robots.txt parsing and path matching.

use regex::Regex;

#[derive(Debug, Clone)]
struct Rule {
    allow: bool,
    /// Raw pattern; its length ranks the match
    pattern: String,
    matcher: Regex,
}

/// Allow/disallow rules that apply to one user agent.
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    rules: Vec<Rule>,
    deny_all: bool,
}

#[derive(Default)]
struct Group {
    agents: Vec<String>,
    rules: Vec<(bool, String)>,
    /// Set by any allow/disallow line, empty ones included
    saw_rule: bool,
}

impl RobotsRules {
    /// Everything allowed.
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Nothing allowed (robots.txt answered 401/403).
    pub fn deny_all() -> Self {
        Self {
            rules: Vec::new(),
            deny_all: true,
        }
    }

    /// Parse a robots.txt body, keeping the rules for `user_agent`.
    ///
    /// Groups whose agent token appears in `user_agent` win over `*`.
    pub fn parse(body: &str, user_agent: &str) -> Self {
        let groups = Self::groups(body);
        let ua = user_agent.to_ascii_lowercase();

        let specific: Vec<&Group> = groups
            .iter()
            .filter(|g| g.agents.iter().any(|a| a != "*" && ua.contains(a.as_str())))
            .collect();
        let chosen = if specific.is_empty() {
            groups
                .iter()
                .filter(|g| g.agents.iter().any(|a| a == "*"))
                .collect()
        } else {
            specific
        };

        let rules = chosen
            .into_iter()
            .flat_map(|g| g.rules.iter())
            .filter_map(|(allow, pattern)| {
                match compile(pattern) {
                    Some(matcher) => Some(Rule {
                        allow: *allow,
                        pattern: pattern.clone(),
                        matcher,
                    }),
                    None => {
                        log::debug!("Ignoring robots.txt pattern {:?}", pattern);
                        None
                    }
                }
            })
            .collect();

        Self {
            rules,
            deny_all: false,
        }
    }

    fn groups(body: &str) -> Vec<Group> {
        let mut groups: Vec<Group> = Vec::new();
        let mut current = Group::default();

        for line in body.lines() {
            let line = line.split('#').next().unwrap_or_default().trim();
            let Some((field, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();

            match field.trim().to_ascii_lowercase().as_str() {
                "user-agent" => {
                    // An agent line after rules opens a new group
                    if current.saw_rule {
                        groups.push(std::mem::take(&mut current));
                    }
                    current.agents.push(value.to_ascii_lowercase());
                }
                "allow" | "disallow" if !current.agents.is_empty() => {
                    current.saw_rule = true;
                    // Empty values place no restriction
                    if !value.is_empty() {
                        let allow = field.trim().eq_ignore_ascii_case("allow");
                        current.rules.push((allow, value.to_string()));
                    }
                }
                _ => {}
            }
        }
        if !current.agents.is_empty() {
            groups.push(current);
        }
        groups
    }

    /// Whether `path` (with query) may be fetched.
    ///
    /// Longest matching pattern decides; ties go to allow.
    pub fn is_allowed(&self, path: &str) -> bool {
        if self.deny_all {
            return false;
        }

        let mut best: Option<(usize, bool)> = None;
        for rule in &self.rules {
            if !rule.matcher.is_match(path) {
                continue;
            }
            let len = rule.pattern.len();
            best = match best {
                Some((best_len, best_allow))
                    if best_len > len || (best_len == len && best_allow) =>
                {
                    Some((best_len, best_allow))
                }
                _ => Some((len, rule.allow)),
            };
        }
        best.is_none_or(|(_, allow)| allow)
    }
}

/// Turn a robots.txt path pattern into an anchored regex.
fn compile(pattern: &str) -> Option<Regex> {
    let (body, anchored) = match pattern.strip_suffix('$') {
        Some(body) => (body, true),
        None => (pattern, false),
    };
    let mut source = String::from("^");
    for (i, part) in body.split('*').enumerate() {
        if i > 0 {
            source.push_str(".*");
        }
        source.push_str(&regex::escape(part));
    }
    if anchored {
        source.push('$');
    }
    Regex::new(&source).ok()
}
