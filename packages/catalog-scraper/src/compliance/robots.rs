//! Robots.txt parser and matcher.
//!
//! Rules are matched longest-pattern-first; on equal length an `Allow`
//! beats a `Disallow`. Patterns support `*` (any run of characters) and a
//! trailing `$` (end of path).

use std::time::Duration;

/// Parsed robots.txt document.
#[derive(Debug, Clone, Default)]
pub struct RobotsTxt {
    groups: Vec<Group>,
}

/// Rules shared by a run of consecutive `User-agent` lines.
#[derive(Debug, Clone, Default)]
struct Group {
    /// Lowercased agent tokens
    agents: Vec<String>,
    rules: Vec<Rule>,
    crawl_delay: Option<f64>,
}

#[derive(Debug, Clone)]
struct Rule {
    pattern: String,
    allow: bool,
}

impl RobotsTxt {
    /// Parse robots.txt content. Unknown directives and malformed lines are
    /// ignored.
    pub fn parse(content: &str) -> Self {
        let mut robots = Self::default();
        let mut current: Option<Group> = None;
        let mut in_agent_run = false;

        for line in content.lines() {
            let line = match line.split_once('#') {
                Some((before, _)) => before,
                None => line,
            }
            .trim();

            if line.is_empty() {
                continue;
            }

            let Some((directive, value)) = line.split_once(':') else {
                continue;
            };
            let directive = directive.trim().to_lowercase();
            let value = value.trim();

            match directive.as_str() {
                "user-agent" => {
                    if !in_agent_run {
                        if let Some(group) = current.take() {
                            robots.groups.push(group);
                        }
                        current = Some(Group::default());
                    }
                    in_agent_run = true;
                    if let Some(group) = current.as_mut() {
                        group.agents.push(value.to_lowercase());
                    }
                }
                "allow" | "disallow" => {
                    in_agent_run = false;
                    // An empty Disallow allows everything; it adds no rule.
                    if value.is_empty() {
                        continue;
                    }
                    if let Some(group) = current.as_mut() {
                        group.rules.push(Rule {
                            pattern: value.to_string(),
                            allow: directive == "allow",
                        });
                    }
                }
                "crawl-delay" => {
                    in_agent_run = false;
                    if let (Some(group), Ok(delay)) = (current.as_mut(), value.parse::<f64>()) {
                        if delay.is_finite() && delay >= 0.0 {
                            group.crawl_delay = Some(delay);
                        }
                    }
                }
                _ => {}
            }
        }

        if let Some(group) = current {
            robots.groups.push(group);
        }

        robots
    }

    /// Check whether `path` (path plus optional query) is allowed for
    /// `user_agent`.
    pub fn is_allowed(&self, user_agent: &str, path: &str) -> bool {
        let path = if path.is_empty() { "/" } else { path };

        let mut best: Option<(usize, bool)> = None;
        for rule in self.rules_for(user_agent) {
            if !pattern_matches(&rule.pattern, path) {
                continue;
            }
            let specificity = rule.pattern.len();
            best = match best {
                Some((len, allow)) if len > specificity || (len == specificity && allow) => {
                    Some((len, allow))
                }
                _ => Some((specificity, rule.allow)),
            };
        }

        best.map(|(_, allow)| allow).unwrap_or(true)
    }

    /// Crawl delay declared for `user_agent`. The gate hands it to the
    /// pagination driver as the floor between page loads.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<Duration> {
        self.groups_for(user_agent)
            .into_iter()
            .find_map(|g| g.crawl_delay)
            .map(Duration::from_secs_f64)
    }

    fn rules_for(&self, user_agent: &str) -> impl Iterator<Item = &Rule> {
        self.groups_for(user_agent)
            .into_iter()
            .flat_map(|g| g.rules.iter())
    }

    /// Groups for the most specific matching agent token, else the `*`
    /// groups. Groups naming the same agent are merged.
    fn groups_for(&self, user_agent: &str) -> Vec<&Group> {
        let product = product_token(user_agent);

        let best_token = self
            .groups
            .iter()
            .flat_map(|g| g.agents.iter())
            .filter(|agent| agent.as_str() != "*" && product.contains(agent.as_str()))
            .max_by_key(|agent| agent.len());

        match best_token {
            Some(token) => self
                .groups
                .iter()
                .filter(|g| g.agents.iter().any(|a| a == token))
                .collect(),
            None => self
                .groups
                .iter()
                .filter(|g| g.agents.iter().any(|a| a == "*"))
                .collect(),
        }
    }
}

/// `MyEcommerceBot/1.0 (+info)` → `myecommercebot`.
fn product_token(user_agent: &str) -> String {
    user_agent
        .split(['/', ' '])
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// Match a robots pattern against a path.
fn pattern_matches(pattern: &str, path: &str) -> bool {
    let (pattern, anchored) = match pattern.strip_suffix('$') {
        Some(p) => (p, true),
        None => (pattern, false),
    };

    let mut pieces = pattern.split('*');
    let first = pieces.next().unwrap_or_default();
    let Some(mut rest) = path.strip_prefix(first) else {
        return false;
    };

    let pieces: Vec<&str> = pieces.collect();
    if pieces.is_empty() {
        return !anchored || rest.is_empty();
    }

    for (i, piece) in pieces.iter().enumerate() {
        let last = i == pieces.len() - 1;
        if piece.is_empty() {
            if last && !anchored {
                return true;
            }
            continue;
        }
        if last && anchored {
            return rest.ends_with(piece);
        }
        match rest.find(piece) {
            Some(idx) => rest = &rest[idx + piece.len()..],
            None => return false,
        }
    }

    // Pattern ended in `*`, or anchored with a trailing `*$`.
    true
}
