// robots.txt allow/deny policy

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, warn};
use url::Url;

/// Decides whether a path on an origin may be fetched.
///
/// Implementations must fail open: any internal error means "allowed".
#[async_trait]
pub trait AllowPolicy: Send + Sync {
    async fn is_allowed(&self, origin: &Url, path: &str, user_agent: &str) -> bool;
}

/// Policy that allows everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

#[async_trait]
impl AllowPolicy for AllowAll {
    async fn is_allowed(&self, _origin: &Url, _path: &str, _user_agent: &str) -> bool {
        true
    }
}

#[derive(Debug, Clone)]
struct Rule {
    allow: bool,
    pattern: String,
    regex: Option<Regex>,
}

impl Rule {
    fn new(allow: bool, pattern: &str) -> Self {
        Self {
            allow,
            pattern: pattern.to_string(),
            regex: pattern_regex(pattern),
        }
    }

    fn matches(&self, path: &str) -> bool {
        match self.regex {
            Some(ref regex) => regex.is_match(path),
            None => path.starts_with(&self.pattern),
        }
    }
}

fn pattern_regex(pattern: &str) -> Option<Regex> {
    if !pattern.contains('*') && !pattern.ends_with('$') {
        return None;
    }
    let mut regex_pattern = regex::escape(pattern).replace("\\*", ".*");
    if regex_pattern.ends_with("\\$") {
        regex_pattern.truncate(regex_pattern.len() - 2);
        regex_pattern.push('$');
    }
    Regex::new(&format!("^{}", regex_pattern)).ok()
}

#[derive(Debug, Clone, Default)]
struct Group {
    agents: Vec<String>,
    rules: Vec<Rule>,
}

/// Parsed robots.txt rules.
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    groups: Vec<Group>,
}

impl RobotsRules {
    pub fn parse(content: &str) -> Self {
        let mut groups: Vec<Group> = Vec::new();
        let mut current = Group::default();
        // A rule line, even an empty one, closes the agent list of the current group
        let mut in_rules = false;

        for line in content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    if in_rules {
                        groups.push(std::mem::take(&mut current));
                        in_rules = false;
                    }
                    current.agents.push(value.to_lowercase());
                }
                "disallow" if !current.agents.is_empty() => {
                    in_rules = true;
                    // An empty Disallow allows everything
                    if !value.is_empty() {
                        current.rules.push(Rule::new(false, value));
                    }
                }
                "allow" if !current.agents.is_empty() => {
                    in_rules = true;
                    if !value.is_empty() {
                        current.rules.push(Rule::new(true, value));
                    }
                }
                _ => {}
            }
        }
        if !current.agents.is_empty() {
            groups.push(current);
        }

        Self { groups }
    }

    fn group_for(&self, user_agent: &str) -> Option<&Group> {
        let ua = user_agent.to_lowercase();
        self.groups
            .iter()
            .find(|g| g.agents.iter().any(|a| a != "*" && ua.contains(a.as_str())))
            .or_else(|| self.groups.iter().find(|g| g.agents.iter().any(|a| a == "*")))
    }

    /// Longest matching rule wins; on a tie, allow wins.
    pub fn is_allowed(&self, path: &str, user_agent: &str) -> bool {
        let Some(group) = self.group_for(user_agent) else {
            return true;
        };

        let mut best: Option<&Rule> = None;
        for rule in group.rules.iter().filter(|r| r.matches(path)) {
            best = match best {
                Some(current)
                    if current.pattern.len() > rule.pattern.len()
                        || (current.pattern.len() == rule.pattern.len() && current.allow) =>
                {
                    Some(current)
                }
                _ => Some(rule),
            };
        }

        best.map(|r| r.allow).unwrap_or(true)
    }
}

/// Fetches and caches `/robots.txt` once per origin for the lifetime of the policy.
pub struct RobotsPolicy {
    client: Client,
    cache: Mutex<HashMap<String, Arc<OnceCell<Option<RobotsRules>>>>>,
}

impl RobotsPolicy {
    pub fn new(timeout: Duration) -> crate::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(3))
            .build()?;
        Ok(Self {
            client,
            cache: Mutex::new(HashMap::new()),
        })
    }

    async fn rules_for(&self, origin: &Url, user_agent: &str) -> Option<RobotsRules> {
        let key = origin.origin().ascii_serialization();
        let cell = {
            let mut cache = self.cache.lock().await;
            cache.entry(key).or_default().clone()
        };

        cell.get_or_init(|| async {
            match self.fetch_rules(origin, user_agent).await {
                Ok(rules) => rules,
                Err(e) => {
                    warn!("robots.txt for {} unavailable, allowing: {}", origin, e);
                    None
                }
            }
        })
        .await
        .clone()
    }

    async fn fetch_rules(&self, origin: &Url, user_agent: &str) -> crate::Result<Option<RobotsRules>> {
        let robots_url = origin
            .join("/robots.txt")
            .map_err(|e| crate::ScanError::InvalidUrl(e.to_string()))?;
        let response = self
            .client
            .get(robots_url.clone())
            .header(reqwest::header::USER_AGENT, user_agent)
            .send()
            .await?;

        if !response.status().is_success() {
            debug!("{} returned {}, treating as allow-all", robots_url, response.status());
            return Ok(None);
        }

        let body = response.text().await?;
        Ok(Some(RobotsRules::parse(&body)))
    }
}

#[async_trait]
impl AllowPolicy for RobotsPolicy {
    async fn is_allowed(&self, origin: &Url, path: &str, user_agent: &str) -> bool {
        match self.rules_for(origin, user_agent).await {
            Some(rules) => rules.is_allowed(path, user_agent),
            None => true,
        }
    }
}
