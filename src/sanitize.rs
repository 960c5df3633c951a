//! Prompt-injection guard for user queries.
//!
//! Every query typed into the assistant passes through [`sanitize_query`]
//! before it is forwarded to the backend's prompt template. The pipeline is
//! a fixed sequence of text transforms:
//!
//! 1. normalize `\r\n` / `\r` to `\n`
//! 2. drop control characters (U+0000–U+001F, U+007F–U+009F)
//! 3. drop fenced and inline code spans, content included
//! 4. drop known injection phrases together with everything after them
//! 5. cut at the earliest separator or role marker (`###`, `System:`, …)
//! 6. collapse whitespace
//! 7. cap the length
//!
//! The function never fails. Absent or empty input yields an empty string,
//! and so does input that consists only of an injection attempt; callers
//! treat an empty result as a rejected query.
//!
//! The pattern and marker lists are data ([`SanitizerRules`]) so deployments
//! can extend them from the `[sanitizer]` config section.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

use crate::config::SanitizerConfig;

/// Default output cap, in characters.
pub const MAX_QUERY_CHARS: usize = 500;

/// Injection phrases. Each pattern removes the phrase and the rest of the
/// string, except the `从现在起…之前` form which only removes the span itself.
const BUILTIN_INJECTION_PATTERNS: &[&str] = &[
    r"(?i)ignore\s+(?:all\s+)?(?:previous\s+)?instructions[\s\S]*",
    r"(?i)disregard\s+(?:all\s+)?(?:previous\s+)?instructions[\s\S]*",
    r"(?i)forget\s+(?:all\s+)?(?:previous\s+)?instructions[\s\S]*",
    r"(?i)do\s+not\s+follow\s+(?:previous\s+)?instructions[\s\S]*",
    r"(?i)don't\s+follow\s+(?:previous\s+)?instructions[\s\S]*",
    r"(?i)forget\s+everything\s+before\s+this[\s\S]*",
    r"(?i)ignore\s+(?:this\s+)?and\s+(?:all\s+)?previous\s+instructions[\s\S]*",
    r"(?i)from\s+now\s+on,?\s+ignore\s+(?:all\s+)?previous\s+instructions[\s\S]*",
    r"忽略.*之前.*指示[\s\S]*",
    r"忘记.*之前.*指示[\s\S]*",
    r"忽略.*之前.*指令[\s\S]*",
    r"从现在起.*不要.*遵循.*之前",
    r"不要遵循之前的指示[\s\S]*",
    r"(?m)只回答.*$",
    r"按照下面.*要求.*回答[\s\S]*",
];

/// Separator and role markers. Matching is case-sensitive.
const BUILTIN_SEPARATORS: &[&str] = &[
    "###",
    "---",
    "***",
    "===",
    "System:",
    "Assistant:",
    "User:",
    "USER:",
    "SYSTEM:",
    "ASSISTANT:",
    "INSTRUCTIONS:",
    "OUTPUT:",
    "指示：",
    "系统：",
    "助手：",
    "用户：",
];

static FENCED_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[\s\S]*?```").expect("fenced code pattern"));
static INLINE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`[^`]*`").expect("inline code pattern"));

static DEFAULT_SANITIZER: LazyLock<Sanitizer> =
    LazyLock::new(|| Sanitizer::new(SanitizerRules::builtin()));

/// The data a [`Sanitizer`] runs on.
#[derive(Debug, Clone)]
pub struct SanitizerRules {
    pub injection_patterns: Vec<Regex>,
    pub separators: Vec<String>,
    pub max_len: usize,
}

impl SanitizerRules {
    /// The built-in English/Chinese phrase list and marker list with a
    /// 500-character cap.
    pub fn builtin() -> Self {
        Self {
            injection_patterns: BUILTIN_INJECTION_PATTERNS
                .iter()
                .map(|p| Regex::new(p).expect("built-in injection pattern"))
                .collect(),
            separators: BUILTIN_SEPARATORS.iter().map(|s| s.to_string()).collect(),
            max_len: MAX_QUERY_CHARS,
        }
    }

    /// Append extra phrase patterns and separator markers.
    ///
    /// Extra patterns are compiled case-insensitively. A pattern that should
    /// also drop the rest of the query has to end in `[\s\S]*` itself.
    pub fn extend(mut self, patterns: &[String], separators: &[String]) -> Result<Self> {
        for p in patterns {
            let re = Regex::new(&format!("(?i){}", p))
                .with_context(|| format!("invalid sanitizer pattern: {}", p))?;
            self.injection_patterns.push(re);
        }
        self.separators.extend(
            separators
                .iter()
                .filter(|s| !s.is_empty())
                .cloned(),
        );
        Ok(self)
    }

    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }
}

impl Default for SanitizerRules {
    fn default() -> Self {
        Self::builtin()
    }
}

/// What a single sanitizer run did to the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizeOutcome {
    /// The sanitized query.
    pub text: String,
    /// An injection phrase was found and removed.
    pub stripped_injection: bool,
    /// The marker the query was cut at, if any.
    pub cut_at: Option<String>,
    /// The result was shortened to the length cap.
    pub capped: bool,
}

impl SanitizeOutcome {
    /// The input had content but nothing usable survived.
    pub fn is_rejected(&self, raw: &str) -> bool {
        self.text.is_empty() && !raw.trim().is_empty()
    }
}

/// A compiled query sanitizer.
#[derive(Debug, Clone, Default)]
pub struct Sanitizer {
    rules: SanitizerRules,
}

impl Sanitizer {
    pub fn new(rules: SanitizerRules) -> Self {
        Self { rules }
    }

    /// Build from the `[sanitizer]` config section on top of the built-ins.
    pub fn from_config(cfg: &SanitizerConfig) -> Result<Self> {
        let rules = SanitizerRules::builtin()
            .extend(&cfg.extra_patterns, &cfg.extra_separators)?
            .with_max_len(cfg.max_len);
        Ok(Self::new(rules))
    }

    pub fn rules(&self) -> &SanitizerRules {
        &self.rules
    }

    /// Sanitize `raw`, returning only the resulting text.
    pub fn sanitize(&self, raw: &str) -> String {
        self.inspect(raw).text
    }

    /// Sanitize `raw` and report which stages changed it.
    pub fn inspect(&self, raw: &str) -> SanitizeOutcome {
        let mut outcome = SanitizeOutcome {
            text: String::new(),
            stripped_injection: false,
            cut_at: None,
            capped: false,
        };
        if raw.is_empty() {
            return outcome;
        }

        let s = raw.replace("\r\n", "\n").replace('\r', "\n");
        let s: String = s.chars().filter(|c| !c.is_control()).collect();

        let s = FENCED_CODE.replace_all(&s, "");
        let mut s = INLINE_CODE.replace_all(&s, "").into_owned();

        // Removing one phrase can join text into another, so run to a fixpoint.
        // Every replacement shortens the string, which bounds the loop.
        loop {
            let mut changed = false;
            for pattern in &self.rules.injection_patterns {
                let next = pattern.replace_all(&s, "");
                if next.len() < s.len() {
                    s = next.into_owned();
                    changed = true;
                }
            }
            if !changed {
                break;
            }
            outcome.stripped_injection = true;
        }

        let cut = self
            .rules
            .separators
            .iter()
            .filter_map(|sep| s.find(sep.as_str()).map(|idx| (idx, sep)))
            .min_by_key(|(idx, _)| *idx);
        if let Some((idx, sep)) = cut {
            s.truncate(idx);
            outcome.cut_at = Some(sep.clone());
        }

        let joined = s
            .split('\n')
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let mut s = joined.split_whitespace().collect::<Vec<_>>().join(" ");

        if s.chars().count() > self.rules.max_len {
            s = s
                .chars()
                .take(self.rules.max_len)
                .collect::<String>()
                .trim()
                .to_string();
            outcome.capped = true;
        }

        outcome.text = s;
        outcome
    }
}

/// Sanitize a query with the built-in rules.
pub fn sanitize_query(raw: &str) -> String {
    DEFAULT_SANITIZER.sanitize(raw)
}

/// Like [`sanitize_query`], treating a missing query as empty.
pub fn sanitize_optional(raw: Option<&str>) -> String {
    raw.map(sanitize_query).unwrap_or_default()
}
