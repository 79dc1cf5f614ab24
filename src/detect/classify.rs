//! Keyword classification of task text.
//!
//! Two lightweight, deterministic classifiers feed the gap detector:
//!
//! - **Action phase**: which step of the delivery lifecycle the task's
//!   dominant verb belongs to (research < design < plan < build < test <
//!   deploy < monitor). The earliest keyword hit in the text wins, which
//!   approximates "dominant verb" since task text is verb-led.
//! - **Skill domain**: which discipline the task as a whole belongs to
//!   (strategy, design, frontend, backend, qa). The domain with the most
//!   keyword hits wins.
//!
//! Both classifiers return `None` for text they cannot place; an
//! unclassifiable task never fires an indicator.
//!
//! ## Example
//!
//! ```
//! use seam::detect::classify::{classify_phase, classify_skill, ActionPhase, SkillDomain};
//!
//! assert_eq!(classify_phase("Design mockups"), Some(ActionPhase::Design));
//! assert_eq!(classify_phase("Launch"), Some(ActionPhase::Deploy));
//! assert_eq!(classify_phase("Reticulate splines"), None);
//!
//! assert_eq!(classify_skill("Build the REST API"), Some(SkillDomain::Backend));
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Ordinal phase of the delivery lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionPhase {
    Research,
    Design,
    Plan,
    Build,
    Test,
    Deploy,
    Monitor,
}

impl ActionPhase {
    /// Ordinal position (research=1 .. monitor=7).
    pub fn ordinal(&self) -> u8 {
        match self {
            ActionPhase::Research => 1,
            ActionPhase::Design => 2,
            ActionPhase::Plan => 3,
            ActionPhase::Build => 4,
            ActionPhase::Test => 5,
            ActionPhase::Deploy => 6,
            ActionPhase::Monitor => 7,
        }
    }
}

impl std::fmt::Display for ActionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionPhase::Research => write!(f, "research"),
            ActionPhase::Design => write!(f, "design"),
            ActionPhase::Plan => write!(f, "plan"),
            ActionPhase::Build => write!(f, "build"),
            ActionPhase::Test => write!(f, "test"),
            ActionPhase::Deploy => write!(f, "deploy"),
            ActionPhase::Monitor => write!(f, "monitor"),
        }
    }
}

/// Discipline a task belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillDomain {
    Strategy,
    Design,
    Frontend,
    Backend,
    Qa,
}

impl std::fmt::Display for SkillDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkillDomain::Strategy => write!(f, "strategy"),
            SkillDomain::Design => write!(f, "design"),
            SkillDomain::Frontend => write!(f, "frontend"),
            SkillDomain::Backend => write!(f, "backend"),
            SkillDomain::Qa => write!(f, "qa"),
        }
    }
}

/// Phase keyword tables, ordered by lifecycle position.
const PHASE_KEYWORDS: &[(ActionPhase, &[&str])] = &[
    (
        ActionPhase::Research,
        &[
            "research",
            "investigate",
            "explore",
            "interview",
            "survey",
            "analyze",
            "study",
            "benchmark",
            "discover",
        ],
    ),
    (
        ActionPhase::Design,
        &[
            "design",
            "mockup",
            "wireframe",
            "sketch",
            "prototype",
            "storyboard",
            "architect",
        ],
    ),
    (
        ActionPhase::Plan,
        &[
            "plan",
            "roadmap",
            "schedule",
            "scope",
            "estimate",
            "prioritize",
            "backlog",
        ],
    ),
    (
        ActionPhase::Build,
        &[
            "build",
            "implement",
            "develop",
            "create",
            "code",
            "integrate",
            "configure",
            "set up",
            "write",
        ],
    ),
    (
        ActionPhase::Test,
        &[
            "test",
            "verify",
            "validate",
            "qa",
            "usability",
            "regression",
        ],
    ),
    (
        ActionPhase::Deploy,
        &[
            "deploy", "launch", "release", "ship", "rollout", "publish", "migrate",
        ],
    ),
    (
        ActionPhase::Monitor,
        &[
            "monitor",
            "track",
            "measure",
            "observe",
            "alert",
            "dashboard",
            "retrospective",
        ],
    ),
];

/// Skill keyword tables, in tie-break priority order.
const SKILL_KEYWORDS: &[(SkillDomain, &[&str])] = &[
    (
        SkillDomain::Strategy,
        &[
            "goal",
            "vision",
            "strategy",
            "market",
            "stakeholder",
            "launch",
            "budget",
            "roadmap",
            "positioning",
        ],
    ),
    (
        SkillDomain::Design,
        &[
            "design", "mockup", "wireframe", "ux", "prototype", "brand", "visual",
        ],
    ),
    (
        SkillDomain::Frontend,
        &[
            "frontend",
            "front-end",
            "ui",
            "page",
            "component",
            "screen",
            "responsive",
        ],
    ),
    (
        SkillDomain::Backend,
        &[
            "backend",
            "back-end",
            "api",
            "database",
            "server",
            "schema",
            "endpoint",
            "pipeline",
        ],
    ),
    (
        SkillDomain::Qa,
        &["qa", "test", "bug", "regression", "quality", "coverage"],
    ),
];

/// One word-boundary-anchored pattern per phase, in lifecycle order.
static PHASE_PATTERNS: LazyLock<Vec<(ActionPhase, Regex)>> = LazyLock::new(|| {
    PHASE_KEYWORDS
        .iter()
        .map(|(phase, keywords)| {
            let pattern = format!(r"\b(?:{})", keywords.join("|"));
            (*phase, Regex::new(&pattern).unwrap())
        })
        .collect()
});

/// One word-boundary-anchored pattern per skill domain, in priority order.
static SKILL_PATTERNS: LazyLock<Vec<(SkillDomain, Regex)>> = LazyLock::new(|| {
    SKILL_KEYWORDS
        .iter()
        .map(|(domain, keywords)| {
            let pattern = format!(r"\b(?:{})", keywords.join("|"));
            (*domain, Regex::new(&pattern).unwrap())
        })
        .collect()
});

/// Classify the action phase of a task's dominant verb.
///
/// The phase whose keyword appears earliest in the text wins; ties go to
/// the earlier lifecycle phase. Returns `None` when no keyword matches.
pub fn classify_phase(text: &str) -> Option<ActionPhase> {
    let lower = text.to_lowercase();
    let mut best: Option<(usize, ActionPhase)> = None;
    for (phase, pattern) in PHASE_PATTERNS.iter() {
        if let Some(m) = pattern.find(&lower) {
            match best {
                // Strictly earlier position wins; phases are visited in
                // lifecycle order, so ties keep the earlier phase.
                Some((best_pos, _)) if m.start() >= best_pos => {}
                _ => best = Some((m.start(), *phase)),
            }
        }
    }
    best.map(|(_, phase)| phase)
}

/// Classify the skill domain of a task.
///
/// The domain with the most keyword hits wins; ties go to the domain
/// listed first in the priority order. Returns `None` when no keyword
/// matches.
pub fn classify_skill(text: &str) -> Option<SkillDomain> {
    let lower = text.to_lowercase();
    let mut best: Option<(usize, SkillDomain)> = None;
    for (domain, pattern) in SKILL_PATTERNS.iter() {
        let hits = pattern.find_iter(&lower).count();
        if hits == 0 {
            continue;
        }
        match best {
            Some((best_hits, _)) if hits <= best_hits => {}
            _ => best = Some((hits, *domain)),
        }
    }
    best.map(|(_, domain)| domain)
}
