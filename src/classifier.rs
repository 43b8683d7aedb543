//! Exercise-row classification
//!
//! Decides what a plan row is from its name cell alone, and splits
//! combination entries such as `垫铃高拉+短触地跌落跳` into their movements.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

const REST_KEYWORDS: [&str; 3] = ["休息", "rest", "放松"];
const LOG_KEYWORDS: [&str; 3] = ["完成", "记录", "总结"];
const WARMUP_KEYWORDS: [&str; 7] = ["热身", "拉伸", "激活", "准备", "梳理", "升温", "技术性"];

static COMBINATION_SEPARATOR: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"\s*[+&]\s*").expect("valid separator pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
  Exercise,
  Warmup,
  Rest,
  Log,
  Note,
}

impl Category {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Exercise => "exercise",
      Self::Warmup => "warmup",
      Self::Rest => "rest",
      Self::Log => "log",
      Self::Note => "note",
    }
  }
}

impl std::fmt::Display for Category {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Keyword containment, checked rest > log > warmup > exercise
pub fn categorize(name: &str) -> Category {
  let lowered = name.trim().to_lowercase();
  if lowered.is_empty() {
    return Category::Note;
  }

  let contains_any = |keywords: &[&str]| keywords.iter().any(|k| lowered.contains(k));

  if contains_any(&REST_KEYWORDS) {
    Category::Rest
  } else if contains_any(&LOG_KEYWORDS) {
    Category::Log
  } else if contains_any(&WARMUP_KEYWORDS) {
    Category::Warmup
  } else {
    Category::Exercise
  }
}

/// Split a combination name on `+`/`&` (full-width forms included).
///
/// A name without separators comes back as a single component.
pub fn split_combination(name: &str) -> Vec<String> {
  let normalized = name.replace('＋', "+").replace('＆', "&");
  if !normalized.contains('+') && !normalized.contains('&') {
    return vec![name.trim().to_string()];
  }

  let parts: Vec<String> = COMBINATION_SEPARATOR
    .split(&normalized)
    .map(str::trim)
    .filter(|part| !part.is_empty())
    .map(str::to_string)
    .collect();

  if parts.is_empty() {
    vec![name.trim().to_string()]
  } else {
    parts
  }
}
