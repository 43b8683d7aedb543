//! Rest-duration parsing
//!
//! Spreadsheet authors write rest intervals as `90秒`, `1:30`, `1'30"`,
//! `2分钟`, `45s` or just `90`. Everything resolves to whole seconds.

use once_cell::sync::Lazy;
use regex::Regex;

static MINUTES_SECONDS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*:\s*(\d+)").expect("valid rest pattern"));
static TRAILING_MINUTES: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*:\s*$").expect("valid rest pattern"));
static MINUTE_UNIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*(分钟|分|min)").expect("valid rest pattern"));
static SECOND_UNIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*(秒|sec|s)").expect("valid rest pattern"));
static TRAILING_NON_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\D*$").expect("valid rest pattern"));
static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid rest pattern"));

/// Minute marks become `:`, second marks are dropped
fn normalize(text: &str) -> String {
  text
    .trim()
    .to_lowercase()
    .chars()
    .filter_map(|c| match c {
      '：' | '\'' | '′' | '’' | '‘' => Some(':'),
      '"' | '″' | '“' | '”' | '＂' => None,
      other => Some(other),
    })
    .collect()
}

fn capture_u32(caps: &regex::Captures<'_>, idx: usize) -> Option<u32> {
  caps.get(idx)?.as_str().parse().ok()
}

/// Parse free-text rest notation into seconds.
///
/// Resolution order: `MM:SS`, trailing `MM:`, minute/second units, then a
/// bare number (raw seconds). Returns `None` for anything else.
pub fn parse_rest_seconds(text: &str) -> Option<u32> {
  let normalized = normalize(text);
  if normalized.is_empty() {
    return None;
  }

  if let Some(caps) = MINUTES_SECONDS.captures(&normalized) {
    let minutes = capture_u32(&caps, 1)?;
    let seconds = capture_u32(&caps, 2)?;
    return minutes.checked_mul(60)?.checked_add(seconds);
  }

  if let Some(caps) = TRAILING_MINUTES.captures(&normalized) {
    return capture_u32(&caps, 1)?.checked_mul(60);
  }

  let minutes = MINUTE_UNIT.captures(&normalized).and_then(|c| capture_u32(&c, 1));
  let seconds = SECOND_UNIT.captures(&normalized).and_then(|c| capture_u32(&c, 1));
  if minutes.is_some() || seconds.is_some() {
    let from_minutes = minutes.unwrap_or(0).checked_mul(60)?;
    return from_minutes.checked_add(seconds.unwrap_or(0));
  }

  let compact = TRAILING_NON_DIGITS.replace(&normalized, "");
  if !compact.is_empty() && compact.chars().all(|c| c.is_ascii_digit()) {
    return compact.parse().ok();
  }

  None
}

/// Every integer appearing in `value`, in order
pub fn integers(value: &str) -> impl Iterator<Item = u64> + '_ {
  DIGITS.find_iter(value).filter_map(|m| m.as_str().parse().ok())
}

/// First integer in `value`
pub fn first_integer(value: &str) -> Option<u32> {
  DIGITS.find(value).and_then(|m| m.as_str().parse().ok())
}

/// True if any integer in `value` is greater than zero
pub fn has_positive_number(value: &str) -> bool {
  DIGITS
    .find_iter(value)
    .any(|m| m.as_str().trim_start_matches('0').chars().any(|c| c.is_ascii_digit()))
}
