//! Per-project dependency include/exclude rules.

use std::collections::BTreeSet;

use tracing::info;

/// Names changed by [`apply_filters`], each sorted and reported once.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FilterReport {
  pub included: Vec<String>,
  pub excluded: Vec<String>,
}

impl FilterReport {
  pub fn is_empty(&self) -> bool {
    self.included.is_empty() && self.excluded.is_empty()
  }
}

/// Match `input` against a pattern where `*` stands for any run of characters.
///
/// The whole name must match: `@types/*` matches `@types/node` but not
/// `x-@types/node`.
pub fn matches_with_star(pattern: &str, input: &str) -> bool {
  let mut parts = pattern.split('*');
  // split always yields at least one item
  let first = parts.next().unwrap_or_default();
  let Some(mut rest) = input.strip_prefix(first) else {
    return false;
  };

  let tail: Vec<&str> = parts.collect();
  let Some((last, middle)) = tail.split_last() else {
    // no star at all: exact match
    return rest.is_empty();
  };

  for part in middle {
    match rest.find(part) {
      Some(idx) => rest = &rest[idx + part.len()..],
      None => return false,
    }
  }
  rest.ends_with(last)
}

/// Adjust the candidate dependency names of a configured project.
///
/// Every name is tested against the full exclude list before anything is
/// removed, then the additional names are added. The set is mutated in place
/// and is the authoritative result.
pub fn apply_filters(
  names: &mut BTreeSet<String>,
  additional_dependencies_to_include: &[String],
  dependencies_to_exclude: &[String],
) -> FilterReport {
  let excluded: BTreeSet<String> = names
    .iter()
    .filter(|name| dependencies_to_exclude.iter().any(|p| matches_with_star(p, name)))
    .cloned()
    .collect();
  names.retain(|name| !excluded.contains(name));

  let mut included = BTreeSet::new();
  for name in additional_dependencies_to_include {
    if names.insert(name.clone()) {
      included.insert(name.clone());
    }
  }

  let report = FilterReport {
    included: included.into_iter().collect(),
    excluded: excluded.into_iter().collect(),
  };

  if !report.included.is_empty() {
    info!(
      "Extra dependencies included by settings: {}",
      report.included.join(", ")
    );
  }
  if !report.excluded.is_empty() {
    info!(
      "Extra dependencies excluded by settings: {}",
      report.excluded.join(", ")
    );
  }

  report
}
