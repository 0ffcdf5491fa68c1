//! Delimited-set helpers for the denormalized string columns.
//!
//! Group and inventory memberships are stored comma-joined, component lists
//! `::`-joined. The literal `nil` marks an empty set and is never a member.

use std::collections::BTreeSet;

/// Sentinel stored in place of an empty set.
pub const NIL: &str = "nil";

pub const GROUP_DELIMITER: &str = ",";

pub const COMPONENT_DELIMITER: &str = "::";

/// Splits a delimited column into its members, trimming each element and
/// dropping blanks and the `nil` sentinel.
#[must_use]
pub fn split_set(raw: &str, delimiter: &str) -> BTreeSet<String> {
    raw.split(delimiter)
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != NIL)
        .map(ToString::to_string)
        .collect()
}

/// Joins members back into the column form, `nil` for an empty set.
#[must_use]
pub fn join_set<I, S>(members: I, delimiter: &str) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let set: BTreeSet<String> = members
        .into_iter()
        .map(|s| s.as_ref().trim().to_string())
        .filter(|s| !s.is_empty() && s != NIL)
        .collect();

    if set.is_empty() {
        NIL.to_string()
    } else {
        set.into_iter().collect::<Vec<_>>().join(delimiter)
    }
}

#[must_use]
pub fn split_groups(raw: &str) -> BTreeSet<String> {
    split_set(raw, GROUP_DELIMITER)
}

#[must_use]
pub fn split_components(raw: &str) -> BTreeSet<String> {
    split_set(raw, COMPONENT_DELIMITER)
}

/// Group-scope match between a user's and a host's group sets.
///
/// Two empty sets match: "no group" is its own bucket. Otherwise the sets
/// must share at least one member.
#[must_use]
pub fn groups_match(user_groups: &BTreeSet<String>, host_groups: &BTreeSet<String>) -> bool {
    if user_groups.is_empty() || host_groups.is_empty() {
        return user_groups.is_empty() && host_groups.is_empty();
    }
    !user_groups.is_disjoint(host_groups)
}
