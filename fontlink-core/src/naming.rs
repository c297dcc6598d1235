//! Collision-free labels for font sets.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

/// Trailing ` #<digits>` counter appended to repeated names.
static COUNTER_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?s)(?P<base>.*) #(?P<n>[0-9]+)$").expect("valid regex"));

/// Make `candidate` unique among `existing` by appending ` #n`.
///
/// A free candidate is returned unchanged. Otherwise an existing ` #n`
/// suffix is split off and counting resumes from `n`, so duplicating
/// `"Display #2"` yields `"Display #3"` rather than `"Display #2 #1"`.
///
/// ```
/// use fontlink_core::naming::unique_name;
///
/// assert_eq!(unique_name("Sans", ["Serif"]), "Sans");
/// assert_eq!(unique_name("Sans", ["Sans"]), "Sans #1");
/// assert_eq!(unique_name("Sans #1", ["Sans", "Sans #1"]), "Sans #2");
/// ```
pub fn unique_name<I, S>(candidate: &str, existing: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let taken: HashSet<String> = existing
        .into_iter()
        .map(|name| name.as_ref().to_owned())
        .collect();

    if !taken.contains(candidate) {
        return candidate.to_owned();
    }

    let (base, mut n) = split_counter(candidate);
    loop {
        let probe = format!("{base} #{n}");
        if !taken.contains(&probe) {
            return probe;
        }
        n += 1;
    }
}

fn split_counter(name: &str) -> (&str, u64) {
    if let Some(caps) = COUNTER_SUFFIX.captures(name) {
        let base = caps.name("base").map_or("", |m| m.as_str());
        if let Some(n) = caps.name("n").and_then(|m| m.as_str().parse().ok()) {
            return (base, n);
        }
    }
    (name, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_name_is_kept() {
        assert_eq!(unique_name("New set", Vec::<String>::new()), "New set");
        assert_eq!(unique_name("New set", ["Other"]), "New set");
    }

    #[test]
    fn first_collision_starts_at_one() {
        assert_eq!(unique_name("New set", ["New set"]), "New set #1");
        assert_eq!(
            unique_name("New set", ["New set", "New set #1", "New set #2"]),
            "New set #3"
        );
    }

    #[test]
    fn existing_counter_is_resumed() {
        assert_eq!(unique_name("Text #4", ["Text #4"]), "Text #5");
        assert_eq!(unique_name("Text #4", ["Text #4", "Text #5"]), "Text #6");
    }

    #[test]
    fn hash_without_digits_is_part_of_the_name() {
        assert_eq!(unique_name("C#", ["C#"]), "C# #1");
        assert_eq!(unique_name("Set #x", ["Set #x"]), "Set #x #1");
    }

    #[test]
    fn oversized_counter_falls_back_to_whole_name() {
        let name = "Big #99999999999999999999999";
        assert_eq!(unique_name(name, [name]), format!("{name} #1"));
    }
}
