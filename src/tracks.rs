// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Mapping imported track identifiers onto a project's animal names.
//!
//! When the track names in a file differ from the project's names, a
//! [`TrackNameResolver`] is asked for a mapping. The mapping must send every
//! observed name to a distinct allowed name; invalid answers are rejected and
//! the resolver is asked again, and a resolver that cancels aborts the import.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{BufRead, Write};

use crate::warn;

/// Observed track name to project track name.
pub type TrackMapping = BTreeMap<String, String>;

/// How many invalid answers are tolerated before giving up.
pub const MAX_MAPPING_ATTEMPTS: usize = 5;

/// Source of track-name mappings: a dialog, a CLI prompt, or a canned answer.
pub trait TrackNameResolver {
    /// Request a mapping from `observed` onto `allowed`. `None` cancels.
    fn request_mapping(&mut self, observed: &[String], allowed: &[String])
    -> Option<TrackMapping>;

    /// Called with the reason a returned mapping was rejected, before the next request.
    fn mapping_rejected(&mut self, _reason: &str) {}
}

impl<F> TrackNameResolver for F
where
    F: FnMut(&[String], &[String]) -> Option<TrackMapping>,
{
    fn request_mapping(
        &mut self,
        observed: &[String],
        allowed: &[String],
    ) -> Option<TrackMapping> {
        self(observed, allowed)
    }
}

/// Check that `mapping` sends every observed name to a distinct allowed name.
///
/// # Errors
///
/// Returns a human-readable reason when the mapping is incomplete, targets an
/// unknown name, or maps two observed names to the same target.
pub fn validate_mapping(
    mapping: &TrackMapping,
    observed: &[String],
    allowed: &[String],
) -> std::result::Result<(), String> {
    let allowed: BTreeSet<&str> = allowed.iter().map(String::as_str).collect();
    let mut targets = BTreeSet::new();

    for name in observed {
        let Some(target) = mapping.get(name) else {
            return Err(format!("no project name selected for '{name}'"));
        };
        if !allowed.contains(target.as_str()) {
            return Err(format!("'{target}' is not a project track name"));
        }
        if !targets.insert(target.as_str()) {
            return Err(format!("'{target}' was selected more than once"));
        }
    }
    Ok(())
}

/// Resolve observed track names against the project's allowed names.
///
/// Identical name sets resolve to the identity mapping without consulting the
/// resolver. Returns `None` if the resolver cancels or keeps answering with
/// invalid mappings.
pub fn resolve_track_names(
    observed: &[String],
    allowed: &[String],
    resolver: &mut dyn TrackNameResolver,
) -> Option<TrackMapping> {
    let observed_set: BTreeSet<&String> = observed.iter().collect();
    let allowed_set: BTreeSet<&String> = allowed.iter().collect();
    if observed_set == allowed_set {
        return Some(observed.iter().map(|t| (t.clone(), t.clone())).collect());
    }

    for _ in 0..MAX_MAPPING_ATTEMPTS {
        let mapping = resolver.request_mapping(observed, allowed)?;
        match validate_mapping(&mapping, observed, allowed) {
            Ok(()) => {
                return Some(
                    observed
                        .iter()
                        .filter_map(|t| mapping.get(t).map(|n| (t.clone(), n.clone())))
                        .collect(),
                );
            }
            Err(reason) => {
                warn!("Track mapping rejected: {reason}");
                resolver.mapping_rejected(&reason);
            }
        }
    }
    None
}

/// Resolver returning a fixed answer, for scripted runs and tests.
#[derive(Debug, Clone, Default)]
pub struct CannedResolver {
    answer: Option<TrackMapping>,
    /// Number of times a mapping was requested.
    pub requests: usize,
}

impl CannedResolver {
    /// Always answer with `mapping`.
    #[must_use]
    pub const fn new(mapping: TrackMapping) -> Self {
        Self {
            answer: Some(mapping),
            requests: 0,
        }
    }

    /// Always cancel.
    #[must_use]
    pub const fn cancel() -> Self {
        Self {
            answer: None,
            requests: 0,
        }
    }

    /// Build from `raw=name` pairs.
    #[must_use]
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self::new(
            pairs
                .into_iter()
                .map(|(raw, name)| (raw.to_string(), name.to_string()))
                .collect(),
        )
    }
}

impl TrackNameResolver for CannedResolver {
    fn request_mapping(&mut self, _: &[String], _: &[String]) -> Option<TrackMapping> {
        self.requests += 1;
        self.answer.clone()
    }
}

/// Resolver pairing observed names with allowed names in sorted order.
///
/// Cancels when there are more observed names than allowed names.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderedResolver;

impl TrackNameResolver for OrderedResolver {
    fn request_mapping(
        &mut self,
        observed: &[String],
        allowed: &[String],
    ) -> Option<TrackMapping> {
        if observed.len() > allowed.len() {
            return None;
        }
        let mut sorted: Vec<&String> = observed.iter().collect();
        sorted.sort_by(|a, b| {
            crate::utils::track_number(a)
                .cmp(&crate::utils::track_number(b))
                .then_with(|| a.cmp(b))
        });
        Some(
            sorted
                .into_iter()
                .zip(allowed)
                .map(|(o, a)| (o.clone(), a.clone()))
                .collect(),
        )
    }
}

/// Interactive resolver reading choices line by line.
///
/// For each observed name the allowed names are listed with their index; the
/// user answers with an index or a name. An empty line or end of input cancels.
pub struct PromptResolver<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptResolver<R, W> {
    /// Create a resolver over the given input and output streams.
    pub const fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn ask(&mut self, observed: &str, allowed: &[String]) -> std::io::Result<Option<String>> {
        writeln!(self.output, "Select project name for track '{observed}':")?;
        for (i, name) in allowed.iter().enumerate() {
            writeln!(self.output, "  [{i}] {name}")?;
        }
        write!(self.output, "> ")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let answer = line.trim();
        if answer.is_empty() {
            return Ok(None);
        }
        if let Ok(index) = answer.parse::<usize>()
            && let Some(name) = allowed.get(index)
        {
            return Ok(Some(name.clone()));
        }
        Ok(Some(answer.to_string()))
    }
}

impl<R: BufRead, W: Write> TrackNameResolver for PromptResolver<R, W> {
    fn request_mapping(
        &mut self,
        observed: &[String],
        allowed: &[String],
    ) -> Option<TrackMapping> {
        if let Err(e) = writeln!(
            self.output,
            "The label file and the project animal names do not match. Empty input cancels."
        ) {
            warn!("Failed to write track mapping prompt: {e}");
            return None;
        }
        let mut mapping = TrackMapping::new();
        for name in observed {
            match self.ask(name, allowed) {
                Ok(Some(choice)) => {
                    mapping.insert(name.clone(), choice);
                }
                Ok(None) => return None,
                Err(e) => {
                    warn!("Failed to read track mapping: {e}");
                    return None;
                }
            }
        }
        Some(mapping)
    }

    fn mapping_rejected(&mut self, reason: &str) {
        if let Err(e) = writeln!(self.output, "Please select without duplication ({reason})") {
            warn!("Failed to write track mapping prompt: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_equal_sets_skip_resolver() {
        let mut resolver = CannedResolver::cancel();
        let mapping =
            resolve_track_names(&names(&["b", "a"]), &names(&["a", "b"]), &mut resolver).unwrap();
        assert_eq!(mapping["a"], "a");
        assert_eq!(mapping["b"], "b");
        assert_eq!(resolver.requests, 0);
    }

    #[test]
    fn test_canned_mapping() {
        let mut resolver = CannedResolver::from_pairs([("track_0", "mouse1"), ("track_1", "mouse2")]);
        let mapping = resolve_track_names(
            &names(&["track_0", "track_1"]),
            &names(&["mouse1", "mouse2"]),
            &mut resolver,
        )
        .unwrap();
        assert_eq!(mapping["track_1"], "mouse2");
        assert_eq!(resolver.requests, 1);
    }

    #[test]
    fn test_cancel_returns_none() {
        let mut resolver = CannedResolver::cancel();
        assert!(resolve_track_names(&names(&["x"]), &names(&["m"]), &mut resolver).is_none());
    }

    #[test]
    fn test_duplicate_targets_are_reprompted() {
        let mut calls = 0;
        let mut resolver = |observed: &[String], _: &[String]| -> Option<TrackMapping> {
            calls += 1;
            let target = |i: usize| if calls == 1 { "m1" } else if i == 0 { "m1" } else { "m2" };
            Some(
                observed
                    .iter()
                    .enumerate()
                    .map(|(i, o)| (o.clone(), target(i).to_string()))
                    .collect(),
            )
        };
        let mapping =
            resolve_track_names(&names(&["a", "b"]), &names(&["m1", "m2"]), &mut resolver)
                .unwrap();
        assert_eq!(mapping["a"], "m1");
        assert_eq!(mapping["b"], "m2");
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_persistently_invalid_gives_up() {
        let mut resolver = CannedResolver::from_pairs([("a", "nobody")]);
        assert!(resolve_track_names(&names(&["a"]), &names(&["m1"]), &mut resolver).is_none());
        assert_eq!(resolver.requests, MAX_MAPPING_ATTEMPTS);
    }

    #[test]
    fn test_validate_mapping() {
        let observed = names(&["a", "b"]);
        let allowed = names(&["m1", "m2"]);
        let ok: TrackMapping = [("a", "m2"), ("b", "m1")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert!(validate_mapping(&ok, &observed, &allowed).is_ok());

        let missing: TrackMapping = [("a".to_string(), "m1".to_string())].into_iter().collect();
        assert!(validate_mapping(&missing, &observed, &allowed).is_err());
    }

    #[test]
    fn test_ordered_resolver() {
        let mut resolver = OrderedResolver;
        let mapping = resolver
            .request_mapping(&names(&["track_10", "track_2"]), &names(&["m1", "m2"]))
            .unwrap();
        assert_eq!(mapping["track_2"], "m1");
        assert_eq!(mapping["track_10"], "m2");
        assert!(resolver.request_mapping(&names(&["a", "b"]), &names(&["m1"])).is_none());
    }

    #[test]
    fn test_prompt_resolver() {
        let input = Cursor::new("1\nmouse1\n");
        let mut output = Vec::new();
        let mut resolver = PromptResolver::new(input, &mut output);
        let mapping = resolve_track_names(
            &names(&["track_0", "track_1"]),
            &names(&["mouse1", "mouse2"]),
            &mut resolver,
        )
        .unwrap();
        assert_eq!(mapping["track_0"], "mouse2");
        assert_eq!(mapping["track_1"], "mouse1");
        assert!(String::from_utf8(output).unwrap().contains("[1] mouse2"));
    }

    #[test]
    fn test_prompt_resolver_cancels_on_empty_line() {
        let mut resolver = PromptResolver::new(Cursor::new("\n"), std::io::sink());
        assert!(
            resolve_track_names(&names(&["a"]), &names(&["m1"]), &mut resolver).is_none()
        );
    }

    struct ClosedOutput;

    impl Write for ClosedOutput {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("output closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_prompt_resolver_gives_up_when_output_fails() {
        let mut resolver = PromptResolver::new(Cursor::new("0\n"), ClosedOutput);
        assert!(
            resolver
                .request_mapping(&names(&["a"]), &names(&["m1"]))
                .is_none()
        );
        resolver.mapping_rejected("duplicate");
    }
}
