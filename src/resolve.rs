//! Identifier resolution: full ID, name, or unique ID prefix.

use thiserror::Error;

use crate::output::units::truncate_id;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no {kind} found matching \"{identifier}\"")]
    NotFound { kind: &'static str, identifier: String },

    #[error("ambiguous {kind} identifier \"{identifier}\" matches: {}", matches.join(", "))]
    Ambiguous {
        kind: &'static str,
        identifier: String,
        /// Matching IDs, shortened to 12 chars.
        matches: Vec<String>,
    },
}

/// Anything the user can refer to by ID, name or ID prefix.
pub trait Resolvable {
    /// Noun used in error messages (`instance`, `volume`).
    const KIND: &'static str;

    fn id(&self) -> &str;
    fn name(&self) -> &str;
}

/// Resolve `identifier` against `candidates` and return the full ID.
///
/// Candidates are scanned once. An exact ID or name match returns
/// immediately, even after prefix matches were seen; otherwise the ID prefix
/// matches decide.
pub fn resolve<'a, T, I>(identifier: &str, candidates: I) -> Result<String, ResolveError>
where
    T: Resolvable + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut prefixed: Vec<&T> = Vec::new();

    for candidate in candidates {
        if candidate.id() == identifier || candidate.name() == identifier {
            return Ok(candidate.id().to_string());
        }
        if candidate.id().starts_with(identifier) {
            prefixed.push(candidate);
        }
    }

    match prefixed.as_slice() {
        [] => Err(ResolveError::NotFound {
            kind: T::KIND,
            identifier: identifier.to_string(),
        }),
        [only] => Ok(only.id().to_string()),
        many => Err(ResolveError::Ambiguous {
            kind: T::KIND,
            identifier: identifier.to_string(),
            matches: many.iter().map(|c| truncate_id(c.id())).collect(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Entity {
        id: &'static str,
        name: &'static str,
    }

    impl Resolvable for Entity {
        const KIND: &'static str = "instance";

        fn id(&self) -> &str {
            self.id
        }

        fn name(&self) -> &str {
            self.name
        }
    }

    fn candidates() -> Vec<Entity> {
        vec![
            Entity { id: "abc123", name: "foo" },
            Entity { id: "abc999", name: "bar" },
        ]
    }

    #[test]
    fn ambiguous_prefix_lists_both() {
        let err = resolve("abc", &candidates()).unwrap_err();
        assert_eq!(
            err,
            ResolveError::Ambiguous {
                kind: "instance",
                identifier: "abc".into(),
                matches: vec!["abc123".into(), "abc999".into()],
            }
        );
        assert_eq!(
            err.to_string(),
            "ambiguous instance identifier \"abc\" matches: abc123, abc999"
        );
    }

    #[test]
    fn name_match() {
        assert_eq!(resolve("foo", &candidates()).unwrap(), "abc123");
    }

    #[test]
    fn not_found() {
        let err = resolve("zzz", &candidates()).unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { .. }));
        assert_eq!(err.to_string(), "no instance found matching \"zzz\"");
    }

    #[test]
    fn unique_prefix_and_exact_id() {
        assert_eq!(resolve("abc1", &candidates()).unwrap(), "abc123");
        assert_eq!(resolve("abc999", &candidates()).unwrap(), "abc999");
    }

    #[test]
    fn exact_match_wins_after_prefix_matches() {
        let list = vec![
            Entity { id: "web-1a", name: "one" },
            Entity { id: "web-1b", name: "two" },
            Entity { id: "f00", name: "web-1" },
        ];
        assert_eq!(resolve("web-1", &list).unwrap(), "f00");
    }

    #[test]
    fn ambiguous_ids_are_shortened() {
        let list = vec![
            Entity { id: "0123456789abcdef", name: "a" },
            Entity { id: "0123456789abffff", name: "b" },
        ];
        match resolve("0123", &list) {
            Err(ResolveError::Ambiguous { matches, .. }) => {
                assert_eq!(matches, vec!["0123456789ab", "0123456789ab"]);
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }
    }

    #[test]
    fn empty_candidate_list() {
        let list: Vec<Entity> = Vec::new();
        assert!(matches!(resolve("x", &list), Err(ResolveError::NotFound { .. })));
    }
}
