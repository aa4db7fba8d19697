// src/resolve/matcher.rs

use regex::Regex;

use crate::errors::Result;

use super::closure::ExternalNameSet;

/// Predicate deciding whether an import identifier is external.
///
/// An identifier is external when it equals one of the names, or starts
/// with one of them followed by `/` (a deep import such as `lodash/map`).
/// `lodash-es` is therefore *not* matched by `lodash`.
///
/// An empty name set yields a matcher that never matches, which is what a
/// fully self-contained artifact needs.
#[derive(Debug, Clone)]
pub struct ExternalMatcher {
    names: Vec<String>,
    pattern: Option<Regex>,
}

impl ExternalMatcher {
    pub fn compile(names: &ExternalNameSet) -> Result<Self> {
        if names.is_empty() {
            return Ok(Self {
                names: Vec::new(),
                pattern: None,
            });
        }

        let alternation = names
            .iter()
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join("|");
        let pattern = Regex::new(&format!("^(?:{alternation})(?:$|/)"))?;

        Ok(Self {
            names: names.as_slice().to_vec(),
            pattern: Some(pattern),
        })
    }

    pub fn is_external(&self, id: &str) -> bool {
        match &self.pattern {
            Some(re) => re.is_match(id),
            None => false,
        }
    }

    /// Source of the compiled pattern, for engines evaluating it themselves.
    pub fn pattern_source(&self) -> Option<&str> {
        self.pattern.as_ref().map(Regex::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Turn the matcher into a plain closure.
    pub fn into_predicate(self) -> impl Fn(&str) -> bool + Send + Sync + 'static {
        move |id: &str| self.is_external(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(names: &[&str]) -> ExternalMatcher {
        let set: ExternalNameSet = names.iter().copied().collect();
        ExternalMatcher::compile(&set).unwrap()
    }

    #[test]
    fn exact_and_deep_imports_match() {
        let m = matcher(&["lodash"]);
        assert!(m.is_external("lodash"));
        assert!(m.is_external("lodash/map"));
        assert!(!m.is_external("lodash-es"));
        assert!(!m.is_external("my-lodash"));
    }

    #[test]
    fn empty_set_matches_nothing() {
        let m = matcher(&[]);
        assert!(!m.is_external("react"));
        assert!(!m.is_external(""));
        assert!(m.pattern_source().is_none());
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let m = matcher(&["@scope/pkg.js", "c++"]);
        assert!(m.is_external("@scope/pkg.js"));
        assert!(m.is_external("@scope/pkg.js/sub"));
        assert!(!m.is_external("@scope/pkgXjs"));
        assert!(m.is_external("c++"));
        assert!(!m.is_external("cc"));
    }

    #[test]
    fn scoped_package_root_does_not_match_siblings() {
        let m = matcher(&["@emotion/core"]);
        assert!(m.is_external("@emotion/core/macro"));
        assert!(!m.is_external("@emotion/styled"));
        assert!(!m.is_external("@emotion"));
    }

    #[test]
    fn predicate_closure_agrees() {
        let predicate = matcher(&["react"]).into_predicate();
        assert!(predicate("react/jsx-runtime"));
        assert!(!predicate("preact"));
    }
}
