//! Conditional component-presence evaluation.
//!
//! Declarative predicates ("match if a component of type/name/marker X is
//! [not] present") are evaluated against a [`ComponentRegistry`] snapshot,
//! optionally traversing a parent registry hierarchy. Every outcome carries
//! a diagnostic message explaining what matched or didn't.

use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConditionError {
    #[error("presence spec declares no name, type or marker clause")]
    EmptySpec,

    #[error("search scope 'ancestors' requires a parent registry")]
    NoParentRegistry,
}

/// A registered component: its type name, marker set, and whether it is the
/// preferred candidate among several of the same type.
#[derive(Debug, Clone)]
pub struct Component {
    type_name: String,
    markers: Vec<String>,
    primary: bool,
}

impl Component {
    pub fn of_type(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            markers: Vec::new(),
            primary: false,
        }
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.markers.push(marker.into());
        self
    }

    /// Flags this component as the preferred candidate for single-candidate
    /// resolution.
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }
}

/// A snapshot of named components, optionally chained to a parent registry.
#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    components: Vec<(String, Component)>,
    parent: Option<Arc<ComponentRegistry>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent(parent: Arc<ComponentRegistry>) -> Self {
        Self {
            components: Vec::new(),
            parent: Some(parent),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, component: Component) {
        self.components.push((name.into(), component));
    }

    fn names_for_type(&self, type_name: &str, hierarchy: bool) -> Vec<String> {
        let mut names: Vec<String> = self
            .components
            .iter()
            .filter(|(_, c)| c.type_name == type_name)
            .map(|(n, _)| n.clone())
            .collect();
        if hierarchy {
            if let Some(parent) = &self.parent {
                for name in parent.names_for_type(type_name, true) {
                    if !names.contains(&name) {
                        names.push(name);
                    }
                }
            }
        }
        names
    }

    fn names_for_marker(&self, marker: &str, hierarchy: bool) -> Vec<String> {
        let mut names: Vec<String> = self
            .components
            .iter()
            .filter(|(_, c)| c.markers.iter().any(|m| m == marker))
            .map(|(n, _)| n.clone())
            .collect();
        if hierarchy {
            if let Some(parent) = &self.parent {
                for name in parent.names_for_marker(marker, true) {
                    if !names.contains(&name) {
                        names.push(name);
                    }
                }
            }
        }
        names
    }

    fn find(&self, name: &str, hierarchy: bool) -> Option<&Component> {
        match self.components.iter().find(|(n, _)| n == name) {
            Some((_, component)) => Some(component),
            None if hierarchy => self.parent.as_ref().and_then(|p| p.find(name, true)),
            None => None,
        }
    }

    fn contains(&self, name: &str, hierarchy: bool) -> bool {
        self.find(name, hierarchy).is_some()
    }
}

/// Where a presence search looks: the local registry only, only its
/// ancestors, or the whole hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchScope {
    Current,
    Ancestors,
    #[default]
    All,
}

/// A declarative presence predicate: names, types and markers to search
/// for, types to ignore, and the search scope.
///
/// Clauses are ANDed for presence checks; within one clause any single
/// registered candidate satisfies it.
#[derive(Debug, Clone, Default)]
#[must_use = "a spec does nothing until evaluated"]
pub struct PresenceSpec {
    names: Vec<String>,
    types: Vec<String>,
    markers: Vec<String>,
    ignored_types: Vec<String>,
    scope: SearchScope,
}

impl PresenceSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self
    }

    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.types.push(type_name.into());
        self
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.markers.push(marker.into());
        self
    }

    /// Removes candidates of this type from consideration before the
    /// match/no-match decision.
    pub fn ignoring_type(mut self, type_name: impl Into<String>) -> Self {
        self.ignored_types.push(type_name.into());
        self
    }

    pub fn in_scope(mut self, scope: SearchScope) -> Self {
        self.scope = scope;
        self
    }

    fn is_empty(&self) -> bool {
        self.names.is_empty() && self.types.is_empty() && self.markers.is_empty()
    }
}

/// Accumulated matches and misses from one spec evaluation.
#[derive(Debug, Clone, Default)]
pub struct MatchResult {
    matched_names: Vec<String>,
    unmatched_names: Vec<String>,
    matched_types: Vec<(String, Vec<String>)>,
    unmatched_types: Vec<String>,
    matched_markers: Vec<(String, Vec<String>)>,
    unmatched_markers: Vec<String>,
}

impl MatchResult {
    /// True when every declared clause found at least one candidate.
    pub fn is_all_matched(&self) -> bool {
        self.unmatched_names.is_empty()
            && self.unmatched_types.is_empty()
            && self.unmatched_markers.is_empty()
    }

    /// True when any clause found a candidate.
    pub fn is_any_matched(&self) -> bool {
        !self.matched_names.is_empty()
            || self.matched_types.iter().any(|(_, m)| !m.is_empty())
            || self.matched_markers.iter().any(|(_, m)| !m.is_empty())
    }

    /// The deduplicated names of every matched candidate.
    pub fn names_of_all_matches(&self) -> Vec<String> {
        let mut names = BTreeSet::new();
        names.extend(self.matched_names.iter().cloned());
        for (_, matches) in &self.matched_types {
            names.extend(matches.iter().cloned());
        }
        for (_, matches) in &self.matched_markers {
            names.extend(matches.iter().cloned());
        }
        names.into_iter().collect()
    }

    fn describe_unmatched(&self) -> String {
        let mut reason = String::new();
        append_clause(&mut reason, &self.unmatched_markers, "marked with");
        append_clause(&mut reason, &self.unmatched_types, "of type");
        append_clause(&mut reason, &self.unmatched_names, "named");
        reason
    }

    fn describe_matched(&self) -> String {
        let mut reason = String::new();
        for (marker, names) in &self.matched_markers {
            push_joined(
                &mut reason,
                &format!("found components marked with '{marker}': {}", names.join(", ")),
            );
        }
        for (type_name, names) in &self.matched_types {
            push_joined(
                &mut reason,
                &format!("found components of type '{type_name}': {}", names.join(", ")),
            );
        }
        if !self.matched_names.is_empty() {
            push_joined(
                &mut reason,
                &format!("found components named {}", self.matched_names.join(", ")),
            );
        }
        reason
    }
}

fn append_clause(reason: &mut String, unmatched: &[String], description: &str) {
    if !unmatched.is_empty() {
        push_joined(
            reason,
            &format!(
                "did not find any components {description} {}",
                unmatched.join(", ")
            ),
        );
    }
}

fn push_joined(reason: &mut String, clause: &str) {
    if !reason.is_empty() {
        reason.push_str(" and ");
    }
    reason.push_str(clause);
}

/// The decision computed for one predicate, with a diagnostic message.
#[derive(Debug, Clone)]
pub struct ConditionOutcome {
    matched: bool,
    message: String,
}

impl ConditionOutcome {
    pub fn matched(message: impl Into<String>) -> Self {
        Self {
            matched: true,
            message: message.into(),
        }
    }

    pub fn no_match(message: impl Into<String>) -> Self {
        Self {
            matched: false,
            message: message.into(),
        }
    }

    pub fn is_matched(&self) -> bool {
        self.matched
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Evaluates presence predicates against a registry snapshot.
pub struct ConditionEvaluator<'a> {
    registry: &'a ComponentRegistry,
}

impl<'a> ConditionEvaluator<'a> {
    pub fn new(registry: &'a ComponentRegistry) -> Self {
        Self { registry }
    }

    /// Runs the raw search and returns the accumulated matches.
    pub fn matches(&self, spec: &PresenceSpec) -> Result<MatchResult, ConditionError> {
        if spec.is_empty() {
            return Err(ConditionError::EmptySpec);
        }
        let (registry, hierarchy) = self.scoped_registry(spec)?;

        let mut ignored = BTreeSet::new();
        for ignored_type in &spec.ignored_types {
            ignored.extend(registry.names_for_type(ignored_type, hierarchy));
        }

        let mut result = MatchResult::default();
        for type_name in &spec.types {
            let matches: Vec<String> = registry
                .names_for_type(type_name, hierarchy)
                .into_iter()
                .filter(|n| !ignored.contains(n))
                .collect();
            if matches.is_empty() {
                result.unmatched_types.push(type_name.clone());
            } else {
                result.matched_types.push((type_name.clone(), matches));
            }
        }
        for marker in &spec.markers {
            let matches: Vec<String> = registry
                .names_for_marker(marker, hierarchy)
                .into_iter()
                .filter(|n| !ignored.contains(n))
                .collect();
            if matches.is_empty() {
                result.unmatched_markers.push(marker.clone());
            } else {
                result.matched_markers.push((marker.clone(), matches));
            }
        }
        for name in &spec.names {
            if !ignored.contains(name) && registry.contains(name, hierarchy) {
                result.matched_names.push(name.clone());
            } else {
                result.unmatched_names.push(name.clone());
            }
        }
        Ok(result)
    }

    /// Satisfied only if every declared clause finds at least one match.
    pub fn evaluate_present(
        &self,
        spec: &PresenceSpec,
    ) -> Result<ConditionOutcome, ConditionError> {
        let result = self.matches(spec)?;
        let outcome = if result.is_all_matched() {
            ConditionOutcome::matched(format!(
                "found matching components: {}",
                result.names_of_all_matches().join(", ")
            ))
        } else {
            ConditionOutcome::no_match(result.describe_unmatched())
        };
        tracing::debug!("presence condition: {}", outcome.message());
        Ok(outcome)
    }

    /// Satisfied only if no clause finds any match.
    pub fn evaluate_absent(&self, spec: &PresenceSpec) -> Result<ConditionOutcome, ConditionError> {
        let result = self.matches(spec)?;
        let outcome = if result.is_any_matched() {
            ConditionOutcome::no_match(result.describe_matched())
        } else {
            ConditionOutcome::matched("did not find any matching components")
        };
        tracing::debug!("absence condition: {}", outcome.message());
        Ok(outcome)
    }

    /// Satisfied if the clauses match and the candidates resolve to a single
    /// one: either exactly one match, or exactly one flagged primary.
    pub fn evaluate_single_candidate(
        &self,
        spec: &PresenceSpec,
    ) -> Result<ConditionOutcome, ConditionError> {
        let result = self.matches(spec)?;
        if !result.is_all_matched() {
            return Ok(ConditionOutcome::no_match("did not find any components"));
        }
        let matches = result.names_of_all_matches();
        if matches.len() == 1 {
            return Ok(ConditionOutcome::matched(format!(
                "found a single component: {}",
                matches[0]
            )));
        }
        let (registry, hierarchy) = self.scoped_registry(spec)?;
        let primaries: Vec<&String> = matches
            .iter()
            .filter(|name| registry.find(name, hierarchy).is_some_and(|c| c.primary))
            .collect();
        Ok(if primaries.len() == 1 {
            ConditionOutcome::matched(format!(
                "found a single primary component {} from: {}",
                primaries[0],
                matches.join(", ")
            ))
        } else {
            ConditionOutcome::no_match(format!(
                "did not find a single primary component from: {}",
                matches.join(", ")
            ))
        })
    }

    fn scoped_registry(
        &self,
        spec: &PresenceSpec,
    ) -> Result<(&ComponentRegistry, bool), ConditionError> {
        match spec.scope {
            SearchScope::Current => Ok((self.registry, false)),
            SearchScope::All => Ok((self.registry, true)),
            SearchScope::Ancestors => {
                let parent = self
                    .registry
                    .parent
                    .as_deref()
                    .ok_or(ConditionError::NoParentRegistry)?;
                Ok((parent, true))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ComponentRegistry {
        let mut registry = ComponentRegistry::new();
        registry.register("pool", Component::of_type("ConnectionPool"));
        registry.register(
            "cache",
            Component::of_type("Cache").with_marker("managed"),
        );
        registry
    }

    #[test]
    fn test_present_all_clauses_must_match() {
        let registry = registry();
        let evaluator = ConditionEvaluator::new(&registry);

        let both = PresenceSpec::new()
            .with_type("ConnectionPool")
            .with_name("cache");
        assert!(evaluator.evaluate_present(&both).unwrap().is_matched());

        let one_missing = PresenceSpec::new()
            .with_type("ConnectionPool")
            .with_type("Missing");
        let outcome = evaluator.evaluate_present(&one_missing).unwrap();
        assert!(!outcome.is_matched());
        assert!(outcome.message().contains("of type Missing"));
    }

    #[test]
    fn test_absent_no_clause_may_match() {
        let registry = registry();
        let evaluator = ConditionEvaluator::new(&registry);

        let missing = PresenceSpec::new().with_type("Missing");
        assert!(evaluator.evaluate_absent(&missing).unwrap().is_matched());

        let partly_present = PresenceSpec::new()
            .with_type("Missing")
            .with_marker("managed");
        let outcome = evaluator.evaluate_absent(&partly_present).unwrap();
        assert!(!outcome.is_matched());
        assert!(outcome.message().contains("marked with 'managed'"));
    }

    #[test]
    fn test_empty_spec_is_an_error() {
        let registry = registry();
        let evaluator = ConditionEvaluator::new(&registry);
        let result = evaluator.evaluate_present(&PresenceSpec::new());
        assert!(matches!(result, Err(ConditionError::EmptySpec)));
    }

    #[test]
    fn test_ignored_types_are_removed_before_decision() {
        let registry = registry();
        let evaluator = ConditionEvaluator::new(&registry);
        let spec = PresenceSpec::new()
            .with_type("Cache")
            .ignoring_type("Cache");
        assert!(!evaluator.evaluate_present(&spec).unwrap().is_matched());
    }

    #[test]
    fn test_single_candidate_unique_match() {
        let registry = registry();
        let evaluator = ConditionEvaluator::new(&registry);
        let spec = PresenceSpec::new().with_type("Cache");
        assert!(evaluator
            .evaluate_single_candidate(&spec)
            .unwrap()
            .is_matched());
    }

    #[test]
    fn test_single_candidate_primary_tie_break() {
        let mut registry = ComponentRegistry::new();
        registry.register("a", Component::of_type("Cache"));
        registry.register("b", Component::of_type("Cache").primary());
        let evaluator = ConditionEvaluator::new(&registry);
        let spec = PresenceSpec::new().with_type("Cache");
        let outcome = evaluator.evaluate_single_candidate(&spec).unwrap();
        assert!(outcome.is_matched());
        assert!(outcome.message().contains("b"));

        // A second primary breaks the tie-break.
        registry.register("c", Component::of_type("Cache").primary());
        let evaluator = ConditionEvaluator::new(&registry);
        let outcome = evaluator.evaluate_single_candidate(&spec).unwrap();
        assert!(!outcome.is_matched());
        assert!(outcome.message().contains("a, b, c"));
    }

    #[test]
    fn test_single_candidate_multiple_without_primary() {
        let mut registry = ComponentRegistry::new();
        registry.register("a", Component::of_type("Cache"));
        registry.register("b", Component::of_type("Cache"));
        let evaluator = ConditionEvaluator::new(&registry);
        let spec = PresenceSpec::new().with_type("Cache");
        let outcome = evaluator.evaluate_single_candidate(&spec).unwrap();
        assert!(!outcome.is_matched());
        assert!(outcome.message().contains("a, b"));
    }

    #[test]
    fn test_scope_traversal() {
        let mut parent = ComponentRegistry::new();
        parent.register("root-pool", Component::of_type("ConnectionPool"));
        let parent = Arc::new(parent);
        let mut child = ComponentRegistry::with_parent(Arc::clone(&parent));
        child.register("child-cache", Component::of_type("Cache"));

        let evaluator = ConditionEvaluator::new(&child);
        let pool = PresenceSpec::new().with_type("ConnectionPool");

        // All: found through the hierarchy.
        assert!(evaluator.evaluate_present(&pool).unwrap().is_matched());
        // Current: local registry only.
        let current = pool.clone().in_scope(SearchScope::Current);
        assert!(!evaluator.evaluate_present(&current).unwrap().is_matched());
        // Ancestors: parent only; the child's cache is not visible.
        let ancestors = PresenceSpec::new()
            .with_type("Cache")
            .in_scope(SearchScope::Ancestors);
        assert!(!evaluator.evaluate_present(&ancestors).unwrap().is_matched());
    }

    #[test]
    fn test_scope_ancestors_without_parent() {
        let registry = registry();
        let evaluator = ConditionEvaluator::new(&registry);
        let spec = PresenceSpec::new()
            .with_type("Cache")
            .in_scope(SearchScope::Ancestors);
        assert!(matches!(
            evaluator.evaluate_present(&spec),
            Err(ConditionError::NoParentRegistry)
        ));
    }
}
