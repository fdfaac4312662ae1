//! Declarative route table.
//!
//! Maps paths to the roles they require. The guard consults this table on
//! every navigation; routes themselves never embed authorization logic.
//!
//! Patterns are either exact (`/agenda`) or a prefix wildcard
//! (`/configuracoes/*`). The most specific match wins: exact beats prefix,
//! longer prefix beats shorter.

use crate::config::RoutePaths;
use crate::storage::Role;

// =============================================================================
// Route Rule
// =============================================================================

/// One route pattern with its role requirement.
#[derive(Debug, Clone)]
pub struct RouteRule {
    pattern: String,
    required_roles: Vec<Role>,
}

impl RouteRule {
    /// Creates a rule for the given pattern.
    #[must_use]
    pub fn new(pattern: impl Into<String>, required_roles: Vec<Role>) -> Self {
        Self {
            pattern: pattern.into(),
            required_roles,
        }
    }

    /// Match specificity: `None` for no match, otherwise higher is better.
    fn specificity(&self, path: &str) -> Option<usize> {
        if let Some(prefix) = self.pattern.strip_suffix("/*") {
            let matches = path == prefix
                || (path.starts_with(prefix) && path.as_bytes().get(prefix.len()) == Some(&b'/'));
            matches.then(|| prefix.len())
        } else {
            (self.pattern == path).then(|| self.pattern.len() + 1024)
        }
    }
}

// =============================================================================
// Route Table
// =============================================================================

/// The application's route table.
#[derive(Debug, Clone)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
    paths: RoutePaths,
}

impl RouteTable {
    /// Creates an empty table with the given well-known paths.
    #[must_use]
    pub fn new(paths: RoutePaths) -> Self {
        Self {
            rules: Vec::new(),
            paths,
        }
    }

    /// Adds a route rule.
    #[must_use]
    pub fn route(mut self, pattern: impl Into<String>, required_roles: Vec<Role>) -> Self {
        self.rules.push(RouteRule::new(pattern, required_roles));
        self
    }

    /// The roles required for `path`. Empty means any signed-in user.
    #[must_use]
    pub fn required_roles(&self, path: &str) -> Vec<Role> {
        self.rules
            .iter()
            .filter_map(|rule| rule.specificity(path).map(|score| (score, rule)))
            .max_by_key(|(score, _)| *score)
            .map(|(_, rule)| rule.required_roles.clone())
            .unwrap_or_default()
    }

    /// The well-known redirect targets.
    #[must_use]
    pub fn paths(&self) -> &RoutePaths {
        &self.paths
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new(RoutePaths::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RouteTable {
        RouteTable::default()
            .route("/financeiro", vec![Role::Owner, Role::Manager])
            .route("/configuracoes/*", vec![Role::Owner])
            .route(
                "/configuracoes/perfil",
                vec![Role::Owner, Role::Manager, Role::Professional],
            )
            .route("/agenda", vec![Role::Professional, Role::Receptionist])
    }

    #[test]
    fn test_exact_match() {
        assert_eq!(
            table().required_roles("/financeiro"),
            vec![Role::Owner, Role::Manager]
        );
    }

    #[test]
    fn test_unlisted_route_has_no_requirement() {
        assert!(table().required_roles("/dashboard").is_empty());
    }

    #[test]
    fn test_prefix_wildcard() {
        assert_eq!(
            table().required_roles("/configuracoes/clinica"),
            vec![Role::Owner]
        );
        // The bare prefix itself also matches.
        assert_eq!(table().required_roles("/configuracoes"), vec![Role::Owner]);
    }

    #[test]
    fn test_exact_beats_wildcard() {
        assert_eq!(
            table().required_roles("/configuracoes/perfil"),
            vec![Role::Owner, Role::Manager, Role::Professional]
        );
    }

    #[test]
    fn test_wildcard_requires_segment_boundary() {
        // "/configuracoesX" must not match "/configuracoes/*".
        assert!(table().required_roles("/configuracoesX").is_empty());
    }
}
