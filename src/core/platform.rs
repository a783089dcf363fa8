//! Canonical platforms and user alias resolution.
//!
//! Users name platforms with short tokens (`win64`, `linux32`, ...). The
//! registry groups those tokens under canonical platforms, which is what
//! project definitions and generator selection work with.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use thiserror::Error;

/// Platform resolution errors.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// A user token matched no canonical platform. Fatal for the whole run.
    #[error("unknown platform `{token}` (known platforms: {})", .known.join(", "))]
    Unknown { token: String, known: Vec<String> },
}

/// A normalized platform identifier and the user tokens it accepts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalPlatform {
    name: String,
    aliases: BTreeSet<String>,
}

impl CanonicalPlatform {
    /// Create a canonical platform accepting the given aliases.
    pub fn new<I, S>(name: impl Into<String>, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CanonicalPlatform {
            name: name.into(),
            aliases: aliases.into_iter().map(Into::into).collect(),
        }
    }

    /// Canonical name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Accepted aliases.
    pub fn aliases(&self) -> &BTreeSet<String> {
        &self.aliases
    }

    /// Check if `token` is one of this platform's aliases.
    pub fn accepts(&self, token: &str) -> bool {
        self.aliases.contains(token)
    }

    /// Check if any of `supported` is an alias of this platform.
    pub fn intersects<S: AsRef<str>>(&self, supported: &[S]) -> bool {
        supported.iter().any(|s| self.accepts(s.as_ref()))
    }
}

impl fmt::Display for CanonicalPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Requested platforms grouped by canonical platform, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformMap {
    entries: Vec<(CanonicalPlatform, Vec<String>)>,
}

impl PlatformMap {
    /// Canonical platforms, in first-seen order.
    pub fn platforms(&self) -> impl Iterator<Item = &CanonicalPlatform> + '_ {
        self.entries.iter().map(|(p, _)| p)
    }

    /// Canonical platforms as an owned list.
    pub fn platform_list(&self) -> Vec<CanonicalPlatform> {
        self.platforms().cloned().collect()
    }

    /// User tokens that resolved to the named canonical platform.
    pub fn tokens(&self, name: &str) -> &[String] {
        self.entries
            .iter()
            .find(|(p, _)| p.name() == name)
            .map(|(_, tokens)| tokens.as_slice())
            .unwrap_or(&[])
    }

    /// All (platform, tokens) entries.
    pub fn iter(&self) -> impl Iterator<Item = (&CanonicalPlatform, &[String])> + '_ {
        self.entries.iter().map(|(p, t)| (p, t.as_slice()))
    }

    /// Check if a canonical platform was requested.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(p, _)| p.name() == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push_token(&mut self, platform: &CanonicalPlatform, token: &str) {
        match self.entries.iter_mut().find(|(p, _)| p.name() == platform.name()) {
            Some((_, tokens)) => {
                if !tokens.iter().any(|t| t == token) {
                    tokens.push(token.to_string());
                }
            }
            None => self
                .entries
                .push((platform.clone(), vec![token.to_string()])),
        }
    }
}

/// Registry of canonical platforms.
#[derive(Debug, Clone)]
pub struct PlatformRegistry {
    platforms: Vec<CanonicalPlatform>,
}

impl PlatformRegistry {
    /// Create a registry from an explicit platform list.
    pub fn new(platforms: Vec<CanonicalPlatform>) -> Self {
        PlatformRegistry { platforms }
    }

    /// Built-in platforms: windows, linux and macos.
    pub fn builtin() -> Self {
        PlatformRegistry::new(vec![
            CanonicalPlatform::new("windows", ["win32", "win64"]),
            CanonicalPlatform::new("linux", ["linux32", "linux64"]),
            CanonicalPlatform::new("macos", ["macos"]),
        ])
    }

    /// Add user aliases. Unknown canonical names become new platforms.
    pub fn with_aliases(mut self, extra: &BTreeMap<String, Vec<String>>) -> Self {
        for (name, aliases) in extra {
            match self.platforms.iter_mut().find(|p| &p.name == name) {
                Some(platform) => platform.aliases.extend(aliases.iter().cloned()),
                None => self
                    .platforms
                    .push(CanonicalPlatform::new(name.clone(), aliases.iter().cloned())),
            }
        }
        self
    }

    /// All canonical platforms in registration order.
    pub fn platforms(&self) -> &[CanonicalPlatform] {
        &self.platforms
    }

    /// Look up a canonical platform by name.
    pub fn get(&self, name: &str) -> Option<&CanonicalPlatform> {
        self.platforms.iter().find(|p| p.name == name)
    }

    /// First canonical platform accepting `token`.
    pub fn lookup(&self, token: &str) -> Result<&CanonicalPlatform, PlatformError> {
        self.platforms
            .iter()
            .find(|p| p.accepts(token))
            .ok_or_else(|| PlatformError::Unknown {
                token: token.to_string(),
                known: self.known_aliases(),
            })
    }

    /// Group user tokens by canonical platform.
    pub fn resolve<S: AsRef<str>>(&self, tokens: &[S]) -> Result<PlatformMap, PlatformError> {
        let mut map = PlatformMap::default();
        for token in tokens {
            let token = token.as_ref();
            let platform = self.lookup(token)?;
            map.push_token(platform, token);
        }
        Ok(map)
    }

    /// Resolve tokens to a de-duplicated, ordered list of canonical platforms.
    pub fn resolve_list<S: AsRef<str>>(
        &self,
        tokens: &[S],
    ) -> Result<Vec<CanonicalPlatform>, PlatformError> {
        Ok(self.resolve(tokens)?.platform_list())
    }

    /// The alias describing the machine we are running on.
    pub fn host_alias() -> &'static str {
        if cfg!(windows) {
            "win64"
        } else if cfg!(target_os = "macos") {
            "macos"
        } else if cfg!(target_pointer_width = "32") {
            "linux32"
        } else {
            "linux64"
        }
    }

    fn known_aliases(&self) -> Vec<String> {
        self.platforms
            .iter()
            .flat_map(|p| p.aliases.iter().cloned())
            .collect()
    }
}

impl Default for PlatformRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_groups_in_first_seen_order() {
        let registry = PlatformRegistry::builtin();
        let map = registry
            .resolve(&["linux64", "win32", "linux32", "win64"])
            .unwrap();

        let names: Vec<_> = map.platforms().map(|p| p.name()).collect();
        assert_eq!(names, vec!["linux", "windows"]);
        assert_eq!(map.tokens("linux"), ["linux64", "linux32"]);
        assert_eq!(map.tokens("windows"), ["win32", "win64"]);
        assert!(map.tokens("macos").is_empty());
    }

    #[test]
    fn test_resolve_unknown_token_is_error() {
        let registry = PlatformRegistry::builtin();
        let err = registry.resolve(&["win64", "ps3"]).unwrap_err();
        match err {
            PlatformError::Unknown { token, known } => {
                assert_eq!(token, "ps3");
                assert!(known.contains(&"linux64".to_string()));
            }
        }
    }

    #[test]
    fn test_resolve_list_dedupes() {
        let registry = PlatformRegistry::builtin();
        let list = registry.resolve_list(&["win32", "win64", "macos"]).unwrap();
        let names: Vec<_> = list.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["windows", "macos"]);
    }

    #[test]
    fn test_first_matching_platform_wins() {
        let registry = PlatformRegistry::new(vec![
            CanonicalPlatform::new("posix", ["linux64", "macos"]),
            CanonicalPlatform::new("linux", ["linux64"]),
        ]);
        let list = registry.resolve_list(&["linux64"]).unwrap();
        assert_eq!(list[0].name(), "posix");
    }

    #[test]
    fn test_with_aliases() {
        let mut extra = BTreeMap::new();
        extra.insert("windows".to_string(), vec!["windows".to_string()]);
        extra.insert("android".to_string(), vec!["android64".to_string()]);

        let registry = PlatformRegistry::builtin().with_aliases(&extra);
        assert_eq!(registry.lookup("windows").unwrap().name(), "windows");
        assert_eq!(registry.lookup("android64").unwrap().name(), "android");
    }

    #[test]
    fn test_host_alias_resolves() {
        let registry = PlatformRegistry::builtin();
        assert!(registry.lookup(PlatformRegistry::host_alias()).is_ok());
    }
}
