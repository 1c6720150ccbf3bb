//! Indirect `${a.b.c}` reference resolution over a settings tree.
//!
//! References are evaluated depth-first with an explicit stack, so deeply
//! chained settings cannot exhaust the call stack. The stack doubles as the
//! current reference chain, which is what a cycle error reports.

use super::{ConfigNode, ConfigPath, ConfigText, ConfigTree, TextSegment};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Top-level key under which a configuration's own effective values are
/// mounted during interpolation.
pub const ENV_ROOT: &str = "env";

/// Errors returned while resolving path references.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InterpolationError {
    /// References form a cycle.
    #[error("cyclic settings reference: {}", chain.join(" -> "))]
    CyclicReference {
        /// The cycle, starting and ending at the same path.
        chain: Vec<String>,
    },

    /// A reference names a path with no value.
    #[error("unresolved settings reference '{reference}' in '{referenced_from}'")]
    UnresolvedReference {
        /// The dangling path.
        reference: String,
        /// The path whose value contains the reference.
        referenced_from: String,
    },

    /// A reference names a map rather than a value.
    #[error("settings reference '{reference}' names a map, not a value")]
    ReferenceToMap {
        /// The offending path.
        reference: String,
    },
}

/// Resolves every top-level value of `effective` against `shared`, with
/// `effective` also reachable under the `env.` root.
///
/// Variable tokens such as `${CACHE_TAG:-latest}` are left in place.
///
/// # Errors
///
/// Returns [`InterpolationError`] for cycles, dangling references and
/// references to maps.
///
/// # Examples
///
/// ```
/// use deckhand::configuration::domain::{ConfigTree, interpolate_env};
///
/// let effective = ConfigTree::from_values([
///     ("CACHE_HOST", "cache-1"),
///     ("CACHE_URL", "redis://${env.CACHE_HOST}:6379"),
/// ]);
/// let env = interpolate_env(&effective, &ConfigTree::new()).expect("should resolve");
/// assert_eq!(env.get("CACHE_URL").map(String::as_str), Some("redis://cache-1:6379"));
/// ```
pub fn interpolate_env(
    effective: &ConfigTree,
    shared: &ConfigTree,
) -> Result<BTreeMap<String, String>, InterpolationError> {
    let universe = shared.with_mount(ENV_ROOT, effective);
    let mut resolver = Resolver::new(&universe);
    let mut env = BTreeMap::new();
    for key in effective.top_level_paths() {
        let value = resolver.resolve(&key.under(ENV_ROOT))?;
        env.insert(key.root().to_owned(), value);
    }
    Ok(env)
}

/// Resolves the value of a single path in `tree`.
///
/// # Errors
///
/// Returns [`InterpolationError`] for cycles, dangling references and
/// references to maps.
pub fn resolve_path(tree: &ConfigTree, path: &ConfigPath) -> Result<String, InterpolationError> {
    Resolver::new(tree).resolve(path)
}

struct Resolver<'a> {
    tree: &'a ConfigTree,
    resolved: HashMap<ConfigPath, String>,
}

impl<'a> Resolver<'a> {
    fn new(tree: &'a ConfigTree) -> Self {
        Self {
            tree,
            resolved: HashMap::new(),
        }
    }

    fn resolve(&mut self, start: &ConfigPath) -> Result<String, InterpolationError> {
        let mut stack: Vec<ConfigPath> = vec![start.clone()];

        while let Some(current) = stack.last().cloned() {
            if self.resolved.contains_key(&current) {
                stack.pop();
                continue;
            }

            let text = self.lookup(&current, &stack)?;
            let pending = text
                .references()
                .find(|reference| !self.resolved.contains_key(*reference))
                .cloned();

            match pending {
                Some(reference) if stack.contains(&reference) => {
                    let mut chain: Vec<String> = stack
                        .iter()
                        .skip_while(|path| **path != reference)
                        .map(ToString::to_string)
                        .collect();
                    chain.push(reference.to_string());
                    return Err(InterpolationError::CyclicReference { chain });
                }
                Some(reference) => stack.push(reference),
                None => {
                    let value = self.render(text);
                    self.resolved.insert(current, value);
                    stack.pop();
                }
            }
        }

        self.resolved
            .get(start)
            .cloned()
            .ok_or_else(|| InterpolationError::UnresolvedReference {
                reference: start.to_string(),
                referenced_from: start.to_string(),
            })
    }

    fn lookup(
        &self,
        path: &ConfigPath,
        stack: &[ConfigPath],
    ) -> Result<&'a ConfigText, InterpolationError> {
        match self.tree.get(path) {
            Some(ConfigNode::Value(text)) => Ok(text),
            Some(ConfigNode::Map(_)) => Err(InterpolationError::ReferenceToMap {
                reference: path.to_string(),
            }),
            None => {
                let referenced_from = stack
                    .iter()
                    .rev()
                    .nth(1)
                    .map_or_else(|| path.to_string(), ToString::to_string);
                Err(InterpolationError::UnresolvedReference {
                    reference: path.to_string(),
                    referenced_from,
                })
            }
        }
    }

    fn render(&self, text: &ConfigText) -> String {
        let mut output = String::new();
        for segment in text.segments() {
            match segment {
                TextSegment::Literal(literal) => output.push_str(literal),
                TextSegment::Reference(reference) => {
                    if let Some(value) = self.resolved.get(reference) {
                        output.push_str(value);
                    }
                }
            }
        }
        output
    }
}
