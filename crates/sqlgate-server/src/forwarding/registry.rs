//! Ordered, first-match-wins pattern registries and the routing tables built
//! from configuration.

use std::time::Duration;

use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use thiserror::Error;

use super::pattern::{GlobPattern, PatternError};
use super::transformer::{TransformError, TransformSpec};
use crate::config::{DestinationConfig, RoutingTablesConfig};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{context}: {source}")]
    Pattern {
        context: String,
        #[source]
        source: PatternError,
    },

    #[error("{context}: invalid URL {url:?}: {reason}")]
    Url {
        context: String,
        url: String,
        reason: String,
    },

    #[error("{context}: invalid HTTP method {method:?}")]
    Method { context: String, method: String },

    #[error("{context}: invalid header {name:?}")]
    Header { context: String, name: String },

    #[error("{context}: timeout_ms must be > 0")]
    Timeout { context: String },

    #[error("{context}: {source}")]
    Transform {
        context: String,
        #[source]
        source: TransformError,
    },
}

/// One registered rule: a compiled pattern and its payload.
#[derive(Debug, Clone)]
pub struct PatternEntry<T> {
    pub pattern: GlobPattern,
    pub description: Option<String>,
    pub value: T,
}

/// Registration order is precedence order.
#[derive(Debug, Clone)]
pub struct PatternRegistry<T> {
    entries: Vec<PatternEntry<T>>,
}

impl<T> Default for PatternRegistry<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> PatternRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles `pattern` and appends the rule after every existing one.
    pub fn register(
        &mut self,
        pattern: &str,
        description: Option<String>,
        value: T,
    ) -> Result<(), PatternError> {
        let pattern = GlobPattern::compile(pattern)?;
        self.entries.push(PatternEntry {
            pattern,
            description,
            value,
        });
        Ok(())
    }

    /// The first entry whose pattern matches `candidate`.
    pub fn resolve(&self, candidate: &str) -> Option<&PatternEntry<T>> {
        self.entries.iter().find(|e| e.pattern.matches(candidate))
    }

    pub fn entries(&self) -> &[PatternEntry<T>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A downstream service requests are forwarded to.
#[derive(Debug, Clone)]
pub struct Destination {
    pub url: String,
    pub method: Method,
    pub headers: HeaderMap,
    /// Overrides the timeout class when set.
    pub timeout: Option<Duration>,
}

impl Destination {
    pub fn from_config(config: &DestinationConfig, context: &str) -> Result<Self, RegistryError> {
        url::Url::parse(&config.url).map_err(|e| RegistryError::Url {
            context: context.to_string(),
            url: config.url.clone(),
            reason: e.to_string(),
        })?;
        let method = match config.method.as_deref() {
            Some(m) => parse_method(m, context)?,
            None => Method::POST,
        };
        if config.timeout_ms == Some(0) {
            return Err(RegistryError::Timeout {
                context: context.to_string(),
            });
        }
        Ok(Self {
            url: config.url.clone(),
            method,
            headers: parse_headers(config.headers.iter(), context)?,
            timeout: config.timeout_ms.map(Duration::from_millis),
        })
    }
}

/// Per-destination overrides applied on top of the destination's own settings.
#[derive(Debug, Clone)]
pub struct TransformerRule {
    pub method: Option<Method>,
    pub headers: HeaderMap,
    pub transform: TransformSpec,
}

/// Request path → destination.
pub type DestinationRouter = PatternRegistry<Destination>;

/// Destination URL → transformer.
pub type TransformerRegistry = PatternRegistry<TransformerRule>;

/// The immutable routing state swapped as one unit.
#[derive(Debug, Clone, Default)]
pub struct ForwardingTables {
    pub routes: DestinationRouter,
    pub transformers: TransformerRegistry,
    pub default_destination: Option<Destination>,
    pub default_transformer: Option<TransformSpec>,
    config: RoutingTablesConfig,
}

impl ForwardingTables {
    /// Validates and compiles every rule; nothing is kept on the first error.
    pub fn from_config(config: &RoutingTablesConfig) -> Result<Self, RegistryError> {
        let mut routes = DestinationRouter::new();
        for (i, route) in config.routes.iter().enumerate() {
            let context = format!("forwarding.routes[{i}]");
            let destination = Destination::from_config(&route.destination, &context)?;
            routes
                .register(&route.pattern, route.description.clone(), destination)
                .map_err(|source| RegistryError::Pattern { context, source })?;
        }

        let mut transformers = TransformerRegistry::new();
        for (i, entry) in config.transformers.iter().enumerate() {
            let context = format!("forwarding.transformers[{i}]");
            entry
                .transform
                .validate()
                .map_err(|source| RegistryError::Transform {
                    context: context.clone(),
                    source,
                })?;
            let rule = TransformerRule {
                method: entry
                    .method
                    .as_deref()
                    .map(|m| parse_method(m, &context))
                    .transpose()?,
                headers: parse_headers(entry.headers.iter(), &context)?,
                transform: entry.transform.clone(),
            };
            transformers
                .register(&entry.pattern, entry.description.clone(), rule)
                .map_err(|source| RegistryError::Pattern { context, source })?;
        }

        let default_destination = config
            .default_destination
            .as_ref()
            .map(|d| Destination::from_config(d, "forwarding.default_destination"))
            .transpose()?;

        if let Some(spec) = &config.default_transformer {
            spec.validate().map_err(|source| RegistryError::Transform {
                context: "forwarding.default_transformer".into(),
                source,
            })?;
        }

        Ok(Self {
            routes,
            transformers,
            default_destination,
            default_transformer: config.default_transformer.clone(),
            config: config.clone(),
        })
    }

    /// The configuration these tables were compiled from.
    pub fn config(&self) -> &RoutingTablesConfig {
        &self.config
    }
}

fn parse_method(method: &str, context: &str) -> Result<Method, RegistryError> {
    Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes()).map_err(|_| {
        RegistryError::Method {
            context: context.to_string(),
            method: method.to_string(),
        }
    })
}

fn parse_headers<'a>(
    headers: impl Iterator<Item = (&'a String, &'a String)>,
    context: &str,
) -> Result<HeaderMap, RegistryError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let invalid = || RegistryError::Header {
            context: context.to_string(),
            name: name.clone(),
        };
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
        let value = HeaderValue::from_str(value).map_err(|_| invalid())?;
        map.insert(name, value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DestinationRouteConfig, TransformerConfig};
    use indexmap::IndexMap;

    fn destination(url: &str) -> DestinationConfig {
        DestinationConfig {
            url: url.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_first_match_wins() {
        let mut registry = PatternRegistry::new();
        registry.register("*/exec", None, "exec").unwrap();
        registry.register("localhost:*", None, "local").unwrap();

        let hit = registry.resolve("http://localhost/exec").unwrap();
        assert_eq!(hit.pattern.as_str(), "*/exec");
        assert_eq!(hit.value, "exec");
        assert_eq!(
            registry.resolve("http://localhost:3000/x").unwrap().value,
            "local"
        );
        assert!(registry.resolve("http://example.com/x").is_none());
    }

    #[test]
    fn test_register_rejects_empty_pattern() {
        let mut registry = PatternRegistry::new();
        assert!(registry.register("", None, ()).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_destination_defaults_to_post() {
        let dest = Destination::from_config(&destination("http://svc/exec"), "t").unwrap();
        assert_eq!(dest.method, Method::POST);
        assert!(dest.timeout.is_none());
    }

    #[test]
    fn test_destination_validation() {
        assert!(matches!(
            Destination::from_config(&destination("not a url"), "t"),
            Err(RegistryError::Url { .. })
        ));

        let mut cfg = destination("http://svc");
        cfg.method = Some("NOT A METHOD".into());
        assert!(matches!(
            Destination::from_config(&cfg, "t"),
            Err(RegistryError::Method { .. })
        ));

        let mut cfg = destination("http://svc");
        cfg.headers = IndexMap::from([("bad header".to_string(), "x".to_string())]);
        assert!(matches!(
            Destination::from_config(&cfg, "t"),
            Err(RegistryError::Header { .. })
        ));

        let mut cfg = destination("http://svc");
        cfg.timeout_ms = Some(0);
        assert!(matches!(
            Destination::from_config(&cfg, "t"),
            Err(RegistryError::Timeout { .. })
        ));
    }

    #[test]
    fn test_tables_from_config_keep_order() {
        let config = RoutingTablesConfig {
            routes: vec![
                DestinationRouteConfig {
                    pattern: "/api/orders*".into(),
                    description: Some("orders".into()),
                    destination: destination("http://orders/exec"),
                },
                DestinationRouteConfig {
                    pattern: "/api/*".into(),
                    description: None,
                    destination: destination("http://catch-all/ingest"),
                },
            ],
            transformers: vec![TransformerConfig {
                pattern: "*/exec".into(),
                method: Some("put".into()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let tables = ForwardingTables::from_config(&config).unwrap();
        assert_eq!(tables.routes.len(), 2);
        assert_eq!(
            tables.routes.resolve("/api/orders/7").unwrap().value.url,
            "http://orders/exec"
        );
        assert_eq!(
            tables.routes.resolve("/api/customers").unwrap().value.url,
            "http://catch-all/ingest"
        );
        let rule = &tables.transformers.resolve("http://orders/exec").unwrap().value;
        assert_eq!(rule.method, Some(Method::PUT));
        assert_eq!(tables.config().routes.len(), 2);
    }

    #[test]
    fn test_tables_reject_bad_route_with_context() {
        let config = RoutingTablesConfig {
            routes: vec![DestinationRouteConfig {
                pattern: "".into(),
                description: None,
                destination: destination("http://svc"),
            }],
            ..Default::default()
        };
        let err = ForwardingTables::from_config(&config).unwrap_err();
        assert!(err.to_string().starts_with("forwarding.routes[0]"));
    }
}
