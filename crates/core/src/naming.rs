//! Operation naming and service ownership.
//!
//! [`NamePolicy`] is the single place that decides an operation's final id
//! and which package it belongs to. The services and builder passes both go
//! through it, built from the same [`GeneratorConfig`], so they cannot drift.
//!
//! Ownership precedence, first match wins:
//!
//! 1. `METHOD:path` operation id override (applied to the id first)
//! 2. operation id to service override
//! 3. reserved keyword in the path
//! 4. reserved keyword in the operation id
//! 5. `x-service` extension
//! 6. first tag
//! 7. segment after a routing prefix
//!
//! An operation that matches none of these is unowned and gets dropped.

use std::fmt;

use sdkgen_common::{GeneratorConfig, NamingConfig};

use crate::ir::api::HttpMethod;
use crate::ir::utils::{to_lower_camel, to_snake_ident};

/// Which precedence step assigned a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OwnershipRule {
    /// Operation id to service table.
    OperationOverride,
    /// Reserved keyword found in the path.
    PathKeyword,
    /// Reserved keyword found in the operation id.
    IdKeyword,
    /// `x-service` extension.
    Extension,
    /// First tag.
    Tag,
    /// Segment after a routing prefix.
    PathPrefix,
}

impl fmt::Display for OwnershipRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::OperationOverride => "operation-override",
            Self::PathKeyword => "path-keyword",
            Self::IdKeyword => "id-keyword",
            Self::Extension => "x-service",
            Self::Tag => "tag",
            Self::PathPrefix => "path-prefix",
        };
        f.write_str(name)
    }
}

/// Declared ownership hints on an operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnershipHints<'a> {
    /// `x-service` extension value.
    pub x_service: Option<&'a str>,
    /// Tags in document order.
    pub tags: &'a [String],
}

/// Resolved owner of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ownership {
    /// Service name before package mapping.
    pub service: String,
    /// Package (module) the operation is generated into.
    pub package: String,
    /// Step that decided the service.
    pub rule: OwnershipRule,
}

/// Resolves operation ids and owning packages from the shared config.
#[derive(Debug, Clone)]
pub struct NamePolicy<'a> {
    naming: &'a NamingConfig,
    keywords: Vec<String>,
}

impl<'a> NamePolicy<'a> {
    /// Policy over the `[naming]` tables of `config`.
    pub fn new(config: &'a GeneratorConfig) -> Self {
        Self::from_naming(&config.naming)
    }

    /// Policy over a bare `[naming]` section.
    pub fn from_naming(naming: &'a NamingConfig) -> Self {
        let keywords = naming
            .service_keywords
            .iter()
            .filter(|k| !k.is_empty())
            .map(|k| k.to_ascii_lowercase())
            .collect();
        Self { naming, keywords }
    }

    /// Final operation id.
    ///
    /// The `METHOD:path` override wins over the declared id. Without either,
    /// an id is synthesized from the method and literal path segments
    /// (`GET /v4/products` becomes `getV4Products`).
    pub fn resolve_operation_id(
        &self,
        method: HttpMethod,
        path: &str,
        raw_id: Option<&str>,
    ) -> String {
        let key = format!("{}:{path}", method.as_str());
        if let Some(id) = self.naming.operation_id_overrides.get(&key) {
            return id.clone();
        }
        if let Some(id) = raw_id.filter(|id| !id.is_empty()) {
            return id.to_string();
        }

        let mut words = vec![method.as_lower()];
        words.extend(
            path.split('/')
                .filter(|s| !s.is_empty() && !s.contains('{')),
        );
        to_lower_camel(&words)
    }

    /// Owning service and package, or `None` when the operation is unowned.
    pub fn resolve_package(
        &self,
        operation_id: &str,
        path: &str,
        hints: OwnershipHints<'_>,
    ) -> Option<Ownership> {
        let (service, rule) = self.resolve_service(operation_id, path, hints)?;
        let package = self.package_for_service(&service);
        Some(Ownership {
            service,
            package,
            rule,
        })
    }

    fn resolve_service(
        &self,
        operation_id: &str,
        path: &str,
        hints: OwnershipHints<'_>,
    ) -> Option<(String, OwnershipRule)> {
        if let Some(service) = self.naming.operation_services.get(operation_id) {
            return Some((service.clone(), OwnershipRule::OperationOverride));
        }

        let path_lower = path.to_ascii_lowercase();
        if let Some(keyword) = self.keywords.iter().find(|k| path_lower.contains(k.as_str())) {
            return Some((keyword.clone(), OwnershipRule::PathKeyword));
        }

        let id_lower = operation_id.to_ascii_lowercase();
        if let Some(keyword) = self.keywords.iter().find(|k| id_lower.contains(k.as_str())) {
            return Some((keyword.clone(), OwnershipRule::IdKeyword));
        }

        if let Some(service) = hints.x_service.filter(|s| !s.is_empty()) {
            return Some((service.to_string(), OwnershipRule::Extension));
        }

        if let Some(tag) = hints.tags.first().filter(|t| !t.is_empty()) {
            return Some((tag.clone(), OwnershipRule::Tag));
        }

        self.service_from_path(path)
            .map(|service| (service, OwnershipRule::PathPrefix))
    }

    /// Segment following a routing prefix, with the strip prefix removed.
    fn service_from_path(&self, path: &str) -> Option<String> {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        parts.windows(2).find_map(|pair| {
            if !self.naming.routing_prefixes.iter().any(|p| p == pair[0]) || pair[1].contains('{')
            {
                return None;
            }
            let next = pair[1];
            let service = next
                .strip_prefix(self.naming.routing_strip_prefix.as_str())
                .filter(|_| !self.naming.routing_strip_prefix.is_empty())
                .unwrap_or(next);
            (!service.is_empty()).then(|| service.to_string())
        })
    }

    /// Package name for a service: the exception table, else snake_case.
    pub fn package_for_service(&self, service: &str) -> String {
        if let Some(package) = self.naming.service_packages.get(service) {
            return package.clone();
        }
        let separated: String = service
            .chars()
            .map(|c| if matches!(c, '-' | '.' | ' ') { '_' } else { c })
            .collect();
        to_snake_ident(&separated).to_ascii_lowercase()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn config() -> GeneratorConfig {
        GeneratorConfig::embedded().unwrap()
    }

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_operation_override_beats_tags() {
        let config = config();
        let policy = NamePolicy::new(&config);
        let product = tags(&["product"]);
        let owner = policy
            .resolve_package(
                "getPulsarV2",
                "/v2/providers/addon-pulsar/addons/{addonId}",
                OwnershipHints {
                    x_service: None,
                    tags: &product,
                },
            )
            .unwrap();
        assert_eq!(owner.service, "pulsar");
        assert_eq!(owner.package, "pulsar");
        assert_eq!(owner.rule, OwnershipRule::OperationOverride);
    }

    #[test]
    fn test_path_keyword_beats_extension() {
        let config = config();
        let policy = NamePolicy::new(&config);
        let owner = policy
            .resolve_package(
                "listTenants",
                "/v4/addon-providers/addon-PULSAR/tenants",
                OwnershipHints {
                    x_service: Some("product"),
                    tags: &[],
                },
            )
            .unwrap();
        assert_eq!(owner.service, "pulsar");
        assert_eq!(owner.rule, OwnershipRule::PathKeyword);
    }

    #[test]
    fn test_id_keyword_beats_extension() {
        let config = config();
        let policy = NamePolicy::new(&config);
        let owner = policy
            .resolve_package(
                "listPulsarNamespaces",
                "/v4/namespaces",
                OwnershipHints {
                    x_service: Some("product"),
                    tags: &[],
                },
            )
            .unwrap();
        assert_eq!(owner.rule, OwnershipRule::IdKeyword);
        assert_eq!(owner.package, "pulsar");
    }

    #[test]
    fn test_extension_beats_tag() {
        let config = config();
        let policy = NamePolicy::new(&config);
        let product = tags(&["product", "other"]);
        let owner = policy
            .resolve_package(
                "listDrains",
                "/v4/drains/organisations/{ownerId}",
                OwnershipHints {
                    x_service: Some("drain"),
                    tags: &product,
                },
            )
            .unwrap();
        assert_eq!(owner.service, "drain");
        assert_eq!(owner.package, "drains");
        assert_eq!(owner.rule, OwnershipRule::Extension);
    }

    #[test]
    fn test_first_tag_then_path_prefix() {
        let config = config();
        let policy = NamePolicy::new(&config);
        let tagged = tags(&["network-group", "product"]);
        let owner = policy
            .resolve_package(
                "listMembers",
                "/v4/networkgroups/{id}/members",
                OwnershipHints {
                    x_service: None,
                    tags: &tagged,
                },
            )
            .unwrap();
        assert_eq!(owner.package, "network_group");
        assert_eq!(owner.rule, OwnershipRule::Tag);

        let owner = policy
            .resolve_package(
                "getMetabaseInfo",
                "/v4/addon-providers/addon-metabase/addons/{addonId}",
                OwnershipHints::default(),
            )
            .unwrap();
        assert_eq!(owner.service, "metabase");
        assert_eq!(owner.package, "metabase");
        assert_eq!(owner.rule, OwnershipRule::PathPrefix);
    }

    #[test]
    fn test_unowned_operation() {
        let config = config();
        let policy = NamePolicy::new(&config);
        assert!(policy
            .resolve_package("getSelf", "/v2/self", OwnershipHints::default())
            .is_none());
        assert!(policy
            .resolve_package(
                "getProvider",
                "/v4/addon-providers/{providerId}",
                OwnershipHints::default()
            )
            .is_none());
    }

    #[test]
    fn test_operation_id_resolution() {
        let config = config();
        let policy = NamePolicy::new(&config);
        assert_eq!(
            policy.resolve_operation_id(
                HttpMethod::Post,
                "/v4/ai/organisations/{ownerId}/ai/{addonAIId}/endpoints",
                Some("createEndpoint"),
            ),
            "createAIEndpoint"
        );
        assert_eq!(
            policy.resolve_operation_id(HttpMethod::Get, "/v4/products", Some("listProducts")),
            "listProducts"
        );
        assert_eq!(
            policy.resolve_operation_id(HttpMethod::Get, "/v4/products/{id}/zones", None),
            "getV4ProductsZones"
        );
        assert_eq!(
            policy.resolve_operation_id(HttpMethod::Delete, "/v4/products", Some("")),
            "deleteV4Products"
        );
    }

    #[test]
    fn test_package_for_service() {
        let config = config();
        let policy = NamePolicy::new(&config);
        assert_eq!(policy.package_for_service("addon-cellar"), "storage");
        assert_eq!(policy.package_for_service("config-provider"), "configuration_provider");
        assert_eq!(policy.package_for_service("Product Catalog"), "product_catalog");
        assert_eq!(policy.package_for_service("billing.v2"), "billing_v2");
        assert_eq!(policy.package_for_service("ProductCatalog"), "product_catalog");
    }

    #[test]
    fn test_same_config_same_answers() {
        let a = config();
        let b = config();
        let first = NamePolicy::new(&a);
        let second = NamePolicy::new(&b);
        let hints = OwnershipHints {
            x_service: Some("addon-storage"),
            tags: &[],
        };
        assert_eq!(
            first.resolve_package("getBucket", "/v4/buckets/{id}", hints),
            second.resolve_package("getBucket", "/v4/buckets/{id}", hints)
        );
    }
}
