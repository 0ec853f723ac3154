//! Wildcard expansion of configured resources
//!
//! A resource spec may use `*` for any of group/version/kind. Expansion
//! replaces each wildcard spec with one deep clone per matching discovery
//! entry; literal specs pass through untouched and are never checked against
//! the catalog.

use janitor_core::ResourceSpec;
use kube::core::GroupVersionKind;
use kube::discovery::ApiResource;

use crate::discovery::ApiEntry;

pub const WILDCARD: &str = "*";

pub(crate) fn has_wildcard(spec: &ResourceSpec) -> bool {
    spec.group == WILDCARD || spec.version == WILDCARD || spec.kind == WILDCARD
}

fn field_matches(configured: &str, discovered: &str) -> bool {
    configured == WILDCARD || configured.eq_ignore_ascii_case(discovered)
}

fn entry_matches(spec: &ResourceSpec, entry: &ApiEntry) -> bool {
    field_matches(&spec.group, &entry.group)
        && field_matches(&spec.version, &entry.version)
        && field_matches(&spec.kind, &entry.resource)
}

/// Expand wildcards against the discovery catalog.
///
/// With `namespaced_only` set, cluster-scoped catalog entries are skipped:
/// a rule restricted to namespaces cannot match them. Clones keep the
/// spec's selector and paths; only the GVK fields are rewritten.
pub fn expand_resources(
    resources: &[ResourceSpec],
    namespaced_only: bool,
    catalog: &[ApiEntry],
) -> Vec<ResourceSpec> {
    let mut expanded = Vec::new();

    for spec in resources {
        if !has_wildcard(spec) {
            expanded.push(spec.clone());
            continue;
        }

        for entry in catalog {
            if namespaced_only && !entry.namespaced {
                continue;
            }
            if !entry_matches(spec, entry) {
                continue;
            }
            let mut clone = spec.clone();
            clone.group = entry.group.clone();
            clone.version = entry.version.clone();
            clone.kind = entry.resource.clone();
            expanded.push(clone);
        }
    }

    expanded
}

/// The dynamic API descriptor for a (possibly expanded) resource spec.
/// The configured `kind` is the plural resource name, which is what the
/// URL path wants.
pub(crate) fn api_resource(spec: &ResourceSpec) -> ApiResource {
    let gvk = GroupVersionKind::gvk(&spec.group, &spec.version, &spec.kind);
    ApiResource::from_gvk_with_plural(&gvk, &spec.kind)
}
