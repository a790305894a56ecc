//! Name & image resolver (spec §4.2, component C2).
//!
//! Pure functions over `(map, config, instance, client)` — no I/O, no
//! mutable state, nothing cached here (caching belongs to the Runner's
//! name/image caches, spec §4.6).

use crate::model::map::ContainerMap;

/// Deterministic container-instance name: `<map>.<config>[.<instance>]`
/// (spec §4.2 "Names").
pub fn container_name(map_name: &str, config_name: &str, instance: Option<&str>) -> String {
    match instance {
        Some(instance) => format!("{map_name}.{config_name}.{instance}"),
        None => format!("{map_name}.{config_name}"),
    }
}

/// Deterministic name for an attached-volume holder container:
/// `<map>.<alias>`, or `<map>.<parent-config>.<alias>` when
/// `use_attached_parent_name` is set.
pub fn attached_volume_name(
    map_name: &str,
    parent_config_name: &str,
    alias: &str,
    use_attached_parent_name: bool,
) -> String {
    if use_attached_parent_name {
        format!("{map_name}.{parent_config_name}.{alias}")
    } else {
        format!("{map_name}.{alias}")
    }
}

/// The hostname assigned to a container when `set_hostname` is true:
/// `<client-name-or-none>-<container-name-with-invalid-chars-replaced>`.
pub fn hostname_for(client_name: Option<&str>, container_name: &str) -> String {
    let sanitized: String = container_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();
    match client_name {
        Some(client) => format!("{client}-{sanitized}"),
        None => format!("none-{sanitized}"),
    }
}

/// Resolve an `image` field against `repository`/`default_tag`, following
/// the bit-exact table in spec §4.2.
///
/// - A leading `/` strips itself and bypasses `repository` entirely.
/// - A `:` anywhere in the resulting name bypasses `default_tag`
///   application.
pub fn resolve_image(
    config_name: &str,
    image: Option<&str>,
    repository: Option<&str>,
    default_tag: &str,
) -> String {
    let base = image.unwrap_or(config_name);

    let name = if let Some(stripped) = base.strip_prefix('/') {
        stripped.to_string()
    } else {
        match repository {
            Some(repo) => format!("{repo}/{base}"),
            None => base.to_string(),
        }
    };

    if name.contains(':') {
        name
    } else {
        format!("{name}:{default_tag}")
    }
}

/// Convenience wrapper resolving an image for a configuration name
/// directly against a [`ContainerMap`]'s `repository`/`default_tag`.
pub fn resolve_image_for_map(map: &ContainerMap, config_name: &str, image: Option<&str>) -> String {
    resolve_image(
        config_name,
        image,
        map.repository.as_deref(),
        &map.default_tag,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_name_with_and_without_instance() {
        assert_eq!(container_name("m", "app", None), "m.app");
        assert_eq!(container_name("m", "app", Some("i1")), "m.app.i1");
    }

    #[test]
    fn attached_volume_name_uses_parent_when_flagged() {
        assert_eq!(attached_volume_name("m", "app", "sock", false), "m.sock");
        assert_eq!(
            attached_volume_name("m", "app", "sock", true),
            "m.app.sock"
        );
    }

    #[test]
    fn hostname_replaces_invalid_characters() {
        assert_eq!(hostname_for(Some("c1"), "m.app_1"), "c1-m-app-1");
        assert_eq!(hostname_for(None, "m.app"), "none-m-app");
    }

    /// The exhaustive table from spec §4.2, reproduced verbatim.
    #[test]
    fn image_resolution_matches_spec_table() {
        assert_eq!(resolve_image("cfg", None, None, "latest"), "cfg:latest");
        assert_eq!(resolve_image("cfg", Some("image1"), None, "latest"), "image1:latest");
        assert_eq!(
            resolve_image("cfg", None, Some("reg.example.com"), "latest"),
            "reg.example.com/cfg:latest"
        );
        assert_eq!(
            resolve_image("cfg", Some("image1"), Some("reg.example.com"), "latest"),
            "reg.example.com/image1:latest"
        );
        assert_eq!(
            resolve_image("cfg", None, Some("reg.example.com"), "devel"),
            "reg.example.com/cfg:devel"
        );
        assert_eq!(resolve_image("cfg", None, None, "devel"), "cfg:devel");
        assert_eq!(
            resolve_image("cfg", Some("/image1"), Some("reg.example.com"), "latest"),
            "image1:latest"
        );
        assert_eq!(
            resolve_image("cfg", Some("image1:one"), Some("reg.example.com"), "latest"),
            "reg.example.com/image1:one"
        );
        assert_eq!(
            resolve_image("cfg", Some("/image1:two"), Some("reg.example.com"), "latest"),
            "image1:two"
        );
    }
}
