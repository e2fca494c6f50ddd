//! Reserved-name translation and synthesized-identifier normalization.
//!
//! Two configuration keys collide with the orchestration framework's own
//! vocabulary and are renamed on the element side while the document keeps
//! the raw key. The translation is a pure two-way lookup, resolved once at
//! field construction and never re-derived.

use heck::{ToSnakeCase, ToUpperCamelCase};

/// Configuration-side keys that must be renamed on the element side.
const RESERVED: [(&str, &str); 2] = [
    ("position", "element_position"),
    ("name", "element_name"),
];

/// Element-side attribute name for a configuration key.
///
/// Reserved keys translate (`position` → `element_position`,
/// `name` → `element_name`); every other key is returned unchanged.
#[must_use]
pub fn element_attr_for(config_key: &str) -> &str {
    for (config, element) in RESERVED {
        if config_key == config {
            return element;
        }
    }
    config_key
}

/// Configuration-side key for an element attribute name (inverse of
/// [`element_attr_for`]).
#[must_use]
pub fn config_key_for(attr: &str) -> &str {
    for (config, element) in RESERVED {
        if attr == element {
            return config;
        }
    }
    attr
}

/// Canonical type name for an entry's raw class-name field.
///
/// Spaces become word separators, dots are stripped, and the result is
/// PascalCased: `"Mono Crystal1"` → `"MonoCrystal1"`.
#[must_use]
pub fn class_name(raw: &str) -> String {
    raw.replace(' ', "_").replace('.', "").to_upper_camel_case()
}

/// Instance name for a canonical class name (its snake_case form).
#[must_use]
pub fn instance_name(class: &str) -> String {
    class.to_snake_case()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_translation_is_bijective() {
        assert_eq!(element_attr_for("position"), "element_position");
        assert_eq!(element_attr_for("name"), "element_name");
        assert_eq!(config_key_for("element_position"), "position");
        assert_eq!(config_key_for("element_name"), "name");

        for key in ["position", "name", "grazingAngle", "title"] {
            assert_eq!(config_key_for(element_attr_for(key)), key);
        }
    }

    #[test]
    fn test_non_reserved_keys_pass_through() {
        assert_eq!(element_attr_for("grazingAngle"), "grazingAngle");
        assert_eq!(config_key_for("grazingAngle"), "grazingAngle");
    }

    #[test]
    fn test_class_name_normalization() {
        assert_eq!(class_name("Mono Crystal1"), "MonoCrystal1");
        assert_eq!(class_name("Aperture"), "Aperture");
        assert_eq!(class_name("watchpoint"), "Watchpoint");
        assert_eq!(class_name("W9"), "W9");
        assert_eq!(class_name("Toroidal Mirror"), "ToroidalMirror");
    }

    #[test]
    fn test_instance_name_is_snake_case() {
        assert_eq!(instance_name("MonoCrystal1"), "mono_crystal1");
        assert_eq!(instance_name("Watchpoint"), "watchpoint");
        assert_eq!(instance_name("W9"), "w9");
    }
}
