//! Scene name mangling.
//!
//! Scene code is exported from native modules under a symbol derived from the
//! scene name, so the mangled form must be a valid C identifier fragment and
//! a valid file name component on every platform.
//!
//! Encoding: ASCII letters and digits are kept, `_` is doubled, and every
//! other character becomes `_<hex code point>_`. The result only contains
//! `[A-Za-z0-9_]` and can be decoded back, which makes the mapping injective.

use std::fmt::Write as _;

/// Prefix of the symbol exported by a scene's code module.
pub const SCENE_SYMBOL_PREFIX: &str = "GDSceneEvents";

pub fn mangled_scene_name(name: &str) -> String {
    let mut mangled = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            mangled.push(ch);
        } else if ch == '_' {
            mangled.push_str("__");
        } else {
            let _ = write!(mangled, "_{:x}_", u32::from(ch));
        }
    }
    mangled
}

/// Name of the symbol a code module must export for `scene_name`.
pub fn scene_entry_symbol(scene_name: &str) -> String {
    format!("{SCENE_SYMBOL_PREFIX}{}", mangled_scene_name(scene_name))
}

/// Inverse of [`mangled_scene_name`]. Returns `None` for strings that no
/// scene name mangles to.
pub fn demangle_scene_name(mangled: &str) -> Option<String> {
    let mut name = String::with_capacity(mangled.len());
    let mut chars = mangled.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch.is_ascii_alphanumeric() {
            name.push(ch);
            continue;
        }
        if ch != '_' {
            return None;
        }
        if chars.peek() == Some(&'_') {
            chars.next();
            name.push('_');
            continue;
        }
        let mut hex = String::new();
        loop {
            match chars.next()? {
                '_' => break,
                digit if digit.is_ascii_hexdigit() => hex.push(digit),
                _ => return None,
            }
        }
        let code_point = u32::from_str_radix(&hex, 16).ok()?;
        let decoded = char::from_u32(code_point)?;
        // Characters with a literal encoding never take the escaped form.
        if decoded.is_ascii_alphanumeric() || decoded == '_' {
            return None;
        }
        name.push(decoded);
    }
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mangles_spaces_and_punctuation() {
        assert_eq!(mangled_scene_name("My Scene #1"), "My_20_Scene_20__23_1");
        assert_eq!(
            scene_entry_symbol("My Scene #1"),
            "GDSceneEventsMy_20_Scene_20__23_1"
        );
    }

    #[test]
    fn mangling_is_deterministic() {
        let first = mangled_scene_name("My Scene #1");
        for _ in 0..16 {
            assert_eq!(mangled_scene_name("My Scene #1"), first);
        }
    }

    #[test]
    fn underscores_do_not_collide_with_escapes() {
        let names = ["a_20_b", "a b", "a__b", "a_b", "a__20__b", "ab"];
        let mangled: std::collections::HashSet<String> =
            names.iter().map(|name| mangled_scene_name(name)).collect();
        assert_eq!(mangled.len(), names.len());
    }

    #[test]
    fn output_is_symbol_safe() {
        let mangled = mangled_scene_name("Niveau élevé / 東京 \u{1F600}");
        assert!(mangled
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_'));
    }

    #[test]
    fn demangle_inverts_mangle() {
        for name in ["My Scene #1", "snake_case", "", "é_ü", "__", "x\u{1F600}y"] {
            let mangled = mangled_scene_name(name);
            assert_eq!(demangle_scene_name(&mangled).as_deref(), Some(name));
        }
    }

    #[test]
    fn demangle_rejects_non_canonical_input() {
        assert_eq!(demangle_scene_name("_41_"), None);
        assert_eq!(demangle_scene_name("a_2"), None);
        assert_eq!(demangle_scene_name("a-b"), None);
    }
}
