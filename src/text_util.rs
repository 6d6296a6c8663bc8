use std::sync::LazyLock;

use regex::Regex;

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("tag pattern is valid"));

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Normalize text before it enters an index or a query.
///
/// Removes markup tags, decodes HTML character references (every HTML5 named
/// entity, the legacy forms without a trailing semicolon, and numeric
/// references), collapses whitespace runs to a single space and trims both
/// ends. Stripping and decoding repeat until the text stops changing, so
/// `normalize(normalize(x)) == normalize(x)` holds even for escaped markup
/// such as `&lt;b&gt;`.
///
/// # Examples
///
/// ```
/// use qasearch::text_util::normalize;
///
/// assert_eq!(normalize("  <p>Save&nbsp;the\n\nproject</p> "), "Save the project");
/// assert_eq!(normalize("caf&eacute;"), "caf\u{e9}");
/// ```
pub fn normalize(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let stripped = TAG.replace_all(&current, "");
        let decoded = htmlize::unescape(stripped).into_owned();
        // Every pass that changes the text leaves it with fewer chars.
        if decoded == current {
            break;
        }
        current = decoded;
    }

    WHITESPACE.replace_all(&current, " ").trim().to_string()
}

/// Lowercase text for keyword comparison.
pub fn fold_case(text: &str) -> String {
    text.to_lowercase()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn strips_tags() {
        assert_eq!(normalize("<b>Grid</b> <i>settings</i>"), "Grid settings");
    }

    #[test]
    fn decodes_named_entities() {
        assert_eq!(normalize("Tom &amp; Jerry &lt;3"), "Tom & Jerry <3");
    }

    #[test]
    fn decodes_numeric_entities() {
        assert_eq!(normalize("&#1057;&#x43B;&#X43e;&#1081;"), "Слой");
    }

    #[test]
    fn decodes_accented_and_symbol_entities() {
        assert_eq!(normalize("caf&eacute;"), "caf\u{e9}");
        assert_eq!(normalize("&ouml;"), "\u{f6}");
        assert_eq!(normalize("&Scaron;koda"), "\u{160}koda");
        assert_eq!(normalize("&bull; item"), "\u{2022} item");
        assert_eq!(normalize("co&shy;op"), "co\u{ad}op");
    }

    #[test]
    fn decodes_legacy_entities_without_semicolon() {
        assert_eq!(normalize("a&amp b"), "a& b");
        assert_eq!(normalize("&copy 2024"), "\u{a9} 2024");
    }

    #[test]
    fn invalid_code_point_becomes_replacement() {
        assert_eq!(normalize("a&#0;b"), "a\u{fffd}b");
        assert_eq!(normalize("a&#xD800;b"), "a\u{fffd}b");
    }

    #[test]
    fn unknown_entity_is_kept() {
        assert_eq!(normalize("x &bogus; y"), "x &bogus; y");
    }

    #[test]
    fn collapses_and_trims_whitespace() {
        assert_eq!(normalize("\t a \n\n b\u{a0}\u{a0}c  "), "a b c");
    }

    #[test]
    fn nbsp_entity_collapses_with_spaces() {
        assert_eq!(normalize("a &nbsp; b"), "a b");
    }

    #[test]
    fn escaped_markup_is_removed_completely() {
        assert_eq!(normalize("&lt;b&gt;bold&lt;/b&gt;"), "bold");
        assert_eq!(normalize("&amp;lt;p&amp;gt;x"), "x");
    }

    #[test]
    fn lone_angle_brackets_survive() {
        assert_eq!(normalize("1 < 2"), "1 < 2");
        assert_eq!(normalize("3 > 2"), "3 > 2");
    }

    #[test]
    fn bracketed_span_is_treated_as_markup() {
        assert_eq!(normalize("a < b and c > d"), "a d");
    }

    #[test]
    fn empty_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   \n "), "");
        assert_eq!(normalize("<br/>"), "");
    }

    #[test]
    fn fold_case_handles_cyrillic() {
        assert_eq!(fold_case("Сетка GRID"), "сетка grid");
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(s in ".{0,200}") {
            let once = normalize(&s);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn normalize_is_idempotent_on_markup(
            s in r"[<>&#;a-zA-Z0-9 \n\t/ltgampxX]{0,120}"
        ) {
            let once = normalize(&s);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn normalized_text_has_no_edge_whitespace(s in ".{0,100}") {
            let out = normalize(&s);
            prop_assert_eq!(out.trim(), out.as_str());
            prop_assert!(!out.contains("  "));
        }
    }
}
