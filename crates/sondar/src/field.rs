//! Field Descriptors and input masks.
//!
//! A control's interaction class is decided once, at resolution time, from
//! its snapshot node, and carried as a tagged variant. Everything downstream
//! dispatches on the variant — the write technique, the read-back accessor,
//! the comparison policy — instead of re-inspecting tag and class strings at
//! every call site.
//!
//! The mask submodule handles the display formats the application echoes
//! values back in: "000123" typed into a masked numeric field comes back as
//! "000.123", secure fields come back as bullets. Comparison always happens
//! over mask-normalized forms.

use crate::snapshot::{NodeId, Snapshot};
use serde::{Deserialize, Serialize};

/// Closed set of interaction classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// Plain text input: reads back through the value attribute
    PlainText,
    /// Masked numeric input: commit key after write, digit-string compare
    MaskedNumeric,
    /// Combo/select: reads back the selected option's text
    Combo,
    /// Multi-line input: reads back the full text
    MultiLine,
    /// Static label: read-only
    Label,
}

impl FieldKind {
    /// Short name for log events
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PlainText => "text",
            Self::MaskedNumeric => "numeric",
            Self::Combo => "combo",
            Self::MultiLine => "multiline",
            Self::Label => "label",
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resolved metadata about a matched control
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Interaction class
    pub kind: FieldKind,
    /// Input mask pattern, if the field declares one
    pub mask: Option<String>,
    /// Whether the markup reports the field enabled
    pub enabled: bool,
    /// Structural path of the control
    pub path: String,
}

impl FieldDescriptor {
    /// Classify a snapshot node into a descriptor.
    ///
    /// Recomputed whenever the underlying container is re-entered; never
    /// carried across a navigation or modal transition.
    #[must_use]
    pub fn classify(snapshot: &Snapshot, node: NodeId) -> Self {
        let tag = snapshot.tag(node).unwrap_or_default();
        let mask_attr = snapshot.attr(node, "data-mask");
        let kind = match tag.as_str() {
            "select" => FieldKind::Combo,
            "textarea" => FieldKind::MultiLine,
            "input" => {
                let input_type = snapshot.attr(node, "type").unwrap_or_default();
                if input_type == "number"
                    || mask_attr.as_deref().is_some_and(mask::is_numeric_mask)
                {
                    FieldKind::MaskedNumeric
                } else {
                    FieldKind::PlainText
                }
            }
            _ => FieldKind::Label,
        };
        let enabled = snapshot.attr(node, "disabled").is_none()
            && !snapshot.has_class(node, "disabled");
        Self {
            kind,
            mask: mask_attr,
            enabled,
            path: snapshot.css_path(node),
        }
    }

    /// Whether this control accepts writes at all
    #[must_use]
    pub const fn is_writable(&self) -> bool {
        !matches!(self.kind, FieldKind::Label)
    }
}

/// Mask application and normalization
pub mod mask {
    use regex::Regex;
    use std::sync::OnceLock;

    /// Characters that consume one input character; everything else in a
    /// mask is literal decoration
    pub const PLACEHOLDERS: [char; 4] = ['9', '#', 'A', 'X'];

    /// Whether `c` is a mask placeholder
    #[must_use]
    pub fn is_placeholder(c: char) -> bool {
        PLACEHOLDERS.contains(&c)
    }

    /// Whether a mask describes a purely numeric format
    #[must_use]
    pub fn is_numeric_mask(mask: &str) -> bool {
        !mask.is_empty() && mask.chars().all(|c| c == '9' || c == '#' || !is_placeholder(c))
    }

    /// Render `value` through `mask`: placeholders consume input characters,
    /// literals are inserted, surplus input is appended untouched
    #[must_use]
    pub fn apply_mask(value: &str, mask: &str) -> String {
        let mut out = String::with_capacity(mask.len() + value.len());
        let mut input = value.chars();
        for m in mask.chars() {
            if is_placeholder(m) {
                match input.next() {
                    Some(c) => out.push(c),
                    None => break,
                }
            } else {
                out.push(m);
            }
        }
        out.extend(input);
        out
    }

    /// Strip the mask's literal decoration out of `value`
    #[must_use]
    pub fn normalize(value: &str, mask: &str) -> String {
        let literals: Vec<char> = mask.chars().filter(|c| !is_placeholder(*c)).collect();
        value.chars().filter(|c| !literals.contains(c)).collect()
    }

    /// The sign-preserving digit string of `value`
    #[must_use]
    pub fn digits(value: &str) -> String {
        let negative = value.trim_start().starts_with('-');
        let body: String = value.chars().filter(char::is_ascii_digit).collect();
        if negative && !body.is_empty() {
            format!("-{body}")
        } else {
            body
        }
    }

    /// Whether an echo is bullet-obscured (secure field)
    #[must_use]
    pub fn is_obscured(echo: &str) -> bool {
        !echo.is_empty() && echo.chars().all(|c| matches!(c, '\u{2022}' | '*' | '\u{25cf}'))
    }

    /// Compare an echo against the caller's value: mask-normalized,
    /// case-insensitive, the echo truncated to the caller value's length.
    /// The UI pads and suffixes (currency symbols, fill characters), so
    /// equality beyond the meaningful prefix is deliberately not required.
    /// Bullet-obscured echoes match on length alone.
    #[must_use]
    pub fn echo_matches(expected: &str, observed: &str, mask: Option<&str>) -> bool {
        if is_obscured(observed) {
            return observed.chars().count() == expected.chars().count();
        }
        let (expected, observed) = match mask {
            Some(m) => (normalize(expected, m), normalize(observed, m)),
            None => (expected.to_string(), observed.to_string()),
        };
        let expected = expected.to_lowercase();
        let observed: String = observed
            .to_lowercase()
            .chars()
            .take(expected.chars().count())
            .collect();
        expected == observed
    }

    /// Whether an echo reads as a number, with either dot or comma
    /// grouping/decimals. Non-comma locales are treated the same as comma
    /// locales on purpose.
    #[must_use]
    pub fn looks_numeric(echo: &str) -> bool {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let pattern = PATTERN.get_or_init(|| {
            Regex::new(r"^-?\d+([.,]\d+)*$").unwrap()
        });
        pattern.is_match(echo.trim())
    }

    /// Numeric comparison: the echo must read as a number and the unmasked
    /// digit strings must agree exactly. Display grouping (dot or comma) is
    /// irrelevant; truncation is not applied because a numeric field that
    /// dropped digits did not commit.
    #[must_use]
    pub fn numeric_echo_matches(expected: &str, observed: &str) -> bool {
        looks_numeric(observed) && digits(expected) == digits(observed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::ContextOrigin;

    mod classify_tests {
        use super::*;

        fn descriptor_for(markup: &str, css: &str) -> FieldDescriptor {
            let snap = Snapshot::parse(markup, ContextOrigin::Top);
            let node = snap.select(None, css).unwrap()[0];
            FieldDescriptor::classify(&snap, node)
        }

        #[test]
        fn test_select_is_combo() {
            let desc = descriptor_for("<select><option>A</option></select>", "select");
            assert_eq!(desc.kind, FieldKind::Combo);
            assert!(desc.is_writable());
        }

        #[test]
        fn test_textarea_is_multiline() {
            let desc = descriptor_for("<textarea></textarea>", "textarea");
            assert_eq!(desc.kind, FieldKind::MultiLine);
        }

        #[test]
        fn test_plain_input() {
            let desc = descriptor_for("<input name='q'>", "input");
            assert_eq!(desc.kind, FieldKind::PlainText);
            assert!(desc.mask.is_none());
            assert!(desc.enabled);
        }

        #[test]
        fn test_numeric_mask_input() {
            let desc = descriptor_for("<input data-mask='999.999'>", "input");
            assert_eq!(desc.kind, FieldKind::MaskedNumeric);
            assert_eq!(desc.mask.as_deref(), Some("999.999"));
        }

        #[test]
        fn test_number_type_input() {
            let desc = descriptor_for("<input type='number'>", "input");
            assert_eq!(desc.kind, FieldKind::MaskedNumeric);
        }

        #[test]
        fn test_alphanumeric_mask_stays_plain_text() {
            let desc = descriptor_for("<input data-mask='AAA-999'>", "input");
            assert_eq!(desc.kind, FieldKind::PlainText);
            assert_eq!(desc.mask.as_deref(), Some("AAA-999"));
        }

        #[test]
        fn test_static_element_is_label() {
            let desc = descriptor_for("<span>Total</span>", "span");
            assert_eq!(desc.kind, FieldKind::Label);
            assert!(!desc.is_writable());
        }

        #[test]
        fn test_disabled_detection() {
            let desc = descriptor_for("<input disabled>", "input");
            assert!(!desc.enabled);
            let desc = descriptor_for("<input class='field disabled'>", "input");
            assert!(!desc.enabled);
        }
    }

    mod mask_tests {
        use super::mask::*;

        #[test]
        fn test_apply_mask_basic() {
            assert_eq!(apply_mask("000123", "999.999"), "000.123");
            assert_eq!(apply_mask("12345678", "99/99/9999"), "12/34/5678");
        }

        #[test]
        fn test_apply_mask_short_value_stops_before_literals() {
            assert_eq!(apply_mask("12", "999.999"), "12");
            assert_eq!(apply_mask("1234", "999.999"), "123.4");
        }

        #[test]
        fn test_apply_mask_surplus_appended() {
            assert_eq!(apply_mask("12345", "99-99"), "12-345");
        }

        #[test]
        fn test_normalize_strips_literals() {
            assert_eq!(normalize("000.123", "999.999"), "000123");
            assert_eq!(normalize("12/34/5678", "99/99/9999"), "12345678");
            assert_eq!(normalize("000123", "999.999"), "000123");
        }

        #[test]
        fn test_digits() {
            assert_eq!(digits("1.234,56"), "123456");
            assert_eq!(digits("R$ 1.234"), "1234");
            assert_eq!(digits("-12,5"), "-125");
            assert_eq!(digits("abc"), "");
        }

        #[test]
        fn test_is_obscured() {
            assert!(is_obscured("\u{2022}\u{2022}\u{2022}"));
            assert!(is_obscured("***"));
            assert!(!is_obscured(""));
            assert!(!is_obscured("ab*"));
        }

        #[test]
        fn test_is_numeric_mask() {
            assert!(is_numeric_mask("999.999"));
            assert!(is_numeric_mask("##,##"));
            assert!(!is_numeric_mask("AAA-999"));
            assert!(!is_numeric_mask(""));
        }

        #[test]
        fn test_echo_matches_masked_echo() {
            assert!(echo_matches("000123", "000.123", Some("999.999")));
            assert!(echo_matches("000.123", "000123", Some("999.999")));
            assert!(!echo_matches("000124", "000.123", Some("999.999")));
        }

        #[test]
        fn test_echo_matches_is_case_insensitive() {
            assert!(echo_matches("abc", "ABC", None));
        }

        #[test]
        fn test_echo_matches_truncates_to_expected_length() {
            // The UI suffixes the committed value; the meaningful prefix
            // decides.
            assert!(echo_matches("ABC", "ABC - filial 01", None));
            assert!(!echo_matches("ABC", "AB", None));
        }

        #[test]
        fn test_echo_matches_obscured_by_length() {
            assert!(echo_matches("secret", "\u{2022}\u{2022}\u{2022}\u{2022}\u{2022}\u{2022}", None));
            assert!(!echo_matches("secret", "\u{2022}\u{2022}\u{2022}", None));
        }

        #[test]
        fn test_looks_numeric() {
            assert!(looks_numeric("1234"));
            assert!(looks_numeric("1.234,56"));
            assert!(looks_numeric("-12,5"));
            assert!(looks_numeric(" 000.123 "));
            assert!(!looks_numeric(""));
            assert!(!looks_numeric("12a"));
            assert!(!looks_numeric("1..2"));
        }

        #[test]
        fn test_numeric_echo_matches_ignores_grouping() {
            assert!(numeric_echo_matches("1234", "1.234"));
            assert!(numeric_echo_matches("1234", "1,234"));
            assert!(!numeric_echo_matches("1234", "12345"));
            assert!(!numeric_echo_matches("1234", "1.23"));
            // A non-numeric echo never matches, whatever its digits.
            assert!(!numeric_echo_matches("1234", "1234 units"));
            assert!(!numeric_echo_matches("", ""));
        }
    }

    mod mask_property_tests {
        use super::mask::*;
        use proptest::prelude::*;

        proptest! {
            // normalize(apply_mask(v, m), m) == normalize(v, m) for all
            // values and masks.
            #[test]
            fn prop_mask_round_trip(
                value in "[0-9A-Za-z]{0,12}",
                mask in "[9#AX\\./\\- ]{0,12}",
            ) {
                prop_assert_eq!(
                    normalize(&apply_mask(&value, &mask), &mask),
                    normalize(&value, &mask)
                );
            }

            #[test]
            fn prop_digits_only_digits(value in ".{0,24}") {
                let d = digits(&value);
                prop_assert!(d.chars().skip_while(|c| *c == '-').all(|c| c.is_ascii_digit()));
            }
        }
    }
}
