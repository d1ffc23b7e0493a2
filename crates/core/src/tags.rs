//! Fixed tag sets that change how the scanner, tree builder and checks treat
//! an element.

use std::cmp::Ordering;

use crate::scanner::RawText;

pub const SCRIPT_TAG: &str = "wxs";
pub const STYLE_TAG: &str = "style";

/// Elements that never have an end tag. Sorted for binary search.
pub const VOID_ELEMENTS: &[&str] = &[
    "audio",
    "checkbox",
    "cover-image",
    "icon",
    "image",
    "input",
    "live-player",
    "live-pusher",
    "map",
    "open-data",
    "progress",
    "radio",
    "slider",
    "switch",
];

/// Elements that must not contain children or text. Sorted for binary search.
pub const EMPTY_ELEMENTS: &[&str] = &[
    "audio",
    "camera",
    "checkbox",
    "cover-image",
    "icon",
    "image",
    "input",
    "live-player",
    "live-pusher",
    "map",
    "open-data",
    "progress",
    "radio",
    "slider",
    "switch",
    "video",
];

pub fn is_void_element(tag: &str) -> bool {
    contains_ignore_case(VOID_ELEMENTS, tag)
}

pub fn is_empty_element(tag: &str) -> bool {
    contains_ignore_case(EMPTY_ELEMENTS, tag)
}

pub fn raw_text_kind(tag: &str) -> RawText {
    if tag.eq_ignore_ascii_case(SCRIPT_TAG) {
        RawText::Script
    } else if tag.eq_ignore_ascii_case(STYLE_TAG) {
        RawText::Style
    } else {
        RawText::None
    }
}

fn contains_ignore_case(sorted: &[&str], tag: &str) -> bool {
    sorted
        .binary_search_by(|probe| cmp_lowercase(probe, tag))
        .is_ok()
}

fn cmp_lowercase(lower: &str, other: &str) -> Ordering {
    lower
        .bytes()
        .cmp(other.bytes().map(|b| b.to_ascii_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_sets_are_sorted() {
        assert!(VOID_ELEMENTS.windows(2).all(|w| w[0] < w[1]));
        assert!(EMPTY_ELEMENTS.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn void_lookup_ignores_case() {
        assert!(is_void_element("image"));
        assert!(is_void_element("Input"));
        assert!(!is_void_element("view"));
        assert!(!is_void_element("video"));
    }

    #[test]
    fn empty_elements_extend_void_elements() {
        assert!(VOID_ELEMENTS.iter().all(|t| is_empty_element(t)));
        assert!(is_empty_element("video"));
        assert!(is_empty_element("camera"));
    }

    #[test]
    fn raw_text_tags() {
        assert_eq!(raw_text_kind("wxs"), RawText::Script);
        assert_eq!(raw_text_kind("WXS"), RawText::Script);
        assert_eq!(raw_text_kind("style"), RawText::Style);
        assert_eq!(raw_text_kind("view"), RawText::None);
    }
}
