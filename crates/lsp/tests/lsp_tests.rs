//! Completion, diagnostics and hover over whole documents.
//!
//! Inputs mark the cursor with `|`. The analysis functions are called
//! directly against the bundled schema (not via LSP protocol).

use std::collections::HashSet;
use std::fs;

use lsp_types::{
    CompletionItem, CompletionItemKind, CompletionList, CompletionTextEdit, Diagnostic,
    DiagnosticSeverity, HoverContents, InsertTextFormat, Position,
};
use wxml_core::{parse, BuiltinSchema};
use wxml_lsp::completion::compute_completions;
use wxml_lsp::diagnostics::compute_diagnostics;
use wxml_lsp::hover::compute_hover;
use wxml_lsp::{CompletionConfig, LineIndex};

const SNIPPETS: CompletionConfig = CompletionConfig {
    use_snippet: true,
    complete_event: true,
};

/// Split `"<te|xt"` into the text and the cursor offset.
fn cursor(input: &str) -> (String, usize) {
    let offset = input.find('|').expect("input marks the cursor with |");
    (input.replacen('|', "", 1), offset)
}

fn complete_with(input: &str, config: &CompletionConfig) -> (String, CompletionList) {
    let (text, offset) = cursor(input);
    let doc = parse(&text);
    let list = compute_completions(&text, &doc, offset, BuiltinSchema::shared(), config);
    let mut labels = HashSet::new();
    for item in &list.items {
        assert!(labels.insert(item.label.clone()), "duplicate label {} for {input:?}", item.label);
    }
    (text, list)
}

fn complete(input: &str) -> (String, CompletionList) {
    complete_with(input, &SNIPPETS)
}

fn item<'a>(list: &'a CompletionList, label: &str) -> &'a CompletionItem {
    list.items
        .iter()
        .find(|i| i.label == label)
        .unwrap_or_else(|| {
            let labels: Vec<_> = list.items.iter().map(|i| i.label.as_str()).collect();
            panic!("no item {label:?} in {labels:?}")
        })
}

fn apply(text: &str, item: &CompletionItem) -> String {
    let Some(CompletionTextEdit::Edit(edit)) = &item.text_edit else {
        panic!("item {} has no plain text edit", item.label);
    };
    let index = LineIndex::new(text);
    let start = index.offset(edit.range.start).unwrap();
    let end = index.offset(edit.range.end).unwrap();
    format!("{}{}{}", &text[..start], edit.new_text, &text[end..])
}

fn assert_completes(input: &str, expected: &[(&str, &str)]) {
    let (text, list) = complete(input);
    for (label, result) in expected {
        assert_eq!(apply(&text, item(&list, label)), *result, "applying {label} to {input:?}");
    }
}

fn diagnose(text: &str) -> Vec<Diagnostic> {
    let doc = parse(text);
    compute_diagnostics(text, &doc, BuiltinSchema::shared(), None)
}

fn messages(text: &str) -> Vec<String> {
    diagnose(text).into_iter().map(|d| d.message).collect()
}

fn hover(input: &str) -> Option<(String, usize)> {
    let (text, offset) = cursor(input);
    let doc = parse(&text);
    let hover = compute_hover(&text, &doc, offset, BuiltinSchema::shared(), None)?;
    let HoverContents::Markup(content) = hover.contents else {
        panic!("hover is not markup");
    };
    let start = LineIndex::new(&text)
        .offset(hover.range.expect("hover has a range").start)
        .unwrap();
    Some((content.value, start))
}

// ──────────────────────────────────────────────
// Completion: tags
// ──────────────────────────────────────────────

#[test]
fn tag_names_after_open_bracket() {
    assert_completes(
        "<|",
        &[("view", "<view"), ("scroll-view", "<scroll-view"), ("text", "<text")],
    );
    assert_completes("<tex|", &[("text", "<text")]);
    let (_, list) = complete("<|");
    let view = item(&list, "view");
    assert_eq!(view.kind, Some(CompletionItemKind::PROPERTY));
    assert!(view.documentation.is_some());
}

#[test]
fn partial_tag_name_is_replaced_whole() {
    assert_completes("<te|xt></text>", &[("text", "<text></text>")]);
}

#[test]
fn open_bracket_inside_element_also_offers_its_close_tag() {
    assert_completes("<view><|", &[("/view", "<view></view>"), ("text", "<view><text")]);
}

#[test]
fn close_tag_for_nearest_open_element() {
    assert_completes("<view></|", &[("/view", "<view></view>")]);
    assert_completes("<view><text></text></|", &[("/view", "<view><text></text></view>")]);
    // The closing bracket is already there.
    assert_completes("<view></|>", &[("/view", "<view></view>")]);
    let (_, list) = complete("<view></|");
    assert_eq!(list.items.len(), 1);
}

#[test]
fn close_tag_takes_the_indentation_of_its_start_tag() {
    assert_completes(
        "<view>\n  <text></text>\n  </|",
        &[("/view", "<view>\n  <text></text>\n</view>")],
    );
}

#[test]
fn close_tag_falls_back_to_every_tag() {
    let (text, list) = complete("<view></view></|");
    assert_eq!(apply(&text, item(&list, "/view")), "<view></view></view>");
    assert!(list.items.len() > 20);
}

#[test]
fn auto_close_after_start_tag() {
    let (text, list) = complete("<view>|");
    assert_eq!(list.items.len(), 1);
    let close = item(&list, "</view>");
    assert_eq!(close.insert_text_format, Some(InsertTextFormat::SNIPPET));
    assert_eq!(apply(&text, close), "<view>$0</view>");

    let plain = CompletionConfig { use_snippet: false, complete_event: true };
    let (text, list) = complete_with("<view>|", &plain);
    assert_eq!(apply(&text, item(&list, "</view>")), "<view></view>");
}

#[test]
fn void_elements_are_not_auto_closed() {
    let (_, list) = complete("<image>|");
    assert!(list.items.is_empty());
}

// ──────────────────────────────────────────────
// Completion: attributes
// ──────────────────────────────────────────────

#[test]
fn attribute_names() {
    assert_completes(
        "<text |",
        &[
            ("selectable", "<text selectable"),
            ("space", "<text space=\"$1\""),
            ("decode", "<text decode"),
        ],
    );
    assert_completes(
        "<text s|pa",
        &[("selectable", "<text selectable"), ("space", "<text space=\"$1\"")],
    );
}

#[test]
fn snippet_attributes_reopen_suggestions() {
    let (_, list) = complete("<text |");
    let space = item(&list, "space");
    assert_eq!(space.kind, Some(CompletionItemKind::FIELD));
    assert_eq!(space.insert_text_format, Some(InsertTextFormat::SNIPPET));
    assert_eq!(
        space.command.as_ref().map(|c| c.command.as_str()),
        Some("editor.action.triggerSuggest")
    );
    assert!(item(&list, "selectable").command.is_none());
}

#[test]
fn no_value_snippet_before_an_existing_equals_sign() {
    assert_completes("<text s|=\"emsp\"></text>", &[("space", "<text space=\"emsp\"></text>")]);
}

#[test]
fn plain_text_attributes_without_snippets() {
    let plain = CompletionConfig { use_snippet: false, complete_event: true };
    let (text, list) = complete_with("<text |", &plain);
    assert_eq!(apply(&text, item(&list, "space")), "<text space");
    assert_eq!(item(&list, "space").insert_text_format, Some(InsertTextFormat::PLAIN_TEXT));
}

#[test]
fn present_attributes_are_not_offered_again() {
    let (_, list) = complete("<text space=\"emsp\" |");
    assert!(list.items.iter().all(|i| i.label != "space"));
    assert!(list.items.iter().any(|i| i.label == "decode"));
}

#[test]
fn language_attributes_are_offered_everywhere() {
    let (_, list) = complete("<my-component |");
    for label in ["id", "class", "wx:if", "wx:for", "bind:tap"] {
        item(&list, label);
    }
}

#[test]
fn event_aliases_are_offered_once() {
    let (_, list) = complete("<view |");
    item(&list, "bind:tap");
    item(&list, "catch:longpress");
    assert!(list.items.iter().all(|i| i.label != "bindtap" && i.label != "catchlongpress"));
}

#[test]
fn events_can_be_switched_off() {
    let no_events = CompletionConfig { use_snippet: true, complete_event: false };
    let (_, list) = complete_with("<view |", &no_events);
    assert!(list.items.iter().all(|i| !i.label.starts_with("bind") && !i.label.starts_with("catch")));
    item(&list, "hover-class");
    // Component callbacks are not events.
    let (_, list) = complete_with("<input |", &no_events);
    item(&list, "bindinput");
}

#[test]
fn picker_mode_unlocks_attributes() {
    assert_completes(
        "<picker mode=\"region\" |",
        &[("custom-item", "<picker mode=\"region\" custom-item=\"$1\"")],
    );
    let (_, list) = complete("<picker mode=\"selector\" |");
    assert!(list.items.iter().all(|i| i.label != "custom-item"));
}

// ──────────────────────────────────────────────
// Completion: values
// ──────────────────────────────────────────────

#[test]
fn enum_values() {
    assert_completes(
        "<image mode=\"|\"",
        &[
            ("scaleToFill", "<image mode=\"scaleToFill\""),
            ("aspectFit", "<image mode=\"aspectFit\""),
        ],
    );
    assert_completes(
        "<image mode=\"|",
        &[
            ("scaleToFill", "<image mode=\"scaleToFill"),
            ("aspectFit", "<image mode=\"aspectFit"),
        ],
    );
    let (_, list) = complete("<image mode=\"|\"");
    assert_eq!(item(&list, "aspectFit").kind, Some(CompletionItemKind::ENUM));
}

#[test]
fn values_right_after_equals_get_quotes() {
    assert_completes("<text space=|", &[("emsp", "<text space=\"emsp\"")]);
}

#[test]
fn value_word_under_cursor_is_replaced() {
    assert_completes("<image mode=\"aspe|Fit\"", &[("aspectFit", "<image mode=\"aspectFit\"")]);
}

#[test]
fn boolean_values() {
    let (_, list) = complete("<view wx:if=\"|\"");
    let labels: Vec<_> = list.items.iter().map(|i| i.label.as_str()).collect();
    assert_eq!(labels, vec!["true", "false"]);
    let (_, list) = complete("<view class=\"|\"");
    assert!(list.items.is_empty());
}

// ──────────────────────────────────────────────
// Completion: character entities
// ──────────────────────────────────────────────

#[test]
fn character_entities() {
    assert_completes(
        "<view>&|",
        &[("&hookrightarrow;", "<view>&hookrightarrow;"), ("&plus;", "<view>&plus;")],
    );
    assert_completes("<view>Hello&|", &[("&ZeroWidthSpace;", "<view>Hello&ZeroWidthSpace;")]);
    assert_completes("<view>Hello&gt|", &[("&gtrdot;", "<view>Hello&gtrdot;")]);

    let (_, list) = complete("<view>&|");
    let amp = item(&list, "&amp;");
    assert_eq!(amp.kind, Some(CompletionItemKind::KEYWORD));
    assert_eq!(
        amp.documentation,
        Some(lsp_types::Documentation::String("Character entity representing '&'".into()))
    );
    assert!(list.items.iter().all(|i| i.label.ends_with(';')));
}

#[test]
fn no_entities_inside_tags() {
    for input in ["<view &d|", "<view&d|"] {
        let (_, list) = complete(input);
        assert!(list.items.iter().all(|i| i.label != "&duarr;"), "{input}");
    }
}

#[test]
fn entities_on_a_later_line() {
    assert_completes("<view>\n  a &l|", &[("&lt;", "<view>\n  a &lt;")]);
}

#[test]
fn nothing_outside_elements() {
    let (_, list) = complete("hello &|");
    assert!(list.items.is_empty());
    let (_, list) = complete("<!-- <|");
    assert!(list.items.is_empty());
}

#[test]
fn labels_are_unique_everywhere() {
    let text = "<view class=\"a\" bindtap=\"b\">\n  <text space=\"emsp\">x &amp; y</text>\n  <picker mode=\"region\"></picker>\n</view>";
    let doc = parse(text);
    let mut offset = 0;
    while offset <= text.len() {
        let list = compute_completions(text, &doc, offset, BuiltinSchema::shared(), &SNIPPETS);
        let mut labels = HashSet::new();
        for item in &list.items {
            assert!(labels.insert(&item.label), "duplicate {} at {offset}", item.label);
        }
        offset += 1;
    }
}

// ──────────────────────────────────────────────
// Diagnostics
// ──────────────────────────────────────────────

#[test]
fn empty_elements() {
    assert_eq!(messages("<video>abc</video>"), vec!["Empty tag should not have children"]);
    assert!(messages("<video></video>").is_empty());
    let diags = diagnose("<video>abc</video>");
    assert_eq!(diags[0].range.start, Position::new(0, 0));
    assert_eq!(diags[0].range.end, Position::new(0, 18));
}

#[test]
fn duplicated_attributes_report_every_occurrence() {
    let diags = diagnose("<view id=\"a\" id=\"b\"></view>");
    let found: Vec<_> = diags
        .iter()
        .map(|d| (d.message.as_str(), d.range.start.character, d.range.end.character))
        .collect();
    assert_eq!(
        found,
        vec![("Duplicated attribute \"id\"", 6, 8), ("Duplicated attribute \"id\"", 13, 15)]
    );
}

#[test]
fn unknown_attributes() {
    assert_eq!(messages("<view abc=\"a\"></view>"), vec!["Unknown attribute \"abc\""]);
    assert!(messages("<view data-id=\"1\" data-Name></view>").is_empty());
    // Unknown components are not checked.
    assert!(messages("<my-comp abc=\"a\"></my-comp>").is_empty());
}

#[test]
fn required_values() {
    assert_eq!(messages("<view bindtap=\"\"></view>"), vec!["Value required for attribute \"bindtap\""]);
    assert_eq!(messages("<view bindtap></view>"), vec!["Value required for attribute \"bindtap\""]);
    assert_eq!(messages("<view wx:key></view>"), vec!["Value required for attribute \"wx:key\""]);
    assert_eq!(messages("<text space></text>"), vec!["Value required for attribute \"space\""]);
    assert!(messages("<view bindtouchcancel=\"onCancel\"></view>").is_empty());
    // `mode` defaults to scaleToFill.
    assert!(messages("<image mode src=\"a.png\"/>").is_empty());
    // String attributes without a default need a value too.
    assert_eq!(messages("<image src/>"), vec!["Value required for attribute \"src\""]);
    assert_eq!(messages("<view class></view>"), vec!["Value required for attribute \"class\""]);
    assert_eq!(messages("<navigator url=\"\"></navigator>"), vec!["Value required for attribute \"url\""]);
    let diags = diagnose("<view class></view>");
    assert_eq!(diags[0].range.start, Position::new(0, 6));
    assert_eq!(diags[0].range.end, Position::new(0, 7));
}

#[test]
fn literal_values_are_checked_by_kind() {
    assert_eq!(
        messages("<view wx:if=\"True\"></view>"),
        vec!["Invalid value for boolean attribute \"wx:if\""]
    );
    assert_eq!(
        messages("<scroll-view scroll-x=\"False\"></scroll-view>"),
        vec!["Invalid value for boolean attribute \"scroll-x\""]
    );
    assert_eq!(
        messages("<text space=\"abc\"></text>"),
        vec!["Invalid value for enum attribute \"space\""]
    );
    assert_eq!(
        messages("<scroll-view scroll-top=\"abc\"></scroll-view>"),
        vec!["Invalid value for number attribute \"scroll-top\""]
    );
    assert!(messages("<scroll-view scroll-top=\"-12.5\" scroll-x=\"true\"></scroll-view>").is_empty());
}

#[test]
fn invalid_value_range_covers_the_value() {
    let diags = diagnose("<text space=\"abc\"></text>");
    assert_eq!(diags[0].range.start.character, 13);
    assert_eq!(diags[0].range.end.character, 16);
}

#[test]
fn loops_need_expressions() {
    assert_eq!(
        messages("<view wx:for=\"abc\"></view>"),
        vec!["Expression required for attribute \"wx:for\""]
    );
    assert!(messages("<view wx:for=\"{{list}}\" wx:key=\"id\" wx:for-item=\"row\"></view>").is_empty());
}

#[test]
fn expressions_are_accepted_for_every_kind() {
    assert!(messages(
        "<scroll-view scroll-x=\"{{x}}\" scroll-top=\"{{top}}\"><text space=\"{{s}}\"></text></scroll-view>"
    )
    .is_empty());
}

#[test]
fn unnecessary_else_value_is_a_warning() {
    let diags = diagnose("<view wx:if=\"{{a}}\"></view><view wx:else=\"b\"></view>");
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].message, "Unnecessary value for \"wx:else\"");
    assert_eq!(diags[0].severity, Some(DiagnosticSeverity::WARNING));
    assert!(messages("<view wx:else></view>").is_empty());
}

#[test]
fn only_text_inside_text() {
    assert_eq!(messages("<text><view></view></text>"), vec!["view not allowed in <text>"]);
    assert!(messages("<text>a<text>b</text></text>").is_empty());
}

#[test]
fn parse_errors_come_first() {
    let diags = diagnose("<view abc=\"a\">");
    let found: Vec<_> = diags.iter().map(|d| d.message.as_str()).collect();
    assert_eq!(
        found,
        vec!["Parse error: Close tag not found for <view>", "Unknown attribute \"abc\""]
    );
    assert!(diags.iter().all(|d| d.source.as_deref() == Some("wxml")));
}

#[test]
fn ranges_are_line_and_column() {
    let diags = diagnose("<view>\n  <text space=\"abc\"></text>\n</view>");
    assert_eq!(diags[0].range.start, Position::new(1, 15));
    assert_eq!(diags[0].range.end, Position::new(1, 18));
}

#[test]
fn included_files_must_exist() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("pages")).unwrap();
    fs::create_dir_all(dir.path().join("common")).unwrap();
    fs::write(dir.path().join("common").join("head.wxml"), "<view/>").unwrap();
    let page = dir.path().join("pages").join("index.wxml");

    let check = |text: &str| {
        let doc = parse(text);
        compute_diagnostics(text, &doc, BuiltinSchema::shared(), Some(page.as_path()))
    };

    assert!(check("<include src=\"../common/head.wxml\"/>").is_empty());
    assert!(check("<import src=\"{{dynamic}}\"/>").is_empty());

    let text = "<import src=\"../common/missing.wxml\"/>";
    let diags = check(text);
    assert_eq!(diags.len(), 1);
    let expected = dir.path().join("common").join("missing.wxml");
    assert_eq!(diags[0].message, format!("File {} not exist", expected.display()));
    assert_eq!(diags[0].range.start.character, 13);
    assert_eq!(diags[0].range.end.character, 35);

    // No location, no check.
    let doc = parse(text);
    assert!(compute_diagnostics(text, &doc, BuiltinSchema::shared(), None).is_empty());
}

// ──────────────────────────────────────────────
// Hover
// ──────────────────────────────────────────────

#[test]
fn tag_hover() {
    for input in ["|<view></view>", "<view>|</view>", "<view><|/view>", "<view></view>|"] {
        assert!(hover(input).is_none(), "{input}");
    }
    for input in ["<|view></view>", "<v|iew></view>", "<vie|w></view>", "<view|></view>"] {
        let (text, start) = hover(input).unwrap_or_else(|| panic!("hover for {input}"));
        assert!(text.contains("view"), "{input}: {text}");
        assert_eq!(start, 1, "{input}");
    }
    for input in ["<view></|view>", "<view></v|iew>", "<view></vie|w>", "<view></view|>"] {
        let (text, start) = hover(input).unwrap_or_else(|| panic!("hover for {input}"));
        assert!(text.contains("view"), "{input}: {text}");
        assert_eq!(start, 8, "{input}");
    }
}

#[test]
fn attribute_hover() {
    let (text, start) = hover("<text s|pace=\"\"></view>").expect("attribute hover");
    assert!(text.contains("space"));
    assert_eq!(start, 6);
    assert!(hover("<text space=|\"\"></view>").is_none());

    let (text, start) = hover("<text selecta|ble></view>").expect("attribute hover");
    assert!(text.contains("text"));
    assert_eq!(start, 6);
}

#[test]
fn unknown_attribute_shows_the_tag() {
    let (text, start) = hover("<view fo|o=\"1\"></view>").expect("tag hover");
    assert!(text.starts_with("**<view>**"), "{text}");
    assert_eq!(start, 6);
}
