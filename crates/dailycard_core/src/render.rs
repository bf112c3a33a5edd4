//! Markdown to HTML rendering for card bodies.
//!
//! # Responsibility
//! - Render card markdown with the GFM extensions (tables, strikethrough,
//!   task lists, footnotes, bare-URL autolinks).
//! - Keep CJK paragraphs free of spurious whitespace from soft line breaks,
//!   and space CJK text apart from adjacent Latin letters and digits.
//!
//! # Invariants
//! - Rendering is deterministic for a given input.
//! - Rendering never fails: an internal panic degrades to returning the
//!   source text unchanged.

use log::error;
use once_cell::sync::Lazy;
use pulldown_cmark::html::push_html;
use pulldown_cmark::{CowStr, Event, LinkType, Options, Parser, Tag, TagEnd, TextMergeStream};
use regex::Regex;
use std::panic::{catch_unwind, AssertUnwindSafe};

static BARE_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:https?://|www\.)[^\s<>]+").expect("valid bare url regex")
});

const TRAILING_URL_PUNCTUATION: &[char] = &['.', ',', ':', ';', '!', '?', '\'', '"', ')', ']'];

/// Renders card markdown into HTML.
///
/// Falls back to the unmodified `source` if the renderer panics.
pub fn markdown_to_html(source: &str) -> String {
    match catch_unwind(AssertUnwindSafe(|| render(source))) {
        Ok(html) => html,
        Err(_) => {
            error!(
                "event=markdown_render module=render status=error error_code=render_panicked source_len={}",
                source.len()
            );
            source.to_string()
        }
    }
}

fn render(source: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_FOOTNOTES);

    let events: Vec<Event<'_>> = TextMergeStream::new(Parser::new_ext(source, options)).collect();
    let events = join_cjk_soft_breaks(events);
    let events = space_mixed_scripts(events);
    let events = autolink_bare_urls(events);

    let mut html = String::with_capacity(source.len() * 3 / 2);
    push_html(&mut html, events.into_iter());
    html
}

/// Drops soft breaks whose neighbours on both sides are CJK characters.
///
/// Emphasis, strikethrough and link tags are transparent: `**中文**\n测试`
/// joins the same way as `中文\n测试`.
fn join_cjk_soft_breaks(events: Vec<Event<'_>>) -> Vec<Event<'_>> {
    let mut joined = Vec::with_capacity(events.len());
    for (index, event) in events.iter().enumerate() {
        if matches!(event, Event::SoftBreak) {
            let before = match events[..index]
                .iter()
                .rev()
                .find(|event| !is_inline_wrapper(event))
            {
                Some(Event::Text(text)) => text.chars().next_back(),
                _ => None,
            };
            let after = match events[index + 1..]
                .iter()
                .find(|event| !is_inline_wrapper(event))
            {
                Some(Event::Text(text)) => text.chars().next(),
                _ => None,
            };
            if before.is_some_and(is_cjk) && after.is_some_and(is_cjk) {
                continue;
            }
        }
        joined.push(event.clone());
    }
    joined
}

fn is_inline_wrapper(event: &Event<'_>) -> bool {
    matches!(
        event,
        Event::Start(Tag::Emphasis | Tag::Strong | Tag::Strikethrough | Tag::Link { .. })
            | Event::End(TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough | TagEnd::Link)
    )
}

/// Inserts a space wherever a CJK letter touches an ASCII letter or digit
/// inside plain text, so `使用Rust开发` renders as `使用 Rust 开发`.
///
/// Code, link text and image alt text keep their exact characters.
fn space_mixed_scripts(events: Vec<Event<'_>>) -> Vec<Event<'_>> {
    let mut spaced = Vec::with_capacity(events.len());
    let mut link_depth = 0usize;
    let mut in_code_block = false;

    for event in events {
        match &event {
            Event::Start(Tag::Link { .. }) | Event::Start(Tag::Image { .. }) => link_depth += 1,
            Event::End(TagEnd::Link) | Event::End(TagEnd::Image) => {
                link_depth = link_depth.saturating_sub(1)
            }
            Event::Start(Tag::CodeBlock(_)) => in_code_block = true,
            Event::End(TagEnd::CodeBlock) => in_code_block = false,
            Event::Text(text) if link_depth == 0 && !in_code_block => {
                if let Some(text) = autospace(text) {
                    spaced.push(Event::Text(CowStr::Boxed(text.into_boxed_str())));
                    continue;
                }
            }
            _ => {}
        }
        spaced.push(event);
    }
    spaced
}

/// Returns `None` when `text` has no CJK/ASCII boundary to space out.
fn autospace(text: &str) -> Option<String> {
    let mut out: Option<String> = None;
    let mut prev: Option<char> = None;
    for (offset, c) in text.char_indices() {
        if let Some(p) = prev {
            let boundary = (is_cjk_letter(p) && c.is_ascii_alphanumeric())
                || (p.is_ascii_alphanumeric() && is_cjk_letter(c));
            if boundary {
                out.get_or_insert_with(|| {
                    let mut head = String::with_capacity(text.len() + 8);
                    head.push_str(&text[..offset]);
                    head
                })
                .push(' ');
            }
        }
        if let Some(buf) = out.as_mut() {
            buf.push(c);
        }
        prev = Some(c);
    }
    out
}

/// Wraps bare `http(s)://` and `www.` URLs in plain text with links.
///
/// Text inside existing links, code blocks and raw HTML is left alone.
fn autolink_bare_urls(events: Vec<Event<'_>>) -> Vec<Event<'_>> {
    let mut linked = Vec::with_capacity(events.len());
    let mut link_depth = 0usize;
    let mut in_code_block = false;

    for event in events {
        match &event {
            Event::Start(Tag::Link { .. }) | Event::Start(Tag::Image { .. }) => link_depth += 1,
            Event::End(TagEnd::Link) | Event::End(TagEnd::Image) => {
                link_depth = link_depth.saturating_sub(1)
            }
            Event::Start(Tag::CodeBlock(_)) => in_code_block = true,
            Event::End(TagEnd::CodeBlock) => in_code_block = false,
            Event::Text(text) if link_depth == 0 && !in_code_block => {
                if BARE_URL_RE.is_match(text) {
                    push_autolinked_text(&mut linked, text);
                    continue;
                }
            }
            _ => {}
        }
        linked.push(event);
    }
    linked
}

fn push_autolinked_text(out: &mut Vec<Event<'_>>, text: &str) {
    let mut cursor = 0;
    for found in BARE_URL_RE.find_iter(text) {
        let url = found.as_str().trim_end_matches(TRAILING_URL_PUNCTUATION);
        if url.is_empty() {
            continue;
        }
        if found.start() > cursor {
            out.push(owned_text(&text[cursor..found.start()]));
        }

        let dest_url = if url.len() >= 4 && url[..4].eq_ignore_ascii_case("www.") {
            format!("http://{url}")
        } else {
            url.to_string()
        };
        out.push(Event::Start(Tag::Link {
            link_type: LinkType::Autolink,
            dest_url: CowStr::Boxed(dest_url.into_boxed_str()),
            title: CowStr::Borrowed(""),
            id: CowStr::Borrowed(""),
        }));
        out.push(owned_text(url));
        out.push(Event::End(TagEnd::Link));
        cursor = found.start() + url.len();
    }
    if cursor < text.len() {
        out.push(owned_text(&text[cursor..]));
    }
}

fn owned_text<'a>(value: &str) -> Event<'a> {
    Event::Text(CowStr::Boxed(value.to_string().into_boxed_str()))
}

fn is_cjk(c: char) -> bool {
    matches!(
        c,
        '\u{2E80}'..='\u{2FDF}'     // radicals
            | '\u{3000}'..='\u{303F}' // CJK punctuation
            | '\u{3040}'..='\u{30FF}' // kana
            | '\u{3400}'..='\u{4DBF}'
            | '\u{4E00}'..='\u{9FFF}'
            | '\u{AC00}'..='\u{D7AF}' // hangul
            | '\u{F900}'..='\u{FAFF}'
            | '\u{FF00}'..='\u{FFEF}' // fullwidth forms
    )
}

/// CJK ideographs, kana and hangul; punctuation and fullwidth forms excluded.
fn is_cjk_letter(c: char) -> bool {
    matches!(
        c,
        '\u{3040}'..='\u{30FF}'
            | '\u{3400}'..='\u{4DBF}'
            | '\u{4E00}'..='\u{9FFF}'
            | '\u{AC00}'..='\u{D7AF}'
            | '\u{F900}'..='\u{FAFF}'
    )
}
