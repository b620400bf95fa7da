//! Text cleaning for raw crawled documents.
//!
//! Crawled Chinese web text arrives with invisible Unicode spaces, HTML
//! fragments, URLs, and copy-paste spam (the same phrase or punctuation
//! repeated dozens of times). Cleaning runs before any offset is computed,
//! so every downstream span refers to cleaned text.
//!
//! Order matters: invisible spaces, then HTML tags, then URLs, then
//! repeated-run collapsing, then final regex normalization.
//! Marker syntax (`@content<N>@`) passes through every rule untouched, so
//! supporting paragraphs are cleaned with the same function as body text.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::sample::Sample;

/// Invisible characters and HTML space entities removed outright.
static SPACES: &[&str] = &[
    "\u{00A0}", "\u{00AD}", "\u{200B}", "\u{200E}", "\u{202A}", "\u{202C}", "\u{202F}",
    "\u{205F}", "\u{2028}", "\u{2029}", "\u{2000}", "\u{2001}", "\u{2002}", "\u{2003}",
    "\u{2004}", "\u{2005}", "\u{2006}", "\u{2007}", "\u{2008}", "\u{2009}", "\u{200A}",
    "\u{1680}", "\u{180E}", "\u{2061}", "\u{3000}", "\u{FEFF}", "\u{F0D8}", "&#160;", "&nbsp;",
];

static WS_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Runs of opening angle brackets (`<<<` junk from broken markup).
static LT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"<{2,}").expect("valid regex"));

/// Angle brackets hugging Chinese text are markup accidents, not tags;
/// keep the text, drop the brackets.
static ANGLED_CHINESE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<?([\u{4e00}-\u{9fa5}]+)>").expect("valid regex"));

/// A candidate HTML tag. Tags containing Chinese are corpus text wearing
/// brackets and are handled by the angled-Chinese rule instead.
static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^<>]*>").expect("valid regex"));

static CHINESE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\u{4e00}-\u{9fa5}]").expect("valid regex"));

/// Schemeful URLs, `www.` URLs, and bare domain links.
///
/// No leading `\b` on the scheme alternative: `\b` is Unicode-aware and
/// CJK chars count as word chars, so a URL glued to Chinese text
/// (`详见http://…`) has no word boundary in front of it.
static URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:https?://|www\.)[-a-zA-Z0-9@:%._\+~#=/?&]+|\b[a-zA-Z0-9-]+\.(?:com|cn|net|org|gov|edu|info)\b(?:/[-a-zA-Z0-9@:%._\+~#=/?&]*)?",
    )
    .expect("valid regex")
});

/// Angle-bracketed numbers keep their digits: `<12>` → `12`.
static ANGLED_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"<(\d+)>").expect("valid regex"));

/// Control-character escapes rendered as caret sequences (`^G`, `^H`).
static CARET_CTRL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\^[A-Z]").expect("valid regex"));

/// Punctuation whose runs collapse to a single occurrence.
const RUN_PUNCT: &str = "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~！？｡。＃＄％＆＇（）＊＋，－／：；＜＝＞＠［＼］＾＿｀｛｜｝～｟｠｢｣､、〃〈〉《》「」『』【】〔〕〖〗〘〙〚〛〜〝〞〟〰–—‘’‛“”„‟…‧﹏﹑﹔·";

fn remove_unicode_space(text: &str) -> String {
    let mut text = text.to_string();
    for space in SPACES {
        if text.contains(space) {
            text = text.replace(space, "");
        }
    }
    WS_RUN.replace_all(&text, " ").into_owned()
}

fn remove_html_tag(text: &str) -> String {
    let text = LT_RUN.replace_all(text, "");
    let text = ANGLED_CHINESE.replace_all(&text, "$1");
    HTML_TAG
        .replace_all(&text, |caps: &regex::Captures<'_>| {
            if CHINESE.is_match(&caps[0]) {
                caps[0].to_string()
            } else {
                String::new()
            }
        })
        .into_owned()
}

fn remove_url_links(text: &str) -> String {
    URL.replace_all(text, "").into_owned()
}

/// Collapse three or more consecutive repeats of a short unit into one.
///
/// The `regex` crate has no backreferences, so this is a direct scan over
/// repeat units of up to four chars. Digits and roman-numeral letters are
/// protected: "2008" and "III" are content, not spam.
fn collapse_repeats(text: &str) -> String {
    const MAX_UNIT: usize = 4;
    const MIN_REPEATS: usize = 3;

    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    'outer: while i < chars.len() {
        for unit_len in 1..=MAX_UNIT.min(chars.len() - i) {
            let unit = &chars[i..i + unit_len];
            if unit.iter().any(|c| c.is_ascii_digit() || matches!(c, 'I' | 'X')) {
                continue;
            }

            let mut repeats = 1;
            while chars[i + repeats * unit_len..]
                .chunks(unit_len)
                .next()
                .is_some_and(|next| next == unit)
            {
                repeats += 1;
            }

            if repeats >= MIN_REPEATS {
                out.extend(unit);
                i += repeats * unit_len;
                continue 'outer;
            }
        }
        out.push(chars[i]);
        i += 1;
    }

    out
}

/// Collapse runs of identical punctuation (`！！！！` → `！`).
fn collapse_punct_runs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev: Option<char> = None;
    for c in text.chars() {
        if prev == Some(c) && RUN_PUNCT.contains(c) {
            continue;
        }
        out.push(c);
        prev = Some(c);
    }
    out
}

fn normalize(text: &str) -> String {
    let text = text.trim();
    let text = WS_RUN.replace_all(text, " ");
    let text = ANGLED_DIGITS.replace_all(&text, "$1");
    let text = CARET_CTRL.replace_all(&text, "");
    collapse_punct_runs(&text)
}

/// Clean one text field.
///
/// Idempotent: cleaning already-clean text is a no-op.
#[must_use]
pub fn clean_text(text: &str) -> String {
    normalize(&collapse_repeats(&remove_url_links(&remove_html_tag(
        &remove_unicode_space(text),
    ))))
}

/// Clean every text field of a sample in place.
///
/// Paragraphs are additionally deduplicated (first occurrence wins) and
/// emptied ones dropped, preserving order. The `answer` field is left
/// alone: answers are cleaned upstream at annotation time, and markers
/// inside them must survive byte-for-byte.
pub fn clean_sample(sample: &mut Sample) {
    sample.question = clean_text(&sample.question);
    sample.keyword = clean_text(&sample.keyword);
    if let Some(sp) = sample.supporting_paragraph.take() {
        sample.supporting_paragraph = Some(clean_text(&sp));
    }

    for doc in &mut sample.documents {
        doc.title = clean_text(&doc.title);

        let mut seen: Vec<String> = Vec::with_capacity(doc.paragraphs.len());
        for para in doc.paragraphs.drain(..) {
            let para = clean_text(&para);
            if !para.is_empty() && !seen.contains(&para) {
                seen.push(para);
            }
        }
        doc.paragraphs = seen;
    }
}
