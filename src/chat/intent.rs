// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Slot extraction
//!
//! Pattern rules that pull identifiers and simple intents out of an
//! utterance. Every slot keeps the source it came from so precedence can be
//! checked: utterance, then page, then the stored sticky value.
//!
//! Rule lists are ordered and the first match wins. Each rule is tested on
//! its own below.

use regex::Regex;
use std::sync::OnceLock;

use super::session::{PageContext, StickyIds};

/// Characters accepted in an identifier
const ID: &str = r"([A-Za-z0-9][A-Za-z0-9_\-]*)";

/// Where a slot value came from, strongest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SlotSource {
    Utterance,
    Page,
    Sticky,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub value: String,
    pub source: SlotSource,
}

impl Slot {
    fn new(value: impl Into<String>, source: SlotSource) -> Self {
        Self {
            value: value.into(),
            source,
        }
    }
}

/// Identifiers resolved for one turn
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Slots {
    pub meeting_note_id: Option<Slot>,
    pub item_id: Option<Slot>,
    pub topic_id: Option<Slot>,
    pub organization_id: Option<Slot>,
}

impl Slots {
    pub fn meeting_note_id(&self) -> Option<&str> {
        self.meeting_note_id.as_ref().map(|s| s.value.as_str())
    }

    pub fn item_id(&self) -> Option<&str> {
        self.item_id.as_ref().map(|s| s.value.as_str())
    }

    pub fn organization_id(&self) -> Option<&str> {
        self.organization_id.as_ref().map(|s| s.value.as_str())
    }

    /// Meeting note id written in the utterance itself
    pub fn mentioned_meeting_note_id(&self) -> Option<&str> {
        self.meeting_note_id
            .as_ref()
            .filter(|s| s.source == SlotSource::Utterance)
            .map(|s| s.value.as_str())
    }

    /// Sticky ids after this turn.
    ///
    /// Moving to another meeting note drops the stored item unless the
    /// utterance named one too.
    pub fn to_sticky(&self, prior: &StickyIds) -> StickyIds {
        let meeting_note_id = self.meeting_note_id().map(str::to_string);
        let switched = meeting_note_id.is_some() && meeting_note_id != prior.meeting_note_id;
        let item_id = match &self.item_id {
            Some(slot) if slot.source == SlotSource::Sticky && switched => None,
            Some(slot) => Some(slot.value.clone()),
            None => None,
        };
        StickyIds {
            meeting_note_id,
            item_id,
        }
    }
}

struct Rule {
    name: &'static str,
    pattern: Regex,
    /// Labels that disqualify a match when they precede it, spacing aside
    excluded_prefixes: &'static [&'static str],
}

impl Rule {
    fn new(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).unwrap(),
            excluded_prefixes: &[],
        }
    }

    fn excluding(mut self, prefixes: &'static [&'static str]) -> Self {
        self.excluded_prefixes = prefixes;
        self
    }

    fn find(&self, text: &str) -> Option<String> {
        self.pattern.captures_iter(text).find_map(|caps| {
            let whole = caps.get(0)?;
            let before = &text[..whole.start()];
            let label = before.trim_end().to_lowercase();
            let excluded = self.excluded_prefixes.iter().any(|p| label.ends_with(p))
                || before.chars().last().is_some_and(|c| c.is_ascii_alphabetic());
            if excluded && !self.excluded_prefixes.is_empty() {
                return None;
            }
            caps.get(1).map(|m| m.as_str().to_string())
        })
    }

    fn spans(&self, text: &str) -> Vec<(usize, usize)> {
        self.pattern
            .find_iter(text)
            .map(|m| (m.start(), m.end()))
            .collect()
    }
}

fn first_match(rules: &[Rule], text: &str) -> Option<String> {
    rules.iter().find_map(|rule| {
        let found = rule.find(text);
        if let Some(value) = &found {
            tracing::trace!(target: "bizdesk.chat.intent", rule = rule.name, value = %value, "rule matched");
        }
        found
    })
}

fn meeting_rules() -> &'static [Rule] {
    static RULES: OnceLock<Vec<Rule>> = OnceLock::new();
    RULES.get_or_init(|| {
        vec![
            Rule::new("labelled", &format!(r"議事録\s*ID\s*[:：]\s*{}", ID)),
            Rule::new(
                "camel_case",
                &format!(r"(?i)meeting[_\s-]?(?:note)?[_\s-]?id\s*[:：]\s*{}", ID),
            ),
            Rule::new("bare", &format!(r"(?i)\bID\s*[:：]\s*{}", ID))
                .excluding(&["item", "topic", "アイテム", "トピック", "組織", "organization"]),
            Rule::new("object_marker", &format!(r"議事録\s*{}\s*を", ID)),
            Rule::new("token", r"\b(meeting-[A-Za-z0-9_\-]+)"),
        ]
    })
}

fn item_rules() -> &'static [Rule] {
    static RULES: OnceLock<Vec<Rule>> = OnceLock::new();
    RULES.get_or_init(|| {
        vec![
            Rule::new("labelled", &format!(r"アイテム\s*ID\s*[:：]\s*{}", ID)),
            Rule::new("camel_case", &format!(r"(?i)item[_\s-]?id\s*[:：]\s*{}", ID)),
        ]
    })
}

fn topic_rules() -> &'static [Rule] {
    static RULES: OnceLock<Vec<Rule>> = OnceLock::new();
    RULES.get_or_init(|| {
        vec![
            Rule::new("labelled", &format!(r"トピック\s*ID\s*[:：]\s*{}", ID)),
            Rule::new("camel_case", &format!(r"(?i)topic[_\s-]?id\s*[:：]\s*{}", ID)),
        ]
    })
}

fn query_param(path: &str, key: &str) -> Option<String> {
    let (_, query) = path.split_once('?')?;
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == key && !v.is_empty()).then(|| v.to_string())
    })
}

fn organization_from_path(path: &str) -> Option<String> {
    static PATH: OnceLock<Regex> = OnceLock::new();
    let pattern = PATH.get_or_init(|| Regex::new(r"/organizations?/([A-Za-z0-9_\-]+)").unwrap());
    let route = path.split('?').next().unwrap_or(path);
    pattern
        .captures(route)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Resolve the turn's identifiers.
pub fn extract_slots(utterance: &str, page: &PageContext, sticky: &StickyIds) -> Slots {
    let meeting_note_id = first_match(meeting_rules(), utterance)
        .map(|v| Slot::new(v, SlotSource::Utterance))
        .or_else(|| {
            page.meeting_note_id
                .clone()
                .or_else(|| query_param(&page.path, "meetingId"))
                .map(|v| Slot::new(v, SlotSource::Page))
        })
        .or_else(|| {
            sticky
                .meeting_note_id
                .clone()
                .map(|v| Slot::new(v, SlotSource::Sticky))
        });

    let item_id = first_match(item_rules(), utterance)
        .map(|v| Slot::new(v, SlotSource::Utterance))
        .or_else(|| query_param(&page.path, "itemId").map(|v| Slot::new(v, SlotSource::Page)))
        .or_else(|| sticky.item_id.clone().map(|v| Slot::new(v, SlotSource::Sticky)));

    let topic_id = first_match(topic_rules(), utterance).map(|v| Slot::new(v, SlotSource::Utterance));

    let organization_id = page
        .organization_id
        .clone()
        .or_else(|| organization_from_path(&page.path))
        .map(|v| Slot::new(v, SlotSource::Page));

    let slots = Slots {
        meeting_note_id,
        item_id,
        topic_id,
        organization_id,
    };
    tracing::debug!(target: "bizdesk.chat.intent", slots = ?slots, "slots extracted");
    slots
}

/// Explicit item id in the utterance
pub fn mentioned_item_id(utterance: &str) -> Option<String> {
    first_match(item_rules(), utterance)
}

const AFFIRMATIVE_PREFIXES: &[&str] = &[
    "はい", "ええ", "うん", "お願い", "保存", "登録", "確定", "実行", "作成して", "オッケー", "ok",
    "okay", "yes", "yep", "sure", "confirm", "save", "go ahead",
];

const AFFIRMATIVE_PHRASES: &[&str] = &[
    "保存して",
    "登録して",
    "それでお願い",
    "それで大丈夫",
    "問題ありません",
    "問題ない",
    "いいです",
    "良いです",
    "よろしく",
    "了解",
    "looks good",
];

const NEGATIONS: &[&str] = &[
    "いいえ", "しない", "しないで", "やめ", "キャンセル", "待って", "違う", "だめ", "ダメ", "もういい",
    "don't", "cancel",
];

/// Whether the utterance confirms a pending preview
pub fn is_affirmation(utterance: &str) -> bool {
    let text = utterance
        .trim()
        .trim_end_matches(['。', '！', '!', '.', '、', '？', '?'])
        .to_lowercase();
    if text.is_empty() {
        return false;
    }
    let words: Vec<&str> = text
        .split(|c: char| !c.is_ascii_alphanumeric() && c != '\'')
        .filter(|word| !word.is_empty())
        .collect();
    // "no" only refuses at the start; "ok, no problem" still confirms
    let negated = words.first() == Some(&"no")
        || NEGATIONS.iter().any(|n| {
            if n.is_ascii() {
                words.contains(n)
            } else {
                text.contains(n)
            }
        });
    if negated {
        return false;
    }
    let prefixed = AFFIRMATIVE_PREFIXES.iter().any(|p| {
        text.strip_prefix(p).is_some_and(|rest| {
            !p.is_ascii() || !rest.starts_with(|c: char| c.is_ascii_alphanumeric())
        })
    });
    prefixed || AFFIRMATIVE_PHRASES.iter().any(|p| text.contains(p))
}

/// Whether the user asks for the most recent item
pub fn wants_latest_item(utterance: &str) -> bool {
    let text = utterance.to_lowercase();
    ["最新", "最後", "直近", "一番新しい", "新しいもの", "latest", "most recent", "newest"]
        .iter()
        .any(|w| text.contains(w))
}

/// Whether the utterance asks to create organization records
pub fn has_creation_intent(utterance: &str) -> bool {
    static COUNT: OnceLock<Regex> = OnceLock::new();
    let count = COUNT.get_or_init(|| {
        Regex::new(r"([0-9０-９]+|[一二三四五六七八九十])\s*(つ|個|件|部署|組織|チーム|部|課)").unwrap()
    });
    let text = utterance.to_lowercase();
    let verb = ["作成", "作って", "作る", "追加", "新設", "立ち上げ", "create", "add "]
        .iter()
        .any(|w| text.contains(w));
    verb || count.is_match(utterance)
}

const INSTRUCTION_WORDS: &[&str] = &[
    "議事録",
    "整形してください",
    "整形して",
    "整形",
    "フォーマット",
    "お願いします",
    "お願い",
    "ください",
    "して",
    "内容",
    "これ",
    "please",
    "format",
];

/// Whether the utterance carries content beyond ids and instructions
pub fn has_inline_content(utterance: &str, min_chars: usize) -> bool {
    let trimmed = utterance.trim();
    if trimmed.contains('\n') {
        return true;
    }
    let mut spans: Vec<(usize, usize)> = meeting_rules()
        .iter()
        .chain(item_rules())
        .chain(topic_rules())
        .flat_map(|rule| rule.spans(trimmed))
        .collect();
    spans.sort();
    let mut rest = String::with_capacity(trimmed.len());
    let mut cursor = 0;
    for (start, end) in spans {
        if start >= cursor {
            rest.push_str(&trimmed[cursor..start]);
            rest.push(' ');
        }
        cursor = cursor.max(end);
    }
    rest.push_str(&trimmed[cursor..]);

    let mut rest = rest.to_lowercase();
    for word in INSTRUCTION_WORDS {
        rest = rest.replace(word, " ");
    }
    let remaining = rest
        .chars()
        .filter(|c| !c.is_whitespace() && !"をのでにはがと、。,.!！?？:：「」".contains(*c))
        .count();
    remaining >= min_chars
}
