//! Action Extraction
//!
//! Two strategies, tried in order; the first one that matches anything
//! owns the whole reply:
//!
//! 1. fenced code blocks tagged `json`
//! 2. inline objects opening with `"action": "call_service"`

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

static FENCED_JSON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json\s*(.*?)\s*```").expect("valid regex"));

static INLINE_CALL_SERVICE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\{\s*"action"\s*:\s*"call_service""#).expect("valid regex"));

/// Which pattern produced the candidates
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtractStrategy {
    FencedJson,
    InlineCallService,
}

/// One candidate payload and where it sits in the reply
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    /// Payload text to decode
    pub body: String,

    /// Byte range of the whole match, fences included
    pub span: Range<usize>,

    /// Byte range of `body` within the reply
    pub body_span: Range<usize>,
}

/// Outcome of scanning a reply for action payloads
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Extraction {
    NoMatch,
    Matched {
        strategy: ExtractStrategy,
        candidates: Vec<Candidate>,
    },
}

impl Extraction {
    pub fn candidates(&self) -> &[Candidate] {
        match self {
            Self::NoMatch => &[],
            Self::Matched { candidates, .. } => candidates,
        }
    }

    pub const fn strategy(&self) -> Option<ExtractStrategy> {
        match self {
            Self::NoMatch => None,
            Self::Matched { strategy, .. } => Some(*strategy),
        }
    }

    /// Reply with every matched payload removed, trimmed
    ///
    /// Spaces on both sides of a removed payload collapse to one.
    pub fn strip(&self, reply: &str) -> String {
        let mut out = String::with_capacity(reply.len());
        let mut cursor = 0;
        for candidate in self.candidates() {
            out.push_str(&reply[cursor..candidate.span.start]);
            cursor = candidate.span.end;
            if out.ends_with([' ', '\t']) {
                let rest = &reply[cursor..];
                cursor += rest.len() - rest.trim_start_matches([' ', '\t']).len();
            }
        }
        out.push_str(&reply[cursor..]);
        out.trim().to_string()
    }

    /// Reply with fence markers removed but payload bodies kept
    ///
    /// Inline matches have no markers, so the reply comes back unchanged.
    pub fn unfence(&self, reply: &str) -> String {
        match self.strategy() {
            Some(ExtractStrategy::FencedJson) => self
                .rebuild(reply, |c| &reply[c.body_span.clone()])
                .trim()
                .to_string(),
            _ => reply.to_string(),
        }
    }

    fn rebuild<'a>(&self, reply: &'a str, replace: impl Fn(&Candidate) -> &'a str) -> String {
        let mut out = String::with_capacity(reply.len());
        let mut cursor = 0;
        for candidate in self.candidates() {
            out.push_str(&reply[cursor..candidate.span.start]);
            out.push_str(replace(candidate));
            cursor = candidate.span.end;
        }
        out.push_str(&reply[cursor..]);
        out
    }
}

/// Scan a raw model reply for action payloads
pub fn extract(reply: &str) -> Extraction {
    let fenced: Vec<Candidate> = FENCED_JSON
        .captures_iter(reply)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let body = caps.get(1).filter(|b| b.as_str().starts_with('{'))?;
            Some(Candidate {
                body: body.as_str().to_string(),
                span: whole.range(),
                body_span: body.range(),
            })
        })
        .collect();

    if !fenced.is_empty() {
        return Extraction::Matched {
            strategy: ExtractStrategy::FencedJson,
            candidates: fenced,
        };
    }

    let inline = inline_candidates(reply);
    if !inline.is_empty() {
        return Extraction::Matched {
            strategy: ExtractStrategy::InlineCallService,
            candidates: inline,
        };
    }

    Extraction::NoMatch
}

fn inline_candidates(reply: &str) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    let mut from = 0;

    while let Some(found) = INLINE_CALL_SERVICE.find_at(reply, from) {
        let start = found.start();
        // Unterminated objects run up to the next match and fail decoding later.
        let end = object_end(reply, start).unwrap_or_else(|| {
            INLINE_CALL_SERVICE
                .find_at(reply, found.end())
                .map_or(reply.len(), |next| next.start())
        });
        candidates.push(Candidate {
            body: reply[start..end].to_string(),
            span: start..end,
            body_span: start..end,
        });
        from = end;
    }

    candidates
}

/// Byte offset just past the brace closing the object opened at `start`
fn object_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(start + offset + 1);
                }
            }
            _ => {}
        }
    }

    None
}
