//! CQ-code helpers.
//!
//! OneBot v11 string messages embed rich segments as `[CQ:type,key=value,...]`.
//! Plain text escapes `&`, `[`, `]`; parameter values additionally escape `,`.

use std::collections::BTreeMap;

/// Escape plain message text.
pub fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('[', "&#91;")
        .replace(']', "&#93;")
}

/// Escape a CQ parameter value.
pub fn escape_param(s: &str) -> String {
    escape_text(s).replace(',', "&#44;")
}

/// Reverse [`escape_param`] / [`escape_text`].
pub fn unescape(s: &str) -> String {
    s.replace("&#44;", ",")
        .replace("&#91;", "[")
        .replace("&#93;", "]")
        .replace("&amp;", "&")
}

/// Mention segment.
pub fn at(user_id: &str) -> String {
    format!("[CQ:at,qq={}]", escape_param(user_id))
}

/// Image segment; `file` is a URL, path or `base64://` payload.
pub fn image(file: &str) -> String {
    format!("[CQ:image,file={}]", escape_param(file))
}

/// Built-in face segment.
pub fn face(id: &str) -> String {
    format!("[CQ:face,id={}]", escape_param(id))
}

/// Voice segment; `file` is a URL, path or `base64://` payload.
pub fn record(file: &str) -> String {
    format!("[CQ:record,file={}]", escape_param(file))
}

/// Dice segment; `None` lets the client roll.
pub fn dice(result: Option<u8>) -> String {
    match result {
        Some(n) => format!("[CQ:dice,result={n}]"),
        None => "[CQ:dice]".to_string(),
    }
}

/// Rock-paper-scissors segment (1 paper, 2 scissors, 3 rock); `None` lets the client pick.
pub fn rps(result: Option<u8>) -> String {
    match result {
        Some(n) => format!("[CQ:rps,result={n}]"),
        None => "[CQ:rps]".to_string(),
    }
}

/// One parsed piece of a CQ-coded message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Code {
        kind: String,
        params: BTreeMap<String, String>,
    },
}

impl Segment {
    /// `params[key]` when this is a code segment of `kind`.
    pub fn param(&self, kind: &str, key: &str) -> Option<&str> {
        match self {
            Segment::Code { kind: k, params } if k == kind => params.get(key).map(String::as_str),
            _ => None,
        }
    }
}

/// Split a CQ-coded message into text and code segments.
///
/// Malformed codes (no closing bracket) are kept as text.
pub fn parse(message: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut rest = message;

    while let Some(start) = rest.find("[CQ:") {
        let Some(len) = rest[start..].find(']') else {
            break;
        };
        if start > 0 {
            segments.push(Segment::Text(unescape(&rest[..start])));
        }
        let body = &rest[start + 4..start + len];
        let mut parts = body.split(',');
        let kind = parts.next().unwrap_or_default().to_string();
        let params = parts
            .filter_map(|p| p.split_once('='))
            .map(|(k, v)| (k.to_string(), unescape(v)))
            .collect();
        segments.push(Segment::Code { kind, params });
        rest = &rest[start + len + 1..];
    }

    if !rest.is_empty() {
        segments.push(Segment::Text(unescape(rest)));
    }
    segments
}

/// Concatenated plain text of a message, codes dropped.
pub fn plain_text(message: &str) -> String {
    parse(message)
        .into_iter()
        .filter_map(|s| match s {
            Segment::Text(t) => Some(t),
            Segment::Code { .. } => None,
        })
        .collect()
}
