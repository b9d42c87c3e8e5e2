use std::sync::LazyLock;

use log::debug;
use mailparse::MailHeaderMap;
use regex::Regex;

use crate::{
    error::ParseError,
    structs::{DkimMetadata, EmailIdentity},
};

/// Command used when neither a subject nor a body line is available.
pub const FALLBACK_COMMAND: &str = "Accept guardian";

const DKIM_SIGNATURE: &str = "DKIM-Signature";
const ARC_SEAL: &str = "ARC-Seal";

static FOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\r?\n)+[ \t]+").expect("static regex"));
static BRACKETED_ADDR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([^>]+)>").expect("static regex"));
static BARE_ADDR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").expect("static regex")
});

/// Collapses header folding (a line break followed by whitespace) into a
/// single space. Handles CRLF and bare LF.
pub fn unfold(block: &str) -> String {
    FOLD.replace_all(block, " ").into_owned()
}

/// Returns the first `name:` block, from the start of its line up to the
/// next blank line or MIME boundary (or the end of input).
pub fn header_block<'a>(raw: &'a str, name: &str) -> Option<&'a str> {
    let pattern = format!(r"(?ims)^{}:.+?(?:\r?\n\r?\n|\r?\n--|\z)", regex::escape(name));
    let re = Regex::new(&pattern).ok()?;
    re.find(raw).map(|m| m.as_str())
}

/// Value of the first `tag=` in `block`, matched case-insensitively on a
/// `;`, `:` or whitespace boundary.
pub fn tag_value(block: &str, tag: &str) -> Option<String> {
    let pattern = format!(r"(?i)[;:\s]{}=([^;\s]+)", regex::escape(tag));
    let re = Regex::new(&pattern).ok()?;
    re.captures(block)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Extracts `d=` and `s=` from the first DKIM-Signature block.
pub fn extract_dkim_metadata(raw: &str) -> Result<DkimMetadata, ParseError> {
    let block = header_block(raw, DKIM_SIGNATURE).ok_or(ParseError::MissingHeader {
        header: DKIM_SIGNATURE,
    })?;
    let block = unfold(block);
    let domain = tag_value(&block, "d").ok_or(ParseError::MalformedDkim)?;
    let selector = tag_value(&block, "s").ok_or(ParseError::MalformedDkim)?;
    DkimMetadata::new(domain, selector).ok_or(ParseError::MalformedDkim)
}

/// `t=` of the first ARC-Seal block as Unix seconds.
pub fn extract_arc_timestamp(raw: &str) -> Option<u64> {
    let block = unfold(header_block(raw, ARC_SEAL)?);
    tag_value(&block, "t")?.parse().ok()
}

/// Lowercased sender address from the first `From:` header. Prefers the
/// `<addr>` form and falls back to a bare address anywhere in the value.
pub fn extract_sender(raw: &str) -> Option<EmailIdentity> {
    let from = HeaderView::parse(raw).from?;
    parse_address(&from)
}

fn parse_address(value: &str) -> Option<EmailIdentity> {
    if let Some(addr) = BRACKETED_ADDR.captures(value).and_then(|caps| caps.get(1)) {
        return EmailIdentity::new(addr.as_str());
    }
    BARE_ADDR
        .find(value)
        .and_then(|m| EmailIdentity::new(m.as_str()))
}

/// The Subject header, else the first body line, else [`FALLBACK_COMMAND`].
pub fn extract_command(raw: &str) -> String {
    if let Some(subject) = HeaderView::parse(raw).subject {
        return subject.trim().to_string();
    }
    split_body(raw)
        .and_then(|(_, body)| body.lines().next())
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .unwrap_or(FALLBACK_COMMAND)
        .to_string()
}

/// Splits at the first blank line. Returns `(headers, body)`.
pub fn split_body(raw: &str) -> Option<(&str, &str)> {
    let crlf = raw.find("\r\n\r\n").map(|i| (i, 4));
    let lf = raw.find("\n\n").map(|i| (i, 2));
    let (at, len) = match (crlf, lf) {
        (Some(a), Some(b)) => {
            if a.0 <= b.0 {
                a
            } else {
                b
            }
        }
        (a, b) => a.or(b)?,
    };
    Some((&raw[..at], &raw[at + len..]))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderView {
    pub from: Option<String>,
    pub subject: Option<String>,
    pub message_id: Option<String>,
    pub date: Option<String>,
}

impl HeaderView {
    pub fn parse(raw: &str) -> Self {
        match mailparse::parse_headers(raw.as_bytes()) {
            Ok((headers, _)) => Self {
                from: headers.get_first_value("From"),
                subject: headers.get_first_value("Subject"),
                message_id: headers.get_first_value("Message-ID"),
                date: headers.get_first_value("Date"),
            },
            Err(e) => {
                debug!("Unparseable header section: {}", e);
                Self::default()
            }
        }
    }
}

/// An input message. Immutable once read.
#[derive(Debug, Clone)]
pub struct RawEmail {
    text: String,
    headers: HeaderView,
    sender: Option<EmailIdentity>,
}

impl RawEmail {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let headers = HeaderView::parse(&text);
        let sender = headers.from.as_deref().and_then(parse_address);
        Self {
            text,
            headers,
            sender,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self::new(String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn headers(&self) -> &HeaderView {
        &self.headers
    }

    pub fn sender(&self) -> Option<&EmailIdentity> {
        self.sender.as_ref()
    }

    pub fn message_id(&self) -> Option<&str> {
        self.headers.message_id.as_deref()
    }

    /// `Date:` as Unix seconds, if present and parseable.
    pub fn date(&self) -> Option<u64> {
        let date = self.headers.date.as_deref()?;
        mailparse::dateparse(date)
            .ok()
            .and_then(|secs| u64::try_from(secs).ok())
    }

    pub fn dkim_metadata(&self) -> Result<DkimMetadata, ParseError> {
        extract_dkim_metadata(&self.text)
    }

    pub fn arc_timestamp(&self) -> Option<u64> {
        extract_arc_timestamp(&self.text)
    }
}
