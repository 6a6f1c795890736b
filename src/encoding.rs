//! Charset detection and conversion for downloaded text payloads
//!
//! e-Stat serves most CSV files as Shift-JIS (Windows-31J) while the
//! `Content-Type` header frequently claims UTF-8, so the declared charset
//! cannot be taken at face value. [`EncodingResolver`] decides which source of
//! truth wins according to an [`EncodingPolicy`]:
//!
//! - **content-first**: strict Shift-JIS, then strict UTF-8, then a
//!   statistical guess accepted only at [`MIN_CONFIDENCE`] or above.
//! - **header-first**: the `charset=` token of the transport hint, then the
//!   content-first chain.
//!
//! Pure-ASCII input is valid Shift-JIS, so it always resolves to Shift-JIS
//! under content-first.

use encoding_rs::{Encoding, SHIFT_JIS, UTF_8};
use regex::Regex;
use std::sync::OnceLock;

use crate::config::EncodingPolicy;
use crate::error::EncodingError;

/// Minimum confidence for a statistical guess to be accepted
pub const MIN_CONFIDENCE: f64 = 0.7;

/// How an encoding was chosen
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectionSource {
    /// Leading byte order mark
    ByteOrderMark,
    /// `charset=` token of the transport hint (header-first only)
    TransportHint,
    /// Strict decode under the regional legacy encoding (Shift-JIS)
    Legacy,
    /// Strict UTF-8 decode
    Utf8,
    /// Statistical guess above the confidence threshold
    Statistical,
}

/// Encoding decision without the decoded text
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    /// Chosen encoding
    pub encoding: &'static Encoding,
    /// How it was chosen
    pub source: DetectionSource,
    /// 1.0 for strict decodes, the plausibility score for statistical guesses
    pub confidence: f64,
}

/// Text decoded from a payload, with the decision that produced it
#[derive(Clone, Debug, PartialEq)]
pub struct Decoded {
    /// Decoded text
    pub text: String,
    /// Decision that produced `text`
    pub detection: Detection,
}

impl Decoded {
    fn strict(text: String, encoding: &'static Encoding, source: DetectionSource) -> Self {
        Self {
            text,
            detection: Detection {
                encoding,
                source,
                confidence: 1.0,
            },
        }
    }
}

/// Decodes text payloads according to an [`EncodingPolicy`]
#[derive(Clone, Copy, Debug, Default)]
pub struct EncodingResolver {
    policy: EncodingPolicy,
}

impl EncodingResolver {
    /// Create a resolver with the given policy
    pub fn new(policy: EncodingPolicy) -> Self {
        Self { policy }
    }

    /// Resolver that ignores transport hints
    pub fn content_first() -> Self {
        Self::new(EncodingPolicy::ContentFirst)
    }

    /// Resolver that tries the transport hint before sniffing
    pub fn header_first() -> Self {
        Self::new(EncodingPolicy::HeaderFirst)
    }

    /// Active policy
    pub fn policy(&self) -> EncodingPolicy {
        self.policy
    }

    /// Decode `bytes` to text
    ///
    /// `transport_hint` is a `Content-Type` header value such as
    /// `text/csv; charset=utf-8`. It is ignored under content-first.
    ///
    /// # Examples
    ///
    /// ```
    /// use estat_dl::encoding::EncodingResolver;
    ///
    /// let sjis = b"\x83\x65\x83\x58\x83\x67,\x83\x66\x81\x5b\x83\x5e,123";
    /// let decoded = EncodingResolver::content_first()
    ///     .decode(sjis, Some("text/csv; charset=utf-8"))
    ///     .unwrap();
    /// assert_eq!(decoded.text, "テスト,データ,123");
    /// ```
    pub fn decode(
        &self,
        bytes: &[u8],
        transport_hint: Option<&str>,
    ) -> Result<Decoded, EncodingError> {
        if self.policy == EncodingPolicy::HeaderFirst
            && let Some(decoded) = transport_hint.and_then(|hint| decode_with_hint(bytes, hint))
        {
            return Ok(decoded);
        }
        sniff(bytes)
    }
}

/// Content-only encoding decision (the content-first chain without producing text)
pub fn detect(bytes: &[u8]) -> Result<Detection, EncodingError> {
    sniff(bytes).map(|decoded| decoded.detection)
}

/// Extract the charset token from a `Content-Type` value
///
/// ```
/// use estat_dl::encoding::charset_from_content_type;
///
/// assert_eq!(charset_from_content_type("text/csv; Charset=\"Shift_JIS\""), Some("Shift_JIS"));
/// assert_eq!(charset_from_content_type("text/csv"), None);
/// ```
pub fn charset_from_content_type(content_type: &str) -> Option<&str> {
    static CHARSET: OnceLock<Option<Regex>> = OnceLock::new();
    let re = CHARSET
        .get_or_init(|| Regex::new(r#"(?i)charset\s*=\s*"?([^\s;"]+)"?"#).ok())
        .as_ref()?;
    re.captures(content_type)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn decode_with_hint(bytes: &[u8], hint: &str) -> Option<Decoded> {
    let label = charset_from_content_type(hint)?;
    let Some(encoding) = Encoding::for_label(label.trim().as_bytes()) else {
        tracing::debug!(charset = label, "Unknown charset in transport hint, sniffing content");
        return None;
    };
    match decode_strict(encoding, bytes) {
        Some(text) => Some(Decoded::strict(
            text,
            encoding,
            DetectionSource::TransportHint,
        )),
        None => {
            tracing::debug!(
                charset = encoding.name(),
                "Payload does not match declared charset, sniffing content"
            );
            None
        }
    }
}

fn sniff(bytes: &[u8]) -> Result<Decoded, EncodingError> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes)
        && let Some(text) = decode_strict(encoding, &bytes[bom_len..])
    {
        return Ok(Decoded::strict(
            text,
            encoding,
            DetectionSource::ByteOrderMark,
        ));
    }

    if let Some(text) = decode_strict(SHIFT_JIS, bytes) {
        return Ok(Decoded::strict(text, SHIFT_JIS, DetectionSource::Legacy));
    }

    if let Some(text) = decode_strict(UTF_8, bytes) {
        return Ok(Decoded::strict(text, UTF_8, DetectionSource::Utf8));
    }

    guess(bytes)
}

fn decode_strict(encoding: &'static Encoding, bytes: &[u8]) -> Option<String> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| text.into_owned())
}

fn guess(bytes: &[u8]) -> Result<Decoded, EncodingError> {
    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(bytes, true);
    // UTF-8 was already ruled out by the strict pass
    let encoding = detector.guess(None, false);

    let (text, _had_errors) = encoding.decode_without_bom_handling(bytes);
    let confidence = plausibility(&text);
    if confidence < MIN_CONFIDENCE {
        tracing::debug!(
            encoding = encoding.name(),
            confidence,
            "Statistical guess rejected"
        );
        if text.is_empty() {
            return Err(EncodingError::Undetectable);
        }
        return Err(EncodingError::LowConfidence {
            encoding: encoding.name(),
            confidence,
        });
    }

    Ok(Decoded {
        text: text.into_owned(),
        detection: Detection {
            encoding,
            source: DetectionSource::Statistical,
            confidence,
        },
    })
}

/// Fraction of characters that look like text: not U+FFFD and not a control
/// character other than tab, CR, LF.
fn plausibility(text: &str) -> f64 {
    let mut total = 0usize;
    let mut plausible = 0usize;
    for c in text.chars() {
        total += 1;
        let is_noise =
            c == char::REPLACEMENT_CHARACTER || (c.is_control() && !matches!(c, '\t' | '\r' | '\n'));
        if !is_noise {
            plausible += 1;
        }
    }
    if total == 0 {
        return 0.0;
    }
    plausible as f64 / total as f64
}
