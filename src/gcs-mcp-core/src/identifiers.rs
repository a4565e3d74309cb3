//! Identifier validation.
//!
//! Every bucket name, object path, prefix and delimiter supplied by a caller
//! passes through this module before any storage call is built. The checks
//! are pure: no network access, no filesystem access.
//!
//! Object paths are normalised (`\` to `/`, repeated slashes collapsed,
//! leading slash removed) and the traversal check runs on the normalised
//! segments *and* on every percent-decoded view of them, so `..`, `%2e%2e`,
//! `%252e%252e` and `..\` are all rejected.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Serialize, Serializer};

/// Shortest bucket name the backend accepts.
pub const MIN_BUCKET_NAME_LEN: usize = 3;

/// Longest bucket name accepted.
pub const MAX_BUCKET_NAME_LEN: usize = 63;

/// Longest object name in UTF-8 bytes.
pub const MAX_OBJECT_NAME_BYTES: usize = 1024;

/// Longest delimiter in UTF-8 bytes.
pub const MAX_DELIMITER_BYTES: usize = 16;

/// Longest `Content-Type` value accepted.
pub const MAX_CONTENT_TYPE_BYTES: usize = 255;

/// Percent-decoding passes applied when looking for hidden traversal.
const MAX_DECODE_ROUNDS: usize = 3;

/// Object names the backend reserves.
const RESERVED_OBJECT_PREFIX: &str = ".well-known/acme-challenge/";

/// Errors produced by identifier validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    /// Empty input where a value is required.
    #[error("{what} must not be empty")]
    Empty { what: &'static str },

    /// Input shorter than the minimum.
    #[error("{what} is {len} bytes long; the minimum is {min}")]
    TooShort {
        what: &'static str,
        len: usize,
        min: usize,
    },

    /// Input longer than the maximum.
    #[error("{what} is {len} bytes long; the maximum is {max}")]
    TooLong {
        what: &'static str,
        len: usize,
        max: usize,
    },

    /// A control character or disallowed Unicode code point.
    #[error("{what} contains a disallowed character (U+{code:04X})")]
    DisallowedCharacter { what: &'static str, code: u32 },

    /// A `.` or `..` segment, in any encoding.
    #[error("{what} contains a '.' or '..' path segment")]
    Traversal { what: &'static str },

    /// Any other grammar violation.
    #[error("{what} {reason}")]
    Malformed {
        what: &'static str,
        reason: &'static str,
    },
}

// ============================================================================
// Bucket names
// ============================================================================

/// A bucket name that satisfies the backend naming grammar.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BucketName(String);

impl BucketName {
    /// Validate a caller-supplied bucket name.
    pub fn parse(input: &str) -> Result<Self, IdentifierError> {
        validate_bucket_name(input)
    }

    /// Borrow the name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Validate a bucket name: 3..=63 bytes of `[a-z0-9.-]`, alphanumeric at both
/// ends, no `..`, not an IPv4 literal, and no `goog`/`google` reserved words.
pub fn validate_bucket_name(input: &str) -> Result<BucketName, IdentifierError> {
    const WHAT: &str = "bucket name";

    if input.is_empty() {
        return Err(IdentifierError::Empty { what: WHAT });
    }
    if input.len() > MAX_BUCKET_NAME_LEN {
        return Err(IdentifierError::TooLong {
            what: WHAT,
            len: input.len(),
            max: MAX_BUCKET_NAME_LEN,
        });
    }
    if let Some(ch) = input
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-' || *c == '.'))
    {
        if is_disallowed_char(ch) {
            return Err(IdentifierError::DisallowedCharacter {
                what: WHAT,
                code: u32::from(ch),
            });
        }
        return Err(IdentifierError::Malformed {
            what: WHAT,
            reason: "may only contain lowercase letters, digits, hyphens and dots",
        });
    }
    if input.len() < MIN_BUCKET_NAME_LEN {
        return Err(IdentifierError::TooShort {
            what: WHAT,
            len: input.len(),
            min: MIN_BUCKET_NAME_LEN,
        });
    }

    let bytes = input.as_bytes();
    let alnum = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    if !alnum(bytes[0]) || !alnum(bytes[bytes.len() - 1]) {
        return Err(IdentifierError::Malformed {
            what: WHAT,
            reason: "must start and end with a letter or digit",
        });
    }
    if input.contains("..") {
        return Err(IdentifierError::Malformed {
            what: WHAT,
            reason: "must not contain consecutive dots",
        });
    }
    if looks_like_ipv4(input) {
        return Err(IdentifierError::Malformed {
            what: WHAT,
            reason: "must not be formatted as an IP address",
        });
    }
    if input.starts_with("goog") || input.contains("google") {
        return Err(IdentifierError::Malformed {
            what: WHAT,
            reason: "must not begin with \"goog\" or contain \"google\"",
        });
    }

    Ok(BucketName(input.to_string()))
}

/// Dotted-quad check that also catches forms `Ipv4Addr` refuses, such as
/// leading zeros.
fn looks_like_ipv4(input: &str) -> bool {
    if input.parse::<Ipv4Addr>().is_ok() {
        return true;
    }
    let parts: Vec<&str> = input.split('.').collect();
    parts.len() == 4
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
}

// ============================================================================
// Object paths, prefixes and delimiters
// ============================================================================

/// A normalised object path that cannot escape the bucket root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectPath(String);

impl ObjectPath {
    /// Validate and normalise a caller-supplied object path.
    pub fn parse(input: &str) -> Result<Self, IdentifierError> {
        validate_object_path(input)
    }

    /// Borrow the normalised path.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Validate and normalise an object path.
pub fn validate_object_path(input: &str) -> Result<ObjectPath, IdentifierError> {
    let normalized = normalize_path("object path", input)?;
    if normalized.is_empty() {
        return Err(IdentifierError::Malformed {
            what: "object path",
            reason: "contains no path segments",
        });
    }
    Ok(ObjectPath(normalized))
}

/// A listing prefix. The empty prefix matches every object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ObjectPrefix(String);

impl ObjectPrefix {
    /// Validate a caller-supplied prefix with the object path rules,
    /// except that empty input is allowed.
    pub fn parse(input: &str) -> Result<Self, IdentifierError> {
        if input.is_empty() {
            return Ok(Self::empty());
        }
        normalize_path("prefix", input).map(ObjectPrefix)
    }

    /// The match-everything prefix.
    pub fn empty() -> Self {
        Self(String::new())
    }

    /// Borrow the normalised prefix.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this prefix filters nothing.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A hierarchy delimiter for listings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Delimiter(String);

impl Delimiter {
    /// Validate a caller-supplied delimiter.
    pub fn parse(input: &str) -> Result<Self, IdentifierError> {
        const WHAT: &str = "delimiter";
        if input.is_empty() {
            return Err(IdentifierError::Empty { what: WHAT });
        }
        if input.len() > MAX_DELIMITER_BYTES {
            return Err(IdentifierError::TooLong {
                what: WHAT,
                len: input.len(),
                max: MAX_DELIMITER_BYTES,
            });
        }
        check_characters(WHAT, input)?;
        if input.contains("..") || input.chars().all(is_dot_like) {
            return Err(IdentifierError::Traversal { what: WHAT });
        }
        Ok(Self(input.to_string()))
    }

    /// Borrow the delimiter.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn normalize_path(what: &'static str, input: &str) -> Result<String, IdentifierError> {
    if input.is_empty() {
        return Err(IdentifierError::Empty { what });
    }
    if input.len() > MAX_OBJECT_NAME_BYTES {
        return Err(IdentifierError::TooLong {
            what,
            len: input.len(),
            max: MAX_OBJECT_NAME_BYTES,
        });
    }
    check_characters(what, input)?;

    let unified = input.replace('\\', "/");
    let segments: Vec<&str> = unified.split('/').filter(|s| !s.is_empty()).collect();
    if segments.iter().any(|s| is_dot_segment(s)) {
        return Err(IdentifierError::Traversal { what });
    }

    // Look through percent-encoding without changing the stored name.
    let mut view = unified.clone();
    for _ in 0..MAX_DECODE_ROUNDS {
        let raw = urlencoding::decode_binary(view.as_bytes());
        let decoded = match std::str::from_utf8(&raw) {
            Ok(text) => {
                check_characters(what, text)?;
                text.to_string()
            }
            Err(_) => String::from_utf8_lossy(&raw).into_owned(),
        };
        if decoded == view {
            break;
        }
        view = decoded.replace('\\', "/");
        if view.split('/').any(is_dot_segment) {
            return Err(IdentifierError::Traversal { what });
        }
    }

    let mut normalized = segments.join("/");
    if !normalized.is_empty() && unified.ends_with('/') {
        normalized.push('/');
    }
    if normalized.starts_with(RESERVED_OBJECT_PREFIX) {
        return Err(IdentifierError::Malformed {
            what,
            reason: "uses a prefix reserved by the backend",
        });
    }
    Ok(normalized)
}

/// A segment made only of dots (or dot look-alikes) and spaces.
///
/// Some filesystems strip trailing dots and spaces, so `...` and `. .` are
/// treated like `..`.
fn is_dot_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment.chars().any(is_dot_like)
        && segment.chars().all(|c| is_dot_like(c) || c == ' ')
}

fn is_dot_like(c: char) -> bool {
    matches!(c, '.' | '\u{2024}' | '\u{2025}' | '\u{FE52}' | '\u{FF0E}')
}

fn check_characters(what: &'static str, input: &str) -> Result<(), IdentifierError> {
    match input.chars().find(|c| is_disallowed_char(*c)) {
        Some(ch) => Err(IdentifierError::DisallowedCharacter {
            what,
            code: u32::from(ch),
        }),
        None => Ok(()),
    }
}

/// Control characters, invisible format characters, bidi controls,
/// the replacement character and non-characters.
fn is_disallowed_char(c: char) -> bool {
    let code = u32::from(c);
    c.is_control()
        || matches!(
            code,
            0x00AD
                | 0x061C
                | 0x180E
                | 0x200B..=0x200F
                | 0x202A..=0x202E
                | 0x2060..=0x2064
                | 0x2066..=0x206F
                | 0xFEFF
                | 0xFFF9..=0xFFFD
                | 0xFDD0..=0xFDEF
                | 0xE0000..=0xE007F
        )
        || (code & 0xFFFE) == 0xFFFE
}

// ============================================================================
// Object identifiers and generations
// ============================================================================

/// A validated `(bucket, object)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectIdentifier {
    /// Bucket holding the object.
    pub bucket: BucketName,
    /// Object path inside the bucket.
    pub name: ObjectPath,
}

impl ObjectIdentifier {
    /// Validate both halves.
    pub fn parse(bucket: &str, name: &str) -> Result<Self, IdentifierError> {
        Ok(Self {
            bucket: BucketName::parse(bucket)?,
            name: ObjectPath::parse(name)?,
        })
    }
}

impl fmt::Display for ObjectIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gs://{}/{}", self.bucket, self.name)
    }
}

/// An object generation (version id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Generation(i64);

impl Generation {
    /// Wrap a generation reported by the backend.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Validate a caller-supplied generation: a positive decimal integer.
    pub fn parse(input: &str) -> Result<Self, IdentifierError> {
        const WHAT: &str = "version";
        if input.is_empty() {
            return Err(IdentifierError::Empty { what: WHAT });
        }
        if input.len() > 19 || !input.bytes().all(|b| b.is_ascii_digit()) {
            return Err(IdentifierError::Malformed {
                what: WHAT,
                reason: "must be a positive decimal integer",
            });
        }
        match input.parse::<i64>() {
            Ok(value) if value > 0 => Ok(Self(value)),
            _ => Err(IdentifierError::Malformed {
                what: WHAT,
                reason: "must be a positive decimal integer",
            }),
        }
    }

    /// Raw value.
    pub fn get(self) -> i64 {
        self.0
    }
}

// ============================================================================
// Bucket attributes
// ============================================================================

/// A bucket location such as `US` or `europe-west1`, stored uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location(String);

impl Location {
    /// Validate a location: 2..=64 characters of `[A-Za-z0-9-]`.
    pub fn parse(input: &str) -> Result<Self, IdentifierError> {
        const WHAT: &str = "location";
        if input.is_empty() {
            return Err(IdentifierError::Empty { what: WHAT });
        }
        if input.len() > 64 {
            return Err(IdentifierError::TooLong {
                what: WHAT,
                len: input.len(),
                max: 64,
            });
        }
        if input.len() < 2 {
            return Err(IdentifierError::TooShort {
                what: WHAT,
                len: input.len(),
                min: 2,
            });
        }
        if !input.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
            return Err(IdentifierError::Malformed {
                what: WHAT,
                reason: "may only contain letters, digits and hyphens",
            });
        }
        Ok(Self(input.to_ascii_uppercase()))
    }

    /// Borrow the location.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Bucket storage classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageClass {
    Standard,
    Nearline,
    Coldline,
    Archive,
    MultiRegional,
    Regional,
    DurableReducedAvailability,
}

impl StorageClass {
    /// Every accepted class, in the order tools advertise them.
    pub const ALL: [StorageClass; 7] = [
        Self::Standard,
        Self::Nearline,
        Self::Coldline,
        Self::Archive,
        Self::MultiRegional,
        Self::Regional,
        Self::DurableReducedAvailability,
    ];

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "STANDARD",
            Self::Nearline => "NEARLINE",
            Self::Coldline => "COLDLINE",
            Self::Archive => "ARCHIVE",
            Self::MultiRegional => "MULTI_REGIONAL",
            Self::Regional => "REGIONAL",
            Self::DurableReducedAvailability => "DURABLE_REDUCED_AVAILABILITY",
        }
    }
}

impl FromStr for StorageClass {
    type Err = IdentifierError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|class| class.as_str().eq_ignore_ascii_case(input))
            .ok_or(IdentifierError::Malformed {
                what: "storage class",
                reason: "is not one of STANDARD, NEARLINE, COLDLINE, ARCHIVE, MULTI_REGIONAL, REGIONAL, DURABLE_REDUCED_AVAILABILITY",
            })
    }
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for StorageClass {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A syntactically valid media type, e.g. `text/plain; charset=utf-8`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentType(String);

impl ContentType {
    /// Validate a caller-supplied content type.
    pub fn parse(input: &str) -> Result<Self, IdentifierError> {
        const WHAT: &str = "content type";
        let malformed = |reason| IdentifierError::Malformed { what: WHAT, reason };

        if input.trim().is_empty() {
            return Err(IdentifierError::Empty { what: WHAT });
        }
        if input.len() > MAX_CONTENT_TYPE_BYTES {
            return Err(IdentifierError::TooLong {
                what: WHAT,
                len: input.len(),
                max: MAX_CONTENT_TYPE_BYTES,
            });
        }
        check_characters(WHAT, input)?;

        let mut parts = input.split(';');
        let essence = parts.next().unwrap_or_default().trim();
        let (kind, subtype) = essence
            .split_once('/')
            .ok_or(malformed("must have the form type/subtype"))?;
        if !is_token(kind) || !is_token(subtype) {
            return Err(malformed("must have the form type/subtype"));
        }
        for param in parts {
            let (name, value) = param
                .trim()
                .split_once('=')
                .ok_or(malformed("has a parameter without a value"))?;
            let quoted = value.len() >= 2 && value.starts_with('"') && value.ends_with('"');
            if !is_token(name) || !(is_token(value) || quoted) {
                return Err(malformed("has a malformed parameter"));
            }
        }
        Ok(Self(input.trim().to_string()))
    }

    /// Borrow the content type.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ContentType {
    fn default() -> Self {
        Self("text/plain".to_string())
    }
}

/// RFC 7230 `token`.
fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| {
            b.is_ascii_alphanumeric()
                || matches!(
                    b,
                    b'!' | b'#'
                        | b'$'
                        | b'%'
                        | b'&'
                        | b'\''
                        | b'*'
                        | b'+'
                        | b'-'
                        | b'.'
                        | b'^'
                        | b'_'
                        | b'`'
                        | b'|'
                        | b'~'
                )
        })
}

macro_rules! string_identifier {
    ($($ty:ty),+) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(&self.0)
                }
            }

            impl AsRef<str> for $ty {
                fn as_ref(&self) -> &str {
                    &self.0
                }
            }

            impl Serialize for $ty {
                fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                    serializer.serialize_str(&self.0)
                }
            }
        )+
    };
}

string_identifier!(BucketName, ObjectPath, ObjectPrefix, Delimiter, Location, ContentType);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_names_accepted() {
        for name in ["abc", "my-bucket", "logs.example.com", "a1-b2.c3"] {
            assert!(BucketName::parse(name).is_ok(), "{name} should be valid");
        }
        assert!(BucketName::parse(&"a".repeat(MAX_BUCKET_NAME_LEN)).is_ok());
    }

    #[test]
    fn test_bucket_length_limits() {
        assert_eq!(
            BucketName::parse(""),
            Err(IdentifierError::Empty { what: "bucket name" })
        );
        assert!(matches!(
            BucketName::parse("ab"),
            Err(IdentifierError::TooShort { len: 2, .. })
        ));
        assert!(matches!(
            BucketName::parse(&"a".repeat(64)),
            Err(IdentifierError::TooLong { len: 64, .. })
        ));
    }

    #[test]
    fn test_bucket_charset_and_format() {
        for name in [
            "MyBucket",
            "my_bucket",
            "my bucket",
            "bücket",
            "-bucket",
            "bucket-",
            ".bucket",
            "my..bucket",
            "192.168.1.1",
            "010.1.1.1",
            "goog-bucket",
            "my-google-bucket",
            "bad/name",
            "bad\u{0}name",
        ] {
            assert!(BucketName::parse(name).is_err(), "{name:?} should be rejected");
        }
    }

    #[test]
    fn test_object_path_normalisation() {
        let cases = [
            ("a/b.txt", "a/b.txt"),
            ("/a/b.txt", "a/b.txt"),
            ("a//b///c", "a/b/c"),
            ("a\\b\\c.txt", "a/b/c.txt"),
            ("folder/", "folder/"),
            ("dir.with.dots/file", "dir.with.dots/file"),
            ("100%25 done", "100%25 done"),
            ("résumé.pdf", "résumé.pdf"),
        ];
        for (input, expected) in cases {
            let path = ObjectPath::parse(input).expect("path should be valid");
            assert_eq!(path.as_str(), expected, "normalising {input:?}");
        }
    }

    #[test]
    fn test_object_path_rejects_traversal_in_any_encoding() {
        let attempts = [
            "..",
            ".",
            "../etc/passwd",
            "a/../../b",
            "a/./b",
            "a\\..\\b",
            "..\\windows",
            "a/%2e%2e/b",
            "%2E%2E/secret",
            "a/%2e/b",
            "a%2f..%2fb",
            "a%5c..%5cb",
            "%252e%252e/x",
            "%25252e%25252e/x",
            "a/.../b",
            "a/. ./b",
            "a/\u{FF0E}\u{FF0E}/b",
            "a/\u{2025}/b",
            "a/%EF%BC%8E%EF%BC%8E/b",
        ];
        for attempt in attempts {
            assert!(
                matches!(
                    ObjectPath::parse(attempt),
                    Err(IdentifierError::Traversal { .. })
                ),
                "{attempt:?} should be rejected as traversal"
            );
        }
    }

    #[test]
    fn test_object_path_rejects_bad_characters() {
        for input in [
            "a\nb",
            "a\u{0}b",
            "a%00b",
            "a%0Ab",
            "bidi\u{202E}txt.exe",
            "zero\u{200B}width",
            "bom\u{FEFF}",
            "bad\u{FFFD}",
        ] {
            assert!(
                matches!(
                    ObjectPath::parse(input),
                    Err(IdentifierError::DisallowedCharacter { .. })
                ),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_object_path_length_and_emptiness() {
        assert!(matches!(
            ObjectPath::parse(""),
            Err(IdentifierError::Empty { .. })
        ));
        assert!(matches!(
            ObjectPath::parse("///"),
            Err(IdentifierError::Malformed { .. })
        ));
        assert!(ObjectPath::parse(&"x".repeat(MAX_OBJECT_NAME_BYTES)).is_ok());
        assert!(matches!(
            ObjectPath::parse(&"x".repeat(MAX_OBJECT_NAME_BYTES + 1)),
            Err(IdentifierError::TooLong { .. })
        ));
        assert!(ObjectPath::parse(".well-known/acme-challenge/token").is_err());
    }

    #[test]
    fn test_prefix_and_delimiter() {
        assert!(ObjectPrefix::parse("").expect("empty prefix").is_empty());
        assert_eq!(
            ObjectPrefix::parse("/logs//2024/")
                .expect("prefix")
                .as_str(),
            "logs/2024/"
        );
        assert!(ObjectPrefix::parse("logs/../").is_err());

        assert_eq!(Delimiter::parse("/").expect("delimiter").as_str(), "/");
        assert!(Delimiter::parse("").is_err());
        assert!(Delimiter::parse("..").is_err());
        assert!(Delimiter::parse(".").is_err());
        assert!(Delimiter::parse("\n").is_err());
    }

    #[test]
    fn test_generation_parse() {
        assert_eq!(Generation::parse("1700000000000001").map(Generation::get), Ok(1_700_000_000_000_001));
        for bad in ["", "0", "-1", "12a", "99999999999999999999"] {
            assert!(Generation::parse(bad).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn test_bucket_attributes() {
        assert_eq!(Location::parse("us-central1").expect("loc").as_str(), "US-CENTRAL1");
        assert!(Location::parse("us central").is_err());
        assert_eq!("nearline".parse::<StorageClass>(), Ok(StorageClass::Nearline));
        assert!("GLACIER".parse::<StorageClass>().is_err());
    }

    #[test]
    fn test_content_type() {
        for ok in ["text/plain", "application/json; charset=utf-8", "image/svg+xml", "text/plain; a=\"b c\""] {
            assert!(ContentType::parse(ok).is_ok(), "{ok}");
        }
        for bad in ["", "text", "text/", "text/plain\r\nX-Evil: 1", "text/plain; charset", "a b/c"] {
            assert!(ContentType::parse(bad).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn test_identifier_display() {
        let id = ObjectIdentifier::parse("bucket-a", "/x/y.txt").expect("valid");
        assert_eq!(id.to_string(), "gs://bucket-a/x/y.txt");
    }
}
