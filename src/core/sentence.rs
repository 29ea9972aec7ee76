use serde::Serialize;

/// Kind of a checksummed sentence, decided by its leading marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SentenceKind {
    /// `$` sentence (talker sentences such as RMC, GGA)
    Standard,
    /// `!` sentence (encapsulated data, e.g. AIS VDM/VDO)
    Encapsulated,
}

/// Compute the XOR checksum over the bytes of a sentence body
pub fn checksum(body: &str) -> u8 {
    body.bytes().fold(0, |acc, b| acc ^ b)
}

/// Check that a line is a well-formed sentence with a matching checksum.
///
/// The line must start with `$` or `!`, contain exactly one `*`, have a
/// non-empty body and end in two hex digits equal to the XOR of the body.
pub fn is_valid_sentence(line: &str) -> bool {
    classify(line).is_some()
}

/// Classify a line, returning `None` for anything that fails validation
pub fn classify(line: &str) -> Option<SentenceKind> {
    let kind = match line.as_bytes().first()? {
        b'$' => SentenceKind::Standard,
        b'!' => SentenceKind::Encapsulated,
        _ => return None,
    };

    let (body, given) = line.get(1..)?.split_once('*')?;
    if body.is_empty() || given.contains('*') {
        return None;
    }

    let given = parse_hex_pair(given)?;
    (checksum(body) == given).then_some(kind)
}

/// Three-character sentence type following the two-character talker ID
pub fn type_code(line: &str) -> Option<&str> {
    line.get(3..6)
}

/// Whether a valid sentence wraps an AIS message (VDM or VDO)
pub fn is_ais(line: &str) -> bool {
    classify(line).is_some() && matches!(type_code(line), Some("VDM") | Some("VDO"))
}

fn parse_hex_pair(s: &str) -> Option<u8> {
    if s.len() != 2 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u8::from_str_radix(s, 16).ok()
}
