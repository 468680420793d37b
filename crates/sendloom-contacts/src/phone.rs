//! Phone number normalization.

/// Header names accepted as the phone column, compared case-insensitively
/// after stripping spaces, underscores and dashes.
const PHONE_HEADERS: &[&str] = &["phone", "phonenumber", "mobile", "whatsapp", "tel", "number"];

/// True if a CSV header names the phone column.
pub fn is_phone_header(header: &str) -> bool {
    let folded: String = header
        .chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .collect::<String>()
        .to_ascii_lowercase();
    PHONE_HEADERS.contains(&folded.as_str())
}

/// Normalize a raw phone value to international format: a leading `+`
/// followed by digits only. Separators (spaces, dashes, dots, parentheses)
/// are stripped; a `00` international prefix becomes `+`. Returns None when
/// no plausible number remains.
pub fn normalize(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let has_plus = trimmed.starts_with('+');
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    // Reject values with letters or other junk beyond separators.
    let stray = trimmed
        .chars()
        .any(|c| !c.is_ascii_digit() && !matches!(c, '+' | ' ' | '-' | '.' | '(' | ')'));
    if stray {
        return None;
    }

    let digits = if !has_plus && digits.starts_with("00") {
        digits[2..].to_string()
    } else {
        digits
    };

    // Too short to be a dialable international number.
    if digits.len() < 7 {
        return None;
    }

    Some(format!("+{digits}"))
}
