/// Validates a masked card number such as `440043******1234`.
/// Rules:
/// - 12-19 characters
/// - Only ASCII digits and `*`
/// - At least one masked digit and the last four digits in clear
pub fn is_valid_card_mask(mask: &str) -> bool {
    let len = mask.len();
    if !(12..=19).contains(&len) {
        return false;
    }
    if !mask.chars().all(|c| c.is_ascii_digit() || c == '*') {
        return false;
    }
    if !mask.contains('*') {
        return false;
    }
    mask[len - 4..].chars().all(|c| c.is_ascii_digit())
}

/// Gateway card tokens are opaque, but must be non-empty, printable and short.
pub fn is_valid_card_token(token: &str) -> bool {
    !token.is_empty()
        && token.len() <= 255
        && token.chars().all(|c| c.is_ascii_graphic())
}

pub fn is_valid_expiry_month(month: i32) -> bool {
    (1..=12).contains(&month)
}
