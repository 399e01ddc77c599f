/// Default country calling code for 10-digit national numbers.
pub const DEFAULT_COUNTRY_CODE: &str = "1";

/// Normalize a phone number to E.164-like form when the digit count is known.
///
/// - 10 digits: prefixed with `+{country_code}`
/// - 11 digits starting with the country code's leading digit: prefixed with `+`
/// - anything else: returned unchanged, as it appeared in the source
pub fn normalize_phone(raw: &str, country_code: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    let lead = country_code.chars().next();

    if digits.len() == 10 {
        format!("+{country_code}{digits}")
    } else if digits.len() == 11 && digits.chars().next() == lead {
        format!("+{digits}")
    } else {
        raw.to_string()
    }
}

/// Clean a location or department name.
///
/// Steps:
/// 1. Replace underscores and hyphens with spaces
/// 2. Collapse repeated whitespace and trim
/// 3. Title-case each word
pub fn normalize_location(raw: &str) -> String {
    raw.replace(['_', '-'], " ")
        .split_whitespace()
        .map(title_case_word)
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Guess a department from the called-party text when the export has none.
pub fn infer_department(called: &str) -> Option<&'static str> {
    let lower = called.to_lowercase();
    let rules: [(&[&str], &str); 6] = [
        (&["911", "emergency"][..], "Emergency"),
        (&["reception", "front"][..], "Reception"),
        (&["billing", "accounts"][..], "Billing"),
        (&["cardio"][..], "Cardiology"),
        (&["pediatric", "peds"][..], "Pediatrics"),
        (&["ortho"][..], "Orthopedics"),
    ];
    rules
        .iter()
        .find(|(needles, _)| needles.iter().any(|n| lower.contains(n)))
        .map(|(_, dept)| *dept)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ten_digit_phone() {
        assert_eq!(normalize_phone("5551234567", "1"), "+15551234567");
        assert_eq!(normalize_phone("(555) 123-4567", "1"), "+15551234567");
    }

    #[test]
    fn test_eleven_digit_phone() {
        assert_eq!(normalize_phone("15551234567", "1"), "+15551234567");
        assert_eq!(normalize_phone("+1 555 123 4567", "1"), "+15551234567");
    }

    #[test]
    fn test_eleven_digits_other_lead_unchanged() {
        assert_eq!(normalize_phone("25551234567", "1"), "25551234567");
    }

    #[test]
    fn test_short_and_extension_unchanged() {
        assert_eq!(normalize_phone("123", "1"), "123");
        assert_eq!(normalize_phone("x4021", "1"), "x4021");
        assert_eq!(normalize_phone("", "1"), "");
    }

    #[test]
    fn test_other_country_code() {
        assert_eq!(normalize_phone("0201234567", "44"), "+440201234567");
        assert_eq!(normalize_phone("42012345678", "44"), "+42012345678");
    }

    #[test]
    fn test_location_cleanup() {
        assert_eq!(normalize_location("north_clinic"), "North Clinic");
        assert_eq!(normalize_location("  WEST-side   OFFICE "), "West Side Office");
        assert_eq!(normalize_location("Main"), "Main");
        assert_eq!(normalize_location(""), "");
    }

    #[test]
    fn test_infer_department() {
        assert_eq!(infer_department("cardio-desk"), Some("Cardiology"));
        assert_eq!(infer_department("911"), Some("Emergency"));
        assert_eq!(infer_department("Front Desk"), Some("Reception"));
        assert_eq!(infer_department("+15551234567"), None);
    }
}
