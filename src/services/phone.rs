//! Phone number handling for Turkish numbers, the default market.

/// Channel a Twilio message travelled on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Sms,
    WhatsApp,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Sms => "sms",
            Channel::WhatsApp => "whatsapp",
        }
    }
}

fn digits(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// E.164 form for outbound sends, assuming +90 when no country code is present
pub fn format_phone_number(phone: &str) -> String {
    let cleaned = digits(phone);

    if cleaned.starts_with("90") {
        format!("+{}", cleaned)
    } else if let Some(rest) = cleaned.strip_prefix('0') {
        format!("+90{}", rest)
    } else if cleaned.len() == 10 {
        format!("+90{}", cleaned)
    } else {
        format!("+{}", cleaned)
    }
}

/// Canonical digits-only form (`905551234567`) of an inbound sender address
pub fn normalize_phone_number(phone: &str) -> String {
    let trimmed = phone.trim();
    let without_scheme = trimmed
        .strip_prefix("whatsapp:")
        .or_else(|| trimmed.strip_prefix("sms:"))
        .unwrap_or(trimmed);
    let cleaned = without_scheme.trim_start_matches('+');

    if cleaned.starts_with("90") && cleaned.len() == 12 {
        cleaned.to_string()
    } else if cleaned.starts_with('0') && cleaned.len() == 11 {
        format!("9{}", cleaned)
    } else if cleaned.len() == 10 && !cleaned.starts_with('0') {
        format!("90{}", cleaned)
    } else {
        cleaned.to_string()
    }
}

/// Every spelling a lead's phone might have been stored under
pub fn phone_variants(phone: &str) -> Vec<String> {
    let normalized = normalize_phone_number(phone);
    let national = normalized.strip_prefix("90").unwrap_or(&normalized).to_string();
    let trunk = format!("0{}", normalized.get(2..).unwrap_or_default());

    let mut variants = Vec::with_capacity(4);
    for candidate in [normalized.clone(), format!("+{}", normalized), national, trunk] {
        if !variants.contains(&candidate) {
            variants.push(candidate);
        }
    }
    variants
}

/// WhatsApp when either side carries the `whatsapp:` scheme
pub fn detect_channel(from: &str, to: &str) -> Channel {
    if from.to_lowercase().contains("whatsapp:") || to.to_lowercase().contains("whatsapp:") {
        Channel::WhatsApp
    } else {
        Channel::Sms
    }
}

/// Last ten digits, used as a fuzzy lookup key
pub fn trailing_digits(phone: &str) -> String {
    let normalized = digits(&normalize_phone_number(phone));
    let start = normalized.len().saturating_sub(10);
    normalized[start..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_turkish_numbers() {
        assert_eq!(format_phone_number("05551234567"), "+905551234567");
        assert_eq!(format_phone_number("5551234567"), "+905551234567");
        assert_eq!(format_phone_number("905551234567"), "+905551234567");
        assert_eq!(format_phone_number("+90 (555) 123 45 67"), "+905551234567");
    }

    #[test]
    fn keeps_foreign_numbers() {
        assert_eq!(format_phone_number("+44 7700 900123"), "+447700900123");
    }

    #[test]
    fn normalizes_inbound_addresses() {
        assert_eq!(normalize_phone_number("whatsapp:+905551234567"), "905551234567");
        assert_eq!(normalize_phone_number("05551234567"), "905551234567");
        assert_eq!(normalize_phone_number("5551234567"), "905551234567");
    }

    #[test]
    fn variants_cover_common_spellings() {
        let variants = phone_variants("whatsapp:+905551234567");
        assert_eq!(
            variants,
            vec![
                "905551234567".to_string(),
                "+905551234567".to_string(),
                "5551234567".to_string(),
                "05551234567".to_string(),
            ]
        );
    }

    #[test]
    fn detects_whatsapp_on_either_side() {
        assert_eq!(detect_channel("whatsapp:+905551234567", "+4420"), Channel::WhatsApp);
        assert_eq!(detect_channel("+905551234567", "WhatsApp:+4420"), Channel::WhatsApp);
        assert_eq!(detect_channel("+905551234567", "+4420"), Channel::Sms);
    }

    #[test]
    fn trailing_digits_of_short_numbers() {
        assert_eq!(trailing_digits("+905551234567"), "5551234567");
        assert_eq!(trailing_digits("123"), "123");
    }
}
