/// Parses a nominal remaining-time string into total minutes.
///
/// Accepted shapes: "1h 30m", "45m", "2h". The upstream feed emits a
/// localized hour suffix in some locales, so "1s 0m" is read as 60 minutes
/// too. Anything else is rejected and the caller degrades gracefully.
pub fn parse_eta_minutes(input: &str) -> Option<u32> {
    let tokens: Vec<&str> = input.split_whitespace().collect();
    if tokens.is_empty() || tokens.len() > 2 {
        return None;
    }

    let mut hours: Option<u32> = None;
    let mut minutes: Option<u32> = None;
    for token in tokens {
        let unit = token.chars().last()?;
        let value: u32 = token[..token.len() - unit.len_utf8()].parse().ok()?;
        match unit {
            'h' | 's' if hours.is_none() && minutes.is_none() => hours = Some(value),
            'm' if minutes.is_none() => minutes = Some(value),
            _ => return None,
        }
    }

    // At least one token parsed, so at least one component is present.
    Some(hours.unwrap_or(0) * 60 + minutes.unwrap_or(0))
}

/// Formats total minutes back into the same family of strings: hours plus
/// minutes when at least a full hour remains, minutes alone otherwise.
pub fn format_eta_minutes(total: u32) -> String {
    if total >= 60 {
        format!("{}h {}m", total / 60, total % 60)
    } else {
        format!("{}m", total)
    }
}
