//! Country evidence read from domains, email addresses and phone numbers.

use super::country::CountryProfile;

/// What a single signal says about the target country.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Support {
    Domestic,
    Foreign,
    Silent,
}

/// One piece of evidence, labelled for the classification reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signal {
    pub label: String,
    pub support: Support,
}

/// Public suffix of a domain: the longest compound suffix when one matches,
/// otherwise the last label. Returned with a leading dot.
pub fn domain_tld(domain: &str, profile: &CountryProfile) -> Option<String> {
    let domain = domain.trim().trim_end_matches('.').to_lowercase();
    if domain.is_empty() || !domain.contains('.') {
        return None;
    }
    let dotted = format!(".{domain}");
    let compound = profile
        .compound_tlds
        .iter()
        .filter(|suffix| dotted.ends_with(suffix.as_str()) && dotted.len() > suffix.len())
        .max_by_key(|suffix| suffix.len());
    if let Some(compound) = compound {
        return Some(compound.clone());
    }
    domain.rsplit('.').next().filter(|l| !l.is_empty()).map(|l| format!(".{l}"))
}

/// Domain part of an email address.
pub fn email_domain(email: &str) -> Option<&str> {
    email
        .trim()
        .rsplit_once('@')
        .map(|(_, domain)| domain)
        .filter(|d| !d.is_empty())
}

/// How a TLD relates to the profile. Compound suffixes count for the country
/// of their last label (".co.uk" is British).
pub fn tld_support(tld: &str, profile: &CountryProfile) -> Support {
    let last_label = tld.rsplit('.').next().map(|l| format!(".{l}"));
    if tld == profile.home_tld || last_label.as_deref() == Some(profile.home_tld.as_str()) {
        return Support::Domestic;
    }
    if profile.neutral_tlds.contains(tld) {
        return Support::Silent;
    }
    if profile.foreign_tlds.contains(tld)
        || last_label.is_some_and(|l| profile.foreign_tlds.contains(&l))
    {
        return Support::Foreign;
    }
    Support::Silent
}

/// Phone number with formatting characters removed and a `00` trunk prefix
/// rewritten to `+`.
pub fn compact_phone(phone: &str) -> String {
    let compact: String = phone
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '(' | ')' | '.' | '/'))
        .collect();
    match compact.strip_prefix("00") {
        Some(rest) => format!("+{rest}"),
        None => compact,
    }
}

/// Matching prefix and its support for an internationally formatted phone.
/// Local-format numbers and unknown prefixes return `None`.
pub fn phone_prefix(phone: &str, profile: &CountryProfile) -> Option<(String, Support)> {
    let compact = compact_phone(phone);
    if !compact.starts_with('+') {
        return None;
    }
    if compact.starts_with(&profile.home_phone_prefix) {
        return Some((profile.home_phone_prefix.clone(), Support::Domestic));
    }
    profile
        .foreign_phone_prefixes
        .iter()
        .filter(|p| compact.starts_with(p.as_str()))
        .max_by_key(|p| p.len())
        .map(|p| (p.clone(), Support::Foreign))
}

/// Whether a phone is written with an international prefix.
pub fn is_international(phone: &str) -> bool {
    compact_phone(phone).starts_with('+')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::processing::classify::country::CountryRegistry;

    fn lv() -> CountryProfile {
        CountryRegistry::builtin().get("LV").unwrap().clone()
    }

    #[test]
    fn test_compound_suffix_wins_over_last_label() {
        let profile = lv();
        assert_eq!(domain_tld("shop.acme.co.uk", &profile).as_deref(), Some(".co.uk"));
        assert_eq!(domain_tld("acme.lv", &profile).as_deref(), Some(".lv"));
        assert_eq!(domain_tld("localhost", &profile), None);
        assert_eq!(tld_support(".co.uk", &profile), Support::Foreign);
    }

    #[test]
    fn test_tld_support() {
        let profile = lv();
        assert_eq!(tld_support(".lv", &profile), Support::Domestic);
        assert_eq!(tld_support(".fi", &profile), Support::Foreign);
        assert_eq!(tld_support(".com", &profile), Support::Silent);
        assert_eq!(tld_support(".zz", &profile), Support::Silent);
    }

    #[test]
    fn test_phone_prefixes() {
        let profile = lv();
        assert_eq!(
            phone_prefix("+371 2000 0000", &profile),
            Some(("+371".to_string(), Support::Domestic))
        );
        assert_eq!(
            phone_prefix("00358 40 123 4567", &profile),
            Some(("+358".to_string(), Support::Foreign))
        );
        assert_eq!(phone_prefix("2000 0000", &profile), None);
        assert_eq!(phone_prefix("+999 123", &profile), None);
    }

    #[test]
    fn test_email_domain() {
        assert_eq!(email_domain("a@acme.fi"), Some("acme.fi"));
        assert_eq!(email_domain("broken@"), None);
        assert_eq!(email_domain("no-at-sign"), None);
    }
}
