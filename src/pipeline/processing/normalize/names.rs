//! Restores diacritics that scrapers flatten out of person names, using the
//! LinkedIn profile slug as the source of truth.

use url::Url;

use crate::domain::{Lead, LeadField};

/// Surname particles kept lowercase unless they start the name.
const NAME_PARTICLES: &[&str] = &[
    "van", "von", "de", "der", "den", "di", "da", "del", "la", "le", "du", "dos", "das", "ten",
    "ter", "zu", "af",
];

/// Folds a name to lowercase ASCII: transliterates common Latin diacritics and
/// drops anything else outside ASCII.
pub fn fold_ascii(value: &str) -> String {
    let mut folded = String::with_capacity(value.len());
    for ch in value.trim().chars().flat_map(char::to_lowercase) {
        if ch.is_ascii() {
            folded.push(ch);
            continue;
        }
        let replacement = match ch {
            'ā' | 'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' | 'ą' | 'ă' => "a",
            'č' | 'ç' | 'ć' => "c",
            'ď' | 'đ' | 'ð' => "d",
            'ē' | 'é' | 'è' | 'ê' | 'ë' | 'ė' | 'ę' | 'ě' => "e",
            'ģ' | 'ğ' => "g",
            'ī' | 'í' | 'ì' | 'î' | 'ï' | 'į' | 'ı' => "i",
            'ķ' => "k",
            'ļ' | 'ł' | 'ľ' | 'ĺ' => "l",
            'ņ' | 'ñ' | 'ń' | 'ň' => "n",
            'ō' | 'ó' | 'ò' | 'ô' | 'ö' | 'õ' | 'ø' | 'ő' => "o",
            'ŗ' | 'ř' | 'ŕ' => "r",
            'š' | 'ś' | 'ş' | 'ș' => "s",
            'ț' | 'ţ' | 'ť' => "t",
            'ū' | 'ú' | 'ù' | 'û' | 'ü' | 'ų' | 'ů' | 'ű' => "u",
            'ý' | 'ÿ' => "y",
            'ž' | 'ź' | 'ż' => "z",
            'ß' => "ss",
            'æ' => "ae",
            'œ' => "oe",
            'þ' => "th",
            _ => "",
        };
        folded.push_str(replacement);
    }
    folded
}

/// Extracts the decoded profile slug from a LinkedIn URL (`/in/<slug>`).
pub fn profile_slug(linkedin_url: &str) -> Option<String> {
    let trimmed = linkedin_url.trim();
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let url = Url::parse(&with_scheme).ok()?;
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    let position = segments.iter().position(|s| *s == "in" || *s == "pub")?;
    let raw_slug = segments.get(position + 1)?;
    let decoded = urlencoding::decode(raw_slug).ok()?;
    Some(decoded.into_owned())
}

fn is_id_suffix(segment: &str) -> bool {
    segment.chars().count() >= 6 && segment.chars().any(|c| c.is_ascii_digit())
}

/// Splits a slug into title-cased `(first, last)` candidates after removing
/// trailing id suffixes the scraper or LinkedIn appended.
pub fn names_from_slug(slug: &str) -> Option<(String, String)> {
    let mut segments: Vec<&str> = slug.split('-').filter(|s| !s.is_empty()).collect();
    while segments.last().is_some_and(|s| is_id_suffix(s)) {
        segments.pop();
    }
    if segments.len() < 2 {
        return None;
    }

    let first = title_case_word(segments[0], true);
    let last = segments[1..]
        .iter()
        .enumerate()
        .map(|(i, word)| title_case_word(word, i == 0 && segments.len() == 2))
        .collect::<Vec<_>>()
        .join(" ");
    Some((first, last))
}

/// Title-cases one name word. Particles stay lowercase unless `leading`;
/// `Mc` prefixes and apostrophe-joined parts get inner capitals.
pub fn title_case_word(word: &str, leading: bool) -> String {
    let lower = word.to_lowercase();
    if !leading && NAME_PARTICLES.contains(&lower.as_str()) {
        return lower;
    }

    lower
        .split('\'')
        .map(|part| {
            if let Some(rest) = part.strip_prefix("mc").filter(|r| !r.is_empty()) {
                format!("Mc{}", capitalize(rest))
            } else {
                capitalize(part)
            }
        })
        .collect::<Vec<_>>()
        .join("'")
}

fn capitalize(part: &str) -> String {
    let mut chars = part.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn same_letters(a: &str, b: &str) -> bool {
    fold_ascii(a) == fold_ascii(b)
}

/// Replaces ASCII-flattened first/last names with their slug spelling. A name is
/// only replaced when both spellings fold to the same ASCII text, so a slug that
/// belongs to a different person never overwrites anything. Returns whether any
/// field changed.
pub fn restore_diacritics(lead: &mut Lead) -> bool {
    let Some((slug_first, slug_last)) = lead
        .value(LeadField::LinkedinUrl)
        .and_then(profile_slug)
        .and_then(|slug| names_from_slug(&slug))
    else {
        return false;
    };

    let old_first = lead.value(LeadField::FirstName).map(str::to_string);
    let old_last = lead.value(LeadField::LastName).map(str::to_string);
    let mut changed = false;

    let new_first = match &old_first {
        Some(old) if *old != slug_first && same_letters(old, &slug_first) => {
            changed = true;
            Some(slug_first)
        }
        other => other.clone(),
    };
    let new_last = match &old_last {
        Some(old) if *old != slug_last && same_letters(old, &slug_last) => {
            changed = true;
            Some(slug_last)
        }
        other => other.clone(),
    };

    if !changed {
        return false;
    }

    let full_matches_parts = match (lead.value(LeadField::FullName), &old_first, &old_last) {
        (Some(full), Some(of), Some(ol)) => same_letters(full, &format!("{of} {ol}")),
        _ => false,
    };
    if full_matches_parts {
        if let (Some(nf), Some(nl)) = (&new_first, &new_last) {
            lead.set(LeadField::FullName, Some(format!("{nf} {nl}")));
        }
    }
    lead.set(LeadField::FirstName, new_first);
    lead.set(LeadField::LastName, new_last);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SourceKind;

    fn lead_with(first: &str, last: &str, linkedin: &str) -> Lead {
        let mut lead = Lead::new(SourceKind::Apollo);
        lead.first_name = Some(first.to_string());
        lead.last_name = Some(last.to_string());
        lead.full_name = Some(format!("{first} {last}"));
        lead.linkedin_url = Some(linkedin.to_string());
        lead
    }

    #[test]
    fn test_restores_latvian_surname_from_slug() {
        let mut lead = lead_with(
            "Artis",
            "Miezitis",
            "https://www.linkedin.com/in/artis-miez%c4%abtis-33052036",
        );
        assert!(restore_diacritics(&mut lead));
        assert_eq!(lead.first_name.as_deref(), Some("Artis"));
        assert_eq!(lead.last_name.as_deref(), Some("Miezītis"));
        assert_eq!(lead.full_name.as_deref(), Some("Artis Miezītis"));
    }

    #[test]
    fn test_mismatched_profile_is_left_alone() {
        let mut lead = lead_with("Janis", "Berzins", "linkedin.com/in/peteris-ozols-1a2b3c4d");
        assert!(!restore_diacritics(&mut lead));
        assert_eq!(lead.last_name.as_deref(), Some("Berzins"));
    }

    #[test]
    fn test_slug_without_scheme_and_trailing_slash() {
        assert_eq!(
            profile_slug("linkedin.com/in/anna-%C5%A1mite/").as_deref(),
            Some("anna-šmite")
        );
        assert_eq!(profile_slug("https://example.com/about"), None);
    }

    #[test]
    fn test_short_numeric_segments_are_not_ids() {
        // "ii" and "3rd" are shorter than six characters and stay in the name
        let (first, last) = names_from_slug("john-smith-3rd").unwrap();
        assert_eq!(first, "John");
        assert_eq!(last, "Smith 3rd");
        assert!(names_from_slug("john-8a7b6c5d").is_none());
    }

    #[test]
    fn test_title_case_particles_and_inner_capitals() {
        let (_, last) = names_from_slug("jan-van-der-berg").unwrap();
        assert_eq!(last, "van der Berg");
        assert_eq!(title_case_word("mcdonald", true), "McDonald");
        assert_eq!(title_case_word("o'brien", true), "O'Brien");
        assert_eq!(title_case_word("de", true), "De");
    }

    #[test]
    fn test_fold_ascii() {
        assert_eq!(fold_ascii("Miezītis"), "miezitis");
        assert_eq!(fold_ascii("Straße"), "strasse");
        assert_eq!(fold_ascii(" Žanis "), "zanis");
    }
}
