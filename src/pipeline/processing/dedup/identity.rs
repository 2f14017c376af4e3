use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::{Lead, LeadField};

/// Kinds of identity evidence, in priority order (strongest first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyKind {
    Email,
    Linkedin,
    NameOrg,
}

impl KeyKind {
    pub const PRIORITY: [KeyKind; 3] = [KeyKind::Email, KeyKind::Linkedin, KeyKind::NameOrg];

    pub fn as_str(&self) -> &'static str {
        match self {
            KeyKind::Email => "email",
            KeyKind::Linkedin => "linkedin",
            KeyKind::NameOrg => "name_org",
        }
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    pub kind: KeyKind,
    pub value: String,
}

/// Zero to three identity keys of a lead, ordered by [`KeyKind::PRIORITY`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityKeys(Vec<IdentityKey>);

impl IdentityKeys {
    pub fn iter(&self) -> impl Iterator<Item = &IdentityKey> {
        self.0.iter()
    }

    pub fn get(&self, kind: KeyKind) -> Option<&str> {
        self.0.iter().find(|k| k.kind == kind).map(|k| k.value.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn normalize_key(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Derive the identity keys of a lead. Blank values never produce a key, and the
/// name+company composite is only built when both halves are present.
pub fn identity_keys(lead: &Lead) -> IdentityKeys {
    let mut keys = Vec::with_capacity(3);

    if let Some(email) = lead.value(LeadField::Email) {
        keys.push(IdentityKey {
            kind: KeyKind::Email,
            value: normalize_key(email),
        });
    }

    if let Some(linkedin) = lead.value(LeadField::LinkedinUrl) {
        let value = normalize_key(linkedin).trim_end_matches('/').to_string();
        if !value.is_empty() {
            keys.push(IdentityKey {
                kind: KeyKind::Linkedin,
                value,
            });
        }
    }

    if let (Some(name), Some(company)) = (lead.display_name(), lead.value(LeadField::CompanyName)) {
        let name = normalize_key(&name);
        if !name.is_empty() {
            keys.push(IdentityKey {
                kind: KeyKind::NameOrg,
                value: format!("{}|{}", name, normalize_key(company)),
            });
        }
    }

    IdentityKeys(keys)
}
