//! Table naming convention shared by every tenant.
//!
//! Remote tables are named `<prefix>_<TENANT>` where the tenant (agency) code
//! is two letters followed by three digits, e.g. `clients_welcome_TT001`.
//! Names without that suffix are global and keep their full normalised name
//! as the prefix.

use std::fmt;

const TENANT_CODE_LETTERS: usize = 2;
const TENANT_CODE_DIGITS: usize = 3;
const TENANT_CODE_LEN: usize = TENANT_CODE_LETTERS + TENANT_CODE_DIGITS;
const USERS_TABLE: &str = "users";

/// Prefix and tenant code derived from a remote table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParsedTableName {
    /// Semantic table kind shared across tenants.
    pub prefix: String,
    /// Upper-cased tenant code, or `None` for global tables.
    pub tenant_code: Option<String>,
}

impl fmt::Display for ParsedTableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tenant_code {
            Some(code) => write!(f, "{}[{code}]", self.prefix),
            None => write!(f, "{}[global]", self.prefix),
        }
    }
}

/// Split a remote table name into its prefix and tenant code.
///
/// The name is lower-cased and every whitespace run becomes one underscore
/// before matching. Parsing never fails: unrecognised names are returned as
/// global tables keyed by their normalised name.
///
/// # Examples
/// ```
/// use backend::domain::parse_table_name;
///
/// let parsed = parse_table_name("clients_welcome_tt001");
/// assert_eq!(parsed.prefix, "clients_welcome");
/// assert_eq!(parsed.tenant_code.as_deref(), Some("TT001"));
///
/// let global = parse_table_name("Leads Board");
/// assert_eq!(global.prefix, "leads_board");
/// assert!(global.tenant_code.is_none());
/// ```
pub fn parse_table_name(name: &str) -> ParsedTableName {
    let normalised = normalise(name);

    if let Some((prefix, code)) = split_tenant_suffix(&normalised) {
        return ParsedTableName {
            prefix: prefix.to_owned(),
            tenant_code: Some(code.to_ascii_uppercase()),
        };
    }

    if normalised == USERS_TABLE {
        return ParsedTableName {
            prefix: USERS_TABLE.to_owned(),
            tenant_code: None,
        };
    }

    ParsedTableName {
        prefix: normalised,
        tenant_code: None,
    }
}

fn normalise(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_whitespace = false;
    for ch in name.chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                out.push('_');
            }
            in_whitespace = true;
        } else {
            out.extend(ch.to_lowercase());
            in_whitespace = false;
        }
    }
    out
}

/// Return `(prefix, code)` when `name` ends in `_<LL><DDD>` with a non-empty
/// prefix.
fn split_tenant_suffix(name: &str) -> Option<(&str, &str)> {
    let (prefix, code) = name.rsplit_once('_')?;
    if prefix.is_empty() || !is_tenant_code(code) {
        return None;
    }
    Some((prefix, code))
}

fn is_tenant_code(candidate: &str) -> bool {
    let bytes = candidate.as_bytes();
    if bytes.len() != TENANT_CODE_LEN {
        return false;
    }
    let (letters, digits) = bytes.split_at(TENANT_CODE_LETTERS);
    letters.iter().all(u8::is_ascii_alphabetic) && digits.iter().all(u8::is_ascii_digit)
}
