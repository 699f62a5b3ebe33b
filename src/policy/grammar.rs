//! Shorthand permission grammar.
//!
//! A permission list may mix base permissions with shorthand groups:
//!
//! ```text
//! token             := basePermission | shorthandGrant | shorthandSubtract
//! shorthandGrant    := SHORTHAND
//! shorthandSubtract := SHORTHAND " - " item ("," item)*
//! item              := basePermission | SHORTHAND      (never "all")
//! ```
//!
//! Matching ignores case and surrounding whitespace. [`expand`] turns a
//! list into plain base permissions and never mutates its input.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use super::vocabulary::{PermissionCategory, ALL};

/// A problem with a single permission list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    #[error("'{0}' is not a valid permission")]
    InvalidToken(String),

    #[error("repeated permissions [{}]", .0.join(", "))]
    Repeated(Vec<String>),

    #[error("shorthand '{0}' is used more than once")]
    DuplicateShorthand(String),

    #[error("'all' removes the need for any other permission")]
    AllWithOthers,

    #[error("'{permission}' is already included by shorthand '{shorthand}'")]
    AlreadyIncluded {
        shorthand: String,
        permission: String,
    },

    #[error("'all' cannot be subtracted from '{0}'")]
    SubtractAll(String),

    #[error("'{item}' cannot be subtracted from '{shorthand}'")]
    InvalidSubtraction { shorthand: String, item: String },
}

/// A single parsed permission token.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Base(String),
    Grant(String),
    Subtract { shorthand: String, items: Vec<String> },
}

impl Token {
    fn shorthand(&self) -> Option<&str> {
        match self {
            Token::Base(_) => None,
            Token::Grant(name) | Token::Subtract { shorthand: name, .. } => Some(name.as_str()),
        }
    }

    /// Canonical text form, used for duplicate detection and output.
    fn canonical(&self) -> String {
        match self {
            Token::Base(name) | Token::Grant(name) => name.clone(),
            Token::Subtract { shorthand, items } => format!("{shorthand} - {}", items.join(",")),
        }
    }
}

fn subtract_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([a-z]+)\s*-\s*(\S.*)$").expect("subtractive shorthand pattern is valid")
    })
}

fn parse_token(raw: &str, category: PermissionCategory) -> Result<Token, GrammarError> {
    let token = raw.trim().to_lowercase();

    if category.is_base_permission(&token) {
        return Ok(Token::Base(token));
    }
    if category.shorthand(&token).is_some() {
        return Ok(Token::Grant(token));
    }

    let captures = subtract_pattern()
        .captures(&token)
        .ok_or_else(|| GrammarError::InvalidToken(raw.trim().to_string()))?;
    let shorthand = captures[1].to_string();
    if category.shorthand(&shorthand).is_none() {
        return Err(GrammarError::InvalidToken(raw.trim().to_string()));
    }

    let items: Vec<String> = captures[2].split(',').map(|i| i.trim().to_string()).collect();
    if items.iter().any(String::is_empty) {
        return Err(GrammarError::InvalidToken(raw.trim().to_string()));
    }

    Ok(Token::Subtract { shorthand, items })
}

/// Parse every token and reject repeats. Returns tokens in input order.
fn parse_list(tokens: &[String], category: PermissionCategory) -> Result<Vec<Token>, GrammarError> {
    let parsed = tokens
        .iter()
        .map(|t| parse_token(t, category))
        .collect::<Result<Vec<_>, _>>()?;

    let mut seen = BTreeSet::new();
    let mut duplicates: Vec<String> = Vec::new();
    for token in &parsed {
        let canonical = token.canonical();
        if !seen.insert(canonical.clone()) && !duplicates.contains(&canonical) {
            duplicates.push(canonical);
        }
    }
    if !duplicates.is_empty() {
        return Err(GrammarError::Repeated(duplicates));
    }

    Ok(parsed)
}

/// Check that every token is well formed and none is repeated.
pub fn validate(tokens: &[String], category: PermissionCategory) -> Result<(), GrammarError> {
    parse_list(tokens, category).map(|_| ())
}

/// Expand shorthand tokens into base permissions.
///
/// Shorthands are processed `all` first, then in vocabulary order. Each
/// expanded group lands at the position of the token it replaces, in
/// canonical order. Input containing only base permissions comes back
/// normalized but otherwise unchanged.
pub fn expand(tokens: &[String], category: PermissionCategory) -> Result<Vec<String>, GrammarError> {
    let mut list = parse_list(tokens, category)?;

    for (keyword, members) in category.shorthands() {
        let matches: Vec<usize> = list
            .iter()
            .enumerate()
            .filter(|(_, t)| t.shorthand() == Some(*keyword))
            .map(|(i, _)| i)
            .collect();

        let index = match matches.as_slice() {
            [] => continue,
            [index] => *index,
            _ => return Err(GrammarError::DuplicateShorthand((*keyword).to_string())),
        };

        let granted: Vec<&'static str> = match &list[index] {
            Token::Subtract { items, .. } => {
                let excluded = subtracted_permissions(keyword, items, category)?;
                members
                    .iter()
                    .copied()
                    .filter(|p| !excluded.contains(p))
                    .collect()
            }
            _ => {
                if *keyword == ALL && list.len() > 1 {
                    return Err(GrammarError::AllWithOthers);
                }
                members.to_vec()
            }
        };

        for permission in &granted {
            let present = list
                .iter()
                .enumerate()
                .any(|(i, t)| i != index && *t == Token::Base((*permission).to_string()));
            if present {
                return Err(GrammarError::AlreadyIncluded {
                    shorthand: list[index].canonical(),
                    permission: (*permission).to_string(),
                });
            }
        }

        list.splice(
            index..=index,
            granted.into_iter().map(|p| Token::Base(p.to_string())),
        );
    }

    Ok(list.iter().map(Token::canonical).collect())
}

/// Resolve the items of a subtractive token into base permissions.
fn subtracted_permissions(
    shorthand: &str,
    items: &[String],
    category: PermissionCategory,
) -> Result<BTreeSet<&'static str>, GrammarError> {
    let mut excluded = BTreeSet::new();
    for item in items {
        if item == ALL {
            return Err(GrammarError::SubtractAll(shorthand.to_string()));
        }
        if let Some(base) = category.base_permissions().iter().find(|p| **p == item.as_str()) {
            excluded.insert(*base);
        } else if let Some(nested) = category.shorthand(item) {
            excluded.extend(nested.iter().copied());
        } else {
            return Err(GrammarError::InvalidSubtraction {
                shorthand: shorthand.to_string(),
                item: item.clone(),
            });
        }
    }
    Ok(excluded)
}
