//! Word-boundary term matching shared by the classifier and the reviewers.

/// Lowercases, drops apostrophes and turns every other non-alphanumeric character into a
/// single space, so `"Don't  DELETE!"` becomes `"dont delete"`.
pub fn normalize_text(text: &str) -> String {
    let mut sanitized = String::with_capacity(text.len());
    for character in text.chars() {
        if character.is_alphanumeric() {
            sanitized.extend(character.to_lowercase());
        } else if character != '\'' && character != '\u{2019}' {
            sanitized.push(' ');
        }
    }
    sanitized.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn tokenize(text: &str) -> Vec<String> {
    normalize_text(text).split(' ').filter(|token| !token.is_empty()).map(str::to_string).collect()
}

/// True when `term` occurs in `normalized_text` on word boundaries.
pub fn contains_term(normalized_text: &str, term: &str) -> bool {
    let term = normalize_text(term);
    if term.is_empty() {
        return false;
    }
    format!(" {normalized_text} ").contains(&format!(" {term} "))
}

pub fn starts_with_term(normalized_text: &str, term: &str) -> bool {
    let term = normalize_text(term);
    !term.is_empty() && format!("{normalized_text} ").starts_with(&format!("{term} "))
}

pub fn first_match<'a>(normalized_text: &str, terms: &'a [String]) -> Option<&'a str> {
    terms.iter().map(String::as_str).find(|term| contains_term(normalized_text, term))
}

pub fn all_matches<'a>(normalized_text: &str, terms: &'a [String]) -> Vec<&'a str> {
    terms.iter().map(String::as_str).filter(|term| contains_term(normalized_text, term)).collect()
}
