//! Post and comment text rules.

use crate::domain::error::DomainError;

/// Phrase that is never accepted in a post body.
pub const BANNED_PHRASE: &str = "python-зло";

pub const EMPTY_TEXT_MESSAGE: &str = "Обязательное поле.";
pub const BANNED_PHRASE_MESSAGE: &str = "Такого не может быть!";
pub const UNKNOWN_GROUP_MESSAGE: &str = "Некорректная группа";

pub const MAX_COMMENT_CHARS: usize = 4_000;

/// Validates a post body and returns it with surrounding whitespace removed.
pub fn validate_post_text(raw: &str) -> Result<String, DomainError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(DomainError::validation("text", EMPTY_TEXT_MESSAGE));
    }
    if text.to_lowercase().contains(BANNED_PHRASE) {
        return Err(DomainError::validation("text", BANNED_PHRASE_MESSAGE));
    }
    Ok(text.to_string())
}

pub fn validate_comment_text(raw: &str) -> Result<String, DomainError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(DomainError::validation("text", EMPTY_TEXT_MESSAGE));
    }
    if text.chars().count() > MAX_COMMENT_CHARS {
        return Err(DomainError::validation(
            "text",
            format!("Не больше {MAX_COMMENT_CHARS} символов."),
        ));
    }
    Ok(text.to_string())
}

/// Case-insensitive substring match, the in-memory counterpart of the
/// `ILIKE` used by the Postgres post search.
pub fn matches_search(text: &str, needle: &str) -> bool {
    text.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_text_is_trimmed() {
        assert_eq!(validate_post_text("  hello \n").unwrap(), "hello");
    }

    #[test]
    fn empty_post_text_is_rejected() {
        let err = validate_post_text("   ").unwrap_err();
        assert_eq!(err, DomainError::validation("text", EMPTY_TEXT_MESSAGE));
    }

    #[test]
    fn banned_phrase_is_rejected_regardless_of_case() {
        let err = validate_post_text("Я думаю, что PYTHON-ЗЛО навсегда").unwrap_err();
        assert_eq!(err, DomainError::validation("text", BANNED_PHRASE_MESSAGE));
    }

    #[test]
    fn overlong_comment_is_rejected() {
        let text = "a".repeat(MAX_COMMENT_CHARS + 1);
        assert!(validate_comment_text(&text).is_err());
        assert!(validate_comment_text("fine").is_ok());
    }

    #[test]
    fn search_ignores_case() {
        assert!(matches_search("Hello World", "wORLD"));
        assert!(!matches_search("Hello", "bye"));
    }
}
