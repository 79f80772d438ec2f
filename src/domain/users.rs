//! Account field rules.

use crate::domain::error::DomainError;

pub const MAX_USERNAME_LEN: usize = 150;
pub const MIN_PASSWORD_LEN: usize = 8;

/// Usernames are 1-150 characters of letters, digits and `@.+-_`.
pub fn validate_username(raw: &str) -> Result<String, DomainError> {
    let username = raw.trim();
    if username.is_empty() {
        return Err(DomainError::validation("username", "Обязательное поле."));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(DomainError::validation(
            "username",
            format!("Не больше {MAX_USERNAME_LEN} символов."),
        ));
    }
    let valid = username
        .chars()
        .all(|ch| ch.is_alphanumeric() || matches!(ch, '@' | '.' | '+' | '-' | '_'));
    if !valid {
        return Err(DomainError::validation(
            "username",
            "Допустимы только буквы, цифры и символы @/./+/-/_.",
        ));
    }
    Ok(username.to_string())
}

pub fn validate_email(raw: &str) -> Result<String, DomainError> {
    let email = raw.trim();
    if email.is_empty() {
        return Ok(String::new());
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => {
            Ok(email.to_string())
        }
        _ => Err(DomainError::validation(
            "email",
            "Введите правильный адрес электронной почты.",
        )),
    }
}

pub fn validate_password(password: &str, confirmation: &str) -> Result<(), DomainError> {
    if password != confirmation {
        return Err(DomainError::validation(
            "password2",
            "Введенные пароли не совпадают.",
        ));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(DomainError::validation(
            "password1",
            format!("Пароль должен содержать как минимум {MIN_PASSWORD_LEN} символов."),
        ));
    }
    if password.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(DomainError::validation(
            "password1",
            "Пароль не может состоять только из цифр.",
        ));
    }
    Ok(())
}

pub fn display_name(first_name: &str, last_name: &str, username: &str) -> String {
    let full = format!("{} {}", first_name.trim(), last_name.trim());
    let full = full.trim();
    if full.is_empty() {
        username.to_string()
    } else {
        full.to_string()
    }
}
