//! Field validators.
//!
//! These are the exact string contracts of the Guuber registration screens.
//! All validators are pure and only ever answer `true` or `false`; the
//! controllers decide what to do with a rejected value.

use once_cell::sync::Lazy;
use regex::Regex;

/// Characters that count as "special" for passwords.
pub const SPECIAL_CHARACTERS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?";

/// Minimum password length, in characters.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Minimum username length when completing a federated registration.
pub const MIN_COMPLETION_USERNAME_LENGTH: usize = 3;

/// Maximum username length when completing a federated registration.
pub const MAX_COMPLETION_USERNAME_LENGTH: usize = 20;

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z0-9a-z._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,64}$")
        .expect("email pattern is a valid regex")
});

/// Returns `true` if `name` is non-empty and entirely alphabetic.
///
/// # Examples
///
/// ```
/// use guuber_core::validation::is_valid_name;
///
/// assert!(is_valid_name("Jo"));
/// assert!(is_valid_name("Zoë"));
/// assert!(!is_valid_name(""));
/// assert!(!is_valid_name("Jo2"));
/// ```
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(char::is_alphabetic)
}

/// Returns `true` if `username` is non-empty and uses only `[A-Za-z0-9_]`.
///
/// # Examples
///
/// ```
/// use guuber_core::validation::is_valid_username;
///
/// assert!(is_valid_username("jo_lee1"));
/// assert!(!is_valid_username("jo-lee"));
/// assert!(!is_valid_username(""));
/// ```
pub fn is_valid_username(username: &str) -> bool {
    !username.is_empty()
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Username rule for the registration-completion step: a valid username of
/// 3 to 20 characters.
pub fn is_valid_completion_username(username: &str) -> bool {
    let length = username.chars().count();
    is_valid_username(username)
        && (MIN_COMPLETION_USERNAME_LENGTH..=MAX_COMPLETION_USERNAME_LENGTH).contains(&length)
}

/// Returns `true` if the whole of `email` matches
/// `[A-Z0-9a-z._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,64}`.
///
/// # Examples
///
/// ```
/// use guuber_core::validation::is_valid_email;
///
/// assert!(is_valid_email("jo@x.com"));
/// assert!(!is_valid_email("jo@x"));
/// assert!(!is_valid_email("jo@x.com "));
/// ```
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

/// Returns `true` if `password` satisfies every [`PasswordRequirements`] rule
/// and contains nothing but alphanumerics and [`SPECIAL_CHARACTERS`].
///
/// # Examples
///
/// ```
/// use guuber_core::validation::is_valid_password;
///
/// assert!(is_valid_password("Abcd123!"));
/// assert!(!is_valid_password("Abcd1234"));   // no special character
/// assert!(!is_valid_password("Abc 123!x"));  // space is not allowed
/// ```
pub fn is_valid_password(password: &str) -> bool {
    password_requirements(password).all_met()
        && password
            .chars()
            .all(|c| c.is_alphanumeric() || is_special(c))
}

/// Which password requirements a value currently meets.
///
/// Drives the requirement checklist shown under the password input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PasswordRequirements {
    /// At least 8 characters.
    pub min_length: bool,
    /// At least one letter.
    pub has_letter: bool,
    /// At least one number.
    pub has_digit: bool,
    /// At least one special character.
    pub has_special: bool,
}

impl PasswordRequirements {
    /// Returns `true` if every requirement is met.
    pub fn all_met(&self) -> bool {
        self.min_length && self.has_letter && self.has_digit && self.has_special
    }

    /// Requirements paired with their checklist labels.
    pub fn checklist(&self) -> [(&'static str, bool); 4] {
        [
            ("At least 8 characters", self.min_length),
            ("At least one letter", self.has_letter),
            ("At least one number", self.has_digit),
            ("At least one special character", self.has_special),
        ]
    }
}

/// Evaluates each password requirement independently.
pub fn password_requirements(password: &str) -> PasswordRequirements {
    PasswordRequirements {
        min_length: password.chars().count() >= MIN_PASSWORD_LENGTH,
        has_letter: password.chars().any(char::is_alphabetic),
        has_digit: password.chars().any(char::is_numeric),
        has_special: password.chars().any(is_special),
    }
}

/// Coarse password strength for the strength meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum PasswordStrength {
    #[default]
    None,
    Weak,
    Medium,
    Strong,
}

/// Scores a password on four criteria: lowercase, uppercase, digit, and
/// length of at least 8.
///
/// Zero criteria is [`PasswordStrength::None`], one is `Weak`, two is `Medium`,
/// three or more is `Strong`.
pub fn password_strength(password: &str) -> PasswordStrength {
    let criteria = [
        password.chars().any(char::is_lowercase),
        password.chars().any(char::is_uppercase),
        password.chars().any(char::is_numeric),
        password.chars().count() >= MIN_PASSWORD_LENGTH,
    ];

    match criteria.iter().filter(|met| **met).count() {
        0 => PasswordStrength::None,
        1 => PasswordStrength::Weak,
        2 => PasswordStrength::Medium,
        _ => PasswordStrength::Strong,
    }
}

/// Removes every whitespace character, as input fields do while typing.
pub fn strip_whitespace(value: &str) -> String {
    value.chars().filter(|c| !c.is_whitespace()).collect()
}

fn is_special(c: char) -> bool {
    SPECIAL_CHARACTERS.contains(c)
}
