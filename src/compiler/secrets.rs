//! Secret classification of env var names.

const SECRET_SUFFIXES: [&str; 6] = [
    "_KEY",
    "_SECRET",
    "_PASSWORD",
    "_TOKEN",
    "_PASS",
    "_CREDENTIALS",
];

/// Returns whether an env var holds a secret, judged by its name alone.
#[must_use]
pub fn is_secret_name(name: &str) -> bool {
    let upper = name.trim().to_ascii_uppercase();
    SECRET_SUFFIXES
        .iter()
        .any(|suffix| upper.ends_with(suffix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("OPENAI_API_KEY", true)]
    #[case("SESSION_SECRET", true)]
    #[case("POSTGRES_PASSWORD", true)]
    #[case("GITHUB_TOKEN", true)]
    #[case("SMTP_PASS", true)]
    #[case("gcp_credentials", true)]
    #[case("KEY", false)]
    #[case("LOG_LEVEL", false)]
    #[case("KEYCLOAK_URL", false)]
    #[case("PASSWORD_MIN_LENGTH", false)]
    fn classifies_by_suffix(#[case] name: &str, #[case] secret: bool) {
        assert_eq!(is_secret_name(name), secret);
    }
}
