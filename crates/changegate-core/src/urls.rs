//! URL helpers shared by configuration validation and request building.

use crate::ids::CallbackToken;
use crate::{Error, Result};
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

/// Separator between a job and a stage in stage-scoped names and URLs.
pub const JOB_STAGE_SEPARATOR: &str = "#";

/// Path segment under which inbound callbacks are served.
pub const CALLBACK_PATH: &str = "callback";

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(https?)://[-a-zA-Z0-9+&@#/%?=~_|!:,.;]*[-a-zA-Z0-9+&@#/%=~_|]$")
        .expect("static URL pattern compiles")
});

/// Whether `url` is an absolute http(s) URL.
pub fn is_valid_url(url: &str) -> bool {
    URL_PATTERN.is_match(url)
}

/// Replace the last occurrence of `needle` in `haystack`.
pub fn replace_last(haystack: &str, needle: &str, replacement: &str) -> String {
    match haystack.rfind(needle) {
        Some(index) => format!(
            "{}{}{}",
            &haystack[..index],
            replacement,
            &haystack[index + needle.len()..]
        ),
        None => haystack.to_string(),
    }
}

/// `job#stage`
pub fn stage_scoped_name(job_name: &str, stage: &str) -> String {
    format!("{}{}{}", job_name, JOB_STAGE_SEPARATOR, stage)
}

/// Job URL with its trailing `/` replaced by `#stage/`.
pub fn stage_scoped_url(job_url: &str, stage: &str) -> String {
    replace_last(
        job_url,
        "/",
        &format!("{}{}/", JOB_STAGE_SEPARATOR, stage),
    )
}

/// Absolute URL the authority posts its decision to.
pub fn callback_url(base_url: &str, token: &CallbackToken) -> Result<String> {
    let mut base = Url::parse(base_url)?;
    if base.cannot_be_a_base() {
        return Err(Error::InvalidUrl(base_url.to_string()));
    }
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    let url = base.join(&format!("{}/{}", CALLBACK_PATH, token.as_str()))?;
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_validation() {
        assert!(is_valid_url("https://ci.example.com/job/deploy/"));
        assert!(is_valid_url("http://localhost:8080/api/tracking"));
        assert!(!is_valid_url("ftp://example.com/file"));
        assert!(!is_valid_url("example.com"));
        assert!(!is_valid_url(""));
    }

    #[test]
    fn test_stage_scoped_url() {
        assert_eq!(
            stage_scoped_url("https://ci.example.com/job/app/", "Deploy"),
            "https://ci.example.com/job/app#Deploy/"
        );
        assert_eq!(stage_scoped_name("app", "Deploy"), "app#Deploy");
        assert_eq!(replace_last("abc", "/", "x"), "abc");
    }

    #[test]
    fn test_callback_url() {
        let token = CallbackToken::from("pipeline:1234");
        assert_eq!(
            callback_url("https://ci.example.com/root", &token).unwrap(),
            "https://ci.example.com/root/callback/pipeline:1234"
        );
        assert_eq!(
            callback_url("https://ci.example.com/", &token).unwrap(),
            "https://ci.example.com/callback/pipeline:1234"
        );
        assert!(callback_url("not a url", &token).is_err());
    }
}
