//! URL utilities for feed links, metadata endpoints and log-safe output

use regex::Regex;
use std::sync::OnceLock;
use url::Url;

fn live_path_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/live/([A-Za-z0-9_-]+)").expect("static regex"))
}

/// URL utilities for consistent URL handling
pub struct UrlUtils;

impl UrlUtils {
    /// Build the metadata URL for a feed entry link by appending `suffix`
    ///
    /// A `/` separator is inserted when the link does not already end in one.
    ///
    /// ```rust
    /// use livestats::utils::url::UrlUtils;
    ///
    /// assert_eq!(
    ///     UrlUtils::metadata_url("https://www.reddit.com/live/abc/", "about.json"),
    ///     "https://www.reddit.com/live/abc/about.json"
    /// );
    /// assert_eq!(
    ///     UrlUtils::metadata_url("https://www.reddit.com/live/abc", "about.json"),
    ///     "https://www.reddit.com/live/abc/about.json"
    /// );
    /// ```
    pub fn metadata_url(link: &str, suffix: &str) -> String {
        let link = link.trim();
        if link.ends_with('/') {
            format!("{link}{suffix}")
        } else {
            format!("{link}/{suffix}")
        }
    }

    /// Substitute `{thread_id}` in a metadata URL template
    pub fn expand_template(template: &str, thread_id: &str) -> String {
        template.replace("{thread_id}", thread_id)
    }

    /// Extract the thread identifier from a live thread link
    ///
    /// Prefers the segment following `/live/`; otherwise the last non-empty
    /// path segment.
    pub fn thread_id_from_link(link: &str) -> Option<String> {
        if let Some(caps) = live_path_regex().captures(link) {
            return caps.get(1).map(|m| m.as_str().to_string());
        }

        let parsed = Url::parse(link.trim()).ok()?;
        parsed
            .path_segments()?
            .filter(|segment| !segment.is_empty())
            .last()
            .map(str::to_string)
    }

    /// Obfuscate credentials in URLs (userinfo and token-like query params)
    pub fn obfuscate_credentials(url: &str) -> String {
        let mut obfuscated = url.to_string();

        if let Ok(parsed) = Url::parse(url) {
            if !parsed.username().is_empty() || parsed.password().is_some() {
                let mut new_url = parsed.clone();
                let _ = new_url.set_username("****");
                let _ = new_url.set_password(Some("****"));
                obfuscated = new_url.to_string();
            }
        }

        let sensitive_params = ["api_key", "apikey", "key", "token", "password"];

        for param in &sensitive_params {
            let pattern = format!(r"(?i)([?&]{}=)[^&]*", regex::escape(param));
            if let Ok(re) = Regex::new(&pattern) {
                obfuscated = re.replace_all(&obfuscated, "${1}****").to_string();
            }
        }

        obfuscated
    }
}
