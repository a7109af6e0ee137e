// src/utils/html.rs

/// Sanitizes admin-authored text (titles, descriptions, question text).
///
/// Whitelist based: formatting tags such as <b> or <p> survive, while
/// <script>/<iframe> elements and event-handler attributes are dropped.
/// Clients rendering the text as plain text should escape it themselves.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_scripts_keeps_formatting() {
        let cleaned = clean_html("<p onclick=\"x()\">Which <b>one</b>?</p><script>steal()</script>");
        assert_eq!(cleaned, "<p>Which <b>one</b>?</p>");
    }
}
