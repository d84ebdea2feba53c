use pulldown_cmark::{html, Options, Parser};

/// Convert Markdown text to safe HTML.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);

    let parser = Parser::new_ext(markdown, options);

    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);

    // Sanitize to prevent XSS from post and page bodies
    ammonia::clean(&html_output)
}

/// Tera filter rendering Markdown fields in templates.
pub fn make_markdown_filter() -> impl tera::Filter {
    |value: &tera::Value, _: &std::collections::HashMap<String, tera::Value>| match value.as_str() {
        Some(text) => Ok(tera::Value::String(markdown_to_html(text))),
        None => Err(tera::Error::msg("markdown filter expects a string")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_rendering() {
        let html = markdown_to_html("# Maintenance\n\nBack **soon**.");
        assert!(html.contains("<h1>Maintenance</h1>"));
        assert!(html.contains("<strong>soon</strong>"));
    }

    #[test]
    fn test_xss_stripped() {
        let html = markdown_to_html("Hi <script>alert('x')</script>!");
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_links_preserved() {
        let html = markdown_to_html("[status](https://status.example.com)");
        assert!(html.contains(r#"<a href="https://status.example.com""#));
    }
}
