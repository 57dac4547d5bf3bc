//! Scrapers for the farm's server-rendered pages.
//!
//! The site exposes no API; the upload workflow is a chain of HTML forms, so
//! the values we need live in hidden `<input>` elements. Both scrapers scan
//! `input` tags only and tolerate attribute order, quoting style and tag
//! case, but they are still coupled to the site's markup and will return
//! empty strings the day the page shape changes.

use crate::job::JobPage;

/// Pulls the upload token out of the get-started page. Empty string when the
/// page has no `<input name="token">`.
pub fn scrape_token(html: &str) -> String {
    let mut token = String::new();
    for_each_input(html, |attrs| {
        if attr(attrs, "name") == Some("token") {
            if let Some(value) = attr(attrs, "value") {
                token = value.to_string();
            }
        }
    });
    token
}

/// Collects the seven fields the step-2 page echoes back. Absent fields stay
/// empty; repeated ids overwrite, so the last occurrence wins.
pub fn scrape_job_page(html: &str) -> JobPage {
    let mut page = JobPage::default();
    for_each_input(html, |attrs| {
        let Some(id) = attr(attrs, "id") else { return };
        let Some(slot) = page.slot_mut(id) else { return };
        if let Some(value) = attr(attrs, "value") {
            *slot = value.to_string();
        }
    });
    page
}

fn attr<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.as_str())
}

/// Calls `visit` with the attribute list of every `<input>` element, in
/// source order. Attribute names are lowercased.
fn for_each_input(html: &str, mut visit: impl FnMut(&[(String, String)])) {
    let mut pos = 0;
    while let Some(lt) = html[pos..].find('<') {
        let tag_start = pos + lt + 1;
        let rest = &html[tag_start..];
        let name_len = rest
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .count();
        let (attrs, consumed) = parse_attrs(&rest[name_len..]);
        if rest[..name_len].eq_ignore_ascii_case("input") {
            visit(&attrs);
        }
        pos = tag_start + name_len + consumed;
    }
}

/// Parses `name`, `name=value`, `name="value"` and `name='value'` pairs up
/// to the closing `>`, which may legally sit inside a quoted value. Returns
/// the pairs and how many bytes were consumed, `>` included.
fn parse_attrs(s: &str) -> (Vec<(String, String)>, usize) {
    let mut attrs = Vec::new();
    let mut chars = s.char_indices().peekable();
    while let Some(&(i, c)) = chars.peek() {
        if c == '>' {
            return (attrs, i + 1);
        }
        if c == '/' || c.is_whitespace() {
            chars.next();
            continue;
        }
        let start = i;
        let mut end = i;
        while let Some(&(j, c2)) = chars.peek() {
            if c2 == '=' || c2 == '>' || c2 == '/' || c2.is_whitespace() {
                break;
            }
            end = j + c2.len_utf8();
            chars.next();
        }
        let name = s[start..end].to_ascii_lowercase();
        while matches!(chars.peek(), Some(&(_, c2)) if c2.is_whitespace()) {
            chars.next();
        }
        let mut value = String::new();
        if matches!(chars.peek(), Some(&(_, '='))) {
            chars.next();
            while matches!(chars.peek(), Some(&(_, c2)) if c2.is_whitespace()) {
                chars.next();
            }
            match chars.peek().copied() {
                Some((_, quote @ ('"' | '\''))) => {
                    chars.next();
                    for (_, c2) in chars.by_ref() {
                        if c2 == quote {
                            break;
                        }
                        value.push(c2);
                    }
                }
                Some(_) => {
                    while let Some(&(_, c2)) = chars.peek() {
                        if c2 == '>' || c2.is_whitespace() {
                            break;
                        }
                        value.push(c2);
                        chars.next();
                    }
                }
                None => {}
            }
        }
        if !name.is_empty() {
            attrs.push((name, value));
        }
    }
    (attrs, s.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobPage;

    const GETSTARTED: &str = r#"
        <html><body>
        <form method="post" action="/jobs.php">
        <input type="hidden" name="token" value="abc123">
        <input type="submit" value="Next">
        </form>
        </body></html>"#;

    #[test]
    fn token_from_hidden_input() {
        assert_eq!(scrape_token(GETSTARTED), "abc123");
    }

    #[test]
    fn token_missing_yields_empty() {
        assert_eq!(scrape_token("<html><input name=\"other\" value=\"x\"></html>"), "");
        assert_eq!(scrape_token("plain text, no markup"), "");
    }

    #[test]
    fn token_attribute_order_does_not_matter() {
        assert_eq!(
            scrape_token(r#"<input value="tok" type="hidden" name="token">"#),
            "tok"
        );
    }

    #[test]
    fn token_quoting_styles() {
        assert_eq!(scrape_token("<input name='token' value='t1'>"), "t1");
        assert_eq!(scrape_token("<input name=token value=t2>"), "t2");
        assert_eq!(scrape_token(r#"<INPUT NAME="token" VALUE="t3">"#), "t3");
    }

    #[test]
    fn token_from_self_closing_input() {
        assert_eq!(scrape_token(r#"<input name="token" value="t4"/>"#), "t4");
    }

    #[test]
    fn token_only_looks_at_input_tags() {
        let html = r#"<a name="token" value="nope"></a><input name="token" value="yes">"#;
        assert_eq!(scrape_token(html), "yes");
    }

    #[test]
    fn token_value_may_contain_gt() {
        assert_eq!(scrape_token(r#"<input name="token" value="a>b">"#), "a>b");
    }

    #[test]
    fn job_page_single_field() {
        let page = scrape_job_page(r#"<input id="addjob_engine_0" value="CYCLES">"#);
        let expected = JobPage {
            engine: "CYCLES".to_string(),
            ..JobPage::default()
        };
        assert_eq!(page, expected);
    }

    #[test]
    fn job_page_all_fields() {
        let html = r#"
            <input type="hidden" id="addjob_engine_0" value="CYCLES">
            <input type="hidden" id="addjob_archive_0" value="archive_9.zip">
            <input type="hidden" id="addjob_path_0" value="/scene/main.blend">
            <input type="hidden" id="addjob_framerate_0" value="24">
            <input type="hidden" id="addjob_cycles_samples_0" value="128">
            <input type="hidden" id="addjob_samples_pixel_0" value="64">
            <input type="hidden" id="addjob_image_extension_0" value="png">
        "#;
        let page = scrape_job_page(html);
        assert_eq!(page.engine, "CYCLES");
        assert_eq!(page.archive, "archive_9.zip");
        assert_eq!(page.path, "/scene/main.blend");
        assert_eq!(page.framerate, "24");
        assert_eq!(page.cycles_samples, "128");
        assert_eq!(page.samples_pixel, "64");
        assert_eq!(page.image_extension, "png");
    }

    #[test]
    fn job_page_last_occurrence_wins() {
        let html = r#"
            <input id="addjob_engine_0" value="CYCLES">
            <input id="addjob_engine_0" value="BLENDER_EEVEE">
        "#;
        assert_eq!(scrape_job_page(html).engine, "BLENDER_EEVEE");
    }

    #[test]
    fn job_page_ignores_unknown_ids() {
        let html = r#"<input id="addjob_engine_1" value="CYCLES">"#;
        assert_eq!(scrape_job_page(html), JobPage::default());
    }
}
