//! HAML to HTML transformer
//!
//! Translates the commonly used HAML subset into HTML that still carries its
//! template actions as plain text, ready for minijinja to compile.
//!
//! Every source line produces exactly one output line. Closing tags are
//! appended to the last content line of their block instead of getting a line
//! of their own, so a parser error on output line N points at HAML line N.
//!
//! ```text
//! %ul#menu                    <ul id="menu">
//!   %li.item= title             <li class="item">Home</li></ul>
//! ```

use minijinja::Value;
use std::collections::HashMap;
use std::fmt::Write as _;
use thiserror::Error;

/// Values available to the transformer while converting
pub type Scope = HashMap<String, Value>;

/// A HAML construct the transformer could not translate
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("HAML syntax error on line {line}: {message}")]
pub struct HamlSyntaxError {
    /// 1-based source line
    pub line: usize,
    /// What went wrong
    pub message: String,
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Translate HAML `source` using `scope` for `=` output and attribute values
///
/// # Errors
///
/// Returns [`HamlSyntaxError`] for mixed tab/space indentation, unbalanced
/// attribute lists, malformed tags, and illegal nesting.
pub fn render(source: &str, scope: &Scope) -> Result<String, HamlSyntaxError> {
    let mut lines = Vec::new();
    for (idx, raw) in source.split('\n').enumerate() {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        lines.push(measure(raw, idx + 1)?);
    }

    let mut renderer = Renderer {
        scope,
        out: Vec::with_capacity(lines.len()),
        open: Vec::new(),
        last_content: None,
    };
    renderer.run(&lines)?;
    Ok(renderer.out.join("\n"))
}

struct Open {
    indent: usize,
    close: String,
}

struct Renderer<'s> {
    scope: &'s Scope,
    out: Vec<String>,
    open: Vec<Open>,
    last_content: Option<usize>,
}

impl Renderer<'_> {
    fn run(&mut self, lines: &[Option<(&str, &str)>]) -> Result<(), HamlSyntaxError> {
        let mut silent_below: Option<usize> = None;

        for (idx, line) in lines.iter().enumerate() {
            let Some((leading, text)) = *line else {
                self.out.push(String::new());
                continue;
            };
            let indent = leading.len();

            if let Some(limit) = silent_below {
                if indent > limit {
                    self.out.push(String::new());
                    continue;
                }
                silent_below = None;
            }

            self.close_to(indent);

            let nested = lines[idx + 1..]
                .iter()
                .flatten()
                .next()
                .is_some_and(|(next, _)| next.len() > indent);
            let number = idx + 1;

            if text.starts_with("-#") {
                silent_below = Some(indent);
                self.out.push(String::new());
                continue;
            }
            if text.starts_with('-') {
                self.out.push(String::new());
                continue;
            }

            let html = self.line(text, indent, nested, number)?;
            self.out.push(format!("{leading}{html}"));
            self.last_content = Some(self.out.len() - 1);
        }

        self.close_to(0);
        Ok(())
    }

    fn close_to(&mut self, indent: usize) {
        while self.open.last().is_some_and(|o| o.indent >= indent) {
            let Some(open) = self.open.pop() else { break };
            match self.last_content {
                Some(idx) => self.out[idx].push_str(&open.close),
                None => self.out.push(open.close),
            }
        }
    }

    fn line(
        &mut self,
        text: &str,
        indent: usize,
        nested: bool,
        number: usize,
    ) -> Result<String, HamlSyntaxError> {
        if let Some(rest) = text.strip_prefix("!!!") {
            return Ok(doctype(rest.trim()));
        }
        if let Some(rest) = text.strip_prefix('/') {
            return Ok(self.comment(rest.trim(), indent, nested));
        }
        if let Some(rest) = text.strip_prefix('\\') {
            return Ok(self.interpolate(rest));
        }
        if let Some(rest) = text.strip_prefix('=') {
            return Ok(self.script(rest.trim()));
        }
        if starts_element(text) {
            return self.element(text, indent, nested, number);
        }
        Ok(self.interpolate(text))
    }

    fn comment(&mut self, rest: &str, indent: usize, nested: bool) -> String {
        if rest.starts_with('[') {
            if nested {
                self.open.push(Open {
                    indent,
                    close: "<![endif]-->".to_string(),
                });
                return format!("<!--{rest}>");
            }
            return format!("<!--{rest}><![endif]-->");
        }

        if nested {
            self.open.push(Open {
                indent,
                close: "-->".to_string(),
            });
            return if rest.is_empty() {
                "<!--".to_string()
            } else {
                format!("<!-- {rest}")
            };
        }
        format!("<!-- {rest} -->")
    }

    fn element(
        &mut self,
        text: &str,
        indent: usize,
        nested: bool,
        number: usize,
    ) -> Result<String, HamlSyntaxError> {
        let fail = |message: String| HamlSyntaxError {
            line: number,
            message,
        };

        let mut rest = text;
        let mut tag = "div";
        let mut classes: Vec<String> = Vec::new();
        let mut ids: Vec<String> = Vec::new();

        if let Some(after) = rest.strip_prefix('%') {
            let (name, after) = take_name(after);
            if name.is_empty() {
                return Err(fail("invalid tag: expected a name after '%'".to_string()));
            }
            tag = name;
            rest = after;
        }

        loop {
            let (marker, after) = match rest.chars().next() {
                Some(c @ ('.' | '#')) => (c, &rest[1..]),
                _ => break,
            };
            let (name, after) = take_name(after);
            if name.is_empty() {
                return Err(fail(format!(
                    "illegal element: '{marker}' must be followed by a name"
                )));
            }
            if marker == '.' {
                classes.push(name.to_string());
            } else {
                ids.push(name.to_string());
            }
            rest = after;
        }

        let mut attrs: Vec<(String, Option<String>)> = Vec::new();
        loop {
            if rest.starts_with('{') {
                let (body, after) = take_balanced(rest, '{', '}').ok_or_else(|| {
                    fail("unbalanced brackets in attribute hash".to_string())
                })?;
                self.hash_attributes(body, &mut attrs)
                    .map_err(|m| fail(m.to_string()))?;
                rest = after;
            } else if rest.starts_with('(') {
                let (body, after) = take_balanced(rest, '(', ')').ok_or_else(|| {
                    fail("unbalanced parentheses in attribute list".to_string())
                })?;
                self.html_attributes(body, &mut attrs);
                rest = after;
            } else {
                break;
            }
        }

        let mut others = Vec::new();
        for (key, value) in attrs {
            match value {
                Some(v) if key == "class" => classes.push(v),
                Some(v) if key == "id" => ids.push(v),
                value => others.push((key, value)),
            }
        }

        let mut open = format!("<{tag}");
        if !classes.is_empty() {
            let _ = write!(open, " class=\"{}\"", escape_attr(&classes.join(" ")));
        }
        if !ids.is_empty() {
            let _ = write!(open, " id=\"{}\"", escape_attr(&ids.join("_")));
        }
        for (key, value) in others {
            match value {
                Some(v) => {
                    let _ = write!(open, " {key}=\"{}\"", escape_attr(&v));
                }
                None => {
                    let _ = write!(open, " {key}");
                }
            }
        }

        let self_closing = rest.starts_with('/');
        let content = if self_closing {
            None
        } else if let Some(expr) = rest.strip_prefix('=') {
            Some(self.script(expr.trim()))
        } else {
            let inline = rest.trim();
            (!inline.is_empty()).then(|| self.interpolate(inline))
        };

        if self_closing || (VOID_ELEMENTS.contains(&tag) && content.is_none()) {
            if nested {
                return Err(fail(format!(
                    "illegal nesting: nesting within self-closing tag %{tag} is illegal"
                )));
            }
            return Ok(if self_closing {
                format!("{open} />")
            } else {
                format!("{open}>")
            });
        }

        match content {
            Some(_) if nested => Err(fail(format!(
                "illegal nesting: content can't be both given on the same line as %{tag} and nested within it"
            ))),
            Some(content) => Ok(format!("{open}>{content}</{tag}>")),
            None if nested => {
                self.open.push(Open {
                    indent,
                    close: format!("</{tag}>"),
                });
                Ok(format!("{open}>"))
            }
            None => Ok(format!("{open}></{tag}>")),
        }
    }

    fn hash_attributes(
        &self,
        body: &str,
        attrs: &mut Vec<(String, Option<String>)>,
    ) -> Result<(), &'static str> {
        for entry in split_top_level(body, |c| c == ',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }

            let (key, value) = find_unquoted(entry, "=>")
                .map(|at| (&entry[..at], &entry[at + 2..]))
                .or_else(|| find_unquoted(entry, ":").filter(|at| *at > 0).map(|at| {
                    (&entry[..at], &entry[at + 1..])
                }))
                .ok_or("invalid attribute hash: expected `key: value` or `key => value`")?;

            let key = unquote(key.trim().trim_start_matches(':')).unwrap_or_else(|| {
                key.trim().trim_start_matches(':')
            });
            if key.is_empty() {
                return Err("invalid attribute hash: empty attribute name");
            }
            if let Some(value) = self.attr_value(value.trim()) {
                attrs.push((key.to_string(), value));
            }
        }
        Ok(())
    }

    fn html_attributes(&self, body: &str, attrs: &mut Vec<(String, Option<String>)>) {
        for entry in split_top_level(body, char::is_whitespace) {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            match entry.split_once('=') {
                Some((key, value)) => {
                    if let Some(value) = self.attr_value(value.trim()) {
                        attrs.push((key.trim().to_string(), value));
                    }
                }
                None => attrs.push((entry.to_string(), None)),
            }
        }
    }

    /// `None` drops the attribute, `Some(None)` renders it bare
    fn attr_value(&self, raw: &str) -> Option<Option<String>> {
        if let Some(inner) = unquote(raw) {
            return Some(Some(self.interpolate(inner)));
        }
        match raw {
            "true" => return Some(None),
            "false" | "nil" => return None,
            _ => {}
        }
        if raw.parse::<f64>().is_ok() {
            return Some(Some(raw.to_string()));
        }

        let value = self.lookup(raw)?;
        if value.is_true() && value.kind() == minijinja::value::ValueKind::Bool {
            return Some(None);
        }
        if value.kind() == minijinja::value::ValueKind::Bool {
            return None;
        }
        Some(Some(value.to_string()))
    }

    fn script(&self, expr: &str) -> String {
        if let Some(inner) = unquote(expr) {
            return self.interpolate(inner);
        }
        self.lookup(expr)
            .map(|v| escape_html(&v.to_string()))
            .unwrap_or_default()
    }

    fn lookup(&self, path: &str) -> Option<Value> {
        let mut parts = path.split('.');
        let mut value = self.scope.get(parts.next()?.trim())?.clone();
        for part in parts {
            value = value.get_attr(part.trim()).ok()?;
        }
        (!value.is_undefined() && !value.is_none()).then_some(value)
    }

    fn interpolate(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(at) = rest.find("#{") {
            if rest[..at].ends_with('\\') {
                out.push_str(&rest[..at - 1]);
                out.push_str("#{");
                rest = &rest[at + 2..];
                continue;
            }
            let Some(end) = rest[at + 2..].find('}') else {
                break;
            };
            out.push_str(&rest[..at]);
            let key = &rest[at + 2..at + 2 + end];
            if let Some(value) = self.lookup(key) {
                out.push_str(&escape_html(&value.to_string()));
            }
            rest = &rest[at + 2 + end + 1..];
        }

        out.push_str(rest);
        out
    }
}

fn measure(raw: &str, number: usize) -> Result<Option<(&str, &str)>, HamlSyntaxError> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    let text = raw.trim_start_matches([' ', '\t']);
    let leading = &raw[..raw.len() - text.len()];
    if leading.contains(' ') && leading.contains('\t') {
        return Err(HamlSyntaxError {
            line: number,
            message: "inconsistent indentation: mixed tabs and spaces".to_string(),
        });
    }
    Ok(Some((leading, text.trim_end())))
}

fn doctype(kind: &str) -> String {
    if kind.to_ascii_lowercase().starts_with("xml") {
        r#"<?xml version="1.0" encoding="utf-8" ?>"#.to_string()
    } else {
        "<!DOCTYPE html>".to_string()
    }
}

const fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':')
}

fn starts_element(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some('%') => true,
        Some('.' | '#') => chars.next().is_some_and(is_name_char),
        _ => false,
    }
}

fn take_name(s: &str) -> (&str, &str) {
    let end = s.find(|c: char| !is_name_char(c)).unwrap_or(s.len());
    s.split_at(end)
}

/// Split `s` (starting with `open`) into the bracketed body and what follows
fn take_balanced(s: &str, open: char, close: char) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for (idx, c) in s.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == open => depth += 1,
            None if c == close => {
                depth -= 1;
                if depth == 0 {
                    return Some((&s[open.len_utf8()..idx], &s[idx + close.len_utf8()..]));
                }
            }
            None => {}
        }
    }
    None
}

fn split_top_level(s: &str, is_separator: impl Fn(char) -> bool) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut depth = 0usize;
    let mut start = 0;

    for (idx, c) in s.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if matches!(c, '{' | '[' | '(') => depth += 1,
            None if matches!(c, '}' | ']' | ')') => depth = depth.saturating_sub(1),
            None if depth == 0 && is_separator(c) => {
                parts.push(&s[start..idx]);
                start = idx + c.len_utf8();
            }
            None => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

fn find_unquoted(s: &str, needle: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (idx, c) in s.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if s[idx..].starts_with(needle) => return Some(idx),
            None => {}
        }
    }
    None
}

fn unquote(s: &str) -> Option<&str> {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return Some(&s[1..s.len() - 1]);
        }
    }
    None
}

fn escape_attr(s: &str) -> String {
    s.replace('"', "&quot;")
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> Scope {
        let mut scope = Scope::new();
        scope.insert("lang".to_string(), Value::from("HAML"));
        scope.insert("title".to_string(), Value::from("Home & Away"));
        scope.insert("enabled".to_string(), Value::from(true));
        scope.insert("hidden".to_string(), Value::from(false));
        scope.insert(
            "user".to_string(),
            Value::from_serialize(serde_json::json!({ "name": "Ada" })),
        );
        scope
    }

    fn haml(source: &str) -> String {
        render(source, &scope()).unwrap()
    }

    #[test]
    fn test_nested_tags_keep_line_count() {
        let source = "%ul#menu\n  %li.item one\n  %li.item two\n%p done";
        let html = haml(source);
        assert_eq!(
            html,
            "<ul id=\"menu\">\n  <li class=\"item\">one</li>\n  <li class=\"item\">two</li></ul>\n<p>done</p>"
        );
        assert_eq!(html.lines().count(), source.lines().count());
    }

    #[test]
    fn test_implicit_div_and_shorthands() {
        assert_eq!(haml(".box.wide#main"), r#"<div class="box wide" id="main"></div>"#);
    }

    #[test]
    fn test_doctype() {
        assert_eq!(haml("!!!"), "<!DOCTYPE html>");
        assert_eq!(haml("!!! XML"), r#"<?xml version="1.0" encoding="utf-8" ?>"#);
    }

    #[test]
    fn test_hash_attributes() {
        let html = haml(r#"%a{href: "/users", :title => title, "data-x" => 'y', class: "btn"} Go"#);
        assert_eq!(
            html,
            r#"<a class="btn" href="/users" title="Home & Away" data-x="y">Go</a>"#
        );
    }

    #[test]
    fn test_boolean_attributes() {
        let html = haml("%input{type: 'checkbox', checked: true, disabled: false, on: enabled, off: hidden, gone: missing}");
        assert_eq!(html, r#"<input type="checkbox" checked on>"#);
    }

    #[test]
    fn test_html_style_attributes() {
        assert_eq!(
            haml(r#"%input(type="text" name="q" required)"#),
            r#"<input type="text" name="q" required>"#
        );
    }

    #[test]
    fn test_script_output_from_scope() {
        assert_eq!(haml("= lang"), "HAML");
        assert_eq!(haml("%h1= title"), "<h1>Home &amp; Away</h1>");
        assert_eq!(haml("%span= user.name"), "<span>Ada</span>");
        assert_eq!(haml("%span= nothing"), "<span></span>");
    }

    #[test]
    fn test_interpolation() {
        assert_eq!(haml("%p Hi #{user.name}!"), "<p>Hi Ada!</p>");
        assert_eq!(haml(r"%p \#{literal}"), "<p>#{literal}</p>");
    }

    #[test]
    fn test_template_actions_pass_through() {
        let html = haml("%ul\n  {% for item in items %}\n  %li {{ item }}\n  {% endfor %}");
        assert_eq!(
            html,
            "<ul>\n  {% for item in items %}\n  <li>{{ item }}</li>\n  {% endfor %}</ul>"
        );
    }

    #[test]
    fn test_self_closing_and_void() {
        assert_eq!(haml("%br"), "<br>");
        assert_eq!(haml("%widget/"), "<widget />");
    }

    #[test]
    fn test_comments() {
        assert_eq!(haml("/ note"), "<!-- note -->");
        assert_eq!(haml("/\n  %p x"), "<!--\n  <p>x</p>-->");
        assert_eq!(
            haml("/[if IE]\n  %p old"),
            "<!--[if IE]>\n  <p>old</p><![endif]-->"
        );
    }

    #[test]
    fn test_silent_comment_swallows_children() {
        let html = haml("-# hidden\n  %p gone\n%p kept");
        assert_eq!(html, "\n\n<p>kept</p>");
    }

    #[test]
    fn test_code_lines_render_nothing() {
        assert_eq!(haml("- x = 1\n%p y"), "\n<p>y</p>");
    }

    #[test]
    fn test_escape_line() {
        assert_eq!(haml(r"\%p not a tag"), "%p not a tag");
    }

    #[test]
    fn test_blank_lines_preserved() {
        let html = haml("%div\n  %p a\n\n%p b");
        assert_eq!(html, "<div>\n  <p>a</p></div>\n\n<p>b</p>");
    }

    #[test]
    fn test_mixed_indentation_is_an_error() {
        let err = render("%div\n \t%p", &scope()).unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_inline_content_with_children_is_an_error() {
        let err = render("%p text\n  %span nested", &scope()).unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.message.contains("illegal nesting"));
    }

    #[test]
    fn test_unbalanced_hash_is_an_error() {
        let err = render("%p\n%a{href: '/'", &scope()).unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_crlf_input() {
        assert_eq!(haml("%p a\r\n%p b\r\n"), "<p>a</p>\n<p>b</p>\n");
    }
}
