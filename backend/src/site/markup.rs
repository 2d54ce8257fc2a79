//! Span-preserving view over an HTML document.
//!
//! The published page is produced from a fixed template, so a full HTML5
//! parser is not needed. `Markup` scans tags with a regex, tracks nesting with
//! a stack and records byte ranges for every element: its start tag, its inner
//! content, its end tag and each attribute value. Edits are then applied as
//! splices on those ranges, which leaves every other byte of the document as
//! it was.
//!
//! `Selector` is the structural locator language used by the field table:
//! compounds of `tag`, `#id`, `.class` and `:nth-of-type(n)` joined by the
//! descendant combinator (whitespace).

use regex::Regex;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use std::sync::LazyLock;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)<!--.*?-->|<![^>]*>|<\?[^>]*>|<(/?)([A-Za-z][A-Za-z0-9:-]*)((?:[^>"']|"[^"]*"|'[^']*')*?)(/?)>"#,
    )
    .expect("tag pattern is valid")
});

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s"'>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
        .expect("attribute pattern is valid")
});

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Elements whose content is not markup and must not be scanned for tags.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Lowercased attribute name.
    pub name: String,
    pub value: Option<String>,
    /// Whole `name="value"` text.
    pub span: Range<usize>,
    /// Value without its quotes.
    pub value_span: Option<Range<usize>>,
    pub quoted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Lowercased tag name.
    pub name: String,
    pub start_tag: Range<usize>,
    /// Content between the start and end tag. Empty for void elements.
    pub inner: Range<usize>,
    pub end_tag: Option<Range<usize>>,
    pub attributes: Vec<Attribute>,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub self_closing: bool,
}

impl Element {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|attr| attr.name.eq_ignore_ascii_case(name))
    }

    pub fn id(&self) -> Option<&str> {
        self.attribute("id").and_then(|attr| attr.value.as_deref())
    }

    /// Content range that can be replaced safely: only for elements closed
    /// by their own end tag. Void, self-closing and implicitly closed
    /// elements have no such range.
    pub fn content_range(&self) -> Option<Range<usize>> {
        if self.self_closing {
            return None;
        }
        self.end_tag.as_ref().map(|_| self.inner.clone())
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attribute("class")
            .and_then(|attr| attr.value.as_deref())
            .map(|classes| classes.split_ascii_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }
}

/// Element index of a parsed document, in document order.
#[derive(Debug, Clone)]
pub struct Markup<'a> {
    source: &'a str,
    elements: Vec<Element>,
}

impl<'a> Markup<'a> {
    pub fn parse(source: &'a str) -> Self {
        let mut elements: Vec<Element> = Vec::new();
        let mut stack: Vec<usize> = Vec::new();
        let mut pos = 0;

        while let Some(caps) = TAG_RE.captures_at(source, pos) {
            let Some(whole) = caps.get(0) else { break };
            pos = whole.end();

            // Comments, doctype and processing instructions carry no name.
            let Some(name) = caps.get(2) else { continue };
            let name = name.as_str().to_ascii_lowercase();
            let closing = caps.get(1).is_some_and(|g| !g.is_empty());

            if closing {
                // Unmatched end tags are dropped, open elements above the
                // match are closed implicitly.
                if let Some(depth) = stack.iter().rposition(|&i| elements[i].name == name) {
                    for &open in &stack[depth + 1..] {
                        elements[open].inner.end = whole.start();
                    }
                    let idx = stack[depth];
                    elements[idx].inner.end = whole.start();
                    elements[idx].end_tag = Some(whole.range());
                    stack.truncate(depth);
                }
                continue;
            }

            let attributes = caps
                .get(3)
                .map(|raw| parse_attributes(raw.as_str(), raw.start()))
                .unwrap_or_default();
            let self_closing = caps.get(4).is_some_and(|g| !g.is_empty())
                || VOID_ELEMENTS.contains(&name.as_str());

            let idx = elements.len();
            let parent = stack.last().copied();
            if let Some(parent) = parent {
                elements[parent].children.push(idx);
            }
            elements.push(Element {
                name: name.clone(),
                start_tag: whole.range(),
                inner: whole.end()..whole.end(),
                end_tag: None,
                attributes,
                parent,
                children: Vec::new(),
                self_closing,
            });

            if self_closing {
                continue;
            }

            if RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
                let rest = source[whole.end()..].to_ascii_lowercase();
                let close = format!("</{name}");
                match rest.find(&close) {
                    Some(offset) => {
                        let end_start = whole.end() + offset;
                        let end_end = source[end_start..]
                            .find('>')
                            .map(|gt| end_start + gt + 1)
                            .unwrap_or(source.len());
                        elements[idx].inner.end = end_start;
                        elements[idx].end_tag = Some(end_start..end_end);
                        pos = end_end;
                    }
                    None => {
                        elements[idx].inner.end = source.len();
                        pos = source.len();
                    }
                }
                continue;
            }

            stack.push(idx);
        }

        for &open in &stack {
            elements[open].inner.end = source.len();
        }

        Markup { source, elements }
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    #[cfg(test)]
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn element(&self, idx: usize) -> &Element {
        &self.elements[idx]
    }

    pub fn inner_text(&self, idx: usize) -> &'a str {
        &self.source[self.elements[idx].inner.clone()]
    }

    /// First element in document order matching `selector`.
    ///
    /// With a scope, only strict descendants of the scope element are
    /// candidates and ancestor compounds are matched no higher than the scope.
    pub fn select_first(&self, scope: Option<usize>, selector: &Selector) -> Option<usize> {
        let start = scope.map(|s| s + 1).unwrap_or(0);
        (start..self.elements.len())
            .take_while(|&idx| scope.is_none_or(|s| self.is_descendant(idx, s)))
            .find(|&idx| self.matches(idx, scope, selector))
    }

    #[cfg(test)]
    pub fn select_all(&self, scope: Option<usize>, selector: &Selector) -> Vec<usize> {
        let start = scope.map(|s| s + 1).unwrap_or(0);
        (start..self.elements.len())
            .take_while(|&idx| scope.is_none_or(|s| self.is_descendant(idx, s)))
            .filter(|&idx| self.matches(idx, scope, selector))
            .collect()
    }

    fn is_descendant(&self, idx: usize, ancestor: usize) -> bool {
        let mut current = self.elements[idx].parent;
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.elements[parent].parent;
        }
        false
    }

    fn matches(&self, idx: usize, scope: Option<usize>, selector: &Selector) -> bool {
        let Some((last, ancestors)) = selector.compounds.split_last() else {
            return false;
        };
        if !self.matches_compound(idx, last) {
            return false;
        }

        let mut current = self.elements[idx].parent;
        for compound in ancestors.iter().rev() {
            loop {
                let Some(candidate) = current else {
                    return false;
                };
                if scope.is_some_and(|s| !self.is_descendant(candidate, s) && candidate != s) {
                    return false;
                }
                current = self.elements[candidate].parent;
                if self.matches_compound(candidate, compound) {
                    break;
                }
            }
        }
        true
    }

    fn matches_compound(&self, idx: usize, compound: &Compound) -> bool {
        let element = &self.elements[idx];
        if compound.tag.as_deref().is_some_and(|tag| tag != element.name) {
            return false;
        }
        if compound.id.as_deref().is_some_and(|id| element.id() != Some(id)) {
            return false;
        }
        if !compound.classes.iter().all(|class| element.has_class(class)) {
            return false;
        }
        match compound.nth_of_type {
            Some(n) => self.position_of_type(idx) == n,
            None => true,
        }
    }

    /// 1-based position among siblings sharing the element's tag name.
    fn position_of_type(&self, idx: usize) -> usize {
        let element = &self.elements[idx];
        let siblings: Vec<usize> = match element.parent {
            Some(parent) => self.elements[parent].children.clone(),
            None => (0..self.elements.len())
                .filter(|&i| self.elements[i].parent.is_none())
                .collect(),
        };
        siblings
            .iter()
            .take_while(|&&sibling| sibling != idx)
            .filter(|&&sibling| self.elements[sibling].name == element.name)
            .count()
            + 1
    }
}

fn parse_attributes(raw: &str, offset: usize) -> Vec<Attribute> {
    ATTR_RE
        .captures_iter(raw)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let name = caps.get(1)?;
            let (value, quoted) = match (caps.get(2), caps.get(3), caps.get(4)) {
                (Some(v), _, _) | (_, Some(v), _) => (Some(v), true),
                (_, _, Some(v)) => (Some(v), false),
                _ => (None, false),
            };
            Some(Attribute {
                name: name.as_str().to_ascii_lowercase(),
                value: value.map(|v| v.as_str().to_string()),
                span: offset + whole.start()..offset + whole.end(),
                value_span: value.map(|v| offset + v.start()..offset + v.end()),
                quoted,
            })
        })
        .collect()
}

/// Escapes text for use in element content or a double-quoted attribute.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    nth_of_type: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    compounds: Vec<Compound>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorError {
    pub selector: String,
    pub reason: String,
}

impl fmt::Display for SelectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid selector '{}': {}", self.selector, self.reason)
    }
}

impl std::error::Error for SelectorError {}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let error = |reason: String| SelectorError {
            selector: s.to_string(),
            reason,
        };
        let compounds = s
            .split_ascii_whitespace()
            .map(|part| parse_compound(part).map_err(&error))
            .collect::<Result<Vec<_>, _>>()?;
        if compounds.is_empty() {
            return Err(error("empty selector".to_string()));
        }
        Ok(Selector { compounds })
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn take_ident(input: &str) -> (&str, &str) {
    let end = input.find(|c: char| !is_ident_char(c)).unwrap_or(input.len());
    input.split_at(end)
}

fn parse_compound(part: &str) -> Result<Compound, String> {
    let mut compound = Compound::default();
    let (tag, mut rest) = take_ident(part);
    if !tag.is_empty() {
        compound.tag = Some(tag.to_ascii_lowercase());
    }

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('#') {
            let (id, tail) = take_ident(after);
            if id.is_empty() {
                return Err("missing id after '#'".to_string());
            }
            compound.id = Some(id.to_string());
            rest = tail;
        } else if let Some(after) = rest.strip_prefix('.') {
            let (class, tail) = take_ident(after);
            if class.is_empty() {
                return Err("missing class after '.'".to_string());
            }
            compound.classes.push(class.to_string());
            rest = tail;
        } else if let Some(after) = rest.strip_prefix(":nth-of-type(") {
            let close = after
                .find(')')
                .ok_or_else(|| "unterminated :nth-of-type(".to_string())?;
            let n: usize = after[..close]
                .trim()
                .parse()
                .map_err(|_| format!("bad :nth-of-type argument '{}'", &after[..close]))?;
            if n == 0 {
                return Err(":nth-of-type is 1-based".to_string());
            }
            compound.nth_of_type = Some(n);
            rest = &after[close + 1..];
        } else {
            return Err(format!("unsupported syntax at '{rest}'"));
        }
    }

    if compound == Compound::default() {
        return Err("empty compound".to_string());
    }
    Ok(compound)
}
