//! Rich-text editor wrapper for the positioning field.
//!
//! The browser widget is configured from [`EditorConfig`] and submits its JSON
//! document; the server parses it into [`Document`], checks it against the same
//! configuration, and renders it back as escaped HTML for the preview.

use crate::error::DocumentError;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

#[derive(Debug, Clone, Serialize)]
pub struct ToolbarButton {
    pub label: &'static str,
    pub command: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
}

/// Settings shared by the browser widget and server-side validation.
#[derive(Debug, Clone, Serialize)]
pub struct EditorConfig {
    pub extensions: Vec<&'static str>,
    pub heading_levels: Vec<u8>,
    pub toolbar: Vec<ToolbarButton>,
    pub max_document_bytes: usize,
}

impl EditorConfig {
    /// StarterKit with underline, headings 1-3 and both list kinds.
    pub fn positioning(max_document_bytes: usize) -> Self {
        let button = |label, command, level| ToolbarButton {
            label,
            command,
            level,
        };
        Self {
            extensions: vec![
                "StarterKit",
                "Bold",
                "Italic",
                "Underline",
                "Heading",
                "BulletList",
                "OrderedList",
            ],
            heading_levels: vec![1, 2, 3],
            toolbar: vec![
                button("Bold", "toggleBold", None),
                button("Italic", "toggleItalic", None),
                button("Underline", "toggleUnderline", None),
                button("H1", "toggleHeading", Some(1)),
                button("H2", "toggleHeading", Some(2)),
                button("Bullet List", "toggleBulletList", None),
                button("Ordered List", "toggleOrderedList", None),
            ],
            max_document_bytes,
        }
    }

    /// JSON handed to the widget through a `data-` attribute.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
enum DocKind {
    Doc,
}

/// Root of an editor document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "type")]
    kind: DocKind,
    #[serde(default)]
    pub content: Vec<Node>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeadingAttrs {
    pub level: u8,
}

fn first_item() -> u32 {
    1
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderedListAttrs {
    #[serde(default = "first_item")]
    pub start: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeBlockAttrs {
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Node {
    Paragraph {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        content: Vec<Node>,
    },
    Heading {
        attrs: HeadingAttrs,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        content: Vec<Node>,
    },
    BulletList {
        #[serde(default)]
        content: Vec<Node>,
    },
    OrderedList {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attrs: Option<OrderedListAttrs>,
        #[serde(default)]
        content: Vec<Node>,
    },
    ListItem {
        #[serde(default)]
        content: Vec<Node>,
    },
    Blockquote {
        #[serde(default)]
        content: Vec<Node>,
    },
    CodeBlock {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attrs: Option<CodeBlockAttrs>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        content: Vec<Node>,
    },
    HorizontalRule,
    HardBreak,
    Text {
        text: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        marks: Vec<Mark>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Mark {
    Bold,
    Italic,
    Underline,
    Strike,
    Code,
}

impl Node {
    fn name(&self) -> &'static str {
        match self {
            Node::Paragraph { .. } => "paragraph",
            Node::Heading { .. } => "heading",
            Node::BulletList { .. } => "bulletList",
            Node::OrderedList { .. } => "orderedList",
            Node::ListItem { .. } => "listItem",
            Node::Blockquote { .. } => "blockquote",
            Node::CodeBlock { .. } => "codeBlock",
            Node::HorizontalRule => "horizontalRule",
            Node::HardBreak => "hardBreak",
            Node::Text { .. } => "text",
        }
    }

    fn is_inline(&self) -> bool {
        matches!(self, Node::Text { .. } | Node::HardBreak)
    }

    fn is_block(&self) -> bool {
        !self.is_inline() && !matches!(self, Node::ListItem { .. })
    }
}

impl Document {
    pub fn new(content: Vec<Node>) -> Self {
        Self {
            kind: DocKind::Doc,
            content,
        }
    }

    /// Paragraphs separated by blank lines; single newlines become hard breaks.
    pub fn from_plain_text(text: &str) -> Self {
        let normalized = text.replace("\r\n", "\n");
        let content = normalized
            .split("\n\n")
            .map(str::trim)
            .filter(|chunk| !chunk.is_empty())
            .map(|chunk| {
                let mut inline = Vec::new();
                for (i, line) in chunk.lines().enumerate() {
                    if i > 0 {
                        inline.push(Node::HardBreak);
                    }
                    if !line.is_empty() {
                        inline.push(Node::Text {
                            text: line.to_string(),
                            marks: Vec::new(),
                        });
                    }
                }
                Node::Paragraph { content: inline }
            })
            .collect();
        Self::new(content)
    }

    /// Parse a form submission: editor JSON when it is a JSON object,
    /// plain text otherwise. The result is validated against `config`.
    pub fn parse_submission(raw: &str, config: &EditorConfig) -> Result<Self, DocumentError> {
        let trimmed = raw.trim();
        let document = match serde_json::from_str::<serde_json::Value>(trimmed) {
            Ok(value) if value.is_object() => Self::from_value(&value)?,
            _ => Self::from_plain_text(trimmed),
        };
        document.validate(config)?;
        Ok(document)
    }

    pub fn from_value(value: &serde_json::Value) -> Result<Self, DocumentError> {
        Ok(Self::deserialize(value)?)
    }

    pub fn to_value(&self) -> Result<serde_json::Value, DocumentError> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn is_empty(&self) -> bool {
        self.content.iter().all(|node| match node {
            Node::Paragraph { content } => content.is_empty(),
            _ => false,
        })
    }

    pub fn validate(&self, config: &EditorConfig) -> Result<(), DocumentError> {
        let size = serde_json::to_vec(self)?.len();
        if size > config.max_document_bytes {
            return Err(DocumentError::TooLarge {
                size,
                max: config.max_document_bytes,
            });
        }
        for node in &self.content {
            if !node.is_block() {
                return Err(DocumentError::InvalidChild {
                    parent: "doc",
                    child: node.name(),
                });
            }
            check_node(node, config)?;
        }
        Ok(())
    }

    /// Text content with blocks separated by blank lines; the inverse of
    /// [`Document::from_plain_text`] for documents without formatting.
    pub fn plain_text(&self) -> String {
        let mut blocks = Vec::new();
        for node in &self.content {
            collect_blocks(node, &mut blocks);
        }
        blocks.join("\n\n")
    }

    /// Escaped HTML for the read-only preview.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for node in &self.content {
            render_node(node, &mut out);
        }
        out
    }
}

fn check_children(
    parent: &Node,
    children: &[Node],
    allowed: fn(&Node) -> bool,
    config: &EditorConfig,
) -> Result<(), DocumentError> {
    for child in children {
        if !allowed(child) {
            return Err(DocumentError::InvalidChild {
                parent: parent.name(),
                child: child.name(),
            });
        }
        check_node(child, config)?;
    }
    Ok(())
}

fn check_node(node: &Node, config: &EditorConfig) -> Result<(), DocumentError> {
    match node {
        Node::Paragraph { content } => check_children(node, content, Node::is_inline, config),
        Node::Heading { attrs, content } => {
            if !config.heading_levels.contains(&attrs.level) {
                return Err(DocumentError::HeadingLevel(attrs.level));
            }
            check_children(node, content, Node::is_inline, config)
        }
        Node::BulletList { content } | Node::OrderedList { content, .. } => {
            if content.is_empty() {
                return Err(DocumentError::EmptyContainer(node.name()));
            }
            check_children(node, content, |n| matches!(n, Node::ListItem { .. }), config)
        }
        Node::ListItem { content } | Node::Blockquote { content } => {
            if content.is_empty() {
                return Err(DocumentError::EmptyContainer(node.name()));
            }
            check_children(node, content, Node::is_block, config)
        }
        Node::CodeBlock { content, .. } => {
            check_children(node, content, |n| matches!(n, Node::Text { .. }), config)
        }
        Node::Text { text, .. } if text.is_empty() => Err(DocumentError::EmptyText),
        Node::Text { .. } | Node::HardBreak | Node::HorizontalRule => Ok(()),
    }
}

fn inline_text(content: &[Node]) -> String {
    let mut text = String::new();
    for node in content {
        match node {
            Node::Text { text: t, .. } => text.push_str(t),
            Node::HardBreak => text.push('\n'),
            _ => {}
        }
    }
    text
}

fn collect_blocks(node: &Node, blocks: &mut Vec<String>) {
    match node {
        Node::Paragraph { content } | Node::Heading { content, .. } | Node::CodeBlock { content, .. } => {
            let text = inline_text(content);
            if !text.is_empty() {
                blocks.push(text);
            }
        }
        Node::BulletList { content }
        | Node::OrderedList { content, .. }
        | Node::ListItem { content }
        | Node::Blockquote { content } => {
            for child in content {
                collect_blocks(child, blocks);
            }
        }
        Node::HorizontalRule | Node::HardBreak | Node::Text { .. } => {}
    }
}

fn escape_into(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
}

fn mark_tag(mark: Mark) -> &'static str {
    match mark {
        Mark::Bold => "strong",
        Mark::Italic => "em",
        Mark::Underline => "u",
        Mark::Strike => "s",
        Mark::Code => "code",
    }
}

fn render_children(tag: &str, content: &[Node], out: &mut String) {
    let _ = write!(out, "<{tag}>");
    for child in content {
        render_node(child, out);
    }
    let _ = write!(out, "</{tag}>");
}

fn render_node(node: &Node, out: &mut String) {
    match node {
        Node::Paragraph { content } => render_children("p", content, out),
        Node::Heading { attrs, content } => {
            render_children(&format!("h{}", attrs.level), content, out)
        }
        Node::BulletList { content } => render_children("ul", content, out),
        Node::OrderedList { attrs, content } => match attrs {
            Some(OrderedListAttrs { start }) if *start != 1 => {
                let _ = write!(out, "<ol start=\"{start}\">");
                for child in content {
                    render_node(child, out);
                }
                out.push_str("</ol>");
            }
            _ => render_children("ol", content, out),
        },
        Node::ListItem { content } => render_children("li", content, out),
        Node::Blockquote { content } => render_children("blockquote", content, out),
        Node::CodeBlock { content, .. } => {
            out.push_str("<pre>");
            render_children("code", content, out);
            out.push_str("</pre>");
        }
        Node::HorizontalRule => out.push_str("<hr>"),
        Node::HardBreak => out.push_str("<br>"),
        Node::Text { text, marks } => {
            for mark in marks {
                let _ = write!(out, "<{}>", mark_tag(*mark));
            }
            escape_into(text, out);
            for mark in marks.iter().rev() {
                let _ = write!(out, "</{}>", mark_tag(*mark));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn config() -> EditorConfig {
        EditorConfig::positioning(64 * 1024)
    }

    #[test]
    fn parses_editor_json() {
        let raw = json!({
            "type": "doc",
            "content": [
                {"type": "heading", "attrs": {"level": 2}, "content": [{"type": "text", "text": "Promise"}]},
                {"type": "paragraph", "content": [
                    {"type": "text", "text": "Fast ", "marks": [{"type": "bold"}]},
                    {"type": "text", "text": "and cheap"}
                ]},
                {"type": "bulletList", "content": [
                    {"type": "listItem", "content": [{"type": "paragraph", "content": [{"type": "text", "text": "one"}]}]}
                ]}
            ]
        })
        .to_string();

        let doc = Document::parse_submission(&raw, &config()).unwrap();
        assert_eq!(doc.content.len(), 3);
        assert_eq!(
            doc.to_html(),
            "<h2>Promise</h2><p><strong>Fast </strong>and cheap</p><ul><li><p>one</p></li></ul>"
        );
    }

    #[test]
    fn value_round_trip_keeps_the_doc_tag() {
        let doc = Document::from_plain_text("hello");
        let value = doc.to_value().unwrap();
        assert_eq!(value["type"], "doc");
        assert_eq!(Document::from_value(&value).unwrap(), doc);
    }

    #[test]
    fn plain_text_becomes_paragraphs() {
        let doc = Document::from_plain_text("First line\nsecond line\r\n\r\n\nNext");
        assert_eq!(
            doc.to_html(),
            "<p>First line<br>second line</p><p>Next</p>"
        );
    }

    #[test]
    fn plain_text_survives_a_round_trip() {
        let text = "First line\nsecond line\n\nNext";
        assert_eq!(Document::from_plain_text(text).plain_text(), text);
    }

    #[test]
    fn blank_submission_is_an_empty_document() {
        let doc = Document::parse_submission("   ", &config()).unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn brace_leading_plain_text_is_not_json() {
        let doc = Document::parse_submission("{Acme} leads the premium segment", &config()).unwrap();
        assert_eq!(doc.to_html(), "<p>{Acme} leads the premium segment</p>");
    }

    #[test]
    fn json_object_that_is_not_a_document_is_rejected() {
        let err = Document::parse_submission(r#"{"type": "image"}"#, &config()).unwrap_err();
        assert!(matches!(err, DocumentError::Parse(_)));
    }

    #[test]
    fn text_is_escaped() {
        let doc = Document::from_plain_text("<script>alert('x')</script> & co");
        assert_eq!(
            doc.to_html(),
            "<p>&lt;script&gt;alert(&#x27;x&#x27;)&lt;/script&gt; &amp; co</p>"
        );
    }

    #[test]
    fn rejects_disabled_heading_level() {
        let raw = json!({"type": "doc", "content": [
            {"type": "heading", "attrs": {"level": 5}, "content": [{"type": "text", "text": "x"}]}
        ]})
        .to_string();
        let err = Document::parse_submission(&raw, &config()).unwrap_err();
        assert!(matches!(err, DocumentError::HeadingLevel(5)));
    }

    #[test]
    fn rejects_unknown_node_type() {
        let raw = json!({"type": "doc", "content": [{"type": "image", "attrs": {"src": "x"}}]}).to_string();
        let err = Document::parse_submission(&raw, &config()).unwrap_err();
        assert!(matches!(err, DocumentError::Parse(_)));
    }

    #[test]
    fn rejects_unknown_mark() {
        let raw = json!({"type": "doc", "content": [
            {"type": "paragraph", "content": [
                {"type": "text", "text": "x", "marks": [{"type": "link", "attrs": {"href": "https://a.test"}}]}
            ]}
        ]})
        .to_string();
        assert!(Document::parse_submission(&raw, &config()).is_err());
    }

    #[test]
    fn rejects_text_at_block_position() {
        let raw = json!({"type": "doc", "content": [{"type": "text", "text": "loose"}]}).to_string();
        let err = Document::parse_submission(&raw, &config()).unwrap_err();
        assert!(matches!(
            err,
            DocumentError::InvalidChild { parent: "doc", child: "text" }
        ));
    }

    #[test]
    fn rejects_paragraph_directly_in_list() {
        let raw = json!({"type": "doc", "content": [
            {"type": "orderedList", "content": [{"type": "paragraph"}]}
        ]})
        .to_string();
        let err = Document::parse_submission(&raw, &config()).unwrap_err();
        assert!(matches!(
            err,
            DocumentError::InvalidChild { parent: "orderedList", child: "paragraph" }
        ));
    }

    #[test]
    fn rejects_empty_text_node() {
        let raw = json!({"type": "doc", "content": [
            {"type": "paragraph", "content": [{"type": "text", "text": ""}]}
        ]})
        .to_string();
        let err = Document::parse_submission(&raw, &config()).unwrap_err();
        assert!(matches!(err, DocumentError::EmptyText));
    }

    #[test]
    fn rejects_oversized_document() {
        let small = EditorConfig::positioning(64);
        let err = Document::parse_submission(&"word ".repeat(100), &small).unwrap_err();
        assert!(matches!(err, DocumentError::TooLarge { max: 64, .. }));
    }

    #[test]
    fn ordered_list_keeps_start_number() {
        let raw = json!({"type": "doc", "content": [
            {"type": "orderedList", "attrs": {"start": 3}, "content": [
                {"type": "listItem", "content": [{"type": "paragraph", "content": [{"type": "text", "text": "c"}]}]}
            ]}
        ]})
        .to_string();
        let doc = Document::parse_submission(&raw, &config()).unwrap();
        assert_eq!(doc.to_html(), "<ol start=\"3\"><li><p>c</p></li></ol>");
    }

    #[test]
    fn config_json_lists_toolbar() {
        let value: serde_json::Value = serde_json::from_str(&config().to_json()).unwrap();
        assert_eq!(value["heading_levels"], json!([1, 2, 3]));
        assert_eq!(value["toolbar"][3], json!({"label": "H1", "command": "toggleHeading", "level": 1}));
    }
}
