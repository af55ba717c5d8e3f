//! Rendered page text, approximating `innerText`.
//!
//! Hidden subtrees and script contents are skipped. Block-level elements and
//! `<br>` start new lines; inline text is whitespace-collapsed and joined with
//! single spaces. Empty lines are dropped.

use crate::document::{Document, NodeId};

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "dd", "details", "dialog", "div", "dl",
    "dt", "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5",
    "h6", "header", "hr", "li", "main", "nav", "ol", "option", "p", "pre", "section", "summary",
    "table", "tr", "ul",
];

/// Elements whose children never render as text.
const OPAQUE_TAGS: &[&str] = &["textarea", "script", "style", "template", "noscript"];

enum Step {
    Enter(NodeId),
    Break,
}

/// Visible text under `from`, one line per block.
pub fn rendered_text(doc: &Document, from: NodeId) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = Line::default();
    let mut stack = vec![Step::Enter(from)];

    while let Some(step) = stack.pop() {
        let id = match step {
            Step::Break => {
                flush(&mut lines, &mut current);
                continue;
            }
            Step::Enter(id) => id,
        };

        if let Some(text) = doc.text(id) {
            current.push_text(text);
            continue;
        }

        let Some(tag) = doc.tag(id) else {
            // document node
            stack.extend(doc.children(id).iter().rev().map(|&c| Step::Enter(c)));
            continue;
        };
        if doc.is_self_hidden(id) || OPAQUE_TAGS.contains(&tag) {
            continue;
        }
        if tag == "br" {
            flush(&mut lines, &mut current);
            continue;
        }

        let block = BLOCK_TAGS.contains(&tag);
        if block {
            flush(&mut lines, &mut current);
            stack.push(Step::Break);
        }
        stack.extend(doc.children(id).iter().rev().map(|&c| Step::Enter(c)));
    }
    flush(&mut lines, &mut current);
    lines.join("\n")
}

/// Line being assembled; whitespace runs collapse to one space, including
/// runs that span text nodes.
#[derive(Default)]
struct Line {
    text: String,
    pending_space: bool,
}

impl Line {
    fn push_text(&mut self, text: &str) {
        for c in text.chars() {
            if c.is_whitespace() {
                self.pending_space = true;
            } else {
                if self.pending_space && !self.text.is_empty() {
                    self.text.push(' ');
                }
                self.pending_space = false;
                self.text.push(c);
            }
        }
    }
}

fn flush(lines: &mut Vec<String>, current: &mut Line) {
    let line = std::mem::take(current);
    if !line.text.is_empty() {
        lines.push(line.text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(html: &str) -> String {
        Document::parse(html, "https://app.test/")
            .unwrap()
            .rendered_text()
    }

    #[test]
    fn blocks_become_lines() {
        assert_eq!(
            text("<body><h1>Welcome</h1><p>Hello <b>there</b>,\n friend</p><div>Bye</div></body>"),
            "Welcome\nHello there, friend\nBye"
        );
    }

    #[test]
    fn hidden_and_script_text_is_skipped() {
        assert_eq!(
            text(r#"<body><p>A</p><p style="display:none">secret</p><script>x()</script><p>B</p></body>"#),
            "A\nB"
        );
    }

    #[test]
    fn br_splits_lines() {
        assert_eq!(text("<body><p>one<br>two</p></body>"), "one\ntwo");
    }

    #[test]
    fn empty_body_is_empty() {
        assert_eq!(text("<body></body>"), "");
    }
}
