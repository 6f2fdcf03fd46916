use crate::utils::error::{EtlError, Result};
use scraper::{ElementRef, Selector};

const HIDDEN_TAGS: [&str; 3] = ["script", "style", "noscript"];

/// A text node together with the element that directly contains it.
#[derive(Debug, Clone, Copy)]
pub struct TextNode<'a> {
    pub text: &'a str,
    pub parent: ElementRef<'a>,
}

/// 收集 `root` 底下所有可見文字節點（排除 script/style/noscript），依文件順序
pub fn visible_text_nodes<'a>(root: ElementRef<'a>) -> Vec<TextNode<'a>> {
    root.descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let parent = node.parent().and_then(ElementRef::wrap)?;
            if HIDDEN_TAGS.contains(&parent.value().name()) {
                return None;
            }
            Some(TextNode {
                text: &**text,
                parent,
            })
        })
        .collect()
}

/// Collapses every whitespace run (NBSP included) into a single space.
pub fn clean_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text of every descendant, each piece trimmed, joined with a space.
pub fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn is_within(element: ElementRef<'_>, ancestor: ElementRef<'_>) -> bool {
    element.id() == ancestor.id() || element.ancestors().any(|node| node.id() == ancestor.id())
}

pub fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| EtlError::processing(format!("Invalid CSS selector '{}': {:?}", css, e)))
}
