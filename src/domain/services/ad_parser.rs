//! Ad page parsing for immo-entre-particuliers.com.
//!
//! Every field is looked up in the visible text of the page. The price and the
//! city must be present, the type must be a house or an apartment; the other
//! characteristics are optional.

use crate::domain::model::{EnergyRating, Listing, PropertyType};
use crate::domain::services::html_text::{
    clean_text, element_text, is_within, visible_text_nodes, TextNode,
};
use crate::utils::error::{EtlError, Result};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

pub const DEFAULT_MIN_PRICE: u64 = 10_000;

static MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bà vendre\b").expect("valid marker regex"));
static EURO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"€\s*\d[\d\s]*|\d[\d\s]*€").expect("valid euro regex"));
static LOCATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)France,\s").expect("valid location regex"));
static DPE_LETTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b([A-G])\b").expect("valid dpe regex"));
static BLOCK_TITLES: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(r"(?i)Détails\s+De\s+La\s+Propriété").expect("valid title regex"),
        Regex::new(r"(?i)Caractéristiques").expect("valid title regex"),
    ]
});
static CELL_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td, th").expect("valid cell selector"));

const BLOCK_KEYWORDS: [&str; 7] = [
    "type",
    "surface",
    "nb. de pièces",
    "nb. de chambres",
    "nb. de salles de bains",
    "dep",
    "dpe",
];
const BLOCK_MAX_DEPTH: usize = 7;
const BLOCK_MIN_SCORE: usize = 3;
const MAX_LOCATION_CANDIDATES: usize = 10;

/// A characteristic label, searched anywhere in a text node and compared
/// against whole cell or sibling texts.
struct Label {
    name: &'static str,
    search: Regex,
    full: Regex,
}

impl Label {
    fn new(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            search: Regex::new(&format!("(?i){}", pattern)).expect("valid label regex"),
            full: Regex::new(&format!("(?i)^(?:{})$", pattern)).expect("valid label regex"),
        }
    }
}

static TYPE_LABEL: LazyLock<Label> = LazyLock::new(|| Label::new("Type", r"Type"));
static SURFACE_LABEL: LazyLock<Label> = LazyLock::new(|| Label::new("Surface", r"Surface"));
static ROOMS_LABEL: LazyLock<Label> = LazyLock::new(|| {
    Label::new("NbrPieces", r"Nb\.\s*de\s*pièces|Nombre\s+de\s*pièces")
});
static BEDROOMS_LABEL: LazyLock<Label> = LazyLock::new(|| {
    Label::new("NbrChambres", r"Nb\.\s*de\s*chambres|Nombre\s+de\s*chambres")
});
static BATHROOMS_LABEL: LazyLock<Label> =
    LazyLock::new(|| Label::new("NbrSdb", r"Nb\.\s*de\s*salles?\s*de\s*bains?"));
static DPE_LABEL: LazyLock<Label> = LazyLock::new(|| {
    Label::new("DPE", r"\bDEP\b|\bDPE\b|Consommation\s+d['’]?énergie")
});

/// 解析單一廣告頁面
pub fn parse_listing(html: &str, min_price: u64) -> Result<Listing> {
    let document = Html::parse_document(html);
    AdPage::new(&document).listing(min_price)
}

pub struct AdPage<'a> {
    texts: Vec<TextNode<'a>>,
    marker: Option<usize>,
    block: ElementRef<'a>,
}

impl<'a> AdPage<'a> {
    pub fn new(document: &'a Html) -> Self {
        let root = document.root_element();
        let texts = visible_text_nodes(root);
        let marker = texts.iter().position(|t| MARKER_RE.is_match(t.text));
        let block = find_characteristics_block(&texts).unwrap_or(root);

        Self {
            texts,
            marker,
            block,
        }
    }

    pub fn listing(&self, min_price: u64) -> Result<Listing> {
        Ok(Listing {
            city: self.city()?,
            property_type: self.property_type()?,
            surface: self.surface(),
            rooms: self.rooms(),
            bedrooms: self.bedrooms(),
            bathrooms: self.bathrooms(),
            dpe: self.dpe(),
            price: self.price(min_price)?,
        })
    }

    fn after_marker(&self) -> Option<&[TextNode<'a>]> {
        self.marker.map(|m| &self.texts[m + 1..])
    }

    pub fn price(&self, min_price: u64) -> Result<u64> {
        let has_amount = |t: &&TextNode<'a>| EURO_RE.is_match(t.text);
        let node = self
            .after_marker()
            .and_then(|texts| texts.iter().find(has_amount))
            .or_else(|| self.texts.iter().find(has_amount))
            .ok_or_else(|| EtlError::rejected("Prix introuvable sur la page"))?;

        let raw = node.text.trim();
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
        let price: u64 = digits
            .parse()
            .map_err(|_| EtlError::rejected(format!("Prix illisible: {:?}", raw)))?;

        if price < min_price {
            return Err(EtlError::rejected(format!(
                "prix < {} ({})",
                min_price, price
            )));
        }
        Ok(price)
    }

    pub fn city(&self) -> Result<String> {
        let search = self.after_marker().unwrap_or(&self.texts);

        let candidates: Vec<String> = search
            .iter()
            .filter(|t| LOCATION_RE.is_match(t.text))
            .map(|t| clean_text(t.text))
            .filter(|txt| {
                !(txt.contains("http") || txt.contains("\"url\"") || txt.contains('{') || txt.contains('}'))
            })
            .filter(|txt| txt.matches(',').count() >= 3)
            .take(MAX_LOCATION_CANDIDATES)
            .collect();

        let location = candidates
            .iter()
            .min_by_key(|c| c.chars().count())
            .ok_or_else(|| EtlError::rejected("Localisation introuvable (donc ville introuvable)"))?;

        match location.rfind(", ") {
            Some(idx) if idx + 2 < location.len() => Ok(location[idx + 2..].trim().to_string()),
            _ => Err(EtlError::rejected(format!(
                "Format de localisation inattendu: {:?}",
                location
            ))),
        }
    }

    pub fn property_type(&self) -> Result<PropertyType> {
        let value = self
            .extract_value(&TYPE_LABEL)
            .ok_or_else(|| EtlError::rejected("Champ introuvable: Type"))?;
        clean_text(&value).parse()
    }

    pub fn surface(&self) -> Option<u32> {
        self.extract_value(&SURFACE_LABEL).and_then(|v| leading_number(&v))
    }

    pub fn rooms(&self) -> Option<u32> {
        self.extract_value(&ROOMS_LABEL).and_then(|v| leading_number(&v))
    }

    pub fn bedrooms(&self) -> Option<u32> {
        self.extract_value(&BEDROOMS_LABEL).and_then(|v| leading_number(&v))
    }

    pub fn bathrooms(&self) -> Option<u32> {
        self.extract_value(&BATHROOMS_LABEL).and_then(|v| leading_number(&v))
    }

    pub fn dpe(&self) -> Option<EnergyRating> {
        let raw = clean_text(&self.extract_value(&DPE_LABEL)?);
        if raw.is_empty() || raw == "-" {
            return None;
        }
        let letter = DPE_LETTER_RE
            .captures(&raw)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().chars().next())
            .and_then(EnergyRating::from_letter);
        if letter.is_none() {
            tracing::debug!("Unrecognised DPE value: {:?}", raw);
        }
        letter
    }

    /// 取得標籤對應的值：表格列 → 兄弟節點 → 後續文字
    fn extract_value(&self, label: &Label) -> Option<String> {
        let position = self
            .texts
            .iter()
            .position(|t| label.search.is_match(t.text) && is_within(t.parent, self.block))?;
        let label_tag = self.texts[position].parent;

        let row = label_tag
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|e| e.value().name() == "tr");
        if let Some(tr) = row {
            let cells: Vec<String> = tr
                .select(&CELL_SELECTOR)
                .map(|cell| clean_text(&element_text(cell)))
                .collect();
            let next_to_label = cells
                .iter()
                .enumerate()
                .find(|(i, cell)| label.full.is_match(cell) && i + 1 < cells.len())
                .map(|(i, _)| cells[i + 1].clone());
            if let Some(value) = next_to_label {
                return Some(value);
            }
            if let Some(value) = cells.iter().rev().find(|c| !c.is_empty()) {
                return Some(value.clone());
            }
        }

        if let Some(parent) = label_tag.parent().and_then(ElementRef::wrap) {
            let mut after_label = false;
            for child in parent.children() {
                if child.id() == label_tag.id() {
                    after_label = true;
                    continue;
                }
                if !after_label {
                    continue;
                }
                let text = if let Some(element) = ElementRef::wrap(child) {
                    clean_text(&element_text(element))
                } else if let Some(text) = child.value().as_text() {
                    clean_text(text)
                } else {
                    continue;
                };
                if !text.is_empty() && !label.full.is_match(&text) {
                    return Some(text);
                }
            }
        }

        let value = self.texts[position + 1..]
            .iter()
            .map(|t| clean_text(t.text))
            .find(|t| !t.is_empty() && !label.full.is_match(t));
        if value.is_none() {
            tracing::trace!("No value found for label {}", label.name);
        }
        value
    }
}

fn find_characteristics_block<'a>(texts: &[TextNode<'a>]) -> Option<ElementRef<'a>> {
    for title in BLOCK_TITLES.iter() {
        let Some(node) = texts.iter().find(|t| title.is_match(t.text)) else {
            continue;
        };

        let mut current = Some(node.parent);
        for _ in 0..BLOCK_MAX_DEPTH {
            let Some(tag) = current else {
                break;
            };
            let blob = clean_text(&element_text(tag)).to_lowercase();
            let score = BLOCK_KEYWORDS.iter().filter(|k| blob.contains(*k)).count();
            if score >= BLOCK_MIN_SCORE {
                return Some(tag);
            }
            current = tag.parent().and_then(ElementRef::wrap);
        }
    }
    None
}

/// Integer part of a characteristic value: `85,5 m²` gives 85, `1 200 m²`
/// gives 1200, `120 m2` gives 120, `-` gives nothing.
fn leading_number(value: &str) -> Option<u32> {
    let value = clean_text(value);
    if value.is_empty() || value == "-" {
        return None;
    }

    // 數字之間只容許空白 (千分位)，遇到其他字元即停止
    let mut digits = String::new();
    for c in value.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
        } else if digits.is_empty() || c.is_whitespace() {
            continue;
        } else {
            break;
        }
    }
    digits.parse().ok()
}
