//! Catalog export
//!
//! Items are normalized into [`ExportItem`] records, sorted by category
//! rank, then layer rank, then name, and rendered as one of three text
//! formats. The layouts are fixed: earlier exports must stay comparable
//! line for line.

use chrono::NaiveDate;
use icu_collator::{Collator, CollatorOptions};
use icu_locid::locale;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt::Write as _;
use std::str::FromStr;

use crate::error::Error;
use crate::models::Item;

const UNRANKED: u32 = 999;
const YAML_HEADER: &str = "# Wardrobe Export v1\n";
const TXT_TITLE: &str = "个人电子衣柜导出";
const TXT_UNNAMED: &str = "未命名";

/// One exported item. Optional fields that are absent, empty or (for
/// lists) have no elements are left out of every format.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ExportItem {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub item_id: String,
    #[serde(skip_serializing_if = "is_blank")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub category: String,
    #[serde(skip_serializing_if = "is_blank")]
    pub layer: Option<String>,
    #[serde(skip_serializing_if = "is_blank")]
    pub subcategory: Option<String>,
    #[serde(skip_serializing_if = "is_blank")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "is_blank")]
    pub color_secondary: Option<String>,
    #[serde(skip_serializing_if = "is_blank")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "is_blank")]
    pub season: Option<String>,
    #[serde(skip_serializing_if = "is_blank")]
    pub warmth_level: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub care: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub occasion_tags: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(skip_serializing_if = "is_blank")]
    pub notes: Option<String>,
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, str::is_empty)
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_deref().filter(|v| !v.is_empty()).map(str::to_string)
}

impl From<&Item> for ExportItem {
    // season, warmth_level, occasion_tags and notes have no stored column
    fn from(item: &Item) -> Self {
        Self {
            item_id: item.id.to_string(),
            name: non_empty(&item.name),
            category: item.category.as_str().to_string(),
            layer: item.layer.map(|layer| layer.as_str().to_string()),
            subcategory: non_empty(&item.subcategory),
            color: non_empty(&item.color_primary),
            color_secondary: non_empty(&item.color_secondary),
            size: non_empty(&item.size),
            season: None,
            warmth_level: None,
            care: item
                .care_tags
                .iter()
                .map(|tag| tag.trim())
                .filter(|tag| !tag.is_empty())
                .map(str::to_string)
                .collect(),
            occasion_tags: Vec::new(),
            status: item.status.as_str().to_string(),
            notes: None,
        }
    }
}

fn category_rank(category: &str) -> u32 {
    match category {
        "top" => 1,
        "bottom" => 2,
        "outer" => 3,
        "shoes" => 4,
        "socks" => 5,
        "accessory" => 6,
        _ => UNRANKED,
    }
}

fn layer_rank(layer: Option<&str>) -> u32 {
    match layer {
        Some("base") => 1,
        Some("mid") => 2,
        Some("outer") => 3,
        _ => UNRANKED,
    }
}

/// Names are ordered the way a zh-CN reader expects: Latin before Han,
/// accents with their base letter, Han by pinyin
fn name_collator() -> Option<Collator> {
    match Collator::try_new(&locale!("zh").into(), CollatorOptions::new()) {
        Ok(collator) => Some(collator),
        Err(e) => {
            tracing::warn!(error = ?e, "zh collation unavailable, sorting names by code point");
            None
        }
    }
}

fn compare(collator: Option<&Collator>, a: &ExportItem, b: &ExportItem) -> Ordering {
    category_rank(&a.category)
        .cmp(&category_rank(&b.category))
        .then_with(|| layer_rank(a.layer.as_deref()).cmp(&layer_rank(b.layer.as_deref())))
        .then_with(|| {
            let a = a.name.as_deref().unwrap_or("");
            let b = b.name.as_deref().unwrap_or("");
            match collator {
                Some(collator) => collator.compare(a, b),
                None => a.cmp(b),
            }
        })
}

/// Sort in export order; ties keep their input order
pub fn sort_items(items: &mut [ExportItem]) {
    let collator = name_collator();
    items.sort_by(|a, b| compare(collator.as_ref(), a, b));
}

/// Normalize and sort
pub fn prepare(items: &[Item]) -> Vec<ExportItem> {
    let mut records: Vec<ExportItem> = items.iter().map(ExportItem::from).collect();
    sort_items(&mut records);
    records
}

fn quoted_list(values: &[String]) -> String {
    values
        .iter()
        .map(|v| format!("\"{}\"", v))
        .collect::<Vec<_>>()
        .join(",")
}

/// YAML-flavored listing, one block per item
pub fn to_yaml_text(items: &[Item]) -> String {
    render_yaml(&prepare(items))
}

pub fn render_yaml(records: &[ExportItem]) -> String {
    let mut text = String::from(YAML_HEADER);

    for (index, item) in records.iter().enumerate() {
        if index > 0 {
            text.push('\n');
        }
        let _ = writeln!(text, "- item_id: {}", item.item_id);

        let optional = |text: &mut String, key: &str, value: &Option<String>| {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                let _ = writeln!(text, "  {}: {}", key, value);
            }
        };

        optional(&mut text, "name", &item.name);
        let _ = writeln!(text, "  category: {}", item.category);
        optional(&mut text, "layer", &item.layer);
        optional(&mut text, "subcategory", &item.subcategory);
        optional(&mut text, "color", &item.color);
        optional(&mut text, "color_secondary", &item.color_secondary);
        optional(&mut text, "size", &item.size);
        optional(&mut text, "season", &item.season);
        optional(&mut text, "warmth_level", &item.warmth_level);
        if !item.care.is_empty() {
            let _ = writeln!(text, "  care: [{}]", quoted_list(&item.care));
        }
        if !item.occasion_tags.is_empty() {
            let _ = writeln!(text, "  occasion_tags: [{}]", quoted_list(&item.occasion_tags));
        }
        let _ = writeln!(text, "  status: {}", item.status);
        optional(&mut text, "notes", &item.notes);
    }

    text
}

/// Pretty-printed JSON array
pub fn to_json(items: &[Item]) -> serde_json::Result<String> {
    render_json(&prepare(items))
}

pub fn render_json(records: &[ExportItem]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(records)
}

/// Plain-text report for reading or printing
pub fn to_txt(items: &[Item]) -> String {
    render_txt(&prepare(items))
}

pub fn render_txt(records: &[ExportItem]) -> String {
    let mut text = String::new();
    let _ = writeln!(text, "{}", TXT_TITLE);
    let _ = writeln!(text, "{}", "=".repeat(50));
    text.push('\n');

    for (index, item) in records.iter().enumerate() {
        let name = item.name.as_deref().filter(|n| !n.is_empty()).unwrap_or(TXT_UNNAMED);
        let _ = writeln!(text, "[{}] {}", index + 1, name);
        let _ = writeln!(text, "ID: {}", item.item_id);
        let _ = write!(text, "分类: {}", item.category);
        if let Some(layer) = non_empty(&item.layer) {
            let _ = write!(text, " / {}", layer);
        }
        text.push('\n');

        let color = non_empty(&item.color);
        let color_secondary = non_empty(&item.color_secondary);
        if let Some(color) = &color {
            let _ = write!(text, "颜色: {}", color);
        }
        if let Some(color_secondary) = &color_secondary {
            let _ = write!(text, " / {}", color_secondary);
        }
        if color.is_some() || color_secondary.is_some() {
            text.push('\n');
        }

        if let Some(size) = non_empty(&item.size) {
            let _ = writeln!(text, "尺码: {}", size);
        }
        if !item.care.is_empty() {
            let _ = writeln!(text, "洗涤: {}", item.care.join(", "));
        }
        let _ = writeln!(text, "状态: {}", item.status);
        if let Some(notes) = non_empty(&item.notes) {
            let _ = writeln!(text, "备注: {}", notes);
        }
        text.push('\n');
    }

    text
}

/// Output format of an export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Yaml,
    Json,
    Txt,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Yaml => "yaml",
            ExportFormat::Json => "json",
            ExportFormat::Txt => "txt",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Yaml => "text/yaml",
            ExportFormat::Json => "application/json",
            ExportFormat::Txt => "text/plain",
        }
    }

    pub fn render(&self, items: &[Item]) -> crate::Result<String> {
        let records = prepare(items);
        Ok(match self {
            ExportFormat::Yaml => render_yaml(&records),
            ExportFormat::Json => render_json(&records)?,
            ExportFormat::Txt => render_txt(&records),
        })
    }

    /// `wardrobe-export-YYYY-MM-DD.<ext>`
    pub fn default_file_name(&self, date: NaiveDate) -> String {
        format!("wardrobe-export-{}.{}", date.format("%Y-%m-%d"), self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Ok(ExportFormat::Yaml),
            "json" => Ok(ExportFormat::Json),
            "txt" | "text" => Ok(ExportFormat::Txt),
            other => Err(Error::validation(format!(
                "unknown export format {:?}, expected yaml, json or txt",
                other
            ))),
        }
    }
}
