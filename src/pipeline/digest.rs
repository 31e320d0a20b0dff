// src/pipeline/digest.rs

//! Digest rendering: plain-text and HTML bodies for one delivery.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{DigestConfig, NoticePlacement};

use super::select::DeliveryItem;

/// A rendered message, ready for a mailer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Digest {
    pub subject: String,
    pub plain: String,
    pub html: String,
}

/// Render `items` into a digest dated `date`.
pub fn render_digest(
    items: &[DeliveryItem],
    caught_up: bool,
    config: &DigestConfig,
    date: NaiveDate,
) -> Digest {
    let subject = config.subject.replace("{date}", &date.format("%Y-%m-%d").to_string());
    let per_item = caught_up && config.caught_up_notice == NoticePlacement::PerItem;

    let mut plain = format!("{}\r\n\r\n", config.heading);
    let mut html = format!("<html><body><h2>{}</h2>", escape(&config.heading));

    for (index, item) in items.iter().enumerate() {
        let record = &item.record;
        let heading = format!("{} {}: {} ({})", config.item_label, index + 1, record.title, record.id);

        plain.push_str(&format!(
            "{heading}\r\nURL: {url}\r\nDate: {date}\r\n",
            url = record.url,
            date = record.date
        ));
        html.push_str(&format!(
            "<h3>{}</h3><p>URL: <a href=\"{url}\">{url}</a><br>Date: {}<br>",
            escape(&heading),
            escape(&record.date),
            url = escape(&record.url),
        ));

        if !item.previous.is_empty() {
            plain.push_str(&format!("Previous: {}\r\n", item.previous.join(" ")));
            let links: Vec<String> = item
                .previous
                .iter()
                .enumerate()
                .map(|(n, url)| format!("<a href=\"{}\">Part {}</a>", escape(url), n + 1))
                .collect();
            html.push_str(&format!("Previous: {}<br>", links.join(" ")));
        }

        if per_item {
            plain.push_str(&format!("{}\r\n", config.caught_up_message));
            html.push_str(&format!("{}<br>", escape(&config.caught_up_message)));
        }

        plain.push_str("\r\n");
        html.push_str("</p>");
    }

    if caught_up && config.caught_up_notice == NoticePlacement::Once {
        plain.push_str(&format!("{}\r\n", config.caught_up_message));
        html.push_str(&format!("<p>{}</p>", escape(&config.caught_up_message)));
    }

    html.push_str("</body></html>");

    Digest { subject, plain, html }
}

/// Minimal HTML escaping for text and quoted attribute values.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
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
