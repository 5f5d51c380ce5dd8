//! Pure asset extraction from rendered HTML.
//!
//! No I/O happens here: the renderer hands over a DOM snapshot as text and
//! this module turns it into an ordered, deduplicated asset list. Parsing is
//! CPU-bound, so callers inside async contexts run it on a blocking thread.

use std::collections::HashMap;

use scraper::{Html, Selector};
use url::Url;

use crate::types::{Asset, AssetKind};

/// Extract the unique network assets referenced by a rendered page.
///
/// Scans URL-bearing structural tags in document order and dedupes by
/// absolute URL: the first discovery fixes an asset's position, the last
/// fixes its type. The base document itself is always part of the result,
/// typed [`AssetKind::HtmlDocument`]. Inline `data:` references and
/// candidates whose resolved URL has no host are dropped, not errored.
pub fn extract_assets(html: &str, base_url: &str) -> Vec<Asset> {
    let document = Html::parse_document(html);
    let sel = Selector::parse("link, script, img, iframe, source").unwrap();
    let base = Url::parse(base_url).ok();

    let mut assets: Vec<Asset> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for element in document.select(&sel) {
        let tag = element.value();
        let raw = tag
            .attr("href")
            .filter(|v| !v.is_empty())
            .or_else(|| tag.attr("src").filter(|v| !v.is_empty()));
        let Some(raw) = raw else { continue };
        if raw.starts_with("data:") {
            continue;
        }
        let Some(resolved) = resolve(base.as_ref(), raw) else {
            continue;
        };
        let Some(domain) = resolved.host_str().map(str::to_string) else {
            continue;
        };
        let kind = classify(tag.name(), tag.attr("rel"));
        upsert(&mut assets, &mut index, resolved.to_string(), domain, kind);
    }

    // The page itself is part of its own delivery footprint.
    if let Some(base) = base {
        if let Some(domain) = base.host_str().map(str::to_string) {
            upsert(
                &mut assets,
                &mut index,
                base.to_string(),
                domain,
                AssetKind::HtmlDocument,
            );
        }
    }

    assets
}

fn resolve(base: Option<&Url>, raw: &str) -> Option<Url> {
    match base {
        Some(base) => base.join(raw).ok(),
        None => Url::parse(raw).ok(),
    }
}

fn classify(tag: &str, rel: Option<&str>) -> AssetKind {
    match tag {
        "link" if has_rel_token(rel, "stylesheet") => AssetKind::Stylesheet,
        "script" => AssetKind::Script,
        "img" | "source" => AssetKind::ImageMedia,
        "iframe" => AssetKind::Iframe,
        _ => AssetKind::Other,
    }
}

fn has_rel_token(rel: Option<&str>, token: &str) -> bool {
    rel.is_some_and(|r| r.split_whitespace().any(|t| t == token))
}

fn upsert(
    assets: &mut Vec<Asset>,
    index: &mut HashMap<String, usize>,
    url: String,
    domain: String,
    kind: AssetKind,
) {
    match index.get(&url) {
        Some(&i) => assets[i].kind = kind,
        None => {
            index.insert(url.clone(), assets.len());
            assets.push(Asset::new(url, domain, kind));
        }
    }
}
