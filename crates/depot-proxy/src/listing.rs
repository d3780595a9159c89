//! # Index Page Parsing
//!
//! Upstream repositories expose directories as HTML index pages (Apache
//! autoindex, Nexus, Artifactory). Only the anchors matter: each `href`
//! that names a direct child becomes one entry.
//!
//! Per anchor:
//! - empty hrefs and `../` are skipped;
//! - the URL path is taken (query and fragment dropped, absolute URLs
//!   reduced to their path) and percent-decoded;
//! - one leading `/` is stripped;
//! - a trailing `/` marks a directory and is stripped;
//! - anything still containing `/` is not a direct child and is skipped.

use std::borrow::Cow;

use scraper::{Html, Selector};
use url::Url;

/// One child named by an index page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexLink {
    /// Child name without a trailing slash.
    pub name: String,
    /// Whether the href ended in `/`.
    pub is_dir: bool,
}

/// Extract at most `limit` direct children from an index page.
pub fn parse_index(html: &str, limit: usize) -> Vec<IndexLink> {
    let Ok(anchors) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let document = Html::parse_document(html);

    let mut links = Vec::new();
    for anchor in document.select(&anchors) {
        if links.len() >= limit {
            break;
        }
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if let Some(link) = link_from_href(href) {
            links.push(link);
        }
    }
    links
}

fn link_from_href(href: &str) -> Option<IndexLink> {
    let href = href.trim();
    if href.is_empty() || href == "../" {
        return None;
    }

    let raw_path = match Url::parse(href) {
        Ok(url) => url.path().to_string(),
        Err(_) => href
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };
    let decoded = urlencoding::decode(&raw_path)
        .map(Cow::into_owned)
        .unwrap_or(raw_path);

    let path = decoded.trim();
    let path = path.strip_prefix('/').unwrap_or(path);
    let (name, is_dir) = match path.strip_suffix('/') {
        Some(name) => (name, true),
        None => (path, false),
    };
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        return None;
    }
    Some(IndexLink {
        name: name.to_string(),
        is_dir,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const AUTOINDEX: &str = r#"<html><head><title>Index of /maven2/com/acme</title></head>
<body><h1>Index of /maven2/com/acme</h1><pre>
<a href="../">../</a>
<a href="app/">app/</a>                 2024-01-01 10:00  -
<a href="lib%20core/">lib core/</a>     2024-01-01 10:00  -
<a href="maven-metadata.xml">maven-metadata.xml</a>   2024-01-01 10:00  321
<a href="maven-metadata.xml.sha1?x=1#frag">maven-metadata.xml.sha1</a>
<a href="">empty</a>
<a href="/maven2/com/">absolute parent</a>
<a href="https://repo.example.com/top/">absolute child</a>
</pre></body></html>"#;

    #[test]
    fn parses_autoindex_page() {
        let links = parse_index(AUTOINDEX, 100);
        assert_eq!(
            links,
            vec![
                IndexLink { name: "app".into(), is_dir: true },
                IndexLink { name: "lib core".into(), is_dir: true },
                IndexLink { name: "maven-metadata.xml".into(), is_dir: false },
                IndexLink { name: "maven-metadata.xml.sha1".into(), is_dir: false },
                IndexLink { name: "top".into(), is_dir: true },
            ]
        );
    }

    #[test]
    fn stops_at_limit() {
        let links = parse_index(AUTOINDEX, 2);
        assert_eq!(links.len(), 2);
        assert_eq!(links[1].name, "lib core");
    }

    #[test]
    fn page_without_anchors_is_empty() {
        assert!(parse_index("<html><body>nothing here</body></html>", 10).is_empty());
        assert!(parse_index("", 10).is_empty());
    }

    #[test]
    fn leading_slash_single_segment_is_kept() {
        assert_eq!(
            link_from_href("/file.jar"),
            Some(IndexLink { name: "file.jar".into(), is_dir: false })
        );
    }
}
