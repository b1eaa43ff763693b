use std::borrow::Cow;

/// Element spellings servers actually use for `DAV:href`
const HREF_TAGS: [(&str, &str); 3] = [
    ("<D:href>", "</D:href>"),
    ("<d:href>", "</d:href>"),
    ("<href>", "</href>"),
];

/// One `href` from a multistatus body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Href {
    /// Path as sent by the server (still percent-encoded), host stripped
    pub raw: String,
    /// Percent-decoded path
    pub path: String,
}

impl Href {
    pub fn is_collection(&self) -> bool {
        self.path.ends_with('/')
    }

    pub fn trimmed(&self) -> &str {
        let trimmed = self.path.trim_end_matches('/');
        if trimmed.is_empty() {
            "/"
        } else {
            trimmed
        }
    }
}

/// Pulls every href out of a PROPFIND multistatus body, in document order.
///
/// This is a text scan, not an XML parse: only the three common spellings of
/// the element are recognised and entity references other than `&amp;` are
/// left alone.
pub fn extract_hrefs(body: &str) -> Vec<Href> {
    let mut found: Vec<(usize, Href)> = Vec::new();
    for (open, close) in HREF_TAGS {
        let mut cursor = 0;
        while let Some(start) = body[cursor..].find(open) {
            let value_start = cursor + start + open.len();
            let Some(len) = body[value_start..].find(close) else {
                break;
            };
            let value = body[value_start..value_start + len].trim();
            if !value.is_empty() {
                found.push((value_start, normalize(value)));
            }
            cursor = value_start + len + close.len();
        }
    }
    found.sort_by_key(|(position, _)| *position);
    found.into_iter().map(|(_, href)| href).collect()
}

fn normalize(value: &str) -> Href {
    let value = value.replace("&amp;", "&");
    let raw = strip_origin(&value).to_string();
    let path = urlencoding::decode(&raw)
        .unwrap_or_else(|_| Cow::Borrowed(&raw))
        .into_owned();
    Href { raw, path }
}

/// `https://host:port/a/b` becomes `/a/b`; relative hrefs pass through.
fn strip_origin(href: &str) -> &str {
    match href.find("://") {
        Some(index) => {
            let after = &href[index + 3..];
            match after.find('/') {
                Some(slash) => &after[slash..],
                None => "/",
            }
        }
        None => href,
    }
}
