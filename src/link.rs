/// Pagination relations parsed from a `Link` response header.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Links {
    pub first: Option<String>,
    pub prev: Option<String>,
    pub next: Option<String>,
    pub last: Option<String>,
}

impl Links {
    /// Parses a header of the form `<url>; rel="next", <url>; rel="last"`.
    ///
    /// Entries without a URL or a recognized `rel` are skipped. A `rel` may
    /// name several space-separated relations.
    pub fn parse(header: &str) -> Self {
        let mut links = Links::default();

        for entry in header.split(',') {
            let mut url = None;
            let mut rels = None;

            for segment in entry.split(';') {
                let segment = segment.trim();
                if let Some(inner) = segment
                    .strip_prefix('<')
                    .and_then(|rest| rest.strip_suffix('>'))
                {
                    url = Some(inner.trim());
                } else if let Some((key, value)) = segment.split_once('=') {
                    if key.trim().eq_ignore_ascii_case("rel") {
                        rels = Some(value.trim().trim_matches('"').trim_matches('\''));
                    }
                }
            }

            let (Some(url), Some(rels)) = (url, rels) else {
                continue;
            };
            for rel in rels.split_whitespace() {
                let slot = match rel.to_ascii_lowercase().as_str() {
                    "first" => &mut links.first,
                    "prev" | "previous" => &mut links.prev,
                    "next" => &mut links.next,
                    "last" => &mut links.last,
                    _ => continue,
                };
                if slot.is_none() {
                    *slot = Some(url.to_owned());
                }
            }
        }

        links
    }

    pub fn is_empty(&self) -> bool {
        self.first.is_none() && self.prev.is_none() && self.next.is_none() && self.last.is_none()
    }
}
