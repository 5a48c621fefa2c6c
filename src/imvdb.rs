use crate::config::Config;
use crate::error::{Error, Result};
use crate::sync::VideoCatalog;
use async_trait::async_trait;
use reqwest::{Client, Url};
use scraper::{ElementRef, Html, Selector};

const WATCH_BASE: &str = "https://www.youtube.com/watch?v=";

/// One row of an artist's videography.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoEntry {
    pub imvdb_url: String,
    pub video_name: String,
}

// ---------------------------------------------------------------------------
// Name normalization
// ---------------------------------------------------------------------------

/// Put a space in front of every parenthesis run that is glued to the
/// preceding word: `Song(Remix)` -> `Song (Remix)`.
pub fn normalize_video_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev: Option<char> = None;
    for c in name.chars() {
        if c == '(' {
            if let Some(p) = prev {
                if !p.is_whitespace() && p != '(' {
                    out.push(' ');
                }
            }
        }
        out.push(c);
        prev = Some(c);
    }
    out
}

// ---------------------------------------------------------------------------
// Page parsing
// ---------------------------------------------------------------------------

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::Parse(format!("selector '{}': {:?}", css, e)))
}

/// Text of an element with every text node trimmed and glued together.
fn stripped_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Extract (video page, name) pairs from an artist's videography page.
pub fn parse_videography(html: &str, base_url: &str) -> Result<Vec<VideoEntry>> {
    let base = Url::parse(base_url)
        .map_err(|e| Error::Parse(format!("base url '{}': {}", base_url, e)))?;
    let document = Html::parse_document(html);

    let credits_sel = selector("div#artist-credits")?;
    let table_sel = selector("table")?;
    let row_sel = selector("tr")?;
    let link_sel = selector("a[href]")?;
    let cell_sel = selector("td")?;

    let credits = document
        .select(&credits_sel)
        .next()
        .ok_or_else(|| Error::Parse("'artist-credits' section not found".to_string()))?;
    let table = credits
        .select(&table_sel)
        .next()
        .ok_or_else(|| Error::Parse("no <table> inside 'artist-credits'".to_string()))?;

    let mut entries = Vec::new();
    for row in table.select(&row_sel) {
        let Some(href) = row
            .select(&link_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
        else {
            continue;
        };

        let imvdb_url = if href.starts_with("http") {
            href.to_string()
        } else {
            match base.join(href) {
                Ok(u) => u.to_string(),
                Err(_) => continue,
            }
        };

        let Some(name_cell) = row.select(&cell_sel).nth(1) else {
            continue;
        };

        entries.push(VideoEntry {
            imvdb_url,
            video_name: normalize_video_name(&stripped_text(name_cell)),
        });
    }

    Ok(entries)
}

/// Parse a possibly protocol-relative link.
fn parse_loose(raw: &str) -> Option<Url> {
    if raw.starts_with("//") {
        Url::parse(&format!("https:{}", raw)).ok()
    } else {
        Url::parse(raw).ok()
    }
}

fn query_video_id(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == "v")
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

/// Video id from an embed src: `/embed/{id}` or `?v={id}`.
pub fn embed_video_id(src: &str) -> Option<String> {
    let url = parse_loose(src)?;
    if url.path().contains("embed") {
        url.path_segments()?
            .filter(|s| !s.is_empty())
            .last()
            .filter(|s| *s != "embed")
            .map(str::to_string)
    } else {
        query_video_id(&url)
    }
}

pub fn canonical_watch_link(video_id: &str) -> String {
    format!("{}{}", WATCH_BASE, video_id)
}

/// Find the streaming link on a single video page: the embedded player
/// first, then any direct watch link.
pub fn parse_watch_link(html: &str) -> Result<Option<String>> {
    let document = Html::parse_document(html);
    let iframe_sel = selector("iframe[src]")?;
    let anchor_sel = selector("a[href]")?;

    let embedded = document
        .select(&iframe_sel)
        .filter_map(|e| e.value().attr("src"))
        .find(|src| src.contains("youtube.com"));
    if let Some(id) = embedded.and_then(embed_video_id) {
        return Ok(Some(canonical_watch_link(&id)));
    }

    let direct = document
        .select(&anchor_sel)
        .filter_map(|e| e.value().attr("href"))
        .find(|href| href.contains("youtube.com/watch"));
    if let Some(id) = direct.and_then(parse_loose).as_ref().and_then(query_video_id) {
        return Ok(Some(canonical_watch_link(&id)));
    }

    Ok(None)
}

// ---------------------------------------------------------------------------
// IMVDb client
// ---------------------------------------------------------------------------

pub struct ImvdbClient {
    client: Client,
    base_url: String,
}

impl ImvdbClient {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            base_url: config.imvdb_url.clone(),
        }
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(resp.text().await?)
    }
}

#[async_trait]
impl VideoCatalog for ImvdbClient {
    async fn videography(&self, artist_url: &str) -> Result<Vec<VideoEntry>> {
        let html = self.fetch_page(artist_url).await?;
        parse_videography(&html, &self.base_url)
    }

    async fn watch_link(&self, video_url: &str) -> Result<Option<String>> {
        let html = self.fetch_page(video_url).await?;
        parse_watch_link(&html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIDEOGRAPHY: &str = r#"
        <html><body>
          <div id="other"><table><tr><td><a href="/video/wrong/one">x</a></td><td>Wrong</td></tr></table></div>
          <div id="artist-credits">
            <h3>Videography</h3>
            <table class="imvdbTable">
              <tr><th>Thumb</th><th>Title</th></tr>
              <tr>
                <td><a href="/video/radiohead/karma-police"><img src="k.jpg"></a></td>
                <td><a href="/video/radiohead/karma-police">Karma Police</a> <span>(1997)</span></td>
              </tr>
              <tr>
                <td><a href="https://imvdb.com/video/radiohead/creep">c</a></td>
                <td>Creep(Acoustic)</td>
              </tr>
              <tr>
                <td>no link here</td>
                <td>Skipped</td>
              </tr>
              <tr>
                <td><a href="/video/radiohead/lonely">only one cell</a></td>
              </tr>
            </table>
          </div>
        </body></html>
    "#;

    #[test]
    fn test_normalize_video_name() {
        assert_eq!(normalize_video_name("Song(Remix)"), "Song (Remix)");
        assert_eq!(normalize_video_name("Song (Remix)"), "Song (Remix)");
        assert_eq!(normalize_video_name("Song((Live))"), "Song ((Live))");
        assert_eq!(normalize_video_name("(Intro)"), "(Intro)");
        assert_eq!(
            normalize_video_name("A(B) C(D)"),
            "A (B) C (D)"
        );
        assert_eq!(normalize_video_name("No Parens"), "No Parens");
    }

    #[test]
    fn test_parse_videography() {
        let entries = parse_videography(VIDEOGRAPHY, "https://imvdb.com").unwrap();
        assert_eq!(
            entries,
            vec![
                VideoEntry {
                    imvdb_url: "https://imvdb.com/video/radiohead/karma-police".to_string(),
                    video_name: "Karma Police (1997)".to_string(),
                },
                VideoEntry {
                    imvdb_url: "https://imvdb.com/video/radiohead/creep".to_string(),
                    video_name: "Creep (Acoustic)".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_parse_videography_missing_section() {
        let result = parse_videography("<html><body><table></table></body></html>", "https://imvdb.com");
        assert!(matches!(result, Err(Error::Parse(_))));

        let no_table = parse_videography(
            r#"<div id="artist-credits"><p>Nothing yet</p></div>"#,
            "https://imvdb.com",
        );
        assert!(matches!(no_table, Err(Error::Parse(_))));
    }

    #[test]
    fn test_watch_link_from_embed() {
        let html = r#"<div class="player">
            <iframe src="https://www.youtube.com/embed/1uYWYWPc9HU?rel=0&autoplay=1"></iframe>
        </div>"#;
        assert_eq!(
            parse_watch_link(html).unwrap().as_deref(),
            Some("https://www.youtube.com/watch?v=1uYWYWPc9HU")
        );
    }

    #[test]
    fn test_watch_link_from_protocol_relative_embed() {
        let html = r#"<iframe src="https://player.vimeo.com/video/1"></iframe>
            <iframe src="//www.youtube.com/embed/XFkzRNyygfk"></iframe>"#;
        assert_eq!(
            parse_watch_link(html).unwrap().as_deref(),
            Some("https://www.youtube.com/watch?v=XFkzRNyygfk")
        );
    }

    #[test]
    fn test_watch_link_from_direct_anchor() {
        let html = r#"<p><a href="https://www.youtube.com/channel/abc">channel</a>
            <a href="https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ">Watch</a></p>"#;
        assert_eq!(
            parse_watch_link(html).unwrap().as_deref(),
            Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
        );
    }

    #[test]
    fn test_watch_link_absent() {
        let html = r#"<iframe src="https://www.youtube.com/watch"></iframe><a href="/video/x">x</a>"#;
        assert_eq!(parse_watch_link(html).unwrap(), None);
    }

    #[test]
    fn test_embed_video_id() {
        assert_eq!(
            embed_video_id("https://www.youtube.com/embed/abc123/").as_deref(),
            Some("abc123")
        );
        assert_eq!(
            embed_video_id("https://www.youtube.com/v/x?v=q1").as_deref(),
            Some("q1")
        );
        assert_eq!(embed_video_id("not a url"), None);
        assert_eq!(embed_video_id("https://www.youtube.com/embed/"), None);
        assert_eq!(embed_video_id("//www.youtube.com/embed"), None);
    }

    #[test]
    fn test_empty_embed_falls_back_to_direct_anchor() {
        let html = r#"<iframe src="https://www.youtube.com/embed/"></iframe>
            <a href="https://www.youtube.com/watch?v=kXYiU_JCYtU">Watch on YouTube</a>"#;
        assert_eq!(
            parse_watch_link(html).unwrap().as_deref(),
            Some("https://www.youtube.com/watch?v=kXYiU_JCYtU")
        );

        let no_anchor = r#"<iframe src="https://www.youtube.com/embed/"></iframe>"#;
        assert_eq!(parse_watch_link(no_anchor).unwrap(), None);
    }
}
