//! NexusPHP sites (`torrents.php` / `details.php` / `download.php`).

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

use super::helpers::{element_text, is_count, parse_count, parse_date, parse_size, query_param};
use super::{parse_detail_page, selector, DetailLayout, ParserKind, ParserStrategy, SiteContext, TorrentDetail};
use crate::searcher::{TorrentResult, UploadDate};

static ROW: Lazy<Selector> = Lazy::new(|| selector("tr"));
static DETAILS_LINK: Lazy<Selector> = Lazy::new(|| selector("a[href*='details.php?id=']"));
static DOWNLOAD_LINK: Lazy<Selector> = Lazy::new(|| selector("a[href*='download.php?id=']"));
static MAGNET_LINK: Lazy<Selector> = Lazy::new(|| selector("a[href^='magnet:']"));
static TITLED_SPAN: Lazy<Selector> = Lazy::new(|| selector("span[title]"));
static CATEGORY_IMG: Lazy<Selector> = Lazy::new(|| selector("img[alt], img[title]"));
static FREE: Lazy<Selector> = Lazy::new(|| {
    selector("img.pro_free, img.pro_free2up, img[alt='Free'], img[alt='免费'], font.free")
});
static HALF_FREE: Lazy<Selector> = Lazy::new(|| {
    selector("img.pro_50pctdown, img.pro_50pctdown2up, img[alt='50%'], font.halfdown")
});
static HIT_AND_RUN: Lazy<Selector> =
    Lazy::new(|| selector("img.hitandrun, img[alt='H&R'], img[title='H&R'], span.hitandrun"));

const DETAIL_LAYOUT: DetailLayout = DetailLayout {
    title: "h1, div.title, div#title",
    description: "div#kdescr, div.description, div#description",
    download: "a[href*='download.php?id=']",
    uploader: "a[href*='userdetails.php?id=']",
    category: "span.category, div.category",
};

#[derive(Debug, Clone)]
pub struct NexusPhpParser {
    ctx: SiteContext,
}

impl NexusPhpParser {
    pub fn new(ctx: SiteContext) -> Self {
        Self { ctx }
    }

    fn parse_row(&self, row: ElementRef<'_>) -> Option<TorrentResult> {
        let cells = direct_cells(row);

        let title_link = pick_title_link(row.select(&DETAILS_LINK))?;
        let title = title_link
            .value()
            .attr("title")
            .map(str::to_string)
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| element_text(title_link));
        let details_href = title_link.value().attr("href").unwrap_or_default();

        let mut result = TorrentResult::new(title, &self.ctx.site);
        result.details_url = self.ctx.url(details_href);
        result.torrent_id = query_param(details_href, "id");
        result.torrent_url = row
            .select(&DOWNLOAD_LINK)
            .filter_map(|a| a.value().attr("href"))
            .find_map(|href| self.ctx.url(href))
            .or_else(|| result.details_url.clone());
        result.magnet_link = row
            .select(&MAGNET_LINK)
            .filter_map(|a| a.value().attr("href"))
            .map(str::to_string)
            .next();

        result.category = cells.first().and_then(|cell| {
            cell.select(&CATEGORY_IMG)
                .filter_map(|img| img.value().attr("title").or(img.value().attr("alt")))
                .map(str::trim)
                .find(|s| !s.is_empty())
                .map(str::to_string)
        });

        let title_idx = cells
            .iter()
            .position(|c| c.select(&DETAILS_LINK).next().is_some())
            .unwrap_or(0);
        let size_idx = cells.iter().enumerate().skip(title_idx + 1).find_map(|(i, c)| {
            let text = element_text(*c);
            (text.len() < 24 && parse_size(&text) > 0.0).then_some(i)
        });
        if let Some(i) = size_idx {
            result.size_gb = parse_size(&element_text(cells[i]));
        }

        let mut counts = cells
            .iter()
            .skip(size_idx.unwrap_or(title_idx) + 1)
            .map(|c| element_text(*c))
            .filter(|t| is_count(t))
            .filter_map(|t| parse_count(&t));
        result.seeders = counts.next().unwrap_or(0);
        result.leechers = counts.next().unwrap_or(0);

        result.upload_date = cells
            .iter()
            .skip(title_idx + 1)
            .take(size_idx.map_or(cells.len(), |i| i - title_idx))
            .find_map(|c| cell_date(*c));

        result.is_free = row.select(&FREE).next().is_some();
        result.is_half_free = !result.is_free && row.select(&HALF_FREE).next().is_some();
        result.is_hr = row.select(&HIT_AND_RUN).next().is_some()
            || element_text(row).contains("H&R");

        self.ctx.finish(result)
    }
}

impl ParserStrategy for NexusPhpParser {
    fn kind(&self) -> ParserKind {
        ParserKind::NexusPhp
    }

    fn parse_search_results(&self, html: &str) -> Vec<TorrentResult> {
        let doc = Html::parse_document(html);
        doc.select(&ROW)
            .filter(|row| is_outer_row(*row))
            .filter_map(|row| self.parse_row(row))
            .collect()
    }

    fn parse_detail(&self, html: &str) -> TorrentDetail {
        parse_detail_page(&self.ctx, &DETAIL_LAYOUT, html)
    }
}

/// Result rows embed a nested `torrentname` table; only the outermost row
/// of each listing is parsed.
pub(crate) fn is_outer_row(row: ElementRef<'_>) -> bool {
    !row
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|el| el.value().name() == "tr")
}

pub(crate) fn direct_cells(row: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "td")
        .collect()
}

/// The listing link carries the full name in `title`; other links to the
/// same page (comment counters, thumbnails) do not.
fn pick_title_link<'a>(links: impl Iterator<Item = ElementRef<'a>>) -> Option<ElementRef<'a>> {
    let links: Vec<_> = links.collect();
    links
        .iter()
        .find(|a| a.value().attr("title").is_some_and(|t| !t.trim().is_empty()))
        .or_else(|| links.iter().max_by_key(|a| element_text(**a).chars().count()))
        .copied()
        .filter(|a| {
            a.value().attr("title").is_some_and(|t| !t.trim().is_empty())
                || !element_text(*a).is_empty()
        })
}

fn cell_date(cell: ElementRef<'_>) -> Option<UploadDate> {
    let parsed = |text: &str| match parse_date(text) {
        Some(d @ UploadDate::Parsed(_)) => Some(d),
        _ => None,
    };
    cell.select(&TITLED_SPAN)
        .filter_map(|s| s.value().attr("title"))
        .find_map(parsed)
        .or_else(|| parsed(&element_text(cell)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    const PAGE: &str = r#"
<html><body>
<table class="torrents">
  <tr>
    <td class="colhead">Type</td><td class="colhead">Name</td><td class="colhead">C</td>
    <td class="colhead">Added</td><td class="colhead">Size</td><td class="colhead">S</td>
    <td class="colhead">L</td><td class="colhead">Done</td>
  </tr>
  <tr>
    <td class="rowfollow"><a href="?cat=401"><img class="c_movie" alt="Movies" src="x.png"></a></td>
    <td class="rowfollow">
      <table class="torrentname"><tr>
        <td class="embedded"><a href="details.php?id=1001&amp;hit=1" title="Some.Movie.2023.1080p.BluRay.x264-GRP"><b>Some.Movie.2023.1080p...</b></a>
          <img class="pro_free" src="pic/trans.gif" alt="Free">
          <img class="hitandrun" src="pic/trans.gif" alt="H&amp;R">
        </td>
        <td class="embedded"><a href="download.php?id=1001"><img class="download" alt="download"></a></td>
      </tr></table>
    </td>
    <td class="rowfollow"><a href="details.php?id=1001&amp;hit=1&amp;cmtpage=1#startcomments">3</a></td>
    <td class="rowfollow nowrap"><span title="2024-01-05 10:30:00">2天前</span></td>
    <td class="rowfollow">10.5<br>GB</td>
    <td class="rowfollow"><b><a href="details.php?id=1001&amp;dllist=1#seeders">128</a></b></td>
    <td class="rowfollow">7</td>
    <td class="rowfollow">1,024</td>
  </tr>
  <tr>
    <td class="rowfollow"><img alt="TV Series" src="y.png"></td>
    <td class="rowfollow">
      <table class="torrentname"><tr>
        <td class="embedded"><a href="details.php?id=1002" title="Show S01E01-E10 2160p WEB-DL"><b>Show</b></a>
          <img class="pro_50pctdown" src="pic/trans.gif" alt="50%">
        </td>
        <td class="embedded"><a href="download.php?id=1002">DL</a></td>
      </tr></table>
    </td>
    <td class="rowfollow">0</td>
    <td class="rowfollow"><span title="bad date">?</span></td>
    <td class="rowfollow">700 MB</td>
    <td class="rowfollow">5</td>
    <td class="rowfollow">0</td>
    <td class="rowfollow">12</td>
  </tr>
  <tr>
    <td class="rowfollow"></td>
    <td class="rowfollow">no links in this row</td>
  </tr>
</table>
</body></html>
"#;

    fn parser() -> NexusPhpParser {
        NexusPhpParser::new(SiteContext::new("nexus-site", "https://pt.example.org/"))
    }

    #[test]
    fn test_parse_search_results() {
        let results = parser().parse_search_results(PAGE);
        assert_eq!(results.len(), 2);

        let first = &results[0];
        assert_eq!(first.title, "Some.Movie.2023.1080p.BluRay.x264-GRP");
        assert_eq!(first.site, "nexus-site");
        assert_eq!(first.torrent_id.as_deref(), Some("1001"));
        assert_eq!(
            first.torrent_url.as_deref(),
            Some("https://pt.example.org/download.php?id=1001")
        );
        assert_eq!(
            first.details_url.as_deref(),
            Some("https://pt.example.org/details.php?id=1001&hit=1")
        );
        assert!((first.size_gb - 10.5).abs() < 1e-9);
        assert_eq!(first.seeders, 128);
        assert_eq!(first.leechers, 7);
        assert_eq!(first.category.as_deref(), Some("Movies"));
        assert_eq!(first.resolution.as_deref(), Some("1080p"));
        assert!(first.is_free);
        assert!(first.is_hr);
        assert_eq!(
            first.upload_date,
            Some(UploadDate::Parsed(
                Utc.with_ymd_and_hms(2024, 1, 5, 10, 30, 0).unwrap()
            ))
        );
    }

    #[test]
    fn test_promo_and_missing_date() {
        let results = parser().parse_search_results(PAGE);
        let second = &results[1];
        assert_eq!(second.title, "Show S01E01-E10 2160p WEB-DL");
        assert!(second.is_half_free);
        assert!(!second.is_free);
        assert!(!second.is_hr);
        assert!((second.size_gb - 700.0 / 1024.0).abs() < 1e-9);
        assert_eq!(second.seeders, 5);
        assert_eq!(second.leechers, 0);
        assert_eq!(second.upload_date, None);
    }

    #[test]
    fn test_absurd_relative_date_keeps_row() {
        let html = r#"
<table class="torrents">
  <tr>
    <td class="rowfollow">
      <table class="torrentname"><tr>
        <td class="embedded"><a href="details.php?id=77" title="Old.Film.1999.720p.HDTV"><b>Old</b></a></td>
        <td class="embedded"><a href="download.php?id=77">DL</a></td>
      </tr></table>
    </td>
    <td class="rowfollow">0</td>
    <td class="rowfollow">999999999 days ago</td>
    <td class="rowfollow">1.4 GB</td>
    <td class="rowfollow">9</td>
    <td class="rowfollow">1</td>
    <td class="rowfollow">30</td>
  </tr>
</table>
"#;
        let results = parser().parse_search_results(html);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Old.Film.1999.720p.HDTV");
        assert_eq!(results[0].upload_date, None);
    }

    #[test]
    fn test_unrelated_page_yields_nothing() {
        assert!(parser()
            .parse_search_results("<html><body><p>Login required</p></body></html>")
            .is_empty());
        assert!(parser().parse_search_results("").is_empty());
    }

    #[test]
    fn test_parse_detail() {
        let html = r#"
<html><body>
<h1 id="top">Some.Movie.2023.1080p.BluRay.x264-GRP</h1>
<table>
<tr><td>Size:</td><td>10.5 GB</td></tr>
<tr><td>Seeders: 12</td><td>Leechers: 3</td></tr>
<tr><td><a href="userdetails.php?id=7">uploader1</a></td></tr>
<tr><td><a href="download.php?id=1001&amp;passkey=x">Download</a></td></tr>
</table>
<div id="kdescr">A fine release.</div>
</body></html>
"#;
        let detail = parser().parse_detail(html);
        assert_eq!(
            detail.title.as_deref(),
            Some("Some.Movie.2023.1080p.BluRay.x264-GRP")
        );
        assert_eq!(detail.description.as_deref(), Some("A fine release."));
        assert_eq!(detail.seeders, Some(12));
        assert_eq!(detail.leechers, Some(3));
        assert_eq!(detail.uploader.as_deref(), Some("uploader1"));
        assert!((detail.size_gb.unwrap() - 10.5).abs() < 1e-9);
        assert_eq!(
            detail.torrent_url.as_deref(),
            Some("https://pt.example.org/download.php?id=1001&passkey=x")
        );
        assert_eq!(detail.magnet_link, None);
    }
}
