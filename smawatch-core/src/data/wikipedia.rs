//! S&P 500 constituents scraped from Wikipedia.
//!
//! Reads the `#constituents` table of the "List of S&P 500 companies" page:
//! column 0 symbol, 1 security, 2 GICS sector, 3 GICS sub-industry.
//! A page without that table, or a table with no parsable rows, is an error.

use super::provider::{ConstituentSource, DataError};
use super::universe::{Constituent, ConstituentList};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

pub const SP500_URL: &str = "https://en.wikipedia.org/wiki/List_of_S%26P_500_companies";

/// Wikipedia constituents scraper.
pub struct WikipediaConstituents {
    client: reqwest::blocking::Client,
}

impl WikipediaConstituents {
    pub fn new(timeout: std::time::Duration, user_agent: &str) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| DataError::SourceUnavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

fn selector(css: &str) -> Result<Selector, DataError> {
    Selector::parse(css)
        .map_err(|e| DataError::SourceUnavailable(format!("invalid selector '{css}': {e:?}")))
}

fn cell_text(cell: &ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

/// Parse the constituents table out of the page HTML.
pub fn parse_constituents_table(html: &str) -> Result<ConstituentList, DataError> {
    let document = Html::parse_document(html);
    let table_sel = selector("table#constituents")?;
    let row_sel = selector("tr")?;
    let cell_sel = selector("td")?;

    let table = document.select(&table_sel).next().ok_or_else(|| {
        DataError::SourceUnavailable("constituents table not found; page layout changed".into())
    })?;

    let mut constituents = Vec::new();
    for row in table.select(&row_sel) {
        let cells: Vec<ElementRef<'_>> = row.select(&cell_sel).collect();
        // Header rows use <th> only.
        if cells.len() < 4 {
            continue;
        }
        let ticker = cell_text(&cells[0]);
        if ticker.is_empty() {
            continue;
        }
        constituents.push(Constituent {
            ticker,
            company: cell_text(&cells[1]),
            sector: cell_text(&cells[2]),
            sub_industry: cell_text(&cells[3]),
        });
    }

    if constituents.is_empty() {
        return Err(DataError::SourceUnavailable(
            "constituents table has no data rows".into(),
        ));
    }

    Ok(ConstituentList::new(constituents))
}

impl ConstituentSource for WikipediaConstituents {
    fn name(&self) -> &str {
        "wikipedia"
    }

    fn fetch_constituents(&self) -> Result<ConstituentList, DataError> {
        debug!(url = SP500_URL, "requesting constituents page");
        let resp = self.client.get(SP500_URL).send().map_err(|e| {
            DataError::SourceUnavailable(format!("constituents request failed: {e}"))
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DataError::SourceUnavailable(format!(
                "HTTP {status} for constituents page"
            )));
        }

        let body = resp.text().map_err(|e| {
            DataError::SourceUnavailable(format!("failed to read constituents page: {e}"))
        })?;

        parse_constituents_table(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
    <html><body>
      <table class="wikitable" id="other"><tr><td>X</td><td>b</td><td>c</td><td>d</td></tr></table>
      <table class="wikitable sortable" id="constituents">
        <tbody>
          <tr><th>Symbol</th><th>Security</th><th>GICS Sector</th><th>GICS Sub-Industry</th><th>HQ</th></tr>
          <tr>
            <td><a href="/x">MMM</a>
            </td><td><a href="/3m">3M</a></td><td>Industrials</td><td>Industrial Conglomerates</td><td>Saint Paul</td>
          </tr>
          <tr><td>BRK.B</td><td>Berkshire Hathaway</td><td>Financials</td><td>Multi-Sector Holdings</td><td>Omaha</td></tr>
          <tr><td>ZTS</td><td>Zoetis</td><td>Health Care</td><td>Pharmaceuticals</td><td>Parsippany</td></tr>
        </tbody>
      </table>
    </body></html>
    "#;

    #[test]
    fn parses_rows_from_constituents_table_only() {
        let list = parse_constituents_table(PAGE).unwrap();
        assert_eq!(list.all_tickers(), vec!["MMM", "BRK.B", "ZTS"]);

        let mmm = list.get("MMM").unwrap();
        assert_eq!(mmm.company, "3M");
        assert_eq!(mmm.sector, "Industrials");
        assert_eq!(mmm.sub_industry, "Industrial Conglomerates");
    }

    #[test]
    fn missing_table_is_an_error_not_an_empty_list() {
        let err = parse_constituents_table("<html><body><p>moved</p></body></html>").unwrap_err();
        assert!(matches!(err, DataError::SourceUnavailable(_)));
    }

    #[test]
    fn table_without_data_rows_is_an_error() {
        let html = r#"<table id="constituents"><tr><th>Symbol</th></tr></table>"#;
        let err = parse_constituents_table(html).unwrap_err();
        assert_eq!(
            err,
            DataError::SourceUnavailable("constituents table has no data rows".into())
        );
    }
}
