use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::constants::{
    CELLS_PER_ROW, MISSING_CAPACITY, MISSING_TEXT, NO_IMAGE, WIKITABLE_SELECTOR,
};
use crate::error::{PipelineError, Result};
use crate::pipeline::processing::text::{clean, strip_separators};
use crate::types::ExtractedStadium;

static TABLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(WIKITABLE_SELECTOR).expect("wikitable selector should be valid"));
static ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").expect("tr selector should be valid"));
static CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("td").expect("td selector should be valid"));
static IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img").expect("img selector should be valid"));

// Positional layout of a data row
const NAME: usize = 0;
const CAPACITY: usize = 1;
const CITY: usize = 2;
const COUNTRY: usize = 3;
const REGION: usize = 4;
const TENANTS: usize = 5;
const SPORTS: usize = 6;
const IMAGE: usize = 7;

/// Counters describing one extraction pass. Missing cells are parse defects: they are
/// replaced by defaults and reported here, never raised.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractStats {
    pub tables: usize,
    pub records: usize,
    pub rows_with_defaults: usize,
    pub missing_cells: usize,
}

/// Parses every wikitable on the page into one globally ranked list
pub struct TableExtractor {
    source: String,
}

impl TableExtractor {
    /// `source` is only used to label errors (usually the page URL)
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn extract(&self, html: &str) -> Result<Vec<ExtractedStadium>> {
        self.extract_with_stats(html).map(|(records, _)| records)
    }

    #[instrument(skip(self, html), fields(source = %self.source, bytes = html.len()))]
    pub fn extract_with_stats(&self, html: &str) -> Result<(Vec<ExtractedStadium>, ExtractStats)> {
        if html.trim().is_empty() {
            return Err(PipelineError::Fetch {
                url: self.source.clone(),
                reason: "page body is empty".to_string(),
            });
        }

        let document = Html::parse_document(html);
        let mut stats = ExtractStats::default();
        let mut records = Vec::new();
        let mut rank: u32 = 1;

        for table in document.select(&TABLE) {
            stats.tables += 1;
            // First row of every table is its header
            for row in table.select(&ROW).skip(1) {
                let cells: Vec<ElementRef> = row.select(&CELL).collect();
                let record = build_record(rank, &cells);

                let missing = CELLS_PER_ROW.saturating_sub(cells.len());
                if missing > 0 {
                    stats.rows_with_defaults += 1;
                    stats.missing_cells += missing;
                    debug!(rank, cells = cells.len(), "row short of cells; defaults substituted");
                }

                records.push(record);
                rank += 1;
            }
        }

        stats.records = records.len();
        ::metrics::counter!(crate::metrics::names::RECORDS_EXTRACTED).increment(records.len() as u64);
        ::metrics::counter!(crate::metrics::names::PARSE_DEFECTS).increment(stats.missing_cells as u64);
        info!(
            "Extracted {} records from {} tables ({} rows with defaults)",
            stats.records, stats.tables, stats.rows_with_defaults
        );

        Ok((records, stats))
    }
}

fn build_record(rank: u32, cells: &[ElementRef]) -> ExtractedStadium {
    let text = |idx: usize| {
        cells
            .get(idx)
            .map(|cell| clean(Some(cell_text(cell).as_str())))
            .unwrap_or_else(|| MISSING_TEXT.to_string())
    };

    let capacity = cells
        .get(CAPACITY)
        .map(|cell| strip_separators(&clean(Some(cell_text(cell).as_str()))))
        .unwrap_or_else(|| MISSING_CAPACITY.to_string());

    let image_url = cells
        .get(IMAGE)
        .and_then(image_src)
        .unwrap_or_else(|| NO_IMAGE.to_string());

    ExtractedStadium {
        rank,
        name: text(NAME),
        capacity,
        city: text(CITY),
        country: text(COUNTRY),
        region: text(REGION),
        tenants: text(TENANTS),
        sports: text(SPORTS),
        image_url,
    }
}

fn cell_text(cell: &ElementRef) -> String {
    cell.text().collect::<String>()
}

/// `src` of the first image in the cell; protocol-relative URLs become https.
fn image_src(cell: &ElementRef) -> Option<String> {
    let src = cell.select(&IMG).next()?.value().attr("src")?.trim();
    if src.is_empty() {
        return None;
    }
    Some(match src.strip_prefix("//") {
        Some(rest) => format!("https://{}", rest),
        None => src.to_string(),
    })
}
