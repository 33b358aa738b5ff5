//! HTML extraction for portal result pages
//!
//! Pure transformation from a result page's HTML to normalized
//! announcement records plus pagination metadata. No I/O happens here, so
//! selector maintenance never touches fetch, state, or storage code.
//!
//! Failure policy: a page with no recognizable results table raises a
//! structural error and halts the run — writing an empty page when the
//! markup changed would silently truncate the dataset. A single field the
//! selectors cannot find only leaves that field empty.

use crate::records::{AnnouncementRecord, Attachment, Lot, PageResult};
use crate::{HarvestError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Extracts all announcements and pagination metadata from one result page
///
/// `requested_page` is only a fallback for the current page number when
/// the pager chrome does not echo one back.
///
/// # Errors
///
/// [`HarvestError::PageStructure`] when the repeating results-table
/// structure cannot be located at all. Field-level gaps never error.
pub fn extract(html: &str, base_url: &Url, requested_page: u32) -> Result<PageResult> {
    let document = Html::parse_document(html);

    let table = find_results_table(&document).ok_or_else(|| {
        HarvestError::PageStructure("no results table (table.table-results) in page".to_string())
    })?;

    let mut records = Vec::new();
    if let Ok(row_selector) = Selector::parse("tr") {
        for row in table.select(&row_selector) {
            if let Some(record) = extract_announcement(row, base_url) {
                records.push(record);
            }
        }
    }

    let (current_page, total_pages, has_next_page) = extract_pagination(&document, requested_page);

    Ok(PageResult {
        records,
        current_page,
        total_pages,
        has_next_page,
    })
}

fn find_results_table<'a>(document: &'a Html) -> Option<ElementRef<'a>> {
    let selector = Selector::parse("table.table-results").ok()?;
    document.select(&selector).next()
}

/// Reads the pager chrome: current page, total pages, next-page affordance
///
/// All three come from the page chrome, never from the record count — a
/// short page near the end of the result set is normal.
fn extract_pagination(document: &Html, requested_page: u32) -> (u32, Option<u32>, bool) {
    let current_page = hidden_input_value(document, r#"input[name$="numPageTop"]"#)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(requested_page);

    let total_pages = hidden_input_value(document, r#"input[name$="nombrePageTop"]"#)
        .and_then(|v| v.trim().parse().ok());

    let has_next_page = Selector::parse(r#"a[title="Page suivante"]"#)
        .map(|sel| document.select(&sel).next().is_some())
        .unwrap_or(false);

    (current_page, total_pages, has_next_page)
}

fn hidden_input_value(document: &Html, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|input| input.value().attr("value"))
        .map(str::to_string)
}

/// Extracts a single announcement from a result-table row
///
/// Returns `None` for rows that are not announcement rows (header rows,
/// pager rows) and for rows where no reference can be recovered — the
/// reference is the upsert key, a record without one cannot be stored.
fn extract_announcement(row: ElementRef, base_url: &Url) -> Option<AnnouncementRecord> {
    let cell_ref = cell(row, "cons_ref");
    let cell_intitule = cell(row, "cons_intitule");
    let cell_lieu = cell(row, "cons_lieuExe");
    let cell_date_end = cell(row, "cons_dateEnd");

    // Not an announcement row at all
    cell_ref.or(cell_intitule)?;

    let reference = extract_reference(row, cell_intitule)?;
    let mut record = AnnouncementRecord::with_reference(reference);

    if let Some(cell) = cell_ref {
        record.procedure = extract_procedure(cell);
        record.categorie = panel_text(cell, "panelBlocCategorie", None);
        record.date_publication = parse_date(&text_of(cell));
    }

    if let Some(cell) = cell_intitule {
        record.objet = panel_text(cell, "panelBlocObjet", Some("Objet"));
        record.acheteur_public = panel_text(cell, "panelBlocDenomination", Some("Acheteur public"));
    }

    if let Some(cell) = cell_lieu {
        record.lots = extract_lots(cell);
        record.lieu_execution = extract_lieu_execution(cell);
    }

    if let Some(cell) = cell_date_end {
        record.date_limite = parse_date_time(&text_of(cell));
    }

    record.pieces_jointes = extract_attachments(row, base_url);
    record.lien_de_consultation = extract_consultation_link(row, cell_lieu, base_url);

    Some(record)
}

/// Finds the `td` of a row addressed by its `headers` attribute
fn cell<'a>(row: ElementRef<'a>, headers: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(&format!(r#"td[headers="{}"]"#, headers)).ok()?;
    row.select(&selector).next()
}

/// The reference comes from the visible `span.ref`; some row variants only
/// carry it in a hidden `refCons` input
fn extract_reference(row: ElementRef, cell_intitule: Option<ElementRef>) -> Option<String> {
    if let Some(cell) = cell_intitule {
        if let Ok(selector) = Selector::parse("span.ref") {
            if let Some(span) = cell.select(&selector).next() {
                let reference = collapse_whitespace(&text_of(span));
                if !reference.is_empty() {
                    return Some(reference);
                }
            }
        }
    }

    let selector = Selector::parse(r#"input[id*="refCons"]"#).ok()?;
    row.select(&selector)
        .next()
        .and_then(|input| input.value().attr("value"))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Procedure code from the info-bubble line, falling back to the first
/// uppercase code in the cell text (AO, AOO, ...)
fn extract_procedure(cell_ref: ElementRef) -> Option<String> {
    if let Ok(selector) = Selector::parse(r#"div[class*="line-info-bulle"]"#) {
        if let Some(div) = cell_ref.select(&selector).next() {
            if let Some(first) = text_of(div).split_whitespace().next() {
                return Some(first.to_string());
            }
        }
    }

    let code = Regex::new(r"\b([A-Z]{2,4})\b").ok()?;
    code.captures(&text_of(cell_ref))
        .map(|c| c[1].to_string())
}

/// Text of a `panelBloc*` div, with an optional leading label stripped
/// ("Objet :", "Acheteur public :")
fn panel_text(cell: ElementRef, panel_id: &str, label: Option<&str>) -> Option<String> {
    let selector = Selector::parse(&format!(r#"div[id*="{}"]"#, panel_id)).ok()?;
    let div = cell.select(&selector).next()?;
    let mut text = collapse_whitespace(&text_of(div));

    if let Some(label) = label {
        if let Ok(prefix) = Regex::new(&format!(r"(?i)^\s*{}\s*:?\s*", label)) {
            text = prefix.replace(&text, "").to_string();
        }
    }

    Some(text).filter(|t| !t.is_empty())
}

/// Lots from the lots panel when present, one entry per list item;
/// otherwise the lieu cell's first span, which older markup used as a
/// single lots summary ("3 lots", "Lot unique")
fn extract_lots(cell_lieu: ElementRef) -> Vec<Lot> {
    if let Ok(selector) = Selector::parse(r#"div[id*="panelBlocLots"] li"#) {
        let lots: Vec<Lot> = cell_lieu
            .select(&selector)
            .map(|li| collapse_whitespace(&text_of(li)))
            .filter(|label| !label.is_empty())
            .map(|label| Lot { label })
            .collect();
        if !lots.is_empty() {
            return lots;
        }
    }

    if let Ok(selector) = Selector::parse("span") {
        if let Some(span) = cell_lieu.select(&selector).next() {
            let label = collapse_whitespace(&text_of(span));
            if !label.is_empty() && label != "-" {
                return vec![Lot { label }];
            }
        }
    }

    Vec::new()
}

/// Execution locations from the direct text nodes of the lieux panel,
/// skipping the nested info-bubble which repeats the same names
fn extract_lieu_execution(cell_lieu: ElementRef) -> Option<String> {
    let selector = Selector::parse(r#"div[id*="panelBlocLieuxExec"]"#).ok()?;
    let panel = cell_lieu.select(&selector).next()?;

    let direct: Vec<String> = panel
        .children()
        .filter_map(|node| node.value().as_text())
        .map(|text| collapse_whitespace(text))
        .filter(|text| !text.is_empty())
        .collect();

    if !direct.is_empty() {
        return Some(direct.join(", "));
    }

    let fallback: Vec<String> = text_of(panel)
        .lines()
        .map(|line| collapse_whitespace(line))
        .filter(|line| !line.is_empty() && !line.starts_with("..."))
        .collect();

    Some(fallback.join(" ")).filter(|t| !t.is_empty())
}

/// Attachment links: anchors pointing at documents, resolved to absolute
/// URLs against the page base
fn extract_attachments(row: ElementRef, base_url: &Url) -> Vec<Attachment> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut attachments = Vec::new();
    for anchor in row.select(&selector) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let lower = href.to_lowercase();
        if !lower.contains(".pdf") && !lower.contains("download") && !lower.contains("pieces") {
            continue;
        }
        let Ok(absolute) = base_url.join(href) else {
            continue;
        };

        let mut label = collapse_whitespace(&text_of(anchor));
        if label.is_empty() {
            label = absolute
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .unwrap_or("piece-jointe")
                .to_string();
        }

        attachments.push(Attachment {
            label,
            url: absolute.to_string(),
        });
    }
    attachments
}

/// Consultation link: the popUp anchor in the lieu cell, else any
/// refConsultation anchor in the row
fn extract_consultation_link(
    row: ElementRef,
    cell_lieu: Option<ElementRef>,
    base_url: &Url,
) -> Option<String> {
    if let Some(cell) = cell_lieu {
        if let Ok(selector) = Selector::parse(r#"a[href*="popUp"]"#) {
            if let Some(anchor) = cell.select(&selector).next() {
                if let Some(href) = anchor.value().attr("href") {
                    return normalize_popup_link(href, base_url);
                }
            }
        }
    }

    let selector = Selector::parse(r#"a[href*="refConsultation"]"#).ok()?;
    let anchor = row.select(&selector).next()?;
    normalize_popup_link(anchor.value().attr("href")?, base_url)
}

/// Converts a `javascript:popUp('...')` href into an absolute URL
///
/// The portal wraps consultation links in a popup helper; the inner URL
/// comes in several relative spellings (`/index.php?...`, `index.php?...`,
/// `?page=...`, bare `page=...`), all resolved against the portal origin.
pub fn normalize_popup_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    if href.starts_with("http") {
        return Some(href.to_string());
    }

    let inner = Regex::new(r"popUp\(\s*'([^']+)'")
        .ok()
        .and_then(|re| re.captures(href).map(|c| c[1].to_string()));

    let target = match inner {
        Some(inner) => inner,
        None => href.to_string(),
    };

    let relative = if target.starts_with('/')
        || target.starts_with("index.php")
        || target.starts_with('?')
        || target.starts_with("http")
    {
        target
    } else {
        // Bare query fragments like "page=entreprise.EntrepriseDetail&id=7"
        format!("index.php?{}", target)
    };

    base_url.join(&relative).ok().map(|url| url.to_string())
}

/// Finds `DD/MM/YYYY` anywhere in the text and returns the calendar date
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let re = Regex::new(r"(\d{1,2}/\d{1,2}/\d{4})").ok()?;
    let date = re.captures(text)?;
    NaiveDate::parse_from_str(&date[1], "%d/%m/%Y").ok()
}

/// Finds `DD/MM/YYYY` with an optional `HH:MM` and returns a timestamp,
/// midnight when the time is absent
pub fn parse_date_time(text: &str) -> Option<NaiveDateTime> {
    let re = Regex::new(r"(\d{1,2}/\d{1,2}/\d{4})(?:\s+(\d{1,2}:\d{2}))?").ok()?;
    let captures = re.captures(text)?;

    let date = NaiveDate::parse_from_str(&captures[1], "%d/%m/%Y").ok()?;
    let time = match captures.get(2) {
        Some(time) => chrono::NaiveTime::parse_from_str(time.as_str(), "%H:%M").ok()?,
        None => chrono::NaiveTime::MIN,
    };
    Some(date.and_time(time))
}

fn text_of(element: ElementRef) -> String {
    element.text().collect::<String>()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
