//! Tile metadata document parsing.
//!
//! Documents are read into an index of element paths (local names joined by
//! `/`, namespace prefixes dropped) and fields are looked up by name against a
//! [`MetadataSchema`]. Every field lists alternative paths tried in order.

use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

use demscout_core::error::{Result, ScrapeError};
use demscout_core::models::{Crs, TileBox, TileMetadataRecord, YearSource};
use demscout_geo::reproject_box;

/// Named element paths for every field the parser reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataSchema {
    pub begin_date: Vec<String>,
    pub end_date: Vec<String>,
    pub download_url: Vec<String>,
    pub west: Vec<String>,
    pub south: Vec<String>,
    pub east: Vec<String>,
    pub north: Vec<String>,
    /// Frame the bounding coordinates are published in
    pub bounding_crs: Crs,
}

impl MetadataSchema {
    /// FGDC Content Standard for Digital Geospatial Metadata, as published
    /// for the National Map elevation products
    pub fn fgdc() -> Self {
        let paths = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let bounding = "metadata/idinfo/spdom/bounding";

        Self {
            begin_date: paths(&[
                "metadata/idinfo/timeperd/timeinfo/rngdates/begdate",
                "metadata/idinfo/timeperd/timeinfo/sngdate/caldate",
            ]),
            end_date: paths(&["metadata/idinfo/timeperd/timeinfo/rngdates/enddate"]),
            download_url: paths(&[
                "metadata/idinfo/citation/citeinfo/onlink",
                "metadata/distinfo/stdorder/digform/digtopt/onlinopt/computer/networka/networkr",
            ]),
            west: vec![format!("{}/westbc", bounding)],
            south: vec![format!("{}/southbc", bounding)],
            east: vec![format!("{}/eastbc", bounding)],
            north: vec![format!("{}/northbc", bounding)],
            bounding_crs: Crs::nad83(),
        }
    }
}

impl Default for MetadataSchema {
    fn default() -> Self {
        Self::fgdc()
    }
}

/// Turns raw metadata documents into tile records
#[derive(Debug, Clone)]
pub struct MetadataParser {
    schema: MetadataSchema,
    target_crs: Crs,
}

impl MetadataParser {
    pub fn new(schema: MetadataSchema, target_crs: Crs) -> Self {
        Self { schema, target_crs }
    }

    pub fn schema(&self) -> &MetadataSchema {
        &self.schema
    }

    /// Parse one metadata document.
    ///
    /// Fails with `MalformedDocument` when the XML is not well formed, the
    /// download URL or a bounding coordinate is missing, or a coordinate is
    /// not a number. Fails with `YearExtraction` when neither the document
    /// nor the identifier yields a year. The bounding box is read in the
    /// schema's frame and brought into the target CRS; a failed
    /// transformation is a `Projection` error.
    pub fn parse(&self, raw: &str) -> Result<TileMetadataRecord> {
        let doc = ElementIndex::build(raw)?;

        let source_url = doc.required("download_url", &self.schema.download_url)?.to_string();
        let identifier = identifier_from_url(&source_url)?;

        let west = doc.coordinate("westbc", &self.schema.west)?;
        let south = doc.coordinate("southbc", &self.schema.south)?;
        let east = doc.coordinate("eastbc", &self.schema.east)?;
        let north = doc.coordinate("northbc", &self.schema.north)?;

        let begin = doc.first(&self.schema.begin_date).and_then(year_prefix);
        let (begin_year, end_year, year_source) = match begin {
            Some(begin_year) => {
                let end_year = doc
                    .first(&self.schema.end_date)
                    .and_then(year_prefix)
                    .unwrap_or(begin_year);
                (begin_year, end_year, YearSource::Document)
            }
            None => {
                let year = year_from_identifier(&identifier).ok_or_else(|| {
                    ScrapeError::YearExtraction {
                        identifier: identifier.clone(),
                    }
                })?;
                tracing::debug!(identifier = %identifier, year, "Year recovered from identifier");
                (year, year, YearSource::Identifier)
            }
        };

        let native = TileBox::new(west, south, east, north, self.schema.bounding_crs.clone());
        let bounding_box = reproject_box(&native, &self.target_crs)?;

        Ok(TileMetadataRecord {
            identifier,
            source_url,
            begin_year,
            end_year,
            bounding_box,
            year_source,
        })
    }
}

impl Default for MetadataParser {
    fn default() -> Self {
        Self::new(MetadataSchema::fgdc(), Crs::nad83())
    }
}

/// Identifier of a tile: the last path segment of its download URL, cut at
/// the first `.`
pub fn identifier_from_url(url: &str) -> Result<String> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let segment = path.trim_end_matches('/').rsplit('/').next().unwrap_or_default();
    let identifier = segment.split('.').next().unwrap_or_default();

    if identifier.is_empty() {
        return Err(ScrapeError::MalformedDocument {
            field: "download_url".to_string(),
            reason: format!("no file name in '{}'", url),
        });
    }

    Ok(identifier.to_string())
}

/// First four consecutive digits in `identifier`, which may be the head of
/// a longer run such as a `20160415` date stamp
pub fn year_from_identifier(identifier: &str) -> Option<i32> {
    static YEAR: OnceLock<Option<Regex>> = OnceLock::new();
    let year = YEAR.get_or_init(|| Regex::new(r"[0-9]{4}").ok()).as_ref()?;

    year.find(identifier).and_then(|m| m.as_str().parse().ok())
}

/// Year from the first four characters of a date such as `20160415`
fn year_prefix(date: &str) -> Option<i32> {
    let prefix = date.get(..4)?;
    if prefix.bytes().all(|b| b.is_ascii_digit()) {
        prefix.parse().ok()
    } else {
        None
    }
}

/// Text content of every element, keyed by its local-name path.
/// The first occurrence of a path wins.
struct ElementIndex {
    values: HashMap<String, String>,
}

impl ElementIndex {
    fn build(raw: &str) -> Result<Self> {
        let mut reader = Reader::from_str(raw);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<String> = Vec::new();
        let mut values = HashMap::new();
        let mut saw_root = false;

        loop {
            match reader.read_event().map_err(xml_error)? {
                Event::Start(e) => {
                    stack.push(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
                    saw_root = true;
                }
                Event::Empty(_) => saw_root = true,
                Event::End(_) => {
                    stack.pop();
                }
                Event::Text(e) => {
                    if !stack.is_empty() {
                        let text = e.unescape().map_err(xml_error)?;
                        values.entry(stack.join("/")).or_insert_with(|| text.trim().to_string());
                    }
                }
                Event::CData(e) => {
                    if !stack.is_empty() {
                        let text = String::from_utf8_lossy(&e.into_inner()).trim().to_string();
                        values.entry(stack.join("/")).or_insert(text);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !saw_root {
            return Err(ScrapeError::MalformedDocument {
                field: "document".to_string(),
                reason: "no root element".to_string(),
            });
        }
        if let Some(open) = stack.last() {
            return Err(ScrapeError::MalformedDocument {
                field: "document".to_string(),
                reason: format!("unclosed element <{}>", open),
            });
        }

        Ok(Self { values })
    }

    fn first(&self, paths: &[String]) -> Option<&str> {
        paths
            .iter()
            .filter_map(|p| self.values.get(p))
            .map(String::as_str)
            .find(|v| !v.is_empty())
    }

    fn required(&self, field: &str, paths: &[String]) -> Result<&str> {
        self.first(paths).ok_or_else(|| ScrapeError::missing_field(field))
    }

    fn coordinate(&self, field: &str, paths: &[String]) -> Result<f64> {
        let raw = self.required(field, paths)?;
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| ScrapeError::MalformedDocument {
                field: field.to_string(),
                reason: format!("'{}' is not a number", raw),
            })
    }
}

fn xml_error(err: quick_xml::Error) -> ScrapeError {
    ScrapeError::MalformedDocument {
        field: "document".to_string(),
        reason: format!("invalid XML: {}", err),
    }
}
