//! End-to-end discovery tests against an in-memory metadata service

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use demscout_core::layout::WorkDirLayout;
use demscout_core::models::{Candidate, Crs};
use demscout_core::ports::{InMemorySource, RemoteSource};
use demscout_core::store::TileStore;
use demscout_core::Result;
use demscout_discovery::{CachePolicy, CandidateIndex, FilterEngine, MetadataParser};
use demscout_geo::AoiGeometry;

const LISTING: &str = "https://example.gov/metadata/img/";

fn document(year: &str, identifier: &str, bounds: (f64, f64, f64, f64)) -> String {
    let (west, south, east, north) = bounds;
    format!(
        r#"<metadata>
  <idinfo>
    <citation><citeinfo><onlink>https://example.gov/elev/{identifier}.img.zip</onlink></citeinfo></citation>
    <timeperd><timeinfo><rngdates><begdate>{year}0101</begdate><enddate>{year}1231</enddate></rngdates></timeinfo></timeperd>
    <spdom><bounding>
      <westbc>{west}</westbc><eastbc>{east}</eastbc><northbc>{north}</northbc><southbc>{south}</southbc>
    </bounding></spdom>
  </idinfo>
</metadata>"#
    )
}

/// Listing page plus the three scenario documents
fn scenario_source() -> InMemorySource {
    let page = r#"<html><body>
<a href="a.xml">a.xml</a>
<a href="b.xml">b.xml</a>
<a href="c.xml">c.xml</a>
</body></html>"#;

    InMemorySource::new()
        .with_text(LISTING, page)
        .with_text(
            format!("{}a.xml", LISTING),
            document("2016", "ca_3dep_2016", (-119.5, 35.5, -118.5, 36.5)),
        )
        .with_text(
            format!("{}b.xml", LISTING),
            document("2018", "nv_far_2018", (-110.0, 40.0, -109.0, 41.0)),
        )
        .with_text(
            format!("{}c.xml", LISTING),
            document("2010", "ca_old_2010", (-119.8, 35.2, -119.2, 35.8)),
        )
}

fn aoi() -> Arc<AoiGeometry> {
    let polygon = demscout_geo::dissolve(vec![geo::Geometry::Rect(geo::Rect::new(
        (-120.0, 35.0),
        (-119.0, 36.0),
    ))])
    .unwrap();
    Arc::new(AoiGeometry::from_polygons(polygon, Crs::nad83()).unwrap())
}

fn prepare(dir: &Path) -> (WorkDirLayout, TileStore, CandidateIndex) {
    let layout = WorkDirLayout::new(dir);
    layout.ensure().unwrap();
    let store = TileStore::new(&layout.records_dir, &layout.geometry_dir);
    let index = CandidateIndex::new(&layout.index_cache, ".xml");
    (layout, store, index)
}

#[tokio::test]
async fn test_end_to_end_accepts_only_recent_intersecting_tile() {
    let dir = TempDir::new().unwrap();
    let (layout, store, index) = prepare(dir.path());
    let source = scenario_source();

    let candidates = index.list(&source, LISTING, CachePolicy::PreferCache).await.unwrap();
    assert_eq!(candidates.len(), 3);

    let engine = FilterEngine::new(source, MetadataParser::default(), store.clone(), aoi(), 60);
    let summary = engine.run(candidates, 2015).await;

    assert_eq!(summary.total, 3);
    assert_eq!(summary.accepted.len(), 1);
    assert_eq!(summary.accepted[0].identifier, "ca_3dep_2016");
    assert_eq!(summary.outside_aoi, 1);
    assert_eq!(summary.before_threshold, 1);
    assert!(summary.failures.is_empty());

    let rows = store.read_rows().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].source_url, "https://example.gov/elev/ca_3dep_2016.img.zip");
    assert!(layout.geometry_dir.join("ca_3dep_2016.geojson").exists());
    assert!(!layout.records_dir.join("nv_far_2018.csv").exists());
    assert!(!layout.records_dir.join("ca_old_2010.csv").exists());
}

#[tokio::test]
async fn test_malformed_document_does_not_stop_batch() {
    let dir = TempDir::new().unwrap();
    let (_layout, store, _index) = prepare(dir.path());

    let broken = document("2020", "broken_2020", (-119.5, 35.5, -118.5, 36.5))
        .replace("<northbc>36.5</northbc>", "");
    let source = scenario_source().with_text(format!("{}d.xml", LISTING), broken);

    let candidates = ["a.xml", "b.xml", "c.xml", "d.xml"]
        .iter()
        .map(|name| Candidate::new(format!("{}{}", LISTING, name)))
        .collect();

    let engine = FilterEngine::new(source, MetadataParser::default(), store.clone(), aoi(), 4);
    let summary = engine.run(candidates, 2015).await;

    assert_eq!(summary.total, 4);
    assert_eq!(summary.accepted.len(), 1);
    assert_eq!(summary.failures.len(), 1);
    assert!(summary.failures[0].url.ends_with("d.xml"));
    assert!(summary.failures[0].error.contains("northbc"));
    assert_eq!(store.read_rows().unwrap().len(), 1);
}

#[tokio::test]
async fn test_rerun_uses_cache_without_listing() {
    let dir = TempDir::new().unwrap();
    let (_layout, store, index) = prepare(dir.path());

    let first_source = scenario_source();
    let candidates = index.list(&first_source, LISTING, CachePolicy::PreferCache).await.unwrap();
    let first = FilterEngine::new(first_source, MetadataParser::default(), store.clone(), aoi(), 8)
        .run(candidates, 2015)
        .await;

    let second_source = scenario_source();
    let candidates = index.list(&second_source, LISTING, CachePolicy::PreferCache).await.unwrap();
    let engine = FilterEngine::new(second_source, MetadataParser::default(), store.clone(), aoi(), 8);
    let second = engine.run(candidates, 2015).await;

    assert_eq!(engine.source().hits(LISTING), 0);
    let ids = |s: &demscout_discovery::DiscoverySummary| {
        s.accepted.iter().map(|r| r.identifier.clone()).collect::<Vec<_>>()
    };
    assert_eq!(ids(&first), ids(&second));
    assert_eq!(store.read_rows().unwrap().len(), 1);
}

/// Delays each document by an amount derived from its URL so completion
/// order differs from submission order
struct JitterSource(InMemorySource);

#[async_trait]
impl RemoteSource for JitterSource {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        let delay = url.bytes().map(u64::from).sum::<u64>() % 7;
        tokio::time::sleep(Duration::from_millis(delay)).await;
        self.0.fetch_text(url).await
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        self.0.download(url, dest).await
    }
}

/// Two dozen documents alternating inside/outside the AOI and
/// before/after the threshold
fn mixed_documents() -> Vec<(String, String)> {
    (0..24)
        .map(|i| {
            let url = format!("{}tile_{}.xml", LISTING, i);
            let west = if i % 3 == 0 { -100.0 } else { -119.9 + (i as f64) * 0.01 };
            let year = if i % 4 == 0 { "2012" } else { "2019" };
            let body = document(year, &format!("tile_{}_{}", i, year), (west, 35.1, west + 0.5, 35.6));
            (url, body)
        })
        .collect()
}

#[tokio::test]
async fn test_accepted_set_independent_of_worker_count() {
    let documents = mixed_documents();
    let candidates: Vec<Candidate> = documents.iter().map(|(url, _)| Candidate::new(url.clone())).collect();

    let mut accepted_sets = Vec::new();
    for workers in [1, 3, 60] {
        let dir = TempDir::new().unwrap();
        let (_layout, store, _index) = prepare(dir.path());
        let source = documents
            .iter()
            .fold(InMemorySource::new(), |acc, (url, body)| acc.with_text(url.clone(), body.clone()));

        let summary = FilterEngine::new(JitterSource(source), MetadataParser::default(), store, aoi(), workers)
            .run(candidates.clone(), 2015)
            .await;

        let ids: Vec<String> = summary.accepted.into_iter().map(|r| r.identifier).collect();
        accepted_sets.push(ids);
    }

    assert!(!accepted_sets[0].is_empty());
    assert_eq!(accepted_sets[0], accepted_sets[1]);
    assert_eq!(accepted_sets[1], accepted_sets[2]);
}
