use anyhow::{Result, anyhow};
use archive_core::config::{Config, ProjectPaths};
use archive_core::schema::{Material, MaterialKind, Meeting, MeetingMetadata, Speaker, Topic};
use archive_core::structured::{read_json_file, read_structured_xml, write_record};
use enrich::Fetch;
use enrich::batch::run_batch;
use enrich::images::process_images_file;
use enrich::materials::process_materials_file;
use enrich::record::EnrichSettings;
use enrich::verify::verify_record;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

const PAGE_URL: &str = "https://club.example.org/2021/04/april-meeting/";

#[derive(Default)]
struct FakeFetch {
    bodies: HashMap<String, Vec<u8>>,
    requests: RefCell<Vec<String>>,
}

impl FakeFetch {
    fn with(mut self, url: &str, body: &str) -> Self {
        self.bodies.insert(url.to_string(), body.as_bytes().to_vec());
        self
    }

    fn request_count(&self, url: &str) -> usize {
        self.requests.borrow().iter().filter(|seen| *seen == url).count()
    }
}

impl Fetch for FakeFetch {
    fn fetch(&self, url: &str, _timeout: Duration) -> Result<Vec<u8>> {
        self.requests.borrow_mut().push(url.to_string());
        self.bodies
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("HTTP 404 Not Found for {url}"))
    }
}

fn speaker(name: &str, photo_id: &str) -> Speaker {
    Speaker {
        name: name.to_string(),
        title: "Member".to_string(),
        photo_id: photo_id.to_string(),
        ..Speaker::default()
    }
}

fn meeting() -> Meeting {
    let mut first = Topic::new(1);
    first.speakers = vec![speaker("Grayson Roze", "501"), speaker("Gatis Roze", "502")];
    first.presentation.title = "Building a Trading System".to_string();
    first.materials = vec![
        Material::new(MaterialKind::Slides, "https://club.example.org/files/system.pdf", "Slides"),
        Material::new(MaterialKind::Recording, "https://youtu.be/abc", "Recording"),
    ];

    let mut second = Topic::new(2);
    second.speakers = vec![speaker("Ann Lee", "501")];
    second.presentation.title = "Options Basics".to_string();
    second.materials = vec![Material::new(
        MaterialKind::Slides,
        "https://docs.example.org/presentation/d/missing/",
        "Part 2 Slides",
    )];

    Meeting {
        metadata: MeetingMetadata {
            title: "April Meeting".to_string(),
            link: PAGE_URL.to_string(),
            post_id: "42".to_string(),
            post_name: "april-meeting".to_string(),
            ..MeetingMetadata::default()
        },
        topics: vec![first, second],
        ..Meeting::default()
    }
}

const PAGE: &str = r#"<html><body>
<h2>TOPIC 1</h2><h3>Building a Trading System</h3>
<div class="member"><img src="/wp-content/uploads/grayson-roze.jpg" class="wp-image-501"><h4>Grayson Roze</h4></div>
<div class="member"><img src="https://cdn.example.org/uploads/headshot-7.png" class="wp-image-502"><h4>Gatis Roze</h4></div>
<a href="https://youtu.be/abc">Recording</a>
<a href="https://club.example.org/files/system.pdf">Slides</a>
<h2>TOPIC 2</h2><h3>Options Basics</h3><p>Ann Lee</p>
</body></html>"#;

fn setup(dir: &Path) -> (ProjectPaths, EnrichSettings, std::path::PathBuf, std::path::PathBuf) {
    let config = Config::default();
    let paths = ProjectPaths::new(dir, &config.paths);
    paths.ensure().unwrap();
    let settings = EnrichSettings::new(&paths, &config);

    let json = paths.structured_json_dir.join("april-meeting-42.json");
    let xml = paths.xml_for_json(&json).unwrap();
    write_record(&meeting(), &json, Some(xml.as_path())).unwrap();
    (paths, settings, json, xml)
}

#[test]
fn speaker_photos_are_downloaded_once_per_photo_id() {
    let dir = tempfile::tempdir().unwrap();
    let (paths, settings, json, xml) = setup(dir.path());
    let fetcher = FakeFetch::default()
        .with(PAGE_URL, PAGE)
        .with("https://club.example.org/wp-content/uploads/grayson-roze.jpg", "jpeg-bytes")
        .with("https://cdn.example.org/uploads/headshot-7.png", "png-bytes");

    let counts = process_images_file(&json, Some(xml.as_path()), &fetcher, &settings).unwrap();
    assert_eq!(counts.downloaded, 2);
    assert_eq!(counts.failed, 0);
    assert_eq!(fetcher.request_count(PAGE_URL), 1);

    assert!(paths.images_dir.join("grayson-roze_501.jpg").exists());
    assert!(paths.images_dir.join("gatis-roze_502.png").exists());

    let updated = read_json_file(&json).unwrap();
    let photos: Vec<Option<&str>> = updated
        .topics
        .iter()
        .flat_map(|topic| &topic.speakers)
        .map(|speaker| speaker.photo_local_path.as_deref())
        .collect();
    assert_eq!(
        photos,
        vec![
            Some("assets/images/grayson-roze_501.jpg"),
            Some("assets/images/gatis-roze_502.png"),
            Some("assets/images/grayson-roze_501.jpg"),
        ]
    );
    assert_eq!(read_structured_xml(&xml).unwrap(), updated);
}

#[test]
fn failed_material_downloads_are_counted_and_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let (paths, settings, json, xml) = setup(dir.path());
    let fetcher = FakeFetch::default().with("https://club.example.org/files/system.pdf", "%PDF-1.4");

    let counts = process_materials_file(&json, Some(xml.as_path()), &fetcher, &settings).unwrap();
    assert_eq!(counts.downloaded, 1);
    assert_eq!(counts.failed, 1);
    assert!(paths.materials_dir.join("system.pdf").exists());

    let updated = read_structured_xml(&xml).unwrap();
    let first = &updated.topics[0].materials;
    assert_eq!(first[0].local_path.as_deref(), Some("assets/materials/system.pdf"));
    assert_eq!(first[1].local_path, None);
    assert_eq!(updated.topics[1].materials[0].local_path, None);
}

#[test]
fn batch_keeps_going_after_a_missing_page() {
    let dir = tempfile::tempdir().unwrap();
    let (_paths, settings, json, xml) = setup(dir.path());
    let fetcher = FakeFetch::default();

    let report = run_batch(&[json.clone()], Duration::ZERO, |path| {
        process_images_file(path, Some(xml.as_path()), &fetcher, &settings)
    });
    assert_eq!(report.processed_files, 0);
    assert_eq!(report.files[0].status, "error");
    assert!(report.files[0].error.as_deref().unwrap_or_default().contains("404"));
    assert_eq!(read_json_file(&json).unwrap(), meeting());
}

#[test]
fn verification_scores_live_page() {
    let dir = tempfile::tempdir().unwrap();
    let (_paths, settings, json, _xml) = setup(dir.path());
    let fetcher = FakeFetch::default().with(PAGE_URL, PAGE);

    let report = verify_record(&json, &fetcher, &settings.fetch).unwrap();
    assert!(report.topic_count_match);
    assert_eq!(report.page_topics, 2);
    assert!(report.topics.iter().all(|topic| topic.speakers_found));
    assert_eq!(report.topics[0].materials_score, 1.0);
    assert_eq!(report.topics[1].materials_score, 0.0);
    assert!(report.accuracy > 80.0 && report.accuracy < 100.0);
}
