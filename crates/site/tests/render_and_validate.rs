use archive_core::schema::{Material, MaterialKind, Meeting, MeetingMetadata, Speaker, Topic};
use archive_core::structured::write_record;
use site::{render_records, validate_dir};

fn record(post_name: &str, with_materials: bool) -> Meeting {
    let mut topic = Topic::new(1);
    topic.speakers.push(Speaker {
        name: "Gatis Roze".to_string(),
        title: "Author".to_string(),
        ..Speaker::default()
    });
    topic.presentation.title = "Tensile Trading".to_string();
    topic.presentation.description = "A disciplined approach to building a stock market process.".to_string();
    if with_materials {
        topic.materials.push(Material::new(
            MaterialKind::Recording,
            "https://youtu.be/abc",
            "Watch Recording",
        ));
    }
    Meeting {
        metadata: MeetingMetadata {
            title: format!("{post_name} ARCHIVE"),
            post_name: post_name.to_string(),
            post_date: "2022-02-02 10:00:00".to_string(),
            ..MeetingMetadata::default()
        },
        topics: vec![topic],
        ..Meeting::default()
    }
}

#[test]
fn rendered_pages_pass_validation() {
    let dir = tempfile::tempdir().unwrap();
    let json_dir = dir.path().join("json");
    let content_dir = dir.path().join("content");
    std::fs::create_dir_all(&json_dir).unwrap();

    let first = json_dir.join("first.json");
    let second = json_dir.join("second.json");
    let broken = json_dir.join("broken.json");
    write_record(&record("feb-2022", true), &first, None).unwrap();
    write_record(&record("mar-2022", false), &second, None).unwrap();
    std::fs::write(&broken, "{ not json").unwrap();

    let summary = render_records(&[first, second, broken], &content_dir).unwrap();
    assert_eq!(summary.written.len(), 2);
    assert_eq!(summary.failed, 1);
    assert!(content_dir.join("feb-2022.md").exists());

    let report = validate_dir(&content_dir).unwrap();
    assert_eq!(report.total_files, 2);
    assert_eq!(report.has_frontmatter, 2);
    assert_eq!(report.has_title, 2);
    assert_eq!(report.has_date, 2);
    assert_eq!(report.has_description, 2);
    assert_eq!(report.has_speakers, 2);
    assert_eq!(report.has_topics, 2);
    assert_eq!(report.has_materials, 1);
    assert!(report.issues.is_empty());
}
