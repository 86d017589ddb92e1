//! Built-in renderer tests: change detection against the destination file.

use topogen_core::config::Config;
use topogen_core::context::{Context, DockerImage, RuntimeContainer};
use topogen_daemon::render::ContextDumpRenderer;
use topogen_engine::TemplateRenderer;

fn sample_context(container_name: &str) -> Context {
    Context {
        containers: vec![RuntimeContainer {
            id: "abc123def456".to_owned(),
            name: container_name.to_owned(),
            image: DockerImage::parse("nginx:1.27"),
            ..Default::default()
        }],
        ..Default::default()
    }
}

fn dest_config(dest: &std::path::Path) -> Config {
    Config {
        dest: dest.display().to_string(),
        ..Default::default()
    }
}

#[test]
fn test_first_render_writes_and_reports_changed() {
    // Given: No existing destination file
    let dir = tempfile::tempdir().expect("should create tempdir");
    let dest = dir.path().join("out.json");

    // When: Rendering
    let changed = ContextDumpRenderer.generate_file(&dest_config(&dest), &sample_context("web"));

    // Then: The artifact exists and counts as changed
    assert!(changed, "first render should report a change");
    let written = std::fs::read_to_string(&dest).expect("artifact should exist");
    assert!(written.contains("\"name\": \"web\""));
}

#[test]
fn test_identical_rerender_reports_unchanged() {
    let dir = tempfile::tempdir().expect("should create tempdir");
    let dest = dir.path().join("out.json");
    let config = dest_config(&dest);
    let ctx = sample_context("web");

    assert!(ContextDumpRenderer.generate_file(&config, &ctx));
    // Same context again: bytes match, no change reported.
    assert!(!ContextDumpRenderer.generate_file(&config, &ctx));
}

#[test]
fn test_content_change_reports_changed_and_rewrites() {
    let dir = tempfile::tempdir().expect("should create tempdir");
    let dest = dir.path().join("out.json");
    let config = dest_config(&dest);

    assert!(ContextDumpRenderer.generate_file(&config, &sample_context("web")));
    assert!(ContextDumpRenderer.generate_file(&config, &sample_context("db")));

    let written = std::fs::read_to_string(&dest).expect("artifact should exist");
    assert!(written.contains("\"name\": \"db\""));
    assert!(!written.contains("\"name\": \"web\""));
}

#[test]
fn test_empty_dest_renders_to_stdout_as_changed() {
    // Stdout mode has no previous bytes to compare against.
    let config = Config::default();
    assert!(ContextDumpRenderer.generate_file(&config, &sample_context("web")));
}
