//! Integration tests for file discovery and the multi-format loader.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use tempfile::TempDir;

use kb_ingest::loader::{FileLoader, LoadOptions, Loader, RunOutput, META_SOURCE_PATH};
use kb_ingest::models::RawDoc;

/// Minimal valid single-page PDF containing the given phrase. Body first,
/// then an xref with correct byte offsets so pdf-extract can parse it.
fn minimal_pdf_with_phrase(phrase: &str) -> Vec<u8> {
    let stream = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET\n", phrase);
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(
        format!(
            "4 0 obj << /Length {} >> stream\n{}endstream endobj\n",
            stream.len(),
            stream
        )
        .as_bytes(),
    );
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

/// Minimal docx (ZIP) whose word/document.xml carries one `<w:t>` run.
fn minimal_docx_with_phrase(phrase: &str) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body><w:p><w:r><w:t>{}</w:t></w:r></w:p></w:body></w:document>",
            phrase
        );
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}

fn setup_tree() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("docs");
    fs::create_dir_all(root.join("nested")).unwrap();
    fs::write(root.join("alpha.txt"), "alpha content").unwrap();
    fs::write(root.join("beta.md"), "# beta\n\nbody").unwrap();
    fs::write(root.join("nested/gamma.txt"), "gamma content").unwrap();
    fs::write(root.join("notes.xyz"), "unsupported").unwrap();
    fs::write(root.join("report.docx"), minimal_docx_with_phrase("docx body text")).unwrap();
    (tmp, root)
}

#[test]
fn discovery_is_sorted_and_deterministic() {
    let (_tmp, root) = setup_tree();
    let loader = FileLoader::default();

    let first = loader.discover_files(&root);
    let second = loader.discover_files(&root);
    assert_eq!(first, second);

    let mut sorted = first.clone();
    sorted.sort();
    assert_eq!(first, sorted);

    // .xyz never appears
    assert!(first
        .iter()
        .all(|p| p.extension().and_then(|e| e.to_str()) != Some("xyz")));
    assert_eq!(first.len(), 4);
}

#[test]
fn unsupported_extension_never_loaded() {
    let (_tmp, root) = setup_tree();
    let loader = FileLoader::default();

    let docs: Vec<RawDoc> = loader.load(vec![root.join("notes.xyz")], None).collect();
    assert!(docs.is_empty());
}

#[test]
fn load_yields_only_supported_files() {
    // E2E: one valid .txt and one .xyz → exactly the txt documents
    let (_tmp, root) = setup_tree();
    let loader = FileLoader::default();

    let docs: Vec<RawDoc> = loader
        .load(vec![root.join("alpha.txt"), root.join("notes.xyz")], None)
        .collect();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].text, "alpha content");
}

#[test]
fn one_bad_file_does_not_abort_the_batch() {
    let (_tmp, root) = setup_tree();
    // a .pdf whose backend parser will fail
    fs::write(root.join("broken.pdf"), b"not a pdf at all").unwrap();

    let loader = FileLoader::default();
    let docs: Vec<RawDoc> = loader
        .load(
            vec![
                root.join("alpha.txt"),
                root.join("broken.pdf"),
                root.join("nested/gamma.txt"),
            ],
            None,
        )
        .collect();

    let texts: Vec<&str> = docs.iter().map(|d| d.text.as_str()).collect();
    assert_eq!(texts, vec!["alpha content", "gamma content"]);
}

#[test]
fn whitespace_only_units_are_skipped() {
    let (_tmp, root) = setup_tree();
    fs::write(root.join("blank.txt"), "   \n\t\n  ").unwrap();

    let loader = FileLoader::default();
    let docs: Vec<RawDoc> = loader.load(vec![root.join("blank.txt")], None).collect();
    assert!(docs.is_empty());
}

#[test]
fn pdf_loads_one_doc_per_page_with_metadata() {
    let (_tmp, root) = setup_tree();
    let pdf_path = root.join("report.pdf");
    fs::write(&pdf_path, minimal_pdf_with_phrase("pdf page text")).unwrap();

    let loader = FileLoader::default();
    let docs: Vec<RawDoc> = loader.load(vec![pdf_path.clone()], None).collect();
    assert_eq!(docs.len(), 1);
    assert!(docs[0].text.contains("pdf page text"));
    assert_eq!(docs[0].metadata.get("page").and_then(|v| v.as_u64()), Some(0));
    assert_eq!(
        docs[0].metadata.get(META_SOURCE_PATH).and_then(|v| v.as_str()),
        Some(pdf_path.display().to_string().as_str())
    );
}

#[test]
fn docx_loads_extracted_text() {
    let (_tmp, root) = setup_tree();
    let loader = FileLoader::default();

    let docs: Vec<RawDoc> = loader.load(vec![root.join("report.docx")], None).collect();
    assert_eq!(docs.len(), 1);
    assert!(docs[0].text.contains("docx body text"));
}

#[test]
fn run_expands_directories_and_records_skips() {
    let (_tmp, root) = setup_tree();
    let loader = FileLoader::default();

    let ghost = root.join("ghost.txt");
    let report = loader
        .run(vec![root.clone(), ghost.clone()], None, None)
        .unwrap();
    assert_eq!(report.skipped, vec![ghost]);
    match report.output {
        RunOutput::Docs(docs) => assert_eq!(docs.count(), 4),
        RunOutput::Written(_) => panic!("no output dir was given"),
    }
}

#[test]
fn run_with_output_dir_writes_one_json_per_doc() {
    let (_tmp, root) = setup_tree();
    let out_dir = root.parent().unwrap().join("out");
    let loader = FileLoader::default();

    let report = loader
        .run(root.join("alpha.txt"), Some(&out_dir), None)
        .unwrap();
    let written = match report.output {
        RunOutput::Written(paths) => paths,
        RunOutput::Docs(_) => panic!("expected written paths"),
    };
    assert_eq!(written.len(), 1);

    let body = fs::read_to_string(&written[0]).unwrap();
    let doc: RawDoc = serde_json::from_str(&body).unwrap();
    assert_eq!(doc.text, "alpha content");
    assert!(doc.metadata.contains_key(META_SOURCE_PATH));

    // no temp leftovers
    let leftovers: Vec<_> = fs::read_dir(&out_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().map(|x| x == "tmp").unwrap_or(false))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn load_options_override_text_handling() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("latin1.txt");
    fs::write(&path, [0x63, 0x61, 0x66, 0xe9]).unwrap();

    let loader = FileLoader::default();
    let strict: Vec<RawDoc> = loader
        .load(
            vec![path.clone()],
            Some(LoadOptions {
                encoding: None,
                autodetect_encoding: Some(false),
            }),
        )
        .collect();
    assert!(strict.is_empty());

    let lenient: Vec<RawDoc> = loader.load(vec![path], None).collect();
    assert_eq!(lenient.len(), 1);
}
