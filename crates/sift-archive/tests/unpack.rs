use std::io::{Cursor, Write};
use std::path::Path;

use sift_archive::{
    ArchiveFormat, DiagnosticCode, Error, Severity, TarCompress, UnpackOptions, UnpackReport,
    unpack,
};
use tempfile::tempdir;

enum Item<'a> {
    File(&'a str, &'a [u8]),
    Symlink(&'a str, &'a str),
    Hardlink(&'a str, &'a str),
    Device(&'a str),
}

/// Writes names byte-for-byte so that hostile paths survive into the archive.
fn tar_bytes(items: &[Item<'_>]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for item in items {
        let mut header = tar::Header::new_gnu();
        let empty: &[u8] = &[];
        let (name, data, entry_type, link) = match *item {
            Item::File(name, data) => (name, data, tar::EntryType::Regular, None),
            Item::Symlink(name, target) => (name, empty, tar::EntryType::Symlink, Some(target)),
            Item::Hardlink(name, target) => (name, empty, tar::EntryType::Link, Some(target)),
            Item::Device(name) => (name, empty, tar::EntryType::Char, None),
        };
        {
            let old = header.as_old_mut();
            old.name[..name.len()].copy_from_slice(name.as_bytes());
            if let Some(link) = link {
                old.linkname[..link.len()].copy_from_slice(link.as_bytes());
            }
        }
        header.set_entry_type(entry_type);
        header.set_size(data.len() as u64);
        header.set_mode(0o777);
        header.set_cksum();
        builder.append(&header, data).unwrap();
    }
    builder.into_inner().unwrap()
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut enc = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

fn bzip(data: &[u8]) -> Vec<u8> {
    let mut enc = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

fn tgz(items: &[Item<'_>]) -> Vec<u8> {
    gzip(&tar_bytes(items))
}

fn run(bytes: Vec<u8>, scratch: &Path, options: &UnpackOptions) -> UnpackReport {
    unpack(Cursor::new(bytes), scratch, options).unwrap()
}

fn paths(report: &UnpackReport) -> Vec<&str> {
    report.files.iter().map(|f| f.path.as_str()).collect()
}

fn codes(report: &UnpackReport) -> Vec<(Severity, DiagnosticCode)> {
    report
        .diagnostics
        .iter()
        .map(|d| (d.severity, d.code))
        .collect()
}

#[test]
fn safe_entries_become_files() {
    let dir = tempdir().unwrap();
    let bytes = tgz(&[
        Item::File("main.tex", b"\\documentclass{article}"),
        Item::File("figs/a.eps", b"%!PS-Adobe-3.0 EPSF-3.0"),
        Item::File("refs.bbl", b"\\begin{thebibliography}"),
    ]);

    let report = run(bytes, dir.path(), &UnpackOptions::default());

    assert_eq!(report.format, ArchiveFormat::Tar(TarCompress::Gzip));
    assert_eq!(paths(&report), ["main.tex", "figs/a.eps", "refs.bbl"]);
    assert!(report.diagnostics.is_empty());
    assert_eq!(
        std::fs::read(&report.files[0].location).unwrap(),
        b"\\documentclass{article}"
    );
    assert_eq!(report.files[1].size, 23);
}

#[test]
fn bzip2_tarball_is_supported() {
    let dir = tempdir().unwrap();
    let bytes = bzip(&tar_bytes(&[
        Item::File("a.tex", b"a"),
        Item::File("b.tex", b"b"),
    ]));

    let report = run(bytes, dir.path(), &UnpackOptions::default());

    assert_eq!(report.format, ArchiveFormat::Tar(TarCompress::Bzip2));
    assert_eq!(paths(&report), ["a.tex", "b.tex"]);
}

#[test]
fn shared_top_level_directory_is_stripped_once() {
    let dir = tempdir().unwrap();
    let bytes = tgz(&[
        Item::File("paper/main.tex", b"x"),
        Item::File("paper/figs/a.eps", b"y"),
    ]);

    let report = run(bytes, dir.path(), &UnpackOptions::default());

    assert_eq!(paths(&report), ["main.tex", "figs/a.eps"]);
    let stripped: Vec<_> = report
        .diagnostics
        .iter()
        .filter(|d| d.code == DiagnosticCode::TopLevelDirectoryStripped)
        .collect();
    assert_eq!(stripped.len(), 1);
    assert_eq!(stripped[0].severity, Severity::Warn);
}

#[test]
fn shared_root_kept_when_disabled() {
    let dir = tempdir().unwrap();
    let bytes = tgz(&[Item::File("paper/main.tex", b"x")]);
    let report = run(
        bytes,
        dir.path(),
        &UnpackOptions::default().strip_shared_root(false),
    );
    assert_eq!(paths(&report), ["paper/main.tex"]);
}

#[test]
fn traversal_and_absolute_paths_are_contained() {
    let dir = tempdir().unwrap();
    let bytes = tgz(&[
        Item::File("main.tex", b"x"),
        Item::File("../../etc/passwd", b"root"),
        Item::File("/abs/file.txt", b"abs"),
    ]);

    let report = run(bytes, dir.path(), &UnpackOptions::default());

    assert_eq!(paths(&report), ["main.tex", "etc/passwd", "abs/file.txt"]);
    assert_eq!(
        codes(&report),
        [
            (Severity::Warn, DiagnosticCode::PathTraversal),
            (Severity::Warn, DiagnosticCode::AbsolutePath),
        ]
    );
    for file in &report.files {
        assert!(file.location.starts_with(dir.path()));
    }
}

#[test]
fn links_are_dereferenced_or_dropped() {
    let dir = tempdir().unwrap();
    let bytes = tgz(&[
        Item::File("main.tex", b"x"),
        Item::File("figs/plot.eps", b"plot"),
        Item::Symlink("figs/link.eps", "plot.eps"),
        Item::Hardlink("copy.eps", "figs/plot.eps"),
        Item::Symlink("evil", "../../etc/passwd"),
        Item::Symlink("dangling", "missing.tex"),
    ]);

    let report = run(bytes, dir.path(), &UnpackOptions::default());

    assert_eq!(
        paths(&report),
        ["main.tex", "figs/plot.eps", "figs/link.eps", "copy.eps"]
    );
    for file in &report.files[1..] {
        assert_eq!(std::fs::read(&file.location).unwrap(), b"plot");
        let meta = std::fs::symlink_metadata(&file.location).unwrap();
        assert!(meta.file_type().is_file());
    }
    let dropped = report
        .diagnostics
        .iter()
        .filter(|d| d.code == DiagnosticCode::LinkDropped)
        .count();
    assert_eq!(dropped, 2);
}

#[test]
fn device_entries_are_dropped() {
    let dir = tempdir().unwrap();
    let bytes = tgz(&[Item::File("main.tex", b"x"), Item::Device("dev/tty")]);

    let report = run(bytes, dir.path(), &UnpackOptions::default());

    assert_eq!(paths(&report), ["main.tex"]);
    assert_eq!(
        codes(&report),
        [(Severity::Warn, DiagnosticCode::SpecialEntryDropped)]
    );
}

#[test]
fn nested_archive_within_bound_is_expanded_flat() {
    let dir = tempdir().unwrap();
    let inner = tgz(&[
        Item::File("fig.eps", b"%!PS"),
        Item::File("data/x.txt", b"x"),
    ]);
    let bytes = tgz(&[
        Item::File("main.tex", b"x"),
        Item::File("sub/inner.tar.gz", &inner),
    ]);

    let report = run(bytes, dir.path(), &UnpackOptions::default());

    assert_eq!(paths(&report), ["main.tex", "sub/fig.eps", "sub/data/x.txt"]);
    let expanded: Vec<_> = report
        .diagnostics
        .iter()
        .filter(|d| d.code == DiagnosticCode::NestedArchiveExpanded)
        .collect();
    assert_eq!(expanded.len(), 1);
    assert_eq!(expanded[0].severity, Severity::Info);
    assert_eq!(expanded[0].path.as_deref(), Some("sub/inner.tar.gz"));
}

#[test]
fn nested_archive_beyond_bound_is_kept_opaque() {
    let dir = tempdir().unwrap();
    let inner = tgz(&[Item::File("fig.eps", b"%!PS")]);
    let bytes = tgz(&[
        Item::File("main.tex", b"x"),
        Item::File("inner.tgz", &inner),
    ]);

    let report = run(bytes, dir.path(), &UnpackOptions::default().max_depth(1));

    assert_eq!(paths(&report), ["main.tex", "inner.tgz"]);
    assert_eq!(
        codes(&report),
        [(Severity::Warn, DiagnosticCode::NestedArchiveTooDeep)]
    );
}

#[test]
fn corrupt_nested_archive_is_kept_with_error() {
    let dir = tempdir().unwrap();
    let bytes = tgz(&[
        Item::File("main.tex", b"x"),
        Item::File("broken.zip", b"PK\x03\x04 definitely not a zip archive"),
        Item::File("after.tex", b"y"),
    ]);

    let report = run(bytes, dir.path(), &UnpackOptions::default());

    assert_eq!(paths(&report), ["main.tex", "broken.zip", "after.tex"]);
    let errors: Vec<_> = report.diagnostics_for("broken.zip").collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].severity, Severity::Error);
    assert_eq!(errors[0].code, DiagnosticCode::NestedArchiveCorrupt);
}

/// Bytes that deflate cannot shrink, so truncating the gzip stream truncates
/// the tar content at a predictable point.
fn noise(len: usize) -> Vec<u8> {
    let mut state: u32 = 0x2545_f491;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state as u8
        })
        .collect()
}

#[test]
fn unreadable_root_archive_is_corrupted() {
    let dir = tempdir().unwrap();
    let err = unpack(
        Cursor::new(b"PK\x03\x04 definitely not a zip archive".to_vec()),
        dir.path(),
        &UnpackOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::Corrupted(_)));
}

#[test]
fn truncated_root_archive_keeps_entries_read_so_far() {
    let dir = tempdir().unwrap();
    let data = noise(20 * 1024);
    let mut bytes = tgz(&[
        Item::File("main.tex", b"\\documentclass{article}"),
        Item::File("data.txt", &data),
    ]);
    bytes.truncate(bytes.len() / 2);

    let report = run(bytes, dir.path(), &UnpackOptions::default());

    assert_eq!(paths(&report), ["main.tex"]);
    assert_eq!(
        std::fs::read(&report.files[0].location).unwrap(),
        b"\\documentclass{article}"
    );
    assert_eq!(
        codes(&report),
        [(Severity::Error, DiagnosticCode::ArchiveCorrupt)]
    );
    assert!(report.diagnostics[0].path.is_none());
}

#[test]
fn loose_file_is_not_an_archive() {
    let dir = tempdir().unwrap();
    let err = unpack(
        Cursor::new(b"%PDF-1.5\n".to_vec()),
        dir.path(),
        &UnpackOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::UnsupportedFormat));
}

#[test]
fn entry_limit_stops_extraction() {
    let dir = tempdir().unwrap();
    let bytes = tgz(&[
        Item::File("a.tex", b"a"),
        Item::File("b.tex", b"b"),
        Item::File("c.tex", b"c"),
    ]);

    let report = run(bytes, dir.path(), &UnpackOptions::default().max_entries(2));

    assert_eq!(paths(&report), ["a.tex", "b.tex"]);
    assert_eq!(
        codes(&report),
        [(Severity::Error, DiagnosticCode::EntryLimitExceeded)]
    );
}

#[test]
fn byte_limit_stops_extraction() {
    let dir = tempdir().unwrap();
    let bytes = tgz(&[
        Item::File("small.tex", b"tiny"),
        Item::File("big.tex", &[b'x'; 64]),
        Item::File("later.tex", b"z"),
    ]);

    let report = run(bytes, dir.path(), &UnpackOptions::default().max_total_bytes(16));

    assert_eq!(paths(&report), ["small.tex"]);
    assert!(report.has_errors());
    assert_eq!(
        report.diagnostics[0].code,
        DiagnosticCode::SizeLimitExceeded
    );
}

#[test]
fn colliding_names_are_disambiguated() {
    let dir = tempdir().unwrap();
    let bytes = tgz(&[
        Item::File("main.tex", b"first"),
        Item::File("./main.tex", b"second"),
        Item::File("Main.tex", b"third"),
    ]);

    let report = run(
        bytes,
        dir.path(),
        &UnpackOptions::default().case_insensitive(true),
    );

    assert_eq!(paths(&report), ["main.tex", "main_1.tex", "Main_2.tex"]);
    assert_eq!(std::fs::read(&report.files[0].location).unwrap(), b"first");
    let collisions = report
        .diagnostics
        .iter()
        .filter(|d| d.code == DiagnosticCode::PathCollision)
        .count();
    assert_eq!(collisions, 2);
}

#[test]
fn zip_archive_is_unpacked() {
    use zip::write::SimpleFileOptions;

    let dir = tempdir().unwrap();
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored)
        .unix_permissions(0o755);
    writer.start_file("main.tex", options).unwrap();
    writer.write_all(b"\\documentclass{article}").unwrap();
    writer.start_file("C:\\figs\\a.eps", options).unwrap();
    writer.write_all(b"%!PS").unwrap();
    writer.add_symlink("escape", "/etc/passwd", options).unwrap();
    let bytes = writer.finish().unwrap().into_inner();

    let report = run(bytes, dir.path(), &UnpackOptions::default());

    assert_eq!(report.format, ArchiveFormat::Zip);
    assert_eq!(paths(&report), ["main.tex", "figs/a.eps"]);
    assert!(report.diagnostics.iter().any(|d| d.code == DiagnosticCode::AbsolutePath));
    assert!(report.diagnostics.iter().any(|d| d.code == DiagnosticCode::LinkDropped));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&report.files[0].location)
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o664);
        assert_eq!(report.files[0].mode, Some(0o755));
    }
}
