//! Integration test: a directory of synthetic objects through the batch
//! cursor, a review session and the results writer.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use filmeter_io::{BatchCursor, BatchOptions, ResultsWriter, results_path};
use filmeter_pipeline::{ReviewPolicy, ReviewSession};

/// Write `<name>.csv` and `<name>-skel.csv` for a `rows x cols` block
/// whose skeleton is the set of `(x, y)` for which `skel` is true.
fn write_object(dir: &Path, name: &str, rows: i64, cols: i64, skel: impl Fn(i64, i64) -> bool) {
    let mut pixels = String::from("x,y,value\n");
    let mut skeleton = String::from("x,y,skeleton\n");
    for x in 0..rows {
        for y in 0..cols {
            writeln!(pixels, "{x},{y},3.0").unwrap();
            writeln!(skeleton, "{x},{y},{}", if skel(x, y) { 255 } else { 0 }).unwrap();
        }
    }
    std::fs::write(dir.join(format!("{name}.csv")), pixels).unwrap();
    std::fs::write(dir.join(format!("{name}-skel.csv")), skeleton).unwrap();
}

fn write_info(dir: &Path, name: &str, branches: u32, length: f64) {
    std::fs::write(
        dir.join(format!("{name}-skel_info.csv")),
        format!("branches,junctions,c2,c3,c4,c5,c6,c7,length\n{branches},0,0,0,0,0,0,0,{length}\n"),
    )
    .unwrap();
}

fn batch_dir(tag: &str) -> PathBuf {
    let root = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join(format!("filmeter-{tag}"));
    let _ = std::fs::remove_dir_all(&root);
    let dir = root.join("objects");
    std::fs::create_dir_all(&dir).unwrap();

    // A clean straight filament with analyser output.
    write_object(&dir, "a", 3, 30, |x, y| x == 1 && (2..=27).contains(&y));
    write_info(&dir, "a", 1, 25.0);

    // Too small to measure.
    std::fs::write(dir.join("b.csv"), "x,y,value\n1,1,1\n1,2,1\n2,1,1\n").unwrap();

    // A branched skeleton: three endpoints.
    write_object(&dir, "c", 7, 30, |x, y| {
        (x == 3 && (3..=26).contains(&y)) || (y == 15 && (1..=2).contains(&x))
    });

    // Clean endpoints but the analyser reports two branches.
    write_object(&dir, "d", 3, 30, |x, y| x == 1 && (2..=27).contains(&y));
    write_info(&dir, "d", 2, 25.0);

    std::fs::write(dir.join("README.txt"), "not an object").unwrap();
    dir
}

#[test]
fn batch_review_writes_accepted_rows() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = batch_dir("accept");

    let options = BatchOptions {
        write_diagnostics: true,
        ..BatchOptions::default()
    };
    let cursor = BatchCursor::open(&dir, options).unwrap();
    assert_eq!(cursor.remaining(), 4);

    let policy = ReviewPolicy {
        accept_all: true,
        ..ReviewPolicy::default()
    };
    let mut session = ReviewSession::new(cursor, policy);
    let out_path = results_path(&dir);
    let mut writer = ResultsWriter::create(&out_path).unwrap();

    let mut reviewed = Vec::new();
    while let Some(candidate) = session.next().unwrap() {
        reviewed.push(candidate.name.clone());
        assert!(!candidate.overlay_png.is_empty());
        if session.auto_decide().unwrap() {
            writer.write_row(session.rows().last().unwrap()).unwrap();
        }
    }
    drop(writer);

    assert_eq!(reviewed, vec!["a"]);
    assert_eq!(session.filtered(), 1);
    let skipped: Vec<_> = session.skipped().iter().map(|s| s.name.as_str()).collect();
    assert_eq!(skipped, vec!["c", "d"]);
    assert!(session.skipped()[0].reason.contains("3 endpoints"));
    assert!(session.skipped()[1].reason.contains("2 branches"));
    assert!(dir.join("cbroken_end_detection.png").is_file());

    assert_eq!(out_path.file_name().unwrap(), "objects-res.tsv");
    let text = std::fs::read_to_string(&out_path).unwrap();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 2, "{text}");
    assert_eq!(lines[0], "mean_width\tskel_length");
    let fields: Vec<_> = lines[1].split('\t').collect();
    assert_eq!(fields[0], "3");
    let total: f64 = fields[1].parse().unwrap();
    // 25 from the analyser plus roughly 2.4 to 2.5 at each tip.
    assert!(total > 29.7 && total < 30.1, "{total}");
}

#[test]
fn rejected_candidates_are_not_written() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = batch_dir("reject");
    let cursor = BatchCursor::open(&dir, BatchOptions::default()).unwrap();
    let mut session = ReviewSession::new(cursor, ReviewPolicy::default());
    while session.next().unwrap().is_some() {
        session.decide(false).unwrap();
    }
    assert!(session.rows().is_empty());
    assert_eq!(session.rejected(), 1);
    assert!(!dir.join("cbroken_end_detection.png").exists());
}
