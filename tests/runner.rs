use kvbatch::testing::{artifact_paths, compressed, fields, review_dump, sample_reviews};
use kvbatch::{CodecRegistry, LineSource, Runner, read_artifact, run};
use pretty_assertions::assert_eq;
use std::fs;
use std::io::{self, Read};

/// Hands out at most one byte per `read` call.
struct Trickle(Vec<u8>, usize);

impl Read for Trickle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match (self.0.get(self.1), buf.first_mut()) {
            (Some(b), Some(slot)) => {
                *slot = *b;
                self.1 += 1;
                Ok(1)
            }
            _ => Ok(0),
        }
    }
}

fn scenario_dump() -> String {
    let record = fields(&[("beer/name", "X"), ("review/time", "1234817823"), ("review/aroma", "")]);
    review_dump(&[record.clone(), record.clone(), record], "\n")
}

#[test]
fn three_records_batch_of_two() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let written = run(scenario_dump().as_bytes(), tmp.path(), 2)?;
    assert_eq!(written, 2);

    let registry = CodecRegistry::builtin();
    let paths = artifact_paths(tmp.path())?;
    assert_eq!(paths.len(), 2);
    assert!(paths[0].ends_with("0.csv.gz"));
    assert!(paths[1].ends_with("1.csv.gz"));

    let first = read_artifact(&paths[0], &registry)?;
    let second = read_artifact(&paths[1], &registry)?;
    assert_eq!(first.rows.len(), 2);
    assert_eq!(second.rows.len(), 1);
    for (art, rows) in [(&first, 2), (&second, 1)] {
        for row in 0..rows {
            assert_eq!(art.get(row, "beer_name"), Some("X"));
            assert_eq!(art.get(row, "review_aroma"), None);
            assert_eq!(art.get(row, "time"), Some("2009-02-16 20:57:03"));
        }
    }
    Ok(())
}

#[test]
fn header_is_canonical_without_index_column() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    run(review_dump(&sample_reviews(), "\n").as_bytes(), tmp.path(), 10)?;
    let art = read_artifact(tmp.path().join("0.csv.gz"), &CodecRegistry::builtin())?;
    assert_eq!(
        art.headers,
        vec![
            "beer_name",
            "beer_id",
            "brewer_id",
            "abv",
            "beer_style",
            "review_appearance",
            "review_aroma",
            "review_palate",
            "review_taste",
            "review_overall",
            "time",
            "profile_name",
            "review_text",
        ]
    );
    assert!(art.rows.iter().all(|r| r.len() == art.headers.len()));
    Ok(())
}

#[test]
fn roundtrip_preserves_every_cell() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let reviews = sample_reviews();
    run(review_dump(&reviews, "\n").as_bytes(), tmp.path(), 2)?;

    let registry = CodecRegistry::builtin();
    let mut rows = Vec::new();
    for path in artifact_paths(tmp.path())? {
        let art = read_artifact(path, &registry)?;
        for i in 0..art.rows.len() {
            rows.push((
                art.get(i, "beer_name").map(str::to_string),
                art.get(i, "abv").map(str::to_string),
                art.get(i, "review_aroma").map(str::to_string),
                art.get(i, "review_text").map(str::to_string),
            ));
        }
    }
    assert_eq!(rows.len(), reviews.len());
    assert_eq!(
        rows[0],
        (
            Some("Sausa Weizen".into()),
            Some("5.0".into()),
            Some("2.0".into()),
            Some("A lot of foam. But a lot. In the smell: some banana, and then lactic.".into()),
        )
    );
    // numeric text widens to float form
    assert_eq!(rows[1].1.as_deref(), Some("6.2"));
    // empty ABV is null
    assert_eq!(rows[2].1, None);
    Ok(())
}

#[test]
fn exact_multiple_writes_no_empty_tail() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let reviews: Vec<_> = sample_reviews().into_iter().cycle().take(6).collect();
    let written = run(review_dump(&reviews, "\n").as_bytes(), tmp.path(), 3)?;
    assert_eq!(written, 2);
    assert_eq!(artifact_paths(tmp.path())?.len(), 2);
    Ok(())
}

#[test]
fn batch_size_plus_one_gives_full_then_single() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let reviews: Vec<_> = sample_reviews().into_iter().cycle().take(5).collect();
    let summary = Runner::new(4).run(review_dump(&reviews, "\n").as_bytes(), tmp.path())?;
    assert_eq!(summary.batches_written, 2);
    assert_eq!(summary.records_written, 5);

    let registry = CodecRegistry::builtin();
    let paths = artifact_paths(tmp.path())?;
    assert_eq!(read_artifact(&paths[0], &registry)?.rows.len(), 4);
    assert_eq!(read_artifact(&paths[1], &registry)?.rows.len(), 1);
    Ok(())
}

#[test]
fn repeated_runs_are_byte_identical() -> anyhow::Result<()> {
    let input = review_dump(&sample_reviews(), "\n\n");
    let a = tempfile::tempdir()?;
    let b = tempfile::tempdir()?;
    run(input.as_bytes(), a.path(), 2)?;
    run(input.as_bytes(), b.path(), 2)?;

    let left = artifact_paths(a.path())?;
    let right = artifact_paths(b.path())?;
    assert_eq!(left.len(), right.len());
    for (l, r) in left.iter().zip(&right) {
        assert_eq!(l.file_name(), r.file_name());
        assert_eq!(fs::read(l)?, fs::read(r)?);
    }
    Ok(())
}

#[test]
fn empty_input_creates_directory_and_no_artifacts() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let out = tmp.path().join("batches");
    assert_eq!(run(&b"\n\n"[..], &out, 5)?, 0);
    assert!(out.is_dir());
    assert!(artifact_paths(&out)?.is_empty());
    Ok(())
}

#[test]
fn progress_reports_each_batch_in_order() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let reviews: Vec<_> = sample_reviews().into_iter().cycle().take(7).collect();
    let mut seen = Vec::new();
    Runner::new(3).run_with_progress(review_dump(&reviews, "\n").as_bytes(), tmp.path(), |w| {
        assert!(w.path.is_file());
        seen.push((w.index, w.records));
    })?;
    assert_eq!(seen, vec![(0, 3), (1, 3), (2, 1)]);
    Ok(())
}

#[test]
fn nul_lines_are_skipped_and_counted() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let input = "\0\0\0\nbeer/name: A\n\0garbage\n\nbeer/name: B\n";
    let summary = Runner::new(10).run(input.as_bytes(), tmp.path())?;
    assert_eq!(summary.records_written, 2);
    assert_eq!(summary.skipped_null_lines, 2);
    Ok(())
}

#[test]
fn crlf_input_is_understood() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let input = "beer/name: A\r\nreview/overall: 4\r\n\r\nbeer/name: B\r\n";
    let summary = Runner::new(10).with_compression(None).run(input.as_bytes(), tmp.path())?;
    assert_eq!(summary.records_written, 2);
    let art = read_artifact(tmp.path().join("0.csv"), &CodecRegistry::builtin())?;
    assert_eq!(art.get(0, "beer_name"), Some("A"));
    assert_eq!(art.get(0, "review_overall"), Some("4.0"));
    Ok(())
}

#[cfg(feature = "compression-gzip")]
#[test]
fn gzip_input_is_detected_by_content() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let packed = compressed(&review_dump(&sample_reviews(), "\n"), "gzip")?;
    let summary = Runner::new(2).run(packed.as_slice(), tmp.path())?;
    assert_eq!(summary.records_written, 3);
    Ok(())
}

#[cfg(feature = "compression-gzip")]
#[test]
fn gzip_input_detected_through_one_byte_reads() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let packed = compressed(&review_dump(&sample_reviews(), "\n"), "gzip")?;
    let summary = Runner::new(2).run(Trickle(packed, 0), tmp.path())?;
    assert_eq!(summary.records_written, 3);
    Ok(())
}

#[test]
fn plain_input_starting_like_bzip2_stays_plain() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let summary = Runner::new(2)
        .with_compression(None)
        .run(&b"BZh-code: 1\n"[..], tmp.path())?;
    assert_eq!(summary.records_written, 1);
    let art = read_artifact(tmp.path().join("0.csv"), &CodecRegistry::builtin())?;
    assert_eq!(art.get(0, "BZh-code"), Some("1"));
    Ok(())
}

#[cfg(feature = "compression-zstd")]
#[test]
fn input_file_is_opened_by_name() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let input = tmp.path().join("reviews.txt.zst");
    fs::write(&input, compressed(&review_dump(&sample_reviews(), "\n"), "zstd")?)?;

    let runner = Runner::new(2);
    let lines = LineSource::open(&input, &runner.codecs)?;
    let mut seen = Vec::new();
    let summary = runner.run_lines(lines, tmp.path().join("out"), |w| seen.push(w.index))?;
    assert_eq!(summary.records_written, 3);
    assert_eq!(seen, vec![0, 1]);
    Ok(())
}

#[test]
fn unknown_keys_become_extra_columns() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let input = "beer/name: A\nuser/ageInSeconds: 3581182800\n\nbeer/name: B\n";
    Runner::new(10).run(input.as_bytes(), tmp.path())?;
    let art = read_artifact(tmp.path().join("0.csv.gz"), &CodecRegistry::builtin())?;
    assert_eq!(art.headers.last().map(String::as_str), Some("user/ageInSeconds"));
    assert_eq!(art.get(0, "user/ageInSeconds"), Some("3581182800"));
    assert_eq!(art.get(1, "user/ageInSeconds"), None);
    Ok(())
}
