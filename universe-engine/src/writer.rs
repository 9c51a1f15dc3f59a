// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::{collections::HashSet, io::Write, path::Path};

use log::info;
use tempfile::NamedTempFile;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, BufReader},
};

use crate::errors::ConvertError;

fn identifier_of(line: &str) -> &str {
    line.split(',').next().unwrap_or(line)
}

/// Merges `new_lines` for one date with any pre-existing universe file and
/// atomically replaces it. Union is exact-string; output is sorted
/// ascending by the identifier field (full line as tiebreak, so repeated
/// runs are byte-identical).
pub async fn merge_universe_file(
    universe_dir: &Path,
    date_key: &str,
    new_lines: Vec<String>,
) -> Result<(), ConvertError> {
    let final_path = universe_dir.join(format!("{date_key}.csv"));
    let mut lines: HashSet<String> = new_lines.into_iter().collect();
    if tokio::fs::try_exists(&final_path).await? {
        let file = File::open(&final_path).await?;
        let mut existing = BufReader::new(file).lines();
        while let Some(line) = existing.next_line().await? {
            if !line.is_empty() {
                lines.insert(line);
            }
        }
    }
    let mut ordered: Vec<String> = lines.into_iter().collect();
    ordered.sort_by(|a, b| {
        identifier_of(a)
            .cmp(identifier_of(b))
            .then_with(|| a.cmp(b))
    });
    write_lines_atomic(&final_path, &ordered)?;
    info!("wrote {} universe entries for {date_key}", ordered.len());
    Ok(())
}

/// Full write to a sibling temp file, then a single atomic rename onto the
/// destination. A reader never observes a partial file; a crash before the
/// rename leaves the previous version intact.
pub fn write_lines_atomic(final_path: &Path, lines: &[String]) -> Result<(), ConvertError> {
    let dir = final_path.parent().ok_or_else(|| {
        ConvertError::Config(format!("{} has no parent directory", final_path.display()))
    })?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    for line in lines {
        writeln!(tmp, "{line}")?;
    }
    tmp.flush()?;
    tmp.persist(final_path).map_err(|err| err.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn read(path: &Path) -> String {
        std::fs::read_to_string(path).unwrap()
    }

    #[tokio::test]
    async fn unions_with_existing_file_and_dedupes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("20200101.csv");
        std::fs::write(&path, "SID001,AAPL,a,b,c,d,e\n").unwrap();

        merge_universe_file(
            dir.path(),
            "20200101",
            vec![
                "SID001,AAPL,a,b,c,d,e".to_string(),
                "SID002,MSFT,1,2,3,4,5".to_string(),
            ],
        )
        .await
        .unwrap();

        assert_eq!(
            read(&path),
            "SID001,AAPL,a,b,c,d,e\nSID002,MSFT,1,2,3,4,5\n"
        );
    }

    #[tokio::test]
    async fn sorts_by_identifier_field() {
        let dir = tempdir().unwrap();
        merge_universe_file(
            dir.path(),
            "20200102",
            vec![
                "SID900,ZZZ,a,a,a,a,a".to_string(),
                "SID100,AAA,b,b,b,b,b".to_string(),
                "SID500,MMM,c,c,c,c,c".to_string(),
            ],
        )
        .await
        .unwrap();

        let contents = read(&dir.path().join("20200102.csv"));
        let ids: Vec<&str> = contents
            .lines()
            .map(|l| l.split(',').next().unwrap())
            .collect();
        assert_eq!(ids, vec!["SID100", "SID500", "SID900"]);
    }

    #[tokio::test]
    async fn rewrite_with_no_new_lines_preserves_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("20200101.csv");
        std::fs::write(&path, "SID001,AAPL,a,b,c,d,e\n").unwrap();

        merge_universe_file(dir.path(), "20200101", Vec::new())
            .await
            .unwrap();
        assert_eq!(read(&path), "SID001,AAPL,a,b,c,d,e\n");
    }

    #[test]
    fn interrupted_replace_leaves_previous_version_intact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("20200101.csv");
        write_lines_atomic(&path, &["SID001,AAPL,a,b,c,d,e".to_string()]).unwrap();

        // Simulate a crash between temp-file write and rename: the temp
        // file is written but never persisted onto the final path.
        {
            let mut tmp = NamedTempFile::new_in(dir.path()).unwrap();
            write!(tmp, "SID002,MSFT,partial").unwrap();
        }

        assert_eq!(read(&path), "SID001,AAPL,a,b,c,d,e\n");
    }

    #[test]
    fn atomic_write_overwrites_previous_version() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("20200101.csv");
        write_lines_atomic(&path, &["old".to_string()]).unwrap();
        write_lines_atomic(&path, &["new-1".to_string(), "new-2".to_string()]).unwrap();
        assert_eq!(read(&path), "new-1\nnew-2\n");
    }
}
