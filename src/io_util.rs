use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;

/// Opens a text input, decompressing on the fly when the path ends in `.gz`.
pub fn open_text_reader<P: AsRef<Path>>(path: P) -> std::io::Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let f = File::open(path)?;

    let is_gz = path
        .extension()
        .map(|ext| ext == "gz")
        .unwrap_or(false);

    let reader: Box<dyn BufRead> = if is_gz {
        Box::new(BufReader::new(MultiGzDecoder::new(f)))
    } else {
        Box::new(BufReader::new(f))
    };
    Ok(reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_reads_plain_and_gz() {
        let dir = tempfile::tempdir().unwrap();

        let plain = dir.path().join("in.txt");
        std::fs::write(&plain, "a\nb\n").unwrap();
        let lines: Vec<String> = open_text_reader(&plain).unwrap().lines().map(|l| l.unwrap()).collect();
        assert_eq!(lines, vec!["a", "b"]);

        let gz = dir.path().join("in.txt.gz");
        let mut enc = GzEncoder::new(File::create(&gz).unwrap(), Compression::default());
        enc.write_all(b"x\ny\n").unwrap();
        enc.finish().unwrap();
        let lines: Vec<String> = open_text_reader(&gz).unwrap().lines().map(|l| l.unwrap()).collect();
        assert_eq!(lines, vec!["x", "y"]);
    }
}
