use crate::error::ImportError;
use csv_async::{AsyncReader, AsyncReaderBuilder, StringRecord};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;

pub const SKU_COLUMN: &str = "sku";

/// Header name (trimmed, lower-cased) to column index. First occurrence wins.
type Columns = Arc<HashMap<String, usize>>;

/// One data row of the file, addressable by header name.
#[derive(Debug, Clone)]
pub struct RawRow {
    columns: Columns,
    record: StringRecord,
}

impl RawRow {
    /// Missing trailing cells of a ragged row read as `""`, unknown columns as `None`.
    pub fn get(&self, name: &str) -> Option<&str> {
        let idx = *self.columns.get(&name.to_lowercase())?;
        Some(self.record.get(idx).unwrap_or(""))
    }
}

/// Forward-only reader over the data rows of a CSV file.
///
/// Opening fails with `FileNotFound` for a missing path and with `EmptyFile`
/// when there is no data row after the header. A fresh reader has to be
/// opened to read the file again.
pub struct CsvRowReader {
    path: PathBuf,
    reader: AsyncReader<File>,
    columns: Columns,
    pending: Option<StringRecord>,
}

impl CsvRowReader {
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, ImportError> {
        let path = path.as_ref().to_path_buf();
        let mut reader = open_reader(&path).await?;
        let headers = reader.headers().await?.clone();
        if headers.iter().all(|h| h.trim().is_empty()) {
            return Err(ImportError::EmptyFile(path));
        }
        let mut columns = HashMap::new();
        for (idx, name) in headers.iter().enumerate() {
            columns.entry(name.trim().to_lowercase()).or_insert(idx);
        }
        if !columns.contains_key(SKU_COLUMN) {
            return Err(ImportError::MissingSkuColumn(path));
        }
        let mut first = StringRecord::new();
        if !reader.read_record(&mut first).await? {
            return Err(ImportError::EmptyFile(path));
        }
        Ok(Self {
            path,
            reader,
            columns: Arc::new(columns),
            pending: Some(first),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn next_row(&mut self) -> Option<Result<RawRow, ImportError>> {
        let record = match self.pending.take() {
            Some(record) => record,
            None => {
                let mut record = StringRecord::new();
                match self.reader.read_record(&mut record).await {
                    Ok(true) => record,
                    Ok(false) => return None,
                    Err(err) => return Some(Err(err.into())),
                }
            }
        };
        Some(Ok(RawRow {
            columns: self.columns.clone(),
            record,
        }))
    }
}

/// Number of data rows in the file. Reads the whole file once.
pub async fn count_rows<P: AsRef<Path>>(path: P) -> Result<u64, ImportError> {
    let mut reader = open_reader(path.as_ref()).await?;
    let mut record = StringRecord::new();
    let mut count = 0;
    while reader.read_record(&mut record).await? {
        count += 1;
    }
    Ok(count)
}

async fn open_reader(path: &Path) -> Result<AsyncReader<File>, ImportError> {
    let file = match File::open(path).await {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(ImportError::FileNotFound(path.to_path_buf()))
        }
        Err(err) => return Err(ImportError::Io(err)),
    };
    Ok(AsyncReaderBuilder::new()
        .delimiter(b',')
        .flexible(true)
        .create_reader(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn csv_file(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    #[tokio::test]
    async fn reads_rows_by_header_name() {
        let f = csv_file("sku,name,description,color\nA1,Widget,Blue one,blue\nB2,Gadget,,red\n");
        let mut reader = CsvRowReader::open(f.path()).await.unwrap();
        let row = reader.next_row().await.unwrap().unwrap();
        assert_eq!(row.get("sku"), Some("A1"));
        assert_eq!(row.get("name"), Some("Widget"));
        assert_eq!(row.get("description"), Some("Blue one"));
        let row = reader.next_row().await.unwrap().unwrap();
        assert_eq!(row.get("description"), Some(""));
        assert!(reader.next_row().await.is_none());
    }

    #[tokio::test]
    async fn ragged_rows_read_as_empty() {
        let f = csv_file("sku,name,description\nA1\nB2,Gadget\n");
        let mut reader = CsvRowReader::open(f.path()).await.unwrap();
        let row = reader.next_row().await.unwrap().unwrap();
        assert_eq!(row.get("name"), Some(""));
        assert_eq!(row.get("description"), Some(""));
        let row = reader.next_row().await.unwrap().unwrap();
        assert_eq!(row.get("name"), Some("Gadget"));
        assert_eq!(row.get("missing"), None);
    }

    #[tokio::test]
    async fn header_names_are_matched_loosely() {
        let f = csv_file(" SKU ,Name\nA1,Widget\n");
        let mut reader = CsvRowReader::open(f.path()).await.unwrap();
        let row = reader.next_row().await.unwrap().unwrap();
        assert_eq!(row.get("sku"), Some("A1"));
        assert_eq!(row.get("name"), Some("Widget"));
    }

    #[tokio::test]
    async fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.csv");
        assert!(matches!(
            CsvRowReader::open(&path).await,
            Err(ImportError::FileNotFound(p)) if p == path
        ));
        assert!(matches!(
            count_rows(&path).await,
            Err(ImportError::FileNotFound(_))
        ));
    }

    #[tokio::test]
    async fn empty_and_header_only_files() {
        let f = csv_file("");
        assert!(matches!(
            CsvRowReader::open(f.path()).await,
            Err(ImportError::EmptyFile(_))
        ));
        let f = csv_file("sku,name,description\n");
        assert!(matches!(
            CsvRowReader::open(f.path()).await,
            Err(ImportError::EmptyFile(_))
        ));
        assert_eq!(count_rows(f.path()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn header_without_sku_column() {
        let f = csv_file("code,name\nA1,Widget\n");
        assert!(matches!(
            CsvRowReader::open(f.path()).await,
            Err(ImportError::MissingSkuColumn(_))
        ));
    }

    #[tokio::test]
    async fn counts_records_not_lines() {
        let f = csv_file("sku,name,description\nA1,Widget,\"two\nlines\"\nB2,Gadget,\n");
        assert_eq!(count_rows(f.path()).await.unwrap(), 2);
    }
}
