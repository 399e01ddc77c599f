pub mod header;
pub mod normalize;
pub mod values;

use crate::error::CdrError;
use csv::{Position, ReaderBuilder, StringRecord, Trim};

/// One data line of a CDR export, keyed by trimmed header name.
///
/// Field order follows the header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    /// 1-based line number in the source text.
    pub line: usize,
    pub fields: Vec<(String, String)>,
}

impl RawRow {
    pub fn new(line: usize, fields: Vec<(String, String)>) -> Self {
        RawRow { line, fields }
    }

    /// Value of the first column named `header` (exact match).
    pub fn get(&self, header: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(h, _)| h == header)
            .map(|(_, v)| v.as_str())
    }
}

/// Decode raw export bytes. Invalid UTF-8 sequences become U+FFFD so one
/// badly encoded field cannot fail the whole export.
pub fn decode_export(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            let valid_up_to = err.utf8_error().valid_up_to();
            tracing::warn!(valid_up_to, "Export is not valid UTF-8, replacing bad bytes");
            String::from_utf8_lossy(err.as_bytes()).into_owned()
        }
    }
}

/// Parse delimited text into rows.
///
/// The first non-blank record is the header. The delimiter (comma, semicolon
/// or tab) is detected from the first non-blank line. Blank lines, including
/// the empty line some exports put right after the header, are ignored. The
/// returned iterator is lazy; calling `parse_rows` again on the same text
/// yields the same sequence.
pub fn parse_rows(text: &str) -> CsvRows<'_> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let delimiter = text
        .lines()
        .find(|line| !line.trim().is_empty())
        .map_or(b',', detect_delimiter);

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .trim(Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut headers = Vec::new();
    let mut record = StringRecord::new();
    while let Ok(true) = reader.read_record(&mut record) {
        if is_blank_record(&record) {
            continue;
        }
        headers = record.iter().map(str::to_string).collect();
        break;
    }

    CsvRows {
        text,
        headers,
        delimiter,
        reader,
        record,
    }
}

/// Lazy row iterator returned by [`parse_rows`].
///
/// Records with fewer fields than the header yield `MalformedInput` and
/// iteration continues with the next record.
pub struct CsvRows<'a> {
    text: &'a str,
    headers: Vec<String>,
    delimiter: u8,
    reader: csv::Reader<&'a [u8]>,
    record: StringRecord,
}

impl CsvRows<'_> {
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    /// 1-based line where the record read from `pos` starts.
    ///
    /// The reader records its position before skipping empty lines, so the
    /// line breaks between that offset and the record are added back.
    fn start_line(&self, pos: &Position) -> usize {
        let offset = usize::try_from(pos.byte()).unwrap_or(usize::MAX);
        let skipped = self
            .text
            .as_bytes()
            .get(offset..)
            .unwrap_or_default()
            .iter()
            .take_while(|b| matches!(b, b'\r' | b'\n'))
            .filter(|b| **b == b'\n')
            .count();
        usize::try_from(pos.line()).unwrap_or(usize::MAX) + skipped
    }
}

impl Iterator for CsvRows<'_> {
    type Item = Result<RawRow, CdrError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.reader.read_record(&mut self.record) {
                Ok(false) => return None,
                Ok(true) => {
                    if is_blank_record(&self.record) {
                        continue;
                    }

                    let line = self.record.position().map_or(0, |p| self.start_line(p));
                    if self.record.len() < self.headers.len() {
                        return Some(Err(CdrError::MalformedInput {
                            line,
                            reason: format!(
                                "expected {} fields, found {}",
                                self.headers.len(),
                                self.record.len()
                            ),
                        }));
                    }

                    let fields = self
                        .headers
                        .iter()
                        .cloned()
                        .zip(self.record.iter().map(str::to_string))
                        .collect::<Vec<_>>();
                    return Some(Ok(RawRow::new(line, fields)));
                }
                Err(err) => {
                    let line = err.position().map_or(0, |p| self.start_line(p));
                    return Some(Err(CdrError::MalformedInput {
                        line,
                        reason: err.to_string(),
                    }));
                }
            }
        }
    }
}

fn is_blank_record(record: &StringRecord) -> bool {
    record.iter().all(str::is_empty)
}

/// Pick the delimiter that occurs most often outside quotes in the header.
fn detect_delimiter(header: &str) -> u8 {
    let mut counts = [(b',', 0usize), (b';', 0), (b'\t', 0)];
    let mut in_quotes = false;
    for b in header.bytes() {
        if b == b'"' {
            in_quotes = !in_quotes;
            continue;
        }
        if in_quotes {
            continue;
        }
        for (d, n) in counts.iter_mut() {
            if b == *d {
                *n += 1;
            }
        }
    }
    counts
        .iter()
        .filter(|(_, n)| *n > 0)
        .max_by_key(|(_, n)| *n)
        .map_or(b',', |(d, _)| *d)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_row(text: &str) -> RawRow {
        let mut rows: Vec<_> = parse_rows(text).collect::<Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 1);
        rows.remove(0)
    }

    #[test]
    fn test_fields_trimmed() {
        let row = single_row("a,b,c\n1 , 2 ,3\n");
        assert_eq!(row.get("a"), Some("1"));
        assert_eq!(row.get("b"), Some("2"));
    }

    #[test]
    fn test_quoted_delimiter() {
        let row = single_row("name,n,x\n\"Smith, John\",42,\"x\"\n");
        assert_eq!(row.get("name"), Some("Smith, John"));
        assert_eq!(row.get("x"), Some("x"));
    }

    #[test]
    fn test_escaped_quote() {
        let row = single_row("say,n\n\"say \"\"hi\"\"\",2\n");
        assert_eq!(row.get("say"), Some(r#"say "hi""#));
    }

    #[test]
    fn test_trailing_empty_field() {
        let row = single_row("a,b,c\n1,2,\n");
        assert_eq!(row.get("c"), Some(""));
    }

    #[test]
    fn test_quoted_newline_stays_in_field() {
        let text = "id,note\nA1,\"first\nsecond\"\nA2,plain\n";
        let rows: Vec<_> = parse_rows(text).collect::<Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("note"), Some("first\nsecond"));
        assert_eq!(rows[1].line, 4);
        assert_eq!(rows[1].get("id"), Some("A2"));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a,b,c"), b',');
        assert_eq!(detect_delimiter("a;b;c"), b';');
        assert_eq!(detect_delimiter("a\tb\tc"), b'\t');
        assert_eq!(detect_delimiter(r#""a;b",c"#), b',');
        assert_eq!(detect_delimiter("single"), b',');
    }

    #[test]
    fn test_decode_replaces_invalid_bytes() {
        let bytes = b"a,b\nCaf\xe9,2\n".to_vec();
        let text = decode_export(bytes);
        let row = single_row(&text);
        assert_eq!(row.get("a"), Some("Caf\u{fffd}"));
        assert_eq!(row.get("b"), Some("2"));
        assert_eq!(decode_export(b"ok".to_vec()), "ok");
    }

    #[test]
    fn test_header_then_blank_line() {
        let text = "Call ID,Duration\n\nA1,10\nA2,20\n";
        let rows: Vec<_> = parse_rows(text).collect::<Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("Call ID"), Some("A1"));
        assert_eq!(rows[0].line, 3);
        assert_eq!(rows[1].get("Duration"), Some("20"));
    }

    #[test]
    fn test_ignorable_second_line_of_delimiters() {
        let text = "Call ID,Duration\n,\nA1,10\n";
        let rows: Vec<_> = parse_rows(text).collect::<Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_quoted_headers_trimmed() {
        let text = "\" Call ID \",\"Duration\"\nA1,10\n";
        let rows = parse_rows(text);
        assert_eq!(rows.headers(), &["Call ID".to_string(), "Duration".to_string()]);
    }

    #[test]
    fn test_short_line_is_skipped_not_fatal() {
        let text = "a,b,c\n1,2,3\n4,5\n6,7,8\n";
        let results: Vec<_> = parse_rows(text).collect();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(CdrError::MalformedInput { line: 3, .. })
        ));
        assert_eq!(results[2].as_ref().unwrap().get("c"), Some("8"));
    }

    #[test]
    fn test_extra_fields_ignored() {
        let text = "a,b\n1,2,3\n";
        let rows: Vec<_> = parse_rows(text).collect::<Result<_, _>>().unwrap();
        assert_eq!(rows[0].fields.len(), 2);
    }

    #[test]
    fn test_restartable() {
        let text = "a,b\n1,2\n3,4\n";
        let first: Vec<_> = parse_rows(text).filter_map(Result::ok).collect();
        let second: Vec<_> = parse_rows(text).filter_map(Result::ok).collect();
        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }

    #[test]
    fn test_bom_and_crlf() {
        let text = "\u{feff}a,b\r\n1,2\r\n";
        let rows: Vec<_> = parse_rows(text).collect::<Result<_, _>>().unwrap();
        assert_eq!(rows[0].get("a"), Some("1"));
        assert_eq!(rows[0].get("b"), Some("2"));
    }

    #[test]
    fn test_semicolon_dialect() {
        let text = "Call ID;Location\nX;\"North; East\"\n";
        let rows: Vec<_> = parse_rows(text).collect::<Result<_, _>>().unwrap();
        assert_eq!(rows[0].get("Location"), Some("North; East"));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(parse_rows("").count(), 0);
        assert!(parse_rows("\n\n").headers().is_empty());
    }
}
