use std::io::{BufRead, Write};

use crate::alphabet::{decode_letter, encode_char, Letter};
use crate::errors::SequenceError;

/// One FASTA record: the full header line (without `>`) and the encoded sequence.
#[derive(Clone, Debug, PartialEq)]
pub struct FastaRecord {
    pub id: String,
    pub seq: Vec<Letter>,
}

impl FastaRecord {
    /// The first whitespace-delimited token of the header.
    pub fn accession(&self) -> &str {
        self.id.split_whitespace().next().unwrap_or("")
    }
}

/// Reads all FASTA records from a buffered reader.
///
/// # Example
/// ```
/// use seqsieve_seq::read_fasta;
/// let text = ">s1 first\nMKTF\nFVLL\n>s2\nAR\n";
/// let records = read_fasta(std::io::BufReader::new(text.as_bytes())).unwrap();
/// assert_eq!(records.len(), 2);
/// assert_eq!(records[0].accession(), "s1");
/// assert_eq!(records[0].seq.len(), 8);
/// ```
pub fn read_fasta<R: BufRead>(reader: R) -> Result<Vec<FastaRecord>, SequenceError> {
    let mut records: Vec<FastaRecord> = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        if let Some(header) = line.strip_prefix('>') {
            records.push(FastaRecord {
                id: header.to_string(),
                seq: Vec::new(),
            });
        } else {
            let record = records.last_mut().ok_or_else(|| SequenceError::MissingHeader {
                line: line.to_string(),
            })?;
            record.seq.extend(line.bytes().filter(|b| !b.is_ascii_whitespace()).map(encode_char));
        }
    }
    Ok(records)
}

/// Writes one FASTA record with a 60-column sequence wrap.
pub fn write_fasta_record<W: Write>(out: &mut W, id: &str, seq: &[Letter]) -> std::io::Result<()> {
    writeln!(out, ">{}", id)?;
    for chunk in seq.chunks(60) {
        let line: String = chunk.iter().map(|&l| decode_letter(l) as char).collect();
        writeln!(out, "{}", line)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::decode_seq;
    use std::io::BufReader;

    #[test]
    fn roundtrip_through_writer_and_reader() {
        let mut buf = Vec::new();
        let seq = crate::alphabet::encode_seq("MKTFFVLLLCTFTVFS");
        write_fasta_record(&mut buf, "7", &seq).unwrap();
        let records = read_fasta(BufReader::new(&buf[..])).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "7");
        assert_eq!(decode_seq(&records[0].seq), "MKTFFVLLLCTFTVFS");
    }

    #[test]
    fn sequence_before_header_is_an_error() {
        let r = read_fasta(BufReader::new("MKTF\n".as_bytes()));
        assert!(r.is_err());
    }
}
