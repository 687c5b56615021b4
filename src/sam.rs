//! SAM alignment record model.
//!
//! Follows the naming of the SAMv1 spec, restricted to the fields the
//! pipeline needs: query name, flag, reference name, position, mapping
//! quality, CIGAR and sequence.

use crate::error::{HybseqError, Result};
use log::warn;

/// SAM flag bit marking the segment as unmapped.
const FLAG_UNMAPPED: u16 = 0x4;

/// CIGAR operations accepted by the decoder.
const CIGAR_OPS: &[char] = &['M', 'I', 'D', 'N', 'S', 'H', 'P', '=', 'X'];

/// One parsed SAM record.
#[derive(Debug, Clone)]
pub struct SamRecord {
    /// Query (read) name, `QNAME`
    pub qname: String,
    /// Bitwise flag, `FLAG`
    pub flag: u16,
    /// Reference sequence name, `RNAME`
    pub rname: String,
    /// 1-based mapping position, `POS`
    pub pos: u64,
    /// Mapping quality, `MAPQ`
    pub mapq: u8,
    /// Unexpanded CIGAR string, `CIGAR`
    pub cigar: String,
    /// Query sequence, `SEQ`
    pub seq: String,
}

impl SamRecord {
    /// Parses one tab-separated SAM body line.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 11 {
            return Err(HybseqError::MalformedRecord(format!(
                "expected at least 11 fields, got {}: {}",
                fields.len(),
                line
            )));
        }
        let flag: u16 = fields[1]
            .parse()
            .map_err(|_| HybseqError::MalformedRecord(format!("bad FLAG: {}", fields[1])))?;
        let pos: u64 = fields[3]
            .parse()
            .map_err(|_| HybseqError::MalformedRecord(format!("bad POS: {}", fields[3])))?;
        let mapq: u8 = fields[4]
            .parse()
            .map_err(|_| HybseqError::MalformedRecord(format!("bad MAPQ: {}", fields[4])))?;
        Ok(SamRecord {
            qname: fields[0].to_string(),
            flag,
            rname: fields[2].to_string(),
            pos,
            mapq,
            cigar: fields[5].to_string(),
            seq: fields[9].to_string(),
        })
    }

    /// True if the unmapped flag bit is unset.
    pub fn is_mapped(&self) -> bool {
        self.flag & FLAG_UNMAPPED == 0
    }

    fn cigar_elements(&self) -> Result<Vec<(u64, char)>> {
        let mut elements = Vec::new();
        let mut rest = self.cigar.as_str();
        while !rest.is_empty() {
            let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
            let op = rest[digits..].chars().next();
            let valid = digits > 0 && op.map(|o| CIGAR_OPS.contains(&o)).unwrap_or(false);
            if !valid {
                return Err(HybseqError::MalformedCigar {
                    cigar: self.cigar.clone(),
                    rest: rest.to_string(),
                });
            }
            let count: u64 = rest[..digits].parse().map_err(|_| HybseqError::MalformedCigar {
                cigar: self.cigar.clone(),
                rest: rest.to_string(),
            })?;
            elements.push((count, op.unwrap()));
            rest = &rest[digits + 1..];
        }
        Ok(elements)
    }

    /// CIGAR with run lengths expanded, e.g. "3M1I2D" becomes "MMMIDD".
    pub fn expanded_cigar(&self) -> Result<String> {
        let mut expanded = String::new();
        for (count, op) in self.cigar_elements()? {
            for _ in 0..count {
                expanded.push(op);
            }
        }
        Ok(expanded)
    }

    /// Reference-space match length: total run length of 'M' and 'D'
    /// operations.
    pub fn match_length(&self) -> Result<u64> {
        Ok(self
            .cigar_elements()?
            .iter()
            .filter(|(_, op)| *op == 'M' || *op == 'D')
            .map(|(count, _)| count)
            .sum())
    }

    /// Position one past the last reference base covered by the alignment.
    pub fn end_position(&self) -> Result<u64> {
        Ok(self.pos + self.match_length()?)
    }

    /// Number of 'M' operations in the CIGAR.
    ///
    /// '=' and 'X' are accepted by the decoder but not counted here.
    pub fn num_cigar_matches(&self) -> Result<u64> {
        let elements = self.cigar_elements()?;
        if elements.iter().any(|(_, op)| *op == '=') {
            warn!("found sequence match (\"=\") characters, unimplemented");
        }
        if elements.iter().any(|(_, op)| *op == 'X') {
            warn!("found sequence mismatch (\"X\") characters, unimplemented");
        }
        Ok(elements
            .iter()
            .filter(|(_, op)| *op == 'M')
            .map(|(count, _)| count)
            .sum())
    }
}
