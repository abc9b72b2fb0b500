use once_cell::sync::Lazy;
use regex::bytes::Regex;

use super::{CheckContext, CheckResult, Checker};
use crate::file_type::FileType;
use crate::log::{LogCode, Severity};
use crate::record::{FileRecord, join};

static BEGIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?-u)^begin [0-7]{1,4}\s+(\S+)\s*$").expect("valid regex"));

#[derive(Debug, PartialEq, Eq)]
struct Decoded {
    name: String,
    bytes: Vec<u8>,
}

fn sixbit(c: u8) -> u8 {
    c.wrapping_sub(b' ') & 0x3f
}

/// Decodes the first uuencoded block in `content`.
fn uudecode(content: &[u8]) -> Result<Decoded, String> {
    let mut lines = content
        .split(|b| *b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line));

    let name = lines
        .by_ref()
        .find_map(|line| BEGIN.captures(line).map(|caps| caps[1].to_vec()))
        .ok_or("no 'begin' line")?;
    let name = String::from_utf8(name).map_err(|_| "file name is not valid UTF-8")?;

    let mut bytes = Vec::new();
    for (i, line) in lines.enumerate() {
        if line == b"end" {
            return Ok(Decoded { name, bytes });
        }
        let Some((&first, data)) = line.split_first() else {
            continue;
        };
        let len = usize::from(sixbit(first));
        if len == 0 {
            continue;
        }
        let needed = len.div_ceil(3) * 4;
        if data.len() < needed {
            return Err(format!("encoded line {} is truncated", i + 2));
        }

        let start = bytes.len();
        for group in data[..needed].chunks_exact(4) {
            let [a, b, c, d] = [group[0], group[1], group[2], group[3]].map(sixbit);
            bytes.push((a << 2) | (b >> 4));
            bytes.push((b << 4) | (c >> 2));
            bytes.push((c << 6) | d);
        }
        bytes.truncate(start + len);
    }
    Err("missing 'end' line".to_string())
}

/// Replaces a uuencoded file with the file it encodes.
///
/// The decoded file is written next to the original under the name from the
/// `begin` line and checked on the next pass. The original is kept, with an
/// error, when it cannot be decoded.
pub struct DecodeUuencoded;

impl Checker for DecodeUuencoded {
    fn name(&self) -> &'static str {
        "DecodeUuencoded"
    }

    fn file_types(&self) -> &[FileType] {
        &[FileType::Uuencoded]
    }

    fn check_typed(&self, ctx: &mut CheckContext<'_>, file: &FileRecord) -> CheckResult {
        let content = ctx.read()?;
        let decoded = uudecode(&content).and_then(|decoded| {
            sift_archive::sanitize(&decoded.name)
                .map(|clean| (clean, decoded.bytes))
                .map_err(|e| e.to_string())
        });

        match decoded {
            Ok((clean, bytes)) => {
                let created = ctx.create(&join(file.dir(), &clean.path), &bytes)?;
                for warning in clean.warnings {
                    ctx.log_for(&created, Severity::Warn, warning.code.into(), warning.message);
                }
                ctx.remove(
                    Severity::Info,
                    LogCode::UuencodedDecoded,
                    format!(
                        "Decoded uuencoded file '{}' into '{}' ({} bytes).",
                        file.name(),
                        created.path,
                        bytes.len()
                    ),
                )?;
            }
            Err(reason) => ctx.error(
                LogCode::UuencodedInvalid,
                format!("Could not decode uuencoded file '{}': {reason}.", file.name()),
            ),
        }
        Ok(())
    }
}
