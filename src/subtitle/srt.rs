use tracing::{debug, warn};

use super::{Cue, SubtitleTrack};
use crate::error::{Result, SubtrixError};

/// Slack added before truncating to whole milliseconds, so that a value read
/// back from `HH:MM:SS,mmm` (e.g. 0.29, stored as 0.28999...) keeps its digits.
const MILLIS_EPSILON: f64 = 1e-6;

/// Render a track in the numbered-cue (SRT) format
pub fn format_srt(track: &SubtitleTrack) -> String {
    let mut srt_content = String::new();

    for cue in &track.cues {
        srt_content.push_str(&format!(
            "{}\n{} --> {}\n",
            cue.index,
            format_timestamp(cue.start_time),
            format_timestamp(cue.end_time),
        ));
        for line in &cue.lines {
            srt_content.push_str(line);
            srt_content.push('\n');
        }
        srt_content.push('\n');
    }

    srt_content
}

/// Format time in seconds to SRT time format (HH:MM:SS,mmm), truncating to the millisecond
pub fn format_timestamp(seconds: f64) -> String {
    format_timestamp_with(seconds, ',')
}

pub(crate) fn format_timestamp_with(seconds: f64, separator: char) -> String {
    let total_milliseconds = to_millis(seconds);
    let hours = total_milliseconds / 3_600_000;
    let minutes = (total_milliseconds % 3_600_000) / 60_000;
    let secs = (total_milliseconds % 60_000) / 1_000;
    let millis = total_milliseconds % 1_000;

    format!("{:02}:{:02}:{:02}{}{:03}", hours, minutes, secs, separator, millis)
}

fn to_millis(seconds: f64) -> u64 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    (seconds * 1000.0 + MILLIS_EPSILON).floor() as u64
}

/// Parse `HH:MM:SS,mmm`, `HH:MM:SS.mmm` or `MM:SS.mmm` into seconds
pub fn parse_timestamp(timestamp: &str) -> Result<f64> {
    let timestamp = timestamp.trim();
    let invalid = || SubtrixError::FormatParse(format!("Invalid timestamp '{}'", timestamp));

    let (clock, fraction) = match timestamp.rfind(|c: char| c == ',' || c == '.') {
        Some(pos) => (&timestamp[..pos], &timestamp[pos + 1..]),
        None => (timestamp, ""),
    };

    let fields = clock
        .split(':')
        .map(|field| {
            if field.is_empty() || !field.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid());
            }
            field.parse::<u64>().map_err(|_| invalid())
        })
        .collect::<Result<Vec<u64>>>()?;

    let (hours, minutes, secs) = match fields.as_slice() {
        [h, m, s] => (*h, *m, *s),
        [m, s] => (0, *m, *s),
        _ => return Err(invalid()),
    };
    if minutes >= 60 || secs >= 60 {
        return Err(invalid());
    }

    if !fraction.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let millis = fraction
        .chars()
        .chain(std::iter::repeat('0'))
        .take(3)
        .collect::<String>()
        .parse::<u64>()
        .map_err(|_| invalid())?;

    let total_milliseconds = hours
        .checked_mul(3_600_000)
        .and_then(|ms| ms.checked_add(minutes * 60_000 + secs * 1_000 + millis))
        .ok_or_else(invalid)?;
    Ok(total_milliseconds as f64 / 1000.0)
}

/// Parse a `start --> end [settings]` line
fn parse_timing_line(line: &str) -> Result<(f64, f64)> {
    let (start, rest) = line
        .split_once("-->")
        .ok_or_else(|| SubtrixError::FormatParse(format!("Missing '-->' in '{}'", line.trim())))?;

    let end = rest
        .split_whitespace()
        .next()
        .ok_or_else(|| SubtrixError::FormatParse(format!("Missing end time in '{}'", line.trim())))?;

    let start = parse_timestamp(start)?;
    let end = parse_timestamp(end)?;
    if end < start {
        return Err(SubtrixError::FormatParse(format!(
            "End time precedes start time in '{}'",
            line.trim()
        )));
    }

    Ok((start, end))
}

/// Split text into blocks of consecutive non-blank lines
fn split_blocks(content: &str) -> Vec<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut current = Vec::new();

    for line in content.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    blocks
}

fn is_vtt_metadata_block(first_line: &str) -> bool {
    let first_line = first_line.trim_start();
    first_line.starts_with("WEBVTT")
        || first_line.starts_with("NOTE")
        || first_line.starts_with("STYLE")
        || first_line.starts_with("REGION")
}

/// Parse SRT (or WebVTT) text into a track.
///
/// Blocks without a usable timestamp line or without text are skipped with a
/// warning so that damaged files still yield every readable cue.
pub fn parse_srt(content: &str) -> SubtitleTrack {
    let normalized = content
        .trim_start_matches('\u{feff}')
        .replace("\r\n", "\n")
        .replace('\r', "\n");

    let mut cues = Vec::new();
    let mut next_index = 1;

    for (block_number, block) in split_blocks(&normalized).into_iter().enumerate() {
        let block_number = block_number + 1;

        if is_vtt_metadata_block(block[0]) {
            debug!("Skipping WebVTT metadata block {}", block_number);
            continue;
        }

        let (index, rest) = match block[0].trim().parse::<usize>() {
            Ok(index) => (Some(index), &block[1..]),
            Err(_) if block[0].contains("-->") => (None, &block[..]),
            Err(_) => {
                warn!("Skipping subtitle block {}: no cue index or timestamp line", block_number);
                continue;
            }
        };

        let Some(timing_line) = rest.first() else {
            warn!("Skipping subtitle block {}: missing timestamp line", block_number);
            continue;
        };

        let (start_time, end_time) = match parse_timing_line(timing_line) {
            Ok(times) => times,
            Err(e) => {
                warn!("Skipping subtitle block {}: {}", block_number, e);
                continue;
            }
        };

        let lines: Vec<String> = rest[1..].iter().map(|l| l.to_string()).collect();
        if lines.is_empty() {
            warn!("Skipping subtitle block {}: missing text", block_number);
            continue;
        }

        let index = index.unwrap_or(next_index);
        next_index = index + 1;
        cues.push(Cue::new(index, start_time, end_time, lines));
    }

    SubtitleTrack::new(cues)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "1\n00:00:01,000 --> 00:00:02,500\nHello there.\n\n\
                          2\n00:00:03,250 --> 00:00:05,040\nGeneral Kenobi!\nYou are a bold one.\n\n";

    #[test]
    fn test_format_srt_time() {
        assert_eq!(format_timestamp(0.0), "00:00:00,000");
        assert_eq!(format_timestamp(65.123), "00:01:05,123");
        assert_eq!(format_timestamp(3661.500), "01:01:01,500");
        assert_eq!(format_timestamp(125.4), "00:02:05,400");
    }

    #[test]
    fn test_format_timestamp_truncates() {
        assert_eq!(format_timestamp(1.9999), "00:00:01,999");
        assert_eq!(format_timestamp(0.0004), "00:00:00,000");
        assert_eq!(format_timestamp(-3.0), "00:00:00,000");
        assert_eq!(format_timestamp(0.29), "00:00:00,290");
    }

    #[test]
    fn test_format_timestamp_wide_hours() {
        assert_eq!(format_timestamp(360_000.0), "100:00:00,000");
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("00:02:05,400").unwrap(), 125.4);
        assert_eq!(parse_timestamp("00:02:05.400").unwrap(), 125.4);
        assert_eq!(parse_timestamp("02:05.4").unwrap(), 125.4);
        assert_eq!(parse_timestamp("01:00:00").unwrap(), 3600.0);
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(parse_timestamp("").is_err());
        assert!(parse_timestamp("aa:bb:cc,ddd").is_err());
        assert!(parse_timestamp("00:61:00,000").is_err());
        assert!(parse_timestamp("1:2:3:4,000").is_err());
        assert!(parse_timestamp("00:00:01,-50").is_err());
    }

    #[test]
    fn test_parse_sample() {
        let track = parse_srt(SAMPLE);
        assert_eq!(track.len(), 2);
        assert_eq!(track.cues[0].index, 1);
        assert_eq!(track.cues[0].start_time, 1.0);
        assert_eq!(track.cues[0].end_time, 2.5);
        assert_eq!(track.cues[1].lines, vec!["General Kenobi!", "You are a bold one."]);
        assert_eq!(track.cues[1].end_time, 5.04);
    }

    #[test]
    fn test_format_of_parse_is_byte_identical() {
        assert_eq!(format_srt(&parse_srt(SAMPLE)), SAMPLE);
    }

    #[test]
    fn test_crlf_is_normalized() {
        let crlf = SAMPLE.replace('\n', "\r\n");
        assert_eq!(format_srt(&parse_srt(&crlf)), SAMPLE);
    }

    #[test]
    fn test_parse_of_format_preserves_track() {
        let track = SubtitleTrack::new(vec![
            Cue::new(1, 0.29, 1.09, vec!["first".into()]),
            Cue::new(2, 61.007, 67.999, vec!["second".into(), "line two".into()]),
            Cue::new(3, 3599.999, 3605.5, vec!["third".into()]),
        ]);

        let parsed = parse_srt(&format_srt(&track));
        assert_eq!(parsed.len(), track.len());
        for (original, reparsed) in track.iter().zip(parsed.iter()) {
            assert_eq!(reparsed.index, original.index);
            assert_eq!(reparsed.lines, original.lines);
            assert_eq!(format_timestamp(reparsed.start_time), format_timestamp(original.start_time));
            assert_eq!(format_timestamp(reparsed.end_time), format_timestamp(original.end_time));
        }
    }

    #[test]
    fn test_malformed_blocks_are_skipped() {
        let damaged = "1\n00:00:01,000 --> 00:00:02,000\nkept\n\n\
                       2\nnot a timestamp\nlost\n\n\
                       3\n00:00:04,000 --> 00:00:05,000\n\n\
                       just some words\n\n\
                       4\n\n\
                       5\n00:00:06,000 --> 00:00:07,000\nalso kept\n";
        let track = parse_srt(damaged);
        assert_eq!(track.len(), 2);
        assert_eq!(track.cues[0].lines, vec!["kept"]);
        assert_eq!(track.cues[1].index, 5);
        assert_eq!(track.cues[1].lines, vec!["also kept"]);
    }

    #[test]
    fn test_oversized_hours_are_skipped() {
        assert!(parse_timestamp("99999999999999999:00:00,000").is_err());

        let track = parse_srt(
            "1\n99999999999999999:00:00,000 --> 99999999999999999:00:01,000\nx\n\n\
             2\n00:00:01,000 --> 00:00:02,000\nkept\n",
        );
        assert_eq!(track.len(), 1);
        assert_eq!(track.cues[0].index, 2);
        assert_eq!(track.cues[0].lines, vec!["kept"]);
    }

    #[test]
    fn test_reversed_timing_is_skipped() {
        let track = parse_srt("1\n00:00:05,000 --> 00:00:01,000\nbackwards\n");
        assert!(track.is_empty());
    }

    #[test]
    fn test_parse_webvtt_dialect() {
        let vtt = "\u{feff}WEBVTT\n\nNOTE exported\n\n\
                   00:01.000 --> 00:02.500 align:start\nHello there.\n\n\
                   00:00:03.250 --> 00:00:05.040\nGeneral Kenobi!\n";
        let track = parse_srt(vtt);
        assert_eq!(track.len(), 2);
        assert_eq!(track.cues[0].index, 1);
        assert_eq!(track.cues[0].end_time, 2.5);
        assert_eq!(track.cues[1].index, 2);
        assert_eq!(track.cues[1].start_time, 3.25);
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_srt("").is_empty());
        assert_eq!(format_srt(&SubtitleTrack::default()), "");
    }
}
