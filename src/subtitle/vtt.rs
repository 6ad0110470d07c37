use super::srt::format_timestamp_with;
use super::SubtitleTrack;

/// Render a track as WebVTT: header, unnumbered cues, `.` as the millisecond separator
pub fn format_vtt(track: &SubtitleTrack) -> String {
    let mut vtt_content = String::from("WEBVTT\n\n");

    for cue in &track.cues {
        vtt_content.push_str(&format!(
            "{} --> {}\n",
            format_timestamp_with(cue.start_time, '.'),
            format_timestamp_with(cue.end_time, '.'),
        ));
        for line in &cue.lines {
            vtt_content.push_str(line);
            vtt_content.push('\n');
        }
        vtt_content.push('\n');
    }

    vtt_content
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subtitle::{parse_srt, Cue};

    #[test]
    fn test_format_vtt() {
        let track = SubtitleTrack::new(vec![
            Cue::new(1, 1.0, 2.5, vec!["Hello there.".into()]),
            Cue::new(2, 125.4, 127.0, vec!["Two".into(), "lines".into()]),
        ]);

        assert_eq!(
            format_vtt(&track),
            "WEBVTT\n\n\
             00:00:01.000 --> 00:00:02.500\nHello there.\n\n\
             00:02:05.400 --> 00:02:07.000\nTwo\nlines\n\n"
        );
    }

    #[test]
    fn test_vtt_reads_back_through_parser() {
        let track = SubtitleTrack::new(vec![
            Cue::new(1, 0.5, 1.75, vec!["one".into()]),
            Cue::new(2, 2.0, 3.0, vec!["two".into()]),
        ]);
        assert_eq!(parse_srt(&format_vtt(&track)), track);
    }
}
