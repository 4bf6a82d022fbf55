use crate::audio::SampleBuffer;
use crate::cursor::PlaybackCursor;
use crate::error::ParseError;
use crate::srt::Cue;
use crate::timecode::parse_time_range;

use nom::character::complete::{digit1, space0};
use nom::combinator::{all_consuming, map_res};
use nom::sequence::terminated;
use nom::IResult;
use tracing::{debug, trace};

/// Line-oriented reader for subtitle files. Keeps track of the current line so every
/// error can point at it.
pub struct Parser {
    line: usize,
}

impl Parser {
    pub fn new() -> Self {
        Self { line: 0 }
    }

    pub fn parse(&mut self, input: &str) -> Result<Vec<Cue>, ParseError> {
        self.line = 0;
        let input = input.strip_prefix('\u{FEFF}').unwrap_or(input);
        let mut lines = input.lines();
        let mut cues = Vec::new();

        while let Some(header) = self.next_non_blank(&mut lines) {
            let expected = cues.len() as u64 + 1;
            let found = sequence_number(header).ok_or(ParseError::MissingSequenceNumber {
                line: self.line,
            })?;
            if found != expected {
                return Err(ParseError::BadSequenceNumber {
                    line: self.line,
                    expected,
                    found,
                });
            }

            let range_line = self.line + 1;
            let (show_at, hide_at) = self
                .next_line(&mut lines)
                .and_then(|l| parse_time_range(l).ok())
                .ok_or(ParseError::MalformedTimestamp { line: range_line })?;

            let mut text = Vec::new();
            while let Some(line) = self.next_line(&mut lines) {
                if is_blank(line) {
                    break;
                }
                text.push(line);
            }

            cues.push(Cue {
                sequence_number: found,
                show_at,
                hide_at,
                text: text.join("\n"),
                line: range_line,
            });
        }

        Ok(cues)
    }

    fn next_line<'a, I>(&mut self, lines: &mut I) -> Option<&'a str>
    where
        I: Iterator<Item = &'a str>,
    {
        let line = lines.next()?;
        self.line += 1;
        Some(line)
    }

    fn next_non_blank<'a, I>(&mut self, lines: &mut I) -> Option<&'a str>
    where
        I: Iterator<Item = &'a str>,
    {
        while let Some(line) = self.next_line(lines) {
            if !is_blank(line) {
                return Some(line);
            }
        }
        None
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

fn is_blank(line: &str) -> bool {
    line.trim_end_matches('\r').is_empty()
}

fn seq_num(input: &str) -> IResult<&str, u64> {
    map_res(digit1, |s: &str| s.parse())(input)
}

fn sequence_number(line: &str) -> Option<u64> {
    all_consuming(terminated(seq_num, space0))(line.trim_end_matches('\r'))
        .ok()
        .map(|(_, n)| n)
}

/// Rebuilds the segment partition of `buffer` from parsed cues. Each cue start becomes a
/// segment boundary, except a start of zero, which is the first segment already. Starts are
/// clamped to the buffer, and a start that is already a boundary only replaces that
/// segment's text.
pub fn reconstruct(buffer: SampleBuffer, cues: &[Cue]) -> PlaybackCursor {
    let mut cursor = PlaybackCursor::new(buffer);
    let sample_rate = cursor.buffer().sample_rate();

    for cue in cues {
        let frame = cue.show_at.to_frame(sample_rate);
        cursor.seek(frame);
        if frame > 0 && !cursor.add_segment() {
            trace!(line = cue.line, start = %cue.show_at, "cue start is not a new boundary");
        }
        cursor.set_current_text(&cue.text);
    }

    cursor.rewind();
    debug!(cues = cues.len(), segments = cursor.timeline().len(), "rebuilt timeline");
    cursor
}

/// Parses subtitle text and rebuilds the timeline over `buffer` in one step.
pub fn deserialize(input: &str, buffer: SampleBuffer) -> Result<PlaybackCursor, ParseError> {
    let cues = Parser::new().parse(input)?;
    Ok(reconstruct(buffer, &cues))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn silence(seconds: usize) -> SampleBuffer {
        SampleBuffer::new(vec![0.0; seconds * 1000], 1, 1000).unwrap()
    }

    fn starts(cursor: &PlaybackCursor) -> Vec<usize> {
        cursor.timeline().segments().iter().map(|s| s.start).collect()
    }

    macro_rules! test_parse_error {
        ($($name:ident: $value:expr,)*) => {
        $(
            #[test]
            fn $name() {
                let (input, expected) = $value;

                assert_eq!(Parser::new().parse(input), Err(expected));
            }
        )*
        }
    }

    test_parse_error! {
        test_parse_error_0: (
            "2\n00:00:01,000 --> 00:00:02,000\nhello\n",
            ParseError::BadSequenceNumber { line: 1, expected: 1, found: 2 }
        ),
        test_parse_error_1: (
            "hello\n00:00:01,000 --> 00:00:02,000\n",
            ParseError::MissingSequenceNumber { line: 1 }
        ),
        test_parse_error_2: (
            "\n\n1\n00:00:01 --> 00:00:02,000\nhello\n",
            ParseError::MalformedTimestamp { line: 4 }
        ),
        test_parse_error_3: (
            "1\n",
            ParseError::MalformedTimestamp { line: 2 }
        ),
        test_parse_error_4: (
            "1\n00:00:00,000 --> 00:00:01,000\na\n\n3\n00:00:01,000 --> 00:00:02,000\nb\n",
            ParseError::BadSequenceNumber { line: 5, expected: 2, found: 3 }
        ),
        test_parse_error_5: (
            "1\n00:00:00,000 --> 00:00:01,000\na\n\nb\n",
            ParseError::MissingSequenceNumber { line: 5 }
        ),
    }

    #[test]
    fn parses_multiline_cues() {
        let input = "1\n00:00:00,000 --> 00:00:01,500\nfirst line\nsecond line\n\n\n\
                     2\n00:00:01,500 --> 00:00:03,000\nthird\n";
        let cues = Parser::new().parse(input).unwrap();
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].text, "first line\nsecond line");
        assert_eq!(cues[0].hide_at.total_millis(), 1500);
        assert_eq!(cues[1].sequence_number, 2);
        assert_eq!(cues[1].show_at.total_millis(), 1500);
        assert_eq!(cues[1].text, "third");
        assert_eq!(cues[1].line, 8);
    }

    #[test]
    fn accepts_bom_and_crlf() {
        let input = "\u{FEFF}1\r\n00:00:00,000 --> 00:00:01,000\r\nhello\r\n\r\n\
                     2 \r\n00:00:01,000 --> 00:00:02,000\r\nworld\r\n";
        let cues = Parser::new().parse(input).unwrap();
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].text, "hello");
        assert_eq!(cues[1].text, "world");
    }

    #[test]
    fn empty_input_has_no_cues() {
        assert_eq!(Parser::new().parse(""), Ok(vec![]));
        assert_eq!(Parser::new().parse("\n\n"), Ok(vec![]));
    }

    #[test]
    fn cue_without_text() {
        let cues = Parser::new()
            .parse("1\n00:00:00,000 --> 00:00:01,000\n\n2\n00:00:01,000 --> 00:00:02,000\n")
            .unwrap();
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].text, "");
        assert_eq!(cues[1].text, "");
    }

    #[test]
    fn rebuilds_segments_from_cues() {
        let input = "1\n00:00:00,000 --> 00:00:01,000\nzero\n\n\
                     2\n00:00:01,250 --> 00:00:02,000\none\n\n\
                     3\n00:00:02,000 --> 00:00:04,000\ntwo\n";
        let cursor = deserialize(input, silence(4)).unwrap();
        assert_eq!(starts(&cursor), vec![0, 1250, 2000]);
        let texts: Vec<&str> = cursor.timeline().segments().iter().map(|s| s.text()).collect();
        assert_eq!(texts, vec!["zero", "one", "two"]);
        assert_eq!((cursor.position(), cursor.current_index()), (0, 0));
    }

    #[test]
    fn first_cue_after_zero_keeps_leading_segment() {
        let input = "1\n00:00:01,000 --> 00:00:02,000\nlate\n";
        let cursor = deserialize(input, silence(3)).unwrap();
        assert_eq!(starts(&cursor), vec![0, 1000]);
        assert_eq!(cursor.timeline().segments()[0].text(), "");
        assert_eq!(cursor.timeline().segments()[1].text(), "late");
    }

    #[test]
    fn repeated_start_replaces_text() {
        let input = "1\n00:00:00,000 --> 00:00:01,000\na\n\n\
                     2\n00:00:01,000 --> 00:00:01,000\nb\n\n\
                     3\n00:00:01,000 --> 00:00:03,000\nc\n";
        let cursor = deserialize(input, silence(4)).unwrap();
        assert_eq!(starts(&cursor), vec![0, 1000]);
        let texts: Vec<&str> = cursor.timeline().segments().iter().map(|s| s.text()).collect();
        assert_eq!(texts, vec!["a", "c"]);
    }

    #[test]
    fn out_of_order_cues_still_load() {
        let input = "1\n00:00:02,000 --> 00:00:03,000\na\n\n\
                     2\n00:00:01,000 --> 00:00:02,000\nb\n";
        let cursor = deserialize(input, silence(4)).unwrap();
        assert_eq!(starts(&cursor), vec![0, 1000, 2000]);
        assert_eq!(cursor.timeline().segments()[1].text(), "b");
        assert_eq!(cursor.timeline().segments()[2].text(), "a");
    }

    #[test]
    fn cue_past_the_end_lands_on_last_segment() {
        let input = "1\n00:00:00,000 --> 00:00:01,000\na\n\n\
                     2\n00:00:05,000 --> 00:00:06,000\nb\n";
        let cursor = deserialize(input, silence(4)).unwrap();
        assert_eq!(starts(&cursor), vec![0]);
        assert_eq!(cursor.timeline().segments()[0].text(), "b");
    }
}
