//! Character channels between the machine and its surroundings.
//!
//! Program input, program output and debugger commands are three separate
//! channels, so a driver can back them with one terminal while a test feeds
//! each from its own script. The byte adapters here read one byte per call
//! from the underlying reader and never buffer ahead: two adapters over
//! [`std::io::stdin`] share stdin's buffer without stealing from each other.

use std::io::{self, ErrorKind, Read, Write};

/// Source of program input, consumed by `in`.
pub trait CharInput {
    /// Reads one character. [`None`] at end of input.
    fn read_char(&mut self) -> io::Result<Option<char>>;

    /// Discards the rest of the current whitespace-delimited token: leading
    /// blanks are skipped, then everything up to (not including) the next
    /// whitespace character.
    fn skip_token(&mut self) -> io::Result<()>;
}

/// Sink of program output, fed by `out`.
pub trait CharOutput {
    fn write_char(&mut self, c: char) -> io::Result<()>;
    fn flush_chars(&mut self) -> io::Result<()>;
}

impl<W: Write> CharOutput for W {
    fn write_char(&mut self, c: char) -> io::Result<()> {
        let mut buf = [0; 4];
        self.write_all(c.encode_utf8(&mut buf).as_bytes())
    }

    fn flush_chars(&mut self) -> io::Result<()> {
        self.flush()
    }
}

/// Source of debugger command lines.
pub trait CommandSource {
    /// Reads one line without its line terminator. [`None`] at end of input.
    fn read_command(&mut self) -> io::Result<Option<String>>;
}

fn read_byte<R: Read>(reader: &mut R) -> io::Result<Option<u8>> {
    let mut byte = [0];
    loop {
        match reader.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(byte[0])),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

/// UTF-8 character reader over a byte stream. Malformed sequences read as
/// [`char::REPLACEMENT_CHARACTER`].
///
/// ```
/// # use synvm_base::io::{CharInput, Chars};
/// let mut input = Chars::new("hé\n".as_bytes());
///
/// assert_eq!(input.read_char().unwrap(), Some('h'));
/// assert_eq!(input.read_char().unwrap(), Some('é'));
/// assert_eq!(input.read_char().unwrap(), Some('\n'));
/// assert_eq!(input.read_char().unwrap(), None);
/// ```
#[derive(Debug)]
pub struct Chars<R> {
    reader: R,
    pending: Option<char>,
}

impl<R: Read> Chars<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            pending: None,
        }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    fn decode_next(&mut self) -> io::Result<Option<char>> {
        let Some(first) = read_byte(&mut self.reader)? else {
            return Ok(None);
        };
        let width = match first {
            0x00..=0x7f => return Ok(Some(first as char)),
            0xc0..=0xdf => 2,
            0xe0..=0xef => 3,
            0xf0..=0xf7 => 4,
            _ => return Ok(Some(char::REPLACEMENT_CHARACTER)),
        };

        let mut buf = [first, 0, 0, 0];
        for slot in &mut buf[1..width] {
            match read_byte(&mut self.reader)? {
                Some(byte) => *slot = byte,
                None => return Ok(Some(char::REPLACEMENT_CHARACTER)),
            }
        }

        let c = std::str::from_utf8(&buf[..width])
            .ok()
            .and_then(|s| s.chars().next())
            .unwrap_or(char::REPLACEMENT_CHARACTER);
        Ok(Some(c))
    }
}

impl<R: Read> CharInput for Chars<R> {
    fn read_char(&mut self) -> io::Result<Option<char>> {
        match self.pending.take() {
            Some(c) => Ok(Some(c)),
            None => self.decode_next(),
        }
    }

    fn skip_token(&mut self) -> io::Result<()> {
        let mut next = loop {
            match self.read_char()? {
                Some(' ' | '\t') => continue,
                other => break other,
            }
        };
        while let Some(c) = next {
            if c.is_whitespace() {
                self.pending = Some(c);
                break;
            }
            next = self.read_char()?;
        }
        Ok(())
    }
}

/// Line reader over a byte stream. Strips `\n` and a preceding `\r`.
///
/// ```
/// # use synvm_base::io::{CommandSource, Lines};
/// let mut commands = Lines::new(&b"w\r\n\ncf"[..]);
///
/// assert_eq!(commands.read_command().unwrap().as_deref(), Some("w"));
/// assert_eq!(commands.read_command().unwrap().as_deref(), Some(""));
/// assert_eq!(commands.read_command().unwrap().as_deref(), Some("cf"));
/// assert_eq!(commands.read_command().unwrap(), None);
/// ```
#[derive(Debug)]
pub struct Lines<R> {
    reader: R,
}

impl<R: Read> Lines<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read> CommandSource for Lines<R> {
    fn read_command(&mut self) -> io::Result<Option<String>> {
        let mut line = Vec::new();
        loop {
            match read_byte(&mut self.reader)? {
                Some(b'\n') => break,
                Some(byte) => line.push(byte),
                None if line.is_empty() => return Ok(None),
                None => break,
            }
        }
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Ok(Some(String::from_utf8_lossy(&line).into_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain<R: Read>(input: &mut Chars<R>) -> String {
        let mut s = String::new();
        while let Some(c) = input.read_char().unwrap() {
            s.push(c);
        }
        s
    }

    #[test]
    fn malformed_utf8_is_replaced() {
        let mut input = Chars::new(&[b'a', 0xff, 0xe2, 0x82, b'b', 0xc3][..]);

        // 0xe2 0x82 'b' is a broken three-byte sequence and swallows the 'b'
        assert_eq!(drain(&mut input), "a\u{fffd}\u{fffd}\u{fffd}");
    }

    #[test]
    fn skip_token_stops_at_whitespace() {
        // (input after the hook character, what is left afterwards)
        let cases: [(&str, &str); 5] = [
            (" secret\nlook\n", "\nlook\n"),
            ("xyzzy rest",      " rest"),
            ("\nnext",          "\nnext"),
            ("  \t tok",        ""),
            ("",                ""),
        ];

        for (idx, (text, left)) in cases.into_iter().enumerate() {
            let mut input = Chars::new(text.as_bytes());
            input.skip_token().unwrap();
            assert_eq!(drain(&mut input), left, "Testing case #{idx}: {text:?}");
        }
    }

    #[test]
    fn lines_without_terminator() {
        let mut lines = Lines::new(&b"d\nlast"[..]);

        assert_eq!(lines.read_command().unwrap().as_deref(), Some("d"));
        assert_eq!(lines.read_command().unwrap().as_deref(), Some("last"));
        assert_eq!(lines.read_command().unwrap(), None);
    }

    #[test]
    fn channels_share_one_reader() {
        let mut source: &[u8] = b"cf\nab";
        Lines::new(&mut source).read_command().unwrap();
        let mut input = Chars::new(&mut source);

        assert_eq!(input.read_char().unwrap(), Some('a'));
    }

    #[test]
    fn output_is_utf8() {
        let mut out = Vec::new();
        for c in ['o', 'k', '→'] {
            out.write_char(c).unwrap();
        }
        out.flush_chars().unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "ok→");
    }
}
