//! G-Code line tokenization
//!
//! Splits one source line into its command word, parameter words and
//! trailing `;` comment. Parenthesised comments, line numbers (`N123`) and
//! checksums (`*45`) are dropped.

/// Command word of a line, e.g. `G1` or `M82`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandCode {
    /// Upper-case command letter (`G`, `M` or `T`)
    pub letter: char,
    /// Major number (`G01` and `G1` both give 1)
    pub number: u16,
    /// Minor number after a dot (`G92.1` gives 1)
    pub subcode: Option<u16>,
}

impl CommandCode {
    /// Whether this is exactly `letter``number` without a subcode
    pub fn is(&self, letter: char, number: u16) -> bool {
        self.letter == letter && self.number == number && self.subcode.is_none()
    }
}

impl std::fmt::Display for CommandCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.subcode {
            Some(sub) => write!(f, "{}{}.{}", self.letter, self.number, sub),
            None => write!(f, "{}{}", self.letter, self.number),
        }
    }
}

/// One tokenized line of G-code
#[derive(Debug, Clone)]
pub struct GcodeLine<'a> {
    /// Command word, if the line has one
    pub command: Option<CommandCode>,
    /// Text after the first `;`, without the `;`
    pub comment: Option<&'a str>,
    params: [Option<&'a str>; 26],
}

impl<'a> GcodeLine<'a> {
    /// Tokenize a line (without its line terminator)
    pub fn parse(line: &'a str) -> Self {
        let (code, comment) = match line.find(';') {
            Some(idx) => (&line[..idx], Some(&line[idx + 1..])),
            None => (line, None),
        };

        let mut parsed = Self {
            command: None,
            comment,
            params: [None; 26],
        };

        let bytes = code.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            let c = bytes[i];
            if c == b'(' {
                // Skip parenthesised comment
                while i < bytes.len() && bytes[i] != b')' {
                    i += 1;
                }
                i += 1;
                continue;
            }
            if c == b'*' {
                break;
            }
            if !c.is_ascii_alphabetic() {
                i += 1;
                continue;
            }

            let letter = c.to_ascii_uppercase();
            let start = i + 1;
            let mut end = start;
            while end < bytes.len() && is_value_byte(bytes[end]) {
                end += 1;
            }
            let value = &code[start..end];
            i = end;

            match letter {
                b'N' => {}
                b'G' | b'M' | b'T' if parsed.command.is_none() => {
                    parsed.command = parse_code(letter as char, value);
                    // String-argument commands (M117 and friends) carry no axis words
                    if parsed
                        .command
                        .is_some_and(|cmd| cmd.letter == 'M' && matches!(cmd.number, 117 | 118 | 23 | 28 | 30))
                    {
                        break;
                    }
                }
                _ => {
                    let slot = &mut parsed.params[(letter - b'A') as usize];
                    if slot.is_none() {
                        *slot = Some(value);
                    }
                }
            }
        }

        parsed
    }

    /// Whether the line's command is exactly `letter``number`
    pub fn is(&self, letter: char, number: u16) -> bool {
        self.command.is_some_and(|cmd| cmd.is(letter, number))
    }

    /// Whether a parameter word is present
    pub fn has_param(&self, letter: char) -> bool {
        self.raw_param(letter).is_some()
    }

    /// Raw text of a parameter word
    pub fn raw_param(&self, letter: char) -> Option<&'a str> {
        let letter = letter.to_ascii_uppercase();
        if !letter.is_ascii_uppercase() {
            return None;
        }
        self.params[(letter as u8 - b'A') as usize]
    }

    /// Numeric value of a parameter word
    ///
    /// Returns `Err` with the raw text when the word is present but not a
    /// number.
    pub fn param(&self, letter: char) -> Result<Option<f32>, &'a str> {
        match self.raw_param(letter) {
            None => Ok(None),
            Some(raw) => raw.parse::<f32>().map(Some).map_err(|_| raw),
        }
    }

    /// Whether the line carries neither a command nor a comment
    pub fn is_empty(&self) -> bool {
        self.command.is_none() && self.comment.is_none()
    }
}

fn is_value_byte(b: u8) -> bool {
    b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'+')
}

fn parse_code(letter: char, value: &str) -> Option<CommandCode> {
    let (major, minor) = match value.split_once('.') {
        Some((major, minor)) => (major, Some(minor)),
        None => (value, None),
    };
    let number = major.parse::<u16>().ok()?;
    let subcode = match minor {
        Some(minor) => Some(minor.parse::<u16>().ok()?),
        None => None,
    };
    Some(CommandCode {
        letter,
        number,
        subcode,
    })
}
