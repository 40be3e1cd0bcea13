use super::reader::BitReader;
use super::DecodeError;

// codes are at most 12 bits wide, so the table never exceeds 4096 entries
const MAX_CODE_COUNT: usize = 1 << 12;
const NO_PREFIX: u16 = u16::MAX;

/// The growing code table, stored as an arena of (prefix, appended index)
/// pairs so long runs never materialize their full strings per entry.
/// Arena position equals code value; the clear and end codes occupy
/// placeholder slots that are never expanded.
struct CodeTable {
    prefixes: Vec<u16>,
    suffixes: Vec<u8>,
    firsts: Vec<u8>,
    literal_count: u16,
}

impl CodeTable {
    fn new(minimum_code_size: u8) -> Self {
        let mut table = Self {
            prefixes: Vec::with_capacity(MAX_CODE_COUNT),
            suffixes: Vec::with_capacity(MAX_CODE_COUNT),
            firsts: Vec::with_capacity(MAX_CODE_COUNT),
            literal_count: 1 << minimum_code_size,
        };
        table.reset();
        table
    }

    fn reset(&mut self) {
        self.prefixes.clear();
        self.suffixes.clear();
        self.firsts.clear();
        for index in 0..self.literal_count {
            self.prefixes.push(NO_PREFIX);
            self.suffixes.push(index as u8);
            self.firsts.push(index as u8);
        }
        // placeholder slots for the clear and end codes
        for _ in 0..2 {
            self.prefixes.push(NO_PREFIX);
            self.suffixes.push(0);
            self.firsts.push(0);
        }
    }

    fn len(&self) -> usize {
        self.prefixes.len()
    }

    fn is_full(&self) -> bool {
        self.len() == MAX_CODE_COUNT
    }

    fn first(&self, code: u16) -> u8 {
        self.firsts[code as usize]
    }

    fn push(&mut self, prefix: u16, suffix: u8) {
        self.prefixes.push(prefix);
        self.suffixes.push(suffix);
        self.firsts.push(self.firsts[prefix as usize]);
    }

    /// Append the string behind `code` to `out` by walking the prefix chain.
    fn expand(&self, code: u16, out: &mut Vec<u8>) {
        let start = out.len();
        let mut current = code;
        loop {
            out.push(self.suffixes[current as usize]);
            match self.prefixes[current as usize] {
                NO_PREFIX => break,
                prefix => current = prefix,
            }
        }
        out[start..].reverse();
    }
}

/// Decompress one image block's concatenated sub-block data into at most
/// `pixel_count` color indices.
///
/// A bitstream that runs out before the end code is not an error; whatever
/// was produced up to that point is returned.
pub(crate) fn lzw_decode(
    data: &[u8],
    minimum_code_size: u8,
    pixel_count: usize,
) -> Result<Vec<u8>, DecodeError> {
    if minimum_code_size > 11 {
        return Err(DecodeError::InvalidMinimumCodeSize(minimum_code_size));
    }

    let clear_code = 1u16 << minimum_code_size;
    let end_code = clear_code + 1;

    let mut table = CodeTable::new(minimum_code_size);
    let mut code_size = minimum_code_size + 1;
    let mut reader = BitReader::new(data);
    let mut indices = Vec::with_capacity(pixel_count);
    let mut previous: Option<u16> = None;

    while indices.len() < pixel_count {
        let Some(code) = reader.next(code_size) else {
            break;
        };

        if code == clear_code {
            table.reset();
            code_size = minimum_code_size + 1;
            previous = None;
            continue;
        }
        if code == end_code {
            break;
        }

        if (code as usize) < table.len() {
            table.expand(code, &mut indices);
            if let Some(prefix) = previous {
                if !table.is_full() {
                    let first = table.first(code);
                    table.push(prefix, first);
                }
            }
        } else if code as usize == table.len() && !table.is_full() {
            // the classic self-reference: the encoder used the entry it was
            // adding at that very moment, so it must extend the previous
            // string with its own first index
            let Some(prefix) = previous else {
                return Err(DecodeError::InvalidLzwCode(code));
            };
            let first = table.first(prefix);
            table.push(prefix, first);
            table.expand(code, &mut indices);
        } else {
            return Err(DecodeError::InvalidLzwCode(code));
        }

        if table.len() == (1usize << code_size) && code_size < 12 {
            code_size += 1;
        }
        previous = Some(code);
    }

    indices.truncate(pixel_count);
    Ok(indices)
}
