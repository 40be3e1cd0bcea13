#![allow(dead_code)]

use super::compositor::{Canvas, Frame};
use super::deinterlace::deinterlace;
use super::lzw::lzw_decode;
use super::reader::ByteReader;
use super::{DecodeError, DisposalMethod};

use log::{debug, warn};

const EXTENSION_INTRODUCER: u8 = 0x21;
const IMAGE_DESCRIPTOR_LABEL: u8 = 0x2c;
const TRAILER_LABEL: u8 = 0x3b;

// Extension labels
const APPLICATION_EXTENSION: u8 = 0xff;
const COMMENT_EXTENSION: u8 = 0xfe;
const GRAPHIC_CONTROL_EXTENSION: u8 = 0xf9;
const PLAIN_TEXT_EXTENSION: u8 = 0x01;

#[derive(Debug)]
enum ExtensionType {
    Application,
    Comment,
    GraphicControl,
    PlainText,
}

impl ExtensionType {
    fn from_label(value: u8) -> Option<Self> {
        use ExtensionType::*;

        match value {
            APPLICATION_EXTENSION => Some(Application),
            COMMENT_EXTENSION => Some(Comment),
            GRAPHIC_CONTROL_EXTENSION => Some(GraphicControl),
            PLAIN_TEXT_EXTENSION => Some(PlainText),

            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct GraphicControlExtension {
    pub(crate) disposal_method: DisposalMethod,
    pub(crate) user_input_flag: bool,
    pub(crate) transparent_color_flag: bool,

    pub(crate) delay_time: u16,
    pub(crate) transparent_color_index: u8,
}

#[derive(Debug)]
pub(crate) struct TableBasedImage {
    // includes image descriptor inline
    pub(crate) left_position: u16,
    pub(crate) top_position: u16,

    pub(crate) width: u16,
    pub(crate) height: u16,

    pub(crate) interlace_flag: bool,
    pub(crate) sort_flag: bool,

    pub(crate) local_color_table: Option<Box<[u8]>>,

    pub(crate) image_indexes: Option<Box<[u8]>>,
}

#[derive(Debug)]
struct GraphicBlock {
    extension: Option<GraphicControlExtension>,
    render_block: TableBasedImage,
}

/// Extension blocks that never influence frame output, kept as parsed
/// metadata.
#[derive(Debug)]
pub enum SpecialPurposeExtension {
    ApplicationBlock {
        application_identifier: Box<str>,
        application_authentication_code: Box<[u8]>,
        application_data: Box<[u8]>,
    },
    CommentBlock(Box<[u8]>),
    PlainTextBlock {
        text: Box<str>,
        grid_left: u16,
        grid_top: u16,
        grid_width: u16,
        grid_height: u16,
        cell_width: u8,
        cell_height: u8,
        foreground_color_index: u8,
        background_color_index: u8,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    V87a,
    V89a,
}

impl TryFrom<&[u8]> for Version {
    type Error = DecodeError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        match value {
            b"87a" => Ok(Version::V87a),
            b"89a" => Ok(Version::V89a),
            version => Err(DecodeError::UnsupportedVersion(
                String::from_utf8_lossy(version).into_owned(),
            )),
        }
    }
}

/// How often the animation repeats, from the NETSCAPE 2.0 application block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopCount {
    Infinite,
    Number(u16),
}

#[derive(Debug)]
struct LogicalScreenDescriptor {
    screen_width: u16,
    screen_height: u16,
    color_resolution: u8,
    sort_flag: bool,
    background_color_index: u8,
    pixel_aspect_ratio: u8,
}

#[derive(Debug)]
enum ParserState {
    DetermineNextBlock(Option<GraphicControlExtension>),
    ProcessExtension(u8),
    ProcessImageDescriptor(Option<GraphicControlExtension>),
    ProcessLocalColorTable(GraphicBlock, usize),
    ProcessImageData(GraphicBlock),
    ProcessTrailer,

    Done,
}

/// Lazy GIF decoder over an in-memory byte buffer.
///
/// The header and global color table are parsed up front; each call to
/// [`Iterator::next`] then consumes blocks until one composited frame is
/// ready, so a caller can interleave decoding with other work at block
/// boundaries.
#[derive(Debug)]
pub struct Decoder<'a> {
    reader: ByteReader<'a>,
    version: Version,
    logical_screen_descriptor: LogicalScreenDescriptor,
    global_color_table: Option<Box<[u8]>>,
    special_purpose_extensions: Vec<SpecialPurposeExtension>,
    loop_count: Option<LoopCount>,
    canvas: Canvas,
    state: ParserState,
}

/// Decode a complete GIF byte buffer into a lazy sequence of frames.
///
/// Header problems surface here; block-level problems surface from the
/// returned iterator. A truncated stream ends the iteration after the
/// frames that could still be produced.
pub fn decode(bytes: &[u8]) -> Result<Decoder<'_>, DecodeError> {
    Decoder::new(bytes)
}

/// Read only the logical screen size, without touching any block data.
pub fn probe_size(bytes: &[u8]) -> Result<(u16, u16), DecodeError> {
    let mut reader = ByteReader::new(bytes);
    if reader.read_bytes(3)? != b"GIF" {
        return Err(DecodeError::InvalidSignature);
    }
    Version::try_from(reader.read_bytes(3)?)?;

    let screen_width = reader.read_u16()?;
    let screen_height = reader.read_u16()?;
    Ok((screen_width, screen_height))
}

impl<'a> Decoder<'a> {
    pub fn new(bytes: &'a [u8]) -> Result<Self, DecodeError> {
        let mut reader = ByteReader::new(bytes);

        let signature = reader.read_bytes(3)?;
        if signature != b"GIF" {
            return Err(DecodeError::InvalidSignature);
        }
        let version = Version::try_from(reader.read_bytes(3)?)?;
        debug!("processed signature, version {:?}", version);

        let screen_width = reader.read_u16()?;
        let screen_height = reader.read_u16()?;

        let packed_fields = reader.read_byte()?;

        // packed field start
        let global_color_table_flag = packed_fields & 0b1000_0000 != 0;
        let color_resolution = (packed_fields >> 4) & 0b0000_0111;
        let sort_flag = packed_fields & 0b0000_1000 != 0;
        let global_color_table_size = 3 * 2_usize.pow(((packed_fields & 0b0000_0111) + 1).into());
        // packed field end

        let background_color_index = reader.read_byte()?;
        let pixel_aspect_ratio = reader.read_byte()?;

        let logical_screen_descriptor = LogicalScreenDescriptor {
            screen_width,
            screen_height,
            color_resolution,
            sort_flag,
            background_color_index,
            pixel_aspect_ratio,
        };
        debug!(
            "processed logical screen descriptor, got: {:#?}",
            logical_screen_descriptor
        );

        let global_color_table: Option<Box<[u8]>> = if global_color_table_flag {
            Some(reader.read_bytes(global_color_table_size)?.into())
        } else {
            None
        };

        // without a global table the screen starts out fully transparent
        let background = match &global_color_table {
            Some(table) => {
                let offset = usize::from(background_color_index) * 3;
                match table.get(offset..offset + 3) {
                    Some(rgb) => [rgb[0], rgb[1], rgb[2], 255],
                    None => [0; 4],
                }
            }
            None => [0; 4],
        };

        Ok(Self {
            reader,
            version,
            logical_screen_descriptor,
            global_color_table,
            special_purpose_extensions: Vec::new(),
            loop_count: None,
            canvas: Canvas::new(screen_width, screen_height, background),
            state: ParserState::DetermineNextBlock(None),
        })
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn screen_size(&self) -> (u16, u16) {
        (
            self.logical_screen_descriptor.screen_width,
            self.logical_screen_descriptor.screen_height,
        )
    }

    pub fn loop_count(&self) -> Option<LoopCount> {
        self.loop_count
    }

    /// Application, comment, and plain-text blocks seen so far.
    pub fn special_purpose_extensions(&self) -> &[SpecialPurposeExtension] {
        &self.special_purpose_extensions
    }

    fn process_next_state(
        &mut self,
        next_state: ParserState,
    ) -> Result<(ParserState, Option<Frame>), DecodeError> {
        use ParserState::*;

        match next_state {
            DetermineNextBlock(graphic_control_extension) => {
                let introducer_or_label = self.reader.read_byte()?;

                match introducer_or_label {
                    // extension introducer means that a label follows determining what exact type
                    // of extension it is. a pending graphic control only ever
                    // applies to the very next image, so any extension
                    // replaces it.
                    EXTENSION_INTRODUCER => Ok((ProcessExtension(self.reader.read_byte()?), None)),
                    IMAGE_DESCRIPTOR_LABEL => {
                        Ok((ProcessImageDescriptor(graphic_control_extension), None))
                    }
                    TRAILER_LABEL => Ok((ProcessTrailer, None)),
                    label => {
                        // skip forward instead of aborting; some writers pad
                        // between blocks
                        warn!("skipping unexpected block label 0x{:02x}", label);
                        Ok((DetermineNextBlock(graphic_control_extension), None))
                    }
                }
            }
            ProcessExtension(label) => Ok((self.process_extension(label)?, None)),
            ProcessImageDescriptor(graphic_control_extension) => {
                let left_position = self.reader.read_u16()?;
                let top_position = self.reader.read_u16()?;

                let width = self.reader.read_u16()?;
                let height = self.reader.read_u16()?;

                let packed_fields = self.reader.read_byte()?;

                let local_color_table_flag = packed_fields & 0b1000_0000 != 0;
                let interlace_flag = packed_fields & 0b0100_0000 != 0;
                let sort_flag = packed_fields & 0b0010_0000 != 0;
                let local_color_table_size =
                    3 * 2_usize.pow(((packed_fields & 0b0000_0111) + 1).into());

                let graphic_block = GraphicBlock {
                    extension: graphic_control_extension,
                    render_block: TableBasedImage {
                        left_position,
                        top_position,
                        width,
                        height,
                        interlace_flag,
                        sort_flag,

                        local_color_table: None,
                        image_indexes: None,
                    },
                };

                let next_state = if local_color_table_flag {
                    ProcessLocalColorTable(graphic_block, local_color_table_size)
                } else {
                    ProcessImageData(graphic_block)
                };

                Ok((next_state, None))
            }
            ProcessLocalColorTable(mut graphic_block, size) => {
                graphic_block.render_block.local_color_table =
                    Some(self.reader.read_bytes(size)?.into());

                Ok((ProcessImageData(graphic_block), None))
            }
            ProcessImageData(mut graphic_block) => {
                let lzw_code_size = self.reader.read_byte()?;
                let data_stream = self.reader.read_sub_blocks()?;

                let render_block = &graphic_block.render_block;
                let pixel_count =
                    usize::from(render_block.width) * usize::from(render_block.height);
                let mut indexes = lzw_decode(&data_stream, lzw_code_size, pixel_count)?;
                if indexes.len() < pixel_count {
                    warn!(
                        "image data ended after {} of {} indices",
                        indexes.len(),
                        pixel_count
                    );
                }
                if render_block.interlace_flag {
                    indexes = deinterlace(&indexes, render_block.width, render_block.height);
                }
                graphic_block.render_block.image_indexes = Some(indexes.into_boxed_slice());

                let color_table = graphic_block
                    .render_block
                    .local_color_table
                    .as_deref()
                    .or(self.global_color_table.as_deref())
                    .unwrap_or(&[]);
                let frame = self.canvas.composite(
                    &graphic_block.render_block,
                    color_table,
                    graphic_block.extension.as_ref(),
                );

                Ok((DetermineNextBlock(None), Some(frame)))
            }
            ProcessTrailer => Ok((Done, None)),
            Done => Ok((Done, None)),
        }
    }

    fn process_extension(&mut self, label: u8) -> Result<ParserState, DecodeError> {
        use ExtensionType::*;

        let Some(extension_type) = ExtensionType::from_label(label) else {
            warn!("skipping extension with unknown label 0x{:02x}", label);
            self.reader.skip_sub_blocks()?;
            return Ok(ParserState::DetermineNextBlock(None));
        };

        debug!("processing extension type: {:?}", extension_type);
        match extension_type {
            Application => {
                // fixed part is 8 bytes of identifier plus 3 of
                // authentication code; tolerate whatever size is declared
                let block_size = self.reader.read_byte()?;
                let header = self.reader.read_bytes(block_size.into())?;
                let application_data = self.reader.read_sub_blocks()?;

                let (identifier, authentication_code) = if header.len() >= 11 {
                    (&header[..8], &header[8..11])
                } else {
                    (header, &[][..])
                };

                if identifier == b"NETSCAPE"
                    && authentication_code == b"2.0"
                    && application_data.len() == 3
                    && application_data[0] == 1
                {
                    let loop_number =
                        u16::from_le_bytes([application_data[1], application_data[2]]);
                    self.loop_count = Some(match loop_number {
                        0 => LoopCount::Infinite,
                        number => LoopCount::Number(number),
                    });
                    debug!("netscape loop count: {:?}", self.loop_count);
                }

                self.special_purpose_extensions
                    .push(SpecialPurposeExtension::ApplicationBlock {
                        application_identifier: String::from_utf8_lossy(identifier).into(),
                        application_authentication_code: authentication_code.into(),
                        application_data: application_data.into_boxed_slice(),
                    });
                debug!(
                    "processed application block, got: {:#?}",
                    self.special_purpose_extensions.last()
                );
                Ok(ParserState::DetermineNextBlock(None))
            }
            Comment => {
                // sequence of data sub-blocks
                let data = self.reader.read_sub_blocks()?;
                debug!(
                    "processed comment block, got: {}",
                    String::from_utf8_lossy(&data)
                );
                self.special_purpose_extensions
                    .push(SpecialPurposeExtension::CommentBlock(
                        data.into_boxed_slice(),
                    ));
                Ok(ParserState::DetermineNextBlock(None))
            }
            GraphicControl => {
                let block_size = self.reader.read_byte()?;
                if block_size != 4 {
                    warn!("graphic control block declares size {block_size}, expected 4");
                }

                let packed_fields = self.reader.read_byte()?;
                // packed fields definition
                // XXXYYYZW
                // XXX = reserved, not needed
                // YYY = disposal method, indicates what to do with graphic after displaying
                // Z = user input flag
                // W = transparent color flag

                let disposal_method = DisposalMethod::from_bits((packed_fields >> 2) & 0b0000_0111);
                let user_input_flag = packed_fields & 0b0000_0010 != 0;
                let transparent_color_flag = packed_fields & 0b0000_0001 != 0;

                let delay_time = self.reader.read_u16()?;
                let transparent_color_index = self.reader.read_byte()?;

                let block_terminator = self.reader.read_byte()?;
                if block_terminator != 0 {
                    warn!("graphic control block not terminated, got 0x{block_terminator:02x}");
                }

                let graphic_control_extension = GraphicControlExtension {
                    disposal_method,
                    user_input_flag,
                    transparent_color_flag,

                    delay_time,
                    transparent_color_index,
                };

                debug!("processed GraphicControlExtension: {:#?}", graphic_control_extension);

                Ok(ParserState::DetermineNextBlock(Some(
                    graphic_control_extension,
                )))
            }
            PlainText => {
                let block_size = self.reader.read_byte()?;

                let grid_left = self.reader.read_u16()?;
                let grid_top = self.reader.read_u16()?;
                let grid_width = self.reader.read_u16()?;
                let grid_height = self.reader.read_u16()?;
                let cell_width = self.reader.read_byte()?;
                let cell_height = self.reader.read_byte()?;
                let foreground_color_index = self.reader.read_byte()?;
                let background_color_index = self.reader.read_byte()?;
                if block_size > 12 {
                    self.reader.read_bytes(usize::from(block_size) - 12)?;
                }

                let text = self.reader.read_sub_blocks()?;
                self.special_purpose_extensions
                    .push(SpecialPurposeExtension::PlainTextBlock {
                        text: String::from_utf8_lossy(&text).into(),
                        grid_left,
                        grid_top,
                        grid_width,
                        grid_height,
                        cell_width,
                        cell_height,
                        foreground_color_index,
                        background_color_index,
                    });
                debug!(
                    "processed plain text block, got: {:#?}",
                    self.special_purpose_extensions.last()
                );

                Ok(ParserState::DetermineNextBlock(None))
            }
        }
    }
}

impl Iterator for Decoder<'_> {
    type Item = Result<Frame, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if matches!(self.state, ParserState::Done) {
                return None;
            }

            let state = std::mem::replace(&mut self.state, ParserState::Done);
            debug!("begin parsing state {:?}", state);

            match self.process_next_state(state) {
                Ok((next_state, frame)) => {
                    self.state = next_state;
                    if let Some(frame) = frame {
                        return Some(Ok(frame));
                    }
                }
                Err(error) if error.is_recoverable() => {
                    // the frames already yielded stay valid
                    warn!("stream ended early: {error}");
                    return None;
                }
                Err(error) => return Some(Err(error)),
            }
        }
    }
}
