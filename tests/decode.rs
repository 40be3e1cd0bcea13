use jiffy::{decode, probe_size, DecodeError, Frame, LoopCount, SpecialPurposeExtension};

// LZW streams below are 2-bit minimum code size: clear = 4, end = 5.
// [0, 1, 1, 0] -> codes 4,0,1,1 at three bits, 0,5 at four
const CHECKERBOARD_LZW: &[u8] = &[0x44, 0x02, 0x05];
// [0, 1, 2, 3] -> codes 4,0,1,2 at three bits, 3,5 at four
const RAMP_LZW: &[u8] = &[0x44, 0x34, 0x05];
// [0, 0, 3, 3] -> codes 4,0,0,3 at three bits, 3,5 at four
const CORNERS_LZW: &[u8] = &[0x04, 0x36, 0x05];
// [0,0, 0,0, 1,1, 1,1], the interleaved row order of a 2x4 image whose
// natural rows alternate 0/1
const INTERLACED_LZW: &[u8] = &[0x84, 0x11, 0x19, 0x05];

const BLACK_WHITE: &[u8] = &[0x00, 0x00, 0x00, 0xff, 0xff, 0xff];

fn header(width: u16, height: u16, global_table: Option<&[u8]>) -> Vec<u8> {
    let mut bytes = b"GIF89a".to_vec();
    bytes.extend_from_slice(&width.to_le_bytes());
    bytes.extend_from_slice(&height.to_le_bytes());
    match global_table {
        Some(table) => {
            // entry count is 2^(size field + 1)
            let entries = table.len() / 3;
            let size_field = (entries.trailing_zeros() - 1) as u8;
            bytes.push(0b1000_0000 | size_field);
        }
        None => bytes.push(0),
    }
    bytes.push(0); // background color index
    bytes.push(0); // pixel aspect ratio
    if let Some(table) = global_table {
        bytes.extend_from_slice(table);
    }
    bytes
}

fn image_block(
    left: u16,
    top: u16,
    width: u16,
    height: u16,
    packed_fields: u8,
    minimum_code_size: u8,
    lzw: &[u8],
) -> Vec<u8> {
    let mut bytes = vec![0x2c];
    bytes.extend_from_slice(&left.to_le_bytes());
    bytes.extend_from_slice(&top.to_le_bytes());
    bytes.extend_from_slice(&width.to_le_bytes());
    bytes.extend_from_slice(&height.to_le_bytes());
    bytes.push(packed_fields);
    bytes.push(minimum_code_size);
    bytes.push(lzw.len() as u8);
    bytes.extend_from_slice(lzw);
    bytes.push(0);
    bytes
}

fn graphic_control(disposal_bits: u8, transparent: Option<u8>, delay: u16) -> Vec<u8> {
    let mut packed = disposal_bits << 2;
    if transparent.is_some() {
        packed |= 1;
    }
    let mut bytes = vec![0x21, 0xf9, 0x04, packed];
    bytes.extend_from_slice(&delay.to_le_bytes());
    bytes.push(transparent.unwrap_or(0));
    bytes.push(0);
    bytes
}

fn frames_of(bytes: &[u8]) -> Vec<Frame> {
    decode(bytes)
        .expect("header should parse")
        .collect::<Result<Vec<_>, _>>()
        .expect("frames should decode")
}

fn pixel(frame: &Frame, index: usize) -> [u8; 4] {
    frame.pixels[index * 4..index * 4 + 4].try_into().unwrap()
}

#[test]
fn minimal_checkerboard_decodes_to_one_frame() {
    let mut bytes = header(2, 2, Some(BLACK_WHITE));
    bytes.extend(image_block(0, 0, 2, 2, 0, 2, CHECKERBOARD_LZW));
    bytes.push(0x3b);

    let frames = frames_of(&bytes);
    assert_eq!(frames.len(), 1);

    let frame = &frames[0];
    assert_eq!(frame.delay_seconds, 0.0);
    assert_eq!((frame.width, frame.height), (2, 2));
    assert_eq!(
        frame.pixels.as_ref(),
        &[
            0, 0, 0, 255, 255, 255, 255, 255, //
            255, 255, 255, 255, 0, 0, 0, 255,
        ]
    );
}

#[test]
fn do_not_dispose_keeps_the_previous_frame_under_transparency() {
    let table = [
        255, 0, 0, // red
        0, 255, 0, // green
        0, 0, 255, // blue
        255, 255, 255, // white
    ];
    let mut bytes = header(2, 2, Some(&table));
    bytes.extend(image_block(0, 0, 2, 2, 0, 2, RAMP_LZW));
    bytes.extend(graphic_control(1, Some(0), 10));
    bytes.extend(image_block(0, 0, 2, 2, 0, 2, CORNERS_LZW));
    bytes.push(0x3b);

    let frames = frames_of(&bytes);
    assert_eq!(frames.len(), 2);

    let first = &frames[0];
    assert_eq!(first.delay_seconds, 0.0);
    assert_eq!(pixel(first, 0), [255, 0, 0, 255]);
    assert_eq!(pixel(first, 1), [0, 255, 0, 255]);
    assert_eq!(pixel(first, 2), [0, 0, 255, 255]);
    assert_eq!(pixel(first, 3), [255, 255, 255, 255]);

    // frame two paints white over the bottom row; its transparent top row
    // keeps frame one's pixels
    let second = &frames[1];
    assert!((second.delay_seconds - 0.1).abs() < 1e-6);
    assert_eq!(pixel(second, 0), [255, 0, 0, 255]);
    assert_eq!(pixel(second, 1), [0, 255, 0, 255]);
    assert_eq!(pixel(second, 2), [255, 255, 255, 255]);
    assert_eq!(pixel(second, 3), [255, 255, 255, 255]);
}

#[test]
fn interlaced_rows_come_back_in_natural_order() {
    let mut bytes = header(2, 4, Some(BLACK_WHITE));
    bytes.extend(image_block(0, 0, 2, 4, 0b0100_0000, 2, INTERLACED_LZW));
    bytes.push(0x3b);

    let frames = frames_of(&bytes);
    assert_eq!(frames.len(), 1);

    let frame = &frames[0];
    for row in 0..4usize {
        let expected = if row % 2 == 0 {
            [0, 0, 0, 255]
        } else {
            [255, 255, 255, 255]
        };
        assert_eq!(pixel(frame, row * 2), expected, "row {row}");
        assert_eq!(pixel(frame, row * 2 + 1), expected, "row {row}");
    }
}

#[test]
fn probe_size_reads_only_the_descriptor() {
    // no blocks at all after the descriptor
    let bytes = header(640, 480, None);
    assert_eq!(probe_size(&bytes).unwrap(), (640, 480));
}

#[test]
fn bad_signature_and_short_headers_are_fatal() {
    assert!(matches!(
        probe_size(b"PNG89a definitely not a gif"),
        Err(DecodeError::InvalidSignature)
    ));
    assert!(matches!(
        decode(b"GIF88a rest does not matter"),
        Err(DecodeError::UnsupportedVersion(_))
    ));
    assert!(matches!(
        decode(b"GIF89a\x02\x00"),
        Err(DecodeError::Truncated(_))
    ));
}

#[test]
fn truncation_inside_image_data_yields_no_partial_error() {
    let mut bytes = header(2, 2, Some(BLACK_WHITE));
    bytes.extend(image_block(0, 0, 2, 2, 0, 2, CHECKERBOARD_LZW));
    bytes.push(0x3b);

    // cut inside the compressed sub-block chain
    let truncated = &bytes[..bytes.len() - 3];
    let frames: Vec<_> = decode(truncated)
        .unwrap()
        .map(|frame| frame.expect("truncation must not surface as an error"))
        .collect();
    assert!(frames.is_empty());
}

#[test]
fn stray_bytes_and_unknown_extensions_are_skipped() {
    let mut bytes = header(2, 2, Some(BLACK_WHITE));
    // an unknown extension with a two-byte sub-block
    bytes.extend_from_slice(&[0x21, 0xab, 0x02, 0x12, 0x34, 0x00]);
    bytes.extend(image_block(0, 0, 2, 2, 0, 2, CHECKERBOARD_LZW));
    // a stray zero byte before the trailer
    bytes.push(0x00);
    bytes.push(0x3b);

    assert_eq!(frames_of(&bytes).len(), 1);
}

#[test]
fn netscape_application_block_sets_the_loop_count() {
    let mut bytes = header(2, 2, Some(BLACK_WHITE));
    bytes.extend_from_slice(&[0x21, 0xff, 0x0b]);
    bytes.extend_from_slice(b"NETSCAPE2.0");
    bytes.extend_from_slice(&[0x03, 0x01, 0x00, 0x00, 0x00]);
    bytes.extend(image_block(0, 0, 2, 2, 0, 2, CHECKERBOARD_LZW));
    bytes.push(0x3b);

    let mut decoder = decode(&bytes).unwrap();
    let frames: Vec<_> = decoder.by_ref().collect();
    assert_eq!(frames.len(), 1);
    assert_eq!(decoder.loop_count(), Some(LoopCount::Infinite));
}

#[test]
fn plain_text_blocks_are_kept_as_metadata() {
    let mut bytes = header(2, 2, Some(BLACK_WHITE));
    bytes.extend_from_slice(&[0x21, 0x01, 0x0c]);
    bytes.extend_from_slice(&20u16.to_le_bytes()); // grid left
    bytes.extend_from_slice(&10u16.to_le_bytes()); // grid top
    bytes.extend_from_slice(&40u16.to_le_bytes()); // grid width
    bytes.extend_from_slice(&8u16.to_le_bytes()); // grid height
    bytes.extend_from_slice(&[8, 8, 1, 0]); // cell size, fg, bg
    bytes.extend_from_slice(&[0x02, b'h', b'i', 0x00]);
    bytes.extend(image_block(0, 0, 2, 2, 0, 2, CHECKERBOARD_LZW));
    bytes.push(0x3b);

    let mut decoder = decode(&bytes).unwrap();
    assert_eq!(decoder.by_ref().count(), 1);

    match decoder.special_purpose_extensions() {
        [SpecialPurposeExtension::PlainTextBlock {
            text,
            grid_left,
            grid_width,
            ..
        }] => {
            assert_eq!(text.as_ref(), "hi");
            assert_eq!(*grid_left, 20);
            assert_eq!(*grid_width, 40);
        }
        other => panic!("expected one plain text block, got {other:?}"),
    }
}

#[test]
fn intervening_extension_drops_a_pending_graphic_control() {
    let mut bytes = header(2, 2, Some(BLACK_WHITE));
    bytes.extend(graphic_control(0, None, 50));
    // a comment between the control and its image discards the control
    bytes.extend_from_slice(&[0x21, 0xfe, 0x03, b'a', b'b', b'c', 0x00]);
    bytes.extend(image_block(0, 0, 2, 2, 0, 2, CHECKERBOARD_LZW));
    bytes.push(0x3b);

    let frames = frames_of(&bytes);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].delay_seconds, 0.0);
}

#[test]
fn local_color_table_wins_over_the_global_one() {
    // global table is black/white, local swaps to white/black
    let local: &[u8] = &[0xff, 0xff, 0xff, 0x00, 0x00, 0x00];
    let mut bytes = header(2, 2, Some(BLACK_WHITE));
    let mut with_local = vec![0x2c];
    with_local.extend_from_slice(&0u16.to_le_bytes());
    with_local.extend_from_slice(&0u16.to_le_bytes());
    with_local.extend_from_slice(&2u16.to_le_bytes());
    with_local.extend_from_slice(&2u16.to_le_bytes());
    with_local.push(0b1000_0000); // local table present, size field 0
    with_local.extend_from_slice(local);
    with_local.push(2);
    with_local.push(CHECKERBOARD_LZW.len() as u8);
    with_local.extend_from_slice(CHECKERBOARD_LZW);
    with_local.push(0);
    bytes.extend(with_local);
    bytes.push(0x3b);

    let frames = frames_of(&bytes);
    assert_eq!(pixel(&frames[0], 0), [255, 255, 255, 255]);
    assert_eq!(pixel(&frames[0], 1), [0, 0, 0, 255]);
}

#[test]
fn iterator_is_fused_after_the_trailer() {
    let mut bytes = header(2, 2, Some(BLACK_WHITE));
    bytes.extend(image_block(0, 0, 2, 2, 0, 2, CHECKERBOARD_LZW));
    bytes.push(0x3b);

    let mut decoder = decode(&bytes).unwrap();
    assert!(decoder.next().is_some());
    assert!(decoder.next().is_none());
    assert!(decoder.next().is_none());
}
