use super::*;

#[test]
fn hex_with_gaps_is_filled_erased() {
    let text = hex_text(&[
        ihex::Record::Data {
            offset: 0x0000,
            value: vec![0x12, 0x34, 0x56, 0x78],
        },
        ihex::Record::Data {
            offset: 0x0010,
            value: vec![0xAA, 0xBB],
        },
    ]);
    let image = Image::from_hex(&text).unwrap();
    let mut expected = vec![0xFF; 0x12];
    expected[..4].copy_from_slice(&[0x12, 0x34, 0x56, 0x78]);
    expected[0x10..].copy_from_slice(&[0xAA, 0xBB]);
    assert_eq!(image.as_bytes(), &expected[..]);
    assert_eq!(image.len(), 0x12);
}

/// Configuration words live above 64 KiB and are not part of the image.
#[test]
fn records_above_first_segment_are_ignored() {
    let text = hex_text(&[
        ihex::Record::Data {
            offset: 0x0000,
            value: vec![0x01, 0x02],
        },
        ihex::Record::ExtendedLinearAddress(0x0030),
        ihex::Record::Data {
            offset: 0x0000,
            value: vec![0x55; 14],
        },
        ihex::Record::ExtendedLinearAddress(0x0000),
        ihex::Record::Data {
            offset: 0x0008,
            value: vec![0x03],
        },
    ]);
    let image = Image::from_hex(&text).unwrap();
    assert_eq!(image.as_bytes(), &[0x01, 0x02, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x03]);
}

#[test]
fn image_reaching_record_is_rejected() {
    let text = hex_text(&[ihex::Record::Data {
        offset: (SIGNAT_OFFSET - 1) as u16,
        value: vec![0x00],
    }]);
    assert!(matches!(
        Image::from_hex(&text),
        Err(Error::ImageTooLarge { size }) if size == SIGNAT_OFFSET
    ));

    // One byte less is fine.
    let text = hex_text(&[ihex::Record::Data {
        offset: (SIGNAT_OFFSET - 2) as u16,
        value: vec![0x00],
    }]);
    assert_eq!(Image::from_hex(&text).unwrap().len(), SIGNAT_OFFSET - 1);
}

/// The bootloader never programs bytes 4..8, an image using them cannot verify.
#[test]
fn programmed_second_word_is_rejected() {
    let text = hex_text(&[ihex::Record::Data {
        offset: 0,
        value: vec![0, 1, 2, 3, 4, 5, 6, 7],
    }]);
    assert!(matches!(Image::from_hex(&text), Err(Error::ImageErasedWordProgrammed)));

    // A short image only has to leave what it has of them erased.
    let text = hex_text(&[ihex::Record::Data {
        offset: 0,
        value: vec![0, 1, 2, 3, 0xFF],
    }]);
    assert_eq!(Image::from_hex(&text).unwrap().len(), 5);
}

#[test]
fn empty_hex_is_rejected() {
    assert!(matches!(Image::from_hex(&hex_text(&[])), Err(Error::ImageEmpty)));
}

#[test]
fn malformed_hex_is_rejected() {
    assert!(matches!(Image::from_hex(":0400000012"), Err(Error::ParseHex(_))));
}

#[test]
fn hex_file_on_disk() {
    let (bytes, text) = sample_hex(100);
    let file = create_file(text.as_bytes());
    let image = Image::from_hex_file(file.path()).unwrap();
    assert_eq!(image.as_bytes(), &bytes[..]);

    let missing = file.path().with_extension("missing");
    assert!(matches!(Image::from_hex_file(&missing), Err(Error::ReadHexFile(path, _)) if path == missing));
}

#[test]
fn chunks_are_block_aligned() {
    let (_, text) = sample_hex(150);
    let image = Image::from_hex(&text).unwrap();
    let chunks: Vec<(u32, usize)> = image.chunks().map(|(addr, data)| (addr, data.len())).collect();
    assert_eq!(chunks, [(0, 64), (64, 64), (128, 22)]);
}

#[test]
fn digest_is_sha256_of_image() {
    use sha2::Digest;

    let (bytes, text) = sample_hex(300);
    let image = Image::from_hex(&text).unwrap();
    let expected: [u8; 32] = sha2::Sha256::digest(&bytes).into();
    assert_eq!(image.digest(), expected);
}

#[test]
fn size_request_matches_record_layout() {
    let (_, text) = sample_hex(0x1234);
    let image = Image::from_hex(&text).unwrap();
    assert_eq!(
        Request::program_size(image.len()).unwrap(),
        Request::ProgramSize([0x00, 0x12, 0x34])
    );
    assert!(CODE_SIZE_OFFSET > image.len());
}
