//! Wave container reader tests
//!
//! Covers header/format derivation for every supported layout, the chunk walk
//! over any number of filler chunks, and the malformed/unsupported error paths.

mod helpers;

use helpers::{generate_pcm_wav, pcm_pattern, Fixtures, RiffBuilder};
use std::fs;
use wavstream_player::audio::types::{ChannelLayout, SampleDepth};
use wavstream_player::audio::WavContainerReader;
use wavstream_player::Error;

#[test]
fn test_hound_files_in_all_supported_layouts() {
    let fixtures = Fixtures::new();

    for (channels, bits, layout, depth) in [
        (1, 8, ChannelLayout::Mono, SampleDepth::U8),
        (1, 16, ChannelLayout::Mono, SampleDepth::I16),
        (2, 8, ChannelLayout::Stereo, SampleDepth::U8),
        (2, 16, ChannelLayout::Stereo, SampleDepth::I16),
    ] {
        let path = fixtures.path(&format!("ramp_{}ch_{}bit.wav", channels, bits));
        let data = generate_pcm_wav(&path, channels, 22050, bits, 1000).unwrap();

        let (_file, wav) = WavContainerReader::open(&path).unwrap();
        assert_eq!(wav.format.sample_rate, 22050);
        assert_eq!(wav.format.channels, layout);
        assert_eq!(wav.format.depth, depth);
        assert_eq!(wav.data_len, data.len() as u64);

        // The located region holds exactly the samples that were written
        let bytes = fs::read(&path).unwrap();
        assert_eq!(&bytes[wav.data_offset as usize..wav.data_end() as usize], &data[..]);
    }
}

#[test]
fn test_data_offset_with_any_number_of_filler_chunks() {
    let fixtures = Fixtures::new();
    let data = pcm_pattern(64);
    let filler_sizes = [0usize, 1, 26, 4, 333];

    for count in 0..=filler_sizes.len() {
        let mut builder = RiffBuilder::new(2, 44100, 16).data(data.clone());
        for (i, &size) in filler_sizes[..count].iter().enumerate() {
            let tag = if i % 2 == 0 { b"LIST" } else { b"fact" };
            builder = builder.filler(tag, vec![0xEE; size]);
        }

        let path = fixtures.write(&format!("fillers_{}.wav", count), &builder);
        let (_file, wav) = WavContainerReader::open(&path).unwrap();

        assert_eq!(wav.data_offset, builder.data_offset(), "{} filler chunks", count);
        assert_eq!(wav.format.sample_rate, 44100);
        assert_eq!(wav.format.channels, ChannelLayout::Stereo);
        assert_eq!(wav.format.depth, SampleDepth::I16);
        assert_eq!(wav.data_len, 64);
    }
}

#[test]
fn test_missing_data_chunk_is_malformed() {
    let fixtures = Fixtures::new();
    let builder = RiffBuilder::new(1, 8000, 16)
        .filler(b"LIST", vec![0; 12])
        .data(pcm_pattern(100))
        .without_data_chunk();
    let path = fixtures.write("no_data.wav", &builder);

    let result = WavContainerReader::open(&path);
    assert!(matches!(result, Err(Error::MalformedContainer(_))));
}

#[test]
fn test_filler_with_size_beyond_end_of_file_is_malformed() {
    let fixtures = Fixtures::new();
    let mut bytes = RiffBuilder::new(1, 8000, 8).data(pcm_pattern(10)).build();
    // Turn the data chunk into an unknown chunk claiming to run far past the end
    bytes[36..40].copy_from_slice(b"junk");
    bytes[40..44].copy_from_slice(&0x7FFF_FFFFu32.to_le_bytes());
    let path = fixtures.write_bytes("runaway.wav", &bytes);

    assert!(matches!(
        WavContainerReader::open(&path),
        Err(Error::MalformedContainer(_))
    ));
}

#[test]
fn test_truncated_header_is_malformed() {
    let fixtures = Fixtures::new();
    let bytes = RiffBuilder::new(2, 44100, 16).build();
    let path = fixtures.write_bytes("short.wav", &bytes[..40]);

    assert!(matches!(
        WavContainerReader::open(&path),
        Err(Error::MalformedContainer(_))
    ));
}

#[test]
fn test_not_a_riff_file_is_malformed() {
    let fixtures = Fixtures::new();
    let path = fixtures.write_bytes("text.wav", &[b'x'; 128]);

    assert!(matches!(
        WavContainerReader::open(&path),
        Err(Error::MalformedContainer(_))
    ));
}

#[test]
fn test_unsupported_layouts() {
    let fixtures = Fixtures::new();

    for (name, builder) in [
        ("24bit.wav", RiffBuilder::new(2, 48000, 24)),
        ("32bit.wav", RiffBuilder::new(1, 48000, 32)),
        ("surround.wav", RiffBuilder::new(6, 48000, 16)),
        ("adpcm.wav", RiffBuilder::new(1, 8000, 16).format_code(0x0002)),
        ("float.wav", RiffBuilder::new(2, 44100, 16).format_code(0x0003)),
    ] {
        let path = fixtures.write(name, &builder.data(pcm_pattern(48)));
        assert!(
            matches!(WavContainerReader::open(&path), Err(Error::UnsupportedFormat(_))),
            "{} should be rejected",
            name
        );
    }
}

#[test]
fn test_missing_file_is_io_error() {
    let fixtures = Fixtures::new();
    let result = WavContainerReader::open(&fixtures.path("absent.wav"));
    assert!(matches!(result, Err(Error::Io(_))));
}

#[test]
fn test_data_region_excludes_trailing_chunks() {
    let fixtures = Fixtures::new();
    let builder = RiffBuilder::new(1, 8000, 8)
        .data(pcm_pattern(30))
        .trailer(b"LIST", vec![1; 20]);
    let path = fixtures.write("trailer.wav", &builder);

    let (_file, wav) = WavContainerReader::open(&path).unwrap();
    assert_eq!(wav.data_len, 30);
    assert_eq!(wav.data_end(), 44 + 30);
}

#[test]
fn test_data_size_larger_than_file_streams_to_end() {
    let fixtures = Fixtures::new();
    let builder = RiffBuilder::new(1, 8000, 8)
        .data(pcm_pattern(30))
        .declared_data_len(1_000_000);
    let path = fixtures.write("overrun.wav", &builder);

    let (_file, wav) = WavContainerReader::open(&path).unwrap();
    assert_eq!(wav.declared_data_len, 1_000_000);
    assert_eq!(wav.data_len, 30);
}
