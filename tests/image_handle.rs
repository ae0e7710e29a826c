//! End-to-end coverage over `ImageHandle`: writing an image through the
//! public API and reading it back, including the handle's tolerance for a
//! corrupted `table` section and its read/seek boundary behavior.

use exhume_ewf::byte_source::{MemoryFileSystem, OsFileSystem, SegmentFile, SegmentFileSystem};
use exhume_ewf::codec::CompressionLevel;
use exhume_ewf::{naming, segment, CreateOptions, Error, FormatVariant, ImageHandle, MediaType, Whence};

fn xorshift_fill(len: usize, mut state: u64) -> Vec<u8> {
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state & 0xFF) as u8
        })
        .collect()
}

fn base_options() -> CreateOptions {
    CreateOptions {
        media_type: MediaType::Fixed,
        format_variant: FormatVariant::Ewf1,
        bytes_per_sector: 512,
        sectors_per_chunk: 64,
        number_of_sectors: 0,
        compression_level: CompressionLevel::None,
        empty_block_detection: true,
        segment_size_cap: 16 * 1024 * 1024,
    }
}

// Scenario 1: a single chunk covering exactly one sector, filled with a
// repeated byte, read back whole and past its end.
#[test]
fn single_chunk_empty_block_image() {
    let fs = MemoryFileSystem::new();
    let mut options = base_options();
    options.sectors_per_chunk = 64;
    options.number_of_sectors = 1;

    let mut writer = ImageHandle::create(fs.clone(), "single", options).unwrap();
    let plaintext = vec![0xAAu8; 512];
    writer.write_buffer(&plaintext).unwrap();
    writer.close().unwrap();

    assert!(fs.exists("single.E01"));

    let mut raw = Vec::new();
    {
        let mut file = fs.open_read("single.E01").unwrap();
        let len = file.len().unwrap();
        raw.resize(len as usize, 0);
        file.read_exact_at(0, &mut raw).unwrap();
    }
    let (_, chain) = segment::parse_segment(&raw).unwrap();
    let sectors = chain
        .iter()
        .find(|d| d.tag_text == "sectors")
        .expect("a sectors section must be present");
    assert!(
        sectors.payload_len().unwrap() < 64,
        "a single repeated-byte chunk should compress far below the uncompressed chunk size"
    );

    let mut reader = ImageHandle::open_read(fs, "single.E01").unwrap();
    assert_eq!(reader.get_media_size().unwrap(), 512);
    let mut buf = vec![0u8; 512];
    assert_eq!(reader.read_buffer(&mut buf).unwrap(), 512);
    assert_eq!(buf, plaintext);

    let mut tail = [0u8; 16];
    assert_eq!(reader.read_buffer(&mut tail).unwrap(), 0);
}

// Scenario 6: a media size that is not an even multiple of the chunk size,
// exercising the last chunk's shortened length and reads that run past the
// end of the media.
#[test]
fn boundary_read_on_partial_last_chunk() {
    let fs = MemoryFileSystem::new();
    let mut options = base_options();
    options.bytes_per_sector = 1;
    options.sectors_per_chunk = 512;
    options.number_of_sectors = 1000;

    let plaintext: Vec<u8> = (0..1000u32).map(|i| (i % 256) as u8).collect();
    let mut writer = ImageHandle::create(fs.clone(), "boundary", options).unwrap();
    writer.write_buffer(&plaintext).unwrap();
    writer.close().unwrap();

    let mut reader = ImageHandle::open_read(fs, "boundary.E01").unwrap();
    assert_eq!(reader.get_media_size().unwrap(), 1000);

    let mut buf = vec![0u8; 1024];
    let n = reader.read_buffer_at_offset(&mut buf, 0).unwrap();
    assert_eq!(n, 1000);
    assert_eq!(&buf[..1000], plaintext.as_slice());

    let mut empty = [0u8; 1];
    assert_eq!(reader.read_buffer_at_offset(&mut empty, 1000).unwrap(), 0);
}

// A single large read_buffer call must return the same bytes as several
// smaller, chunk-unaligned calls covering the same range.
#[test]
fn chunk_boundary_invariance() {
    let fs = MemoryFileSystem::new();
    let mut options = base_options();
    options.bytes_per_sector = 512;
    options.sectors_per_chunk = 8; // 4096-byte chunks
    options.number_of_sectors = 24; // 12288 bytes, exactly 3 chunks

    let plaintext: Vec<u8> = (0..12288u32).map(|i| (i % 251) as u8).collect();
    let mut writer = ImageHandle::create(fs.clone(), "aligned", options).unwrap();
    writer.write_buffer(&plaintext).unwrap();
    writer.close().unwrap();

    let mut whole_reader = ImageHandle::open_read(fs.clone(), "aligned.E01").unwrap();
    let mut whole = vec![0u8; 12288];
    assert_eq!(whole_reader.read_buffer(&mut whole).unwrap(), 12288);
    assert_eq!(whole, plaintext);

    let mut piecewise_reader = ImageHandle::open_read(fs, "aligned.E01").unwrap();
    let mut pieces = Vec::new();
    for size in [100usize, 4096, 3000, 5092] {
        let mut buf = vec![0u8; size];
        let n = piecewise_reader.read_buffer(&mut buf).unwrap();
        assert_eq!(n, size);
        pieces.extend_from_slice(&buf);
    }
    assert_eq!(pieces, whole);
}

// Header values set before the first write survive a close/reopen cycle in
// their original insertion order.
#[test]
fn header_values_preserve_order_across_reopen() {
    let fs = MemoryFileSystem::new();
    let mut options = base_options();
    options.number_of_sectors = 1;

    let mut writer = ImageHandle::create(fs.clone(), "metadata", options).unwrap();
    writer.set_header_value("c", "CASE-042").unwrap();
    writer.set_header_value("n", "evidence-42").unwrap();
    writer.set_header_value("a", "J. Examiner").unwrap();
    writer.write_buffer(&vec![0u8; 512]).unwrap();
    writer.close().unwrap();

    let reader = ImageHandle::open_read(fs, "metadata.E01").unwrap();
    assert_eq!(reader.get_number_of_header_values(), 3);
    assert_eq!(reader.get_header_value_identifier(0), Some("c"));
    assert_eq!(reader.get_header_value_identifier(1), Some("n"));
    assert_eq!(reader.get_header_value_identifier(2), Some("a"));
    assert_eq!(reader.get_header_value("c"), Some("CASE-042"));
    assert_eq!(reader.get_header_value("a"), Some("J. Examiner"));
}

// Write mode always runs MD5/SHA1 over the acquired bytes, the way a real
// acquisition tool does, even when the caller never asks for a hash value.
#[test]
fn write_mode_computes_hashes_automatically() {
    let fs = MemoryFileSystem::new();
    let mut options = base_options();
    options.number_of_sectors = 1;

    let mut writer = ImageHandle::create(fs.clone(), "hashed", options).unwrap();
    writer.write_buffer(&vec![0x11u8; 512]).unwrap();
    writer.close().unwrap();

    let reader = ImageHandle::open_read(fs, "hashed.E01").unwrap();
    let md5 = reader.get_hash_value("MD5").expect("MD5 should be computed automatically");
    let sha1 = reader.get_hash_value("SHA1").expect("SHA1 should be computed automatically");
    assert_eq!(md5.len(), 32);
    assert_eq!(sha1.len(), 40);
}

fn multi_segment_image(fs: &MemoryFileSystem, base_name: &str) -> Vec<u8> {
    let mut options = base_options();
    options.bytes_per_sector = 512;
    options.sectors_per_chunk = 64; // 32 KiB chunks
    let data_len = 4 * 1024 * 1024usize; // 4 MiB, 128 chunks
    options.number_of_sectors = (data_len / 512) as u64;
    options.segment_size_cap = 1024 * 1024; // forces several segments

    let plaintext = xorshift_fill(data_len, 0x2545_F491_4F6C_DD1D);
    let mut writer = ImageHandle::create(fs.clone(), base_name, options).unwrap();
    writer.write_buffer(&plaintext).unwrap();
    writer.close().unwrap();
    plaintext
}

// Scenario 2: an image too large for one segment file, chained across
// several `E0N` files, `next`-terminated except for the last.
#[test]
fn multi_segment_write_and_read_round_trip() {
    let fs = MemoryFileSystem::new();
    let plaintext = multi_segment_image(&fs, "multi");

    let names = naming::discover_siblings(&fs, "multi.E01").unwrap();
    assert!(names.len() >= 4, "4 MiB at a 1 MiB segment cap should span several segments, got {}", names.len());

    for (i, name) in names.iter().enumerate() {
        let mut raw = Vec::new();
        let mut file = fs.open_read(name).unwrap();
        let len = file.len().unwrap();
        raw.resize(len as usize, 0);
        file.read_exact_at(0, &mut raw).unwrap();
        let (_, chain) = segment::parse_segment(&raw).unwrap();
        let last_tag = chain.last().unwrap().tag_text.as_str();
        if i + 1 == names.len() {
            assert_eq!(last_tag, "done");
        } else {
            assert_eq!(last_tag, "next");
        }
    }

    let mut reader = ImageHandle::open_read(fs, "multi.E01").unwrap();
    assert_eq!(reader.get_media_size().unwrap(), plaintext.len() as u64);
    let mut readback = vec![0u8; plaintext.len()];
    assert_eq!(reader.read_buffer(&mut readback).unwrap(), plaintext.len());
    assert_eq!(readback, plaintext);
}

// Scenario 3: seeking into the middle of a multi-segment image and reading
// a short run from there.
#[test]
fn seek_then_read_within_multi_segment_image() {
    let fs = MemoryFileSystem::new();
    let plaintext = multi_segment_image(&fs, "seekable");

    let mut reader = ImageHandle::open_read(fs, "seekable.E01").unwrap();
    let midpoint = (plaintext.len() / 2 + 1) as u64;
    let offset = reader.seek(midpoint as i64, Whence::Start).unwrap();
    assert_eq!(offset, midpoint);
    assert_eq!(reader.get_offset(), midpoint);

    let mut buf = [0u8; 1024];
    let n = reader.read_buffer(&mut buf).unwrap();
    assert_eq!(n, buf.len());
    assert_eq!(&buf[..], &plaintext[midpoint as usize..midpoint as usize + 1024]);
}

#[test]
fn seek_is_idempotent_and_rejects_out_of_range() {
    let fs = MemoryFileSystem::new();
    let plaintext = multi_segment_image(&fs, "seekbounds");
    let media_size = plaintext.len() as u64;

    let mut reader = ImageHandle::open_read(fs, "seekbounds.E01").unwrap();
    for probe in [0u64, media_size / 3, media_size] {
        let got = reader.seek(probe as i64, Whence::Start).unwrap();
        assert_eq!(got, probe);
        assert_eq!(reader.get_offset(), probe);
        let noop = reader.seek(0, Whence::Current).unwrap();
        assert_eq!(noop, probe);
    }

    let err = reader.seek((media_size as i64) + 1, Whence::Start).unwrap_err();
    assert!(matches!(err, Error::Argument(_)));
}

// Scenario 5 / table-table2 redundancy: flipping one byte inside a
// non-final segment's `table` payload must not fail the whole open, and
// reads of chunks in that segment must recover via `table2`.
#[test]
fn corrupted_table_section_recovers_via_table2() {
    let fs = MemoryFileSystem::new();
    let plaintext = multi_segment_image(&fs, "corrupt");

    let names = naming::discover_siblings(&fs, "corrupt.E01").unwrap();
    assert!(names.len() >= 2, "need at least two segments to corrupt a non-final one");
    let victim = &names[0];

    let mut raw = Vec::new();
    {
        let mut file = fs.open_read(victim).unwrap();
        let len = file.len().unwrap();
        raw.resize(len as usize, 0);
        file.read_exact_at(0, &mut raw).unwrap();
    }
    let (_, chain) = segment::parse_segment(&raw).unwrap();
    let table = chain
        .iter()
        .find(|d| d.tag_text == "table")
        .expect("victim segment should carry a table section");
    let flip_at = table.payload_offset() as usize + 40; // inside the entry array
    raw[flip_at] ^= 0xFF;

    {
        let mut file = fs.create(victim).unwrap();
        file.write_at(0, &raw).unwrap();
    }

    let mut reader = ImageHandle::open_read(fs, "corrupt.E01").unwrap();
    assert_eq!(reader.get_media_size().unwrap(), plaintext.len() as u64);
    let mut readback = vec![0u8; plaintext.len()];
    assert_eq!(reader.read_buffer(&mut readback).unwrap(), plaintext.len());
    assert_eq!(readback, plaintext);
    assert!(
        reader.table2_retry_count() >= 1,
        "reads that fall back from a corrupted table to table2 must bump the retry counter"
    );
}

// On-disk fixture: the same write/close/reopen/read round trip, but backed
// by real files under a temporary directory instead of `MemoryFileSystem`.
#[test]
fn on_disk_round_trip_via_os_file_system() {
    let dir = tempfile::tempdir().unwrap();
    let mut options = base_options();
    options.number_of_sectors = 8; // 4096 bytes, exactly one chunk

    let plaintext = xorshift_fill(4096, 0x9E37_79B9_7F4A_7C15);
    let mut writer = ImageHandle::create(OsFileSystem::new(dir.path()), "disk_image", options).unwrap();
    writer.write_buffer(&plaintext).unwrap();
    writer.close().unwrap();

    assert!(dir.path().join("disk_image.E01").is_file());

    let mut reader = ImageHandle::open_read(OsFileSystem::new(dir.path()), "disk_image.E01").unwrap();
    assert_eq!(reader.get_media_size().unwrap(), 4096);
    let mut readback = vec![0u8; 4096];
    assert_eq!(reader.read_buffer(&mut readback).unwrap(), 4096);
    assert_eq!(readback, plaintext);
}

// write_buffer is rejected on a read-mode handle and set_header_value is
// rejected once writing has started; close() is required to finalize a
// segment that never reached the configured size cap.
#[test]
fn write_mode_rejections_and_small_image_still_finalizes() {
    let fs = MemoryFileSystem::new();
    let mut options = base_options();
    options.number_of_sectors = 1;

    let mut writer = ImageHandle::create(fs.clone(), "tiny", options).unwrap();
    writer.write_buffer(&vec![0u8; 10]).unwrap();
    let err = writer.set_header_value("c", "too-late").unwrap_err();
    assert!(matches!(err, Error::State(_)));
    writer.close().unwrap();

    let mut reader = ImageHandle::open_read(fs, "tiny.E01").unwrap();
    assert_eq!(reader.get_media_size().unwrap(), 512);
    let mut buf = vec![0u8; 10];
    assert_eq!(reader.read_buffer(&mut buf).unwrap(), 10);
    assert_eq!(buf, vec![0u8; 10]);

    let err = reader.write_buffer(&[1, 2, 3]).unwrap_err();
    assert!(matches!(err, Error::State(_)));
    let err = reader.seek(0, Whence::Current).and_then(|_| reader.seek(0, Whence::Start));
    assert!(err.is_ok());
}
