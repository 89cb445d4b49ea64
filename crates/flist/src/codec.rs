//! Delta-encoded file-list entry codec.
//!
//! # Upstream Reference
//!
//! `flist.c:send_file_entry`/`receive_file_entry`, as summarized in
//! spec.md §4.E. Field order after the flag byte: optional same-name
//! prefix length, name length, name suffix bytes, 64-bit length,
//! optional mtime/mode/uid/gid/rdev, optional symlink target, optional
//! whole-file checksum.
//!
//! Terminator disambiguation: a flags byte of `0` always means "end of
//! list". An entry whose flags would naturally compute to `0` (no
//! same-* bit applies, short name, not a transfer root) force-sets
//! [`XMIT_TOP_DIR`] as a sentinel; the decoder only treats that bit as a
//! genuine top-dir marker when the decoded mode is a directory.

use std::io::{Read, Write};

use protocol::codec::{
    read_bytes, read_i32, read_i64, read_prefixed_bytes, read_u8, write_i32, write_i64,
    write_prefixed_bytes, write_u8,
};

use crate::entry::{is_device_or_special, is_directory, is_symlink, FileEntry};
use crate::error::{FlistError, FlistResult};
use crate::flags::{
    XMIT_LONG_NAME, XMIT_SAME_GID, XMIT_SAME_MODE, XMIT_SAME_NAME, XMIT_SAME_RDEV_PRE28,
    XMIT_SAME_TIME, XMIT_SAME_UID, XMIT_TOP_DIR,
};

/// Which optional fields are negotiated for this session; controls
/// which fields the codec reads/writes beyond the mandatory core.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodecOptions {
    /// uid is transmitted and `XMIT_SAME_UID` is meaningful.
    pub preserve_uid: bool,
    /// gid is transmitted and `XMIT_SAME_GID` is meaningful.
    pub preserve_gid: bool,
    /// rdev is transmitted for device/special files.
    pub preserve_devices: bool,
    /// Symlink targets are transmitted for symlink entries.
    pub preserve_links: bool,
    /// Every entry carries a whole-file MD4 checksum.
    pub always_checksum: bool,
}

const MAX_PREFIX_LEN: usize = u8::MAX as usize;
const MAX_SHORT_NAME_LEN: usize = u8::MAX as usize;

fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count().min(MAX_PREFIX_LEN)
}

/// Encodes one entry, delta-coded against `prev` (`None` for the first
/// entry in the list).
pub fn encode_entry<W: Write>(
    writer: &mut W,
    options: CodecOptions,
    prev: Option<&FileEntry>,
    entry: &FileEntry,
) -> FlistResult<()> {
    let prefix_len = prev.map_or(0, |p| common_prefix_len(&p.name, &entry.name));
    let suffix = &entry.name[prefix_len..];
    let long_name = suffix.len() > MAX_SHORT_NAME_LEN;

    let same_time = prev.is_some_and(|p| p.mtime == entry.mtime);
    let same_mode = prev.is_some_and(|p| p.mode == entry.mode);
    let same_uid =
        options.preserve_uid && prev.is_some_and(|p| p.uid == entry.uid) && entry.uid.is_some();
    let same_gid =
        options.preserve_gid && prev.is_some_and(|p| p.gid == entry.gid) && entry.gid.is_some();
    let device_relevant = options.preserve_devices && is_device_or_special(entry.mode);
    let same_rdev = device_relevant && prev.is_some_and(|p| p.rdev == entry.rdev);

    let mut flags = 0u8;
    if prefix_len > 0 {
        flags |= XMIT_SAME_NAME;
    }
    if long_name {
        flags |= XMIT_LONG_NAME;
    }
    if same_time {
        flags |= XMIT_SAME_TIME;
    }
    if same_mode {
        flags |= XMIT_SAME_MODE;
    }
    if same_uid {
        flags |= XMIT_SAME_UID;
    }
    if same_gid {
        flags |= XMIT_SAME_GID;
    }
    if same_rdev {
        flags |= XMIT_SAME_RDEV_PRE28;
    }
    if entry.top_dir {
        flags |= XMIT_TOP_DIR;
    }
    if flags == 0 {
        flags |= XMIT_TOP_DIR;
    }

    write_u8(writer, flags)?;
    if prefix_len > 0 {
        write_u8(writer, prefix_len as u8)?;
    }
    write_prefixed_bytes(writer, suffix, long_name)?;
    write_i64(writer, entry.length as i64)?;
    if !same_time {
        write_i32(writer, entry.mtime as i32)?;
    }
    if !same_mode {
        write_i32(writer, entry.mode as i32)?;
    }
    if options.preserve_uid && !same_uid {
        write_i32(writer, entry.uid.unwrap_or(0) as i32)?;
    }
    if options.preserve_gid && !same_gid {
        write_i32(writer, entry.gid.unwrap_or(0) as i32)?;
    }
    if device_relevant && !same_rdev {
        write_i32(writer, entry.rdev.unwrap_or(0) as i32)?;
    }
    if options.preserve_links && is_symlink(entry.mode) {
        let target = entry.symlink_target.as_deref().unwrap_or(&[]);
        write_prefixed_bytes(writer, target, target.len() > MAX_SHORT_NAME_LEN)?;
    }
    if options.always_checksum {
        let checksum = entry.checksum.unwrap_or([0u8; 16]);
        writer.write_all(&checksum).map_err(protocol::WireError::from)?;
    }
    Ok(())
}

/// Reads one entry, or `Ok(None)` if the terminating zero flag byte was
/// read instead.
pub fn decode_entry<R: Read>(
    reader: &mut R,
    options: CodecOptions,
    prev: Option<&FileEntry>,
) -> FlistResult<Option<FileEntry>> {
    let flags = read_u8(reader)?;
    if flags == 0 {
        return Ok(None);
    }

    let prefix_len = if flags & XMIT_SAME_NAME != 0 {
        let len = usize::from(read_u8(reader)?);
        let prev_name_len = prev.map_or(0, |p| p.name.len());
        if len > prev_name_len {
            return Err(FlistError::InvalidPrefix { prefix: len });
        }
        len
    } else {
        0
    };

    let long_name = flags & XMIT_LONG_NAME != 0;
    let suffix = read_prefixed_bytes(reader, long_name)?;

    let mut name = Vec::with_capacity(prefix_len + suffix.len());
    if prefix_len > 0 {
        let prev_name = &prev.expect("prefix_len > 0 implies prev exists").name;
        name.extend_from_slice(&prev_name[..prefix_len]);
    }
    name.extend_from_slice(&suffix);
    if name.len() >= crate::path::MAX_NAME_LEN {
        return Err(FlistError::PathTooLong { len: name.len() });
    }

    let length = read_i64(reader)?.max(0) as u64;

    let mtime = if flags & XMIT_SAME_TIME != 0 {
        prev.map_or(0, |p| p.mtime)
    } else {
        i64::from(read_i32(reader)?)
    };

    let mode = if flags & XMIT_SAME_MODE != 0 {
        prev.map_or(0, |p| p.mode)
    } else {
        read_i32(reader)? as u32
    };

    let uid = if options.preserve_uid {
        if flags & XMIT_SAME_UID != 0 {
            prev.and_then(|p| p.uid)
        } else {
            Some(read_i32(reader)? as u32)
        }
    } else {
        None
    };

    let gid = if options.preserve_gid {
        if flags & XMIT_SAME_GID != 0 {
            prev.and_then(|p| p.gid)
        } else {
            Some(read_i32(reader)? as u32)
        }
    } else {
        None
    };

    let rdev = if options.preserve_devices && is_device_or_special(mode) {
        if flags & XMIT_SAME_RDEV_PRE28 != 0 {
            prev.and_then(|p| p.rdev)
        } else {
            Some(read_i32(reader)? as u32)
        }
    } else {
        None
    };

    let symlink_target = if options.preserve_links && is_symlink(mode) {
        Some(read_prefixed_bytes(reader, long_name)?)
    } else {
        None
    };

    let checksum = if options.always_checksum {
        let raw = read_bytes(reader, 16)?;
        let mut buf = [0u8; 16];
        buf.copy_from_slice(&raw);
        Some(buf)
    } else {
        None
    };

    let top_dir = flags & XMIT_TOP_DIR != 0 && is_directory(mode);

    Ok(Some(FileEntry {
        name,
        length,
        mtime,
        mode,
        uid,
        gid,
        rdev,
        symlink_target,
        checksum,
        top_dir,
    }))
}

/// Encodes a full sorted entry list, delta-coding each entry against the
/// one before it, followed by the terminating zero byte.
pub fn encode_file_list<W: Write>(
    writer: &mut W,
    options: CodecOptions,
    entries: &[FileEntry],
) -> FlistResult<()> {
    let mut prev: Option<&FileEntry> = None;
    for entry in entries {
        encode_entry(writer, options, prev, entry)?;
        prev = Some(entry);
    }
    write_u8(writer, 0)?;
    Ok(())
}

/// Decodes a full entry list terminated by a zero flag byte.
pub fn decode_file_list<R: Read>(
    reader: &mut R,
    options: CodecOptions,
) -> FlistResult<Vec<FileEntry>> {
    let mut entries = Vec::new();
    loop {
        let prev = entries.last();
        match decode_entry(reader, options, prev)? {
            Some(entry) => entries.push(entry),
            None => break,
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample(name: &str, mtime: i64, mode: u32) -> FileEntry {
        FileEntry {
            name: name.as_bytes().to_vec(),
            length: 42,
            mtime,
            mode,
            uid: None,
            gid: None,
            rdev: None,
            symlink_target: None,
            checksum: None,
            top_dir: false,
        }
    }

    #[test]
    fn round_trips_a_single_entry() {
        let entry = sample("a/b/c", 1_000, 0o100_644);
        let mut buf = Vec::new();
        encode_entry(&mut buf, CodecOptions::default(), None, &entry).unwrap();
        let mut cursor = Cursor::new(buf);
        let decoded = decode_entry(&mut cursor, CodecOptions::default(), None)
            .unwrap()
            .unwrap();
        assert_eq!(decoded.name, entry.name);
        assert_eq!(decoded.length, entry.length);
        assert_eq!(decoded.mtime, entry.mtime);
        assert_eq!(decoded.mode, entry.mode);
    }

    #[test]
    fn shares_a_name_prefix_with_the_previous_entry() {
        let first = sample("dir/one.txt", 100, 0o100_644);
        let second = sample("dir/two.txt", 100, 0o100_644);
        let mut buf = Vec::new();
        encode_entry(&mut buf, CodecOptions::default(), None, &first).unwrap();
        encode_entry(&mut buf, CodecOptions::default(), Some(&first), &second).unwrap();

        let mut cursor = Cursor::new(buf);
        let decoded_first = decode_entry(&mut cursor, CodecOptions::default(), None)
            .unwrap()
            .unwrap();
        let decoded_second =
            decode_entry(&mut cursor, CodecOptions::default(), Some(&decoded_first))
                .unwrap()
                .unwrap();
        assert_eq!(decoded_second.name, b"dir/two.txt");
        assert_eq!(decoded_second.mtime, decoded_first.mtime);
    }

    #[test]
    fn full_list_round_trips_and_is_terminated() {
        let entries = vec![
            sample("a", 1, 0o100_644),
            sample("ab", 1, 0o100_644),
            sample("b/c", 2, 0o100_600),
        ];
        let mut buf = Vec::new();
        encode_file_list(&mut buf, CodecOptions::default(), &entries).unwrap();
        assert_eq!(*buf.last().unwrap(), 0);

        let mut cursor = Cursor::new(buf);
        let decoded = decode_file_list(&mut cursor, CodecOptions::default()).unwrap();
        assert_eq!(decoded.len(), entries.len());
        for (original, got) in entries.iter().zip(decoded.iter()) {
            assert_eq!(original.name, got.name);
            assert_eq!(original.mode, got.mode);
        }
    }

    #[test]
    fn flags_that_would_be_zero_are_disambiguated_from_the_terminator() {
        // A lone, short-named, non-root entry naturally has every
        // same-* bit clear: its flags byte would be 0 without the
        // top-dir sentinel.
        let entry = sample("x", 0, 0o100_644);
        let mut buf = Vec::new();
        encode_entry(&mut buf, CodecOptions::default(), None, &entry).unwrap();
        assert_ne!(buf[0], 0);

        let mut cursor = Cursor::new(buf);
        let decoded = decode_entry(&mut cursor, CodecOptions::default(), None)
            .unwrap()
            .unwrap();
        assert_eq!(decoded.name, b"x");
        // Sentinel use of XMIT_TOP_DIR must not leak as a real top_dir
        // flag for a non-directory entry.
        assert!(!decoded.top_dir);
    }

    #[test]
    fn empty_list_is_just_the_terminator() {
        let mut buf = Vec::new();
        encode_file_list(&mut buf, CodecOptions::default(), &[]).unwrap();
        assert_eq!(buf, vec![0]);
    }

    #[test]
    fn same_name_prefix_longer_than_previous_name_is_a_protocol_violation() {
        // Simulates spec.md §8 scenario 5: XMIT_SAME_NAME with a
        // prefix claim that outruns the previous entry's actual name.
        let mut buf = Vec::new();
        write_u8(&mut buf, XMIT_SAME_NAME).unwrap();
        write_u8(&mut buf, 4).unwrap();
        write_prefixed_bytes(&mut buf, b"xx", false).unwrap();

        let prev = sample("ab", 0, 0o100_644);
        let mut cursor = Cursor::new(buf);
        let err = decode_entry(&mut cursor, CodecOptions::default(), Some(&prev)).unwrap_err();
        assert!(matches!(err, FlistError::InvalidPrefix { .. }));
    }

    fn arb_entry() -> impl proptest::strategy::Strategy<Value = FileEntry> {
        use proptest::prelude::*;
        (
            proptest::collection::vec(any::<u8>(), 0..24),
            0u64..1_000_000u64,
            any::<i32>(),
            0u32..=0o777u32,
        )
            .prop_map(|(name, length, mtime, perm)| FileEntry {
                name,
                length,
                mtime: i64::from(mtime),
                mode: crate::entry::S_IFREG | perm,
                uid: None,
                gid: None,
                rdev: None,
                symlink_target: None,
                checksum: None,
                top_dir: false,
            })
    }

    proptest::proptest! {
        // Property P1: a full entry list round-trips through
        // encode_file_list/decode_file_list unchanged.
        #[test]
        fn property_p1_file_list_round_trips(
            entries in proptest::collection::vec(arb_entry(), 0..12)
        ) {
            let mut buf = Vec::new();
            encode_file_list(&mut buf, CodecOptions::default(), &entries).unwrap();
            let mut cursor = Cursor::new(buf);
            let decoded = decode_file_list(&mut cursor, CodecOptions::default()).unwrap();

            proptest::prop_assert_eq!(decoded.len(), entries.len());
            for (original, got) in entries.iter().zip(decoded.iter()) {
                proptest::prop_assert_eq!(&original.name, &got.name);
                proptest::prop_assert_eq!(original.length, got.length);
                proptest::prop_assert_eq!(original.mtime, got.mtime);
                proptest::prop_assert_eq!(original.mode, got.mode);
            }
        }

        // Property P2: the SAME_TIME flag bit agrees exactly with mtime
        // equality against the previous entry, and decoding the opposite
        // assumption (bit cleared, payload unchanged) desyncs the reader
        // rather than silently reproducing the original entry.
        #[test]
        fn property_p2_same_time_flag_matches_equality_and_is_load_bearing(
            prev in arb_entry(), entry in arb_entry(),
        ) {
            let mut buf = Vec::new();
            encode_entry(&mut buf, CodecOptions::default(), Some(&prev), &entry).unwrap();
            let flags = buf[0];
            proptest::prop_assert_eq!(flags & XMIT_SAME_TIME != 0, prev.mtime == entry.mtime);
            proptest::prop_assert_eq!(flags & XMIT_SAME_MODE != 0, prev.mode == entry.mode);

            let mut cursor = Cursor::new(buf.clone());
            let decoded = decode_entry(&mut cursor, CodecOptions::default(), Some(&prev))
                .unwrap()
                .unwrap();
            proptest::prop_assert_eq!(decoded.mtime, entry.mtime);
            proptest::prop_assert_eq!(decoded.mode, entry.mode);

            if prev.mtime == entry.mtime {
                let mut corrupted = buf.clone();
                corrupted[0] &= !XMIT_SAME_TIME;
                let mut cursor = Cursor::new(corrupted);
                let result = decode_entry(&mut cursor, CodecOptions::default(), Some(&prev));
                let desynced = match result {
                    Err(_) => true,
                    Ok(None) => true,
                    Ok(Some(got)) => got.mtime != entry.mtime,
                };
                proptest::prop_assert!(desynced);
            }
        }
    }
}
