//! uid/gid name maps exchanged after the file list.
//!
//! # Upstream Reference
//!
//! `uidlist.c:send_uid_list`/`recv_uid_list`, summarized in spec.md
//! §4.E ("if PreserveUid: repeated `(uid:int32, name-len:byte,
//! name:bytes)` tuples terminated by a zero uid; same for gid") and
//! §6's id-mapping interface.

use std::io::{Read, Write};

use protocol::codec::{read_i32, read_prefixed_bytes, write_i32, write_prefixed_bytes};
use protocol::WireResult;

/// One remote id paired with the name it resolves to locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdEntry {
    /// Numeric id as seen by the peer.
    pub id: u32,
    /// Name to resolve against the local name database (a collaborator
    /// outside this core; see spec.md §1).
    pub name: Vec<u8>,
}

/// Writes a list of id/name pairs, terminated by a zero id.
pub fn write_id_list<W: Write>(writer: &mut W, entries: &[IdEntry]) -> WireResult<()> {
    for entry in entries {
        write_i32(writer, entry.id as i32)?;
        write_prefixed_bytes(writer, &entry.name, false)?;
    }
    write_i32(writer, 0)?;
    Ok(())
}

/// Reads a list of id/name pairs written by [`write_id_list`].
pub fn read_id_list<R: Read>(reader: &mut R) -> WireResult<Vec<IdEntry>> {
    let mut entries = Vec::new();
    loop {
        let id = read_i32(reader)?;
        if id == 0 {
            break;
        }
        let name = read_prefixed_bytes(reader, false)?;
        entries.push(IdEntry {
            id: id as u32,
            name,
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips_a_list_of_ids() {
        let entries = vec![
            IdEntry {
                id: 1000,
                name: b"alice".to_vec(),
            },
            IdEntry {
                id: 1001,
                name: b"bob".to_vec(),
            },
        ];
        let mut buf = Vec::new();
        write_id_list(&mut buf, &entries).unwrap();
        let mut cursor = Cursor::new(buf);
        assert_eq!(read_id_list(&mut cursor).unwrap(), entries);
    }

    #[test]
    fn empty_list_is_just_the_zero_terminator() {
        let mut buf = Vec::new();
        write_id_list(&mut buf, &[]).unwrap();
        assert_eq!(buf, vec![0, 0, 0, 0]);
    }
}
