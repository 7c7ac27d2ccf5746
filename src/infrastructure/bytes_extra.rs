//! Reader for the `BytesExtra` column of the desktop `MSG` table.
//!
//! The column is a protobuf message whose field 3 repeats
//! `{ 1: kind (varint), 2: value (string) }` entries. In group chats the
//! entry of kind 1 carries the wxid of the member who sent the message.

/// Entry kind holding the group sender's wxid.
const SENDER_KIND: u64 = 1;

/// Field number of the repeated property entries.
const ENTRIES_FIELD: u64 = 3;
const ENTRY_KIND_FIELD: u64 = 1;
const ENTRY_VALUE_FIELD: u64 = 2;

/// A decoded protobuf field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldValue<'a> {
    Varint(u64),
    Bytes(&'a [u8]),
    Fixed,
}

/// Iterates over the top-level fields of a protobuf message.
///
/// Stops at the first malformed field; everything before it is still
/// yielded.
struct FieldReader<'a> {
    buf: &'a [u8],
}

impl<'a> FieldReader<'a> {
    const fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn varint(&mut self) -> Option<u64> {
        let mut value = 0u64;
        for (i, byte) in self.buf.iter().enumerate().take(10) {
            value |= u64::from(byte & 0x7f) << (7 * i);
            if byte & 0x80 == 0 {
                self.buf = &self.buf[i + 1..];
                return Some(value);
            }
        }
        None
    }

    fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        if len > self.buf.len() {
            return None;
        }
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Some(head)
    }

    fn field(&mut self) -> Option<(u64, FieldValue<'a>)> {
        let key = self.varint()?;
        let value = match key & 0x7 {
            0 => FieldValue::Varint(self.varint()?),
            1 => self.take(8).map(|_| FieldValue::Fixed)?,
            2 => {
                let len = usize::try_from(self.varint()?).ok()?;
                FieldValue::Bytes(self.take(len)?)
            }
            5 => self.take(4).map(|_| FieldValue::Fixed)?,
            _ => return None,
        };
        Some((key >> 3, value))
    }
}

impl<'a> Iterator for FieldReader<'a> {
    type Item = (u64, FieldValue<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.buf.is_empty() {
            return None;
        }
        let field = self.field();
        if field.is_none() {
            self.buf = &[];
        }
        field
    }
}

/// Wxid of the group member who sent the message, if recorded.
pub fn sender_wxid(extra: &[u8]) -> Option<&str> {
    FieldReader::new(extra)
        .filter_map(|(number, value)| match value {
            FieldValue::Bytes(entry) if number == ENTRIES_FIELD => Some(entry),
            _ => None,
        })
        .find_map(|entry| {
            let mut kind = None;
            let mut text = None;
            for (number, value) in FieldReader::new(entry) {
                match (number, value) {
                    (ENTRY_KIND_FIELD, FieldValue::Varint(k)) => kind = Some(k),
                    (ENTRY_VALUE_FIELD, FieldValue::Bytes(b)) => text = std::str::from_utf8(b).ok(),
                    _ => {}
                }
            }
            (kind == Some(SENDER_KIND)).then_some(text?).filter(|t| !t.is_empty())
        })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn put_varint(out: &mut Vec<u8>, mut value: u64) {
        while value >= 0x80 {
            out.push((value as u8) | 0x80);
            value >>= 7;
        }
        out.push(value as u8);
    }

    fn put_bytes(out: &mut Vec<u8>, field: u64, bytes: &[u8]) {
        put_varint(out, field << 3 | 2);
        put_varint(out, bytes.len() as u64);
        out.extend_from_slice(bytes);
    }

    fn entry(kind: u64, value: &str) -> Vec<u8> {
        let mut out = Vec::new();
        put_varint(&mut out, ENTRY_KIND_FIELD << 3);
        put_varint(&mut out, kind);
        put_bytes(&mut out, ENTRY_VALUE_FIELD, value.as_bytes());
        out
    }

    /// Encodes a `BytesExtra` blob with a header and the given entries.
    pub(crate) fn encode(entries: &[(u64, &str)]) -> Vec<u8> {
        let mut header = Vec::new();
        put_varint(&mut header, 1 << 3);
        put_varint(&mut header, 0);
        put_varint(&mut header, 2 << 3);
        put_varint(&mut header, 2);

        let mut out = Vec::new();
        put_bytes(&mut out, 1, &header);
        for (kind, value) in entries {
            put_bytes(&mut out, ENTRIES_FIELD, &entry(*kind, value));
        }
        out
    }

    #[test]
    fn test_sender_entry_is_found_among_others() {
        let blob = encode(&[
            (7, "<msgsource><silence>0</silence></msgsource>"),
            (SENDER_KIND, "wxid_alice"),
            (3, "thumb/abc.dat"),
        ]);
        assert_eq!(sender_wxid(&blob), Some("wxid_alice"));
    }

    #[test]
    fn test_no_sender_entry() {
        assert_eq!(sender_wxid(&encode(&[(7, "<msgsource/>")])), None);
        assert_eq!(sender_wxid(&encode(&[(SENDER_KIND, "")])), None);
        assert_eq!(sender_wxid(&[]), None);
    }

    #[test]
    fn test_fixed_width_fields_are_skipped() {
        let mut blob = Vec::new();
        put_varint(&mut blob, 4 << 3 | 1);
        blob.extend_from_slice(&[0; 8]);
        put_varint(&mut blob, 5 << 3 | 5);
        blob.extend_from_slice(&[0; 4]);
        blob.extend(encode(&[(SENDER_KIND, "wxid_bob")]));
        assert_eq!(sender_wxid(&blob), Some("wxid_bob"));
    }

    #[test]
    fn test_truncated_blob_keeps_earlier_entries() {
        let mut blob = encode(&[(SENDER_KIND, "wxid_carol")]);
        put_varint(&mut blob, ENTRIES_FIELD << 3 | 2);
        put_varint(&mut blob, 200);
        blob.extend_from_slice(b"short");
        assert_eq!(sender_wxid(&blob), Some("wxid_carol"));

        let cut = encode(&[(SENDER_KIND, "wxid_carol")]);
        assert_eq!(sender_wxid(&cut[..cut.len() - 3]), None);
        assert_eq!(sender_wxid(&[0xff; 12]), None);
    }
}
