/// UTF-8 decoder that carries an incomplete trailing sequence over to the
/// next call instead of replacing it.
///
/// Devices deliver bytes with no regard for character boundaries, so a
/// multi-byte character can be split across two flushes. Invalid bytes are
/// replaced with U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Carry {
  pending: Vec<u8>,
}

impl Utf8Carry {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  pub fn decode(&mut self, bytes: &[u8]) -> String {
    let mut buf = std::mem::take(&mut self.pending);
    buf.extend_from_slice(bytes);

    let mut out = String::with_capacity(buf.len());
    let mut rest = buf.as_slice();
    loop {
      match std::str::from_utf8(rest) {
        Ok(valid) => {
          out.push_str(valid);
          break;
        }
        Err(err) => {
          let (valid, after) = rest.split_at(err.valid_up_to());
          out.push_str(&String::from_utf8_lossy(valid));
          if let Some(len) = err.error_len() {
            out.push(char::REPLACEMENT_CHARACTER);
            rest = &after[len..];
          } else {
            self.pending = after.to_vec();
            break;
          }
        }
      }
    }
    out
  }

  /// Give up on a held-back partial character and return it as U+FFFD.
  pub fn finish(&mut self) -> String {
    let rest = std::mem::take(&mut self.pending);
    String::from_utf8_lossy(&rest).into_owned()
  }

  /// Bytes held back waiting for the rest of a character.
  #[must_use]
  pub fn pending_len(&self) -> usize {
    self.pending.len()
  }
}
