use crate::error::{Error, Result};

/// An owned, fixed-size copy of image bytes handed in by the caller.
///
/// The storage is released explicitly with [`ByteBuffer::release`], which can
/// be called any number of times. Dropping the buffer releases it as well.
#[derive(Debug, Default)]
pub struct ByteBuffer {
    data: Option<Vec<u8>>,
}

impl ByteBuffer {
    /// Copy the first `size` bytes of `source` into newly allocated storage.
    pub fn new(source: &[u8], size: usize) -> Result<Self> {
        if size > source.len() {
            log::debug!(
                "Buffer of {size} bytes requested from a {} byte source",
                source.len()
            );
            return Err(Error::Allocation { size });
        }

        let mut data = Vec::new();
        data.try_reserve_exact(size)
            .map_err(|_| Error::Allocation { size })?;
        data.extend_from_slice(&source[..size]);

        Ok(Self { data: Some(data) })
    }

    /// Copy the whole of `source`.
    pub fn from_slice(source: &[u8]) -> Result<Self> {
        Self::new(source, source.len())
    }

    /// An independent copy of the stored bytes. Empty once released.
    pub fn dump(&self) -> Vec<u8> {
        self.as_slice().to_vec()
    }

    pub fn as_slice(&self) -> &[u8] {
        self.data.as_deref().unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Free the storage. A second call is a no-op.
    pub fn release(&mut self) {
        if self.data.take().is_some() {
            log::debug!("Byte buffer released");
        }
    }

    pub fn is_released(&self) -> bool {
        self.data.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_requested_prefix() {
        let buf = ByteBuffer::new(b"abcdef", 4).unwrap();
        assert_eq!(buf.len(), 4);
        assert_eq!(buf.dump(), b"abcd".to_vec());
    }

    #[test]
    fn dump_is_independent() {
        let buf = ByteBuffer::from_slice(b"xyz").unwrap();
        let mut copy = buf.dump();
        copy[0] = b'q';
        assert_eq!(buf.as_slice(), b"xyz");
    }

    #[test]
    fn oversized_request_fails() {
        let err = ByteBuffer::new(b"ab", 3).unwrap_err();
        assert!(matches!(err, Error::Allocation { size: 3 }));
    }

    #[test]
    fn release_is_idempotent() {
        let mut buf = ByteBuffer::from_slice(b"data").unwrap();
        buf.release();
        assert!(buf.is_released());
        assert!(buf.is_empty());
        buf.release();
        assert!(buf.is_released());
        assert!(buf.dump().is_empty());
    }
}
