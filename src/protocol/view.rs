//! Ownership-aware, zero-copy window over server-supplied bytes.
//!
//! A [`BufferView`] either owns the raw memory handed over by the transport,
//! or borrows a window of another view. Both share the same reference-counted
//! storage (`bytes::Bytes`): a borrowed view keeps the root allocation alive
//! for as long as it exists, and dropping it never releases memory another
//! view still points into.
//!
//! # Example
//!
//! ```
//! use xcb_binding::protocol::BufferView;
//!
//! let root = BufferView::owned(vec![1u8, 2, 3, 4, 5, 6]);
//! let child = root.borrow(2, 3).unwrap();
//!
//! assert_eq!(child.as_slice(), &[3, 4, 5]);
//! assert!(child.is_borrowed());
//! assert!(root.borrow(4, 3).is_err());
//! ```

use std::fmt;

use bytes::Bytes;

use crate::error::{Error, Result};

/// How a view relates to its memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// The view is the root of a transport-supplied buffer.
    Owned,
    /// The view is a window `offset..offset+len` of a parent view.
    Borrowed {
        /// Offset relative to the parent view.
        offset: usize,
    },
}

/// Read-only window over protocol bytes.
#[derive(Clone)]
pub struct BufferView {
    data: Bytes,
    ownership: Ownership,
}

impl BufferView {
    /// Take ownership of transport-supplied memory.
    ///
    /// The owner is released exactly once, when the last view sharing it
    /// is dropped.
    pub fn owned<T>(raw: T) -> Self
    where
        T: AsRef<[u8]> + Send + 'static,
    {
        Self {
            data: Bytes::from_owner(raw),
            ownership: Ownership::Owned,
        }
    }

    /// Wrap bytes that are already reference-counted (no copy).
    pub fn from_bytes(data: Bytes) -> Self {
        Self {
            data,
            ownership: Ownership::Owned,
        }
    }

    /// Borrow `length` bytes starting at `offset` of this view.
    ///
    /// Fails with [`Error::Range`] when the window extends past the end of
    /// this view.
    pub fn borrow(&self, offset: usize, length: usize) -> Result<Self> {
        let end = offset
            .checked_add(length)
            .ok_or_else(|| Error::range(offset, length, self.len()))?;
        if end > self.len() {
            return Err(Error::range(offset, length, self.len()));
        }
        Ok(Self {
            data: self.data.slice(offset..end),
            ownership: Ownership::Borrowed { offset },
        })
    }

    /// Borrow everything from `offset` to the end of this view.
    pub fn borrow_from(&self, offset: usize) -> Result<Self> {
        let length = self
            .len()
            .checked_sub(offset)
            .ok_or_else(|| Error::range(offset, 0, self.len()))?;
        self.borrow(offset, length)
    }

    /// Ownership mode of this view.
    #[inline]
    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    /// Check if this view owns its root buffer.
    #[inline]
    pub fn is_owned(&self) -> bool {
        self.ownership == Ownership::Owned
    }

    /// Check if this view borrows from a parent.
    #[inline]
    pub fn is_borrowed(&self) -> bool {
        !self.is_owned()
    }

    /// Offset of this view within its parent (0 for owned views).
    #[inline]
    pub fn offset(&self) -> usize {
        match self.ownership {
            Ownership::Owned => 0,
            Ownership::Borrowed { offset } => offset,
        }
    }

    /// Get the bytes covered by this view.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Get a clone of the underlying Bytes (cheap, zero-copy).
    #[inline]
    pub fn bytes(&self) -> Bytes {
        self.data.clone()
    }

    /// Get the view length.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the view is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Read one byte at `offset`.
    pub fn u8_at(&self, offset: usize) -> Result<u8> {
        self.data
            .get(offset)
            .copied()
            .ok_or_else(|| Error::range(offset, 1, self.len()))
    }

    /// Read a native-endian u16 at `offset`.
    pub fn u16_at(&self, offset: usize) -> Result<u16> {
        let raw = self.array_at::<2>(offset)?;
        Ok(u16::from_ne_bytes(raw))
    }

    /// Read a native-endian u32 at `offset`.
    pub fn u32_at(&self, offset: usize) -> Result<u32> {
        let raw = self.array_at::<4>(offset)?;
        Ok(u32::from_ne_bytes(raw))
    }

    fn array_at<const N: usize>(&self, offset: usize) -> Result<[u8; N]> {
        let window = offset
            .checked_add(N)
            .and_then(|end| self.data.get(offset..end))
            .ok_or_else(|| Error::range(offset, N, self.len()))?;
        let mut out = [0u8; N];
        out.copy_from_slice(window);
        Ok(out)
    }
}

impl AsRef<[u8]> for BufferView {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl fmt::Debug for BufferView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferView")
            .field("ownership", &self.ownership)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Raw buffer that counts how many times it was released.
    struct TrackedBuffer {
        data: Vec<u8>,
        released: Arc<AtomicUsize>,
    }

    impl AsRef<[u8]> for TrackedBuffer {
        fn as_ref(&self) -> &[u8] {
            &self.data
        }
    }

    impl Drop for TrackedBuffer {
        fn drop(&mut self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn tracked(len: usize) -> (BufferView, Arc<AtomicUsize>) {
        let released = Arc::new(AtomicUsize::new(0));
        let raw = TrackedBuffer {
            data: (0..len as u8).collect(),
            released: released.clone(),
        };
        (BufferView::owned(raw), released)
    }

    #[test]
    fn test_owned_view() {
        let view = BufferView::owned(vec![9u8, 8, 7]);
        assert!(view.is_owned());
        assert_eq!(view.offset(), 0);
        assert_eq!(view.len(), 3);
        assert_eq!(view.as_slice(), &[9, 8, 7]);
    }

    #[test]
    fn test_borrow_matches_parent_slice() {
        let (root, _) = tracked(32);
        for (offset, length) in [(0, 32), (0, 0), (4, 8), (31, 1), (32, 0)] {
            let child = root.borrow(offset, length).unwrap();
            assert_eq!(child.as_slice(), &root.as_slice()[offset..offset + length]);
            assert_eq!(child.ownership(), Ownership::Borrowed { offset });
        }
    }

    #[test]
    fn test_borrow_out_of_bounds() {
        let (root, _) = tracked(16);
        assert!(matches!(root.borrow(10, 7), Err(Error::Range { .. })));
        assert!(matches!(root.borrow(17, 0), Err(Error::Range { .. })));
        assert!(matches!(root.borrow(usize::MAX, 2), Err(Error::Range { .. })));
        assert!(matches!(root.borrow_from(17), Err(Error::Range { .. })));
    }

    #[test]
    fn test_borrow_is_zero_copy() {
        let (root, _) = tracked(16);
        let child = root.borrow(4, 4).unwrap();
        assert_eq!(child.as_slice().as_ptr(), root.as_slice()[4..].as_ptr());
    }

    #[test]
    fn test_parent_kept_alive_by_borrowers() {
        let (root, released) = tracked(16);
        let first = root.borrow(0, 8).unwrap();
        let second = first.borrow(2, 4).unwrap();

        drop(root);
        drop(first);
        assert_eq!(released.load(Ordering::SeqCst), 0);
        assert_eq!(second.as_slice(), &[2, 3, 4, 5]);

        drop(second);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_sibling_borrowers_are_independent() {
        let (root, released) = tracked(16);
        let left = root.borrow(0, 4).unwrap();
        let right = root.borrow(8, 4).unwrap();

        drop(left);
        assert_eq!(released.load(Ordering::SeqCst), 0);
        assert_eq!(right.as_slice(), &[8, 9, 10, 11]);
        assert_eq!(right.offset(), 8);

        drop(root);
        assert_eq!(released.load(Ordering::SeqCst), 0);
        assert_eq!(right.u8_at(3).unwrap(), 11);

        drop(right);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_scalar_reads() {
        let mut raw = vec![0xAAu8];
        raw.extend_from_slice(&0x1234u16.to_ne_bytes());
        raw.extend_from_slice(&0xDEADBEEFu32.to_ne_bytes());
        let view = BufferView::owned(raw);

        assert_eq!(view.u8_at(0).unwrap(), 0xAA);
        assert_eq!(view.u16_at(1).unwrap(), 0x1234);
        assert_eq!(view.u32_at(3).unwrap(), 0xDEADBEEF);
        assert!(view.u32_at(4).is_err());
        assert!(view.u8_at(7).is_err());
    }
}
