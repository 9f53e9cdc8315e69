//! Sequence decoder: ordered lists of elements decoded out of a parent view.
//!
//! Two element-size modes:
//! - **Fixed**: every element occupies the same stride. The whole run
//!   `offset + count * stride` is checked against the parent before any
//!   element is decoded.
//! - **Self-describing**: each element is built from the rest of the parent
//!   and reports its own size. The total is only known after the last
//!   element, so there is no upfront check; an element that runs past the
//!   parent fails when its own window is borrowed.
//!
//! In both modes the list's own view is a borrowed window
//! `[offset, final_cursor)` of the parent.
//!
//! # Example
//!
//! ```
//! use xcb_binding::protocol::{BufferView, List};
//!
//! let mut raw = Vec::new();
//! for v in [10u32, 20, 30] {
//!     raw.extend_from_slice(&v.to_ne_bytes());
//! }
//! let parent = BufferView::owned(raw);
//!
//! let list = List::<u32>::scalars(&parent, 0, 3).unwrap();
//! assert_eq!(list.items(), &[10, 20, 30]);
//! assert_eq!(list.view().len(), 12);
//! ```

use std::ops::Index;

use bytes::Buf;

use super::{BufferView, ProtocolObject};
use crate::error::{Error, Result};

/// Fixed-width scalar element (native byte order).
pub trait Scalar: Copy + 'static {
    /// Width in bytes.
    const SIZE: usize;

    /// Read one value, advancing the cursor.
    fn read(buf: &mut &[u8]) -> Self;
}

macro_rules! impl_scalar {
    ($($ty:ty => $get:ident),* $(,)?) => {
        $(
            impl Scalar for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                #[inline]
                fn read(buf: &mut &[u8]) -> Self {
                    buf.$get()
                }
            }
        )*
    };
}

impl_scalar! {
    u8 => get_u8,
    i8 => get_i8,
    u16 => get_u16_ne,
    i16 => get_i16_ne,
    u32 => get_u32_ne,
    i32 => get_i32_ne,
    u64 => get_u64_ne,
    i64 => get_i64_ne,
    f32 => get_f32_ne,
    f64 => get_f64_ne,
}

/// Scalar format character, as used by generated code for primitive lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// `b`: signed 8-bit.
    I8,
    /// `B`: unsigned 8-bit.
    U8,
    /// `h`: signed 16-bit.
    I16,
    /// `H`: unsigned 16-bit.
    U16,
    /// `i`: signed 32-bit.
    I32,
    /// `I`: unsigned 32-bit.
    U32,
    /// `L`: signed 64-bit.
    I64,
    /// `K`: unsigned 64-bit.
    U64,
    /// `f`: 32-bit float.
    F32,
    /// `d`: 64-bit float.
    F64,
}

impl Format {
    /// Parse a format character.
    pub fn from_char(c: char) -> Result<Self> {
        Ok(match c {
            'b' => Format::I8,
            'B' => Format::U8,
            'h' => Format::I16,
            'H' => Format::U16,
            'i' => Format::I32,
            'I' => Format::U32,
            'L' => Format::I64,
            'K' => Format::U64,
            'f' => Format::F32,
            'd' => Format::F64,
            other => return Err(Error::InvalidFormat(other)),
        })
    }

    /// Width in bytes.
    pub fn size(self) -> usize {
        match self {
            Format::I8 | Format::U8 => 1,
            Format::I16 | Format::U16 => 2,
            Format::I32 | Format::U32 | Format::F32 => 4,
            Format::I64 | Format::U64 | Format::F64 => 8,
        }
    }

    fn read(self, buf: &mut &[u8]) -> Value {
        match self {
            Format::I8 => Value::Int(i8::read(buf).into()),
            Format::U8 => Value::UInt(u8::read(buf).into()),
            Format::I16 => Value::Int(i16::read(buf).into()),
            Format::U16 => Value::UInt(u16::read(buf).into()),
            Format::I32 => Value::Int(i32::read(buf).into()),
            Format::U32 => Value::UInt(u32::read(buf).into()),
            Format::I64 => Value::Int(i64::read(buf)),
            Format::U64 => Value::UInt(u64::read(buf)),
            Format::F32 => Value::Float(f32::read(buf).into()),
            Format::F64 => Value::Float(f64::read(buf)),
        }
    }
}

/// Dynamically typed scalar decoded through a [`Format`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// Any signed integer format.
    Int(i64),
    /// Any unsigned integer format.
    UInt(u64),
    /// Any float format.
    Float(f64),
}

/// Ordered sequence of decoded elements plus the window they came from.
#[derive(Debug, Clone)]
pub struct List<T> {
    view: BufferView,
    items: Vec<T>,
}

/// Check that `count` elements of `stride` bytes fit after `offset`.
fn check_fixed(parent: &BufferView, offset: usize, count: usize, stride: usize) -> Result<usize> {
    let total = count
        .checked_mul(stride)
        .ok_or_else(|| Error::range(offset, usize::MAX, parent.len()))?;
    match offset.checked_add(total) {
        Some(end) if end <= parent.len() => Ok(total),
        _ => Err(Error::range(offset, total, parent.len())),
    }
}

impl<T> List<T> {
    /// Decode `count` elements of a fixed `stride` with `read`.
    fn fixed_with<F>(
        parent: &BufferView,
        offset: usize,
        count: usize,
        stride: usize,
        mut read: F,
    ) -> Result<Self>
    where
        F: FnMut(usize) -> Result<T>,
    {
        let total = check_fixed(parent, offset, count, stride)?;
        let items = (0..count)
            .map(|i| read(offset + i * stride))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            view: parent.borrow(offset, total)?,
            items,
        })
    }

    /// Window of the parent covered by the list.
    #[inline]
    pub fn view(&self) -> &BufferView {
        &self.view
    }

    /// Decoded elements.
    #[inline]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Consume into the decoded elements.
    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    /// Get an element by index.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// Iterate over the elements.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the list has no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: Scalar> List<T> {
    /// Decode `count` scalars of type `T` starting at `offset`.
    pub fn scalars(parent: &BufferView, offset: usize, count: usize) -> Result<Self> {
        let data = parent.as_slice();
        Self::fixed_with(parent, offset, count, T::SIZE, |at| {
            let mut cursor = &data[at..];
            Ok(T::read(&mut cursor))
        })
    }
}

impl List<Value> {
    /// Decode `count` scalars described by a format character.
    pub fn formatted(parent: &BufferView, offset: usize, count: usize, format: char) -> Result<Self> {
        let format = Format::from_char(format)?;
        let data = parent.as_slice();
        Self::fixed_with(parent, offset, count, format.size(), |at| {
            let mut cursor = &data[at..];
            Ok(format.read(&mut cursor))
        })
    }
}

impl<T: ProtocolObject> List<T> {
    /// Decode `count` objects of a known `size` starting at `offset`.
    pub fn fixed(parent: &BufferView, offset: usize, count: usize, size: usize) -> Result<Self> {
        Self::fixed_with(parent, offset, count, size, |at| {
            T::from_view(parent.borrow(at, size)?)
        })
    }

    /// Decode `count` self-sizing objects starting at `offset`.
    ///
    /// Each element is offered the rest of the parent and advances the
    /// cursor by its reported [`ProtocolObject::size`].
    pub fn variable(parent: &BufferView, offset: usize, count: usize) -> Result<Self> {
        let mut cursor = offset;
        let mut items = Vec::with_capacity(count.min(parent.len()));
        for _ in 0..count {
            let item = T::from_view(parent.borrow_from(cursor)?)?;
            cursor = cursor
                .checked_add(item.size())
                .ok_or_else(|| Error::range(cursor, item.size(), parent.len()))?;
            items.push(item);
        }
        let length = cursor - offset;
        Ok(Self {
            view: parent.borrow(offset, length)?,
            items,
        })
    }
}

impl<T> Index<usize> for List<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}

impl<'a, T> IntoIterator for &'a List<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Length-prefixed string: u8 length followed by that many bytes.
    #[derive(Debug)]
    struct Str(BufferView);

    impl ProtocolObject for Str {
        const NAME: &'static str = "Str";

        fn from_view(view: BufferView) -> Result<Self> {
            let len = view.u8_at(0)? as usize;
            Ok(Self(view.borrow(0, 1 + len)?))
        }

        fn view(&self) -> &BufferView {
            &self.0
        }
    }

    impl Str {
        fn text(&self) -> &[u8] {
            &self.0.as_slice()[1..]
        }
    }

    fn u32s(values: &[u32]) -> BufferView {
        let mut raw = Vec::new();
        for v in values {
            raw.extend_from_slice(&v.to_ne_bytes());
        }
        BufferView::owned(raw)
    }

    #[test]
    fn test_fixed_size_exact_fit() {
        let parent = u32s(&[1, 2, 3]);
        let list = List::<BufferView>::fixed(&parent, 0, 3, 4).unwrap();

        assert_eq!(list.len(), 3);
        assert_eq!(list.view().offset(), 0);
        assert_eq!(list.view().len(), 12);
        assert_eq!(list[1].as_slice(), &2u32.to_ne_bytes());
    }

    #[test]
    fn test_fixed_size_rejected_before_decoding() {
        let parent = BufferView::owned(vec![0u8; 11]);
        let result = List::<u32>::scalars(&parent, 0, 3);
        assert!(matches!(
            result,
            Err(Error::Range {
                offset: 0,
                length: 12,
                available: 11
            })
        ));
    }

    #[test]
    fn test_fixed_size_accounts_for_offset() {
        let parent = u32s(&[0, 7, 8]);
        let list = List::<u32>::scalars(&parent, 4, 2).unwrap();
        assert_eq!(list.items(), &[7, 8]);
        assert_eq!(list.view().offset(), 4);

        assert!(List::<u32>::scalars(&parent, 8, 2).is_err());
    }

    #[test]
    fn test_empty_list() {
        let parent = u32s(&[1]);
        let list = List::<u16>::scalars(&parent, 4, 0).unwrap();
        assert!(list.is_empty());
        assert_eq!(list.view().len(), 0);
    }

    #[test]
    fn test_formatted_values() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&(-2i16).to_ne_bytes());
        raw.extend_from_slice(&500i16.to_ne_bytes());
        let parent = BufferView::owned(raw);

        let list = List::formatted(&parent, 0, 2, 'h').unwrap();
        assert_eq!(list.items(), &[Value::Int(-2), Value::Int(500)]);

        let list = List::formatted(&parent, 0, 4, 'B').unwrap();
        assert!(matches!(list[0], Value::UInt(_)));
    }

    #[test]
    fn test_invalid_format_character() {
        let parent = u32s(&[1]);
        assert!(matches!(
            List::formatted(&parent, 0, 1, 'z'),
            Err(Error::InvalidFormat('z'))
        ));
    }

    #[test]
    fn test_format_sizes() {
        for (c, size) in [('b', 1), ('H', 2), ('I', 4), ('f', 4), ('K', 8), ('d', 8)] {
            assert_eq!(Format::from_char(c).unwrap().size(), size);
        }
    }

    #[test]
    fn test_self_describing_elements() {
        let parent = BufferView::owned(b"\x02hi\x03abc\x00tail".to_vec());
        let list = List::<Str>::variable(&parent, 0, 3).unwrap();

        assert_eq!(list[0].text(), b"hi");
        assert_eq!(list[1].text(), b"abc");
        assert_eq!(list[2].text(), b"");
        assert_eq!(list.view().len(), 8);
        assert!(list.iter().all(|s| s.view().is_borrowed()));
    }

    #[test]
    fn test_self_describing_overrun_fails_at_element() {
        // Second element claims 9 bytes but only 3 remain.
        let parent = BufferView::owned(b"\x01a\x09bc".to_vec());
        assert!(matches!(
            List::<Str>::variable(&parent, 0, 2),
            Err(Error::Range { .. })
        ));
    }

    #[test]
    fn test_list_keeps_parent_alive() {
        let parent = u32s(&[5, 6]);
        let list = List::<BufferView>::fixed(&parent, 0, 2, 4).unwrap();
        drop(parent);
        assert_eq!(list[1].as_slice(), &6u32.to_ne_bytes());
    }
}
