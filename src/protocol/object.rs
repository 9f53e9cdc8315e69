//! Protocol object contract and decoder identities.
//!
//! Every typed protocol message (event, error, reply, struct) is a thin
//! wrapper around a [`BufferView`]. Generated per-message code implements
//! [`ProtocolObject`]; the dispatch tables store the type's [`DecoderId`].

use std::any::TypeId;
use std::fmt;

use super::BufferView;
use crate::error::Result;

/// A typed view over protocol bytes.
pub trait ProtocolObject: Sized + 'static {
    /// Type name reported by dispatch (e.g. `"Expose"`).
    const NAME: &'static str;

    /// Decode from a view. The view may extend past the end of the object;
    /// implementations narrow it when their size is self-describing.
    fn from_view(view: BufferView) -> Result<Self>;

    /// The bytes backing this object.
    fn view(&self) -> &BufferView;

    /// Number of bytes this object occupies.
    fn size(&self) -> usize {
        self.view().len()
    }
}

impl ProtocolObject for BufferView {
    const NAME: &'static str = "Protobj";

    fn from_view(view: BufferView) -> Result<Self> {
        Ok(view)
    }

    fn view(&self) -> &BufferView {
        self
    }
}

/// Identity of a registered decoder type.
///
/// Two identities are equal when they name the same Rust type.
#[derive(Clone, Copy)]
pub struct DecoderId {
    type_id: TypeId,
    name: &'static str,
}

impl DecoderId {
    /// Identity of the protocol object type `T`.
    pub fn of<T: ProtocolObject>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: T::NAME,
        }
    }

    /// Type name of the decoder.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Check if this identity names `T`.
    #[inline]
    pub fn is<T: ProtocolObject>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

impl PartialEq for DecoderId {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for DecoderId {}

impl fmt::Debug for DecoderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DecoderId({})", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Alpha(BufferView);
    struct Beta(BufferView);

    impl ProtocolObject for Alpha {
        const NAME: &'static str = "Alpha";
        fn from_view(view: BufferView) -> Result<Self> {
            Ok(Self(view))
        }
        fn view(&self) -> &BufferView {
            &self.0
        }
    }

    impl ProtocolObject for Beta {
        const NAME: &'static str = "Alpha";
        fn from_view(view: BufferView) -> Result<Self> {
            Ok(Self(view))
        }
        fn view(&self) -> &BufferView {
            &self.0
        }
    }

    #[test]
    fn test_identity_is_by_type_not_name() {
        assert_eq!(DecoderId::of::<Alpha>(), DecoderId::of::<Alpha>());
        assert_ne!(DecoderId::of::<Alpha>(), DecoderId::of::<Beta>());
        assert!(DecoderId::of::<Beta>().is::<Beta>());
        assert!(!DecoderId::of::<Beta>().is::<Alpha>());
    }

    #[test]
    fn test_default_size_is_view_length() {
        let alpha = Alpha::from_view(BufferView::owned(vec![0u8; 12])).unwrap();
        assert_eq!(alpha.size(), 12);
        assert_eq!(DecoderId::of::<Alpha>().name(), "Alpha");
    }
}
