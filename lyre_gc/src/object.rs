//! Untyped views over raw heap memory.
//!
//! A managed object is one header word followed by `field_count` pointer-sized
//! slots, where the field count is decoded from the header by the runtime's
//! [`ObjectLayout`] capability. All raw pointer arithmetic of the engine is
//! confined to this module so that the collector itself reads as ordinary
//! field manipulation.

use core::fmt;
use core::mem::{align_of, size_of};

/// The unit everything on the heap is measured in: headers and field slots
/// are both one `Word` wide.
pub type Word = usize;

/// Size of one field slot in bytes.
pub const WORD_SIZE: usize = size_of::<Word>();

/// Size of the object header in bytes.
pub const HEADER_SIZE: usize = size_of::<Word>();

/// Alignment every object starts at.
pub const OBJECT_ALIGN: usize = align_of::<Word>();

/// Runtime-supplied capability for decoding object headers.
///
/// The collector consults exactly one piece of header information: the number
/// of field slots. Every other header bit belongs to the runtime.
pub trait ObjectLayout {
    /// Number of field slots of an object with the given header word.
    fn field_count(header: Word) -> usize;
}

/// Total byte size of an object with the given number of field slots.
#[inline]
pub const fn size_for_fields(field_count: usize) -> usize {
    HEADER_SIZE + field_count * WORD_SIZE
}

/// An untyped reference to a managed object.
///
/// This is a thin wrapper around a raw address. It may be null, and a field
/// slot read through it may hold a tagged scalar rather than a real object
/// address; the collector classifies slot values purely by address range, so
/// `ObjRef` makes no validity promise on its own.
///
/// # Safety
/// The accessor methods dereference the address and are only sound when it
/// points at a live object whose header matches the [`ObjectLayout`] in use.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ObjRef(*mut u8);

impl ObjRef {
    /// The null reference.
    #[inline]
    pub const fn null() -> ObjRef {
        ObjRef(core::ptr::null_mut())
    }

    /// Wrap a raw object address.
    #[inline]
    pub const fn from_raw(ptr: *mut u8) -> ObjRef {
        ObjRef(ptr)
    }

    /// The raw object address.
    #[inline]
    pub const fn as_raw(self) -> *mut u8 {
        self.0
    }

    /// The address as an integer, for range classification and display.
    #[inline]
    pub fn addr(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub fn is_null(self) -> bool {
        self.0.is_null()
    }

    /// Read the header word.
    ///
    /// # Safety
    /// `self` must point at a live object.
    #[inline]
    pub unsafe fn header(self) -> Word {
        (self.0 as *const Word).read()
    }

    /// Overwrite the header word.
    ///
    /// # Safety
    /// `self` must point at object memory at least `HEADER_SIZE` bytes long.
    #[inline]
    pub unsafe fn write_header(self, header: Word) {
        (self.0 as *mut Word).write(header)
    }

    #[inline]
    unsafe fn field_ptr(self, index: usize) -> *mut ObjRef {
        self.0.add(HEADER_SIZE).cast::<ObjRef>().add(index)
    }

    /// Read field slot `index`. The result may be a tagged scalar.
    ///
    /// # Safety
    /// `self` must point at a live object with more than `index` field slots.
    #[inline]
    pub unsafe fn field(self, index: usize) -> ObjRef {
        self.field_ptr(index).read()
    }

    /// Overwrite field slot `index`.
    ///
    /// # Safety
    /// `self` must point at a live object with more than `index` field slots.
    #[inline]
    pub unsafe fn write_field(self, index: usize, value: ObjRef) {
        self.field_ptr(index).write(value)
    }

    /// Number of field slots, decoded from the header.
    ///
    /// # Safety
    /// `self` must point at a live object laid out per `L`.
    #[inline]
    pub unsafe fn field_count<L: ObjectLayout>(self) -> usize {
        L::field_count(self.header())
    }

    /// Total byte size of the object, decoded from the header.
    ///
    /// # Safety
    /// `self` must point at a live object laid out per `L`.
    #[inline]
    pub unsafe fn size_in_bytes<L: ObjectLayout>(self) -> usize {
        size_for_fields(self.field_count::<L>())
    }
}

impl fmt::Debug for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjRef({:#x})", self.addr())
    }
}

impl fmt::Pointer for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_for_fields() {
        assert_eq!(size_for_fields(0), HEADER_SIZE);
        assert_eq!(size_for_fields(3), HEADER_SIZE + 3 * WORD_SIZE);
    }

    #[test]
    fn test_field_access() {
        // One header word plus two slots, on the stack.
        let mut storage = [0 as Word; 3];
        let object = ObjRef::from_raw(storage.as_mut_ptr() as *mut u8);

        unsafe {
            object.write_header(2);
            object.write_field(0, ObjRef::null());
            object.write_field(1, object);

            assert_eq!(object.header(), 2);
            assert!(object.field(0).is_null());
            assert_eq!(object.field(1), object);
        }
    }
}
