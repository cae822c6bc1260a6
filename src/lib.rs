//! # bitdata
//!
//! Zero-copy, bit-precise access to fields of a raw byte buffer.
//!
//! Describe fields by bit offset, bit width, kind and byte order, compile the
//! description once into a [LayoutTable], then read and write the fields in
//! place through any number of [DataView]s. Views created with
//! [DataView::segment] share one reference-counted [Raw] buffer, which is freed
//! after the last view over it is destroyed.
//!
//! All types are single-threaded: reference counts are plain counters and
//! views are neither `Send` nor `Sync`.
//!
//! ## Example
//!
//! ```
//! use std::rc::Rc;
//!
//! use bitdata::{DataView, FieldSpec, LayoutTable, Param, Value};
//!
//! let layout = Rc::new(LayoutTable::build([
//!     ("version", FieldSpec::positional([Param::Number(0), Param::Number(4)])),
//!     ("length", FieldSpec::new().offset(4).length(12).endian("little")),
//!     ("tag", FieldSpec::new().offset(2).length(2).kind("string")),
//! ]));
//!
//! let view = DataView::from_vec(vec![0x45, 0x00, b'o', b'k'])
//!     .unwrap()
//!     .with_layout(layout);
//!
//! assert_eq!(view.get("version"), Ok(Value::Number(4)));
//! assert_eq!(view.get("tag"), Ok(Value::from("ok")));
//!
//! view.set("length", 0x123u64).unwrap();
//! assert_eq!(view.get("length"), Ok(Value::Number(0x123)));
//!
//! let tail = view.segment(2, None).unwrap();
//! assert_eq!(tail.to_vec(), Some(b"ok".to_vec()));
//! ```

pub mod bits;
pub mod errors;
pub mod field;
pub mod layout;
pub mod raw;
#[cfg(feature = "serde")]
pub mod serde;
pub mod value;
pub mod view;

pub use errors::{AccessError, CodecError, ConstructError};
pub use field::{FieldSpec, Param};
pub use layout::{LayoutEntry, LayoutTable};
pub use raw::{Deallocator, Raw};
pub use value::{Endian, Kind, Value};
pub use view::DataView;
