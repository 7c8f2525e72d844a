//! Structured value helpers and the type/constraint checker.
//!
//! One file per structured runtime type: class descriptors, the
//! type/constraint checker, and the small immutable collection and scalar
//! types (List/Set/Map, Duration, DataSize, Regex, Pair, IntSeq, Bytes).

pub mod bytes;
pub mod class;
pub mod datasize;
pub mod duration;
pub mod intseq;
pub mod list;
pub mod map;
pub mod pair;
pub mod regex;
pub mod set;
pub mod type_value;

pub use bytes::BytesData;
pub use class::{ClassData, Property};
pub use datasize::{DataSizeUnit, data_size_to_bytes};
pub use duration::{DurationUnit, duration_to_nanos};
pub use intseq::IntSeqData;
pub use list::ListData;
pub use map::MapData;
pub use pair::PairData;
pub use regex::RegexData;
pub use set::SetData;
pub use type_value::{TypeAliasData, TypeValue};
